//! Builder Module
//!
//! Fluent Builder APIを提供し、`SheetService`インスタンスを段階的に構築する。

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::debug;

use crate::api::{JsonEncoding, SheetSelector};
use crate::error::XlsxServeError;
use crate::normalize::normalize_sheet;
use crate::output::{render, Envelope};
use crate::parser::WorkbookReader;
use crate::security::SecurityConfig;
use crate::types::Dataset;

/// 既定のワークブックパス
pub const DEFAULT_WORKBOOK_PATH: &str = "data.xlsx";

/// 既定の待ち受けポート
pub const DEFAULT_PORT: u16 = 5000;

/// 待ち受けポートを指定する環境変数
pub const PORT_ENV_VAR: &str = "PORT";

/// サービスの設定
///
/// 起動時に1度だけ構築され、以降は読み取り専用で共有されます。
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceConfig {
    /// ワークブックのパス
    pub workbook_path: PathBuf,

    /// 待ち受けアドレス
    pub host: IpAddr,

    /// 待ち受けポート
    pub port: u16,

    /// JSON出力のエンコーディング
    pub encoding: JsonEncoding,

    /// 既定のNA文字列（`"NA"`, `"#N/A"`など）を欠損として扱うか
    pub default_na: bool,

    /// リクエストヘッダー読み込みのタイムアウト
    pub request_timeout: Duration,

    /// 入力サイズの制限
    pub security: SecurityConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            workbook_path: PathBuf::from(DEFAULT_WORKBOOK_PATH),
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            encoding: JsonEncoding::Ascii,
            default_na: true,
            request_timeout: Duration::from_secs(10),
            security: SecurityConfig::default(),
        }
    }
}

impl ServiceConfig {
    /// 待ち受けソケットアドレス
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

/// Fluent Builder APIを提供する構造体
///
/// すべての設定項目にデフォルト値が設定されており、必要な設定のみをオーバーライドできます。
///
/// # 使用例
///
/// ```rust,no_run
/// use xlsxserve::{JsonEncoding, ServiceBuilder};
///
/// # fn main() -> Result<(), xlsxserve::XlsxServeError> {
/// let service = ServiceBuilder::from_env()?
///     .with_workbook_path("reports/q1.xlsx")
///     .with_encoding(JsonEncoding::Utf8)
///     .build()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct ServiceBuilder {
    /// 内部設定（構築中）
    config: ServiceConfig,
}

impl ServiceBuilder {
    /// デフォルト設定を持つビルダーインスタンスを生成する
    ///
    /// # デフォルト設定
    ///
    /// - ワークブック: `data.xlsx`
    /// - 待ち受け: `0.0.0.0:5000`
    /// - エンコーディング: ASCIIエスケープ
    /// - NA文字列: 欠損として扱う
    /// - リクエストタイムアウト: 10秒
    pub fn new() -> Self {
        Self::default()
    }

    /// 環境変数`PORT`から待ち受けポートを読み込んだビルダーを生成する
    ///
    /// `PORT`が未設定または空の場合は既定値（5000）を使用します。
    ///
    /// # 発生し得るエラー
    ///
    /// * `XlsxServeError::Config` - `PORT`がポート番号として解釈できない場合
    pub fn from_env() -> Result<Self, XlsxServeError> {
        let port = std::env::var(PORT_ENV_VAR).ok();
        Self::new().with_port_value(port.as_deref())
    }

    /// 文字列で与えられたポート番号を設定する（内部ヘルパー）
    fn with_port_value(self, value: Option<&str>) -> Result<Self, XlsxServeError> {
        match value.map(str::trim) {
            None | Some("") => Ok(self),
            Some(value) => {
                let port = value.parse::<u16>().map_err(|_| {
                    XlsxServeError::Config(format!("Invalid {} value: '{}'", PORT_ENV_VAR, value))
                })?;
                Ok(self.with_port(port))
            }
        }
    }

    /// ワークブックのパスを指定する
    pub fn with_workbook_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.workbook_path = path.into();
        self
    }

    /// 待ち受けアドレスを指定する
    ///
    /// ```rust,no_run
    /// use std::net::{IpAddr, Ipv4Addr};
    /// use xlsxserve::ServiceBuilder;
    ///
    /// let builder = ServiceBuilder::new().with_host(IpAddr::V4(Ipv4Addr::LOCALHOST));
    /// ```
    pub fn with_host(mut self, host: IpAddr) -> Self {
        self.config.host = host;
        self
    }

    /// 待ち受けポートを指定する（`0`はOSによる自動割り当て）
    pub fn with_port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// JSON出力のエンコーディングを指定する
    pub fn with_encoding(mut self, encoding: JsonEncoding) -> Self {
        self.config.encoding = encoding;
        self
    }

    /// 既定のNA文字列を欠損として扱うかを指定する
    ///
    /// * `true`: `"NA"`, `"#N/A"`, `"NULL"`などを欠損として扱う（デフォルト）
    /// * `false`: 文字列のまま正規化する
    pub fn with_default_na(mut self, enabled: bool) -> Self {
        self.config.default_na = enabled;
        self
    }

    /// リクエストヘッダー読み込みのタイムアウトを指定する
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    /// ワークブックファイルの最大サイズ（バイト）を指定する
    pub fn with_max_workbook_size(mut self, bytes: u64) -> Self {
        self.config.security.max_workbook_size = bytes;
        self
    }

    /// 設定を検証し、`SheetService`インスタンスを生成する
    ///
    /// # 発生し得るエラー
    ///
    /// * `XlsxServeError::Config(String)`: 設定の検証に失敗した場合
    ///   * ワークブックのパスが空
    ///   * リクエストタイムアウトが0
    ///   * サイズ上限が0
    pub fn build(self) -> Result<SheetService, XlsxServeError> {
        // 1. ワークブックパスの検証
        if self.config.workbook_path.as_os_str().is_empty() {
            return Err(XlsxServeError::Config(
                "Workbook path must not be empty".to_string(),
            ));
        }

        // 2. タイムアウトの検証
        if self.config.request_timeout.is_zero() {
            return Err(XlsxServeError::Config(
                "Request timeout must be greater than zero".to_string(),
            ));
        }

        // 3. サイズ上限の検証
        if self.config.security.max_workbook_size == 0
            || self.config.security.max_request_head_size == 0
        {
            return Err(XlsxServeError::Config(
                "Size limits must be greater than zero".to_string(),
            ));
        }

        Ok(SheetService::new(self.config))
    }
}

/// ワークブックをJSONとして提供するサービスのファサード
///
/// リクエストごとにワークブックを読み込み、正規化したデータセットを返します。
/// 状態を持たないため、複数のリクエストから同時に使用できます。
#[derive(Debug)]
pub struct SheetService {
    config: ServiceConfig,
}

impl SheetService {
    pub(crate) fn new(config: ServiceConfig) -> Self {
        Self { config }
    }

    /// サービスの設定
    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// ワークブックのパス
    pub fn workbook_path(&self) -> &Path {
        &self.config.workbook_path
    }

    fn open_workbook(&self) -> Result<WorkbookReader, XlsxServeError> {
        WorkbookReader::open(
            &self.config.workbook_path,
            &self.config.security,
            self.config.default_na,
        )
    }

    /// ワークブック内のシート名をワークブックの順序で取得する
    pub fn sheet_names(&self) -> Result<Vec<String>, XlsxServeError> {
        Ok(self.open_workbook()?.sheet_names())
    }

    /// シートを読み込み、正規化したデータセットを構築する
    ///
    /// # 使用例
    ///
    /// ```rust,no_run
    /// use xlsxserve::{ServiceBuilder, SheetSelector};
    ///
    /// # fn main() -> Result<(), xlsxserve::XlsxServeError> {
    /// let service = ServiceBuilder::new().with_workbook_path("data.xlsx").build()?;
    /// let dataset = service.dataset(&SheetSelector::Name("Sheet1".to_string()))?;
    /// println!("{} rows", dataset.len());
    /// # Ok(())
    /// # }
    /// ```
    pub fn dataset(&self, selector: &SheetSelector) -> Result<Dataset, XlsxServeError> {
        let sheet = self.open_workbook()?.read_sheet(selector)?;
        debug!(
            sheet = %sheet.name,
            columns = sheet.header.len(),
            rows = sheet.rows.len(),
            "read worksheet"
        );

        Ok(normalize_sheet(&sheet))
    }

    /// エンベロープを設定されたエンコーディングでJSONに直列化する
    pub fn render(&self, envelope: &Envelope<'_>) -> Result<Vec<u8>, XlsxServeError> {
        render(envelope, self.config.encoding)
    }
}
