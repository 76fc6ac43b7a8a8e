//! HTTP Module
//!
//! リクエストヘッダーの解析、レスポンスの組み立て、ルーティングを提供するモジュール。
//! ルーティングは同期関数であり、ワークブックの読み込みを含むためブロッキングプール上で実行される。

use percent_encoding::percent_decode_str;
use tracing::{error, warn};

use crate::api::SheetSelector;
use crate::builder::SheetService;
use crate::error::XlsxServeError;
use crate::output::Envelope;
use crate::security::validate_request_path;

/// 直列化そのものに失敗した場合の最終的なレスポンス本文
const FALLBACK_BODY: &[u8] = br#"{"success":false,"error":"Internal serialization error"}"#;

/// 許可するメソッド
const ALLOWED_METHODS: &str = "GET, OPTIONS";

/// 解析済みのHTTPリクエスト
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Request {
    /// メソッド（大文字）
    pub method: String,

    /// パス（クエリ文字列を除く）
    pub path: String,

    /// デコード済みのクエリパラメータ（出現順）
    pub query: Vec<(String, String)>,
}

impl Request {
    /// リクエストヘッダーを解析する
    ///
    /// リクエストラインのみを解釈し、ヘッダーフィールドは読み飛ばします。
    ///
    /// # 発生し得るエラー
    ///
    /// * `XlsxServeError::Http` - リクエストラインが不正な場合
    pub fn parse(head: &[u8]) -> Result<Self, XlsxServeError> {
        let head = String::from_utf8_lossy(head);
        let line = head
            .lines()
            .next()
            .ok_or_else(|| XlsxServeError::Http("Empty request".to_string()))?;

        let mut parts = line.split_whitespace();
        let (method, target, version) = match (parts.next(), parts.next(), parts.next(), parts.next())
        {
            (Some(method), Some(target), Some(version), None) => (method, target, version),
            _ => {
                return Err(XlsxServeError::Http(format!(
                    "Malformed request line: {:?}",
                    line
                )))
            }
        };

        if !version.starts_with("HTTP/1.") {
            return Err(XlsxServeError::Http(format!(
                "Unsupported protocol version: {}",
                version
            )));
        }

        validate_request_path(target).map_err(XlsxServeError::Http)?;

        let (path, query) = match target.split_once('?') {
            Some((path, query)) => (path, parse_query(query)),
            None => (target, Vec::new()),
        };

        Ok(Self {
            method: method.to_ascii_uppercase(),
            path: path.to_string(),
            query,
        })
    }

    /// クエリパラメータを取得する（同名が複数ある場合は最初の値）
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

/// クエリ文字列をデコードする（`+`は空白として扱う）
fn parse_query(query: &str) -> Vec<(String, String)> {
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            (decode_component(key), decode_component(value))
        })
        .collect()
}

fn decode_component(value: &str) -> String {
    let value = value.replace('+', " ");
    percent_decode_str(&value).decode_utf8_lossy().into_owned()
}

/// HTTPレスポンス
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Response {
    /// ステータスコード
    pub status: u16,

    /// 追加ヘッダー
    pub headers: Vec<(&'static str, &'static str)>,

    /// JSON本文（204の場合は空）
    pub body: Vec<u8>,
}

impl Response {
    /// JSON本文を持つレスポンス
    pub fn json(status: u16, body: Vec<u8>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body,
        }
    }

    /// CORSプリフライトへの応答
    pub fn preflight() -> Self {
        Self {
            status: 204,
            headers: vec![
                ("Access-Control-Allow-Methods", ALLOWED_METHODS),
                ("Access-Control-Allow-Headers", "*"),
                ("Access-Control-Max-Age", "86400"),
            ],
            body: Vec::new(),
        }
    }

    /// 汎用の内部エラー
    pub fn internal_error() -> Self {
        Self::json(500, FALLBACK_BODY.to_vec())
    }

    /// ワイヤ形式に変換する
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut head = format!("HTTP/1.1 {} {}\r\n", self.status, reason_phrase(self.status));
        if self.status != 204 {
            head.push_str("Content-Type: application/json\r\n");
        }
        head.push_str(&format!("Content-Length: {}\r\n", self.body.len()));
        head.push_str("Access-Control-Allow-Origin: *\r\n");
        for (name, value) in &self.headers {
            head.push_str(&format!("{}: {}\r\n", name, value));
        }
        head.push_str("Connection: close\r\n\r\n");

        let mut bytes = head.into_bytes();
        bytes.extend_from_slice(&self.body);
        bytes
    }
}

/// ステータスコードの理由句
fn reason_phrase(status: u16) -> &'static str {
    match status {
        200 => "OK",
        204 => "No Content",
        400 => "Bad Request",
        404 => "Not Found",
        405 => "Method Not Allowed",
        500 => "Internal Server Error",
        _ => "Unknown",
    }
}

/// リクエストをルーティングしてレスポンスを生成する
///
/// | メソッド | パス      | 内容                         |
/// | -------- | --------- | ---------------------------- |
/// | GET      | `/`       | 稼働状況                     |
/// | GET      | `/sheets` | シート名の一覧               |
/// | GET      | `/data`   | 正規化済みの行（`?sheet=`）  |
/// | OPTIONS  | 任意      | CORSプリフライト             |
pub(crate) fn route(service: &SheetService, request: &Request) -> Response {
    match (request.method.as_str(), request.path.as_str()) {
        ("OPTIONS", _) => Response::preflight(),
        ("GET", "/") => respond(service, 200, &Envelope::Status),
        ("GET", "/sheets") => match service.sheet_names() {
            Ok(sheets) => respond(service, 200, &Envelope::Sheets(&sheets)),
            Err(e) => error_response(service, &e),
        },
        ("GET", "/data") => {
            let selector = SheetSelector::from_query(request.query_param("sheet"));
            match service.dataset(&selector) {
                Ok(dataset) => respond(service, 200, &Envelope::Data(&dataset)),
                Err(e) => error_response(service, &e),
            }
        }
        ("GET", path) => respond(
            service,
            404,
            &Envelope::Failure(&format!("Not found: {}", path)),
        ),
        (method, _) => {
            let mut response = respond(
                service,
                405,
                &Envelope::Failure(&format!("Method not allowed: {}", method)),
            );
            response.headers.push(("Allow", ALLOWED_METHODS));
            response
        }
    }
}

/// エラーを失敗エンベロープに変換する
pub(crate) fn error_response(service: &SheetService, err: &XlsxServeError) -> Response {
    if err.status_code() >= 500 {
        error!(error = %err, "request failed");
    } else {
        warn!(error = %err, "request failed");
    }
    respond(
        service,
        err.status_code(),
        &Envelope::Failure(&err.client_message()),
    )
}

/// エンベロープを直列化してレスポンスを生成する
///
/// 直列化に失敗した場合は不具合として記録し、汎用の500を返す。
fn respond(service: &SheetService, status: u16, envelope: &Envelope<'_>) -> Response {
    match service.render(envelope) {
        Ok(body) => Response::json(status, body),
        Err(e) => {
            error!(error = %e, "failed to serialize response");
            Response::internal_error()
        }
    }
}
