//! Error Types Module
//!
//! クレート全体で使用する構造化エラー型を定義するモジュール。
//! `thiserror`を使用して、エラーの自動変換とメッセージフォーマットを実現する。

use thiserror::Error;

/// xlsxserveクレート全体で使用するエラー型
///
/// ワークブックの読み込み、設定の検証、レスポンスの直列化、HTTP処理中に発生する
/// すべてのエラーを統一的に扱うために使用されます。
///
/// 値の正規化はエラーを返さない全域関数であるため、対応するバリアントは存在しません。
///
/// # 使用例
///
/// ```rust,no_run
/// use xlsxserve::XlsxServeError;
/// use std::fs::File;
///
/// fn open_workbook(path: &str) -> Result<(), XlsxServeError> {
///     let _file = File::open(path)?;  // Ioエラーが自動的に変換される
///     Ok(())
/// }
/// ```
#[derive(Error, Debug)]
pub enum XlsxServeError {
    /// I/O操作中に発生したエラー
    ///
    /// ワークブックが存在しない、ソケットの読み書きに失敗したなど。
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// ワークブックの解析中に発生したエラー（calamine由来）
    #[error("Failed to parse workbook: {0}")]
    Parse(#[from] calamine::Error),

    /// 指定されたシートが存在しない
    #[error("Worksheet named '{0}' not found")]
    SheetNotFound(String),

    /// ワークブックにシートが1つも含まれていない
    #[error("Workbook contains no worksheets")]
    EmptyWorkbook,

    /// 設定の検証に失敗したエラー
    ///
    /// `ServiceBuilder::build()`時、または環境変数の解釈時に発生します。
    ///
    /// ```rust,no_run
    /// use xlsxserve::{ServiceBuilder, XlsxServeError};
    ///
    /// match ServiceBuilder::new().with_workbook_path("").build() {
    ///     Err(XlsxServeError::Config(msg)) => println!("設定エラー: {}", msg),
    ///     _ => {}
    /// }
    /// ```
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSONへの直列化に失敗したエラー
    ///
    /// 正規化が正しく行われていれば発生しない。発生した場合は不具合として扱う。
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// 不正なHTTPリクエスト
    #[error("Bad request: {0}")]
    Http(String),

    /// セキュリティ制限に違反したエラー
    ///
    /// ワークブックのサイズ上限、リクエストヘッダーのサイズ上限など。
    #[error("Security violation: {0}")]
    SecurityViolation(String),
}

impl XlsxServeError {
    /// エラーに対応するHTTPステータスコード
    ///
    /// 読み込み失敗は400、直列化の失敗（不具合）は500を返します。
    pub fn status_code(&self) -> u16 {
        match self {
            XlsxServeError::Io(_)
            | XlsxServeError::Parse(_)
            | XlsxServeError::SheetNotFound(_)
            | XlsxServeError::EmptyWorkbook
            | XlsxServeError::Http(_)
            | XlsxServeError::SecurityViolation(_) => 400,
            XlsxServeError::Config(_) | XlsxServeError::Serialization(_) => 500,
        }
    }

    /// クライアントに返すエラーメッセージ
    ///
    /// 内部不具合の詳細はクライアントに公開せず、汎用メッセージに置き換えます。
    pub fn client_message(&self) -> String {
        match self {
            XlsxServeError::Serialization(_) => "Internal serialization error".to_string(),
            XlsxServeError::Config(_) => "Internal configuration error".to_string(),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_io_error() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "No such file or directory");
        let error: XlsxServeError = io_err.into();

        match error {
            XlsxServeError::Io(ref e) => {
                assert_eq!(e.kind(), io::ErrorKind::NotFound);
            }
            _ => panic!("Expected Io error"),
        }
        assert_eq!(error.status_code(), 400);
        assert!(error.client_message().contains("No such file or directory"));
    }

    #[test]
    fn test_parse_error_display() {
        let error: XlsxServeError = calamine::Error::Msg("Corrupted file").into();

        let error_msg = error.to_string();
        assert!(error_msg.contains("Failed to parse workbook"));
        assert!(error_msg.contains("Corrupted file"));
        assert_eq!(error.status_code(), 400);
    }

    #[test]
    fn test_sheet_not_found() {
        let error = XlsxServeError::SheetNotFound("Missing".to_string());
        assert_eq!(error.to_string(), "Worksheet named 'Missing' not found");
        assert_eq!(error.status_code(), 400);
    }

    #[test]
    fn test_serialization_error_is_generic() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let error: XlsxServeError = json_err.into();

        assert_eq!(error.status_code(), 500);
        assert_eq!(error.client_message(), "Internal serialization error");
    }

    #[test]
    fn test_config_error_display() {
        let error = XlsxServeError::Config("Invalid PORT value: 'abc'".to_string());
        assert!(error.to_string().contains("Configuration error"));
        assert!(error.to_string().contains("'abc'"));
        assert_eq!(error.status_code(), 500);
    }

    #[test]
    fn test_error_conversion_with_question_mark() {
        fn io_operation() -> Result<(), XlsxServeError> {
            let _file = std::fs::File::open("nonexistent_file.xlsx")?;
            Ok(())
        }

        match io_operation() {
            Err(XlsxServeError::Io(_)) => {}
            _ => panic!("Expected Io error from ? operator"),
        }
    }
}
