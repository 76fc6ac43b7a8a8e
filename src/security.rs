//! Security Module
//!
//! 入力サイズの制限を定義するモジュール。
//! 巨大なワークブックや過大なリクエストヘッダーによる資源枯渇を防ぎます。

/// セキュリティ設定
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityConfig {
    /// ワークブックファイルの最大サイズ（バイト）
    /// デフォルト: 256MB (268_435_456 bytes)
    pub max_workbook_size: u64,
    /// リクエストライン＋ヘッダーの最大サイズ（バイト）
    /// デフォルト: 8KB (8_192 bytes)
    pub max_request_head_size: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_workbook_size: 268_435_456, // 256MB
            max_request_head_size: 8_192,   // 8KB
        }
    }
}

/// ワークブックのサイズを検証する
///
/// # 戻り値
///
/// * `Ok(())` - 上限以内の場合
/// * `Err(String)` - 上限を超えている場合
pub(crate) fn validate_workbook_size(size: u64, config: &SecurityConfig) -> Result<(), String> {
    if size > config.max_workbook_size {
        return Err(format!(
            "Workbook size exceeds maximum: {} bytes (max: {} bytes)",
            size, config.max_workbook_size
        ));
    }
    Ok(())
}

/// リクエストパスを検証する
///
/// 制御文字や空白を含むパス、`/`で始まらないパスを拒否します。
pub(crate) fn validate_request_path(path: &str) -> Result<(), String> {
    if !path.starts_with('/') {
        return Err(format!("Request target must start with '/': {}", path));
    }

    if path.chars().any(|c| c.is_control() || c == ' ') {
        return Err("Request target contains invalid characters".to_string());
    }

    Ok(())
}
