//! Public API Types
//!
//! 公開APIで使用する列挙型を定義するモジュール。

/// シート選択方式
///
/// `/data`エンドポイントで読み込むシートを指定します。
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[non_exhaustive]
pub enum SheetSelector {
    /// ワークブックの最初のシート（デフォルト）
    #[default]
    First,

    /// シート名指定
    ///
    /// 例: `SheetSelector::Name("Sheet1".to_string())`
    Name(String),
}

impl SheetSelector {
    /// クエリパラメータの値から選択方式を生成する
    ///
    /// 値が存在しない、または空文字列の場合は`First`になります。
    pub fn from_query(value: Option<&str>) -> Self {
        match value {
            Some(name) if !name.is_empty() => SheetSelector::Name(name.to_string()),
            _ => SheetSelector::First,
        }
    }
}

/// JSON出力のテキストエンコーディング
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[non_exhaustive]
pub enum JsonEncoding {
    /// ASCIIのみで出力（デフォルト）
    ///
    /// 非ASCII文字はすべて`\uXXXX`形式でエスケープされ、
    /// BMP外の文字はサロゲートペアとして出力されます。
    ///
    /// 例: `"東京"` → `"\u6771\u4eac"`
    #[default]
    Ascii,

    /// UTF-8のまま出力
    Utf8,
}
