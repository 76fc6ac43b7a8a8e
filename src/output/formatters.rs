//! Output Formatters Implementation
//!
//! serde_jsonのフォーマッター実装を提供するモジュール。

use serde_json::ser::Formatter;
use std::io::{self, Write};

/// ASCIIのみで出力するJSONフォーマッター
///
/// 非ASCII文字を`\uXXXX`形式でエスケープします。BMP外の文字はUTF-16の
/// サロゲートペアとして2つのエスケープに分割されます。
/// 引用符・バックスラッシュ・制御文字のエスケープはserde_json側で行われます。
#[derive(Debug, Clone, Copy, Default)]
pub struct AsciiFormatter;

impl Formatter for AsciiFormatter {
    fn write_string_fragment<W>(&mut self, writer: &mut W, fragment: &str) -> io::Result<()>
    where
        W: ?Sized + Write,
    {
        let mut start = 0;

        for (index, ch) in fragment.char_indices() {
            if ch.is_ascii() {
                continue;
            }

            if start < index {
                writer.write_all(fragment[start..index].as_bytes())?;
            }

            let mut units = [0u16; 2];
            for unit in ch.encode_utf16(&mut units) {
                write!(writer, "\\u{:04x}", unit)?;
            }

            start = index + ch.len_utf8();
        }

        writer.write_all(fragment[start..].as_bytes())
    }
}
