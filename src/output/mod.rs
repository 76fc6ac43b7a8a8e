//! Output Format Module
//!
//! レスポンスエンベロープとJSON直列化を提供するモジュール。

mod formatters;

use serde::Serialize;

use crate::api::JsonEncoding;
use crate::error::XlsxServeError;
use crate::types::{Dataset, Records};

pub use formatters::AsciiFormatter;

/// `/`のレスポンス本文
pub(crate) const STATUS_MESSAGE: &str = "API is running";

/// レスポンスエンベロープ
///
/// 各エンドポイントが返すJSONドキュメントを表します。
#[derive(Debug, Clone, Copy)]
pub enum Envelope<'a> {
    /// `{"message": .., "status": "ok"}`
    Status,

    /// `{"success": true, "sheets": [..]}`
    Sheets(&'a [String]),

    /// `{"success": true, "rows": N, "data": [..]}`
    Data(&'a Dataset),

    /// `{"success": false, "error": ".."}`
    Failure(&'a str),
}

#[derive(Serialize)]
struct StatusBody {
    message: &'static str,
    status: &'static str,
}

#[derive(Serialize)]
struct SheetsBody<'a> {
    success: bool,
    sheets: &'a [String],
}

#[derive(Serialize)]
struct DataBody<'a> {
    success: bool,
    rows: usize,
    data: Records<'a>,
}

#[derive(Serialize)]
struct FailureBody<'a> {
    success: bool,
    error: &'a str,
}

impl Serialize for Envelope<'_> {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match *self {
            Envelope::Status => StatusBody {
                message: STATUS_MESSAGE,
                status: "ok",
            }
            .serialize(serializer),
            Envelope::Sheets(sheets) => SheetsBody {
                success: true,
                sheets,
            }
            .serialize(serializer),
            Envelope::Data(dataset) => DataBody {
                success: true,
                rows: dataset.len(),
                data: dataset.records(),
            }
            .serialize(serializer),
            Envelope::Failure(error) => FailureBody {
                success: false,
                error,
            }
            .serialize(serializer),
        }
    }
}

/// エンベロープをJSONバイト列に直列化する
///
/// # 引数
///
/// * `envelope` - 直列化するエンベロープ
/// * `encoding` - 出力エンコーディング（ASCIIエスケープまたはUTF-8）
///
/// # 戻り値
///
/// * `Ok(Vec<u8>)` - JSONドキュメント
/// * `Err(XlsxServeError::Serialization)` - 非有限の浮動小数点数が含まれていた場合など
pub fn render(envelope: &Envelope<'_>, encoding: JsonEncoding) -> Result<Vec<u8>, XlsxServeError> {
    let mut buffer = Vec::new();
    match encoding {
        JsonEncoding::Ascii => {
            let mut serializer = serde_json::Serializer::with_formatter(&mut buffer, AsciiFormatter);
            envelope.serialize(&mut serializer)?;
        }
        JsonEncoding::Utf8 => {
            serde_json::to_writer(&mut buffer, envelope)?;
        }
    }
    Ok(buffer)
}
