//! Workbook Reader
//!
//! calamineを使用したワークブックの読み込み。
//! calamineのセル値を`CellValue`に変換し、ヘッダー行とデータ行に分割します。

use calamine::{open_workbook_auto_from_rs, CellErrorType, Data, Reader, Sheets};
use chrono::{NaiveDate, NaiveDateTime};
use std::fs::File;
use std::io::{Cursor, Read};
use std::path::Path;

use crate::api::SheetSelector;
use crate::error::XlsxServeError;
use crate::security::{validate_workbook_size, SecurityConfig};
use crate::types::{CellValue, RawSheet};

/// 欠損値として扱う文字列（完全一致）
pub(crate) const DEFAULT_NA_VALUES: [&str; 19] = [
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

/// 整数として正確に表現できる倍精度値の上限（2^53）
const MAX_EXACT_INTEGER: f64 = 9_007_199_254_740_992.0;

/// ワークブックリーダー
///
/// calamineのラッパーとして、シート一覧の取得とシートの読み込みを提供します。
/// `.xlsx` / `.xlsm` / `.xlsb` / `.xls` / `.ods`形式に対応します。
pub(crate) struct WorkbookReader {
    /// calamineのワークブック
    workbook: Sheets<Cursor<Vec<u8>>>,

    /// 既定のNA文字列を欠損として扱うか
    default_na: bool,
}

impl WorkbookReader {
    /// ファイルパスからワークブックを開く
    ///
    /// # 戻り値
    ///
    /// * `Ok(WorkbookReader)` - 読み込みに成功した場合
    /// * `Err(XlsxServeError::Io)` - ファイルが存在しない、読み込めない場合
    /// * `Err(XlsxServeError::SecurityViolation)` - サイズ上限を超えた場合
    /// * `Err(XlsxServeError::Parse)` - ワークブックとして解析できない場合
    pub fn open(
        path: &Path,
        security: &SecurityConfig,
        default_na: bool,
    ) -> Result<Self, XlsxServeError> {
        let file = File::open(path)?;
        let size = file.metadata()?.len();
        validate_workbook_size(size, security).map_err(XlsxServeError::SecurityViolation)?;

        Self::from_reader(file, security, default_na)
    }

    /// 任意のリーダーからワークブックを開く
    ///
    /// 全体をメモリに読み込みます。上限を1バイトでも超えた時点で読み込みを打ち切ります。
    pub fn from_reader<R: Read>(
        reader: R,
        security: &SecurityConfig,
        default_na: bool,
    ) -> Result<Self, XlsxServeError> {
        let mut buffer = Vec::new();
        reader
            .take(security.max_workbook_size.saturating_add(1))
            .read_to_end(&mut buffer)?;
        validate_workbook_size(buffer.len() as u64, security)
            .map_err(XlsxServeError::SecurityViolation)?;

        let workbook = open_workbook_auto_from_rs(Cursor::new(buffer))?;

        Ok(Self {
            workbook,
            default_na,
        })
    }

    /// すべてのシート名をワークブックの順序で取得
    pub fn sheet_names(&self) -> Vec<String> {
        self.workbook.sheet_names()
    }

    /// 選択方式に基づいてシート名を解決する
    ///
    /// # 戻り値
    ///
    /// * `Err(XlsxServeError::EmptyWorkbook)` - シートが1つもない場合
    /// * `Err(XlsxServeError::SheetNotFound)` - 指定名のシートが存在しない場合
    pub fn resolve_sheet(&self, selector: &SheetSelector) -> Result<String, XlsxServeError> {
        let names = self.sheet_names();

        match selector {
            SheetSelector::First => names.first().cloned().ok_or(XlsxServeError::EmptyWorkbook),
            SheetSelector::Name(name) => {
                if names.iter().any(|n| n == name) {
                    Ok(name.clone())
                } else {
                    Err(XlsxServeError::SheetNotFound(name.clone()))
                }
            }
        }
    }

    /// シートを読み込み、ヘッダー行とデータ行に分割する
    ///
    /// 使用範囲の先頭行がヘッダーになります。空のシートはヘッダー・データ行ともに空です。
    pub fn read_sheet(&mut self, selector: &SheetSelector) -> Result<RawSheet, XlsxServeError> {
        let name = self.resolve_sheet(selector)?;
        let range = self.workbook.worksheet_range(&name)?;

        let mut rows = range.rows();
        let header: Vec<CellValue> = rows
            .next()
            .map(|row| row.iter().map(|cell| convert_cell(cell, false)).collect())
            .unwrap_or_default();
        let rows: Vec<Vec<CellValue>> = rows
            .map(|row| {
                row.iter()
                    .map(|cell| convert_cell(cell, self.default_na))
                    .collect()
            })
            .collect();

        Ok(RawSheet { name, header, rows })
    }
}

/// calamineのセル値を`CellValue`に変換する
///
/// * 小数部のない浮動小数点数は（2^53未満であれば）整数として扱う
/// * `#N/A`エラーと既定のNA文字列は欠損として扱う
/// * 日付は1900年/1904年エポックを考慮して`Timestamp`に変換する
pub(crate) fn convert_cell(cell: &Data, default_na: bool) -> CellValue {
    match cell {
        Data::Empty => CellValue::Missing,
        Data::Int(i) => CellValue::Integer(*i),
        Data::Float(f) => convert_float(*f),
        Data::String(s) => {
            if default_na && is_na_value(s) {
                CellValue::Missing
            } else {
                CellValue::Text(s.clone())
            }
        }
        Data::Bool(b) => CellValue::Boolean(*b),
        Data::DateTime(dt) => {
            if dt.is_duration() {
                CellValue::Text(format_duration(dt.as_f64()))
            } else {
                dt.as_datetime().map_or(CellValue::Missing, CellValue::Timestamp)
            }
        }
        Data::DateTimeIso(s) => {
            parse_iso_datetime(s).map_or_else(|| CellValue::Text(s.clone()), CellValue::Timestamp)
        }
        Data::DurationIso(s) => CellValue::Text(s.clone()),
        Data::Error(CellErrorType::NA) => CellValue::Missing,
        Data::Error(e) => CellValue::Other(e.to_string()),
    }
}

/// 浮動小数点数を変換する
fn convert_float(value: f64) -> CellValue {
    if value.fract() == 0.0 && value.abs() < MAX_EXACT_INTEGER {
        CellValue::Integer(value as i64)
    } else {
        CellValue::Float(value)
    }
}

/// 既定のNA文字列かどうか
pub(crate) fn is_na_value(value: &str) -> bool {
    DEFAULT_NA_VALUES.contains(&value)
}

/// ISO 8601形式の日時文字列を解析する
fn parse_iso_datetime(value: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
}

/// 日数で表された経過時間を`H:MM:SS`形式に変換する
fn format_duration(days: f64) -> String {
    let seconds = (days * 86_400.0).round();
    if !seconds.is_finite() || seconds.abs() > i64::MAX as f64 {
        return String::new();
    }

    let seconds = seconds as i64;
    let sign = if seconds < 0 { "-" } else { "" };
    let seconds = seconds.unsigned_abs();
    format!(
        "{}{}:{:02}:{:02}",
        sign,
        seconds / 3600,
        (seconds % 3600) / 60,
        seconds % 60
    )
}
