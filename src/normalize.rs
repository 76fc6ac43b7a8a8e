//! Normalize Module
//!
//! セル値と列名をJSONとして安全な表現に変換する正規化パイプライン。
//! すべての関数は全域関数であり、どの入力に対してもパニックしません。

use rayon::prelude::*;

use crate::types::{CellValue, ColumnKey, Dataset, NormalizedValue, RawSheet, TIMESTAMP_FORMAT};

/// JSONの倍精度として安全に扱える絶対値の上限
const MAX_SAFE_MAGNITUDE: f64 = 1e308;

/// 欠損値として扱う文字列（大文字小文字を区別しない）
const MISSING_TOKENS: [&str; 4] = ["nan", "none", "nat", "na"];

/// 列名をクリーニングする
///
/// 値を文字列化し、前後の空白を除去したうえで印字不可能な文字をすべて取り除きます。
/// 失敗することはなく、結果が空文字列になる場合もあります。
///
/// # 使用例
///
/// ```rust
/// use xlsxserve::{clean_column_name, CellValue};
///
/// assert_eq!(clean_column_name(&CellValue::Text("  Name\u{0}\t".to_string())), "Name");
/// assert_eq!(clean_column_name(&CellValue::Integer(2024)), "2024");
/// ```
pub fn clean_column_name(value: &CellValue) -> String {
    let raw = value.as_raw_string();
    let stripped: String = raw.trim().chars().filter(|&c| is_printable(c)).collect();
    stripped.trim().to_string()
}

/// セル値を正規化する
///
/// 判定は以下の優先順位で行われ、最初に一致したものが結果になります。
///
/// 1. 欠損 → `null`
/// 2. 整数 → そのままの整数
/// 3. 浮動小数点数 → NaN / ±Infinity / 絶対値が`1e308`超は`null`、それ以外は小数点以下2桁に丸める
/// 4. 論理値 → そのまま
/// 5. 日時 → `YYYY-MM-DD HH:MM:SS`形式の文字列
/// 6. 文字列・その他 → 前後の空白と印字不可能な文字を除去し、空または
///    `nan` / `none` / `nat` / `na`（大文字小文字を区別しない）なら`null`
///
/// # 丸め規則
///
/// 倍精度値の正確な2進値に対して偶数丸め（round-half-to-even）を適用します。
/// `1.005`の2進値は`1.00499999...`なので`1.0`、`2.345`は`2.34500000...`なので`2.35`、
/// 正確に中間にある`0.125`は`0.12`になります。
///
/// # 使用例
///
/// ```rust
/// use xlsxserve::{normalize_cell, CellValue, NormalizedValue};
///
/// assert_eq!(normalize_cell(&CellValue::Float(2.345)), NormalizedValue::Float(2.35));
/// assert_eq!(normalize_cell(&CellValue::Float(f64::NAN)), NormalizedValue::Null);
/// assert_eq!(normalize_cell(&CellValue::Text(" NaT ".to_string())), NormalizedValue::Null);
/// ```
pub fn normalize_cell(value: &CellValue) -> NormalizedValue {
    match value {
        CellValue::Missing => NormalizedValue::Null,
        CellValue::Integer(i) => NormalizedValue::Integer(*i),
        CellValue::Float(f) => normalize_float(*f),
        CellValue::Boolean(b) => NormalizedValue::Boolean(*b),
        CellValue::Timestamp(ts) => NormalizedValue::Text(ts.format(TIMESTAMP_FORMAT).to_string()),
        CellValue::Text(s) | CellValue::Other(s) => normalize_text(s),
    }
}

/// 浮動小数点数を正規化する
fn normalize_float(value: f64) -> NormalizedValue {
    if !value.is_finite() || value.abs() > MAX_SAFE_MAGNITUDE {
        return NormalizedValue::Null;
    }

    match round_to_cents(value) {
        Some(rounded) => NormalizedValue::Float(rounded),
        None => NormalizedValue::Null,
    }
}

/// 小数点以下2桁に丸める
///
/// `{:.2}`書式は正確な10進展開に基づき、中間値は偶数側に丸められる。
/// `value * 100.0`は乗算自体が誤差を含むため使用しない。
pub(crate) fn round_to_cents(value: f64) -> Option<f64> {
    let rounded: f64 = format!("{:.2}", value).parse().ok()?;
    if !rounded.is_finite() {
        return None;
    }
    // 負のゼロは`-0.0`として直列化されるため正のゼロに揃える
    Some(if rounded == 0.0 { 0.0 } else { rounded })
}

/// 文字列を正規化する
fn normalize_text(value: &str) -> NormalizedValue {
    let cleaned: String = value
        .trim()
        .chars()
        .filter(|&c| is_printable(c) || matches!(c, '\n' | '\r' | '\t'))
        .collect();
    let cleaned = cleaned.trim();

    if cleaned.is_empty()
        || MISSING_TOKENS
            .iter()
            .any(|token| cleaned.eq_ignore_ascii_case(token))
    {
        return NormalizedValue::Null;
    }

    NormalizedValue::Text(cleaned.to_string())
}

/// 文字が印字可能かどうかを判定
///
/// 制御文字（Cc）、書式文字（Cf）、私用領域（Co）、行・段落区切り、
/// およびASCIIスペース以外の空白区切りは印字不可能とみなす。
pub(crate) fn is_printable(c: char) -> bool {
    if c == ' ' {
        return true;
    }
    if c.is_control() || c.is_whitespace() {
        return false;
    }
    !is_format_char(c) && !is_private_use(c)
}

/// Unicode一般カテゴリCf（書式文字）
fn is_format_char(c: char) -> bool {
    matches!(
        c,
        '\u{00AD}'
            | '\u{0600}'..='\u{0605}'
            | '\u{061C}'
            | '\u{06DD}'
            | '\u{070F}'
            | '\u{0890}'..='\u{0891}'
            | '\u{08E2}'
            | '\u{180E}'
            | '\u{200B}'..='\u{200F}'
            | '\u{202A}'..='\u{202E}'
            | '\u{2060}'..='\u{2064}'
            | '\u{2066}'..='\u{206F}'
            | '\u{FEFF}'
            | '\u{FFF9}'..='\u{FFFB}'
            | '\u{110BD}'
            | '\u{110CD}'
            | '\u{13430}'..='\u{1343F}'
            | '\u{1BCA0}'..='\u{1BCA3}'
            | '\u{1D173}'..='\u{1D17A}'
            | '\u{E0001}'
            | '\u{E0020}'..='\u{E007F}'
    )
}

/// Unicode一般カテゴリCo（私用領域）
fn is_private_use(c: char) -> bool {
    matches!(
        c,
        '\u{E000}'..='\u{F8FF}' | '\u{F0000}'..='\u{FFFFD}' | '\u{100000}'..='\u{10FFFD}'
    )
}

/// シート全体を正規化してデータセットを構築する
///
/// 列名は1度だけクリーニングされ、各行は独立に並列で正規化されます。
/// 出力の行順・列順は入力と一致します。
pub fn normalize_sheet(sheet: &RawSheet) -> Dataset {
    let columns: Vec<String> = sheet
        .header
        .iter()
        .enumerate()
        .map(|(index, value)| {
            let name = clean_column_name(value);
            if name.is_empty() {
                format!("Unnamed: {}", index)
            } else {
                name
            }
        })
        .collect();

    let keys = column_keys(&columns);
    let width = columns.len();

    let rows: Vec<Vec<NormalizedValue>> = sheet
        .rows
        .par_iter()
        .map(|row| normalize_row(row, width))
        .collect();

    Dataset {
        sheet: sheet.name.clone(),
        columns,
        keys,
        rows,
    }
}

/// 1行を正規化する（列数に満たないセルは欠損として補う）
fn normalize_row(row: &[CellValue], width: usize) -> Vec<NormalizedValue> {
    (0..width)
        .map(|index| row.get(index).map_or(NormalizedValue::Null, normalize_cell))
        .collect()
}

/// 出力キーのレイアウトを決定する
///
/// 同名の列は最初の出現位置に1つのキーとしてまとめ、値は最後の列から取得する。
fn column_keys(columns: &[String]) -> Vec<ColumnKey> {
    let mut keys: Vec<ColumnKey> = Vec::with_capacity(columns.len());
    for (index, name) in columns.iter().enumerate() {
        match keys.iter_mut().find(|key| &key.name == name) {
            Some(key) => key.source = index,
            None => keys.push(ColumnKey {
                name: name.clone(),
                source: index,
            }),
        }
    }
    keys
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn text(s: &str) -> CellValue {
        CellValue::Text(s.to_string())
    }

    #[test]
    fn test_missing_is_null() {
        assert_eq!(normalize_cell(&CellValue::Missing), NormalizedValue::Null);
    }

    #[test]
    fn test_integer_exactness() {
        assert_eq!(
            normalize_cell(&CellValue::Integer(42)),
            NormalizedValue::Integer(42)
        );
        assert_eq!(
            normalize_cell(&CellValue::Integer(i64::MAX)),
            NormalizedValue::Integer(i64::MAX)
        );
        assert_eq!(
            normalize_cell(&CellValue::Integer(i64::MIN)),
            NormalizedValue::Integer(i64::MIN)
        );

        let json = serde_json::to_string(&normalize_cell(&CellValue::Integer(42))).unwrap();
        assert_eq!(json, "42");
    }

    #[test]
    fn test_float_non_finite_is_null() {
        assert_eq!(normalize_cell(&CellValue::Float(f64::NAN)), NormalizedValue::Null);
        assert_eq!(
            normalize_cell(&CellValue::Float(f64::INFINITY)),
            NormalizedValue::Null
        );
        assert_eq!(
            normalize_cell(&CellValue::Float(f64::NEG_INFINITY)),
            NormalizedValue::Null
        );
    }

    #[test]
    fn test_float_out_of_safe_range_is_null() {
        assert_eq!(normalize_cell(&CellValue::Float(1.5e308)), NormalizedValue::Null);
        assert_eq!(normalize_cell(&CellValue::Float(-1.5e308)), NormalizedValue::Null);
        assert_eq!(
            normalize_cell(&CellValue::Float(1e308)),
            NormalizedValue::Float(1e308)
        );
    }

    #[test]
    fn test_rounding_law() {
        // 正確な2進値に対する偶数丸め
        assert_eq!(normalize_cell(&CellValue::Float(1.005)), NormalizedValue::Float(1.0));
        assert_eq!(normalize_cell(&CellValue::Float(2.345)), NormalizedValue::Float(2.35));
        assert_eq!(normalize_cell(&CellValue::Float(2.675)), NormalizedValue::Float(2.67));
        assert_eq!(
            normalize_cell(&CellValue::Float(-2.345)),
            NormalizedValue::Float(-2.35)
        );
    }

    #[test]
    fn test_rounding_exact_ties_go_to_even() {
        assert_eq!(normalize_cell(&CellValue::Float(0.125)), NormalizedValue::Float(0.12));
        assert_eq!(normalize_cell(&CellValue::Float(0.375)), NormalizedValue::Float(0.38));
        assert_eq!(normalize_cell(&CellValue::Float(0.625)), NormalizedValue::Float(0.62));
    }

    #[test]
    fn test_rounding_negative_zero() {
        match normalize_cell(&CellValue::Float(-0.001)) {
            NormalizedValue::Float(f) => {
                assert_eq!(f, 0.0);
                assert!(f.is_sign_positive());
            }
            other => panic!("Expected Float, got {:?}", other),
        }
    }

    #[test]
    fn test_boolean() {
        assert_eq!(
            normalize_cell(&CellValue::Boolean(true)),
            NormalizedValue::Boolean(true)
        );
        assert_eq!(
            normalize_cell(&CellValue::Boolean(false)),
            NormalizedValue::Boolean(false)
        );
    }

    #[test]
    fn test_timestamp_format() {
        let ts = NaiveDate::from_ymd_opt(2024, 3, 5)
            .unwrap()
            .and_hms_opt(14, 30, 0)
            .unwrap();
        assert_eq!(
            normalize_cell(&CellValue::Timestamp(ts)),
            NormalizedValue::Text("2024-03-05 14:30:00".to_string())
        );
    }

    #[test]
    fn test_missing_token_law() {
        for token in ["", "nan", "NaN", "None", "NaT", "NA", "  na  ", "NONE"] {
            assert_eq!(
                normalize_cell(&text(token)),
                NormalizedValue::Null,
                "token {:?}",
                token
            );
        }
        assert_eq!(
            normalize_cell(&text("nana")),
            NormalizedValue::Text("nana".to_string())
        );
    }

    #[test]
    fn test_text_strips_non_printable() {
        assert_eq!(
            normalize_cell(&text("  Ana\u{0}\u{7}  ")),
            NormalizedValue::Text("Ana".to_string())
        );
        assert_eq!(
            normalize_cell(&text("line1\nline2\r\tend")),
            NormalizedValue::Text("line1\nline2\r\tend".to_string())
        );
        assert_eq!(
            normalize_cell(&text("\u{200B}zero\u{FEFF}width")),
            NormalizedValue::Text("zerowidth".to_string())
        );
        assert_eq!(normalize_cell(&text("\u{0}\u{1}\u{1F}")), NormalizedValue::Null);
        assert_eq!(normalize_cell(&text("\u{0} nan")), NormalizedValue::Null);
    }

    #[test]
    fn test_text_keeps_unicode() {
        assert_eq!(
            normalize_cell(&text("東京 🚀")),
            NormalizedValue::Text("東京 🚀".to_string())
        );
    }

    #[test]
    fn test_other_is_stringified() {
        assert_eq!(
            normalize_cell(&CellValue::Other("#DIV/0!".to_string())),
            NormalizedValue::Text("#DIV/0!".to_string())
        );
    }

    #[test]
    fn test_clean_column_name() {
        assert_eq!(clean_column_name(&text("  Score ")), "Score");
        assert_eq!(clean_column_name(&text("\u{0}ID\u{1B}")), "ID");
        assert_eq!(clean_column_name(&text("a\tb")), "ab");
        assert_eq!(clean_column_name(&CellValue::Integer(7)), "7");
        assert_eq!(clean_column_name(&CellValue::Float(1.5)), "1.5");
        assert_eq!(clean_column_name(&CellValue::Missing), "");
    }

    #[test]
    fn test_normalize_sheet_order_and_unnamed() {
        let sheet = RawSheet {
            name: "Sheet1".to_string(),
            header: vec![text("ID"), CellValue::Missing, text(" Score ")],
            rows: vec![
                vec![CellValue::Integer(1), text("x"), CellValue::Float(f64::NAN)],
                vec![CellValue::Integer(2), text("y"), CellValue::Float(9.999)],
                vec![CellValue::Integer(3)],
            ],
        };

        let dataset = normalize_sheet(&sheet);
        assert_eq!(dataset.sheet(), "Sheet1");
        assert_eq!(dataset.columns(), ["ID", "Unnamed: 1", "Score"]);
        assert_eq!(dataset.len(), 3);
        assert_eq!(dataset.get(0, "Score"), Some(&NormalizedValue::Null));
        assert_eq!(dataset.get(1, "Score"), Some(&NormalizedValue::Float(10.0)));
        assert_eq!(dataset.get(2, "ID"), Some(&NormalizedValue::Integer(3)));
        assert_eq!(dataset.get(2, "Unnamed: 1"), Some(&NormalizedValue::Null));
    }

    #[test]
    fn test_normalize_sheet_duplicate_names_overwrite() {
        let sheet = RawSheet {
            name: "Sheet1".to_string(),
            header: vec![text("Name"), text("Other"), text(" Name\u{0}")],
            rows: vec![vec![text("first"), text("o"), text("last")]],
        };

        let dataset = normalize_sheet(&sheet);
        assert_eq!(dataset.columns(), ["Name", "Other", "Name"]);

        let json = serde_json::to_string(&dataset.records()).unwrap();
        assert_eq!(json, r#"[{"Name":"last","Other":"o"}]"#);
    }

    #[test]
    fn test_normalize_sheet_empty() {
        let sheet = RawSheet {
            name: "Empty".to_string(),
            header: vec![],
            rows: vec![],
        };
        let dataset = normalize_sheet(&sheet);
        assert!(dataset.is_empty());
        assert!(dataset.columns().is_empty());
    }

    // プロパティベーステスト
    #[allow(unused_doc_comments)]
    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        fn assert_json_safe(value: &NormalizedValue) -> Result<(), TestCaseError> {
            match value {
                NormalizedValue::Float(f) => {
                    prop_assert!(f.is_finite());
                    prop_assert!(f.abs() <= MAX_SAFE_MAGNITUDE);
                }
                NormalizedValue::Text(s) => {
                    prop_assert!(!s.is_empty());
                    prop_assert!(s
                        .chars()
                        .all(|c| is_printable(c) || matches!(c, '\n' | '\r' | '\t')));
                }
                _ => {}
            }
            Ok(())
        }

        proptest! {
            /// 任意のビット列から作った浮動小数点数でもパニックせず、有限値のみを返す
            #[test]
            fn test_float_totality(bits in any::<u64>()) {
                let value = normalize_cell(&CellValue::Float(f64::from_bits(bits)));
                assert_json_safe(&value)?;
                prop_assert!(serde_json::to_string(&value).is_ok());
            }

            /// 任意の文字列（制御文字を含む）でもパニックせず、印字可能な文字列か`null`を返す
            #[test]
            fn test_text_totality(s in "\\PC*|[\\x00-\\x1F\\x7F\\u{200B}\\u{FEFF} a-z]*") {
                let value = normalize_cell(&CellValue::Text(s));
                assert_json_safe(&value)?;
            }

            /// 正規化は冪等である
            #[test]
            fn test_idempotence(
                f in -1e12f64..1e12,
                i in any::<i64>(),
                b in any::<bool>(),
                s in "\\PC{0,24}",
            ) {
                for cell in [
                    CellValue::Float(f),
                    CellValue::Integer(i),
                    CellValue::Boolean(b),
                    CellValue::Text(s.clone()),
                    CellValue::Missing,
                ] {
                    let once = normalize_cell(&cell);
                    let twice = normalize_cell(&CellValue::from(once.clone()));
                    prop_assert_eq!(once, twice);
                }
            }

            /// 行数と行順は保存される
            #[test]
            fn test_order_preservation(values in proptest::collection::vec(any::<i64>(), 0..64)) {
                let sheet = RawSheet {
                    name: "Sheet1".to_string(),
                    header: vec![CellValue::Text("v".to_string())],
                    rows: values.iter().map(|v| vec![CellValue::Integer(*v)]).collect(),
                };
                let dataset = normalize_sheet(&sheet);
                prop_assert_eq!(dataset.len(), values.len());
                for (index, v) in values.iter().enumerate() {
                    prop_assert_eq!(dataset.get(index, "v"), Some(&NormalizedValue::Integer(*v)));
                }
            }
        }
    }
}
