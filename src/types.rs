//! Types Module
//!
//! クレート全体で使用する共通データ型を定義するモジュール。

use chrono::NaiveDateTime;
use serde::ser::{Error as _, SerializeMap};
use serde::{Serialize, Serializer};

/// ワークシートから読み込んだセルの値
///
/// リーダーが宣言した型をそのまま保持する直和型です。
/// 正規化処理はこの列挙型に対する網羅的なパターンマッチで行われます。
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    /// 空セル、またはリーダーのNA番兵
    Missing,

    /// 整数
    Integer(i64),

    /// 浮動小数点数（NaN / ±Infinityを含み得る）
    Float(f64),

    /// 論理値
    Boolean(bool),

    /// 日時（タイムゾーンなし）
    Timestamp(NaiveDateTime),

    /// 文字列
    Text(String),

    /// リーダーが分類できなかった値（例: `#DIV/0!`）
    Other(String),
}

impl CellValue {
    /// 値が欠損かどうかを判定
    pub fn is_missing(&self) -> bool {
        matches!(self, CellValue::Missing)
    }

    /// 値を文字列として取得（正規化前）
    ///
    /// 浮動小数点数は最短の往復可能表現、日時は`YYYY-MM-DD HH:MM:SS`形式になります。
    pub fn as_raw_string(&self) -> String {
        match self {
            CellValue::Missing => String::new(),
            CellValue::Integer(i) => i.to_string(),
            CellValue::Float(f) => f.to_string(),
            CellValue::Boolean(b) => b.to_string(),
            CellValue::Timestamp(ts) => ts.format(TIMESTAMP_FORMAT).to_string(),
            CellValue::Text(s) | CellValue::Other(s) => s.clone(),
        }
    }
}

/// 日時の出力形式
pub(crate) const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// 正規化済みの値
///
/// JSONとして安全に直列化できる値のみを表します。
/// `Float`は常に有限値でなければならず、非有限値は直列化時にエラーとなります。
#[derive(Debug, Clone, PartialEq)]
pub enum NormalizedValue {
    /// JSONの`null`
    Null,

    /// 符号付き整数
    Integer(i64),

    /// 小数点以下2桁に丸められた有限の倍精度浮動小数点数
    Float(f64),

    /// 論理値
    Boolean(bool),

    /// 印字可能文字のみからなる文字列
    Text(String),
}

impl NormalizedValue {
    /// 値が`null`かどうかを判定
    pub fn is_null(&self) -> bool {
        matches!(self, NormalizedValue::Null)
    }
}

impl From<NormalizedValue> for CellValue {
    /// 正規化済みの値を再びセルとして扱う（冪等性の検証に使用）
    fn from(value: NormalizedValue) -> Self {
        match value {
            NormalizedValue::Null => CellValue::Missing,
            NormalizedValue::Integer(i) => CellValue::Integer(i),
            NormalizedValue::Float(f) => CellValue::Float(f),
            NormalizedValue::Boolean(b) => CellValue::Boolean(b),
            NormalizedValue::Text(s) => CellValue::Text(s),
        }
    }
}

impl Serialize for NormalizedValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            NormalizedValue::Null => serializer.serialize_unit(),
            NormalizedValue::Integer(i) => serializer.serialize_i64(*i),
            NormalizedValue::Float(f) if f.is_finite() => serializer.serialize_f64(*f),
            // serde_jsonは非有限値を黙って`null`にするため、ここで拒否する
            NormalizedValue::Float(f) => Err(S::Error::custom(format!(
                "non-finite float cannot be represented in JSON: {}",
                f
            ))),
            NormalizedValue::Boolean(b) => serializer.serialize_bool(*b),
            NormalizedValue::Text(s) => serializer.serialize_str(s),
        }
    }
}

/// リーダーから取得した1シート分の生データ
#[derive(Debug, Clone, PartialEq)]
pub struct RawSheet {
    /// シート名
    pub name: String,

    /// ヘッダー行（使用範囲の先頭行）
    pub header: Vec<CellValue>,

    /// データ行（ワークシートの順序）
    pub rows: Vec<Vec<CellValue>>,
}

/// 出力オブジェクトのキー
///
/// 同名の列が複数ある場合、キーは最初の出現位置に1度だけ現れ、
/// 値は最後の列から取得されます。
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ColumnKey {
    /// クリーニング済みの列名
    pub name: String,

    /// 値を取得する列インデックス
    pub source: usize,
}

/// 1リクエスト分の正規化済みデータセット
///
/// リクエストごとに構築され、レスポンス送信後に破棄されます。
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    /// シート名
    pub(crate) sheet: String,

    /// クリーニング済みの列名（ワークシートの列順、重複を含む）
    pub(crate) columns: Vec<String>,

    /// 出力キーのレイアウト
    pub(crate) keys: Vec<ColumnKey>,

    /// 正規化済みの行
    pub(crate) rows: Vec<Vec<NormalizedValue>>,
}

impl Dataset {
    /// シート名
    pub fn sheet(&self) -> &str {
        &self.sheet
    }

    /// クリーニング済みの列名（重複を含む）
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// 行数
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// 行が存在しないかどうか
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// 指定行の値を出力キー名で取得
    pub fn get(&self, row: usize, column: &str) -> Option<&NormalizedValue> {
        let key = self.keys.iter().find(|key| key.name == column)?;
        self.rows.get(row)?.get(key.source)
    }

    /// 行をJSONオブジェクトとして直列化するためのビュー
    pub(crate) fn records(&self) -> Records<'_> {
        Records { dataset: self }
    }
}

/// `Dataset`の行配列を直列化するビュー
pub(crate) struct Records<'a> {
    dataset: &'a Dataset,
}

impl Serialize for Records<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.dataset.rows.iter().map(|row| Record {
            keys: &self.dataset.keys,
            row,
        }))
    }
}

/// 1行分のJSONオブジェクト
struct Record<'a> {
    keys: &'a [ColumnKey],
    row: &'a [NormalizedValue],
}

impl Serialize for Record<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.keys.len()))?;
        for key in self.keys {
            let value = self.row.get(key.source).unwrap_or(&NormalizedValue::Null);
            map.serialize_entry(&key.name, value)?;
        }
        map.end()
    }
}
