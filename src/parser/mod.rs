//! Parser Module
//!
//! ワークブックの読み込みを担当するモジュール。

mod workbook;

pub(crate) use workbook::WorkbookReader;
