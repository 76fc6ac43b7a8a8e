//! xlsxserve - Serve spreadsheet workbooks as JSON-safe records over HTTP
//!
//! This crate reads a worksheet with calamine, normalizes every cell into a
//! JSON-representable value, and serves the result through a small HTTP/1.1 API.
//!
//! Normalization is total: every input value maps to `null`, an integer, a finite
//! float rounded to two decimal places, a boolean, or printable text. Serialization
//! can therefore never fail because of spreadsheet contents.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use xlsxserve::{ApiServer, ServiceBuilder};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // data.xlsx on 0.0.0.0:$PORT (5000 if unset)
//!     let service = ServiceBuilder::from_env()?.build()?;
//!
//!     let server = ApiServer::bind(service).await?;
//!     server.run().await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! # Endpoints
//!
//! | Path                | Response                                              |
//! | ------------------- | ----------------------------------------------------- |
//! | `GET /`             | `{"message": "API is running", "status": "ok"}`       |
//! | `GET /sheets`       | `{"success": true, "sheets": [..]}`                   |
//! | `GET /data?sheet=X` | `{"success": true, "rows": N, "data": [{..}, ..]}`    |
//!
//! Failures are reported as `{"success": false, "error": ".."}`.
//!
//! # Library Use
//!
//! ```rust,no_run
//! use xlsxserve::{Envelope, ServiceBuilder, SheetSelector};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let service = ServiceBuilder::new().with_workbook_path("report.xlsx").build()?;
//!
//! let dataset = service.dataset(&SheetSelector::First)?;
//! let json = service.render(&Envelope::Data(&dataset))?;
//! println!("{}", String::from_utf8_lossy(&json));
//! # Ok(())
//! # }
//! ```
//!
//! # Normalizing Single Values
//!
//! ```rust
//! use xlsxserve::{normalize_cell, CellValue, NormalizedValue};
//!
//! assert_eq!(normalize_cell(&CellValue::Float(2.345)), NormalizedValue::Float(2.35));
//! assert_eq!(normalize_cell(&CellValue::Float(f64::NAN)), NormalizedValue::Null);
//! assert_eq!(
//!     normalize_cell(&CellValue::Text("  none\u{0} ".to_string())),
//!     NormalizedValue::Null
//! );
//! ```

mod api;
mod builder;
mod error;
mod normalize;
mod output;
mod parser;
mod security;
mod server;
mod types;

// 公開API
pub use api::{JsonEncoding, SheetSelector};
pub use builder::{
    ServiceBuilder, ServiceConfig, SheetService, DEFAULT_PORT, DEFAULT_WORKBOOK_PATH,
    PORT_ENV_VAR,
};
pub use error::XlsxServeError;
pub use normalize::{clean_column_name, normalize_cell, normalize_sheet};
pub use output::{render, AsciiFormatter, Envelope};
pub use security::SecurityConfig;
pub use server::ApiServer;
pub use types::{CellValue, Dataset, NormalizedValue, RawSheet};
