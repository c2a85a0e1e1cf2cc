//! Spreadsheet ingestion with column type inference and a row filter engine.

pub mod config;
pub mod data;
pub mod session;

pub use config::IngestConfig;
pub use data::error::{IngestError, Result};
pub use data::filter::{FilterConfig, FilterEngine};
pub use data::lint::validate_data;
pub use data::model::{CellValue, ColumnInfo, ColumnType, ExcelData};
pub use data::pipeline::{ParseOptions, parse_bytes, parse_file, parse_path};
pub use session::Session;
