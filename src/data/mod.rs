/// Data layer: ingestion, type inference, chunked processing and filtering.
///
/// Architecture:
/// ```text
///  .xlsx / .ods / .csv / .json / .parquet
///        │
///        ▼
///   ┌──────────┐
///   │  ingest   │  validate handle, read bytes in blocks (cancellable)
///   └──────────┘
///        │
///        ▼
///   ┌──────────────────┐
///   │ workbook / loader │  decode → sheets, pick the active one
///   └──────────────────┘
///        │
///        ▼
///   ┌───────────┐
///   │ scheduler  │  headers, tail trim, chunked rows (main thread or worker)
///   └───────────┘     └── inference: per-column type, nulls, uniques, stats
///        │
///        ▼
///   ┌───────────┐
///   │ ExcelData  │  headers, rows, metadata
///   └───────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  filter   │  AND of active filters → matching rows
///   └──────────┘
/// ```
///
/// `pipeline` wires the stages together; `lint` reports advisory findings on
/// the result.

pub mod error;
pub mod filter;
pub mod inference;
pub mod ingest;
pub mod lint;
pub mod loader;
pub mod model;
pub mod pipeline;
pub mod progress;
pub mod scheduler;
pub mod workbook;
