use std::fs::File;
use std::io::{BufReader, Cursor, Read};
use std::path::Path;

use log::{info, warn};

use super::error::{DecodeError, FileReadError, Result};
use super::inference::AnalysisOptions;
use super::ingest::{CancelToken, FileHandle, read_file, validate_file};
use super::loader::FormatDecoder;
use super::model::{ExcelData, ExcelMetadata};
use super::progress::{NoProgress, ProgressEvent, ProgressSink, ProgressStage};
use super::scheduler::{ChunkScheduler, ProcessedSheet};
use super::workbook::decode_workbook;
use crate::config::IngestConfig;

/// Per-call parse options.
#[derive(Default)]
pub struct ParseOptions<'a> {
    pub progress: Option<&'a dyn ProgressSink>,
    pub analysis: AnalysisOptions,
    /// Sheet to analyze; the first sheet when absent or not found.
    pub sheet_name: Option<String>,
}

impl<'a> ParseOptions<'a> {
    pub fn with_progress(mut self, progress: &'a dyn ProgressSink) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn with_sheet(mut self, name: impl Into<String>) -> Self {
        self.sheet_name = Some(name.into());
        self
    }
}

/// Validate, read, decode and analyze one file.
pub fn parse_file<R: Read>(
    handle: &FileHandle,
    reader: R,
    cancel: &CancelToken,
    options: &ParseOptions<'_>,
    config: &IngestConfig,
) -> Result<ExcelData> {
    let progress: &dyn ProgressSink = options.progress.unwrap_or(&NoProgress);

    progress.report(ProgressEvent::stage(ProgressStage::Validating));
    for warning in validate_file(handle, config).into_result()? {
        warn!("{}: {warning}", handle.name);
    }

    let bytes = read_file(handle, reader, cancel, progress, config)?;

    let decoder = FormatDecoder::for_file_name(&handle.name).ok_or_else(|| DecodeError {
        format: handle.extension(),
        message: "no decoder for this file type".to_string(),
    })?;
    let sheet = decode_workbook(&decoder, &bytes, options.sheet_name.as_deref(), progress)?;
    drop(bytes);

    let ProcessedSheet {
        headers,
        rows,
        columns,
    } = ChunkScheduler::new(config).process(sheet.matrix, &options.analysis, progress)?;

    let data = ExcelData {
        metadata: ExcelMetadata {
            file_name: handle.name.clone(),
            sheet_names: sheet.sheet_names,
            active_sheet: sheet.active_sheet,
            total_rows: rows.len(),
            total_columns: headers.len(),
            columns,
            file_size: handle.size,
        },
        headers,
        rows,
    };

    progress.report(ProgressEvent::stage(ProgressStage::Complete));
    info!(
        "parsed '{}' sheet '{}': {} rows x {} columns",
        data.metadata.file_name,
        data.metadata.active_sheet,
        data.metadata.total_rows,
        data.metadata.total_columns
    );
    Ok(data)
}

/// Parse an in-memory file. `name` picks the format by its extension.
pub fn parse_bytes(
    name: &str,
    bytes: &[u8],
    options: &ParseOptions<'_>,
    config: &IngestConfig,
) -> Result<ExcelData> {
    let handle = FileHandle::new(name, bytes.len() as u64);
    parse_file(&handle, Cursor::new(bytes), &CancelToken::new(), options, config)
}

/// Parse a file on disk.
pub fn parse_path(
    path: &Path,
    options: &ParseOptions<'_>,
    config: &IngestConfig,
) -> Result<ExcelData> {
    let handle = FileHandle::from_path(path).map_err(FileReadError::Io)?;
    let file = File::open(path).map_err(FileReadError::Io)?;
    parse_file(&handle, BufReader::new(file), &CancelToken::new(), options, config)
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::io::Write;

    use super::*;
    use crate::data::error::IngestError;
    use crate::data::model::{CellValue, ColumnType};

    const CSV: &str = "name,amount,joined\nAda,10,2024-01-05\nBob,20.5,2024-02-10\n,,\n";

    fn parse(name: &str, bytes: &[u8], options: &ParseOptions<'_>) -> Result<ExcelData> {
        parse_bytes(name, bytes, options, &IngestConfig::default())
    }

    #[test]
    fn csv_bytes_to_excel_data() {
        let data = parse("people.csv", CSV.as_bytes(), &ParseOptions::default()).unwrap();
        assert_eq!(data.headers, vec!["name", "amount", "joined"]);
        assert_eq!(data.len(), 2);
        assert_eq!(data.metadata.active_sheet, "Sheet1");
        assert_eq!(data.metadata.file_size, CSV.len() as u64);
        assert_eq!(data.column("amount").unwrap().column_type, ColumnType::Number);
        assert_eq!(data.column("joined").unwrap().column_type, ColumnType::Date);
        assert_eq!(data.rows[1][0], CellValue::from("Bob"));
    }

    #[test]
    fn progress_ends_with_complete() {
        let stages = RefCell::new(Vec::new());
        let sink = |e: ProgressEvent| stages.borrow_mut().push(e.stage);
        let options = ParseOptions::default().with_progress(&sink);
        parse_bytes("people.csv", CSV.as_bytes(), &options, &IngestConfig::default()).unwrap();

        let stages = stages.into_inner();
        assert_eq!(stages.first(), Some(&ProgressStage::Validating));
        assert_eq!(stages.last(), Some(&ProgressStage::Complete));
        assert!(stages.contains(&ProgressStage::ParsingWorkbook));
        assert!(stages.contains(&ProgressStage::AnalyzingColumns));
    }

    #[test]
    fn validating_is_reported_even_for_rejected_files() {
        let stages = RefCell::new(Vec::new());
        let sink = |e: ProgressEvent| stages.borrow_mut().push(e.stage);
        let options = ParseOptions::default().with_progress(&sink);
        assert!(parse_bytes("empty.csv", b"", &options, &IngestConfig::default()).is_err());
        assert_eq!(stages.into_inner(), vec![ProgressStage::Validating]);
    }

    #[test]
    fn rejected_files_never_reach_the_decoder() {
        let err = parse("notes.docx", b"hello", &ParseOptions::default()).unwrap_err();
        assert!(matches!(err, IngestError::Validation(_)));

        let err = parse("empty.csv", b"", &ParseOptions::default()).unwrap_err();
        assert!(matches!(err, IngestError::Validation(_)));
    }

    #[test]
    fn cancelled_read_is_aborted() {
        let handle = FileHandle::new("people.csv", CSV.len() as u64);
        let cancel = CancelToken::new();
        cancel.cancel();
        let err = parse_file(
            &handle,
            CSV.as_bytes(),
            &cancel,
            &ParseOptions::default(),
            &IngestConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, IngestError::FileRead(ref e) if e.is_aborted()));
    }

    #[test]
    fn malformed_json_is_a_decode_error() {
        let err = parse("broken.json", b"{not json", &ParseOptions::default()).unwrap_err();
        assert!(matches!(err, IngestError::Decode(_)));
    }

    #[test]
    fn parse_path_reads_from_disk() {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        file.write_all(CSV.as_bytes()).unwrap();
        let data =
            parse_path(file.path(), &ParseOptions::default(), &IngestConfig::default()).unwrap();
        assert_eq!(data.len(), 2);
        assert!(data.metadata.file_name.ends_with(".csv"));
    }

    #[test]
    fn missing_sheet_falls_back_to_first() {
        let json = r#"{"Second": [["b"], [2]], "First": [["a"], [1]]}"#;
        let options = ParseOptions::default().with_sheet("First");
        let data = parse("book.json", json.as_bytes(), &options).unwrap();
        assert_eq!(data.metadata.active_sheet, "First");
        assert_eq!(data.headers, vec!["a"]);

        let options = ParseOptions::default().with_sheet("Nope");
        let data = parse("book.json", json.as_bytes(), &options).unwrap();
        assert_eq!(data.metadata.sheet_names, vec!["Second", "First"]);
        assert_eq!(data.metadata.active_sheet, "Second");
        assert_eq!(data.headers, vec!["b"]);
    }
}
