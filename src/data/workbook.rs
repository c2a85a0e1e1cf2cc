use log::{debug, warn};

use super::error::DecodeError;
use super::loader::{DecodedWorkbook, SpreadsheetDecoder};
use super::model::{CellValue, DataMatrix};
use super::progress::{ProgressEvent, ProgressSink, ProgressStage};

/// The sheet chosen for analysis, still as raw cells (header row included).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectedSheet {
    pub sheet_names: Vec<String>,
    /// Empty when the workbook had no sheets.
    pub active_sheet: String,
    pub matrix: DataMatrix,
}

/// Decode `bytes` and pick the requested sheet.
pub fn decode_workbook<D: SpreadsheetDecoder + ?Sized>(
    decoder: &D,
    bytes: &[u8],
    sheet_name: Option<&str>,
    progress: &dyn ProgressSink,
) -> Result<SelectedSheet, DecodeError> {
    progress.report(ProgressEvent::stage(ProgressStage::ParsingWorkbook));
    let workbook = decoder.decode(bytes)?;
    debug!(
        "decoded {} workbook with sheets {:?}",
        decoder.format(),
        workbook.sheet_names
    );
    Ok(select_sheet(decoder, workbook, sheet_name))
}

/// Requested sheet if it exists, otherwise the first one. A workbook with
/// no sheets yields an empty selection rather than an error.
pub fn select_sheet<D: SpreadsheetDecoder + ?Sized>(
    decoder: &D,
    workbook: DecodedWorkbook,
    requested: Option<&str>,
) -> SelectedSheet {
    let DecodedWorkbook {
        sheet_names,
        mut sheets,
    } = workbook;

    if sheets.is_empty() {
        return SelectedSheet {
            sheet_names,
            ..SelectedSheet::default()
        };
    }

    let position = match requested {
        Some(name) => sheets.iter().position(|s| s.name == name).unwrap_or_else(|| {
            warn!("sheet '{name}' not found, using '{}'", sheets[0].name);
            0
        }),
        None => 0,
    };
    let sheet = sheets.swap_remove(position);

    SelectedSheet {
        sheet_names,
        active_sheet: sheet.name.clone(),
        matrix: decoder.sheet_to_matrix(sheet),
    }
}

/// Header text for the first row: trimmed, with blanks replaced by
/// `Column {n}` (1-based).
pub fn extract_headers(first_row: &[CellValue]) -> Vec<String> {
    first_row
        .iter()
        .enumerate()
        .map(|(i, cell)| {
            let text = cell.to_string();
            let trimmed = text.trim();
            if trimmed.is_empty() {
                synthesized_header(i)
            } else {
                trimmed.to_string()
            }
        })
        .collect()
}

pub fn synthesized_header(index: usize) -> String {
    format!("Column {}", index + 1)
}

pub fn is_empty_row(row: &[CellValue]) -> bool {
    row.iter().all(CellValue::is_blank)
}

/// Drop rows that are entirely blank from the end only; interior blank
/// rows stay. Returns how many were removed.
pub fn trim_trailing_empty_rows(rows: &mut DataMatrix) -> usize {
    let keep = rows
        .iter()
        .rposition(|row| !is_empty_row(row))
        .map_or(0, |last| last + 1);
    let removed = rows.len() - keep;
    rows.truncate(keep);
    removed
}
