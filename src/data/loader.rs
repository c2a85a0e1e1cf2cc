use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use arrow::array::{Array, AsArray};
use arrow::datatypes::{
    DataType, Date32Type, Date64Type, Float32Type, Float64Type, Int8Type, Int16Type, Int32Type,
    Int64Type, TimeUnit, TimestampMicrosecondType, TimestampMillisecondType,
    TimestampNanosecondType, TimestampSecondType, UInt8Type, UInt16Type, UInt32Type, UInt64Type,
};
use calamine::{Data, Reader};
use csv::ReaderBuilder;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde_json::Value as JsonValue;

use super::error::DecodeError;
use super::model::{CellValue, DataMatrix, Row, parse_date};

// ---------------------------------------------------------------------------
// Decoder boundary
// ---------------------------------------------------------------------------

/// One decoded sheet, cells exactly as the format produced them.
#[derive(Debug, Clone, PartialEq)]
pub struct RawSheet {
    pub name: String,
    pub cells: DataMatrix,
}

/// Every sheet in a file, in workbook order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecodedWorkbook {
    pub sheet_names: Vec<String>,
    pub sheets: Vec<RawSheet>,
}

impl DecodedWorkbook {
    fn single(name: &str, cells: DataMatrix) -> Self {
        DecodedWorkbook {
            sheet_names: vec![name.to_string()],
            sheets: vec![RawSheet {
                name: name.to_string(),
                cells,
            }],
        }
    }
}

/// Turns file bytes into sheets of raw cells.
pub trait SpreadsheetDecoder {
    /// Short format label used in errors and logs.
    fn format(&self) -> &str;

    fn decode(&self, bytes: &[u8]) -> Result<DecodedWorkbook, DecodeError>;

    fn sheet_to_matrix(&self, sheet: RawSheet) -> DataMatrix {
        sheet.cells
    }
}

/// The bundled decoders, picked by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatDecoder {
    /// Comma/semicolon/tab/pipe separated text; delimiter is sniffed.
    Csv,
    /// `[{...}, ...]`, `[[...], ...]` or `{"Sheet": [...], ...}`.
    Json,
    Parquet,
    /// xlsx / xlsm / xls / xlsb / ods.
    Spreadsheet,
}

impl FormatDecoder {
    /// Dispatch by extension.
    pub fn for_file_name(name: &str) -> Option<Self> {
        let ext = Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();

        match ext.as_str() {
            "csv" => Some(FormatDecoder::Csv),
            "json" => Some(FormatDecoder::Json),
            "parquet" | "pq" => Some(FormatDecoder::Parquet),
            "xlsx" | "xlsm" | "xls" | "xlsb" | "ods" => Some(FormatDecoder::Spreadsheet),
            _ => None,
        }
    }
}

impl SpreadsheetDecoder for FormatDecoder {
    fn format(&self) -> &str {
        match self {
            FormatDecoder::Csv => "csv",
            FormatDecoder::Json => "json",
            FormatDecoder::Parquet => "parquet",
            FormatDecoder::Spreadsheet => "spreadsheet",
        }
    }

    fn decode(&self, bytes: &[u8]) -> Result<DecodedWorkbook, DecodeError> {
        let decoded = match self {
            FormatDecoder::Csv => decode_csv(bytes),
            FormatDecoder::Json => decode_json(bytes),
            FormatDecoder::Parquet => decode_parquet(bytes),
            FormatDecoder::Spreadsheet => decode_spreadsheet(bytes),
        };
        decoded.map_err(|e| DecodeError::from_anyhow(self.format(), &e))
    }
}

// ---------------------------------------------------------------------------
// CSV decoder
// ---------------------------------------------------------------------------

/// Pick the delimiter whose per-line count is most frequent and most
/// consistent across the first lines.
pub fn detect_delimiter(content: &str) -> u8 {
    let candidates = [b',', b';', b'\t', b'|'];
    let sample: Vec<&str> = content.lines().filter(|l| !l.is_empty()).take(10).collect();
    if sample.is_empty() {
        return b',';
    }

    let mut best = b',';
    let mut best_score = 0.0f64;
    for &delimiter in &candidates {
        let counts: Vec<f64> = sample
            .iter()
            .map(|line| line.bytes().filter(|&b| b == delimiter).count() as f64)
            .collect();
        let avg = counts.iter().sum::<f64>() / counts.len() as f64;
        let variance = counts.iter().map(|c| (c - avg).powi(2)).sum::<f64>() / counts.len() as f64;
        let score = avg / (1.0 + variance.sqrt());
        if score > best_score {
            best_score = score;
            best = delimiter;
        }
    }
    best
}

/// Every record becomes a row of strings; the header row is row 0.
///
/// The csv reader drops lines with no content at all, so a bare blank line
/// inside the data never becomes a row. Lines made only of delimiters
/// (`,,`) are kept as empty rows.
fn decode_csv(bytes: &[u8]) -> Result<DecodedWorkbook> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    let text = String::from_utf8_lossy(bytes);
    let delimiter = detect_delimiter(&text);

    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter)
        .from_reader(text.as_bytes());

    let mut cells = Vec::new();
    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("CSV row {}", row_no + 1))?;
        cells.push(record.iter().map(CellValue::from).collect::<Row>());
    }

    Ok(DecodedWorkbook::single("Sheet1", cells))
}

// ---------------------------------------------------------------------------
// JSON decoder
// ---------------------------------------------------------------------------

/// Accepted shapes:
///
/// ```json
/// [{ "name": "A", "qty": 3 }, ...]            records; keys become headers
/// [["name", "qty"], ["A", 3], ...]            raw matrix
/// { "Orders": [...], "Returns": [...] }       one sheet per key
/// ```
fn decode_json(bytes: &[u8]) -> Result<DecodedWorkbook> {
    let root: JsonValue = serde_json::from_slice(bytes).context("parsing JSON")?;

    match root {
        JsonValue::Array(records) => Ok(DecodedWorkbook::single(
            "Sheet1",
            json_sheet(&records, "Sheet1")?,
        )),
        JsonValue::Object(map) => {
            let mut workbook = DecodedWorkbook::default();
            for (name, value) in &map {
                let records = value
                    .as_array()
                    .with_context(|| format!("sheet '{name}' is not a JSON array"))?;
                workbook.sheet_names.push(name.clone());
                workbook.sheets.push(RawSheet {
                    name: name.clone(),
                    cells: json_sheet(records, name)?,
                });
            }
            Ok(workbook)
        }
        _ => bail!("Expected a top-level JSON array or object of arrays"),
    }
}

fn json_sheet(records: &[JsonValue], sheet: &str) -> Result<DataMatrix> {
    let Some(first) = records.first() else {
        return Ok(Vec::new());
    };

    if first.is_array() {
        return records
            .iter()
            .enumerate()
            .map(|(i, rec)| {
                let arr = rec
                    .as_array()
                    .with_context(|| format!("{sheet} row {i} is not a JSON array"))?;
                Ok(arr.iter().map(json_to_cell).collect())
            })
            .collect();
    }

    // Records: header row is the union of keys in first-seen order.
    let mut headers: Vec<String> = Vec::new();
    for (i, rec) in records.iter().enumerate() {
        let obj = rec
            .as_object()
            .with_context(|| format!("{sheet} row {i} is not a JSON object"))?;
        for key in obj.keys() {
            if !headers.contains(key) {
                headers.push(key.clone());
            }
        }
    }

    let mut cells = Vec::with_capacity(records.len() + 1);
    cells.push(headers.iter().map(|h| CellValue::from(h.as_str())).collect());
    for rec in records {
        let obj = rec.as_object();
        cells.push(
            headers
                .iter()
                .map(|h| obj.and_then(|o| o.get(h)).map_or(CellValue::Null, json_to_cell))
                .collect(),
        );
    }
    Ok(cells)
}

fn json_to_cell(val: &JsonValue) -> CellValue {
    match val {
        JsonValue::String(s) => CellValue::String(s.clone()),
        JsonValue::Number(n) => n
            .as_f64()
            .map_or_else(|| CellValue::String(n.to_string()), CellValue::Number),
        JsonValue::Bool(b) => CellValue::Bool(*b),
        JsonValue::Null => CellValue::Null,
        other => CellValue::String(other.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Parquet decoder
// ---------------------------------------------------------------------------

/// Column names form the header row; every record batch appends data rows.
///
/// Works with files written by both **Pandas** (`df.to_parquet()`) and
/// **Polars** (`df.write_parquet()`).
fn decode_parquet(bytes: &[u8]) -> Result<DecodedWorkbook> {
    let data = bytes::Bytes::copy_from_slice(bytes);
    let builder =
        ParquetRecordBatchReaderBuilder::try_new(data).context("reading parquet metadata")?;
    let headers: Row = builder
        .schema()
        .fields()
        .iter()
        .map(|f| CellValue::from(f.name().as_str()))
        .collect();
    let reader = builder.build().context("building parquet reader")?;

    let mut cells = vec![headers];
    for batch_result in reader {
        let batch = batch_result.context("reading parquet record batch")?;
        for row in 0..batch.num_rows() {
            cells.push(
                batch
                    .columns()
                    .iter()
                    .map(|col| arrow_cell(col, row))
                    .collect(),
            );
        }
    }

    Ok(DecodedWorkbook::single("Sheet1", cells))
}

/// Extract a single cell from an Arrow column at a given row.
fn arrow_cell(col: &Arc<dyn Array>, row: usize) -> CellValue {
    if col.is_null(row) {
        return CellValue::Null;
    }
    match col.data_type() {
        DataType::Utf8 => CellValue::String(col.as_string::<i32>().value(row).to_string()),
        DataType::LargeUtf8 => CellValue::String(col.as_string::<i64>().value(row).to_string()),
        DataType::Boolean => CellValue::Bool(col.as_boolean().value(row)),
        DataType::Int8 => CellValue::Number(col.as_primitive::<Int8Type>().value(row) as f64),
        DataType::Int16 => CellValue::Number(col.as_primitive::<Int16Type>().value(row) as f64),
        DataType::Int32 => CellValue::Number(col.as_primitive::<Int32Type>().value(row) as f64),
        DataType::Int64 => CellValue::Number(col.as_primitive::<Int64Type>().value(row) as f64),
        DataType::UInt8 => CellValue::Number(col.as_primitive::<UInt8Type>().value(row) as f64),
        DataType::UInt16 => CellValue::Number(col.as_primitive::<UInt16Type>().value(row) as f64),
        DataType::UInt32 => CellValue::Number(col.as_primitive::<UInt32Type>().value(row) as f64),
        DataType::UInt64 => CellValue::Number(col.as_primitive::<UInt64Type>().value(row) as f64),
        DataType::Float32 => CellValue::Number(col.as_primitive::<Float32Type>().value(row) as f64),
        DataType::Float64 => CellValue::Number(col.as_primitive::<Float64Type>().value(row)),
        DataType::Date32 => col
            .as_primitive::<Date32Type>()
            .value_as_datetime(row)
            .into(),
        DataType::Date64 => col
            .as_primitive::<Date64Type>()
            .value_as_datetime(row)
            .into(),
        DataType::Timestamp(unit, _) => {
            let dt = match unit {
                TimeUnit::Second => col
                    .as_primitive::<TimestampSecondType>()
                    .value_as_datetime(row),
                TimeUnit::Millisecond => col
                    .as_primitive::<TimestampMillisecondType>()
                    .value_as_datetime(row),
                TimeUnit::Microsecond => col
                    .as_primitive::<TimestampMicrosecondType>()
                    .value_as_datetime(row),
                TimeUnit::Nanosecond => col
                    .as_primitive::<TimestampNanosecondType>()
                    .value_as_datetime(row),
            };
            dt.into()
        }
        _ => arrow::util::display::array_value_to_string(col.as_ref(), row)
            .map_or(CellValue::Null, CellValue::String),
    }
}

// ---------------------------------------------------------------------------
// Spreadsheet decoder (calamine)
// ---------------------------------------------------------------------------

fn decode_spreadsheet(bytes: &[u8]) -> Result<DecodedWorkbook> {
    let mut workbook = calamine::open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .context("opening workbook")?;

    let sheet_names = workbook.sheet_names();
    let mut sheets = Vec::with_capacity(sheet_names.len());
    for name in &sheet_names {
        let range = workbook
            .worksheet_range(name)
            .with_context(|| format!("reading sheet '{name}'"))?;
        let cells = range
            .rows()
            .map(|row| row.iter().map(calamine_cell).collect())
            .collect();
        sheets.push(RawSheet {
            name: name.clone(),
            cells,
        });
    }

    Ok(DecodedWorkbook {
        sheet_names,
        sheets,
    })
}

fn calamine_cell(data: &Data) -> CellValue {
    match data {
        Data::Empty => CellValue::Null,
        Data::String(s) => CellValue::String(s.clone()),
        Data::Float(f) => CellValue::Number(*f),
        Data::Int(i) => CellValue::Number(*i as f64),
        Data::Bool(b) => CellValue::Bool(*b),
        Data::DateTime(dt) => dt
            .as_datetime()
            .map_or(CellValue::Number(dt.as_f64()), CellValue::Date),
        Data::DateTimeIso(s) => {
            parse_date(s).map_or_else(|| CellValue::String(s.clone()), CellValue::Date)
        }
        Data::DurationIso(s) => CellValue::String(s.clone()),
        Data::Error(e) => CellValue::String(e.to_string()),
    }
}
