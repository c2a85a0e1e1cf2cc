//! Row building and column analysis, either chunked on the calling thread or
//! handed to one background worker thread.
//!
//! ```text
//!   raw matrix ──► ChunkScheduler::should_use_worker(rows)?
//!                     │ no                         │ yes
//!                     ▼                            ▼
//!          MainThreadProcessor            WorkerProcessor ──(mpsc)──► worker thread
//!          chunk, yield, report           forward Progress, await Done / Failed
//!                     │                            │ failure
//!                     │◄───────────────────────────┘ (silent fallback)
//!                     ▼
//!               ProcessedSheet
//! ```

use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::mpsc;
use std::thread;

use log::{debug, warn};

use super::error::IngestError;
use super::inference::{AnalysisOptions, ColumnProfiler};
use super::model::{ColumnInfo, DataMatrix};
use super::progress::{ProgressEvent, ProgressSink, ProgressStage};
use super::workbook::{extract_headers, is_empty_row, synthesized_header, trim_trailing_empty_rows};
use crate::config::IngestConfig;

// ---------------------------------------------------------------------------
// Shared processing core
// ---------------------------------------------------------------------------

/// Headers, data rows and column metadata for one sheet.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProcessedSheet {
    pub headers: Vec<String>,
    pub rows: DataMatrix,
    pub columns: Vec<ColumnInfo>,
}

/// Split off the header row, trim the blank tail, then build rows in
/// chunks while profiling columns. `breathe` runs between chunks.
pub fn process_matrix(
    mut matrix: DataMatrix,
    options: &AnalysisOptions,
    chunk_size: usize,
    progress: &dyn ProgressSink,
    breathe: &dyn Fn(),
) -> ProcessedSheet {
    progress.report(ProgressEvent::stage(ProgressStage::ExtractingHeaders));
    if matrix.is_empty() {
        return ProcessedSheet::default();
    }

    let mut data = matrix.split_off(1);
    let header_row = matrix.pop().unwrap_or_default();
    let trimmed = trim_trailing_empty_rows(&mut data);
    if trimmed > 0 {
        debug!("dropped {trimmed} trailing empty rows");
    }

    // Cells beyond the header row still get a column.
    let width = data
        .iter()
        .map(Vec::len)
        .max()
        .unwrap_or(0)
        .max(header_row.len());
    let mut headers = extract_headers(&header_row);
    headers.extend((headers.len()..width).map(synthesized_header));

    let total = data.len();
    let chunk_size = chunk_size.max(1);
    let mut profiler = ColumnProfiler::new(width, options.clone());
    let mut rows = Vec::with_capacity(total);
    let mut remaining = data.into_iter();
    loop {
        let chunk: DataMatrix = remaining.by_ref().take(chunk_size).collect();
        if chunk.is_empty() {
            break;
        }
        for row in &chunk {
            profiler.observe_row(row);
        }
        rows.extend(chunk);
        progress.report(ProgressEvent::percent(ProgressStage::BuildingRows, rows.len(), total));
        if rows.len() < total {
            breathe();
        }
    }

    progress.report(ProgressEvent::stage(ProgressStage::AnalyzingColumns));
    let columns = profiler.finish(&headers);

    ProcessedSheet {
        headers,
        rows,
        columns,
    }
}

/// Data rows left once the header row and the blank tail are set aside.
fn data_row_count(matrix: &DataMatrix) -> usize {
    matrix
        .iter()
        .skip(1)
        .rposition(|row| !is_empty_row(row))
        .map_or(0, |last| last + 1)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

// ---------------------------------------------------------------------------
// Chunk processors
// ---------------------------------------------------------------------------

/// One way of turning a raw matrix into a [`ProcessedSheet`]. Every
/// implementation produces identical output for identical input.
pub trait ChunkProcessor {
    fn name(&self) -> &'static str;

    fn process(
        &self,
        matrix: DataMatrix,
        options: &AnalysisOptions,
        progress: &dyn ProgressSink,
    ) -> Result<ProcessedSheet, IngestError>;
}

/// Cooperative chunking on the calling thread.
#[derive(Debug, Clone)]
pub struct MainThreadProcessor {
    pub chunk_size: usize,
}

impl ChunkProcessor for MainThreadProcessor {
    fn name(&self) -> &'static str {
        "main-thread"
    }

    fn process(
        &self,
        matrix: DataMatrix,
        options: &AnalysisOptions,
        progress: &dyn ProgressSink,
    ) -> Result<ProcessedSheet, IngestError> {
        catch_unwind(AssertUnwindSafe(|| {
            process_matrix(matrix, options, self.chunk_size, progress, &thread::yield_now)
        }))
        .map_err(|payload| IngestError::Processing(panic_message(payload.as_ref())))
    }
}

/// What gets posted to the worker thread.
#[derive(Debug, Clone)]
pub struct WorkerRequest {
    pub rows: DataMatrix,
    pub options: AnalysisOptions,
    pub chunk_size: usize,
}

/// Messages back from the worker: any number of `Progress`, then exactly
/// one `Done` or `Failed`.
#[derive(Debug)]
pub enum WorkerResponse {
    Progress(ProgressEvent),
    Done(ProcessedSheet),
    Failed { error: String },
}

type WorkerJob = fn(WorkerRequest, &dyn ProgressSink) -> ProcessedSheet;

fn run_request(request: WorkerRequest, progress: &dyn ProgressSink) -> ProcessedSheet {
    process_matrix(request.rows, &request.options, request.chunk_size, progress, &|| {})
}

/// One dedicated thread per parse, falling back to [`MainThreadProcessor`]
/// when the thread cannot be spawned, reports an error, or disappears.
#[derive(Debug, Clone)]
pub struct WorkerProcessor {
    pub chunk_size: usize,
    job: WorkerJob,
}

impl WorkerProcessor {
    pub fn new(chunk_size: usize) -> Self {
        WorkerProcessor {
            chunk_size,
            job: run_request,
        }
    }

    fn run_worker(
        &self,
        request: WorkerRequest,
        progress: &dyn ProgressSink,
    ) -> Result<ProcessedSheet, String> {
        let (tx, rx) = mpsc::channel::<WorkerResponse>();
        let job = self.job;

        let handle = thread::Builder::new()
            .name("sheetlens-worker".to_string())
            .spawn(move || {
                let sink = |event: ProgressEvent| {
                    let _ = tx.send(WorkerResponse::Progress(event));
                };
                let response = match catch_unwind(AssertUnwindSafe(|| job(request, &sink))) {
                    Ok(sheet) => WorkerResponse::Done(sheet),
                    Err(payload) => WorkerResponse::Failed {
                        error: panic_message(payload.as_ref()),
                    },
                };
                let _ = tx.send(response);
            })
            .map_err(|e| format!("could not spawn worker: {e}"))?;

        let outcome = loop {
            match rx.recv() {
                Ok(WorkerResponse::Progress(event)) => progress.report(event),
                Ok(WorkerResponse::Done(sheet)) => break Ok(sheet),
                Ok(WorkerResponse::Failed { error }) => break Err(error),
                Err(_) => break Err("worker exited without a result".to_string()),
            }
        };
        if handle.join().is_err() {
            debug!("worker thread panicked after replying");
        }
        outcome
    }
}

impl ChunkProcessor for WorkerProcessor {
    fn name(&self) -> &'static str {
        "worker"
    }

    fn process(
        &self,
        matrix: DataMatrix,
        options: &AnalysisOptions,
        progress: &dyn ProgressSink,
    ) -> Result<ProcessedSheet, IngestError> {
        let request = WorkerRequest {
            rows: matrix.clone(),
            options: options.clone(),
            chunk_size: self.chunk_size,
        };
        match self.run_worker(request, progress) {
            Ok(sheet) => Ok(sheet),
            Err(reason) => {
                warn!("background worker failed ({reason}); processing on the main thread");
                MainThreadProcessor {
                    chunk_size: self.chunk_size,
                }
                .process(matrix, options, progress)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

/// Whether the host can run a background worker at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerCapability {
    Available,
    Unavailable,
}

impl WorkerCapability {
    /// A worker only helps when there is more than one hardware thread.
    pub fn detect() -> Self {
        match thread::available_parallelism() {
            Ok(n) if n.get() > 1 => WorkerCapability::Available,
            _ => WorkerCapability::Unavailable,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChunkScheduler {
    pub worker_threshold: usize,
    pub chunk_size: usize,
    pub capability: WorkerCapability,
}

impl ChunkScheduler {
    pub fn new(config: &IngestConfig) -> Self {
        ChunkScheduler {
            worker_threshold: config.worker_threshold,
            chunk_size: config.chunk_size,
            capability: if config.enable_worker {
                WorkerCapability::detect()
            } else {
                WorkerCapability::Unavailable
            },
        }
    }

    pub fn with_capability(mut self, capability: WorkerCapability) -> Self {
        self.capability = capability;
        self
    }

    /// True only above the threshold and when a worker can exist.
    pub fn should_use_worker(&self, row_count: usize) -> bool {
        self.capability == WorkerCapability::Available && row_count > self.worker_threshold
    }

    pub fn processor_for(&self, row_count: usize) -> Box<dyn ChunkProcessor> {
        if self.should_use_worker(row_count) {
            Box::new(WorkerProcessor::new(self.chunk_size))
        } else {
            Box::new(MainThreadProcessor {
                chunk_size: self.chunk_size,
            })
        }
    }

    pub fn process(
        &self,
        matrix: DataMatrix,
        options: &AnalysisOptions,
        progress: &dyn ProgressSink,
    ) -> Result<ProcessedSheet, IngestError> {
        let row_count = data_row_count(&matrix);
        let processor = self.processor_for(row_count);
        debug!("processing {row_count} rows with the {} strategy", processor.name());
        processor.process(matrix, options, progress)
    }
}

impl Default for ChunkScheduler {
    fn default() -> Self {
        Self::new(&IngestConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::{CellValue, ColumnType};
    use crate::data::progress::NoProgress;
    use std::cell::RefCell;

    fn matrix(rows: usize) -> DataMatrix {
        let mut m = vec![vec![CellValue::from("id"), CellValue::from(" label "), CellValue::Null]];
        for i in 0..rows {
            m.push(vec![
                CellValue::Number(i as f64),
                CellValue::from(if i % 2 == 0 { "even" } else { "odd" }),
            ]);
        }
        m.push(vec![CellValue::from(""), CellValue::Null]);
        m
    }

    fn scheduler(capability: WorkerCapability) -> ChunkScheduler {
        ChunkScheduler {
            worker_threshold: 100,
            chunk_size: 7,
            capability,
        }
    }

    #[test]
    fn worker_threshold_and_capability() {
        let available = scheduler(WorkerCapability::Available);
        assert!(!available.should_use_worker(100));
        assert!(available.should_use_worker(101));

        let unavailable = scheduler(WorkerCapability::Unavailable);
        assert!(!unavailable.should_use_worker(101));
        assert!(!unavailable.should_use_worker(usize::MAX));
    }

    #[test]
    fn blank_tail_does_not_count_toward_threshold() {
        let mut padded = matrix(60);
        padded.extend((0..200).map(|_| vec![CellValue::Null, CellValue::from("")]));
        assert_eq!(padded.len(), 262);
        assert_eq!(data_row_count(&padded), 60);
        assert!(!scheduler(WorkerCapability::Available).should_use_worker(data_row_count(&padded)));

        assert_eq!(data_row_count(&Vec::new()), 0);
        assert_eq!(data_row_count(&matrix(0)), 0);
    }

    #[test]
    fn disabled_worker_config_never_uses_worker() {
        let config = IngestConfig {
            enable_worker: false,
            ..IngestConfig::default()
        };
        assert!(!ChunkScheduler::new(&config).should_use_worker(1_000_000));
    }

    #[test]
    fn main_thread_reports_each_chunk() {
        let events = RefCell::new(Vec::new());
        let sink = |e: ProgressEvent| events.borrow_mut().push(e);
        let sheet = MainThreadProcessor { chunk_size: 7 }
            .process(matrix(20), &AnalysisOptions::default(), &sink)
            .unwrap();

        assert_eq!(sheet.rows.len(), 20);
        assert_eq!(sheet.headers, vec!["id", "label", "Column 3"]);
        assert_eq!(sheet.columns[0].column_type, ColumnType::Number);

        let building: Vec<Option<u8>> = events
            .borrow()
            .iter()
            .filter(|e| e.stage == ProgressStage::BuildingRows)
            .map(|e| e.percent)
            .collect();
        assert_eq!(building, vec![Some(35), Some(70), Some(100)]);
    }

    #[test]
    fn strategies_agree() {
        let options = AnalysisOptions::default();
        let main = MainThreadProcessor { chunk_size: 7 }
            .process(matrix(250), &options, &NoProgress)
            .unwrap();
        let worker = WorkerProcessor::new(7)
            .process(matrix(250), &options, &NoProgress)
            .unwrap();
        assert_eq!(main, worker);
    }

    #[test]
    fn worker_progress_reaches_caller() {
        let stages = RefCell::new(Vec::new());
        let sink = |e: ProgressEvent| stages.borrow_mut().push(e.stage);
        WorkerProcessor::new(50)
            .process(matrix(120), &AnalysisOptions::default(), &sink)
            .unwrap();
        let stages = stages.into_inner();
        assert_eq!(stages.first(), Some(&ProgressStage::ExtractingHeaders));
        assert_eq!(stages.last(), Some(&ProgressStage::AnalyzingColumns));
    }

    #[test]
    fn failing_worker_falls_back_silently() {
        fn broken(_: WorkerRequest, _: &dyn ProgressSink) -> ProcessedSheet {
            panic!("worker exploded");
        }
        let worker = WorkerProcessor {
            chunk_size: 7,
            job: broken,
        };
        let options = AnalysisOptions::default();
        let recovered = worker.process(matrix(30), &options, &NoProgress).unwrap();
        let expected = MainThreadProcessor { chunk_size: 7 }
            .process(matrix(30), &options, &NoProgress)
            .unwrap();
        assert_eq!(recovered, expected);
    }

    #[test]
    fn empty_matrix_is_empty_sheet() {
        let sheet = scheduler(WorkerCapability::Unavailable)
            .process(Vec::new(), &AnalysisOptions::default(), &NoProgress)
            .unwrap();
        assert_eq!(sheet, ProcessedSheet::default());
    }
}
