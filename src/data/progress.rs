use std::fmt;

use serde::{Deserialize, Serialize};

/// Pipeline stage a progress event belongs to, in the order they occur.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStage {
    Validating,
    Reading,
    ParsingWorkbook,
    ExtractingHeaders,
    BuildingRows,
    AnalyzingColumns,
    Complete,
}

impl fmt::Display for ProgressStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProgressStage::Validating => "validating",
            ProgressStage::Reading => "reading",
            ProgressStage::ParsingWorkbook => "parsing_workbook",
            ProgressStage::ExtractingHeaders => "extracting_headers",
            ProgressStage::BuildingRows => "building_rows",
            ProgressStage::AnalyzingColumns => "analyzing_columns",
            ProgressStage::Complete => "complete",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub stage: ProgressStage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub percent: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ProgressEvent {
    pub fn stage(stage: ProgressStage) -> Self {
        ProgressEvent {
            stage,
            percent: None,
            message: None,
        }
    }

    /// `done / total` as a whole percentage, clamped to 0..=100.
    pub fn percent(stage: ProgressStage, done: usize, total: usize) -> Self {
        let pct = if total == 0 {
            100
        } else {
            ((done.min(total) * 100) / total) as u8
        };
        ProgressEvent {
            stage,
            percent: Some(pct),
            message: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// Receiver for advisory progress telemetry. Never alters a parse result.
pub trait ProgressSink {
    fn report(&self, event: ProgressEvent);
}

impl<F> ProgressSink for F
where
    F: Fn(ProgressEvent),
{
    fn report(&self, event: ProgressEvent) {
        self(event)
    }
}

/// Sink that drops everything.
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&self, _event: ProgressEvent) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[test]
    fn percent_is_clamped() {
        assert_eq!(ProgressEvent::percent(ProgressStage::Reading, 5, 10).percent, Some(50));
        assert_eq!(ProgressEvent::percent(ProgressStage::Reading, 20, 10).percent, Some(100));
        assert_eq!(ProgressEvent::percent(ProgressStage::Reading, 0, 0).percent, Some(100));
    }

    #[test]
    fn closures_are_sinks() {
        let seen = RefCell::new(Vec::new());
        let sink = |e: ProgressEvent| seen.borrow_mut().push(e.stage);
        sink.report(ProgressEvent::stage(ProgressStage::Complete));
        assert_eq!(seen.into_inner(), vec![ProgressStage::Complete]);
    }

    #[test]
    fn stage_names_are_snake_case() {
        let event = ProgressEvent::stage(ProgressStage::BuildingRows);
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(json, r#"{"stage":"building_rows"}"#);
        assert_eq!(ProgressStage::AnalyzingColumns.to_string(), "analyzing_columns");
    }
}
