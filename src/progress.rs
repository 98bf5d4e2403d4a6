use serde::{Deserialize, Serialize};

/// Best-effort progress of one document analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "stage", rename_all = "lowercase")]
pub enum ProgressEvent {
    #[serde(rename_all = "camelCase")]
    Extracting {
        percent: u8,
        page: usize,
        total_pages: usize,
    },
    Ocr {
        percent: u8,
    },
    #[serde(rename_all = "camelCase")]
    Prompt {
        percent: u8,
        prompt_chars: usize,
        truncated: bool,
    },
    Model {
        percent: u8,
    },
    Parsing {
        percent: u8,
    },
    Done {
        percent: u8,
    },
    Error {
        percent: u8,
        message: String,
    },
}

impl ProgressEvent {
    pub fn percent(&self) -> u8 {
        match self {
            ProgressEvent::Extracting { percent, .. }
            | ProgressEvent::Ocr { percent }
            | ProgressEvent::Prompt { percent, .. }
            | ProgressEvent::Model { percent }
            | ProgressEvent::Parsing { percent }
            | ProgressEvent::Done { percent }
            | ProgressEvent::Error { percent, .. } => *percent,
        }
    }
}

pub trait ProgressSink {
    fn emit(&mut self, event: ProgressEvent);
}

impl<F: FnMut(ProgressEvent)> ProgressSink for F {
    fn emit(&mut self, event: ProgressEvent) {
        self(event)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateStatus {
    Downloading,
    Installing,
}

/// Per-component progress of a resource update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateProgress {
    pub status: UpdateStatus,
    pub component: String,
    pub percent: u8,
}

/// Map `done/total` onto `[from, to]`, clamped.
pub(crate) fn scale(from: u8, to: u8, done: usize, total: usize) -> u8 {
    if total == 0 {
        return to;
    }
    let frac = (done as f64 / total as f64).clamp(0.0, 1.0);
    (from as f64 + (to as f64 - from as f64) * frac).round() as u8
}
