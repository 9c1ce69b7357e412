use crate::drift::Difference;
use crate::model::Record;
use serde_json::Value;

pub mod delete;
pub mod doctor;
pub mod drift;
pub mod get;
pub mod put;
pub mod status;

pub use doctor::DoctorReport;
pub use status::StatusReport;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageLevel {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone)]
pub struct CmdMessage {
    pub level: MessageLevel,
    pub content: String,
}

impl CmdMessage {
    pub fn info(content: impl Into<String>) -> Self {
        Self {
            level: MessageLevel::Info,
            content: content.into(),
        }
    }

    pub fn success(content: impl Into<String>) -> Self {
        Self {
            level: MessageLevel::Success,
            content: content.into(),
        }
    }

    pub fn warning(content: impl Into<String>) -> Self {
        Self {
            level: MessageLevel::Warning,
            content: content.into(),
        }
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self {
            level: MessageLevel::Error,
            content: content.into(),
        }
    }
}

#[derive(Debug, Default)]
pub struct CmdResult {
    /// Records created, updated or removed by the command.
    pub affected: Vec<Record>,
    /// Wire-shaped output (a collection, a record, settings).
    pub value: Option<Value>,
    pub differences: Vec<Difference>,
    pub doctor: Option<DoctorReport>,
    pub status: Option<StatusReport>,
    /// True when the command persisted a new document.
    pub changed: bool,
    pub messages: Vec<CmdMessage>,
}

impl CmdResult {
    pub fn add_message(&mut self, message: CmdMessage) {
        self.messages.push(message);
    }

    pub fn with_value(mut self, value: Value) -> Self {
        self.value = Some(value);
        self
    }

    pub fn with_affected(mut self, records: Vec<Record>) -> Self {
        self.affected = records;
        self
    }

    pub fn with_differences(mut self, differences: Vec<Difference>) -> Self {
        self.differences = differences;
        self
    }
}
