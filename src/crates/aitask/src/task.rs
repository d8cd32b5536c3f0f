//! Task identity

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of generation a task performs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskType {
    /// Turn raw notes and a transcript into a structured note
    Enhance,
    /// Generate a short session title
    Title,
}

impl TaskType {
    /// Lowercase name used in task ids and configuration
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Enhance => "enhance",
            Self::Title => "title",
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "enhance" => Ok(Self::Enhance),
            "title" => Ok(Self::Title),
            other => Err(format!("unknown task type '{other}' (expected enhance or title)")),
        }
    }
}

/// Address of one generation slot: an entity plus the kind of task run on it.
///
/// Displays as `{entity_id}-{task_type}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskId {
    /// Entity the task works on (an enhanced note, a session)
    pub entity_id: String,
    /// Kind of task
    pub task_type: TaskType,
}

impl TaskId {
    /// Create a task id
    pub fn new(entity_id: impl Into<String>, task_type: TaskType) -> Self {
        Self {
            entity_id: entity_id.into(),
            task_type,
        }
    }

    /// Enhance task for an enhanced note
    pub fn enhance(enhanced_note_id: impl Into<String>) -> Self {
        Self::new(enhanced_note_id, TaskType::Enhance)
    }

    /// Title task for a session
    pub fn title(session_id: impl Into<String>) -> Self {
        Self::new(session_id, TaskType::Title)
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.entity_id, self.task_type)
    }
}
