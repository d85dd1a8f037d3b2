//! Task submission payloads
//!
//! The TASK_SUBMIT frame and the RPC request descriptor both carry a
//! JSON object with at least `entry_point` and `packages`; the RPC
//! variant adds `action` and `task_id`.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Decoded TASK_SUBMIT / RPC descriptor payload
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TaskSubmission {
    /// Qualified task reference resolved by the code loader
    pub entry_point: String,

    /// Comma-separated dependency locations, possibly empty
    #[serde(default)]
    pub packages: String,

    /// Lifecycle method name (RPC variant and direct invocation only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,

    /// Logical task id (RPC variant only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<i64>,
}

impl TaskSubmission {
    /// Parse a submission from its JSON wire form
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::ProtocolMalformed {
            message: format!("invalid submission payload: {}", e),
        })
    }

    /// Serialize back to the JSON wire form
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::Internal(e.to_string()))
    }

    /// Split the `packages` field into individual locations,
    /// dropping empty segments
    pub fn package_list(&self) -> Vec<String> {
        self.packages
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect()
    }
}
