// Tool invocation result

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Outcome of a single tool invocation
///
/// Tools never panic across the registry boundary: failures come back as a
/// `ToolResult` with `success == false` and a message in `error`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    pub success: bool,

    /// Tool-specific output, present on success
    #[serde(default)]
    pub data: Option<Value>,

    /// Failure description, present when `success` is false
    #[serde(default)]
    pub error: Option<String>,

    #[serde(default)]
    pub metadata: HashMap<String, Value>,

    /// Wall-clock seconds spent inside the tool
    pub execution_time: f64,

    pub timestamp: DateTime<Utc>,
}

impl ToolResult {
    pub fn success(data: Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            metadata: HashMap::new(),
            execution_time: 0.0,
            timestamp: Utc::now(),
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
            metadata: HashMap::new(),
            execution_time: 0.0,
            timestamp: Utc::now(),
        }
    }
}
