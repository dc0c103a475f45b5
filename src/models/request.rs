// Request and response envelopes for agent dispatch

//! # Dispatch Envelopes
//!
//! [`AgentRequest`] is what arrives at the orchestrator; [`AgentResponse`] is
//! what every dispatch ultimately yields. The content of both is opaque to
//! the runtime — agents read the prompt/context and fill in the responses,
//! the runtime only touches the routing fields (`agent_type`, `request_id`)
//! and the outcome fields (`success`, `execution_time`, error metadata).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use uuid::Uuid;

use crate::{AgentCoreError, Result};

/// A request routed to an agent
///
/// `agent_type` names the preferred handler; when no agent of that type is
/// registered the router falls back to condition-based rules evaluated over
/// `prompt`, `context` and `metadata`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRequest {
    /// Requested handler type ("model_properties", "aec_data_model", …)
    pub agent_type: String,

    /// The natural-language task for the agent
    pub prompt: String,

    /// Structured context the agent (and routing conditions) can read
    #[serde(default)]
    pub context: HashMap<String, Value>,

    /// Free-form metadata carried alongside the request
    #[serde(default)]
    pub metadata: HashMap<String, Value>,

    /// Unique identifier, generated when absent
    pub request_id: String,

    /// Arrival timestamp
    pub timestamp: DateTime<Utc>,
}

impl AgentRequest {
    /// Create a request with a generated id and empty context/metadata
    ///
    /// Fails with a validation error when `agent_type` or `prompt` is empty.
    pub fn new(agent_type: impl Into<String>, prompt: impl Into<String>) -> Result<Self> {
        let agent_type = agent_type.into();
        let prompt = prompt.into();

        if agent_type.trim().is_empty() {
            return Err(AgentCoreError::Validation("agent_type is required".into()));
        }
        if prompt.trim().is_empty() {
            return Err(AgentCoreError::Validation("prompt is required".into()));
        }

        Ok(Self {
            agent_type,
            prompt,
            context: HashMap::new(),
            metadata: HashMap::new(),
            request_id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
        })
    }

    /// Attach a context entry (builder style)
    pub fn with_context(mut self, key: impl Into<String>, value: Value) -> Self {
        self.context.insert(key.into(), value);
        self
    }

    /// Attach a metadata entry (builder style)
    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

/// A response produced for a dispatched request
///
/// Every dispatch yields one of these — on failure `success` is `false` and
/// `metadata["error"]` carries the serialized [`crate::ErrorResponse`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentResponse {
    /// Ordered response fragments from the agent
    pub responses: Vec<String>,

    /// Whether the request was handled successfully
    pub success: bool,

    /// Free-form metadata (error payloads, routing annotations, …)
    #[serde(default)]
    pub metadata: HashMap<String, Value>,

    /// Wall-clock seconds spent handling the request
    pub execution_time: f64,

    /// Type of the agent that produced this response
    pub agent_type: String,

    /// Identifier of the originating request
    pub request_id: String,

    /// Completion timestamp
    pub timestamp: DateTime<Utc>,
}

impl AgentResponse {
    /// Build a successful response
    pub fn success(
        agent_type: impl Into<String>,
        request_id: impl Into<String>,
        responses: Vec<String>,
    ) -> Self {
        Self {
            responses,
            success: true,
            metadata: HashMap::new(),
            execution_time: 0.0,
            agent_type: agent_type.into(),
            request_id: request_id.into(),
            timestamp: Utc::now(),
        }
    }

    /// Build a failed response carrying a human-readable message
    ///
    /// The structured error payload is attached separately under
    /// `metadata["error"]` by the error handler.
    pub fn failure(
        agent_type: impl Into<String>,
        request_id: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        let message = message.into();
        Self {
            responses: vec![format!("Error: {message}")],
            success: false,
            metadata: HashMap::new(),
            execution_time: 0.0,
            agent_type: agent_type.into(),
            request_id: request_id.into(),
            timestamp: Utc::now(),
        }
    }
}
