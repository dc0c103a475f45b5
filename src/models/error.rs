// Error taxonomy and standardized error payloads

//! # Error Taxonomy
//!
//! Every failure that crosses a runtime boundary is reduced to an
//! [`ErrorCode`] plus an [`ErrorResponse`] payload. The codes are coarse on
//! purpose: retry policies, circuit breakers and alerting all key off the
//! code, so two failures with the same operational meaning must map to the
//! same code even when their messages differ.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

use crate::AgentCoreError;

/// Coarse classification of a runtime failure
///
/// ## Retryability
///
/// Only `ExternalService` and `Timeout` are retried by the default policy.
/// Everything else fails fast: retrying a validation or authorization error
/// can never succeed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Malformed or missing input
    Validation,
    /// Missing or expired credentials
    Authentication,
    /// Valid credentials without sufficient permission
    Authorization,
    /// Upstream service failed or was unreachable
    ExternalService,
    /// Broken or missing runtime configuration
    Configuration,
    /// Operation exceeded its time budget
    Timeout,
    /// Upstream quota or rate limit was hit
    RateLimit,
    /// No registered agent could handle the request
    AgentNotFound,
    /// A tool invocation failed
    ToolError,
    /// A circuit breaker rejected the call
    CircuitOpen,
    /// Anything not covered above
    Internal,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorCode::Validation => "VALIDATION",
            ErrorCode::Authentication => "AUTHENTICATION",
            ErrorCode::Authorization => "AUTHORIZATION",
            ErrorCode::ExternalService => "EXTERNAL_SERVICE",
            ErrorCode::Configuration => "CONFIGURATION",
            ErrorCode::Timeout => "TIMEOUT",
            ErrorCode::RateLimit => "RATE_LIMIT",
            ErrorCode::AgentNotFound => "AGENT_NOT_FOUND",
            ErrorCode::ToolError => "TOOL_ERROR",
            ErrorCode::CircuitOpen => "CIRCUIT_OPEN",
            ErrorCode::Internal => "INTERNAL",
        };
        write!(f, "{name}")
    }
}

impl ErrorCode {
    /// Classify an error into a code
    ///
    /// Typed variants map directly. Wrapped external errors fall back to a
    /// keyword heuristic over the message, which callers can override with
    /// [`crate::ErrorHandler::set_classifier`].
    pub fn classify(error: &AgentCoreError) -> Self {
        match error {
            AgentCoreError::Validation(_) => ErrorCode::Validation,
            AgentCoreError::Authentication(_) => ErrorCode::Authentication,
            AgentCoreError::Authorization(_) => ErrorCode::Authorization,
            AgentCoreError::ExternalService(_) => ErrorCode::ExternalService,
            AgentCoreError::Configuration(_) => ErrorCode::Configuration,
            AgentCoreError::Timeout(_) => ErrorCode::Timeout,
            AgentCoreError::RateLimited(_) => ErrorCode::RateLimit,
            AgentCoreError::AgentNotFound(_) => ErrorCode::AgentNotFound,
            AgentCoreError::AgentAlreadyRegistered(_) => ErrorCode::Validation,
            AgentCoreError::AgentUnhealthy(_) => ErrorCode::ExternalService,
            AgentCoreError::ToolNotFound(_)
            | AgentCoreError::ToolAlreadyRegistered(_)
            | AgentCoreError::ToolDisabled(_)
            | AgentCoreError::Tool(_) => ErrorCode::ToolError,
            AgentCoreError::CircuitOpen(_) => ErrorCode::CircuitOpen,
            AgentCoreError::Serialization(_) => ErrorCode::Validation,
            AgentCoreError::External(err) => Self::classify_message(&err.to_string()),
            AgentCoreError::Internal(_) => ErrorCode::Internal,
        }
    }

    /// Keyword heuristic used for untyped errors
    pub fn classify_message(message: &str) -> Self {
        let lower = message.to_lowercase();

        if lower.contains("token") || lower.contains("unauthorized") || lower.contains("credential")
        {
            ErrorCode::Authentication
        } else if lower.contains("forbidden") || lower.contains("permission") {
            ErrorCode::Authorization
        } else if lower.contains("timeout") || lower.contains("timed out") {
            ErrorCode::Timeout
        } else if lower.contains("rate limit") || lower.contains("quota") || lower.contains("429") {
            ErrorCode::RateLimit
        } else if lower.contains("connection")
            || lower.contains("unavailable")
            || lower.contains("network")
            || lower.contains("503")
        {
            ErrorCode::ExternalService
        } else if lower.contains("config") || lower.contains("environment variable") {
            ErrorCode::Configuration
        } else if lower.contains("invalid") || lower.contains("validation") {
            ErrorCode::Validation
        } else {
            ErrorCode::Internal
        }
    }
}

/// Standardized error payload attached to failed responses
///
/// Carried under `metadata["error"]` of an [`crate::AgentResponse`] so
/// callers always see the same structure regardless of which layer failed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error_code: ErrorCode,

    /// Human-readable description of the failure
    pub message: String,

    /// Extra context for debugging (operation, agent type, attempt count, …)
    #[serde(default)]
    pub details: HashMap<String, Value>,

    /// Correlation id for log lookup
    pub trace_id: String,

    pub timestamp: DateTime<Utc>,
}

impl ErrorResponse {
    pub fn new(error_code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            error_code,
            message: message.into(),
            details: HashMap::new(),
            trace_id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
        }
    }

    /// Build a payload from any runtime error, classifying it along the way
    pub fn from_error(error: &AgentCoreError) -> Self {
        Self::new(ErrorCode::classify(error), error.to_string())
    }

    /// Attach a detail entry (builder style)
    pub fn with_detail(mut self, key: impl Into<String>, value: Value) -> Self {
        self.details.insert(key.into(), value);
        self
    }
}
