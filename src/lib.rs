// AgentCore - unified agent runtime
// Hosts pluggable agents, routes requests, and shields every dispatch with
// caching and failure-resilience policies.

//! # AgentCore Library
//!
//! This is the library root for AgentCore, a runtime that hosts multiple
//! pluggable agents and keeps them healthy. It defines the public API that
//! external crates (servers, CLIs, individual agents) build on.
//!
//! ## Core Components
//!
//! ### Domain Models
//! - [`AgentRequest`] / [`AgentResponse`]: the request/response envelope every
//!   agent consumes and produces
//! - [`ErrorCode`] / [`ErrorResponse`]: the machine-readable error taxonomy
//!   plus the structured payload each failure is converted into
//! - [`ToolResult`]: the result envelope tools return from `execute`
//!
//! ### Engine Layer
//! - [`Orchestrator`]: top-level composition — agent registrations, routing,
//!   retry-shielded dispatch, the periodic health-check loop
//! - [`AgentRouter`]: pure routing-rule evaluation (direct type match, then
//!   priority/condition rules)
//! - [`ErrorHandler`]: retry policies, circuit breakers, error classification
//!   and alerting
//! - [`CacheManager`]: two-tier (memory + file) cache with TTL, LRU eviction
//!   and namespace partitioning
//! - [`ToolRegistry`]: inventory and lifecycle of invocable tools
//!
//! ### Composition
//! - [`AgentCore`]: the explicit handle that owns the engine components and
//!   drives their `initialize`/`shutdown` lifecycle. There is no hidden
//!   global state; everything is reachable from this handle.
//!
//! ## Control Flow
//!
//! ```text
//! AgentRequest
//!   ↓ Orchestrator::route_request
//! AgentRouter (direct match, else priority rules)
//!   ↓ registration + health check
//! ErrorHandler::execute_with_retry("agent:<type>", …)
//!   ↓ Agent::handle_request
//! AgentResponse (success=true or structured error, never a raw failure)
//! ```

// Core domain models (request/response envelopes, error taxonomy)
pub mod models;

// Engine implementations (orchestrator, router, cache, errors, tools)
pub mod engine;

// Runtime configuration loaded via the `config` crate
pub mod config;

// Explicit composition handle with lifecycle management
pub mod core;

// Re-export core domain types for easy access
// This creates a "flat" API - users can import directly from the crate root
pub use models::{
    AgentRequest,   // Request envelope routed to agents
    AgentResponse,  // Response envelope returned by agents
    ErrorCode,      // Machine-readable error taxonomy
    ErrorResponse,  // Structured error payload with trace id
    ToolResult,     // Result envelope from tool execution
};

// Re-export engine types for convenience
pub use engine::{
    cache::{CacheManager, CacheStats, CacheStrategy},
    errors::{
        AlertSeverity, CircuitBreakerConfig, CircuitState, ErrorAlert, ErrorHandler, ErrorMetrics,
        ErrorRecord, ErrorStatistics, RetryPolicy, RetryStrategy,
    },
    orchestrator::{Agent, AgentRegistrationInfo, Orchestrator, OrchestratorStatus},
    router::{AgentRouter, RouteConditions, RoutingRule},
    tools::{Tool, ToolCategory, ToolDescriptor, ToolMetadata, ToolRegistry, ToolRegistryStats},
};

// Re-export configuration and composition types
pub use crate::config::{CacheConfig, CoreConfig, ErrorHandlingConfig, OrchestratorConfig};
pub use crate::core::{init_tracing, AgentCore, HealthSnapshot};

// Core error types
use thiserror::Error;

/// Custom error types for AgentCore operations
///
/// Every fallible operation in the runtime returns this error type. The
/// variants mirror the error taxonomy used for classification ([`ErrorCode`])
/// plus the structural failures the runtime itself raises (unknown agent,
/// disabled tool, open circuit, and so on).
#[derive(Error, Debug)]
pub enum AgentCoreError {
    /// Input failed validation (empty prompt, malformed arguments, …)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Caller could not be authenticated
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// Caller is authenticated but not allowed to do this
    #[error("Authorization error: {0}")]
    Authorization(String),

    /// A downstream service failed or was unreachable (retryable)
    #[error("External service error: {0}")]
    ExternalService(String),

    /// The runtime configuration is missing or inconsistent
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// An operation exceeded its time budget
    #[error("Timeout: {0}")]
    Timeout(String),

    /// A downstream service asked us to back off
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// No registered agent could handle the request
    #[error("No agent found for request type: {0}")]
    AgentNotFound(String),

    /// Attempted to register a second agent for the same type
    #[error("Agent type '{0}' is already registered")]
    AgentAlreadyRegistered(String),

    /// The resolved agent is currently marked unhealthy
    #[error("Agent '{0}' is unhealthy")]
    AgentUnhealthy(String),

    /// The named tool is not in the registry
    #[error("Tool '{0}' is not registered")]
    ToolNotFound(String),

    /// Attempted to register a second tool under the same name
    #[error("Tool '{0}' is already registered")]
    ToolAlreadyRegistered(String),

    /// The named tool is registered but disabled
    #[error("Tool '{0}' is disabled")]
    ToolDisabled(String),

    /// A tool failed while executing
    #[error("Tool error: {0}")]
    Tool(String),

    /// Fail-fast from an open circuit breaker. Raised before the wrapped
    /// operation runs; consumes no retry budget and bypasses classification.
    #[error("Circuit breaker is open for operation: {0}")]
    CircuitOpen(String),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Opaque errors from external collaborators (agents, tools)
    #[error("{0}")]
    External(#[from] anyhow::Error),

    /// Internal runtime error (catch-all default)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<std::io::Error> for AgentCoreError {
    fn from(err: std::io::Error) -> Self {
        AgentCoreError::Internal(err.to_string())
    }
}

/// Type alias for Results that use our custom error type
pub type Result<T> = std::result::Result<T, AgentCoreError>;
