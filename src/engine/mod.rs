// Agent Core Engine
// This contains the runtime subsystems behind the public API

//! # Agent Core Engine Module
//!
//! This module contains the runtime subsystems that power the agent
//! framework. The engine is the layer between the domain models and the
//! agents/tools plugged into the runtime.
//!
//! ## Engine Components
//!
//! ### Orchestrator (`orchestrator` module)
//! - Owns the agent registry and request lifecycle
//! - Dispatches requests through retry/circuit-breaker protection
//! - Runs the background health monitor
//!
//! ### Router (`router` module)
//! - Maps requests to agent types
//! - Direct type match first, then priority-ordered condition rules
//!
//! ### Error Handling (`errors` module)
//! - Retry policies with fixed/linear/exponential backoff
//! - Per-operation circuit breakers
//! - Error metrics, history and threshold-based alerting
//!
//! ### Cache (`cache` module)
//! - Two-tier (memory + file) cache with TTL and LRU eviction
//! - Namespace clearing and glob-pattern invalidation
//!
//! ### Tools (`tools` module)
//! - Factory-based tool registration with lazy singleton instances
//! - Category/tag/agent indexes and dependency validation

pub mod cache;
pub mod errors;
pub mod orchestrator;
pub mod router;
pub mod tools;

pub use cache::{CacheManager, CacheStats, CacheStrategy};
pub use errors::{
    AlertSeverity, CircuitBreakerConfig, CircuitState, ErrorAlert, ErrorHandler, ErrorMetrics,
    ErrorRecord, ErrorStatistics, RetryPolicy, RetryStrategy,
};
pub use orchestrator::{Agent, AgentRegistrationInfo, Orchestrator, OrchestratorStatus};
pub use router::{AgentRouter, RouteConditions, RoutingRule};
pub use tools::{Tool, ToolCategory, ToolDescriptor, ToolMetadata, ToolRegistry, ToolRegistryStats};
