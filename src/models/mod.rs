// Core domain models for AgentCore
// These are the envelopes and taxonomies shared by every engine component

//! # Domain Models Module
//!
//! This module contains the data structures that cross component boundaries:
//! the request/response envelopes agents consume and produce, the error
//! taxonomy every failure is classified into, and the result envelope tools
//! return. The engine components in [`crate::engine`] operate on these types
//! but never extend them — agents and tools outside this crate see exactly
//! the same shapes.

// Request/response envelopes for agent dispatch
pub mod request;

// Error taxonomy and structured error payloads
pub mod error;

// Tool execution results
pub mod tool;

// Re-export main types for convenience

/// Re-export the dispatch envelopes
/// - AgentRequest: what the orchestrator routes
/// - AgentResponse: what every dispatch ultimately yields
pub use request::{AgentRequest, AgentResponse};

/// Re-export the error taxonomy
/// - ErrorCode: machine-readable classification of a failure
/// - ErrorResponse: structured payload carrying message, code and trace id
pub use error::{ErrorCode, ErrorResponse};

/// Re-export the tool result envelope
pub use tool::ToolResult;
