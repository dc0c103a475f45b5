// Explicit composition root for the runtime

//! # AgentCore Handle
//!
//! [`AgentCore`] wires the engine components together and owns their
//! lifecycle. There is no global state: everything the runtime needs hangs
//! off this handle, and embedding applications decide when it starts and
//! stops.
//!
//! ```no_run
//! use agent_core::{AgentCore, CoreConfig};
//!
//! # async fn run() -> agent_core::Result<()> {
//! let core = AgentCore::new(CoreConfig::default())?;
//! core.initialize().await;
//! // register agents and tools, serve requests …
//! core.shutdown().await;
//! # Ok(())
//! # }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::CoreConfig;
use crate::engine::cache::{CacheManager, CacheStats};
use crate::engine::errors::{CircuitState, ErrorHandler};
use crate::engine::orchestrator::{Agent, AgentRegistrationInfo, Orchestrator, OrchestratorStatus};
use crate::engine::router::RouteConditions;
use crate::engine::tools::{ToolRegistry, ToolRegistryStats};
use crate::models::{AgentRequest, AgentResponse};
use crate::Result;

/// Install a global tracing subscriber honoring `RUST_LOG`
///
/// Falls back to the configured level when `RUST_LOG` is unset. Safe to
/// call once per process; later calls are ignored.
pub fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Combined health report across every subsystem
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthSnapshot {
    pub orchestrator: OrchestratorStatus,
    pub cache: CacheStats,
    pub tools: ToolRegistryStats,
    /// Errors recorded in the last minute
    pub error_rate_per_minute: u64,
    pub circuit_states: HashMap<String, CircuitState>,
}

/// Owns and wires the runtime components
pub struct AgentCore {
    config: CoreConfig,
    cache: Arc<CacheManager>,
    tools: Arc<ToolRegistry>,
    error_handler: Arc<ErrorHandler>,
    orchestrator: Arc<Orchestrator>,
}

impl AgentCore {
    pub fn new(config: CoreConfig) -> Result<Self> {
        let cache = Arc::new(CacheManager::new(config.cache.clone())?);
        let tools = Arc::new(ToolRegistry::new());
        let error_handler = Arc::new(ErrorHandler::new(&config.error_handling));
        let orchestrator = Arc::new(Orchestrator::new(
            config.orchestrator.clone(),
            Arc::clone(&error_handler),
        ));
        Ok(Self {
            config,
            cache,
            tools,
            error_handler,
            orchestrator,
        })
    }

    /// Start background loops (cache sweep, health monitor) and initialize
    /// every materialized tool
    pub async fn initialize(&self) {
        info!("🚀 AgentCore starting");
        Arc::clone(&self.cache).initialize();
        Arc::clone(&self.orchestrator).initialize();
        self.tools.initialize().await;
    }

    /// Stop background loops and shut down agents and tools
    pub async fn shutdown(&self) {
        self.orchestrator.shutdown().await;
        self.tools.shutdown().await;
        self.cache.shutdown();
        info!("👋 AgentCore stopped");
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<CacheManager> {
        &self.cache
    }

    pub fn tools(&self) -> &Arc<ToolRegistry> {
        &self.tools
    }

    pub fn error_handler(&self) -> &Arc<ErrorHandler> {
        &self.error_handler
    }

    pub fn orchestrator(&self) -> &Arc<Orchestrator> {
        &self.orchestrator
    }

    /// Register an agent (direct type match only)
    pub async fn register_agent(&self, agent: Arc<dyn Agent>) -> Result<()> {
        self.orchestrator.register_agent(agent).await
    }

    /// Register an agent with a condition-based routing rule
    pub async fn register_agent_with_routing(
        &self,
        agent: Arc<dyn Agent>,
        priority: i32,
        conditions: RouteConditions,
    ) -> Result<()> {
        self.orchestrator
            .register_agent_with_routing(agent, priority, conditions)
            .await
    }

    /// Dispatch one request; never fails at the type level
    pub async fn route_request(&self, request: AgentRequest) -> AgentResponse {
        self.orchestrator.route_request(request).await
    }

    /// One-stop health report for status endpoints
    pub async fn health_snapshot(&self) -> HealthSnapshot {
        let statistics = self.error_handler.statistics();
        HealthSnapshot {
            orchestrator: self.orchestrator.status().await,
            cache: self.cache.stats(),
            tools: self.tools.stats(),
            error_rate_per_minute: statistics.error_rate_per_minute,
            circuit_states: statistics.circuit_states,
        }
    }
}

impl std::fmt::Debug for AgentCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentCore")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
