// Agent registry, dispatch, and health monitoring

//! # Orchestrator
//!
//! The orchestrator owns the set of live agents and the full request
//! lifecycle: route, health-gate, dispatch under retry/breaker protection,
//! and standardize the outcome. [`route_request`](Orchestrator::route_request)
//! is deliberately infallible at the type level; whatever goes wrong, the
//! caller gets an [`AgentResponse`] with `success == false` and a structured
//! error payload, never a bare `Err`.
//!
//! A background loop started by [`initialize`](Orchestrator::initialize)
//! polls every agent's `is_healthy`. An agent that fails the check
//! `unhealthy_threshold` times in a row stops receiving traffic until a
//! later check passes.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::OrchestratorConfig;
use crate::engine::errors::ErrorHandler;
use crate::engine::router::{AgentRouter, RouteConditions};
use crate::models::{AgentRequest, AgentResponse};
use crate::{AgentCoreError, Result};

/// A pluggable request handler hosted by the orchestrator
///
/// Implementations must be cheap to share (`Arc<dyn Agent>`) and safe to
/// call concurrently.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Stable type name used for routing ("model_properties", …)
    fn agent_type(&self) -> &str;

    /// Called once when the agent is registered
    async fn initialize(&self) -> Result<()>;

    /// Called when the agent is unregistered or the runtime shuts down
    async fn shutdown(&self) -> Result<()>;

    /// Handle one request
    async fn handle_request(&self, request: &AgentRequest) -> Result<AgentResponse>;

    /// Cheap liveness probe polled by the health monitor
    fn is_healthy(&self) -> bool;
}

struct AgentRegistration {
    agent: Arc<dyn Agent>,
    registered_at: DateTime<Utc>,
    healthy: bool,
    consecutive_health_failures: u32,
    last_health_check: Option<DateTime<Utc>>,
}

/// Public view of one registration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRegistrationInfo {
    pub agent_type: String,
    pub registered_at: DateTime<Utc>,
    pub healthy: bool,
    pub consecutive_health_failures: u32,
    pub last_health_check: Option<DateTime<Utc>>,
}

/// Snapshot returned by [`Orchestrator::status`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorStatus {
    pub agents: Vec<AgentRegistrationInfo>,
    pub uptime_seconds: u64,
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    /// Successful fraction of completed requests, 1.0 when idle
    pub success_rate: f64,
    /// Mean handling time across completed requests, in seconds
    pub average_response_time: f64,
}

/// Hosts agents and dispatches requests to them
pub struct Orchestrator {
    config: OrchestratorConfig,
    agents: RwLock<HashMap<String, AgentRegistration>>,
    router: AgentRouter,
    error_handler: Arc<ErrorHandler>,
    shutdown_token: CancellationToken,
    started_at: Instant,

    total_requests: AtomicU64,
    successful_requests: AtomicU64,
    failed_requests: AtomicU64,
    total_response_micros: AtomicU64,
}

impl Orchestrator {
    pub fn new(config: OrchestratorConfig, error_handler: Arc<ErrorHandler>) -> Self {
        Self {
            config,
            agents: RwLock::new(HashMap::new()),
            router: AgentRouter::new(),
            error_handler,
            shutdown_token: CancellationToken::new(),
            started_at: Instant::now(),
            total_requests: AtomicU64::new(0),
            successful_requests: AtomicU64::new(0),
            failed_requests: AtomicU64::new(0),
            total_response_micros: AtomicU64::new(0),
        }
    }

    /// Register an agent with a catch-all-free default route (direct type
    /// match only, priority 0)
    pub async fn register_agent(&self, agent: Arc<dyn Agent>) -> Result<()> {
        self.register_agent_with_routing(agent, 0, RouteConditions::default())
            .await
    }

    /// Register an agent together with a condition-based routing rule
    ///
    /// Initializes the agent before it becomes routable. Registering a
    /// second agent for the same type fails.
    pub async fn register_agent_with_routing(
        &self,
        agent: Arc<dyn Agent>,
        priority: i32,
        conditions: RouteConditions,
    ) -> Result<()> {
        let agent_type = agent.agent_type().to_string();

        {
            let agents = self.agents.read().await;
            if agents.contains_key(&agent_type) {
                return Err(AgentCoreError::AgentAlreadyRegistered(agent_type));
            }
        }

        agent.initialize().await?;

        {
            let mut agents = self.agents.write().await;
            // re-check under the write lock
            if agents.contains_key(&agent_type) {
                let _ = agent.shutdown().await;
                return Err(AgentCoreError::AgentAlreadyRegistered(agent_type));
            }
            agents.insert(
                agent_type.clone(),
                AgentRegistration {
                    agent,
                    registered_at: Utc::now(),
                    healthy: true,
                    consecutive_health_failures: 0,
                    last_health_check: None,
                },
            );
        }

        self.router
            .register_agent_type(&agent_type, priority, conditions)
            .await;
        info!("🤖 Agent '{}' registered", agent_type);
        Ok(())
    }

    /// Remove an agent and shut it down
    pub async fn unregister_agent(&self, agent_type: &str) -> Result<()> {
        let registration = {
            let mut agents = self.agents.write().await;
            agents.remove(agent_type)
        };
        let Some(registration) = registration else {
            return Err(AgentCoreError::AgentNotFound(agent_type.to_string()));
        };

        self.router.unregister_agent_type(agent_type).await;
        if let Err(e) = registration.agent.shutdown().await {
            warn!("Agent '{}' shutdown failed: {}", agent_type, e);
        }
        info!("🤖 Agent '{}' unregistered", agent_type);
        Ok(())
    }

    /// Route and dispatch one request
    ///
    /// Always yields a response: routing failures, unhealthy agents, and
    /// handler errors all come back as structured failure responses.
    pub async fn route_request(&self, request: AgentRequest) -> AgentResponse {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        let started = Instant::now();

        let mut response = match self.dispatch(&request).await {
            Ok(response) => response,
            Err(err) => self.error_handler.handle_agent_error(&err, &request),
        };

        response.execution_time = started.elapsed().as_secs_f64();
        self.total_response_micros
            .fetch_add(started.elapsed().as_micros() as u64, Ordering::Relaxed);
        if response.success {
            self.successful_requests.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed_requests.fetch_add(1, Ordering::Relaxed);
        }
        response
    }

    async fn dispatch(&self, request: &AgentRequest) -> Result<AgentResponse> {
        let agent_type = self.router.route(request).await?;

        // Clone the handle out so no lock is held across the dispatch
        let agent = {
            let agents = self.agents.read().await;
            let registration = agents
                .get(&agent_type)
                .ok_or_else(|| AgentCoreError::AgentNotFound(agent_type.clone()))?;
            if !registration.healthy {
                return Err(AgentCoreError::AgentUnhealthy(agent_type.clone()));
            }
            Arc::clone(&registration.agent)
        };

        debug!(
            "📨 Dispatching request {} to '{}'",
            request.request_id, agent_type
        );

        let operation = format!("agent:{agent_type}");
        let request_for_call = request.clone();
        let mut response = self
            .error_handler
            .execute_with_retry(&operation, move || {
                let agent = Arc::clone(&agent);
                let request = request_for_call.clone();
                async move { agent.handle_request(&request).await }
            })
            .await?;

        // normalize routing metadata on the way out
        response.agent_type = agent_type;
        response.request_id = request.request_id.clone();
        Ok(response)
    }

    /// Start the periodic health monitor
    pub fn initialize(self: Arc<Self>) {
        let orchestrator = Arc::clone(&self);
        let token = self.shutdown_token.clone();
        let interval = self.config.health_check_interval();
        info!("🩺 Health monitor started (every {:?})", interval);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => orchestrator.health_check_once().await,
                }
            }
            debug!("Health monitor stopped");
        });
    }

    /// Run one round of health checks
    ///
    /// An agent is marked unhealthy after `unhealthy_threshold` consecutive
    /// failed probes; one passing probe restores it.
    pub async fn health_check_once(&self) {
        let mut agents = self.agents.write().await;
        for (agent_type, registration) in agents.iter_mut() {
            registration.last_health_check = Some(Utc::now());
            if registration.agent.is_healthy() {
                if !registration.healthy {
                    info!("💚 Agent '{}' recovered", agent_type);
                }
                registration.healthy = true;
                registration.consecutive_health_failures = 0;
            } else {
                registration.consecutive_health_failures += 1;
                if registration.healthy
                    && registration.consecutive_health_failures >= self.config.unhealthy_threshold
                {
                    warn!(
                        "💔 Agent '{}' marked unhealthy after {} failed checks",
                        agent_type, registration.consecutive_health_failures
                    );
                    registration.healthy = false;
                }
            }
        }
    }

    /// Stop the health monitor and shut down every agent
    pub async fn shutdown(&self) {
        self.shutdown_token.cancel();
        let registrations: Vec<(String, Arc<dyn Agent>)> = {
            let mut agents = self.agents.write().await;
            agents
                .drain()
                .map(|(t, r)| (t, r.agent))
                .collect()
        };
        for (agent_type, agent) in registrations {
            self.router.unregister_agent_type(&agent_type).await;
            if let Err(e) = agent.shutdown().await {
                warn!("Agent '{}' shutdown failed: {}", agent_type, e);
            }
        }
        info!("🛑 Orchestrator shut down");
    }

    pub async fn status(&self) -> OrchestratorStatus {
        let agents = self.agents.read().await;
        let infos = agents
            .iter()
            .map(|(agent_type, r)| AgentRegistrationInfo {
                agent_type: agent_type.clone(),
                registered_at: r.registered_at,
                healthy: r.healthy,
                consecutive_health_failures: r.consecutive_health_failures,
                last_health_check: r.last_health_check,
            })
            .collect();

        let total = self.total_requests.load(Ordering::Relaxed);
        let successful = self.successful_requests.load(Ordering::Relaxed);
        let micros = self.total_response_micros.load(Ordering::Relaxed);
        let average_response_time = if total == 0 {
            0.0
        } else {
            (micros as f64 / total as f64) / 1_000_000.0
        };
        let success_rate = if total == 0 {
            1.0
        } else {
            successful as f64 / total as f64
        };

        OrchestratorStatus {
            agents: infos,
            uptime_seconds: self.started_at.elapsed().as_secs(),
            total_requests: total,
            successful_requests: successful,
            failed_requests: self.failed_requests.load(Ordering::Relaxed),
            success_rate,
            average_response_time,
        }
    }

    /// Public view of the current registrations
    pub async fn registered_agents(&self) -> Vec<AgentRegistrationInfo> {
        self.status().await.agents
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("total_requests", &self.total_requests.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}
