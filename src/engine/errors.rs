// Retry policies, circuit breakers, and error intelligence

//! # Error Handling Engine
//!
//! [`ErrorHandler`] is the single funnel for runtime failures. It does four
//! things:
//!
//! - **Retry**: [`execute_with_retry`](ErrorHandler::execute_with_retry)
//!   wraps an async operation in a retry policy with fixed, linear or
//!   exponential backoff plus optional jitter.
//! - **Circuit breaking**: operations with a configured breaker fail fast
//!   while the breaker is open and recover through a half-open probe phase.
//! - **Standardization**: `handle_*` helpers turn any error into the
//!   standardized payload callers see, so no raw error ever escapes.
//! - **Intelligence**: every recorded error feeds metrics, a bounded
//!   history, and threshold-based alerting.
//!
//! Breaker admission is decided once per `execute_with_retry` call, before
//! the first attempt. Retries within a call are not re-gated; the outcome of
//! each attempt still feeds the breaker so the next call sees fresh state.

use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet, VecDeque};
use std::future::Future;
use std::sync::{Mutex, RwLock};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::config::ErrorHandlingConfig;
use crate::models::{AgentRequest, AgentResponse, ErrorCode, ErrorResponse, ToolResult};
use crate::{AgentCoreError, Result};

const HISTORY_CAPACITY: usize = 1000;

/// How the delay between retry attempts grows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryStrategy {
    /// Same delay every attempt
    Fixed,
    /// Delay grows by the base delay each attempt
    Linear,
    /// Delay multiplies by the backoff factor each attempt
    Exponential,
}

/// Retry behavior for one operation (or the default for all of them)
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Attempts after the initial call
    pub max_retries: u32,
    pub strategy: RetryStrategy,
    pub base_delay: Duration,
    /// Cap on any single delay
    pub max_delay: Duration,
    /// Multiplier for the exponential strategy
    pub backoff_factor: f64,
    /// Randomize each delay into [50%, 100%) of its computed value
    pub jitter: bool,
    /// Error codes worth retrying; everything else fails immediately
    pub retryable: HashSet<ErrorCode>,
    /// Optional wall-clock budget across all attempts of one call
    pub overall_deadline: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            strategy: RetryStrategy::Exponential,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            backoff_factor: 2.0,
            jitter: true,
            retryable: HashSet::from([ErrorCode::ExternalService, ErrorCode::Timeout]),
            overall_deadline: None,
        }
    }
}

impl RetryPolicy {
    /// Build the default policy from runtime configuration
    pub fn from_config(config: &ErrorHandlingConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            ..Default::default()
        }
    }

    /// Delay before the retry following attempt number `attempt` (0-based),
    /// before jitter
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let raw = match self.strategy {
            RetryStrategy::Fixed => self.base_delay,
            RetryStrategy::Linear => self.base_delay.saturating_mul(attempt + 1),
            RetryStrategy::Exponential => {
                let factor = self.backoff_factor.powi(attempt as i32);
                Duration::from_secs_f64(self.base_delay.as_secs_f64() * factor)
            }
        };
        raw.min(self.max_delay)
    }
}

/// Observable state of one circuit breaker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Calls flow normally
    Closed,
    /// Calls are rejected until the recovery timeout elapses
    Open,
    /// A limited number of probe calls are admitted
    HalfOpen,
}

/// Tunables for one circuit breaker
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures that trip the breaker
    pub failure_threshold: u32,
    /// How long an open breaker rejects calls before probing
    pub recovery_timeout: Duration,
    /// Probe calls admitted while half-open
    pub half_open_max_calls: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout: Duration::from_secs(60),
            half_open_max_calls: 3,
        }
    }
}

impl CircuitBreakerConfig {
    pub fn from_config(config: &ErrorHandlingConfig) -> Self {
        Self {
            failure_threshold: config.circuit_failure_threshold,
            recovery_timeout: Duration::from_secs(config.circuit_recovery_timeout_seconds),
            ..Default::default()
        }
    }
}

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    half_open_calls: u32,
    config: CircuitBreakerConfig,
}

impl BreakerState {
    fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            opened_at: None,
            half_open_calls: 0,
            config,
        }
    }

    /// Decide whether a call may proceed, advancing Open -> HalfOpen when
    /// the recovery timeout has elapsed
    fn admit(&mut self) -> bool {
        match self.state {
            CircuitState::Closed => true,
            CircuitState::Open => {
                let elapsed = self.opened_at.map(|t| t.elapsed()).unwrap_or_default();
                if elapsed >= self.config.recovery_timeout {
                    self.state = CircuitState::HalfOpen;
                    self.half_open_calls = 1;
                    true
                } else {
                    false
                }
            }
            CircuitState::HalfOpen => {
                if self.half_open_calls < self.config.half_open_max_calls {
                    self.half_open_calls += 1;
                    true
                } else {
                    false
                }
            }
        }
    }

    fn record_success(&mut self) {
        self.consecutive_failures = 0;
        if self.state == CircuitState::HalfOpen {
            self.state = CircuitState::Closed;
            self.opened_at = None;
            self.half_open_calls = 0;
        }
    }

    fn record_failure(&mut self) {
        self.consecutive_failures += 1;
        match self.state {
            CircuitState::HalfOpen => {
                self.state = CircuitState::Open;
                self.opened_at = Some(Instant::now());
                self.half_open_calls = 0;
            }
            CircuitState::Closed => {
                if self.consecutive_failures >= self.config.failure_threshold {
                    self.state = CircuitState::Open;
                    self.opened_at = Some(Instant::now());
                }
            }
            CircuitState::Open => {}
        }
    }
}

/// One recorded failure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub operation: String,
    pub error_code: ErrorCode,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// Severity attached to a fired alert
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    Low,
    Medium,
    High,
    Critical,
}

/// Fired when an error code crosses its configured threshold
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorAlert {
    pub severity: AlertSeverity,
    pub error_code: ErrorCode,
    /// Occurrences observed within the window
    pub count: u64,
    pub window_seconds: u64,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct AlertThreshold {
    count: u64,
    window: Duration,
    severity: AlertSeverity,
}

/// Aggregate error counters
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorMetrics {
    pub total_errors: u64,
    pub errors_by_code: HashMap<ErrorCode, u64>,
    pub errors_by_operation: HashMap<String, u64>,
    pub retry_attempts: u64,
    pub successful_recoveries: u64,
    pub failed_recoveries: u64,
}

/// Snapshot returned by [`ErrorHandler::statistics`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorStatistics {
    pub metrics: ErrorMetrics,
    /// Errors recorded in the last minute
    pub error_rate_per_minute: u64,
    pub circuit_states: HashMap<String, CircuitState>,
}

type ErrorHandlerFn = Box<dyn Fn(&AgentCoreError) -> ErrorResponse + Send + Sync>;
type ClassifierFn = Box<dyn Fn(&AgentCoreError) -> Option<ErrorCode> + Send + Sync>;
type AlertCallback = Box<dyn Fn(&ErrorAlert) -> anyhow::Result<()> + Send + Sync>;

/// Central error-handling engine
///
/// Cheap to share behind an `Arc`; every method takes `&self`. Internal
/// locks are held only for short critical sections and never across an
/// `.await`.
pub struct ErrorHandler {
    default_policy: RetryPolicy,
    policies: RwLock<HashMap<String, RetryPolicy>>,
    breakers: DashMap<String, Arc<Mutex<BreakerState>>>,
    handlers: RwLock<HashMap<ErrorCode, ErrorHandlerFn>>,
    classifier: RwLock<Option<ClassifierFn>>,
    metrics: Mutex<ErrorMetrics>,
    history: Mutex<VecDeque<ErrorRecord>>,
    alert_thresholds: RwLock<HashMap<ErrorCode, AlertThreshold>>,
    alert_callbacks: RwLock<Vec<AlertCallback>>,
}

impl ErrorHandler {
    pub fn new(config: &ErrorHandlingConfig) -> Self {
        Self {
            default_policy: RetryPolicy::from_config(config),
            policies: RwLock::new(HashMap::new()),
            breakers: DashMap::new(),
            handlers: RwLock::new(HashMap::new()),
            classifier: RwLock::new(None),
            metrics: Mutex::new(ErrorMetrics::default()),
            history: Mutex::new(VecDeque::with_capacity(HISTORY_CAPACITY)),
            alert_thresholds: RwLock::new(HashMap::new()),
            alert_callbacks: RwLock::new(Vec::new()),
        }
    }

    /// Override the retry policy for one operation
    pub fn set_retry_policy(&self, operation: impl Into<String>, policy: RetryPolicy) {
        self.policies
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(operation.into(), policy);
    }

    /// Configure a circuit breaker for one operation
    ///
    /// Operations without a breaker are never gated.
    pub fn set_circuit_breaker(&self, operation: impl Into<String>, config: CircuitBreakerConfig) {
        self.breakers
            .insert(operation.into(), Arc::new(Mutex::new(BreakerState::new(config))));
    }

    /// Register a custom responder for one error code
    pub fn register_handler<F>(&self, code: ErrorCode, handler: F)
    where
        F: Fn(&AgentCoreError) -> ErrorResponse + Send + Sync + 'static,
    {
        self.handlers
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(code, Box::new(handler));
    }

    /// Override the classification heuristic
    ///
    /// A `None` from the override falls back to the built-in heuristic.
    pub fn set_classifier<F>(&self, classifier: F)
    where
        F: Fn(&AgentCoreError) -> Option<ErrorCode> + Send + Sync + 'static,
    {
        *self.classifier.write().unwrap_or_else(|e| e.into_inner()) = Some(Box::new(classifier));
    }

    /// Alert whenever `code` occurs at least `count` times within `window`
    pub fn set_alert_threshold(
        &self,
        code: ErrorCode,
        count: u64,
        window: Duration,
        severity: AlertSeverity,
    ) {
        self.alert_thresholds
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(
                code,
                AlertThreshold {
                    count,
                    window,
                    severity,
                },
            );
    }

    /// Receive fired alerts
    ///
    /// Callback failures are logged and never propagate into the operation
    /// that triggered the alert.
    pub fn on_alert<F>(&self, callback: F)
    where
        F: Fn(&ErrorAlert) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.alert_callbacks
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(Box::new(callback));
    }

    /// Run an async operation under the retry policy and circuit breaker
    /// registered for `operation`
    ///
    /// The breaker (when configured) is consulted once, before the first
    /// attempt. Non-retryable errors and exhausted budgets return the last
    /// error unchanged.
    pub async fn execute_with_retry<T, F, Fut>(&self, operation: &str, mut call: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let breaker = self.breakers.get(operation).map(|entry| entry.value().clone());

        if let Some(breaker) = &breaker {
            let admitted = breaker.lock().unwrap_or_else(|e| e.into_inner()).admit();
            if !admitted {
                warn!("⛔ Circuit open, rejecting '{}'", operation);
                let err = AgentCoreError::CircuitOpen(operation.to_string());
                self.record_error(operation, ErrorCode::CircuitOpen, &err.to_string());
                return Err(err);
            }
        }

        let policy = {
            let policies = self.policies.read().unwrap_or_else(|e| e.into_inner());
            policies.get(operation).cloned().unwrap_or_else(|| self.default_policy.clone())
        };

        let started = Instant::now();
        let mut attempt: u32 = 0;

        loop {
            match call().await {
                Ok(value) => {
                    if let Some(breaker) = &breaker {
                        breaker
                            .lock()
                            .unwrap_or_else(|e| e.into_inner())
                            .record_success();
                    }
                    if attempt > 0 {
                        self.metrics
                            .lock()
                            .unwrap_or_else(|e| e.into_inner())
                            .successful_recoveries += 1;
                        info!(
                            "✅ '{}' recovered after {} retry attempt(s)",
                            operation, attempt
                        );
                    }
                    return Ok(value);
                }
                Err(err) => {
                    let code = self.classify(&err);
                    self.record_error(operation, code, &err.to_string());

                    if let Some(breaker) = &breaker {
                        breaker
                            .lock()
                            .unwrap_or_else(|e| e.into_inner())
                            .record_failure();
                    }

                    if !policy.retryable.contains(&code) {
                        debug!("🚫 '{}' failed with non-retryable {}", operation, code);
                        self.metrics
                            .lock()
                            .unwrap_or_else(|e| e.into_inner())
                            .failed_recoveries += 1;
                        return Err(err);
                    }

                    if attempt >= policy.max_retries {
                        error!(
                            "❌ '{}' exhausted {} retries: {}",
                            operation, policy.max_retries, err
                        );
                        self.metrics
                            .lock()
                            .unwrap_or_else(|e| e.into_inner())
                            .failed_recoveries += 1;
                        return Err(err);
                    }

                    let mut delay = policy.delay_for_attempt(attempt);
                    if policy.jitter {
                        let scale = rand::thread_rng().gen_range(0.5..1.0);
                        delay = delay.mul_f64(scale);
                    }

                    if let Some(deadline) = policy.overall_deadline {
                        if started.elapsed() + delay >= deadline {
                            warn!("⏱️  '{}' hit its overall retry deadline", operation);
                            self.metrics
                                .lock()
                                .unwrap_or_else(|e| e.into_inner())
                                .failed_recoveries += 1;
                            return Err(err);
                        }
                    }

                    debug!(
                        "🔁 Retrying '{}' in {:?} (attempt {} of {})",
                        operation,
                        delay,
                        attempt + 1,
                        policy.max_retries
                    );
                    self.metrics
                        .lock()
                        .unwrap_or_else(|e| e.into_inner())
                        .retry_attempts += 1;
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    /// Turn an agent failure into the response callers receive
    ///
    /// Never fails: whatever happened, the caller gets an `AgentResponse`
    /// with `success == false` and a structured payload under
    /// `metadata["error"]`.
    pub fn handle_agent_error(&self, err: &AgentCoreError, request: &AgentRequest) -> AgentResponse {
        let payload = self
            .build_error_response(err)
            .with_detail("agent_type", Value::String(request.agent_type.clone()))
            .with_detail("request_id", Value::String(request.request_id.clone()));

        self.record_error(
            &format!("agent:{}", request.agent_type),
            payload.error_code,
            &payload.message,
        );

        let mut response =
            AgentResponse::failure(&request.agent_type, &request.request_id, &payload.message);
        response.metadata.insert(
            "error".to_string(),
            serde_json::to_value(&payload).unwrap_or(Value::Null),
        );
        response
    }

    /// Turn a tool failure into a standardized [`ToolResult`]
    pub fn handle_tool_error(&self, tool_name: &str, err: &AgentCoreError) -> ToolResult {
        let payload = self
            .build_error_response(err)
            .with_detail("tool", Value::String(tool_name.to_string()));

        self.record_error(&format!("tool:{tool_name}"), payload.error_code, &payload.message);

        let mut result = ToolResult::failure(&payload.message);
        result.metadata.insert(
            "error".to_string(),
            serde_json::to_value(&payload).unwrap_or(Value::Null),
        );
        result
    }

    pub fn handle_validation_error(&self, message: impl Into<String>) -> ErrorResponse {
        let payload = ErrorResponse::new(ErrorCode::Validation, message);
        self.record_error("validation", ErrorCode::Validation, &payload.message);
        payload
    }

    pub fn handle_authentication_error(&self, message: impl Into<String>) -> ErrorResponse {
        let payload = ErrorResponse::new(ErrorCode::Authentication, message);
        self.record_error("authentication", ErrorCode::Authentication, &payload.message);
        payload
    }

    /// Snapshot metrics, recent error rate, and breaker states
    pub fn statistics(&self) -> ErrorStatistics {
        let metrics = self
            .metrics
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone();

        let cutoff = Utc::now() - chrono::Duration::seconds(60);
        let error_rate_per_minute = self
            .history
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|r| r.timestamp >= cutoff)
            .count() as u64;

        let circuit_states = self
            .breakers
            .iter()
            .map(|entry| {
                let state = entry.value().lock().unwrap_or_else(|e| e.into_inner()).state;
                (entry.key().clone(), state)
            })
            .collect();

        ErrorStatistics {
            metrics,
            error_rate_per_minute,
            circuit_states,
        }
    }

    /// Most recent errors, newest last, up to `limit`
    pub fn recent_errors(&self, limit: usize) -> Vec<ErrorRecord> {
        let history = self.history.lock().unwrap_or_else(|e| e.into_inner());
        let skip = history.len().saturating_sub(limit);
        history.iter().skip(skip).cloned().collect()
    }

    /// Drop all recorded history and counters
    pub fn clear_history(&self) {
        self.history
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
        *self.metrics.lock().unwrap_or_else(|e| e.into_inner()) = ErrorMetrics::default();
    }

    /// Current state of one breaker, if configured
    pub fn circuit_state(&self, operation: &str) -> Option<CircuitState> {
        self.breakers
            .get(operation)
            .map(|entry| entry.value().lock().unwrap_or_else(|e| e.into_inner()).state)
    }

    fn classify(&self, err: &AgentCoreError) -> ErrorCode {
        // A rejected breaker call keeps its code regardless of classifier
        if matches!(err, AgentCoreError::CircuitOpen(_)) {
            return ErrorCode::CircuitOpen;
        }
        let classifier = self.classifier.read().unwrap_or_else(|e| e.into_inner());
        classifier
            .as_ref()
            .and_then(|f| f(err))
            .unwrap_or_else(|| ErrorCode::classify(err))
    }

    fn build_error_response(&self, err: &AgentCoreError) -> ErrorResponse {
        let code = self.classify(err);
        let handlers = self.handlers.read().unwrap_or_else(|e| e.into_inner());
        match handlers.get(&code) {
            Some(handler) => handler(err),
            None => ErrorResponse::new(code, err.to_string()),
        }
    }

    fn record_error(&self, operation: &str, code: ErrorCode, message: &str) {
        {
            let mut metrics = self.metrics.lock().unwrap_or_else(|e| e.into_inner());
            metrics.total_errors += 1;
            *metrics.errors_by_code.entry(code).or_insert(0) += 1;
            *metrics.errors_by_operation.entry(operation.to_string()).or_insert(0) += 1;
        }

        {
            let mut history = self.history.lock().unwrap_or_else(|e| e.into_inner());
            if history.len() >= HISTORY_CAPACITY {
                history.pop_front();
            }
            history.push_back(ErrorRecord {
                operation: operation.to_string(),
                error_code: code,
                message: message.to_string(),
                timestamp: Utc::now(),
            });
        }

        self.check_alerts(code);
    }

    fn check_alerts(&self, code: ErrorCode) {
        let threshold = {
            let thresholds = self.alert_thresholds.read().unwrap_or_else(|e| e.into_inner());
            match thresholds.get(&code) {
                Some(t) => t.clone(),
                None => return,
            }
        };

        let cutoff = Utc::now()
            - chrono::Duration::from_std(threshold.window)
                .unwrap_or_else(|_| chrono::Duration::seconds(300));
        let count = self
            .history
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|r| r.error_code == code && r.timestamp >= cutoff)
            .count() as u64;

        if count < threshold.count {
            return;
        }

        let alert = ErrorAlert {
            severity: threshold.severity,
            error_code: code,
            count,
            window_seconds: threshold.window.as_secs(),
            message: format!(
                "{code} occurred {count} time(s) within {}s",
                threshold.window.as_secs()
            ),
            timestamp: Utc::now(),
        };
        warn!("🚨 Error alert: {}", alert.message);

        let callbacks = self.alert_callbacks.read().unwrap_or_else(|e| e.into_inner());
        for callback in callbacks.iter() {
            if let Err(e) = callback(&alert) {
                warn!("Alert callback failed: {}", e);
            }
        }
    }
}

impl std::fmt::Debug for ErrorHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ErrorHandler")
            .field("default_policy", &self.default_policy)
            .field("breakers", &self.breakers.len())
            .finish_non_exhaustive()
    }
}
