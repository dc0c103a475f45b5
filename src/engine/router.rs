// Request-to-agent routing

//! # Agent Router
//!
//! Routing runs in two phases. A request whose `agent_type` names a
//! registered agent goes straight to it. Otherwise every registered routing
//! rule is evaluated and the highest-priority rule whose conditions all hold
//! wins. A rule with no conditions matches everything, which makes it a
//! natural catch-all at low priority.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

use crate::models::AgentRequest;
use crate::{AgentCoreError, Result};

/// Conditions a request must satisfy for a rule to match
///
/// All populated conditions must hold (logical AND). Empty conditions always
/// match.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RouteConditions {
    /// Required context entries, matched by equality
    #[serde(default)]
    pub context: HashMap<String, Value>,

    /// Required metadata entries, matched by equality
    #[serde(default)]
    pub metadata: HashMap<String, Value>,

    /// Substrings that must all appear in the prompt (case-insensitive)
    #[serde(default)]
    pub prompt_contains: Vec<String>,
}

impl RouteConditions {
    pub fn is_empty(&self) -> bool {
        self.context.is_empty() && self.metadata.is_empty() && self.prompt_contains.is_empty()
    }

    /// Check whether a request satisfies every populated condition
    pub fn matches(&self, request: &AgentRequest) -> bool {
        for (key, expected) in &self.context {
            if request.context.get(key) != Some(expected) {
                return false;
            }
        }
        for (key, expected) in &self.metadata {
            if request.metadata.get(key) != Some(expected) {
                return false;
            }
        }
        if !self.prompt_contains.is_empty() {
            let prompt = request.prompt.to_lowercase();
            for needle in &self.prompt_contains {
                if !prompt.contains(&needle.to_lowercase()) {
                    return false;
                }
            }
        }
        true
    }
}

/// A condition-based routing rule for one agent type
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingRule {
    pub agent_type: String,

    /// Higher wins when several rules match
    pub priority: i32,

    pub conditions: RouteConditions,
}

/// Maps incoming requests to registered agent types
#[derive(Debug, Default)]
pub struct AgentRouter {
    rules: RwLock<Vec<RoutingRule>>,
}

impl AgentRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the routing rule for an agent type
    ///
    /// Each agent type holds exactly one rule; registering again replaces
    /// it. Rules are kept sorted by descending priority so route evaluation
    /// can stop at the first match.
    pub async fn register_agent_type(
        &self,
        agent_type: impl Into<String>,
        priority: i32,
        conditions: RouteConditions,
    ) {
        let rule = RoutingRule {
            agent_type: agent_type.into(),
            priority,
            conditions,
        };
        let mut rules = self.rules.write().await;
        rules.retain(|r| r.agent_type != rule.agent_type);
        rules.push(rule);
        rules.sort_by(|a, b| b.priority.cmp(&a.priority));
    }

    /// Remove every rule for an agent type
    pub async fn unregister_agent_type(&self, agent_type: &str) {
        let mut rules = self.rules.write().await;
        rules.retain(|r| r.agent_type != agent_type);
    }

    /// Resolve a request to an agent type
    ///
    /// Direct type match wins. Otherwise the highest-priority matching rule
    /// decides. Fails with `AgentNotFound` when nothing matches.
    pub async fn route(&self, request: &AgentRequest) -> Result<String> {
        let rules = self.rules.read().await;

        if rules.iter().any(|r| r.agent_type == request.agent_type) {
            debug!("🔀 Direct route for request type '{}'", request.agent_type);
            return Ok(request.agent_type.clone());
        }

        for rule in rules.iter() {
            if rule.conditions.matches(request) {
                debug!(
                    "🔀 Rule route '{}' -> '{}' (priority {})",
                    request.agent_type, rule.agent_type, rule.priority
                );
                return Ok(rule.agent_type.clone());
            }
        }

        Err(AgentCoreError::AgentNotFound(request.agent_type.clone()))
    }

    pub async fn registered_types(&self) -> Vec<String> {
        let rules = self.rules.read().await;
        let mut types: Vec<String> = rules.iter().map(|r| r.agent_type.clone()).collect();
        types.sort();
        types.dedup();
        types
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(agent_type: &str, prompt: &str) -> AgentRequest {
        AgentRequest::new(agent_type, prompt).unwrap()
    }

    #[tokio::test]
    async fn test_direct_type_match() {
        let router = AgentRouter::new();
        router
            .register_agent_type("props", 1, RouteConditions::default())
            .await;

        let routed = router.route(&request("props", "count walls")).await.unwrap();
        assert_eq!(routed, "props");
    }

    #[tokio::test]
    async fn test_prompt_condition_routing() {
        let router = AgentRouter::new();
        router
            .register_agent_type("general", 1, RouteConditions::default())
            .await;
        router
            .register_agent_type(
                "escalation",
                5,
                RouteConditions {
                    prompt_contains: vec!["urgent".into()],
                    ..Default::default()
                },
            )
            .await;

        let routed = router
            .route(&request("unknown", "URGENT: ship it"))
            .await
            .unwrap();
        assert_eq!(routed, "escalation");

        let routed = router
            .route(&request("unknown", "normal task"))
            .await
            .unwrap();
        assert_eq!(routed, "general");
    }

    #[tokio::test]
    async fn test_priority_breaks_ties() {
        let router = AgentRouter::new();
        router
            .register_agent_type("low", 1, RouteConditions::default())
            .await;
        router
            .register_agent_type("high", 10, RouteConditions::default())
            .await;

        let routed = router.route(&request("unknown", "anything")).await.unwrap();
        assert_eq!(routed, "high");
    }

    #[tokio::test]
    async fn test_context_and_metadata_equality() {
        let router = AgentRouter::new();
        router
            .register_agent_type(
                "project_scoped",
                5,
                RouteConditions {
                    context: HashMap::from([("project_id".to_string(), json!("p-1"))]),
                    metadata: HashMap::from([("channel".to_string(), json!("chat"))]),
                    prompt_contains: vec![],
                },
            )
            .await;

        let matching = request("unknown", "do things")
            .with_context("project_id", json!("p-1"))
            .with_metadata("channel", json!("chat"));
        assert_eq!(router.route(&matching).await.unwrap(), "project_scoped");

        let wrong_project = request("unknown", "do things")
            .with_context("project_id", json!("p-2"))
            .with_metadata("channel", json!("chat"));
        assert!(router.route(&wrong_project).await.is_err());
    }

    #[tokio::test]
    async fn test_no_match_is_agent_not_found() {
        let router = AgentRouter::new();
        let result = router.route(&request("ghost", "hello")).await;
        assert!(matches!(result, Err(AgentCoreError::AgentNotFound(t)) if t == "ghost"));
    }

    #[tokio::test]
    async fn test_reregistration_replaces_rule() {
        let router = AgentRouter::new();
        router
            .register_agent_type(
                "props",
                1,
                RouteConditions {
                    prompt_contains: vec!["walls".into()],
                    ..Default::default()
                },
            )
            .await;
        router
            .register_agent_type("props", 10, RouteConditions::default())
            .await;

        // only the replacement rule remains, so any prompt routes
        assert_eq!(router.registered_types().await, vec!["props".to_string()]);
        let routed = router.route(&request("unknown", "no condition words")).await.unwrap();
        assert_eq!(routed, "props");
    }

    #[tokio::test]
    async fn test_registered_types_are_sorted_and_unique() {
        let router = AgentRouter::new();
        router.register_agent_type("zeta", 5, RouteConditions::default()).await;
        router.register_agent_type("alpha", 1, RouteConditions::default()).await;
        router.register_agent_type("mid", 3, RouteConditions::default()).await;
        // duplicate registration collapses into one entry
        router.register_agent_type("zeta", 2, RouteConditions::default()).await;

        assert_eq!(
            router.registered_types().await,
            vec!["alpha".to_string(), "mid".to_string(), "zeta".to_string()]
        );
    }

    #[tokio::test]
    async fn test_unregister_removes_rules() {
        let router = AgentRouter::new();
        router
            .register_agent_type("props", 1, RouteConditions::default())
            .await;
        router.unregister_agent_type("props").await;
        assert!(router.route(&request("props", "count walls")).await.is_err());
    }
}
