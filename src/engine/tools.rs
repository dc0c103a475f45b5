// Tool inventory, discovery, and lifecycle

//! # Tool Registry
//!
//! Tools register as factories, not instances. The registry builds an
//! instance lazily on first use and caches it as a singleton; passing
//! explicit init arguments builds a fresh, uncached instance instead.
//! Discovery runs over three indexes (category, tags, agent assignment)
//! plus free-text search over names and descriptions.
//!
//! All registry state sits behind one `RwLock`; the lock is never held
//! across an `.await`, so factories must be synchronous and lifecycle
//! calls happen after instances are collected out of the lock.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};
use tracing::{info, warn};

use crate::models::ToolResult;
use crate::{AgentCoreError, Result};

/// An invocable capability agents can share
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON schema describing the accepted `execute` arguments
    fn parameter_schema(&self) -> Value;

    /// Run the tool; failures come back as a `ToolResult`, not a panic
    async fn execute(&self, args: Value) -> Result<ToolResult>;

    /// Optional startup hook
    async fn initialize(&self) -> Result<()> {
        Ok(())
    }

    /// Optional shutdown hook
    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }
}

/// Broad grouping used for discovery
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolCategory {
    DataAccess,
    QueryExecution,
    FileOperations,
    Authentication,
    Caching,
    Transformation,
    Validation,
    Monitoring,
    General,
}

/// Static description supplied at registration time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolMetadata {
    pub name: String,
    pub description: String,
    pub category: ToolCategory,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Names of other registered tools this one requires
    #[serde(default)]
    pub dependencies: Vec<String>,
    /// Agent types granted access to this tool at registration
    #[serde(default)]
    pub agent_types: Vec<String>,
    #[serde(default = "default_version")]
    pub version: String,
}

fn default_version() -> String {
    "1.0.0".to_string()
}

impl ToolMetadata {
    pub fn new(name: impl Into<String>, description: impl Into<String>, category: ToolCategory) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            category,
            tags: Vec::new(),
            dependencies: Vec::new(),
            agent_types: Vec::new(),
            version: default_version(),
        }
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_dependencies(mut self, dependencies: Vec<String>) -> Self {
        self.dependencies = dependencies;
        self
    }

    pub fn with_agent_types(mut self, agent_types: Vec<String>) -> Self {
        self.agent_types = agent_types;
        self
    }
}

/// Public view of one registered tool
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub metadata: ToolMetadata,
    pub enabled: bool,
    pub usage_count: u64,
    pub last_used: Option<DateTime<Utc>>,
    /// Whether the singleton instance has been built
    pub instantiated: bool,
}

/// Counters reported by [`ToolRegistry::stats`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolRegistryStats {
    pub total_tools: u64,
    pub enabled_tools: u64,
    pub disabled_tools: u64,
    pub instantiated_tools: u64,
    pub total_usage: u64,
    pub tools_by_category: HashMap<ToolCategory, u64>,
    /// Assigned tool counts per agent type
    pub tools_by_agent: HashMap<String, u64>,
}

type ToolFactory = Box<dyn Fn(Option<Value>) -> Result<Arc<dyn Tool>> + Send + Sync>;

struct ToolRegistration {
    factory: ToolFactory,
    metadata: ToolMetadata,
    instance: Option<Arc<dyn Tool>>,
    enabled: bool,
    usage_count: u64,
    last_used: Option<DateTime<Utc>>,
}

#[derive(Default)]
struct RegistryInner {
    tools: HashMap<String, ToolRegistration>,
    categories: HashMap<ToolCategory, HashSet<String>>,
    agent_tools: HashMap<String, HashSet<String>>,
}

/// Inventory of tools with lazy instantiation and discovery indexes
#[derive(Default)]
pub struct ToolRegistry {
    inner: RwLock<RegistryInner>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool factory under its metadata name
    ///
    /// Agent types named in the metadata are granted access immediately.
    pub fn register<F>(&self, metadata: ToolMetadata, factory: F) -> Result<()>
    where
        F: Fn(Option<Value>) -> Result<Arc<dyn Tool>> + Send + Sync + 'static,
    {
        if metadata.name.trim().is_empty() {
            return Err(AgentCoreError::Validation("tool name is required".into()));
        }

        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        if inner.tools.contains_key(&metadata.name) {
            return Err(AgentCoreError::ToolAlreadyRegistered(metadata.name));
        }

        let name = metadata.name.clone();
        inner
            .categories
            .entry(metadata.category)
            .or_default()
            .insert(name.clone());
        for agent_type in &metadata.agent_types {
            inner
                .agent_tools
                .entry(agent_type.clone())
                .or_default()
                .insert(name.clone());
        }
        inner.tools.insert(
            name.clone(),
            ToolRegistration {
                factory: Box::new(factory),
                metadata,
                instance: None,
                enabled: true,
                usage_count: 0,
                last_used: None,
            },
        );
        info!("🔧 Tool '{}' registered", name);
        Ok(())
    }

    /// Remove a tool from the registry and all indexes
    ///
    /// The singleton instance (when built) is shut down best-effort.
    pub async fn unregister(&self, name: &str) -> Result<()> {
        let registration = {
            let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
            let Some(registration) = inner.tools.remove(name) else {
                return Err(AgentCoreError::ToolNotFound(name.to_string()));
            };

            let category = registration.metadata.category;
            if let Some(set) = inner.categories.get_mut(&category) {
                set.remove(name);
                if set.is_empty() {
                    inner.categories.remove(&category);
                }
            }
            let emptied: Vec<String> = inner
                .agent_tools
                .iter_mut()
                .filter_map(|(agent, set)| {
                    set.remove(name);
                    set.is_empty().then(|| agent.clone())
                })
                .collect();
            for agent in emptied {
                inner.agent_tools.remove(&agent);
            }
            registration
        };

        if let Some(instance) = registration.instance {
            if let Err(e) = instance.shutdown().await {
                warn!("Tool '{}' shutdown failed: {}", name, e);
            }
        }
        info!("🔧 Tool '{}' unregistered", name);
        Ok(())
    }

    /// Get a usable instance of a tool
    ///
    /// Without init arguments the cached singleton is returned (built on
    /// first call). With arguments a fresh instance is built and not cached.
    pub fn get_instance(&self, name: &str, init_args: Option<Value>) -> Result<Arc<dyn Tool>> {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        let registration = inner
            .tools
            .get_mut(name)
            .ok_or_else(|| AgentCoreError::ToolNotFound(name.to_string()))?;

        if !registration.enabled {
            return Err(AgentCoreError::ToolDisabled(name.to_string()));
        }

        let instance = match init_args {
            Some(args) => (registration.factory)(Some(args))?,
            None => match &registration.instance {
                Some(instance) => Arc::clone(instance),
                None => {
                    let instance = (registration.factory)(None)?;
                    registration.instance = Some(Arc::clone(&instance));
                    instance
                }
            },
        };

        registration.usage_count += 1;
        registration.last_used = Some(Utc::now());
        Ok(instance)
    }

    /// Grant an agent type access to a tool
    pub fn assign_to_agent(&self, agent_type: &str, tool_name: &str) -> Result<()> {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        if !inner.tools.contains_key(tool_name) {
            return Err(AgentCoreError::ToolNotFound(tool_name.to_string()));
        }
        inner
            .agent_tools
            .entry(agent_type.to_string())
            .or_default()
            .insert(tool_name.to_string());
        Ok(())
    }

    /// Revoke an agent type's access to a tool
    pub fn unassign_from_agent(&self, agent_type: &str, tool_name: &str) {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        let emptied = inner
            .agent_tools
            .get_mut(agent_type)
            .map(|set| {
                set.remove(tool_name);
                set.is_empty()
            })
            .unwrap_or(false);
        if emptied {
            inner.agent_tools.remove(agent_type);
        }
    }

    pub fn get_tools_for_agent(&self, agent_type: &str) -> Vec<ToolDescriptor> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        inner
            .agent_tools
            .get(agent_type)
            .map(|names| {
                let mut tools: Vec<ToolDescriptor> = names
                    .iter()
                    .filter_map(|name| inner.tools.get(name).map(describe))
                    .collect();
                tools.sort_by(|a, b| a.metadata.name.cmp(&b.metadata.name));
                tools
            })
            .unwrap_or_default()
    }

    pub fn get_tools_by_category(&self, category: ToolCategory) -> Vec<ToolDescriptor> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        inner
            .categories
            .get(&category)
            .map(|names| {
                let mut tools: Vec<ToolDescriptor> = names
                    .iter()
                    .filter_map(|name| inner.tools.get(name).map(describe))
                    .collect();
                tools.sort_by(|a, b| a.metadata.name.cmp(&b.metadata.name));
                tools
            })
            .unwrap_or_default()
    }

    /// Tools carrying at least one of the given tags
    pub fn get_tools_by_tags(&self, tags: &[String]) -> Vec<ToolDescriptor> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        let mut tools: Vec<ToolDescriptor> = inner
            .tools
            .values()
            .filter(|r| r.metadata.tags.iter().any(|t| tags.contains(t)))
            .map(describe)
            .collect();
        tools.sort_by(|a, b| a.metadata.name.cmp(&b.metadata.name));
        tools
    }

    /// Case-insensitive substring search over names and descriptions
    ///
    /// The optional filters narrow the result set further; a tool must
    /// satisfy every filter that is given.
    pub fn search(
        &self,
        query: &str,
        category: Option<ToolCategory>,
        agent_type: Option<&str>,
        tags: Option<&[String]>,
    ) -> Vec<ToolDescriptor> {
        let needle = query.to_lowercase();
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        let assigned = agent_type.and_then(|agent| inner.agent_tools.get(agent));
        let mut tools: Vec<ToolDescriptor> = inner
            .tools
            .values()
            .filter(|r| {
                r.metadata.name.to_lowercase().contains(&needle)
                    || r.metadata.description.to_lowercase().contains(&needle)
            })
            .filter(|r| category.map_or(true, |c| r.metadata.category == c))
            .filter(|r| match (agent_type, assigned) {
                (None, _) => true,
                (Some(_), Some(names)) => names.contains(&r.metadata.name),
                (Some(_), None) => false,
            })
            .filter(|r| {
                tags.map_or(true, |tags| r.metadata.tags.iter().any(|t| tags.contains(t)))
            })
            .map(describe)
            .collect();
        tools.sort_by(|a, b| a.metadata.name.cmp(&b.metadata.name));
        tools
    }

    pub fn list(&self) -> Vec<ToolDescriptor> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        let mut tools: Vec<ToolDescriptor> = inner.tools.values().map(describe).collect();
        tools.sort_by(|a, b| a.metadata.name.cmp(&b.metadata.name));
        tools
    }

    /// Unmet dependencies per tool; empty means every declared dependency
    /// names a registered, enabled tool
    pub fn validate_dependencies(&self) -> HashMap<String, Vec<String>> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        let mut missing = HashMap::new();
        for (name, registration) in &inner.tools {
            let unmet: Vec<String> = registration
                .metadata
                .dependencies
                .iter()
                .filter(|dep| !inner.tools.get(*dep).map(|r| r.enabled).unwrap_or(false))
                .cloned()
                .collect();
            if !unmet.is_empty() {
                missing.insert(name.clone(), unmet);
            }
        }
        missing
    }

    pub fn enable(&self, name: &str) -> Result<()> {
        self.set_enabled(name, true)
    }

    pub fn disable(&self, name: &str) -> Result<()> {
        self.set_enabled(name, false)
    }

    fn set_enabled(&self, name: &str, enabled: bool) -> Result<()> {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        let registration = inner
            .tools
            .get_mut(name)
            .ok_or_else(|| AgentCoreError::ToolNotFound(name.to_string()))?;
        registration.enabled = enabled;
        Ok(())
    }

    pub fn stats(&self) -> ToolRegistryStats {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        let tools_by_category = inner
            .categories
            .iter()
            .map(|(category, names)| (*category, names.len() as u64))
            .collect();
        let tools_by_agent = inner
            .agent_tools
            .iter()
            .map(|(agent, names)| (agent.clone(), names.len() as u64))
            .collect();
        let enabled = inner.tools.values().filter(|r| r.enabled).count() as u64;
        ToolRegistryStats {
            total_tools: inner.tools.len() as u64,
            enabled_tools: enabled,
            disabled_tools: inner.tools.len() as u64 - enabled,
            instantiated_tools: inner.tools.values().filter(|r| r.instance.is_some()).count() as u64,
            total_usage: inner.tools.values().map(|r| r.usage_count).sum(),
            tools_by_category,
            tools_by_agent,
        }
    }

    /// Initialize every materialized instance, best-effort
    pub async fn initialize(&self) {
        let instances = self.materialized_instances();
        for (name, instance) in instances {
            if let Err(e) = instance.initialize().await {
                warn!("Tool '{}' initialization failed: {}", name, e);
            }
        }
    }

    /// Shut down every materialized instance, best-effort
    pub async fn shutdown(&self) {
        let instances = self.materialized_instances();
        for (name, instance) in instances {
            if let Err(e) = instance.shutdown().await {
                warn!("Tool '{}' shutdown failed: {}", name, e);
            }
        }
    }

    fn materialized_instances(&self) -> Vec<(String, Arc<dyn Tool>)> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        inner
            .tools
            .iter()
            .filter_map(|(name, r)| r.instance.as_ref().map(|i| (name.clone(), Arc::clone(i))))
            .collect()
    }
}

fn describe(registration: &ToolRegistration) -> ToolDescriptor {
    ToolDescriptor {
        metadata: registration.metadata.clone(),
        enabled: registration.enabled,
        usage_count: registration.usage_count,
        last_used: registration.last_used,
        instantiated: registration.instance.is_some(),
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        f.debug_struct("ToolRegistry")
            .field("tools", &inner.tools.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct CounterTool {
        name: String,
    }

    #[async_trait]
    impl Tool for CounterTool {
        fn name(&self) -> &str {
            &self.name
        }

        fn description(&self) -> &str {
            "counts things in the model"
        }

        fn parameter_schema(&self) -> Value {
            json!({"type": "object", "properties": {"what": {"type": "string"}}})
        }

        async fn execute(&self, args: Value) -> Result<ToolResult> {
            Ok(ToolResult::success(json!({"counted": args["what"]})))
        }
    }

    fn register_counter(registry: &ToolRegistry, name: &str, category: ToolCategory) {
        let owned = name.to_string();
        registry
            .register(
                ToolMetadata::new(name, "counts things in the model", category),
                move |_| Ok(Arc::new(CounterTool { name: owned.clone() }) as Arc<dyn Tool>),
            )
            .unwrap();
    }

    #[test]
    fn test_duplicate_registration_fails() {
        let registry = ToolRegistry::new();
        register_counter(&registry, "counter", ToolCategory::QueryExecution);
        let result = registry.register(
            ToolMetadata::new("counter", "again", ToolCategory::General),
            |_| Err(AgentCoreError::Tool("unreachable".into())),
        );
        assert!(matches!(result, Err(AgentCoreError::ToolAlreadyRegistered(_))));
    }

    #[test]
    fn test_singleton_instance_and_usage_count() {
        let registry = ToolRegistry::new();
        let builds = Arc::new(AtomicU32::new(0));
        let counter = builds.clone();
        registry
            .register(
                ToolMetadata::new("counter", "counts", ToolCategory::QueryExecution),
                move |_| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(Arc::new(CounterTool {
                        name: "counter".into(),
                    }) as Arc<dyn Tool>)
                },
            )
            .unwrap();

        let a = registry.get_instance("counter", None).unwrap();
        let b = registry.get_instance("counter", None).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(builds.load(Ordering::SeqCst), 1);

        // explicit args build a fresh, uncached instance
        let c = registry.get_instance("counter", Some(json!({"x": 1}))).unwrap();
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(builds.load(Ordering::SeqCst), 2);

        let descriptor = &registry.list()[0];
        assert_eq!(descriptor.usage_count, 3);
        assert!(descriptor.last_used.is_some());
    }

    #[test]
    fn test_missing_and_disabled_errors() {
        let registry = ToolRegistry::new();
        assert!(matches!(
            registry.get_instance("ghost", None),
            Err(AgentCoreError::ToolNotFound(_))
        ));

        register_counter(&registry, "counter", ToolCategory::QueryExecution);
        registry.disable("counter").unwrap();
        assert!(matches!(
            registry.get_instance("counter", None),
            Err(AgentCoreError::ToolDisabled(_))
        ));

        registry.enable("counter").unwrap();
        assert!(registry.get_instance("counter", None).is_ok());
    }

    #[test]
    fn test_discovery_indexes() {
        let registry = ToolRegistry::new();
        register_counter(&registry, "wall_counter", ToolCategory::QueryExecution);
        register_counter(&registry, "door_counter", ToolCategory::QueryExecution);
        register_counter(&registry, "auth_helper", ToolCategory::Authentication);

        let by_category = registry.get_tools_by_category(ToolCategory::QueryExecution);
        assert_eq!(by_category.len(), 2);
        assert_eq!(by_category[0].metadata.name, "door_counter");

        let found = registry.search("WALL", None, None, None);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].metadata.name, "wall_counter");

        assert!(registry.get_tools_by_category(ToolCategory::Caching).is_empty());
    }

    #[test]
    fn test_search_filters_combine() {
        let registry = ToolRegistry::new();
        registry
            .register(
                ToolMetadata::new("wall_counter", "counts walls", ToolCategory::QueryExecution)
                    .with_tags(vec!["bim".into()])
                    .with_agent_types(vec!["props".into()]),
                |_| Ok(Arc::new(CounterTool { name: "wall_counter".into() }) as Arc<dyn Tool>),
            )
            .unwrap();
        registry
            .register(
                ToolMetadata::new("wall_painter", "paints walls", ToolCategory::Transformation)
                    .with_tags(vec!["bim".into()]),
                |_| Ok(Arc::new(CounterTool { name: "wall_painter".into() }) as Arc<dyn Tool>),
            )
            .unwrap();

        // category narrows the text match
        let found = registry.search("wall", Some(ToolCategory::QueryExecution), None, None);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].metadata.name, "wall_counter");

        // agent filter keeps only assigned tools
        let found = registry.search("wall", None, Some("props"), None);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].metadata.name, "wall_counter");
        assert!(registry.search("wall", None, Some("nobody"), None).is_empty());

        // tag filter applies on top of the rest
        let tags = vec!["bim".to_string()];
        let found = registry.search("wall", None, None, Some(&tags));
        assert_eq!(found.len(), 2);
        let misses = vec!["cad".to_string()];
        assert!(registry.search("wall", None, None, Some(&misses)).is_empty());

        // all filters must hold at once
        let found = registry.search(
            "wall",
            Some(ToolCategory::Transformation),
            Some("props"),
            Some(&tags),
        );
        assert!(found.is_empty());
    }

    #[test]
    fn test_empty_name_is_rejected() {
        let registry = ToolRegistry::new();
        for name in ["", "   "] {
            let result = registry.register(
                ToolMetadata::new(name, "nameless", ToolCategory::General),
                |_| Ok(Arc::new(CounterTool { name: "x".into() }) as Arc<dyn Tool>),
            );
            assert!(matches!(result, Err(AgentCoreError::Validation(_))));
        }
        assert!(registry.list().is_empty());
    }

    #[test]
    fn test_registration_grants_agent_access() {
        let registry = ToolRegistry::new();
        registry
            .register(
                ToolMetadata::new("shared", "wired at registration", ToolCategory::General)
                    .with_agent_types(vec!["props".into(), "aec".into()]),
                |_| Ok(Arc::new(CounterTool { name: "shared".into() }) as Arc<dyn Tool>),
            )
            .unwrap();

        assert_eq!(registry.get_tools_for_agent("props").len(), 1);
        assert_eq!(registry.get_tools_for_agent("aec").len(), 1);
        assert_eq!(registry.stats().tools_by_agent["props"], 1);
    }

    #[test]
    fn test_tag_search() {
        let registry = ToolRegistry::new();
        registry
            .register(
                ToolMetadata::new("tagged", "has tags", ToolCategory::General)
                    .with_tags(vec!["bim".into(), "count".into()]),
                |_| Ok(Arc::new(CounterTool { name: "tagged".into() }) as Arc<dyn Tool>),
            )
            .unwrap();
        register_counter(&registry, "untagged", ToolCategory::General);

        let found = registry.get_tools_by_tags(&["count".to_string()]);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].metadata.name, "tagged");
    }

    #[test]
    fn test_agent_assignment_lifecycle() {
        let registry = ToolRegistry::new();
        register_counter(&registry, "counter", ToolCategory::QueryExecution);

        assert!(registry.assign_to_agent("props", "ghost").is_err());
        registry.assign_to_agent("props", "counter").unwrap();
        assert_eq!(registry.get_tools_for_agent("props").len(), 1);

        registry.unassign_from_agent("props", "counter");
        assert!(registry.get_tools_for_agent("props").is_empty());
    }

    #[test]
    fn test_dependency_validation() {
        let registry = ToolRegistry::new();
        register_counter(&registry, "base", ToolCategory::General);
        registry
            .register(
                ToolMetadata::new("dependent", "needs others", ToolCategory::General)
                    .with_dependencies(vec!["base".into(), "missing".into()]),
                |_| Ok(Arc::new(CounterTool { name: "dependent".into() }) as Arc<dyn Tool>),
            )
            .unwrap();

        let missing = registry.validate_dependencies();
        assert_eq!(missing.len(), 1);
        assert_eq!(missing["dependent"], vec!["missing".to_string()]);
    }

    #[test]
    fn test_disabled_dependency_fails_validation() {
        let registry = ToolRegistry::new();
        register_counter(&registry, "base", ToolCategory::General);
        registry
            .register(
                ToolMetadata::new("dependent", "needs base", ToolCategory::General)
                    .with_dependencies(vec!["base".into()]),
                |_| Ok(Arc::new(CounterTool { name: "dependent".into() }) as Arc<dyn Tool>),
            )
            .unwrap();
        assert!(registry.validate_dependencies().is_empty());

        registry.disable("base").unwrap();
        let missing = registry.validate_dependencies();
        assert_eq!(missing["dependent"], vec!["base".to_string()]);

        registry.enable("base").unwrap();
        assert!(registry.validate_dependencies().is_empty());
    }

    #[tokio::test]
    async fn test_unregister_cleans_indexes() {
        let registry = ToolRegistry::new();
        register_counter(&registry, "counter", ToolCategory::QueryExecution);
        registry.assign_to_agent("props", "counter").unwrap();
        registry.get_instance("counter", None).unwrap();

        registry.unregister("counter").await.unwrap();
        assert!(registry.list().is_empty());
        assert!(registry.get_tools_for_agent("props").is_empty());
        assert!(registry.get_tools_by_category(ToolCategory::QueryExecution).is_empty());

        assert!(matches!(
            registry.unregister("counter").await,
            Err(AgentCoreError::ToolNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_execute_through_registry() {
        let registry = ToolRegistry::new();
        register_counter(&registry, "counter", ToolCategory::QueryExecution);

        let tool = registry.get_instance("counter", None).unwrap();
        let result = tool.execute(json!({"what": "walls"})).await.unwrap();
        assert!(result.success);
        assert_eq!(result.data.unwrap()["counted"], "walls");
    }

    #[test]
    fn test_stats() {
        let registry = ToolRegistry::new();
        register_counter(&registry, "a", ToolCategory::General);
        register_counter(&registry, "b", ToolCategory::Caching);
        registry.disable("b").unwrap();
        registry.get_instance("a", None).unwrap();
        registry.assign_to_agent("props", "a").unwrap();

        let stats = registry.stats();
        assert_eq!(stats.total_tools, 2);
        assert_eq!(stats.enabled_tools, 1);
        assert_eq!(stats.disabled_tools, 1);
        assert_eq!(stats.instantiated_tools, 1);
        assert_eq!(stats.total_usage, 1);
        assert_eq!(stats.tools_by_category[&ToolCategory::General], 1);
        assert_eq!(stats.tools_by_agent["props"], 1);
    }
}
