//! Plan and apply engine
//!
//! The engine reconciles a declared [`ResourceGraph`] against the resources
//! recorded in the stack state. Reconciliation is by presence only: a
//! declared resource missing from state is created, a recorded resource no
//! longer declared is deleted, and everything else is left alone unless a
//! replacement was explicitly requested.

use crate::action::{Action, ActionType, ApplyResult, Plan};
use crate::error::{CloudError, Result};
use crate::graph::ResourceGraph;
use crate::provider::{CloudProvider, ResourceConfig};
use crate::reference::resolve_refs;
use crate::state::{GlobalState, ResourceState, ResourceStatus, StateManager};
use futures_util::future::join_all;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

/// Options for [`Engine::plan`]
#[derive(Debug, Clone, Default)]
pub struct PlanOptions {
    /// Resources to replace, by key (`type:id`) or by logical name
    pub replace: Vec<String>,
}

/// Outcome of one create/replace action
struct ActionOutcome {
    key: String,
    action_id: String,
    result: Result<ResourceState>,
    /// The previously recorded resource is gone even though the action failed
    old_deleted: bool,
    /// Old instance left behind by a create-before-delete replacement
    stale: Option<(ResourceState, CloudError)>,
}

/// Plans and applies resource graphs against a single provider
pub struct Engine {
    provider: Arc<dyn CloudProvider>,
    state_manager: StateManager,
}

impl Engine {
    pub fn new(provider: Arc<dyn CloudProvider>, state_manager: StateManager) -> Self {
        Self {
            provider,
            state_manager,
        }
    }

    pub fn provider(&self) -> &dyn CloudProvider {
        self.provider.as_ref()
    }

    /// Load the current stack state
    pub async fn state(&self) -> Result<GlobalState> {
        self.state_manager.load().await
    }

    fn check_provider(&self, resource: &ResourceConfig) -> Result<()> {
        if resource.provider != self.provider.name() {
            return Err(CloudError::ProviderNotFound(format!(
                "{} (required by {})",
                resource.provider,
                resource.key()
            )));
        }
        Ok(())
    }

    /// Compute the actions needed to converge the stack to `graph`
    pub async fn plan(&self, graph: &ResourceGraph, options: &PlanOptions) -> Result<Plan> {
        for target in &options.replace {
            let known = graph.iter().any(|r| &r.key() == target || &r.id == target);
            if !known {
                return Err(CloudError::InvalidConfig(format!(
                    "Unknown resource to replace: {}",
                    target
                )));
            }
        }

        let state = self.state_manager.load().await?;
        let mut actions = Vec::new();

        for resource in graph.execution_order()? {
            self.check_provider(resource)?;

            let key = resource.key();
            let replace = options
                .replace
                .iter()
                .any(|target| *target == key || *target == resource.id);

            let action = match (state.get_resource(&key), replace) {
                (None, _) => Action::new(ActionType::Create, &resource.resource_type, &resource.id),
                (Some(_), true) => {
                    Action::new(ActionType::Replace, &resource.resource_type, &resource.id)
                        .with_detail(
                            "delete_before_replace",
                            serde_json::json!(resource.options.delete_before_replace),
                        )
                }
                (Some(_), false) => {
                    Action::new(ActionType::NoOp, &resource.resource_type, &resource.id)
                }
            };
            actions.push(action.with_detail("provider", serde_json::json!(resource.provider)));
        }

        // Undeclared resources are deleted, dependents first
        let recorded = ResourceGraph::from_state(&state);
        for wave in recorded.waves()?.into_iter().rev() {
            for resource in wave {
                if !graph.contains(&resource.key()) {
                    actions.push(Action::new(
                        ActionType::Delete,
                        &resource.resource_type,
                        &resource.id,
                    ));
                }
            }
        }

        // Old instances of earlier replacements are retried first
        for old in &state.pending_deletes {
            actions.push(
                Action::new(ActionType::Delete, &old.resource_type, &old.id)
                    .with_detail("replaced", serde_json::json!(true)),
            );
        }

        let plan = Plan::new(actions);
        tracing::debug!("Planned: {}", plan.summary());
        Ok(plan)
    }

    /// Apply a plan produced by [`Engine::plan`] for the same graph
    pub async fn apply(&self, graph: &ResourceGraph, plan: &Plan) -> Result<ApplyResult> {
        let lock = self.state_manager.acquire_lock().await?;
        let result = self.apply_locked(graph, plan).await;
        lock.release().await?;
        result
    }

    async fn apply_locked(&self, graph: &ResourceGraph, plan: &Plan) -> Result<ApplyResult> {
        let start = Instant::now();
        let mut state = self.state_manager.load().await?;
        let mut result = ApplyResult::new();
        let mut failed: HashSet<String> = HashSet::new();

        self.delete_pending(&mut state, &mut result).await?;

        for (index, wave) in graph.waves()?.into_iter().enumerate() {
            let mut pending = Vec::new();

            for resource in wave {
                let key = resource.key();
                let Some(action) = plan.action_for(&key) else {
                    continue;
                };
                if action.action_type == ActionType::NoOp {
                    continue;
                }

                let dependencies = resource.dependencies();
                if let Some(dep) = dependencies.iter().find(|d| failed.contains(*d)) {
                    tracing::warn!("Skipping {}: dependency {} failed", key, dep);
                    result.add_skipped(action.id.clone(), format!("dependency {} failed", dep));
                    failed.insert(key);
                    continue;
                }

                let mut resolved = resource.clone();
                resolved.config = match resolve_refs(&resource.config, &state.resources) {
                    Ok(config) => config,
                    Err(e) => {
                        result.add_failure(action.id.clone(), e.to_string());
                        failed.insert(key);
                        continue;
                    }
                };

                let existing = state.get_resource(&key).cloned();
                pending.push(self.run_action(action, resolved, existing));
            }

            if pending.is_empty() {
                continue;
            }

            tracing::info!("Applying wave {} ({} resources)", index + 1, pending.len());

            for outcome in join_all(pending).await {
                match outcome.result {
                    Ok(created) => {
                        result.add_success(outcome.action_id, format!("{} applied", outcome.key));
                        if let Some((old, e)) = outcome.stale {
                            tracing::error!("Failed to delete old {}: {}", outcome.key, e);
                            result.add_failure(
                                format!("delete-{}", old.id),
                                format!(
                                    "{} was replaced but {} remains: {}",
                                    outcome.key, old.id, e
                                ),
                            );
                            state.add_pending_delete(old);
                        }
                        state.set_resource(outcome.key, created);
                    }
                    Err(e) => {
                        tracing::error!("Failed to apply {}: {}", outcome.key, e);
                        if outcome.old_deleted {
                            state.remove_resource(&outcome.key);
                        }
                        result.add_failure(outcome.action_id, e.to_string());
                        failed.insert(outcome.key);
                    }
                }
            }

            self.state_manager.save(&state).await?;
        }

        for action in plan.actions_by_type(ActionType::Delete) {
            let key = action.resource_key();
            let Some(recorded) = state.get_resource(&key).cloned() else {
                continue;
            };

            if let Some(dependent) = Self::recorded_dependent(&state, &key) {
                result.add_skipped(
                    action.id.clone(),
                    format!("{} still depends on it", dependent),
                );
                continue;
            }

            tracing::info!("Deleting {}", key);
            match self.provider.delete(&recorded).await {
                Ok(()) => {
                    state.remove_resource(&key);
                    result.add_success(action.id.clone(), format!("{} deleted", key));
                }
                Err(e) => result.add_failure(action.id.clone(), e.to_string()),
            }
            self.state_manager.save(&state).await?;
        }

        result.duration_ms = start.elapsed().as_millis() as u64;
        Ok(result)
    }

    /// Delete old instances left behind by earlier replacements
    ///
    /// Instances that still cannot be deleted stay recorded for the next run.
    async fn delete_pending(
        &self,
        state: &mut GlobalState,
        result: &mut ApplyResult,
    ) -> Result<()> {
        if state.pending_deletes.is_empty() {
            return Ok(());
        }

        for old in std::mem::take(&mut state.pending_deletes) {
            let action_id = format!("delete-{}", old.id);
            tracing::info!("Deleting replaced {} ({})", old.resource_type, old.id);
            match self.provider.delete(&old).await {
                Ok(()) => result.add_success(action_id, format!("{} deleted", old.id)),
                Err(e) => {
                    tracing::error!("Failed to delete {}: {}", old.id, e);
                    result.add_failure(action_id, e.to_string());
                    state.add_pending_delete(old);
                }
            }
        }

        self.state_manager.save(state).await
    }

    fn recorded_dependent(state: &GlobalState, key: &str) -> Option<String> {
        state
            .resources
            .iter()
            .find(|(_, r)| r.dependencies.iter().any(|d| d == key))
            .map(|(k, _)| k.clone())
    }

    async fn run_action(
        &self,
        action: &Action,
        resource: ResourceConfig,
        existing: Option<ResourceState>,
    ) -> ActionOutcome {
        let key = resource.key();
        let mut old_deleted = false;
        let mut stale = None;

        let result = match (action.action_type, existing) {
            (ActionType::Replace, Some(old)) if resource.options.delete_before_replace => {
                tracing::info!("Replacing {} (delete before create)", key);
                match self.provider.delete(&old).await {
                    Ok(()) => {
                        old_deleted = true;
                        self.create(&resource).await
                    }
                    Err(e) => Err(e),
                }
            }
            (ActionType::Replace, Some(old)) => {
                tracing::info!("Replacing {} (create before delete)", key);
                match self.create(&resource).await {
                    // Same provider ID means the old resource was updated in place
                    Ok(created) if created.id == old.id => Ok(created),
                    Ok(created) => {
                        if let Err(e) = self.provider.delete(&old).await {
                            stale = Some((old, e));
                        }
                        Ok(created)
                    }
                    Err(e) => Err(e),
                }
            }
            _ => {
                tracing::info!("Creating {}", key);
                self.create(&resource).await
            }
        };

        ActionOutcome {
            key,
            action_id: action.id.clone(),
            result,
            old_deleted,
            stale,
        }
    }

    async fn create(&self, resource: &ResourceConfig) -> Result<ResourceState> {
        let created = self.provider.create(resource).await?;
        Ok(created
            .with_provider(&resource.provider)
            .with_dependencies(resource.dependencies())
            .with_status(ResourceStatus::Running))
    }

    /// Delete every recorded resource, dependents first
    pub async fn destroy(&self) -> Result<ApplyResult> {
        let lock = self.state_manager.acquire_lock().await?;
        let result = self.destroy_locked().await;
        lock.release().await?;
        result
    }

    async fn destroy_locked(&self) -> Result<ApplyResult> {
        let start = Instant::now();
        let mut state = self.state_manager.load().await?;
        let mut result = ApplyResult::new();

        self.delete_pending(&mut state, &mut result).await?;

        let recorded = ResourceGraph::from_state(&state);

        for wave in recorded.waves()?.into_iter().rev() {
            let mut pending = Vec::new();

            for resource in wave {
                let key = resource.key();
                let action_id = format!("delete-{}", key);

                if let Some(dependent) = Self::recorded_dependent(&state, &key) {
                    result.add_skipped(action_id, format!("{} still depends on it", dependent));
                    continue;
                }

                if let Some(existing) = state.get_resource(&key).cloned() {
                    pending.push(async move {
                        tracing::info!("Deleting {}", key);
                        let outcome = self.provider.delete(&existing).await;
                        (key, action_id, outcome)
                    });
                }
            }

            for (key, action_id, outcome) in join_all(pending).await {
                match outcome {
                    Ok(()) => {
                        state.remove_resource(&key);
                        result.add_success(action_id, format!("{} deleted", key));
                    }
                    Err(e) => {
                        tracing::error!("Failed to delete {}: {}", key, e);
                        result.add_failure(action_id, e.to_string());
                    }
                }
            }

            self.state_manager.save(&state).await?;
        }

        if state.is_empty() {
            state.outputs.clear();
            self.state_manager.save(&state).await?;
        }

        result.duration_ms = start.elapsed().as_millis() as u64;
        Ok(result)
    }

    /// Read the live state of a declared resource from the provider
    pub async fn read(&self, graph: &ResourceGraph, key: &str) -> Result<Option<ResourceState>> {
        let resource = graph
            .get(key)
            .ok_or_else(|| CloudError::ResourceNotFound(key.to_string()))?;
        let state = self.state_manager.load().await?;

        let mut resolved = resource.clone();
        resolved.config = resolve_refs(&resource.config, &state.resources)?;
        self.provider.read(&resolved).await
    }

    /// Record a stack output
    pub async fn set_output(&self, name: &str, value: serde_json::Value) -> Result<()> {
        let lock = self.state_manager.acquire_lock().await?;
        let result = self.set_output_locked(name, value).await;
        lock.release().await?;
        result
    }

    async fn set_output_locked(&self, name: &str, value: serde_json::Value) -> Result<()> {
        let mut state = self.state_manager.load().await?;
        state.set_output(name, value);
        self.state_manager.save(&state).await
    }

    /// Stack outputs recorded by the last apply
    pub async fn outputs(&self) -> Result<BTreeMap<String, serde_json::Value>> {
        Ok(self.state_manager.load().await?.outputs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{AuthStatus, ResourceOptions};
    use crate::reference::OutputRef;
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tempfile::tempdir;

    /// In-memory provider recording every call
    #[derive(Default)]
    struct MemoryProvider {
        live: Mutex<HashMap<String, ResourceState>>,
        calls: Mutex<Vec<String>>,
        fail_on: HashSet<String>,
        fail_deletes: AtomicBool,
        generation: Mutex<u32>,
    }

    impl MemoryProvider {
        fn failing(key: &str) -> Self {
            Self {
                fail_on: HashSet::from([key.to_string()]),
                ..Default::default()
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl CloudProvider for MemoryProvider {
        fn name(&self) -> &str {
            "memory"
        }

        fn display_name(&self) -> &str {
            "In-memory"
        }

        async fn check_auth(&self) -> Result<AuthStatus> {
            Ok(AuthStatus::ok("tester"))
        }

        async fn read(&self, resource: &ResourceConfig) -> Result<Option<ResourceState>> {
            Ok(self.live.lock().unwrap().get(&resource.key()).cloned())
        }

        async fn create(&self, resource: &ResourceConfig) -> Result<ResourceState> {
            let key = resource.key();
            self.calls.lock().unwrap().push(format!("create {}", key));
            if self.fail_on.contains(&key) {
                return Err(CloudError::ApiError(format!("boom: {}", key)));
            }

            let generation = {
                let mut generation = self.generation.lock().unwrap();
                *generation += 1;
                *generation
            };
            let state = ResourceState::new(
                format!("/mock/{}/{}", key, generation),
                &resource.resource_type,
            )
            .with_attribute("name", json!(resource.id))
            .with_attribute("config", resource.config.clone());
            self.live.lock().unwrap().insert(key, state.clone());
            Ok(state)
        }

        async fn delete(&self, resource: &ResourceState) -> Result<()> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("delete {}", resource.resource_type));
            if self.fail_deletes.load(Ordering::SeqCst) {
                return Err(CloudError::ApiError(format!("cannot delete {}", resource.id)));
            }
            self.live
                .lock()
                .unwrap()
                .retain(|_, live| live.id != resource.id);
            Ok(())
        }
    }

    fn declare(kind: &str, id: &str, refs: &[&str]) -> ResourceConfig {
        let refs: Vec<OutputRef> = refs.iter().map(|key| OutputRef::new(*key, "id")).collect();
        ResourceConfig::new(kind, id, "memory", json!({ "parents": refs }))
    }

    fn chain() -> ResourceGraph {
        let mut graph = ResourceGraph::new();
        graph.add(declare("group", "rg", &[])).unwrap();
        graph.add(declare("vnet", "net", &["group:rg"])).unwrap();
        graph.add(declare("ip", "pip", &["group:rg"])).unwrap();
        graph
            .add(
                declare("nic", "nic", &["vnet:net", "ip:pip"])
                    .with_options(ResourceOptions::delete_before_replace()),
            )
            .unwrap();
        graph
    }

    fn engine(provider: Arc<MemoryProvider>, root: &std::path::Path) -> Engine {
        Engine::new(provider, StateManager::new(root, "test"))
    }

    #[tokio::test]
    async fn test_plan_creates_everything_on_empty_state() {
        let temp_dir = tempdir().unwrap();
        let engine = engine(Arc::new(MemoryProvider::default()), temp_dir.path());

        let plan = engine.plan(&chain(), &PlanOptions::default()).await.unwrap();
        assert_eq!(plan.summary().create, 4);
        assert_eq!(plan.actions[0].resource_key(), "group:rg");
        assert_eq!(plan.actions[3].resource_key(), "nic:nic");
    }

    #[tokio::test]
    async fn test_apply_resolves_references_and_records_state() {
        let temp_dir = tempdir().unwrap();
        let provider = Arc::new(MemoryProvider::default());
        let engine = engine(provider.clone(), temp_dir.path());
        let graph = chain();

        let plan = engine.plan(&graph, &PlanOptions::default()).await.unwrap();
        let result = engine.apply(&graph, &plan).await.unwrap();
        assert!(result.is_success());
        assert_eq!(result.succeeded.len(), 4);

        let state = engine.state().await.unwrap();
        let nic = state.get_resource("nic:nic").unwrap();
        let vnet_id = &state.get_resource("vnet:net").unwrap().id;
        let config: serde_json::Value = nic.get_attribute("config").unwrap();
        assert_eq!(config["parents"][0], json!(vnet_id));
        assert_eq!(nic.provider, "memory");
        assert_eq!(nic.status, ResourceStatus::Running);
        assert_eq!(nic.dependencies, vec!["vnet:net", "ip:pip"]);

        // Second plan is a no-op
        let plan = engine.plan(&graph, &PlanOptions::default()).await.unwrap();
        assert!(!plan.has_changes);
    }

    #[tokio::test]
    async fn test_failure_skips_dependents() {
        let temp_dir = tempdir().unwrap();
        let provider = Arc::new(MemoryProvider::failing("vnet:net"));
        let engine = engine(provider.clone(), temp_dir.path());
        let graph = chain();

        let plan = engine.plan(&graph, &PlanOptions::default()).await.unwrap();
        let result = engine.apply(&graph, &plan).await.unwrap();

        assert!(!result.is_success());
        assert_eq!(result.failed.len(), 1);
        assert_eq!(result.skipped.len(), 1);
        assert!(!provider.calls().contains(&"create nic:nic".to_string()));

        let state = engine.state().await.unwrap();
        assert!(state.get_resource("ip:pip").is_some());
        assert!(state.get_resource("nic:nic").is_none());
    }

    #[tokio::test]
    async fn test_replace_with_delete_before_replace() {
        let temp_dir = tempdir().unwrap();
        let provider = Arc::new(MemoryProvider::default());
        let engine = engine(provider.clone(), temp_dir.path());
        let graph = chain();

        let plan = engine.plan(&graph, &PlanOptions::default()).await.unwrap();
        engine.apply(&graph, &plan).await.unwrap();

        let options = PlanOptions {
            replace: vec!["nic".to_string()],
        };
        let plan = engine.plan(&graph, &options).await.unwrap();
        assert_eq!(plan.summary().replace, 1);

        let before = provider.calls().len();
        let result = engine.apply(&graph, &plan).await.unwrap();
        assert!(result.is_success());
        assert_eq!(
            provider.calls()[before..].to_vec(),
            vec!["delete nic".to_string(), "create nic:nic".to_string()]
        );
    }

    #[tokio::test]
    async fn test_replace_without_delete_before_replace_creates_first() {
        let temp_dir = tempdir().unwrap();
        let provider = Arc::new(MemoryProvider::default());
        let engine = engine(provider.clone(), temp_dir.path());
        let graph = chain();

        let plan = engine.plan(&graph, &PlanOptions::default()).await.unwrap();
        engine.apply(&graph, &plan).await.unwrap();

        let options = PlanOptions {
            replace: vec!["ip:pip".to_string()],
        };
        let plan = engine.plan(&graph, &options).await.unwrap();
        let before = provider.calls().len();
        engine.apply(&graph, &plan).await.unwrap();
        assert_eq!(
            provider.calls()[before..].to_vec(),
            vec!["create ip:pip".to_string(), "delete ip".to_string()]
        );
    }

    #[tokio::test]
    async fn test_failed_delete_after_create_keeps_both_instances() {
        let temp_dir = tempdir().unwrap();
        let provider = Arc::new(MemoryProvider::default());
        let engine = engine(provider.clone(), temp_dir.path());
        let graph = chain();

        let plan = engine.plan(&graph, &PlanOptions::default()).await.unwrap();
        engine.apply(&graph, &plan).await.unwrap();
        let old_id = engine.state().await.unwrap().get_resource("ip:pip").unwrap().id.clone();

        provider.fail_deletes.store(true, Ordering::SeqCst);
        let options = PlanOptions {
            replace: vec!["ip:pip".to_string()],
        };
        let plan = engine.plan(&graph, &options).await.unwrap();
        let result = engine.apply(&graph, &plan).await.unwrap();

        assert!(!result.is_success());
        assert_eq!(result.failed.len(), 1);
        assert_eq!(result.failed[0].action_id, format!("delete-{}", old_id));

        // The new instance is recorded and the old one is kept for a retry
        let state = engine.state().await.unwrap();
        let new_id = &state.get_resource("ip:pip").unwrap().id;
        assert_ne!(new_id, &old_id);
        assert_eq!(state.pending_deletes.len(), 1);
        assert_eq!(state.pending_deletes[0].id, old_id);

        let plan = engine.plan(&graph, &PlanOptions::default()).await.unwrap();
        assert!(plan.has_changes);
        assert_eq!(plan.summary().delete, 1);

        provider.fail_deletes.store(false, Ordering::SeqCst);
        let result = engine.apply(&graph, &plan).await.unwrap();
        assert!(result.is_success());
        assert!(engine.state().await.unwrap().pending_deletes.is_empty());

        let plan = engine.plan(&graph, &PlanOptions::default()).await.unwrap();
        assert!(!plan.has_changes);
    }

    #[tokio::test]
    async fn test_destroy_deletes_pending_instances() {
        let temp_dir = tempdir().unwrap();
        let provider = Arc::new(MemoryProvider::default());
        let engine = engine(provider.clone(), temp_dir.path());

        let mut state = GlobalState::new();
        state.add_pending_delete(ResourceState::new("/mock/old", "ip"));
        engine.state_manager.save(&state).await.unwrap();

        let result = engine.destroy().await.unwrap();
        assert!(result.is_success());
        assert_eq!(provider.calls(), vec!["delete ip".to_string()]);
        assert!(engine.state().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_set_output_respects_state_lock() {
        let temp_dir = tempdir().unwrap();
        let engine = engine(Arc::new(MemoryProvider::default()), temp_dir.path());

        let lock = engine.state_manager.acquire_lock().await.unwrap();
        assert!(matches!(
            engine.set_output("vm_ip_address", json!("20.0.0.1")).await,
            Err(CloudError::LockError(_))
        ));
        lock.release().await.unwrap();

        engine.set_output("vm_ip_address", json!("20.0.0.1")).await.unwrap();
        assert_eq!(engine.outputs().await.unwrap()["vm_ip_address"], json!("20.0.0.1"));
    }

    #[tokio::test]
    async fn test_unknown_replace_target() {
        let temp_dir = tempdir().unwrap();
        let engine = engine(Arc::new(MemoryProvider::default()), temp_dir.path());
        let options = PlanOptions {
            replace: vec!["nope".to_string()],
        };
        assert!(matches!(
            engine.plan(&chain(), &options).await,
            Err(CloudError::InvalidConfig(_))
        ));
    }

    #[tokio::test]
    async fn test_provider_mismatch() {
        let temp_dir = tempdir().unwrap();
        let engine = engine(Arc::new(MemoryProvider::default()), temp_dir.path());
        let mut graph = ResourceGraph::new();
        graph
            .add(ResourceConfig::new("group", "rg", "other-cloud", json!({})))
            .unwrap();

        assert!(matches!(
            engine.plan(&graph, &PlanOptions::default()).await,
            Err(CloudError::ProviderNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_undeclared_resources_are_deleted_dependents_first() {
        let temp_dir = tempdir().unwrap();
        let provider = Arc::new(MemoryProvider::default());
        let engine = engine(provider.clone(), temp_dir.path());

        let graph = chain();
        let plan = engine.plan(&graph, &PlanOptions::default()).await.unwrap();
        engine.apply(&graph, &plan).await.unwrap();

        let mut smaller = ResourceGraph::new();
        smaller.add(declare("group", "rg", &[])).unwrap();
        smaller.add(declare("vnet", "net", &["group:rg"])).unwrap();

        let plan = engine.plan(&smaller, &PlanOptions::default()).await.unwrap();
        let deletes: Vec<String> = plan
            .actions_by_type(ActionType::Delete)
            .iter()
            .map(|a| a.resource_key())
            .collect();
        assert_eq!(deletes, vec!["nic:nic", "ip:pip"]);

        let result = engine.apply(&smaller, &plan).await.unwrap();
        assert!(result.is_success());
        assert_eq!(engine.state().await.unwrap().resources.len(), 2);
    }

    #[tokio::test]
    async fn test_destroy_removes_everything_and_outputs() {
        let temp_dir = tempdir().unwrap();
        let provider = Arc::new(MemoryProvider::default());
        let engine = engine(provider.clone(), temp_dir.path());
        let graph = chain();

        let plan = engine.plan(&graph, &PlanOptions::default()).await.unwrap();
        engine.apply(&graph, &plan).await.unwrap();
        engine.set_output("vm_ip_address", json!("20.0.0.1")).await.unwrap();

        let before = provider.calls().len();
        let result = engine.destroy().await.unwrap();
        assert!(result.is_success());

        let deletes = provider.calls()[before..].to_vec();
        assert_eq!(deletes.first().map(String::as_str), Some("delete nic"));
        assert_eq!(deletes.last().map(String::as_str), Some("delete group"));

        let state = engine.state().await.unwrap();
        assert!(state.resources.is_empty());
        assert!(engine.outputs().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_read_resolves_references() {
        let temp_dir = tempdir().unwrap();
        let provider = Arc::new(MemoryProvider::default());
        let engine = engine(provider.clone(), temp_dir.path());
        let graph = chain();

        assert!(matches!(
            engine.read(&graph, "vnet:net").await,
            Err(CloudError::UnresolvedReference { .. })
        ));

        let plan = engine.plan(&graph, &PlanOptions::default()).await.unwrap();
        engine.apply(&graph, &plan).await.unwrap();

        let live = engine.read(&graph, "ip:pip").await.unwrap();
        assert!(live.is_some());
    }
}
