//! StateStore - per-session locked state
//!
//! The session map is behind a std `RwLock` that is only held to look up or
//! insert a session handle, never across an await. All reads and writes of a
//! session go through that session's `tokio::sync::Mutex`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::messages::{StateError, StateResponse};
use crate::domain::{AgentResult, Budget, FinalPlan, Input, SessionState, generate_id};

type SessionHandle = Arc<Mutex<SessionState>>;

/// Aggregated metrics over all sessions
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct StoreMetrics {
    /// Live sessions
    pub sessions: u64,
    /// Successful mutations since startup
    pub total_mutations: u64,
    /// Inputs across all live sessions
    pub total_inputs: u64,
}

/// In-memory session store
///
/// Cheap to clone; every clone refers to the same sessions.
#[derive(Clone, Default)]
pub struct StateStore {
    sessions: Arc<RwLock<HashMap<String, SessionHandle>>>,
    mutations: Arc<AtomicU64>,
}

impl StateStore {
    pub fn new() -> Self {
        debug!("StateStore::new: called");
        Self::default()
    }

    fn handle(&self, session_id: &str) -> StateResponse<SessionHandle> {
        let sessions = self.sessions.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        sessions
            .get(session_id)
            .cloned()
            .ok_or_else(|| StateError::NotFound(session_id.to_string()))
    }

    fn handles(&self) -> Vec<SessionHandle> {
        let sessions = self.sessions.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        sessions.values().cloned().collect()
    }

    fn record_mutation(&self) {
        self.mutations.fetch_add(1, Ordering::Relaxed);
    }

    /// Create a session, generating an ID when none is given
    pub async fn create_session(&self, session_id: Option<String>, initial_inputs: Vec<Input>) -> StateResponse<String> {
        let session_id = session_id.unwrap_or_else(|| generate_id("party"));
        debug!(%session_id, inputs = initial_inputs.len(), "create_session: called");

        let mut state = SessionState::new(session_id.clone());
        state.inputs = initial_inputs;
        state.touch();

        {
            let mut sessions = self.sessions.write().unwrap_or_else(|poisoned| poisoned.into_inner());
            if sessions.contains_key(&session_id) {
                debug!(%session_id, "create_session: already exists");
                return Err(StateError::AlreadyExists(session_id));
            }
            sessions.insert(session_id.clone(), Arc::new(Mutex::new(state)));
        }
        self.record_mutation();

        info!(%session_id, "Session created");
        Ok(session_id)
    }

    /// Snapshot of a session
    pub async fn get_session(&self, session_id: &str) -> Option<SessionState> {
        debug!(%session_id, "get_session: called");
        let handle = self.handle(session_id).ok()?;
        let state = handle.lock().await;
        Some(state.clone())
    }

    /// Snapshot of a session, failing with `NotFound`
    pub async fn get_session_required(&self, session_id: &str) -> StateResponse<SessionState> {
        let handle = self.handle(session_id)?;
        let state = handle.lock().await;
        Ok(state.clone())
    }

    /// Remove a session entirely
    pub fn delete_session(&self, session_id: &str) -> bool {
        debug!(%session_id, "delete_session: called");
        let mut sessions = self.sessions.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        let removed = sessions.remove(session_id).is_some();
        if removed {
            info!(%session_id, "Session deleted");
        }
        removed
    }

    /// IDs of all live sessions (sorted)
    pub fn list_sessions(&self) -> Vec<String> {
        let sessions = self.sessions.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut ids: Vec<String> = sessions.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Atomic read-modify-write of one session
    ///
    /// Always counts as a mutation. Returns the closure's value and the new
    /// version.
    pub async fn update<R>(&self, session_id: &str, f: impl FnOnce(&mut SessionState) -> R) -> StateResponse<(R, u64)> {
        let handle = self.handle(session_id)?;
        let mut state = handle.lock().await;
        let out = f(&mut state);
        state.touch();
        self.record_mutation();
        Ok((out, state.version))
    }

    /// Append an input
    pub async fn add_input(&self, session_id: &str, input: Input) -> StateResponse<u64> {
        debug!(%session_id, input_id = %input.input_id, "add_input: called");
        let ((), version) = self.update(session_id, |state| state.inputs.push(input)).await?;
        Ok(version)
    }

    /// Remove an input by ID
    ///
    /// Returns false, without bumping the version, when no such input exists.
    pub async fn remove_input(&self, session_id: &str, input_id: &str) -> StateResponse<bool> {
        debug!(%session_id, %input_id, "remove_input: called");
        let handle = self.handle(session_id)?;
        let mut state = handle.lock().await;

        let before = state.inputs.len();
        state.inputs.retain(|i| i.input_id != input_id);
        if state.inputs.len() == before {
            debug!(%session_id, %input_id, "remove_input: no such input");
            return Ok(false);
        }

        state.touch();
        self.record_mutation();
        Ok(true)
    }

    /// Open a fresh running slot for an agent, replacing any previous one
    ///
    /// `input_ids` are the inputs this execution is fed with.
    pub async fn set_agent_started(
        &self,
        session_id: &str,
        agent_name: &str,
        input_ids: &[String],
    ) -> StateResponse<u64> {
        debug!(%session_id, %agent_name, inputs = input_ids.len(), "set_agent_started: called");
        let ((), version) = self
            .update(session_id, |state| {
                state.agent_results.insert(
                    agent_name.to_string(),
                    AgentResult::running(agent_name).with_inputs(input_ids.to_vec()),
                );
            })
            .await?;
        Ok(version)
    }

    /// Complete an agent's slot
    pub async fn set_agent_result(
        &self,
        session_id: &str,
        agent_name: &str,
        result: Value,
        confidence: f64,
    ) -> StateResponse<u64> {
        debug!(%session_id, %agent_name, confidence, "set_agent_result: called");
        self.finish_slot(session_id, agent_name, |slot| slot.complete(result, confidence))
            .await
    }

    /// Fail an agent's slot
    pub async fn set_agent_failed(&self, session_id: &str, agent_name: &str, error: &str) -> StateResponse<u64> {
        debug!(%session_id, %agent_name, %error, "set_agent_failed: called");
        self.finish_slot(session_id, agent_name, |slot| slot.fail(error)).await
    }

    async fn finish_slot(
        &self,
        session_id: &str,
        agent_name: &str,
        f: impl FnOnce(&mut AgentResult),
    ) -> StateResponse<u64> {
        let handle = self.handle(session_id)?;
        let mut state = handle.lock().await;

        let Some(slot) = state.agent_results.get_mut(agent_name) else {
            debug!(%session_id, %agent_name, "finish_slot: agent never started");
            return Err(StateError::AgentNotStarted {
                session_id: session_id.to_string(),
                agent: agent_name.to_string(),
            });
        };
        f(slot);

        state.touch();
        self.record_mutation();
        Ok(state.version)
    }

    /// Drop an agent's slot (its supporting inputs are gone)
    ///
    /// Returns false, without bumping the version, when there was no slot.
    pub async fn clear_agent_result(&self, session_id: &str, agent_name: &str) -> StateResponse<bool> {
        debug!(%session_id, %agent_name, "clear_agent_result: called");
        let handle = self.handle(session_id)?;
        let mut state = handle.lock().await;

        if state.agent_results.remove(agent_name).is_none() {
            return Ok(false);
        }

        state.touch();
        self.record_mutation();
        Ok(true)
    }

    pub async fn set_budget(&self, session_id: &str, budget: Budget) -> StateResponse<u64> {
        debug!(%session_id, "set_budget: called");
        let ((), version) = self.update(session_id, |state| state.budget = Some(budget)).await?;
        Ok(version)
    }

    pub async fn set_final_plan(&self, session_id: &str, plan: FinalPlan) -> StateResponse<u64> {
        debug!(%session_id, completion = plan.completion_percent, "set_final_plan: called");
        let ((), version) = self.update(session_id, |state| state.final_plan = Some(plan)).await?;
        Ok(version)
    }

    /// Agents currently executing in a session
    pub async fn running_agents(&self, session_id: &str) -> StateResponse<Vec<String>> {
        let handle = self.handle(session_id)?;
        let state = handle.lock().await;
        Ok(state.running_agents())
    }

    pub async fn metrics(&self) -> StoreMetrics {
        let handles = self.handles();
        let mut total_inputs = 0;
        for handle in &handles {
            total_inputs += handle.lock().await.inputs.len() as u64;
        }
        StoreMetrics {
            sessions: handles.len() as u64,
            total_mutations: self.mutations.load(Ordering::Relaxed),
            total_inputs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AgentStatus, BudgetRange, SessionStatus};
    use serde_json::json;

    #[tokio::test]
    async fn test_create_and_get_session() {
        let store = StateStore::new();
        let id = store
            .create_session(Some("party-1".to_string()), vec![Input::text("jungle theme")])
            .await
            .unwrap();

        assert_eq!(id, "party-1");
        let state = store.get_session("party-1").await.unwrap();
        assert_eq!(state.inputs.len(), 1);
        assert_eq!(state.version, 1);
        assert!(store.get_session("party-2").await.is_none());
    }

    #[tokio::test]
    async fn test_create_session_generates_id_and_rejects_duplicates() {
        let store = StateStore::new();
        let id = store.create_session(None, vec![]).await.unwrap();
        assert!(id.starts_with("party-"));

        let err = store.create_session(Some(id.clone()), vec![]).await.unwrap_err();
        assert_eq!(err, StateError::AlreadyExists(id));
    }

    #[tokio::test]
    async fn test_mutations_on_missing_session() {
        let store = StateStore::new();
        let err = store.add_input("ghost", Input::text("cake")).await.unwrap_err();
        assert_eq!(err, StateError::NotFound("ghost".to_string()));
    }

    #[tokio::test]
    async fn test_remove_input_reports_absence_without_bump() {
        let store = StateStore::new();
        let input = Input::text("park venue");
        let input_id = input.input_id.clone();
        store.create_session(Some("p".to_string()), vec![input]).await.unwrap();

        assert!(!store.remove_input("p", "input-missing").await.unwrap());
        assert_eq!(store.get_session("p").await.unwrap().version, 1);

        assert!(store.remove_input("p", &input_id).await.unwrap());
        let state = store.get_session("p").await.unwrap();
        assert_eq!(state.version, 2);
        assert!(state.inputs.is_empty());
    }

    #[tokio::test]
    async fn test_agent_result_requires_started_slot() {
        let store = StateStore::new();
        store.create_session(Some("p".to_string()), vec![]).await.unwrap();

        let err = store.set_agent_result("p", "cake_agent", json!({}), 0.5).await.unwrap_err();
        assert!(matches!(err, StateError::AgentNotStarted { .. }));
        let err = store.set_agent_failed("p", "cake_agent", "boom").await.unwrap_err();
        assert!(matches!(err, StateError::AgentNotStarted { .. }));
        assert!(store.get_session("p").await.unwrap().agent_results.is_empty());
    }

    #[tokio::test]
    async fn test_agent_lifecycle_preserves_started_at() {
        let store = StateStore::new();
        store.create_session(Some("p".to_string()), vec![]).await.unwrap();

        store
            .set_agent_started("p", "theme_agent", &["input-1".to_string()])
            .await
            .unwrap();
        let state = store.get_session("p").await.unwrap();
        assert_eq!(state.status, SessionStatus::Planning);
        assert!(state.agent_results["theme_agent"].used_input("input-1"));
        let started_at = state.agent_results["theme_agent"].started_at;

        store
            .set_agent_result("p", "theme_agent", json!({"theme": "jungle"}), 0.9)
            .await
            .unwrap();
        let state = store.get_session("p").await.unwrap();
        let slot = &state.agent_results["theme_agent"];
        assert_eq!(slot.status, AgentStatus::Completed);
        assert_eq!(slot.started_at, started_at);
        assert_eq!(state.status, SessionStatus::Collecting);
        assert_eq!(state.version, 3);
    }

    #[tokio::test]
    async fn test_clear_agent_result() {
        let store = StateStore::new();
        store.create_session(Some("p".to_string()), vec![]).await.unwrap();
        store.set_agent_started("p", "venue_agent", &[]).await.unwrap();

        assert!(store.clear_agent_result("p", "venue_agent").await.unwrap());
        assert!(!store.clear_agent_result("p", "venue_agent").await.unwrap());
        assert!(store.get_session("p").await.unwrap().agent_results.is_empty());
    }

    #[tokio::test]
    async fn test_budget_and_plan_cached() {
        let store = StateStore::new();
        store.create_session(Some("p".to_string()), vec![]).await.unwrap();

        let budget = Budget {
            total_budget: BudgetRange::new(100.0, 200.0),
            ..Default::default()
        };
        store.set_budget("p", budget.clone()).await.unwrap();
        store
            .set_final_plan(
                "p",
                FinalPlan {
                    completion_percent: 100,
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let state = store.get_session("p").await.unwrap();
        assert_eq!(state.budget, Some(budget));
        assert_eq!(state.status, SessionStatus::Ready);
    }

    #[tokio::test]
    async fn test_concurrent_mutations_are_serialized() {
        let store = StateStore::new();
        store.create_session(Some("p".to_string()), vec![]).await.unwrap();

        let mut tasks = Vec::new();
        for n in 0..50 {
            let store = store.clone();
            tasks.push(tokio::spawn(async move {
                store.add_input("p", Input::text(format!("fact {}", n))).await.unwrap();
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        let state = store.get_session("p").await.unwrap();
        assert_eq!(state.inputs.len(), 50);
        assert_eq!(state.version, 51);
    }

    #[tokio::test]
    async fn test_sessions_are_independent() {
        let store = StateStore::new();
        store.create_session(Some("a".to_string()), vec![]).await.unwrap();
        store.create_session(Some("b".to_string()), vec![]).await.unwrap();

        store.add_input("a", Input::text("cake")).await.unwrap();

        assert_eq!(store.get_session("a").await.unwrap().inputs.len(), 1);
        assert!(store.get_session("b").await.unwrap().inputs.is_empty());
        assert_eq!(store.list_sessions(), vec!["a".to_string(), "b".to_string()]);

        let metrics = store.metrics().await;
        assert_eq!(metrics.sessions, 2);
        assert_eq!(metrics.total_inputs, 1);
        assert_eq!(metrics.total_mutations, 3);

        assert!(store.delete_session("a"));
        assert!(!store.delete_session("a"));
    }

    #[tokio::test]
    async fn test_update_returns_value_and_version() {
        let store = StateStore::new();
        store.create_session(Some("p".to_string()), vec![]).await.unwrap();

        let (count, version) = store.update("p", |state| state.inputs.len()).await.unwrap();
        assert_eq!(count, 0);
        assert_eq!(version, 2);
    }
}
