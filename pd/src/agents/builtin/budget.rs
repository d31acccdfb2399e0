//! Budget agent - sums the estimates of every completed agent

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::agents::error::AgentError;
use crate::agents::traits::ReactiveAgent;
use crate::domain::{Budget, BudgetRange, SessionState};
use crate::events::{EventPayload, Topic};
use crate::state::{StateResponse, StateStore};

pub const NAME: &str = "budget_agent";

pub struct BudgetAgent;

impl BudgetAgent {
    /// Aggregate budget over the session's completed results
    ///
    /// Results without a numeric `estimate {min, max}` are ignored, and so
    /// are inverted or negative ranges.
    pub fn compute(state: &SessionState) -> Budget {
        let mut budget = Budget::default();

        for result in state.agent_results.values().filter(|r| r.is_completed()) {
            let Some(estimate) = result.result.get("estimate") else {
                continue;
            };
            let (Some(min), Some(max)) = (
                estimate.get("min").and_then(|v| v.as_f64()),
                estimate.get("max").and_then(|v| v.as_f64()),
            ) else {
                continue;
            };
            if min > max || min < 0.0 {
                warn!(
                    session_id = %state.session_id,
                    agent = %result.agent_name,
                    min,
                    max,
                    "BudgetAgent: skipping invalid estimate"
                );
                continue;
            }

            let range = BudgetRange::new(min, max);
            budget.total_budget = budget.total_budget.add(&range);
            budget.breakdown.insert(result.agent_name.clone(), range);
            budget.based_on_agents.push(result.agent_name.clone());
        }

        debug!(
            session_id = %state.session_id,
            min = budget.total_budget.min,
            max = budget.total_budget.max,
            agents = budget.based_on_agents.len(),
            "BudgetAgent::compute"
        );
        budget
    }
}

#[async_trait]
impl ReactiveAgent for BudgetAgent {
    fn name(&self) -> &str {
        NAME
    }

    fn topics(&self) -> Vec<Topic> {
        vec![Topic::AgentCompleted, Topic::AgentFailed, Topic::AgentDataRemoved]
    }

    fn recompute(&self, state: &SessionState) -> Result<EventPayload, AgentError> {
        Ok(EventPayload::BudgetUpdated(Self::compute(state)))
    }

    async fn apply(&self, store: &StateStore, session_id: &str, payload: &EventPayload) -> StateResponse<()> {
        if let EventPayload::BudgetUpdated(budget) = payload {
            store.set_budget(session_id, budget.clone()).await?;
        }
        Ok(())
    }
}
