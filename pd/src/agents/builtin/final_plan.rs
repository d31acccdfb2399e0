//! Final plan agent - completion, recommendations and next steps

use async_trait::async_trait;
use tracing::debug;

use crate::agents::error::AgentError;
use crate::agents::traits::ReactiveAgent;
use crate::analyzer::category_of;
use crate::domain::{FinalPlan, SessionState};
use crate::events::{EventPayload, Topic};
use crate::state::{StateResponse, StateStore};

pub const NAME: &str = "final_plan_agent";

pub struct FinalPlanAgent {
    /// Dynamic agents a complete plan needs (sorted)
    expected: Vec<String>,
}

impl FinalPlanAgent {
    pub fn new(mut expected: Vec<String>) -> Self {
        expected.sort();
        expected.dedup();
        Self { expected }
    }

    pub fn compute(&self, state: &SessionState) -> FinalPlan {
        let (active, missing): (Vec<String>, Vec<String>) = self
            .expected
            .iter()
            .cloned()
            .partition(|agent| state.completed_result(agent).is_some());

        let completion_percent = if self.expected.is_empty() {
            0
        } else {
            (active.len() * 100 / self.expected.len()) as u8
        };

        let recommendations: Vec<String> = active
            .iter()
            .filter_map(|agent| state.completed_result(agent))
            .filter_map(|r| r.result.get("recommendations").and_then(|v| v.as_array()))
            .flatten()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect();

        let mut next_steps: Vec<String> = missing
            .iter()
            .map(|agent| {
                let topic = category_of(agent).unwrap_or(agent);
                match state.agent_status(agent) {
                    Some(status) if status.is_active() => format!("Wait for the {} plan to finish", topic),
                    Some(_) => format!("Retry {} planning with more details", topic),
                    None => format!("Add details about the {}", topic),
                }
            })
            .collect();
        if let Some(budget) = state.budget.as_ref().filter(|b| !b.based_on_agents.is_empty()) {
            next_steps.push(format!(
                "Review the estimated budget of ${:.0} - ${:.0}",
                budget.total_budget.min, budget.total_budget.max
            ));
        }

        debug!(session_id = %state.session_id, completion_percent, "FinalPlanAgent::compute");
        FinalPlan {
            completion_percent,
            recommendations,
            next_steps,
            active_agents: active,
            missing_agents: missing,
        }
    }
}

#[async_trait]
impl ReactiveAgent for FinalPlanAgent {
    fn name(&self) -> &str {
        NAME
    }

    fn topics(&self) -> Vec<Topic> {
        vec![
            Topic::AgentCompleted,
            Topic::AgentFailed,
            Topic::AgentDataRemoved,
            Topic::BudgetUpdated,
        ]
    }

    fn recompute(&self, state: &SessionState) -> Result<EventPayload, AgentError> {
        Ok(EventPayload::PlanUpdated(self.compute(state)))
    }

    async fn apply(&self, store: &StateStore, session_id: &str, payload: &EventPayload) -> StateResponse<()> {
        if let EventPayload::PlanUpdated(plan) = payload {
            store.set_final_plan(session_id, plan.clone()).await?;
        }
        Ok(())
    }
}
