//! Execution-plan generation
//!
//! Pure functions from a session snapshot to the agents that must run. No
//! bus, no store: the InputAnalyzer applies the plan.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use tracing::debug;

use super::graph::{DependencyGraph, agent_name, category_of};
use super::keywords::KeywordTable;
use crate::domain::{AgentStatus, Input, SessionState};
use crate::events::{ExecutionType, ShouldExecute};

/// Priority used for a category missing from the graph
const FALLBACK_PRIORITY: u8 = 5;

/// One scheduled execution
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanEntry {
    pub agent_name: String,
    pub execution_type: ExecutionType,
    /// Current inputs supporting this agent
    pub input_ids: Vec<String>,
    pub priority: u8,
}

impl PlanEntry {
    pub fn to_payload(&self) -> ShouldExecute {
        ShouldExecute {
            agent_name: self.agent_name.clone(),
            execution_type: self.execution_type,
            input_ids: self.input_ids.clone(),
            priority: self.priority,
        }
    }
}

/// What the analyzer must do for one input event
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExecutionPlan {
    /// Sorted by priority, then agent name
    pub entries: Vec<PlanEntry>,
    /// Candidates left alone because they are already executing
    pub skipped: Vec<String>,
    /// Agents whose results lost all supporting inputs
    pub data_removed: Vec<String>,
}

impl ExecutionPlan {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty() && self.data_removed.is_empty()
    }

    pub fn entry(&self, agent_name: &str) -> Option<&PlanEntry> {
        self.entries.iter().find(|e| e.agent_name == agent_name)
    }
}

/// Category → IDs of the inputs that score positively for it
pub type Support = BTreeMap<String, Vec<String>>;

/// Planner over a keyword table and a dependency graph
pub struct Planner<'a> {
    keywords: &'a KeywordTable,
    graph: &'a DependencyGraph,
}

impl<'a> Planner<'a> {
    pub fn new(keywords: &'a KeywordTable, graph: &'a DependencyGraph) -> Self {
        Self { keywords, graph }
    }

    fn priority(&self, category: &str) -> u8 {
        self.graph.priority(category).unwrap_or(FALLBACK_PRIORITY)
    }

    /// Classify every input of a session
    pub fn support(&self, inputs: &[Input]) -> Support {
        let mut support = Support::new();
        for input in inputs {
            for category in self.keywords.score_input(input, &[]).into_keys() {
                support.entry(category).or_default().push(input.input_id.clone());
            }
        }
        support
    }

    /// Plan for a freshly added input
    ///
    /// `state` is the snapshot after the input was stored. `event_hints`
    /// are category hints carried on the triggering event.
    pub fn plan_for_added(&self, state: &SessionState, input: &Input, event_hints: &[String]) -> ExecutionPlan {
        debug!(session_id = %state.session_id, input_id = %input.input_id, "plan_for_added: called");
        let mut support = self.support(&state.inputs);
        let candidates = self.keywords.score_input(input, event_hints);

        let mut plan = ExecutionPlan::default();
        let mut rerun = Vec::new();

        for category in candidates.keys() {
            let ids = support.entry(category.clone()).or_default();
            if !ids.contains(&input.input_id) {
                ids.push(input.input_id.clone());
            }

            let agent = agent_name(category);
            let execution_type = match state.agent_status(&agent) {
                None => ExecutionType::Start,
                Some(AgentStatus::Completed | AgentStatus::Failed) => ExecutionType::Rerun,
                Some(AgentStatus::Running | AgentStatus::Pending) => {
                    debug!(%agent, "plan_for_added: agent in flight, skipping");
                    plan.skipped.push(agent);
                    continue;
                }
            };
            if execution_type == ExecutionType::Rerun {
                rerun.push(category.clone());
            }
            plan.entries.push(PlanEntry {
                agent_name: agent,
                execution_type,
                input_ids: ids.clone(),
                priority: self.priority(category),
            });
        }

        self.cascade(state, &support, &rerun, &mut plan);
        finish(plan)
    }

    /// Plan after an input was removed
    ///
    /// `state` is the snapshot after removal. Every classifier agent holding
    /// a slot is re-checked against the remaining inputs: no support left
    /// means its data is removed. Otherwise it reruns only when its latest
    /// execution was fed by the removed input.
    pub fn plan_for_removed(&self, state: &SessionState, removed_input_id: &str) -> ExecutionPlan {
        debug!(session_id = %state.session_id, %removed_input_id, "plan_for_removed: called");
        let support = self.support(&state.inputs);

        let mut plan = ExecutionPlan::default();
        let mut changed = Vec::new();

        for (agent, slot) in &state.agent_results {
            let Some(category) = category_of(agent).filter(|c| self.keywords.contains(c)) else {
                continue;
            };

            match support.get(category) {
                None => {
                    debug!(%agent, "plan_for_removed: no supporting inputs left");
                    plan.data_removed.push(agent.clone());
                    changed.push(category.to_string());
                }
                Some(_) if !slot.used_input(removed_input_id) => {
                    debug!(%agent, "plan_for_removed: removed input never fed this agent");
                }
                Some(_) if slot.status.is_active() => {
                    plan.skipped.push(agent.clone());
                }
                Some(ids) => {
                    plan.entries.push(PlanEntry {
                        agent_name: agent.clone(),
                        execution_type: ExecutionType::Rerun,
                        input_ids: ids.clone(),
                        priority: self.priority(category),
                    });
                    changed.push(category.to_string());
                }
            }
        }

        self.cascade(state, &support, &changed, &mut plan);
        finish(plan)
    }

    /// Schedule `recalculate` for completed agents downstream of `changed`
    fn cascade(&self, state: &SessionState, support: &Support, changed: &[String], plan: &mut ExecutionPlan) {
        let mut affected = BTreeSet::new();
        for category in changed {
            affected.extend(self.graph.downstream(category));
        }

        for category in affected {
            let agent = agent_name(&category);
            let scheduled = plan.entries.iter().any(|e| e.agent_name == agent);
            let removed = plan.data_removed.contains(&agent);
            if scheduled || removed || state.completed_result(&agent).is_none() {
                continue;
            }
            debug!(%agent, "cascade: scheduling recalculate");
            plan.entries.push(PlanEntry {
                agent_name: agent,
                execution_type: ExecutionType::Recalculate,
                input_ids: support.get(&category).cloned().unwrap_or_default(),
                priority: self.priority(&category),
            });
        }
    }
}

fn finish(mut plan: ExecutionPlan) -> ExecutionPlan {
    plan.entries
        .sort_by(|a, b| a.priority.cmp(&b.priority).then_with(|| a.agent_name.cmp(&b.agent_name)));
    plan.skipped.sort();
    plan.data_removed.sort();
    debug!(
        entries = plan.entries.len(),
        skipped = plan.skipped.len(),
        data_removed = plan.data_removed.len(),
        "plan: finished"
    );
    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClassifierConfig;
    use crate::domain::AgentResult;
    use serde_json::json;

    struct Fixture {
        keywords: KeywordTable,
        graph: DependencyGraph,
    }

    impl Fixture {
        fn new() -> Self {
            let config = ClassifierConfig::default();
            Self {
                keywords: KeywordTable::from_config(&config).unwrap(),
                graph: DependencyGraph::from_config(&config).unwrap(),
            }
        }

        fn planner(&self) -> Planner<'_> {
            Planner::new(&self.keywords, &self.graph)
        }
    }

    fn session_with(inputs: Vec<Input>) -> SessionState {
        let mut state = SessionState::new("party-1");
        state.inputs = inputs;
        state
    }

    fn completed(state: &mut SessionState, agent: &str) {
        completed_from(state, agent, &[]);
    }

    /// Completed slot whose execution was fed by `input_ids`
    fn completed_from(state: &mut SessionState, agent: &str, input_ids: &[&str]) {
        let mut slot = AgentResult::running(agent).with_inputs(input_ids.iter().map(|s| s.to_string()).collect());
        slot.complete(json!({}), 0.8);
        state.agent_results.insert(agent.to_string(), slot);
    }

    fn running(state: &mut SessionState, agent: &str) {
        running_from(state, agent, &[]);
    }

    fn running_from(state: &mut SessionState, agent: &str, input_ids: &[&str]) {
        let slot = AgentResult::running(agent).with_inputs(input_ids.iter().map(|s| s.to_string()).collect());
        state.agent_results.insert(agent.to_string(), slot);
    }

    #[test]
    fn test_start_for_new_agents_in_priority_order() {
        let fx = Fixture::new();
        let input = Input::text("dinosaur theme party, chocolate cake, at the park");
        let state = session_with(vec![input.clone()]);

        let plan = fx.planner().plan_for_added(&state, &input, &[]);
        let names: Vec<&str> = plan.entries.iter().map(|e| e.agent_name.as_str()).collect();
        assert_eq!(names, vec!["theme_agent", "venue_agent", "cake_agent"]);
        assert!(plan.entries.iter().all(|e| e.execution_type == ExecutionType::Start));
        assert_eq!(plan.entries[0].priority, 1);
        assert_eq!(plan.entries[0].input_ids, vec![input.input_id.clone()]);
    }

    #[test]
    fn test_rerun_cascades_to_completed_dependents() {
        let fx = Fixture::new();
        let first = Input::text("jungle theme");
        let second = Input::text("actually a pirate theme");
        let mut state = session_with(vec![first.clone(), second.clone()]);
        completed(&mut state, "theme_agent");
        completed(&mut state, "cake_agent");
        completed(&mut state, "catering_agent");

        let plan = fx.planner().plan_for_added(&state, &second, &[]);

        let theme = plan.entry("theme_agent").unwrap();
        assert_eq!(theme.execution_type, ExecutionType::Rerun);
        assert_eq!(theme.input_ids, vec![first.input_id.clone(), second.input_id.clone()]);

        // cake directly downstream, catering through venue
        assert_eq!(plan.entry("cake_agent").unwrap().execution_type, ExecutionType::Recalculate);
        assert_eq!(plan.entry("catering_agent").unwrap().execution_type, ExecutionType::Recalculate);
        // vendor never ran, so it is not recalculated
        assert!(plan.entry("vendor_agent").is_none());
    }

    #[test]
    fn test_running_agent_is_skipped_and_not_cascaded() {
        let fx = Fixture::new();
        let input = Input::text("unicorn theme");
        let mut state = session_with(vec![input.clone()]);
        running(&mut state, "theme_agent");
        completed(&mut state, "cake_agent");

        let plan = fx.planner().plan_for_added(&state, &input, &[]);
        assert!(plan.entries.is_empty());
        assert_eq!(plan.skipped, vec!["theme_agent".to_string()]);
    }

    #[test]
    fn test_failed_agent_reruns() {
        let fx = Fixture::new();
        let input = Input::text("need a magician");
        let mut state = session_with(vec![input.clone()]);
        let mut slot = AgentResult::running("vendor_agent");
        slot.fail("boom");
        state.agent_results.insert("vendor_agent".to_string(), slot);

        let plan = fx.planner().plan_for_added(&state, &input, &[]);
        assert_eq!(plan.entry("vendor_agent").unwrap().execution_type, ExecutionType::Rerun);
    }

    #[test]
    fn test_event_hints_create_candidates() {
        let fx = Fixture::new();
        let input = Input::new("IMG_0042.jpg", crate::domain::SourceType::Image);
        let state = session_with(vec![input.clone()]);

        let plan = fx.planner().plan_for_added(&state, &input, &["venue".to_string()]);
        assert_eq!(plan.entries.len(), 1);
        assert_eq!(plan.entries[0].agent_name, "venue_agent");
        assert_eq!(plan.entries[0].input_ids, vec![input.input_id.clone()]);
    }

    #[test]
    fn test_removal_with_no_support_clears() {
        let fx = Fixture::new();
        let cake = Input::text("chocolate cake");
        let lunch = Input::text("pizza lunch");
        let mut state = session_with(vec![cake.clone(), lunch.clone()]);
        completed_from(&mut state, "cake_agent", &[cake.input_id.as_str()]);
        completed_from(&mut state, "venue_agent", &["input-venue"]);
        completed_from(&mut state, "catering_agent", &[lunch.input_id.as_str()]);

        // the venue input was removed; cake and catering inputs remain
        let plan = fx.planner().plan_for_removed(&state, "input-venue");
        assert_eq!(plan.data_removed, vec!["venue_agent".to_string()]);
        assert!(plan.entry("venue_agent").is_none());
        // cake never saw the venue input
        assert!(plan.entry("cake_agent").is_none());
        // catering depends on venue
        assert_eq!(plan.entry("catering_agent").unwrap().execution_type, ExecutionType::Recalculate);
        assert_eq!(plan.entries.len(), 1);
    }

    #[test]
    fn test_removal_with_support_reruns_unless_running() {
        let fx = Fixture::new();
        let theme = Input::text("pirate theme");
        let venue = Input::text("backyard venue");
        let mut state = session_with(vec![theme.clone(), venue.clone()]);
        completed_from(&mut state, "theme_agent", &[theme.input_id.as_str(), "input-gone"]);
        running_from(&mut state, "venue_agent", &[venue.input_id.as_str(), "input-gone"]);

        let plan = fx.planner().plan_for_removed(&state, "input-gone");
        let rerun = plan.entry("theme_agent").unwrap();
        assert_eq!(rerun.execution_type, ExecutionType::Rerun);
        assert_eq!(rerun.input_ids, vec![theme.input_id.clone()]);
        assert_eq!(plan.skipped, vec!["venue_agent".to_string()]);
        assert!(plan.data_removed.is_empty());
    }

    #[test]
    fn test_removal_leaves_agents_it_never_fed() {
        let fx = Fixture::new();
        let theme = Input::text("jungle theme");
        let cake = Input::text("vanilla cake");
        let mut state = session_with(vec![theme.clone(), cake.clone()]);
        completed_from(&mut state, "theme_agent", &[theme.input_id.as_str()]);
        completed_from(&mut state, "cake_agent", &[cake.input_id.as_str(), "input-cupcakes"]);

        let plan = fx.planner().plan_for_removed(&state, "input-cupcakes");
        assert_eq!(plan.entry("cake_agent").unwrap().execution_type, ExecutionType::Rerun);
        assert!(plan.entry("theme_agent").is_none());
        assert!(plan.data_removed.is_empty());
    }

    #[test]
    fn test_removal_ignores_agents_outside_keyword_table() {
        let fx = Fixture::new();
        let mut state = session_with(vec![]);
        completed(&mut state, "weather_agent");

        let plan = fx.planner().plan_for_removed(&state, "input-1");
        assert!(plan.is_empty());
    }
}
