//! Constant termination

use super::TerminationStrategy;
use crate::history::History;
use crate::rooms::TerminationRule;

/// Returns a fixed boolean, optionally restricted to an agent allow-list.
///
/// An empty allow-list means any acting agent can trigger it.
pub struct ConstantTermination {
    name: String,
    finished: bool,
    agents: Vec<String>,
}

impl ConstantTermination {
    /// Build from a configured termination rule
    #[must_use]
    pub fn from_rule(rule: &TerminationRule) -> Self {
        Self {
            name: rule.name.clone(),
            finished: rule.finished,
            agents: rule.agents.clone(),
        }
    }
}

impl TerminationStrategy for ConstantTermination {
    fn name(&self) -> &str {
        &self.name
    }

    fn should_end(&self, _history: &History, acting_agent: &str) -> bool {
        if !self.finished {
            return false;
        }
        self.agents.is_empty()
            || self
                .agents
                .iter()
                .any(|a| a.eq_ignore_ascii_case(acting_agent))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(finished: bool, agents: Vec<&str>) -> TerminationRule {
        TerminationRule {
            name: "wrap-up".to_string(),
            finished,
            agents: agents.into_iter().map(String::from).collect(),
        }
    }

    #[test]
    fn test_never_finishes_when_false() {
        let strategy = ConstantTermination::from_rule(&rule(false, vec!["Scout"]));
        assert!(!strategy.should_end(&History::new(), "Scout"));
    }

    #[test]
    fn test_empty_allow_list_matches_any_agent() {
        let strategy = ConstantTermination::from_rule(&rule(true, vec![]));
        assert!(strategy.should_end(&History::new(), "Guide"));
    }

    #[test]
    fn test_allow_list_is_case_insensitive() {
        let strategy = ConstantTermination::from_rule(&rule(true, vec!["Scout"]));
        assert!(strategy.should_end(&History::new(), "scout"));
        assert!(!strategy.should_end(&History::new(), "Guide"));
    }
}
