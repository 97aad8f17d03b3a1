use crate::state::{Decision, State};

/// Outcome of the decision procedure for one step.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Transition {
    pub state: State,
    pub decision: Decision,
}

impl Transition {
    pub fn to(state: State) -> Self {
        Self {
            state,
            decision: Decision::FreshDeploy,
        }
    }

    pub fn with_decision(mut self, decision: Decision) -> Self {
        self.decision = decision;
        self
    }
}
