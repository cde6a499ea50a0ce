//! Checkout state machine.
//!
//! The only state the orchestrator holds across commands is which branch is
//! checked out. Tracking it explicitly lets each step assert where it is and
//! tells recovery whether the default branch must be restored.

use std::fmt;

use crate::error::DeployError;

/// Branch currently checked out by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Checkout {
    OnDefault,
    OnStage1,
    OnPublish,
}

impl Checkout {
    /// Validate a checkout and return the new state.
    pub fn transition(self, to: Checkout) -> Result<Checkout, DeployError> {
        use Checkout::{OnDefault, OnPublish, OnStage1};
        match (self, to) {
            (OnDefault, OnStage1)
            | (OnStage1, OnPublish)
            | (OnPublish, OnDefault)
            | (OnStage1, OnDefault) => Ok(to),
            _ => Err(DeployError::IllegalCheckout { from: self, to }),
        }
    }

    /// Assert the pipeline is on `expected` before a branch-specific command.
    pub fn require(self, expected: Checkout) -> Result<(), DeployError> {
        if self == expected {
            return Ok(());
        }
        Err(DeployError::IllegalCheckout {
            from: self,
            to: expected,
        })
    }
}

impl fmt::Display for Checkout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Checkout::OnDefault => "default branch",
            Checkout::OnStage1 => "stage branch",
            Checkout::OnPublish => "publish branch",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pipeline_path_is_legal() {
        let state = Checkout::OnDefault;
        let state = state.transition(Checkout::OnStage1).expect("stage1");
        let state = state.transition(Checkout::OnPublish).expect("publish");
        let state = state.transition(Checkout::OnDefault).expect("default");
        assert_eq!(state, Checkout::OnDefault);
    }

    #[test]
    fn recovery_from_stage1_is_legal() {
        assert_eq!(
            Checkout::OnStage1
                .transition(Checkout::OnDefault)
                .expect("restore"),
            Checkout::OnDefault
        );
    }

    #[test]
    fn skipping_stage1_is_rejected() {
        let err = Checkout::OnDefault
            .transition(Checkout::OnPublish)
            .expect_err("illegal");
        assert!(err.to_string().contains("publish branch"));
    }

    #[test]
    fn push_requires_publish_branch() {
        assert!(Checkout::OnPublish.require(Checkout::OnPublish).is_ok());
        assert!(Checkout::OnDefault.require(Checkout::OnPublish).is_err());
    }
}
