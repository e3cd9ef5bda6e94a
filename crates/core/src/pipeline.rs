//! Scenario pipeline state machine
//!
//! Every scenario walks `Pending → Built → Running → Ready → Verified`, with
//! optional steps skippable in the forward direction. `TornDown` is reachable
//! from every stage and is terminal.

use crate::errors::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Stage of a scenario pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Stage {
    Pending,
    Built,
    Running,
    Ready,
    Verified,
    TornDown,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Pending => "Pending",
            Self::Built => "Built",
            Self::Running => "Running",
            Self::Ready => "Ready",
            Self::Verified => "Verified",
            Self::TornDown => "TornDown",
        };
        write!(f, "{}", name)
    }
}

impl Stage {
    /// Whether `self → to` is a permitted transition
    pub fn can_advance_to(self, to: Stage) -> bool {
        match (self, to) {
            (Self::TornDown, _) => false,
            (_, Self::TornDown) => true,
            // a scenario may start several containers or rebuild
            (Self::Running, Self::Running) | (Self::Built, Self::Built) => true,
            // a verified scenario may go on to start or build further images
            (Self::Verified, Self::Built | Self::Running) => true,
            (from, to) => to > from,
        }
    }
}

/// Tracks the stage of one scenario
#[derive(Debug, Clone)]
pub struct Pipeline {
    stage: Stage,
    history: Vec<Stage>,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl Pipeline {
    pub fn new() -> Self {
        Self {
            stage: Stage::Pending,
            history: vec![Stage::Pending],
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Stages visited, in order
    pub fn history(&self) -> &[Stage] {
        &self.history
    }

    /// Move to `to`, rejecting transitions the stage graph does not allow
    pub fn advance(&mut self, to: Stage) -> Result<()> {
        if !self.stage.can_advance_to(to) {
            return Err(PipelineError::InvalidTransition {
                from: self.stage.to_string(),
                to: to.to_string(),
            }
            .into());
        }
        debug!("pipeline {} -> {}", self.stage, to);
        self.stage = to;
        self.history.push(to);
        Ok(())
    }

    /// Move to `to` when permitted and not already there; otherwise stay put
    ///
    /// A torn-down pipeline still rejects every move.
    pub fn advance_if_ahead(&mut self, to: Stage) -> Result<()> {
        if self.stage == Stage::TornDown || (self.stage != to && self.stage.can_advance_to(to)) {
            self.advance(to)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_forward_walk() {
        let mut p = Pipeline::new();
        for stage in [
            Stage::Built,
            Stage::Running,
            Stage::Ready,
            Stage::Verified,
            Stage::TornDown,
        ] {
            p.advance(stage).unwrap();
        }
        assert_eq!(p.stage(), Stage::TornDown);
        assert_eq!(p.history().len(), 6);
    }

    #[test]
    fn test_optional_steps_can_be_skipped() {
        let mut p = Pipeline::new();
        p.advance(Stage::Built).unwrap();
        p.advance(Stage::Verified).unwrap();
        p.advance(Stage::TornDown).unwrap();
    }

    #[test]
    fn test_backward_moves_rejected() {
        let mut p = Pipeline::new();
        p.advance(Stage::Built).unwrap();
        p.advance(Stage::Ready).unwrap();
        let err = p.advance(Stage::Built).unwrap_err();
        assert!(err.to_string().contains("from Ready to Built"));
        assert_eq!(p.stage(), Stage::Ready);
    }

    #[test]
    fn test_torn_down_is_terminal() {
        let mut p = Pipeline::new();
        p.advance(Stage::TornDown).unwrap();
        assert!(p.advance(Stage::Running).is_err());
        assert!(p.advance(Stage::TornDown).is_err());
    }

    #[test]
    fn test_multiple_containers_and_rebuilds() {
        let mut p = Pipeline::new();
        p.advance(Stage::Built).unwrap();
        p.advance(Stage::Running).unwrap();
        p.advance(Stage::Running).unwrap();
        p.advance(Stage::Verified).unwrap();
        p.advance(Stage::Built).unwrap();
        p.advance(Stage::Running).unwrap();
    }

    #[test]
    fn test_advance_if_ahead_ignores_repeats() {
        let mut p = Pipeline::new();
        p.advance(Stage::Built).unwrap();
        p.advance(Stage::Ready).unwrap();
        p.advance_if_ahead(Stage::Ready).unwrap();
        p.advance_if_ahead(Stage::Running).unwrap();
        assert_eq!(p.stage(), Stage::Ready);
        p.advance_if_ahead(Stage::Verified).unwrap();
        assert_eq!(p.stage(), Stage::Verified);
        p.advance(Stage::TornDown).unwrap();
        assert!(p.advance_if_ahead(Stage::Running).is_err());
    }
}
