// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Filter branch state machine.
//!
//! `Unconfigured -> Configuring -> Configured -> Releasing -> Unconfigured`,
//! with `Configuring -> Failed -> Unconfigured` once a failed attempt has
//! been unwound.

use std::fmt;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::radio::{CarrierStandard, CarrierType, CpriSlotLength, SubCarrierSpacing};

/// Events that can trigger state transitions of a filter branch.
#[derive(Debug, Clone)]
pub enum BranchEvent {
    /// A configuration attempt starts
    ConfigureRequested,
    /// Every stage of the chain is configured
    Configured(ConfiguredStateData),
    /// A stage failed during configuration
    StageFailed(String),
    /// Stages of a failed attempt have been released
    Unwound,
    /// Release requested
    ReleaseRequested,
    /// Every stage has been released
    Released,
}

/// What a configured branch is running.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfiguredStateData {
    pub standard: CarrierStandard,
    pub carrier: CarrierType,
    pub slot_length: Option<CpriSlotLength>,
    pub sub_carrier_spacing: Option<SubCarrierSpacing>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "data")]
pub enum BranchState {
    #[default]
    Unconfigured,
    Configuring,
    Configured(ConfiguredStateData),
    Releasing,
    Failed { reason: String },
}

impl fmt::Display for BranchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unconfigured => write!(f, "Unconfigured"),
            Self::Configuring => write!(f, "Configuring"),
            Self::Configured(data) => write!(f, "Configured({})", data.carrier),
            Self::Releasing => write!(f, "Releasing"),
            Self::Failed { reason } => write!(f, "Failed({})", reason),
        }
    }
}

impl BranchState {
    pub fn is_configured(&self) -> bool {
        matches!(self, Self::Configured(_))
    }

    pub fn is_unconfigured(&self) -> bool {
        matches!(self, Self::Unconfigured)
    }

    pub fn configured(&self) -> Option<&ConfiguredStateData> {
        match self {
            Self::Configured(data) => Some(data),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct BranchStateMachine {
    state: BranchState,
    transition_count: u64,
    last_transition: Option<Instant>,
}

impl BranchStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &BranchState {
        &self.state
    }

    pub fn transition_count(&self) -> u64 {
        self.transition_count
    }

    pub fn time_in_state(&self) -> Option<Duration> {
        self.last_transition.map(|t| t.elapsed())
    }

    /// Process an event. Returns true if a transition occurred.
    pub fn process_event(&mut self, event: BranchEvent) -> bool {
        match self.next_state(event) {
            Some(state) => {
                self.state = state;
                self.transition_count += 1;
                self.last_transition = Some(Instant::now());
                true
            }
            None => false,
        }
    }

    fn next_state(&self, event: BranchEvent) -> Option<BranchState> {
        match (&self.state, event) {
            (BranchState::Unconfigured, BranchEvent::ConfigureRequested) => {
                Some(BranchState::Configuring)
            }
            (BranchState::Configuring, BranchEvent::Configured(data)) => {
                Some(BranchState::Configured(data))
            }
            (BranchState::Configuring, BranchEvent::StageFailed(reason)) => {
                Some(BranchState::Failed { reason })
            }
            (BranchState::Failed { .. }, BranchEvent::Unwound) => Some(BranchState::Unconfigured),
            (BranchState::Configured(_), BranchEvent::ReleaseRequested) => {
                Some(BranchState::Releasing)
            }
            (BranchState::Releasing, BranchEvent::Released) => Some(BranchState::Unconfigured),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lte20() -> ConfiguredStateData {
        ConfiguredStateData {
            standard: CarrierStandard::Lte,
            carrier: CarrierType::Lte20,
            slot_length: None,
            sub_carrier_spacing: None,
        }
    }

    #[test]
    fn test_initial_state() {
        let sm = BranchStateMachine::new();
        assert!(sm.state().is_unconfigured());
        assert_eq!(sm.transition_count(), 0);
    }

    #[test]
    fn test_full_lifecycle() {
        let mut sm = BranchStateMachine::new();
        assert!(sm.process_event(BranchEvent::ConfigureRequested));
        assert_eq!(sm.state(), &BranchState::Configuring);
        assert!(sm.process_event(BranchEvent::Configured(lte20())));
        assert!(sm.state().is_configured());
        assert!(sm.process_event(BranchEvent::ReleaseRequested));
        assert_eq!(sm.state(), &BranchState::Releasing);
        assert!(sm.process_event(BranchEvent::Released));
        assert!(sm.state().is_unconfigured());
        assert_eq!(sm.transition_count(), 4);
    }

    #[test]
    fn test_failure_unwinds_to_unconfigured() {
        let mut sm = BranchStateMachine::new();
        sm.process_event(BranchEvent::ConfigureRequested);
        assert!(sm.process_event(BranchEvent::StageFailed("DEC2_2".into())));
        assert_eq!(sm.state().to_string(), "Failed(DEC2_2)");
        assert!(sm.process_event(BranchEvent::Unwound));
        assert!(sm.state().is_unconfigured());
    }

    #[test]
    fn test_time_in_state_starts_at_first_transition() {
        let mut sm = BranchStateMachine::new();
        assert!(sm.time_in_state().is_none());
        sm.process_event(BranchEvent::ConfigureRequested);
        assert!(sm.time_in_state().is_some());
    }

    #[test]
    fn test_invalid_transitions() {
        let mut sm = BranchStateMachine::new();
        assert!(!sm.process_event(BranchEvent::ReleaseRequested));
        assert!(!sm.process_event(BranchEvent::Configured(lte20())));
        assert!(sm.state().is_unconfigured());

        sm.process_event(BranchEvent::ConfigureRequested);
        sm.process_event(BranchEvent::Configured(lte20()));
        assert!(!sm.process_event(BranchEvent::ConfigureRequested));
        assert!(sm.state().is_configured());
    }
}
