// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Filter chain controller components.
//!
//! This module contains the per-branch state machine, the chain planner that
//! combines catalog lookups with sample-rate propagation, and the service
//! that drives ordered initialization and reverse-order release.

pub mod branch;
pub mod machine;
pub mod plan;
pub mod service;

#[cfg(test)]
pub(crate) mod mock;

use serde::{Deserialize, Serialize};

pub use branch::FilterBranch;
pub use machine::{BranchEvent, BranchState, BranchStateMachine, ConfiguredStateData};
pub use plan::{ChainPlan, ChainPlanner, FilterSpec, StageKind, StagePlan};
pub use service::{BranchSnapshot, DigitalFilterService, ServiceSnapshot};

/// Capability answers reported to the host.
///
/// `report_filter_engines` stays false by default even though the engines
/// can be cascaded: cascading is not supported upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServicePolicy {
    pub has_decimation_filter: bool,
    pub has_channel_filter: bool,
    pub report_filter_engines: bool,
}

impl Default for ServicePolicy {
    fn default() -> Self {
        Self {
            has_decimation_filter: true,
            has_channel_filter: true,
            report_filter_engines: false,
        }
    }
}
