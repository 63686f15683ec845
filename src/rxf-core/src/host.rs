// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Integration points towards the host service framework.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::error;

use crate::adapter::CapabilitySet;
use crate::catalog::ConfigDataSource;
use crate::controller::ServicePolicy;
use crate::error::{FilterError, FilterResult};
use crate::radio::{AntennaBranchId, FilterBranchId};

/// Token correlating a service instance with a driver instance.
///
/// `-1` means no instance; otherwise 0 = RxBranchA, 1 = RxBranchB, ...
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstanceToken(pub i32);

impl InstanceToken {
    pub const NO_INSTANCE: InstanceToken = InstanceToken(-1);

    pub fn is_instance(self) -> bool {
        self.0 >= 0
    }
}

impl fmt::Display for InstanceToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_instance() {
            write!(f, "{}", self.0)
        } else {
            f.write_str("NoInstance")
        }
    }
}

/// Receives every failure the filter chain reports.
pub trait ErrorSink: Send + Sync {
    fn report(&self, branch: Option<FilterBranchId>, error: &FilterError);
}

/// Sink that logs through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingErrorSink;

impl ErrorSink for TracingErrorSink {
    fn report(&self, branch: Option<FilterBranchId>, err: &FilterError) {
        match branch {
            Some(branch) => error!("filter branch {} [{:?}]: {}", branch, err.kind(), err),
            None => error!("filter request [{:?}]: {}", err.kind(), err),
        }
    }
}

/// Locates the collaborators a filter service depends on.
pub trait ServiceLocator: Send + Sync {
    fn data_source(&self) -> Arc<dyn ConfigDataSource>;

    /// Block interfaces of one filter branch of the driver instance `token`.
    fn capabilities(
        &self,
        token: InstanceToken,
        branch: FilterBranchId,
    ) -> FilterResult<CapabilitySet>;
}

/// Filter service settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterServiceConfig {
    /// Sample rate delivered by the multi-carrier block filter, in Hz.
    pub input_rate_hz: u64,
    /// Filter branches of the antenna branch.
    pub filter_branches: Vec<u8>,
    /// Capability answers, given inline with the service settings.
    #[serde(flatten)]
    pub policy: ServicePolicy,
}

impl Default for FilterServiceConfig {
    fn default() -> Self {
        Self {
            input_rate_hz: 245_760_000,
            filter_branches: vec![0, 1, 2, 3],
            policy: ServicePolicy::default(),
        }
    }
}

impl FilterServiceConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.input_rate_hz == 0 {
            return Err("[service].input_rate_hz must be > 0".to_string());
        }
        if self.filter_branches.is_empty() {
            return Err("[service].filter_branches must not be empty".to_string());
        }
        let mut seen = std::collections::HashSet::new();
        for id in &self.filter_branches {
            if !seen.insert(id) {
                return Err(format!("[service].filter_branches lists {id} twice"));
            }
        }
        Ok(())
    }
}

/// Generic data every service instance is created with.
#[derive(Debug, Clone)]
pub struct ServiceCommonData {
    pub variant: String,
    pub antenna_branch: AntennaBranchId,
    pub config: FilterServiceConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instance_token_display() {
        assert_eq!(InstanceToken(1).to_string(), "1");
        assert_eq!(InstanceToken::NO_INSTANCE.to_string(), "NoInstance");
        assert!(!InstanceToken::NO_INSTANCE.is_instance());
    }

    #[test]
    fn test_service_config_validation() {
        assert!(FilterServiceConfig::default().validate().is_ok());

        let zero_rate = FilterServiceConfig {
            input_rate_hz: 0,
            ..Default::default()
        };
        assert!(zero_rate.validate().is_err());

        let duplicate = FilterServiceConfig {
            filter_branches: vec![0, 1, 0],
            ..Default::default()
        };
        assert!(duplicate.validate().unwrap_err().contains("twice"));
    }
}
