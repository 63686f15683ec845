// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use std::collections::HashMap;
use std::sync::Arc;

use rxf_app::normalize_name;
use rxf_core::engine::ChainStage;
use rxf_core::{
    CapabilitySet, ConfigDataSource, DynResult, FilterBranchId, FilterError, FilterResult,
    InstanceToken, ServiceLocator,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[cfg(feature = "sim")]
pub mod sim;

/// Options handed to a backend factory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendOptions {
    /// Stage (`"MCB"`, `"DEC2_0"` .. `"SFIR"`) whose configuration the
    /// backend rejects. Only honoured by simulated hardware.
    pub fail_stage: Option<String>,
}

impl BackendOptions {
    pub fn fail_stage(&self) -> FilterResult<Option<ChainStage>> {
        self.fail_stage
            .as_deref()
            .map(str::parse::<ChainStage>)
            .transpose()
    }
}

pub type AdapterFactory =
    fn(InstanceToken, FilterBranchId, &BackendOptions) -> DynResult<CapabilitySet>;

/// Context for registering and instantiating hardware generations.
#[derive(Clone)]
pub struct RegistrationContext {
    factories: HashMap<String, AdapterFactory>,
}

impl RegistrationContext {
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Register a factory under a stable name (e.g. "sim").
    pub fn register_backend(&mut self, name: &str, factory: AdapterFactory) {
        self.factories.insert(normalize_name(name), factory);
    }

    pub fn is_backend_registered(&self, name: &str) -> bool {
        self.factories.contains_key(&normalize_name(name))
    }

    /// Registered backend names, sorted.
    pub fn registered_backends(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.keys().cloned().collect();
        names.sort();
        names
    }

    /// Instantiate the block interfaces of one filter branch.
    pub fn build_capabilities(
        &self,
        name: &str,
        token: InstanceToken,
        branch: FilterBranchId,
        options: &BackendOptions,
    ) -> DynResult<CapabilitySet> {
        let factory = self
            .factories
            .get(&normalize_name(name))
            .ok_or_else(|| format!("Unknown filter backend: {}", name))?;
        factory(token, branch, options)
    }
}

impl Default for RegistrationContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Register all built-in backends enabled by features on a context.
pub fn register_builtin_backends_on(context: &mut RegistrationContext) {
    #[cfg(feature = "sim")]
    context.register_backend("sim", sim::sim_factory);
    #[cfg(not(feature = "sim"))]
    let _ = context;
}

/// Service locator backed by a catalog and a registered hardware generation.
pub struct BackendLocator {
    source: Arc<dyn ConfigDataSource>,
    context: RegistrationContext,
    model: String,
    options: BackendOptions,
}

impl BackendLocator {
    pub fn new(
        source: Arc<dyn ConfigDataSource>,
        context: RegistrationContext,
        model: &str,
        options: BackendOptions,
    ) -> DynResult<Self> {
        if !context.is_backend_registered(model) {
            return Err(format!(
                "Unknown filter backend: {} (available: {})",
                model,
                context.registered_backends().join(", ")
            )
            .into());
        }
        options.fail_stage()?;
        Ok(Self {
            source,
            context,
            model: model.to_string(),
            options,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

impl ServiceLocator for BackendLocator {
    fn data_source(&self) -> Arc<dyn ConfigDataSource> {
        self.source.clone()
    }

    fn capabilities(
        &self,
        token: InstanceToken,
        branch: FilterBranchId,
    ) -> FilterResult<CapabilitySet> {
        debug!("binding {} block interfaces for {}/{}", self.model, token, branch);
        self.context
            .build_capabilities(&self.model, token, branch, &self.options)
            .map_err(|e| {
                FilterError::invalid(format!(
                    "{} backend has no block interfaces for branch {}: {}",
                    self.model, branch, e
                ))
            })
    }
}
