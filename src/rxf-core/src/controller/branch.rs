// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! One filter branch: its state machine, engine registry and block interfaces.

use tracing::{debug, warn};

use super::machine::{BranchEvent, BranchState, BranchStateMachine, ConfiguredStateData};
use super::plan::{ChainPlan, StageKind, StagePlan};
use crate::adapter::{CapabilitySet, RateParams};
use crate::engine::{ChainStage, FilterEngine, FilterEngineRegistry, SlotConfig};
use crate::error::{AdapterError, FilterError, FilterResult};
use crate::radio::FilterBranchId;

#[derive(Debug)]
pub struct FilterBranch {
    id: FilterBranchId,
    machine: BranchStateMachine,
    registry: FilterEngineRegistry,
    capabilities: Option<CapabilitySet>,
}

impl FilterBranch {
    pub fn new(id: FilterBranchId) -> Self {
        Self {
            id,
            machine: BranchStateMachine::new(),
            registry: FilterEngineRegistry::new(id),
            capabilities: None,
        }
    }

    pub fn id(&self) -> FilterBranchId {
        self.id
    }

    pub fn state(&self) -> &BranchState {
        self.machine.state()
    }

    pub fn machine(&self) -> &BranchStateMachine {
        &self.machine
    }

    pub fn registry(&self) -> &FilterEngineRegistry {
        &self.registry
    }

    pub fn is_bound(&self) -> bool {
        self.capabilities.is_some()
    }

    /// Attach the block interfaces this branch programs.
    pub fn bind(&mut self, capabilities: CapabilitySet) {
        debug!(
            "filter branch {} bound to {} blocks",
            self.id, capabilities.hardware
        );
        self.capabilities = Some(capabilities);
    }

    /// Configure every stage of `plan` in order. On the first failing stage
    /// the stages configured so far are released again.
    pub fn configure(&mut self, plan: &ChainPlan) -> FilterResult<()> {
        match self.machine.state() {
            BranchState::Unconfigured => {}
            BranchState::Configured(_) => return Err(FilterError::AlreadyConfigured(self.id)),
            other => {
                return Err(FilterError::invalid(format!(
                    "filter branch {} is {}",
                    self.id, other
                )))
            }
        }
        let id = self.id;
        let Self {
            machine,
            registry,
            capabilities,
            ..
        } = self;
        let caps = capabilities.as_mut().ok_or_else(|| unbound(id))?;

        machine.process_event(BranchEvent::ConfigureRequested);
        let result = plan
            .stages
            .iter()
            .try_for_each(|step| {
                apply_stage(caps, step)?;
                debug!(
                    "branch {}: {} configured with {} ({} -> {} Hz)",
                    id,
                    step.stage,
                    step.coefficients.name(),
                    step.rate.input_hz,
                    step.rate.output_hz
                );
                registry.mark_configured(
                    step.stage,
                    SlotConfig {
                        filter: step.coefficients.name().to_string(),
                        input_hz: step.rate.input_hz,
                        output_hz: step.rate.output_hz,
                    },
                )
            })
            .and_then(|()| registry.check_continuity());

        match result {
            Ok(()) => {
                machine.process_event(BranchEvent::Configured(ConfiguredStateData {
                    standard: plan.standard,
                    carrier: plan.carrier,
                    slot_length: plan.slot_length,
                    sub_carrier_spacing: plan.sub_carrier_spacing,
                }));
                Ok(())
            }
            Err(err) => {
                machine.process_event(BranchEvent::StageFailed(err.to_string()));
                warn!("branch {}: configuration failed, unwinding: {}", id, err);
                for unwind_err in release_stages(caps, registry) {
                    warn!("branch {}: unwind: {}", id, unwind_err);
                }
                machine.process_event(BranchEvent::Unwound);
                Err(err)
            }
        }
    }

    /// Release every configured stage in reverse order. Driver failures do not
    /// stop the walk; the first one is returned once the branch is released.
    pub fn release(&mut self) -> FilterResult<()> {
        if !self.machine.state().is_configured() {
            return Err(FilterError::NotConfigured {
                branch: self.id,
                what: "filter chain".to_string(),
            });
        }
        let id = self.id;
        let Self {
            machine,
            registry,
            capabilities,
            ..
        } = self;
        let caps = capabilities.as_mut().ok_or_else(|| unbound(id))?;

        machine.process_event(BranchEvent::ReleaseRequested);
        let mut errors = release_stages(caps, registry);
        machine.process_event(BranchEvent::Released);
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors.remove(0))
        }
    }

    /// Rate the channel filter of a configured branch runs at.
    pub fn channel_filter_rate(&self) -> FilterResult<RateParams> {
        self.registry
            .config(ChainStage::Engine(FilterEngine::Sfir))
            .map(|cfg| RateParams {
                input_hz: cfg.input_hz,
                output_hz: cfg.output_hz,
            })
            .ok_or_else(|| self.sfir_not_configured())
    }

    /// Reprogram the channel filter only. The recorded configuration is kept
    /// when the driver rejects the new coefficients.
    pub fn reconfigure_channel_filter(&mut self, step: &StagePlan) -> FilterResult<()> {
        if !self.machine.state().is_configured() {
            return Err(FilterError::NotConfigured {
                branch: self.id,
                what: "filter chain".to_string(),
            });
        }
        let StageKind::Channel(params) = step.kind else {
            return Err(FilterError::invalid(format!(
                "{} is not a channel filter stage",
                step.stage
            )));
        };
        let id = self.id;
        let caps = self.capabilities.as_mut().ok_or_else(|| unbound(id))?;
        caps.channel
            .reconfigure(&step.coefficients, params)
            .map_err(|e| FilterError::adapter(step.stage, e))?;
        let previous = self.registry.replace_config(
            step.stage,
            SlotConfig {
                filter: step.coefficients.name().to_string(),
                input_hz: step.rate.input_hz,
                output_hz: step.rate.output_hz,
            },
        )?;
        debug!(
            "branch {}: channel filter {} -> {}",
            id,
            previous.filter,
            step.coefficients.name()
        );
        Ok(())
    }

    pub fn read_cfg_delay(&self) -> FilterResult<u32> {
        if !self.registry.is_configured(ChainStage::Engine(FilterEngine::Sfir)) {
            return Err(self.sfir_not_configured());
        }
        let caps = self.capabilities.as_ref().ok_or_else(|| unbound(self.id))?;
        caps.channel
            .read_cfg_delay()
            .map_err(|e| FilterError::adapter(FilterEngine::Sfir.into(), e))
    }

    pub fn write_cfg_delay(&mut self, delay: u32) -> FilterResult<()> {
        if !self.registry.is_configured(ChainStage::Engine(FilterEngine::Sfir)) {
            return Err(self.sfir_not_configured());
        }
        let id = self.id;
        let caps = self.capabilities.as_mut().ok_or_else(|| unbound(id))?;
        caps.channel
            .write_cfg_delay(delay)
            .map_err(|e| FilterError::adapter(FilterEngine::Sfir.into(), e))
    }

    fn sfir_not_configured(&self) -> FilterError {
        FilterError::NotConfigured {
            branch: self.id,
            what: FilterEngine::Sfir.to_string(),
        }
    }
}

fn unbound(id: FilterBranchId) -> FilterError {
    FilterError::invalid(format!("filter branch {id} has no block interfaces bound"))
}

fn apply_stage(caps: &mut CapabilitySet, step: &StagePlan) -> FilterResult<()> {
    let coefficients = &step.coefficients;
    let result: Result<(), AdapterError> = match step.kind {
        StageKind::MultiCarrierBlock => caps.mcb.configure(coefficients, step.rate),
        StageKind::Decimation { index } => {
            caps.decimation.configure(index, coefficients, step.rate)
        }
        StageKind::Src(mode) => caps.src.configure(coefficients, mode, step.rate),
        StageKind::Channel(params) => caps.channel.configure(coefficients, params, step.rate),
    };
    result.map_err(|e| FilterError::adapter(step.stage, e))
}

/// Release the configured stages of `registry` in reverse order.
fn release_stages(caps: &mut CapabilitySet, registry: &mut FilterEngineRegistry) -> Vec<FilterError> {
    let mut errors = Vec::new();
    for stage in registry.release_plan() {
        let result = match stage {
            ChainStage::MultiCarrierBlock => caps.mcb.release(),
            ChainStage::Engine(FilterEngine::Src) => caps.src.release(),
            ChainStage::Engine(FilterEngine::Sfir) => caps.channel.release(),
            ChainStage::Engine(engine) => {
                caps.decimation.release(engine.decimation_index().unwrap_or_default())
            }
        };
        if let Err(e) = result {
            errors.push(FilterError::adapter(stage, e));
        }
        if let Err(e) = registry.mark_released(stage) {
            errors.push(e);
        }
        debug!("branch {}: {} released", registry.branch(), stage);
    }
    errors
}
