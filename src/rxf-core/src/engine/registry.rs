// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Per-branch record of which filter engines are configured.

use serde::Serialize;

use super::{ChainStage, FilterEngine, INIT_ORDER, NUMBER_OF_FILTERS};
use crate::error::{FilterError, FilterResult};
use crate::radio::FilterBranchId;

/// What a configured stage was programmed with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlotConfig {
    pub filter: String,
    pub input_hz: u64,
    pub output_hz: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct EngineSlot {
    pub engine: FilterEngine,
    pub config: Option<SlotConfig>,
}

impl EngineSlot {
    pub fn is_configured(&self) -> bool {
        self.config.is_some()
    }
}

/// Fixed set of engine slots of one filter branch, plus the multi-carrier
/// block filter feeding it.
#[derive(Debug, Clone, Serialize)]
pub struct FilterEngineRegistry {
    branch: FilterBranchId,
    mcb: Option<SlotConfig>,
    slots: [EngineSlot; NUMBER_OF_FILTERS],
}

impl FilterEngineRegistry {
    pub fn new(branch: FilterBranchId) -> Self {
        Self {
            branch,
            mcb: None,
            slots: INIT_ORDER.map(|engine| EngineSlot {
                engine,
                config: None,
            }),
        }
    }

    pub fn branch(&self) -> FilterBranchId {
        self.branch
    }

    pub fn slot(&self, engine: FilterEngine) -> &EngineSlot {
        &self.slots[engine.init_step()]
    }

    pub fn slots(&self) -> &[EngineSlot] {
        &self.slots
    }

    pub fn config(&self, stage: ChainStage) -> Option<&SlotConfig> {
        match stage {
            ChainStage::MultiCarrierBlock => self.mcb.as_ref(),
            ChainStage::Engine(engine) => self.slot(engine).config.as_ref(),
        }
    }

    pub fn is_configured(&self, stage: ChainStage) -> bool {
        self.config(stage).is_some()
    }

    /// True when no stage is configured.
    pub fn is_empty(&self) -> bool {
        self.mcb.is_none() && self.slots.iter().all(|s| !s.is_configured())
    }

    fn entry(&mut self, stage: ChainStage) -> &mut Option<SlotConfig> {
        match stage {
            ChainStage::MultiCarrierBlock => &mut self.mcb,
            ChainStage::Engine(engine) => &mut self.slots[engine.init_step()].config,
        }
    }

    /// Record a successfully configured stage.
    pub fn mark_configured(&mut self, stage: ChainStage, config: SlotConfig) -> FilterResult<()> {
        let branch = self.branch;
        let entry = self.entry(stage);
        if entry.is_some() {
            return Err(FilterError::AlreadyConfigured(branch));
        }
        *entry = Some(config);
        Ok(())
    }

    /// Replace the record of an already configured stage.
    pub fn replace_config(
        &mut self,
        stage: ChainStage,
        config: SlotConfig,
    ) -> FilterResult<SlotConfig> {
        let branch = self.branch;
        match self.entry(stage) {
            Some(current) => Ok(std::mem::replace(current, config)),
            None => Err(FilterError::NotConfigured {
                branch,
                what: stage.to_string(),
            }),
        }
    }

    /// Forget a stage. Fails if the stage was never configured.
    pub fn mark_released(&mut self, stage: ChainStage) -> FilterResult<SlotConfig> {
        let branch = self.branch;
        self.entry(stage)
            .take()
            .ok_or_else(|| FilterError::NotConfigured {
                branch,
                what: stage.to_string(),
            })
    }

    /// Configured stages in initialization order.
    pub fn configured_stages(&self) -> Vec<ChainStage> {
        self.mcb
            .iter()
            .map(|_| ChainStage::MultiCarrierBlock)
            .chain(
                self.slots
                    .iter()
                    .filter(|s| s.is_configured())
                    .map(|s| ChainStage::Engine(s.engine)),
            )
            .collect()
    }

    /// Configured stages in release order. Empty for a released branch.
    pub fn release_plan(&self) -> Vec<ChainStage> {
        let mut stages = self.configured_stages();
        stages.reverse();
        stages
    }

    /// Check that every configured stage is fed at the rate its predecessor
    /// produces.
    pub fn check_continuity(&self) -> FilterResult<()> {
        let stages = self.configured_stages();
        for pair in stages.windows(2) {
            let (Some(prev), Some(next)) = (self.config(pair[0]), self.config(pair[1])) else {
                continue;
            };
            if prev.output_hz != next.input_hz {
                return Err(FilterError::RateMismatch {
                    stage: pair[1],
                    expected_hz: prev.output_hz,
                    actual_hz: next.input_hz,
                });
            }
        }
        Ok(())
    }
}
