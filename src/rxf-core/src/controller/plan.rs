// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Resolution of a configuration request into per-stage programming.
//!
//! A plan carries the coefficients and rates of every stage and is fully
//! validated before the first driver call.

use std::collections::HashSet;

use crate::adapter::{ChannelFilterParams, RateParams, SrcMode};
use crate::catalog::{CoefficientLookup, CoefficientSet, SRC_CTSR_FILTER};
use crate::engine::{ChainStage, FilterEngine};
use crate::error::{FilterError, FilterResult};
use crate::pipeline::{RateRule, SampleRatePipeline};
use crate::radio::{
    CarrierStandard, CarrierType, CpriSlotLength, FilterBranchId, PrbFreqOffset,
    SubCarrierSpacing,
};

/// A validated configuration request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterSpec {
    pub standard: CarrierStandard,
    pub carrier: CarrierType,
    pub branches: Vec<FilterBranchId>,
    pub slot_length: Option<CpriSlotLength>,
    pub sub_carrier_spacing: Option<SubCarrierSpacing>,
}

impl FilterSpec {
    pub fn new(
        standard: CarrierStandard,
        carrier: CarrierType,
        branches: &[FilterBranchId],
        slot_length: Option<CpriSlotLength>,
        sub_carrier_spacing_khz: u32,
    ) -> FilterResult<Self> {
        if carrier.standard() != standard {
            return Err(FilterError::invalid(format!(
                "carrier type {carrier} does not belong to {standard}"
            )));
        }
        let sub_carrier_spacing = SubCarrierSpacing::from_khz(sub_carrier_spacing_khz)?;
        if sub_carrier_spacing.is_some() && standard != CarrierStandard::Nr {
            return Err(FilterError::invalid(format!(
                "sub-carrier spacing is only defined for NR, not {standard}"
            )));
        }
        Ok(Self {
            standard,
            carrier,
            branches: validate_branch_list(branches)?,
            slot_length,
            sub_carrier_spacing,
        })
    }
}

/// Reject empty branch lists and duplicate branch ids.
pub fn validate_branch_list(branches: &[FilterBranchId]) -> FilterResult<Vec<FilterBranchId>> {
    if branches.is_empty() {
        return Err(FilterError::invalid("empty filter branch list"));
    }
    let mut seen = HashSet::new();
    for branch in branches {
        if !seen.insert(*branch) {
            return Err(FilterError::invalid(format!(
                "filter branch {branch} listed twice"
            )));
        }
    }
    Ok(branches.to_vec())
}

/// Driver call a stage maps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageKind {
    MultiCarrierBlock,
    Decimation { index: u8 },
    Src(SrcMode),
    Channel(ChannelFilterParams),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagePlan {
    pub stage: ChainStage,
    pub kind: StageKind,
    pub coefficients: CoefficientSet,
    pub rate: RateParams,
}

/// Every stage of one branch, in configuration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainPlan {
    pub standard: CarrierStandard,
    pub carrier: CarrierType,
    pub slot_length: Option<CpriSlotLength>,
    pub sub_carrier_spacing: Option<SubCarrierSpacing>,
    pub stages: Vec<StagePlan>,
}

impl ChainPlan {
    pub fn output_hz(&self) -> u64 {
        self.stages.last().map(|s| s.rate.output_hz).unwrap_or(0)
    }

    pub fn stage_sequence(&self) -> Vec<ChainStage> {
        self.stages.iter().map(|s| s.stage).collect()
    }
}

/// Builds chain plans from the catalog and the front-end input rate.
#[derive(Clone)]
pub struct ChainPlanner {
    lookup: CoefficientLookup,
    input_rate_hz: u64,
}

impl ChainPlanner {
    pub fn new(lookup: CoefficientLookup, input_rate_hz: u64) -> Self {
        Self {
            lookup,
            input_rate_hz,
        }
    }

    pub fn lookup(&self) -> &CoefficientLookup {
        &self.lookup
    }

    /// Resolve coefficients and rates of every stage for `spec`.
    pub fn plan(&self, spec: &FilterSpec) -> FilterResult<ChainPlan> {
        let entry = self
            .lookup
            .carrier_entry(spec.carrier, spec.sub_carrier_spacing)?;
        let names = self
            .lookup
            .filter_name_list(spec.carrier, spec.sub_carrier_spacing)?;

        let mut engines = entry.engines.clone();
        if spec.slot_length.is_some() && !engines.contains(&FilterEngine::Src) {
            engines.push(FilterEngine::Src);
            engines.sort_by_key(|e| e.init_step());
        }

        let dct = self.lookup.source().down_conversion_type();
        let channel_params = ChannelFilterParams {
            additional_gain: dct.additional_gain_in_sfir(),
            freq_shift_hz: None,
        };

        let mut resolved = Vec::with_capacity(engines.len());
        for engine in engines {
            let (coefficients, kind) = match engine {
                FilterEngine::Src => {
                    let (coefficients, mode) = match spec.slot_length {
                        Some(slot) => (
                            self.lookup.coefficients(SRC_CTSR_FILTER)?,
                            SrcMode::Ctsr {
                                cpri_rate_hz: slot.sample_rate_hz(),
                            },
                        ),
                        None => {
                            let name = entry.src_filter.as_deref().unwrap_or(engine.name());
                            let coefficients = self.lookup.coefficients(name)?;
                            let mode = direct_src_mode(&coefficients)?;
                            (coefficients, mode)
                        }
                    };
                    (coefficients, StageKind::Src(mode))
                }
                FilterEngine::Sfir => (
                    self.lookup.channel_filter(
                        spec.carrier,
                        spec.sub_carrier_spacing,
                        &names.channel_filter,
                    )?,
                    StageKind::Channel(channel_params),
                ),
                _ => (
                    self.lookup.coefficients(engine.name())?,
                    StageKind::Decimation {
                        index: engine.decimation_index().unwrap_or_default(),
                    },
                ),
            };
            resolved.push((engine, coefficients, kind));
        }

        let rules = resolved
            .iter()
            .map(|(engine, _, kind)| {
                let mode = match kind {
                    StageKind::Src(mode) => Some(*mode),
                    _ => None,
                };
                RateRule::for_engine(*engine, mode).map(|rule| (*engine, rule))
            })
            .collect::<FilterResult<Vec<_>>>()?;
        let rates = SampleRatePipeline::new(self.input_rate_hz).propagate(&rules)?;

        let expected = match spec.slot_length {
            Some(slot) => slot.sample_rate_hz(),
            None => entry.output_rate_hz.ok_or_else(|| {
                FilterError::invalid(format!("no output rate defined for {}", spec.carrier))
            })?,
        };
        rates.expect_output(expected)?;

        let mut stages = Vec::with_capacity(resolved.len() + 1);
        stages.push(StagePlan {
            stage: ChainStage::MultiCarrierBlock,
            kind: StageKind::MultiCarrierBlock,
            coefficients: self.lookup.coefficients(&names.multi_carrier_block)?,
            rate: RateParams {
                input_hz: self.input_rate_hz,
                output_hz: self.input_rate_hz,
            },
        });
        for ((engine, coefficients, kind), (_, rate)) in resolved.into_iter().zip(rates.stages()) {
            stages.push(StagePlan {
                stage: ChainStage::Engine(engine),
                kind,
                coefficients,
                rate: *rate,
            });
        }

        Ok(ChainPlan {
            standard: spec.standard,
            carrier: spec.carrier,
            slot_length: spec.slot_length,
            sub_carrier_spacing: spec.sub_carrier_spacing,
            stages,
        })
    }

    /// Resolve new channel filter programming for a configured branch whose
    /// channel filter currently runs at `rate` with sub-carrier spacing `scs`.
    pub fn plan_channel_filter(
        &self,
        carrier: CarrierType,
        scs: Option<SubCarrierSpacing>,
        rate: RateParams,
        prb_freq_offset: PrbFreqOffset,
        use_cpri_freq_shift: bool,
        slot_length: Option<CpriSlotLength>,
    ) -> FilterResult<StagePlan> {
        if let Some(slot) = slot_length {
            if slot.sample_rate_hz() != rate.output_hz {
                return Err(FilterError::RateMismatch {
                    stage: ChainStage::Engine(FilterEngine::Sfir),
                    expected_hz: slot.sample_rate_hz(),
                    actual_hz: rate.output_hz,
                });
            }
        }
        let names = self.lookup.filter_name_list(carrier, scs)?;
        let coefficients = self
            .lookup
            .channel_filter(carrier, scs, &names.channel_filter)?;
        let params = ChannelFilterParams {
            additional_gain: self
                .lookup
                .source()
                .down_conversion_type()
                .additional_gain_in_sfir(),
            freq_shift_hz: use_cpri_freq_shift.then(|| prb_freq_offset.hz()),
        };
        Ok(StagePlan {
            stage: ChainStage::Engine(FilterEngine::Sfir),
            kind: StageKind::Channel(params),
            coefficients,
            rate,
        })
    }
}

fn direct_src_mode(coefficients: &CoefficientSet) -> FilterResult<SrcMode> {
    match (coefficients.config_word(0), coefficients.config_word(1)) {
        (Some(interpolation), Some(decimation)) => Ok(SrcMode::Direct {
            interpolation,
            decimation,
        }),
        _ => Err(FilterError::invalid(format!(
            "SRC filter {} has no conversion ratio",
            coefficients.name()
        ))),
    }
}
