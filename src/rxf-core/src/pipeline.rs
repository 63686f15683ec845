// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Sample-rate propagation through the filter engines of a branch.

use crate::adapter::{RateParams, SrcMode};
use crate::engine::{ChainStage, FilterEngine};
use crate::error::{FilterError, FilterResult};

/// Rate transfer function of one stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateRule {
    Halve,
    Resample(SrcMode),
    PassThrough,
}

impl RateRule {
    /// Rule for `engine`; the SRC needs its mode.
    pub fn for_engine(engine: FilterEngine, src_mode: Option<SrcMode>) -> FilterResult<Self> {
        match engine {
            FilterEngine::Sfir => Ok(Self::PassThrough),
            FilterEngine::Src => src_mode
                .map(Self::Resample)
                .ok_or_else(|| FilterError::invalid("SRC stage without a conversion mode")),
            _ => Ok(Self::Halve),
        }
    }
}

/// Per-stage rates of a branch, in configuration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RatePlan {
    input_hz: u64,
    stages: Vec<(FilterEngine, RateParams)>,
}

impl RatePlan {
    pub fn input_hz(&self) -> u64 {
        self.input_hz
    }

    pub fn output_hz(&self) -> u64 {
        self.stages
            .last()
            .map(|(_, rate)| rate.output_hz)
            .unwrap_or(self.input_hz)
    }

    pub fn stages(&self) -> &[(FilterEngine, RateParams)] {
        &self.stages
    }

    pub fn rate(&self, engine: FilterEngine) -> Option<RateParams> {
        self.stages
            .iter()
            .find(|(e, _)| *e == engine)
            .map(|(_, rate)| *rate)
    }

    /// Fail with `RateMismatch` unless the chain ends at `expected_hz`.
    pub fn expect_output(&self, expected_hz: u64) -> FilterResult<()> {
        let actual_hz = self.output_hz();
        if actual_hz == expected_hz {
            return Ok(());
        }
        let stage = self
            .stages
            .last()
            .map(|(engine, _)| ChainStage::Engine(*engine))
            .unwrap_or(ChainStage::MultiCarrierBlock);
        Err(FilterError::RateMismatch {
            stage,
            expected_hz,
            actual_hz,
        })
    }
}

/// Running sample rate through the ordered engines of one branch.
#[derive(Debug, Clone, Copy)]
pub struct SampleRatePipeline {
    input_hz: u64,
}

impl SampleRatePipeline {
    pub fn new(input_hz: u64) -> Self {
        Self { input_hz }
    }

    /// Compute every stage's rates from the chain input rate.
    pub fn propagate(&self, stages: &[(FilterEngine, RateRule)]) -> FilterResult<RatePlan> {
        let mut rate = self.input_hz;
        let mut planned = Vec::with_capacity(stages.len());
        for (pos, (engine, rule)) in stages.iter().enumerate() {
            let output = match rule {
                RateRule::Halve => halve(*engine, rate)?,
                RateRule::PassThrough => rate,
                RateRule::Resample(SrcMode::Direct {
                    interpolation,
                    decimation,
                }) => resample(*engine, rate, *interpolation, *decimation)?,
                RateRule::Resample(SrcMode::Ctsr { cpri_rate_hz }) => {
                    // Leave headroom for the decimation stages after the SRC.
                    let trailing = stages[pos + 1..]
                        .iter()
                        .filter(|(_, r)| *r == RateRule::Halve)
                        .count();
                    1u64.checked_shl(trailing as u32)
                        .and_then(|factor| cpri_rate_hz.checked_mul(factor))
                        .ok_or_else(|| overflow(*engine, *cpri_rate_hz))?
                }
            };
            planned.push((
                *engine,
                RateParams {
                    input_hz: rate,
                    output_hz: output,
                },
            ));
            rate = output;
        }
        Ok(RatePlan {
            input_hz: self.input_hz,
            stages: planned,
        })
    }
}

fn halve(engine: FilterEngine, rate: u64) -> FilterResult<u64> {
    if rate % 2 != 0 {
        return Err(FilterError::RateMismatch {
            stage: ChainStage::Engine(engine),
            expected_hz: rate / 2 * 2,
            actual_hz: rate,
        });
    }
    Ok(rate / 2)
}

fn overflow(engine: FilterEngine, rate: u64) -> FilterError {
    FilterError::invalid(format!("{engine} rate {rate} Hz overflows the sample-rate range"))
}

fn resample(engine: FilterEngine, rate: u64, interpolation: u32, decimation: u32) -> FilterResult<u64> {
    if interpolation == 0 || decimation == 0 {
        return Err(FilterError::invalid(format!(
            "{engine} ratio {interpolation}/{decimation} is degenerate"
        )));
    }
    let scaled = rate
        .checked_mul(u64::from(interpolation))
        .ok_or_else(|| overflow(engine, rate))?;
    let decimation = u64::from(decimation);
    if scaled % decimation != 0 {
        return Err(FilterError::RateMismatch {
            stage: ChainStage::Engine(engine),
            expected_hz: scaled / decimation,
            actual_hz: rate,
        });
    }
    Ok(scaled / decimation)
}
