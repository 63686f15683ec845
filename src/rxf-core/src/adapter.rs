// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Hardware block capabilities driven by the filter chain.
//!
//! One trait per filter-engine kind. A hardware generation provides a
//! [`CapabilitySet`] per filter branch; the controller never sees concrete
//! driver types.

use serde::Serialize;

use crate::catalog::CoefficientSet;
use crate::error::AdapterError;

/// Input and output sample rate of a stage, in Hz.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct RateParams {
    pub input_hz: u64,
    pub output_hz: u64,
}

/// How the sample-rate converter derives its output rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum SrcMode {
    /// Fixed rational ratio from the coefficient set's configuration words.
    Direct { interpolation: u32, decimation: u32 },
    /// Convert towards a CPRI transport sample rate.
    Ctsr { cpri_rate_hz: u64 },
}

/// Channel filter programming parameters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ChannelFilterParams {
    pub additional_gain: bool,
    /// Frequency shift applied with the filter, when requested.
    pub freq_shift_hz: Option<i32>,
}

pub trait McbFilter: Send {
    fn configure(
        &mut self,
        coefficients: &CoefficientSet,
        rate: RateParams,
    ) -> Result<(), AdapterError>;

    fn release(&mut self) -> Result<(), AdapterError>;
}

/// Decimation-by-2 engines of a filter branch, addressed by index 0..=5.
pub trait DecimationFilter: Send {
    fn configure(
        &mut self,
        index: u8,
        coefficients: &CoefficientSet,
        rate: RateParams,
    ) -> Result<(), AdapterError>;

    fn release(&mut self, index: u8) -> Result<(), AdapterError>;
}

pub trait SrcFilter: Send {
    fn configure(
        &mut self,
        coefficients: &CoefficientSet,
        mode: SrcMode,
        rate: RateParams,
    ) -> Result<(), AdapterError>;

    fn release(&mut self) -> Result<(), AdapterError>;
}

pub trait ChannelFilter: Send {
    fn configure(
        &mut self,
        coefficients: &CoefficientSet,
        params: ChannelFilterParams,
        rate: RateParams,
    ) -> Result<(), AdapterError>;

    /// Reload coefficients of an already configured channel filter.
    fn reconfigure(
        &mut self,
        coefficients: &CoefficientSet,
        params: ChannelFilterParams,
    ) -> Result<(), AdapterError>;

    fn release(&mut self) -> Result<(), AdapterError>;

    /// Configured group delay register.
    fn read_cfg_delay(&self) -> Result<u32, AdapterError>;

    fn write_cfg_delay(&mut self, delay: u32) -> Result<(), AdapterError>;
}

/// Block interfaces owned by one filter branch.
pub struct CapabilitySet {
    /// Hardware generation label, for logs.
    pub hardware: String,
    pub mcb: Box<dyn McbFilter>,
    pub decimation: Box<dyn DecimationFilter>,
    pub src: Box<dyn SrcFilter>,
    pub channel: Box<dyn ChannelFilter>,
}

impl std::fmt::Debug for CapabilitySet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapabilitySet")
            .field("hardware", &self.hardware)
            .finish_non_exhaustive()
    }
}
