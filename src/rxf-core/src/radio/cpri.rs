// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use serde::{Deserialize, Serialize};

use crate::error::FilterError;

/// CPRI basic frame rate in Hz.
pub const CPRI_BASIC_FRAME_RATE_HZ: u64 = 3_840_000;

/// IQ samples carried per CPRI basic frame for one carrier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct CpriSlotLength(u8);

impl CpriSlotLength {
    pub const ALL: [CpriSlotLength; 6] = [
        Self(1),
        Self(2),
        Self(4),
        Self(8),
        Self(16),
        Self(32),
    ];

    pub fn new(slot: u8) -> Result<Self, FilterError> {
        match slot {
            1 | 2 | 4 | 8 | 16 | 32 => Ok(Self(slot)),
            other => Err(FilterError::invalid(format!(
                "invalid CPRI slot length {other}"
            ))),
        }
    }

    pub fn get(self) -> u8 {
        self.0
    }

    /// Carrier sample rate transported with this slot length.
    pub fn sample_rate_hz(self) -> u64 {
        u64::from(self.0) * CPRI_BASIC_FRAME_RATE_HZ
    }
}

impl TryFrom<u8> for CpriSlotLength {
    type Error = FilterError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<CpriSlotLength> for u8 {
    fn from(value: CpriSlotLength) -> Self {
        value.0
    }
}

/// Frequency offset of the PRB grid relative to the carrier centre.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrbFreqOffset {
    #[default]
    Zero,
    PlusHalfSubcarrier,
    MinusHalfSubcarrier,
}

impl PrbFreqOffset {
    pub fn hz(self) -> i32 {
        match self {
            Self::Zero => 0,
            Self::PlusHalfSubcarrier => 7_500,
            Self::MinusHalfSubcarrier => -7_500,
        }
    }
}
