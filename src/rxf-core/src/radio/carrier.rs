// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::FilterError;

/// Radio access standard of a carrier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CarrierStandard {
    Lte,
    Nr,
    Wcdma,
}

impl fmt::Display for CarrierStandard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Lte => "LTE",
            Self::Nr => "NR",
            Self::Wcdma => "WCDMA",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for CarrierStandard {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "lte" => Ok(Self::Lte),
            "nr" => Ok(Self::Nr),
            "wcdma" => Ok(Self::Wcdma),
            other => Err(FilterError::invalid(format!("unknown standard {other:?}"))),
        }
    }
}

/// Carrier type: standard plus nominal channel bandwidth.
///
/// The catalog keys carrier entries by the upper-case name (`"LTE20"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CarrierType {
    #[serde(rename = "LTE1_4")]
    Lte1_4,
    #[serde(rename = "LTE3")]
    Lte3,
    #[serde(rename = "LTE5")]
    Lte5,
    #[serde(rename = "LTE10")]
    Lte10,
    #[serde(rename = "LTE15")]
    Lte15,
    #[serde(rename = "LTE20")]
    Lte20,
    #[serde(rename = "NR5")]
    Nr5,
    #[serde(rename = "NR10")]
    Nr10,
    #[serde(rename = "NR15")]
    Nr15,
    #[serde(rename = "NR20")]
    Nr20,
    #[serde(rename = "NR40")]
    Nr40,
    #[serde(rename = "NR50")]
    Nr50,
    #[serde(rename = "NR60")]
    Nr60,
    #[serde(rename = "NR80")]
    Nr80,
    #[serde(rename = "NR100")]
    Nr100,
    #[serde(rename = "WCDMA")]
    Wcdma,
}

impl CarrierType {
    pub const ALL: [CarrierType; 16] = [
        Self::Lte1_4,
        Self::Lte3,
        Self::Lte5,
        Self::Lte10,
        Self::Lte15,
        Self::Lte20,
        Self::Nr5,
        Self::Nr10,
        Self::Nr15,
        Self::Nr20,
        Self::Nr40,
        Self::Nr50,
        Self::Nr60,
        Self::Nr80,
        Self::Nr100,
        Self::Wcdma,
    ];

    pub fn standard(self) -> CarrierStandard {
        match self {
            Self::Lte1_4 | Self::Lte3 | Self::Lte5 | Self::Lte10 | Self::Lte15 | Self::Lte20 => {
                CarrierStandard::Lte
            }
            Self::Wcdma => CarrierStandard::Wcdma,
            _ => CarrierStandard::Nr,
        }
    }

    /// Catalog key for this carrier type.
    pub fn key(self) -> &'static str {
        match self {
            Self::Lte1_4 => "LTE1_4",
            Self::Lte3 => "LTE3",
            Self::Lte5 => "LTE5",
            Self::Lte10 => "LTE10",
            Self::Lte15 => "LTE15",
            Self::Lte20 => "LTE20",
            Self::Nr5 => "NR5",
            Self::Nr10 => "NR10",
            Self::Nr15 => "NR15",
            Self::Nr20 => "NR20",
            Self::Nr40 => "NR40",
            Self::Nr50 => "NR50",
            Self::Nr60 => "NR60",
            Self::Nr80 => "NR80",
            Self::Nr100 => "NR100",
            Self::Wcdma => "WCDMA",
        }
    }

    /// Occupied signal bandwidth in Hz at the carrier's default numerology.
    pub fn occupied_bandwidth_hz(self) -> u32 {
        const LTE_PRB_HZ: u32 = 180_000;
        match self {
            Self::Lte1_4 => 6 * LTE_PRB_HZ,
            Self::Lte3 => 15 * LTE_PRB_HZ,
            Self::Lte5 => 25 * LTE_PRB_HZ,
            Self::Lte10 => 50 * LTE_PRB_HZ,
            Self::Lte15 => 75 * LTE_PRB_HZ,
            Self::Lte20 => 100 * LTE_PRB_HZ,
            Self::Nr5 => nr_prb_bandwidth_hz(25, SubCarrierSpacing::Khz15),
            Self::Nr10 => nr_prb_bandwidth_hz(52, SubCarrierSpacing::Khz15),
            Self::Nr15 => nr_prb_bandwidth_hz(79, SubCarrierSpacing::Khz15),
            Self::Nr20 => nr_prb_bandwidth_hz(106, SubCarrierSpacing::Khz15),
            Self::Nr40 => nr_prb_bandwidth_hz(216, SubCarrierSpacing::Khz15),
            Self::Nr50 => nr_prb_bandwidth_hz(270, SubCarrierSpacing::Khz15),
            Self::Nr60 => nr_prb_bandwidth_hz(162, SubCarrierSpacing::Khz30),
            Self::Nr80 => nr_prb_bandwidth_hz(217, SubCarrierSpacing::Khz30),
            Self::Nr100 => nr_prb_bandwidth_hz(273, SubCarrierSpacing::Khz30),
            Self::Wcdma => 3_840_000,
        }
    }

    /// Transmission bandwidth in PRBs of an NR carrier at `scs`, if that
    /// numerology is defined for the channel bandwidth.
    pub fn nr_prb_count(self, scs: SubCarrierSpacing) -> Option<u32> {
        use SubCarrierSpacing::{Khz15, Khz30, Khz60};
        let prbs = match (self, scs) {
            (Self::Nr5, Khz15) => 25,
            (Self::Nr5, Khz30) => 11,
            (Self::Nr10, Khz15) => 52,
            (Self::Nr10, Khz30) => 24,
            (Self::Nr10, Khz60) => 11,
            (Self::Nr15, Khz15) => 79,
            (Self::Nr15, Khz30) => 38,
            (Self::Nr15, Khz60) => 18,
            (Self::Nr20, Khz15) => 106,
            (Self::Nr20, Khz30) => 51,
            (Self::Nr20, Khz60) => 24,
            (Self::Nr40, Khz15) => 216,
            (Self::Nr40, Khz30) => 106,
            (Self::Nr40, Khz60) => 51,
            (Self::Nr50, Khz15) => 270,
            (Self::Nr50, Khz30) => 133,
            (Self::Nr50, Khz60) => 65,
            (Self::Nr60, Khz30) => 162,
            (Self::Nr60, Khz60) => 79,
            (Self::Nr80, Khz30) => 217,
            (Self::Nr80, Khz60) => 107,
            (Self::Nr100, Khz30) => 273,
            (Self::Nr100, Khz60) => 135,
            _ => return None,
        };
        Some(prbs)
    }

    /// Occupied signal bandwidth in Hz at sub-carrier spacing `scs`. Falls
    /// back to the default numerology when `scs` is absent or undefined for
    /// this carrier.
    pub fn occupied_bandwidth_at_hz(self, scs: Option<SubCarrierSpacing>) -> u32 {
        scs.and_then(|scs| {
            self.nr_prb_count(scs)
                .map(|prbs| nr_prb_bandwidth_hz(prbs, scs))
        })
        .unwrap_or_else(|| self.occupied_bandwidth_hz())
    }

    /// Wideband carriers may run on a reduced attached PRB bandwidth.
    pub fn is_wideband(self) -> bool {
        matches!(
            self,
            Self::Nr40 | Self::Nr50 | Self::Nr60 | Self::Nr80 | Self::Nr100
        )
    }
}

impl fmt::Display for CarrierType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for CarrierType {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.to_ascii_uppercase();
        Self::ALL
            .into_iter()
            .find(|ct| ct.key() == wanted)
            .ok_or_else(|| FilterError::invalid(format!("unknown carrier type {s:?}")))
    }
}

fn nr_prb_bandwidth_hz(prbs: u32, scs: SubCarrierSpacing) -> u32 {
    prbs * 12 * scs.hz()
}

/// NR sub-carrier spacing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SubCarrierSpacing {
    Khz15,
    Khz30,
    Khz60,
    Khz120,
}

impl SubCarrierSpacing {
    /// Parse a spacing given in kHz. Zero means "not specified".
    pub fn from_khz(khz: u32) -> Result<Option<Self>, FilterError> {
        match khz {
            0 => Ok(None),
            15 => Ok(Some(Self::Khz15)),
            30 => Ok(Some(Self::Khz30)),
            60 => Ok(Some(Self::Khz60)),
            120 => Ok(Some(Self::Khz120)),
            other => Err(FilterError::invalid(format!(
                "unsupported sub-carrier spacing {other} kHz"
            ))),
        }
    }

    pub fn khz(self) -> u32 {
        match self {
            Self::Khz15 => 15,
            Self::Khz30 => 30,
            Self::Khz60 => 60,
            Self::Khz120 => 120,
        }
    }

    pub fn hz(self) -> u32 {
        self.khz() * 1000
    }
}

/// Available types of down-conversion, as stored in the configuration data.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DownConversionType {
    HeterodyneSdc = 0,
    Homodyne = 1,
    #[default]
    Unknown,
}

impl DownConversionType {
    /// Homodyne chains carry additional gain in the channel filter.
    pub fn additional_gain_in_sfir(self) -> bool {
        matches!(self, Self::Homodyne)
    }
}

impl fmt::Display for DownConversionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::HeterodyneSdc => "HETERODYNE_SDC",
            Self::Homodyne => "HOMODYNE",
            Self::Unknown => "DCT_UNKNOWN",
        };
        f.write_str(s)
    }
}
