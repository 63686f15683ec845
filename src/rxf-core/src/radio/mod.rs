// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use std::fmt;

use serde::{Deserialize, Serialize};

pub mod carrier;
pub mod cpri;

pub use carrier::{CarrierStandard, CarrierType, DownConversionType, SubCarrierSpacing};
pub use cpri::{CpriSlotLength, PrbFreqOffset};

/// Identifies one filter branch (receive chain) of an antenna branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FilterBranchId(pub u8);

impl fmt::Display for FilterBranchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u8> for FilterBranchId {
    fn from(value: u8) -> Self {
        Self(value)
    }
}

/// Physical antenna branch a service instance is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AntennaBranchId(pub u8);

impl fmt::Display for AntennaBranchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // RxBranchA, RxBranchB, ...
        match self.0 {
            n @ 0..=25 => write!(f, "Rx{}", (b'A' + n) as char),
            n => write!(f, "Rx{}", n),
        }
    }
}
