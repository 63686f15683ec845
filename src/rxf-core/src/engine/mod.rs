// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Filter engines of a filter branch and their hardware-mandated order.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::FilterError;

pub mod registry;

pub use registry::{EngineSlot, FilterEngineRegistry, SlotConfig};

/// Number of filter engines in one filter branch.
pub const NUMBER_OF_FILTERS: usize = 8;

/// Filter engines, listed in the order they appear in the uplink signal path.
///
/// Six decimation-by-2 stages, one resampler and one channel filter. The
/// resampler sits between the fifth and sixth decimation stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum FilterEngine {
    #[serde(rename = "DEC2_0")]
    Dec2_0,
    #[serde(rename = "DEC2_1")]
    Dec2_1,
    #[serde(rename = "DEC2_2")]
    Dec2_2,
    #[serde(rename = "DEC2_3")]
    Dec2_3,
    #[serde(rename = "DEC2_4")]
    Dec2_4,
    #[serde(rename = "SRC")]
    Src,
    #[serde(rename = "DEC2_5")]
    Dec2_5,
    #[serde(rename = "SFIR")]
    Sfir,
}

/// Initialization sequence of the filter resources in a branch.
const INIT_ORDER: [FilterEngine; NUMBER_OF_FILTERS] = [
    FilterEngine::Dec2_0,
    FilterEngine::Dec2_1,
    FilterEngine::Dec2_2,
    FilterEngine::Dec2_3,
    FilterEngine::Dec2_4,
    FilterEngine::Src,
    FilterEngine::Dec2_5,
    FilterEngine::Sfir,
];

/// Engine occupying initialization step `n`, or `None` when `n` is out of range.
pub fn init_order(n: usize) -> Option<FilterEngine> {
    INIT_ORDER.get(n).copied()
}

/// All engines in initialization order.
pub fn init_sequence() -> impl DoubleEndedIterator<Item = FilterEngine> {
    INIT_ORDER.into_iter()
}

/// All engines in release order (reverse of initialization).
pub fn release_sequence() -> impl Iterator<Item = FilterEngine> {
    INIT_ORDER.into_iter().rev()
}

impl FilterEngine {
    /// Position in the initialization sequence.
    pub fn init_step(self) -> usize {
        // Declaration order equals init order.
        self as usize
    }

    /// Hardware decimation filter index, for decimation engines.
    pub fn decimation_index(self) -> Option<u8> {
        match self {
            Self::Dec2_0 => Some(0),
            Self::Dec2_1 => Some(1),
            Self::Dec2_2 => Some(2),
            Self::Dec2_3 => Some(3),
            Self::Dec2_4 => Some(4),
            Self::Dec2_5 => Some(5),
            Self::Src | Self::Sfir => None,
        }
    }

    pub fn is_decimation(self) -> bool {
        self.decimation_index().is_some()
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Dec2_0 => "DEC2_0",
            Self::Dec2_1 => "DEC2_1",
            Self::Dec2_2 => "DEC2_2",
            Self::Dec2_3 => "DEC2_3",
            Self::Dec2_4 => "DEC2_4",
            Self::Src => "SRC",
            Self::Dec2_5 => "DEC2_5",
            Self::Sfir => "SFIR",
        }
    }
}

impl fmt::Display for FilterEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for FilterEngine {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        INIT_ORDER
            .into_iter()
            .find(|e| e.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| FilterError::invalid(format!("unknown filter engine {s:?}")))
    }
}

/// A step of a branch configuration: the multi-carrier block filter feeding
/// the branch, or one of its filter engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "stage", content = "engine")]
pub enum ChainStage {
    MultiCarrierBlock,
    Engine(FilterEngine),
}

impl fmt::Display for ChainStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MultiCarrierBlock => f.write_str("MCB"),
            Self::Engine(engine) => write!(f, "{}", engine),
        }
    }
}

impl From<FilterEngine> for ChainStage {
    fn from(engine: FilterEngine) -> Self {
        Self::Engine(engine)
    }
}

impl FromStr for ChainStage {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("MCB") {
            return Ok(Self::MultiCarrierBlock);
        }
        s.parse().map(Self::Engine)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_order_interleaves_src_before_last_decimation() {
        let order: Vec<_> = (0..NUMBER_OF_FILTERS).filter_map(init_order).collect();
        assert_eq!(
            order,
            vec![
                FilterEngine::Dec2_0,
                FilterEngine::Dec2_1,
                FilterEngine::Dec2_2,
                FilterEngine::Dec2_3,
                FilterEngine::Dec2_4,
                FilterEngine::Src,
                FilterEngine::Dec2_5,
                FilterEngine::Sfir,
            ]
        );
        assert_eq!(init_order(NUMBER_OF_FILTERS), None);
    }

    #[test]
    fn test_release_is_reverse_of_init() {
        let mut init: Vec<_> = init_sequence().collect();
        init.reverse();
        let release: Vec<_> = release_sequence().collect();
        assert_eq!(init, release);
    }

    #[test]
    fn test_init_step_matches_order() {
        for (n, engine) in init_sequence().enumerate() {
            assert_eq!(engine.init_step(), n);
        }
    }

    #[test]
    fn test_decimation_index() {
        assert_eq!(FilterEngine::Dec2_5.decimation_index(), Some(5));
        assert_eq!(FilterEngine::Src.decimation_index(), None);
        assert!(!FilterEngine::Sfir.is_decimation());
    }

    #[test]
    fn test_parse_engine_name() {
        assert_eq!("dec2_3".parse::<FilterEngine>().ok(), Some(FilterEngine::Dec2_3));
        assert_eq!("SFIR".parse::<FilterEngine>().ok(), Some(FilterEngine::Sfir));
        assert!("MCB".parse::<FilterEngine>().is_err());
        assert_eq!("mcb".parse::<ChainStage>().ok(), Some(ChainStage::MultiCarrierBlock));
        assert_eq!(
            "SRC".parse::<ChainStage>().ok(),
            Some(ChainStage::Engine(FilterEngine::Src))
        );
    }
}
