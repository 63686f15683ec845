// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Coefficient catalog lookup.
//!
//! Resolves logical filter identifiers (carrier type, bandwidth) to concrete
//! coefficient sets through a read-only [`ConfigDataSource`]. Channel filters
//! are pre-computed per discrete bandwidth, so the channel filter for a
//! carrier is chosen as the narrowest registered alternative that still
//! covers the actual signal bandwidth.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::engine::FilterEngine;
use crate::error::{FilterError, FilterResult};
use crate::radio::{CarrierType, DownConversionType, SubCarrierSpacing};

pub mod table;

pub use table::{Catalog, CatalogError};

/// Coefficient set of the SRC when it converts to a CPRI-defined rate.
pub const SRC_CTSR_FILTER: &str = "SRC_CTSR";

/// Per-carrier-type entry of the configuration data.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CarrierEntry {
    /// Multi-carrier block filter and channel filter identifiers.
    pub filters: Vec<String>,
    /// Active filter engines in signal-path order.
    pub engines: Vec<FilterEngine>,
    /// Coefficient set of the SRC on the direct-rate path, if not `SRC`.
    pub src_filter: Option<String>,
    /// Expected branch output rate on the direct-rate path.
    pub output_rate_hz: Option<u64>,
}

/// Raw filter entry of the configuration data.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterEntry {
    pub pass_band_hz: u32,
    pub coefficients: Vec<i32>,
    /// Filter configuration words, e.g. `[interpolation, decimation]` for an SRC.
    pub config: Vec<u32>,
    /// Base channel filter this entry is an alternative of.
    pub alternative_of: Option<String>,
}

/// Read-only configuration data consumed by the filter chain.
pub trait ConfigDataSource: Send + Sync {
    fn carrier(&self, key: &str) -> Option<CarrierEntry>;

    fn filter(&self, identifier: &str) -> Option<FilterEntry>;

    /// Identifiers of every entry registered as an alternative of `base`.
    fn alternative_names(&self, base: &str) -> Vec<String>;

    fn down_conversion_type(&self) -> DownConversionType;

    /// PRB bandwidth attached to a wideband carrier, in kHz.
    fn attached_prb_bw_khz(&self) -> Option<u32>;
}

/// A loaded coefficient set. Never modified after loading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CoefficientSet {
    name: String,
    coefficients: Vec<i32>,
    pass_band_hz: u32,
    config: Vec<u32>,
}

impl CoefficientSet {
    pub fn new(name: impl Into<String>, coefficients: Vec<i32>, pass_band_hz: u32) -> Self {
        Self {
            name: name.into(),
            coefficients,
            pass_band_hz,
            config: Vec::new(),
        }
    }

    pub fn with_config(mut self, config: Vec<u32>) -> Self {
        self.config = config;
        self
    }

    fn from_entry(name: &str, entry: FilterEntry) -> Self {
        Self::new(name, entry.coefficients, entry.pass_band_hz).with_config(entry.config)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn coefficients(&self) -> &[i32] {
        &self.coefficients
    }

    pub fn pass_band_hz(&self) -> u32 {
        self.pass_band_hz
    }

    /// Configuration word `n`, if present.
    pub fn config_word(&self, n: usize) -> Option<u32> {
        self.config.get(n).copied()
    }
}

/// Filter identifiers of a carrier type, in signal-path order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterNameList {
    pub multi_carrier_block: String,
    pub channel_filter: String,
}

impl FilterNameList {
    pub fn to_vec(&self) -> Vec<String> {
        vec![self.multi_carrier_block.clone(), self.channel_filter.clone()]
    }
}

/// Alternatives of one channel filter keyed by declared pass-band width.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlternativeFilterIndex {
    base: String,
    by_bandwidth: BTreeMap<u32, String>,
}

impl AlternativeFilterIndex {
    pub fn new(base: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            by_bandwidth: BTreeMap::new(),
        }
    }

    /// Register an alternative. The first name registered for a bandwidth wins.
    pub fn insert(&mut self, pass_band_hz: u32, name: impl Into<String>) {
        self.by_bandwidth.entry(pass_band_hz).or_insert_with(|| name.into());
    }

    pub fn len(&self) -> usize {
        self.by_bandwidth.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_bandwidth.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &str)> {
        self.by_bandwidth.iter().map(|(bw, name)| (*bw, name.as_str()))
    }

    /// Narrowest alternative whose pass band covers `wanted_hz`.
    pub fn select(&self, wanted_hz: u32) -> FilterResult<&str> {
        self.by_bandwidth
            .range(wanted_hz..)
            .next()
            .map(|(_, name)| name.as_str())
            .ok_or_else(|| FilterError::NoSuitableFilter {
                filter: self.base.clone(),
                wanted_hz,
            })
    }
}

/// Lookup operations over a shared configuration data source.
#[derive(Clone)]
pub struct CoefficientLookup {
    source: Arc<dyn ConfigDataSource>,
}

impl CoefficientLookup {
    pub fn new(source: Arc<dyn ConfigDataSource>) -> Self {
        Self { source }
    }

    pub fn source(&self) -> &dyn ConfigDataSource {
        self.source.as_ref()
    }

    /// Carrier entry, preferring a sub-carrier-spacing specific one.
    pub fn carrier_entry(
        &self,
        carrier: CarrierType,
        scs: Option<SubCarrierSpacing>,
    ) -> FilterResult<CarrierEntry> {
        if let Some(scs) = scs {
            let key = format!("{}_SCS{}", carrier.key(), scs.khz());
            if let Some(entry) = self.source.carrier(&key) {
                return Ok(entry);
            }
        }
        self.source
            .carrier(carrier.key())
            .ok_or_else(|| FilterError::NotFound(carrier.key().to_string()))
    }

    /// Multi-carrier block filter and channel filter identifiers of a carrier.
    pub fn filter_name_list(
        &self,
        carrier: CarrierType,
        scs: Option<SubCarrierSpacing>,
    ) -> FilterResult<FilterNameList> {
        let entry = self.carrier_entry(carrier, scs)?;
        match entry.filters.as_slice() {
            [mcb, chf] => Ok(FilterNameList {
                multi_carrier_block: mcb.clone(),
                channel_filter: chf.clone(),
            }),
            other => Err(FilterError::invalid(format!(
                "carrier {} lists {} filters, expected 2",
                carrier,
                other.len()
            ))),
        }
    }

    pub fn coefficients(&self, identifier: &str) -> FilterResult<CoefficientSet> {
        self.source
            .filter(identifier)
            .map(|entry| CoefficientSet::from_entry(identifier, entry))
            .ok_or_else(|| FilterError::NotFound(identifier.to_string()))
    }

    /// Every alternative of `channel_filter` (the filter itself included)
    /// with its declared pass-band width.
    pub fn alternatives_by_bandwidth(
        &self,
        channel_filter: &str,
    ) -> FilterResult<AlternativeFilterIndex> {
        let base = self
            .source
            .filter(channel_filter)
            .ok_or_else(|| FilterError::NotFound(channel_filter.to_string()))?;

        let mut names = self.source.alternative_names(channel_filter);
        names.sort();
        let mut index = AlternativeFilterIndex::new(channel_filter);
        index.insert(base.pass_band_hz, channel_filter);
        for name in names {
            if let Some(entry) = self.source.filter(&name) {
                index.insert(entry.pass_band_hz, name);
            }
        }
        Ok(index)
    }

    /// Bandwidth the channel filter must pass for `carrier` at sub-carrier
    /// spacing `scs`.
    pub fn signal_bandwidth_hz(
        &self,
        carrier: CarrierType,
        scs: Option<SubCarrierSpacing>,
    ) -> FilterResult<u32> {
        let occupied = carrier.occupied_bandwidth_at_hz(scs);
        if !carrier.is_wideband() {
            return Ok(occupied);
        }
        match self.source.attached_prb_bw_khz() {
            None => Ok(occupied),
            Some(0) => Err(FilterError::invalid("attached PRB bandwidth is zero")),
            Some(khz) => {
                let hz = khz.saturating_mul(1000);
                if hz > occupied {
                    return Err(FilterError::invalid(format!(
                        "attached PRB bandwidth {hz} Hz exceeds {carrier} occupied bandwidth {occupied} Hz"
                    )));
                }
                Ok(hz)
            }
        }
    }

    /// Channel filter coefficients for `carrier`: the base filter when its
    /// pass band matches the signal bandwidth exactly, otherwise the
    /// narrowest sufficient alternative.
    pub fn channel_filter(
        &self,
        carrier: CarrierType,
        scs: Option<SubCarrierSpacing>,
        base: &str,
    ) -> FilterResult<CoefficientSet> {
        let wanted = self.signal_bandwidth_hz(carrier, scs)?;
        let base_set = self.coefficients(base)?;
        if base_set.pass_band_hz() == wanted {
            return Ok(base_set);
        }
        let index = self.alternatives_by_bandwidth(base)?;
        let selected = index.select(wanted)?;
        debug!(
            "channel filter {} -> {} for {} Hz signal bandwidth",
            base, selected, wanted
        );
        self.coefficients(selected)
    }
}
