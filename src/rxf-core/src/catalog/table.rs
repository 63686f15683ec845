// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! TOML-backed configuration data source.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{CarrierEntry, ConfigDataSource, FilterEntry, SRC_CTSR_FILTER};
use crate::engine::FilterEngine;
use crate::radio::DownConversionType;

const BUILTIN_CATALOG: &str = include_str!("../../data/ul_filters.toml");

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Failed to read catalog {0}: {1}")]
    ReadError(PathBuf, String),

    #[error("Failed to parse catalog: {0}")]
    ParseError(String),

    #[error("Invalid catalog: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogParameters {
    /// Value of the `/ul/downConversionType` parameter.
    pub down_conversion_type: DownConversionType,
    /// PRB bandwidth attached to wideband carriers, in kHz.
    pub attached_prb_bw_khz: Option<u32>,
}

/// Uplink filter coefficient tables.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Catalog {
    pub parameters: CatalogParameters,
    pub carriers: BTreeMap<String, CarrierEntry>,
    pub filters: BTreeMap<String, FilterEntry>,
}

impl Catalog {
    /// Catalog compiled into the crate.
    pub fn builtin() -> Result<Self, CatalogError> {
        Self::from_toml_str(BUILTIN_CATALOG)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, CatalogError> {
        let catalog: Catalog =
            toml::from_str(content).map_err(|e| CatalogError::ParseError(e.to_string()))?;
        catalog.validate()?;
        Ok(catalog)
    }

    pub fn load_from_file(path: &Path) -> Result<Self, CatalogError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| CatalogError::ReadError(path.to_path_buf(), e.to_string()))?;
        Self::from_toml_str(&content)
    }

    pub fn insert_filter(&mut self, name: &str, entry: FilterEntry) {
        self.filters.insert(name.to_string(), entry);
    }

    pub fn insert_carrier(&mut self, key: &str, entry: CarrierEntry) {
        self.carriers.insert(key.to_string(), entry);
    }

    pub fn set_attached_prb_bw_khz(&mut self, khz: Option<u32>) {
        self.parameters.attached_prb_bw_khz = khz;
    }

    /// Check cross references and engine ordering of every carrier entry.
    pub fn validate(&self) -> Result<(), CatalogError> {
        for (key, carrier) in &self.carriers {
            if carrier.filters.len() != 2 {
                return Err(CatalogError::Invalid(format!(
                    "carrier {key}: expected [mcb, channel] filters, got {}",
                    carrier.filters.len()
                )));
            }
            for name in &carrier.filters {
                self.require_filter(key, name)?;
            }

            let steps: Vec<usize> = carrier.engines.iter().map(|e| e.init_step()).collect();
            if steps.windows(2).any(|w| w[0] >= w[1]) {
                return Err(CatalogError::Invalid(format!(
                    "carrier {key}: engines out of signal-path order"
                )));
            }
            if carrier.engines.last() != Some(&FilterEngine::Sfir) {
                return Err(CatalogError::Invalid(format!(
                    "carrier {key}: engine list must end with SFIR"
                )));
            }
            for engine in &carrier.engines {
                match engine {
                    FilterEngine::Sfir => {}
                    FilterEngine::Src => {
                        let src = carrier.src_filter.as_deref().unwrap_or(engine.name());
                        self.require_src(key, src)?;
                    }
                    _ => {
                        self.require_filter(key, engine.name())?;
                    }
                }
            }
        }

        if let Some(ctsr) = self.filters.get(SRC_CTSR_FILTER) {
            check_src_words(SRC_CTSR_FILTER, ctsr)?;
        }

        for (name, entry) in &self.filters {
            if let Some(base) = &entry.alternative_of {
                if !self.filters.contains_key(base) {
                    return Err(CatalogError::Invalid(format!(
                        "filter {name} is an alternative of unknown filter {base}"
                    )));
                }
            }
        }
        Ok(())
    }

    fn require_filter(&self, carrier: &str, name: &str) -> Result<&FilterEntry, CatalogError> {
        self.filters.get(name).ok_or_else(|| {
            CatalogError::Invalid(format!("carrier {carrier}: unknown filter {name}"))
        })
    }

    fn require_src(&self, carrier: &str, name: &str) -> Result<(), CatalogError> {
        let entry = self.require_filter(carrier, name)?;
        check_src_words(name, entry)
    }
}

fn check_src_words(name: &str, entry: &FilterEntry) -> Result<(), CatalogError> {
    match entry.config.as_slice() {
        [interp, decim] if *interp > 0 && *decim > 0 => Ok(()),
        _ => Err(CatalogError::Invalid(format!(
            "SRC filter {name} needs [interpolation, decimation] config words"
        ))),
    }
}

impl ConfigDataSource for Catalog {
    fn carrier(&self, key: &str) -> Option<CarrierEntry> {
        self.carriers.get(key).cloned()
    }

    fn filter(&self, identifier: &str) -> Option<FilterEntry> {
        self.filters.get(identifier).cloned()
    }

    fn alternative_names(&self, base: &str) -> Vec<String> {
        self.filters
            .iter()
            .filter(|(_, entry)| entry.alternative_of.as_deref() == Some(base))
            .map(|(name, _)| name.clone())
            .collect()
    }

    fn down_conversion_type(&self) -> DownConversionType {
        self.parameters.down_conversion_type
    }

    fn attached_prb_bw_khz(&self) -> Option<u32> {
        self.parameters.attached_prb_bw_khz
    }
}
