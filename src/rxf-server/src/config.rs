// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Configuration file support for rxf-server.
//!
//! Config is loaded from the `[rxf-server]` section of `rxf-rs.toml`.
//! Default search order:
//! 1. Path specified via `--config` CLI argument
//! 2. `./rxf-rs.toml`
//! 3. `~/.config/rxf-rs/rxf-rs.toml`
//! 4. `/etc/rxf-rs/rxf-rs.toml`

use std::collections::HashSet;
use std::path::PathBuf;

use rxf_app::{parse_level, ConfigFile};
use rxf_backend::{BackendOptions, RegistrationContext};
use rxf_core::controller::ServicePolicy;
use rxf_core::radio::AntennaBranchId;
use rxf_core::{FilterServiceConfig, InstanceToken, ServiceCommonData};
use serde::{Deserialize, Serialize};

/// Top-level server configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub general: GeneralConfig,
    pub service: ServiceConfig,
    pub backend: BackendConfig,
    pub catalog: CatalogConfig,
    /// One filter service is created per antenna branch.
    #[serde(rename = "antennas")]
    pub antennas: Vec<AntennaConfig>,
}

/// General application settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level (trace, debug, info, warn, error)
    pub log_level: Option<String>,
}

/// Filter service settings shared by every antenna branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Service variant reported to the host framework
    pub variant: String,
    #[serde(flatten)]
    pub filter: FilterServiceConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            variant: "RxDigitalFilter".to_string(),
            filter: FilterServiceConfig::default(),
        }
    }
}

/// Hardware generation driving the filter blocks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Registered backend name (e.g. "sim")
    pub model: String,
    #[serde(flatten)]
    pub options: BackendOptions,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            model: "sim".to_string(),
            options: BackendOptions::default(),
        }
    }
}

/// Coefficient catalog source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Catalog TOML file; the built-in catalog is used when unset
    pub path: Option<PathBuf>,
    /// Overrides the catalog's attached PRB bandwidth for wideband carriers
    pub attached_prb_bw_khz: Option<u32>,
}

/// One antenna branch and the driver instance serving it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AntennaConfig {
    /// 0 = RxA, 1 = RxB, ...
    pub branch: u8,
    pub instance_token: i32,
}

impl AntennaConfig {
    pub fn common_data(&self, service: &ServiceConfig) -> ServiceCommonData {
        ServiceCommonData {
            variant: service.variant.clone(),
            antenna_branch: AntennaBranchId(self.branch),
            config: service.filter.clone(),
        }
    }

    pub fn token(&self) -> InstanceToken {
        InstanceToken(self.instance_token)
    }
}

impl ServerConfig {
    /// Antenna branches to serve; a single RxA on instance 0 when none are
    /// configured.
    pub fn resolved_antennas(&self) -> Vec<AntennaConfig> {
        if self.antennas.is_empty() {
            return vec![AntennaConfig {
                branch: 0,
                instance_token: 0,
            }];
        }
        self.antennas.clone()
    }

    pub fn validate(&self) -> Result<(), String> {
        validate_log_level(self.general.log_level.as_deref())?;

        if self.service.variant.trim().is_empty() {
            return Err("[service].variant must not be empty".to_string());
        }
        self.service.filter.validate()?;

        if self.backend.model.trim().is_empty() {
            return Err("[backend].model must not be empty".to_string());
        }
        self.backend
            .options
            .fail_stage()
            .map_err(|e| format!("[backend].fail_stage: {e}"))?;

        if self.catalog.attached_prb_bw_khz == Some(0) {
            return Err("[catalog].attached_prb_bw_khz must be > 0".to_string());
        }

        let mut seen = HashSet::new();
        for antenna in &self.antennas {
            if !seen.insert(antenna.branch) {
                return Err(format!(
                    "Duplicate antenna branch {} in [[antennas]]",
                    AntennaBranchId(antenna.branch)
                ));
            }
            if !antenna.token().is_instance() {
                return Err(format!(
                    "[[antennas]] branch {} needs an instance_token >= 0",
                    AntennaBranchId(antenna.branch)
                ));
            }
        }
        Ok(())
    }

    /// Reject backends that are not registered on `context`.
    pub fn validate_backend(&self, context: &RegistrationContext) -> Result<(), String> {
        if context.is_backend_registered(&self.backend.model) {
            return Ok(());
        }
        Err(format!(
            "[backend].model '{}' is not registered (available: {})",
            self.backend.model,
            context.registered_backends().join(", ")
        ))
    }

    /// Generate an example configuration wrapped under the `[rxf-server]`
    /// section header, suitable for use in a combined `rxf-rs.toml` file.
    pub fn example_combined_toml() -> String {
        #[derive(serde::Serialize)]
        struct Wrapper {
            #[serde(rename = "rxf-server")]
            inner: ServerConfig,
        }
        let example = ServerConfig {
            general: GeneralConfig {
                log_level: Some("info".to_string()),
            },
            service: ServiceConfig {
                variant: "RxDigitalFilter".to_string(),
                filter: FilterServiceConfig {
                    policy: ServicePolicy::default(),
                    ..Default::default()
                },
            },
            backend: BackendConfig::default(),
            catalog: CatalogConfig {
                path: Some(PathBuf::from("/etc/rxf-rs/ul_filters.toml")),
                attached_prb_bw_khz: None,
            },
            antennas: vec![
                AntennaConfig {
                    branch: 0,
                    instance_token: 0,
                },
                AntennaConfig {
                    branch: 1,
                    instance_token: 1,
                },
            ],
        };
        toml::to_string_pretty(&Wrapper { inner: example }).unwrap_or_default()
    }
}

fn validate_log_level(level: Option<&str>) -> Result<(), String> {
    match level {
        Some(name) if parse_level(name).is_none() => Err(format!(
            "[general].log_level '{}' is invalid (expected one of: trace, debug, info, warn, error)",
            name
        )),
        _ => Ok(()),
    }
}

impl ConfigFile for ServerConfig {
    fn section_key() -> &'static str {
        "rxf-server"
    }
}
