// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Uplink digital filter chain configuration.
//!
//! Drives the cascaded filter engines of a receive branch (multi-carrier
//! block filter, decimation stages, sample-rate converter, channel filter)
//! through ordered initialization and reverse-order release.

pub mod adapter;
pub mod catalog;
pub mod controller;
pub mod engine;
pub mod error;
pub mod host;
pub mod pipeline;
pub mod radio;

pub type DynResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

pub use adapter::{CapabilitySet, ChannelFilterParams, RateParams, SrcMode};
pub use catalog::{Catalog, CoefficientSet, ConfigDataSource};
pub use controller::{BranchState, DigitalFilterService, ServicePolicy};
pub use engine::{ChainStage, FilterEngine};
pub use error::{AdapterError, ErrorKind, FilterError, FilterResult};
pub use host::{
    ErrorSink, FilterServiceConfig, InstanceToken, ServiceCommonData, ServiceLocator,
    TracingErrorSink,
};
pub use radio::{CarrierStandard, CarrierType, CpriSlotLength, FilterBranchId, PrbFreqOffset};
