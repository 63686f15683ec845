// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use serde::Serialize;
use thiserror::Error;

use crate::engine::ChainStage;
use crate::radio::FilterBranchId;

/// Error returned by a hardware block driver.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct AdapterError(pub String);

impl From<String> for AdapterError {
    fn from(value: String) -> Self {
        AdapterError(value)
    }
}

impl From<&str> for AdapterError {
    fn from(value: &str) -> Self {
        AdapterError(value.to_string())
    }
}

/// Coarse classification of a [`FilterError`], as reported to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    NotFound,
    NoSuitableFilter,
    RateMismatch,
    AdapterFailure,
    NotConfigured,
    AlreadyConfigured,
    InvalidRequest,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FilterError {
    #[error("unknown filter identifier {0:?}")]
    NotFound(String),

    #[error("no alternative of {filter:?} covers {wanted_hz} Hz")]
    NoSuitableFilter { filter: String, wanted_hz: u32 },

    #[error("sample rate mismatch at {stage}: expected {expected_hz} Hz, got {actual_hz} Hz")]
    RateMismatch {
        stage: ChainStage,
        expected_hz: u64,
        actual_hz: u64,
    },

    #[error("{stage} driver call failed: {source}")]
    AdapterFailure {
        stage: ChainStage,
        #[source]
        source: AdapterError,
    },

    #[error("{what} on branch {branch} is not configured")]
    NotConfigured {
        branch: FilterBranchId,
        what: String,
    },

    #[error("branch {0} is already configured")]
    AlreadyConfigured(FilterBranchId),

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl FilterError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::NoSuitableFilter { .. } => ErrorKind::NoSuitableFilter,
            Self::RateMismatch { .. } => ErrorKind::RateMismatch,
            Self::AdapterFailure { .. } => ErrorKind::AdapterFailure,
            Self::NotConfigured { .. } => ErrorKind::NotConfigured,
            Self::AlreadyConfigured(_) => ErrorKind::AlreadyConfigured,
            Self::InvalidRequest(_) => ErrorKind::InvalidRequest,
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    pub(crate) fn adapter(stage: ChainStage, source: AdapterError) -> Self {
        Self::AdapterFailure { stage, source }
    }
}

pub type FilterResult<T> = Result<T, FilterError>;
