// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Recording block interfaces for controller tests.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use crate::adapter::{
    CapabilitySet, ChannelFilter, ChannelFilterParams, DecimationFilter, McbFilter, RateParams,
    SrcFilter, SrcMode,
};
use crate::catalog::CoefficientSet;
use crate::engine::{ChainStage, FilterEngine};
use crate::error::{AdapterError, FilterError};
use crate::host::ErrorSink;
use crate::radio::FilterBranchId;

const DECIMATION: [FilterEngine; 6] = [
    FilterEngine::Dec2_0,
    FilterEngine::Dec2_1,
    FilterEngine::Dec2_2,
    FilterEngine::Dec2_3,
    FilterEngine::Dec2_4,
    FilterEngine::Dec2_5,
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Configure(ChainStage, String, RateParams),
    Release(ChainStage),
    Reconfigure(String, ChannelFilterParams),
    WriteDelay(u32),
}

#[derive(Default)]
struct MockState {
    calls: Vec<Call>,
    fail_configure: HashSet<ChainStage>,
    fail_release: HashSet<ChainStage>,
    fail_reconfigure: bool,
    delay: u32,
}

/// Snapshot of the calls made so far.
pub struct Journal(Vec<Call>);

impl Journal {
    pub fn calls(&self) -> &[Call] {
        &self.0
    }

    pub fn configured_stages(&self) -> Vec<ChainStage> {
        self.0
            .iter()
            .filter_map(|c| match c {
                Call::Configure(stage, ..) => Some(*stage),
                _ => None,
            })
            .collect()
    }

    pub fn released_stages(&self) -> Vec<ChainStage> {
        self.0
            .iter()
            .filter_map(|c| match c {
                Call::Release(stage) => Some(*stage),
                _ => None,
            })
            .collect()
    }
}

#[derive(Clone, Default)]
pub struct MockHardware {
    state: Arc<Mutex<MockState>>,
}

impl MockHardware {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn journal(&self) -> Journal {
        Journal(self.state.lock().unwrap().calls.clone())
    }

    pub fn clear(&self) {
        self.state.lock().unwrap().calls.clear();
    }

    pub fn fail_configure(&self, stage: ChainStage) {
        self.state.lock().unwrap().fail_configure.insert(stage);
    }

    pub fn fail_release(&self, stage: ChainStage) {
        self.state.lock().unwrap().fail_release.insert(stage);
    }

    pub fn fail_reconfigure(&self, fail: bool) {
        self.state.lock().unwrap().fail_reconfigure = fail;
    }

    pub fn capability_set(&self) -> CapabilitySet {
        CapabilitySet {
            hardware: "mock".to_string(),
            mcb: Box::new(self.clone()),
            decimation: Box::new(self.clone()),
            src: Box::new(self.clone()),
            channel: Box::new(self.clone()),
        }
    }

    fn record_configure(
        &self,
        stage: ChainStage,
        coefficients: &CoefficientSet,
        rate: RateParams,
    ) -> Result<(), AdapterError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_configure.contains(&stage) {
            return Err(format!("{stage} configure rejected").into());
        }
        state
            .calls
            .push(Call::Configure(stage, coefficients.name().to_string(), rate));
        Ok(())
    }

    fn record_release(&self, stage: ChainStage) -> Result<(), AdapterError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::Release(stage));
        if state.fail_release.contains(&stage) {
            return Err(format!("{stage} release rejected").into());
        }
        Ok(())
    }
}

impl McbFilter for MockHardware {
    fn configure(&mut self, coefficients: &CoefficientSet, rate: RateParams) -> Result<(), AdapterError> {
        self.record_configure(ChainStage::MultiCarrierBlock, coefficients, rate)
    }

    fn release(&mut self) -> Result<(), AdapterError> {
        self.record_release(ChainStage::MultiCarrierBlock)
    }
}

impl DecimationFilter for MockHardware {
    fn configure(
        &mut self,
        index: u8,
        coefficients: &CoefficientSet,
        rate: RateParams,
    ) -> Result<(), AdapterError> {
        let engine = DECIMATION[usize::from(index)];
        self.record_configure(engine.into(), coefficients, rate)
    }

    fn release(&mut self, index: u8) -> Result<(), AdapterError> {
        let engine = DECIMATION[usize::from(index)];
        self.record_release(engine.into())
    }
}

impl SrcFilter for MockHardware {
    fn configure(
        &mut self,
        coefficients: &CoefficientSet,
        _mode: SrcMode,
        rate: RateParams,
    ) -> Result<(), AdapterError> {
        self.record_configure(FilterEngine::Src.into(), coefficients, rate)
    }

    fn release(&mut self) -> Result<(), AdapterError> {
        self.record_release(FilterEngine::Src.into())
    }
}

impl ChannelFilter for MockHardware {
    fn configure(
        &mut self,
        coefficients: &CoefficientSet,
        _params: ChannelFilterParams,
        rate: RateParams,
    ) -> Result<(), AdapterError> {
        self.record_configure(FilterEngine::Sfir.into(), coefficients, rate)
    }

    fn reconfigure(
        &mut self,
        coefficients: &CoefficientSet,
        params: ChannelFilterParams,
    ) -> Result<(), AdapterError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_reconfigure {
            return Err("SFIR reload rejected".into());
        }
        state
            .calls
            .push(Call::Reconfigure(coefficients.name().to_string(), params));
        Ok(())
    }

    fn release(&mut self) -> Result<(), AdapterError> {
        self.record_release(FilterEngine::Sfir.into())
    }

    fn read_cfg_delay(&self) -> Result<u32, AdapterError> {
        Ok(self.state.lock().unwrap().delay)
    }

    fn write_cfg_delay(&mut self, delay: u32) -> Result<(), AdapterError> {
        let mut state = self.state.lock().unwrap();
        state.delay = delay;
        state.calls.push(Call::WriteDelay(delay));
        Ok(())
    }
}

/// Error sink that keeps every report.
#[derive(Default)]
pub struct CollectingSink {
    reports: Mutex<Vec<(Option<FilterBranchId>, FilterError)>>,
}

impl CollectingSink {
    pub fn reports(&self) -> Vec<(Option<FilterBranchId>, FilterError)> {
        self.reports.lock().unwrap().clone()
    }
}

impl ErrorSink for CollectingSink {
    fn report(&self, branch: Option<FilterBranchId>, error: &FilterError) {
        self.reports.lock().unwrap().push((branch, error.clone()));
    }
}
