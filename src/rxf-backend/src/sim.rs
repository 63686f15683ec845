// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Simulated filter hardware for development and testing.
//!
//! Holds the programmed state of every block in memory and checks each
//! request the way the hardware would: rates must match the block's
//! conversion, a block is programmed at most once, and only programmed
//! blocks can be released. No hardware required.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rxf_core::adapter::{
    ChannelFilter, ChannelFilterParams, DecimationFilter, McbFilter, RateParams, SrcFilter,
    SrcMode,
};
use rxf_core::engine::{ChainStage, FilterEngine};
use rxf_core::{
    AdapterError, CapabilitySet, CoefficientSet, DynResult, FilterBranchId, InstanceToken,
};
use serde::Serialize;
use tracing::debug;

use crate::BackendOptions;

const DECIMATION: [FilterEngine; 6] = [
    FilterEngine::Dec2_0,
    FilterEngine::Dec2_1,
    FilterEngine::Dec2_2,
    FilterEngine::Dec2_3,
    FilterEngine::Dec2_4,
    FilterEngine::Dec2_5,
];

/// One request accepted by the simulated hardware.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SimEvent {
    Configured {
        stage: ChainStage,
        filter: String,
        rate: RateParams,
    },
    Released {
        stage: ChainStage,
    },
    Reloaded {
        filter: String,
        params: ChannelFilterParams,
    },
    DelayWritten {
        delay: u32,
    },
}

#[derive(Debug, Clone)]
struct Programmed {
    filter: String,
    rate: RateParams,
}

#[derive(Default)]
struct SimState {
    programmed: HashMap<ChainStage, Programmed>,
    journal: Vec<SimEvent>,
    fail_stage: Option<ChainStage>,
    cfg_delay: u32,
}

/// Block interfaces of one simulated filter branch.
#[derive(Clone)]
pub struct SimHardware {
    label: String,
    state: Arc<Mutex<SimState>>,
}

impl SimHardware {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            state: Arc::default(),
        }
    }

    /// Reject every configuration of `stage`.
    pub fn with_fail_stage(self, stage: Option<ChainStage>) -> Self {
        self.lock().fail_stage = stage;
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn journal(&self) -> Vec<SimEvent> {
        self.lock().journal.clone()
    }

    pub fn is_programmed(&self, stage: ChainStage) -> bool {
        self.lock().programmed.contains_key(&stage)
    }

    /// Filter currently loaded into `stage`.
    pub fn loaded_filter(&self, stage: ChainStage) -> Option<String> {
        self.lock().programmed.get(&stage).map(|p| p.filter.clone())
    }

    pub fn capability_set(&self) -> CapabilitySet {
        CapabilitySet {
            hardware: self.label.clone(),
            mcb: Box::new(self.clone()),
            decimation: Box::new(self.clone()),
            src: Box::new(self.clone()),
            channel: Box::new(self.clone()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn program(
        &self,
        stage: ChainStage,
        coefficients: &CoefficientSet,
        rate: RateParams,
    ) -> Result<(), AdapterError> {
        let mut state = self.lock();
        if state.fail_stage == Some(stage) {
            return Err(format!("{}: {} rejected (injected fault)", self.label, stage).into());
        }
        if coefficients.coefficients().is_empty() {
            return Err(format!("{}: {} has no coefficients", self.label, coefficients.name()).into());
        }
        if let Some(current) = state.programmed.get(&stage) {
            return Err(format!(
                "{}: {} already programmed with {}",
                self.label, stage, current.filter
            )
            .into());
        }
        debug!(
            "{}: {} <- {} ({} -> {} Hz)",
            self.label,
            stage,
            coefficients.name(),
            rate.input_hz,
            rate.output_hz
        );
        state.programmed.insert(
            stage,
            Programmed {
                filter: coefficients.name().to_string(),
                rate,
            },
        );
        state.journal.push(SimEvent::Configured {
            stage,
            filter: coefficients.name().to_string(),
            rate,
        });
        Ok(())
    }

    fn unprogram(&self, stage: ChainStage) -> Result<(), AdapterError> {
        let mut state = self.lock();
        if state.programmed.remove(&stage).is_none() {
            return Err(format!("{}: {} is not programmed", self.label, stage).into());
        }
        debug!("{}: {} released", self.label, stage);
        state.journal.push(SimEvent::Released { stage });
        Ok(())
    }

    fn rate_error(&self, stage: ChainStage, rate: RateParams) -> AdapterError {
        format!(
            "{}: {} cannot convert {} Hz to {} Hz",
            self.label, stage, rate.input_hz, rate.output_hz
        )
        .into()
    }
}

impl McbFilter for SimHardware {
    fn configure(
        &mut self,
        coefficients: &CoefficientSet,
        rate: RateParams,
    ) -> Result<(), AdapterError> {
        let stage = ChainStage::MultiCarrierBlock;
        if rate.input_hz != rate.output_hz {
            return Err(self.rate_error(stage, rate));
        }
        self.program(stage, coefficients, rate)
    }

    fn release(&mut self) -> Result<(), AdapterError> {
        self.unprogram(ChainStage::MultiCarrierBlock)
    }
}

fn decimation_stage(index: u8) -> Result<ChainStage, AdapterError> {
    DECIMATION
        .get(usize::from(index))
        .map(|engine| ChainStage::Engine(*engine))
        .ok_or_else(|| format!("no decimation engine {index}").into())
}

impl DecimationFilter for SimHardware {
    fn configure(
        &mut self,
        index: u8,
        coefficients: &CoefficientSet,
        rate: RateParams,
    ) -> Result<(), AdapterError> {
        let stage = decimation_stage(index)?;
        if rate.input_hz != rate.output_hz * 2 {
            return Err(self.rate_error(stage, rate));
        }
        self.program(stage, coefficients, rate)
    }

    fn release(&mut self, index: u8) -> Result<(), AdapterError> {
        self.unprogram(decimation_stage(index)?)
    }
}

impl SrcFilter for SimHardware {
    fn configure(
        &mut self,
        coefficients: &CoefficientSet,
        mode: SrcMode,
        rate: RateParams,
    ) -> Result<(), AdapterError> {
        let stage = ChainStage::Engine(FilterEngine::Src);
        let valid = match mode {
            SrcMode::Direct {
                interpolation,
                decimation,
            } => {
                let scaled_in = rate.input_hz.checked_mul(u64::from(interpolation));
                let scaled_out = rate.output_hz.checked_mul(u64::from(decimation));
                matches!((scaled_in, scaled_out), (Some(i), Some(o)) if i == o)
            }
            // Output is the CPRI rate times the trailing decimation.
            SrcMode::Ctsr { cpri_rate_hz } => {
                cpri_rate_hz > 0
                    && rate.output_hz % cpri_rate_hz == 0
                    && (rate.output_hz / cpri_rate_hz).is_power_of_two()
            }
        };
        if !valid {
            return Err(self.rate_error(stage, rate));
        }
        self.program(stage, coefficients, rate)
    }

    fn release(&mut self) -> Result<(), AdapterError> {
        self.unprogram(ChainStage::Engine(FilterEngine::Src))
    }
}

impl ChannelFilter for SimHardware {
    fn configure(
        &mut self,
        coefficients: &CoefficientSet,
        params: ChannelFilterParams,
        rate: RateParams,
    ) -> Result<(), AdapterError> {
        let stage = ChainStage::Engine(FilterEngine::Sfir);
        if rate.input_hz != rate.output_hz {
            return Err(self.rate_error(stage, rate));
        }
        self.program(stage, coefficients, rate)?;
        let mut state = self.lock();
        // Group delay of a symmetric FIR.
        state.cfg_delay = u32::try_from(coefficients.coefficients().len() / 2).unwrap_or(u32::MAX);
        if params.additional_gain {
            debug!("{}: SFIR additional gain enabled", self.label);
        }
        Ok(())
    }

    fn reconfigure(
        &mut self,
        coefficients: &CoefficientSet,
        params: ChannelFilterParams,
    ) -> Result<(), AdapterError> {
        let stage = ChainStage::Engine(FilterEngine::Sfir);
        let mut state = self.lock();
        if state.fail_stage == Some(stage) {
            return Err(format!("{}: SFIR reload rejected (injected fault)", self.label).into());
        }
        let Some(current) = state.programmed.get_mut(&stage) else {
            return Err(format!("{}: SFIR is not programmed", self.label).into());
        };
        debug!(
            "{}: SFIR {} -> {} at {} Hz",
            self.label,
            current.filter,
            coefficients.name(),
            current.rate.output_hz
        );
        current.filter = coefficients.name().to_string();
        state.journal.push(SimEvent::Reloaded {
            filter: coefficients.name().to_string(),
            params,
        });
        Ok(())
    }

    fn release(&mut self) -> Result<(), AdapterError> {
        self.unprogram(ChainStage::Engine(FilterEngine::Sfir))
    }

    fn read_cfg_delay(&self) -> Result<u32, AdapterError> {
        let state = self.lock();
        if !state
            .programmed
            .contains_key(&ChainStage::Engine(FilterEngine::Sfir))
        {
            return Err(format!("{}: SFIR is not programmed", self.label).into());
        }
        Ok(state.cfg_delay)
    }

    fn write_cfg_delay(&mut self, delay: u32) -> Result<(), AdapterError> {
        let mut state = self.lock();
        if !state
            .programmed
            .contains_key(&ChainStage::Engine(FilterEngine::Sfir))
        {
            return Err(format!("{}: SFIR is not programmed", self.label).into());
        }
        state.cfg_delay = delay;
        state.journal.push(SimEvent::DelayWritten { delay });
        Ok(())
    }
}

/// Factory registered as `"sim"`.
pub fn sim_factory(
    token: InstanceToken,
    branch: FilterBranchId,
    options: &BackendOptions,
) -> DynResult<CapabilitySet> {
    if !token.is_instance() {
        return Err("sim backend needs a driver instance".into());
    }
    let hw = SimHardware::new(format!("sim/{token}/{branch}")).with_fail_stage(options.fail_stage()?);
    Ok(hw.capability_set())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use rxf_core::controller::ServicePolicy;
    use rxf_core::host::{ErrorSink, FilterServiceConfig, ServiceCommonData, ServiceLocator};
    use rxf_core::radio::AntennaBranchId;
    use rxf_core::{
        CarrierType, Catalog, ConfigDataSource, CpriSlotLength, DigitalFilterService,
        FilterError, FilterResult, PrbFreqOffset, TracingErrorSink,
    };

    use super::*;

    /// Locator that hands out fixed sim hardware so tests can inspect it.
    struct FixedLocator {
        catalog: Arc<Catalog>,
        hw: Vec<SimHardware>,
    }

    impl ServiceLocator for FixedLocator {
        fn data_source(&self) -> Arc<dyn ConfigDataSource> {
            self.catalog.clone()
        }

        fn capabilities(
            &self,
            _token: InstanceToken,
            branch: FilterBranchId,
        ) -> FilterResult<CapabilitySet> {
            self.hw
                .get(usize::from(branch.0))
                .map(SimHardware::capability_set)
                .ok_or_else(|| FilterError::invalid("no such branch"))
        }
    }

    fn service(hw: &[SimHardware]) -> DigitalFilterService {
        let locator = Arc::new(FixedLocator {
            catalog: Arc::new(Catalog::builtin().unwrap()),
            hw: hw.to_vec(),
        });
        let sink: Arc<dyn ErrorSink> = Arc::new(TracingErrorSink);
        let common = ServiceCommonData {
            variant: "RxDigitalFilter".to_string(),
            antenna_branch: AntennaBranchId(0),
            config: FilterServiceConfig {
                filter_branches: (0..hw.len() as u8).collect(),
                policy: ServicePolicy::default(),
                ..Default::default()
            },
        };
        let service = DigitalFilterService::new(sink, locator, &common, InstanceToken(0)).unwrap();
        assert!(service.pre_initialize_service());
        assert!(service.post_initialize_service());
        service
    }

    const B0: FilterBranchId = FilterBranchId(0);

    #[test]
    fn test_every_builtin_carrier_runs_on_sim() {
        let hw = SimHardware::new("sim/0/0");
        let service = service(std::slice::from_ref(&hw));
        for carrier in CarrierType::ALL {
            assert!(
                service.configure_filter(carrier.standard(), carrier, &[B0], None, 0),
                "{carrier} failed to configure"
            );
            assert!(service.release_filter(&[B0]), "{carrier} failed to release");
            assert!(!hw.is_programmed(ChainStage::MultiCarrierBlock));
        }
    }

    #[test]
    fn test_cpri_path_runs_on_sim() {
        let hw = SimHardware::new("sim/0/0");
        let service = service(std::slice::from_ref(&hw));
        let slot = CpriSlotLength::new(8).unwrap();
        assert!(service.configure_filter(
            CarrierType::Lte20.standard(),
            CarrierType::Lte20,
            &[B0],
            Some(slot),
            0
        ));
        assert_eq!(
            hw.loaded_filter(ChainStage::Engine(FilterEngine::Src)).as_deref(),
            Some("SRC_CTSR")
        );
        assert!(service.re_configure_channel_filter(
            CarrierType::Lte15,
            PrbFreqOffset::PlusHalfSubcarrier,
            true,
            &[B0],
            Some(slot),
        ));
        assert!(matches!(
            hw.journal().last(),
            Some(SimEvent::Reloaded { params, .. }) if params.freq_shift_hz == Some(7_500)
        ));
    }

    #[test]
    fn test_injected_fault_unwinds_branch() {
        let hw = SimHardware::new("sim/0/0")
            .with_fail_stage(Some(ChainStage::Engine(FilterEngine::Dec2_1)));
        let service = service(std::slice::from_ref(&hw));
        assert!(!service.configure_filter(
            CarrierType::Nr20.standard(),
            CarrierType::Nr20,
            &[B0],
            None,
            0
        ));
        assert!(!hw.is_programmed(ChainStage::MultiCarrierBlock));
        assert!(!hw.is_programmed(ChainStage::Engine(FilterEngine::Dec2_0)));
        assert!(service.branch_state(B0).unwrap().is_unconfigured());
    }

    #[test]
    fn test_sim_rejects_inconsistent_rates() {
        let mut hw = SimHardware::new("sim/0/0");
        let coefficients = CoefficientSet::new("DEC2_0", vec![1, 2, 1], 0);
        let rate = RateParams {
            input_hz: 245_760_000,
            output_hz: 245_760_000,
        };
        assert!(DecimationFilter::configure(&mut hw, 0, &coefficients, rate).is_err());
        assert!(DecimationFilter::configure(&mut hw, 9, &coefficients, rate).is_err());
        assert!(hw.journal().is_empty());
    }

    #[test]
    fn test_sim_src_rejects_overflowing_ratio() {
        let mut hw = SimHardware::new("sim/0/0");
        let coefficients = CoefficientSet::new("SRC_3_4", vec![1], 0);
        let mode = SrcMode::Direct {
            interpolation: 3,
            decimation: 4,
        };
        let rate = RateParams {
            input_hz: u64::MAX / 2,
            output_hz: u64::MAX / 4,
        };
        assert!(SrcFilter::configure(&mut hw, &coefficients, mode, rate).is_err());
        assert!(hw.journal().is_empty());
    }

    #[test]
    fn test_sim_rejects_double_programming_and_stray_release() {
        let mut hw = SimHardware::new("sim/0/0");
        let coefficients = CoefficientSet::new("MCB_LTE", vec![1], 0);
        let rate = RateParams {
            input_hz: 1_000,
            output_hz: 1_000,
        };
        McbFilter::configure(&mut hw, &coefficients, rate).unwrap();
        assert!(McbFilter::configure(&mut hw, &coefficients, rate).is_err());
        McbFilter::release(&mut hw).unwrap();
        assert!(McbFilter::release(&mut hw).is_err());
        assert!(SrcFilter::release(&mut hw).is_err());
    }

    #[test]
    fn test_cfg_delay_follows_channel_filter() {
        let mut hw = SimHardware::new("sim/0/0");
        assert!(hw.read_cfg_delay().is_err());
        let coefficients = CoefficientSet::new("CHF_LTE5", vec![1, 2, 3, 2, 1], 4_500_000);
        let rate = RateParams {
            input_hz: 7_680_000,
            output_hz: 7_680_000,
        };
        ChannelFilter::configure(&mut hw, &coefficients, ChannelFilterParams::default(), rate)
            .unwrap();
        assert_eq!(hw.read_cfg_delay().unwrap(), 2);
        hw.write_cfg_delay(9).unwrap();
        assert_eq!(hw.read_cfg_delay().unwrap(), 9);
    }

    #[test]
    fn test_factory_requires_instance() {
        let options = BackendOptions::default();
        assert!(sim_factory(InstanceToken::NO_INSTANCE, B0, &options).is_err());
        let caps = sim_factory(InstanceToken(1), B0, &options).unwrap();
        assert_eq!(caps.hardware, "sim/1/0");
    }
}
