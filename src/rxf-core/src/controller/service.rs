// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Digital filter service of one antenna branch.
//!
//! Every filter branch sits behind its own mutex: requests for one branch are
//! serialized, requests for different branches may run on different threads.
//! Failures are reported to the [`ErrorSink`] and surface as `false`.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tracing::{info, warn};

use super::branch::FilterBranch;
use super::machine::BranchState;
use super::plan::{validate_branch_list, ChainPlanner, FilterSpec};
use super::ServicePolicy;
use crate::catalog::CoefficientLookup;
use crate::engine::ChainStage;
use crate::error::{FilterError, FilterResult};
use crate::host::{ErrorSink, InstanceToken, ServiceCommonData, ServiceLocator};
use crate::radio::{
    AntennaBranchId, CarrierStandard, CarrierType, CpriSlotLength, DownConversionType,
    FilterBranchId, PrbFreqOffset,
};

/// Serializable view of one filter branch.
#[derive(Debug, Clone, Serialize)]
pub struct BranchSnapshot {
    pub id: FilterBranchId,
    pub state: BranchState,
    pub transitions: u64,
    /// Milliseconds since the last state transition.
    pub time_in_state_ms: Option<u64>,
    pub stages: Vec<StageSnapshot>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StageSnapshot {
    pub stage: String,
    pub filter: String,
    pub input_hz: u64,
    pub output_hz: u64,
}

/// Serializable view of the whole service.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceSnapshot {
    pub variant: String,
    pub antenna_branch: String,
    pub instance_token: InstanceToken,
    pub branches: Vec<BranchSnapshot>,
}

pub struct DigitalFilterService {
    variant: String,
    antenna_branch: AntennaBranchId,
    instance_token: InstanceToken,
    policy: ServicePolicy,
    planner: ChainPlanner,
    locator: Arc<dyn ServiceLocator>,
    sink: Arc<dyn ErrorSink>,
    branches: BTreeMap<FilterBranchId, Mutex<FilterBranch>>,
}

impl DigitalFilterService {
    /// Create the service and its (unbound) filter branches.
    pub fn new(
        sink: Arc<dyn ErrorSink>,
        locator: Arc<dyn ServiceLocator>,
        common: &ServiceCommonData,
        instance_token: InstanceToken,
    ) -> FilterResult<Self> {
        common.config.validate().map_err(FilterError::InvalidRequest)?;
        let lookup = CoefficientLookup::new(locator.data_source());
        let branches = common
            .config
            .filter_branches
            .iter()
            .map(|id| {
                let id = FilterBranchId(*id);
                (id, Mutex::new(FilterBranch::new(id)))
            })
            .collect();
        Ok(Self {
            variant: common.variant.clone(),
            antenna_branch: common.antenna_branch,
            instance_token,
            policy: common.config.policy,
            planner: ChainPlanner::new(lookup, common.config.input_rate_hz),
            locator,
            sink,
            branches,
        })
    }

    pub fn service_variant(&self) -> &str {
        &self.variant
    }

    pub fn antenna_branch(&self) -> AntennaBranchId {
        self.antenna_branch
    }

    pub fn instance_token(&self) -> InstanceToken {
        self.instance_token
    }

    pub fn filter_branches(&self) -> Vec<FilterBranchId> {
        self.branches.keys().copied().collect()
    }

    /// Bind the block interfaces of every filter branch.
    pub fn pre_initialize_service(&self) -> bool {
        let mut ok = true;
        for (id, branch) in &self.branches {
            match self.locator.capabilities(self.instance_token, *id) {
                Ok(caps) => lock(branch).bind(caps),
                Err(err) => {
                    self.sink.report(Some(*id), &err);
                    ok = false;
                }
            }
        }
        ok
    }

    pub fn post_initialize_service(&self) -> bool {
        let unbound: Vec<_> = self
            .branches
            .iter()
            .filter(|(_, b)| !lock(b).is_bound())
            .map(|(id, _)| *id)
            .collect();
        if !unbound.is_empty() {
            for id in unbound {
                self.sink.report(
                    Some(id),
                    &FilterError::invalid(format!("filter branch {id} has no block interfaces")),
                );
            }
            return false;
        }
        let dct = self.planner.lookup().source().down_conversion_type();
        if dct == DownConversionType::Unknown {
            warn!(
                "{}: down-conversion type {}, channel filters get no additional gain",
                self.antenna_branch, dct
            );
        }
        info!(
            "{} filter service {} ready: {} filter branches, {}",
            self.antenna_branch,
            self.variant,
            self.branches.len(),
            dct
        );
        true
    }

    pub fn configure_filter(
        &self,
        standard: CarrierStandard,
        carrier: CarrierType,
        branch_ids: &[FilterBranchId],
        slot_length: Option<CpriSlotLength>,
        sub_carrier_spacing_khz: u32,
    ) -> bool {
        let spec = match FilterSpec::new(
            standard,
            carrier,
            branch_ids,
            slot_length,
            sub_carrier_spacing_khz,
        ) {
            Ok(spec) => spec,
            Err(err) => {
                self.sink.report(None, &err);
                return false;
            }
        };

        // The plan is complete and rate-checked before any driver call.
        let plan = match self.planner.plan(&spec) {
            Ok(plan) => plan,
            Err(err) => {
                for id in &spec.branches {
                    self.sink.report(Some(*id), &err);
                }
                return false;
            }
        };

        let mut ok = true;
        for id in &spec.branches {
            match self.with_branch(*id, |branch| branch.configure(&plan)) {
                Ok(()) => info!("filter branch {} configured for {}", id, carrier),
                Err(err) => {
                    self.sink.report(Some(*id), &err);
                    ok = false;
                }
            }
        }
        ok
    }

    pub fn release_filter(&self, branch_ids: &[FilterBranchId]) -> bool {
        let ids = match validate_branch_list(branch_ids) {
            Ok(ids) => ids,
            Err(err) => {
                self.sink.report(None, &err);
                return false;
            }
        };

        let mut ok = true;
        for id in ids {
            match self.with_branch(id, FilterBranch::release) {
                Ok(()) => info!("filter branch {} released", id),
                Err(err) => {
                    self.sink.report(Some(id), &err);
                    ok = false;
                }
            }
        }
        ok
    }

    /// Reload the channel filter of configured branches for a new carrier
    /// type or attached PRB bandwidth. Upstream stages are left untouched.
    pub fn re_configure_channel_filter(
        &self,
        carrier: CarrierType,
        prb_freq_offset: PrbFreqOffset,
        use_cpri_freq_shift: bool,
        branch_ids: &[FilterBranchId],
        slot_length: Option<CpriSlotLength>,
    ) -> bool {
        let ids = match validate_branch_list(branch_ids) {
            Ok(ids) => ids,
            Err(err) => {
                self.sink.report(None, &err);
                return false;
            }
        };

        let mut ok = true;
        for id in ids {
            let result = self.with_branch(id, |branch| {
                let Some(current) = branch.state().configured() else {
                    return Err(FilterError::NotConfigured {
                        branch: id,
                        what: "filter chain".to_string(),
                    });
                };
                if current.standard != carrier.standard() {
                    return Err(FilterError::invalid(format!(
                        "branch {} runs {}, cannot switch to {}",
                        id, current.standard, carrier
                    )));
                }
                let step = self.planner.plan_channel_filter(
                    carrier,
                    current.sub_carrier_spacing,
                    branch.channel_filter_rate()?,
                    prb_freq_offset,
                    use_cpri_freq_shift,
                    slot_length,
                )?;
                branch.reconfigure_channel_filter(&step)
            });
            match result {
                Ok(()) => info!("filter branch {} channel filter reloaded for {}", id, carrier),
                Err(err) => {
                    self.sink.report(Some(id), &err);
                    ok = false;
                }
            }
        }
        ok
    }

    pub fn has_decimation_filter(&self) -> bool {
        self.policy.has_decimation_filter
    }

    pub fn has_channel_filter(&self) -> bool {
        self.policy.has_channel_filter
    }

    /// Engines can be cascaded in hardware, but cascading is reported only
    /// when the policy enables it.
    pub fn has_filter_engines(&self) -> bool {
        self.policy.report_filter_engines
    }

    pub fn read_sfir_cfg_delay(&self, id: FilterBranchId) -> FilterResult<u32> {
        self.with_branch(id, |branch| branch.read_cfg_delay())
            .inspect_err(|err| self.sink.report(Some(id), err))
    }

    pub fn write_sfir_cfg_delay(&self, id: FilterBranchId, delay: u32) -> FilterResult<()> {
        self.with_branch(id, |branch| branch.write_cfg_delay(delay))
            .inspect_err(|err| self.sink.report(Some(id), err))
    }

    pub fn branch_state(&self, id: FilterBranchId) -> Option<BranchState> {
        self.branches.get(&id).map(|b| lock(b).state().clone())
    }

    pub fn snapshot(&self) -> ServiceSnapshot {
        let branches = self
            .branches
            .values()
            .map(|b| {
                let branch = lock(b);
                let registry = branch.registry();
                let stages = registry
                    .configured_stages()
                    .into_iter()
                    .filter_map(|stage: ChainStage| {
                        registry.config(stage).map(|cfg| StageSnapshot {
                            stage: stage.to_string(),
                            filter: cfg.filter.clone(),
                            input_hz: cfg.input_hz,
                            output_hz: cfg.output_hz,
                        })
                    })
                    .collect();
                BranchSnapshot {
                    id: branch.id(),
                    state: branch.state().clone(),
                    transitions: branch.machine().transition_count(),
                    time_in_state_ms: branch
                        .machine()
                        .time_in_state()
                        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX)),
                    stages,
                }
            })
            .collect();
        ServiceSnapshot {
            variant: self.variant.clone(),
            antenna_branch: self.antenna_branch.to_string(),
            instance_token: self.instance_token,
            branches,
        }
    }

    fn with_branch<T>(
        &self,
        id: FilterBranchId,
        f: impl FnOnce(&mut FilterBranch) -> FilterResult<T>,
    ) -> FilterResult<T> {
        let branch = self
            .branches
            .get(&id)
            .ok_or_else(|| FilterError::invalid(format!("unknown filter branch {id}")))?;
        f(&mut lock(branch))
    }
}

fn lock(branch: &Mutex<FilterBranch>) -> MutexGuard<'_, FilterBranch> {
    branch.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::adapter::CapabilitySet;
    use crate::catalog::{Catalog, ConfigDataSource};
    use crate::controller::mock::{Call, CollectingSink, MockHardware};
    use crate::engine::FilterEngine;
    use crate::error::ErrorKind;
    use crate::host::FilterServiceConfig;
    use crate::radio::SubCarrierSpacing;

    struct MockLocator {
        catalog: Arc<Catalog>,
        hardware: HashMap<FilterBranchId, MockHardware>,
    }

    impl ServiceLocator for MockLocator {
        fn data_source(&self) -> Arc<dyn ConfigDataSource> {
            self.catalog.clone()
        }

        fn capabilities(
            &self,
            _token: InstanceToken,
            branch: FilterBranchId,
        ) -> FilterResult<CapabilitySet> {
            self.hardware
                .get(&branch)
                .map(MockHardware::capability_set)
                .ok_or_else(|| FilterError::invalid(format!("no hardware for {branch}")))
        }
    }

    struct Fixture {
        service: DigitalFilterService,
        sink: Arc<CollectingSink>,
        hw: Vec<MockHardware>,
    }

    fn fixture_with(catalog: Catalog, bound: &[u8]) -> Fixture {
        let hw: Vec<MockHardware> = (0..2).map(|_| MockHardware::new()).collect();
        let hardware = bound
            .iter()
            .map(|id| (FilterBranchId(*id), hw[usize::from(*id)].clone()))
            .collect();
        let locator = Arc::new(MockLocator {
            catalog: Arc::new(catalog),
            hardware,
        });
        let sink = Arc::new(CollectingSink::default());
        let common = ServiceCommonData {
            variant: "RxDigitalFilter".to_string(),
            antenna_branch: AntennaBranchId(0),
            config: FilterServiceConfig {
                filter_branches: vec![0, 1],
                ..Default::default()
            },
        };
        let service =
            DigitalFilterService::new(sink.clone(), locator, &common, InstanceToken(0)).unwrap();
        Fixture { service, sink, hw }
    }

    fn fixture() -> Fixture {
        let fx = fixture_with(Catalog::builtin().unwrap(), &[0, 1]);
        assert!(fx.service.pre_initialize_service());
        assert!(fx.service.post_initialize_service());
        fx
    }

    const B0: FilterBranchId = FilterBranchId(0);
    const B1: FilterBranchId = FilterBranchId(1);

    fn configure(fx: &Fixture, carrier: CarrierType, branches: &[FilterBranchId]) -> bool {
        fx.service
            .configure_filter(carrier.standard(), carrier, branches, None, 0)
    }

    fn stage_rates(fx: &Fixture, id: FilterBranchId) -> Vec<(String, u64, u64)> {
        let snapshot = fx.service.snapshot();
        let branch = snapshot.branches.iter().find(|b| b.id == id).unwrap();
        branch
            .stages
            .iter()
            .map(|s| (s.stage.clone(), s.input_hz, s.output_hz))
            .collect()
    }

    fn sfir_filter(fx: &Fixture, id: FilterBranchId) -> String {
        let snapshot = fx.service.snapshot();
        let branch = snapshot.branches.iter().find(|b| b.id == id).unwrap();
        branch
            .stages
            .iter()
            .find(|s| s.stage == "SFIR")
            .map(|s| s.filter.clone())
            .unwrap()
    }

    #[test]
    fn test_configure_release_round_trip_is_repeatable() {
        let fx = fixture();
        assert!(configure(&fx, CarrierType::Lte20, &[B0]));
        let first = fx.hw[0].journal().configured_stages();
        assert!(fx.service.release_filter(&[B0]));
        assert!(fx.service.branch_state(B0).unwrap().is_unconfigured());

        fx.hw[0].clear();
        assert!(configure(&fx, CarrierType::Lte20, &[B0]));
        assert_eq!(fx.hw[0].journal().configured_stages(), first);
        assert!(fx.service.branch_state(B0).unwrap().is_configured());
        assert!(fx.sink.reports().is_empty());
    }

    #[test]
    fn test_release_runs_in_reverse_order() {
        let fx = fixture();
        assert!(configure(&fx, CarrierType::Nr20, &[B0]));
        let mut configured = fx.hw[0].journal().configured_stages();
        assert_eq!(configured[0], ChainStage::MultiCarrierBlock);

        fx.hw[0].clear();
        assert!(fx.service.release_filter(&[B0]));
        configured.reverse();
        assert_eq!(fx.hw[0].journal().released_stages(), configured);
    }

    #[test]
    fn test_failure_on_one_branch_leaves_others_configured() {
        let fx = fixture();
        fx.hw[1].fail_configure(FilterEngine::Dec2_2.into());

        assert!(!configure(&fx, CarrierType::Nr20, &[B0, B1]));
        assert!(fx.service.branch_state(B0).unwrap().is_configured());
        assert!(fx.service.branch_state(B1).unwrap().is_unconfigured());

        let reports = fx.sink.reports();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].0, Some(B1));
        assert_eq!(reports[0].1.kind(), ErrorKind::AdapterFailure);
        // Partial chain of branch 1 was unwound.
        assert_eq!(
            fx.hw[1].journal().released_stages(),
            vec![
                FilterEngine::Dec2_1.into(),
                FilterEngine::Dec2_0.into(),
                ChainStage::MultiCarrierBlock
            ]
        );
    }

    #[test]
    fn test_configured_branch_rejects_second_configure() {
        let fx = fixture();
        assert!(configure(&fx, CarrierType::Lte10, &[B0]));
        fx.hw[0].clear();

        assert!(!configure(&fx, CarrierType::Lte5, &[B0]));
        assert!(fx.hw[0].journal().calls().is_empty());
        assert_eq!(fx.sink.reports()[0].1.kind(), ErrorKind::AlreadyConfigured);
    }

    #[test]
    fn test_reconfigure_touches_channel_filter_only() {
        let fx = fixture();
        assert!(configure(&fx, CarrierType::Nr20, &[B0]));
        let rates = stage_rates(&fx, B0);
        fx.hw[0].clear();

        assert!(fx.service.re_configure_channel_filter(
            CarrierType::Nr15,
            PrbFreqOffset::Zero,
            false,
            &[B0],
            None,
        ));
        let calls = fx.hw[0].journal();
        assert_eq!(calls.calls().len(), 1);
        assert!(matches!(&calls.calls()[0], Call::Reconfigure(name, _) if name == "CHF_NR15"));
        assert_eq!(stage_rates(&fx, B0), rates);
        assert_eq!(sfir_filter(&fx, B0), "CHF_NR15");
    }

    #[test]
    fn test_reconfigure_failure_keeps_previous_filter() {
        let fx = fixture();
        assert!(configure(&fx, CarrierType::Nr20, &[B0]));
        fx.hw[0].fail_reconfigure(true);

        assert!(!fx.service.re_configure_channel_filter(
            CarrierType::Nr15,
            PrbFreqOffset::Zero,
            false,
            &[B0],
            None,
        ));
        assert_eq!(sfir_filter(&fx, B0), "CHF_NR20");
        assert!(fx.service.branch_state(B0).unwrap().is_configured());
        assert_eq!(fx.sink.reports()[0].1.kind(), ErrorKind::AdapterFailure);
    }

    #[test]
    fn test_reconfigure_rejects_other_standard_and_idle_branch() {
        let fx = fixture();
        assert!(configure(&fx, CarrierType::Lte20, &[B0]));

        assert!(!fx.service.re_configure_channel_filter(
            CarrierType::Nr20,
            PrbFreqOffset::Zero,
            false,
            &[B0],
            None,
        ));
        assert!(!fx.service.re_configure_channel_filter(
            CarrierType::Lte10,
            PrbFreqOffset::Zero,
            false,
            &[B1],
            None,
        ));
        let kinds: Vec<_> = fx.sink.reports().iter().map(|(_, e)| e.kind()).collect();
        assert_eq!(kinds, vec![ErrorKind::InvalidRequest, ErrorKind::NotConfigured]);
        assert_eq!(sfir_filter(&fx, B0), "CHF_LTE20");
    }

    #[test]
    fn test_rate_mismatch_issues_no_driver_calls() {
        let mut catalog = Catalog::builtin().unwrap();
        let mut entry = catalog.carrier("LTE20").unwrap();
        entry.output_rate_hz = entry.output_rate_hz.map(|hz| hz + 1);
        catalog.insert_carrier("LTE20", entry);
        let fx = fixture_with(catalog, &[0, 1]);
        assert!(fx.service.pre_initialize_service());

        assert!(!configure(&fx, CarrierType::Lte20, &[B0]));
        assert!(fx.hw[0].journal().calls().is_empty());
        assert!(fx.service.branch_state(B0).unwrap().is_unconfigured());
        assert_eq!(fx.sink.reports()[0].1.kind(), ErrorKind::RateMismatch);
    }

    #[test]
    fn test_release_of_idle_branch_reports_error() {
        let fx = fixture();
        assert!(!fx.service.release_filter(&[B0]));
        assert!(fx.hw[0].journal().calls().is_empty());
        assert_eq!(fx.sink.reports()[0].1.kind(), ErrorKind::NotConfigured);
    }

    #[test]
    fn test_bad_branch_lists_are_rejected() {
        let fx = fixture();
        assert!(!configure(&fx, CarrierType::Lte20, &[]));
        assert!(!configure(&fx, CarrierType::Lte20, &[B0, B0]));
        assert!(!configure(&fx, CarrierType::Lte20, &[FilterBranchId(7)]));
        assert!(fx.hw[0].journal().calls().is_empty());
        assert!(fx
            .sink
            .reports()
            .iter()
            .all(|(_, e)| e.kind() == ErrorKind::InvalidRequest));
    }

    #[test]
    fn test_capability_answers() {
        let fx = fixture();
        assert!(fx.service.has_decimation_filter());
        assert!(fx.service.has_channel_filter());
        assert!(!fx.service.has_filter_engines());
        assert_eq!(fx.service.service_variant(), "RxDigitalFilter");
    }

    #[test]
    fn test_post_initialize_fails_with_unbound_branch() {
        let fx = fixture_with(Catalog::builtin().unwrap(), &[0]);
        assert!(!fx.service.pre_initialize_service());
        assert!(!fx.service.post_initialize_service());
        assert!(fx.sink.reports().iter().all(|(id, _)| *id == Some(B1)));
    }

    #[test]
    fn test_cfg_delay_round_trip() {
        let fx = fixture();
        assert!(fx.service.read_sfir_cfg_delay(B0).is_err());
        assert!(configure(&fx, CarrierType::Lte10, &[B0]));
        fx.service.write_sfir_cfg_delay(B0, 12).unwrap();
        assert_eq!(fx.service.read_sfir_cfg_delay(B0).unwrap(), 12);
    }

    #[test]
    fn test_snapshot_serializes() {
        let fx = fixture();
        assert!(configure(&fx, CarrierType::Lte20, &[B1]));
        let json = serde_json::to_value(fx.service.snapshot()).unwrap();
        assert_eq!(json["antenna_branch"], "RxA");
        assert_eq!(json["branches"][1]["state"]["state"], "Configured");
        assert_eq!(json["branches"][0]["stages"].as_array().unwrap().len(), 0);
        assert!(json["branches"][0]["time_in_state_ms"].is_null());
        assert!(json["branches"][1]["time_in_state_ms"].is_u64());
    }

    #[test]
    fn test_nr_scs30_chain_keeps_spacing_on_reconfigure() {
        let fx = fixture();
        assert!(fx
            .service
            .configure_filter(CarrierStandard::Nr, CarrierType::Nr20, &[B0], None, 30));
        assert_eq!(sfir_filter(&fx, B0), "CHF_NR20_SCS30");
        let state = fx.service.branch_state(B0).unwrap();
        assert_eq!(
            state.configured().and_then(|c| c.sub_carrier_spacing),
            Some(SubCarrierSpacing::Khz30)
        );
        let rates = stage_rates(&fx, B0);
        fx.hw[0].clear();

        assert!(fx.service.re_configure_channel_filter(
            CarrierType::Nr20,
            PrbFreqOffset::PlusHalfSubcarrier,
            true,
            &[B0],
            None,
        ));
        let calls = fx.hw[0].journal();
        assert_eq!(calls.calls().len(), 1);
        assert!(
            matches!(&calls.calls()[0], Call::Reconfigure(name, _) if name == "CHF_NR20_SCS30")
        );
        assert_eq!(stage_rates(&fx, B0), rates);
        assert!(fx.sink.reports().is_empty());
    }

    #[test]
    fn test_distinct_branches_configure_concurrently() {
        let fx = fixture();
        std::thread::scope(|scope| {
            for (id, carrier) in [(B0, CarrierType::Lte20), (B1, CarrierType::Nr20)] {
                let service = &fx.service;
                scope.spawn(move || {
                    for _ in 0..20 {
                        assert!(service.configure_filter(
                            carrier.standard(),
                            carrier,
                            &[id],
                            None,
                            0
                        ));
                        assert!(service.release_filter(&[id]));
                    }
                    assert!(service.configure_filter(carrier.standard(), carrier, &[id], None, 0));
                });
            }
        });

        assert!(fx.sink.reports().is_empty());
        assert_eq!(sfir_filter(&fx, B0), "CHF_LTE20");
        assert_eq!(sfir_filter(&fx, B1), "CHF_NR20");
        for (n, carrier) in [CarrierType::Lte20, CarrierType::Nr20].into_iter().enumerate() {
            let journal = fx.hw[n].journal();
            let configured = journal.configured_stages();
            let released = journal.released_stages();
            let chain = configured.len() / 21;
            assert_eq!(configured.len(), chain * 21, "{carrier}");
            assert_eq!(released.len(), chain * 20, "{carrier}");
            let mut reversed = released[..chain].to_vec();
            reversed.reverse();
            assert_eq!(reversed, configured[..chain].to_vec(), "{carrier}");
        }
    }
}
