// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

mod config;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use serde_json::json;
use tracing::{info, warn};

use rxf_app::{init_logging, ConfigFile};
use rxf_backend::{register_builtin_backends_on, BackendLocator, RegistrationContext};
use rxf_core::catalog::CoefficientLookup;
use rxf_core::controller::{ChainPlanner, FilterSpec};
use rxf_core::{
    CarrierType, Catalog, ConfigDataSource, CpriSlotLength, DigitalFilterService, DynResult,
    ErrorSink, FilterBranchId, PrbFreqOffset, TracingErrorSink,
};

use config::{AntennaConfig, ServerConfig};

const PKG_DESCRIPTION: &str = concat!(env!("CARGO_PKG_NAME"), " - uplink filter chain daemon");

#[derive(Debug, Parser)]
#[command(
    author = env!("CARGO_PKG_AUTHORS"),
    version = env!("CARGO_PKG_VERSION"),
    about = PKG_DESCRIPTION,
)]
struct Cli {
    /// Path to configuration file
    #[arg(long = "config", short = 'C', value_name = "FILE")]
    config: Option<PathBuf>,
    /// Print example configuration and exit
    #[arg(long = "print-config")]
    print_config: bool,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Plan every carrier type against the catalog and report the chains
    Check,
    /// Configure filter branches, optionally reload the channel filter, then release
    Cycle(CycleArgs),
}

#[derive(Debug, clap::Args)]
struct CycleArgs {
    /// Carrier type to configure (e.g. LTE20, NR100)
    #[arg(long)]
    carrier: CarrierType,
    /// Filter branches; all configured branches when omitted
    #[arg(long, value_delimiter = ',')]
    branches: Vec<u8>,
    /// Antenna branch (0 = RxA); the first configured one when omitted
    #[arg(long)]
    antenna: Option<u8>,
    /// CPRI slot length; selects the CPRI transport-rate path
    #[arg(long)]
    slot: Option<u8>,
    /// NR sub-carrier spacing in kHz (0 = default)
    #[arg(long = "scs", default_value_t = 0)]
    scs_khz: u32,
    /// Carrier type to reload the channel filter with after configuring
    #[arg(long)]
    reconfigure: Option<CarrierType>,
    /// PRB grid offset used with --reconfigure
    #[arg(long, value_enum, default_value_t = PrbOffsetArg::Zero)]
    prb_offset: PrbOffsetArg,
    /// Apply the PRB offset as a frequency shift with --reconfigure
    #[arg(long)]
    freq_shift: bool,
    /// Leave the branches configured
    #[arg(long)]
    keep: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum PrbOffsetArg {
    Zero,
    PlusHalf,
    MinusHalf,
}

impl From<PrbOffsetArg> for PrbFreqOffset {
    fn from(arg: PrbOffsetArg) -> Self {
        match arg {
            PrbOffsetArg::Zero => PrbFreqOffset::Zero,
            PrbOffsetArg::PlusHalf => PrbFreqOffset::PlusHalfSubcarrier,
            PrbOffsetArg::MinusHalf => PrbFreqOffset::MinusHalfSubcarrier,
        }
    }
}

fn load_catalog(cfg: &ServerConfig) -> DynResult<Catalog> {
    let mut catalog = match cfg.catalog.path {
        Some(ref path) => {
            info!("Loading filter catalog from {}", path.display());
            Catalog::load_from_file(path)?
        }
        None => Catalog::builtin()?,
    };
    if let Some(khz) = cfg.catalog.attached_prb_bw_khz {
        catalog.set_attached_prb_bw_khz(Some(khz));
    }
    Ok(catalog)
}

fn build_service(
    cfg: &ServerConfig,
    antenna: &AntennaConfig,
    locator: Arc<BackendLocator>,
) -> DynResult<DigitalFilterService> {
    let sink: Arc<dyn ErrorSink> = Arc::new(TracingErrorSink);
    let service = DigitalFilterService::new(
        sink,
        locator,
        &antenna.common_data(&cfg.service),
        antenna.token(),
    )?;
    if !service.pre_initialize_service() || !service.post_initialize_service() {
        return Err(format!(
            "{} filter service failed to initialize",
            service.antenna_branch()
        )
        .into());
    }
    Ok(service)
}

fn run_check(cfg: &ServerConfig, source: Arc<dyn ConfigDataSource>) -> DynResult<()> {
    let planner = ChainPlanner::new(
        CoefficientLookup::new(source),
        cfg.service.filter.input_rate_hz,
    );
    let branch = [FilterBranchId(0)];
    let mut report = Vec::new();
    let mut failures = 0usize;

    for carrier in CarrierType::ALL {
        let spec = FilterSpec::new(carrier.standard(), carrier, &branch, None, 0)?;
        let direct = match planner.plan(&spec) {
            Ok(plan) => json!({
                "output_hz": plan.output_hz(),
                "stages": plan
                    .stages
                    .iter()
                    .map(|s| json!({
                        "stage": s.stage.to_string(),
                        "filter": s.coefficients.name(),
                        "input_hz": s.rate.input_hz,
                        "output_hz": s.rate.output_hz,
                    }))
                    .collect::<Vec<_>>(),
            }),
            Err(err) => {
                warn!("{}: {}", carrier, err);
                failures += 1;
                json!({ "error": err.to_string() })
            }
        };
        // Slot lengths whose transport rate this carrier can be converted to.
        let cpri_slots: Vec<u8> = CpriSlotLength::ALL
            .into_iter()
            .filter(|slot| {
                FilterSpec::new(carrier.standard(), carrier, &branch, Some(*slot), 0)
                    .and_then(|spec| planner.plan(&spec))
                    .is_ok()
            })
            .map(CpriSlotLength::get)
            .collect();
        report.push(json!({
            "carrier": carrier.to_string(),
            "direct": direct,
            "cpri_slots": cpri_slots,
        }));
    }

    println!("{}", serde_json::to_string_pretty(&report)?);
    if failures > 0 {
        return Err(format!("{failures} carrier types cannot be planned").into());
    }
    info!("All {} carrier types plan cleanly", CarrierType::ALL.len());
    Ok(())
}

fn print_snapshot(step: &str, service: &DigitalFilterService) -> DynResult<()> {
    let snapshot = json!({ "step": step, "service": service.snapshot() });
    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    Ok(())
}

fn run_cycle(
    cfg: &ServerConfig,
    locator: Arc<BackendLocator>,
    args: &CycleArgs,
) -> DynResult<()> {
    let antennas = cfg.resolved_antennas();
    let antenna = match args.antenna {
        Some(id) => antennas
            .iter()
            .find(|a| a.branch == id)
            .ok_or_else(|| format!("Antenna branch {} is not configured", id))?,
        None => antennas.first().ok_or("No antenna branch configured")?,
    };
    let service = build_service(cfg, antenna, locator)?;

    let branches: Vec<FilterBranchId> = if args.branches.is_empty() {
        service.filter_branches()
    } else {
        args.branches.iter().copied().map(FilterBranchId).collect()
    };
    let slot = args.slot.map(CpriSlotLength::new).transpose()?;

    info!(
        "Cycling {} on {} branches {:?}",
        args.carrier,
        service.antenna_branch(),
        branches.iter().map(|b| b.0).collect::<Vec<_>>()
    );
    if !service.configure_filter(
        args.carrier.standard(),
        args.carrier,
        &branches,
        slot,
        args.scs_khz,
    ) {
        print_snapshot("configure", &service)?;
        return Err(format!("Configuring {} failed", args.carrier).into());
    }
    print_snapshot("configure", &service)?;

    if let Some(carrier) = args.reconfigure {
        let ok = service.re_configure_channel_filter(
            carrier,
            args.prb_offset.into(),
            args.freq_shift,
            &branches,
            slot,
        );
        print_snapshot("reconfigure", &service)?;
        if !ok {
            warn!("Channel filter reload to {} failed", carrier);
        }
    }

    if args.keep {
        return Ok(());
    }
    if !service.release_filter(&branches) {
        print_snapshot("release", &service)?;
        return Err("Releasing filter branches failed".into());
    }
    print_snapshot("release", &service)
}

fn main() -> DynResult<()> {
    let mut context = RegistrationContext::new();
    register_builtin_backends_on(&mut context);

    let cli = Cli::parse();

    if cli.print_config {
        println!("{}", ServerConfig::example_combined_toml());
        return Ok(());
    }

    let (cfg, config_path) = ServerConfig::load(cli.config.as_deref())?;
    cfg.validate()
        .map_err(|e| format!("Invalid server configuration: {}", e))?;
    cfg.validate_backend(&context)
        .map_err(|e| format!("Invalid server configuration: {}", e))?;

    init_logging(cfg.general.log_level.as_deref());

    if let Some(ref path) = config_path {
        info!("Loaded configuration from {}", path.display());
    }

    let source: Arc<dyn ConfigDataSource> = Arc::new(load_catalog(&cfg)?);

    match cli.command {
        Some(Command::Check) => run_check(&cfg, source),
        Some(Command::Cycle(ref args)) => {
            let locator = Arc::new(BackendLocator::new(
                source,
                context,
                &cfg.backend.model,
                cfg.backend.options.clone(),
            )?);
            run_cycle(&cfg, locator, args)
        }
        None => {
            info!(
                "Starting rxf-server (backend: {}, antennas: {})",
                cfg.backend.model,
                cfg.resolved_antennas().len()
            );
            let locator = Arc::new(BackendLocator::new(
                source,
                context,
                &cfg.backend.model,
                cfg.backend.options.clone(),
            )?);
            let mut services = Vec::new();
            for antenna in cfg.resolved_antennas() {
                services.push(build_service(&cfg, &antenna, locator.clone())?);
            }
            let snapshots: Vec<_> = services
                .iter()
                .map(DigitalFilterService::snapshot)
                .collect();
            println!("{}", serde_json::to_string_pretty(&snapshots)?);
            Ok(())
        }
    }
}
