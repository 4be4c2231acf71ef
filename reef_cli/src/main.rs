#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! `reefdose` binary: wires the hardware-agnostic core to the host
//! (state file, wall clock, pump outputs, stdin command feed).

mod cli;
mod wire;

use clap::Parser;
use cli::{Cli, Commands, FILE_GUARD, JSON_MODE};
use crossbeam_channel::Receiver;
use eyre::{Result, WrapErr};
use reef_config::Config;
use reef_core::{Command, Controller, DoseScheduleCfg, DosingPlan, SlotTable, command_channel};
use reef_hardware::{LogAlertSink, SystemWallClock, TomlStore};
use reef_traits::{Pump, PumpDriver, WallTime};
use std::io::BufRead;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// BCM pin per pump head (kalk, afr, mg, aux) on relay builds.
#[cfg(feature = "hardware")]
const RELAY_PINS: [u8; Pump::COUNT] = [17, 27, 22, 23];

fn main() -> Result<()> {
    color_eyre::install()?;
    let args = Cli::parse();
    let _ = JSON_MODE.set(args.json);

    let cfg = load_config(&args)?;
    init_logging(&args, &cfg)?;

    match &args.cmd {
        Commands::Run { tick_ms } => run(&args, cfg, *tick_ms),
        Commands::Plan {
            prev,
            cur,
            gap_days,
            plan,
        } => plan_once(&cfg, prev, cur, *gap_days, plan.as_deref()),
        Commands::Schedule {
            start_hour,
            end_hour,
            every_minutes,
        } => {
            print_schedule(*start_hour, *end_hour, *every_minutes);
            Ok(())
        }
        Commands::SelfCheck => self_check(&args),
    }
}

fn load_config(args: &Cli) -> Result<Config> {
    let cfg = if args.config.exists() {
        let text = std::fs::read_to_string(&args.config)
            .wrap_err_with(|| format!("read config {:?}", args.config))?;
        reef_config::load_toml(&text)
            .wrap_err_with(|| format!("parse config {:?}", args.config))?
    } else {
        Config::default()
    };
    cfg.validate()?;
    Ok(cfg)
}

fn init_logging(args: &Cli, cfg: &Config) -> Result<()> {
    use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

    let level = args.log_level.as_str();
    let filter = EnvFilter::try_new(level).wrap_err_with(|| format!("bad log level {level:?}"))?;

    let mut layers = Vec::new();
    let console = if args.json {
        tracing_subscriber::fmt::layer().json().boxed()
    } else {
        tracing_subscriber::fmt::layer().with_target(false).boxed()
    };
    layers.push(console);

    if let Some(path) = &cfg.logging.file {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .wrap_err_with(|| format!("open log file {path:?}"))?;
        let (writer, guard) = tracing_appender::non_blocking(file);
        let _ = FILE_GUARD.set(guard);
        layers.push(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(writer)
                .with_ansi(false)
                .boxed(),
        );
    }

    tracing_subscriber::registry().with(layers).with(filter).init();
    Ok(())
}

fn run(args: &Cli, cfg: Config, tick_ms: u64) -> Result<()> {
    let store = TomlStore::open(&args.state)
        .wrap_err_with(|| format!("open state file {:?}", args.state))?;
    let (tx, rx) = command_channel();

    // Calibration CSV rows enter through the command feed like any other
    // flow update, so the same banding applies.
    if let Some(path) = &args.calibration {
        for (pump, ml_per_min) in reef_config::load_flow_csv(path)? {
            tx.send(Command::SetFlow { pump, ml_per_min })
                .map_err(|_| eyre::eyre!("command channel closed"))?;
        }
    }

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let shutdown = Arc::clone(&shutdown);
        ctrlc::set_handler(move || shutdown.store(true, Ordering::SeqCst))
            .wrap_err("install signal handler")?;
    }

    {
        let tx = tx.clone();
        std::thread::spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                let Ok(line) = line else { break };
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                match wire::parse_line(line) {
                    Ok(cmd) => {
                        if tx.send(cmd).is_err() {
                            break;
                        }
                    }
                    Err(e) => tracing::warn!(error = %e, "ignoring malformed command line"),
                }
            }
        });
    }

    #[cfg(feature = "hardware")]
    let pumps = reef_hardware::RelayPumps::new(RELAY_PINS)?;
    #[cfg(not(feature = "hardware"))]
    let pumps = reef_hardware::SimulatedPump::new();

    run_loop(pumps, store, cfg, rx, &shutdown, tick_ms)
}

fn run_loop<P: PumpDriver>(
    pumps: P,
    store: TomlStore,
    cfg: Config,
    rx: Receiver<Command>,
    shutdown: &AtomicBool,
    tick_ms: u64,
) -> Result<()> {
    let mut ctl = Controller::new(pumps, store, SystemWallClock, LogAlertSink, cfg, rx)?;
    tracing::info!(tick_ms, "dosing controller started");
    while !shutdown.load(Ordering::SeqCst) {
        if let Err(e) = ctl.tick() {
            tracing::error!(error = %e, "tick failed; retrying next interval");
        }
        std::thread::sleep(Duration::from_millis(tick_ms));
    }
    ctl.shutdown();
    tracing::info!("dosing controller stopped");
    Ok(())
}

/// Parse "ca,alk,mg,ph" into a test point at the given instant.
fn parse_test(s: &str, at: WallTime) -> Result<reef_core::TestPoint> {
    let parts: Vec<f32> = s
        .split(',')
        .map(|p| p.trim().parse::<f32>())
        .collect::<std::result::Result<_, _>>()
        .wrap_err_with(|| format!("expected ca,alk,mg,ph got {s:?}"))?;
    let [ca, alk, mg, ph] = parts[..] else {
        eyre::bail!("expected exactly 4 values (ca,alk,mg,ph), got {}", parts.len());
    };
    Ok(reef_core::planner::test_point(at, ca, alk, mg, ph, None))
}

fn parse_plan(s: &str) -> Result<DosingPlan> {
    let parts: Vec<f32> = s
        .split(',')
        .map(|p| p.trim().parse::<f32>())
        .collect::<std::result::Result<_, _>>()
        .wrap_err_with(|| format!("expected kalk,afr,mg,aux got {s:?}"))?;
    let [kalk, afr, mg, aux] = parts[..] else {
        eyre::bail!("expected exactly 4 ml/day values, got {}", parts.len());
    };
    let mut plan = DosingPlan::zero();
    plan.set(Pump::Kalk, kalk);
    plan.set(Pump::Afr, afr);
    plan.set(Pump::Mg, mg);
    plan.set(Pump::Aux, aux);
    Ok(plan)
}

fn plan_once(cfg: &Config, prev: &str, cur: &str, gap_days: f32, plan: Option<&str>) -> Result<()> {
    if !(gap_days.is_finite() && gap_days > 0.0) {
        eyre::bail!("gap-days must be > 0");
    }
    let t0 = WallTime::from_unix(0);
    let t1 = WallTime::from_unix((gap_days * WallTime::SECS_PER_DAY as f32) as u64);
    let prev = parse_test(prev, t0)?;
    let cur = parse_test(cur, t1)?;

    let mut plan = match plan {
        Some(s) => parse_plan(s)?,
        None => DosingPlan::defaults(),
    };
    let coeffs = reef_core::ChemistryCoefficients::for_tank(
        &cfg.chemistry,
        cfg.tank.reference_gallons,
        cfg.tank.gallons,
    );
    let outcome = reef_core::apply_test(
        Some(&prev),
        &cur,
        &mut plan,
        &coeffs,
        &cfg.targets,
        &cfg.planner,
        &cfg.safety,
    );
    let scaled = reef_core::enforce_ceilings(&mut plan, &coeffs, &cfg.safety);

    if JSON_MODE.get() == Some(&true) {
        let out = serde_json::json!({
            "outcome": format!("{outcome:?}"),
            "governor_scale": scaled,
            "ml_day": {
                "kalk": plan.get(Pump::Kalk),
                "afr": plan.get(Pump::Afr),
                "mg": plan.get(Pump::Mg),
                "aux": plan.get(Pump::Aux),
            },
        });
        println!("{out}");
    } else {
        println!("outcome: {outcome:?}");
        if let Some(s) = scaled {
            println!("governor scaled plan by {s:.3}");
        }
        for (pump, ml) in plan.iter() {
            println!("{pump}: {ml:.1} ml/day");
        }
    }
    Ok(())
}

fn print_schedule(start_hour: u8, end_hour: u8, every_minutes: u16) {
    let cfg = DoseScheduleCfg {
        enabled: true,
        start_hour,
        end_hour,
        every_minutes,
    };
    let table = SlotTable::build(&cfg);
    if JSON_MODE.get() == Some(&true) {
        let slots: Vec<String> = (0..table.len())
            .map(|i| {
                let (h, m) = table.slot_time(i);
                format!("{h:02}:{m:02}")
            })
            .collect();
        let out = serde_json::json!({ "slots": slots });
        println!("{out}");
    } else {
        for i in 0..table.len() {
            let (h, m) = table.slot_time(i);
            println!("slot {i}: {h:02}:{m:02}");
        }
    }
}

fn self_check(args: &Cli) -> Result<()> {
    // Config already loaded and validated before dispatch.
    let _ = TomlStore::open(&args.state)
        .wrap_err_with(|| format!("state file {:?} unreadable", args.state))?;
    println!("ok");
    Ok(())
}
