mod config;
#[cfg(not(target_os = "espidf"))]
mod console;
#[cfg(target_os = "espidf")]
mod device;
#[cfg(not(target_os = "espidf"))]
mod sim;
#[cfg(not(target_os = "espidf"))]
mod storage;

#[cfg(target_os = "espidf")]
fn main() -> anyhow::Result<()> {
    // Required for ESP-IDF patches
    esp_idf_svc::sys::link_patches();
    esp_idf_svc::log::EspLogger::initialize_default();

    let config = config::Config::load(std::path::Path::new(device::CONFIG_PATH))?;
    device::run(config)
}

#[cfg(not(target_os = "espidf"))]
fn main() -> anyhow::Result<()> {
    host::run()
}

#[cfg(not(target_os = "espidf"))]
mod host {
    use crate::config::{Config, DEFAULT_CONFIG_PATH};
    use crate::console::{self, Command, HELP};
    use crate::sim::{SimRig, StdDelay};
    use crate::storage::FileStorage;
    use anyhow::anyhow;
    use clock::{Clock, GeoConfig, SystemTimeSource};
    use log::*;
    use motion::{ControlLoop, LoopAction, Orientation, SystemMonotonic, Tracker};
    use signal_hook::consts::{SIGINT, SIGTERM};
    use std::collections::VecDeque;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::mpsc::{self, Receiver};
    use std::sync::Arc;
    use std::thread;
    use std::time::{Duration, Instant};

    type HostLoop = ControlLoop<SimRig, SimRig, FileStorage, SystemTimeSource, SystemMonotonic>;

    // Spot used by the simulator until the sun position is known.
    const DEFAULT_SPOT: Orientation = Orientation::new(120, 60);

    struct Args {
        config: PathBuf,
        ticks: Option<u64>,
        tick_ms: u64,
    }

    fn print_help() {
        println!(
            r#"suntracker - two-axis solar tracker (host simulator)

USAGE:
  suntracker [--config <path>] [--ticks <n>] [--tick-ms <ms>]

OPTIONS:
  --config <path>   Configuration file (default: config.toml)
  --ticks <n>       Stop after n loop iterations
  --tick-ms <ms>    Loop period in milliseconds (default: 20)
  -h, --help        Show this help

Type "help" at runtime for console commands."#
        );
    }

    fn parse_args() -> anyhow::Result<Option<Args>> {
        let mut pargs = pico_args::Arguments::from_env();
        if pargs.contains(["-h", "--help"]) {
            print_help();
            return Ok(None);
        }

        let args = Args {
            config: pargs
                .opt_value_from_str("--config")?
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH)),
            ticks: pargs.opt_value_from_str("--ticks")?,
            tick_ms: pargs.opt_value_from_str("--tick-ms")?.unwrap_or(20),
        };

        let rest = pargs.finish();
        if !rest.is_empty() {
            return Err(anyhow!("unexpected arguments: {:?}", rest));
        }
        Ok(Some(args))
    }

    fn init_logging() {
        env_logger::Builder::new()
            .filter_level(LevelFilter::Debug)
            .parse_default_env()
            .init();
        // The "debug" console command raises this again at runtime.
        if std::env::var_os("RUST_LOG").is_none() {
            log::set_max_level(LevelFilter::Info);
        }
    }

    pub fn run() -> anyhow::Result<()> {
        init_logging();
        let Some(args) = parse_args()? else {
            return Ok(());
        };

        let config = Config::load(&args.config)?;
        info!(
            "Tracker id: {}, Lat: {}, Lon: {}, Alt: {}",
            config.get_tracker_id(),
            config.get_latitude(),
            config.get_longitude(),
            config.get_altitude()
        );

        let storage = FileStorage::open(config.get_data_dir());
        let rig = SimRig::new(DEFAULT_SPOT);
        let tracker = Tracker::new(config.tracker.clone(), rig.clone(), rig.clone(), storage);
        let clock = Clock::new(SystemTimeSource, config.location);
        let mut ctl: HostLoop = ControlLoop::new(tracker, clock, SystemMonotonic::new());

        let term = Arc::new(AtomicBool::new(false));
        signal_hook::flag::register(SIGINT, Arc::clone(&term))?;
        signal_hook::flag::register(SIGTERM, Arc::clone(&term))?;

        let (tx, rx) = mpsc::channel();
        console::spawn_reader(tx)?;
        let mut operator = Operator {
            config_path: args.config.clone(),
            config,
            rx,
            queue: VecDeque::new(),
            delay: StdDelay,
        };
        let mut iterations: u64 = 0;

        while !term.load(Ordering::Relaxed) {
            let started = Instant::now();

            rig.follow(&ctl.tracker().sun_target());
            if ctl.iterate() == LoopAction::Restart {
                error!("Watchdog requested a restart");
                return Err(anyhow!("watchdog restart"));
            }
            operator.pump(&mut ctl);

            iterations += 1;
            if args.ticks.is_some_and(|n| iterations >= n) {
                break;
            }
            debug!("Loop iteration took {:?}", started.elapsed());
            thread::sleep(Duration::from_millis(args.tick_ms));
        }

        let pose = ctl.tracker().orientation();
        info!(
            "Shutting down in {} at yaw={} tilt={}",
            ctl.tracker().state(),
            pose.yaw,
            pose.tilt
        );
        Ok(())
    }

    /// Console commands waiting to run between loop iterations.
    struct Operator {
        config: Config,
        config_path: PathBuf,
        rx: Receiver<Command>,
        queue: VecDeque<Command>,
        delay: StdDelay,
    }

    impl Operator {
        fn pump(&mut self, ctl: &mut HostLoop) {
            self.queue.extend(self.rx.try_iter());
            while let Some(command) = self.queue.pop_front() {
                if let Err(e) = self.handle(ctl, command) {
                    warn!("Command failed: {:#}", e);
                }
                ctl.mark_alive();
            }
        }

        fn handle(&mut self, ctl: &mut HostLoop, command: Command) -> anyhow::Result<()> {
            match command {
                Command::Status => {
                    println!("{}", serde_json::to_string_pretty(&ctl.status())?);
                }
                Command::Rain(stop) => {
                    ctl.stop_flag().set(stop);
                    println!("ok: rain {}", if stop { 1 } else { 0 });
                }
                Command::Calibrate => {
                    // Commands typed during the sweep run after it.
                    let rx = &self.rx;
                    let queue = &mut self.queue;
                    let result = ctl.calibrate(&mut self.delay, &mut || queue.extend(rx.try_iter()));
                    println!("{}", serde_json::to_string(&result)?);
                }
                Command::Geo {
                    latitude,
                    longitude,
                } => {
                    let geo = GeoConfig {
                        latitude,
                        longitude,
                        ..*ctl.clock().geo()
                    };
                    ctl.set_geo(geo);
                    self.config.location = geo;
                    self.config.save(&self.config_path)?;
                    println!("ok: lat {:.6} lon {:.6}", latitude, longitude);
                }
                Command::Debug(on) => {
                    log::set_max_level(if on {
                        LevelFilter::Debug
                    } else {
                        LevelFilter::Info
                    });
                    println!("ok: debug {}", if on { "on" } else { "off" });
                }
                Command::History => {
                    let ring = ctl.tracker().history().ring();
                    if ring.is_empty() {
                        println!("no history yet");
                    }
                    for (i, o) in ring.oldest_first().enumerate() {
                        println!("{:2}: yaw={} tilt={}", i, o.yaw, o.tilt);
                    }
                }
                Command::Help => println!("{}", HELP),
            }
            Ok(())
        }
    }
}
