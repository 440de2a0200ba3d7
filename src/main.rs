use anyhow::Result;
use clap::Parser;
use motion_sentry_rs::calibration::Calibrator;
use motion_sentry_rs::config::{LinkMode, NodeConfig, SensorSource, ASSOCIATION_POLL_MS, STATUS_INTERVAL_SECS};
use motion_sentry_rs::detector::MotionDetector;
use motion_sentry_rs::indicator::{IndicatorController, IndicatorPin, LogPin, SysfsLed};
use motion_sentry_rs::network::{AnyLink, FixedLink, NetworkLink, NmcliLink, ProbeLink};
use motion_sentry_rs::notify::time_sync::local_offset;
use motion_sentry_rs::notify::{
    HttpEventLog, NotificationDispatcher, SntpClock, SystemClock, TextbeltGateway, WallClock,
};
use motion_sentry_rs::scheduler::{LoopTiming, Scheduler};
use motion_sentry_rs::sensors::{
    probe, AccelerationSource, SimulatedAccelerometer, TermuxAccelerometer,
};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "motion_sentry")]
#[command(about = "Accelerometer motion sentry: SMS alert + event log per motion episode", long_about = None)]
struct Args {
    /// JSON config file overriding the built-in defaults
    #[arg(long)]
    config: Option<PathBuf>,

    /// Duration in seconds (0 = continuous)
    #[arg(long, value_name = "SECONDS", default_value = "0")]
    duration: u64,

    /// Accelerometer backend (overrides the config file)
    #[arg(long, value_enum)]
    sensor: Option<SensorSource>,

    /// Write a JSON status snapshot here every few seconds
    #[arg(long)]
    status_file: Option<PathBuf>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => NodeConfig::load(path)?,
        None => NodeConfig::default(),
    };
    if let Some(source) = args.sensor {
        config.sensor.source = source;
    }
    if args.status_file.is_some() {
        config.status_file = args.status_file.clone();
    }

    // Sensor reachability: nothing else is initialised if this fails
    let mut sensor = build_sensor(&config);
    if let Err(e) = probe(&mut sensor) {
        log::error!("Could not connect to accelerometer: {}", e);
        return halt().await;
    }
    log::info!("Accelerometer initialized ({:?})", config.sensor.source);

    let detection = &config.detection;
    let calibrator = Calibrator::new(
        detection.calibration_samples,
        detection.calibration_interval(),
        detection.sensitivity,
    );
    let profile = match calibrator.calibrate(&mut sensor).await {
        Ok(profile) => profile,
        Err(e) => {
            log::error!("Calibration failed: {}", e);
            return halt().await;
        }
    };

    let mut link = build_link(&config);
    let limit = Duration::from_millis(config.network.association_timeout_ms);
    let link_up = match link
        .associate(limit, Duration::from_millis(ASSOCIATION_POLL_MS))
        .await
    {
        Ok(()) => true,
        Err(e) => {
            log::warn!("Failed to connect to network: {}", e);
            false
        }
    };

    let offset = local_offset(
        config.time_sync.gmt_offset_secs,
        config.time_sync.daylight_offset_secs,
    );
    let clock = if config.time_sync.uses_host_clock() {
        WallClock::System(SystemClock::new(offset))
    } else {
        WallClock::Sntp(SntpClock::new(
            &config.time_sync.server,
            offset,
            Duration::from_millis(config.time_sync.timeout_ms),
        ))
    };

    let http_timeout = Duration::from_millis(config.event_log.timeout_ms);
    let sms = TextbeltGateway::new(
        &config.sms.url,
        &config.sms.phone,
        &config.sms.key,
        http_timeout,
    );
    let event_log = HttpEventLog::new(&config.event_log.url, http_timeout);
    log::info!("Motion records go to {}", event_log.url());
    let dispatcher = NotificationDispatcher::new(sms, event_log, clock, link, &config.sms.message);

    let dwell = detection.dwell();
    let indicator = IndicatorController::new(build_pin(&config), dwell);
    let timing = LoopTiming {
        poll_interval: detection.poll_interval(),
        guard_delay: detection.guard_delay(),
        status_interval: Duration::from_secs(STATUS_INTERVAL_SECS),
    };

    let mut scheduler = Scheduler::new(
        sensor,
        MotionDetector::new(profile, dwell),
        indicator,
        dispatcher,
        timing,
    );
    if let Some(path) = config.status_file.clone() {
        scheduler = scheduler.with_status_file(path);
    }
    scheduler.set_link_up(link_up);

    let limit = (args.duration > 0).then(|| Duration::from_secs(args.duration));
    scheduler.run(limit).await;
    Ok(())
}

fn build_sensor(config: &NodeConfig) -> Box<dyn AccelerationSource> {
    match config.sensor.source {
        SensorSource::Termux => Box::new(TermuxAccelerometer::new()),
        SensorSource::Simulated => {
            let every = Duration::from_secs(config.sensor.knock_every_secs);
            Box::new(SimulatedAccelerometer::new(Some(every)))
        }
    }
}

fn build_link(config: &NodeConfig) -> AnyLink {
    let net = &config.network;
    match net.mode {
        LinkMode::Nmcli => AnyLink::Nmcli(NmcliLink::new(&net.ssid, &net.password)),
        LinkMode::Probe => AnyLink::Probe(ProbeLink::new(
            &net.probe_addr,
            Duration::from_millis(net.probe_timeout_ms),
        )),
        LinkMode::Static => AnyLink::Fixed(FixedLink::up()),
    }
}

fn build_pin(config: &NodeConfig) -> Box<dyn IndicatorPin> {
    match &config.indicator.led {
        Some(name) => Box::new(SysfsLed::new(name)),
        None => Box::new(LogPin),
    }
}

/// Fatal startup failure: stay parked without retrying, like a halted board
async fn halt() -> Result<()> {
    log::error!("Startup failed, node halted");
    std::future::pending::<()>().await;
    Ok(())
}
