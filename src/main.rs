mod capture;
mod config;
mod predict;
mod radio;
mod rotator;
mod serial;
mod tracker;

use clap::{Args, Parser, Subcommand};
use std::error::Error;
use std::fs::File;
use std::io::{self, BufRead, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Sender};
use std::sync::Arc;
use std::thread;

use chrono::Utc;

use crate::capture::{AudioSource, CaptureWorker};
use crate::config::{CaptureConfig, Config, RadioConfig, RotatorConfig};
use crate::predict::{
    find_passes, orbital_lifetime, Catalog, Ephemeris, GroundStation, PassCriteria, Satellite,
    SearchOptions, SortOrder, StatusTable, DEFAULT_MIN_ALTITUDE_KM,
};
use crate::radio::Transceiver;
use crate::rotator::{Position, Rotator};
use crate::tracker::{Controller, OperatorCommand, TrackerError};

type CliResult = Result<(), Box<dyn Error>>;

#[derive(Parser)]
#[command(name = "groundtrack")]
#[command(about = "Satellite pass prediction and antenna/radio tracking")]
struct Cli {
    /// YAML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Track a satellite by name prefix, or the `next` or `best` pass
    Track(TrackArgs),
    /// List upcoming passes
    Passes(PassesArgs),
    /// Estimate the years a satellite stays above a minimum altitude
    Lifetime(LifetimeArgs),
}

#[derive(Args)]
struct SiteArgs {
    /// Station latitude in degrees
    #[arg(long, allow_negative_numbers = true)]
    lat: Option<f64>,
    /// Station longitude in degrees, east positive
    #[arg(long, allow_negative_numbers = true)]
    lon: Option<f64>,
    /// Station altitude in metres
    #[arg(long, allow_negative_numbers = true)]
    alt: Option<f64>,
    /// TLE catalog file
    #[arg(long)]
    tle: Option<PathBuf>,
}

impl SiteArgs {
    fn apply(&self, config: &mut Config) -> Result<(), config::ConfigError> {
        let station = &mut config.station;
        station.override_position(self.lat, self.lon)?;
        if let Some(alt) = self.alt {
            station.altitude_m = alt;
        }
        if let Some(tle) = &self.tle {
            config.catalog.tle_path = tle.clone();
        }
        Ok(())
    }
}

#[derive(Args)]
struct FilterArgs {
    /// Regular expression satellite names must match
    #[arg(long)]
    pattern: Option<String>,
    /// Match the pattern case-insensitively
    #[arg(short = 'i', long)]
    ignore_case: bool,
    /// Skip large constellations (Starlink, OneWeb, ...)
    #[arg(long)]
    no_constellations: bool,
    #[arg(long)]
    min_elevation: Option<f64>,
    #[arg(long)]
    max_elevation: Option<f64>,
    #[arg(long)]
    min_altitude: Option<f64>,
    #[arg(long)]
    max_altitude: Option<f64>,
    /// Ignore passes rising sooner than this many minutes
    #[arg(long)]
    min_minutes: Option<f64>,
    /// Search window in minutes
    #[arg(long)]
    max_minutes: Option<f64>,
}

impl FilterArgs {
    fn apply(&self, criteria: &mut PassCriteria) {
        if let Some(pattern) = &self.pattern {
            criteria.pattern = Some(pattern.clone());
        }
        criteria.ignore_case |= self.ignore_case;
        if self.no_constellations {
            criteria.with_constellations = false;
        }
        for (value, field) in [
            (self.min_elevation, &mut criteria.min_elevation_deg),
            (self.max_elevation, &mut criteria.max_elevation_deg),
            (self.min_altitude, &mut criteria.min_altitude_km),
            (self.max_altitude, &mut criteria.max_altitude_km),
            (self.min_minutes, &mut criteria.min_minutes),
            (self.max_minutes, &mut criteria.max_minutes),
        ] {
            if let Some(value) = value {
                *field = value;
            }
        }
    }
}

#[derive(Args)]
struct TrackArgs {
    /// Satellite name prefix, `next` or `best`
    target: String,
    #[command(flatten)]
    site: SiteArgs,
    #[command(flatten)]
    filter: FilterArgs,
    /// Nominal uplink frequency, e.g. "145.990 MHz"
    #[arg(long)]
    uplink: Option<String>,
    /// Nominal downlink frequency, e.g. "437.800 MHz"
    #[arg(long)]
    downlink: Option<String>,
    /// Minutes before rise to start preparing
    #[arg(long)]
    prep: Option<f64>,
    /// Doppler retune resolution in Hz
    #[arg(long)]
    resolution: Option<f64>,
    #[arg(long)]
    az_threshold: Option<f64>,
    #[arg(long)]
    el_threshold: Option<f64>,
    /// Rotator serial device
    #[arg(long)]
    rotator: Option<String>,
    #[arg(long)]
    rotator_baud: Option<u32>,
    /// Radio serial device
    #[arg(long)]
    radio: Option<String>,
    #[arg(long)]
    radio_baud: Option<u32>,
    #[arg(long)]
    no_rotator: bool,
    #[arg(long)]
    no_radio: bool,
    /// Record raw audio to FILE while tracking
    #[arg(long, value_name = "FILE")]
    record: Option<PathBuf>,
}

impl TrackArgs {
    fn apply(&self, config: &mut Config) -> Result<(), config::ConfigError> {
        self.site.apply(config)?;
        self.filter.apply(&mut config.search);

        if self.uplink.is_some() {
            config.frequencies.uplink = self.uplink.clone();
        }
        if self.downlink.is_some() {
            config.frequencies.downlink = self.downlink.clone();
        }
        let tracking = &mut config.tracking;
        if let Some(prep) = self.prep {
            tracking.prep_minutes = prep;
        }
        if let Some(resolution) = self.resolution {
            tracking.doppler_resolution_hz = resolution;
        }
        if let Some(threshold) = self.az_threshold {
            tracking.azimuth_threshold_deg = threshold;
        }
        if let Some(threshold) = self.el_threshold {
            tracking.elevation_threshold_deg = threshold;
        }

        if let Some(device) = &self.rotator {
            config.rotator.device = device.clone();
            config.rotator.enabled = true;
        }
        if let Some(baud) = self.rotator_baud {
            config.rotator.baud_rate = baud;
        }
        if let Some(device) = &self.radio {
            config.radio.device = device.clone();
            config.radio.enabled = true;
        }
        if let Some(baud) = self.radio_baud {
            config.radio.baud_rate = baud;
        }
        config.rotator.enabled &= !self.no_rotator;
        config.radio.enabled &= !self.no_radio;
        Ok(())
    }
}

#[derive(Args)]
struct PassesArgs {
    #[command(flatten)]
    site: SiteArgs,
    #[command(flatten)]
    filter: FilterArgs,
    /// Every pass in the window, not just the first per satellite
    #[arg(long)]
    all: bool,
    /// Latest first
    #[arg(long)]
    reverse: bool,
    #[arg(long)]
    max_passes: Option<usize>,
    /// Print JSON instead of a table
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct LifetimeArgs {
    /// Satellite name prefix
    name: String,
    max_years: f64,
    #[command(flatten)]
    site: SiteArgs,
    /// Propagation step in minutes
    #[arg(long, default_value_t = 1.0)]
    step: f64,
    #[arg(long, default_value_t = DEFAULT_MIN_ALTITUDE_KM)]
    min_altitude: f64,
    /// Write `years altitude_km` samples to FILE
    #[arg(long, value_name = "FILE")]
    samples: Option<PathBuf>,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Track(args) => track(cli.config.as_deref(), &args),
        Commands::Passes(args) => passes(cli.config.as_deref(), &args),
        Commands::Lifetime(args) => lifetime(cli.config.as_deref(), &args),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<Config, config::ConfigError> {
    match path {
        Some(path) => Config::from_file(path),
        None => Ok(Config::default()),
    }
}

fn load_catalog(path: &Path) -> Result<Catalog, Box<dyn Error>> {
    let catalog = Catalog::load(path)?;
    if catalog.is_empty() {
        return Err(format!("no element sets in {}", path.display()).into());
    }
    Ok(catalog)
}

fn track(config_path: Option<&Path>, args: &TrackArgs) -> CliResult {
    let mut config = load_config(config_path)?;
    args.apply(&mut config)?;
    config.validate()?;

    let station = config.station.ground_station()?;
    let catalog = load_catalog(&config.catalog.tle_path)?;
    let satellite = select_satellite(&catalog, &station, &config.search, &args.target)?;
    log::info!("Target {} (NORAD {})", satellite.name(), satellite.norad_id());

    let mut settings = config.tracker_settings()?;
    if let Some(path) = &config.catalog.status_path {
        let table = StatusTable::load(path)?;
        if let Some(entry) = table.lookup(satellite.name()) {
            log::info!(
                "{}: {} {} ({})",
                entry.name,
                entry.mode,
                entry.callsign,
                entry.status
            );
            if let Some(beacon) = entry.beacon_hz() {
                log::info!("{}: beacon {:.3} MHz", entry.name, beacon / 1e6);
            }
            settings.uplink_hz = settings.uplink_hz.or_else(|| entry.uplink_hz());
            settings.downlink_hz = settings.downlink_hz.or_else(|| entry.downlink_hz());
        }
    }
    if settings.uplink_hz.is_none() && settings.downlink_hz.is_none() {
        log::warn!("No frequencies for {}; Doppler correction off", satellite.name());
    }

    let rotator = open_rotator(&config.rotator)?;
    let radio = open_radio(&config.radio)?;

    let running = Arc::new(AtomicBool::new(true));
    let interrupted = running.clone();
    ctrlc::set_handler(move || {
        log::info!("Interrupted");
        interrupted.store(false, Ordering::SeqCst);
    })?;
    let (commands, queue) = mpsc::channel();
    spawn_operator_input(commands, running.clone());

    let mut controller =
        Controller::new(satellite, station, settings, rotator, radio).with_commands(queue);
    if let Some(path) = &args.record {
        controller = controller.with_capture(start_capture(&config.capture, path)?);
    }

    controller.run(&running);
    Ok(())
}

fn select_satellite(
    catalog: &Catalog,
    station: &GroundStation,
    criteria: &PassCriteria,
    target: &str,
) -> Result<Satellite, Box<dyn Error>> {
    let pick_best = match target {
        "next" => false,
        "best" => true,
        name => return Ok(catalog.find(name)?),
    };

    let options = SearchOptions::new(Utc::now(), criteria);
    let search = find_passes(catalog.satellites(), station, criteria, &options)?;
    let pass = if pick_best {
        search.best()
    } else {
        search.soonest()
    }
    .ok_or("no pass matches the search filters")?;

    log::info!(
        "Selected {}: rises in {:.1} min at az {:.0}, max el {:.1}",
        pass.satellite,
        pass.minutes_away,
        pass.rise_azimuth_deg,
        pass.max_elevation_deg
    );
    match catalog.records().iter().find(|r| r.name == pass.satellite) {
        Some(record) => Ok(record.satellite()?),
        None => Ok(catalog.find(&pass.satellite)?),
    }
}

fn open_rotator(config: &RotatorConfig) -> Result<Option<Box<dyn Rotator>>, TrackerError> {
    if !config.enabled {
        return Ok(None);
    }
    match rotator::connect(&config.device, config.baud_rate, config.timeout, config.set_responds) {
        Ok(link) => {
            let link: Box<dyn Rotator> = Box::new(link);
            Ok(Some(link))
        }
        Err(e) if config.required => Err(e.into()),
        Err(e) => {
            log::warn!("{}", e);
            Ok(None)
        }
    }
}

fn open_radio(config: &RadioConfig) -> Result<Option<Box<dyn Transceiver>>, TrackerError> {
    if !config.enabled {
        return Ok(None);
    }
    match radio::connect(&config.device, config.baud_rate, config.timeout) {
        Ok(mut link) => {
            if let Err(e) = link.prepare(config.mode, config.filter, config.waterfall) {
                if config.required {
                    return Err(e.into());
                }
                log::warn!("Radio setup: {}", e);
            }
            let link: Box<dyn Transceiver> = Box::new(link);
            Ok(Some(link))
        }
        Err(e) if config.required => Err(e.into()),
        Err(e) => {
            log::warn!("{}", e);
            Ok(None)
        }
    }
}

fn start_capture(config: &CaptureConfig, path: &Path) -> Result<CaptureWorker, TrackerError> {
    let source = AudioSource::arecord(&config.device, config.rate_hz, config.channels)?;
    Ok(CaptureWorker::start(source, path)?)
}

#[derive(Debug, PartialEq)]
enum OperatorInput {
    Command(OperatorCommand),
    Quit,
}

fn parse_operator_input(line: &str) -> Option<OperatorInput> {
    let mut words = line.split_whitespace();
    let command = match words.next()? {
        "u" => OperatorCommand::Unlock,
        "s" => OperatorCommand::StartTracking,
        "x" => OperatorCommand::StopTracking,
        "h" => OperatorCommand::ResetHome,
        "a" => OperatorCommand::ToggleAuxiliary,
        "r" => OperatorCommand::Unpin,
        "q" => return Some(OperatorInput::Quit),
        "p" => {
            let azimuth: f64 = words.next()?.parse().ok()?;
            let elevation: f64 = words.next()?.parse().ok()?;
            match Position::new(azimuth, elevation).checked() {
                Ok(position) => OperatorCommand::Pin(position),
                Err(e) => {
                    log::warn!("{}", e);
                    return None;
                }
            }
        }
        _ => return None,
    };
    Some(OperatorInput::Command(command))
}

/// Reads operator keys from stdin. `q` clears `running`; end of input only
/// ends the reader, so tracking carries on until interrupted.
fn spawn_operator_input(commands: Sender<OperatorCommand>, running: Arc<AtomicBool>) {
    thread::spawn(move || read_operator_input(io::stdin().lock(), &commands, &running));
}

fn read_operator_input<R: BufRead>(
    input: R,
    commands: &Sender<OperatorCommand>,
    running: &AtomicBool,
) {
    for line in input.lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                log::warn!("Operator input: {}", e);
                return;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        match parse_operator_input(&line) {
            Some(OperatorInput::Command(command)) => {
                if commands.send(command).is_err() {
                    return;
                }
            }
            Some(OperatorInput::Quit) => {
                running.store(false, Ordering::SeqCst);
                return;
            }
            None => log::warn!("Unknown input {:?} (u s x h a p AZ EL r q)", line.trim()),
        }
    }
    log::info!("Operator input closed");
}

fn passes(config_path: Option<&Path>, args: &PassesArgs) -> CliResult {
    let mut config = load_config(config_path)?;
    args.site.apply(&mut config)?;
    args.filter.apply(&mut config.search);
    config.validate()?;

    let station = config.station.ground_station()?;
    let catalog = load_catalog(&config.catalog.tle_path)?;

    let mut options = SearchOptions::new(Utc::now(), &config.search);
    options.find_all = args.all;
    if args.reverse {
        options.order = SortOrder::LatestFirst;
    }

    let mut search = find_passes(catalog.satellites(), &station, &config.search, &options)?;
    if let Some(max) = args.max_passes {
        search.passes.truncate(max);
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&search.passes)?);
        return Ok(());
    }

    println!(
        "{} satellites scanned, {} in the altitude band, {} passes",
        search.scanned,
        search.checked,
        search.passes.len()
    );
    for pass in &search.passes {
        println!(
            "{:<24} {:>7.1} min  {}  max el {:>4.1}  rise az {:>5.1}  {:>5.1} min  {:>6.0} km",
            pass.satellite,
            pass.minutes_away,
            pass.rise_time.format("%Y-%m-%d %H:%M:%S"),
            pass.max_elevation_deg,
            pass.rise_azimuth_deg,
            pass.duration_minutes,
            pass.max_altitude_km
        );
    }
    Ok(())
}

fn lifetime(config_path: Option<&Path>, args: &LifetimeArgs) -> CliResult {
    let mut config = load_config(config_path)?;
    args.site.apply(&mut config)?;
    config.validate()?;

    let station = config.station.ground_station()?;
    let catalog = load_catalog(&config.catalog.tle_path)?;
    let satellite = catalog.find(&args.name)?;

    let mut samples = args
        .samples
        .as_ref()
        .map(|path| File::create(path).map(BufWriter::new))
        .transpose()?;

    let years = orbital_lifetime(
        &satellite,
        &station,
        Utc::now(),
        args.step,
        args.max_years,
        args.min_altitude,
        samples.as_mut().map(|w| w as &mut dyn Write),
    )?;
    if let Some(mut samples) = samples {
        samples.flush()?;
    }

    println!(
        "{}: {:.3} years above {:.1} km",
        satellite.name(),
        years,
        args.min_altitude
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operator_keys() {
        assert_eq!(
            parse_operator_input("u"),
            Some(OperatorInput::Command(OperatorCommand::Unlock))
        );
        assert_eq!(
            parse_operator_input(" x "),
            Some(OperatorInput::Command(OperatorCommand::StopTracking))
        );
        assert_eq!(parse_operator_input("q"), Some(OperatorInput::Quit));
        assert_eq!(
            parse_operator_input("p 120 35.5"),
            Some(OperatorInput::Command(OperatorCommand::Pin(Position::new(
                120.0, 35.5
            ))))
        );
    }

    #[test]
    fn rejects_bad_operator_input() {
        assert_eq!(parse_operator_input("p 120"), None);
        assert_eq!(parse_operator_input("p 700 10"), None);
        assert_eq!(parse_operator_input("z"), None);
    }

    #[test]
    fn end_of_input_keeps_running() {
        let (tx, rx) = mpsc::channel();
        let running = AtomicBool::new(true);
        read_operator_input(io::Cursor::new("u\nx\n"), &tx, &running);

        assert!(running.load(Ordering::SeqCst));
        assert_eq!(
            rx.try_iter().collect::<Vec<_>>(),
            vec![OperatorCommand::Unlock, OperatorCommand::StopTracking]
        );
    }

    #[test]
    fn quit_clears_running() {
        let (tx, rx) = mpsc::channel();
        let running = AtomicBool::new(true);
        read_operator_input(io::Cursor::new("s\nq\nh\n"), &tx, &running);

        assert!(!running.load(Ordering::SeqCst));
        assert_eq!(
            rx.try_iter().collect::<Vec<_>>(),
            vec![OperatorCommand::StartTracking]
        );
    }

    #[test]
    fn latitude_flag_keeps_configured_longitude() {
        let cli = Cli::parse_from(["groundtrack", "passes", "--lat", "45"]);
        let Commands::Passes(args) = cli.command else {
            panic!("expected passes");
        };
        let mut config =
            Config::parse("station:\n  coordinates: \"51.05, -114.07\"\n").unwrap();
        args.site.apply(&mut config).unwrap();

        let station = config.station.ground_station().unwrap();
        assert_eq!(station.latitude_deg, 45.0);
        assert_eq!(station.longitude_deg, -114.07);
    }

    #[test]
    fn cli_overrides_config() {
        let cli = Cli::parse_from([
            "groundtrack",
            "track",
            "best",
            "--lat",
            "45.5",
            "--lon",
            "-73.6",
            "--downlink",
            "435.300 MHz",
            "--no-radio",
            "--min-elevation",
            "25",
        ]);
        let Commands::Track(args) = cli.command else {
            panic!("expected track");
        };
        let mut config = Config::default();
        args.apply(&mut config).unwrap();

        let station = config.station.ground_station().unwrap();
        assert_eq!(station.latitude_deg, 45.5);
        assert_eq!(station.longitude_deg, -73.6);
        assert!(!config.radio.enabled);
        assert!(config.rotator.enabled);
        assert_eq!(config.search.min_elevation_deg, 25.0);
        assert_eq!(
            config.tracker_settings().unwrap().downlink_hz,
            Some(435_300_000.0)
        );
    }
}
