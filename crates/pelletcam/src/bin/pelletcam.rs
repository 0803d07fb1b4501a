use clap::{Parser, Subcommand, ValueEnum};
use log::LevelFilter;
use pelletcam::core::{aggregate, init_with_level, map_click, sample, DisplayClick, ImageCoordinate};
use pelletcam::dataset::read_calibration;
use pelletcam::{
    HttpCamera, PingProbe, SessionConfig, SessionController, SessionOutcome, TerminalOperator,
};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "pelletcam", version, about = "Pellet color measurement with a network camera")]
struct Cli {
    #[arg(long, value_enum, default_value_t = LogLevel::Info, global = true)]
    log_level: LogLevel,

    /// Log through a `tracing` subscriber instead of the plain stderr sink.
    #[cfg(feature = "tracing")]
    #[arg(long, value_enum, default_value_t = LogFormat::Plain, global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run an interactive measurement session.
    Run {
        /// JSON session config; defaults apply when omitted.
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Write the default session config as JSON.
    InitConfig { path: PathBuf },
    /// Print the sampling point trained from a calibration table.
    Train {
        #[arg(long)]
        dataset: PathBuf,
    },
    /// Sample one photo and print its median color.
    Sample {
        #[arg(long)]
        image: PathBuf,
        #[arg(long)]
        x: f64,
        #[arg(long)]
        y: f64,
        #[arg(long, default_value_t = 10)]
        box_size: u32,
        /// Interpret `x`/`y` as a click on the configured display canvas.
        #[arg(long)]
        display: bool,
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

#[cfg(feature = "tracing")]
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Plain,
    Text,
    Json,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Off => LevelFilter::Off,
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}

fn load_config(path: Option<PathBuf>) -> Result<SessionConfig, pelletcam::ConfigError> {
    match path {
        Some(path) => SessionConfig::load_json(path),
        None => Ok(SessionConfig::default()),
    }
}

#[cfg(feature = "tracing")]
fn init_logging(cli: &Cli) -> Result<(), log::SetLoggerError> {
    let level = cli.log_level.into();
    match cli.log_format {
        LogFormat::Plain => init_with_level(level),
        LogFormat::Text | LogFormat::Json => {
            if !pelletcam::core::init_tracing(level, cli.log_format == LogFormat::Json) {
                log::warn!("a tracing subscriber was already installed");
            }
            Ok(())
        }
    }
}

#[cfg(not(feature = "tracing"))]
fn init_logging(cli: &Cli) -> Result<(), log::SetLoggerError> {
    init_with_level(cli.log_level.into())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(&cli)?;

    match cli.command {
        Command::Run { config } => {
            let config = load_config(config)?;
            let camera = HttpCamera::new(&config.device);
            let mut session = SessionController::new(
                config,
                TerminalOperator::stdio(),
                camera,
                PingProbe::default(),
            );
            let summary = session.run()?;
            if summary.outcome == SessionOutcome::Aborted {
                println!("session aborted");
            }
        }
        Command::InitConfig { path } => {
            SessionConfig::default().write_json(&path)?;
            println!("wrote {}", path.display());
        }
        Command::Train { dataset } => {
            let history = read_calibration(&dataset)?;
            let model = aggregate(&history)?;
            println!(
                "sampling point: ({}, {}) from {} observation(s)",
                model.center.x, model.center.y, model.observations
            );
        }
        Command::Sample {
            image,
            x,
            y,
            box_size,
            display,
            config,
        } => {
            let img = image::open(&image)?.to_rgb8();
            let center = if display {
                let config = load_config(config)?;
                map_click(
                    DisplayClick::new(x, y),
                    config.display,
                    img.width(),
                    img.height(),
                )
            } else {
                ImageCoordinate::new(x, y)
            };
            let sampled = sample(&img, center, box_size)?;
            println!(
                "median color: {} over {}x{} px",
                sampled.color,
                sampled.region.width(),
                sampled.region.height()
            );
        }
    }

    Ok(())
}
