//! Uprite CLI - Command-line interface for the posture core
//!
//! Commands:
//! - run: Replay recorded keypoint frames through a monitoring session
//! - simulate: Drive the alert scheduler with a score series to preview timing
//! - validate: Validate NDJSON frame records

use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use uprite_core::scheduler::AlertSink;
use uprite_core::{
    AlertConfig, AlertEvent, AlertKind, AlertMode, EngineConfig, FrameRecord, ManualClock,
    MonitorSession, NotificationScheduler, ReplaySource, ScoreRecord, CORE_VERSION,
};

/// Uprite - On-device posture scoring and alert scheduling engine
#[derive(Parser)]
#[command(name = "uprite")]
#[command(author = "Uprite Labs")]
#[command(version = CORE_VERSION)]
#[command(about = "Score posture from keypoint streams", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliMode {
    Cooldown,
    Continuous,
}

impl From<CliMode> for AlertMode {
    fn from(mode: CliMode) -> Self {
        match mode {
            CliMode::Cooldown => AlertMode::Cooldown,
            CliMode::Continuous => AlertMode::Continuous,
        }
    }
}

#[derive(clap::Args)]
struct AlertArgs {
    /// Score above which posture counts as degraded (0-100)
    #[arg(long, default_value = "50")]
    threshold: f64,

    /// Seconds the score must stay above threshold before alerting
    #[arg(long, default_value = "5")]
    trigger_delay: f64,

    /// Alert pacing mode
    #[arg(long, value_enum, default_value = "cooldown")]
    mode: CliMode,

    /// Cooldown mode: seconds alerts stay suppressed after one fires
    #[arg(long, default_value = "60")]
    cooldown: f64,

    /// Continuous mode: seconds between repeat alerts
    #[arg(long, default_value = "10")]
    interval: f64,
}

impl AlertArgs {
    fn to_config(&self) -> AlertConfig {
        AlertConfig {
            threshold: self.threshold,
            trigger_delay_secs: self.trigger_delay,
            mode: self.mode.into(),
            cooldown_secs: self.cooldown,
            continuous_interval_secs: self.interval,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Replay recorded keypoint frames through a monitoring session
    Run {
        /// Input file of NDJSON frame records (use - for stdin)
        #[arg(short, long, default_value = "-")]
        input: PathBuf,

        /// Output file for NDJSON score/alert records (use - for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        /// Calibrate from the first frame before scoring
        #[arg(long, default_value = "true")]
        calibrate_first: bool,

        /// Milliseconds of simulated time between frames
        #[arg(long, default_value = "1500")]
        tick_interval_ms: u64,

        #[command(flatten)]
        alert: AlertArgs,
    },

    /// Drive the alert scheduler with a score series to preview timing
    Simulate {
        /// Comma-separated score series, e.g. "0,80,80,80,40"
        #[arg(long)]
        scores: String,

        /// Seconds of simulated time between scores
        #[arg(long, default_value = "1.5")]
        step_secs: f64,

        #[command(flatten)]
        alert: AlertArgs,
    },

    /// Validate NDJSON frame records
    Validate {
        /// Input file (use - for stdin)
        #[arg(short, long, default_value = "-")]
        input: PathBuf,
    },
}

#[derive(serde::Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum OutputRecord {
    Score {
        #[serde(flatten)]
        record: ScoreRecord,
    },
    Alert {
        #[serde(flatten)]
        event: AlertEvent,
    },
}

#[derive(Clone, Default)]
struct BufferedSink(std::rc::Rc<std::cell::RefCell<Vec<AlertEvent>>>);

impl AlertSink for BufferedSink {
    fn deliver(&mut self, alert: &AlertEvent) {
        self.0.borrow_mut().push(alert.clone());
    }
}

fn read_input(path: &PathBuf) -> io::Result<String> {
    if path.as_os_str() == "-" {
        let mut buf = String::new();
        io::stdin().read_to_string(&mut buf)?;
        Ok(buf)
    } else {
        fs::read_to_string(path)
    }
}

fn open_output(path: &PathBuf) -> io::Result<Box<dyn Write>> {
    if path.as_os_str() == "-" {
        Ok(Box::new(io::stdout()))
    } else {
        Ok(Box::new(fs::File::create(path)?))
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run {
            input,
            output,
            calibrate_first,
            tick_interval_ms,
            alert,
        } => cmd_run(input, output, calibrate_first, tick_interval_ms, alert),
        Commands::Simulate {
            scores,
            step_secs,
            alert,
        } => cmd_simulate(scores, step_secs, alert),
        Commands::Validate { input } => cmd_validate(input),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn cmd_run(
    input: PathBuf,
    output: PathBuf,
    calibrate_first: bool,
    tick_interval_ms: u64,
    alert: AlertArgs,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    if input.as_os_str() == "-" && atty::is(atty::Stream::Stdin) {
        eprintln!("reading NDJSON frame records from stdin (ctrl-d to finish)...");
    }

    let raw = read_input(&input)?;
    let source = ReplaySource::from_ndjson(&raw)?;
    let frame_count = source.remaining();

    // Replay runs against a simulated clock so alert timing matches what
    // the live cadence would produce
    let clock = ManualClock::new();
    let sink = BufferedSink::default();
    let engine_config = EngineConfig {
        tick_interval_ms,
        ..EngineConfig::default()
    };
    let mut session = MonitorSession::with_source(
        engine_config,
        alert.to_config(),
        Box::new(source),
        Box::new(sink.clone()),
        Arc::new(clock.clone()),
    )?;

    let mut out = open_output(&output)?;
    session.enable()?;

    let mut remaining = frame_count;
    if calibrate_first && remaining > 0 {
        session.calibrate()?;
        remaining -= 1;
    }

    for _ in 0..remaining {
        clock.advance(Duration::from_millis(tick_interval_ms));
        if let Some(sample) = session.tick() {
            let record = session.score_record(&sample);
            writeln!(out, "{}", serde_json::to_string(&OutputRecord::Score { record })?)?;
        }
        for event in sink.0.borrow_mut().drain(..) {
            writeln!(out, "{}", serde_json::to_string(&OutputRecord::Alert { event })?)?;
        }
    }

    out.flush()?;
    Ok(ExitCode::SUCCESS)
}

fn cmd_simulate(
    scores: String,
    step_secs: f64,
    alert: AlertArgs,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let series: Vec<f64> = scores
        .split(',')
        .map(|s| s.trim().parse::<f64>())
        .collect::<Result<_, _>>()?;

    let clock = ManualClock::new();
    let mut scheduler = NotificationScheduler::new(
        AlertKind::Posture,
        alert.to_config(),
        Arc::new(clock.clone()),
    )?;
    let mut sink = BufferedSink::default();

    let human = atty::is(atty::Stream::Stdout);
    let step = Duration::from_secs_f64(step_secs);

    for score in series {
        scheduler.observe(score, &mut sink);
        for event in sink.0.borrow_mut().drain(..) {
            if human {
                println!(
                    "t={:.1}s  alert  score={:.0}  {}",
                    clock.now().as_secs_f64(),
                    event.score,
                    event.message
                );
            } else {
                println!("{}", serde_json::to_string(&event)?);
            }
        }
        clock.advance(step);
    }

    if human {
        println!(
            "done: {:.1}s simulated, final state {:?}",
            clock.now().as_secs_f64(),
            scheduler.state()
        );
    }
    Ok(ExitCode::SUCCESS)
}

fn cmd_validate(input: PathBuf) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let raw = read_input(&input)?;

    let mut valid = 0usize;
    let mut invalid = 0usize;
    for (lineno, line) in raw.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<FrameRecord>(line) {
            Ok(_) => valid += 1,
            Err(e) => {
                invalid += 1;
                eprintln!("line {}: {}", lineno + 1, e);
            }
        }
    }

    println!("{} valid, {} invalid", valid, invalid);
    if invalid > 0 {
        Ok(ExitCode::FAILURE)
    } else {
        Ok(ExitCode::SUCCESS)
    }
}
