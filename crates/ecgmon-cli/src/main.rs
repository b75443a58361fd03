use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use ecgmon_lib::{
    ingest::{PollSummary, Poller, SyntheticConfig, SyntheticEcg},
    io::{csv as csv_io, text as text_io},
    metrics::{Metrics, MetricsEngine, RhythmAssessment, RhythmClassifier},
    pipeline::{EcgPipeline, PipelineSnapshot},
    signal::{BeatEvent, Sample},
    PipelineConfig,
};
use log::info;
use serde::Serialize;
use std::{
    io::{self, Read},
    path::{Path, PathBuf},
    time::Duration,
};

#[derive(Parser)]
#[command(
    name = "ecgmon",
    version,
    about = "ecgmon: streaming single-lead ECG monitor"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Configuration file plus per-field overrides.
#[derive(Args, Debug, Default)]
struct ConfigArgs {
    /// TOML file with pipeline settings
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    fs: Option<f64>,
    #[arg(long)]
    refractory_ms: Option<f64>,
    #[arg(long)]
    threshold_mv: Option<f64>,
    #[arg(long)]
    rr_window: Option<usize>,
    #[arg(long)]
    notch_hz: Option<f64>,
    #[arg(long)]
    tachycardia_bpm: Option<f64>,
    #[arg(long)]
    bradycardia_bpm: Option<f64>,
    #[arg(long)]
    hrv_limit_ms: Option<f64>,
}

impl ConfigArgs {
    fn resolve(&self) -> Result<PipelineConfig> {
        let mut cfg = match &self.config {
            Some(path) => PipelineConfig::load(path)?,
            None => PipelineConfig::default(),
        };
        if let Some(v) = self.fs {
            cfg.sampling_rate_hz = v;
        }
        if let Some(v) = self.refractory_ms {
            cfg.refractory_ms = v;
        }
        if let Some(v) = self.threshold_mv {
            cfg.detection_threshold_mv = v;
        }
        if let Some(v) = self.rr_window {
            cfg.rr_window = v;
        }
        if let Some(v) = self.notch_hz {
            cfg.filter.notch_hz = v;
        }
        if let Some(v) = self.tachycardia_bpm {
            cfg.thresholds.tachycardia_bpm = v;
        }
        if let Some(v) = self.bradycardia_bpm {
            cfg.thresholds.bradycardia_bpm = v;
        }
        if let Some(v) = self.hrv_limit_ms {
            cfg.thresholds.hrv_ms = v;
        }
        cfg.validate().context("invalid configuration")?;
        Ok(cfg)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Stream samples from stdin or --input through the monitor
    Monitor {
        #[arg(long)]
        input: Option<PathBuf>,
        /// Input is `timestamp,amplitude` CSV instead of one amplitude per line
        #[arg(long)]
        csv: bool,
        /// Print one JSON line per detected beat
        #[arg(long)]
        beats: bool,
        #[command(flatten)]
        config: ConfigArgs,
    },
    /// Poll a synthetic ECG source and monitor it
    Simulate {
        #[arg(long, default_value_t = 30.0)]
        duration_s: f64,
        #[arg(long, default_value_t = 72.0)]
        bpm: f64,
        #[arg(long, default_value_t = 0.0)]
        jitter_ms: f64,
        #[arg(long, default_value_t = 0.02)]
        noise_mv: f64,
        /// Wall-clock polling interval
        #[arg(long, default_value_t = 500)]
        poll_ms: u64,
        /// Simulated time delivered per poll
        #[arg(long, default_value_t = 500.0)]
        chunk_ms: f64,
        #[arg(long, default_value_t = 7)]
        seed: u64,
        /// Stop the poller once this many beats were seen
        #[arg(long)]
        max_beats: Option<u64>,
        #[command(flatten)]
        config: ConfigArgs,
    },
    /// Heart rate and HRV from newline-delimited RR intervals (ms)
    Metrics {
        #[arg(long)]
        input: Option<PathBuf>,
        #[command(flatten)]
        config: ConfigArgs,
    },
    /// Classify a heart rate / HRV pair
    Classify {
        #[arg(long)]
        heart_rate: Option<f64>,
        #[arg(long, default_value_t = 0.0)]
        hrv: f64,
        #[command(flatten)]
        config: ConfigArgs,
    },
    /// Print the effective configuration as TOML
    Config {
        #[command(flatten)]
        config: ConfigArgs,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    match cli.command {
        Commands::Monitor {
            input,
            csv,
            beats,
            config,
        } => cmd_monitor(input.as_deref(), csv, beats, &config.resolve()?)?,
        Commands::Simulate {
            duration_s,
            bpm,
            jitter_ms,
            noise_mv,
            poll_ms,
            chunk_ms,
            seed,
            max_beats,
            config,
        } => {
            let cfg = config.resolve()?;
            let source = SyntheticConfig {
                sampling_rate_hz: cfg.sampling_rate_hz,
                heart_rate_bpm: bpm,
                rr_jitter_ms: jitter_ms,
                noise_mv,
                chunk_ms,
                duration_s: Some(duration_s),
                seed,
                ..Default::default()
            };
            cmd_simulate(&cfg, source, Duration::from_millis(poll_ms), max_beats)?
        }
        Commands::Metrics { input, config } => cmd_metrics(input.as_deref(), &config.resolve()?)?,
        Commands::Classify {
            heart_rate,
            hrv,
            config,
        } => cmd_classify(heart_rate, hrv, &config.resolve()?)?,
        Commands::Config { config } => print!("{}", config.resolve()?.to_toml_string()?),
    }
    Ok(())
}

fn read_series(input: Option<&Path>) -> Result<Vec<f64>> {
    match input {
        Some(path) => text_io::read_f64_series(path),
        None => {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf)?;
            text_io::parse_f64_series(&buf)
        }
    }
}

fn read_samples(input: Option<&Path>, csv: bool, fs: f64) -> Result<Vec<Sample>> {
    if csv {
        return match input {
            Some(path) => csv_io::read_samples_csv_path(path),
            None => csv_io::read_samples_csv(io::stdin().lock()),
        };
    }
    let amplitudes = read_series(input)?;
    Ok(text_io::samples_from_amplitudes(&amplitudes, fs, 0.0))
}

#[derive(Serialize)]
struct BeatLine<'a> {
    beat: BeatEvent,
    metrics: Metrics,
    assessment: Option<&'a RhythmAssessment>,
}

fn cmd_monitor(input: Option<&Path>, csv: bool, print_beats: bool, cfg: &PipelineConfig) -> Result<()> {
    let samples = read_samples(input, csv, cfg.sampling_rate_hz)?;
    let mut pipeline = EcgPipeline::new(*cfg)?;
    for sample in samples {
        // rejected samples are counted in the snapshot stats
        if let Ok(Some(beat)) = pipeline.ingest_sample(sample) {
            if print_beats {
                let line = BeatLine {
                    beat,
                    metrics: pipeline.metrics(),
                    assessment: pipeline.assessment(),
                };
                println!("{}", serde_json::to_string(&line)?);
            }
        }
    }
    println!("{}", serde_json::to_string(&pipeline.snapshot())?);
    Ok(())
}

#[derive(Serialize)]
struct SimulateOutput {
    #[serde(flatten)]
    snapshot: PipelineSnapshot,
    poller: PollSummary,
}

fn cmd_simulate(
    cfg: &PipelineConfig,
    source: SyntheticConfig,
    interval: Duration,
    max_beats: Option<u64>,
) -> Result<()> {
    let mut pipeline = EcgPipeline::new(*cfg)?;
    let (handle, batches) = Poller::new(interval).spawn(SyntheticEcg::new(source));
    let mut stop_early = false;
    for batch in batches.iter() {
        pipeline.ingest_batch(batch);
        if max_beats.is_some_and(|max| pipeline.stats().beats >= max) {
            stop_early = true;
            break;
        }
    }
    let poller = if stop_early {
        info!("beat limit reached, stopping poller");
        handle.stop()
    } else {
        handle.join()
    };
    let out = SimulateOutput {
        snapshot: pipeline.snapshot(),
        poller,
    };
    println!("{}", serde_json::to_string(&out)?);
    Ok(())
}

fn cmd_metrics(input: Option<&Path>, cfg: &PipelineConfig) -> Result<()> {
    let rr = read_series(input)?;
    let engine = MetricsEngine::from_intervals(&rr, cfg.rr_window);
    println!("{}", serde_json::to_string(&engine.metrics())?);
    Ok(())
}

fn cmd_classify(heart_rate: Option<f64>, hrv: f64, cfg: &PipelineConfig) -> Result<()> {
    let assessment = RhythmClassifier::new(cfg.thresholds).classify_values(heart_rate, hrv);
    println!("{}", serde_json::to_string(&assessment)?);
    Ok(())
}
