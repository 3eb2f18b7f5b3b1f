// Commandline argument parser using clap for holoneedle

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser, Clone)]
#[clap(version, about)]
pub struct NeedleArgs {
    #[command(subcommand, long_about)]
    /// Where coefficient frames come from, synthetic or replayed
    pub command: SourceTask,

    /// Path to a RON session config; built-in defaults are used if absent
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Control-loop rate in ticks per second, overrides the config
    #[arg(short = 'u', long = "update")]
    pub update_rate: Option<f64>,

    /// Directory that per-subject folders are created under
    #[arg(short = 'o', long = "outdir")]
    pub output_dir: Option<PathBuf>,

    /// Subject identifier, names the output folder
    #[arg(short = 's', long = "subject")]
    pub subject: Option<String>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum SourceTask {
    /// Generate synthetic coefficient frames on a background thread
    #[command(about)]
    Synthetic(SyntheticCommand),

    /// Replay coefficient frames recorded from the sensing link
    #[command(about)]
    Replay(ReplayCommand),
}

#[derive(Debug, Args, Clone)]
#[command(version, about)]
pub struct SyntheticCommand {
    /// How long to run, in seconds
    #[arg(short = 'd', long = "duration", default_value_t = 10.0)]
    pub duration_secs: f64,

    /// Curvature swing of the synthetic bend, in 1/m
    #[arg(short = 'a', long = "amplitude", default_value_t = 2.0)]
    pub amplitude: f64,
}

#[derive(Debug, Args, Clone)]
#[command(version, about)]
pub struct ReplayCommand {
    /// Recorded frame file to replay
    #[arg(short = 'i', long = "infile")]
    pub infile: PathBuf,
}
