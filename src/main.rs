use std::io::{self, Write};
use std::env;
use std::path::{Component, Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use log::{LevelFilter, debug, error, info};
use rayon::prelude::*;
use serde_json::{Map, Value};
use walkdir::WalkDir;

use ddr_radar::ChartModel;
use ddr_radar::overrides::AudioLengths;
use ddr_radar::report::{OutputMode, radar_records, song_meta, speed_record};
use ddr_radar::speed::MultiplierSet;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputArg {
    Radar,
    Meta,
    Charts,
    Speed,
}

impl From<OutputArg> for OutputMode {
    fn from(arg: OutputArg) -> Self {
        match arg {
            OutputArg::Radar => Self::Radar,
            OutputArg::Meta => Self::Meta,
            OutputArg::Charts => Self::Charts,
            OutputArg::Speed => Self::Speed,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum MultiplierArg {
    Online,
    Offline,
    World,
}

impl From<MultiplierArg> for MultiplierSet {
    fn from(arg: MultiplierArg) -> Self {
        match arg {
            MultiplierArg::Online => Self::Online,
            MultiplierArg::Offline => Self::Offline,
            MultiplierArg::World => Self::World,
        }
    }
}

/// Parse DDR simfiles and print groove radar values as JSON.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Simfiles or directories to scan for .sm/.ssc files
    #[arg(required = true, value_name = "PATH")]
    paths: Vec<PathBuf>,

    /// JSON table of measured audio lengths, keyed by path relative to the scanned directory
    #[arg(long, value_name = "FILE", env = "DDR_RADAR_AUDIO_LENGTHS")]
    audio_lengths: Option<PathBuf>,

    /// What to print
    #[arg(short, long, value_enum, default_value = "radar")]
    output: OutputArg,

    /// Pretty-print the JSON
    #[arg(long)]
    pretty: bool,

    /// Multiplier set for speed suggestions
    #[arg(long, value_enum, default_value = "online")]
    multipliers: MultiplierArg,

    /// Preferred scroll speed for speed suggestions
    #[arg(long, default_value_t = 600.0)]
    target_bpm: f64,
}

/// A simfile found on disk with its path relative to the scanned root.
struct Input {
    path: PathBuf,
    rel: String,
}

fn is_simfile(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("sm") || e.eq_ignore_ascii_case("ssc"))
}

fn rel_path(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}

/// Key of a simfile named directly on the command line: its path relative
/// to `cwd` when it lies below it, else the path as given, `/`-separated.
fn direct_rel_path(path: &Path, cwd: Option<&Path>) -> String {
    let rel = cwd
        .and_then(|cwd| path.strip_prefix(cwd).ok())
        .unwrap_or(path);
    rel.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy()),
            Component::ParentDir => Some("..".into()),
            Component::CurDir | Component::RootDir | Component::Prefix(_) => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

fn collect_inputs(paths: &[PathBuf]) -> Vec<Input> {
    let cwd = env::current_dir().ok();
    let mut inputs = Vec::new();
    for root in paths {
        if root.is_file() {
            let rel = direct_rel_path(root, cwd.as_deref());
            inputs.push(Input { path: root.clone(), rel });
            continue;
        }
        for entry in WalkDir::new(root).sort_by_file_name() {
            match entry {
                Ok(entry) if entry.file_type().is_file() && is_simfile(entry.path()) => {
                    inputs.push(Input {
                        path: entry.path().to_path_buf(),
                        rel: rel_path(root, entry.path()),
                    });
                }
                Ok(_) => {}
                Err(e) => error!("Failed to walk {}: {e}", root.display()),
            }
        }
    }
    inputs
}

fn render(
    parsed: &[(&Input, ChartModel)],
    args: &Args,
    lengths: &AudioLengths,
) -> Result<Value, serde_json::Error> {
    let mode = OutputMode::from(args.output);
    Ok(match mode {
        OutputMode::Radar => {
            let mut out = Map::new();
            for (input, model) in parsed {
                for (key, record) in radar_records(model, &lengths.options_for(&input.rel)) {
                    out.insert(key, serde_json::to_value(record)?);
                }
            }
            Value::Object(out)
        }
        OutputMode::Meta => {
            let metas: Vec<_> = parsed
                .iter()
                .map(|(input, model)| song_meta(&input.rel, model))
                .collect();
            serde_json::to_value(metas)?
        }
        OutputMode::Charts => {
            let mut out = Map::new();
            for (input, model) in parsed {
                out.insert(input.rel.clone(), serde_json::to_value(model)?);
            }
            Value::Object(out)
        }
        OutputMode::Speed => {
            let set = MultiplierSet::from(args.multipliers);
            let records: Vec<_> = parsed
                .iter()
                .map(|(input, model)| speed_record(&input.rel, model, args.target_bpm, set))
                .collect();
            serde_json::to_value(records)?
        }
    })
}

fn main() -> ExitCode {
    // RUST_LOG overrides the default level.
    env_logger::Builder::new()
        .filter_level(LevelFilter::Info)
        .parse_default_env()
        .init();

    let args = Args::parse();

    let lengths = match &args.audio_lengths {
        Some(path) => match AudioLengths::load(path) {
            Ok(table) => {
                info!("Loaded {} audio lengths from {}", table.len(), path.display());
                table
            }
            Err(e) => {
                error!("{e}");
                return ExitCode::FAILURE;
            }
        },
        None => AudioLengths::default(),
    };

    let inputs = collect_inputs(&args.paths);
    info!("Found {} simfiles.", inputs.len());

    let parsed: Vec<(&Input, ChartModel)> = inputs
        .par_iter()
        .filter_map(|input| match ddr_radar::open(&input.path) {
            Ok(model) => {
                debug!("Parsed {} ({} charts)", input.rel, model.charts.len());
                Some((input, model))
            }
            Err(e) => {
                error!("Failed to parse {}: {e}", input.rel);
                None
            }
        })
        .collect();
    info!("Parsed {} of {} simfiles.", parsed.len(), inputs.len());

    let value = match render(&parsed, &args, &lengths) {
        Ok(value) => value,
        Err(e) => {
            error!("Failed to build output: {e}");
            return ExitCode::FAILURE;
        }
    };

    let mut stdout = io::stdout().lock();
    let written = if args.pretty {
        serde_json::to_writer_pretty(&mut stdout, &value)
    } else {
        serde_json::to_writer(&mut stdout, &value)
    };
    if let Err(e) = written.map_err(io::Error::from).and_then(|()| writeln!(stdout)) {
        error!("Failed to write output: {e}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
