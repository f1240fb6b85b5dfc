use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};

use fibre_admission::config::{self, ConfigRaw};
use fibre_admission::report::{JsonLinesReport, ReportSink, TextReport};
use fibre_admission::{logging, GbdtLearner, Simulator, TraceReader};
use fibre_gbdt::BoosterParams;

#[derive(Parser)]
#[command(
  name = "fibre-admission",
  version,
  about = "Replays a request trace and evaluates a learned cache admission model window by window"
)]
struct Cli {
  /// Trace of `seq id size cost` records
  trace: PathBuf,
  /// Cache capacity, in the unit of the trace's sizes
  cache_size: Option<u64>,
  /// Requests per window
  window_size: Option<u64>,
  /// Probability threshold for scoring predictions
  cutoff: Option<f64>,
  /// YAML configuration file (defaults to ./fibre_admission[.<env>].yaml if present)
  #[arg(long)]
  config: Option<PathBuf>,
  /// Result file, `-` for stdout (defaults to <trace>.result.<unix-seconds>)
  #[arg(long)]
  output: Option<PathBuf>,
  #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
  format: OutputFormat,
  /// Windows queued for the trainer thread; 0 disables pipelining
  #[arg(long)]
  pipeline_depth: Option<usize>,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
  Text,
  Json,
}

fn main() -> Result<()> {
  let cli = Cli::parse();

  let mut raw = match &cli.config {
    Some(path) => config::load_raw(path).with_context(|| format!("loading {}", path.display()))?,
    None => match config::find_config_file(None) {
      Ok(path) => config::load_raw(&path).with_context(|| format!("loading {}", path.display()))?,
      Err(_) => ConfigRaw::default(),
    },
  };
  raw.cache_size = cli.cache_size.or(raw.cache_size);
  raw.window_size = cli.window_size.or(raw.window_size);
  raw.cutoff = cli.cutoff.or(raw.cutoff);
  raw.pipeline_depth = cli.pipeline_depth.unwrap_or(raw.pipeline_depth);
  let config = config::process_raw_config(raw).context("invalid configuration")?;
  BoosterParams::from_pairs(config.hyperparameters.iter()).context("invalid hyperparameters")?;

  let _guard = logging::init(&config.logging)?;

  let reader = TraceReader::open(&cli.trace)?;
  let output = cli.output.clone().unwrap_or_else(|| default_output(&cli.trace));
  let writer: Box<dyn Write + Send> = if output == Path::new("-") {
    Box::new(io::stdout())
  } else {
    let file = File::create(&output).with_context(|| format!("creating {}", output.display()))?;
    Box::new(BufWriter::new(file))
  };
  let mut sink: Box<dyn ReportSink + Send> = match cli.format {
    OutputFormat::Text => Box::new(TextReport::new(writer)),
    OutputFormat::Json => Box::new(JsonLinesReport::new(writer)),
  };

  let simulator = Simulator::new(&config, GbdtLearner::new()).with_trace_name(trace_name(&cli.trace));
  let summary = simulator.run_trace(reader, &mut sink)?;

  tracing::info!(
    windows = summary.windows,
    output = %output.display(),
    "Wrote results"
  );
  if let Some(line) = summary.malformed_at_line {
    eprintln!("Stopped at malformed trace record on line {}", line);
  }
  Ok(())
}

fn trace_name(path: &Path) -> String {
  path
    .file_name()
    .map(|name| name.to_string_lossy().into_owned())
    .unwrap_or_else(|| path.display().to_string())
}

fn default_output(trace: &Path) -> PathBuf {
  let mut name = trace.as_os_str().to_os_string();
  name.push(format!(".result.{}", chrono::Utc::now().timestamp()));
  PathBuf::from(name)
}
