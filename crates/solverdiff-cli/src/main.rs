use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use serde_json::{json, Value};
use solverdiff_core::{
    Classification, ComparisonRecord, ConfigLayer, CorpusLayer, HarnessConfig, HarnessError,
    SolverLayer,
};
use solverdiff_runner::{NoProgress, ProgressObserver, RunReport};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

const EXIT_MISMATCH: i32 = 2;

#[derive(Parser)]
#[command(
    name = "solverdiff",
    version,
    about = "Differential testing of a candidate solver against a reference solver"
)]
struct Cli {
    /// Log at info level (RUST_LOG takes precedence when set).
    #[arg(long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone, Default)]
struct ConfigArgs {
    /// YAML file with run settings; flags below override it.
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    oracle: Option<PathBuf>,
    #[arg(long)]
    target: Option<PathBuf>,
    #[arg(long)]
    oracle_name: Option<String>,
    #[arg(long)]
    target_name: Option<String>,
    #[arg(long)]
    corpus: Option<PathBuf>,
    #[arg(long)]
    extension: Option<String>,
    #[arg(long, conflicts_with = "no_recursive")]
    recursive: bool,
    #[arg(long)]
    no_recursive: bool,
    #[arg(long)]
    workers: Option<usize>,
    #[arg(long)]
    timeout_secs: Option<u64>,
    #[arg(long)]
    output: Option<PathBuf>,
    #[arg(long)]
    summary_json: Option<PathBuf>,
}

impl ConfigArgs {
    fn layer(&self) -> ConfigLayer {
        ConfigLayer {
            oracle: SolverLayer {
                name: self.oracle_name.clone(),
                path: self.oracle.clone(),
            },
            target: SolverLayer {
                name: self.target_name.clone(),
                path: self.target.clone(),
            },
            corpus: CorpusLayer {
                dir: self.corpus.clone(),
                extension: self.extension.clone(),
                recursive: match (self.recursive, self.no_recursive) {
                    (true, _) => Some(true),
                    (_, true) => Some(false),
                    _ => None,
                },
            },
            max_workers: self.workers,
            timeout_secs: self.timeout_secs,
            output_csv: self.output.clone(),
            summary_json: self.summary_json.clone(),
        }
    }

    fn resolve(&self) -> Result<HarnessConfig, HarnessError> {
        let file = match &self.config {
            Some(path) => ConfigLayer::load(path)?,
            None => ConfigLayer::default(),
        };
        HarnessConfig::from_layer(self.layer().over(file))
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Run both solvers over the corpus and record every comparison.
    Run {
        #[command(flatten)]
        config: ConfigArgs,
        /// Exit with status 2 if any input produced a mismatch.
        #[arg(long)]
        fail_on_mismatch: bool,
        #[arg(long)]
        no_color: bool,
        #[arg(long)]
        json: bool,
    },
    /// Resolve and validate the configuration, then report the corpus size.
    Describe {
        #[command(flatten)]
        config: ConfigArgs,
        #[arg(long)]
        json: bool,
    },
}

fn init_logging(verbose: bool) {
    let default = if verbose { "info" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let json_mode = command_json_mode(&cli.command);
    match run_command(cli.command) {
        Ok(outcome) => {
            if let Some(payload) = &outcome.payload {
                emit_json(payload);
            }
            if outcome.exit_code != 0 {
                std::process::exit(outcome.exit_code);
            }
            Ok(())
        }
        Err(err) => {
            if json_mode {
                let code = err
                    .downcast_ref::<HarnessError>()
                    .map(|e| e.kind())
                    .unwrap_or("command_failed");
                emit_json(&json_error(code, err.to_string(), json!({})));
                std::process::exit(1);
            }
            Err(err)
        }
    }
}

struct CommandOutcome {
    payload: Option<Value>,
    exit_code: i32,
}

fn run_command(command: Commands) -> Result<CommandOutcome> {
    match command {
        Commands::Run {
            config,
            fail_on_mismatch,
            no_color,
            json,
        } => {
            let config = config.resolve()?;
            tracing::info!(
                oracle = %config.oracle.path.display(),
                target = %config.target.path.display(),
                corpus = %config.corpus.dir.display(),
                "resolved configuration"
            );
            let report = if json {
                solverdiff_runner::run_comparison(&config, &mut NoProgress)?
            } else {
                let mut console = ConsoleProgress::new(&config, !no_color);
                let report = solverdiff_runner::run_comparison(&config, &mut console)?;
                print_final_summary(&report, &console.palette);
                report
            };
            let exit_code = if fail_on_mismatch && report.summary.mismatches() > 0 {
                EXIT_MISMATCH
            } else {
                0
            };
            let payload = json.then(|| {
                json!({
                    "ok": true,
                    "command": "run",
                    "report": solverdiff_runner::report_to_json(&config, &report),
                })
            });
            Ok(CommandOutcome { payload, exit_code })
        }
        Commands::Describe { config, json } => {
            let config = config.resolve()?;
            let plan = solverdiff_runner::plan_comparison(&config)?;
            if json {
                return Ok(CommandOutcome {
                    payload: Some(json!({
                        "ok": true,
                        "command": "describe",
                        "config": config_to_json(&config),
                        "corpus_files": plan.corpus.len(),
                    })),
                    exit_code: 0,
                });
            }
            print_config(&config);
            println!("corpus_files: {}", plan.corpus.len());
            Ok(CommandOutcome {
                payload: None,
                exit_code: 0,
            })
        }
    }
}

struct Palette {
    enabled: bool,
}

impl Palette {
    const HEADER: &'static str = "\x1b[95m";
    const GREEN: &'static str = "\x1b[92m";
    const YELLOW: &'static str = "\x1b[93m";
    const RED: &'static str = "\x1b[91m";
    const RESET: &'static str = "\x1b[0m";

    fn paint(&self, color: &str, text: &str) -> String {
        if self.enabled {
            format!("{}{}{}", color, text, Self::RESET)
        } else {
            text.to_string()
        }
    }

    fn for_classification(classification: Classification) -> &'static str {
        match classification {
            Classification::Match => Self::GREEN,
            c if c.is_timeout() => Self::YELLOW,
            _ => Self::RED,
        }
    }
}

fn preview(text: &str) -> String {
    text.chars().take(50).collect()
}

struct ConsoleProgress {
    palette: Palette,
    oracle_name: String,
    target_name: String,
}

impl ConsoleProgress {
    fn new(config: &HarnessConfig, color: bool) -> Self {
        Self {
            palette: Palette { enabled: color },
            oracle_name: config.oracle.name.clone(),
            target_name: config.target.name.clone(),
        }
    }
}

impl ProgressObserver for ConsoleProgress {
    fn on_start(&mut self, total: usize, config: &HarnessConfig) {
        println!("{}", self.palette.paint(Palette::HEADER, "Start Benchmarking..."));
        println!("Benchmark Dir: {}", config.corpus.dir.display());
        println!("Total Files: {}", total);
        println!("Max Workers: {}", config.max_workers);
        println!("Timeout: {}s", config.timeout.as_secs());
        println!("{}", "-".repeat(60));
    }

    fn on_record(&mut self, completed: usize, total: usize, record: &ComparisonRecord) {
        let status = record.classification.as_str();
        println!(
            "[{}/{}] {} -> {}",
            completed,
            total,
            record.input_id,
            self.palette
                .paint(Palette::for_classification(record.classification), status)
        );
        println!(
            "   Time: {}={:.4}s | {}={:.4}s",
            self.oracle_name,
            record.oracle.elapsed.as_secs_f64(),
            self.target_name,
            record.target.elapsed.as_secs_f64()
        );
        if record.classification == Classification::Mismatch {
            println!("   {}", self.palette.paint(Palette::RED, "!!! OUTPUT MISMATCH !!!"));
            println!("   {}: {}...", self.oracle_name, preview(&record.oracle.stdout));
            println!("   {}: {}...", self.target_name, preview(&record.target.stdout));
        }
        println!("{}", "-".repeat(40));
    }
}

fn print_final_summary(report: &RunReport, palette: &Palette) {
    println!();
    println!(
        "{}",
        palette.paint(
            Palette::HEADER,
            &format!(
                "Benchmark Finished! Results saved to {}",
                report.output_csv.display()
            )
        )
    );
    if let Some(path) = &report.summary_json {
        println!("Summary written to {}", path.display());
    }
    let s = &report.summary;
    println!("Summary:");
    println!("  Total: {}", report.total);
    println!(
        "  {}",
        palette.paint(Palette::GREEN, &format!("Matches (Pass): {}", s.matches()))
    );
    println!(
        "  {}",
        palette.paint(Palette::RED, &format!("Mismatches (Fail): {}", s.mismatches()))
    );
    println!(
        "  {}",
        palette.paint(Palette::YELLOW, &format!("Timeouts: {}", s.timeouts()))
    );
    println!(
        "  {}",
        palette.paint(Palette::RED, &format!("Errors: {}", s.errors()))
    );
}

fn config_to_json(config: &HarnessConfig) -> Value {
    json!({
        "oracle": { "name": config.oracle.name, "path": config.oracle.path.display().to_string() },
        "target": { "name": config.target.name, "path": config.target.path.display().to_string() },
        "corpus_dir": config.corpus.dir.display().to_string(),
        "extension": config.corpus.extension,
        "recursive": config.corpus.recursive,
        "max_workers": config.max_workers,
        "timeout_secs": config.timeout.as_secs(),
        "output_csv": config.output_csv.display().to_string(),
        "summary_json": config.summary_json.as_ref().map(|p| p.display().to_string()),
    })
}

fn print_config(config: &HarnessConfig) {
    println!("oracle: {} ({})", config.oracle.name, config.oracle.path.display());
    println!("target: {} ({})", config.target.name, config.target.path.display());
    println!("corpus_dir: {}", config.corpus.dir.display());
    println!("extension: {}", config.corpus.extension);
    println!("recursive: {}", config.corpus.recursive);
    println!("max_workers: {}", config.max_workers);
    println!("timeout_secs: {}", config.timeout.as_secs());
    println!("output_csv: {}", config.output_csv.display());
    if let Some(path) = &config.summary_json {
        println!("summary_json: {}", path.display());
    }
}

fn emit_json(value: &Value) {
    match serde_json::to_string(value) {
        Ok(s) => println!("{}", s),
        Err(_) => println!(
            "{{\"ok\":false,\"error\":{{\"code\":\"serialization_error\",\"message\":\"failed to serialize JSON payload\",\"details\":{{}}}}}}"
        ),
    }
}

fn json_error(code: &str, message: String, details: Value) -> Value {
    json!({
        "ok": false,
        "error": {
            "code": code,
            "message": message,
            "details": details
        }
    })
}

fn command_json_mode(command: &Commands) -> bool {
    match command {
        Commands::Run { json, .. } | Commands::Describe { json, .. } => *json,
    }
}
