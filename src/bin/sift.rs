//! Sift CLI: runs one extraction job and exits.
//!
//! Usage:
//!   sift run [--job path|-] [--extractor name] [--vpid id] [--config path]
//!   sift extractors

use clap::{Parser, Subcommand};
use sift::config::WorkerConfig;
use sift::control::{CommandChannel, ControlChannel, NullChannel};
use sift::logging::{init_logging, LogLevel};
use sift::{ExtractionWorker, ExtractorRegistry, JobRecord, StatusWriter};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info};

/// Job ran and every step succeeded
const EXIT_OK: i32 = 0;
/// Job could not be processed at all
const EXIT_FATAL: i32 = 1;
/// Job was delivered but carries recorded failures
const EXIT_DEGRADED: i32 = 2;

#[derive(Parser)]
#[command(
    name = "sift",
    version,
    about = "Per-job metadata-extraction worker"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process a single job
    Run {
        /// Job JSON file, or `-` for stdin
        #[arg(long, default_value = "-")]
        job: String,
        /// Override the job's `extractor`
        #[arg(long)]
        extractor: Option<String>,
        /// Identifier stamped into claimed stages
        #[arg(long, env = "SIFT_VPID")]
        vpid: Option<String>,
        /// Program answering control-channel commands
        #[arg(long, env = "SIFT_CONTROL_COMMAND")]
        control_command: Option<PathBuf>,
        /// Worker config file (YAML)
        #[arg(long, env = "SIFT_CONFIG")]
        config: Option<PathBuf>,
        /// Debug logging
        #[arg(short, long)]
        verbose: bool,
    },
    /// List registered extractors
    Extractors,
}

fn read_job(source: &str) -> Result<JobRecord, String> {
    let text = if source == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .map_err(|e| format!("cannot read job from stdin: {}", e))?;
        buf
    } else {
        std::fs::read_to_string(Path::new(source))
            .map_err(|e| format!("cannot read job {}: {}", source, e))?
    };
    JobRecord::from_json(&text).map_err(|e| e.to_string())
}

fn control_channel(config: &WorkerConfig) -> Arc<dyn ControlChannel> {
    match &config.control_command {
        Some(program) => {
            Arc::new(CommandChannel::new(program).with_args(config.control_args.clone()))
        }
        None => Arc::new(NullChannel),
    }
}

fn cmd_run(
    job_source: &str,
    extractor: Option<String>,
    vpid: Option<String>,
    control_command: Option<PathBuf>,
    config_path: Option<PathBuf>,
    verbose: bool,
) -> i32 {
    let mut config = match WorkerConfig::load(config_path.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {}", e);
            return EXIT_FATAL;
        }
    };
    if vpid.is_some() {
        config.vpid = vpid;
    }
    if control_command.is_some() {
        config.control_command = control_command;
    }
    let level = if verbose {
        LogLevel::Debug
    } else {
        config.log_level
    };
    if let Err(e) = init_logging(level, config.log_format) {
        eprintln!("Error: {}", e);
        return EXIT_FATAL;
    }

    let status = match StatusWriter::stderr().with_marker(config.status_marker.clone()) {
        Ok(s) => s,
        Err(e) => {
            error!(error = %e, "invalid status marker");
            return EXIT_FATAL;
        }
    };

    let mut job = match read_job(job_source) {
        Ok(job) => job,
        Err(e) => {
            error!(error = %e, "cannot load job");
            return EXIT_FATAL;
        }
    };
    if let Some(name) = extractor {
        job.set("extractor", name);
    }

    let vpid = config.resolved_vpid();
    let mut worker = ExtractionWorker::new(vpid.clone(), Arc::new(ExtractorRegistry::with_builtins()))
        .with_control_channel(control_channel(&config))
        .with_status(status);

    if let Some(pin) = &config.pin {
        if let Err(e) = worker.status().register(pin, &config.worker_type, &vpid) {
            error!(error = %e, "cannot register with supervisor");
        }
    }

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            error!(error = %e, "failed to create tokio runtime");
            return EXIT_FATAL;
        }
    };

    rt.block_on(async {
        let result = worker.run_job(&mut job).await;
        worker.shutdown().await;
        match result {
            Ok(true) => EXIT_OK,
            Ok(false) => {
                info!(job_id = %job.id(), "job delivered with recorded failures");
                EXIT_DEGRADED
            }
            Err(e) => {
                error!(job_id = %job.id(), error = %e, "job failed");
                EXIT_FATAL
            }
        }
    })
}

fn cmd_extractors() -> i32 {
    for name in ExtractorRegistry::with_builtins().names() {
        println!("{}", name);
    }
    EXIT_OK
}

fn main() {
    let cli = Cli::parse();
    let code = match cli.command {
        Commands::Run {
            job,
            extractor,
            vpid,
            control_command,
            config,
            verbose,
        } => cmd_run(&job, extractor, vpid, control_command, config, verbose),
        Commands::Extractors => cmd_extractors(),
    };
    std::process::exit(code);
}
