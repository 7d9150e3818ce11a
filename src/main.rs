mod cli;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use rf_av::{subtitles, ToolRegistry};
use rf_core::config::Config;
use rf_core::{JobId, PipelineRequest, SubtitleSource, TimedSegment};
use rf_pipeline::{Pipeline, ProgressSender};
use tokio_util::sync::CancellationToken;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "reelforge=trace,rf_pipeline=trace,rf_av=trace,rf_core=debug".to_string()
        } else {
            "reelforge=info,rf_pipeline=info,rf_av=info,rf_core=warn".to_string()
        }
    });

    // Logs go to stderr so documents printed on stdout stay clean.
    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Run {
            request,
            job_id,
            output_dir,
            timeout,
            dry_run,
            json,
        } => {
            let options = RunOptions {
                job_id,
                output_dir,
                timeout: timeout.map(Duration::from_secs),
                dry_run,
                json,
            };
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(run_request(&request, cli.config.as_deref(), options))
        }
        Commands::CheckTools => check_tools(cli.config.as_deref()),
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Subtitles { segments } => render_subtitles(&segments),
        Commands::Version => {
            println!("reelforge {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

struct RunOptions {
    job_id: Option<String>,
    output_dir: Option<std::path::PathBuf>,
    timeout: Option<Duration>,
    dry_run: bool,
    json: bool,
}

async fn run_request(
    request_path: &Path,
    config_path: Option<&Path>,
    options: RunOptions,
) -> Result<()> {
    let mut config = Config::load_or_default(config_path)?;
    if let Some(dir) = options.output_dir {
        config.work.output_dir = dir;
    }

    let contents = std::fs::read_to_string(request_path)
        .with_context(|| format!("Request file does not exist: {:?}", request_path))?;
    let request = PipelineRequest::from_json(&contents)?;
    request.validate()?;

    let job_id = match options.job_id {
        Some(id) => id
            .parse::<JobId>()
            .with_context(|| format!("Invalid job id: {id}"))?,
        None => JobId::new(),
    };

    let tools = Arc::new(ToolRegistry::discover(&config.tools));
    let pipeline = Pipeline::new(config, tools)?.with_progress(ProgressSender::new(
        |percent, message| eprintln!("[{percent:>3.0}%] {message}"),
    ));

    let plan = pipeline.plan(&request);
    if options.dry_run {
        println!("Job: {job_id}");
        println!("Input: {}", request.input_video);
        if plan.is_empty() {
            println!("No stages requested; the input will be delivered unchanged.");
        } else {
            println!("Stages to execute: {}", plan.len());
            for (i, stage) in plan.iter().enumerate() {
                println!("  {}. {}", i + 1, stage);
            }
        }
        return Ok(());
    }

    tracing::info!("Starting job {job_id} ({} stages)", plan.len());

    let cancel = CancellationToken::new();
    let watcher = {
        let cancel = cancel.clone();
        let timeout = options.timeout;
        tokio::spawn(async move {
            let deadline = async {
                match timeout {
                    Some(limit) => tokio::time::sleep(limit).await,
                    None => std::future::pending::<()>().await,
                }
            };
            tokio::select! {
                _ = tokio::signal::ctrl_c() => tracing::warn!("Interrupted; cancelling job"),
                _ = deadline => tracing::warn!("Time limit reached; cancelling job"),
            }
            cancel.cancel();
        })
    };

    let result = pipeline.run_job(job_id, &request, cancel).await;
    watcher.abort();

    match result {
        Ok(output) => {
            if options.json {
                let summary = serde_json::json!({
                    "job_id": job_id.to_string(),
                    "output": output,
                    "stages": plan.iter().map(|s| s.as_str()).collect::<Vec<_>>(),
                });
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                println!("Processing complete!");
                println!("Output: {}", output.display());
            }
            Ok(())
        }
        Err(e) => {
            let kind = e.kind();
            Err(anyhow::Error::new(e).context(format!("Job {job_id} failed ({kind})")))
        }
    }
}

fn check_tools(config_path: Option<&Path>) -> Result<()> {
    println!("Checking external tools...\n");

    let config = Config::load_or_default(config_path)?;
    let registry = ToolRegistry::discover(&config.tools);
    let tools = registry.check_all();
    let mut all_ok = true;

    for tool in &tools {
        let status = if tool.available {
            "✓"
        } else {
            all_ok = false;
            "✗"
        };

        print!("{} {}", status, tool.name);

        if let Some(ref version) = tool.version {
            print!(" ({})", version.lines().next().unwrap_or(""));
        }

        if let Some(ref path) = tool.path {
            print!(" - {}", path.display());
        }

        println!();
    }

    println!();
    if all_ok {
        println!("All required tools are available!");
    } else {
        println!("Some tools are missing. Stages needing them will fail before starting.");
    }

    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    let config = match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            Config::load(p).with_context(|| format!("Invalid config file: {:?}", p))?
        }
        None => {
            println!("No config file specified, using defaults");
            Config::default()
        }
    };

    let warnings = config.validate();
    if warnings.is_empty() {
        println!("✓ Configuration is valid");
    } else {
        println!("✓ Configuration parsed with {} warning(s)", warnings.len());
        for warning in &warnings {
            println!("  ! {warning}");
        }
    }
    println!("  Work dir: {}", config.work.root_dir.display());
    println!("  Output dir: {}", config.work.output_dir.display());
    println!(
        "  Upscale: {}x ({})",
        config.upscale.scale, config.upscale.model
    );
    println!(
        "  Audio mix: voiceover {} / music {}",
        config.finalize.voiceover_volume, config.finalize.music_volume
    );

    Ok(())
}

fn render_subtitles(segments_path: &Path) -> Result<()> {
    let contents = std::fs::read_to_string(segments_path)
        .with_context(|| format!("Segments file does not exist: {:?}", segments_path))?;
    let segments: Vec<TimedSegment> =
        serde_json::from_str(&contents).context("Segments must be a JSON array")?;

    let merged = subtitles::merge_segments(Some(&SubtitleSource::Segments(segments)), &[])?;
    print!("{}", subtitles::to_srt(&merged));
    Ok(())
}
