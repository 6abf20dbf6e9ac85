use anyhow::{Context, Result};
use clap::Parser;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::time::Duration;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use talk_to_landing::{
    output, server, Cli, Commands, Config, GenerationRequest, GenerationRequestHandler, TranscriptAcquisitionPipeline,
    TranscriptResult, UsageGate, VideoId,
};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.json_logs);

    if let Err(e) = run(cli).await {
        eprintln!("{} {:#}", style("Error:").red().bold(), e);
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool, json: bool) {
    let default_filter = if verbose {
        "talk_to_landing=debug,talk2landing=debug"
    } else {
        "talk_to_landing=info,talk2landing=info"
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into());
    let registry = tracing_subscriber::registry().with(filter);

    // stdout carries command output
    if json {
        registry.with(fmt::layer().json().with_writer(std::io::stderr)).init();
    } else {
        registry.with(fmt::layer().with_writer(std::io::stderr)).init();
    }
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Transcript {
            video,
            output,
            format,
            manual,
        } => {
            let config = Config::load().await?;
            let pipeline = TranscriptAcquisitionPipeline::from_config(&config)?;
            let video_id = VideoId::parse(&video)?;

            let result = obtain_transcript(&pipeline, &video_id, manual.as_deref(), cli.quiet).await?;

            match output {
                Some(path) => {
                    output::save_to_file(&result, &path, format).await?;
                    println!("Transcript saved to: {}", path.display());
                }
                None => output::print_to_console(&result, format)?,
            }
        }
        Commands::Generate {
            video,
            user,
            manual,
            output,
        } => {
            let config = Config::load().await?;
            let pipeline = TranscriptAcquisitionPipeline::from_config(&config)?;
            let usage = UsageGate::from_config(&config, config.http_client()?)?;
            let handler = GenerationRequestHandler::from_config(&config, usage)?;
            let video_id = VideoId::parse(&video)?;

            // Fail fast before spending time on the transcript
            handler.usage().check(&user).await.map_err(user_facing)?;

            let transcript = obtain_transcript(&pipeline, &video_id, manual.as_deref(), cli.quiet).await?;

            let progress = spinner(cli.quiet, "Extracting framework...")?;
            let response = handler
                .handle(Some(user.as_str()), GenerationRequest::from(&transcript))
                .await;
            progress.finish_and_clear();
            handler.flush_logs().await;

            let response = response.map_err(user_facing)?;
            output::write_json(&response.content, output.as_deref())?;
            if let Some(path) = output {
                println!("Framework saved to: {}", path.display());
            }
        }
        Commands::Usage { user } => {
            let config = Config::load().await?;
            let gate = UsageGate::from_config(&config, config.http_client()?)?;
            let status = gate.status(&user).await.map_err(user_facing)?;

            let remaining = if status.allowed {
                style(status.remaining).green()
            } else {
                style(status.remaining).red()
            };
            println!(
                "{} of {} free generations used, {} remaining",
                status.used, status.limit, remaining
            );
        }
        Commands::Serve { bind } => {
            let config = Config::load().await?;
            server::serve(&config, bind.as_deref()).await?;
        }
        Commands::Config { show } => {
            let config = Config::load().await?;
            if show {
                config.display();
            } else {
                config.save().await?;
                println!("Configuration written to: {}", Config::config_path()?.display());
            }
        }
    }

    Ok(())
}

async fn obtain_transcript(
    pipeline: &TranscriptAcquisitionPipeline,
    video_id: &VideoId,
    manual: Option<&Path>,
    quiet: bool,
) -> Result<TranscriptResult> {
    if let Some(path) = manual {
        let text = fs_err::read_to_string(path).context("Failed to read transcript file")?;
        let info = pipeline.video_info(video_id).await;
        return TranscriptResult::manual(video_id, info, &text).map_err(user_facing);
    }

    let progress = spinner(quiet, "Fetching transcript...")?;
    let result = pipeline.acquire(video_id).await;

    match &result {
        Ok(r) => progress.finish_with_message(format!("Transcript ready ({})", r.source)),
        Err(_) => progress.finish_and_clear(),
    }

    result.map_err(user_facing)
}

fn spinner(quiet: bool, message: &'static str) -> Result<ProgressBar> {
    if quiet {
        return Ok(ProgressBar::hidden());
    }

    let progress = ProgressBar::new_spinner();
    progress.set_style(ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")?);
    progress.set_message(message);
    progress.enable_steady_tick(Duration::from_millis(100));
    Ok(progress)
}

/// Keep provider details in the log and show the neutral message
fn user_facing(err: talk_to_landing::PipelineError) -> anyhow::Error {
    tracing::debug!(error = %err, category = ?err.category(), "Pipeline error");
    anyhow::anyhow!(err.user_message())
}
