//! aitask CLI - run streaming AI tasks against recorded data and model scripts
//!
//! Main entry point for the aitask command-line tool.

use aitask::config::LoggingConfig;
use aitask::tasks::{EnhanceArgs, TitleArgs};
use aitask::{
    load_config, CurrentStep, GenerateOptions, InMemoryStore, TaskArgs, TaskConfigs, TaskId,
    TaskRegistry, TaskStatus, TaskType,
};
use aitask_core::testing::ScriptedModel;
use aitask_core::ToolSet;
use anyhow::Context;
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "aitask")]
#[command(about = "aitask - Streaming AI task runner", long_about = None)]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Configuration file (TOML, YAML or JSON); defaults to ~/.aitask and ./.aitask
    #[arg(short, long, global = true, env = "AITASK_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one task and print its output as it streams
    Run {
        /// Task type: enhance or title
        #[arg(short, long)]
        task: TaskType,
        /// Session to work on
        #[arg(short, long)]
        session: String,
        /// Enhanced note id (enhance only, defaults to "<session>-note")
        #[arg(long)]
        note: Option<String>,
        /// Template id (enhance only)
        #[arg(long)]
        template: Option<String>,
        /// JSON data fixture
        #[arg(short, long)]
        data: PathBuf,
        /// JSON model script
        #[arg(short = 'm', long)]
        script: PathBuf,
        /// Print the final state as JSON instead of streaming text
        #[arg(long)]
        json: bool,
    },

    /// Print the effective configuration
    Config {
        /// Output format: toml (default), yaml, json
        #[arg(short, long, default_value = "toml")]
        format: String,
    },
}

fn init_logging(config: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match config.format.as_str() {
        "pretty" => builder.pretty().init(),
        "full" => builder.init(),
        _ => builder.compact().init(),
    }
}

fn describe(step: &CurrentStep) -> Option<String> {
    match step {
        CurrentStep::Generating => None,
        CurrentStep::ToolCall { tool_name } => Some(format!("calling {tool_name}")),
        CurrentStep::ToolResult { tool_name } => Some(format!("{tool_name} returned")),
        CurrentStep::AnalyzingStructure => Some("analyzing structure".to_string()),
        CurrentStep::Retrying { attempt } => Some(format!("retrying (attempt {attempt})")),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref()).await?;
    init_logging(&config.logging);

    match cli.command {
        Commands::Config { format } => {
            let rendered = match format.as_str() {
                "toml" => toml::to_string_pretty(&config)?,
                "yaml" => serde_yaml::to_string(&config)?,
                "json" => serde_json::to_string_pretty(&config)?,
                other => anyhow::bail!("unknown format '{other}' (expected toml, yaml or json)"),
            };
            println!("{rendered}");
            Ok(())
        }
        Commands::Run {
            task,
            session,
            note,
            template,
            data,
            script,
            json,
        } => {
            let store = InMemoryStore::load(&data)
                .await
                .with_context(|| format!("loading data fixture {}", data.display()))?;
            let model = ScriptedModel::load(&script)
                .await
                .with_context(|| format!("loading model script {}", script.display()))?;
            let registry = TaskRegistry::new(
                TaskConfigs::from_config(&config)?,
                Arc::new(store),
                ToolSet::new(),
            );

            let (task_id, args): (TaskId, TaskArgs) = match task {
                TaskType::Enhance => {
                    let note = note.unwrap_or_else(|| format!("{session}-note"));
                    let mut args = EnhanceArgs::new(&session, &note);
                    args.template_id = template;
                    (TaskId::enhance(note), args.into())
                }
                TaskType::Title => (TaskId::title(&session), TitleArgs::new(&session).into()),
            };

            let mut updates = registry.subscribe();
            let printer_id = task_id.clone();
            let printer = tokio::spawn(async move {
                let mut printed = 0;
                let mut last_step = None;
                loop {
                    let update = match updates.recv().await {
                        Ok(update) => update,
                        Err(RecvError::Lagged(skipped)) => {
                            warn!(skipped, "Display fell behind");
                            continue;
                        }
                        Err(RecvError::Closed) => break,
                    };
                    if update.task_id != printer_id {
                        continue;
                    }

                    let state = update.state;
                    if state.current_step != last_step {
                        if let Some(message) = state.current_step.as_ref().and_then(describe) {
                            if !json {
                                eprintln!("[{message}]");
                            }
                        }
                        last_step = state.current_step.clone();
                    }
                    let text = &state.streamed_text;
                    if !json && text.len() > printed && text.is_char_boundary(printed) {
                        print!("{}", &text[printed..]);
                        let _ = std::io::stdout().flush();
                        printed = text.len();
                    }
                    if !state.is_generating() {
                        break;
                    }
                }
                printed
            });

            let options = GenerateOptions::new(Arc::new(model), args).on_complete(|text| {
                info!(chars = text.len(), "Output complete");
            });
            let generate = registry.generate(task_id.clone(), options);
            tokio::pin!(generate);

            let state = tokio::select! {
                state = &mut generate => state,
                _ = tokio::signal::ctrl_c() => {
                    eprintln!("\nCancelling...");
                    registry.cancel(&task_id);
                    generate.await
                }
            };
            let printed = printer.await.unwrap_or(0);

            if json {
                let output = serde_json::json!({
                    "task_id": task_id.to_string(),
                    "status": state.status,
                    "streamed_text": state.streamed_text,
                    "steps": state.steps,
                    "error": state.error.as_ref().map(|e| e.to_string()),
                });
                println!("{}", serde_json::to_string_pretty(&output)?);
            } else if state.streamed_text.len() > printed
                && state.streamed_text.is_char_boundary(printed)
            {
                print!("{}", &state.streamed_text[printed..]);
            }

            match state.status {
                TaskStatus::Success => {
                    if !json {
                        println!();
                    }
                    Ok(())
                }
                TaskStatus::Error => {
                    let message = state
                        .error
                        .as_ref()
                        .map(|e| e.to_string())
                        .unwrap_or_else(|| "unknown error".to_string());
                    anyhow::bail!("task {task_id} failed: {message}")
                }
                TaskStatus::Idle | TaskStatus::Generating => {
                    eprintln!("Task {task_id} cancelled");
                    Ok(())
                }
            }
        }
    }
}
