//! anastasis-cli - drive the anastasis reducer from the command line.
//!
//! usage:
//!   anastasis-cli -b [output-file]                     # start a fresh backup session
//!   anastasis-cli -r [output-file]                     # start a fresh recovery session
//!   anastasis-cli <action> [state-file] [output-file]  # apply one action
//!   anastasis-cli <action> -a '{"k":"v"}' [state-file] [output-file]
//!
//! state flows in on `state-file` (stdin if omitted) and out on
//! `output-file` (stdout if omitted), one action per invocation — the
//! same contract `ANASTASIS_EXTERNAL_REDUCER` implementations speak.

mod config;

use anastasis_reducer::context::ReducerContext;
use clap::Parser;
use serde_json::Value;
use std::io::{Read, Write};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "anastasis-cli")]
#[command(about = "command line driver for the anastasis key-escrow reducer")]
#[command(version)]
struct Args {
    /// start a new backup session instead of applying an action
    #[arg(short = 'b', long)]
    backup: bool,

    /// start a new recovery session instead of applying an action
    #[arg(short = 'r', long)]
    restore: bool,

    /// JSON-encoded arguments for the action
    #[arg(short = 'a', long = "arguments")]
    arguments: Option<String>,

    /// action name (ignored with -b/-r, where it names the output file)
    action_or_output: Option<String>,

    /// path to the file holding the previous state (stdin if omitted)
    state_file: Option<String>,

    /// path to write the resulting state to (stdout if omitted)
    output_file: Option<String>,
}

fn persist_state(state: &Value, path: Option<&str>) -> anyhow::Result<()> {
    let compact = serde_json::to_string(state)?;
    match path {
        Some(path) => std::fs::write(path, compact)?,
        None => {
            std::io::stdout().write_all(compact.as_bytes())?;
        }
    }
    Ok(())
}

fn read_state(path: Option<&str>) -> anyhow::Result<Value> {
    let text = match path {
        Some(path) => std::fs::read_to_string(path)?,
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };
    Ok(serde_json::from_str(&text)?)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = config::ReducerConfig::load()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(config.log_filter.clone().unwrap_or_else(|| "anastasis_cli=info".to_string())))
        .init();

    let args = Args::parse();
    if args.backup && args.restore {
        tracing::error!("cannot start a backup and a recovery session at the same time");
        std::process::exit(1);
    }

    let ctx = ReducerContext::new();

    if args.backup || args.restore {
        let mut state = if args.backup { anastasis_reducer::start_backup() } else { anastasis_reducer::start_recovery() };
        for provider_url in &config.default_providers {
            let provider_args = serde_json::json!({ "provider_url": provider_url });
            match anastasis_reducer::apply_action(&ctx, &state, "add_provider", &provider_args).await {
                Ok(next) => state = next,
                Err(e) => tracing::warn!(%provider_url, error = %e, "failed to add default provider"),
            }
        }
        persist_state(&Value::Object(state), args.action_or_output.as_deref())?;
        return Ok(());
    }

    let Some(action) = args.action_or_output else {
        tracing::error!("an action name is required (or pass -b/-r to start a session)");
        std::process::exit(1);
    };

    let arguments: Value = match &args.arguments {
        Some(raw) => serde_json::from_str(raw)?,
        None => Value::Null,
    };

    let prev_state = read_state(args.state_file.as_deref())?;
    let Value::Object(prev_state) = prev_state else {
        tracing::error!("state must be a json object");
        std::process::exit(1);
    };

    match anastasis_reducer::apply_action(&ctx, &prev_state, &action, &arguments).await {
        Ok(next_state) => {
            persist_state(&Value::Object(next_state), args.output_file.as_deref())?;
            Ok(())
        }
        Err(err) => {
            tracing::error!(code = err.code, hint = %err.hint, "reducer action failed");
            persist_state(&Value::Object(prev_state), args.output_file.as_deref())?;
            std::process::exit(1);
        }
    }
}
