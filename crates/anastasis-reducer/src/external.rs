//! optional external reducer subprocess (§4.I, §6).
//!
//! when `ANASTASIS_EXTERNAL_REDUCER` names a binary, every action is
//! shelled out to it instead of dispatched internally: the child
//! receives `{state, action, arguments}` as stdin JSON, its stdout
//! JSON becomes the new state, and its exit code becomes the error
//! code (0 = `TALER_EC_NONE`).

use anastasis_types::{ErrorCode, ReducerError};
use serde_json::Value;
use std::io::Write;
use std::process::Stdio;

pub const EXTERNAL_REDUCER_ENV_VAR: &str = "ANASTASIS_EXTERNAL_REDUCER";

pub fn external_reducer_path() -> Option<String> {
    std::env::var(EXTERNAL_REDUCER_ENV_VAR).ok().filter(|s| !s.is_empty())
}

#[derive(serde::Serialize)]
struct ExternalRequest<'a> {
    state: &'a Value,
    action: &'a str,
    arguments: &'a Value,
}

/// shell out one action to the external reducer binary and block on
/// its result (§4.I). `tokio::task::spawn_blocking` keeps the
/// blocking `Command::wait` off the cooperative event loop described
/// in §5.
pub async fn run_external(binary: &str, state: &Value, action: &str, arguments: &Value) -> Result<Value, ReducerError> {
    let request = ExternalRequest { state, action, arguments };
    let stdin_json = serde_json::to_vec(&request)
        .map_err(|e| ReducerError::new(ErrorCode::ReducerInputInvalid, format!("failed to encode external-reducer request: {e}")))?;

    let binary = binary.to_string();
    let output = tokio::task::spawn_blocking(move || -> std::io::Result<std::process::Output> {
        let mut child = std::process::Command::new(&binary)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;
        child.stdin.take().expect("piped stdin").write_all(&stdin_json)?;
        child.wait_with_output()
    })
    .await
    .map_err(|e| ReducerError::new(ErrorCode::ReducerStateInvalid, format!("external reducer task panicked: {e}")))?
    .map_err(|e| ReducerError::new(ErrorCode::NetworkFailed, format!("failed to run external reducer: {e}")))?;

    let code = output.status.code().unwrap_or(-1);
    if code != ErrorCode::None.numeric() {
        let hint = String::from_utf8_lossy(&output.stderr).trim().to_string();
        return Err(ReducerError {
            code,
            hint: if hint.is_empty() { "external reducer reported an error".into() } else { hint },
            detail: None,
        });
    }

    serde_json::from_slice(&output.stdout)
        .map_err(|e| ReducerError::new(ErrorCode::ReducerStateInvalid, format!("external reducer produced invalid json: {e}")))
}
