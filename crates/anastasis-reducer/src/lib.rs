//! # anastasis-reducer
//!
//! the reducer shell of §4.I: one entry point, `apply_action`, taking
//! the current session state plus one action and producing either a
//! new state or a [`ReducerError`] (state left unchanged on failure).
//!
//! dispatches to [`handlers::backup`] or [`handlers::recovery`]
//! depending on which of `backup_state`/`recovery_state` the session
//! carries, handles the action names every state shares (`back`,
//! `add_provider`), and — if `ANASTASIS_EXTERNAL_REDUCER` is set —
//! shells the whole action out to an external binary instead (§6).

pub mod context;
pub mod countries;
pub mod external;
pub mod handlers;
pub mod state;

use anastasis_types::{ErrorCode, ReducerError};
use context::ReducerContext;
use serde_json::{Map, Value};
use state::{BackupState, Mode, RecoveryState};

/// fresh session state for starting a new backup, per §4.I's entry
/// point into the `CONTINENT_SELECTING` state.
pub fn start_backup() -> Map<String, Value> {
    let mut state = Map::new();
    state::set_backup_state(&mut state, BackupState::ContinentSelecting);
    state
}

/// fresh session state for starting a new recovery.
pub fn start_recovery() -> Map<String, Value> {
    let mut state = Map::new();
    state::set_recovery_state(&mut state, RecoveryState::ContinentSelecting);
    state
}

/// apply one action to `state`, in place. on failure `state` is left
/// untouched (every handler mutates a scratch copy first) and the
/// caller receives the [`ReducerError`] to surface verbatim (§4.I, §7).
///
/// if `ANASTASIS_EXTERNAL_REDUCER` is set, the action is shelled out
/// to that binary instead of dispatched by any of the logic below
/// (§6); this lets an alternative reducer implementation stand in
/// without the caller knowing the difference.
pub async fn apply_action(
    ctx: &ReducerContext,
    state: &Map<String, Value>,
    action: &str,
    arguments: &Value,
) -> Result<Map<String, Value>, ReducerError> {
    if let Some(binary) = external::external_reducer_path() {
        let new_state = external::run_external(&binary, &Value::Object(state.clone()), action, arguments).await?;
        return match new_state {
            Value::Object(map) => Ok(map),
            other => Err(ReducerError::new(
                ErrorCode::ReducerStateInvalid,
                format!("external reducer returned non-object state: {other}"),
            )),
        };
    }

    let mut scratch = state.clone();
    dispatch(ctx, &mut scratch, action, arguments).await?;
    Ok(scratch)
}

async fn dispatch(ctx: &ReducerContext, state: &mut Map<String, Value>, action: &str, args: &Value) -> Result<(), ReducerError> {
    let mode = state::mode_of(state)?;

    if action == "add_provider" {
        return match mode {
            Mode::Backup => handlers::backup::add_provider(ctx, state, args).await,
            Mode::Recovery => handlers::recovery::add_provider(ctx, state, args).await,
        };
    }

    if action == "back" {
        return back(mode, state);
    }

    match mode {
        Mode::Backup => handlers::backup::dispatch(ctx, state, action, args).await,
        Mode::Recovery => handlers::recovery::dispatch(ctx, state, action, args).await,
    }
}

/// the generic `back` action every non-terminal state supports
/// (§4.I): decrement to the previous state tag in the sequence.
/// `CHALLENGE_SOLVING` in recovery overrides this with a handler that
/// also discards in-flight challenge bookkeeping (§5 cancellation).
fn back(mode: Mode, state: &mut Map<String, Value>) -> Result<(), ReducerError> {
    match mode {
        Mode::Backup => {
            let tag = state::backup_state_tag(state)?;
            let previous = tag
                .previous()
                .ok_or_else(|| ReducerError::new(ErrorCode::ReducerActionInvalid, "already at the first backup state"))?;
            state::set_backup_state(state, previous);
            Ok(())
        }
        Mode::Recovery => {
            let tag = state::recovery_state_tag(state)?;
            if tag == RecoveryState::ChallengeSolving {
                return handlers::recovery::back_challenge_solving(state);
            }
            let previous = tag
                .previous()
                .ok_or_else(|| ReducerError::new(ErrorCode::ReducerActionInvalid, "already at the first recovery state"))?;
            state::set_recovery_state(state, previous);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn starts_backup_in_continent_selecting() {
        let ctx = ReducerContext::new();
        let state = start_backup();
        assert_eq!(state::backup_state_tag(&state).unwrap(), BackupState::ContinentSelecting);

        // an action not defined for this state is rejected without mutating state.
        let err = apply_action(&ctx, &state, "enter_secret", &Value::Null).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::ReducerActionInvalid.numeric());
    }

    #[tokio::test]
    async fn back_walks_backup_states_in_reverse() {
        let ctx = ReducerContext::new();
        let mut state = start_backup();
        state = apply_action(&ctx, &state, "select_continent", &serde_json::json!({"continent": "Europe"}))
            .await
            .unwrap();
        assert_eq!(state::backup_state_tag(&state).unwrap(), BackupState::CountrySelecting);

        state = apply_action(&ctx, &state, "back", &Value::Null).await.unwrap();
        assert_eq!(state::backup_state_tag(&state).unwrap(), BackupState::ContinentSelecting);

        let err = apply_action(&ctx, &state, "back", &Value::Null).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::ReducerActionInvalid.numeric());
    }

    #[tokio::test]
    async fn starts_recovery_in_continent_selecting() {
        let state = start_recovery();
        assert_eq!(state::recovery_state_tag(&state).unwrap(), RecoveryState::ContinentSelecting);
    }
}
