//! Tauri commands for terminal sessions.
//!
//! Input, resize and stop are synchronous commands so they are handled in
//! the order the frontend sent them. Ids that do not parse cannot name a
//! live session and are treated like any other unknown session.

use atlas_host::{CommandError, StartedSession};
use atlas_pty::{SessionId, TerminalEvent};
use tauri::ipc::Channel;

use crate::state::AppState;

/// Start a shell in the project's root directory.
#[tauri::command]
pub async fn terminal_start(
    state: tauri::State<'_, AppState>,
    project_id: String,
) -> Result<StartedSession, CommandError> {
    state.host.bus().start_session(&project_id).await
}

#[tauri::command]
pub fn terminal_send(
    state: tauri::State<'_, AppState>,
    terminal_id: String,
    data: String,
) -> Result<(), CommandError> {
    match SessionId::parse(&terminal_id) {
        Some(id) => state.host.bus().send_input(id, &data),
        None => Ok(()),
    }
}

#[tauri::command]
pub fn terminal_resize(
    state: tauri::State<'_, AppState>,
    terminal_id: String,
    cols: u16,
    rows: u16,
) -> Result<(), CommandError> {
    match SessionId::parse(&terminal_id) {
        Some(id) => state.host.bus().resize_session(id, cols, rows),
        None => Ok(()),
    }
}

/// Fire-and-forget: queue the stop and return.
#[tauri::command]
pub fn terminal_stop(state: tauri::State<'_, AppState>, terminal_id: String) {
    if let Some(id) = SessionId::parse(&terminal_id) {
        state.host.bus().stop_session(id);
    }
}

/// Attach `channel` as the single receiver of all sessions' output.
///
/// A later subscription replaces this one; the forwarding task ends when
/// either side goes away.
#[tauri::command]
pub fn terminal_subscribe(state: tauri::State<'_, AppState>, channel: Channel<TerminalEvent>) {
    let mut events = state.host.bus().subscribe();
    tauri::async_runtime::spawn(async move {
        while let Some(event) = events.recv().await {
            if let Err(e) = channel.send(event) {
                log::warn!("Terminal event channel closed: {e}");
                break;
            }
        }
    });
}
