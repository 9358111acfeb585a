// Prevents additional console window on Windows in release, DO NOT REMOVE!!
#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

mod commands;
mod picker;
mod state;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use atlas_backend::{BackendConfig, BuildMode};
use atlas_host::{Host, HostConfig};
use atlas_pty::MultiplexerConfig;
use state::AppState;
use tauri::{Manager, RunEvent};

fn main() {
    let log_level = if cfg!(debug_assertions) {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    tauri::Builder::default()
        .plugin(tauri_plugin_log::Builder::default().level(log_level).build())
        .plugin(tauri_plugin_dialog::init())
        .setup(|app| {
            let config = host_config(app)?;
            log::info!(
                "Launching backend ({:?}) on port {}",
                BuildMode::detect(),
                config.backend.port
            );

            // The window stays hidden until the backend answers its health
            // check; a failed launch aborts startup with the reason.
            let picker = Arc::new(picker::NativePicker::new(app.handle().clone()));
            let host = tauri::async_runtime::block_on(Host::launch(config, picker))?;
            app.manage(AppState::new(host));

            if let Some(window) = app.get_webview_window("main") {
                window.show()?;
            }
            Ok(())
        })
        .invoke_handler(tauri::generate_handler![
            commands::dialog::select_project_root,
            commands::dev::dev_read_dir,
            commands::dev::dev_read_file,
            commands::dev::dev_write_file,
            commands::terminal::terminal_start,
            commands::terminal::terminal_send,
            commands::terminal::terminal_stop,
            commands::terminal::terminal_resize,
            commands::terminal::terminal_subscribe,
        ])
        .build(tauri::generate_context!())
        .expect("error while building tauri application")
        .run(|app, event| {
            if let RunEvent::Exit = event {
                if let Some(state) = app.try_state::<AppState>() {
                    log::info!("App shutting down - stopping sessions and backend");
                    tauri::async_runtime::block_on(state.host.shutdown());
                }
            }
        });
}

fn host_config(app: &tauri::App) -> Result<HostConfig, Box<dyn std::error::Error>> {
    let resources_dir = app.path().resource_dir()?;
    let backend = BackendConfig::for_mode(BuildMode::detect(), &app_root(), &resources_dir);
    Ok(HostConfig {
        backend,
        terminals: MultiplexerConfig::default(),
    })
}

/// Source checkout root, where the development backend lives.
fn app_root() -> PathBuf {
    let root = Path::new(env!("CARGO_MANIFEST_DIR")).join("../..");
    root.canonicalize().unwrap_or(root)
}
