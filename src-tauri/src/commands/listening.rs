use serde::Serialize;
use tauri::{AppHandle, Emitter, Manager};
use anyhow::Result;

use crate::platform;
use crate::state::{AppState, ReadingMode};

#[derive(Debug, Clone, Serialize)]
pub struct ListeningStatus {
    pub listening: bool,
    pub mode: ReadingMode,
    pub verified: bool,
}

#[tauri::command]
pub fn start_listening(app_handle: AppHandle) -> Result<ListeningStatus, String> {
    do_start_listening(&app_handle).map_err(|e| e.to_string())?;
    Ok(listening_status(&app_handle))
}

#[tauri::command]
pub fn stop_listening(app_handle: AppHandle) -> Result<ListeningStatus, String> {
    do_stop_listening(&app_handle).map_err(|e| e.to_string())?;
    Ok(listening_status(&app_handle))
}

#[tauri::command]
pub fn get_listening_status(app_handle: AppHandle) -> ListeningStatus {
    listening_status(&app_handle)
}

#[tauri::command]
pub fn open_reader(app_handle: AppHandle) -> Result<(), String> {
    crate::reader::open_reader_window(&app_handle).map_err(|e| e.to_string())
}

pub fn listening_status(app_handle: &AppHandle) -> ListeningStatus {
    let state = app_handle.state::<AppState>();
    let listening = *state.listening.lock().unwrap();
    let mode = state.settings.lock().unwrap().reader.mode;
    ListeningStatus {
        listening,
        mode,
        verified: state.tap_verified(),
    }
}

/// Internal: start resolving taps
pub fn do_start_listening(app_handle: &AppHandle) -> Result<()> {
    let state = app_handle.state::<AppState>();
    let mode = state.settings.lock().unwrap().reader.mode;

    if !state.tap_verified() {
        anyhow::bail!("Please verify your WhatsApp number first");
    }

    {
        let mut listening = state.listening.lock().unwrap();
        if *listening {
            return Ok(());
        }
        *listening = true;
    }
    state.resolver.lock().unwrap().reset();

    let bridge = platform::get_accessibility_bridge();
    if !bridge.is_accessibility_enabled() {
        tracing::warn!("Accessibility service not enabled; taps outside the reader will be missed");
        let _ = app_handle.emit("permission-missing", serde_json::json!({
            "permission": "accessibility"
        }));
    }

    emit_status(app_handle);
    crate::update_tray_listening(app_handle, true);
    crate::notify(app_handle, match mode {
        ReadingMode::WhatsApp => "Ready! Go to WhatsApp Web and tap any message to hear it",
        ReadingMode::Document => "Listening for document text...",
    });
    tracing::info!("Tap listening started ({:?} mode)", mode);
    Ok(())
}

/// Internal: stop resolving taps and silence any speech
pub fn do_stop_listening(app_handle: &AppHandle) -> Result<()> {
    if !app_handle.state::<AppState>().stop_listening() {
        return Ok(());
    }
    finish_stop_listening(app_handle);
    Ok(())
}

/// Side effects of a listening flag that has just been cleared.
pub fn finish_stop_listening(app_handle: &AppHandle) {
    if let Err(e) = crate::commands::speech::do_stop_speaking(app_handle) {
        tracing::warn!("Failed to stop speech: {}", e);
    }

    emit_status(app_handle);
    crate::update_tray_listening(app_handle, false);
    tracing::info!("Tap listening stopped");
}

pub fn do_toggle_listening(app_handle: &AppHandle) -> Result<()> {
    let listening = *app_handle.state::<AppState>().listening.lock().unwrap();
    if listening {
        do_stop_listening(app_handle)
    } else {
        do_start_listening(app_handle).inspect_err(|e| crate::notify(app_handle, &e.to_string()))
    }
}

fn emit_status(app_handle: &AppHandle) {
    let _ = app_handle.emit("listening-status", listening_status(app_handle));
}
