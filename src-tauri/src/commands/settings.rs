use serde::Serialize;
use tauri::{AppHandle, Emitter, Manager};
use crate::state::{AppState, ReadingMode, Settings, LANGUAGES};

#[derive(Debug, Clone, Serialize)]
pub struct Language {
    pub code: &'static str,
    pub name: &'static str,
}

#[tauri::command]
pub fn get_settings(app_handle: AppHandle) -> Result<Settings, String> {
    let state = app_handle.state::<AppState>();
    let settings = state.settings.lock().unwrap().clone();
    Ok(settings)
}

#[tauri::command]
pub fn update_settings(app_handle: AppHandle, settings: Settings) -> Result<Settings, String> {
    let settings = settings.sanitized();
    let state = app_handle.state::<AppState>();
    let previous = state.settings.lock().unwrap().clone();

    // Nothing is committed unless the new shortcuts register.
    crate::hotkey::swap_shortcuts(&previous.shortcuts, &settings.shortcuts, |shortcuts| {
        crate::hotkey::register_shortcuts(
            &app_handle,
            &shortcuts.toggle_listening,
            &shortcuts.stop_speaking,
        )
    })
    .map_err(|e| e.to_string())?;

    *state.settings.lock().unwrap() = settings.clone();
    if previous.reader.mode != settings.reader.mode {
        on_mode_changed(&app_handle, settings.reader.mode);
    }
    crate::persistence::save_settings(&app_handle);
    Ok(settings)
}

#[tauri::command]
pub fn set_reading_mode(app_handle: AppHandle, mode: ReadingMode) -> Result<(), String> {
    let current = app_handle.state::<AppState>().settings.lock().unwrap().reader.mode;
    if current == mode {
        return Ok(());
    }
    on_mode_changed(&app_handle, mode);
    crate::persistence::save_settings(&app_handle);
    Ok(())
}

#[tauri::command]
pub fn list_languages() -> Vec<Language> {
    LANGUAGES
        .iter()
        .map(|&(code, name)| Language { code, name })
        .collect()
}

#[tauri::command]
pub fn complete_onboarding(app_handle: AppHandle) -> Result<(), String> {
    let state = app_handle.state::<AppState>();
    state.settings.lock().unwrap().general.onboarding_completed = true;
    crate::persistence::save_settings(&app_handle);
    Ok(())
}

#[tauri::command]
pub fn get_app_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

/// Entering WhatsApp mode requires a fresh verification for this session;
/// listening stops until it succeeds.
fn on_mode_changed(app_handle: &AppHandle, mode: ReadingMode) {
    tracing::info!("Reading mode changed to {:?}", mode);
    let state = app_handle.state::<AppState>();
    if state.enter_mode(mode) {
        crate::commands::listening::finish_stop_listening(app_handle);
    }
    if mode == ReadingMode::WhatsApp {
        let status = state.gate.lock().unwrap().status();
        let _ = app_handle.emit("verification-changed", status);
    }
    crate::notify(app_handle, match mode {
        ReadingMode::WhatsApp => "WhatsApp mode enabled",
        ReadingMode::Document => "Document reading mode enabled",
    });
}
