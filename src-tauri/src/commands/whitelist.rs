use tauri::{AppHandle, Emitter, Manager};
use anyhow::Result;

use crate::persistence;
use crate::state::{AppState, ReadingMode};
use crate::whitelist::{self, VerificationStatus};

/// Tauri command: refetch the whitelist now, ignoring the cache
#[tauri::command]
pub async fn fetch_whitelist(app_handle: AppHandle) -> Result<VerificationStatus, String> {
    refresh_whitelist(&app_handle, true).await.map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn check_whitelist(app_handle: AppHandle, number: String) -> Result<VerificationStatus, String> {
    do_check_whitelist(&app_handle, &number).await.map_err(|e| e.to_string())
}

#[tauri::command]
pub fn get_verification(app_handle: AppHandle) -> VerificationStatus {
    app_handle.state::<AppState>().gate.lock().unwrap().status()
}

#[tauri::command]
pub fn clear_verification(app_handle: AppHandle) -> Result<VerificationStatus, String> {
    let store = persistence::open_store(&app_handle).map_err(|e| e.to_string())?;
    let state = app_handle.state::<AppState>();
    let status = {
        let mut gate = state.gate.lock().unwrap();
        gate.clear(store.as_ref()).map_err(|e| e.to_string())?;
        gate.status()
    };
    after_verification_change(&app_handle, &status);
    Ok(status)
}

/// Fetches a fresh list when forced, never loaded, or past its TTL, then
/// re-validates any saved verification against it.
pub async fn refresh_whitelist(app_handle: &AppHandle, force: bool) -> Result<VerificationStatus> {
    let state = app_handle.state::<AppState>();
    let settings = state.settings.lock().unwrap().whitelist.clone();

    let needs_fetch = force || state.gate.lock().unwrap().needs_refresh(settings.cache_ttl());
    if !needs_fetch {
        return Ok(state.gate.lock().unwrap().status());
    }

    let list = whitelist::fetch(&settings).await;
    let store = persistence::open_store(app_handle)?;
    let status = {
        let mut gate = state.gate.lock().unwrap();
        gate.install(list);
        gate.restore(store.as_ref());
        gate.status()
    };
    after_verification_change(app_handle, &status);
    Ok(status)
}

pub async fn do_check_whitelist(app_handle: &AppHandle, number: &str) -> Result<VerificationStatus> {
    if number.trim().is_empty() {
        anyhow::bail!("Please enter a WhatsApp number");
    }
    refresh_whitelist(app_handle, false).await?;

    let store = persistence::open_store(app_handle)?;
    let state = app_handle.state::<AppState>();
    let (verified, status) = {
        let mut gate = state.gate.lock().unwrap();
        let verified = gate.check(number, store.as_ref());
        (verified, gate.status())
    };

    if verified {
        crate::notify(app_handle, "WhatsApp number verified! TTS enabled.");
    } else {
        crate::notify(app_handle, "WhatsApp number not whitelisted. TTS disabled.");
    }
    after_verification_change(app_handle, &status);
    Ok(status)
}

fn after_verification_change(app_handle: &AppHandle, status: &VerificationStatus) {
    let _ = app_handle.emit("verification-changed", status);

    let state = app_handle.state::<AppState>();
    let mode = state.settings.lock().unwrap().reader.mode;
    let listening = *state.listening.lock().unwrap();
    if listening && mode == ReadingMode::WhatsApp && !status.verified {
        tracing::info!("Verification lost while listening; stopping");
        if let Err(e) = crate::commands::listening::do_stop_listening(app_handle) {
            tracing::warn!("Failed to stop listening: {}", e);
        }
    }
}
