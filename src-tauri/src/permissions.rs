use std::time::Duration;
use anyhow::{Context, Result};
use serde::Serialize;
use tauri::{plugin::PermissionState, AppHandle, Emitter, Manager};
use tauri_plugin_notification::NotificationExt;

use crate::state::AppState;

const PROBE_TIMEOUT: Duration = Duration::from_secs(3);
const WATCH_INTERVAL: Duration = Duration::from_secs(30);

pub const INTERNET: &str = "Internet";
pub const BACKGROUND: &str = "Background";
pub const NOTIFICATIONS: &str = "Notifications";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PermissionStatus {
    pub name: String,
    pub description: String,
    pub granted: bool,
}

/// The three entries, always in this order.
pub fn compose(internet: bool, background: bool, notifications: bool) -> Vec<PermissionStatus> {
    [
        (INTERNET, "Access to internet for API calls", internet),
        (BACKGROUND, "Keep app running in background", background),
        (NOTIFICATIONS, "Show system notifications", notifications),
    ]
    .into_iter()
    .map(|(name, description, granted)| PermissionStatus {
        name: name.to_string(),
        description: description.to_string(),
        granted,
    })
    .collect()
}

pub fn initial() -> Vec<PermissionStatus> {
    compose(false, false, false)
}

pub fn all_granted(permissions: &[PermissionStatus]) -> bool {
    permissions.iter().all(|p| p.granted)
}

/// A failing permission query must not block the reader.
pub fn notification_granted(state: Result<PermissionState>) -> bool {
    match state {
        Ok(PermissionState::Granted) => true,
        Ok(_) => false,
        Err(e) => {
            tracing::warn!("Notification permission check failed: {}. Treating as granted.", e);
            true
        }
    }
}

pub fn background_granted(registration: Result<()>) -> bool {
    if let Err(e) = registration {
        tracing::warn!("Background registration failed: {}. Treating as granted.", e);
    }
    true
}

/// Connectivity check: a TCP connect to the whitelist host.
pub async fn probe_internet(endpoint: &str) -> bool {
    match try_connect(endpoint).await {
        Ok(()) => true,
        Err(e) => {
            tracing::info!("Offline: {:#}", e);
            false
        }
    }
}

async fn try_connect(endpoint: &str) -> Result<()> {
    let url = reqwest::Url::parse(endpoint).context("Invalid whitelist endpoint")?;
    let host = url
        .host_str()
        .ok_or_else(|| anyhow::anyhow!("Endpoint has no host: {}", endpoint))?
        .to_string();
    let port = url.port_or_known_default().unwrap_or(443);

    tokio::time::timeout(PROBE_TIMEOUT, tokio::net::TcpStream::connect((host.as_str(), port)))
        .await
        .context("Connection timed out")??;
    Ok(())
}

/// The tray icon is what keeps the app alive with every window closed.
fn register_background(app_handle: &AppHandle) -> Result<()> {
    if app_handle.tray_by_id(crate::TRAY_ID).is_none() {
        anyhow::bail!("Tray icon not available");
    }
    Ok(())
}

fn endpoint(app_handle: &AppHandle) -> String {
    let state = app_handle.state::<AppState>();
    let endpoint = state.settings.lock().unwrap().whitelist.endpoint.clone();
    endpoint
}

/// Current state without prompting the user.
pub async fn check(app_handle: &AppHandle) -> Vec<PermissionStatus> {
    let internet = probe_internet(&endpoint(app_handle)).await;
    let background = background_granted(register_background(app_handle));
    let notifications = notification_granted(
        app_handle.notification().permission_state().map_err(anyhow::Error::from),
    );
    store(app_handle, compose(internet, background, notifications))
}

/// Prompts for notifications and re-checks the rest.
pub async fn request(app_handle: &AppHandle) -> Vec<PermissionStatus> {
    tracing::info!("Requesting permissions...");
    let internet = probe_internet(&endpoint(app_handle)).await;
    let background = background_granted(register_background(app_handle));
    let notifications = notification_granted(
        app_handle.notification().request_permission().map_err(anyhow::Error::from),
    );

    let permissions = store(app_handle, compose(internet, background, notifications));
    if all_granted(&permissions) {
        crate::notify(app_handle, "All permissions granted! App is ready to use.");
    } else {
        crate::notify(app_handle, "Some permissions were not granted. App functionality may be limited.");
    }
    permissions
}

fn store(app_handle: &AppHandle, permissions: Vec<PermissionStatus>) -> Vec<PermissionStatus> {
    let state = app_handle.state::<AppState>();
    let changed = {
        let mut current = state.permissions.lock().unwrap();
        let changed = *current != permissions;
        *current = permissions.clone();
        changed
    };
    if changed {
        let _ = app_handle.emit("permissions-changed", &permissions);
    }
    permissions
}

/// Re-probes connectivity periodically; emits `permissions-changed` when
/// the Internet entry flips.
pub fn spawn_connectivity_watcher(app_handle: AppHandle) {
    tauri::async_runtime::spawn(async move {
        let mut ticker = tokio::time::interval(WATCH_INTERVAL);
        loop {
            ticker.tick().await;
            let online = probe_internet(&endpoint(&app_handle)).await;
            let mut permissions = app_handle.state::<AppState>().permissions.lock().unwrap().clone();
            if let Some(entry) = permissions.iter_mut().find(|p| p.name == INTERNET) {
                if entry.granted != online {
                    tracing::info!("Connectivity changed: online={}", online);
                    entry.granted = online;
                    store(&app_handle, permissions);
                }
            }
        }
    });
}
