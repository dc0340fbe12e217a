use serde::Serialize;
use tauri::AppHandle;

use crate::permissions::{self, PermissionStatus};
use crate::platform;

#[derive(Debug, Clone, Serialize)]
pub struct PermissionReport {
    pub permissions: Vec<PermissionStatus>,
    pub all_granted: bool,
}

impl From<Vec<PermissionStatus>> for PermissionReport {
    fn from(permissions: Vec<PermissionStatus>) -> Self {
        let all_granted = permissions::all_granted(&permissions);
        Self { permissions, all_granted }
    }
}

#[tauri::command]
pub async fn get_permissions(app_handle: AppHandle) -> PermissionReport {
    permissions::check(&app_handle).await.into()
}

#[tauri::command]
pub async fn request_permissions(app_handle: AppHandle) -> PermissionReport {
    permissions::request(&app_handle).await.into()
}

#[tauri::command]
pub fn check_accessibility_permission() -> Result<bool, String> {
    let bridge = platform::get_accessibility_bridge();
    Ok(bridge.is_accessibility_enabled())
}

#[tauri::command]
pub fn request_accessibility_permission(app_handle: AppHandle) -> Result<bool, String> {
    let bridge = platform::get_accessibility_bridge();
    match bridge.request_accessibility_permission() {
        Ok(()) => {
            crate::notify(&app_handle, bridge.setup_instructions());
            Ok(true)
        }
        Err(e) => {
            tracing::error!("Failed to request accessibility permission: {}", e);
            crate::notify(
                &app_handle,
                "Failed to open accessibility settings. Please enable VoiceAssist in Accessibility settings manually.",
            );
            Ok(false)
        }
    }
}

#[tauri::command]
pub fn open_setup_instructions(app_handle: AppHandle) -> String {
    let instructions = platform::get_accessibility_bridge().setup_instructions();
    crate::notify(&app_handle, instructions);
    instructions.to_string()
}
