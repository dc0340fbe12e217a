use anyhow::Result;
use tauri::{AppHandle, Manager, WebviewUrl, WebviewWindowBuilder};

pub const READER_LABEL: &str = "reader";
const WHATSAPP_WEB: &str = "https://web.whatsapp.com";
const TAP_CAPTURE_SCRIPT: &str = include_str!("../scripts/tap_capture.js");

/// Shows the reader window, creating it on first use. Every page loaded in
/// it gets the tap-capture script.
pub fn open_reader_window(app_handle: &AppHandle) -> Result<()> {
    if let Some(window) = app_handle.get_webview_window(READER_LABEL) {
        window.show()?;
        window.set_focus()?;
        return Ok(());
    }

    let url = WebviewUrl::External(WHATSAPP_WEB.parse::<tauri::Url>()?);
    let window = WebviewWindowBuilder::new(app_handle, READER_LABEL, url)
        .title("VoiceAssist Reader")
        .inner_size(1100.0, 800.0)
        .initialization_script(TAP_CAPTURE_SCRIPT)
        .build()?;

    let w = window.clone();
    window.on_window_event(move |event| {
        if let tauri::WindowEvent::CloseRequested { api, .. } = event {
            api.prevent_close();
            let _ = w.hide();
        }
    });

    tracing::info!("Reader window opened at {}", WHATSAPP_WEB);
    Ok(())
}

#[cfg(test)]
mod tests {
    fn capability(json: &str) -> serde_json::Value {
        serde_json::from_str(json).expect("valid capability json")
    }

    #[test]
    fn reader_window_gets_no_plugin_permissions() {
        let reader = capability(include_str!("../capabilities/reader.json"));
        assert_eq!(reader["windows"], serde_json::json!([super::READER_LABEL]));
        assert_eq!(reader["remote"]["urls"], serde_json::json!(["https://web.whatsapp.com/*"]));
        assert_eq!(reader["permissions"], serde_json::json!(["core:default"]));
    }

    #[test]
    fn remote_scope_is_limited_to_the_reader_capability() {
        let main = capability(include_str!("../capabilities/default.json"));
        assert_eq!(main["windows"], serde_json::json!(["main"]));
        assert!(main.get("remote").is_none());
        let permissions = main["permissions"].as_array().unwrap();
        assert!(permissions.iter().all(|p| p.as_str().is_some_and(|p| p.starts_with("core:"))));
    }
}
