mod commands;
mod hotkey;
mod permissions;
mod persistence;
mod platform;
mod reader;
mod speech;
mod state;
mod tap;
mod whitelist;

use speech::{SpeechDriver, SpeechEvent, SpeechStatus};
use state::{AppState, ShortcutSettings};
use tauri::{
    menu::{Menu, MenuItem, PredefinedMenuItem},
    tray::{MouseButton, MouseButtonState, TrayIconBuilder, TrayIconEvent},
    AppHandle, Emitter, Manager,
};
use tauri_plugin_notification::NotificationExt;

pub const TRAY_ID: &str = "main";

/// Logs the message and shows it as a system notification.
pub fn notify(app_handle: &AppHandle, message: &str) {
    tracing::info!("{}", message);
    let sound = app_handle.state::<AppState>().settings.lock().unwrap().general.sound_feedback;
    let mut builder = app_handle.notification().builder().title("VoiceAssist").body(message);
    if sound {
        builder = builder.sound("default");
    }
    if let Err(e) = builder.show() {
        tracing::warn!("Failed to show notification: {}", e);
    }
}

pub fn update_tray_listening(app_handle: &AppHandle, listening: bool) {
    let state = app_handle.state::<AppState>();
    let item = state.tray_listen_item.lock().unwrap();
    if let Some(item) = item.as_ref() {
        let label = if listening { "Stop Listening" } else { "Start Listening" };
        if let Err(e) = item.set_text(label) {
            tracing::warn!("Failed to update tray item: {}", e);
        }
    }
}

fn show_main_window(app_handle: &AppHandle) {
    if let Some(window) = app_handle.get_webview_window("main") {
        let _ = window.show();
        let _ = window.set_focus();
    }
}

fn spawn_speech_driver(app_handle: &AppHandle) {
    let handle = app_handle.clone();
    let status = SpeechStatus::new(move |event| {
        let _ = handle.emit("speech-status", event);
        if let SpeechEvent::Error { message } = event {
            let _ = handle.emit("speech-error", message);
            notify(&handle, &format!("Speech error: {}", message));
        }
    });

    match SpeechDriver::spawn(speech::native::create_backend, status) {
        Ok(driver) => {
            *app_handle.state::<AppState>().speech.lock().unwrap() = Some(driver);
            tracing::info!("Speech driver started");
        }
        Err(e) => tracing::error!("Failed to start speech driver: {}", e),
    }
}

#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    tracing_subscriber::fmt::init();

    tracing::info!("Starting VoiceAssist v{}", env!("CARGO_PKG_VERSION"));

    tauri::Builder::default()
        .plugin(tauri_plugin_opener::init())
        .plugin(tauri_plugin_global_shortcut::Builder::new().build())
        .plugin(tauri_plugin_store::Builder::new().build())
        .plugin(tauri_plugin_notification::init())
        .manage(AppState::new())
        .invoke_handler(tauri::generate_handler![
            commands::speech::speak_text,
            commands::speech::test_voice,
            commands::speech::stop_speaking,
            commands::speech::pause_speaking,
            commands::speech::resume_speaking,
            commands::speech::get_speech_status,
            commands::tap::resolve_tap,
            commands::listening::start_listening,
            commands::listening::stop_listening,
            commands::listening::get_listening_status,
            commands::listening::open_reader,
            commands::whitelist::fetch_whitelist,
            commands::whitelist::check_whitelist,
            commands::whitelist::get_verification,
            commands::whitelist::clear_verification,
            commands::permissions::get_permissions,
            commands::permissions::request_permissions,
            commands::permissions::check_accessibility_permission,
            commands::permissions::request_accessibility_permission,
            commands::permissions::open_setup_instructions,
            commands::settings::get_settings,
            commands::settings::update_settings,
            commands::settings::set_reading_mode,
            commands::settings::list_languages,
            commands::settings::complete_onboarding,
            commands::settings::get_app_version,
        ])
        .setup(|app| {
            #[cfg(target_os = "macos")]
            {
                use objc2_app_kit::NSApplication;
                use objc2_app_kit::NSApplicationActivationPolicy;
                let mtm = unsafe { objc2::MainThreadMarker::new_unchecked() };
                let ns_app = NSApplication::sharedApplication(mtm);
                ns_app.setActivationPolicy(NSApplicationActivationPolicy::Accessory);
            }

            // Settings first: the tray shows the saved shortcut
            let loaded = persistence::load_settings(app.handle());
            let saved_shortcuts = loaded.shortcuts.clone();
            {
                let state = app.state::<AppState>();
                *state.settings.lock().unwrap() = loaded;
                tracing::info!("Settings loaded from store");
            }

            spawn_speech_driver(app.handle());

            let header = MenuItem::with_id(app, "header", "VoiceAssist", false, None::<&str>)?;
            let toggle_listening = MenuItem::with_id(
                app,
                "toggle_listening",
                "Start Listening",
                true,
                None::<&str>,
            )?;
            let shortcut_label = format!(
                "  Shortcut: {}",
                hotkey::shortcut_display_label(&saved_shortcuts.toggle_listening)
            );
            let shortcut_hint =
                MenuItem::with_id(app, "shortcut_hint", &shortcut_label, false, None::<&str>)?;
            let stop_speaking =
                MenuItem::with_id(app, "stop_speaking", "Stop Speaking", true, None::<&str>)?;
            let test_voice = MenuItem::with_id(app, "test_voice", "Test Voice", true, None::<&str>)?;
            let open_reader =
                MenuItem::with_id(app, "open_reader", "Open WhatsApp Reader", true, None::<&str>)?;
            let show_settings = MenuItem::with_id(
                app,
                "show_settings",
                "Preferences...",
                true,
                Some("CmdOrCtrl+,"),
            )?;
            let quit = MenuItem::with_id(app, "quit", "Quit", true, Some("CmdOrCtrl+Q"))?;

            {
                let state = app.state::<AppState>();
                *state.tray_listen_item.lock().unwrap() = Some(toggle_listening.clone());
            }

            let separator1 = PredefinedMenuItem::separator(app)?;
            let separator2 = PredefinedMenuItem::separator(app)?;
            let separator3 = PredefinedMenuItem::separator(app)?;

            let menu = Menu::with_items(
                app,
                &[
                    &header,
                    &separator1,
                    &toggle_listening,
                    &shortcut_hint,
                    &stop_speaking,
                    &test_voice,
                    &separator2,
                    &open_reader,
                    &show_settings,
                    &separator3,
                    &quit,
                ],
            )?;

            let tray_icon = tauri::image::Image::from_bytes(include_bytes!("../icons/tray-icon.png"))?;
            let _tray = TrayIconBuilder::with_id(TRAY_ID)
                .icon(tray_icon)
                .icon_as_template(true)
                .menu(&menu)
                .tooltip("VoiceAssist")
                .on_menu_event(|app, event| match event.id.as_ref() {
                    "toggle_listening" => {
                        if let Err(e) = commands::listening::do_toggle_listening(app) {
                            tracing::warn!("Toggle listening failed: {}", e);
                        }
                    }
                    "stop_speaking" => {
                        if let Err(e) = commands::speech::do_stop_speaking(app) {
                            tracing::warn!("Stop speaking failed: {}", e);
                        }
                    }
                    "test_voice" => {
                        if let Err(e) = commands::speech::do_speak(app, commands::speech::TEST_PHRASE) {
                            notify(app, &format!("Speech error: {}", e));
                        }
                    }
                    "open_reader" => {
                        if let Err(e) = reader::open_reader_window(app) {
                            tracing::warn!("Failed to open reader: {}", e);
                        }
                    }
                    "show_settings" => show_main_window(app),
                    "quit" => {
                        app.exit(0);
                    }
                    _ => {}
                })
                .on_tray_icon_event(|tray, event| {
                    if let TrayIconEvent::Click {
                        button: MouseButton::Left,
                        button_state: MouseButtonState::Up,
                        ..
                    } = event
                    {
                        show_main_window(tray.app_handle());
                    }
                })
                .build(app)?;

            // Register the saved shortcuts, falling back to the defaults on failure
            if let Err(e) = hotkey::register_shortcuts(
                app.handle(),
                &saved_shortcuts.toggle_listening,
                &saved_shortcuts.stop_speaking,
            ) {
                let defaults = ShortcutSettings::default();
                tracing::warn!("Failed to register saved shortcuts: {}. Falling back to defaults.", e);
                if saved_shortcuts != defaults {
                    if let Err(e2) = hotkey::register_shortcuts(
                        app.handle(),
                        &defaults.toggle_listening,
                        &defaults.stop_speaking,
                    ) {
                        tracing::error!("Failed to register default shortcuts: {}", e2);
                    } else {
                        let state = app.state::<AppState>();
                        state.settings.lock().unwrap().shortcuts = defaults;
                        persistence::save_settings(app.handle());
                    }
                }
            }

            // Closing the main window keeps the app in the tray unless
            // background mode is off.
            if let Some(window) = app.get_webview_window("main") {
                let w = window.clone();
                let handle = app.handle().clone();
                window.on_window_event(move |event| {
                    if let tauri::WindowEvent::CloseRequested { api, .. } = event {
                        if handle.state::<AppState>().hides_on_close() {
                            api.prevent_close();
                            let _ = w.hide();
                        } else {
                            tracing::info!("Main window closed with background mode off; quitting");
                            handle.exit(0);
                        }
                    }
                });
            }

            {
                let state = app.state::<AppState>();
                let onboarding_completed = state.settings.lock().unwrap().general.onboarding_completed;
                if !onboarding_completed {
                    show_main_window(app.handle());
                    let _ = app.emit("navigate-tab", "onboarding");
                } else if !platform::get_accessibility_bridge().is_accessibility_enabled() {
                    let _ = app.emit("permission-missing", serde_json::json!({
                        "permission": "accessibility"
                    }));
                }
            }

            let handle = app.handle().clone();
            tauri::async_runtime::spawn(async move {
                if let Err(e) = commands::whitelist::refresh_whitelist(&handle, false).await {
                    tracing::warn!("Initial whitelist load failed: {}", e);
                }
                permissions::check(&handle).await;
            });
            permissions::spawn_connectivity_watcher(app.handle().clone());

            tracing::info!("App setup complete");

            Ok(())
        })
        .run(tauri::generate_context!())
        .expect("error while running tauri application");
}
