use serde::Serialize;
use tauri::{AppHandle, Manager};
use anyhow::Result;

use crate::speech::{SpeechDriver, UtteranceRequest};
use crate::state::AppState;

pub const TEST_PHRASE: &str = "Hello! VoiceAssist is ready to help you read text aloud.";

#[derive(Debug, Clone, Serialize)]
pub struct SpeechStatusReport {
    pub supported: bool,
    pub speaking: bool,
}

/// Tauri command: speak arbitrary text, overriding voice settings per call
#[tauri::command]
pub fn speak_text(
    app_handle: AppHandle,
    text: String,
    language: Option<String>,
    rate: Option<f32>,
    pitch: Option<f32>,
    volume: Option<f32>,
) -> Result<(), String> {
    let state = app_handle.state::<AppState>();
    let voice = state.settings.lock().unwrap().voice.clone();
    let mut request = UtteranceRequest::new(text).with_voice(&voice);
    if let Some(language) = language {
        request.language = language;
    }
    request.rate = rate.unwrap_or(request.rate);
    request.pitch = pitch.unwrap_or(request.pitch);
    request.volume = volume.unwrap_or(request.volume);
    with_driver(&app_handle, |d| d.speak(request)).map_err(|e| e.to_string())
}

#[tauri::command]
pub fn test_voice(app_handle: AppHandle) -> Result<(), String> {
    do_speak(&app_handle, TEST_PHRASE).map_err(|e| e.to_string())
}

#[tauri::command]
pub fn stop_speaking(app_handle: AppHandle) -> Result<(), String> {
    do_stop_speaking(&app_handle).map_err(|e| e.to_string())
}

#[tauri::command]
pub fn pause_speaking(app_handle: AppHandle) -> Result<bool, String> {
    with_driver(&app_handle, |d| d.pause()).map_err(|e| e.to_string())
}

#[tauri::command]
pub fn resume_speaking(app_handle: AppHandle) -> Result<bool, String> {
    with_driver(&app_handle, |d| d.resume()).map_err(|e| e.to_string())
}

#[tauri::command]
pub fn get_speech_status(app_handle: AppHandle) -> SpeechStatusReport {
    let state = app_handle.state::<AppState>();
    let speech = state.speech.lock().unwrap();
    SpeechStatusReport {
        supported: speech.as_ref().is_some_and(|d| d.is_available()),
        speaking: speech.as_ref().is_some_and(|d| d.is_speaking()),
    }
}

/// Internal: speak with the user's voice settings
pub fn do_speak(app_handle: &AppHandle, text: &str) -> Result<()> {
    let state = app_handle.state::<AppState>();
    let voice = state.settings.lock().unwrap().voice.clone();
    let request = UtteranceRequest::new(text).with_voice(&voice);
    with_driver(app_handle, |d| d.speak(request))
}

pub fn do_stop_speaking(app_handle: &AppHandle) -> Result<()> {
    with_driver(app_handle, |d| d.stop())?;
    tracing::info!("Speech manually stopped");
    Ok(())
}

fn with_driver<T>(app_handle: &AppHandle, f: impl FnOnce(&SpeechDriver) -> Result<T>) -> Result<T> {
    let state = app_handle.state::<AppState>();
    let speech = state.speech.lock().unwrap();
    let driver = speech
        .as_ref()
        .ok_or_else(|| anyhow::anyhow!("Text-to-Speech not supported"))?;
    f(driver)
}
