use std::time::Instant;
use serde::Serialize;
use tauri::{AppHandle, Emitter, Manager};
use anyhow::Result;

use crate::state::{AppState, ReadingMode};
use crate::tap::{TapGate, TapOutcome, TapSnapshot};

const HIGHLIGHT_MS: u64 = 1000;

#[derive(Debug, Clone, Serialize)]
pub struct TapHighlight {
    pub key: String,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum TapResult {
    Ignored { reason: String },
    NoText { hint: String },
    Spoken { key: String, text: String, highlight_ms: u64 },
}

/// Tauri command: called by the page script for every captured tap
#[tauri::command]
pub fn resolve_tap(app_handle: AppHandle, snapshot: TapSnapshot) -> Result<TapResult, String> {
    do_resolve_tap(&app_handle, &snapshot, Instant::now()).map_err(|e| e.to_string())
}

pub fn do_resolve_tap(app_handle: &AppHandle, snapshot: &TapSnapshot, now: Instant) -> Result<TapResult> {
    snapshot.validate()?;

    let state = app_handle.state::<AppState>();
    let gate = TapGate {
        listening: *state.listening.lock().unwrap(),
        verified: state.tap_verified(),
    };
    let outcome = state
        .resolver
        .lock()
        .unwrap()
        .resolve(snapshot, &snapshot.target, gate, now);

    let mode = state.settings.lock().unwrap().reader.mode;
    let result = outcome_to_result(outcome, mode);

    match result {
        TapResult::Spoken { ref key, ref text, .. } => {
            tracing::info!("Found text to speak: {}", preview(text));
            let _ = app_handle.emit("tap-highlight", TapHighlight {
                key: key.clone(),
                duration_ms: HIGHLIGHT_MS,
            });
            crate::commands::speech::do_speak(app_handle, text)?;
        }
        TapResult::NoText { ref hint } => {
            tracing::info!("No readable text found");
            let _ = app_handle.emit("tap-hint", hint);
        }
        TapResult::Ignored { ref reason } => {
            tracing::debug!("Tap ignored: {}", reason);
        }
    }
    Ok(result)
}

pub fn outcome_to_result(outcome: TapOutcome<usize>, mode: ReadingMode) -> TapResult {
    let ignored = |reason: &str| TapResult::Ignored { reason: reason.to_string() };
    match outcome {
        TapOutcome::Resolved { key, text, .. } => TapResult::Spoken { key, text, highlight_ms: HIGHLIGHT_MS },
        TapOutcome::NoReadableText => TapResult::NoText { hint: hint_for(mode).to_string() },
        TapOutcome::NotListening => ignored("not_listening"),
        TapOutcome::NotVerified => ignored("not_verified"),
        TapOutcome::Debounced => ignored("debounced"),
        TapOutcome::AlreadyRead => ignored("already_read"),
    }
}

fn hint_for(mode: ReadingMode) -> &'static str {
    match mode {
        ReadingMode::WhatsApp => "Tap on a WhatsApp message with text to hear it spoken",
        ReadingMode::Document => "Tap on a paragraph with text to hear it spoken",
    }
}

fn preview(text: &str) -> String {
    let mut out: String = text.chars().take(50).collect();
    if text.chars().count() > 50 {
        out.push_str("...");
    }
    out
}
