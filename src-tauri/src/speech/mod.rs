pub mod driver;
pub mod native;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use anyhow::Result;
use serde::{Deserialize, Serialize};

pub use driver::SpeechDriver;

pub const DEFAULT_LANGUAGE: &str = "en-US";

/// A single unit of text for the speech engine, with web-speech style
/// parameters: rate and pitch are multipliers around 1.0, volume is 0..=1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UtteranceRequest {
    pub text: String,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default = "one")]
    pub rate: f32,
    #[serde(default = "one")]
    pub pitch: f32,
    #[serde(default = "one")]
    pub volume: f32,
}

fn default_language() -> String {
    DEFAULT_LANGUAGE.to_string()
}

fn one() -> f32 {
    1.0
}

impl UtteranceRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            language: default_language(),
            rate: 1.0,
            pitch: 1.0,
            volume: 1.0,
        }
    }

    pub fn with_voice(mut self, voice: &crate::state::VoiceSettings) -> Self {
        self.language = voice.language.clone();
        self.rate = voice.rate;
        self.pitch = voice.pitch;
        self.volume = voice.volume;
        self
    }

    /// Missing, zero or non-finite parameters fall back to their defaults.
    pub fn normalized(mut self) -> Self {
        if self.language.trim().is_empty() {
            self.language = default_language();
        }
        for value in [&mut self.rate, &mut self.pitch, &mut self.volume] {
            if !value.is_finite() || *value <= 0.0 {
                *value = 1.0;
            }
        }
        self.volume = self.volume.min(1.0);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SpeechEvent {
    Started,
    Ended,
    Stopped,
    Paused,
    Resumed,
    Error { message: String },
}

/// Shared "is speaking" flag plus the observer that forwards speech events
/// to the UI. Engine callbacks and the session both report through here.
#[derive(Clone)]
pub struct SpeechStatus {
    speaking: Arc<AtomicBool>,
    observer: Arc<dyn Fn(&SpeechEvent) + Send + Sync>,
}

impl SpeechStatus {
    pub fn new(observer: impl Fn(&SpeechEvent) + Send + Sync + 'static) -> Self {
        Self {
            speaking: Arc::new(AtomicBool::new(false)),
            observer: Arc::new(observer),
        }
    }

    pub fn silent() -> Self {
        Self::new(|_| {})
    }

    pub fn is_speaking(&self) -> bool {
        self.speaking.load(Ordering::SeqCst)
    }

    pub fn notify(&self, event: SpeechEvent) {
        match event {
            SpeechEvent::Started | SpeechEvent::Resumed => self.speaking.store(true, Ordering::SeqCst),
            SpeechEvent::Ended | SpeechEvent::Stopped | SpeechEvent::Error { .. } => {
                self.speaking.store(false, Ordering::SeqCst)
            }
            SpeechEvent::Paused => {}
        }
        (self.observer)(&event);
    }
}

/// Platform speech engine seam.
pub trait SpeechBackend {
    fn speak(&mut self, request: &UtteranceRequest) -> Result<()>;
    fn cancel(&mut self) -> Result<()>;
    /// Whether the engine reports utterance begin/end through `SpeechStatus`.
    fn reports_callbacks(&self) -> bool;
    fn is_speaking(&self) -> Result<bool>;

    fn supports_pause(&self) -> bool {
        false
    }

    fn pause(&mut self) -> Result<()> {
        anyhow::bail!("Pause not supported by this speech engine")
    }

    fn resume(&mut self) -> Result<()> {
        anyhow::bail!("Resume not supported by this speech engine")
    }
}

#[derive(Debug, Clone)]
enum Paused {
    Native,
    /// Engine cannot pause; the utterance is re-spoken from the start.
    Restart(UtteranceRequest),
}

/// Size-one utterance queue over a backend: every `speak` cancels what
/// came before.
pub struct SpeechSession {
    backend: Box<dyn SpeechBackend>,
    status: SpeechStatus,
    current: Option<UtteranceRequest>,
    paused: Option<Paused>,
}

impl SpeechSession {
    pub fn new(backend: Box<dyn SpeechBackend>, status: SpeechStatus) -> Self {
        Self {
            backend,
            status,
            current: None,
            paused: None,
        }
    }

    #[cfg(test)]
    pub fn status(&self) -> &SpeechStatus {
        &self.status
    }

    pub fn speak(&mut self, request: UtteranceRequest) -> Result<()> {
        let request = request.normalized();
        if request.text.trim().is_empty() {
            anyhow::bail!("Nothing to speak");
        }

        self.paused = None;
        if let Err(e) = self.backend.cancel() {
            tracing::warn!("Failed to cancel previous utterance: {}", e);
        }

        if let Err(e) = self.backend.speak(&request) {
            tracing::error!("Speech error: {}", e);
            self.current = None;
            self.status.notify(SpeechEvent::Error { message: e.to_string() });
            return Err(e);
        }

        tracing::info!("Speaking {} chars ({})", request.text.chars().count(), request.language);
        if !self.backend.reports_callbacks() {
            self.status.notify(SpeechEvent::Started);
        }
        self.current = Some(request);
        Ok(())
    }

    pub fn stop(&mut self) -> Result<()> {
        let was_active = self.status.is_speaking() || self.paused.is_some();
        self.paused = None;
        self.current = None;
        self.backend.cancel()?;
        if was_active {
            self.status.notify(SpeechEvent::Stopped);
        }
        Ok(())
    }

    /// Returns false when there was nothing to pause.
    pub fn pause(&mut self) -> Result<bool> {
        if self.paused.is_some() || !self.status.is_speaking() {
            return Ok(false);
        }

        if self.backend.supports_pause() {
            self.backend.pause()?;
            self.paused = Some(Paused::Native);
        } else {
            let Some(request) = self.current.take() else {
                return Ok(false);
            };
            self.backend.cancel()?;
            self.paused = Some(Paused::Restart(request));
        }
        self.status.notify(SpeechEvent::Paused);
        Ok(true)
    }

    /// Returns false when nothing was paused.
    pub fn resume(&mut self) -> Result<bool> {
        match self.paused.take() {
            None => Ok(false),
            Some(Paused::Native) => {
                self.backend.resume()?;
                self.status.notify(SpeechEvent::Resumed);
                Ok(true)
            }
            Some(Paused::Restart(request)) => {
                if let Err(e) = self.backend.speak(&request) {
                    self.status.notify(SpeechEvent::Error { message: e.to_string() });
                    return Err(e);
                }
                self.current = Some(request);
                self.status.notify(SpeechEvent::Resumed);
                Ok(true)
            }
        }
    }

    /// For engines without callbacks: notices when the utterance finished.
    pub fn poll(&mut self) {
        if self.backend.reports_callbacks() || self.paused.is_some() || !self.status.is_speaking() {
            return;
        }
        if let Ok(false) = self.backend.is_speaking() {
            self.current = None;
            self.status.notify(SpeechEvent::Ended);
        }
    }
}
