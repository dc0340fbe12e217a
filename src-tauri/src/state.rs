use std::sync::Mutex;
use std::time::Duration;
use serde::{Serialize, Deserialize};

use crate::permissions::PermissionStatus;
use crate::speech::SpeechDriver;
use crate::tap::TapResolver;
use crate::whitelist::WhitelistGate;

pub const DEFAULT_WHITELIST_ENDPOINT: &str = "https://devzea.com/api/whatsapp-numbers.json";

pub const LANGUAGES: [(&str, &str); 10] = [
    ("en-US", "English (US)"),
    ("en-GB", "English (UK)"),
    ("es-ES", "Spanish"),
    ("fr-FR", "French"),
    ("de-DE", "German"),
    ("it-IT", "Italian"),
    ("pt-PT", "Portuguese"),
    ("zh-CN", "Chinese"),
    ("ja-JP", "Japanese"),
    ("ko-KR", "Korean"),
];

pub struct AppState {
    pub settings: Mutex<Settings>,
    pub speech: Mutex<Option<SpeechDriver>>,
    pub listening: Mutex<bool>,
    pub resolver: Mutex<TapResolver>,
    pub gate: Mutex<WhitelistGate>,
    pub permissions: Mutex<Vec<PermissionStatus>>,
    pub tray_listen_item: Mutex<Option<tauri::menu::MenuItem<tauri::Wry>>>,
}

impl AppState {
    pub fn new() -> Self {
        Self {
            settings: Mutex::new(Settings::default()),
            speech: Mutex::new(None),
            listening: Mutex::new(false),
            resolver: Mutex::new(TapResolver::default()),
            gate: Mutex::new(WhitelistGate::new()),
            permissions: Mutex::new(crate::permissions::initial()),
            tray_listen_item: Mutex::new(None),
        }
    }

    /// True when taps may be resolved: Document mode is never gated.
    pub fn tap_verified(&self) -> bool {
        let mode = self.settings.lock().unwrap().reader.mode;
        mode == ReadingMode::Document || self.gate.lock().unwrap().is_verified()
    }

    /// Clears the listening flag. Returns false if it was already clear.
    pub fn stop_listening(&self) -> bool {
        std::mem::replace(&mut *self.listening.lock().unwrap(), false)
    }

    /// Switches the reading mode. Entering WhatsApp mode drops this
    /// session's verification and stops listening; returns true when
    /// listening was stopped.
    pub fn enter_mode(&self, mode: ReadingMode) -> bool {
        self.settings.lock().unwrap().reader.mode = mode;
        if mode != ReadingMode::WhatsApp {
            return false;
        }
        self.gate.lock().unwrap().reset_session();
        self.stop_listening()
    }

    /// Whether closing the main window should hide it to the tray.
    pub fn hides_on_close(&self) -> bool {
        self.settings.lock().unwrap().reader.background_mode
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadingMode {
    #[default]
    WhatsApp,
    Document,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub reader: ReaderSettings,
    pub voice: VoiceSettings,
    pub whitelist: WhitelistSettings,
    pub shortcuts: ShortcutSettings,
    pub general: GeneralSettings,
}

impl Settings {
    /// Clamps voice parameters and repairs values the UI should never send.
    pub fn sanitized(mut self) -> Self {
        self.voice = self.voice.sanitized();
        if self.whitelist.endpoint.trim().is_empty() {
            self.whitelist.endpoint = DEFAULT_WHITELIST_ENDPOINT.to_string();
        }
        self.whitelist.attempts = self.whitelist.attempts.clamp(1, 10);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderSettings {
    pub mode: ReadingMode,
    pub auto_detect_language: bool,
    pub continuous_reading: bool,
    pub background_mode: bool,
}

impl Default for ReaderSettings {
    fn default() -> Self {
        Self {
            mode: ReadingMode::WhatsApp,
            auto_detect_language: false,
            continuous_reading: true,
            background_mode: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceSettings {
    pub language: String,
    pub rate: f32,
    pub pitch: f32,
    pub volume: f32,
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            language: "en-US".to_string(),
            rate: 1.0,
            pitch: 1.0,
            volume: 1.0,
        }
    }
}

impl VoiceSettings {
    pub fn sanitized(mut self) -> Self {
        let defaults = Self::default();
        if !LANGUAGES.iter().any(|(code, _)| *code == self.language) {
            tracing::warn!("Unsupported language '{}', using {}", self.language, defaults.language);
            self.language = defaults.language;
        }
        self.rate = clamp_or(self.rate, 0.5, 2.0, defaults.rate);
        self.pitch = clamp_or(self.pitch, 0.5, 2.0, defaults.pitch);
        self.volume = clamp_or(self.volume, 0.0, 1.0, defaults.volume);
        self
    }
}

fn clamp_or(value: f32, min: f32, max: f32, fallback: f32) -> f32 {
    if value.is_finite() {
        value.clamp(min, max)
    } else {
        fallback
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WhitelistSettings {
    pub endpoint: String,
    pub timeout_ms: u64,
    pub attempts: u32,
    pub retry_delay_ms: u64,
    pub cache_ttl_s: u64,
}

impl Default for WhitelistSettings {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_WHITELIST_ENDPOINT.to_string(),
            timeout_ms: 10_000,
            attempts: 3,
            retry_delay_ms: 1_000,
            cache_ttl_s: 300,
        }
    }
}

impl WhitelistSettings {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShortcutSettings {
    pub toggle_listening: String,
    pub stop_speaking: String,
}

impl Default for ShortcutSettings {
    fn default() -> Self {
        Self {
            toggle_listening: "Alt+Shift+L".to_string(),
            stop_speaking: "Alt+Shift+S".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    pub sound_feedback: bool,
    pub onboarding_completed: bool,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            sound_feedback: true,
            onboarding_completed: false,
        }
    }
}
