use anyhow::Result;

use super::{SpeechBackend, SpeechStatus};
#[cfg(feature = "native-speech")]
use super::{SpeechEvent, UtteranceRequest};

/// Maps a web-speech multiplier (1.0 = normal) onto an engine's range.
pub fn scale_multiplier(value: f32, min: f32, normal: f32, max: f32) -> f32 {
    (normal * value).clamp(min, max)
}

/// Maps a 0..=1 volume onto an engine's range.
pub fn scale_volume(value: f32, min: f32, max: f32) -> f32 {
    min + (max - min) * value.clamp(0.0, 1.0)
}

/// Builds the platform backend. Called on the speech worker thread.
pub fn create_backend(status: SpeechStatus) -> Result<Box<dyn SpeechBackend>> {
    #[cfg(feature = "native-speech")]
    {
        Ok(Box::new(NativeBackend::new(status)?))
    }
    #[cfg(not(feature = "native-speech"))]
    {
        let _ = status;
        anyhow::bail!("built without a speech engine")
    }
}

#[cfg(feature = "native-speech")]
pub struct NativeBackend {
    tts: tts::Tts,
    features: tts::Features,
    voice_language: Option<String>,
}

#[cfg(feature = "native-speech")]
impl NativeBackend {
    pub fn new(status: SpeechStatus) -> Result<Self> {
        let tts = tts::Tts::default()?;
        let features = tts.supported_features();

        if features.utterance_callbacks {
            let on_begin = status.clone();
            tts.on_utterance_begin(Some(Box::new(move |_| on_begin.notify(SpeechEvent::Started))))?;
            let on_end = status;
            tts.on_utterance_end(Some(Box::new(move |_| on_end.notify(SpeechEvent::Ended))))?;
        }

        tracing::info!(
            "Native speech engine ready (rate={}, pitch={}, volume={}, voices={}, callbacks={})",
            features.rate,
            features.pitch,
            features.volume,
            features.voice,
            features.utterance_callbacks
        );

        Ok(Self {
            tts,
            features,
            voice_language: None,
        })
    }

    fn apply_voice(&mut self, language: &str) -> Result<()> {
        if !self.features.voice || self.voice_language.as_deref() == Some(language) {
            return Ok(());
        }
        let wanted = language.to_ascii_lowercase();
        let primary = wanted.split('-').next().unwrap_or_default().to_string();

        let voices = self.tts.voices()?;
        let exact = voices.iter().find(|v| v.language().as_str().to_ascii_lowercase() == wanted);
        let same_primary = || {
            voices.iter().find(|v| {
                v.language().as_str().to_ascii_lowercase().split('-').next() == Some(primary.as_str())
            })
        };

        match exact.or_else(same_primary) {
            Some(voice) => {
                self.tts.set_voice(voice)?;
                tracing::info!("Using voice '{}' for {}", voice.name(), language);
            }
            None => tracing::warn!("No voice installed for {}. Using engine default.", language),
        }
        self.voice_language = Some(language.to_string());
        Ok(())
    }

    fn apply_parameters(&mut self, request: &UtteranceRequest) -> Result<()> {
        if self.features.rate {
            let rate = scale_multiplier(
                request.rate,
                self.tts.min_rate(),
                self.tts.normal_rate(),
                self.tts.max_rate(),
            );
            self.tts.set_rate(rate)?;
        }
        if self.features.pitch {
            let pitch = scale_multiplier(
                request.pitch,
                self.tts.min_pitch(),
                self.tts.normal_pitch(),
                self.tts.max_pitch(),
            );
            self.tts.set_pitch(pitch)?;
        }
        if self.features.volume {
            let volume = scale_volume(request.volume, self.tts.min_volume(), self.tts.max_volume());
            self.tts.set_volume(volume)?;
        }
        Ok(())
    }
}

#[cfg(feature = "native-speech")]
impl SpeechBackend for NativeBackend {
    fn speak(&mut self, request: &UtteranceRequest) -> Result<()> {
        if let Err(e) = self.apply_voice(&request.language) {
            tracing::warn!("Failed to select voice for {}: {}", request.language, e);
        }
        self.apply_parameters(request)?;
        self.tts.speak(request.text.as_str(), true)?;
        Ok(())
    }

    fn cancel(&mut self) -> Result<()> {
        if self.features.stop {
            self.tts.stop()?;
        }
        Ok(())
    }

    fn reports_callbacks(&self) -> bool {
        self.features.utterance_callbacks
    }

    fn is_speaking(&self) -> Result<bool> {
        if !self.features.is_speaking {
            anyhow::bail!("Engine cannot report speaking state");
        }
        Ok(self.tts.is_speaking()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multiplier_scales_around_normal_and_clamps() {
        assert_eq!(scale_multiplier(1.0, 0.1, 0.5, 2.0), 0.5);
        assert_eq!(scale_multiplier(2.0, 0.1, 0.5, 2.0), 1.0);
        assert_eq!(scale_multiplier(10.0, 0.1, 0.5, 2.0), 2.0);
        assert_eq!(scale_multiplier(0.01, 0.1, 0.5, 2.0), 0.1);
    }

    #[test]
    fn volume_maps_onto_engine_range() {
        assert_eq!(scale_volume(1.0, 0.0, 100.0), 100.0);
        assert_eq!(scale_volume(0.5, 0.0, 100.0), 50.0);
        assert_eq!(scale_volume(-1.0, 0.0, 1.0), 0.0);
    }
}
