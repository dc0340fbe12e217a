use anyhow::Result;
use super::AccessibilityBridge;

extern "C" {
    fn AXIsProcessTrusted() -> bool;
}

const PRIVACY_ACCESSIBILITY_PANE: &str =
    "x-apple.systempreferences:com.apple.preference.security?Privacy_Accessibility";

pub struct MacOsAccessibility;

impl MacOsAccessibility {
    pub fn new() -> Self {
        Self
    }
}

impl AccessibilityBridge for MacOsAccessibility {
    fn is_accessibility_enabled(&self) -> bool {
        let trusted = unsafe { AXIsProcessTrusted() };
        tracing::info!("AXIsProcessTrusted() = {}", trusted);
        trusted
    }

    fn request_accessibility_permission(&self) -> Result<()> {
        std::process::Command::new("open")
            .arg(PRIVACY_ACCESSIBILITY_PANE)
            .spawn()?;
        tracing::info!("Opened System Settings > Privacy & Security > Accessibility");
        Ok(())
    }

    fn setup_instructions(&self) -> &'static str {
        "Enable VoiceAssist in System Settings > Privacy & Security > Accessibility, \
         then open WhatsApp Web in the reader window and tap any message."
    }
}
