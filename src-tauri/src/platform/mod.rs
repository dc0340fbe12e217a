#[cfg(target_os = "macos")]
mod macos;
#[cfg(target_os = "macos")]
pub use macos::*;

use anyhow::Result;

/// Native accessibility service: lets the app observe taps outside its
/// own windows.
pub trait AccessibilityBridge: Send + Sync {
    fn is_accessibility_enabled(&self) -> bool;
    fn request_accessibility_permission(&self) -> Result<()>;
    /// Human-readable steps for enabling the service by hand.
    fn setup_instructions(&self) -> &'static str;
}

/// Platforms without a bridge: the webview reader needs no extra service,
/// so the service is reported as enabled.
pub struct NoBridge;

impl AccessibilityBridge for NoBridge {
    fn is_accessibility_enabled(&self) -> bool {
        true
    }

    fn request_accessibility_permission(&self) -> Result<()> {
        tracing::info!("No accessibility service on this platform; nothing to request");
        Ok(())
    }

    fn setup_instructions(&self) -> &'static str {
        "Open WhatsApp Web in the reader window and tap any message to hear it spoken."
    }
}

pub fn get_accessibility_bridge() -> Box<dyn AccessibilityBridge> {
    #[cfg(target_os = "macos")]
    {
        Box::new(MacOsAccessibility::new())
    }
    #[cfg(not(target_os = "macos"))]
    {
        Box::new(NoBridge)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_bridge_assumes_enabled() {
        let bridge = NoBridge;
        assert!(bridge.is_accessibility_enabled());
        assert!(bridge.request_accessibility_permission().is_ok());
        assert!(!bridge.setup_instructions().is_empty());
    }
}
