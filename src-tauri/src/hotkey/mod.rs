use tauri::AppHandle;
use tauri_plugin_global_shortcut::{GlobalShortcutExt, ShortcutState};
use anyhow::Result;

use crate::state::ShortcutSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HotkeyAction {
    ToggleListening,
    StopSpeaking,
}

pub fn handle_hotkey(app_handle: &AppHandle, action: HotkeyAction, shortcut_state: ShortcutState) -> Result<()> {
    // Only act on key press, ignore release
    if shortcut_state == ShortcutState::Released {
        return Ok(());
    }
    match action {
        HotkeyAction::ToggleListening => {
            crate::commands::listening::do_toggle_listening(app_handle)?;
        }
        HotkeyAction::StopSpeaking => {
            crate::commands::speech::do_stop_speaking(app_handle)?;
        }
    }
    Ok(())
}

/// Replaces every registered shortcut with the two from settings.
pub fn register_shortcuts(app_handle: &AppHandle, toggle_listening: &str, stop_speaking: &str) -> Result<()> {
    let shortcuts = app_handle.global_shortcut();
    shortcuts.unregister_all()?;

    for (accelerator, action) in [
        (toggle_listening, HotkeyAction::ToggleListening),
        (stop_speaking, HotkeyAction::StopSpeaking),
    ] {
        shortcuts.on_shortcut(accelerator, move |app, _shortcut, event| {
            if let Err(e) = handle_hotkey(app, action, event.state) {
                tracing::warn!("Shortcut action {:?} failed: {}", action, e);
            }
        })?;
        tracing::info!("Registered shortcut {} for {:?}", accelerator, action);
    }
    Ok(())
}

/// Moves from `previous` to `next` shortcuts through `register`. When
/// `next` is rejected the previous set is registered again and the
/// original error is returned.
pub fn swap_shortcuts(
    previous: &ShortcutSettings,
    next: &ShortcutSettings,
    mut register: impl FnMut(&ShortcutSettings) -> Result<()>,
) -> Result<()> {
    if previous == next {
        return Ok(());
    }
    let Err(e) = register(next) else {
        return Ok(());
    };
    tracing::warn!("Rejected shortcuts {:?}: {}. Restoring previous ones.", next, e);
    if let Err(restore) = register(previous) {
        tracing::error!("Failed to restore previous shortcuts: {}", restore);
    }
    Err(e)
}

/// "Alt+Shift+L" -> "⌥⇧L" on macOS, unchanged elsewhere.
pub fn shortcut_display_label(accelerator: &str) -> String {
    if cfg!(target_os = "macos") {
        mac_label(accelerator)
    } else {
        accelerator.to_string()
    }
}

fn mac_label(accelerator: &str) -> String {
    accelerator
        .split('+')
        .map(|part| match part.to_ascii_lowercase().as_str() {
            "alt" | "option" => "⌥".to_string(),
            "shift" => "⇧".to_string(),
            "ctrl" | "control" => "⌃".to_string(),
            "cmd" | "command" | "super" | "cmdorctrl" | "commandorcontrol" => "⌘".to_string(),
            "space" => "Space".to_string(),
            _ => part.to_uppercase(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shortcuts(toggle: &str) -> ShortcutSettings {
        ShortcutSettings {
            toggle_listening: toggle.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn rejected_shortcuts_restore_the_previous_set() {
        let previous = ShortcutSettings::default();
        let next = shortcuts("Alt+Shift+NotAKey");
        let mut attempts = Vec::new();

        let result = swap_shortcuts(&previous, &next, |s| {
            attempts.push(s.toggle_listening.clone());
            if s.toggle_listening.contains("NotAKey") {
                anyhow::bail!("invalid accelerator");
            }
            Ok(())
        });

        assert!(result.unwrap_err().to_string().contains("invalid accelerator"));
        assert_eq!(attempts, vec!["Alt+Shift+NotAKey", "Alt+Shift+L"]);
    }

    #[test]
    fn accepted_shortcuts_register_once() {
        let mut attempts = 0;
        let result = swap_shortcuts(&ShortcutSettings::default(), &shortcuts("Alt+Shift+R"), |_| {
            attempts += 1;
            Ok(())
        });
        assert!(result.is_ok());
        assert_eq!(attempts, 1);
    }

    #[test]
    fn unchanged_shortcuts_are_not_re_registered() {
        let same = ShortcutSettings::default();
        let result = swap_shortcuts(&same, &same.clone(), |_| anyhow::bail!("should not be called"));
        assert!(result.is_ok());
    }

    #[test]
    fn mac_labels_use_modifier_glyphs() {
        assert_eq!(mac_label("Alt+Shift+L"), "⌥⇧L");
        assert_eq!(mac_label("CmdOrCtrl+Space"), "⌘Space");
        assert_eq!(mac_label("ctrl+s"), "⌃S");
    }
}
