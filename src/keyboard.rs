//! Keyboard shortcuts while `puggy watch` is running
//!
//! The terminal is put in raw mode so single key presses arrive without
//! Enter; output written meanwhile must use `\r\n`.

use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    terminal::{disable_raw_mode, enable_raw_mode},
};
use std::io;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    Rebuild,
    Quit,
    /// Timeout or a key without a binding
    None,
}

/// Restores cooked mode when dropped, including on early return
pub struct RawModeGuard;

impl RawModeGuard {
    pub fn new() -> io::Result<Self> {
        enable_raw_mode()?;
        Ok(RawModeGuard)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
    }
}

/// Wait up to `timeout` for a key press
pub fn poll_key(timeout: Duration) -> io::Result<KeyAction> {
    if event::poll(timeout)? {
        if let Event::Key(key_event) = event::read()? {
            return Ok(key_to_action(key_event));
        }
    }
    Ok(KeyAction::None)
}

fn key_to_action(key: KeyEvent) -> KeyAction {
    // Windows reports releases too
    if key.kind == KeyEventKind::Release {
        return KeyAction::None;
    }

    match key.code {
        KeyCode::Char('r') | KeyCode::Enter => KeyAction::Rebuild,
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => KeyAction::Quit,
        KeyCode::Char('q') | KeyCode::Esc => KeyAction::Quit,
        _ => KeyAction::None,
    }
}

pub fn print_shortcuts() {
    println!("   Press {} to rebuild, {} to quit", "r", "q");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_bindings() {
        let key = |code| KeyEvent::new(code, KeyModifiers::NONE);

        assert_eq!(key_to_action(key(KeyCode::Char('r'))), KeyAction::Rebuild);
        assert_eq!(key_to_action(key(KeyCode::Enter)), KeyAction::Rebuild);
        assert_eq!(key_to_action(key(KeyCode::Char('q'))), KeyAction::Quit);
        assert_eq!(key_to_action(key(KeyCode::Esc)), KeyAction::Quit);
        assert_eq!(key_to_action(key(KeyCode::Char('c'))), KeyAction::None);
        assert_eq!(
            key_to_action(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL)),
            KeyAction::Quit
        );
    }

    #[test]
    fn test_key_release_is_ignored() {
        let mut release = KeyEvent::new(KeyCode::Char('r'), KeyModifiers::NONE);
        release.kind = KeyEventKind::Release;
        assert_eq!(key_to_action(release), KeyAction::None);
    }
}
