//! Turning device events into key presses.

use anyhow::{Context, Result};
use enigo::{Direction, Enigo, Keyboard, Settings};
use footpad_core::RemoteEvent;
use tracing::{debug, info, warn};

use crate::config::KeyMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    Press(u16),
    Release(u16),
}

/// Somewhere key actions end up.
pub trait KeySink {
    fn apply(&mut self, action: KeyAction) -> Result<()>;
}

/// Presses raw keycodes on the host through the OS input system.
pub struct EnigoSink {
    enigo: Enigo,
}

impl EnigoSink {
    pub fn new() -> Result<Self> {
        let enigo =
            Enigo::new(&Settings::default()).context("failed to connect to the input system")?;
        Ok(Self { enigo })
    }
}

impl KeySink for EnigoSink {
    fn apply(&mut self, action: KeyAction) -> Result<()> {
        let (keycode, direction) = match action {
            KeyAction::Press(keycode) => (keycode, Direction::Press),
            KeyAction::Release(keycode) => (keycode, Direction::Release),
        };
        self.enigo
            .raw(keycode, direction)
            .with_context(|| format!("failed to send keycode {}", keycode))
    }
}

/// Resolves device key indices through the configured key maps and feeds
/// the resulting actions to a [`KeySink`].
pub struct Dispatcher<'a, K> {
    key_maps: &'a [KeyMap],
    sink: K,
}

impl<'a, K: KeySink> Dispatcher<'a, K> {
    pub fn new(key_maps: &'a [KeyMap], sink: K) -> Self {
        Self { key_maps, sink }
    }

    /// Keycode actions for one event. Unknown key indices map to nothing.
    pub fn actions(&self, event: RemoteEvent) -> Vec<KeyAction> {
        let Some(keymap) = self.key_maps.get(event.index as usize) else {
            return Vec::new();
        };
        let action = if event.down {
            KeyAction::Press
        } else {
            KeyAction::Release
        };
        keymap.keycodes.iter().copied().map(action).collect()
    }

    /// Resolve one event and apply its actions.
    pub fn dispatch(&mut self, event: RemoteEvent) -> Result<()> {
        if event.down {
            info!("pressing virtual key {}", event.index);
        } else {
            info!("releasing virtual key {}", event.index);
        }

        if self.key_maps.get(event.index as usize).is_none() {
            warn!("event for unmapped key {}", event.index);
            return Ok(());
        }
        for action in self.actions(event) {
            debug!("updating physical keycode {:?}", action);
            self.sink.apply(action)?;
        }
        Ok(())
    }
}
