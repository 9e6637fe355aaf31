//! Input abstraction layer.
//!
//! Normalizes mouse, touch, and stylus events into a unified `InputEvent`
//! enum consumed by tools. Coordinates are canvas (screen) pixels; the
//! app maps them into document space through the current view.

/// Modifier keys held while the event fired.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
    pub meta: bool,
}

impl Modifiers {
    pub const NONE: Self = Self {
        shift: false,
        ctrl: false,
        alt: false,
        meta: false,
    };

    pub const SHIFT: Self = Self {
        shift: true,
        ..Self::NONE
    };

    /// Ctrl on most platforms, Cmd on macOS.
    pub fn command(&self) -> bool {
        self.ctrl || self.meta
    }
}

/// A normalized input event from any pointing device.
#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
    /// Pointer pressed (mouse down, touch start, pencil contact).
    PointerDown {
        x: f64,
        y: f64,
        /// Pressure from 0.0 (none) to 1.0 (max). Mouse is always 1.0.
        pressure: f32,
        modifiers: Modifiers,
    },

    /// Pointer moved (mouse move, touch move, pencil move).
    PointerMove {
        x: f64,
        y: f64,
        pressure: f32,
        modifiers: Modifiers,
    },

    /// Pointer released.
    PointerUp { x: f64, y: f64, modifiers: Modifiers },

    /// Scroll / pinch-zoom.
    Scroll {
        dx: f64,
        dy: f64,
        /// Zoom factor (1.0 = no change; >1 = zoom in).
        zoom: f64,
    },

    /// Keyboard key, named like the DOM `KeyboardEvent.key` ("Escape", "a").
    Key { key: String, modifiers: Modifiers },
}

impl InputEvent {
    pub fn pointer_down(x: f64, y: f64) -> Self {
        Self::PointerDown {
            x,
            y,
            pressure: 1.0,
            modifiers: Modifiers::NONE,
        }
    }

    pub fn pointer_move(x: f64, y: f64) -> Self {
        Self::PointerMove {
            x,
            y,
            pressure: 1.0,
            modifiers: Modifiers::NONE,
        }
    }

    pub fn pointer_up(x: f64, y: f64) -> Self {
        Self::PointerUp {
            x,
            y,
            modifiers: Modifiers::NONE,
        }
    }

    pub fn key(key: impl Into<String>) -> Self {
        Self::Key {
            key: key.into(),
            modifiers: Modifiers::NONE,
        }
    }

    /// Same event with `modifiers` held.
    pub fn with_modifiers(mut self, held: Modifiers) -> Self {
        match &mut self {
            Self::PointerDown { modifiers, .. }
            | Self::PointerMove { modifiers, .. }
            | Self::PointerUp { modifiers, .. }
            | Self::Key { modifiers, .. } => *modifiers = held,
            Self::Scroll { .. } => {}
        }
        self
    }

    /// Extract position if this is a pointer event.
    pub fn position(&self) -> Option<(f64, f64)> {
        match self {
            Self::PointerDown { x, y, .. } | Self::PointerMove { x, y, .. } | Self::PointerUp { x, y, .. } => {
                Some((*x, *y))
            }
            _ => None,
        }
    }

    pub fn modifiers(&self) -> Modifiers {
        match self {
            Self::PointerDown { modifiers, .. }
            | Self::PointerMove { modifiers, .. }
            | Self::PointerUp { modifiers, .. }
            | Self::Key { modifiers, .. } => *modifiers,
            Self::Scroll { .. } => Modifiers::NONE,
        }
    }

    /// The same event with its position mapped by `f` (screen → document).
    pub fn map_position(&self, f: impl Fn(f64, f64) -> (f64, f64)) -> Self {
        let mut out = self.clone();
        match &mut out {
            Self::PointerDown { x, y, .. } | Self::PointerMove { x, y, .. } | Self::PointerUp { x, y, .. } => {
                (*x, *y) = f(*x, *y);
            }
            _ => {}
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn position_only_for_pointer_events() {
        assert_eq!(InputEvent::pointer_down(3.0, 4.0).position(), Some((3.0, 4.0)));
        assert_eq!(InputEvent::key("Escape").position(), None);
    }

    #[test]
    fn map_position_keeps_modifiers() {
        let event = InputEvent::pointer_move(10.0, 20.0).with_modifiers(Modifiers::SHIFT);
        let mapped = event.map_position(|x, y| (x / 2.0, y / 2.0));
        assert_eq!(mapped.position(), Some((5.0, 10.0)));
        assert!(mapped.modifiers().shift);
    }
}
