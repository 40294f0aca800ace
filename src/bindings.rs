//! Input symbol tables
//!
//! Symbols are the keyboard-style names used in combo scripts
//! (`"a"` for left, `"j"` for light punch, ...). Each symbol is bound to
//! either an axis extreme or a button index, never both.

use std::collections::HashMap;

use crate::config::AxisRange;
use crate::device::Axis;

/// What a symbol resolves to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binding {
    /// Deflect an axis to the given value
    Direction { axis: Axis, value: i32 },
    /// Pulse a button (1-based index)
    Button(u8),
}

/// Immutable binding tables, built once at startup
#[derive(Debug, Clone)]
pub struct Bindings {
    directions_x: HashMap<String, i32>,
    directions_y: HashMap<String, i32>,
    buttons: HashMap<String, u8>,
}

impl Bindings {
    /// Empty tables; fill with the `with_*` builders
    pub fn empty() -> Self {
        Self {
            directions_x: HashMap::new(),
            directions_y: HashMap::new(),
            buttons: HashMap::new(),
        }
    }

    /// WASD directions and JKLM attack buttons
    pub fn fightcade(axis: &AxisRange) -> Self {
        Self::empty()
            .with_direction(Axis::X, "a", axis.min)
            .with_direction(Axis::X, "d", axis.max)
            .with_direction(Axis::Y, "w", axis.max)
            .with_direction(Axis::Y, "s", axis.min)
            .with_button("j", 1) // Light Punch (A)
            .with_button("k", 2) // Heavy Punch (C)
            .with_button("l", 3) // Light Kick (B)
            .with_button("m", 4) // Heavy Kick (D)
    }

    pub fn with_direction(mut self, axis: Axis, symbol: impl Into<String>, value: i32) -> Self {
        match axis {
            Axis::X => self.directions_x.insert(symbol.into(), value),
            Axis::Y => self.directions_y.insert(symbol.into(), value),
        };
        self
    }

    pub fn with_button(mut self, symbol: impl Into<String>, button: u8) -> Self {
        self.buttons.insert(symbol.into(), button);
        self
    }

    /// Resolve a symbol; X directions win over Y, directions win over buttons
    pub fn lookup(&self, symbol: &str) -> Option<Binding> {
        if let Some(&value) = self.directions_x.get(symbol) {
            return Some(Binding::Direction { axis: Axis::X, value });
        }
        if let Some(&value) = self.directions_y.get(symbol) {
            return Some(Binding::Direction { axis: Axis::Y, value });
        }
        self.buttons.get(symbol).map(|&id| Binding::Button(id))
    }

    pub fn direction(&self, symbol: &str) -> Option<(Axis, i32)> {
        match self.lookup(symbol)? {
            Binding::Direction { axis, value } => Some((axis, value)),
            Binding::Button(_) => None,
        }
    }

    pub fn button(&self, symbol: &str) -> Option<u8> {
        self.buttons.get(symbol).copied()
    }

    /// All bound button indices, sorted
    pub fn button_ids(&self) -> Vec<u8> {
        let mut ids: Vec<u8> = self.buttons.values().copied().collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }

    pub fn direction_symbols(&self) -> impl Iterator<Item = &str> {
        self.directions_x
            .keys()
            .chain(self.directions_y.keys())
            .map(String::as_str)
    }

    pub fn button_symbols(&self) -> impl Iterator<Item = &str> {
        self.buttons.keys().map(String::as_str)
    }
}
