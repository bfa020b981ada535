//! Pointer stream classification.
//!
//! One active pointer goes down, moves any number of times and goes up. The
//! recognizer turns that sequence into the few intents the player cares about.
//! Drag detection wins over tap detection: once the pointer travels past
//! `min_drag_distance` the release is never reported as a tap. While dragging,
//! emissions are rate limited per axis but the accumulated delta keeps growing,
//! so every emitted intent carries the full travel since the press.

use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PointerEvent {
    Down { x: f32, y: f32, at_ms: u64 },
    Move { x: f32, y: f32, at_ms: u64 },
    Up { x: f32, y: f32, at_ms: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GestureIntent {
    SingleTap,
    DoubleTap,
    /// Positive is rightwards.
    HorizontalDrag { delta_pixels: f32 },
    /// Positive is downwards. `is_left_half` refers to where the press started.
    VerticalDrag { delta_pixels: f32, is_left_half: bool },
}

#[derive(Debug, Clone)]
pub struct GestureConfig {
    pub min_drag_distance: f32,
    /// An axis claims the drag only when it exceeds the other axis by this factor.
    pub axis_dominance: f32,
    pub double_tap_window_ms: u64,
    pub seek_throttle_ms: u64,
    pub volume_brightness_throttle_ms: u64,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            min_drag_distance: 30.0,
            axis_dominance: 1.2,
            double_tap_window_ms: 300,
            seek_throttle_ms: 200,
            volume_brightness_throttle_ms: 50,
        }
    }
}

#[derive(Debug)]
pub struct GestureRecognizer {
    config: GestureConfig,
    surface_width: f32,
    pressed: bool,
    start_x: f32,
    last_x: f32,
    last_y: f32,
    total_drag_x: f32,
    total_drag_y: f32,
    is_dragging: bool,
    last_seek_emit_ms: Option<u64>,
    last_volume_brightness_emit_ms: Option<u64>,
    last_tap_release_ms: Option<u64>,
}

impl GestureRecognizer {
    pub fn new(config: GestureConfig, surface_width: f32) -> Self {
        Self {
            config,
            surface_width,
            pressed: false,
            start_x: 0.0,
            last_x: 0.0,
            last_y: 0.0,
            total_drag_x: 0.0,
            total_drag_y: 0.0,
            is_dragging: false,
            last_seek_emit_ms: None,
            last_volume_brightness_emit_ms: None,
            last_tap_release_ms: None,
        }
    }

    pub fn set_surface_width(&mut self, width: f32) {
        self.surface_width = width;
    }

    pub fn surface_width(&self) -> f32 {
        self.surface_width
    }

    pub fn is_dragging(&self) -> bool {
        self.is_dragging
    }

    /// Feeds one pointer event; returns the intent it completes, if any.
    pub fn handle(&mut self, event: PointerEvent) -> Option<GestureIntent> {
        match event {
            PointerEvent::Down { x, y, .. } => {
                self.press(x, y);
                None
            }
            PointerEvent::Move { x, y, at_ms } if self.pressed => self.drag(x, y, at_ms),
            PointerEvent::Up { at_ms, .. } if self.pressed => self.release(at_ms),
            PointerEvent::Move { .. } | PointerEvent::Up { .. } => None,
        }
    }

    fn press(&mut self, x: f32, y: f32) {
        debug!("gesture: pointer down x={x} y={y}");
        self.pressed = true;
        self.start_x = x;
        self.last_x = x;
        self.last_y = y;
        self.total_drag_x = 0.0;
        self.total_drag_y = 0.0;
        self.is_dragging = false;
    }

    fn accumulate(&mut self, x: f32, y: f32) {
        self.total_drag_x += x - self.last_x;
        self.total_drag_y += y - self.last_y;
        self.last_x = x;
        self.last_y = y;
    }

    fn drag(&mut self, x: f32, y: f32, now_ms: u64) -> Option<GestureIntent> {
        if x == self.last_x && y == self.last_y {
            return None;
        }
        self.accumulate(x, y);

        let horizontal = self.total_drag_x.abs();
        let vertical = self.total_drag_y.abs();
        let min = self.config.min_drag_distance;

        if !self.is_dragging && horizontal.max(vertical) > min {
            debug!(
                "gesture: drag started total_x={} total_y={}",
                self.total_drag_x, self.total_drag_y
            );
            self.is_dragging = true;
            self.last_seek_emit_ms = None;
            self.last_volume_brightness_emit_ms = None;
        }
        if !self.is_dragging {
            return None;
        }

        if horizontal > min && horizontal > vertical * self.config.axis_dominance {
            if !throttle_elapsed(self.last_seek_emit_ms, now_ms, self.config.seek_throttle_ms) {
                return None;
            }
            self.last_seek_emit_ms = Some(now_ms);
            debug!("gesture: horizontal drag delta={}", self.total_drag_x);
            Some(GestureIntent::HorizontalDrag {
                delta_pixels: self.total_drag_x,
            })
        } else if vertical > min && vertical > horizontal * self.config.axis_dominance {
            if !throttle_elapsed(
                self.last_volume_brightness_emit_ms,
                now_ms,
                self.config.volume_brightness_throttle_ms,
            ) {
                return None;
            }
            self.last_volume_brightness_emit_ms = Some(now_ms);
            let is_left_half = self.start_x < self.surface_width / 2.0;
            debug!(
                "gesture: vertical drag delta={} left_half={is_left_half}",
                self.total_drag_y
            );
            Some(GestureIntent::VerticalDrag {
                delta_pixels: self.total_drag_y,
                is_left_half,
            })
        } else {
            None
        }
    }

    fn release(&mut self, now_ms: u64) -> Option<GestureIntent> {
        debug!("gesture: pointer up dragging={}", self.is_dragging);
        let intent = if self.is_dragging {
            None
        } else {
            let since_last_tap = self
                .last_tap_release_ms
                .and_then(|last| now_ms.checked_sub(last));
            self.last_tap_release_ms = Some(now_ms);
            match since_last_tap {
                Some(gap) if gap > 0 && gap < self.config.double_tap_window_ms => {
                    Some(GestureIntent::DoubleTap)
                }
                _ => Some(GestureIntent::SingleTap),
            }
        };
        self.pressed = false;
        self.is_dragging = false;
        self.total_drag_x = 0.0;
        self.total_drag_y = 0.0;
        intent
    }
}

fn throttle_elapsed(last_emit_ms: Option<u64>, now_ms: u64, throttle_ms: u64) -> bool {
    match last_emit_ms {
        None => true,
        Some(last) => now_ms.saturating_sub(last) > throttle_ms,
    }
}

#[cfg(test)]
#[path = "tests/gesture_tests.rs"]
mod tests;
