use std::sync::Arc;

use shared::state::DEFAULT_BRIGHTNESS;
use tracing::debug;

/// The host surface whose brightness the player may override.
pub trait DisplaySurface: Send + Sync {
    /// System-wide brightness in `[0, 1]`, when the host can read it.
    fn system_brightness(&self) -> Option<f32>;
    /// Window override; `None` means the window follows the system value.
    fn window_brightness(&self) -> Option<f32>;
    fn set_window_brightness(&self, level: Option<f32>);
}

/// Surface used when the host never attached one.
pub struct DetachedSurface;

impl DisplaySurface for DetachedSurface {
    fn system_brightness(&self) -> Option<f32> {
        None
    }

    fn window_brightness(&self) -> Option<f32> {
        None
    }

    fn set_window_brightness(&self, _level: Option<f32>) {}
}

/// Brightness handle scoped to one session. The first explicit change
/// remembers the window's original override so teardown can put it back.
pub struct BrightnessControl {
    surface: Arc<dyn DisplaySurface>,
    original: Option<Option<f32>>,
}

impl BrightnessControl {
    pub fn new(surface: Arc<dyn DisplaySurface>) -> Self {
        Self {
            surface,
            original: None,
        }
    }

    /// Swaps the surface. A pending restore is applied to the old surface first.
    pub fn attach(&mut self, surface: Arc<dyn DisplaySurface>) -> f32 {
        self.restore();
        self.surface = surface;
        self.ambient_brightness()
    }

    pub fn ambient_brightness(&self) -> f32 {
        self.surface
            .system_brightness()
            .map(|level| level.clamp(0.0, 1.0))
            .unwrap_or(DEFAULT_BRIGHTNESS)
    }

    pub fn set(&mut self, level: f32) -> f32 {
        let level = level.clamp(0.0, 1.0);
        if self.original.is_none() {
            self.original = Some(self.surface.window_brightness());
        }
        self.surface.set_window_brightness(Some(level));
        level
    }

    /// Puts back the override seen before the first `set`. Later calls do nothing.
    pub fn restore(&mut self) {
        if let Some(original) = self.original.take() {
            debug!("brightness: restoring window override {original:?}");
            self.surface.set_window_brightness(original);
        }
    }
}
