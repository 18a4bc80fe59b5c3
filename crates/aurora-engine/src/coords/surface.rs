/// Drawable size in logical units plus the device pixel scale.
///
/// Invariant: `scale` is finite and > 0, sizes are finite and >= 0. The
/// viewport is always `logical * scale` rounded to whole pixels.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct SurfaceState {
    width: f32,
    height: f32,
    scale: f32,
}

impl SurfaceState {
    /// Returns `None` when the scale or either dimension violates the invariant.
    pub fn new(width: f32, height: f32, scale: f32) -> Option<Self> {
        let size_ok = |v: f32| v.is_finite() && v >= 0.0;
        if !(scale.is_finite() && scale > 0.0) || !size_ok(width) || !size_ok(height) {
            return None;
        }
        Some(Self { width, height, scale })
    }

    /// Builds state from a physical size as reported by a window system.
    pub fn from_physical(width: u32, height: u32, scale: f64) -> Option<Self> {
        let scale = scale as f32;
        if !(scale.is_finite() && scale > 0.0) {
            return None;
        }
        Self::new(width as f32 / scale, height as f32 / scale, scale)
    }

    /// Same logical size at a new scale; `None` if `scale` is invalid.
    pub fn with_scale(self, scale: f32) -> Option<Self> {
        Self::new(self.width, self.height, scale)
    }

    #[inline]
    pub fn logical_size(&self) -> (f32, f32) {
        (self.width, self.height)
    }

    #[inline]
    pub fn scale(&self) -> f32 {
        self.scale
    }

    /// Viewport in physical pixels.
    pub fn physical_size(&self) -> (u32, u32) {
        (
            (self.width * self.scale).round() as u32,
            (self.height * self.scale).round() as u32,
        )
    }

    /// Physical height as a float, the pivot for the vertical flip.
    #[inline]
    pub fn physical_height(&self) -> f32 {
        self.physical_size().1 as f32
    }

    #[inline]
    pub fn has_area(&self) -> bool {
        let (w, h) = self.physical_size();
        w > 0 && h > 0
    }
}
