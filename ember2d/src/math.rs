use glam::Affine2;

/// 2D vector type used throughout Ember2D.
pub use glam::Vec2;

/// RGBA colour with components in `0.0..=1.0`.
pub type Color = [f32; 4];

pub const WHITE: Color = [1.0, 1.0, 1.0, 1.0];
pub const BLACK: Color = [0.0, 0.0, 0.0, 1.0];
pub const TRANSPARENT: Color = [0.0, 0.0, 0.0, 0.0];

/// Returns `color` with its alpha multiplied by `opacity`.
pub fn with_opacity(color: Color, opacity: f32) -> Color {
    [color[0], color[1], color[2], color[3] * opacity.clamp(0.0, 1.0)]
}

/// Transform describing 2D position, scale, and rotation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform2D {
    pub position: Vec2,
    pub scale: Vec2,
    /// Rotation in radians.
    pub rotation: f32,
}

impl Transform2D {
    pub fn new(position: Vec2, scale: Vec2, rotation: f32) -> Self {
        Self {
            position,
            scale,
            rotation,
        }
    }

    pub fn identity() -> Self {
        Self {
            position: Vec2::ZERO,
            scale: Vec2::ONE,
            rotation: 0.0,
        }
    }

    /// Composes scale, then rotation, then translation.
    pub fn to_matrix(&self) -> Affine2 {
        Affine2::from_scale_angle_translation(self.scale, self.rotation, self.position)
    }
}

impl Default for Transform2D {
    fn default() -> Self {
        Self::identity()
    }
}

/// Axis-aligned rectangle in screen space (top-left origin).
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Rect {
    pub position: Vec2,
    pub size: Vec2,
}

impl Rect {
    pub fn new(position: Vec2, size: Vec2) -> Self {
        Self { position, size }
    }

    pub fn from_xywh(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self::new(Vec2::new(x, y), Vec2::new(w, h))
    }

    pub fn min(&self) -> Vec2 {
        self.position
    }

    pub fn max(&self) -> Vec2 {
        self.position + self.size
    }

    pub fn center(&self) -> Vec2 {
        self.position + self.size * 0.5
    }

    /// Inclusive on the top/left edge, exclusive on the bottom/right edge.
    pub fn contains(&self, point: Vec2) -> bool {
        let max = self.max();
        point.x >= self.position.x && point.y >= self.position.y && point.x < max.x && point.y < max.y
    }

    /// Returns the rectangle moved by `offset`.
    pub fn translated(&self, offset: Vec2) -> Self {
        Self::new(self.position + offset, self.size)
    }

    /// Scales the rectangle around its center.
    pub fn scaled_about_center(&self, scale: Vec2) -> Self {
        let size = self.size * scale;
        Self::new(self.center() - size * 0.5, size)
    }
}

/// Component-wise division that leaves a component untouched when the divisor is zero.
pub(crate) fn safe_div(value: Vec2, divisor: Vec2) -> Vec2 {
    Vec2::new(
        if divisor.x == 0.0 { value.x } else { value.x / divisor.x },
        if divisor.y == 0.0 { value.y } else { value.y / divisor.y },
    )
}
