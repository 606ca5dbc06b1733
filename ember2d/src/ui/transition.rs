//! Typed property animation for UI elements.

use crate::math::Vec2;

/// Animatable element properties.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UiProperty {
    Position,
    Size,
    Scale,
    Rotation,
    Opacity,
    CornerRadius,
}

impl UiProperty {
    /// Properties that change the pixels of the element itself rather than
    /// how its cached image is composited.
    pub(crate) fn affects_content(self) -> bool {
        matches!(self, UiProperty::Size | UiProperty::CornerRadius)
    }
}

/// Value of an animatable property.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PropertyValue {
    Scalar(f32),
    Vector(Vec2),
}

impl PropertyValue {
    /// Scalar view; vectors yield their `x` component.
    pub fn as_scalar(self) -> f32 {
        match self {
            PropertyValue::Scalar(value) => value,
            PropertyValue::Vector(value) => value.x,
        }
    }

    /// Vector view; scalars are splatted to both components.
    pub fn as_vector(self) -> Vec2 {
        match self {
            PropertyValue::Scalar(value) => Vec2::splat(value),
            PropertyValue::Vector(value) => value,
        }
    }

    pub fn lerp(self, to: PropertyValue, t: f32) -> PropertyValue {
        match (self, to) {
            (PropertyValue::Scalar(a), PropertyValue::Scalar(b)) => PropertyValue::Scalar(a + (b - a) * t),
            (from, to) => PropertyValue::Vector(from.as_vector().lerp(to.as_vector(), t)),
        }
    }
}

impl From<f32> for PropertyValue {
    fn from(value: f32) -> Self {
        PropertyValue::Scalar(value)
    }
}

impl From<Vec2> for PropertyValue {
    fn from(value: Vec2) -> Self {
        PropertyValue::Vector(value)
    }
}

/// Easing curves mapping linear progress to eased progress.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Easing {
    #[default]
    Linear,
    EaseIn,
    EaseOut,
    EaseInOut,
    /// Overshoots slightly before settling.
    EaseOutBack,
}

impl Easing {
    pub fn apply(self, t: f32) -> f32 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Easing::Linear => t,
            Easing::EaseIn => t * t * t,
            Easing::EaseOut => 1.0 - (1.0 - t).powi(3),
            Easing::EaseInOut => {
                if t < 0.5 {
                    4.0 * t * t * t
                } else {
                    1.0 - (-2.0 * t + 2.0).powi(3) / 2.0
                }
            }
            Easing::EaseOutBack => {
                const C1: f32 = 1.70158;
                const C3: f32 = C1 + 1.0;
                1.0 + C3 * (t - 1.0).powi(3) + C1 * (t - 1.0).powi(2)
            }
        }
    }
}

/// One in-flight property animation.
#[derive(Clone, Debug, PartialEq)]
pub struct Transition {
    pub property: UiProperty,
    pub from: PropertyValue,
    pub to: PropertyValue,
    pub duration: f32,
    pub easing: Easing,
    elapsed: f32,
}

impl Transition {
    pub fn new(property: UiProperty, from: PropertyValue, to: PropertyValue, duration: f32, easing: Easing) -> Self {
        Self {
            property,
            from,
            to,
            duration: duration.max(0.0),
            easing,
            elapsed: 0.0,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.elapsed >= self.duration
    }

    /// Linear progress in `0..=1`.
    pub fn progress(&self) -> f32 {
        if self.duration <= 0.0 {
            1.0
        } else {
            (self.elapsed / self.duration).min(1.0)
        }
    }

    /// Advance by `dt` seconds and return the current value.
    pub fn advance(&mut self, dt: f32) -> PropertyValue {
        self.elapsed = (self.elapsed + dt.max(0.0)).min(self.duration);
        if self.is_finished() {
            return self.to;
        }
        self.from.lerp(self.to, self.easing.apply(self.progress()))
    }
}
