use anyhow::Result;

use crate::context::Context;
use crate::lifecycle::AsAny;
use crate::math::{Color, Rect, Vec2, TRANSPARENT, WHITE};
use crate::render::{DrawList, RenderTargetId, TextureHandle};

use super::transition::{Easing, PropertyValue, Transition, UiProperty};
use super::{CanvasId, UiId};

/// Callback invoked with the engine context and the element that fired it.
pub type UiCallback = Box<dyn FnMut(&mut Context<'_>, UiId) -> Result<()>>;

/// Host-defined element content.
pub trait Widget: AsAny {
    /// Append the widget's primitives for the given screen bounds.
    fn draw(&self, bounds: Rect, opacity: f32, draw: &mut DrawList) -> Result<()>;

    fn hit_test(&self, bounds: Rect, point: Vec2) -> Result<bool> {
        Ok(bounds.contains(point))
    }

    fn update(&mut self, _dt: f32) -> Result<()> {
        Ok(())
    }

    /// Name used when logging faults.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Element outline.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Border {
    pub color: Color,
    pub width: f32,
}

/// Drop shadow drawn under the element.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Shadow {
    pub color: Color,
    pub offset: Vec2,
}

/// Visual styling shared by every element kind.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Style {
    pub background: Color,
    pub corner_radius: f32,
    pub border: Option<Border>,
    pub shadow: Option<Shadow>,
}

impl Default for Style {
    fn default() -> Self {
        Self {
            background: TRANSPARENT,
            corner_radius: 0.0,
            border: None,
            shadow: None,
        }
    }
}

/// What an element draws.
pub enum ElementKind {
    /// Container; children are offset by the padding and the title bar.
    Panel {
        title: Option<String>,
        padding: f32,
        title_height: f32,
    },
    Label {
        text: String,
        font_size: f32,
        color: Color,
    },
    Button {
        label: String,
        font_size: f32,
        text_color: Color,
        normal: Color,
        hover: Color,
        pressed: Color,
    },
    Image {
        texture: TextureHandle,
        tint: Color,
    },
    ProgressBar {
        /// Fill fraction in `0..=1`.
        value: f32,
        fill: Color,
    },
    Custom(Box<dyn Widget>),
}

impl ElementKind {
    pub fn name(&self) -> &'static str {
        match self {
            ElementKind::Panel { .. } => "Panel",
            ElementKind::Label { .. } => "Label",
            ElementKind::Button { .. } => "Button",
            ElementKind::Image { .. } => "Image",
            ElementKind::ProgressBar { .. } => "ProgressBar",
            ElementKind::Custom(widget) => widget.name(),
        }
    }
}

impl std::fmt::Debug for ElementKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Callback slots of an element.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HandlerSlot {
    Click,
    HoverEnter,
    HoverExit,
    Press,
    Release,
    /// Button action, fired after `Click`.
    Action,
}

#[derive(Default)]
pub(crate) struct Handlers {
    click: Option<UiCallback>,
    hover_enter: Option<UiCallback>,
    hover_exit: Option<UiCallback>,
    press: Option<UiCallback>,
    release: Option<UiCallback>,
    action: Option<UiCallback>,
}

impl Handlers {
    fn slot(&mut self, slot: HandlerSlot) -> &mut Option<UiCallback> {
        match slot {
            HandlerSlot::Click => &mut self.click,
            HandlerSlot::HoverEnter => &mut self.hover_enter,
            HandlerSlot::HoverExit => &mut self.hover_exit,
            HandlerSlot::Press => &mut self.press,
            HandlerSlot::Release => &mut self.release,
            HandlerSlot::Action => &mut self.action,
        }
    }

    pub(crate) fn take(&mut self, slot: HandlerSlot) -> Option<UiCallback> {
        self.slot(slot).take()
    }

    /// Put a callback back unless the slot was refilled while it ran.
    pub(crate) fn restore(&mut self, slot: HandlerSlot, callback: UiCallback) {
        let entry = self.slot(slot);
        if entry.is_none() {
            *entry = Some(callback);
        }
    }
}

/// A node of the UI tree.
///
/// `position` is relative to the parent's content origin (the screen for
/// roots). Visual fields are public; tree links and interaction state are
/// maintained by the [`UiManager`](super::UiManager).
pub struct UiElement {
    pub name: String,
    pub position: Vec2,
    pub size: Vec2,
    pub scale: Vec2,
    /// Rotation in radians around the element's center.
    pub rotation: f32,
    pub opacity: f32,
    pub visible: bool,
    pub enabled: bool,
    pub style: Style,
    pub kind: ElementKind,
    /// Render the subtree into an offscreen target and redraw it only when dirty.
    pub cache_subtree: bool,
    pub(crate) parent: Option<UiId>,
    pub(crate) children: Vec<UiId>,
    pub(crate) canvas: Option<CanvasId>,
    pub(crate) transitions: Vec<Transition>,
    pub(crate) hovered: bool,
    pub(crate) pressed: bool,
    pub(crate) dirty: bool,
    pub(crate) target: Option<RenderTargetId>,
    pub(crate) handlers: Handlers,
}

impl UiElement {
    pub fn new(kind: ElementKind, position: Vec2, size: Vec2) -> Self {
        Self {
            name: String::new(),
            position,
            size,
            scale: Vec2::ONE,
            rotation: 0.0,
            opacity: 1.0,
            visible: true,
            enabled: true,
            style: Style::default(),
            kind,
            cache_subtree: false,
            parent: None,
            children: Vec::new(),
            canvas: None,
            transitions: Vec::new(),
            hovered: false,
            pressed: false,
            dirty: true,
            target: None,
            handlers: Handlers::default(),
        }
    }

    pub fn panel(position: Vec2, size: Vec2) -> Self {
        Self::new(
            ElementKind::Panel {
                title: None,
                padding: 0.0,
                title_height: 0.0,
            },
            position,
            size,
        )
    }

    pub fn label(text: impl Into<String>, position: Vec2, font_size: f32) -> Self {
        let text = text.into();
        // Rough advance estimate; hosts with real metrics can resize.
        let size = Vec2::new(text.chars().count() as f32 * font_size * 0.5, font_size);
        Self::new(
            ElementKind::Label {
                text,
                font_size,
                color: WHITE,
            },
            position,
            size,
        )
    }

    pub fn button(label: impl Into<String>, position: Vec2, size: Vec2) -> Self {
        let mut element = Self::new(
            ElementKind::Button {
                label: label.into(),
                font_size: 18.0,
                text_color: WHITE,
                normal: [0.20, 0.22, 0.28, 1.0],
                hover: [0.28, 0.31, 0.40, 1.0],
                pressed: [0.14, 0.15, 0.20, 1.0],
            },
            position,
            size,
        );
        element.style.corner_radius = 6.0;
        element.cache_subtree = true;
        element
    }

    pub fn image(texture: TextureHandle, position: Vec2, size: Vec2) -> Self {
        Self::new(ElementKind::Image { texture, tint: WHITE }, position, size)
    }

    pub fn progress_bar(position: Vec2, size: Vec2, value: f32) -> Self {
        let mut element = Self::new(
            ElementKind::ProgressBar {
                value: value.clamp(0.0, 1.0),
                fill: [0.30, 0.80, 0.35, 1.0],
            },
            position,
            size,
        );
        element.style.background = [0.0, 0.0, 0.0, 0.6];
        element
    }

    pub fn custom(widget: impl Widget, position: Vec2, size: Vec2) -> Self {
        Self::new(ElementKind::Custom(Box::new(widget)), position, size)
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    #[must_use]
    pub fn with_style(mut self, style: Style) -> Self {
        self.style = style;
        self
    }

    #[must_use]
    pub fn with_background(mut self, color: Color) -> Self {
        self.style.background = color;
        self
    }

    #[must_use]
    pub fn with_corner_radius(mut self, radius: f32) -> Self {
        self.style.corner_radius = radius;
        self
    }

    #[must_use]
    pub fn with_border(mut self, color: Color, width: f32) -> Self {
        self.style.border = Some(Border { color, width });
        self
    }

    #[must_use]
    pub fn with_shadow(mut self, color: Color, offset: Vec2) -> Self {
        self.style.shadow = Some(Shadow { color, offset });
        self
    }

    /// Panel only: inner padding applied to children.
    #[must_use]
    pub fn with_padding(mut self, value: f32) -> Self {
        if let ElementKind::Panel { padding, .. } = &mut self.kind {
            *padding = value;
        }
        self
    }

    /// Panel only: title bar drawn at the top; children start below it.
    #[must_use]
    pub fn with_title(mut self, text: impl Into<String>, height: f32) -> Self {
        if let ElementKind::Panel {
            title, title_height, ..
        } = &mut self.kind
        {
            *title = Some(text.into());
            *title_height = height;
        }
        self
    }

    #[must_use]
    pub fn with_cached_rendering(mut self, enabled: bool) -> Self {
        self.cache_subtree = enabled;
        self
    }

    #[must_use]
    pub fn on_click(self, f: impl FnMut(&mut Context<'_>, UiId) -> Result<()> + 'static) -> Self {
        self.with_handler(HandlerSlot::Click, f)
    }

    #[must_use]
    pub fn on_hover_enter(self, f: impl FnMut(&mut Context<'_>, UiId) -> Result<()> + 'static) -> Self {
        self.with_handler(HandlerSlot::HoverEnter, f)
    }

    #[must_use]
    pub fn on_hover_exit(self, f: impl FnMut(&mut Context<'_>, UiId) -> Result<()> + 'static) -> Self {
        self.with_handler(HandlerSlot::HoverExit, f)
    }

    #[must_use]
    pub fn on_press(self, f: impl FnMut(&mut Context<'_>, UiId) -> Result<()> + 'static) -> Self {
        self.with_handler(HandlerSlot::Press, f)
    }

    #[must_use]
    pub fn on_release(self, f: impl FnMut(&mut Context<'_>, UiId) -> Result<()> + 'static) -> Self {
        self.with_handler(HandlerSlot::Release, f)
    }

    /// Button action, fired right after the click handler.
    #[must_use]
    pub fn on_action(self, f: impl FnMut(&mut Context<'_>, UiId) -> Result<()> + 'static) -> Self {
        self.with_handler(HandlerSlot::Action, f)
    }

    #[must_use]
    pub fn with_handler(
        mut self,
        slot: HandlerSlot,
        f: impl FnMut(&mut Context<'_>, UiId) -> Result<()> + 'static,
    ) -> Self {
        self.set_handler(slot, f);
        self
    }

    pub fn set_handler(&mut self, slot: HandlerSlot, f: impl FnMut(&mut Context<'_>, UiId) -> Result<()> + 'static) {
        *self.handlers.slot(slot) = Some(Box::new(f));
    }

    pub fn clear_handler(&mut self, slot: HandlerSlot) {
        *self.handlers.slot(slot) = None;
    }

    pub fn parent(&self) -> Option<UiId> {
        self.parent
    }

    pub fn children(&self) -> &[UiId] {
        &self.children
    }

    pub fn canvas(&self) -> Option<CanvasId> {
        self.canvas
    }

    pub fn is_hovered(&self) -> bool {
        self.hovered
    }

    pub fn is_pressed(&self) -> bool {
        self.pressed
    }

    /// True when the cached subtree image must be redrawn.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn is_button(&self) -> bool {
        matches!(self.kind, ElementKind::Button { .. })
    }

    pub fn has_transition(&self, property: UiProperty) -> bool {
        self.transitions.iter().any(|t| t.property == property)
    }

    pub fn transition_count(&self) -> usize {
        self.transitions.len()
    }

    pub fn property(&self, property: UiProperty) -> PropertyValue {
        match property {
            UiProperty::Position => PropertyValue::Vector(self.position),
            UiProperty::Size => PropertyValue::Vector(self.size),
            UiProperty::Scale => PropertyValue::Vector(self.scale),
            UiProperty::Rotation => PropertyValue::Scalar(self.rotation),
            UiProperty::Opacity => PropertyValue::Scalar(self.opacity),
            UiProperty::CornerRadius => PropertyValue::Scalar(self.style.corner_radius),
        }
    }

    pub fn set_property(&mut self, property: UiProperty, value: PropertyValue) {
        match property {
            UiProperty::Position => self.position = value.as_vector(),
            UiProperty::Size => self.size = value.as_vector(),
            UiProperty::Scale => self.scale = value.as_vector(),
            UiProperty::Rotation => self.rotation = value.as_scalar(),
            UiProperty::Opacity => self.opacity = value.as_scalar().clamp(0.0, 1.0),
            UiProperty::CornerRadius => self.style.corner_radius = value.as_scalar().max(0.0),
        }
    }

    /// Animate `property` from its current value to `to`, replacing any
    /// animation already running on it. A non-positive duration applies `to` at once.
    pub fn animate(&mut self, property: UiProperty, to: impl Into<PropertyValue>, duration: f32, easing: Easing) {
        let to = to.into();
        self.transitions.retain(|t| t.property != property);
        if duration <= 0.0 {
            self.set_property(property, to);
            self.dirty = true;
            return;
        }
        let from = self.property(property);
        self.transitions.push(Transition::new(property, from, to, duration, easing));
    }

    pub fn cancel_animation(&mut self, property: UiProperty) {
        self.transitions.retain(|t| t.property != property);
    }

    /// Offset from the element's top-left to where its children start.
    pub fn content_offset(&self) -> Vec2 {
        match &self.kind {
            ElementKind::Panel {
                title,
                padding,
                title_height,
            } => {
                let title = if title.is_some() { *title_height } else { 0.0 };
                Vec2::new(*padding, *padding + title)
            }
            _ => Vec2::ZERO,
        }
    }

    /// Unscaled layout rectangle for a parent content origin.
    pub(crate) fn layout_rect(&self, origin: Vec2) -> Rect {
        Rect::new(origin + self.position, self.size)
    }

    /// On-screen rectangle: the layout rectangle scaled about its center.
    pub(crate) fn visual_rect(&self, origin: Vec2) -> Rect {
        self.layout_rect(origin).scaled_about_center(self.scale)
    }

    pub(crate) fn hit_test(&self, bounds: Rect, point: Vec2) -> Result<bool> {
        // Undo rotation around the center so the test stays axis-aligned.
        let local = if self.rotation == 0.0 {
            point
        } else {
            let center = bounds.center();
            center + Vec2::from_angle(-self.rotation).rotate(point - center)
        };
        match &self.kind {
            ElementKind::Custom(widget) => widget.hit_test(bounds, local),
            _ => Ok(bounds.contains(local)),
        }
    }

    /// Step animations. Returns which kinds of change happened this frame.
    pub(crate) fn advance_transitions(&mut self, dt: f32) -> TransitionStep {
        let mut step = TransitionStep::default();
        if self.transitions.is_empty() {
            return step;
        }
        let mut transitions = std::mem::take(&mut self.transitions);
        for transition in &mut transitions {
            let value = transition.advance(dt);
            self.set_property(transition.property, value);
            step.animating = true;
            step.content_changed |= transition.property.affects_content();
            step.completed |= transition.is_finished();
        }
        transitions.retain(|t| !t.is_finished());
        self.transitions = transitions;
        step
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct TransitionStep {
    pub animating: bool,
    pub content_changed: bool,
    pub completed: bool,
}

impl std::fmt::Debug for UiElement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UiElement")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("position", &self.position)
            .field("size", &self.size)
            .field("parent", &self.parent)
            .field("children", &self.children)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Ring;

    impl Widget for Ring {
        fn draw(&self, _: Rect, _: f32, _: &mut DrawList) -> Result<()> {
            Ok(())
        }

        fn hit_test(&self, bounds: Rect, point: Vec2) -> Result<bool> {
            Ok(point.distance(bounds.center()) <= bounds.size.x * 0.5)
        }
    }

    #[test]
    fn test_panel_content_offset_includes_title() {
        let panel = UiElement::panel(Vec2::ZERO, Vec2::splat(100.0))
            .with_padding(8.0)
            .with_title("Shop", 24.0);
        assert_eq!(panel.content_offset(), Vec2::new(8.0, 32.0));
        assert_eq!(UiElement::label("hi", Vec2::ZERO, 16.0).content_offset(), Vec2::ZERO);
    }

    #[test]
    fn test_visual_rect_scales_about_center() {
        let mut button = UiElement::button("Play", Vec2::new(10.0, 10.0), Vec2::new(100.0, 40.0));
        button.scale = Vec2::splat(1.1);
        let rect = button.visual_rect(Vec2::new(5.0, 0.0));
        assert_eq!(rect.center(), Vec2::new(65.0, 30.0));
        assert!((rect.size.x - 110.0).abs() < 1e-4);
    }

    #[test]
    fn test_rotated_hit_test() {
        let mut bar = UiElement::panel(Vec2::ZERO, Vec2::new(100.0, 10.0));
        let bounds = bar.visual_rect(Vec2::ZERO);
        assert!(!bar.hit_test(bounds, Vec2::new(50.0, 40.0)).unwrap());
        bar.rotation = std::f32::consts::FRAC_PI_2;
        assert!(bar.hit_test(bounds, Vec2::new(50.0, 40.0)).unwrap());
    }

    #[test]
    fn test_custom_widget_hit_shape() {
        let ring = UiElement::custom(Ring, Vec2::ZERO, Vec2::splat(10.0));
        let bounds = ring.visual_rect(Vec2::ZERO);
        assert!(ring.hit_test(bounds, Vec2::new(5.0, 5.0)).unwrap());
        assert!(!ring.hit_test(bounds, Vec2::new(0.2, 0.2)).unwrap());
        assert!(ring.kind.name().ends_with("Ring"));
    }

    #[test]
    fn test_animate_replaces_running_transition() {
        let mut label = UiElement::label("x", Vec2::ZERO, 12.0);
        label.animate(UiProperty::Opacity, 0.0_f32, 1.0, Easing::Linear);
        label.animate(UiProperty::Opacity, 0.5_f32, 1.0, Easing::Linear);
        assert_eq!(label.transition_count(), 1);

        let step = label.advance_transitions(2.0);
        assert!(step.completed);
        assert_eq!(label.opacity, 0.5);
        assert_eq!(label.transition_count(), 0);
    }

    #[test]
    fn test_zero_duration_animation_applies_immediately() {
        let mut panel = UiElement::panel(Vec2::ZERO, Vec2::ONE);
        panel.animate(UiProperty::Position, Vec2::new(3.0, 4.0), 0.0, Easing::EaseOut);
        assert_eq!(panel.position, Vec2::new(3.0, 4.0));
        assert!(!panel.has_transition(UiProperty::Position));
    }
}
