use anyhow::Result;

use crate::math::{with_opacity, Color, Rect, Vec2, WHITE};
use crate::render::{DrawCommand, DrawList, FontHandle, RenderTargetId, TextureHandle};

use super::element::{ElementKind, UiElement};
use super::manager::UiManager;
use super::UiId;

/// Shared drawing resources supplied by the host backend.
///
/// Both are fetched lazily. A resource that is unavailable is asked for
/// again on the next draw; commands that need it are skipped meanwhile.
pub trait UiResources {
    /// 1x1 white texture used for filled shapes.
    fn pixel_texture(&mut self) -> Option<TextureHandle>;

    fn default_font(&mut self) -> Option<FontHandle>;
}

/// Resources that are known up front.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StaticResources {
    pub pixel: TextureHandle,
    pub font: FontHandle,
}

impl UiResources for StaticResources {
    fn pixel_texture(&mut self) -> Option<TextureHandle> {
        Some(self.pixel)
    }

    fn default_font(&mut self) -> Option<FontHandle> {
        Some(self.font)
    }
}

#[derive(Clone, Copy)]
struct Painter {
    pixel: Option<TextureHandle>,
    font: Option<FontHandle>,
}

impl UiManager {
    pub fn set_resources(&mut self, resources: impl UiResources + 'static) {
        self.resources = Some(Box::new(resources));
        self.pixel = None;
        self.font = None;
        self.warned_pixel = false;
        self.warned_font = false;
    }

    /// The pixel texture, asking the host again if it was missing.
    pub fn pixel_texture(&mut self) -> Option<TextureHandle> {
        if self.pixel.is_none() {
            self.pixel = self.resources.as_mut().and_then(|r| r.pixel_texture());
            match (self.pixel, self.warned_pixel) {
                (None, false) => {
                    log::warn!("UI pixel texture unavailable; filled shapes are skipped");
                    self.warned_pixel = true;
                }
                (Some(_), _) => self.warned_pixel = false,
                _ => {}
            }
        }
        self.pixel
    }

    pub fn default_font(&mut self) -> Option<FontHandle> {
        if self.font.is_none() {
            self.font = self.resources.as_mut().and_then(|r| r.default_font());
            match (self.font, self.warned_font) {
                (None, false) => {
                    log::warn!("UI default font unavailable; text is skipped");
                    self.warned_font = true;
                }
                (Some(_), _) => self.warned_font = false,
                _ => {}
            }
        }
        self.font
    }

    /// Record every visible tree, bottom to top.
    ///
    /// Subtrees marked for caching are rendered into their own target and
    /// only re-recorded while dirty; otherwise just the composite is emitted.
    pub fn draw(&mut self, draw: &mut DrawList) {
        let roots = self.draw_roots();
        if roots.is_empty() {
            return;
        }
        let painter = Painter {
            pixel: self.pixel_texture(),
            font: self.default_font(),
        };
        self.assign_targets();

        let mut drawn = Vec::new();
        for root in roots {
            self.draw_element(root, Vec2::ZERO, 1.0, painter, draw, &mut drawn);
        }
        for id in drawn {
            if let Some(element) = self.elements.get_mut(&id) {
                element.dirty = false;
            }
        }
    }

    fn assign_targets(&mut self) {
        for element in self.elements.values_mut() {
            match (element.cache_subtree, element.target) {
                (true, None) => {
                    element.target = Some(RenderTargetId(self.next_target));
                    element.dirty = true;
                    self.next_target += 1;
                }
                (false, Some(_)) => element.target = None,
                _ => {}
            }
        }
    }

    fn draw_element(
        &self,
        id: UiId,
        origin: Vec2,
        parent_opacity: f32,
        painter: Painter,
        draw: &mut DrawList,
        drawn: &mut Vec<UiId>,
    ) {
        let Some(element) = self.elements.get(&id) else {
            return;
        };
        if !element.visible {
            return;
        }
        let opacity = parent_opacity * element.opacity;
        let bounds = element.visual_rect(origin);

        if let (true, Some(target)) = (element.cache_subtree, element.target) {
            if element.dirty {
                let size = element.size;
                draw.push(DrawCommand::BeginTarget { target, size });
                let local = Rect::new(Vec2::ZERO, size);
                self.draw_subtree(id, element, local, 0.0, 1.0, element.content_offset(), painter, draw, drawn);
                draw.push(DrawCommand::EndTarget);
            }
            draw.push(DrawCommand::Composite {
                target,
                bounds,
                rotation: element.rotation,
                opacity,
            });
            return;
        }

        let child_origin = element.layout_rect(origin).position + element.content_offset();
        self.draw_subtree(id, element, bounds, element.rotation, opacity, child_origin, painter, draw, drawn);
    }

    #[allow(clippy::too_many_arguments)]
    fn draw_subtree(
        &self,
        id: UiId,
        element: &UiElement,
        bounds: Rect,
        rotation: f32,
        opacity: f32,
        child_origin: Vec2,
        painter: Painter,
        draw: &mut DrawList,
        drawn: &mut Vec<UiId>,
    ) {
        let mut scratch = DrawList::new();
        if let Err(err) = paint(element, bounds, rotation, opacity, painter, &mut scratch) {
            log::error!("draw failed for {} `{}`: {err:#}", element.kind.name(), element.name);
            return;
        }
        draw.append(&mut scratch);
        drawn.push(id);
        for child in &element.children {
            self.draw_element(*child, child_origin, opacity, painter, draw, drawn);
        }
    }
}

fn paint(element: &UiElement, bounds: Rect, rotation: f32, opacity: f32, painter: Painter, draw: &mut DrawList) -> Result<()> {
    let style = &element.style;
    let radius = style.corner_radius;
    // Cached layers are recorded unscaled.
    let text_scale = if element.size.y > 0.0 { bounds.size.y / element.size.y } else { 1.0 };

    if let Some(shadow) = style.shadow {
        draw.push(DrawCommand::Shadow {
            bounds,
            color: with_opacity(shadow.color, opacity),
            offset: shadow.offset,
            corner_radius: radius,
        });
    }

    let background = match &element.kind {
        ElementKind::Button { normal, hover, pressed, .. } => {
            if element.pressed {
                *pressed
            } else if element.hovered {
                *hover
            } else {
                *normal
            }
        }
        _ => style.background,
    };
    fill(draw, painter, bounds, background, radius, rotation, opacity);

    match &element.kind {
        ElementKind::Panel {
            title: Some(title),
            padding,
            title_height,
        } => {
            let size = title_height * 0.6 * text_scale;
            let position = bounds.position + Vec2::new(*padding, title_height * 0.2) * text_scale;
            text(draw, painter, title, size, position, WHITE, opacity);
        }
        ElementKind::Panel { .. } => {}
        ElementKind::Label { text: label, font_size, color } => {
            text(draw, painter, label, font_size * text_scale, bounds.position, *color, opacity);
        }
        ElementKind::Button {
            label,
            font_size,
            text_color,
            ..
        } => {
            let size = font_size * text_scale;
            let width = label.chars().count() as f32 * size * 0.5;
            let position = bounds.center() - Vec2::new(width, size) * 0.5;
            text(draw, painter, label, size, position, *text_color, opacity);
        }
        ElementKind::Image { texture, tint } => {
            draw.sprite(*texture, bounds.position, bounds.size, rotation, with_opacity(*tint, opacity));
        }
        ElementKind::ProgressBar { value, fill: color } => {
            let filled = Rect::new(bounds.position, Vec2::new(bounds.size.x * value.clamp(0.0, 1.0), bounds.size.y));
            fill(draw, painter, filled, *color, radius, rotation, opacity);
        }
        ElementKind::Custom(widget) => widget.draw(bounds, opacity, draw)?,
    }

    if let Some(border) = style.border {
        draw.push(DrawCommand::Border {
            bounds,
            color: with_opacity(border.color, opacity),
            width: border.width,
            corner_radius: radius,
        });
    }
    Ok(())
}

fn fill(draw: &mut DrawList, painter: Painter, bounds: Rect, color: Color, corner_radius: f32, rotation: f32, opacity: f32) {
    let Some(texture) = painter.pixel else {
        return;
    };
    if color[3] <= 0.0 || bounds.size.x <= 0.0 {
        return;
    }
    draw.push(DrawCommand::Rect {
        bounds,
        color: with_opacity(color, opacity),
        corner_radius,
        rotation,
        texture,
    });
}

fn text(draw: &mut DrawList, painter: Painter, text: &str, size: f32, position: Vec2, color: Color, opacity: f32) {
    let Some(font) = painter.font else {
        return;
    };
    if text.is_empty() {
        return;
    }
    draw.push(DrawCommand::Text {
        text: text.to_owned(),
        font,
        size,
        position,
        color: with_opacity(color, opacity),
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::BLACK;
    use crate::ui::UiProperty;
    use std::cell::Cell;
    use std::rc::Rc;

    const RESOURCES: StaticResources = StaticResources {
        pixel: TextureHandle(1),
        font: FontHandle(2),
    };

    fn kinds(list: &DrawList) -> Vec<&'static str> {
        list.commands()
            .iter()
            .map(|command| match command {
                DrawCommand::Rect { .. } => "rect",
                DrawCommand::Border { .. } => "border",
                DrawCommand::Shadow { .. } => "shadow",
                DrawCommand::Text { .. } => "text",
                DrawCommand::Sprite { .. } => "sprite",
                DrawCommand::BeginTarget { .. } => "begin",
                DrawCommand::EndTarget => "end",
                DrawCommand::Composite { .. } => "composite",
            })
            .collect()
    }

    #[test]
    fn test_panel_draw_order() {
        let mut ui = UiManager::new();
        ui.set_resources(RESOURCES);
        let root = ui.add_root(
            UiElement::panel(Vec2::new(10.0, 10.0), Vec2::new(100.0, 100.0))
                .with_background(BLACK)
                .with_shadow(BLACK, Vec2::splat(4.0))
                .with_border(WHITE, 2.0)
                .with_title("Inventory", 20.0),
        );
        ui.spawn_child(root, UiElement::label("Gold", Vec2::ZERO, 14.0)).unwrap();

        let mut list = DrawList::new();
        ui.draw(&mut list);
        assert_eq!(kinds(&list), ["shadow", "rect", "text", "border", "text"]);
        match &list.commands()[4] {
            DrawCommand::Text { position, .. } => assert_eq!(*position, Vec2::new(10.0, 30.0)),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_missing_pixel_texture_skips_fills_and_retries() {
        struct Flaky {
            calls: Rc<Cell<u32>>,
        }
        impl UiResources for Flaky {
            fn pixel_texture(&mut self) -> Option<TextureHandle> {
                self.calls.set(self.calls.get() + 1);
                (self.calls.get() > 1).then_some(TextureHandle(7))
            }
            fn default_font(&mut self) -> Option<FontHandle> {
                Some(FontHandle(1))
            }
        }

        let calls = Rc::new(Cell::new(0));
        let mut ui = UiManager::new();
        ui.set_resources(Flaky { calls: calls.clone() });
        ui.add_root(UiElement::button("Play", Vec2::ZERO, Vec2::new(80.0, 30.0)).with_cached_rendering(false));

        let mut list = DrawList::new();
        ui.draw(&mut list);
        assert_eq!(kinds(&list), ["text"]);

        list.clear();
        ui.draw(&mut list);
        assert_eq!(kinds(&list), ["rect", "text"]);
        ui.draw(&mut list);
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn test_cached_subtree_redraws_only_when_dirty() {
        let mut ui = UiManager::new();
        ui.set_resources(RESOURCES);
        let root = ui.add_root(
            UiElement::panel(Vec2::new(50.0, 50.0), Vec2::new(100.0, 60.0))
                .with_background(BLACK)
                .with_cached_rendering(true),
        );
        let label = ui.spawn_child(root, UiElement::label("Score", Vec2::ZERO, 12.0)).unwrap();

        let mut list = DrawList::new();
        ui.draw(&mut list);
        assert_eq!(kinds(&list), ["begin", "rect", "text", "end", "composite"]);
        assert!(!ui.element(root).unwrap().is_dirty());

        list.clear();
        ui.draw(&mut list);
        assert_eq!(kinds(&list), ["composite"]);

        // Instant property changes invalidate the layer.
        ui.animate(root, UiProperty::Opacity, 0.5_f32, 0.0, Default::default()).unwrap();
        list.clear();
        ui.draw(&mut list);
        assert_eq!(kinds(&list), ["begin", "rect", "text", "end", "composite"]);

        if let Some(element) = ui.element_mut(label) {
            element.visible = false;
        }
        list.clear();
        ui.draw(&mut list);
        assert_eq!(kinds(&list), ["begin", "rect", "end", "composite"]);
        match list.commands().last() {
            Some(DrawCommand::Composite { bounds, opacity, .. }) => {
                assert_eq!(bounds.position, Vec2::new(50.0, 50.0));
                assert_eq!(*opacity, 0.5);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_progress_bar_fill_width() {
        let mut ui = UiManager::new();
        ui.set_resources(RESOURCES);
        ui.add_root(UiElement::progress_bar(Vec2::ZERO, Vec2::new(200.0, 10.0), 0.25));

        let mut list = DrawList::new();
        ui.draw(&mut list);
        let widths: Vec<f32> = list
            .commands()
            .iter()
            .filter_map(|command| match command {
                DrawCommand::Rect { bounds, .. } => Some(bounds.size.x),
                _ => None,
            })
            .collect();
        assert_eq!(widths, [200.0, 50.0]);
    }
}
