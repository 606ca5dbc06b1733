use std::collections::{HashMap, HashSet};

use crate::config::RuntimeConfig;
use crate::context::Context;
use crate::error::CoreError;
use crate::input::PointerState;
use crate::math::{Rect, Vec2};
use crate::render::{FontHandle, TextureHandle};

use super::draw::UiResources;
use super::element::{ElementKind, HandlerSlot, UiElement};
use super::transition::{Easing, PropertyValue, UiProperty};
use super::{CanvasId, UiId};

/// Interaction notifications queued for the host.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UiEventKind {
    HoverEnter,
    HoverExit,
    Press,
    Release,
    Click,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UiEvent {
    pub element: UiId,
    pub kind: UiEventKind,
}

pub(super) struct Canvas {
    pub(super) name: String,
    pub(super) visible: bool,
    pub(super) roots: Vec<UiId>,
}

/// Owner of every UI element, canvas and the pointer interaction state.
///
/// Elements live in an arena keyed by [`UiId`]. A tree takes part in
/// drawing and hit-testing once its root is attached to a canvas or
/// registered directly as a root. Visible canvases come first, in creation
/// order, followed by direct roots; later entries are drawn on top.
pub struct UiManager {
    pub(super) elements: HashMap<UiId, UiElement>,
    next_element: u32,
    pub(super) canvases: HashMap<CanvasId, Canvas>,
    pub(super) canvas_order: Vec<CanvasId>,
    next_canvas: u32,
    pub(super) roots: Vec<UiId>,
    hovered: Option<UiId>,
    pressed: Option<UiId>,
    previous: PointerState,
    events: Vec<UiEvent>,
    pub(super) resources: Option<Box<dyn UiResources>>,
    pub(super) pixel: Option<TextureHandle>,
    pub(super) font: Option<FontHandle>,
    pub(super) warned_pixel: bool,
    pub(super) warned_font: bool,
    pub(super) next_target: u32,
}

impl UiManager {
    pub fn new() -> Self {
        Self {
            elements: HashMap::new(),
            next_element: 1,
            canvases: HashMap::new(),
            canvas_order: Vec::new(),
            next_canvas: 1,
            roots: Vec::new(),
            hovered: None,
            pressed: None,
            previous: PointerState::default(),
            events: Vec::new(),
            resources: None,
            pixel: None,
            font: None,
            warned_pixel: false,
            warned_font: false,
            next_target: 1,
        }
    }

    /// Number of elements in the arena, attached or not.
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn contains(&self, id: UiId) -> bool {
        self.elements.contains_key(&id)
    }

    pub fn element(&self, id: UiId) -> Option<&UiElement> {
        self.elements.get(&id)
    }

    /// Mutable access. Marks the element's cached image, and its ancestors', dirty.
    pub fn element_mut(&mut self, id: UiId) -> Option<&mut UiElement> {
        self.mark_dirty(id);
        self.elements.get_mut(&id)
    }

    pub fn hovered(&self) -> Option<UiId> {
        self.hovered
    }

    pub fn pressed(&self) -> Option<UiId> {
        self.pressed
    }

    /// Interaction events queued since the last drain.
    pub fn drain_events(&mut self) -> Vec<UiEvent> {
        std::mem::take(&mut self.events)
    }

    /// Store a detached element. It is not drawn until attached somewhere.
    pub fn insert(&mut self, element: UiElement) -> UiId {
        let id = UiId(self.next_element);
        self.next_element += 1;
        let mut element = element;
        element.parent = None;
        element.children.clear();
        element.canvas = None;
        self.elements.insert(id, element);
        id
    }

    /// Store an element and register it directly as a root.
    pub fn add_root(&mut self, element: UiElement) -> UiId {
        let id = self.insert(element);
        self.roots.push(id);
        id
    }

    /// Register an existing detached element as a root.
    pub fn register_root(&mut self, id: UiId) -> Result<(), CoreError> {
        self.ensure_detached(id)?;
        self.roots.push(id);
        Ok(())
    }

    /// Stop drawing a root. The element stays in the arena.
    pub fn unregister_root(&mut self, id: UiId) -> bool {
        let before = self.roots.len();
        self.roots.retain(|root| *root != id);
        before != self.roots.len()
    }

    pub fn roots(&self) -> &[UiId] {
        &self.roots
    }

    pub fn create_canvas(&mut self, name: impl Into<String>) -> CanvasId {
        let id = CanvasId(self.next_canvas);
        self.next_canvas += 1;
        self.canvases.insert(
            id,
            Canvas {
                name: name.into(),
                visible: true,
                roots: Vec::new(),
            },
        );
        self.canvas_order.push(id);
        id
    }

    /// Remove a canvas together with every element attached to it.
    pub fn remove_canvas(&mut self, id: CanvasId) -> Result<(), CoreError> {
        let canvas = self.canvases.remove(&id).ok_or(CoreError::UnknownCanvas(id))?;
        self.canvas_order.retain(|canvas| *canvas != id);
        for root in canvas.roots {
            self.remove_subtree(root);
        }
        Ok(())
    }

    pub fn canvas_name(&self, id: CanvasId) -> Option<&str> {
        self.canvases.get(&id).map(|canvas| canvas.name.as_str())
    }

    pub fn canvas_by_name(&self, name: &str) -> Option<CanvasId> {
        self.canvas_order
            .iter()
            .copied()
            .find(|id| self.canvases.get(id).map(|c| c.name == name).unwrap_or(false))
    }

    pub fn canvas_roots(&self, id: CanvasId) -> &[UiId] {
        self.canvases.get(&id).map(|c| c.roots.as_slice()).unwrap_or(&[])
    }

    pub fn is_canvas_visible(&self, id: CanvasId) -> bool {
        self.canvases.get(&id).map(|c| c.visible).unwrap_or(false)
    }

    pub fn set_canvas_visible(&mut self, id: CanvasId, visible: bool) -> Result<(), CoreError> {
        let canvas = self.canvases.get_mut(&id).ok_or(CoreError::UnknownCanvas(id))?;
        canvas.visible = visible;
        Ok(())
    }

    /// Store an element as a new root of `canvas`.
    pub fn canvas_add(&mut self, canvas: CanvasId, element: UiElement) -> Result<UiId, CoreError> {
        if !self.canvases.contains_key(&canvas) {
            return Err(CoreError::UnknownCanvas(canvas));
        }
        let id = self.insert(element);
        self.attach_to_canvas(canvas, id)?;
        Ok(id)
    }

    /// Attach an existing detached element as a root of `canvas`.
    pub fn attach_to_canvas(&mut self, canvas: CanvasId, id: UiId) -> Result<(), CoreError> {
        if !self.canvases.contains_key(&canvas) {
            return Err(CoreError::UnknownCanvas(canvas));
        }
        self.ensure_detached(id)?;
        if let Some(entry) = self.canvases.get_mut(&canvas) {
            entry.roots.push(id);
        }
        self.set_subtree_canvas(id, Some(canvas));
        Ok(())
    }

    /// Make `child` the last (topmost) child of `parent`.
    ///
    /// Fails if `child` already has a parent or is a root, if either id is
    /// unknown, or if `child` is an ancestor of `parent`.
    pub fn add_child(&mut self, parent: UiId, child: UiId) -> Result<(), CoreError> {
        if !self.elements.contains_key(&parent) {
            return Err(CoreError::UnknownElement(parent));
        }
        if let Err(err) = self.ensure_detached(child) {
            log::error!("add_child({parent:?}, {child:?}) rejected: {err}");
            return Err(err);
        }
        if self.is_ancestor(child, parent) {
            log::error!("add_child({parent:?}, {child:?}) would create a cycle");
            return Err(CoreError::HierarchyCycle);
        }

        let canvas = self.elements.get(&parent).and_then(|p| p.canvas);
        if let Some(element) = self.elements.get_mut(&child) {
            element.parent = Some(parent);
        }
        if let Some(element) = self.elements.get_mut(&parent) {
            element.children.push(child);
        }
        self.set_subtree_canvas(child, canvas);
        self.mark_dirty(parent);
        Ok(())
    }

    /// Store `element` and make it a child of `parent`.
    pub fn spawn_child(&mut self, parent: UiId, element: UiElement) -> Result<UiId, CoreError> {
        if !self.elements.contains_key(&parent) {
            return Err(CoreError::UnknownElement(parent));
        }
        let id = self.insert(element);
        self.add_child(parent, id)?;
        Ok(id)
    }

    /// Detach `child` from `parent`. The child stays in the arena.
    pub fn remove_child(&mut self, parent: UiId, child: UiId) -> Result<bool, CoreError> {
        let element = self.elements.get_mut(&parent).ok_or(CoreError::UnknownElement(parent))?;
        let before = element.children.len();
        element.children.retain(|c| *c != child);
        if before == element.children.len() {
            return Ok(false);
        }
        if let Some(element) = self.elements.get_mut(&child) {
            element.parent = None;
        }
        self.set_subtree_canvas(child, None);
        self.mark_dirty(parent);
        Ok(true)
    }

    /// Detach an element from wherever it hangs and delete its whole subtree.
    pub fn remove(&mut self, id: UiId) -> bool {
        let Some(parent) = self.elements.get(&id).map(|e| e.parent) else {
            return false;
        };
        match parent {
            Some(parent) => {
                if let Some(parent_element) = self.elements.get_mut(&parent) {
                    parent_element.children.retain(|c| *c != id);
                }
                self.mark_dirty(parent);
            }
            None => {
                self.roots.retain(|root| *root != id);
                for canvas in self.canvases.values_mut() {
                    canvas.roots.retain(|root| *root != id);
                }
            }
        }
        self.remove_subtree(id);
        true
    }

    /// Move an element to the end of its sibling list so it draws on top.
    pub fn bring_to_front(&mut self, id: UiId) -> bool {
        fn move_last(list: &mut Vec<UiId>, id: UiId) -> bool {
            match list.iter().position(|item| *item == id) {
                Some(index) => {
                    let item = list.remove(index);
                    list.push(item);
                    true
                }
                None => false,
            }
        }

        let Some(parent) = self.elements.get(&id).map(|e| e.parent) else {
            return false;
        };
        if let Some(parent) = parent {
            let moved = self
                .elements
                .get_mut(&parent)
                .map(|p| move_last(&mut p.children, id))
                .unwrap_or(false);
            self.mark_dirty(parent);
            return moved;
        }
        if move_last(&mut self.roots, id) {
            return true;
        }
        self.canvases.values_mut().any(|canvas| move_last(&mut canvas.roots, id))
    }

    /// First element named `name`, searching attached trees in draw order.
    pub fn find_by_name(&self, name: &str) -> Option<UiId> {
        let mut stack: Vec<UiId> = self.all_roots().into_iter().rev().collect();
        while let Some(id) = stack.pop() {
            let Some(element) = self.elements.get(&id) else {
                continue;
            };
            if element.name == name {
                return Some(id);
            }
            stack.extend(element.children.iter().rev());
        }
        None
    }

    /// Screen-space visual bounds of an element.
    pub fn bounds(&self, id: UiId) -> Option<Rect> {
        let element = self.elements.get(&id)?;
        Some(element.visual_rect(self.parent_origin(id)))
    }

    /// Animate a property of an element. See [`UiElement::animate`].
    pub fn animate(
        &mut self,
        id: UiId,
        property: UiProperty,
        to: impl Into<PropertyValue>,
        duration: f32,
        easing: Easing,
    ) -> Result<(), CoreError> {
        let element = self.elements.get_mut(&id).ok_or(CoreError::UnknownElement(id))?;
        element.animate(property, to, duration, easing);
        if duration <= 0.0 {
            self.mark_dirty(id);
        }
        Ok(())
    }

    /// Deepest enabled, visible element under `point`, topmost first.
    pub fn hit_test(&self, point: Vec2) -> Option<UiId> {
        self.draw_roots()
            .into_iter()
            .rev()
            .find_map(|root| self.hit_element(root, Vec2::ZERO, point))
    }

    /// Advance animations, resolve pointer interaction and run callbacks.
    pub fn update(ctx: &mut Context<'_>, pointer: PointerState) {
        let dt = ctx.delta_seconds();
        ctx.ui.animate_tree(dt);
        let fired = ctx.ui.process_pointer(pointer, ctx.config);
        for (id, slot) in fired {
            Self::invoke(ctx, id, slot);
        }
    }

    /// Drop every element and canvas.
    pub fn clear(&mut self) {
        self.elements.clear();
        self.canvases.clear();
        self.canvas_order.clear();
        self.roots.clear();
        self.hovered = None;
        self.pressed = None;
        self.events.clear();
    }

    /// Roots that take part in drawing and hit-testing, bottom to top.
    pub(super) fn draw_roots(&self) -> Vec<UiId> {
        let mut roots = Vec::new();
        for id in &self.canvas_order {
            if let Some(canvas) = self.canvases.get(id) {
                if canvas.visible {
                    roots.extend(canvas.roots.iter().copied());
                }
            }
        }
        roots.extend(self.roots.iter().copied());
        roots
    }

    /// Every attached root, hidden canvases included.
    fn all_roots(&self) -> Vec<UiId> {
        let mut roots: Vec<UiId> = self
            .canvas_order
            .iter()
            .filter_map(|id| self.canvases.get(id))
            .flat_map(|canvas| canvas.roots.iter().copied())
            .collect();
        roots.extend(self.roots.iter().copied());
        roots
    }

    fn hit_element(&self, id: UiId, origin: Vec2, point: Vec2) -> Option<UiId> {
        let element = self.elements.get(&id)?;
        if !element.visible || !element.enabled {
            return None;
        }
        // Children are not clipped to their parent, so they are tested first.
        let child_origin = element.layout_rect(origin).position + element.content_offset();
        if let Some(hit) = element
            .children
            .iter()
            .rev()
            .find_map(|child| self.hit_element(*child, child_origin, point))
        {
            return Some(hit);
        }
        let bounds = element.visual_rect(origin);
        match element.hit_test(bounds, point) {
            Ok(true) => Some(id),
            Ok(false) => None,
            Err(err) => {
                log::error!("hit-test failed for {} `{}`: {err:#}", element.kind.name(), element.name);
                None
            }
        }
    }

    /// Content origin of the element's parent, in screen space.
    fn parent_origin(&self, id: UiId) -> Vec2 {
        let mut chain = Vec::new();
        let mut current = self.elements.get(&id).and_then(|e| e.parent);
        while let Some(parent) = current {
            let Some(element) = self.elements.get(&parent) else {
                break;
            };
            chain.push(parent);
            current = element.parent;
        }
        chain.iter().rev().fold(Vec2::ZERO, |origin, ancestor| {
            self.elements
                .get(ancestor)
                .map(|e| e.layout_rect(origin).position + e.content_offset())
                .unwrap_or(origin)
        })
    }

    fn ensure_detached(&self, id: UiId) -> Result<(), CoreError> {
        let element = self.elements.get(&id).ok_or(CoreError::UnknownElement(id))?;
        let is_root = self.roots.contains(&id) || self.canvases.values().any(|c| c.roots.contains(&id));
        if element.parent.is_some() || is_root {
            return Err(CoreError::AlreadyParented(id));
        }
        Ok(())
    }

    fn is_ancestor(&self, ancestor: UiId, id: UiId) -> bool {
        let mut current = Some(id);
        while let Some(node) = current {
            if node == ancestor {
                return true;
            }
            current = self.elements.get(&node).and_then(|e| e.parent);
        }
        false
    }

    fn set_subtree_canvas(&mut self, id: UiId, canvas: Option<CanvasId>) {
        let mut stack = vec![id];
        while let Some(node) = stack.pop() {
            if let Some(element) = self.elements.get_mut(&node) {
                element.canvas = canvas;
                stack.extend(element.children.iter().copied());
            }
        }
    }

    fn remove_subtree(&mut self, id: UiId) {
        let mut stack = vec![id];
        while let Some(node) = stack.pop() {
            if let Some(element) = self.elements.remove(&node) {
                stack.extend(element.children);
            }
            if self.hovered == Some(node) {
                self.hovered = None;
            }
            if self.pressed == Some(node) {
                self.pressed = None;
            }
        }
    }

    /// Flag an element and all of its ancestors for a cache redraw.
    pub(super) fn mark_dirty(&mut self, id: UiId) {
        let mut current = Some(id);
        while let Some(node) = current {
            match self.elements.get_mut(&node) {
                Some(element) => {
                    element.dirty = true;
                    current = element.parent;
                }
                None => break,
            }
        }
    }

    /// Active subtrees in draw order, skipping hidden or disabled branches.
    fn active_elements(&self) -> Vec<UiId> {
        let mut out = Vec::new();
        let mut stack: Vec<UiId> = self.draw_roots().into_iter().rev().collect();
        while let Some(id) = stack.pop() {
            let Some(element) = self.elements.get(&id) else {
                continue;
            };
            if !element.visible || !element.enabled {
                continue;
            }
            out.push(id);
            stack.extend(element.children.iter().rev());
        }
        out
    }

    fn animate_tree(&mut self, dt: f32) {
        for id in self.active_elements() {
            let Some(element) = self.elements.get_mut(&id) else {
                continue;
            };
            let step = element.advance_transitions(dt);
            if let ElementKind::Custom(widget) = &mut element.kind {
                if let Err(err) = widget.update(dt) {
                    log::error!("update failed for {} `{}`: {err:#}", widget.name(), element.name);
                }
            }
            let parent = element.parent;
            if step.content_changed || step.completed {
                self.mark_dirty(id);
            } else if let (true, Some(parent)) = (step.animating, parent) {
                self.mark_dirty(parent);
            }
        }
    }

    fn process_pointer(&mut self, pointer: PointerState, config: &RuntimeConfig) -> Vec<(UiId, HandlerSlot)> {
        let previous = std::mem::replace(&mut self.previous, pointer);
        let hit = self.hit_test(pointer.position);
        let mut fired = Vec::new();
        let mut touched = HashSet::new();

        if hit != self.hovered {
            if let Some(old) = self.hovered.take() {
                if let Some(element) = self.elements.get_mut(&old) {
                    element.hovered = false;
                }
                self.push_event(old, UiEventKind::HoverExit, HandlerSlot::HoverExit, &mut fired);
                touched.insert(old);
            }
            if let Some(new) = hit {
                if let Some(element) = self.elements.get_mut(&new) {
                    element.hovered = true;
                }
                self.push_event(new, UiEventKind::HoverEnter, HandlerSlot::HoverEnter, &mut fired);
                touched.insert(new);
            }
            self.hovered = hit;
        }

        if pointer.pressed_since(&previous) {
            if let Some(target) = hit {
                if let Some(element) = self.elements.get_mut(&target) {
                    element.pressed = true;
                }
                self.pressed = Some(target);
                self.push_event(target, UiEventKind::Press, HandlerSlot::Press, &mut fired);
                touched.insert(target);
            }
        }

        if pointer.released_since(&previous) {
            if let Some(target) = self.pressed.take() {
                let is_button = match self.elements.get_mut(&target) {
                    Some(element) => {
                        element.pressed = false;
                        element.is_button()
                    }
                    None => false,
                };
                self.push_event(target, UiEventKind::Release, HandlerSlot::Release, &mut fired);
                touched.insert(target);
                if hit == Some(target) {
                    self.push_event(target, UiEventKind::Click, HandlerSlot::Click, &mut fired);
                    if is_button {
                        fired.push((target, HandlerSlot::Action));
                    }
                }
            }
        }

        for id in touched {
            self.animate_button(id, config);
        }
        fired
    }

    fn push_event(&mut self, element: UiId, kind: UiEventKind, slot: HandlerSlot, fired: &mut Vec<(UiId, HandlerSlot)>) {
        self.events.push(UiEvent { element, kind });
        fired.push((element, slot));
    }

    /// Ease a button's scale towards its hover/press target.
    fn animate_button(&mut self, id: UiId, config: &RuntimeConfig) {
        let Some(element) = self.elements.get_mut(&id) else {
            return;
        };
        if !element.is_button() {
            return;
        }
        let target = if element.pressed {
            config.button_press_scale
        } else if element.hovered {
            config.button_hover_scale
        } else {
            1.0
        };
        element.animate(UiProperty::Scale, Vec2::splat(target), config.button_animation, Easing::EaseOut);
        // Fill colour follows the interaction state.
        self.mark_dirty(id);
    }

    fn invoke(ctx: &mut Context<'_>, id: UiId, slot: HandlerSlot) {
        let Some(mut callback) = ctx.ui.elements.get_mut(&id).and_then(|e| e.handlers.take(slot)) else {
            return;
        };
        if let Err(err) = callback(ctx, id) {
            let kind = ctx.ui.elements.get(&id).map(|e| e.kind.name()).unwrap_or("removed element");
            log::error!("{slot:?} handler failed for {kind} {id:?}: {err:#}");
        }
        if let Some(element) = ctx.ui.elements.get_mut(&id) {
            element.handlers.restore(slot, callback);
        }
    }
}

impl Default for UiManager {
    fn default() -> Self {
        Self::new()
    }
}
