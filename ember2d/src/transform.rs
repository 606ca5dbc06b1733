//! Hierarchical 2D transforms with lazily recomputed world values.
//!
//! A [`Transform`] is a cheap, clonable handle to a node in a transform tree.
//! Parents hold their children strongly; children refer back to the parent
//! through a weak link, so a hierarchy never keeps itself alive.
//!
//! World values are cached. Any local change marks the node and all of its
//! descendants dirty, and the next read of a world value recomputes the chain
//! from the nearest clean ancestor downward.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use glam::Affine2;

use crate::error::CoreError;
use crate::math::{safe_div, Transform2D, Vec2};

struct Node {
    local: Transform2D,
    world: Transform2D,
    world_matrix: Affine2,
    dirty: bool,
    parent: Weak<RefCell<Node>>,
    children: Vec<Transform>,
}

/// Position, rotation and scale of a game object, relative to an optional parent.
#[derive(Clone)]
pub struct Transform {
    node: Rc<RefCell<Node>>,
}

impl Transform {
    /// Create a root transform at the origin.
    pub fn new() -> Self {
        Self::from_local(Transform2D::identity())
    }

    /// Create a root transform with the given local values.
    pub fn from_local(local: Transform2D) -> Self {
        Self {
            node: Rc::new(RefCell::new(Node {
                local,
                world: local,
                world_matrix: local.to_matrix(),
                dirty: true,
                parent: Weak::new(),
                children: Vec::new(),
            })),
        }
    }

    /// Create a root transform at `position`.
    pub fn from_position(position: Vec2) -> Self {
        Self::from_local(Transform2D::new(position, Vec2::ONE, 0.0))
    }

    /// True when both handles refer to the same node.
    pub fn ptr_eq(&self, other: &Transform) -> bool {
        Rc::ptr_eq(&self.node, &other.node)
    }

    pub fn local(&self) -> Transform2D {
        self.node.borrow().local
    }

    pub fn local_position(&self) -> Vec2 {
        self.node.borrow().local.position
    }

    pub fn local_rotation(&self) -> f32 {
        self.node.borrow().local.rotation
    }

    pub fn local_scale(&self) -> Vec2 {
        self.node.borrow().local.scale
    }

    pub fn set_local_position(&self, position: Vec2) {
        {
            let mut node = self.node.borrow_mut();
            if node.local.position == position {
                return;
            }
            node.local.position = position;
        }
        self.mark_dirty();
    }

    pub fn set_local_rotation(&self, rotation: f32) {
        {
            let mut node = self.node.borrow_mut();
            if node.local.rotation == rotation {
                return;
            }
            node.local.rotation = rotation;
        }
        self.mark_dirty();
    }

    pub fn set_local_scale(&self, scale: Vec2) {
        {
            let mut node = self.node.borrow_mut();
            if node.local.scale == scale {
                return;
            }
            node.local.scale = scale;
        }
        self.mark_dirty();
    }

    /// Move by `delta` in parent space.
    pub fn translate(&self, delta: Vec2) {
        self.set_local_position(self.local_position() + delta);
    }

    /// Rotate by `angle` radians.
    pub fn rotate(&self, angle: f32) {
        self.set_local_rotation(self.local_rotation() + angle);
    }

    pub fn world_position(&self) -> Vec2 {
        self.refresh();
        self.node.borrow().world.position
    }

    pub fn world_rotation(&self) -> f32 {
        self.refresh();
        self.node.borrow().world.rotation
    }

    pub fn world_scale(&self) -> Vec2 {
        self.refresh();
        self.node.borrow().world.scale
    }

    /// World values as a plain [`Transform2D`].
    pub fn world(&self) -> Transform2D {
        self.refresh();
        self.node.borrow().world
    }

    /// Scale -> rotate -> translate matrix of the world values.
    pub fn world_matrix(&self) -> Affine2 {
        self.refresh();
        self.node.borrow().world_matrix
    }

    /// Place the node at `position` in world space.
    ///
    /// With a parent, the position is mapped through the inverse of the
    /// parent's world matrix. A degenerate parent (zero scale) has no inverse
    /// and the call is ignored.
    pub fn set_world_position(&self, position: Vec2) {
        match self.parent() {
            None => self.set_local_position(position),
            Some(parent) => {
                let matrix = parent.world_matrix();
                if matrix.matrix2.determinant() == 0.0 {
                    log::warn!("cannot solve local position under a zero-scale parent");
                    return;
                }
                self.set_local_position(matrix.inverse().transform_point2(position));
            }
        }
    }

    pub fn set_world_rotation(&self, rotation: f32) {
        match self.parent() {
            None => self.set_local_rotation(rotation),
            Some(parent) => self.set_local_rotation(rotation - parent.world_rotation()),
        }
    }

    pub fn set_world_scale(&self, scale: Vec2) {
        match self.parent() {
            None => self.set_local_scale(scale),
            Some(parent) => self.set_local_scale(safe_div(scale, parent.world_scale())),
        }
    }

    pub fn parent(&self) -> Option<Transform> {
        self.node
            .borrow()
            .parent
            .upgrade()
            .map(|node| Transform { node })
    }

    pub fn children(&self) -> Vec<Transform> {
        self.node.borrow().children.clone()
    }

    pub fn child_count(&self) -> usize {
        self.node.borrow().children.len()
    }

    /// Topmost ancestor, or `self` for a root.
    pub fn root(&self) -> Transform {
        let mut current = self.clone();
        while let Some(parent) = current.parent() {
            current = parent;
        }
        current
    }

    /// True if `self` is `other` or one of its ancestors.
    pub fn is_ancestor_of(&self, other: &Transform) -> bool {
        let mut current = Some(other.clone());
        while let Some(node) = current {
            if node.ptr_eq(self) {
                return true;
            }
            current = node.parent();
        }
        false
    }

    /// Attach to `new_parent` (or become a root with `None`).
    ///
    /// With `keep_world_pose` the world position, rotation and scale read
    /// before the change are re-applied afterwards, so the node does not
    /// visibly move. Otherwise the local values are kept and the node
    /// inherits the new parent's pose.
    pub fn set_parent(
        &self,
        new_parent: Option<&Transform>,
        keep_world_pose: bool,
    ) -> Result<(), CoreError> {
        if let Some(parent) = new_parent {
            if self.is_ancestor_of(parent) {
                log::error!("rejected transform re-parent that would create a cycle");
                return Err(CoreError::HierarchyCycle);
            }
        }

        let current = self.parent();
        let unchanged = match (&current, new_parent) {
            (None, None) => true,
            (Some(a), Some(b)) => a.ptr_eq(b),
            _ => false,
        };
        if unchanged {
            return Ok(());
        }

        let pose = keep_world_pose.then(|| self.world());

        if let Some(old) = current {
            old.node
                .borrow_mut()
                .children
                .retain(|child| !child.ptr_eq(self));
        }
        match new_parent {
            Some(parent) => {
                self.node.borrow_mut().parent = Rc::downgrade(&parent.node);
                parent.node.borrow_mut().children.push(self.clone());
            }
            None => self.node.borrow_mut().parent = Weak::new(),
        }
        self.mark_dirty();

        if let Some(pose) = pose {
            self.set_world_scale(pose.scale);
            self.set_world_rotation(pose.rotation);
            self.set_world_position(pose.position);
        }
        Ok(())
    }

    /// Detach from the parent and turn every child into a root, keeping world poses.
    pub(crate) fn detach_all(&self) {
        for child in self.children() {
            // Children cannot be ancestors of a root, so this never fails.
            let _ = child.set_parent(None, true);
        }
        let _ = self.set_parent(None, true);
    }

    /// True while the cached world values are stale.
    pub fn is_dirty(&self) -> bool {
        self.node.borrow().dirty
    }

    fn mark_dirty(&self) {
        {
            let mut node = self.node.borrow_mut();
            node.dirty = true;
        }
        for child in self.children() {
            // A dirty node never has a clean descendant, so stop early.
            if !child.is_dirty() {
                child.mark_dirty();
            }
        }
    }

    fn refresh(&self) {
        if !self.is_dirty() {
            return;
        }
        let parent_world = self.parent().map(|parent| {
            parent.refresh();
            let node = parent.node.borrow();
            (node.world, node.world_matrix)
        });

        let mut node = self.node.borrow_mut();
        let local = node.local;
        let world = match parent_world {
            None => local,
            Some((parent, matrix)) => Transform2D {
                position: matrix.transform_point2(local.position),
                rotation: parent.rotation + local.rotation,
                scale: parent.scale * local.scale,
            },
        };
        node.world = world;
        node.world_matrix = world.to_matrix();
        node.dirty = false;
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let node = self.node.borrow();
        f.debug_struct("Transform")
            .field("local", &node.local)
            .field("dirty", &node.dirty)
            .field("children", &node.children.len())
            .finish()
    }
}
