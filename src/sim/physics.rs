//! 2D collision world for axis-aligned boxes and circles
//!
//! Bodies live in a slot map and are indexed by a uniform spatial-hash grid.
//! Every mutation goes through [`World`] so the grid never drifts from the
//! true geometry.
//!
//! Overlap convention: for a contact `(a, b, overlap)`, moving `a` by
//! `-overlap` (or `b` by `+overlap`) separates the two bodies along the axis
//! of least penetration.

use std::collections::{HashMap, HashSet};

use glam::Vec2;
use slotmap::{SlotMap, new_key_type};

new_key_type! {
    /// Stable handle to a body stored in a [`World`]
    pub struct BodyHandle;
}

/// Default broad-phase cell edge length
pub const DEFAULT_CELL_SIZE: f32 = 64.0;

/// Geometry of a body
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Shape {
    /// Axis-aligned box; the body position is its min corner
    Rect { width: f32, height: f32 },
    /// Circle; the body position is its centre
    Circle { radius: f32 },
}

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec2,
    pub max: Vec2,
}

impl Aabb {
    pub fn new(min: Vec2, max: Vec2) -> Self {
        Self { min, max }
    }

    #[inline]
    pub fn center(&self) -> Vec2 {
        (self.min + self.max) * 0.5
    }

    #[inline]
    /// Strict overlap test (touching edges do not count)
    #[inline]
    pub fn overlaps(&self, other: &Aabb) -> bool {
        self.min.x < other.max.x
            && other.min.x < self.max.x
            && self.min.y < other.max.y
            && other.min.y < self.max.y
    }
}

/// Inclusive range of grid cells a body touches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
struct CellRange {
    min: (i32, i32),
    max: (i32, i32),
}

impl CellRange {
    fn of(aabb: &Aabb, cell_size: f32) -> Self {
        let cell = |v: f32| (v / cell_size).floor() as i32;
        Self {
            min: (cell(aabb.min.x), cell(aabb.min.y)),
            max: (cell(aabb.max.x), cell(aabb.max.y)),
        }
    }

    fn cells(self) -> impl Iterator<Item = (i32, i32)> {
        (self.min.0..=self.max.0).flat_map(move |x| (self.min.1..=self.max.1).map(move |y| (x, y)))
    }
}

/// A tagged physics body
#[derive(Debug, Clone)]
pub struct Body<T> {
    shape: Shape,
    position: Vec2,
    scale: Vec2,
    tag: T,
    cells: CellRange,
}

impl<T> Body<T> {
    /// Box with its min corner at `position`
    pub fn rect(position: Vec2, width: f32, height: f32, tag: T) -> Self {
        Self {
            shape: Shape::Rect { width, height },
            position,
            scale: Vec2::ONE,
            tag,
            cells: CellRange::default(),
        }
    }

    /// Circle centred on `center`
    pub fn circle(center: Vec2, radius: f32, tag: T) -> Self {
        Self {
            shape: Shape::Circle { radius },
            position: center,
            scale: Vec2::ONE,
            tag,
            cells: CellRange::default(),
        }
    }

    /// Builder-style scale for boxes (ignored for circles)
    pub fn with_scale(mut self, scale: Vec2) -> Self {
        if matches!(self.shape, Shape::Rect { .. }) {
            self.scale = scale;
        }
        self
    }

    pub fn shape(&self) -> Shape {
        self.shape
    }

    pub fn position(&self) -> Vec2 {
        self.position
    }

    pub fn scale(&self) -> Vec2 {
        self.scale
    }

    pub fn tag(&self) -> &T {
        &self.tag
    }

    /// Scaled size of a box, or the diameter square of a circle
    pub fn extent(&self) -> Vec2 {
        match self.shape {
            Shape::Rect { width, height } => Vec2::new(width, height) * self.scale,
            Shape::Circle { radius } => Vec2::splat(radius * 2.0),
        }
    }

    pub fn aabb(&self) -> Aabb {
        match self.shape {
            Shape::Rect { .. } => Aabb::new(self.position, self.position + self.extent()),
            Shape::Circle { radius } => Aabb::new(
                self.position - Vec2::splat(radius),
                self.position + Vec2::splat(radius),
            ),
        }
    }
}

/// One overlapping pair reported by a query
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Contact<T> {
    pub a: BodyHandle,
    pub b: BodyHandle,
    pub a_tag: T,
    pub b_tag: T,
    /// Minimum translation vector, see module docs
    pub overlap: Vec2,
}

/// Collision world holding tagged bodies
#[derive(Debug, Clone)]
pub struct World<T> {
    bodies: SlotMap<BodyHandle, Body<T>>,
    grid: HashMap<(i32, i32), Vec<BodyHandle>>,
    cell_size: f32,
}

impl<T: Copy> Default for World<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Copy> World<T> {
    pub fn new() -> Self {
        Self::with_cell_size(DEFAULT_CELL_SIZE)
    }

    pub fn with_cell_size(cell_size: f32) -> Self {
        Self {
            bodies: SlotMap::with_key(),
            grid: HashMap::new(),
            cell_size: cell_size.max(1.0),
        }
    }

    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }

    pub fn contains(&self, handle: BodyHandle) -> bool {
        self.bodies.contains_key(handle)
    }

    pub fn get(&self, handle: BodyHandle) -> Option<&Body<T>> {
        self.bodies.get(handle)
    }

    /// Add a body and index it
    pub fn insert(&mut self, mut body: Body<T>) -> BodyHandle {
        let cells = CellRange::of(&body.aabb(), self.cell_size);
        body.cells = cells;
        let handle = self.bodies.insert(body);
        for cell in cells.cells() {
            self.grid.entry(cell).or_default().push(handle);
        }
        handle
    }

    /// Remove a body. Removing an absent handle is a no-op returning `None`.
    pub fn remove(&mut self, handle: BodyHandle) -> Option<Body<T>> {
        let body = self.bodies.remove(handle)?;
        self.unindex(handle, body.cells);
        Some(body)
    }

    /// Drop every body
    pub fn clear(&mut self) {
        self.bodies.clear();
        self.grid.clear();
    }

    pub fn set_position(&mut self, handle: BodyHandle, position: Vec2) -> bool {
        let Some(body) = self.bodies.get_mut(handle) else {
            return false;
        };
        body.position = position;
        self.reindex(handle);
        true
    }

    pub fn translate(&mut self, handle: BodyHandle, delta: Vec2) -> bool {
        match self.bodies.get(handle) {
            Some(body) => {
                let position = body.position + delta;
                self.set_position(handle, position)
            }
            None => false,
        }
    }

    /// Rescale a box. Circles cannot be scaled and return `false`.
    pub fn set_scale(&mut self, handle: BodyHandle, scale: Vec2) -> bool {
        let Some(body) = self.bodies.get_mut(handle) else {
            return false;
        };
        if !matches!(body.shape, Shape::Rect { .. }) {
            return false;
        }
        body.scale = scale;
        self.reindex(handle);
        true
    }

    /// Every overlapping pair in the world, each reported once
    pub fn check_all(&self) -> Vec<Contact<T>> {
        let mut seen = HashSet::new();
        let mut contacts = Vec::new();

        for handles in self.grid.values() {
            for (i, &first) in handles.iter().enumerate() {
                for &second in &handles[i + 1..] {
                    let (a, b) = if first < second {
                        (first, second)
                    } else {
                        (second, first)
                    };
                    if !seen.insert((a, b)) {
                        continue;
                    }
                    if let Some(contact) = self.contact(a, b) {
                        contacts.push(contact);
                    }
                }
            }
        }

        contacts.sort_by(|x, y| (x.a, x.b).cmp(&(y.a, y.b)));
        contacts
    }

    /// Every body overlapping `handle`, with `handle` as `a`
    pub fn check_one(&self, handle: BodyHandle) -> Vec<Contact<T>> {
        let Some(body) = self.bodies.get(handle) else {
            return Vec::new();
        };

        let mut seen = HashSet::new();
        let mut contacts = Vec::new();
        for cell in body.cells.cells() {
            let Some(handles) = self.grid.get(&cell) else {
                continue;
            };
            for &other in handles {
                if other == handle || !seen.insert(other) {
                    continue;
                }
                if let Some(contact) = self.contact(handle, other) {
                    contacts.push(contact);
                }
            }
        }

        contacts.sort_by_key(|c| c.b);
        contacts
    }

    pub fn overlaps_any(&self, handle: BodyHandle) -> bool {
        !self.check_one(handle).is_empty()
    }

    fn contact(&self, a: BodyHandle, b: BodyHandle) -> Option<Contact<T>> {
        let body_a = self.bodies.get(a)?;
        let body_b = self.bodies.get(b)?;
        let overlap = overlap(body_a, body_b)?;
        Some(Contact {
            a,
            b,
            a_tag: body_a.tag,
            b_tag: body_b.tag,
            overlap,
        })
    }

    fn reindex(&mut self, handle: BodyHandle) {
        let Some(body) = self.bodies.get_mut(handle) else {
            return;
        };
        let cells = CellRange::of(&body.aabb(), self.cell_size);
        if cells == body.cells {
            return;
        }
        let old = std::mem::replace(&mut body.cells, cells);
        self.unindex(handle, old);
        for cell in cells.cells() {
            self.grid.entry(cell).or_default().push(handle);
        }
    }

    fn unindex(&mut self, handle: BodyHandle, cells: CellRange) {
        for cell in cells.cells() {
            if let Some(handles) = self.grid.get_mut(&cell) {
                handles.retain(|&h| h != handle);
                if handles.is_empty() {
                    self.grid.remove(&cell);
                }
            }
        }
    }
}

/// Minimum translation vector between two bodies, if they overlap
pub fn overlap<T>(a: &Body<T>, b: &Body<T>) -> Option<Vec2> {
    match (a.shape, b.shape) {
        (Shape::Rect { .. }, Shape::Rect { .. }) => rect_rect(a.aabb(), b.aabb()),
        (Shape::Circle { radius: ra }, Shape::Circle { radius: rb }) => {
            circle_circle(a.position, ra, b.position, rb)
        }
        (Shape::Rect { .. }, Shape::Circle { radius }) => rect_circle(a.aabb(), b.position, radius),
        (Shape::Circle { radius }, Shape::Rect { .. }) => {
            rect_circle(b.aabb(), a.position, radius).map(|v| -v)
        }
    }
}

/// Box vs box along the axis of least penetration
pub fn rect_rect(a: Aabb, b: Aabb) -> Option<Vec2> {
    if !a.overlaps(&b) {
        return None;
    }
    let ox = a.max.x.min(b.max.x) - a.min.x.max(b.min.x);
    let oy = a.max.y.min(b.max.y) - a.min.y.max(b.min.y);
    let (ca, cb) = (a.center(), b.center());

    if ox < oy {
        let sign = if ca.x <= cb.x { 1.0 } else { -1.0 };
        Some(Vec2::new(ox * sign, 0.0))
    } else {
        let sign = if ca.y <= cb.y { 1.0 } else { -1.0 };
        Some(Vec2::new(0.0, oy * sign))
    }
}

pub fn circle_circle(ca: Vec2, ra: f32, cb: Vec2, rb: f32) -> Option<Vec2> {
    let d = cb - ca;
    let dist = d.length();
    let depth = ra + rb - dist;
    if depth <= 0.0 {
        return None;
    }
    let dir = if dist > f32::EPSILON { d / dist } else { Vec2::Y };
    Some(dir * depth)
}

/// Box vs circle; the result pushes the circle out of the box
pub fn rect_circle(rect: Aabb, center: Vec2, radius: f32) -> Option<Vec2> {
    let closest = center.clamp(rect.min, rect.max);
    let d = center - closest;
    let dist_sq = d.length_squared();

    if dist_sq > 0.0 {
        if dist_sq >= radius * radius {
            return None;
        }
        let dist = dist_sq.sqrt();
        return Some(d / dist * (radius - dist));
    }

    // Centre inside the box: exit through the nearest face
    let faces = [
        (center.x - rect.min.x, Vec2::NEG_X),
        (rect.max.x - center.x, Vec2::X),
        (center.y - rect.min.y, Vec2::NEG_Y),
        (rect.max.y - center.y, Vec2::Y),
    ];
    let (depth, normal) = faces
        .into_iter()
        .min_by(|x, y| x.0.total_cmp(&y.0))
        .unwrap_or((0.0, Vec2::Y));
    Some(normal * (depth + radius))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Tag {
        Wall,
        Puck,
    }

    #[test]
    fn test_rect_rect_picks_shallow_axis() {
        let a = Aabb::new(Vec2::new(0.0, 0.0), Vec2::new(32.0, 8.0));
        let b = Aabb::new(Vec2::new(30.0, 2.0), Vec2::new(62.0, 10.0));
        let v = rect_rect(a, b).expect("boxes overlap");
        assert!((v.x - 2.0).abs() < 1e-5);
        assert_eq!(v.y, 0.0);
    }

    #[test]
    fn test_touching_is_not_overlap() {
        let a = Aabb::new(Vec2::ZERO, Vec2::new(32.0, 8.0));
        let b = Aabb::new(Vec2::new(32.0, 0.0), Vec2::new(64.0, 8.0));
        assert!(rect_rect(a, b).is_none());
    }

    #[test]
    fn test_circle_pushed_out_of_box() {
        // Circle resting on top of a box, 3 units deep
        let rect = Aabb::new(Vec2::new(0.0, 0.0), Vec2::new(32.0, 8.0));
        let v = rect_circle(rect, Vec2::new(16.0, -5.0), 8.0).expect("overlap");
        assert!(v.y < 0.0);
        assert!((v.y + 3.0).abs() < 1e-4);
        assert!(v.x.abs() < 1e-5);
    }

    #[test]
    fn test_circle_centre_inside_box() {
        let rect = Aabb::new(Vec2::new(0.0, 0.0), Vec2::new(32.0, 8.0));
        let v = rect_circle(rect, Vec2::new(16.0, 1.0), 8.0).expect("overlap");
        // Nearest face is the top (y = 0)
        assert_eq!(v, Vec2::new(0.0, -9.0));
    }

    #[test]
    fn test_overlap_is_antisymmetric() {
        let boxed = Body::rect(Vec2::ZERO, 32.0, 8.0, Tag::Wall);
        let puck = Body::circle(Vec2::new(16.0, 12.0), 8.0, Tag::Puck);
        let ab = overlap(&boxed, &puck).expect("overlap");
        let ba = overlap(&puck, &boxed).expect("overlap");
        assert_eq!(ab, -ba);
    }

    #[test]
    fn test_check_all_reports_each_pair_once() {
        let mut world = World::new();
        // Spans several grid cells so the pair is seen more than once
        world.insert(Body::rect(Vec2::new(-70.0, -70.0), 140.0, 140.0, Tag::Wall));
        world.insert(Body::circle(Vec2::new(0.0, 0.0), 80.0, Tag::Puck));
        world.insert(Body::circle(Vec2::new(500.0, 500.0), 8.0, Tag::Puck));

        let contacts = world.check_all();
        assert_eq!(contacts.len(), 1);
    }

    #[test]
    fn test_removed_body_not_reported() {
        let mut world = World::new();
        let wall = world.insert(Body::rect(Vec2::ZERO, 32.0, 8.0, Tag::Wall));
        let puck = world.insert(Body::circle(Vec2::new(16.0, 4.0), 8.0, Tag::Puck));
        assert_eq!(world.check_all().len(), 1);

        assert!(world.remove(wall).is_some());
        assert!(world.remove(wall).is_none());
        assert!(world.check_all().is_empty());
        assert!(world.check_one(puck).is_empty());
    }

    #[test]
    fn test_moving_body_updates_index() {
        let mut world = World::new();
        let wall = world.insert(Body::rect(Vec2::new(300.0, 300.0), 32.0, 8.0, Tag::Wall));
        let puck = world.insert(Body::circle(Vec2::ZERO, 8.0, Tag::Puck));
        assert!(!world.overlaps_any(puck));

        assert!(world.set_position(wall, Vec2::new(-4.0, -4.0)));
        assert!(world.overlaps_any(puck));

        assert!(world.translate(wall, Vec2::new(0.0, 400.0)));
        assert!(!world.overlaps_any(puck));
    }

    #[test]
    fn test_scale_changes_extent() {
        let mut world = World::new();
        let wall = world.insert(Body::rect(Vec2::ZERO, 32.0, 8.0, Tag::Wall));
        let puck = world.insert(Body::circle(Vec2::new(16.0, 28.0), 8.0, Tag::Puck));
        assert!(!world.overlaps_any(puck));

        assert!(world.set_scale(wall, Vec2::new(1.0, 4.0)));
        assert_eq!(world.get(wall).map(|b| b.extent()), Some(Vec2::new(32.0, 32.0)));
        assert!(world.overlaps_any(puck));
        assert!(!world.set_scale(puck, Vec2::splat(2.0)));
    }
}
