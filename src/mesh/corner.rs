//! Shared mesh vertices ("corners") and their arena.
//!
//! A corner is identified by its 2D position: every patch that needs a
//! vertex at a given position resolves to the same arena slot, which is
//! what keeps the mesh watertight across LOD boundaries. The reference
//! count tracks how many patches currently depend on the corner for
//! triangulation; it decides rendering visibility, not memory lifetime.

use glam::Vec2;

use crate::heightfield::HeightField;

/// Arena index of a corner. Corners are never freed, so ids stay valid for
/// the lifetime of the terrain.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CornerId(pub(crate) u32);

pub struct Corner {
    position: Vec2,
    height: Option<f32>,
    references: u32,
    enabled: bool,
    // Set on height/enabled transitions, consumed once per tick by the
    // invalidation sweep.
    changed: bool,
}

impl Corner {
    pub(crate) fn new(position: Vec2) -> Self {
        Self {
            position,
            height: None,
            references: 0,
            enabled: false,
            changed: false,
        }
    }

    #[inline]
    pub fn position(&self) -> Vec2 {
        self.position
    }

    #[inline]
    pub fn references(&self) -> u32 {
        self.references
    }

    /// A corner contributes to triangulation iff some patch references it.
    #[inline]
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Cached elevation, if it has been sampled since the last reset.
    #[inline]
    pub fn cached_height(&self) -> Option<f32> {
        self.height
    }

    /// Lazily computed elevation. The field is sampled at most once per
    /// corner until [`Corner::reset`]. A non-finite sample violates the
    /// height-field contract and is not cached.
    pub fn height(&mut self, field: &dyn HeightField) -> f32 {
        if let Some(height) = self.height {
            return height;
        }
        let height = field.height(self.position);
        if !height.is_finite() {
            log::warn!(
                "height field returned {} at ({}, {}); sample rejected",
                height,
                self.position.x,
                self.position.y
            );
            return 0.0;
        }
        self.height = Some(height);
        self.changed = true;
        height
    }

    /// Drops the cached elevation so the next access re-samples the field.
    pub fn reset(&mut self) {
        self.height = None;
        self.changed = true;
    }

    pub(crate) fn add_reference(&mut self) {
        self.references += 1;
        self.refresh_enabled();
    }

    /// Underflow is clamped to zero rather than signalled.
    pub(crate) fn remove_reference(&mut self) {
        self.references = self.references.saturating_sub(1);
        self.refresh_enabled();
    }

    fn refresh_enabled(&mut self) {
        let enabled = self.references > 0;
        if enabled != self.enabled {
            self.enabled = enabled;
            self.changed = true;
        }
    }

    #[inline]
    pub(crate) fn changed(&self) -> bool {
        self.changed
    }
}

/// Flat arena of corners. Position-keyed lookup happens through the patch
/// tree (see `Terrain::find_corner`), not here; the arena only stores.
#[derive(Default)]
pub struct CornerArena {
    slots: Vec<Corner>,
}

impl CornerArena {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&mut self, corner: Corner) -> CornerId {
        let id = CornerId(self.slots.len() as u32);
        self.slots.push(corner);
        id
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    #[cfg(test)]
    pub(crate) fn iter(&self) -> impl Iterator<Item = (CornerId, &Corner)> {
        self.slots
            .iter()
            .enumerate()
            .map(|(i, c)| (CornerId(i as u32), c))
    }

    pub(crate) fn clear_changes(&mut self) {
        for corner in &mut self.slots {
            corner.changed = false;
        }
    }

    pub(crate) fn reset_all(&mut self) {
        for corner in &mut self.slots {
            corner.reset();
        }
    }
}

impl std::ops::Index<CornerId> for CornerArena {
    type Output = Corner;

    fn index(&self, id: CornerId) -> &Corner {
        &self.slots[id.0 as usize]
    }
}

impl std::ops::IndexMut<CornerId> for CornerArena {
    fn index_mut(&mut self, id: CornerId) -> &mut Corner {
        &mut self.slots[id.0 as usize]
    }
}
