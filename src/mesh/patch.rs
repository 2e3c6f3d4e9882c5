//! Mesh patches: the recursive 3x3-corner grid that subdivides, tracks
//! corner references, and triangulates one quadrant of space.
//!
//! A patch owns a center corner plus 8 perimeter corners (edge midpoints
//! alternating with true corners) and up to four child patches. Per tick it
//! decides whether it is an active rendering leaf, a corner-only relay, or
//! split into children, then settles reference counts bottom-up. The
//! four-case edge triangulation at the bottom of this file is what keeps
//! neighboring patches of different detail levels watertight.

use glam::{Vec2, Vec3};

use crate::geometry::{Quadrant, Rect, Triangle, TriangleBuffer};
use crate::mesh::corner::CornerId;
use crate::tree::{NodeId, Terrain};

/// Arena index of a patch. Slots are recycled after merges, so ids must
/// not be held across ticks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PatchId(pub(crate) u32);

impl PatchId {
    /// Sentinel used while a node's patch is being wired up.
    pub(crate) const DANGLING: PatchId = PatchId(u32::MAX);
}

/// Perimeter slot layout. Even indices are true corners (one per
/// quadrant), odd indices are edge midpoints.
pub(crate) const BOTTOM_LEFT: usize = 0;
pub(crate) const LEFT: usize = 1;
pub(crate) const TOP_LEFT: usize = 2;
pub(crate) const TOP: usize = 3;
pub(crate) const TOP_RIGHT: usize = 4;
pub(crate) const RIGHT: usize = 5;
pub(crate) const BOTTOM_RIGHT: usize = 6;
pub(crate) const BOTTOM: usize = 7;

pub struct Patch {
    pub(crate) bounds: Rect,
    /// Depth below the owning node's root patch.
    pub(crate) depth: u32,
    /// Node depth + local depth; the global subdivision level.
    pub(crate) total_depth: u32,
    pub(crate) lod: u32,
    pub(crate) active: bool,
    pub(crate) corner_active: bool,
    pub(crate) last_active: bool,
    pub(crate) last_corner_active: bool,
    pub(crate) invalid: bool,
    pub(crate) center: CornerId,
    pub(crate) perimeter: [CornerId; 8],
    pub(crate) children: [Option<PatchId>; 4],
    pub(crate) parent: Option<PatchId>,
    pub(crate) node: NodeId,
    /// Which corners this patch currently holds a reference on:
    /// slot 0 is the center, slots 1..=4 the quadrant corners.
    pub(crate) reference_flags: [bool; 5],
}

impl Patch {
    #[inline]
    pub(crate) fn is_live(&self) -> bool {
        self.active || self.corner_active
    }
}

/// Patch arena with a free list; merge discards whole subtrees, so slots
/// are recycled.
#[derive(Default)]
pub(crate) struct PatchArena {
    slots: Vec<Option<Patch>>,
    free: Vec<u32>,
}

impl PatchArena {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&mut self, patch: Patch) -> PatchId {
        match self.free.pop() {
            Some(index) => {
                self.slots[index as usize] = Some(patch);
                PatchId(index)
            }
            None => {
                self.slots.push(Some(patch));
                PatchId(self.slots.len() as u32 - 1)
            }
        }
    }

    pub(crate) fn free(&mut self, id: PatchId) {
        self.slots[id.0 as usize] = None;
        self.free.push(id.0);
    }

    pub(crate) fn get(&self, id: PatchId) -> Option<&Patch> {
        self.slots.get(id.0 as usize)?.as_ref()
    }

    pub(crate) fn live(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (PatchId, &Patch)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|p| (PatchId(i as u32), p)))
    }
}

impl std::ops::Index<PatchId> for PatchArena {
    type Output = Patch;

    fn index(&self, id: PatchId) -> &Patch {
        match self.slots[id.0 as usize] {
            Some(ref patch) => patch,
            None => panic!("patch {:?} has been freed", id),
        }
    }
}

impl std::ops::IndexMut<PatchId> for PatchArena {
    fn index_mut(&mut self, id: PatchId) -> &mut Patch {
        match self.slots[id.0 as usize] {
            Some(ref mut patch) => patch,
            None => panic!("patch {:?} has been freed", id),
        }
    }
}

/// Edge table for triangulation: (start corner, edge midpoint, end corner,
/// start reference flag, end reference flag). Matches the winding the
/// renderer expects (counter-clockwise seen from above).
const EDGES: [(usize, usize, usize, usize, usize); 4] = [
    (BOTTOM_LEFT, BOTTOM, BOTTOM_RIGHT, 1, 4),
    (TOP_LEFT, LEFT, BOTTOM_LEFT, 2, 1),
    (TOP_RIGHT, TOP, TOP_LEFT, 3, 2),
    (BOTTOM_RIGHT, RIGHT, TOP_RIGHT, 4, 3),
];

impl Terrain {
    /// Builds a patch, resolving all 9 corners through the position-keyed
    /// lookup so shared boundary vertices collapse to one arena slot.
    pub(crate) fn create_patch(
        &mut self,
        parent: Option<PatchId>,
        node: NodeId,
        bounds: Rect,
        depth: u32,
    ) -> PatchId {
        let total_depth = self.nodes[node].depth + depth;
        let center = self.find_or_create_corner(bounds.center());
        let h = bounds.half_size();
        let offsets = [
            Vec2::new(-h.x, -h.y),
            Vec2::new(-h.x, 0.0),
            Vec2::new(-h.x, h.y),
            Vec2::new(0.0, h.y),
            Vec2::new(h.x, h.y),
            Vec2::new(h.x, 0.0),
            Vec2::new(h.x, -h.y),
            Vec2::new(0.0, -h.y),
        ];
        let mut perimeter = [center; 8];
        for (slot, offset) in perimeter.iter_mut().zip(offsets) {
            *slot = self.find_or_create_corner(bounds.center() + offset);
        }
        self.patches.insert(Patch {
            bounds,
            depth,
            total_depth,
            lod: 0,
            active: false,
            corner_active: false,
            last_active: false,
            last_corner_active: false,
            invalid: true,
            center,
            perimeter,
            children: [None; 4],
            parent,
            node,
            reference_flags: [false; 5],
        })
    }

    /// Exact-position corner lookup within one patch subtree.
    pub(crate) fn find_corner_in_patch(&self, id: PatchId, position: Vec2) -> Option<CornerId> {
        let patch = self.patches.get(id)?;
        if !patch.bounds.contains(position) {
            return None;
        }
        if self.corners[patch.center].position() == position {
            return Some(patch.center);
        }
        for &corner in &patch.perimeter {
            if self.corners[corner].position() == position {
                return Some(corner);
            }
        }
        for child in patch.children.iter().flatten() {
            if let Some(found) = self.find_corner_in_patch(*child, position) {
                return Some(found);
            }
        }
        None
    }

    /// Snapshot of the previous tick's activity, for edge-triggering.
    pub(crate) fn patch_store_previous(&mut self, id: PatchId) {
        let children = {
            let patch = &mut self.patches[id];
            patch.last_active = patch.active;
            patch.last_corner_active = patch.corner_active;
            patch.children
        };
        for child in children.into_iter().flatten() {
            self.patch_store_previous(child);
        }
    }

    pub(crate) fn patch_update_lod(&mut self, id: PatchId, reference: Vec2) {
        let (bounds, children) = {
            let patch = &self.patches[id];
            (patch.bounds, patch.children)
        };
        let level = self.lod_policy.level(&bounds, reference);
        self.patches[id].lod = level;
        for child in children.into_iter().flatten() {
            self.patch_update_lod(child, reference);
        }
    }

    /// Recomputes active/corner-active top-down, then fires the
    /// edge-triggered split/merge against the previous tick's state.
    pub(crate) fn patch_update_activity(&mut self, id: PatchId) {
        let (depth, lod, parent, children, perimeter) = {
            let patch = &self.patches[id];
            (
                patch.depth,
                patch.lod,
                patch.parent,
                patch.children,
                patch.perimeter,
            )
        };

        let (active, corner_active) = if depth <= lod {
            let active = match parent {
                None => true,
                Some(parent) => self.patches[parent].is_live(),
            };
            (active, false)
        } else {
            let mid_enabled = [LEFT, TOP, RIGHT, BOTTOM]
                .into_iter()
                .any(|i| self.corners[perimeter[i]].enabled());
            let child_live = children
                .iter()
                .flatten()
                .any(|&child| self.patches[child].is_live());
            (false, mid_enabled || child_live)
        };
        {
            let patch = &mut self.patches[id];
            patch.active = active;
            patch.corner_active = corner_active;
        }

        for child in children.into_iter().flatten() {
            self.patch_update_activity(child);
        }

        let (was_live, is_live) = {
            let patch = &self.patches[id];
            (
                patch.last_active || patch.last_corner_active,
                patch.is_live(),
            )
        };
        if is_live && !was_live {
            self.invalidate_patch(id);
            self.split_patch(id);
        } else if !is_live && was_live {
            self.invalidate_patch(id);
            self.merge_patch(id);
        }
    }

    /// Marks a patch and its ancestor chain for re-triangulation. Stops as
    /// soon as an already-invalid ancestor is hit.
    pub(crate) fn invalidate_patch(&mut self, id: PatchId) {
        let mut current = Some(id);
        while let Some(id) = current {
            let patch = &mut self.patches[id];
            if patch.invalid {
                break;
            }
            patch.invalid = true;
            current = patch.parent;
        }
    }

    /// Fills the quadrants that have no child yet. Corners are shared with
    /// this patch and with any pre-existing neighbors via the lookup.
    fn split_patch(&mut self, id: PatchId) {
        let (bounds, depth, node, children) = {
            let patch = &self.patches[id];
            (patch.bounds, patch.depth, patch.node, patch.children)
        };
        for quadrant in Quadrant::ALL {
            if children[quadrant.index()].is_some() {
                continue;
            }
            let child = self.create_patch(Some(id), node, bounds.split(quadrant), depth + 1);
            self.patches[id].children[quadrant.index()] = Some(child);
        }
        self.stats.patch_splits += 1;
    }

    /// Drops the child subtree, returning every reference the descendants
    /// held. This patch's own references are settled again by the
    /// reference pass that follows.
    fn merge_patch(&mut self, id: PatchId) {
        let children = std::mem::replace(&mut self.patches[id].children, [None; 4]);
        self.release_patch_flags(id);
        for child in children.into_iter().flatten() {
            self.free_patch_subtree(child);
        }
        self.stats.patch_merges += 1;
    }

    /// Recursively releases held references and returns slots to the arena.
    pub(crate) fn free_patch_subtree(&mut self, id: PatchId) {
        self.release_patch_flags(id);
        let children = std::mem::replace(&mut self.patches[id].children, [None; 4]);
        for child in children.into_iter().flatten() {
            self.free_patch_subtree(child);
        }
        self.patches.free(id);
    }

    /// Bottom-up reference accounting. A quadrant corner is referenced iff
    /// its child is absent or dormant; the center iff fewer than all four
    /// quadrants are owned by live children.
    pub(crate) fn patch_update_references(&mut self, id: PatchId) {
        let children = self.patches[id].children;
        let mut owned = 0;
        for (index, child) in children.into_iter().enumerate() {
            let live = match child {
                Some(child) if self.patches[child].is_live() => Some(child),
                _ => None,
            };
            match live {
                Some(child) => {
                    self.patch_update_references(child);
                    self.release_corner_flag(id, index + 1);
                    owned += 1;
                }
                None => self.assert_corner_flag(id, index + 1),
            }
        }
        if owned == 4 {
            self.release_corner_flag(id, 0);
        } else {
            self.assert_corner_flag(id, 0);
        }
    }

    pub(crate) fn assert_corner_flag(&mut self, id: PatchId, slot: usize) {
        if self.patches[id].reference_flags[slot] {
            return;
        }
        self.patches[id].reference_flags[slot] = true;
        let corner = self.flag_corner(id, slot);
        self.corners[corner].add_reference();
    }

    pub(crate) fn release_corner_flag(&mut self, id: PatchId, slot: usize) {
        if !self.patches[id].reference_flags[slot] {
            return;
        }
        self.patches[id].reference_flags[slot] = false;
        let corner = self.flag_corner(id, slot);
        self.corners[corner].remove_reference();
    }

    pub(crate) fn release_patch_flags(&mut self, id: PatchId) {
        for slot in 0..5 {
            self.release_corner_flag(id, slot);
        }
    }

    fn flag_corner(&self, id: PatchId, slot: usize) -> CornerId {
        let patch = &self.patches[id];
        if slot == 0 {
            patch.center
        } else {
            patch.perimeter[(slot - 1) * 2]
        }
    }

    /// Walks a subtree and marks every patch whose corners changed this
    /// tick (height computed or enabled flipped), invalidating upward.
    pub(crate) fn sweep_corner_changes(&mut self, root: PatchId) {
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            let (changed, children) = {
                let patch = &self.patches[id];
                let changed = self.corners[patch.center].changed()
                    || patch
                        .perimeter
                        .iter()
                        .any(|&corner| self.corners[corner].changed());
                (changed, patch.children)
            };
            if changed {
                self.invalidate_patch(id);
            }
            stack.extend(children.into_iter().flatten());
        }
    }

    /// Maximum local depth of a patch subtree.
    pub(crate) fn mesh_depth(&self, root: PatchId) -> u32 {
        let mut max = 0;
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            let patch = &self.patches[id];
            max = max.max(patch.depth);
            stack.extend(patch.children.into_iter().flatten());
        }
        max
    }

    /// True if no descendant of `root` is active or corner-active.
    pub(crate) fn patch_subtree_lifeless_below(&self, root: PatchId) -> bool {
        let mut stack: Vec<PatchId> = self.patches[root]
            .children
            .into_iter()
            .flatten()
            .collect();
        while let Some(id) = stack.pop() {
            let patch = &self.patches[id];
            if patch.is_live() {
                return false;
            }
            stack.extend(patch.children.into_iter().flatten());
        }
        true
    }

    /// Emits this patch's triangles. Only patches holding their center
    /// reference render; each of the four edges picks one of the cases
    /// below so that a midpoint vertex a finer neighbor depends on is
    /// never skipped, and never introduced when nobody needs it.
    pub(crate) fn triangulate_patch(
        &mut self,
        id: PatchId,
        reference: Vec2,
        out: &mut TriangleBuffer,
    ) {
        let (center, perimeter, flags) = {
            let patch = &self.patches[id];
            if !patch.reference_flags[0] {
                return;
            }
            (patch.center, patch.perimeter, patch.reference_flags)
        };

        let mut mid_enabled = [false; 4];
        for (edge, &(_, mid, _, _, _)) in EDGES.iter().enumerate() {
            mid_enabled[edge] = self.corners[perimeter[mid]].enabled();
        }

        let field = self.height_field.as_ref();
        let corners = &mut self.corners;
        let mut lift = |id: CornerId| -> Vec3 {
            let corner = &mut corners[id];
            let height = corner.height(field);
            let p = corner.position() - reference;
            Vec3::new(p.x, height, p.y)
        };

        for (edge, &(start, mid, end, start_flag, end_flag)) in EDGES.iter().enumerate() {
            let start_on = flags[start_flag];
            let end_on = flags[end_flag];
            let mid_on = mid_enabled[edge];
            let (start, mid, end) = (perimeter[start], perimeter[mid], perimeter[end]);

            if start_on && end_on && mid_on {
                // full fan through the midpoint: the finer neighbor
                // expects this vertex to be used
                out.push(Triangle::new(lift(center), lift(mid), lift(start)));
                out.push(Triangle::new(lift(end), lift(mid), lift(center)));
            } else if start_on && end_on {
                out.push(Triangle::new(lift(start), lift(center), lift(end)));
            } else if start_on {
                out.push(Triangle::new(lift(center), lift(mid), lift(start)));
            } else if end_on {
                out.push(Triangle::new(lift(end), lift(mid), lift(center)));
            }
        }
    }
}
