//! Spatial node tree and the terrain update driver.
//!
//! Nodes partition the world into fixed square cells, each carrying one
//! patch tree and one renderable mesh. A node whose patch tree grows deep
//! splits into four children so triangle batches stay bounded; children
//! whose patch trees go quiet fold back into their parent. The root node
//! doubles outward whenever the viewer leaves it.
//!
//! [`Terrain`] owns the three arenas (corners, patches, nodes) and runs
//! the per-tick pipeline: grow, node split/merge, patch activity and
//! reference passes, corner change sweep, re-triangulation of invalidated
//! leaves.

use glam::{Vec2, Vec3};

use crate::constants;
use crate::error::{TerrainError, TerrainResult};
use crate::geometry::{MeshBuffers, Quadrant, Rect, TriangleBuffer};
use crate::heightfield::{FractalHeightField, HeightField};
use crate::lod::{DistanceLod, LodPolicy};
use crate::mesh::corner::{Corner, CornerArena, CornerId};
use crate::mesh::patch::{PatchArena, PatchId};
use crate::pool::{NullVisualPool, VisualHandle, VisualPool};
use crate::TerrainConfig;

/// Arena index of a spatial node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    pub(crate) const DANGLING: NodeId = NodeId(u32::MAX);
}

pub(crate) struct Node {
    pub(crate) bounds: Rect,
    pub(crate) side_length: f32,
    pub(crate) min_size: f32,
    /// Depth in the node tree, counted from the root.
    pub(crate) depth: u32,
    /// A node is active while it is a leaf and renders its own mesh.
    pub(crate) active: bool,
    pub(crate) children: [Option<NodeId>; 4],
    pub(crate) patch: PatchId,
    pub(crate) visual: Option<VisualHandle>,
    pub(crate) mesh: TriangleBuffer,
}

#[derive(Default)]
pub(crate) struct NodeArena {
    slots: Vec<Option<Node>>,
    free: Vec<u32>,
}

impl NodeArena {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&mut self, node: Node) -> NodeId {
        match self.free.pop() {
            Some(index) => {
                self.slots[index as usize] = Some(node);
                NodeId(index)
            }
            None => {
                self.slots.push(Some(node));
                NodeId(self.slots.len() as u32 - 1)
            }
        }
    }

    pub(crate) fn free(&mut self, id: NodeId) {
        self.slots[id.0 as usize] = None;
        self.free.push(id.0);
    }

    pub(crate) fn get(&self, id: NodeId) -> Option<&Node> {
        self.slots.get(id.0 as usize)?.as_ref()
    }

    pub(crate) fn live(&self) -> usize {
        self.slots.len() - self.free.len()
    }
}

impl std::ops::Index<NodeId> for NodeArena {
    type Output = Node;

    fn index(&self, id: NodeId) -> &Node {
        match self.slots[id.0 as usize] {
            Some(ref node) => node,
            None => panic!("node {:?} has been freed", id),
        }
    }
}

impl std::ops::IndexMut<NodeId> for NodeArena {
    fn index_mut(&mut self, id: NodeId) -> &mut Node {
        match self.slots[id.0 as usize] {
            Some(ref mut node) => node,
            None => panic!("node {:?} has been freed", id),
        }
    }
}

/// Work performed by one [`Terrain::update`] tick.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct UpdateStats {
    pub grows: u32,
    pub node_splits: u32,
    pub node_merges: u32,
    pub patch_splits: u32,
    pub patch_merges: u32,
    pub retriangulated: u32,
    pub triangles: usize,
}

impl UpdateStats {
    /// True when the tick changed nothing; the mesh has converged for the
    /// current reference point.
    pub fn is_settled(&self) -> bool {
        self.grows == 0
            && self.node_splits == 0
            && self.node_merges == 0
            && self.patch_splits == 0
            && self.patch_merges == 0
            && self.retriangulated == 0
    }
}

/// Structural snapshot of the terrain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TerrainStats {
    pub nodes: usize,
    pub patches: usize,
    pub corners: usize,
    pub triangles: usize,
    pub max_mesh_depth: u32,
}

pub struct Terrain {
    pub(crate) config: TerrainConfig,
    pub(crate) corners: CornerArena,
    pub(crate) patches: PatchArena,
    pub(crate) nodes: NodeArena,
    pub(crate) root: NodeId,
    pub(crate) height_field: Box<dyn HeightField>,
    pub(crate) lod_policy: Box<dyn LodPolicy>,
    pub(crate) visuals: Box<dyn VisualPool>,
    /// Vertices are emitted relative to this point so coordinates stay
    /// small far from the world origin.
    pub(crate) pass_reference: Vec2,
    pub(crate) stats: UpdateStats,
}

impl Terrain {
    pub fn new(
        config: TerrainConfig,
        height_field: Box<dyn HeightField>,
        lod_policy: Box<dyn LodPolicy>,
        visuals: Box<dyn VisualPool>,
    ) -> TerrainResult<Self> {
        config.validate()?;
        let mut terrain = Self {
            corners: CornerArena::new(),
            patches: PatchArena::new(),
            nodes: NodeArena::new(),
            root: NodeId::DANGLING,
            height_field,
            lod_policy,
            visuals,
            pass_reference: config.origin,
            stats: UpdateStats::default(),
            config,
        };
        let bounds = Rect::new(terrain.config.origin, terrain.config.view_distance);
        terrain.root = terrain.create_node(bounds, terrain.config.view_distance, 0);
        log::info!(
            "terrain initialized: root side {} at {:?}, {} detail levels",
            terrain.config.view_distance,
            terrain.config.origin,
            terrain.config.levels_of_detail
        );
        Ok(terrain)
    }

    /// Terrain with the stock fractal height field, distance-based LOD
    /// policy and a no-op visual pool.
    pub fn with_defaults(config: TerrainConfig) -> TerrainResult<Self> {
        let height_field = Box::new(FractalHeightField::from_config(&config));
        let lod_policy = Box::new(DistanceLod::from_config(&config));
        Self::new(
            config,
            height_field,
            lod_policy,
            Box::new(NullVisualPool::default()),
        )
    }

    /// Inserts a node together with its root patch and visual slot.
    fn create_node(&mut self, bounds: Rect, side_length: f32, depth: u32) -> NodeId {
        let id = self.nodes.insert(Node {
            bounds,
            side_length,
            min_size: self.config.min_node_size,
            depth,
            active: true,
            children: [None; 4],
            patch: PatchId::DANGLING,
            visual: None,
            mesh: TriangleBuffer::new(),
        });
        let patch = self.create_patch(None, id, bounds, 0);
        self.nodes[id].patch = patch;
        let visual = self.visuals.acquire();
        let center = bounds.center();
        self.visuals
            .set_origin(visual, Vec3::new(center.x, 0.0, center.y));
        self.visuals.set_enabled(visual, true);
        self.nodes[id].visual = Some(visual);
        id
    }

    /// Runs one simulation tick for the given reference (viewer) point.
    pub fn update(&mut self, reference: Vec2) -> UpdateStats {
        self.stats = UpdateStats::default();

        let view = self.config.view_distance;
        let mut steps = 0;
        loop {
            let snapped = (reference / view).round() * view;
            if self.nodes[self.root].bounds.inner(snapped) {
                break;
            }
            if steps >= constants::MAX_GROW_STEPS {
                log::warn!(
                    "reference {:?} still outside the root after {} grow steps",
                    reference,
                    steps
                );
                break;
            }
            self.grow(reference);
            steps += 1;
        }

        self.update_node(self.root, reference);

        let leaves = self.collect_leaves();
        for &leaf in &leaves {
            let patch = self.nodes[leaf].patch;
            self.sweep_corner_changes(patch);
        }
        self.corners.clear_changes();

        for &leaf in &leaves {
            self.triangulate_leaf(leaf);
        }
        self.stats.triangles = leaves.iter().map(|&leaf| self.nodes[leaf].mesh.len()).sum();
        self.stats
    }

    fn update_node(&mut self, id: NodeId, reference: Vec2) {
        if self.nodes[id].active {
            if self.can_split_node(id) {
                self.split_node(id);
            }
        } else if self.should_merge_node(id) {
            self.merge_node(id);
        }

        if self.nodes[id].active {
            let patch = self.nodes[id].patch;
            self.patch_store_previous(patch);
            self.patch_update_lod(patch, reference);
            self.patch_update_activity(patch);
            self.patch_update_references(patch);
        } else {
            let children = self.nodes[id].children;
            for child in children.into_iter().flatten() {
                self.update_node(child, reference);
            }
        }
    }

    /// Nodes split once their patch tree outgrows a batch-friendly depth,
    /// as long as the children stay above the size floor.
    fn can_split_node(&self, id: NodeId) -> bool {
        let node = &self.nodes[id];
        node.side_length > node.min_size
            && self.mesh_depth(node.patch) > constants::NODE_SPLIT_MESH_DEPTH
    }

    /// Children fold back once each of them is a leaf whose patch tree has
    /// no live descendants; the parent then carries the same geometry in a
    /// single batch.
    fn should_merge_node(&self, id: NodeId) -> bool {
        let node = &self.nodes[id];
        if node.children.iter().all(Option::is_none) {
            return false;
        }
        node.children.iter().flatten().all(|&child| {
            let child_node = &self.nodes[child];
            child_node.active && self.patch_subtree_lifeless_below(child_node.patch)
        })
    }

    /// Hands each quadrant of this node's patch tree to a fresh child
    /// node. The quadrant roots are rebuilt (a child node's root patch
    /// sits at local depth 0) and the old quadrant patches retired; their
    /// children are adopted wholesale.
    fn split_node(&mut self, id: NodeId) {
        let (bounds, side, depth, donor) = {
            let node = &self.nodes[id];
            (node.bounds, node.side_length, node.depth, node.patch)
        };
        log::debug!("node split at {:?}, side {}", bounds.center(), side);

        let donor_children = self.patches[donor].children;
        self.release_patch_flags(donor);

        for quadrant in Quadrant::ALL {
            let child_bounds = bounds.split(quadrant);
            let child_node = self.create_node(child_bounds, side / 2.0, depth + 1);
            let child_patch = self.nodes[child_node].patch;

            if let Some(old) = donor_children[quadrant.index()] {
                let grandchildren = std::mem::replace(&mut self.patches[old].children, [None; 4]);
                self.patches[child_patch].children = grandchildren;
                for grandchild in grandchildren.into_iter().flatten() {
                    self.apply_patch_values(grandchild, child_node, Some(child_patch), 1);
                }
                self.release_patch_flags(old);
                self.patches.free(old);
                self.patches[donor].children[quadrant.index()] = None;
            }

            self.nodes[id].children[quadrant.index()] = Some(child_node);
        }

        self.patches.free(donor);
        self.nodes[id].patch = PatchId::DANGLING;
        self.nodes[id].active = false;
        self.nodes[id].mesh.clear();
        if let Some(visual) = self.nodes[id].visual.take() {
            self.visuals.release(visual);
        }
        self.stats.node_splits += 1;
    }

    fn merge_node(&mut self, id: NodeId) {
        log::debug!(
            "node merge at {:?}, side {}",
            self.nodes[id].bounds.center(),
            self.nodes[id].side_length
        );
        self.fold_node_children(id);
        self.stats.node_merges += 1;
    }

    /// Re-adopts the child nodes' patch trees as quadrants of a rebuilt
    /// root patch and frees the child nodes.
    fn fold_node_children(&mut self, id: NodeId) {
        let bounds = self.nodes[id].bounds;
        // resolve shared corners while the children are still attached
        let parent_patch = self.create_patch(None, id, bounds, 0);
        let children = std::mem::replace(&mut self.nodes[id].children, [None; 4]);
        self.nodes[id].patch = parent_patch;

        for (index, child) in children.into_iter().enumerate() {
            let Some(child) = child else { continue };
            let child_patch = self.nodes[child].patch;
            self.patches[child_patch].parent = Some(parent_patch);
            self.patches[parent_patch].children[index] = Some(child_patch);
            self.apply_patch_values(child_patch, id, Some(parent_patch), 1);
            if let Some(visual) = self.nodes[child].visual.take() {
                self.visuals.release(visual);
            }
            self.nodes.free(child);
        }

        self.nodes[id].active = true;
        let visual = self.visuals.acquire();
        let center = bounds.center();
        self.visuals
            .set_origin(visual, Vec3::new(center.x, 0.0, center.y));
        self.visuals.set_enabled(visual, true);
        self.nodes[id].visual = Some(visual);
        self.invalidate_patch(parent_patch);
    }

    /// Forces an entire node subtree back into a single leaf.
    fn collapse_node(&mut self, id: NodeId) {
        let children = self.nodes[id].children;
        if children.iter().all(Option::is_none) {
            return;
        }
        for child in children.into_iter().flatten() {
            self.collapse_node(child);
        }
        self.fold_node_children(id);
    }

    /// Doubles the root outward toward the reference point. The old root
    /// becomes the quadrant of the new root opposite the growth direction,
    /// so existing geometry, corners included, is kept.
    fn grow(&mut self, reference: Vec2) {
        let old = self.root;
        self.collapse_node(old);

        let (center, side) = {
            let node = &self.nodes[old];
            (node.bounds.center(), node.side_length)
        };
        let dir = Vec2::new(
            if reference.x >= center.x { 1.0 } else { -1.0 },
            if reference.y >= center.y { 1.0 } else { -1.0 },
        );
        let quadrant = match (dir.x > 0.0, dir.y > 0.0) {
            (true, true) => Quadrant::SouthWest,
            (true, false) => Quadrant::NorthWest,
            (false, true) => Quadrant::SouthEast,
            (false, false) => Quadrant::NorthEast,
        };
        let new_center = center + dir * (side / 2.0);
        let new_bounds = Rect::new(new_center, side * 2.0);
        log::debug!("growing root to {:?}, side {}", new_center, side * 2.0);

        // created while the old tree is still the root, so the new root
        // patch resolves its shared corners through it
        let new_node = self.create_node(new_bounds, side * 2.0, 0);
        let new_patch = self.nodes[new_node].patch;

        let old_patch = self.nodes[old].patch;
        self.patches[new_patch].children[quadrant.index()] = Some(old_patch);
        self.apply_patch_values(old_patch, new_node, Some(new_patch), 1);

        if let Some(visual) = self.nodes[old].visual.take() {
            self.visuals.release(visual);
        }
        self.nodes.free(old);
        self.root = new_node;
        self.stats.grows += 1;
    }

    /// Rewires node ownership, parent links and depths after a subtree
    /// changes hands.
    fn apply_patch_values(
        &mut self,
        id: PatchId,
        node: NodeId,
        parent: Option<PatchId>,
        depth: u32,
    ) {
        let node_depth = self.nodes[node].depth;
        let children = {
            let patch = &mut self.patches[id];
            patch.node = node;
            patch.parent = parent;
            patch.depth = depth;
            patch.total_depth = node_depth + depth;
            patch.children
        };
        for child in children.into_iter().flatten() {
            self.apply_patch_values(child, node, Some(id), depth + 1);
        }
    }

    fn collect_leaves(&self) -> Vec<NodeId> {
        let mut leaves = Vec::new();
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            let node = &self.nodes[id];
            if node.active {
                leaves.push(id);
            } else {
                stack.extend(node.children.into_iter().flatten());
            }
        }
        leaves
    }

    /// Rebuilds a leaf node's triangle batch if its patch tree was
    /// invalidated this tick.
    fn triangulate_leaf(&mut self, id: NodeId) {
        let root = self.nodes[id].patch;
        if !self.patches[root].invalid {
            return;
        }
        let mut buffer = std::mem::take(&mut self.nodes[id].mesh);
        buffer.clear();
        let reference = self.pass_reference;
        let mut stack = vec![root];
        while let Some(patch) = stack.pop() {
            self.patches[patch].invalid = false;
            let children = self.patches[patch].children;
            stack.extend(children.into_iter().flatten());
            self.triangulate_patch(patch, reference, &mut buffer);
        }
        self.nodes[id].mesh = buffer;
        self.stats.retriangulated += 1;
    }

    /// Looks up a corner by exact grid position anywhere in the tree.
    pub fn find_corner(&self, position: Vec2) -> Option<CornerId> {
        self.find_corner_in_node(self.root, position)
    }

    fn find_corner_in_node(&self, id: NodeId, position: Vec2) -> Option<CornerId> {
        let node = self.nodes.get(id)?;
        if !node.bounds.contains(position) {
            return None;
        }
        if node.patch != PatchId::DANGLING {
            if let Some(found) = self.find_corner_in_patch(node.patch, position) {
                return Some(found);
            }
        }
        for child in node.children.iter().flatten() {
            if let Some(found) = self.find_corner_in_node(*child, position) {
                return Some(found);
            }
        }
        None
    }

    pub(crate) fn find_or_create_corner(&mut self, position: Vec2) -> CornerId {
        if self.nodes.get(self.root).is_some() {
            if let Some(id) = self.find_corner(position) {
                return id;
            }
        }
        self.corners.insert(Corner::new(position))
    }

    pub fn corner(&self, id: CornerId) -> &Corner {
        &self.corners[id]
    }

    /// Samples the height field directly, bypassing the corner cache.
    pub fn sample(&self, position: Vec2) -> TerrainResult<f32> {
        let height = self.height_field.height(position);
        if height.is_finite() {
            Ok(height)
        } else {
            Err(TerrainError::NonFiniteHeight {
                x: position.x,
                z: position.y,
            })
        }
    }

    /// Discards every cached corner height. The next update re-samples
    /// and re-triangulates everything that is visible.
    pub fn reset_heights(&mut self) {
        self.corners.reset_all();
    }

    /// Concatenated vertex/index buffers of every leaf node mesh.
    pub fn mesh(&self) -> MeshBuffers {
        let mut buffers = MeshBuffers::default();
        for leaf in self.collect_leaves() {
            self.nodes[leaf]
                .mesh
                .append_to(&mut buffers.vertices, &mut buffers.indices);
        }
        buffers
    }

    pub fn root_bounds(&self) -> Rect {
        self.nodes[self.root].bounds
    }

    pub fn config(&self) -> &TerrainConfig {
        &self.config
    }

    pub fn stats(&self) -> TerrainStats {
        let leaves = self.collect_leaves();
        let triangles = leaves.iter().map(|&leaf| self.nodes[leaf].mesh.len()).sum();
        let max_mesh_depth = self
            .patches
            .iter()
            .map(|(_, patch)| patch.total_depth)
            .max()
            .unwrap_or(0);
        TerrainStats {
            nodes: self.nodes.live(),
            patches: self.patches.live(),
            corners: self.corners.len(),
            triangles,
            max_mesh_depth,
        }
    }
}
