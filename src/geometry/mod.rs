//! Plain 2D/3D geometry used by the quadtree: axis-aligned rectangles,
//! quadrant addressing, and the triangle accumulation buffer.

mod rect;
mod triangle;

pub use rect::{Quadrant, Rect};
pub use triangle::{MeshBuffers, Triangle, TriangleBuffer};
