//! The adaptive mesh: shared corners and the recursive patch tree that
//! subdivides, reference-counts, and triangulates them.

pub mod corner;
pub(crate) mod patch;

pub use corner::{Corner, CornerId};
