use glam::Vec2;
use serde::{Deserialize, Serialize};

/// One quadrant of a rectangle or tree node.
///
/// The discriminants are the child-slot indices used throughout the mesh
/// and node trees: SW, NW, NE, SE.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Quadrant {
    SouthWest = 0,
    NorthWest = 1,
    NorthEast = 2,
    SouthEast = 3,
}

impl Quadrant {
    pub const ALL: [Quadrant; 4] = [
        Quadrant::SouthWest,
        Quadrant::NorthWest,
        Quadrant::NorthEast,
        Quadrant::SouthEast,
    ];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Unit sign vector pointing into this quadrant.
    #[inline]
    pub fn signs(self) -> Vec2 {
        match self {
            Quadrant::SouthWest => Vec2::new(-1.0, -1.0),
            Quadrant::NorthWest => Vec2::new(-1.0, 1.0),
            Quadrant::NorthEast => Vec2::new(1.0, 1.0),
            Quadrant::SouthEast => Vec2::new(1.0, -1.0),
        }
    }
}

/// Axis-aligned rectangle stored as center + size.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    center: Vec2,
    size: Vec2,
}

impl Rect {
    /// Square rectangle from center and side length.
    pub fn new(center: Vec2, side: f32) -> Self {
        Self {
            center,
            size: Vec2::splat(side),
        }
    }

    pub fn with_size(center: Vec2, size: Vec2) -> Self {
        Self { center, size }
    }

    #[inline]
    pub fn center(&self) -> Vec2 {
        self.center
    }

    #[inline]
    pub fn size(&self) -> Vec2 {
        self.size
    }

    #[inline]
    pub fn half_size(&self) -> Vec2 {
        self.size / 2.0
    }

    /// Strict interior test (boundary excluded).
    pub fn inner(&self, v: Vec2) -> bool {
        (v.x - self.center.x).abs() < self.size.x / 2.0
            && (v.y - self.center.y).abs() < self.size.y / 2.0
    }

    /// Inclusive containment test (boundary counts).
    pub fn contains(&self, v: Vec2) -> bool {
        (v.x - self.center.x).abs() <= self.size.x / 2.0
            && (v.y - self.center.y).abs() <= self.size.y / 2.0
    }

    /// Euclidean distance from `v` to the rectangle; zero inside.
    pub fn distance(&self, v: Vec2) -> f32 {
        let v = v - self.center;
        let dx = (v.x.abs() - self.size.x / 2.0).max(0.0);
        let dy = (v.y.abs() - self.size.y / 2.0).max(0.0);
        (dx * dx + dy * dy).sqrt()
    }

    /// The sub-rectangle covering one quadrant.
    pub fn split(&self, quadrant: Quadrant) -> Rect {
        let quarter = self.size / 4.0;
        Rect::with_size(self.center + quadrant.signs() * quarter, self.size / 2.0)
    }
}
