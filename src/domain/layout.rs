//! Circular child placement around a parent node
//!
//! Purely presentational: positions never influence tree structure.

use serde::{Deserialize, Serialize};

/// Canvas coordinates of a node.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub const ORIGIN: Position = Position { x: 0.0, y: 0.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, other: &Position) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

pub const DEFAULT_BASE_RADIUS: f64 = 300.0;
pub const DEFAULT_RADIUS_STEP: f64 = 50.0;

/// Places `sibling_count` children evenly on a circle around their parent.
///
/// The circle grows with the parent's depth so deeper rings do not collapse
/// onto the ones closer to the root.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutEngine {
    pub base_radius: f64,
    pub radius_step: f64,
}

impl Default for LayoutEngine {
    fn default() -> Self {
        Self {
            base_radius: DEFAULT_BASE_RADIUS,
            radius_step: DEFAULT_RADIUS_STEP,
        }
    }
}

impl LayoutEngine {
    pub fn new(base_radius: f64, radius_step: f64) -> Self {
        Self {
            base_radius,
            radius_step,
        }
    }

    /// Angle in degrees of child `index` among `sibling_count` siblings.
    /// A count of zero is treated as one.
    pub fn angle_degrees(index: usize, sibling_count: usize) -> f64 {
        let count = sibling_count.max(1);
        index as f64 * (360.0 / count as f64)
    }

    pub fn radius(&self, parent_depth: u32) -> f64 {
        self.base_radius + f64::from(parent_depth) * self.radius_step
    }

    pub fn position(
        &self,
        parent: Position,
        parent_depth: u32,
        index: usize,
        sibling_count: usize,
    ) -> Position {
        let angle = Self::angle_degrees(index, sibling_count).to_radians();
        let radius = self.radius(parent_depth);
        Position {
            x: parent.x + radius * angle.cos(),
            y: parent.y + radius * angle.sin(),
        }
    }

    /// Positions for a whole sibling group, in index order.
    pub fn positions(&self, parent: Position, parent_depth: u32, sibling_count: usize) -> Vec<Position> {
        (0..sibling_count)
            .map(|index| self.position(parent, parent_depth, index, sibling_count))
            .collect()
    }
}
