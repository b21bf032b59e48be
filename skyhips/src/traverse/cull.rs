//! Cone culling for traversals.

use glam::DVec3;

use crate::index::{center_direction, corner_directions, TileAddress};

/// Margin on the corner-based tile radius; tile edges bulge past the
/// great circles through their corners.
const EDGE_MARGIN: f64 = 1.1;

/// Culls tiles entirely outside a cone on the sphere.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConeCull {
    center: DVec3,
    radius: f64,
}

impl ConeCull {
    /// Cone around `center` (normalized here) with half-angle `radius` radians.
    pub fn new(center: DVec3, radius: f64) -> Self {
        Self {
            center: center.normalize_or(DVec3::Z),
            radius,
        }
    }

    pub fn center(&self) -> DVec3 {
        self.center
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }

    /// Whether no part of `addr` can be inside the cone.
    pub fn is_outside(&self, addr: TileAddress) -> bool {
        let tile_center = center_direction(addr);
        let tile_radius = corner_directions(addr)
            .iter()
            .map(|c| angular_distance(tile_center, *c))
            .fold(0.0, f64::max)
            * EDGE_MARGIN;
        angular_distance(self.center, tile_center) > self.radius + tile_radius
    }
}

/// Great-circle distance between two unit vectors, in radians.
fn angular_distance(a: DVec3, b: DVec3) -> f64 {
    a.dot(b).clamp(-1.0, 1.0).acos()
}
