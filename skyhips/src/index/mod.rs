//! Sky index: directions on the celestial sphere to hierarchical tile addresses.
//!
//! Tiles follow the nested HEALPix scheme. Order 0 has 12 base tiles and
//! every order quadruples the tile count. All functions here are pure.

mod healpix;
mod types;

pub use types::{npix, nside, IndexError, TileAddress, BASE_TILES, MAX_ORDER};

use std::f64::consts::PI;

use glam::DVec3;

/// Child `k` of `addr`, one order deeper.
#[inline]
pub fn address_of_child(addr: TileAddress, k: u8) -> Result<TileAddress, IndexError> {
    addr.child(k)
}

/// Parent of `addr`, or `None` for order-0 tiles.
#[inline]
pub fn address_of_parent(addr: TileAddress) -> Option<TileAddress> {
    addr.parent()
}

/// Approximate angular size (radians) of a tile side at `order`.
///
/// Square root of the tile solid angle, `sqrt(4π / npix)`. Strictly
/// decreasing in order.
#[inline]
pub fn angular_size(order: u8) -> f64 {
    (PI / 3.0).sqrt() / nside(order) as f64
}

/// Smallest order whose tiles are no larger than `angle` radians.
pub fn order_for_angle(angle: f64) -> u8 {
    (0..MAX_ORDER)
        .find(|&order| angular_size(order) <= angle)
        .unwrap_or(MAX_ORDER)
}

/// Tile containing the unit direction `dir` at `order`.
///
/// Consistent across orders: the parent of the tile at `order + 1` is the
/// tile at `order`.
pub fn direction_to_address(dir: DVec3, order: u8) -> Result<TileAddress, IndexError> {
    if order > MAX_ORDER {
        return Err(IndexError::InvalidOrder(order));
    }
    let (lon, lat) = healpix::vec_to_lon_lat(dir);
    Ok(healpix::lon_lat_to_address(lon, lat, order))
}

/// Unit direction of the tile centre.
pub fn center_direction(addr: TileAddress) -> DVec3 {
    healpix::tile_point(addr, 0.5, 0.5)
}

/// Unit directions of the four tile corners (south, east, north, west).
pub fn corner_directions(addr: TileAddress) -> [DVec3; 4] {
    [
        healpix::tile_point(addr, 0.0, 0.0),
        healpix::tile_point(addr, 1.0, 0.0),
        healpix::tile_point(addr, 1.0, 1.0),
        healpix::tile_point(addr, 0.0, 1.0),
    ]
}

/// Unit vector from right ascension / declination in radians.
pub fn radec_to_direction(ra: f64, dec: f64) -> DVec3 {
    healpix::lon_lat_to_vec(ra, dec)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_angular_size_decreasing() {
        for order in 0..MAX_ORDER {
            assert!(angular_size(order + 1) < angular_size(order));
        }
        // Order-0 tiles cover 1/12 of the sphere.
        let expected = (4.0 * PI / 12.0).sqrt();
        assert!((angular_size(0) - expected).abs() < 1e-12);
    }

    #[test]
    fn test_order_for_angle() {
        assert_eq!(order_for_angle(10.0), 0);
        assert_eq!(order_for_angle(angular_size(5)), 5);
        assert_eq!(order_for_angle(angular_size(5) * 0.99), 6);
        assert_eq!(order_for_angle(0.0), MAX_ORDER);
    }

    #[test]
    fn test_direction_to_address_rejects_bad_order() {
        assert_eq!(
            direction_to_address(DVec3::X, MAX_ORDER + 1),
            Err(IndexError::InvalidOrder(MAX_ORDER + 1))
        );
    }

    #[test]
    fn test_center_direction_is_unit() {
        let addr = TileAddress::new(4, 1234).unwrap();
        assert!((center_direction(addr).length() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_corners_surround_center() {
        let addr = TileAddress::new(5, 9000).unwrap();
        let center = center_direction(addr);
        for corner in corner_directions(addr) {
            let sep = center.angle_between(corner);
            assert!(sep < angular_size(5) * 1.5, "corner too far: {sep}");
        }
    }

    proptest! {
        #[test]
        fn prop_parent_of_child_is_self(order in 0u8..20, seed in any::<u64>(), k in 0u8..4) {
            let pix = seed % npix(order);
            let addr = TileAddress::new(order, pix).unwrap();
            let child = address_of_child(addr, k).unwrap();
            prop_assert_eq!(address_of_parent(child), Some(addr));
        }

        #[test]
        fn prop_direction_consistent_across_orders(
            ra in 0.0f64..std::f64::consts::TAU,
            dec in -1.5f64..1.5,
            order in 0u8..18,
        ) {
            let dir = radec_to_direction(ra, dec);
            let coarse = direction_to_address(dir, order).unwrap();
            let fine = direction_to_address(dir, order + 1).unwrap();
            prop_assert_eq!(address_of_parent(fine), Some(coarse));
        }
    }
}
