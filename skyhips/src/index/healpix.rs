//! Nested HEALPix projection between sphere directions and tile addresses.
//!
//! The 12 base tiles are laid out as:
//! - 0–3: north polar cap
//! - 4–7: equatorial belt
//! - 8–11: south polar cap
//!
//! Inside a base tile `x` increases to the northeast and `y` to the
//! northwest. The nested sub-index interleaves the bits of `x` (even bits)
//! and `y` (odd bits), so child `k` of a tile sits at `x` offset `k & 1` and
//! `y` offset `k >> 1`.

use std::f64::consts::{FRAC_PI_2, FRAC_PI_4, PI, TAU};

use glam::DVec3;

use super::types::{nside, TileAddress};

/// Position of a point inside a base tile, in units of the order's pixels.
struct BaseXy {
    base: u64,
    x: f64,
    y: f64,
}

/// Convert a (longitude, latitude) pair in radians to the tile containing it.
pub(crate) fn lon_lat_to_address(lon: f64, lat: f64, order: u8) -> TileAddress {
    let ns = nside(order);
    let p = lon_lat_to_base_xy(lon, lat, ns as f64);
    let x = (p.x.floor().max(0.0) as u64).min(ns - 1);
    let y = (p.y.floor().max(0.0) as u64).min(ns - 1);
    TileAddress::new_unchecked(order, p.base * ns * ns + interleave(x, y))
}

/// Direction of the point at fractional position `(fx, fy)` inside a tile.
///
/// `(0.5, 0.5)` is the tile centre.
pub(crate) fn tile_point(addr: TileAddress, fx: f64, fy: f64) -> DVec3 {
    let ns = nside(addr.order());
    let ns2 = ns * ns;
    let base = addr.pix() / ns2;
    let (x, y) = deinterleave(addr.pix() % ns2);
    let (lon, lat) = base_xy_to_lon_lat(base, x as f64 + fx, y as f64 + fy, ns as f64);
    lon_lat_to_vec(lon, lat)
}

pub(crate) fn vec_to_lon_lat(v: DVec3) -> (f64, f64) {
    let r = v.length();
    let lat = (v.z / r).clamp(-1.0, 1.0).asin();
    let mut lon = v.y.atan2(v.x);
    if lon < 0.0 {
        lon += TAU;
    }
    (lon, lat)
}

pub(crate) fn lon_lat_to_vec(lon: f64, lat: f64) -> DVec3 {
    let (slat, clat) = lat.sin_cos();
    let (slon, clon) = lon.sin_cos();
    DVec3::new(clat * clon, clat * slon, slat)
}

fn lon_lat_to_base_xy(lon: f64, lat: f64, ns: f64) -> BaseXy {
    let z = lat.sin();
    let phi = lon.rem_euclid(TAU);
    let phi_t = phi % FRAC_PI_2;
    let column = ((phi / FRAC_PI_2).floor() as i64).rem_euclid(4) as u64;

    if z.abs() >= 2.0 / 3.0 {
        let north = z >= 0.0;
        let sign = if north { 1.0 } else { -1.0 };

        let root_x = (1.0 - z * sign) * 3.0 * (ns * (2.0 * phi_t - PI) / PI).powi(2);
        let kx = if root_x <= 0.0 { 0.0 } else { root_x.sqrt() };
        let root_y = (1.0 - z * sign) * 3.0 * (ns * 2.0 * phi_t / PI).powi(2);
        let ky = if root_y <= 0.0 { 0.0 } else { root_y.sqrt() };

        let (x, y) = if north { (ns - kx, ns - ky) } else { (ky, kx) };
        let base = if north { column } else { 8 + column };
        return BaseXy { base, x, y };
    }

    let zunits = (z + 2.0 / 3.0) / (4.0 / 3.0);
    let phiunits = phi_t / FRAC_PI_2;
    let mut x = (zunits + phiunits) * ns;
    let mut y = (zunits - phiunits + 1.0) * ns;

    let base = if x >= ns {
        x -= ns;
        if y >= ns {
            y -= ns;
            column
        } else {
            ((column + 1) % 4) + 4
        }
    } else if y >= ns {
        y -= ns;
        column + 4
    } else {
        8 + column
    };
    BaseXy { base, x, y }
}

fn base_xy_to_lon_lat(base: u64, x: f64, y: f64, ns: f64) -> (f64, f64) {
    let xn = x / ns;
    let yn = y / ns;
    let north = base <= 3;
    let south = base >= 8;

    let polar = (north && xn + yn > 1.0) || (south && xn + yn < 1.0);

    if !polar {
        let (phi_off, z_off, col) = if north {
            (1.0, 0.0, base)
        } else if south {
            (1.0, -2.0, base - 8)
        } else {
            (0.0, -1.0, base - 4)
        };
        let z = (2.0 / 3.0) * (xn + yn + z_off);
        let phi = FRAC_PI_4 * (xn - yn + phi_off + 2.0 * col as f64);
        return (phi.rem_euclid(TAU), z.clamp(-1.0, 1.0).asin());
    }

    let sign = if north { 1.0 } else { -1.0 };
    let (px, py) = if north { (x, y) } else { (ns - y, ns - x) };
    let kx = ns - px;
    let ky = ns - py;

    let phi_t = if kx + ky == 0.0 {
        0.0
    } else {
        PI * ky / (2.0 * (kx + ky))
    };

    let z = if phi_t < FRAC_PI_4 {
        let denom = (2.0 * phi_t - PI) * ns;
        let v = PI * kx / denom;
        (1.0 - v * v / 3.0) * sign
    } else {
        let denom = 2.0 * phi_t * ns;
        let v = PI * ky / denom;
        (1.0 - v * v / 3.0) * sign
    };

    let col = if south { base - 8 } else { base };
    let phi = FRAC_PI_2 * col as f64 + phi_t;
    (phi.rem_euclid(TAU), z.clamp(-1.0, 1.0).asin())
}

/// Interleave `x` (even bits) and `y` (odd bits).
fn interleave(x: u64, y: u64) -> u64 {
    let mut out = 0u64;
    for bit in 0..32 {
        out |= ((x >> bit) & 1) << (2 * bit);
        out |= ((y >> bit) & 1) << (2 * bit + 1);
    }
    out
}

fn deinterleave(sub: u64) -> (u64, u64) {
    let mut x = 0u64;
    let mut y = 0u64;
    for bit in 0..32 {
        x |= ((sub >> (2 * bit)) & 1) << bit;
        y |= ((sub >> (2 * bit + 1)) & 1) << bit;
    }
    (x, y)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interleave_roundtrip() {
        for (x, y) in [(0, 0), (1, 0), (0, 1), (5, 9), (1023, 77)] {
            assert_eq!(deinterleave(interleave(x, y)), (x, y));
        }
        assert_eq!(interleave(1, 0), 1);
        assert_eq!(interleave(0, 1), 2);
        assert_eq!(interleave(1, 1), 3);
    }

    #[test]
    fn test_poles_land_in_caps() {
        let north = lon_lat_to_address(0.3, FRAC_PI_2 - 1e-6, 0);
        assert!(north.pix() <= 3);
        let south = lon_lat_to_address(0.3, -FRAC_PI_2 + 1e-6, 0);
        assert!(south.pix() >= 8);
    }

    #[test]
    fn test_equator_lands_in_belt() {
        let tile = lon_lat_to_address(0.0, 0.0, 0);
        assert_eq!(tile.pix(), 4);
        let tile = lon_lat_to_address(FRAC_PI_2, 0.0, 0);
        assert_eq!(tile.pix(), 5);
    }

    #[test]
    fn test_tile_center_maps_back_to_tile() {
        for order in [0u8, 1, 3, 6] {
            let step = (super::super::npix(order) / 37).max(1);
            let mut pix = 0;
            while pix < super::super::npix(order) {
                let addr = TileAddress::new_unchecked(order, pix);
                let (lon, lat) = vec_to_lon_lat(tile_point(addr, 0.5, 0.5));
                assert_eq!(lon_lat_to_address(lon, lat, order), addr, "order {order} pix {pix}");
                pix += step;
            }
        }
    }

    #[test]
    fn test_vec_lon_lat_roundtrip() {
        let (lon, lat) = vec_to_lon_lat(lon_lat_to_vec(2.0, -0.4));
        assert!((lon - 2.0).abs() < 1e-12);
        assert!((lat + 0.4).abs() < 1e-12);
    }
}
