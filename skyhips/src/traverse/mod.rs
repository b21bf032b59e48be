//! Depth-first traversal of the tile quad-tree.
//!
//! The traversal starts at the 12 base tiles and visits children in index
//! order, so the visit sequence is fixed for a given tree state. A visitor
//! decides per node whether to go deeper; the engine enforces a hard depth
//! ceiling and skips children that the parent's transparency mask marks as
//! empty.

mod cull;

pub use cull::ConeCull;

use std::f64::consts::TAU;

use crate::index::{TileAddress, BASE_TILES, MAX_ORDER};
use crate::tile::TransparencyMask;

/// Visitor answer for one node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisitAction {
    /// Visit the children of this node.
    Descend,
    /// Skip the subtree below this node.
    StopHere,
    /// End the traversal and report the code.
    Abort(i32),
}

/// How a traversal ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraverseStatus {
    /// Every requested node was visited.
    Complete,
    /// At least one node asked to descend past the depth ceiling.
    DepthLimited,
    /// The visitor aborted with this code.
    Aborted(i32),
}

impl TraverseStatus {
    /// Status as an integer: `0` complete, `-1` depth limited, or the abort code.
    pub fn code(&self) -> i32 {
        match self {
            TraverseStatus::Complete => 0,
            TraverseStatus::DepthLimited => -1,
            TraverseStatus::Aborted(code) => *code,
        }
    }
}

/// Deepest order a traversal may visit.
///
/// `split_order` is the order reached when the whole sky (`2π`) is visible;
/// every halving of `visible_angle` allows one more order.
pub fn depth_ceiling(visible_angle: f64, split_order: u8) -> u8 {
    if !(visible_angle > 0.0) {
        return MAX_ORDER;
    }
    let extra = (TAU / visible_angle).log2().ceil().max(0.0);
    (split_order as f64 + extra).min(MAX_ORDER as f64) as u8
}

/// Traverse from order 0 down to at most `max_order`.
///
/// `mask` reports the known-empty children of a node; it is queried only
/// when the visitor asks to descend.
pub fn traverse<M, V>(max_order: u8, mut mask: M, mut visit: V) -> TraverseStatus
where
    M: FnMut(TileAddress) -> TransparencyMask,
    V: FnMut(TileAddress) -> VisitAction,
{
    let mut stack: Vec<TileAddress> = (0..BASE_TILES).rev().map(TileAddress::base).collect();
    let mut limited = false;

    while let Some(addr) = stack.pop() {
        match visit(addr) {
            VisitAction::Abort(code) => return TraverseStatus::Aborted(code),
            VisitAction::StopHere => {}
            VisitAction::Descend if addr.order() >= max_order => limited = true,
            VisitAction::Descend => {
                let Some(children) = addr.children() else {
                    limited = true;
                    continue;
                };
                let empty = mask(addr);
                for (k, child) in children.iter().enumerate().rev() {
                    if !empty.is_transparent(k as u8) {
                        stack.push(*child);
                    }
                }
            }
        }
    }

    if limited {
        TraverseStatus::DepthLimited
    } else {
        TraverseStatus::Complete
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn none(_: TileAddress) -> TransparencyMask {
        TransparencyMask::NONE
    }

    #[test]
    fn test_depth_ceiling() {
        assert_eq!(depth_ceiling(TAU, 3), 3);
        assert_eq!(depth_ceiling(TAU / 2.0, 3), 4);
        assert_eq!(depth_ceiling(TAU / 3.0, 3), 5);
        assert_eq!(depth_ceiling(10.0, 2), 2);
        assert_eq!(depth_ceiling(0.0, 2), MAX_ORDER);
        assert_eq!(depth_ceiling(1e-12, 20), MAX_ORDER);
    }

    #[test]
    fn test_stop_at_bases() {
        let mut visited = Vec::new();
        let status = traverse(5, none, |addr| {
            visited.push(addr);
            VisitAction::StopHere
        });
        assert_eq!(status, TraverseStatus::Complete);
        assert_eq!(visited.len(), 12);
        assert!(visited.iter().enumerate().all(|(i, a)| a.pix() == i as u64));
    }

    #[test]
    fn test_full_sky_never_exceeds_split_order() {
        let ceiling = depth_ceiling(TAU, 2);
        let mut deepest = 0;
        let mut visits = 0;
        let status = traverse(ceiling, none, |addr| {
            deepest = deepest.max(addr.order());
            visits += 1;
            VisitAction::Descend
        });
        assert_eq!(deepest, 2);
        assert_eq!(visits, 12 + 48 + 192);
        assert_eq!(status, TraverseStatus::DepthLimited);
        assert_eq!(status.code(), -1);
    }

    #[test]
    fn test_depth_first_order() {
        let mut visited = Vec::new();
        traverse(1, none, |addr| {
            visited.push(addr);
            if addr.order() == 0 && addr.pix() < 1 {
                VisitAction::Descend
            } else {
                VisitAction::StopHere
            }
        });
        let first: Vec<(u8, u64)> = visited[..6].iter().map(|a| (a.order(), a.pix())).collect();
        assert_eq!(first, vec![(0, 0), (1, 0), (1, 1), (1, 2), (1, 3), (0, 1)]);
    }

    #[test]
    fn test_transparent_children_are_skipped() {
        let mut visits_order3 = 0;
        let status = traverse(
            6,
            |addr| {
                if addr.order() == 2 {
                    TransparencyMask::ALL
                } else {
                    TransparencyMask::NONE
                }
            },
            |addr| {
                if addr.order() == 3 {
                    visits_order3 += 1;
                }
                if addr.order() <= 2 {
                    VisitAction::Descend
                } else {
                    VisitAction::StopHere
                }
            },
        );
        assert_eq!(visits_order3, 0);
        assert_eq!(status, TraverseStatus::Complete);
        assert_eq!(status.code(), 0);
    }

    #[test]
    fn test_partial_mask() {
        let mut children = Vec::new();
        traverse(
            1,
            |_| TransparencyMask::NONE.with_transparent(1).with_transparent(2),
            |addr| {
                if addr.order() == 1 && addr.pix() < 4 {
                    children.push(addr.child_index());
                }
                if addr.order() == 0 {
                    VisitAction::Descend
                } else {
                    VisitAction::StopHere
                }
            },
        );
        assert_eq!(children, vec![0, 3]);
    }

    #[test]
    fn test_abort_propagates_code() {
        let mut visits = 0;
        let status = traverse(10, none, |_| {
            visits += 1;
            if visits == 20 {
                VisitAction::Abort(-7)
            } else {
                VisitAction::Descend
            }
        });
        assert_eq!(status, TraverseStatus::Aborted(-7));
        assert_eq!(status.code(), -7);
        assert_eq!(visits, 20);
    }

    #[test]
    fn test_deterministic() {
        let run = || {
            let mut seq = Vec::new();
            traverse(3, none, |addr| {
                seq.push(addr);
                if addr.pix() % 3 == 0 {
                    VisitAction::Descend
                } else {
                    VisitAction::StopHere
                }
            });
            seq
        };
        assert_eq!(run(), run());
    }
}
