//! Proximity matching between piece sides in world space.
//!
//! A side is compared as the sequence `[corner_a, waypoints.., corner_b]`. Two sides match
//! when every aligned pair is within the position tolerance, in either direct or reversed
//! order, and the spread of those squared distances passes the profile check.

use serde::{Deserialize, Serialize};

use crate::groups::GroupId;
use crate::piece::{Corner, GridPos, Piece, PieceId, Side};
use crate::point::Point;
use crate::rules::{MatchRules, ZOOM_MAX, ZOOM_MIN};
use crate::transform::WorldData;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MatchTolerance {
    pub position: f32,
    /// Max `max - min` over the aligned squared distances.
    pub profile: f32,
    pub profile_check: bool,
}

impl MatchTolerance {
    /// Screen-pixel tolerances converted to world units for the current zoom.
    pub fn for_zoom(rules: &MatchRules, zoom: f32) -> Self {
        let zoom = if zoom.is_finite() {
            zoom.clamp(ZOOM_MIN, ZOOM_MAX)
        } else {
            1.0
        };
        let zoom_sq = zoom * zoom;
        Self {
            position: rules.base_tolerance / zoom_sq,
            profile: rules.profile_tolerance / zoom_sq,
            profile_check: rules.profile_check,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CornerMapping {
    pub moving_a: Corner,
    pub candidate_a: Corner,
    pub moving_b: Corner,
    pub candidate_b: Corner,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SideMatch {
    pub reversed: bool,
    pub score: f32,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SnapMatch {
    pub moving: PieceId,
    pub candidate: PieceId,
    pub moving_side: Side,
    pub candidate_side: Side,
    pub reversed: bool,
    pub corner_map: CornerMapping,
    pub moving_anchor: Point,
    pub candidate_anchor: Point,
    pub score: f32,
}

impl SnapMatch {
    /// Translation that puts the moving anchor exactly onto the candidate anchor.
    pub fn offset(&self) -> Point {
        self.candidate_anchor - self.moving_anchor
    }
}

pub fn corner_mapping(moving_side: Side, candidate_side: Side, reversed: bool) -> CornerMapping {
    let (moving_a, moving_b) = moving_side.corner_keys();
    let (cand_start, cand_end) = candidate_side.corner_keys();
    let (candidate_a, candidate_b) = if reversed {
        (cand_end, cand_start)
    } else {
        (cand_start, cand_end)
    };
    CornerMapping {
        moving_a,
        candidate_a,
        moving_b,
        candidate_b,
    }
}

fn score_order<'a>(
    moving: &[Point],
    candidate: impl Iterator<Item = &'a Point>,
    tolerance: &MatchTolerance,
) -> Option<f32> {
    let mut distances: Vec<f32> = moving
        .iter()
        .zip(candidate)
        .map(|(a, b)| a.distance_sq(*b))
        .collect();
    if distances.iter().any(|d| !d.is_finite() || *d > tolerance.position) {
        return None;
    }
    distances.sort_by(f32::total_cmp);
    if tolerance.profile_check {
        let spread = match (distances.first(), distances.last()) {
            (Some(min), Some(max)) => max - min,
            _ => 0.0,
        };
        if spread > tolerance.profile {
            return None;
        }
    }
    // summed smallest first so swapping roles yields the identical float
    Some(distances.iter().sum())
}

/// Compares two side sequences. Direct order wins a score tie with reversed.
pub fn match_sides(
    moving: &[Point],
    candidate: &[Point],
    tolerance: &MatchTolerance,
) -> Option<SideMatch> {
    if moving.len() < 3 || moving.len() != candidate.len() {
        return None;
    }
    let direct = score_order(moving, candidate.iter(), tolerance);
    let reversed = score_order(moving, candidate.iter().rev(), tolerance);
    match (direct, reversed) {
        (Some(d), Some(r)) if r < d => Some(SideMatch {
            reversed: true,
            score: r,
        }),
        (Some(d), _) => Some(SideMatch {
            reversed: false,
            score: d,
        }),
        (None, Some(r)) => Some(SideMatch {
            reversed: true,
            score: r,
        }),
        (None, None) => None,
    }
}

pub fn best_side_match(
    moving_id: PieceId,
    moving_piece: &Piece,
    moving: &WorldData,
    candidate_id: PieceId,
    candidate_piece: &Piece,
    candidate: &WorldData,
    tolerance: &MatchTolerance,
) -> Option<SnapMatch> {
    let mut best: Option<SnapMatch> = None;
    for moving_side in Side::ALL {
        if moving_piece.is_border_side(moving_side) {
            continue;
        }
        let moving_seq = moving.side_sequence(moving_side);
        for candidate_side in Side::ALL {
            if candidate_piece.is_border_side(candidate_side) {
                continue;
            }
            let candidate_seq = candidate.side_sequence(candidate_side);
            let Some(found) = match_sides(&moving_seq, &candidate_seq, tolerance) else {
                continue;
            };
            if best.as_ref().is_some_and(|current| found.score >= current.score) {
                continue;
            }
            let corner_map = corner_mapping(moving_side, candidate_side, found.reversed);
            best = Some(SnapMatch {
                moving: moving_id,
                candidate: candidate_id,
                moving_side,
                candidate_side,
                reversed: found.reversed,
                corner_map,
                moving_anchor: moving.corners.get(corner_map.moving_a),
                candidate_anchor: candidate.corners.get(corner_map.candidate_a),
                score: found.score,
            });
        }
    }
    best
}

pub trait MatchContext {
    fn piece(&self, id: PieceId) -> Option<&Piece>;
    fn world(&self, id: PieceId) -> Option<&WorldData>;
    fn position(&self, id: PieceId) -> Option<Point>;
    fn group_of(&self, id: PieceId) -> Option<GroupId>;
    fn piece_at(&self, grid_pos: GridPos) -> Option<PieceId>;
    fn nearby(&self, center: Point, radius: f32) -> Vec<PieceId>;
}

/// Lowest-score match between `moving` and any nearby piece outside its group.
pub fn find_candidate<C: MatchContext + ?Sized>(
    ctx: &C,
    moving: PieceId,
    tolerance: &MatchTolerance,
    coarse_radius_multiplier: f32,
) -> Option<SnapMatch> {
    let piece = ctx.piece(moving)?;
    let world = ctx.world(moving)?;
    let center = ctx.position(moving)?;
    let group = ctx.group_of(moving);
    let radius = coarse_radius_multiplier * piece.image_rect.longest_side() * piece.scale;
    let mut candidates = ctx.nearby(center, radius);
    candidates.sort_unstable();
    candidates.dedup();
    let mut best: Option<SnapMatch> = None;
    for candidate_id in candidates {
        if candidate_id == moving || (group.is_some() && ctx.group_of(candidate_id) == group) {
            continue;
        }
        let (Some(candidate_piece), Some(candidate_world)) =
            (ctx.piece(candidate_id), ctx.world(candidate_id))
        else {
            continue;
        };
        let found = best_side_match(
            moving,
            piece,
            world,
            candidate_id,
            candidate_piece,
            candidate_world,
            tolerance,
        );
        if let Some(found) = found {
            if best.as_ref().map_or(true, |current| found.score < current.score) {
                best = Some(found);
            }
        }
    }
    best
}

/// Members with fewer than four grid neighbors inside the same group, ascending.
pub fn border_pieces<C: MatchContext + ?Sized>(ctx: &C, members: &[PieceId]) -> Vec<PieceId> {
    let mut border: Vec<PieceId> = members
        .iter()
        .copied()
        .filter(|id| {
            let Some(piece) = ctx.piece(*id) else {
                return false;
            };
            let group = ctx.group_of(*id);
            let inside = Side::ALL
                .into_iter()
                .filter_map(|side| piece.grid_pos.step(side))
                .filter_map(|pos| ctx.piece_at(pos))
                .filter(|neighbor| ctx.group_of(*neighbor) == group)
                .count();
            inside < 4
        })
        .collect();
    border.sort_unstable();
    border
}

pub fn find_group_candidate<C: MatchContext + ?Sized>(
    ctx: &C,
    members: &[PieceId],
    tolerance: &MatchTolerance,
    coarse_radius_multiplier: f32,
) -> Option<SnapMatch> {
    let mut best: Option<SnapMatch> = None;
    for id in border_pieces(ctx, members) {
        let Some(found) = find_candidate(ctx, id, tolerance, coarse_radius_multiplier) else {
            continue;
        };
        if best.as_ref().map_or(true, |current| found.score < current.score) {
            best = Some(found);
        }
    }
    best
}
