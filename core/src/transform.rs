//! Piece-local geometry to world space.
//!
//! `position` is the piece's visual center: the local bounding-frame center lands on it,
//! local offsets are scaled, and everything is then rotated around `position`.

use crate::piece::{Corners, Piece, Side, SidePoints};
use crate::point::Point;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct WorldData {
    pub corners: Corners,
    pub side_points: SidePoints,
}

impl WorldData {
    pub fn side_sequence(&self, side: Side) -> Vec<Point> {
        let (start, end) = side.corner_keys();
        let waypoints = self.side_points.get(side);
        let mut sequence = Vec::with_capacity(waypoints.len() + 2);
        sequence.push(self.corners.get(start));
        sequence.extend_from_slice(waypoints);
        sequence.push(self.corners.get(end));
        sequence
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TransformKey {
    pub position: Point,
    pub rotation: f32,
    pub scale: f32,
}

impl TransformKey {
    pub fn new(position: Point, rotation: f32, scale: f32) -> Self {
        Self {
            position,
            rotation,
            scale,
        }
    }
}

pub fn local_to_world(piece: &Piece, key: TransformKey, local: Point) -> Point {
    let center = piece.bounding_frame().center();
    let placed = key.position + (local - center).scale(key.scale);
    placed.rotate_around(key.position, key.rotation)
}

pub fn compute_world(piece: &Piece, key: TransformKey) -> WorldData {
    WorldData {
        corners: piece
            .corners
            .map(|point| local_to_world(piece, key, point)),
        side_points: piece
            .side_points
            .map(|point| local_to_world(piece, key, point)),
    }
}

/// World data plus the key it was computed for. Stale entries are recomputed through an
/// explicit validity check, never implicitly on read.
#[derive(Clone, Debug, PartialEq)]
pub struct WorldCache {
    value: WorldData,
    valid_for: TransformKey,
}

impl WorldCache {
    pub fn new(piece: &Piece, key: TransformKey) -> Self {
        Self {
            value: compute_world(piece, key),
            valid_for: key,
        }
    }

    pub fn is_valid_for(&self, key: TransformKey) -> bool {
        self.valid_for == key
    }

    pub fn valid_for(&self) -> TransformKey {
        self.valid_for
    }

    pub fn value(&self) -> &WorldData {
        &self.value
    }

    /// Recomputes when `key` differs from the cached one. Returns whether it did.
    pub fn refresh(&mut self, piece: &Piece, key: TransformKey) -> bool {
        if self.is_valid_for(key) {
            return false;
        }
        self.value = compute_world(piece, key);
        self.valid_for = key;
        true
    }

    pub fn get(&mut self, piece: &Piece, key: TransformKey) -> &WorldData {
        self.refresh(piece, key);
        &self.value
    }
}
