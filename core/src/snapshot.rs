use rkyv::{Archive, Deserialize as RkyvDeserialize, Serialize as RkyvSerialize};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::SnapshotError;
use crate::groups::GroupId;
use crate::piece::{Corners, GridPos, Piece, SidePoints};
use crate::point::Point;
use crate::puzzle::{Puzzle, PuzzleInfo};
use crate::rect::Rect;
use crate::rules::PuzzleRules;

pub const PUZZLE_SNAPSHOT_VERSION: u32 = 1;

/// Everything needed to rebuild one piece and its placement without the lattice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Archive, RkyvSerialize, RkyvDeserialize)]
pub struct PieceRecord {
    pub id: u32,
    pub grid_pos: GridPos,
    pub rotation: f32,
    pub position: Point,
    pub group_id: GroupId,
    pub corners: Corners,
    pub side_points: SidePoints,
    pub image_rect: Rect,
    pub scale: f32,
    pub z_index: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Archive, RkyvSerialize, RkyvDeserialize)]
pub struct PuzzleSnapshot {
    pub version: u32,
    pub info: PuzzleInfo,
    pub rules: PuzzleRules,
    pub pieces: Vec<PieceRecord>,
}

impl PuzzleSnapshot {
    pub fn validate(&self) -> Result<(), SnapshotError> {
        if self.version != PUZZLE_SNAPSHOT_VERSION {
            return Err(SnapshotError::Version {
                expected: PUZZLE_SNAPSHOT_VERSION,
                found: self.version,
            });
        }
        let info = &self.info;
        if info.rows < 2 || info.cols < 2 {
            return Err(SnapshotError::Invalid(format!(
                "grid {}x{} is too small",
                info.cols, info.rows
            )));
        }
        let expected = info.checked_piece_count().ok_or_else(|| {
            SnapshotError::Invalid(format!("grid {}x{} is too large", info.cols, info.rows))
        })?;
        if self.pieces.len() != expected {
            return Err(SnapshotError::Invalid(format!(
                "expected {expected} pieces, found {}",
                self.pieces.len()
            )));
        }
        for (idx, record) in self.pieces.iter().enumerate() {
            if record.id as usize != idx {
                return Err(SnapshotError::Invalid(format!(
                    "piece at index {idx} has id {}",
                    record.id
                )));
            }
            let expected = GridPos::new(idx as u32 % info.cols, idx as u32 / info.cols);
            if record.grid_pos != expected {
                return Err(SnapshotError::Invalid(format!(
                    "piece {idx} has grid position {:?}",
                    record.grid_pos
                )));
            }
            let finite = record.position.is_finite()
                && record.rotation.is_finite()
                && record.scale.is_finite()
                && record.scale > 0.0
                && record.corners.iter().all(Point::is_finite)
                && record.side_points.points().all(Point::is_finite);
            if !finite {
                return Err(SnapshotError::Invalid(format!(
                    "piece {idx} has non-finite geometry"
                )));
            }
        }
        Ok(())
    }
}

impl Puzzle {
    pub fn snapshot(&self) -> PuzzleSnapshot {
        let (info, rules, pieces, positions, groups) = self.parts();
        let pieces = pieces
            .iter()
            .map(|piece| PieceRecord {
                id: piece.id as u32,
                grid_pos: piece.grid_pos,
                rotation: piece.rotation,
                position: positions.get(piece.id).copied().unwrap_or_default(),
                group_id: groups.group_of(piece.id).unwrap_or(piece.id as GroupId),
                corners: piece.corners,
                side_points: piece.side_points.clone(),
                image_rect: piece.image_rect,
                scale: piece.scale,
                z_index: piece.z_index,
            })
            .collect();
        PuzzleSnapshot {
            version: PUZZLE_SNAPSHOT_VERSION,
            info: *info,
            rules: *rules,
            pieces,
        }
    }

    /// Rebuilds a puzzle from a snapshot. Stored groups that are no longer connected are
    /// split rather than rejected.
    pub fn from_snapshot(snapshot: PuzzleSnapshot) -> Result<Self, SnapshotError> {
        snapshot.validate()?;
        let mut positions = Vec::with_capacity(snapshot.pieces.len());
        let mut assignments = Vec::with_capacity(snapshot.pieces.len());
        let mut pieces = Vec::with_capacity(snapshot.pieces.len());
        for record in snapshot.pieces {
            positions.push(record.position);
            assignments.push(record.group_id);
            let mut piece = Piece::new(
                record.id as usize,
                record.grid_pos,
                record.corners,
                record.side_points,
                record.image_rect,
            );
            piece.set_rotation(record.rotation);
            piece.scale = record.scale;
            piece.z_index = record.z_index;
            pieces.push(piece);
        }
        let puzzle = Puzzle::from_parts(
            snapshot.info,
            snapshot.rules,
            pieces,
            positions,
            Some(&assignments),
        );
        debug!(
            pieces = puzzle.pieces().len(),
            groups = puzzle.groups().group_count(),
            "restored puzzle"
        );
        Ok(puzzle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::GridChoice;
    use pretty_assertions::assert_eq;

    fn sample() -> Puzzle {
        let choice = GridChoice {
            target_count: 6,
            cols: 3,
            rows: 2,
            actual_count: 6,
        };
        Puzzle::generate_with_grid(300.0, 200.0, choice, PuzzleRules::default(), 4).unwrap()
    }

    #[test]
    fn snapshot_restores_same_state() {
        let mut puzzle = sample();
        puzzle.merge_groups(0, 1).unwrap();
        let snapshot = puzzle.snapshot();
        let restored = Puzzle::from_snapshot(snapshot.clone()).unwrap();
        assert_eq!(restored.snapshot(), snapshot);
        assert_eq!(restored.groups(), puzzle.groups());
    }

    #[test]
    fn disconnected_groups_are_split_on_restore() {
        let mut puzzle = sample();
        puzzle.scatter(3);
        let mut snapshot = puzzle.snapshot();
        for record in &mut snapshot.pieces {
            record.group_id = 0;
        }
        let restored = Puzzle::from_snapshot(snapshot).unwrap();
        assert!(restored.invalid_groups().is_empty());
        assert!(restored.groups().group_count() > 1);
    }

    #[test]
    fn rejects_bad_snapshots() {
        let mut snapshot = sample().snapshot();
        snapshot.version = 99;
        assert!(matches!(
            Puzzle::from_snapshot(snapshot.clone()),
            Err(SnapshotError::Version { expected: 1, found: 99 })
        ));
        snapshot.version = PUZZLE_SNAPSHOT_VERSION;
        snapshot.pieces.pop();
        assert!(matches!(
            Puzzle::from_snapshot(snapshot.clone()),
            Err(SnapshotError::Invalid(_))
        ));
        let mut snapshot = sample().snapshot();
        snapshot.pieces[2].position = Point::new(f32::NAN, 0.0);
        assert!(matches!(
            Puzzle::from_snapshot(snapshot),
            Err(SnapshotError::Invalid(_))
        ));
    }

    #[test]
    fn oversized_grid_is_rejected() {
        let mut snapshot = sample().snapshot();
        snapshot.info.rows = 70_000;
        snapshot.info.cols = 70_000;
        assert!(matches!(
            Puzzle::from_snapshot(snapshot),
            Err(SnapshotError::Invalid(_))
        ));
    }

    #[test]
    fn extreme_group_ids_restore_without_collisions() {
        let mut puzzle = sample();
        puzzle.scatter(9);
        let mut snapshot = puzzle.snapshot();
        for record in &mut snapshot.pieces {
            record.group_id = GroupId::MAX;
        }
        let mut restored = Puzzle::from_snapshot(snapshot).unwrap();
        assert!(restored.invalid_groups().is_empty());
        let total: usize = restored.groups().groups().map(|(_, members)| members.len()).sum();
        assert_eq!(total, 6);

        restored.solve().unwrap();
        assert!(restored.is_complete());
        let outcome = restored.detach_piece(0).unwrap();
        assert!(outcome.changed());
        assert_ne!(outcome.piece_group, outcome.original);
        assert!(restored.invalid_groups().is_empty());
    }
}
