//! The puzzle aggregate: pieces, positions, cached world geometry, the spatial index and
//! the group partition, kept mutually consistent.
//!
//! Every mutation writes positions first, then refreshes the derived world data and the
//! spatial index, and only then touches group membership.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{GenerationError, GroupError};
use crate::grid::{choose_grid, GridChoice};
use crate::groups::{
    sides_touch, DetachOutcome, GeometricNeighbors, GroupId, GroupManager, MergeOutcome,
};
use crate::lattice::{generate_lattice, LatticeRequest};
use crate::matcher::{self, MatchContext, MatchTolerance, SnapMatch};
use crate::piece::{build_pieces, GridPos, Piece, PieceId};
use crate::point::Point;
use crate::positions::{PositionStore, PositionTable};
use crate::rect::Rect;
use crate::rng::{mix_seed, rand_index, rand_range};
use crate::rules::PuzzleRules;
use crate::spatial::SpatialGrid;
use crate::transform::{TransformKey, WorldCache, WorldData};

const STREAM_SCATTER: u32 = 0x5CA7_7E20;

#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Serialize,
    Deserialize,
    rkyv::Archive,
    rkyv::Serialize,
    rkyv::Deserialize,
)]
pub struct PuzzleInfo {
    pub image_width: f32,
    pub image_height: f32,
    pub rows: u32,
    pub cols: u32,
    pub target_count: u32,
}

impl PuzzleInfo {
    pub fn piece_count(&self) -> usize {
        self.checked_piece_count().unwrap_or(usize::MAX)
    }

    pub fn checked_piece_count(&self) -> Option<usize> {
        (self.rows as usize).checked_mul(self.cols as usize)
    }

    pub fn internal_edge_count(&self) -> u32 {
        let across = self.rows.saturating_sub(1).saturating_mul(self.cols);
        let down = self.cols.saturating_sub(1).saturating_mul(self.rows);
        across.saturating_add(down)
    }

    pub fn image_rect(&self) -> Rect {
        Rect::new(0.0, 0.0, self.image_width, self.image_height)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Progress {
    pub groups: usize,
    pub total: usize,
    /// 0 when every piece is loose, 1 when the puzzle is complete.
    pub connected_fraction: f32,
}

impl Progress {
    pub fn is_complete(&self) -> bool {
        self.total > 0 && self.groups == 1
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Connection {
    pub moving: PieceId,
    pub candidate: PieceId,
    pub merge: MergeOutcome,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CommitOutcome {
    pub offset: Point,
    pub group: GroupId,
    pub connections: Vec<Connection>,
}

fn neighbor_relation(worlds: &[WorldCache], tolerance: f32) -> GeometricNeighbors<'_> {
    GeometricNeighbors::new(worlds.iter().map(WorldCache::value).collect(), tolerance)
}

#[derive(Clone, Debug)]
pub struct Puzzle {
    info: PuzzleInfo,
    rules: PuzzleRules,
    pieces: Vec<Piece>,
    positions: PositionTable,
    worlds: Vec<WorldCache>,
    spatial: SpatialGrid,
    groups: GroupManager,
    next_z: u32,
}

impl Puzzle {
    /// Picks a grid for `target_count`, cuts the image and lays the pieces out solved.
    pub fn generate(
        image_width: f32,
        image_height: f32,
        target_count: u32,
        rules: PuzzleRules,
        seed: u32,
    ) -> Result<Self, GenerationError> {
        let choice = choose_grid(image_width, image_height, target_count)?;
        Self::generate_with_grid(image_width, image_height, choice, rules, seed)
    }

    pub fn generate_with_grid(
        image_width: f32,
        image_height: f32,
        choice: GridChoice,
        rules: PuzzleRules,
        seed: u32,
    ) -> Result<Self, GenerationError> {
        let request = LatticeRequest::from_settings(
            choice.rows,
            choice.cols,
            image_width,
            image_height,
            &rules.shape,
        );
        let lattice = generate_lattice(&request, &rules.shape, seed)?;
        let pieces = build_pieces(&lattice);
        let info = PuzzleInfo {
            image_width,
            image_height,
            rows: choice.rows,
            cols: choice.cols,
            target_count: choice.target_count,
        };
        let positions = pieces.iter().map(|piece| piece.solved_position(piece.scale)).collect();
        let puzzle = Self::from_parts(info, rules, pieces, positions, None);
        info!(
            rows = info.rows,
            cols = info.cols,
            pieces = puzzle.pieces.len(),
            "generated puzzle"
        );
        Ok(puzzle)
    }

    /// Assembles a puzzle from stored pieces and positions. Group assignments, when given,
    /// are validated and repaired; otherwise every piece starts alone.
    pub fn from_parts(
        info: PuzzleInfo,
        rules: PuzzleRules,
        pieces: Vec<Piece>,
        positions: Vec<Point>,
        assignments: Option<&[GroupId]>,
    ) -> Self {
        let positions = PositionTable::from_positions(positions);
        let bucket = pieces
            .iter()
            .map(|piece| piece.image_rect.longest_side() * piece.scale)
            .fold(0.0f32, f32::max);
        let mut spatial = SpatialGrid::new(bucket);
        let worlds: Vec<WorldCache> = pieces
            .iter()
            .map(|piece| {
                let position = positions.position(piece.id).unwrap_or_default();
                spatial.insert(piece.id, position);
                WorldCache::new(piece, TransformKey::new(position, piece.rotation, piece.scale))
            })
            .collect();
        let groups = match assignments {
            Some(assignments) => {
                let relation = neighbor_relation(&worlds, rules.matching.neighbor_tolerance);
                GroupManager::from_assignments(assignments, &relation)
            }
            None => GroupManager::new(pieces.len()),
        };
        let next_z = pieces.iter().map(|piece| piece.z_index).max().map_or(0, |z| z + 1);
        Self {
            info,
            rules,
            pieces,
            positions,
            worlds,
            spatial,
            groups,
            next_z,
        }
    }

    pub fn info(&self) -> &PuzzleInfo {
        &self.info
    }

    pub fn rules(&self) -> &PuzzleRules {
        &self.rules
    }

    pub fn pieces(&self) -> &[Piece] {
        &self.pieces
    }

    pub fn piece(&self, id: PieceId) -> Option<&Piece> {
        self.pieces.get(id)
    }

    pub fn position(&self, id: PieceId) -> Option<Point> {
        self.positions.position(id)
    }

    pub fn positions(&self) -> &[Point] {
        self.positions.as_slice()
    }

    pub fn world(&self, id: PieceId) -> Option<&WorldData> {
        self.worlds.get(id).map(WorldCache::value)
    }

    pub fn groups(&self) -> &GroupManager {
        &self.groups
    }

    pub fn group_of(&self, id: PieceId) -> Option<GroupId> {
        self.groups.group_of(id)
    }

    pub fn piece_at(&self, grid_pos: GridPos) -> Option<PieceId> {
        if grid_pos.col >= self.info.cols || grid_pos.row >= self.info.rows {
            return None;
        }
        Some((grid_pos.row * self.info.cols + grid_pos.col) as usize)
    }

    pub fn neighbors(&self) -> GeometricNeighbors<'_> {
        neighbor_relation(&self.worlds, self.rules.matching.neighbor_tolerance)
    }

    fn sync(&mut self, id: PieceId) {
        let (Some(piece), Some(cache), Some(position)) = (
            self.pieces.get(id),
            self.worlds.get_mut(id),
            self.positions.position(id),
        ) else {
            return;
        };
        cache.refresh(piece, TransformKey::new(position, piece.rotation, piece.scale));
        self.spatial.update(id, position);
    }

    fn sync_all(&mut self, ids: &[PieceId]) {
        for id in ids {
            self.sync(*id);
        }
    }

    /// Random positions inside the workspace, quarter-turn rotations when enabled and a
    /// shuffled stacking order. Every piece ends up in its own group.
    pub fn scatter(&mut self, seed: u32) {
        let seed = mix_seed(seed, STREAM_SCATTER);
        let image = self.info.image_rect();
        let workspace_scale = self.rules.workspace_scale.max(1.0);
        let workspace = Rect::new(
            image.center().x - image.width * workspace_scale * 0.5,
            image.center().y - image.height * workspace_scale * 0.5,
            image.width * workspace_scale,
            image.height * workspace_scale,
        );
        let margin = workspace.width.min(workspace.height) * self.rules.scatter_margin_ratio;
        let area = workspace.inset(margin);
        let step = self.rules.rotation_step_deg;
        let turns = if self.rules.rotation_enabled && step > 0.0 {
            ((360.0 / step).round() as usize).max(1)
        } else {
            1
        };

        let count = self.pieces.len();
        let mut order: Vec<u32> = (0..count as u32).collect();
        for idx in (1..count).rev() {
            let swap = rand_index(seed, 0x2000_0000 + idx as u32, idx + 1);
            order.swap(idx, swap);
        }

        for (id, z_index) in order.into_iter().enumerate() {
            let salt = id as u32 * 3;
            let half = self.pieces[id].bounding_frame().center_offset() * self.pieces[id].scale;
            let inner = Rect::new(
                area.x + half.x,
                area.y + half.y,
                (area.width - 2.0 * half.x).max(0.0),
                (area.height - 2.0 * half.y).max(0.0),
            );
            let position = Point::new(
                rand_range(seed, salt, inner.x, inner.right()),
                rand_range(seed, salt + 1, inner.y, inner.bottom()),
            );
            let rotation = rand_index(seed, salt + 2, turns) as f32 * step;
            let piece = &mut self.pieces[id];
            piece.set_rotation(rotation);
            piece.z_index = z_index;
            self.positions.set_position(id, position);
            self.sync(id);
        }
        self.next_z = count as u32;
        self.groups = GroupManager::new(count);
        debug!(pieces = count, "scattered pieces");
    }

    /// Moves every piece to its solved position with no rotation. Groups are untouched.
    pub fn arrange_solved(&mut self) {
        for id in 0..self.pieces.len() {
            let piece = &mut self.pieces[id];
            piece.set_rotation(0.0);
            let target = piece.solved_position(piece.scale);
            self.positions.set_position(id, target);
            self.sync(id);
        }
    }

    pub fn solve(&mut self) -> Result<(), GroupError> {
        self.arrange_solved();
        let relation = neighbor_relation(&self.worlds, self.rules.matching.neighbor_tolerance);
        self.groups.merge_all(&relation)?;
        Ok(())
    }

    pub fn set_piece_position(&mut self, id: PieceId, position: Point) -> Result<(), GroupError> {
        if !self.positions.set_position(id, position) {
            return Err(GroupError::UnknownPiece(id));
        }
        self.sync(id);
        Ok(())
    }

    pub fn translate_group(
        &mut self,
        group: GroupId,
        offset: Point,
    ) -> Result<Vec<PieceId>, GroupError> {
        let moved = self.groups.translate_group(group, offset, &mut self.positions)?;
        self.sync_all(&moved);
        Ok(moved)
    }

    pub fn rotate_group(
        &mut self,
        group: GroupId,
        angle_deg: f32,
        pivot_piece: PieceId,
    ) -> Result<Vec<PieceId>, GroupError> {
        let moved = self.groups.rotate_group(
            group,
            angle_deg,
            pivot_piece,
            &mut self.positions,
            &mut self.pieces,
        )?;
        self.sync_all(&moved);
        Ok(moved)
    }

    /// Puts `group` above everything else, keeping the members' relative order.
    pub fn raise_group(&mut self, group: GroupId) -> Result<(), GroupError> {
        let mut members = self
            .groups
            .members(group)
            .ok_or(GroupError::UnknownGroup(group))?
            .to_vec();
        members.sort_by_key(|id| self.pieces[*id].z_index);
        for id in members {
            self.pieces[id].z_index = self.next_z;
            self.next_z += 1;
        }
        Ok(())
    }

    pub fn set_piece_scale(&mut self, scale: f32) {
        let scale = if scale.is_finite() && scale > 0.0 { scale } else { 1.0 };
        for id in 0..self.pieces.len() {
            self.pieces[id].scale = scale;
            self.sync(id);
        }
    }

    pub fn tolerance(&self, zoom: f32) -> MatchTolerance {
        MatchTolerance::for_zoom(&self.rules.matching, zoom)
    }

    pub fn find_candidate(&self, moving: PieceId, zoom: f32) -> Option<SnapMatch> {
        matcher::find_candidate(
            self,
            moving,
            &self.tolerance(zoom),
            self.rules.matching.coarse_radius_multiplier,
        )
    }

    pub fn find_group_candidate(&self, moving: PieceId, zoom: f32) -> Option<SnapMatch> {
        let members = self.groups.members_of_piece(moving)?;
        matcher::find_group_candidate(
            self,
            members,
            &self.tolerance(zoom),
            self.rules.matching.coarse_radius_multiplier,
        )
    }

    pub fn border_pieces(&self, group: GroupId) -> Vec<PieceId> {
        match self.groups.members(group) {
            Some(members) => matcher::border_pieces(self, members),
            None => Vec::new(),
        }
    }

    /// Fine-places the moving group onto the candidate, merges, then cascades. A refused
    /// merge puts the moving group back where it was. A match between pieces that already
    /// share a group moves nothing.
    pub fn commit_match(&mut self, snap: &SnapMatch) -> Result<CommitOutcome, GroupError> {
        let moving_group = self
            .group_of(snap.moving)
            .ok_or(GroupError::UnknownPiece(snap.moving))?;
        let candidate_group = self
            .group_of(snap.candidate)
            .ok_or(GroupError::UnknownPiece(snap.candidate))?;
        if moving_group == candidate_group {
            warn!(
                moving = snap.moving,
                candidate = snap.candidate,
                group = moving_group,
                "stale match ignored"
            );
            return Err(GroupError::AlreadyJoined(moving_group));
        }
        let offset = snap.offset();
        let moved = self.translate_group(moving_group, offset)?;
        let merged = {
            let relation =
                neighbor_relation(&self.worlds, self.rules.matching.neighbor_tolerance);
            self.groups.merge_groups(snap.moving, snap.candidate, &relation)
        };
        let merge = match merged {
            Ok(merge) => merge,
            Err(err) => {
                for id in moved {
                    let restored = self.positions.translate(id, -offset);
                    if restored.is_some() {
                        self.sync(id);
                    }
                }
                return Err(err);
            }
        };
        let group = merge.kept;
        let mut connections = vec![Connection {
            moving: snap.moving,
            candidate: snap.candidate,
            merge,
        }];
        if self.rules.cascade_snaps {
            connections.extend(self.cascade(group));
        }
        let group = self.group_of(snap.moving).unwrap_or(group);
        debug!(
            moving = snap.moving,
            candidate = snap.candidate,
            group,
            merges = connections.len(),
            "committed match"
        );
        Ok(CommitOutcome {
            offset,
            group,
            connections,
        })
    }

    /// Merges every outside piece that now touches `group` until nothing changes.
    fn cascade(&mut self, mut group: GroupId) -> Vec<Connection> {
        let tolerance_sq = self.rules.matching.neighbor_tolerance.powi(2);
        let mut connections = Vec::new();
        loop {
            let Some(members) = self.groups.members(group) else {
                break;
            };
            let mut found = None;
            'search: for member in members {
                let (Some(piece), Some(world), Some(center)) = (
                    self.pieces.get(*member),
                    self.world(*member),
                    self.position(*member),
                ) else {
                    continue;
                };
                let radius = self.rules.matching.coarse_radius_multiplier
                    * piece.image_rect.longest_side()
                    * piece.scale;
                for other in self.spatial.query_radius(center, radius) {
                    if self.groups.group_of(other) == Some(group) {
                        continue;
                    }
                    if let Some(other_world) = self.world(other) {
                        if sides_touch(world, other_world, tolerance_sq) {
                            found = Some((*member, other));
                            break 'search;
                        }
                    }
                }
            }
            let Some((member, other)) = found else {
                break;
            };
            let merged = {
                let relation =
                    neighbor_relation(&self.worlds, self.rules.matching.neighbor_tolerance);
                self.groups.merge_groups(member, other, &relation)
            };
            match merged {
                Ok(merge) => {
                    group = merge.kept;
                    connections.push(Connection {
                        moving: member,
                        candidate: other,
                        merge,
                    });
                }
                Err(err) => {
                    warn!(%err, member, other, "cascade merge refused");
                    break;
                }
            }
        }
        connections
    }

    pub fn merge_groups(&mut self, a: PieceId, b: PieceId) -> Result<MergeOutcome, GroupError> {
        let relation = neighbor_relation(&self.worlds, self.rules.matching.neighbor_tolerance);
        self.groups.merge_groups(a, b, &relation)
    }

    pub fn detach_piece(&mut self, piece: PieceId) -> Result<DetachOutcome, GroupError> {
        let relation = neighbor_relation(&self.worlds, self.rules.matching.neighbor_tolerance);
        self.groups.detach_piece(piece, &relation)
    }

    pub fn invalid_groups(&self) -> Vec<GroupId> {
        self.groups.validate_all(&self.neighbors())
    }

    pub fn progress(&self) -> Progress {
        let total = self.pieces.len();
        let groups = self.groups.group_count();
        let connected_fraction = if total <= 1 {
            1.0
        } else {
            (total - groups) as f32 / (total - 1) as f32
        };
        Progress {
            groups,
            total,
            connected_fraction,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.progress().is_complete()
    }

    pub(crate) fn parts(&self) -> (&PuzzleInfo, &PuzzleRules, &[Piece], &[Point], &GroupManager) {
        (
            &self.info,
            &self.rules,
            &self.pieces,
            self.positions.as_slice(),
            &self.groups,
        )
    }
}

impl MatchContext for Puzzle {
    fn piece(&self, id: PieceId) -> Option<&Piece> {
        self.pieces.get(id)
    }

    fn world(&self, id: PieceId) -> Option<&WorldData> {
        Puzzle::world(self, id)
    }

    fn position(&self, id: PieceId) -> Option<Point> {
        self.positions.position(id)
    }

    fn group_of(&self, id: PieceId) -> Option<GroupId> {
        self.groups.group_of(id)
    }

    fn piece_at(&self, grid_pos: GridPos) -> Option<PieceId> {
        Puzzle::piece_at(self, grid_pos)
    }

    fn nearby(&self, center: Point, radius: f32) -> Vec<PieceId> {
        self.spatial.query_radius(center, radius)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::groups::NeighborRelation;
    use crate::piece::Side;

    fn puzzle(rows: u32, cols: u32) -> Puzzle {
        let choice = GridChoice {
            target_count: rows * cols,
            cols,
            rows,
            actual_count: rows * cols,
        };
        Puzzle::generate_with_grid(300.0, 200.0, choice, PuzzleRules::default(), 21).unwrap()
    }

    #[test]
    fn generated_layout_is_solved() {
        let puzzle = puzzle(2, 3);
        assert_eq!(puzzle.pieces().len(), 6);
        let relation = puzzle.neighbors();
        assert!(relation.are_neighbors(0, 1));
        assert!(relation.are_neighbors(1, 4));
        assert!(!relation.are_neighbors(0, 4));
        assert!(!relation.are_neighbors(0, 2));
    }

    #[test]
    fn world_corners_land_on_lattice() {
        let puzzle = puzzle(2, 2);
        let world = puzzle.world(3).unwrap();
        let piece = puzzle.piece(3).unwrap();
        let expected = piece.corners.se + piece.image_origin();
        assert!(world.corners.se.distance(expected) < 1e-3);
        assert!((world.corners.se.x - 300.0).abs() < 1e-3);
    }

    #[test]
    fn scatter_is_deterministic_and_resets_groups() {
        let mut a = puzzle(3, 3);
        let mut b = puzzle(3, 3);
        a.solve().unwrap();
        assert!(a.is_complete());
        a.scatter(5);
        b.scatter(5);
        assert_eq!(a.positions(), b.positions());
        assert_eq!(a.progress().groups, 9);
        assert!(a.pieces().iter().all(|piece| piece.rotation % 90.0 == 0.0));
        let mut z: Vec<u32> = a.pieces().iter().map(|piece| piece.z_index).collect();
        z.sort_unstable();
        assert_eq!(z, (0..9).collect::<Vec<_>>());
    }

    #[test]
    fn solve_merges_everything() {
        let mut puzzle = puzzle(3, 4);
        puzzle.scatter(1);
        puzzle.solve().unwrap();
        let progress = puzzle.progress();
        assert_eq!(progress.groups, 1);
        assert_eq!(progress.connected_fraction, 1.0);
        assert!(puzzle.invalid_groups().is_empty());
    }

    #[test]
    fn match_then_commit_joins_pieces() {
        let mut puzzle = puzzle(2, 2);
        let solved = puzzle.position(1).unwrap();
        puzzle.set_piece_position(1, solved + Point::new(4.0, -3.0)).unwrap();
        let snap = puzzle.find_candidate(1, 1.0).unwrap();
        assert_eq!(snap.moving, 1);
        let outcome = puzzle.commit_match(&snap).unwrap();
        assert!(puzzle.groups().same_group(1, snap.candidate));
        assert!(outcome.offset.distance(Point::new(-4.0, 3.0)) < 1e-3);
        assert!(puzzle.position(1).unwrap().distance(solved) < 1e-3);
        assert!(puzzle.invalid_groups().is_empty());
    }

    #[test]
    fn replaying_a_committed_match_moves_nothing() {
        let mut puzzle = puzzle(2, 2);
        let solved = puzzle.position(1).unwrap();
        puzzle.set_piece_position(1, solved + Point::new(3.0, 1.0)).unwrap();
        let snap = puzzle.find_candidate(1, 1.0).unwrap();
        puzzle.commit_match(&snap).unwrap();
        let positions = puzzle.positions().to_vec();
        let groups = puzzle.groups().clone();

        let err = puzzle.commit_match(&snap).unwrap_err();
        assert_eq!(err, GroupError::AlreadyJoined(groups.group_of(1).unwrap()));
        assert_eq!(puzzle.positions(), &positions[..]);
        assert_eq!(puzzle.groups(), &groups);
    }

    #[test]
    fn scale_change_refreshes_world_and_lookup() {
        let mut puzzle = puzzle(2, 2);
        let width = |world: &WorldData| world.corners.ne.x - world.corners.nw.x;
        let before = width(puzzle.world(0).unwrap());
        puzzle.set_piece_scale(2.0);
        assert!((width(puzzle.world(0).unwrap()) - 2.0 * before).abs() < 1e-3);

        puzzle.arrange_solved();
        assert!(puzzle.invalid_groups().is_empty());
        let solved = puzzle.position(1).unwrap();
        puzzle.set_piece_position(1, solved + Point::new(3.0, 2.0)).unwrap();
        let snap = puzzle.find_candidate(1, 1.0).unwrap();
        assert!(snap.offset().distance(Point::new(-3.0, -2.0)) < 1e-3);

        puzzle.set_piece_scale(f32::NAN);
        assert!(puzzle.pieces().iter().all(|piece| piece.scale == 1.0));
    }

    #[test]
    fn solve_handles_large_grids() {
        let choice = GridChoice {
            target_count: 1200,
            cols: 40,
            rows: 30,
            actual_count: 1200,
        };
        let mut puzzle =
            Puzzle::generate_with_grid(4000.0, 3000.0, choice, PuzzleRules::default(), 8).unwrap();
        puzzle.scatter(2);
        puzzle.solve().unwrap();
        assert!(puzzle.is_complete());
        let outcome = puzzle.detach_piece(615).unwrap();
        assert!(outcome.changed());
        assert_eq!(puzzle.progress().groups, 2);
        assert!(puzzle.invalid_groups().is_empty());
    }

    #[test]
    fn cascade_pulls_in_touching_groups() {
        let mut puzzle = puzzle(2, 2);
        puzzle.merge_groups(0, 1).unwrap();
        let solved = puzzle.position(3).unwrap();
        puzzle.set_piece_position(3, solved + Point::new(2.0, 2.0)).unwrap();
        let snap = puzzle.find_candidate(3, 1.0).unwrap();
        let outcome = puzzle.commit_match(&snap).unwrap();
        assert!(outcome.connections.len() >= 2);
        assert!(puzzle.is_complete());
    }

    #[test]
    fn group_candidate_ignores_interior_members() {
        let mut puzzle = puzzle(3, 3);
        puzzle.solve().unwrap();
        let group = puzzle.group_of(4).unwrap();
        let border = puzzle.border_pieces(group);
        assert_eq!(border, vec![0, 1, 2, 3, 5, 6, 7, 8]);
        assert!(puzzle.find_group_candidate(4, 1.0).is_none());
    }

    #[test]
    fn rotating_pair_keeps_them_neighbors() {
        let mut puzzle = puzzle(2, 2);
        puzzle.merge_groups(0, 1).unwrap();
        let group = puzzle.group_of(0).unwrap();
        puzzle.rotate_group(group, 90.0, 0).unwrap();
        assert_eq!(puzzle.piece(1).unwrap().rotation, 90.0);
        assert!(puzzle.invalid_groups().is_empty());
        let east = puzzle.world(0).unwrap().side_sequence(Side::East);
        let west = puzzle.world(1).unwrap().side_sequence(Side::West);
        assert!(east[0].distance(west[2]) < 1e-2);
    }

    #[test]
    fn refused_merge_rolls_back_fine_placement() {
        let mut puzzle = puzzle(2, 2);
        let before = puzzle.position(0).unwrap();
        let fake = SnapMatch {
            moving: 0,
            candidate: 3,
            moving_side: Side::East,
            candidate_side: Side::West,
            reversed: true,
            corner_map: matcher::corner_mapping(Side::East, Side::West, true),
            moving_anchor: Point::ZERO,
            candidate_anchor: Point::new(500.0, 500.0),
            score: 0.0,
        };
        let err = puzzle.commit_match(&fake).unwrap_err();
        assert!(matches!(err, GroupError::ConnectivityViolation { .. }));
        assert!(puzzle.position(0).unwrap().distance(before) < 1e-3);
        assert_eq!(puzzle.progress().groups, 4);
    }
}
