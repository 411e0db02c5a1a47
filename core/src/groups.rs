//! Partition of pieces into connected groups.
//!
//! Pieces and groups live in index tables and refer to each other by id only. Every group
//! with more than one member is a single connected component under a [`NeighborRelation`];
//! mutations that would break that are refused without touching anything.

use std::cell::OnceCell;
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};

use tracing::{debug, warn};

use crate::error::GroupError;
use crate::piece::{Piece, PieceId, Side};
use crate::point::{normalize_angle, Point};
use crate::positions::PositionStore;
use crate::transform::WorldData;

pub type GroupId = u32;

pub trait NeighborRelation {
    fn are_neighbors(&self, a: PieceId, b: PieceId) -> bool;

    /// Superset of the neighbors of `a`, or `None` when any piece may be one.
    fn candidates(&self, _a: PieceId) -> Option<Vec<PieceId>> {
        None
    }
}

/// Two pieces are neighbors when, for some side, both corners of that side coincide with
/// the corners of the other piece's opposite side within `tolerance` world units.
pub struct GeometricNeighbors<'a> {
    worlds: Vec<&'a WorldData>,
    tolerance_sq: f32,
    cell: f32,
    corner_cells: OnceCell<HashMap<(i32, i32), Vec<PieceId>>>,
}

impl<'a> GeometricNeighbors<'a> {
    pub fn new(worlds: Vec<&'a WorldData>, tolerance: f32) -> Self {
        let cell = if tolerance.is_finite() {
            tolerance.max(1.0)
        } else {
            f32::INFINITY
        };
        Self {
            worlds,
            tolerance_sq: tolerance * tolerance,
            cell,
            corner_cells: OnceCell::new(),
        }
    }

    fn cell_of(&self, p: Point) -> (i32, i32) {
        ((p.x / self.cell).floor() as i32, (p.y / self.cell).floor() as i32)
    }

    fn corner_cells(&self) -> &HashMap<(i32, i32), Vec<PieceId>> {
        self.corner_cells.get_or_init(|| {
            let mut cells: HashMap<(i32, i32), Vec<PieceId>> = HashMap::new();
            for (id, world) in self.worlds.iter().enumerate() {
                for corner in world.corners.iter() {
                    cells.entry(self.cell_of(corner)).or_default().push(id);
                }
            }
            cells
        })
    }
}

pub fn sides_touch(a: &WorldData, b: &WorldData, tolerance_sq: f32) -> bool {
    Side::ALL.into_iter().any(|side| {
        let (a_start, a_end) = side.corner_keys();
        let (b_start, b_end) = side.opposite().corner_keys();
        a.corners.get(a_start).distance_sq(b.corners.get(b_end)) <= tolerance_sq
            && a.corners.get(a_end).distance_sq(b.corners.get(b_start)) <= tolerance_sq
    })
}

impl NeighborRelation for GeometricNeighbors<'_> {
    fn are_neighbors(&self, a: PieceId, b: PieceId) -> bool {
        match (self.worlds.get(a), self.worlds.get(b)) {
            (Some(wa), Some(wb)) => a != b && sides_touch(wa, wb, self.tolerance_sq),
            _ => false,
        }
    }

    fn candidates(&self, a: PieceId) -> Option<Vec<PieceId>> {
        if !self.cell.is_finite() {
            return None;
        }
        let Some(world) = self.worlds.get(a) else {
            return Some(Vec::new());
        };
        let cells = self.corner_cells();
        let mut out = Vec::new();
        for corner in world.corners.iter() {
            let (cx, cy) = self.cell_of(corner);
            for dx in -1..=1 {
                for dy in -1..=1 {
                    let key = (cx.saturating_add(dx), cy.saturating_add(dy));
                    if let Some(ids) = cells.get(&key) {
                        out.extend(ids.iter().copied().filter(|id| *id != a));
                    }
                }
            }
        }
        out.sort_unstable();
        out.dedup();
        Some(out)
    }
}

/// Splits `members` into connected components. Components come out ordered by their
/// smallest member and each is sorted ascending.
pub fn connected_components<R: NeighborRelation + ?Sized>(
    members: &[PieceId],
    relation: &R,
) -> Vec<Vec<PieceId>> {
    let mut sorted = members.to_vec();
    sorted.sort_unstable();
    sorted.dedup();
    let mut visited = vec![false; sorted.len()];
    let mut components = Vec::new();
    for start in 0..sorted.len() {
        if visited[start] {
            continue;
        }
        visited[start] = true;
        let mut component = vec![sorted[start]];
        let mut queue = VecDeque::from([start]);
        while let Some(idx) = queue.pop_front() {
            let nexts: Vec<usize> = match relation.candidates(sorted[idx]) {
                Some(candidates) => candidates
                    .iter()
                    .filter_map(|id| sorted.binary_search(id).ok())
                    .collect(),
                None => (0..sorted.len()).collect(),
            };
            for next in nexts {
                if visited[next] || !relation.are_neighbors(sorted[idx], sorted[next]) {
                    continue;
                }
                visited[next] = true;
                component.push(sorted[next]);
                queue.push_back(next);
            }
        }
        component.sort_unstable();
        components.push(component);
    }
    components
}

pub fn is_connected<R: NeighborRelation + ?Sized>(members: &[PieceId], relation: &R) -> bool {
    members.len() <= 1 || connected_components(members, relation).len() == 1
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MergeOutcome {
    pub kept: GroupId,
    pub absorbed: Option<GroupId>,
    pub size: usize,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DetachOutcome {
    pub original: GroupId,
    /// Group now holding only the detached piece; equals `original` for a singleton.
    pub piece_group: GroupId,
    /// Fresh groups for remainder components that lost the original id.
    pub fragments: Vec<GroupId>,
}

impl DetachOutcome {
    pub fn changed(&self) -> bool {
        self.piece_group != self.original
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GroupManager {
    group_of: Vec<GroupId>,
    groups: BTreeMap<GroupId, Vec<PieceId>>,
    next_id: GroupId,
}

impl GroupManager {
    pub fn new(piece_count: usize) -> Self {
        let group_of: Vec<GroupId> = (0..piece_count as GroupId).collect();
        let groups = group_of.iter().map(|id| (*id, vec![*id as PieceId])).collect();
        Self {
            group_of,
            groups,
            next_id: piece_count as GroupId,
        }
    }

    /// Rebuilds from stored per-piece group ids. Claimed groups that are not connected are
    /// split: the largest component keeps the claimed id, the rest get fresh ids.
    pub fn from_assignments<R: NeighborRelation + ?Sized>(
        assignments: &[GroupId],
        relation: &R,
    ) -> Self {
        let mut claimed: BTreeMap<GroupId, Vec<PieceId>> = BTreeMap::new();
        for (piece, group) in assignments.iter().enumerate() {
            claimed.entry(*group).or_default().push(piece);
        }
        let claimed_ids: BTreeSet<GroupId> = claimed.keys().copied().collect();
        let mut next_id = claimed
            .keys()
            .next_back()
            .map_or(0, |max| max.wrapping_add(1))
            .max(assignments.len() as GroupId);
        let mut manager = Self {
            group_of: assignments.to_vec(),
            groups: BTreeMap::new(),
            next_id: 0,
        };
        let mut repaired = 0usize;
        for (group, members) in claimed {
            let components = connected_components(&members, relation);
            if components.len() > 1 {
                repaired += 1;
            }
            let keep = largest_component(&components);
            for (idx, component) in components.into_iter().enumerate() {
                let id = if idx == keep {
                    group
                } else {
                    let fresh = free_id(next_id, |id| {
                        claimed_ids.contains(&id) || manager.groups.contains_key(&id)
                    });
                    next_id = fresh.wrapping_add(1);
                    fresh
                };
                manager.assign(id, component);
            }
        }
        manager.next_id = next_id;
        if repaired > 0 {
            warn!(repaired, "split disconnected groups while restoring");
        }
        manager
    }

    fn assign(&mut self, group: GroupId, members: Vec<PieceId>) {
        for piece in &members {
            self.group_of[*piece] = group;
        }
        self.groups.insert(group, members);
    }

    fn mint(&mut self) -> GroupId {
        let id = free_id(self.next_id, |id| self.groups.contains_key(&id));
        self.next_id = id.wrapping_add(1);
        id
    }

    pub fn piece_count(&self) -> usize {
        self.group_of.len()
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    pub fn group_of(&self, piece: PieceId) -> Option<GroupId> {
        self.group_of.get(piece).copied()
    }

    pub fn assignments(&self) -> &[GroupId] {
        &self.group_of
    }

    pub fn members(&self, group: GroupId) -> Option<&[PieceId]> {
        self.groups.get(&group).map(Vec::as_slice)
    }

    pub fn members_of_piece(&self, piece: PieceId) -> Option<&[PieceId]> {
        self.members(self.group_of(piece)?)
    }

    pub fn groups(&self) -> impl Iterator<Item = (GroupId, &[PieceId])> {
        self.groups.iter().map(|(id, members)| (*id, members.as_slice()))
    }

    pub fn largest_group_size(&self) -> usize {
        self.groups.values().map(Vec::len).max().unwrap_or(0)
    }

    pub fn same_group(&self, a: PieceId, b: PieceId) -> bool {
        matches!((self.group_of(a), self.group_of(b)), (Some(x), Some(y)) if x == y)
    }

    pub fn merge_groups<R: NeighborRelation + ?Sized>(
        &mut self,
        a: PieceId,
        b: PieceId,
        relation: &R,
    ) -> Result<MergeOutcome, GroupError> {
        let group_a = self.group_of(a).ok_or(GroupError::UnknownPiece(a))?;
        let group_b = self.group_of(b).ok_or(GroupError::UnknownPiece(b))?;
        if group_a == group_b {
            return Ok(MergeOutcome {
                kept: group_a,
                absorbed: None,
                size: self.members(group_a).map_or(0, <[PieceId]>::len),
            });
        }
        let len_a = self.members(group_a).ok_or(GroupError::UnknownGroup(group_a))?.len();
        let len_b = self.members(group_b).ok_or(GroupError::UnknownGroup(group_b))?.len();
        let (kept, absorbed) = if len_a > len_b || (len_a == len_b && group_a < group_b) {
            (group_a, group_b)
        } else {
            (group_b, group_a)
        };
        let mut union: Vec<PieceId> = self.groups[&kept]
            .iter()
            .chain(self.groups[&absorbed].iter())
            .copied()
            .collect();
        union.sort_unstable();
        if !is_connected(&union, relation) {
            debug!(kept, absorbed, "merge refused");
            return Err(GroupError::ConnectivityViolation { kept, absorbed });
        }
        self.groups.remove(&absorbed);
        let size = union.len();
        self.assign(kept, union);
        debug!(kept, absorbed, size, "merged groups");
        Ok(MergeOutcome {
            kept,
            absorbed: Some(absorbed),
            size,
        })
    }

    /// Joins every piece under the id of the current largest group, lowest id on ties.
    /// Refused without changes unless all pieces form one component.
    pub fn merge_all<R: NeighborRelation + ?Sized>(
        &mut self,
        relation: &R,
    ) -> Result<GroupId, GroupError> {
        let Some((kept, kept_member)) = self
            .groups
            .iter()
            .max_by(|a, b| a.1.len().cmp(&b.1.len()).then(b.0.cmp(a.0)))
            .map(|(id, members)| (*id, members.first().copied()))
        else {
            return Err(GroupError::UnknownGroup(0));
        };
        if self.groups.len() == 1 {
            return Ok(kept);
        }
        let all: Vec<PieceId> = (0..self.group_of.len()).collect();
        let components = connected_components(&all, relation);
        if components.len() > 1 {
            let absorbed = components
                .iter()
                .find(|component| kept_member.is_none_or(|m| component.binary_search(&m).is_err()))
                .and_then(|component| component.first())
                .map_or(kept, |piece| self.group_of[*piece]);
            debug!(kept, absorbed, components = components.len(), "merge of all groups refused");
            return Err(GroupError::ConnectivityViolation { kept, absorbed });
        }
        let absorbed = self.groups.len() - 1;
        self.groups.clear();
        self.assign(kept, all);
        debug!(kept, absorbed, "merged all groups");
        Ok(kept)
    }

    pub fn detach_piece<R: NeighborRelation + ?Sized>(
        &mut self,
        piece: PieceId,
        relation: &R,
    ) -> Result<DetachOutcome, GroupError> {
        let original = self.group_of(piece).ok_or(GroupError::UnknownPiece(piece))?;
        let members = self
            .members(original)
            .ok_or(GroupError::UnknownGroup(original))?;
        if members.len() <= 1 {
            return Ok(DetachOutcome {
                original,
                piece_group: original,
                fragments: Vec::new(),
            });
        }
        let remainder: Vec<PieceId> = members.iter().copied().filter(|id| *id != piece).collect();
        let components = connected_components(&remainder, relation);
        let keep = largest_component(&components);

        let piece_group = self.mint();
        self.assign(piece_group, vec![piece]);
        let mut fragments = Vec::new();
        for (idx, component) in components.into_iter().enumerate() {
            if idx == keep {
                self.assign(original, component);
            } else {
                let id = self.mint();
                self.assign(id, component);
                fragments.push(id);
            }
        }
        debug!(piece, original, piece_group, fragments = fragments.len(), "detached piece");
        Ok(DetachOutcome {
            original,
            piece_group,
            fragments,
        })
    }

    pub fn validate_all<R: NeighborRelation + ?Sized>(&self, relation: &R) -> Vec<GroupId> {
        self.groups
            .iter()
            .filter(|(_, members)| !is_connected(members, relation))
            .map(|(id, _)| *id)
            .collect()
    }

    pub fn translate_group<P: PositionStore + ?Sized>(
        &self,
        group: GroupId,
        offset: Point,
        positions: &mut P,
    ) -> Result<Vec<PieceId>, GroupError> {
        let members = self.members(group).ok_or(GroupError::UnknownGroup(group))?;
        for id in members {
            let current = positions.position(*id).ok_or(GroupError::UnknownPiece(*id))?;
            positions.set_position(*id, current + offset);
        }
        Ok(members.to_vec())
    }

    /// Rigid rotation: every member orbits the pivot piece's center and spins by the same
    /// angle.
    pub fn rotate_group<P: PositionStore + ?Sized>(
        &self,
        group: GroupId,
        angle_deg: f32,
        pivot_piece: PieceId,
        positions: &mut P,
        pieces: &mut [Piece],
    ) -> Result<Vec<PieceId>, GroupError> {
        let members = self.members(group).ok_or(GroupError::UnknownGroup(group))?;
        let pivot = positions
            .position(pivot_piece)
            .ok_or(GroupError::UnknownPiece(pivot_piece))?;
        for id in members {
            let current = positions.position(*id).ok_or(GroupError::UnknownPiece(*id))?;
            let piece = pieces.get_mut(*id).ok_or(GroupError::UnknownPiece(*id))?;
            positions.set_position(*id, current.rotate_around(pivot, angle_deg));
            piece.rotation = normalize_angle(piece.rotation + angle_deg);
        }
        Ok(members.to_vec())
    }
}

/// First id at or after `from`, wrapping past `GroupId::MAX`, that is not taken. Live ids
/// never outnumber pieces, so one is always free.
fn free_id(from: GroupId, taken: impl Fn(GroupId) -> bool) -> GroupId {
    (from..=GroupId::MAX)
        .chain(0..from)
        .find(|id| !taken(*id))
        .unwrap_or(from)
}

/// Index of the largest component; the earliest (lowest smallest member) wins ties.
fn largest_component(components: &[Vec<PieceId>]) -> usize {
    let mut best = 0;
    for (idx, component) in components.iter().enumerate() {
        if component.len() > components[best].len() {
            best = idx;
        }
    }
    best
}
