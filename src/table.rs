//! Gesture handling on top of a [`Puzzle`].
//!
//! Each action runs to completion. Positions are written before any derived data is read,
//! the live highlight is recomputed on every move, and drag end always recomputes its
//! match from the final positions.

use piecework_core::rules::{ZOOM_MAX, ZOOM_MIN};
use piecework_core::{
    CommitOutcome, GenerationError, GroupError, GroupId, PieceId, Point, Puzzle, PuzzleRules,
    PuzzleSnapshot, SnapMatch, SnapshotError,
};
use tracing::{debug, info, warn};

use crate::action::TableAction;
use crate::events::{EventSink, GroupChange, Highlight, TableEvent};

#[derive(Debug, thiserror::Error)]
pub enum TableError {
    #[error(transparent)]
    Generation(#[from] GenerationError),
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
}

#[derive(Clone, Debug)]
struct DragState {
    piece: PieceId,
    group: GroupId,
    start_pointer: Point,
    last_pointer: Point,
    detached: bool,
}

#[derive(Clone, Debug)]
pub struct GameTable {
    puzzle: Puzzle,
    zoom: f32,
    drag: Option<DragState>,
    highlight: Option<Highlight>,
    completed: bool,
}

impl GameTable {
    pub fn new(puzzle: Puzzle) -> Self {
        let completed = puzzle.is_complete();
        Self {
            puzzle,
            zoom: 1.0,
            drag: None,
            highlight: None,
            completed,
        }
    }

    /// Generates and scatters a fresh puzzle.
    pub fn generate(
        image_width: f32,
        image_height: f32,
        target_count: u32,
        rules: PuzzleRules,
        seed: u32,
        sink: &mut impl EventSink,
    ) -> Result<Self, TableError> {
        let mut puzzle = Puzzle::generate(image_width, image_height, target_count, rules, seed)?;
        puzzle.scatter(seed);
        let mut table = Self::new(puzzle);
        table.announce(sink);
        Ok(table)
    }

    pub fn from_snapshot(
        snapshot: PuzzleSnapshot,
        sink: &mut impl EventSink,
    ) -> Result<Self, TableError> {
        let mut table = Self::new(Puzzle::from_snapshot(snapshot)?);
        table.announce(sink);
        Ok(table)
    }

    /// Swaps in another puzzle, dropping any gesture in progress.
    pub fn reset(&mut self, puzzle: Puzzle, sink: &mut impl EventSink) {
        self.completed = puzzle.is_complete();
        self.puzzle = puzzle;
        self.drag = None;
        self.highlight = None;
        self.announce(sink);
    }

    fn announce(&mut self, sink: &mut impl EventSink) {
        let info = *self.puzzle.info();
        sink.emit(TableEvent::PiecesGenerated {
            rows: info.rows,
            cols: info.cols,
            total: self.puzzle.pieces().len(),
        });
    }

    pub fn puzzle(&self) -> &Puzzle {
        &self.puzzle
    }

    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    pub fn highlight(&self) -> Option<Highlight> {
        self.highlight
    }

    pub fn dragging(&self) -> Option<PieceId> {
        self.drag.as_ref().map(|drag| drag.piece)
    }

    pub fn apply(&mut self, action: TableAction, sink: &mut impl EventSink) {
        match action {
            TableAction::BeginDrag {
                piece,
                pointer,
                detach,
            } => self.begin_drag(piece, pointer, detach, sink),
            TableAction::DragMove { pointer } => self.drag_move(pointer, sink),
            TableAction::DragEnd { pointer } => self.drag_end(pointer, sink),
            TableAction::DragCancel => self.cancel_drag(sink),
            TableAction::Tap { piece } => self.tap(piece, sink),
            TableAction::SetZoom { zoom } => self.set_zoom(zoom),
        }
    }

    pub fn set_zoom(&mut self, zoom: f32) {
        if zoom.is_finite() {
            self.zoom = zoom.clamp(ZOOM_MIN, ZOOM_MAX);
        }
    }

    pub fn begin_drag(
        &mut self,
        piece: PieceId,
        pointer: Point,
        detach: bool,
        sink: &mut impl EventSink,
    ) {
        if self.drag.is_some() {
            self.cancel_drag(sink);
        }
        if self.puzzle.group_of(piece).is_none() {
            warn!(piece, "drag started on unknown piece");
            return;
        }
        let mut detached = false;
        if detach {
            match self.puzzle.detach_piece(piece) {
                Ok(outcome) if outcome.changed() => {
                    detached = true;
                    self.completed = false;
                    sink.emit(TableEvent::GroupChanged {
                        piece,
                        change: GroupChange::Detached {
                            original: outcome.original,
                            piece_group: outcome.piece_group,
                            fragments: outcome.fragments,
                        },
                    });
                }
                Ok(_) => {}
                Err(err) => warn!(%err, piece, "detach failed"),
            }
        }
        let Some(group) = self.puzzle.group_of(piece) else {
            return;
        };
        if let Err(err) = self.puzzle.raise_group(group) {
            warn!(%err, group, "raise failed");
        }
        self.drag = Some(DragState {
            piece,
            group,
            start_pointer: pointer,
            last_pointer: pointer,
            detached,
        });
        debug!(piece, group, detached, "drag started");
    }

    /// Moves the dragged group with the pointer. Returns the step applied.
    fn follow_pointer(&mut self, pointer: Point) -> Option<Point> {
        let drag = self.drag.as_mut()?;
        let delta = pointer - drag.last_pointer;
        drag.last_pointer = pointer;
        let group = drag.group;
        if let Err(err) = self.puzzle.translate_group(group, delta) {
            warn!(%err, group, "dragged group vanished");
            self.drag = None;
            return None;
        }
        Some(delta)
    }

    fn current_match(&self, piece: PieceId) -> Option<SnapMatch> {
        self.puzzle.find_group_candidate(piece, self.zoom)
    }

    fn set_highlight(&mut self, highlight: Option<Highlight>, sink: &mut impl EventSink) {
        if self.highlight != highlight {
            self.highlight = highlight;
            sink.emit(TableEvent::HighlightChanged { highlight });
        }
    }

    pub fn drag_move(&mut self, pointer: Point, sink: &mut impl EventSink) {
        let Some(delta) = self.follow_pointer(pointer) else {
            return;
        };
        let Some(drag) = self.drag.clone() else {
            return;
        };
        sink.emit(TableEvent::DragMoved {
            piece: drag.piece,
            delta,
            detached: drag.detached,
        });
        let highlight = self.current_match(drag.piece).as_ref().map(Highlight::from);
        self.set_highlight(highlight, sink);
    }

    pub fn drag_end(&mut self, pointer: Point, sink: &mut impl EventSink) {
        if self.follow_pointer(pointer).is_none() {
            return;
        }
        let Some(drag) = self.drag.take() else {
            return;
        };
        let snap = self.current_match(drag.piece);
        self.set_highlight(None, sink);
        let connected = match snap {
            Some(snap) => self.commit(&snap, sink),
            None => false,
        };
        sink.emit(TableEvent::DragEnded {
            piece: drag.piece,
            delta: pointer - drag.start_pointer,
            detached: drag.detached,
            connected,
        });
        self.check_completion(sink);
    }

    /// Leaves everything where the last move put it and clears the highlight.
    pub fn cancel_drag(&mut self, sink: &mut impl EventSink) {
        let Some(drag) = self.drag.take() else {
            return;
        };
        self.set_highlight(None, sink);
        sink.emit(TableEvent::DragEnded {
            piece: drag.piece,
            delta: drag.last_pointer - drag.start_pointer,
            detached: drag.detached,
            connected: false,
        });
    }

    /// Rotates the tapped piece's group one step around it, then tries to snap.
    pub fn tap(&mut self, piece: PieceId, sink: &mut impl EventSink) {
        if self.drag.is_some() {
            return;
        }
        let rules = *self.puzzle.rules();
        if !rules.rotation_enabled {
            return;
        }
        let Some(group) = self.puzzle.group_of(piece) else {
            warn!(piece, "tap on unknown piece");
            return;
        };
        if let Err(err) = self.puzzle.rotate_group(group, rules.rotation_step_deg, piece) {
            warn!(%err, piece, "rotation failed");
            return;
        }
        if let Some(snap) = self.current_match(piece) {
            self.commit(&snap, sink);
        }
        self.check_completion(sink);
    }

    fn commit(&mut self, snap: &SnapMatch, sink: &mut impl EventSink) -> bool {
        match self.puzzle.commit_match(snap) {
            Ok(outcome) => {
                self.emit_connections(&outcome, sink);
                true
            }
            Err(GroupError::ConnectivityViolation { kept, absorbed }) => {
                warn!(kept, absorbed, "snap refused, groups would not be connected");
                false
            }
            Err(err) => {
                warn!(%err, "snap skipped");
                false
            }
        }
    }

    fn emit_connections(&self, outcome: &CommitOutcome, sink: &mut impl EventSink) {
        for connection in &outcome.connections {
            if let Some(absorbed) = connection.merge.absorbed {
                sink.emit(TableEvent::GroupChanged {
                    piece: connection.moving,
                    change: GroupChange::Merged {
                        kept: connection.merge.kept,
                        absorbed,
                    },
                });
            }
            sink.emit(TableEvent::PiecesConnected {
                moving: connection.moving,
                candidate: connection.candidate,
                group: connection.merge.kept,
            });
        }
    }

    fn check_completion(&mut self, sink: &mut impl EventSink) {
        if self.completed || !self.puzzle.is_complete() {
            return;
        }
        self.completed = true;
        let pieces = self.puzzle.pieces().len();
        info!(pieces, "puzzle complete");
        sink.emit(TableEvent::Completed { pieces });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use piecework_core::GridChoice;

    fn solved_table() -> GameTable {
        let choice = GridChoice {
            target_count: 4,
            cols: 2,
            rows: 2,
            actual_count: 4,
        };
        let puzzle =
            Puzzle::generate_with_grid(200.0, 200.0, choice, PuzzleRules::default(), 3).unwrap();
        GameTable::new(puzzle)
    }

    #[test]
    fn zoom_is_clamped() {
        let mut table = solved_table();
        table.set_zoom(1000.0);
        assert_eq!(table.zoom(), ZOOM_MAX);
        table.set_zoom(f32::NAN);
        assert_eq!(table.zoom(), ZOOM_MAX);
    }

    #[test]
    fn cancel_keeps_last_position() {
        let mut table = solved_table();
        let mut events = Vec::new();
        let start = table.puzzle().position(0).unwrap();
        table.begin_drag(0, Point::new(10.0, 10.0), false, &mut events);
        table.drag_move(Point::new(410.0, 10.0), &mut events);
        table.cancel_drag(&mut events);
        assert_eq!(table.dragging(), None);
        assert!(table.puzzle().position(0).unwrap().distance(start + Point::new(400.0, 0.0)) < 1e-3);
        assert!(matches!(
            events.last(),
            Some(TableEvent::DragEnded { connected: false, .. })
        ));
    }

    #[test]
    fn unknown_piece_is_ignored() {
        let mut table = solved_table();
        let mut events = Vec::new();
        table.begin_drag(99, Point::ZERO, true, &mut events);
        table.tap(99, &mut events);
        assert!(events.is_empty());
        assert_eq!(table.dragging(), None);
    }
}
