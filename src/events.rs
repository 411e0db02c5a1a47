use piecework_core::{GroupId, PieceId, Point, Side, SnapMatch};

#[derive(Clone, Debug, PartialEq)]
pub enum GroupChange {
    Merged {
        kept: GroupId,
        absorbed: GroupId,
    },
    Detached {
        original: GroupId,
        piece_group: GroupId,
        fragments: Vec<GroupId>,
    },
}

/// The match currently offered as live feedback during a drag.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Highlight {
    pub moving: PieceId,
    pub candidate: PieceId,
    pub moving_side: Side,
    pub candidate_side: Side,
}

impl From<&SnapMatch> for Highlight {
    fn from(snap: &SnapMatch) -> Self {
        Self {
            moving: snap.moving,
            candidate: snap.candidate,
            moving_side: snap.moving_side,
            candidate_side: snap.candidate_side,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum TableEvent {
    PiecesGenerated {
        rows: u32,
        cols: u32,
        total: usize,
    },
    GroupChanged {
        piece: PieceId,
        change: GroupChange,
    },
    PiecesConnected {
        moving: PieceId,
        candidate: PieceId,
        group: GroupId,
    },
    HighlightChanged {
        highlight: Option<Highlight>,
    },
    DragMoved {
        piece: PieceId,
        delta: Point,
        detached: bool,
    },
    DragEnded {
        piece: PieceId,
        /// Total pointer travel over the gesture.
        delta: Point,
        detached: bool,
        connected: bool,
    },
    Completed {
        pieces: usize,
    },
}

/// Receives table notifications. Delivery is synchronous, in emission order.
pub trait EventSink {
    fn emit(&mut self, event: TableEvent);
}

impl EventSink for Vec<TableEvent> {
    fn emit(&mut self, event: TableEvent) {
        self.push(event);
    }
}

/// Discards every event.
impl EventSink for () {
    fn emit(&mut self, _event: TableEvent) {}
}
