use piecework_core::{PieceId, Point};

/// Discrete input the host delivers to the table, one at a time.
#[derive(Clone, Debug, PartialEq)]
pub enum TableAction {
    BeginDrag {
        piece: PieceId,
        pointer: Point,
        /// Pull the piece out of its group before dragging.
        detach: bool,
    },
    DragMove {
        pointer: Point,
    },
    DragEnd {
        pointer: Point,
    },
    DragCancel,
    Tap {
        piece: PieceId,
    },
    SetZoom {
        zoom: f32,
    },
}
