pub mod codec;
pub mod error;
pub mod grid;
pub mod groups;
pub mod lattice;
pub mod matcher;
pub mod piece;
pub mod point;
pub mod positions;
pub mod puzzle;
pub mod rect;
pub mod rng;
pub mod rules;
pub mod snapshot;
pub mod spatial;
pub mod transform;

pub use codec::{decode_snapshot, encode_snapshot, snapshot_from_json, snapshot_to_json};
pub use error::{GenerationError, GroupError, RulesError, SnapshotError};
pub use grid::{choose_grid, grid_choice_label, GridChoice};
pub use groups::{DetachOutcome, GroupId, GroupManager, MergeOutcome, NeighborRelation};
pub use lattice::{generate_lattice, EdgeOrientation, Lattice, LatticeRequest};
pub use matcher::{MatchTolerance, SnapMatch};
pub use piece::{Corner, EdgeStyle, GridPos, Piece, PieceId, PiecePath, Side};
pub use point::Point;
pub use puzzle::{CommitOutcome, Connection, Progress, Puzzle, PuzzleInfo};
pub use rect::Rect;
pub use rules::{MatchRules, PuzzleRules, ShapeSettings};
pub use snapshot::{PieceRecord, PuzzleSnapshot, PUZZLE_SNAPSHOT_VERSION};
pub use transform::WorldData;
