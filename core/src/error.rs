use crate::groups::GroupId;
use crate::piece::PieceId;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GenerationError {
    #[error("grid must be at least 2x2, got {cols}x{rows}")]
    GridTooSmall { rows: u32, cols: u32 },
    #[error("invalid image dimensions {width}x{height}")]
    InvalidImage { width: f32, height: f32 },
    #[error("invalid waypoint depth range {min}..{max}")]
    InvalidDepthRange { min: f32, max: f32 },
    #[error("target piece count must be between 1 and {max}")]
    TargetCount { max: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GroupError {
    #[error("merging group {absorbed} into {kept} would leave it disconnected")]
    ConnectivityViolation { kept: GroupId, absorbed: GroupId },
    #[error("unknown piece {0}")]
    UnknownPiece(PieceId),
    #[error("unknown group {0}")]
    UnknownGroup(GroupId),
    #[error("pieces already share group {0}")]
    AlreadyJoined(GroupId),
}

#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("snapshot encode failed: {0}")]
    Encode(String),
    #[error("snapshot decode failed: {0}")]
    Decode(String),
    #[error("snapshot version {found} is not supported (expected {expected})")]
    Version { expected: u32, found: u32 },
    #[error("invalid snapshot: {0}")]
    Invalid(String),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum RulesError {
    #[error("failed to parse rules: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to serialize rules: {0}")]
    Serialize(#[from] toml::ser::Error),
}
