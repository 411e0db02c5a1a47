use rkyv::api::high::{HighDeserializer, HighSerializer, HighValidator};
use rkyv::bytecheck::CheckBytes;
use rkyv::rancor::Error;
use rkyv::ser::allocator::ArenaHandle;
use rkyv::util::AlignedVec;
use rkyv::{Archive, Deserialize, Serialize};

use crate::error::SnapshotError;
use crate::snapshot::{PuzzleSnapshot, PUZZLE_SNAPSHOT_VERSION};

pub fn encode<T>(value: &T) -> Result<Vec<u8>, SnapshotError>
where
    T: for<'a> Serialize<HighSerializer<AlignedVec, ArenaHandle<'a>, Error>>,
{
    rkyv::to_bytes::<Error>(value)
        .map(|bytes| bytes.into_vec())
        .map_err(|err| SnapshotError::Encode(err.to_string()))
}

pub fn decode<T>(bytes: &[u8]) -> Result<T, SnapshotError>
where
    T: Archive,
    T::Archived:
        for<'a> CheckBytes<HighValidator<'a, Error>> + Deserialize<T, HighDeserializer<Error>>,
{
    // archived data must be aligned; copying into an AlignedVec covers borrowed input
    let mut aligned = AlignedVec::<16>::with_capacity(bytes.len());
    aligned.extend_from_slice(bytes);
    rkyv::from_bytes::<T, Error>(&aligned).map_err(|err| SnapshotError::Decode(err.to_string()))
}

fn check_version(snapshot: PuzzleSnapshot) -> Result<PuzzleSnapshot, SnapshotError> {
    if snapshot.version != PUZZLE_SNAPSHOT_VERSION {
        return Err(SnapshotError::Version {
            expected: PUZZLE_SNAPSHOT_VERSION,
            found: snapshot.version,
        });
    }
    Ok(snapshot)
}

pub fn encode_snapshot(snapshot: &PuzzleSnapshot) -> Result<Vec<u8>, SnapshotError> {
    encode(snapshot)
}

pub fn decode_snapshot(bytes: &[u8]) -> Result<PuzzleSnapshot, SnapshotError> {
    check_version(decode(bytes)?)
}

pub fn snapshot_to_json(snapshot: &PuzzleSnapshot) -> Result<String, SnapshotError> {
    Ok(serde_json::to_string_pretty(snapshot)?)
}

pub fn snapshot_from_json(raw: &str) -> Result<PuzzleSnapshot, SnapshotError> {
    check_version(serde_json::from_str(raw)?)
}
