//! # Piece Addressing
//!
//! Pure arithmetic mapping `(payload size, segment index, parameters)` to the
//! byte length of a segment or an erasure-coded chunk, plus the piece-store
//! key naming scheme.
//!
//! A payload is split into segments of `max_segment_size` bytes; the last
//! segment holds the remainder. Each segment is erasure-coded into
//! `data_chunk_num` data chunks of equal, rounded-up length. An index past the
//! end of the payload has size `0`.

use crate::error::SpError;
use crate::identity::ObjectId;

/// Number of segments a payload splits into. Zero for an empty payload or a
/// zero segment size.
pub fn segment_count(payload_size: u64, max_segment_size: u64) -> u64 {
    if max_segment_size == 0 {
        return 0;
    }
    payload_size.div_ceil(max_segment_size)
}

/// Byte length of segment `segment_idx`, or `0` when the index is past the
/// end of the payload.
pub fn segment_piece_size(payload_size: u64, segment_idx: u32, max_segment_size: u64) -> u64 {
    let count = segment_count(payload_size, max_segment_size);
    let idx = u64::from(segment_idx);
    if idx >= count {
        0
    } else if idx + 1 == count {
        payload_size - idx * max_segment_size
    } else {
        max_segment_size
    }
}

/// Byte length of one erasure-coded data chunk of segment `segment_idx`.
///
/// # Errors
///
/// `Validation` if `data_chunk_num` is zero.
pub fn ec_piece_size(
    payload_size: u64,
    segment_idx: u32,
    max_segment_size: u64,
    data_chunk_num: u32,
) -> Result<u64, SpError> {
    if data_chunk_num == 0 {
        return Err(SpError::Validation(
            "data chunk count must be at least 1".to_string(),
        ));
    }
    let segment = segment_piece_size(payload_size, segment_idx, max_segment_size);
    Ok(segment.div_ceil(u64::from(data_chunk_num)))
}

/// Piece-store key of a whole segment: `"{object_id}_s{segment_idx}"`.
pub fn segment_piece_key(object_id: ObjectId, segment_idx: u32) -> String {
    format!("{object_id}_s{segment_idx}")
}

/// Piece-store key of an EC chunk or replica stream:
/// `"{object_id}_s{segment_idx}_p{redundancy_idx}"`.
pub fn ec_piece_key(object_id: ObjectId, segment_idx: u32, redundancy_idx: u32) -> String {
    format!("{object_id}_s{segment_idx}_p{redundancy_idx}")
}

/// Key under which a challenge for `redundancy_idx` reads its piece. A
/// negative index selects the segment stream.
pub fn challenge_piece_key(object_id: ObjectId, segment_idx: u32, redundancy_idx: i32) -> String {
    match u32::try_from(redundancy_idx) {
        Ok(ridx) => ec_piece_key(object_id, segment_idx, ridx),
        Err(_) => segment_piece_key(object_id, segment_idx),
    }
}
