//! # Piece Sizing
//!
//! Prints the segment layout of an object and the size of one piece, the
//! same numbers a challenge or replicate stream is checked against.

use clap::Args;
use serde_json::{json, Value};
use spn_core::{ec_piece_size, segment_count, segment_piece_size};

#[derive(Args, Debug)]
pub struct PieceSizeArgs {
    /// Object payload size in bytes.
    #[arg(long)]
    pub payload_size: u64,
    /// Maximum segment size in bytes.
    #[arg(long, default_value_t = 16 * 1024 * 1024)]
    pub max_segment_size: u64,
    /// Erasure-coding data chunks per segment.
    #[arg(long, default_value_t = 4)]
    pub data_chunks: u32,
    /// Segment index.
    #[arg(long, default_value_t = 0)]
    pub segment: u32,
    /// Redundancy index. Negative selects the whole segment.
    #[arg(long, default_value_t = -1, allow_negative_numbers = true)]
    pub redundancy: i32,
    /// The object is fully replicated rather than erasure coded.
    #[arg(long)]
    pub replica: bool,
}

pub fn run_piece_size(args: &PieceSizeArgs) -> anyhow::Result<Value> {
    anyhow::ensure!(args.max_segment_size > 0, "max segment size must be positive");
    let segments = segment_count(args.payload_size, args.max_segment_size);
    anyhow::ensure!(
        u64::from(args.segment) < segments,
        "segment {} out of range, object has {segments}",
        args.segment
    );

    let segment_size = segment_piece_size(args.payload_size, args.segment, args.max_segment_size);
    let piece_size = if args.redundancy < 0 || args.replica {
        segment_size
    } else {
        ec_piece_size(
            args.payload_size,
            args.segment,
            args.max_segment_size,
            args.data_chunks,
        )?
    };

    Ok(json!({
        "segment_count": segments,
        "segment_size": segment_size,
        "piece_size": piece_size,
    }))
}
