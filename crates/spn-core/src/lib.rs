//! # spn-core: Foundational Types for the Storage-Provider Node
//!
//! Leaf crate of the workspace. Defines the primitives every other crate
//! builds on:
//!
//! 1. **`SpError` / `ErrorKind`.** One closed error hierarchy with stable
//!    codes, HTTP statuses and retryability.
//! 2. **`CanonicalBytes`.** All signed material flows through JCS
//!    canonicalization. No raw `serde_json::to_vec()` for signing input.
//! 3. **Identifier newtypes.** `ObjectId`, `OperatorAddress`, `Checksum`.
//! 4. **Chain descriptors.** Read-only `ObjectInfo`, `BucketInfo`,
//!    `StorageParams`.
//! 5. **Piece addressing.** Segment and EC chunk sizing plus piece-store keys.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `spn-*` crates.
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod canonical;
pub mod chain;
pub mod digest;
pub mod error;
pub mod identity;
pub mod piece;

pub use canonical::CanonicalBytes;
pub use chain::{BucketInfo, ObjectInfo, ObjectStatus, RedundancyType, StorageParams};
pub use digest::{Checksum, CHECKSUM_LEN};
pub use error::{CanonicalizationError, ErrorKind, SpError};
pub use identity::{ObjectId, OperatorAddress};
pub use piece::{
    challenge_piece_key, ec_piece_key, ec_piece_size, segment_count, segment_piece_key,
    segment_piece_size,
};
