//! # In-Memory Collaborators
//!
//! Explicit in-memory implementations of every collaborator trait. The
//! development binary runs on them (seeded from a YAML chain fixture) and the
//! test suites use them as doubles.
//!
//! All state sits behind `parking_lot` locks that are never held across an
//! `.await`.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use spn_core::{BucketInfo, ObjectId, ObjectInfo, OperatorAddress, SpError, StorageParams};
use spn_crypto::IntegrityRecord;

use crate::collaborator::{AuthOp, Authorizer, Consensus, IntegrityStore, PieceStore};

// -- Piece store ---------------------------------------------------------------

/// Pieces held in a hash map.
#[derive(Debug, Clone, Default)]
pub struct MemoryPieceStore {
    pieces: Arc<RwLock<HashMap<String, Vec<u8>>>>,
}

impl MemoryPieceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.pieces.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, key: &str) -> bool {
        self.pieces.read().contains_key(key)
    }
}

#[async_trait]
impl PieceStore for MemoryPieceStore {
    async fn put_piece(&self, key: &str, data: Vec<u8>) -> Result<(), SpError> {
        self.pieces.write().insert(key.to_string(), data);
        Ok(())
    }

    async fn get_piece(&self, key: &str) -> Result<Vec<u8>, SpError> {
        self.pieces
            .read()
            .get(key)
            .cloned()
            .ok_or_else(|| SpError::NotFound(format!("piece {key}")))
    }

    async fn delete_piece(&self, key: &str) -> Result<(), SpError> {
        self.pieces.write().remove(key);
        Ok(())
    }
}

// -- Integrity store -----------------------------------------------------------

/// Integrity records held in a hash map.
#[derive(Debug, Clone, Default)]
pub struct MemoryIntegrityStore {
    records: Arc<RwLock<HashMap<(ObjectId, i32), IntegrityRecord>>>,
}

impl MemoryIntegrityStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl IntegrityStore for MemoryIntegrityStore {
    async fn set_integrity(&self, record: IntegrityRecord) -> Result<(), SpError> {
        self.records
            .write()
            .insert((record.object_id, record.redundancy_idx), record);
        Ok(())
    }

    async fn get_integrity(
        &self,
        object_id: ObjectId,
        redundancy_idx: i32,
    ) -> Result<IntegrityRecord, SpError> {
        self.records
            .read()
            .get(&(object_id, redundancy_idx))
            .cloned()
            .ok_or_else(|| {
                SpError::NotFound(format!(
                    "integrity record for object {object_id} redundancy index {redundancy_idx}"
                ))
            })
    }
}

// -- Authorizer ----------------------------------------------------------------

/// Allows everything except explicitly denied `(op, account)` pairs.
#[derive(Debug, Clone, Default)]
pub struct MemoryAuthorizer {
    denied: Arc<RwLock<HashSet<(AuthOp, OperatorAddress)>>>,
}

impl MemoryAuthorizer {
    pub fn allow_all() -> Self {
        Self::default()
    }

    pub fn deny(&self, op: AuthOp, account: OperatorAddress) {
        self.denied.write().insert((op, account));
    }
}

#[async_trait]
impl Authorizer for MemoryAuthorizer {
    async fn verify_authorize(
        &self,
        op: AuthOp,
        account: &OperatorAddress,
        _bucket: &str,
        _object: &str,
    ) -> Result<bool, SpError> {
        Ok(!self.denied.read().contains(&(op, account.clone())))
    }
}

// -- Chain ---------------------------------------------------------------------

/// Storage parameters that take effect at `from_timestamp`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageParamsEntry {
    #[serde(default)]
    pub from_timestamp: i64,
    #[serde(flatten)]
    pub params: StorageParams,
}

/// An object to register on the in-memory chain, optionally with a payload
/// to ingest as if it had been uploaded to this node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectFixture {
    pub info: ObjectInfo,
    #[serde(default)]
    pub payload: Option<String>,
}

/// Seed data for [`MemoryChain`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainFixture {
    #[serde(default)]
    pub height: u64,
    #[serde(default)]
    pub storage_params: Vec<StorageParamsEntry>,
    #[serde(default)]
    pub buckets: Vec<BucketInfo>,
    #[serde(default)]
    pub objects: Vec<ObjectFixture>,
}

#[derive(Debug, Default)]
struct ChainState {
    height: u64,
    height_unavailable: bool,
    unavailable: bool,
    objects: HashMap<ObjectId, ObjectInfo>,
    buckets: HashMap<String, BucketInfo>,
    /// Sorted by `from_timestamp`.
    params: Vec<StorageParamsEntry>,
}

/// Settlement chain held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryChain {
    state: Arc<RwLock<ChainState>>,
}

impl MemoryChain {
    /// Empty chain at height 0 with default storage parameters.
    pub fn new() -> Self {
        let chain = Self::default();
        chain.set_storage_params(i64::MIN, StorageParams::default());
        chain
    }

    /// Chain seeded from a fixture. Falls back to default storage parameters
    /// when the fixture lists none.
    pub fn from_fixture(fixture: &ChainFixture) -> Self {
        let chain = if fixture.storage_params.is_empty() {
            Self::new()
        } else {
            let chain = Self::default();
            for entry in &fixture.storage_params {
                chain.set_storage_params(entry.from_timestamp, entry.params);
            }
            chain
        };
        chain.set_height(fixture.height);
        for bucket in &fixture.buckets {
            chain.insert_bucket(bucket.clone());
        }
        for object in &fixture.objects {
            chain.insert_object(object.info.clone());
        }
        chain
    }

    pub fn set_height(&self, height: u64) {
        self.state.write().height = height;
    }

    /// Make `current_height` fail while leaving other queries working.
    pub fn set_height_unavailable(&self, unavailable: bool) {
        self.state.write().height_unavailable = unavailable;
    }

    /// Make every query fail with `ConsensusUnavailable`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.state.write().unavailable = unavailable;
    }

    pub fn insert_object(&self, info: ObjectInfo) {
        self.state.write().objects.insert(info.id, info);
    }

    pub fn insert_bucket(&self, info: BucketInfo) {
        self.state
            .write()
            .buckets
            .insert(info.bucket_name.clone(), info);
    }

    pub fn set_storage_params(&self, from_timestamp: i64, params: StorageParams) {
        let mut state = self.state.write();
        state.params.retain(|e| e.from_timestamp != from_timestamp);
        state.params.push(StorageParamsEntry {
            from_timestamp,
            params,
        });
        state.params.sort_by_key(|e| e.from_timestamp);
    }

    fn check_available(state: &ChainState) -> Result<(), SpError> {
        if state.unavailable {
            return Err(SpError::ConsensusUnavailable(
                "chain client is unavailable".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl Consensus for MemoryChain {
    async fn query_object_info(&self, id: ObjectId) -> Result<ObjectInfo, SpError> {
        let state = self.state.read();
        Self::check_available(&state)?;
        state
            .objects
            .get(&id)
            .cloned()
            .ok_or_else(|| SpError::NotFound(format!("no such object {id}")))
    }

    async fn query_bucket_info(&self, bucket_name: &str) -> Result<BucketInfo, SpError> {
        let state = self.state.read();
        Self::check_available(&state)?;
        state
            .buckets
            .get(bucket_name)
            .cloned()
            .ok_or_else(|| SpError::NotFound(format!("no such bucket {bucket_name}")))
    }

    async fn query_storage_params(&self, timestamp: i64) -> Result<StorageParams, SpError> {
        let state = self.state.read();
        Self::check_available(&state)?;
        state
            .params
            .iter()
            .rev()
            .find(|e| e.from_timestamp <= timestamp)
            .or_else(|| state.params.first())
            .map(|e| e.params)
            .ok_or_else(|| SpError::NotFound("no storage params on chain".to_string()))
    }

    async fn current_height(&self) -> Result<u64, SpError> {
        let state = self.state.read();
        Self::check_available(&state)?;
        if state.height_unavailable {
            return Err(SpError::ConsensusUnavailable(
                "block height query failed".to_string(),
            ));
        }
        Ok(state.height)
    }
}
