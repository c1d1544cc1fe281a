//! # Node Bootstrap
//!
//! Builds the [`AppState`] from an [`AppConfig`]:
//!
//! 1. **Signing key.** From `SPN_SIGNING_KEY`, or an ephemeral one (dev).
//! 2. **Policy table.** Built-in defaults merged with `SPN_POLICY_FILE`.
//! 3. **Chain.** In-memory chain seeded from `SPN_CHAIN_FIXTURE`.
//! 4. **Piece store.** Filesystem under `SPN_PIECE_DIR`, else in-memory.
//! 5. **Ingest.** Fixture objects that carry a payload are uploaded.
//! 6. **Banner.** Log the node identity.

use std::path::Path;
use std::sync::Arc;

use spn_core::SpError;
use spn_crypto::{Ed25519KeyPair, NodeIdentity};
use spn_protocol::{
    ChainFixture, Consensus, FsPieceStore, LocalExecutor, MemoryAuthorizer, MemoryChain,
    MemoryIntegrityStore, MemoryPieceStore, PieceStore,
};
use spn_task::{ObjectTask, PolicyError, PolicyTable, Task, TaskPayload};

use crate::config::AppConfig;
use crate::state::{AppState, Collaborators};

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    #[error("signing key error: {0}")]
    SigningKey(String),

    #[error("policy file: {0}")]
    Policy(#[from] PolicyError),

    #[error("chain fixture {path}: {reason}")]
    Fixture { path: String, reason: String },

    #[error("piece store: {0}")]
    PieceStore(SpError),

    #[error("ingesting object {object}: {source}")]
    Ingest { object: String, source: SpError },
}

// ---------------------------------------------------------------------------
// Phases
// ---------------------------------------------------------------------------

fn load_identity(config: &AppConfig) -> Result<NodeIdentity, BootstrapError> {
    let keypair = match &config.signing_key_hex {
        Some(hex_seed) => Ed25519KeyPair::from_seed_hex(hex_seed)
            .map_err(|e| BootstrapError::SigningKey(e.to_string()))?,
        None => {
            tracing::warn!("SPN_SIGNING_KEY not set, using an ephemeral signing key");
            Ed25519KeyPair::generate()
        }
    };
    Ok(NodeIdentity::new(keypair, config.endpoint.clone()))
}

async fn load_fixture(path: &Path) -> Result<ChainFixture, BootstrapError> {
    let fixture_err = |reason: String| BootstrapError::Fixture {
        path: path.display().to_string(),
        reason,
    };
    let yaml = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| fixture_err(e.to_string()))?;
    serde_yaml::from_str(&yaml).map_err(|e| fixture_err(e.to_string()))
}

async fn open_piece_store(config: &AppConfig) -> Result<Arc<dyn PieceStore>, BootstrapError> {
    match &config.piece_dir {
        Some(dir) => {
            let store = FsPieceStore::open(dir)
                .await
                .map_err(BootstrapError::PieceStore)?;
            tracing::info!(dir = %store.root().display(), "filesystem piece store");
            Ok(Arc::new(store))
        }
        None => {
            tracing::info!("in-memory piece store");
            Ok(Arc::new(MemoryPieceStore::new()))
        }
    }
}

async fn ingest(
    fixture: &ChainFixture,
    chain: &MemoryChain,
    executor: &LocalExecutor,
    policy: &PolicyTable,
) -> Result<usize, BootstrapError> {
    let mut ingested = 0;
    for object in &fixture.objects {
        let Some(payload) = &object.payload else {
            continue;
        };
        let info = object.info.clone();
        let name = format!("{}/{}", info.bucket_name, info.object_name);
        let ingest_err = |source: SpError| BootstrapError::Ingest {
            object: name.clone(),
            source,
        };
        let storage_params = chain
            .query_storage_params(info.create_at)
            .await
            .map_err(ingest_err)?;
        let task = Task::new(
            TaskPayload::UploadObject(ObjectTask {
                object_info: info,
                storage_params,
            }),
            policy,
        );
        executor
            .upload_object(&task, payload.as_bytes())
            .await
            .map_err(ingest_err)?;
        ingested += 1;
    }
    Ok(ingested)
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub async fn bootstrap(config: &AppConfig) -> Result<AppState, BootstrapError> {
    let identity = load_identity(config)?;

    let policy = match &config.policy_file {
        Some(path) => PolicyTable::from_yaml_file(path)?,
        None => PolicyTable::default(),
    };

    let fixture = match &config.chain_fixture {
        Some(path) => load_fixture(path).await?,
        None => ChainFixture::default(),
    };
    let chain = MemoryChain::from_fixture(&fixture);

    let pieces = open_piece_store(config).await?;
    let executor = LocalExecutor::new(
        identity.clone(),
        Arc::new(chain.clone()),
        pieces,
        Arc::new(MemoryIntegrityStore::new()),
    )
    .with_approval_timeout_height(config.approval_timeout_height)
    .with_session_ttl(config.session_ttl);

    let ingested = ingest(&fixture, &chain, &executor, &policy).await?;

    tracing::info!(
        operator_address = %identity.operator_address(),
        public_key = %identity.public_key().to_hex(),
        endpoint = %identity.endpoint(),
        buckets = fixture.buckets.len(),
        objects = fixture.objects.len(),
        ingested,
        "storage provider bootstrapped"
    );

    let collaborators = Collaborators {
        authorizer: Arc::new(MemoryAuthorizer::allow_all()),
        consensus: Arc::new(chain),
        executor: Arc::new(executor),
    };
    Ok(AppState::new(
        identity,
        collaborators,
        policy,
        config.consensus_timeout,
    ))
}
