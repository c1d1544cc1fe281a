//! # Task Keys
//!
//! Rebuilds the key a node logs for a task, so an operator can find every
//! log line of one challenge or replicate stream.

use clap::{Args, Subcommand};
use serde_json::{json, Value};
use spn_core::ObjectId;
use spn_task::key;

#[derive(Args, Debug)]
pub struct TaskKeyArgs {
    #[command(subcommand)]
    pub task: TaskKeyCommand,
}

/// Object coordinates shared by most keys.
#[derive(Args, Debug, Clone)]
pub struct ObjectRef {
    #[arg(long)]
    pub bucket: String,
    #[arg(long)]
    pub object: String,
    #[arg(long)]
    pub id: u64,
}

#[derive(Subcommand, Debug)]
pub enum TaskKeyCommand {
    /// Bucket creation approval.
    CreateBucket {
        #[arg(long)]
        bucket: String,
    },
    /// Object creation approval.
    CreateObject {
        #[arg(long)]
        bucket: String,
        #[arg(long)]
        object: String,
    },
    /// Replicate-piece approval.
    ReplicateApproval(ObjectRef),
    /// Challenge of one piece by a validator.
    Challenge {
        #[command(flatten)]
        object: ObjectRef,
        #[arg(long)]
        segment: u32,
        #[arg(long, allow_negative_numbers = true)]
        redundancy: i32,
        /// Requesting account.
        #[arg(long)]
        user: String,
    },
    /// One piece (or the finalize step) of an inbound replicate stream.
    Receive {
        #[command(flatten)]
        object: ObjectRef,
        #[arg(long)]
        replicate: u32,
        /// Piece index; negative for the finalize step.
        #[arg(long, allow_negative_numbers = true)]
        piece: i32,
    },
    /// Upload of an object payload.
    Upload(ObjectRef),
    /// Outbound replication of an object.
    Replicate(ObjectRef),
    /// Sealing of an object.
    Seal(ObjectRef),
}

pub fn run_task_key(args: &TaskKeyArgs) -> anyhow::Result<Value> {
    let key = match &args.task {
        TaskKeyCommand::CreateBucket { bucket } => key::create_bucket_approval_key(bucket),
        TaskKeyCommand::CreateObject { bucket, object } => {
            key::create_object_approval_key(bucket, object)
        }
        TaskKeyCommand::ReplicateApproval(o) => {
            key::replicate_piece_approval_key(&o.bucket, &o.object, ObjectId(o.id))
        }
        TaskKeyCommand::Challenge {
            object: o,
            segment,
            redundancy,
            user,
        } => key::challenge_piece_key(
            &o.bucket,
            &o.object,
            ObjectId(o.id),
            *segment,
            *redundancy,
            user,
        ),
        TaskKeyCommand::Receive {
            object: o,
            replicate,
            piece,
        } => key::receive_piece_key(&o.bucket, &o.object, ObjectId(o.id), *replicate, *piece),
        TaskKeyCommand::Upload(o) => key::upload_object_key(&o.bucket, &o.object, ObjectId(o.id)),
        TaskKeyCommand::Replicate(o) => {
            key::replicate_piece_key(&o.bucket, &o.object, ObjectId(o.id))
        }
        TaskKeyCommand::Seal(o) => key::seal_object_key(&o.bucket, &o.object, ObjectId(o.id)),
    };
    Ok(json!({ "key": key.as_str() }))
}
