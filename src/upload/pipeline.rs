//! Concurrent chunked uploads into a source.
//!
//! The server negotiates the chunk size and the number of parallel
//! uploads. A fixed set of worker tasks then pulls chunks from one shared
//! cursor and posts them independently, retrying transient failures per
//! chunk. Once every chunk is in, the upload is committed at the largest
//! end offset any chunk reported.

use std::sync::Arc;
use std::time::Duration;

use indicatif::ProgressBar;
use reqwest::Method;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::{mpsc, Mutex};

use crate::config::ClientConfig;
use crate::error::{PublishError, PublishResult};
use crate::progress::setup_progress_log;
use crate::request::RequestType;
use crate::resource::model::{BoundOperation, Invocation, Resource};
use crate::transport::Transport;

use super::callback::ChunkCallback;
use super::chunk::{commit_point, Chunk, ChunkCursor, ChunkReceipt};
use super::source::ByteSource;

/// How an upload behaves
#[derive(Debug, Clone)]
pub struct UploadOptions {
    /// Retries per chunk after the first attempt
    pub max_retries: u32,
    /// Base pause; retry `n` waits `n² × backoff`
    pub backoff: Duration,
    /// Draw a terminal progress bar
    pub show_progress: bool,
    /// Called once for every accepted chunk
    pub callbacks: Vec<ChunkCallback>,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self::from(&ClientConfig::new(""))
    }
}

impl From<&ClientConfig> for UploadOptions {
    fn from(config: &ClientConfig) -> Self {
        Self {
            max_retries: config.upload.max_retries,
            backoff: Duration::from_secs(config.upload.backoff_seconds),
            show_progress: false,
            callbacks: Vec::new(),
        }
    }
}

impl UploadOptions {
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    pub fn with_callback(mut self, callback: ChunkCallback) -> Self {
        self.callbacks.push(callback);
        self
    }
}

/// What the server asks of an upload
#[derive(Debug, Clone, Copy, Deserialize)]
struct UploadPreferences {
    preferred_chunk_size: usize,
    preferred_upload_parallelism: usize,
}

#[derive(Debug, Clone, Copy)]
struct RetryPolicy {
    max_retries: u32,
    backoff: Duration,
}

/// Uploads `input` into `source` and returns the refreshed source.
///
/// Uses the source's `initiate`, `chunk` and `commit` operations. The
/// first chunk that fails permanently, or transiently more than
/// `options.max_retries` times, aborts the whole upload and nothing is
/// committed.
///
/// # Arguments
/// * `source` - A source offering the upload operations
/// * `input` - Anything convertible into a [`ByteSource`]
/// * `content_type` - Content type the server should parse the bytes as
/// * `options` - Retry policy, progress and callbacks
pub async fn upload_bytes<'s>(
    source: &'s mut Resource,
    input: impl Into<ByteSource>,
    content_type: &str,
    options: &UploadOptions,
) -> PublishResult<&'s mut Resource> {
    let input = input.into();
    let chunk_op = source.operation("chunk")?.clone();
    source.operation("commit")?;

    let preferences = initiate(source, content_type).await?;
    tracing::info!(
        content_type,
        chunk_size = preferences.preferred_chunk_size,
        parallelism = preferences.preferred_upload_parallelism,
        "Starting upload"
    );

    let pb = if options.show_progress {
        setup_progress_log(input.size_hint(), content_type)
    } else {
        ProgressBar::hidden()
    };

    let receipts = run_workers(
        source.transport(),
        chunk_op,
        ChunkCursor::new(input, preferences.preferred_chunk_size),
        preferences.preferred_upload_parallelism.max(1),
        RetryPolicy {
            max_retries: options.max_retries,
            backoff: options.backoff,
        },
        &options.callbacks,
        &pb,
    )
    .await?;

    pb.finish();

    let point = commit_point(&receipts);
    tracing::info!(
        seq_num = point.seq_num,
        end_byte_offset = point.end_byte_offset,
        chunks = receipts.len(),
        "Committing upload"
    );

    source
        .invoke(
            "commit",
            Invocation::post()
                .param("seq_num", point.seq_num)
                .param("byte_offset", point.end_byte_offset),
        )
        .await?;

    source.show().await
}

async fn initiate(source: &Resource, content_type: &str) -> PublishResult<UploadPreferences> {
    let response = source
        .invoke(
            "initiate",
            Invocation::post().json(&json!({ "content_type": content_type }))?,
        )
        .await?;

    let preferences: UploadPreferences = serde_json::from_value(response)
        .map_err(|e| PublishError::malformed(format!("Invalid upload preferences: {e}")))?;

    if preferences.preferred_chunk_size == 0 {
        return Err(PublishError::malformed("Server asked for zero-sized chunks"));
    }

    Ok(preferences)
}

// Spawns the workers and collects their results. Workers stop on their
// first failure; the collector aborts the rest when it sees one.
async fn run_workers(
    transport: Arc<dyn Transport>,
    chunk_op: BoundOperation,
    cursor: ChunkCursor,
    parallelism: usize,
    policy: RetryPolicy,
    callbacks: &[ChunkCallback],
    pb: &ProgressBar,
) -> PublishResult<Vec<ChunkReceipt>> {
    let cursor = Arc::new(Mutex::new(cursor));
    let (tx, mut rx) = mpsc::channel::<PublishResult<ChunkReceipt>>(parallelism);

    let handles: Vec<_> = (0..parallelism)
        .map(|worker| {
            tokio::spawn(worker_loop(
                worker,
                transport.clone(),
                chunk_op.clone(),
                cursor.clone(),
                policy,
                tx.clone(),
            ))
        })
        .collect();

    // The channel closes once every worker has dropped its sender
    drop(tx);

    let mut receipts = Vec::new();
    while let Some(result) = rx.recv().await {
        match result {
            Ok(receipt) => {
                for callback in callbacks {
                    callback.call(&receipt);
                }
                pb.inc(receipt.end_byte_offset - receipt.byte_offset);
                receipts.push(receipt);
            }
            Err(error) => {
                tracing::error!(%error, "Upload failed, aborting");
                handles.iter().for_each(|handle| handle.abort());
                return Err(error);
            }
        }
    }

    for handle in handles {
        handle
            .await
            .map_err(|e| PublishError::Worker(e.to_string()))?;
    }

    Ok(receipts)
}

async fn worker_loop(
    worker: usize,
    transport: Arc<dyn Transport>,
    chunk_op: BoundOperation,
    cursor: Arc<Mutex<ChunkCursor>>,
    policy: RetryPolicy,
    tx: mpsc::Sender<PublishResult<ChunkReceipt>>,
) {
    loop {
        // Reading and advancing happen under one lock
        let next = cursor.lock().await.next_chunk().await;

        let chunk = match next {
            Ok(Some(chunk)) => chunk,
            Ok(None) => break,
            Err(error) => {
                let _ = tx.send(Err(error.into())).await;
                break;
            }
        };

        tracing::debug!(worker, seq_num = chunk.seq_num, byte_offset = chunk.byte_offset, "Sending chunk");

        let result = send_chunk(transport.as_ref(), &chunk_op, &chunk, policy)
            .await
            .map(|_| chunk.receipt());
        let failed = result.is_err();

        if tx.send(result).await.is_err() || failed {
            break;
        }
    }
}

/// Posts one chunk, retrying transient failures with quadratic backoff
async fn send_chunk(
    transport: &dyn Transport,
    chunk_op: &BoundOperation,
    chunk: &Chunk,
    policy: RetryPolicy,
) -> PublishResult<Value> {
    let uri = chunk_op.expand(&[
        ("seq_num".to_string(), chunk.seq_num.to_string()),
        ("byte_offset".to_string(), chunk.byte_offset.to_string()),
    ]);

    let mut attempt = 0u32;
    loop {
        let payload = RequestType::Bytes {
            payload: chunk.payload.clone(),
        };

        match transport.send(Method::POST, &uri, None, payload).await {
            Ok(response) => return Ok(response),
            Err(error) if error.is_transient() && attempt < policy.max_retries => {
                attempt += 1;
                let pause = policy.backoff * attempt * attempt;
                tracing::warn!(
                    seq_num = chunk.seq_num,
                    attempt,
                    ?pause,
                    %error,
                    "Chunk upload failed, retrying"
                );
                tokio::time::sleep(pause).await;
            }
            Err(error) => return Err(error),
        }
    }
}
