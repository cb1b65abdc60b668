//! A client for hypermedia-driven data publishing services.
//!
//! Every server response is wrapped into a [`Resource`](resource::model::Resource)
//! whose callable operations come from the links the server returned. On top
//! of that generic layer the crate provides a concurrent chunked upload, a
//! poller for long-running server work, and the revision/source/schema/job
//! workflow of the publishing API.

#![warn(unused_crate_dependencies)]

/// Client functionality for talking to the publishing service
pub mod client;

/// Connection, upload and polling settings
pub mod config;

/// Error types shared by all operations
pub mod error;

/// Progress tracking utilities
pub(crate) mod progress;

/// Types for building request bodies
pub mod request;

/// The seam between resources and the network
pub mod transport;

/// General utility functions
pub mod utils;

/// Waiting on long-running server work
pub mod poll;

/// Opt-in log output
#[cfg(feature = "tracing-basic")]
pub mod logging;

/// The generic hypermedia resource model
pub mod resource {
    pub use kind::{ChildSpec, ResourceKind};
    pub use model::{BoundOperation, Invocation, Resource, Snapshot};

    /// Embedded child materialization
    pub mod children;
    /// Response envelopes and link trees
    pub mod envelope;
    /// Resource kinds and their child declarations
    pub mod kind;
    /// Resources, snapshots and operation dispatch
    pub mod model;
}

/// Concurrent chunked uploads
pub mod upload {
    pub use chunk::{commit_point, ChunkReceipt};
    pub use pipeline::{upload_bytes, UploadOptions};
    pub use source::ByteSource;

    /// Per-chunk completion callbacks
    pub mod callback;
    /// Chunk partitioning of a byte source
    pub mod chunk;
    /// The upload workers and commit
    pub mod pipeline;
    /// Readers, buffers and streams as upload input
    pub mod source;
}

/// The publishing workflow API
pub mod publishing_api {
    /// Named import configs
    pub mod import_config;
    /// Input schemas of a source
    pub mod input_schema;
    /// Jobs started by applying a revision
    pub mod job;
    /// Output schemas and their processing outcome
    pub mod output_schema;
    /// Operations on a single revision
    pub mod revision;
    /// Creating and looking up revisions
    pub mod revisions;
    /// Sources and their uploads
    pub mod source;
}

/// Commonly used types and functions
pub mod prelude {
    pub use crate::upload::callback::ChunkCallback;

    pub use super::client::BaseClient;
    pub use super::config::ClientConfig;
    pub use super::error::{PublishError, PublishResult};
    pub use super::poll::PollOptions;
    pub use super::publishing_api::{
        import_config, input_schema, job, output_schema, revision, revisions, source,
    };
    pub use super::resource::{Invocation, Resource, ResourceKind};
    pub use super::transport::Transport;
    pub use super::upload::{ByteSource, UploadOptions};
}

/// Test utilities
#[cfg(test)]
mod test_utils;
