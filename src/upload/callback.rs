//! Per-chunk notifications for uploads
//!
//! A [`ChunkCallback`] is shared between all upload workers and called once
//! for every chunk the server accepted, in completion order.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use super::chunk::ChunkReceipt;

/// Type alias for a boxed callback function that takes a chunk receipt and is Send
pub type ChunkCallbackInner = Box<dyn FnMut(&ChunkReceipt) + Send>;

/// A thread-safe wrapper around a callback function
///
/// Clones share the same underlying closure.
#[derive(Clone)]
pub struct ChunkCallback {
    inner: Arc<Mutex<ChunkCallbackInner>>,
}

impl fmt::Debug for ChunkCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ChunkCallback")
    }
}

impl ChunkCallback {
    /// Creates a new `ChunkCallback` instance from a boxed callback function.
    pub fn new(f: ChunkCallbackInner) -> Self {
        ChunkCallback {
            inner: Arc::new(Mutex::new(f)),
        }
    }

    /// Calls the inner callback function with the accepted chunk.
    pub fn call(&self, receipt: &ChunkReceipt) {
        let mut f = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f(receipt);
    }

    /// Wraps a closure into a `ChunkCallback` instance.
    pub fn wrap<F>(closure: F) -> Self
    where
        F: FnMut(&ChunkReceipt) + Send + 'static,
    {
        ChunkCallback::new(Box::new(closure))
    }
}
