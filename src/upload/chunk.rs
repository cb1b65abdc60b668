//! Splitting a byte source into sequenced chunks and picking the commit
//! point once they are uploaded.

use std::io;

use bytes::Bytes;

use super::source::ByteSource;

/// One fixed-size slice of an upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub seq_num: u64,
    pub byte_offset: u64,
    /// Exclusive
    pub end_byte_offset: u64,
    pub payload: Bytes,
}

impl Chunk {
    pub fn receipt(&self) -> ChunkReceipt {
        ChunkReceipt {
            seq_num: self.seq_num,
            byte_offset: self.byte_offset,
            end_byte_offset: self.end_byte_offset,
        }
    }
}

/// The coordinates of a chunk the server has accepted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChunkReceipt {
    pub seq_num: u64,
    pub byte_offset: u64,
    pub end_byte_offset: u64,
}

/// Picks the receipt to commit with: the one ending furthest into the
/// stream, whatever order the chunks completed in. An upload without
/// chunks commits at `(0, 0)`.
pub fn commit_point(receipts: &[ChunkReceipt]) -> ChunkReceipt {
    receipts
        .iter()
        .copied()
        .max_by_key(|receipt| receipt.end_byte_offset)
        .unwrap_or_default()
}

/// Cuts a [`ByteSource`] into consecutive chunks.
///
/// Reading a chunk and advancing the sequence number and offset happen in
/// one call, so a cursor shared behind a single mutex hands every worker a
/// distinct, contiguous range.
#[derive(Debug)]
pub struct ChunkCursor {
    source: ByteSource,
    chunk_size: usize,
    seq_num: u64,
    offset: u64,
}

impl ChunkCursor {
    pub fn new(source: ByteSource, chunk_size: usize) -> Self {
        Self {
            source,
            chunk_size,
            seq_num: 0,
            offset: 0,
        }
    }

    /// The next chunk, or `None` once the source is exhausted
    pub async fn next_chunk(&mut self) -> io::Result<Option<Chunk>> {
        let payload = self.source.read_chunk(self.chunk_size).await?;
        if payload.is_empty() {
            return Ok(None);
        }

        let chunk = Chunk {
            seq_num: self.seq_num,
            byte_offset: self.offset,
            end_byte_offset: self.offset + payload.len() as u64,
            payload,
        };

        self.seq_num += 1;
        self.offset = chunk.end_byte_offset;

        Ok(Some(chunk))
    }
}
