//! Chunked submission.
//!
//! A command larger than the log's entry cap is cut into consecutive slices
//! of at most `max_chunk_size` bytes. Every slice is tagged with the same
//! random op id plus its position, and the final slice also carries the
//! caller's trailing extension. Chunks are handed to the apply primitive in
//! order without waiting for acknowledgements in between.
//!
//! The apply primitive must enqueue the entry when called. The handle it
//! returns only waits for the outcome.

use std::future::Future;
use std::io::Read;
use std::time::Duration;

use bytes::Bytes;
use rand::rngs::OsRng;
use rand::RngCore;

use raft_chunking_core::wire::op_id_hex;
use raft_chunking_core::{
    Applied, ApplyError, ChunkInfo, ChunkingConfig, LogEntry, WireError, SUGGESTED_MAX_DATA_SIZE,
};

use crate::error::SubmitError;
use crate::future::AggregateFuture;

/// Chunk `command` at the suggested entry size and apply every chunk.
///
/// `timeout` applies to each chunk individually, not to the whole command.
/// If `extensions` is given it is delivered alongside the rebuilt command
/// once every chunk has arrived.
pub fn chunking_apply<F, H, R>(
    command: Bytes,
    extensions: Option<Bytes>,
    timeout: Duration,
    apply: F,
) -> AggregateFuture<H>
where
    F: FnMut(LogEntry, Duration) -> H,
    H: Future<Output = Result<Applied<R>, ApplyError>>,
{
    let chunks = split_command(&command, SUGGESTED_MAX_DATA_SIZE);
    submit(chunks, extensions, timeout, apply)
}

/// Like [`chunking_apply`], with chunk size and timeout taken from config.
pub fn chunking_apply_with_config<F, H, R>(
    command: Bytes,
    extensions: Option<Bytes>,
    config: &ChunkingConfig,
    apply: F,
) -> AggregateFuture<H>
where
    F: FnMut(LogEntry, Duration) -> H,
    H: Future<Output = Result<Applied<R>, ApplyError>>,
{
    let chunks = split_command(&command, config.chunk_size());
    submit(chunks, extensions, config.apply_timeout(), apply)
}

/// Read the command from `reader` and submit it in chunks of at most
/// `max_chunk_size` bytes. A read failure submits nothing.
pub fn chunking_apply_reader<Rd, F, H, R>(
    reader: Rd,
    extensions: Option<Bytes>,
    timeout: Duration,
    max_chunk_size: usize,
    apply: F,
) -> AggregateFuture<H>
where
    Rd: Read,
    F: FnMut(LogEntry, Duration) -> H,
    H: Future<Output = Result<Applied<R>, ApplyError>>,
{
    match read_chunks(reader, max_chunk_size) {
        Ok(chunks) => submit(chunks, extensions, timeout, apply),
        Err(e) => {
            tracing::warn!(error = %e, "failed to read command, nothing submitted");
            AggregateFuture::failed(SubmitError::Read(e))
        }
    }
}

/// Split `command` into consecutive slices of at most `max_chunk_size`
/// bytes. The slices share the command's buffer. An empty command yields
/// no chunks.
///
/// The size is clamped to `1..=SUGGESTED_MAX_DATA_SIZE`.
pub fn split_command(command: &Bytes, max_chunk_size: usize) -> Vec<Bytes> {
    let max = effective_chunk_size(max_chunk_size);
    (0..command.len())
        .step_by(max)
        .map(|start| command.slice(start..command.len().min(start + max)))
        .collect()
}

/// Read `reader` to the end in slices of at most `max_chunk_size` bytes,
/// clamped like [`split_command`].
pub fn read_chunks<Rd: Read>(mut reader: Rd, max_chunk_size: usize) -> std::io::Result<Vec<Bytes>> {
    let max = effective_chunk_size(max_chunk_size);
    let mut chunks = Vec::new();
    loop {
        let mut buf = Vec::with_capacity(max);
        let n = (&mut reader).take(max as u64).read_to_end(&mut buf)?;
        if n == 0 {
            return Ok(chunks);
        }
        chunks.push(Bytes::from(buf));
    }
}

/// No chunk may exceed what a single log entry can carry.
fn effective_chunk_size(max_chunk_size: usize) -> usize {
    max_chunk_size.clamp(1, SUGGESTED_MAX_DATA_SIZE)
}

fn submit<F, H, R>(
    chunks: Vec<Bytes>,
    extensions: Option<Bytes>,
    timeout: Duration,
    mut apply: F,
) -> AggregateFuture<H>
where
    F: FnMut(LogEntry, Duration) -> H,
    H: Future<Output = Result<Applied<R>, ApplyError>>,
{
    if chunks.is_empty() {
        tracing::debug!("empty command, nothing to submit");
        return AggregateFuture::empty();
    }

    let op_id = match new_op_id() {
        Ok(id) => id,
        Err(e) => {
            tracing::warn!(error = %e, "failed to generate op ID");
            return AggregateFuture::failed(SubmitError::Random(e));
        }
    };

    // Encode everything up front so a bad chunk never leaves a partial
    // submission behind.
    let entries = match tag_chunks(op_id, chunks, extensions.unwrap_or_default()) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!(op_id = %op_id_hex(op_id), error = %e, "error encoding chunk info");
            return AggregateFuture::failed(SubmitError::Encode(e));
        }
    };

    tracing::debug!(
        op_id = %op_id_hex(op_id),
        chunks = entries.len(),
        bytes = entries.iter().map(|e| e.data.len()).sum::<usize>(),
        timeout_ms = timeout.as_millis() as u64,
        "submitting chunked command"
    );

    let handles = entries
        .into_iter()
        .map(|entry| apply(entry, timeout))
        .collect();
    AggregateFuture::from_handles(handles)
}

/// Attach chunk info to each slice. Only the last one gets `extensions`.
pub(crate) fn tag_chunks(
    op_id: u64,
    chunks: Vec<Bytes>,
    extensions: Bytes,
) -> Result<Vec<LogEntry>, WireError> {
    let total = u32::try_from(chunks.len()).map_err(|_| WireError::TooManyChunks(chunks.len()))?;
    let mut extensions = Some(extensions);

    chunks
        .into_iter()
        .enumerate()
        .map(|(i, data)| -> Result<LogEntry, WireError> {
            let sequence = i as u32;
            let next_extensions = if sequence == total - 1 {
                extensions.take().unwrap_or_default()
            } else {
                Bytes::new()
            };
            let info = ChunkInfo {
                op_id,
                sequence,
                total,
                next_extensions,
            };
            Ok(LogEntry::command(data).with_extensions(info.encode()?))
        })
        .collect()
}

/// Draw a non-zero op id from the OS RNG. Zero is reserved as invalid.
fn new_op_id() -> Result<u64, rand::Error> {
    let mut buf = [0u8; 8];
    loop {
        OsRng.try_fill_bytes(&mut buf)?;
        let id = u64::from_be_bytes(buf);
        if id != 0 {
            return Ok(id);
        }
    }
}
