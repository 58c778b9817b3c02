//! Shared fixtures for unit tests.

use std::io::Read;
use std::time::Duration;

use bytes::Bytes;
use futures::future::ready;
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};

use raft_chunking_core::{Applied, ApplyError, ChunkInfo, Configuration, LogEntry};

use crate::encoder::chunking_apply_reader;
use crate::state_machine::{BatchingStateMachine, ConfigurationStore, StateMachine};

/// Records everything it is given. Responds with the number of entries
/// applied so far, like a log length.
#[derive(Debug, Default)]
pub(crate) struct MockMachine {
    pub entries: Vec<LogEntry>,
    pub commands: Vec<Bytes>,
    /// Size of every `apply_batch` call, in order.
    pub batches: Vec<usize>,
    pub configurations: Vec<(u64, Configuration)>,
}

impl MockMachine {
    /// Every command's data, concatenated in apply order.
    pub fn joined(&self) -> Vec<u8> {
        self.commands.iter().flat_map(|c| c.iter().copied()).collect()
    }
}

impl StateMachine for MockMachine {
    type Response = usize;
    type Snapshot = Vec<u8>;

    fn apply(&mut self, entry: &LogEntry) -> usize {
        self.entries.push(entry.clone());
        self.commands.push(entry.data.clone());
        self.commands.len()
    }

    fn snapshot(&self) -> anyhow::Result<Vec<u8>> {
        let hexed: Vec<String> = self.commands.iter().map(hex::encode).collect();
        Ok(serde_json::to_vec(&hexed)?)
    }

    fn restore(&mut self, source: &mut dyn Read) -> anyhow::Result<()> {
        let hexed: Vec<String> = serde_json::from_reader(source)?;
        self.commands = hexed
            .iter()
            .map(|h| hex::decode(h).map(Bytes::from))
            .collect::<Result<_, _>>()?;
        self.entries.clear();
        Ok(())
    }
}

impl BatchingStateMachine for MockMachine {
    fn apply_batch(&mut self, entries: &[LogEntry]) -> Vec<usize> {
        self.batches.push(entries.len());
        entries.iter().map(|e| self.apply(e)).collect()
    }
}

impl ConfigurationStore for MockMachine {
    fn store_configuration(&mut self, index: u64, configuration: Configuration) {
        self.configurations.push((index, configuration));
    }
}

pub(crate) fn random_bytes(len: usize, seed: u64) -> Vec<u8> {
    let mut data = vec![0u8; len];
    StdRng::seed_from_u64(seed).fill_bytes(&mut data);
    data
}

/// Chunk `data` the way a client would and capture the entries, numbered
/// from index 1 in term 1.
pub(crate) fn tag(data: &[u8], max_chunk_size: usize, extensions: &[u8]) -> Vec<LogEntry> {
    let mut entries = Vec::new();
    let _ = chunking_apply_reader(
        data,
        Some(Bytes::copy_from_slice(extensions)),
        Duration::from_secs(1),
        max_chunk_size,
        |entry, _| {
            let index = entries.len() as u64 + 1;
            entries.push(entry.at(index, 1));
            ready(Ok::<_, ApplyError>(Applied { index, response: () }))
        },
    );
    entries
}

/// Random command of `len` bytes plus its chunk entries.
pub(crate) fn chunk_entries(len: usize, max_chunk_size: usize, seed: u64) -> (Vec<u8>, Vec<LogEntry>) {
    let data = random_bytes(len, seed);
    let entries = tag(&data, max_chunk_size, b"");
    (data, entries)
}

/// Re-encode an entry's chunk info after `edit`.
pub(crate) fn rewrite_info(mut entry: LogEntry, edit: impl FnOnce(&mut ChunkInfo)) -> LogEntry {
    let mut info = entry
        .chunk_info()
        .expect("entry is not a chunk")
        .expect("chunk info decodes");
    edit(&mut info);
    entry.extensions = info.encode().expect("chunk info encodes");
    entry
}
