//! The worker-side executor: fetch one task's input from the file store,
//! run the user map/reduce function, write intermediates or output back to
//! the store under a temp key, then rename into place. The executor itself
//! is a thin, stateless loop around these two operations — the coordinator
//! is what's subject to rigorous testing (see `coordinator.rs`); this module
//! exists so the crate is runnable end-to-end.

use std::sync::Arc;

use tracing::info;

use super::{error::StoreError, hash::partition, store::FileStore};

pub type MapFn = Arc<dyn Fn(&str) -> Vec<(String, String)> + Send + Sync>;
pub type ReduceFn = Arc<dyn Fn(&str, Vec<String>) -> String + Send + Sync>;

/// One key/value record in an intermediate shard. Self-delimiting via the
/// newline-terminated `<key> <value>` text format used for intermediate
/// shards.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct KeyValue {
    key: String,
    value: String,
}

fn encode_record(kv: &(String, String)) -> String {
    format!("{} {}\n", kv.0, kv.1)
}

fn decode_records(bytes: &[u8]) -> Result<Vec<KeyValue>, StoreError> {
    let text = String::from_utf8_lossy(bytes);
    let mut out = Vec::new();
    for line in text.lines() {
        if line.is_empty() {
            continue;
        }
        let mut parts = line.splitn(2, ' ');
        let (Some(key), Some(value)) = (parts.next(), parts.next()) else {
            return Err(StoreError::Io {
                key: "<intermediate>".to_string(),
                source: std::io::Error::new(std::io::ErrorKind::InvalidData, "malformed record"),
            });
        };
        out.push(KeyValue {
            key: key.to_string(),
            value: value.to_string(),
        });
    }
    Ok(out)
}

/// Executes map and reduce tasks against a [`FileStore`], using the wired
/// application functions.
pub struct Worker {
    store: Arc<dyn FileStore>,
    map_fn: MapFn,
    reduce_fn: ReduceFn,
}

impl Worker {
    pub fn new(store: Arc<dyn FileStore>, map_fn: MapFn, reduce_fn: ReduceFn) -> Self {
        Self {
            store,
            map_fn,
            reduce_fn,
        }
    }

    /// Runs map task `map_id`: reads `input_path` from the store, applies
    /// `map_fn`, partitions the emitted pairs by `hash(key) mod r`, and
    /// publishes `inter/<map_id>/<partition>` for every partition touched.
    pub async fn run_map(&self, map_id: u32, input_path: &str, r: u32) -> Result<(), StoreError> {
        let bytes = self.store.get(input_path).await?;
        let contents = String::from_utf8_lossy(&bytes).into_owned();
        let pairs = (self.map_fn)(&contents);

        let mut buckets: Vec<String> = vec![String::new(); r as usize];
        for pair in &pairs {
            let idx = partition(&pair.0, r) as usize;
            buckets[idx].push_str(&encode_record(pair));
        }

        for (idx, contents) in buckets.into_iter().enumerate() {
            let key = format!("inter/{map_id}/{idx}");
            self.store.put_atomic(&key, contents.into_bytes()).await?;
        }

        info!(map_id, emitted = pairs.len(), "map task executed");
        Ok(())
    }

    /// Runs reduce task `reduce_id`: reads `inter/<m>/<reduce_id>` for every
    /// `m` in `[0, m_count)`, groups by key (sorted, matching the source's
    /// global-sort-at-reduce-time choice), applies `reduce_fn` per group,
    /// and publishes `out/<reduce_id>`.
    pub async fn run_reduce(&self, reduce_id: u32, m_count: u32) -> Result<(), StoreError> {
        let mut all = Vec::new();
        for m in 0..m_count {
            let key = format!("inter/{m}/{reduce_id}");
            match self.store.get(&key).await {
                Ok(bytes) => all.extend(decode_records(&bytes)?),
                Err(StoreError::NotFound(_)) => continue,
                Err(e) => return Err(e),
            }
        }
        all.sort();

        let mut output = String::new();
        let mut i = 0;
        while i < all.len() {
            let key = all[i].key.clone();
            let mut j = i;
            let mut values = Vec::new();
            while j < all.len() && all[j].key == key {
                values.push(all[j].value.clone());
                j += 1;
            }
            let reduced = (self.reduce_fn)(&key, values);
            output.push_str(&format!("{key} {reduced}\n"));
            i = j;
        }

        let distinct_keys = all
            .iter()
            .map(|kv| kv.key.as_str())
            .collect::<std::collections::HashSet<_>>()
            .len();
        self.store
            .put_atomic(&format!("out/{reduce_id}"), output.into_bytes())
            .await?;
        info!(reduce_id, keys = distinct_keys, "reduce task executed");
        Ok(())
    }
}
