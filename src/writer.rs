// src/writer.rs
//! Persistence + dedup. The only component that touches output files.
//!
//! `accept` is serialized behind one mutex: the seen-set check, the JSONL append
//! and the flush happen together, so concurrent callers never interleave lines
//! and a key is marked seen only once its line is on disk.

use anyhow::{anyhow, Context, Result};
use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashSet;
use std::fmt::Debug;
use std::fs::{self, File, OpenOptions};
use std::hash::Hash;
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::model::{BillRecord, ValidatedHost};

/// A record the writer can deduplicate and order.
pub trait Keyed: Serialize + DeserializeOwned + Clone + Send {
    type Key: Eq + Hash + Clone + Debug + Send;
    type SortKey: Ord;

    /// `None` means the record cannot be keyed and is dropped.
    fn dedup_key(&self) -> Option<Self::Key>;
    /// Order used by `finalize`.
    fn sort_key(&self) -> Self::SortKey;
    /// Short label for logs.
    fn describe(&self) -> String;
}

impl Keyed for ValidatedHost {
    type Key = String;
    type SortKey = (String, String, String);

    fn dedup_key(&self) -> Option<String> {
        let url = self.sapl_url.trim();
        (!url.is_empty()).then(|| url.to_string())
    }

    fn sort_key(&self) -> Self::SortKey {
        (self.uf.clone(), self.municipio.clone(), self.sapl_url.clone())
    }

    fn describe(&self) -> String {
        format!("{} ({}/{})", self.sapl_url, self.municipio, self.uf)
    }
}

impl Keyed for BillRecord {
    type Key = (String, i64);
    type SortKey = (String, i64);

    fn dedup_key(&self) -> Option<(String, i64)> {
        let base = self.sapl_base.trim();
        (!base.is_empty()).then(|| (base.to_string(), self.materia_id))
    }

    fn sort_key(&self) -> Self::SortKey {
        (self.sapl_base.clone(), self.materia_id)
    }

    fn describe(&self) -> String {
        format!(
            "{}/{} {}-{}",
            self.municipio.trim(),
            self.uf,
            self.numero.map(|n| n.to_string()).unwrap_or_default(),
            self.ano.map(|a| a.to_string()).unwrap_or_default()
        )
    }
}

/// Where produced records go. Implemented by `DedupWriter`; tests may collect in memory.
pub trait RecordSink<R>: Send + Sync {
    /// `Ok(true)` if the record was new and persisted.
    fn accept(&self, record: R) -> Result<bool>;
}

struct Inner<R: Keyed> {
    seen: HashSet<R::Key>,
    rows: Vec<R>,
    out: File,
    count: u64,
}

pub struct DedupWriter<R: Keyed> {
    path: PathBuf,
    inner: Mutex<Inner<R>>,
}

impl<R: Keyed> DedupWriter<R> {
    /// Start a fresh log at `path` (truncating any previous file).
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        ensure_parent(&path)?;
        let out = File::create(&path).with_context(|| format!("creating {}", path.display()))?;
        Ok(Self::from_parts(path, out, HashSet::new(), Vec::new()))
    }

    /// Continue an existing log: previous lines seed the seen-set and the
    /// aggregate, new lines are appended. Malformed lines are skipped.
    pub fn resume(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            return Self::create(&path);
        }

        let mut seen = HashSet::new();
        let mut rows = Vec::new();
        let mut skipped = 0usize;
        let file = File::open(&path).with_context(|| format!("opening {}", path.display()))?;
        for line in BufReader::new(file).lines() {
            let line = line.with_context(|| format!("reading {}", path.display()))?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<R>(&line) {
                Ok(rec) => {
                    if let Some(k) = rec.dedup_key() {
                        if seen.insert(k) {
                            rows.push(rec);
                        }
                    }
                }
                Err(_) => skipped += 1,
            }
        }
        tracing::info!(
            path = %path.display(),
            restored = rows.len(),
            skipped,
            "resuming append-only log"
        );

        let mut out = OpenOptions::new()
            .read(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("opening {} for append", path.display()))?;
        if !ends_with_newline(&mut out)? {
            out.write_all(b"\n")
                .with_context(|| format!("terminating last line of {}", path.display()))?;
        }
        Ok(Self::from_parts(path, out, seen, rows))
    }

    fn from_parts(path: PathBuf, out: File, seen: HashSet<R::Key>, rows: Vec<R>) -> Self {
        let count = rows.len() as u64;
        Self {
            path,
            inner: Mutex::new(Inner {
                seen,
                rows,
                out,
                count,
            }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Records persisted so far (restored ones included).
    pub fn count(&self) -> u64 {
        self.inner.lock().map(|g| g.count).unwrap_or(0)
    }

    /// Dedup, append one JSON line, flush. `Ok(false)` for duplicates and unkeyable records.
    pub fn accept(&self, record: R) -> Result<bool> {
        let Some(key) = record.dedup_key() else {
            tracing::debug!(record = %record.describe(), "record without dedup key dropped");
            return Ok(false);
        };
        let mut line = serde_json::to_string(&record).context("serializing record")?;
        line.push('\n');

        let mut g = self
            .inner
            .lock()
            .map_err(|_| anyhow!("writer mutex poisoned"))?;
        if g.seen.contains(&key) {
            metrics::counter!("harvest_dedup_dropped_total").increment(1);
            return Ok(false);
        }
        g.out
            .write_all(line.as_bytes())
            .and_then(|_| g.out.flush())
            .with_context(|| format!("appending to {}", self.path.display()))?;
        g.seen.insert(key);
        g.count += 1;
        let count = g.count;
        let label = record.describe();
        g.rows.push(record);
        drop(g);

        tracing::info!(count, record = %label, "record saved");
        Ok(true)
    }

    /// Sorted copy of everything accepted so far.
    pub fn snapshot(&self) -> Vec<R> {
        let mut rows = self
            .inner
            .lock()
            .map(|g| g.rows.clone())
            .unwrap_or_default();
        rows.sort_by_key(|r| r.sort_key());
        rows
    }

    /// Write the sorted aggregate as one pretty JSON array (tmp file + rename).
    /// Independent of the append-only log.
    pub fn finalize(&self, out: impl AsRef<Path>) -> Result<usize> {
        let out = out.as_ref();
        let rows = self.snapshot();
        ensure_parent(out)?;
        let tmp = out.with_extension("json.tmp");
        let json = serde_json::to_vec_pretty(&rows).context("serializing snapshot")?;
        fs::write(&tmp, json).with_context(|| format!("writing {}", tmp.display()))?;
        fs::rename(&tmp, out).with_context(|| format!("renaming to {}", out.display()))?;
        tracing::info!(path = %out.display(), records = rows.len(), "snapshot written");
        Ok(rows.len())
    }
}

impl<R: Keyed> RecordSink<R> for DedupWriter<R> {
    fn accept(&self, record: R) -> Result<bool> {
        DedupWriter::accept(self, record)
    }
}

impl<R, S: RecordSink<R> + ?Sized> RecordSink<R> for std::sync::Arc<S> {
    fn accept(&self, record: R) -> Result<bool> {
        (**self).accept(record)
    }
}

/// True for empty files too.
fn ends_with_newline(f: &mut File) -> Result<bool> {
    let len = f.metadata().context("reading log metadata")?.len();
    if len == 0 {
        return Ok(true);
    }
    let mut last = [0u8; 1];
    f.seek(SeekFrom::Start(len - 1)).context("seeking log")?;
    f.read_exact(&mut last).context("reading log tail")?;
    Ok(last[0] == b'\n')
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() {
            fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
        }
    }
    Ok(())
}
