// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::{Component, Path, PathBuf};

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use rand::Rng;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

use crate::error::BlobError;
use crate::namespace::Namespace;

/// Outcome of a successful `put`: the logical path other components store
/// on a `Build` row (relative to the store root, namespace-qualified).
#[derive(Debug, Clone)]
pub struct PutOutcome {
    pub path: String,
    pub bytes_written: u64,
}

/// Content-addressed blob store rooted at a single directory (§4.1).
///
/// `source/`, `certs/`, and `results/` are siblings directly under the root,
/// each entry keyed by build id plus an extension. All I/O is streaming:
/// callers hand us a chunk stream, we never buffer the whole payload.
#[derive(Clone)]
pub struct BlobStore {
    root: PathBuf,
}

impl BlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve `namespace/key` under the root, rejecting any path that
    /// would escape it (parent-directory components, absolute escapes).
    fn resolve(&self, namespace: Namespace, key: &str) -> Result<PathBuf, BlobError> {
        let rel = Path::new(namespace.dir_name()).join(key);
        for component in rel.components() {
            match component {
                Component::Normal(_) => {}
                _ => return Err(BlobError::PathEscape),
            }
        }
        let resolved = self.root.join(&rel);
        let canonical_root = self.root.clone();
        if !resolved.starts_with(&canonical_root) {
            return Err(BlobError::PathEscape);
        }
        Ok(resolved)
    }

    /// Logical path stored on a Build/Worker row for a given namespace/key.
    pub fn logical_path(&self, namespace: Namespace, key: &str) -> String {
        format!("{}/{}", namespace.dir_name(), key)
    }

    /// Stream a byte-chunk source to `namespace/key`, enforcing `max_bytes`
    /// as a running counter (not a post-hoc check). Writes to a sibling temp
    /// file and renames into place so concurrent writers never interleave.
    pub async fn put<S, E>(
        &self,
        namespace: Namespace,
        key: &str,
        mut chunks: S,
        max_bytes: Option<u64>,
    ) -> Result<PutOutcome, BlobError>
    where
        S: Stream<Item = Result<Bytes, E>> + Unpin,
        E: std::error::Error + Send + Sync + 'static,
    {
        let dest = self.resolve(namespace, key)?;
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp_path = dest.with_extension(format!("tmp-{}", tmp_suffix()));
        let mut tmp_file = File::create(&tmp_path).await?;

        let mut written: u64 = 0;
        let result: Result<(), BlobError> = async {
            while let Some(chunk) = chunks.next().await {
                let chunk = chunk
                    .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;
                written += chunk.len() as u64;
                if let Some(limit) = max_bytes {
                    if written > limit {
                        return Err(BlobError::TooLarge);
                    }
                }
                tmp_file.write_all(&chunk).await?;
            }
            tmp_file.flush().await?;
            Ok(())
        }
        .await;

        if let Err(err) = result {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(err);
        }

        if let Err(e) = tokio::fs::rename(&tmp_path, &dest).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(e.into());
        }

        Ok(PutOutcome { path: self.logical_path(namespace, key), bytes_written: written })
    }

    /// Read the full contents of `namespace/key`. Callers that need
    /// streaming reads (artifact download) should use [`BlobStore::open`].
    pub async fn get(&self, namespace: Namespace, key: &str) -> Result<Vec<u8>, BlobError> {
        let path = self.resolve(namespace, key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(BlobError::NotFound),
            Err(e) => Err(e.into()),
        }
    }

    /// Open `namespace/key` for streaming read (used by the artifact
    /// download handler so large results are never buffered whole).
    pub async fn open(&self, namespace: Namespace, key: &str) -> Result<File, BlobError> {
        let path = self.resolve(namespace, key)?;
        match File::open(&path).await {
            Ok(f) => Ok(f),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(BlobError::NotFound),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn exists(&self, namespace: Namespace, key: &str) -> Result<bool, BlobError> {
        let path = self.resolve(namespace, key)?;
        Ok(tokio::fs::metadata(&path).await.is_ok())
    }

    pub async fn delete(&self, namespace: Namespace, key: &str) -> Result<(), BlobError> {
        let path = self.resolve(namespace, key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Delete by the logical path stored on a Build/Worker row, e.g.
    /// `"source/bld_abc.zip"`. Used to clean up a partial write on
    /// PayloadTooLarge (§7 invariant i).
    pub async fn delete_logical(&self, logical_path: &str) -> Result<(), BlobError> {
        let (ns, key) = logical_path.split_once('/').ok_or(BlobError::PathEscape)?;
        let namespace = match ns {
            "source" => Namespace::Source,
            "certs" => Namespace::Certs,
            "results" => Namespace::Results,
            _ => return Err(BlobError::PathEscape),
        };
        self.delete(namespace, key).await
    }

    /// Check existence by logical path (used by retry to confirm a parent
    /// build's blobs haven't been garbage-collected).
    pub async fn exists_logical(&self, logical_path: &str) -> Result<bool, BlobError> {
        let (ns, key) = logical_path.split_once('/').ok_or(BlobError::PathEscape)?;
        let namespace = match ns {
            "source" => Namespace::Source,
            "certs" => Namespace::Certs,
            "results" => Namespace::Results,
            _ => return Err(BlobError::PathEscape),
        };
        self.exists(namespace, key).await
    }

    /// Read a blob fully given its logical path (used by cert repackaging,
    /// which needs the whole zip in memory to parse entries).
    pub async fn get_logical(&self, logical_path: &str) -> Result<Vec<u8>, BlobError> {
        let (ns, key) = logical_path.split_once('/').ok_or(BlobError::PathEscape)?;
        let namespace = match ns {
            "source" => Namespace::Source,
            "certs" => Namespace::Certs,
            "results" => Namespace::Results,
            _ => return Err(BlobError::PathEscape),
        };
        self.get(namespace, key).await
    }

    /// Open a blob for streaming read given its logical path (used by the
    /// artifact/source/certs download handlers so large files are never
    /// buffered whole).
    pub async fn open_logical(&self, logical_path: &str) -> Result<File, BlobError> {
        let (ns, key) = logical_path.split_once('/').ok_or(BlobError::PathEscape)?;
        let namespace = match ns {
            "source" => Namespace::Source,
            "certs" => Namespace::Certs,
            "results" => Namespace::Results,
            _ => return Err(BlobError::PathEscape),
        };
        self.open(namespace, key).await
    }
}

fn tmp_suffix() -> String {
    let mut rng = rand::thread_rng();
    let n: u64 = rng.gen();
    format!("{n:016x}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;

    fn chunks(parts: &[&str]) -> impl Stream<Item = Result<Bytes, std::io::Error>> + Unpin {
        stream::iter(parts.iter().map(|p| Ok(Bytes::copy_from_slice(p.as_bytes()))).collect::<Vec<_>>())
    }

    #[tokio::test]
    async fn put_then_get_round_trips_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let store = BlobStore::new(dir.path());
        let outcome = store.put(Namespace::Source, "bld_1.zip", chunks(&["hello", " ", "world"]), None).await.unwrap();
        assert_eq!(outcome.bytes_written, 11);
        let data = store.get(Namespace::Source, "bld_1.zip").await.unwrap();
        assert_eq!(data, b"hello world");
    }

    #[tokio::test]
    async fn get_of_missing_key_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = BlobStore::new(dir.path());
        let err = store.get(Namespace::Source, "nope.zip").await.unwrap_err();
        assert!(matches!(err, BlobError::NotFound));
    }

    #[tokio::test]
    async fn path_traversal_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = BlobStore::new(dir.path());
        let err = store.get(Namespace::Source, "../../etc/passwd").await.unwrap_err();
        assert!(matches!(err, BlobError::PathEscape));
    }

    #[tokio::test]
    async fn put_over_limit_fails_and_leaves_no_partial_blob() {
        let dir = tempfile::tempdir().unwrap();
        let store = BlobStore::new(dir.path());
        let err = store.put(Namespace::Source, "bld_2.zip", chunks(&["0123456789", "more"]), Some(5)).await;
        assert!(err.is_err());
        assert!(!store.exists(Namespace::Source, "bld_2.zip").await.unwrap());
        let mut entries = tokio::fs::read_dir(dir.path().join("source")).await.unwrap();
        assert!(entries.next_entry().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn second_writer_to_same_key_wins_with_a_complete_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = BlobStore::new(dir.path());
        store.put(Namespace::Certs, "bld_3.zip", chunks(&["first"]), None).await.unwrap();
        store.put(Namespace::Certs, "bld_3.zip", chunks(&["second-value"]), None).await.unwrap();
        let data = store.get(Namespace::Certs, "bld_3.zip").await.unwrap();
        assert_eq!(data, b"second-value");
    }

    #[tokio::test]
    async fn exists_logical_reflects_a_prior_put() {
        let dir = tempfile::tempdir().unwrap();
        let store = BlobStore::new(dir.path());
        assert!(!store.exists_logical("source/bld_5.zip").await.unwrap());
        store.put(Namespace::Source, "bld_5.zip", chunks(&["x"]), None).await.unwrap();
        assert!(store.exists_logical("source/bld_5.zip").await.unwrap());
    }

    #[tokio::test]
    async fn delete_logical_removes_the_right_namespace() {
        let dir = tempfile::tempdir().unwrap();
        let store = BlobStore::new(dir.path());
        store.put(Namespace::Results, "bld_4.ipa", chunks(&["binary"]), None).await.unwrap();
        store.delete_logical("results/bld_4.ipa").await.unwrap();
        assert!(!store.exists(Namespace::Results, "bld_4.ipa").await.unwrap());
    }
}
