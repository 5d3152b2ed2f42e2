//! Tests for the write-verify-commit pipeline and the retrieval path

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;
use tokio::io::AsyncReadExt;
use tokio::sync::Notify;

use super::*;
use crate::core::error::{IntegrityError, Result, StorageError, VaultError};
use crate::db::migration::MigrationManager;
use crate::db::{create_database_pool, DatabaseConfig, MetadataStore, UpsertOutcome};
use crate::storage::{
    digest_bytes, digest_file, AssetFile, AssetStorage, ContentDigest, LocalAssetStorage,
};

/// Local storage with switchable faults
struct FaultyStorage {
    inner: LocalAssetStorage,
    /// Lose the last byte of every write
    truncate: AtomicBool,
    /// Never finish hashing
    stall_hashing: AtomicBool,
    hashing_started: Notify,
    /// Pause before every rename
    slow_publish: AtomicBool,
    publish_started: Notify,
}

impl FaultyStorage {
    fn new(base_dir: PathBuf) -> Self {
        Self {
            inner: LocalAssetStorage::new(base_dir),
            truncate: AtomicBool::new(false),
            stall_hashing: AtomicBool::new(false),
            hashing_started: Notify::new(),
            slow_publish: AtomicBool::new(false),
            publish_started: Notify::new(),
        }
    }
}

#[async_trait]
impl AssetStorage for FaultyStorage {
    fn base_dir(&self) -> &Path {
        self.inner.base_dir()
    }

    async fn ensure_session_directory(&self, session: &str) -> Result<PathBuf> {
        self.inner.ensure_session_directory(session).await
    }

    async fn write_asset(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        if self.truncate.load(Ordering::SeqCst) && !bytes.is_empty() {
            self.inner.write_asset(path, &bytes[..bytes.len() - 1]).await
        } else {
            self.inner.write_asset(path, bytes).await
        }
    }

    async fn read_asset(&self, path: &Path) -> Result<AssetFile> {
        self.inner.read_asset(path).await
    }

    async fn stat_size(&self, path: &Path) -> Result<u64> {
        self.inner.stat_size(path).await
    }

    async fn hash_asset(&self, path: &Path) -> Result<ContentDigest> {
        if self.stall_hashing.load(Ordering::SeqCst) {
            self.hashing_started.notify_one();
            std::future::pending::<()>().await;
        }
        self.inner.hash_asset(path).await
    }

    async fn publish(&self, staged: &Path, dest: &Path) -> Result<()> {
        if self.slow_publish.load(Ordering::SeqCst) {
            self.publish_started.notify_one();
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        self.inner.publish(staged, dest).await
    }

    async fn set_aside(&self, dest: &Path) -> Result<Option<PathBuf>> {
        self.inner.set_aside(dest).await
    }

    async fn discard(&self, path: &Path) -> Result<()> {
        self.inner.discard(path).await
    }
}

struct Harness {
    pipeline: UploadPipeline,
    reader: AssetReader,
    store: MetadataStore,
    storage: Arc<FaultyStorage>,
    _temp_dir: TempDir,
}

impl Harness {
    fn files_root(&self) -> &Path {
        self.storage.base_dir()
    }

    fn set_truncating(&self, on: bool) {
        self.storage.truncate.store(on, Ordering::SeqCst);
    }

    /// Make every metadata write to `assets` abort
    async fn fail_asset_writes(&self) {
        for event in ["INSERT", "UPDATE"] {
            let sql = format!(
                "CREATE TRIGGER fail_{} BEFORE {} ON assets \
                 BEGIN SELECT RAISE(ABORT, 'injected'); END",
                event.to_lowercase(),
                event
            );
            sqlx::query(&sql).execute(self.store.pool()).await.unwrap();
        }
    }

    async fn allow_asset_writes(&self) {
        for sql in ["DROP TRIGGER fail_insert", "DROP TRIGGER fail_update"] {
            sqlx::query(sql).execute(self.store.pool()).await.unwrap();
        }
    }

    /// Names of every entry in a session directory
    fn session_entries(&self, session: &str) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(self.files_root().join(session))
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        names
    }
}

async fn setup() -> Harness {
    let temp_dir = TempDir::new().unwrap();
    let config = DatabaseConfig::with_path(temp_dir.path().join("meta.db"));
    let pool = create_database_pool(&config).await.unwrap();
    MigrationManager::new(pool.clone())
        .with_embedded_migrations()
        .migrate()
        .await
        .unwrap();

    let store = MetadataStore::new(pool);
    let storage = Arc::new(FaultyStorage::new(temp_dir.path().join("files")));
    let dyn_storage: Arc<dyn AssetStorage> = storage.clone();
    let locks = SessionLocks::new();

    Harness {
        pipeline: UploadPipeline::new(store.clone(), Arc::clone(&dyn_storage), locks),
        reader: AssetReader::new(store.clone(), dyn_storage),
        store,
        storage,
        _temp_dir: temp_dir,
    }
}

async fn read_back(reader: &AssetReader, session: &str, filename: &str) -> (Vec<u8>, String) {
    let mut asset = reader.open(session, filename).await.unwrap();
    let mut content = Vec::new();
    asset.file.file.read_to_end(&mut content).await.unwrap();
    (content, asset.record.mime)
}

#[cfg(test)]
mod upload_tests {
    use super::*;

    #[tokio::test]
    async fn test_first_upload_creates_record() {
        let h = setup().await;

        let receipt = h.pipeline.upload("s1", "tone.wav", Some(b"hello world!")).await.unwrap();

        assert_eq!(receipt.outcome, UpsertOutcome::Created);
        assert_eq!(receipt.asset_key, "tone");
        assert_eq!(receipt.record.updated, 0);
        assert_eq!(receipt.record.size, 12);
        assert_eq!(receipt.record.mime, "audio/wav");
        assert_eq!(receipt.record.hash, digest_bytes(b"hello world!"));
        assert_eq!(PathBuf::from(&receipt.path), h.files_root().join("s1").join("tone.wav"));
    }

    #[tokio::test]
    async fn test_committed_hash_matches_file_on_disk() {
        let h = setup().await;
        let receipt = h.pipeline.upload("s1", "clip.mp3", Some(&[3u8; 4096])).await.unwrap();

        let on_disk = digest_file(Path::new(&receipt.record.path)).await.unwrap();
        assert_eq!(on_disk.hash, receipt.record.hash);
        assert_eq!(on_disk.bytes, receipt.record.size);
    }

    #[tokio::test]
    async fn test_overwrite_increments_only_that_key() {
        let h = setup().await;
        h.pipeline.upload("s1", "tone.wav", Some(b"aaaa")).await.unwrap();
        h.pipeline.upload("s1", "notes.txt", Some(b"bbbb")).await.unwrap();

        let second = h.pipeline.upload("s1", "tone.wav", Some(b"cccccc")).await.unwrap();
        assert_eq!(second.outcome, UpsertOutcome::Overwritten);
        assert_eq!(second.record.updated, 1);

        let third = h.pipeline.upload("s1", "tone.wav", Some(b"dd")).await.unwrap();
        assert_eq!(third.record.updated, 2);

        let doc = h.store.find_by_session("s1").await.unwrap().unwrap();
        assert_eq!(doc.asset("tone").unwrap().updated, 2);
        assert_eq!(doc.asset("tone").unwrap().size, 2);
        assert_eq!(doc.asset("notes").unwrap().updated, 0);
    }

    #[tokio::test]
    async fn test_same_stem_different_extension_collapses() {
        let h = setup().await;
        h.pipeline.upload("s1", "foo.wav", Some(b"wave data")).await.unwrap();
        let receipt = h.pipeline.upload("s1", "foo.txt", Some(b"text")).await.unwrap();

        assert_eq!(receipt.asset_key, "foo");
        assert_eq!(receipt.outcome, UpsertOutcome::Overwritten);
        assert_eq!(receipt.record.updated, 1);
        assert_eq!(receipt.record.mime, "text/plain");

        let doc = h.store.find_by_session("s1").await.unwrap().unwrap();
        assert_eq!(doc.assets.len(), 1);

        // Either filename resolves to the latest bytes
        let (content, mime) = read_back(&h.reader, "s1", "foo.wav").await;
        assert_eq!(content, b"text");
        assert_eq!(mime, "text/plain");

        // The superseded file is no longer on disk
        assert_eq!(h.session_entries("s1"), vec!["foo.txt".to_string()]);
    }

    #[tokio::test]
    async fn test_multi_dot_filename_keys_on_first_segment() {
        let h = setup().await;
        let receipt = h.pipeline.upload("s1", "archive.tar.gz", Some(b"gz")).await.unwrap();
        assert_eq!(receipt.asset_key, "archive");
        assert_eq!(receipt.record.mime, "application/gzip");
    }

    #[tokio::test]
    async fn test_empty_body_is_a_valid_asset() {
        let h = setup().await;
        let receipt = h.pipeline.upload("s1", "empty.bin", Some(b"")).await.unwrap();
        assert_eq!(receipt.record.size, 0);
        assert_eq!(receipt.record.hash, digest_bytes(b""));

        let (content, _) = read_back(&h.reader, "s1", "empty.bin").await;
        assert!(content.is_empty());
    }

    #[tokio::test]
    async fn test_missing_body_is_rejected() {
        let h = setup().await;
        let err = h.pipeline.upload("s1", "tone.wav", None).await.unwrap_err();
        assert!(err.is_client_error());
        assert!(h.store.find_by_session("s1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_invalid_names_are_rejected() {
        let h = setup().await;
        let cases = [
            ("..", "a.wav"),
            ("s1", ".."),
            ("s1", ".hidden"),
            ("", "a.wav"),
            ("s1", "a\\b.wav"),
        ];
        for (session, filename) in cases {
            let err = h.pipeline.upload(session, filename, Some(b"x")).await.unwrap_err();
            assert!(err.is_client_error(), "{:?}/{:?} should be rejected", session, filename);
        }
        assert!(h.store.list_sessions().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_no_staging_files_left_after_success() {
        let h = setup().await;
        h.pipeline.upload("s1", "tone.wav", Some(b"one")).await.unwrap();
        h.pipeline.upload("s1", "tone.wav", Some(b"two")).await.unwrap();
        assert_eq!(h.session_entries("s1"), vec!["tone.wav".to_string()]);
    }

    #[tokio::test]
    async fn test_session_path_that_is_a_file_fails_without_record() {
        let h = setup().await;
        h.storage.inner.init().await.unwrap();
        std::fs::write(h.files_root().join("s1"), b"in the way").unwrap();

        let err = h.pipeline.upload("s1", "tone.wav", Some(b"x")).await.unwrap_err();
        assert!(matches!(err, VaultError::Storage(StorageError::NotADirectory { .. })));
        assert!(h.store.find_by_session("s1").await.unwrap().is_none());
    }
}

#[cfg(test)]
mod integrity_tests {
    use super::*;

    #[tokio::test]
    async fn test_short_write_on_fresh_key_commits_nothing() {
        let h = setup().await;
        h.set_truncating(true);

        let err = h.pipeline.upload("s1", "tone.wav", Some(b"twelve bytes")).await.unwrap_err();
        match err {
            VaultError::Integrity(IntegrityError::SizeMismatch { expected, actual, .. }) => {
                assert_eq!(expected, 12);
                assert_eq!(actual, 11);
            }
            other => panic!("expected size mismatch, got {:?}", other),
        }

        assert!(h.store.find_by_session("s1").await.unwrap().is_none());
        assert!(h.session_entries("s1").is_empty());
    }

    #[tokio::test]
    async fn test_short_write_leaves_prior_record_and_file() {
        let h = setup().await;
        let first = h.pipeline.upload("s1", "tone.wav", Some(b"original")).await.unwrap();

        h.set_truncating(true);
        let err = h.pipeline.upload("s1", "tone.wav", Some(b"replacement")).await.unwrap_err();
        assert!(matches!(err, VaultError::Integrity(_)));

        let record = h.store.find_asset("s1", "tone").await.unwrap().unwrap();
        assert_eq!(record, first.record);

        let (content, _) = read_back(&h.reader, "s1", "tone.wav").await;
        assert_eq!(content, b"original");
        assert_eq!(h.session_entries("s1"), vec!["tone.wav".to_string()]);

        h.set_truncating(false);
        let next = h.pipeline.upload("s1", "tone.wav", Some(b"replacement")).await.unwrap();
        assert_eq!(next.record.updated, 1);
    }
}

#[cfg(test)]
mod rollback_tests {
    use super::*;

    #[tokio::test]
    async fn test_failed_commit_restores_previous_file() {
        let h = setup().await;
        let first = h.pipeline.upload("s1", "tone.wav", Some(b"original")).await.unwrap();

        h.fail_asset_writes().await;
        let err = h.pipeline.upload("s1", "tone.wav", Some(b"replacement!")).await.unwrap_err();
        assert!(!err.is_client_error());

        let record = h.store.find_asset("s1", "tone").await.unwrap().unwrap();
        assert_eq!(record, first.record);
        let on_disk = digest_file(Path::new(&record.path)).await.unwrap();
        assert_eq!(on_disk.hash, record.hash);
        assert_eq!(on_disk.bytes, record.size);

        let (content, _) = read_back(&h.reader, "s1", "tone.wav").await;
        assert_eq!(content, b"original");
        assert_eq!(h.session_entries("s1"), vec!["tone.wav".to_string()]);

        h.allow_asset_writes().await;
        let next = h.pipeline.upload("s1", "tone.wav", Some(b"replacement!")).await.unwrap();
        assert_eq!(next.record.updated, 1);
        assert_eq!(h.session_entries("s1"), vec!["tone.wav".to_string()]);
    }

    #[tokio::test]
    async fn test_failed_commit_on_new_key_leaves_no_file() {
        let h = setup().await;
        h.fail_asset_writes().await;

        h.pipeline.upload("s1", "tone.wav", Some(b"bytes")).await.unwrap_err();

        assert!(h.store.find_by_session("s1").await.unwrap().is_none());
        assert!(h.session_entries("s1").is_empty());
    }

    #[tokio::test]
    async fn test_failed_commit_keeps_superseded_file() {
        let h = setup().await;
        let first = h.pipeline.upload("s1", "foo.wav", Some(b"wave data")).await.unwrap();

        h.fail_asset_writes().await;
        h.pipeline.upload("s1", "foo.txt", Some(b"text")).await.unwrap_err();

        let record = h.store.find_asset("s1", "foo").await.unwrap().unwrap();
        assert_eq!(record, first.record);
        let (content, _) = read_back(&h.reader, "s1", "foo.txt").await;
        assert_eq!(content, b"wave data");
        assert_eq!(h.session_entries("s1"), vec!["foo.wav".to_string()]);
    }

    #[tokio::test]
    async fn test_dropped_upload_removes_staging_file() {
        let h = setup().await;
        h.storage.stall_hashing.store(true, Ordering::SeqCst);

        tokio::select! {
            _ = h.pipeline.upload("s1", "tone.wav", Some(b"abandoned")) => {
                panic!("upload finished while hashing was stalled")
            }
            _ = h.storage.hashing_started.notified() => {}
        }

        assert!(h.session_entries("s1").is_empty());
        assert!(h.store.find_by_session("s1").await.unwrap().is_none());

        // The session lock went with the dropped upload
        h.storage.stall_hashing.store(false, Ordering::SeqCst);
        let receipt = tokio::time::timeout(
            Duration::from_secs(5),
            h.pipeline.upload("s1", "tone.wav", Some(b"next")),
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(receipt.outcome, UpsertOutcome::Created);
        assert_eq!(h.session_entries("s1"), vec!["tone.wav".to_string()]);
    }

    #[tokio::test]
    async fn test_dropped_upload_still_commits_once_publishing() {
        let h = setup().await;
        h.pipeline.upload("s1", "tone.wav", Some(b"original")).await.unwrap();
        h.storage.slow_publish.store(true, Ordering::SeqCst);

        tokio::select! {
            _ = h.pipeline.upload("s1", "tone.wav", Some(b"replacement")) => {
                panic!("upload finished while publishing was paused")
            }
            _ = h.storage.publish_started.notified() => {}
        }

        let mut record = None;
        for _ in 0..100 {
            record = h.store.find_asset("s1", "tone").await.unwrap().filter(|r| r.updated == 1);
            if record.is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        let record = record.expect("detached commit never landed");

        assert_eq!(record.hash, digest_bytes(b"replacement"));
        let on_disk = digest_file(Path::new(&record.path)).await.unwrap();
        assert_eq!(on_disk.hash, record.hash);

        // Backup cleanup runs after the commit; wait for the session lock
        h.pipeline.upload("s1", "other.txt", Some(b"x")).await.unwrap();
        let entries = h.session_entries("s1");
        assert_eq!(entries, vec!["other.txt".to_string(), "tone.wav".to_string()]);
    }
}

#[cfg(test)]
mod retrieval_tests {
    use super::*;

    #[tokio::test]
    async fn test_unknown_session_is_not_found() {
        let h = setup().await;
        let err = h.reader.open("nosuch", "tone.wav").await.unwrap_err();
        assert!(matches!(err, VaultError::SessionNotFound { .. }));
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_unknown_asset_is_not_found() {
        let h = setup().await;
        h.pipeline.upload("s1", "tone.wav", Some(b"x")).await.unwrap();
        let err = h.reader.open("s1", "missing.wav").await.unwrap_err();
        assert!(matches!(err, VaultError::AssetNotFound { .. }));
    }

    #[tokio::test]
    async fn test_deleted_file_is_not_found() {
        let h = setup().await;
        let receipt = h.pipeline.upload("s1", "tone.wav", Some(b"x")).await.unwrap();
        std::fs::remove_file(&receipt.path).unwrap();

        let err = h.reader.open("s1", "tone.wav").await.unwrap_err();
        assert!(matches!(err, VaultError::ContentMissing { .. }));
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_unindexed_file_is_not_served() {
        let h = setup().await;
        h.pipeline.upload("s1", "tone.wav", Some(b"x")).await.unwrap();
        std::fs::write(h.files_root().join("s1").join("stray.bin"), b"stray").unwrap();

        let err = h.reader.open("s1", "stray.bin").await.unwrap_err();
        assert!(matches!(err, VaultError::AssetNotFound { .. }));
    }

    #[tokio::test]
    async fn test_session_document_and_listing() {
        let h = setup().await;
        h.pipeline.upload("b", "one.wav", Some(b"1")).await.unwrap();
        h.pipeline.upload("a", "one.wav", Some(b"1")).await.unwrap();
        h.pipeline.upload("a", "two.txt", Some(b"2")).await.unwrap();

        let doc = h.reader.session_document("a").await.unwrap();
        assert_eq!(doc.session_id, "a");
        assert_eq!(doc.assets.keys().collect::<Vec<_>>(), vec!["one", "two"]);

        let sessions = h.reader.list_sessions().await.unwrap();
        let summary: Vec<(&str, u64)> =
            sessions.iter().map(|s| (s.session.as_str(), s.assets)).collect();
        assert_eq!(summary, vec![("a", 2), ("b", 1)]);
    }
}

#[cfg(test)]
mod concurrency_tests {
    use super::*;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_uploads_to_one_key_count_every_write() {
        let h = setup().await;
        let mut handles = Vec::new();
        for i in 0..10u8 {
            let pipeline = h.pipeline.clone();
            handles.push(tokio::spawn(async move {
                pipeline.upload("s1", "tone.wav", Some(&vec![i; 100 + i as usize])).await
            }));
        }

        let mut created = 0;
        for handle in handles {
            let receipt = handle.await.unwrap().unwrap();
            if receipt.outcome == UpsertOutcome::Created {
                created += 1;
            }
        }
        assert_eq!(created, 1);

        let record = h.store.find_asset("s1", "tone").await.unwrap().unwrap();
        assert_eq!(record.updated, 9);

        // The committed record describes the bytes left on disk
        let on_disk = digest_file(Path::new(&record.path)).await.unwrap();
        assert_eq!(on_disk.hash, record.hash);
        assert_eq!(on_disk.bytes, record.size);
        assert_eq!(h.session_entries("s1"), vec!["tone.wav".to_string()]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_new_sessions_each_get_one_document() {
        let h = setup().await;
        let mut handles = Vec::new();
        for i in 0..6 {
            let pipeline = h.pipeline.clone();
            handles.push(tokio::spawn(async move {
                let session = format!("s{}", i % 3);
                let filename = format!("asset{}.bin", i);
                pipeline.upload(&session, &filename, Some(b"payload")).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let sessions = h.store.list_sessions().await.unwrap();
        assert_eq!(sessions.len(), 3);
        assert!(sessions.iter().all(|s| s.assets == 2));
    }
}

#[cfg(test)]
mod scenario_tests {
    use super::*;

    #[tokio::test]
    async fn test_upload_overwrite_retrieve() {
        let h = setup().await;

        let first = h.pipeline.upload("s1", "tone.wav", Some(&[1u8; 12])).await.unwrap();
        assert_eq!(first.record.updated, 0);
        assert_eq!(first.record.size, 12);

        let second = h.pipeline.upload("s1", "tone.wav", Some(&[2u8; 20])).await.unwrap();
        assert_eq!(second.record.updated, 1);
        assert_eq!(second.record.size, 20);
        assert_ne!(second.record.hash, first.record.hash);

        let (content, mime) = read_back(&h.reader, "s1", "tone.wav").await;
        assert_eq!(content, vec![2u8; 20]);
        assert_eq!(mime, "audio/wav");

        assert!(h.reader.open("s1", "missing.wav").await.unwrap_err().is_not_found());
        assert!(h.reader.open("nosuch", "tone.wav").await.unwrap_err().is_not_found());
    }
}

#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    fn filename_strategy() -> impl Strategy<Value = String> {
        let extensions = vec!["wav", "txt", "png", "json", "bin", "mp3"];
        ("[a-z][a-z0-9_-]{0,11}", prop::sample::select(extensions))
            .prop_map(|(stem, ext)| format!("{}.{}", stem, ext))
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        #[test]
        fn prop_upload_then_read_returns_same_bytes(
            filename in filename_strategy(),
            data in prop::collection::vec(prop::num::u8::ANY, 0..8192)
        ) {
            let rt = tokio::runtime::Runtime::new().unwrap();
            rt.block_on(async {
                let h = setup().await;
                let receipt = h.pipeline.upload("prop", &filename, Some(&data)).await.unwrap();
                let (content, mime) = read_back(&h.reader, "prop", &filename).await;

                assert_eq!(content, data);
                assert_eq!(mime, crate::core::utils::mime_for_filename(&filename));
                assert_eq!(receipt.record.hash, digest_bytes(&data));
            });
        }

        #[test]
        fn prop_updated_tracks_upload_count_per_key(
            uploads in prop::collection::vec(
                (0usize..3, prop::collection::vec(prop::num::u8::ANY, 0..64)),
                1..12,
            )
        ) {
            let rt = tokio::runtime::Runtime::new().unwrap();
            rt.block_on(async {
                let h = setup().await;
                let names = ["alpha.wav", "beta.txt", "gamma.png"];
                let mut counts = [0u64; 3];

                for (idx, data) in &uploads {
                    let receipt = h.pipeline.upload("prop", names[*idx], Some(data)).await.unwrap();
                    assert_eq!(receipt.record.updated, counts[*idx]);
                    counts[*idx] += 1;
                }

                let doc = h.store.find_by_session("prop").await.unwrap().unwrap();
                for (idx, name) in names.iter().enumerate() {
                    let key = crate::core::utils::asset_key(name);
                    match doc.asset(key) {
                        Some(record) => assert_eq!(record.updated + 1, counts[idx]),
                        None => assert_eq!(counts[idx], 0),
                    }
                }
            });
        }
    }
}
