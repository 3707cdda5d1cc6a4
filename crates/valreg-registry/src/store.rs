//! Package store trait and durable filesystem implementation.
//!
//! The `PackageStore` trait is what the request-handling layer talks to.
//! `LocalStore` keeps one JSON file per record under a root directory:
//!
//! ```text
//! <root>/
//!   packages/
//!     <hex(name)>/
//!       <major>.<minor>.<patch>.json
//!   staging/       in-flight writes, never read
//! ```
//!
//! Package directories are named by the lowercase hex of the name's UTF-8
//! bytes, so any name maps to a distinct component even on case-insensitive
//! filesystems.
//!
//! A record file only ever appears under `packages/` through an atomic
//! no-clobber rename of a complete, synced file. That rename is the
//! uniqueness constraint on the key: concurrent publishers of the same key
//! race on it and all but one observe `AlreadyExists`.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::error::{RegistryError, Result};
use crate::record::{validate_name, PackageKey, PackageRecord};
use crate::version::{parse_version, VersionKey};

const PACKAGES_DIR: &str = "packages";
const STAGING_DIR: &str = "staging";
const RECORD_EXT: &str = "json";

/// Keyed storage of package records.
///
/// Lookups that match nothing return `Ok(None)`.
pub trait PackageStore {
    /// Every stored record. Callers must not depend on the order.
    fn list_all(&self) -> Result<Vec<PackageRecord>>;

    /// The record with the highest version for `name`.
    fn get_latest(&self, name: &str) -> Result<Option<PackageRecord>>;

    /// The record with exactly this key.
    fn get_exact(&self, name: &str, version: VersionKey) -> Result<Option<PackageRecord>>;

    /// Insert a record if its key is absent, failing with
    /// [`RegistryError::Conflict`] otherwise. Nothing is written on failure.
    ///
    /// A [`RegistryError::StorageUnavailable`] can be reported after the
    /// record became visible but before it was confirmed durable. The
    /// outcome is then uncertain: a retry answering `Conflict` means the
    /// record is stored.
    fn publish(&self, record: &PackageRecord) -> Result<()>;

    /// Exact lookup by free-text version, e.g. `"1.2.3"`.
    fn get_exact_str(&self, name: &str, version: &str) -> Result<Option<PackageRecord>> {
        let version = parse_version(version)?;
        self.get_exact(name, version)
    }
}

/// A filesystem-backed package store.
#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    /// Create a store rooted at the given directory. Directories are
    /// created on first publish.
    pub fn new(root: PathBuf) -> Self {
        LocalStore { root }
    }

    /// Get the root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn packages_dir(&self) -> PathBuf {
        self.root.join(PACKAGES_DIR)
    }

    fn staging_dir(&self) -> PathBuf {
        self.root.join(STAGING_DIR)
    }

    fn package_dir(&self, name: &str) -> PathBuf {
        self.packages_dir().join(encode_name(name))
    }

    fn record_path(&self, name: &str, version: VersionKey) -> PathBuf {
        self.package_dir(name).join(format!("{version}.{RECORD_EXT}"))
    }

    /// Committed versions of `name`, unsorted.
    fn versions(&self, name: &str) -> Result<Vec<VersionKey>> {
        let dir = self.package_dir(name);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(RegistryError::storage(&dir, format!("listing versions: {e}")));
            }
        };

        let mut versions = Vec::new();
        for entry in entries {
            let entry =
                entry.map_err(|e| RegistryError::storage(&dir, format!("reading entry: {e}")))?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            match version_from_path(&path) {
                Some(version) => versions.push(version),
                None => warn!(
                    path = %path.display(),
                    "ignoring unrecognised file in package directory"
                ),
            }
        }
        Ok(versions)
    }

    /// Committed package names, sorted.
    fn names(&self) -> Result<Vec<String>> {
        let dir = self.packages_dir();
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(RegistryError::storage(&dir, format!("listing packages: {e}")));
            }
        };

        let mut names = Vec::new();
        for entry in entries {
            let entry =
                entry.map_err(|e| RegistryError::storage(&dir, format!("reading entry: {e}")))?;
            if !entry.path().is_dir() {
                continue;
            }
            match entry.file_name().to_str().and_then(decode_name) {
                Some(name) => names.push(name),
                None => warn!(
                    path = %entry.path().display(),
                    "ignoring unrecognised package directory"
                ),
            }
        }
        names.sort();
        Ok(names)
    }

    fn read_record(&self, name: &str, version: VersionKey) -> Result<Option<PackageRecord>> {
        let path = self.record_path(name, version);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(RegistryError::storage(&path, format!("reading record: {e}")));
            }
        };

        let record: PackageRecord = serde_json::from_slice(&bytes)
            .map_err(|e| RegistryError::storage(&path, format!("decoding record: {e}")))?;

        if record.name != name || record.version() != version {
            return Err(RegistryError::storage(
                &path,
                format!(
                    "file holds '{}' but is stored as '{name}@{version}'",
                    record.key()
                ),
            ));
        }
        Ok(Some(record))
    }

    /// Flush every directory on the path from the record up to the root's
    /// parent, so the new entry and any directories created for it survive
    /// a crash.
    fn sync_commit(&self, package_dir: &Path) -> Result<()> {
        sync_dir(package_dir)?;
        sync_dir(&self.packages_dir())?;
        sync_dir(&self.root)?;
        sync_dir(&parent_or_cwd(&self.root))
    }
}

impl PackageStore for LocalStore {
    fn list_all(&self) -> Result<Vec<PackageRecord>> {
        let mut records = Vec::new();
        for name in self.names()? {
            let mut versions = self.versions(&name)?;
            versions.sort();
            for version in versions {
                if let Some(record) = self.read_record(&name, version)? {
                    records.push(record);
                }
            }
        }
        debug!(count = records.len(), "listed packages");
        Ok(records)
    }

    fn get_latest(&self, name: &str) -> Result<Option<PackageRecord>> {
        if validate_name(name).is_err() {
            debug!(package = name, "lookup with unstorable name");
            return Ok(None);
        }
        match self.versions(name)?.into_iter().max() {
            Some(latest) => {
                debug!(package = name, version = %latest, "resolved latest version");
                self.read_record(name, latest)
            }
            None => Ok(None),
        }
    }

    fn get_exact(&self, name: &str, version: VersionKey) -> Result<Option<PackageRecord>> {
        if validate_name(name).is_err() {
            debug!(package = name, "lookup with unstorable name");
            return Ok(None);
        }
        self.read_record(name, version)
    }

    fn publish(&self, record: &PackageRecord) -> Result<()> {
        record.validate()?;
        let key = record.key();
        let target = self.record_path(&record.name, key.version);

        // Cheap early answer; the no-clobber rename below is authoritative.
        if target.exists() {
            warn!(package = %key, "publish rejected: version already exists");
            return Err(conflict(&key));
        }

        let bytes = serde_json::to_vec_pretty(record).map_err(|e| RegistryError::InvalidRecord {
            detail: format!("encoding record: {e}"),
        })?;

        let package_dir = self.package_dir(&record.name);
        let staging_dir = self.staging_dir();
        create_dir_durable(&package_dir)?;
        create_dir_durable(&staging_dir)?;

        let mut staged = NamedTempFile::new_in(&staging_dir)
            .map_err(|e| RegistryError::storage(&staging_dir, format!("staging record: {e}")))?;
        staged
            .write_all(&bytes)
            .and_then(|()| staged.as_file().sync_all())
            .map_err(|e| RegistryError::storage(staged.path(), format!("writing record: {e}")))?;

        if let Err(e) = staged.persist_noclobber(&target) {
            if e.error.kind() == io::ErrorKind::AlreadyExists {
                warn!(package = %key, "publish lost race: version already exists");
                return Err(conflict(&key));
            }
            return Err(RegistryError::storage(
                &target,
                format!("committing record: {}", e.error),
            ));
        }

        if let Err(e) = self.sync_commit(&package_dir) {
            warn!(
                package = %key,
                error = %e,
                "record is visible but not confirmed durable; publish outcome uncertain"
            );
            return Err(e);
        }
        info!(package = %key, "published package");
        Ok(())
    }
}

fn conflict(key: &PackageKey) -> RegistryError {
    RegistryError::Conflict {
        name: key.name.clone(),
        version: key.version.to_string(),
    }
}

/// Directory component for a package name.
fn encode_name(name: &str) -> String {
    hex::encode(name.as_bytes())
}

/// Inverse of [`encode_name`], accepting only the canonical lowercase form.
fn decode_name(component: &str) -> Option<String> {
    let bytes = hex::decode(component).ok()?;
    let name = String::from_utf8(bytes).ok()?;
    (encode_name(&name) == component && validate_name(&name).is_ok()).then_some(name)
}

/// Parse `<major>.<minor>.<patch>.json`, accepting only canonical names.
fn version_from_path(path: &Path) -> Option<VersionKey> {
    if path.extension()?.to_str()? != RECORD_EXT {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    let version = parse_version(stem).ok()?;
    (version.to_string() == stem).then_some(version)
}

fn parent_or_cwd(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Create `dir` and any missing ancestors, flushing the parent of each
/// directory created here.
fn create_dir_durable(dir: &Path) -> Result<()> {
    let mut missing = Vec::new();
    let mut current = Some(dir);
    while let Some(path) = current.filter(|p| !p.as_os_str().is_empty() && !p.exists()) {
        missing.push(path);
        current = path.parent();
    }

    fs::create_dir_all(dir)
        .map_err(|e| RegistryError::storage(dir, format!("creating directory: {e}")))?;

    for created in missing.iter().rev() {
        sync_dir(&parent_or_cwd(created))?;
    }
    Ok(())
}

/// Flush a directory entry so a rename into it survives a crash.
#[cfg(unix)]
fn sync_dir(dir: &Path) -> Result<()> {
    fs::File::open(dir)
        .and_then(|f| f.sync_all())
        .map_err(|e| RegistryError::storage(dir, format!("syncing directory: {e}")))
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::MAX_NAME_LEN;

    fn record(name: &str, version: &str) -> PackageRecord {
        PackageRecord::new(name, parse_version(version).unwrap())
    }

    fn store() -> (tempfile::TempDir, LocalStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::new(dir.path().join("registry"));
        (dir, store)
    }

    #[test]
    fn empty_store() {
        let (_dir, store) = store();
        assert!(store.list_all().unwrap().is_empty());
        assert!(store.get_latest("anything").unwrap().is_none());
        assert!(store
            .get_exact("anything", VersionKey::new(1, 0, 0))
            .unwrap()
            .is_none());
    }

    #[test]
    fn publish_then_get_exact() {
        let (_dir, store) = store();
        let mut pkg = record("schema-check", "1.2.3").with_description("JSON schema checks");
        pkg.metadata
            .insert("rules".into(), serde_json::json!(["required", "types"]));

        store.publish(&pkg).unwrap();

        let fetched = store
            .get_exact("schema-check", VersionKey::new(1, 2, 3))
            .unwrap()
            .unwrap();
        assert_eq!(fetched, pkg);
        assert!(store
            .package_dir("schema-check")
            .join("1.2.3.json")
            .is_file());
    }

    #[test]
    fn first_publish_creates_nested_root() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::new(dir.path().join("a").join("b").join("registry"));

        store.publish(&record("x", "1.0.0")).unwrap();

        assert!(store.root().join(PACKAGES_DIR).is_dir());
        assert_eq!(store.list_all().unwrap().len(), 1);
    }

    #[test]
    fn create_dir_durable_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("one").join("two");

        create_dir_durable(&nested).unwrap();
        create_dir_durable(&nested).unwrap();
        assert!(nested.is_dir());
    }

    #[test]
    fn names_are_arbitrary_text() {
        let (_dir, store) = store();
        let names = ["my package", "@arc/validate", "Prüfung", "a+b", "..", ".", "a\\b"];
        for name in names {
            store.publish(&record(name, "1.0.0")).unwrap();
        }

        for name in names {
            let fetched = store.get_latest(name).unwrap().unwrap();
            assert_eq!(fetched.name, name);
            assert!(store.get_exact_str(name, "1.0.0").unwrap().is_some());
        }

        let mut listed: Vec<_> = store.list_all().unwrap().into_iter().map(|r| r.name).collect();
        listed.sort();
        let mut expected: Vec<_> = names.iter().map(|n| n.to_string()).collect();
        expected.sort();
        assert_eq!(listed, expected);
    }

    #[test]
    fn names_differing_only_in_case_are_distinct() {
        let (_dir, store) = store();
        store
            .publish(&record("x", "5.0.0").with_description("lower"))
            .unwrap();
        store
            .publish(&record("X", "5.0.0").with_description("upper"))
            .unwrap();

        let lower = store.package_dir("x").join("5.0.0.json");
        let upper = store.package_dir("X").join("5.0.0.json");
        assert_ne!(
            lower.to_string_lossy().to_lowercase(),
            upper.to_string_lossy().to_lowercase()
        );
        assert_ne!(fs::read(&lower).unwrap(), fs::read(&upper).unwrap());

        let get = |name| store.get_latest(name).unwrap().unwrap().description;
        assert_eq!(get("x").as_deref(), Some("lower"));
        assert_eq!(get("X").as_deref(), Some("upper"));
    }

    #[test]
    fn duplicate_publish_conflicts_without_writing() {
        let (_dir, store) = store();
        let first = record("dup", "1.0.0").with_description("first");
        let second = record("dup", "1.0.0").with_description("second");

        store.publish(&first).unwrap();
        let path = store.package_dir("dup").join("1.0.0.json");
        let before = fs::read(&path).unwrap();

        let err = store.publish(&second).unwrap_err();
        assert!(err.is_conflict(), "{err}");

        assert_eq!(fs::read(&path).unwrap(), before);
        let all = store.list_all().unwrap();
        assert_eq!(all, vec![first]);
    }

    #[test]
    fn concurrent_publishers_of_one_key() {
        const PUBLISHERS: usize = 16;
        let (_dir, store) = store();

        let results: Vec<Result<()>> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..PUBLISHERS)
                .map(|i| {
                    let store = &store;
                    s.spawn(move || {
                        let pkg = record("race", "3.1.4").with_description(format!("writer {i}"));
                        store.publish(&pkg)
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let successes = results.iter().filter(|r| r.is_ok()).count();
        let conflicts = results
            .iter()
            .filter(|r| matches!(r, Err(e) if e.is_conflict()))
            .count();
        assert_eq!(successes, 1);
        assert_eq!(conflicts, PUBLISHERS - 1);

        let all = store.list_all().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].version(), VersionKey::new(3, 1, 4));
    }

    #[test]
    fn concurrent_publishers_of_distinct_keys() {
        let (_dir, store) = store();

        std::thread::scope(|s| {
            for patch in 0..8 {
                let store = &store;
                s.spawn(move || {
                    store
                        .publish(&PackageRecord::new("many", VersionKey::new(1, 0, patch)))
                        .unwrap();
                });
            }
        });

        assert_eq!(store.list_all().unwrap().len(), 8);
        assert_eq!(
            store.get_latest("many").unwrap().unwrap().version(),
            VersionKey::new(1, 0, 7)
        );
    }

    #[test]
    fn latest_is_highest_version() {
        let (_dir, store) = store();
        for v in ["1.0.0", "2.3.1", "2.3.0"] {
            store.publish(&record("x", v)).unwrap();
        }
        let latest = store.get_latest("x").unwrap().unwrap();
        assert_eq!(latest.version(), VersionKey::new(2, 3, 1));
    }

    #[test]
    fn latest_compares_numerically() {
        let (_dir, store) = store();
        for v in ["1.9.0", "1.10.0", "1.2.99"] {
            store.publish(&record("num", v)).unwrap();
        }
        let latest = store.get_latest("num").unwrap().unwrap();
        assert_eq!(latest.version(), VersionKey::new(1, 10, 0));
    }

    #[test]
    fn latest_only_considers_matching_name() {
        let (_dir, store) = store();
        store.publish(&record("x", "1.0.0")).unwrap();
        store.publish(&record("x-ext", "9.0.0")).unwrap();

        assert_eq!(
            store.get_latest("x").unwrap().unwrap().version(),
            VersionKey::new(1, 0, 0)
        );
        assert!(store.get_latest("y").unwrap().is_none());
    }

    #[test]
    fn exact_lookup_by_text() {
        let (_dir, store) = store();
        store.publish(&record("x", "2.3.1")).unwrap();

        assert!(store.get_exact_str("x", "2.3.1").unwrap().is_some());
        assert!(store.get_exact_str("x", "02.3.01").unwrap().is_some());
        assert!(store.get_exact_str("x", "2.3.0").unwrap().is_none());
    }

    #[test]
    fn exact_lookup_rejects_malformed_text() {
        let (_dir, store) = store();
        store.publish(&record("x", "2.0.1")).unwrap();

        for version in ["2.a.1", "2.0", "2.0.1.0", ""] {
            let err = store.get_exact_str("x", version).unwrap_err();
            assert!(
                matches!(err, RegistryError::MalformedVersion { .. }),
                "{version}: {err}"
            );
        }
        // Malformed input is rejected even when the name has no records.
        assert!(store.get_exact_str("nobody", "1.x.0").is_err());
    }

    #[test]
    fn list_all_returns_each_record_once() {
        let (_dir, store) = store();
        let published = [
            record("a", "1.0.0"),
            record("a", "1.1.0"),
            record("b", "0.0.1"),
            record("c", "10.0.0"),
        ];
        for pkg in &published {
            store.publish(pkg).unwrap();
        }
        assert!(store.publish(&published[0]).unwrap_err().is_conflict());

        let mut keys: Vec<_> = store.list_all().unwrap().iter().map(|r| r.key()).collect();
        keys.sort();
        keys.dedup();
        assert_eq!(keys.len(), published.len());
    }

    #[test]
    fn invalid_name_is_rejected_before_any_write() {
        let (_dir, store) = store();
        let too_long = "n".repeat(MAX_NAME_LEN + 1);
        for name in ["", too_long.as_str()] {
            let err = store.publish(&record(name, "1.0.0")).unwrap_err();
            assert!(
                matches!(err, RegistryError::InvalidRecord { .. }),
                "{name:?}: {err}"
            );
        }
        assert!(!store.root().exists());
        assert!(store.get_latest("").unwrap().is_none());
        assert!(store
            .get_exact(&too_long, VersionKey::new(1, 0, 0))
            .unwrap()
            .is_none());
    }

    #[test]
    fn longest_name_fits_in_one_path_component() {
        let (_dir, store) = store();
        let longest = "n".repeat(MAX_NAME_LEN);
        store.publish(&record(&longest, "1.0.0")).unwrap();
        assert!(store.get_latest(&longest).unwrap().is_some());
    }

    #[test]
    fn stray_files_are_ignored() {
        let (_dir, store) = store();
        store.publish(&record("x", "1.0.0")).unwrap();

        let pkg_dir = store.package_dir("x");
        fs::write(pkg_dir.join("notes.txt"), "hello").unwrap();
        fs::write(pkg_dir.join("1.0.json"), "{}").unwrap();
        fs::write(pkg_dir.join("01.0.0.json"), "{}").unwrap();
        fs::write(store.packages_dir().join("README"), "hi").unwrap();
        fs::create_dir(store.packages_dir().join("not-hex")).unwrap();
        fs::create_dir(store.packages_dir().join("7A")).unwrap();
        fs::write(store.staging_dir().join(".tmpLEFTOVER"), "partial").unwrap();

        assert_eq!(store.list_all().unwrap().len(), 1);
        assert_eq!(
            store.get_latest("x").unwrap().unwrap().version(),
            VersionKey::new(1, 0, 0)
        );
    }

    #[test]
    fn corrupt_record_is_a_storage_fault() {
        let (_dir, store) = store();
        store.publish(&record("x", "1.0.0")).unwrap();
        fs::write(store.package_dir("x").join("1.0.0.json"), "{ not json").unwrap();

        let err = store.get_latest("x").unwrap_err();
        assert!(
            matches!(err, RegistryError::StorageUnavailable { .. }),
            "{err}"
        );
    }

    #[test]
    fn misplaced_record_is_a_storage_fault() {
        let (_dir, store) = store();
        store.publish(&record("x", "1.0.0")).unwrap();
        let other = serde_json::to_vec(&record("y", "1.0.0")).unwrap();
        fs::write(store.package_dir("x").join("1.0.0.json"), other).unwrap();

        let err = store
            .get_exact("x", VersionKey::new(1, 0, 0))
            .unwrap_err();
        assert!(
            matches!(err, RegistryError::StorageUnavailable { .. }),
            "{err}"
        );
    }

    #[test]
    fn unusable_root_reports_storage_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("not-a-dir");
        fs::write(&root, "file").unwrap();
        let store = LocalStore::new(root);

        let err = store.publish(&record("x", "1.0.0")).unwrap_err();
        assert!(
            matches!(err, RegistryError::StorageUnavailable { .. }),
            "{err}"
        );
    }

    #[test]
    fn staging_is_emptied_after_publish() {
        let (_dir, store) = store();
        store.publish(&record("x", "1.0.0")).unwrap();
        assert!(store.publish(&record("x", "1.0.0")).unwrap_err().is_conflict());

        let leftovers = fs::read_dir(store.staging_dir()).unwrap().count();
        assert_eq!(leftovers, 0);
    }
}
