//! Primary/secondary fallback policy over two key-value tiers.
//!
//! # Invariants
//! - `save` tries the primary first and falls back to the secondary instead
//!   of losing the write.
//! - `load` consults the secondary only when the primary yields nothing or fails.
//! - `load` reports absence only when no tier failed to answer; an unreadable
//!   primary with an empty secondary is a failure, never an empty project.
//! - After a successful write, the copy in the other tier is cleared so a
//!   recovered tier cannot later serve a stale image.

use super::{FileStore, KeyValueStore, MemoryStore, StorageError};
use crate::config::DATABASE_IMAGE_KEY;
use log::{info, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use sha2::Digest as _;
use std::fmt::Write as _;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::time::Instant;

static PATH_SLUG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^A-Za-z0-9]+").expect("valid path slug regex"));

const SLUG_MAX_CHARS: usize = 48;
const DIGEST_HEX_CHARS: usize = 16;

/// No tier could serve the request. A side is `None` when that tier
/// answered successfully but could not help (for example, it held nothing).
/// At least one side is always `Some`.
#[derive(Debug)]
pub struct TierFailure {
    pub primary: Option<StorageError>,
    pub secondary: Option<StorageError>,
}

impl Display for TierFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match (&self.primary, &self.secondary) {
            (Some(primary), Some(secondary)) => {
                write!(f, "primary: {primary}; secondary: {secondary}")
            }
            (Some(primary), None) => write!(f, "primary: {primary}; secondary: empty"),
            (None, Some(secondary)) => write!(f, "secondary: {secondary}"),
            (None, None) => write!(f, "no tier answered"),
        }
    }
}

impl Error for TierFailure {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.secondary
            .as_ref()
            .or(self.primary.as_ref())
            .map(|err| err as &(dyn Error + 'static))
    }
}

/// Durable home of one project's database image.
pub struct TieredPersistence {
    primary: Box<dyn KeyValueStore>,
    secondary: Box<dyn KeyValueStore>,
    key: String,
}

impl TieredPersistence {
    pub fn new(
        primary: Box<dyn KeyValueStore>,
        secondary: Box<dyn KeyValueStore>,
        key: impl Into<String>,
    ) -> Self {
        Self {
            primary,
            secondary,
            key: key.into(),
        }
    }

    /// Loads the stored image. Empty blobs count as absent.
    pub fn load(&self) -> Result<Option<Vec<u8>>, TierFailure> {
        let primary_error = match self.primary.get(&self.key) {
            Ok(Some(bytes)) if !bytes.is_empty() => return Ok(Some(bytes)),
            Ok(_) => None,
            Err(err) => {
                warn!(
                    "event=storage_load module=storage status=fallback store={} error={}",
                    self.primary.label(),
                    err
                );
                Some(err)
            }
        };

        match self.secondary.get(&self.key) {
            Ok(Some(bytes)) if !bytes.is_empty() => Ok(Some(bytes)),
            Ok(_) => match primary_error {
                None => Ok(None),
                Some(primary) => Err(TierFailure {
                    primary: Some(primary),
                    secondary: None,
                }),
            },
            Err(secondary) => Err(TierFailure {
                primary: primary_error,
                secondary: Some(secondary),
            }),
        }
    }

    /// Durably stores the image in the first tier that accepts it.
    pub fn save(&self, bytes: &[u8]) -> Result<(), TierFailure> {
        let started_at = Instant::now();
        let primary_error = match self.primary.put(&self.key, bytes) {
            Ok(()) => {
                discard_copy(self.secondary.as_ref(), &self.key);
                info!(
                    "event=storage_save module=storage status=ok store={} bytes={} duration_ms={}",
                    self.primary.label(),
                    bytes.len(),
                    started_at.elapsed().as_millis()
                );
                return Ok(());
            }
            Err(err) => err,
        };
        warn!(
            "event=storage_save module=storage status=fallback store={} error={}",
            self.primary.label(),
            primary_error
        );

        match self.secondary.put(&self.key, bytes) {
            Ok(()) => {
                discard_copy(self.primary.as_ref(), &self.key);
                info!(
                    "event=storage_save module=storage status=ok store={} bytes={} duration_ms={}",
                    self.secondary.label(),
                    bytes.len(),
                    started_at.elapsed().as_millis()
                );
                Ok(())
            }
            Err(secondary) => Err(TierFailure {
                primary: Some(primary_error),
                secondary: Some(secondary),
            }),
        }
    }

    /// Reads a legacy blob from whichever tier has it. Failures read as absent.
    pub fn read_legacy(&self, key: &str) -> Option<Vec<u8>> {
        [self.primary.as_ref(), self.secondary.as_ref()]
            .into_iter()
            .find_map(|store| match store.get(key) {
                Ok(bytes) => bytes.filter(|bytes| !bytes.is_empty()),
                Err(err) => {
                    warn!(
                        "event=legacy_read module=storage status=error store={} error={}",
                        store.label(),
                        err
                    );
                    None
                }
            })
    }

    /// Erases a legacy blob from both tiers.
    pub fn erase_legacy(&self, key: &str) {
        discard_copy(self.primary.as_ref(), key);
        discard_copy(self.secondary.as_ref(), key);
    }
}

fn discard_copy(store: &dyn KeyValueStore, key: &str) {
    if let Err(err) = store.remove(key) {
        warn!(
            "event=storage_discard module=storage status=error store={} error={}",
            store.label(),
            err
        );
    }
}

/// Builds the persistence tiers for a project root.
pub trait PersistenceProvider: Send {
    fn persistence_for(&self, root: &Path) -> TieredPersistence;
}

/// Primary tier in the project root; secondary tier under the per-installation
/// fallback directory, one subdirectory per root.
pub struct FilePersistenceProvider {
    fallback_dir: PathBuf,
}

impl FilePersistenceProvider {
    pub fn new(fallback_dir: impl Into<PathBuf>) -> Self {
        Self {
            fallback_dir: fallback_dir.into(),
        }
    }
}

impl PersistenceProvider for FilePersistenceProvider {
    fn persistence_for(&self, root: &Path) -> TieredPersistence {
        TieredPersistence::new(
            Box::new(FileStore::new(root, "primary")),
            Box::new(FileStore::new(
                self.fallback_dir.join(root_slug(root)),
                "secondary",
            )),
            DATABASE_IMAGE_KEY,
        )
    }
}

/// Same two in-memory tiers for every root. Clones of the stores observe
/// everything the repository writes.
#[derive(Clone)]
pub struct MemoryPersistenceProvider {
    pub primary: MemoryStore,
    pub secondary: MemoryStore,
}

impl MemoryPersistenceProvider {
    pub fn new() -> Self {
        Self {
            primary: MemoryStore::new("primary"),
            secondary: MemoryStore::new("secondary"),
        }
    }
}

impl Default for MemoryPersistenceProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl PersistenceProvider for MemoryPersistenceProvider {
    fn persistence_for(&self, _root: &Path) -> TieredPersistence {
        TieredPersistence::new(
            Box::new(self.primary.clone()),
            Box::new(self.secondary.clone()),
            DATABASE_IMAGE_KEY,
        )
    }
}

/// Fallback directory name for a root: a readable slug plus a digest of the
/// exact path bytes, so distinct roots never share a secondary tier.
fn root_slug(root: &Path) -> String {
    let raw = root.to_string_lossy();
    let slug = PATH_SLUG_RE.replace_all(&raw, "_");
    let slug = slug.trim_matches('_');
    let slug = if slug.is_empty() { "root" } else { slug };
    let readable: String = slug
        .chars()
        .rev()
        .take(SLUG_MAX_CHARS)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();

    let digest = sha2::Sha256::digest(root.as_os_str().as_encoded_bytes());
    let mut out = String::with_capacity(readable.len() + 1 + DIGEST_HEX_CHARS);
    out.push_str(readable.trim_start_matches('_'));
    out.push('-');
    for byte in digest.iter().take(DIGEST_HEX_CHARS / 2) {
        let _ = write!(&mut out, "{byte:02x}");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::{root_slug, TieredPersistence};
    use crate::storage::{KeyValueStore, MemoryStore};
    use std::path::Path;

    fn tiers() -> (MemoryStore, MemoryStore, TieredPersistence) {
        let primary = MemoryStore::new("primary");
        let secondary = MemoryStore::new("secondary");
        let persistence = TieredPersistence::new(
            Box::new(primary.clone()),
            Box::new(secondary.clone()),
            "image",
        );
        (primary, secondary, persistence)
    }

    #[test]
    fn save_prefers_primary() {
        let (primary, secondary, persistence) = tiers();
        persistence.save(b"v1").unwrap();
        assert!(primary.contains("image"));
        assert!(!secondary.contains("image"));
        assert_eq!(persistence.load().unwrap().as_deref(), Some(&b"v1"[..]));
    }

    #[test]
    fn save_falls_back_and_load_follows() {
        let (primary, secondary, persistence) = tiers();
        persistence.save(b"v1").unwrap();

        primary.set_failing(true);
        persistence.save(b"v2").unwrap();
        assert!(secondary.contains("image"));
        assert_eq!(persistence.load().unwrap().as_deref(), Some(&b"v2"[..]));
    }

    #[test]
    fn recovered_primary_does_not_serve_stale_image() {
        let (primary, secondary, persistence) = tiers();
        persistence.save(b"v1").unwrap();

        secondary.put("image", b"v2").unwrap();
        primary.remove("image").unwrap();
        assert_eq!(persistence.load().unwrap().as_deref(), Some(&b"v2"[..]));

        persistence.save(b"v3").unwrap();
        assert!(!secondary.contains("image"));
        assert_eq!(persistence.load().unwrap().as_deref(), Some(&b"v3"[..]));
    }

    #[test]
    fn both_tiers_failing_is_reported() {
        let (primary, secondary, persistence) = tiers();
        primary.set_failing(true);
        secondary.set_failing(true);

        let failure = persistence.save(b"v1").unwrap_err();
        assert!(failure.primary.is_some());
        assert!(persistence.load().is_err());
    }

    #[test]
    fn root_slug_keeps_readable_prefix() {
        let slug = root_slug(Path::new("/home/me/My Story"));
        assert!(slug.starts_with("home_me_My_Story-"));
        assert_eq!(slug.len(), "home_me_My_Story-".len() + 16);
        assert!(root_slug(Path::new("/")).starts_with("root-"));
    }

    #[test]
    fn root_slug_separates_paths_with_the_same_readable_form() {
        let spaced = root_slug(Path::new("/x/My Story"));
        let dashed = root_slug(Path::new("/x/My-Story"));
        let underscored = root_slug(Path::new("/x/My_Story"));
        assert_ne!(spaced, dashed);
        assert_ne!(spaced, underscored);
        assert_ne!(dashed, underscored);
        assert_eq!(spaced, root_slug(Path::new("/x/My Story")));
    }

    #[test]
    fn root_slug_stays_short_for_deep_paths() {
        let deep = format!("/{}", "nested/".repeat(60));
        let slug = root_slug(Path::new(&deep));
        assert!(slug.len() <= 48 + 1 + 16);
    }

    #[test]
    fn unreadable_primary_with_empty_secondary_is_a_failure() {
        let (primary, _secondary, persistence) = tiers();
        persistence.save(b"v1").unwrap();

        primary.set_failing_reads(true);
        let failure = persistence.load().unwrap_err();
        assert!(failure.primary.is_some());
        assert!(failure.secondary.is_none());

        primary.set_failing_reads(false);
        assert_eq!(persistence.load().unwrap().as_deref(), Some(&b"v1"[..]));
    }

    #[test]
    fn absent_everywhere_loads_as_none() {
        let (_primary, _secondary, persistence) = tiers();
        assert!(persistence.load().unwrap().is_none());
    }
}
