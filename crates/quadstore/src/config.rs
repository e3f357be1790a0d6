use std::path::{Path, PathBuf};
use std::time::Duration;

/// Where the store's backing SQLite database lives (SPEC_FULL.md §4.10).
#[derive(Debug, Clone)]
pub enum Storage {
    File(PathBuf),
    /// An in-process, non-persistent database. Every connection the store opens shares the
    /// same database via SQLite's shared-cache mode, so the read pool still sees a consistent
    /// view without needing a real file on disk.
    Memory,
}

/// Store-open options (SPEC_FULL.md §4.10). Builder-style, mirroring the teacher's own
/// `*Options`/config structs.
#[derive(Debug, Clone)]
pub struct Config {
    pub(crate) storage: Storage,
    pub(crate) cache_capacity: usize,
    pub(crate) parallel: bool,
    pub(crate) busy_timeout: Duration,
    pub(crate) read_pool_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage: Storage::Memory,
            cache_capacity: 256,
            parallel: true,
            busy_timeout: Duration::from_secs(5),
            read_pool_size: 4,
        }
    }
}

impl Config {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn path(mut self, path: impl AsRef<Path>) -> Self {
        self.storage = Storage::File(path.as_ref().to_path_buf());
        self
    }

    #[must_use]
    pub fn in_memory(mut self) -> Self {
        self.storage = Storage::Memory;
        self
    }

    /// Soft cap on the number of cached prepared queries; the cache has no per-entry LRU
    /// bookkeeping, so once exceeded the whole cache is dropped and rebuilt lazily rather than
    /// evicting the single oldest entry (a deliberate simplification — see DESIGN.md).
    #[must_use]
    pub fn cache_capacity(mut self, n: usize) -> Self {
        self.cache_capacity = n;
        self
    }

    #[must_use]
    pub fn parallel(mut self, enabled: bool) -> Self {
        self.parallel = enabled;
        self
    }

    #[must_use]
    pub fn busy_timeout(mut self, d: Duration) -> Self {
        self.busy_timeout = d;
        self
    }

    #[must_use]
    pub fn read_pool_size(mut self, n: usize) -> Self {
        self.read_pool_size = n.max(1);
        self
    }
}
