//! Packing and reading configuration

use once_cell::sync::Lazy;
use parking_lot::RwLock;

/// Tuning knobs shared by the packer, reader, and combiner.
///
/// `trivial_size` is kept at or below `small_obj_threshold`: setting either
/// one through the builder methods clamps the other so that an element
/// eligible for grouping can never be large enough to deserve its own TOC
/// expansion.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Containers whose encoded length is below this are stored without a
    /// child table
    pub small_obj_threshold: usize,
    /// Elements encoded in at most this many bytes may join grouped blocks
    pub trivial_size: usize,
    /// Packer output buffer size
    pub write_buffer: usize,
    /// Physical read size and eviction watermark of the read cache
    pub read_buffer: usize,
    /// Allow whole-range materialisation when few children were accessed
    pub fast_load: bool,
    /// Accessed-children fraction at or above which materialisation walks
    /// child-by-child instead of fetching the whole range
    pub fast_load_threshold: f64,
    /// Combiner payload copy granularity
    pub copy_chunk: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            small_obj_threshold: 8 * 1024,
            trivial_size: 20,
            write_buffer: 8 * 1024 * 1024,
            read_buffer: 64 * 1024,
            fast_load: true,
            fast_load_threshold: 0.3,
            copy_chunk: 16 * 1024 * 1024,
        }
    }
}

impl Config {
    /// Set the small-object threshold, clamping `trivial_size` down to it
    pub fn with_small_obj_threshold(mut self, bytes: usize) -> Self {
        if bytes > 0 {
            self.small_obj_threshold = bytes;
            self.trivial_size = self.trivial_size.min(bytes);
        }
        self
    }

    /// Set the trivial element size, raising `small_obj_threshold` to it
    /// if necessary
    pub fn with_trivial_size(mut self, bytes: usize) -> Self {
        if bytes > 0 {
            self.trivial_size = bytes;
            self.small_obj_threshold = self.small_obj_threshold.max(bytes);
        }
        self
    }

    /// Set the packer output buffer size
    pub fn with_write_buffer(mut self, bytes: usize) -> Self {
        if bytes > 0 {
            self.write_buffer = bytes;
        }
        self
    }

    /// Set the read cache physical read size
    pub fn with_read_buffer(mut self, bytes: usize) -> Self {
        if bytes > 0 {
            self.read_buffer = bytes;
        }
        self
    }

    /// Enable or disable whole-range materialisation
    pub fn with_fast_load(mut self, enabled: bool) -> Self {
        self.fast_load = enabled;
        self
    }

    /// Set the fast-load access fraction; values outside `[0, 1]` are
    /// ignored
    pub fn with_fast_load_threshold(mut self, fraction: f64) -> Self {
        if (0.0..=1.0).contains(&fraction) {
            self.fast_load_threshold = fraction;
        }
        self
    }

    /// Set the combiner copy granularity
    pub fn with_copy_chunk(mut self, bytes: usize) -> Self {
        if bytes > 0 {
            self.copy_chunk = bytes;
        }
        self
    }

    /// Snapshot of the process-wide default configuration
    pub fn global() -> Config {
        GLOBAL.read().clone()
    }
}

static GLOBAL: Lazy<RwLock<Config>> = Lazy::new(|| RwLock::new(Config::default()));

/// Replace the process-wide default configuration used by sessions that do
/// not receive an explicit [`Config`]. Sessions snapshot the record at
/// construction; already-open sessions are unaffected.
pub fn configure(config: Config) {
    *GLOBAL.write() = config;
}
