//! Engine tuning knobs.

/// Eviction policy for a per-epoch registry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Retention {
    /// Keep every epoch ever built for the lifetime of the process.
    KeepAll,
    /// Keep only the N most recently used epochs; older entries drop their
    /// registry reference and are freed once the last external handle goes.
    Lru(usize),
}

/// Engine configuration.
///
/// All knobs have working defaults; construct with `Config::default()` and
/// override fields as needed.
#[derive(Clone, Debug)]
pub struct Config {
    /// Invoke progress callbacks every this many steps. Minimum 1.
    pub progress_frequency: usize,
    /// Retention for built caches (~16 MiB each).
    pub cache_retention: Retention,
    /// Retention for materialized datasets (>= 1 GiB each).
    pub dag_retention: Retention,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            progress_frequency: 1,
            cache_retention: Retention::KeepAll,
            dag_retention: Retention::Lru(2),
        }
    }
}
