// Compile-time defaults and environment overrides.
//
// Constants are the fallbacks; `init_*` functions read the process environment
// once at the call site, and the `init_*_from` variants hold the parsing so it
// can be tested without touching the environment.

use tracing::warn;

// Default compression level handed to the block codec.
// Can be overridden by the LZ4FLOW_CLEVEL environment variable,
// or by the --level command-line flag. The built-in lz4_flex codec has a
// single mode and ignores it; custom codecs may not.
pub const CLEVEL_DEFAULT: i32 = 0;

// Highest accepted compression level.
pub const CLEVEL_MAX: i32 = 12;

// Maximum number of compression workers selectable at runtime.
pub const NB_WORKERS_MAX: usize = 200;

// Hand-off queue slots per worker when no explicit capacity is given.
// Peak resident compressed blocks = capacity + workers.
pub const HANDOFF_SLOTS_PER_WORKER: usize = 2;

// Size of the buffer rented by each stream reader for compressed input.
pub const STREAM_BUFFER_SIZE: usize = 64 * 1024;

// Largest dictionary prefix the block format can reference.
pub const MAX_DICT_SIZE: usize = 64 * 1024;

pub const ENV_NBWORKERS: &str = "LZ4FLOW_NBWORKERS";
pub const ENV_CLEVEL: &str = "LZ4FLOW_CLEVEL";

/// Logical CPU count, at least 1.
pub fn count_cores() -> usize {
    num_cpus::get().max(1)
}

/// Default worker count: `LZ4FLOW_NBWORKERS`, or the CPU count when unset or 0.
pub fn init_nb_workers() -> usize {
    init_nb_workers_from(std::env::var(ENV_NBWORKERS).ok().as_deref())
}

/// Testable core of [`init_nb_workers`]. Result is clamped to `1..=NB_WORKERS_MAX`.
pub fn init_nb_workers_from(env_val: Option<&str>) -> usize {
    let requested = match env_val.map(str::trim) {
        Some(raw) => match raw.parse::<usize>() {
            Ok(n) => n,
            Err(_) => {
                warn!("ignoring {}={}: not a valid unsigned value", ENV_NBWORKERS, raw);
                0
            }
        },
        None => 0,
    };
    let workers = if requested == 0 { count_cores() } else { requested };
    workers.min(NB_WORKERS_MAX)
}

/// Default compression level: `LZ4FLOW_CLEVEL`, or [`CLEVEL_DEFAULT`].
pub fn init_c_level() -> i32 {
    init_c_level_from(std::env::var(ENV_CLEVEL).ok().as_deref())
}

/// Testable core of [`init_c_level`].
pub fn init_c_level_from(env_val: Option<&str>) -> i32 {
    if let Some(raw) = env_val.map(str::trim) {
        match raw.parse::<i32>() {
            Ok(level) if level <= CLEVEL_MAX => return level,
            _ => warn!("ignoring {}={}: expected an integer up to {}", ENV_CLEVEL, raw, CLEVEL_MAX),
        }
    }
    CLEVEL_DEFAULT
}
