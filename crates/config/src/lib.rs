//! Layered configuration for binscan.
//!
//! Sources, lowest priority first:
//!
//! 1. built-in defaults
//! 2. `config.toml` in the platform configuration directory
//! 3. an explicitly given TOML file
//! 4. `BINSCAN_`-prefixed environment variables, `__` separating nested keys
//!    (`BINSCAN_SCANNER__FRAME_INTERVAL_MS=250`)
//!
//! Keys and enumerated values are snake_case throughout:
//!
//! ```toml
//! backend = "worker_loop"   # live_stream | still_image | worker_loop
//!
//! [scanner]
//! preferred_formats = ["code_128", "ean_13"]
//! facing = "environment"    # environment | user
//! frame_interval_ms = 100
//!
//! [session]
//! feedback_delay_ms = 800
//! probe_timeout_ms = 10000
//! ```
//!
//! The camelCase backend names (`liveStream`, `stillImage`, `workerLoop`)
//! are accepted as aliases.

mod config;
pub mod error;

pub use crate::config::{Config, SessionConfig};
