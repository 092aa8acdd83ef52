//! Configuration shared by twindeck front ends
//!
//! ```ignore
//! use twindeck_core::config::{default_config_path, load_config, EngineConfig};
//!
//! let config: EngineConfig = load_config(&default_config_path());
//! let settings = config.player_settings();
//! ```

mod engine;
mod io;
mod paths;

pub use engine::{EngineConfig, DEFAULT_PLAYER_GAIN};
pub use io::{load_config, read_config, save_config};
pub use paths::{config_dir, default_config_path};
