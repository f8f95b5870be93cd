pub mod session;
pub mod settings;

pub use session::{validate_production_config, SessionConfig, SessionLayer};
pub use settings::{ConfigError, Settings};
