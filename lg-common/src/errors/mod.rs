mod config_errors;
mod wire_errors;

pub use config_errors::ConfigError;
pub use wire_errors::WireError;
