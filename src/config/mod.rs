//! Command-line arguments and the runtime settings derived from them

pub mod cli;
pub mod settings;

pub use cli::CliArgs;
pub use settings::Settings;
