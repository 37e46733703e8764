//! Settings file plus `WARDEN__*` environment overrides, and the CLI surface.

mod cli;
pub use clap::Parser;
pub use cli::*;

mod settings;
pub use settings::*;
