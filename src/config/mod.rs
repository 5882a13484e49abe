#[cfg(feature = "cli")]
pub mod cli;
pub mod profile;
pub mod units;

#[cfg(feature = "cli")]
pub use cli::CliConfig;
pub use profile::Profile;
pub use units::UnitRegistry;
