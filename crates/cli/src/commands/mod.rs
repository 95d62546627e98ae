//! Subcommand implementations.
//!
//! Each command takes the manager plus its arguments and returns a
//! serializable output; `main` prints it as JSON on stdout.

pub mod fetch;
pub mod inspect;
pub mod lifecycle;

pub use fetch::{FetchOutput, fetch_impl};
pub use inspect::{StatusOutput, keys_impl, status_impl};
pub use lifecycle::{RunOutput, activate_impl, install_impl, run_impl};

use serde::Serialize;

/// Pretty-print `value` as JSON on stdout.
pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
