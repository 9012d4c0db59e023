//! Engine version information.
//!
//! The value is taken from Cargo metadata (`CARGO_PKG_VERSION`) at compile time. The CLI prints it and the
//! incremental log records it, so both agree on the same value.

/// The symproc version string (for example, `0.1.0-alpha.1`).
pub const SYMPROC_VERSION: &str = env!("CARGO_PKG_VERSION");
