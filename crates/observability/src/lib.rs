//! Process-wide tracing setup shared by the forms binaries.

/// Tracing configuration (filters, output format).
pub mod tracing;

pub use crate::tracing::LogFormat;

/// Initialize tracing for the process.
///
/// Production emits JSON lines at `info`; development emits human-readable
/// lines at `debug`. `RUST_LOG` overrides the level in both cases.
/// Safe to call multiple times; later calls are no-ops.
pub fn init(production: bool) {
    let format = if production {
        LogFormat::Json
    } else {
        LogFormat::Pretty
    };
    crate::tracing::init(format, format.default_directive());
}
