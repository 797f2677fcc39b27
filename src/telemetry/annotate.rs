//! Build-pipeline error annotations.
//!
//! One line per failure on the process error stream, in the exact format
//! the pipeline log parser scans for. These lines are a wire format, not
//! operational logging: they go straight to stderr rather than through
//! the tracing layers, which would prefix timestamps and levels and break
//! the parse. Emission never affects control flow.

use std::io::Write;

/// Emit one pipeline error annotation.
pub fn pipeline_error(message: impl AsRef<str>) {
    let mut stderr = std::io::stderr().lock();
    let _ = writeln!(
        stderr,
        "##vso[task.logissue type=error;]{}",
        message.as_ref()
    );
}
