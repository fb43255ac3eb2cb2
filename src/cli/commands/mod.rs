//! One module per subcommand. Each `execute` returns the process exit code.

pub mod analyze;
pub mod fix;
pub mod init;
pub mod resume;
pub mod simulate;
pub mod status;
