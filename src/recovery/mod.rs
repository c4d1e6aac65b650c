pub mod output;
pub mod report;

pub use output::{fixed_output_path, write_recovered};
pub use report::{RecoveryReport, RecoveryStatus};
