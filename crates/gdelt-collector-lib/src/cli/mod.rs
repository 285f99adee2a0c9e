mod args;
mod process;
mod run;

pub use args::{Command, parse_args};
pub use process::run_process;
pub use run::run_service;
