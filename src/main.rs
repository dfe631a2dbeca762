//! depgraph - task dependencies and hierarchy from the command line

use std::process::ExitCode;

fn main() -> ExitCode {
    depgraph::cli::run()
}
