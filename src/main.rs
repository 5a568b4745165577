//! Binary entrypoint that runs the answer widget store from a terminal.

use std::process::ExitCode;

use answer_widget::start_answer_widget;

/// Start an interactive conversation session.
fn main() -> ExitCode {
    start_answer_widget::run()
}
