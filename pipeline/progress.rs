use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::io::IsTerminal;

/// Builds a progress bar that draws only when stderr is a terminal. With no
/// known length the bar renders as a spinner with a running count.
pub(crate) fn create_progress_bar(len: Option<u64>, message: &str) -> ProgressBar {
    let draw_target = if std::io::stderr().is_terminal() {
        ProgressDrawTarget::stderr_with_hz(20)
    } else {
        ProgressDrawTarget::hidden()
    };

    let pb = ProgressBar::with_draw_target(len, draw_target);
    let style = match len {
        Some(_) => ProgressStyle::with_template(
            "\n> [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}",
        )
        .map(|s| s.progress_chars("█▉▊▋▌▍▎▏  ")),
        None => ProgressStyle::with_template("> [{elapsed_precise}] {spinner} {human_pos} {msg}"),
    };
    if let Ok(style) = style {
        pb.set_style(style);
    }
    pb.set_message(message.to_string());
    pb
}
