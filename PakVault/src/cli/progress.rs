//! CLI progress display utilities

use indicatif::{ProgressBar, ProgressStyle};

use crate::progress::OpProgress;

/// Create a progress bar styled for archive operations
#[must_use]
pub fn operation_bar() -> ProgressBar {
    let bar = ProgressBar::new(0);
    bar.set_style(
        ProgressStyle::with_template("{msg:30} [{bar:40.cyan/blue}] {pos}/{len}")
            .expect("static template")
            .progress_chars("=> "),
    );
    bar
}

/// Feed an [`OpProgress`] update into a progress bar
pub fn update_bar(bar: &ProgressBar, progress: &OpProgress) {
    bar.set_length(progress.total as u64);
    bar.set_position(progress.current as u64);
    match &progress.current_file {
        Some(file) => bar.set_message(format!("{}: {file}", progress.phase.as_str())),
        None => bar.set_message(progress.phase.as_str().to_string()),
    }
}
