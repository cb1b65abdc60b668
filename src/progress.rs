use indicatif::{ProgressBar, ProgressStyle};

/// Creates a progress bar or spinner for an upload.
///
/// # Arguments
/// * `total` - The total number of bytes, if known up front.
/// * `name` - Label shown in front of the bar.
///
/// # Returns
/// A `ProgressBar` instance.
pub fn setup_progress_log(total: Option<u64>, name: &str) -> ProgressBar {
    match total {
        Some(total) if total > 0 => progress_bar(total, name),
        _ => spinner(),
    }
}

/// Creates a progress bar for an upload with a known size.
fn progress_bar(total: u64, name: &str) -> ProgressBar {
    let pb = ProgressBar::new(total);

    let style = ProgressStyle::default_bar()
        .template(&(name.to_owned() + " {bar:40.cyan} {percent:.cyan}% | {bytes}/{total_bytes} ({eta})\n"))
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=>-");
    pb.set_style(style);

    pb
}

/// Creates a spinner for an upload of unknown size, e.g. a generator.
fn spinner() -> ProgressBar {
    let pb = ProgressBar::new_spinner();

    let style = ProgressStyle::default_spinner()
        .template("{spinner:.cyan} Uploaded {bytes}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠏");
    pb.set_style(style);

    pb
}
