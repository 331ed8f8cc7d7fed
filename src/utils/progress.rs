//! Progress bars for file loading and chunked writes.

use indicatif::{ProgressBar, ProgressStyle};

const BAR_TEMPLATE: &str =
    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {unit} {msg}";

/// Bar over `length` units (files, chunks, batches) labelled with `unit`.
#[must_use]
pub fn create_progress_bar(length: u64, unit: &str, description: Option<&str>) -> ProgressBar {
    let pb = ProgressBar::new(length);
    let template = BAR_TEMPLATE.replace("{unit}", unit);
    let style = ProgressStyle::default_bar()
        .template(&template)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-");
    pb.set_style(style);

    if let Some(desc) = description {
        pb.set_message(desc.to_string());
    }

    pb
}

/// Number of `chunk_size` chunks needed to cover `rows` rows.
pub fn chunk_count(rows: usize, chunk_size: usize) -> usize {
    if chunk_size == 0 {
        return 0;
    }
    rows.div_ceil(chunk_size)
}
