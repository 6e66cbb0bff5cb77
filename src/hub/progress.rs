use indicatif::{ProgressBar, ProgressStyle};

const BAR_STYLE: &str = "{msg:<24} {bar:30} {decimal_bytes:<10} / {decimal_total_bytes:<10} {decimal_bytes_per_sec:<12} {percent:>3}%  {eta_precise}";

/// Receives byte counts while a blob is streamed to disk.
pub trait Progress {
    fn inc(&self, delta: u64);

    fn set_position(&self, pos: u64);

    fn set_length(&self, len: u64);

    fn finish(&self);

    /// Removes the bar when nothing was transferred.
    fn clear(&self);
}

impl Progress for ProgressBar {
    fn inc(&self, delta: u64) {
        ProgressBar::inc(self, delta);
    }

    fn set_position(&self, pos: u64) {
        ProgressBar::set_position(self, pos);
    }

    fn set_length(&self, len: u64) {
        ProgressBar::set_length(self, len);
    }

    fn finish(&self) {
        ProgressBar::finish(self);
    }

    fn clear(&self) {
        ProgressBar::finish_and_clear(self);
    }
}

impl Progress for () {
    fn inc(&self, _delta: u64) {}

    fn set_position(&self, _pos: u64) {}

    fn set_length(&self, _len: u64) {}

    fn finish(&self) {}

    fn clear(&self) {}
}

/// Styled bar on stderr, or a hidden one when `visible` is false.
pub fn download_bar(name: &str, visible: bool) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new(0);
    if let Ok(style) = ProgressStyle::default_bar().template(BAR_STYLE) {
        bar.set_style(style);
    }
    bar.set_message(name.to_string());
    bar
}
