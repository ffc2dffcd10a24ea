//! Fixed-width percentage bars

pub const FILLED: char = '█';
pub const EMPTY: char = '░';

/// Render `percentage` as a bar of exactly `width` glyphs.
///
/// The percentage is clamped to `[0, 100]` before rendering; NaN counts as 0.
pub fn render_bar(percentage: f64, width: usize) -> String {
    let percentage = if percentage.is_nan() {
        0.0
    } else {
        percentage.clamp(0.0, 100.0)
    };

    let filled = (((percentage / 100.0) * width as f64).floor() as usize).min(width);
    let mut bar = String::with_capacity(width * FILLED.len_utf8());
    bar.extend(std::iter::repeat(FILLED).take(filled));
    bar.extend(std::iter::repeat(EMPTY).take(width - filled));
    bar
}
