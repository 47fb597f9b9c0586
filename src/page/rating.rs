//! Star rating widget arithmetic

/// Width of the filled star overlay, in percent, for an average rating
pub fn star_fill_percent(value: f64) -> f64 {
    if !value.is_finite() {
        return 0.0;
    }
    (value / 0.05).clamp(0.0, 100.0)
}

/// Parse a rating as the server renders it ("4.5" or "4,5")
pub fn parse_rating(text: &str) -> Option<f64> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    text.replace(',', ".").parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Star chosen by a pointer at `x` pixels into a widget `width` pixels wide
pub fn rating_from_pointer(x: f64, width: f64) -> u8 {
    if width.is_nan() || width <= 0.0 || !x.is_finite() {
        return 1;
    }
    let percent = x / width * 100.0;
    let stars = (percent / 20.0).round();
    stars.clamp(1.0, 5.0) as u8
}
