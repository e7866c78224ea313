/// Inferno colormap sampled at nine evenly spaced stops, low to high.
const INFERNO_STOPS: [[u8; 3]; 9] = [
    [0, 0, 4],
    [31, 12, 72],
    [85, 15, 109],
    [136, 34, 106],
    [186, 54, 85],
    [227, 89, 51],
    [249, 140, 10],
    [249, 201, 50],
    [252, 255, 164],
];

pub const COLOR_BACKGROUND: [u8; 4] = [255, 255, 255, 255];
pub const COLOR_LEGEND_TEXT: [u8; 4] = [20, 20, 20, 255];
pub const COLOR_FIRE: [u8; 4] = [220, 20, 20, 255];

/// Maps `t` in `[0, 1]` onto the inferno colormap. Out-of-range input is clamped.
pub fn inferno(t: f64) -> [u8; 4] {
    let t = if t.is_finite() { t.clamp(0.0, 1.0) } else { 0.0 };
    let scaled = t * (INFERNO_STOPS.len() - 1) as f64;
    let low = (scaled.floor() as usize).min(INFERNO_STOPS.len() - 2);
    let frac = scaled - low as f64;
    let (a, b) = (INFERNO_STOPS[low], INFERNO_STOPS[low + 1]);
    let lerp = |i: usize| (a[i] as f64 + (b[i] as f64 - a[i] as f64) * frac).round() as u8;
    [lerp(0), lerp(1), lerp(2), 255]
}

/// Position of `value` between `min` and `max`. A flat range maps to zero.
pub fn normalise(value: f64, min: f64, max: f64) -> f64 {
    let span = max - min;
    if span.abs() < f64::EPSILON {
        return 0.0;
    }
    (value - min) / span
}
