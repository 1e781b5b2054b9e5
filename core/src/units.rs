use lazy_static::lazy_static;
use regex::Regex;
use tracing::warn;
use unicode_normalization::UnicodeNormalization;

lazy_static! {
    static ref NUMBER: Regex = Regex::new(r"[0-9.]+").expect("valid regex");
}

pub const HUNDRED_MILLION: char = '亿';
pub const TEN_THOUSAND: char = '万';

pub fn round2(v: f64) -> f64 { (v * 100.0).round() / 100.0 }

/// Converts a magnitude-suffixed figure ("1.50亿", "855.15万", "8210") to the
/// ten-thousand unit, rounded to 2 decimals. Unreadable input yields 0.0.
pub fn normalize(text: &str) -> f64 {
    let text: String = text.nfkc().collect();
    let text = text.trim();
    if text.is_empty() {
        return 0.0;
    }
    let Some(m) = NUMBER.find(text) else {
        warn!(text, "no numeric value in metric text");
        return 0.0;
    };
    let value: f64 = match m.as_str().parse() {
        Ok(v) => v,
        Err(e) => {
            warn!(text, error = %e, "failed to parse metric value");
            return 0.0;
        }
    };
    let scaled = if text.contains(HUNDRED_MILLION) {
        value * 10_000.0
    } else if text.contains(TEN_THOUSAND) {
        value
    } else {
        value / 10_000.0
    };
    round2(scaled)
}
