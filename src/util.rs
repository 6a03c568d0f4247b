//! Private utility module

use crate::error::{Error, Result};

/// Tolerance used for general near-zero and near-equality tests.
pub(crate) const NEAR_EPSILON: f64 = f32::EPSILON as f64;

/// Check whether two values are within an absolute tolerance of each other.
pub(crate) fn is_near_tolerance(a: f64, b: f64, threshold: f64) -> bool {
    (a - b).abs() <= threshold
}

/// Check whether two values are near-equal, up to float epsilon.
pub(crate) fn is_near(a: f64, b: f64) -> bool {
    is_near_tolerance(a, b, NEAR_EPSILON)
}

/// Convert a DICOM time in the "HHMMSS.frac" decimal encoding to the
/// number of seconds since midnight.
pub(crate) fn fix_dicom_time(t: f64) -> Result<f64> {
    let frac = t - t.floor();
    let integral = t.floor() as u64;
    let seconds = integral % 100;
    let minutes = (integral / 100) % 100;
    let hours = integral / 10_000;

    if seconds >= 60 || minutes >= 60 || hours >= 24 {
        Err(Error::BadFileFormat(format!(
            "Badly formatted DICOM time: {}",
            t
        )))
    } else {
        Ok((hours * 3600 + minutes * 60 + seconds) as f64 + frac)
    }
}

/// Strictly parse a floating-point number from text.
/// Failure is reported as `None`, never as an error.
pub(crate) fn parse_double(s: &str) -> Option<f64> {
    s.trim().parse().ok()
}

/// Strictly parse an unsigned 32-bit integer from text.
pub(crate) fn parse_u32(s: &str) -> Option<u32> {
    s.trim().parse().ok()
}

/// Strictly parse a signed 32-bit integer from text.
pub(crate) fn parse_i32(s: &str) -> Option<i32> {
    s.trim().parse().ok()
}

/// Format a value with the given number of significant digits,
/// following the C `%.Ng` conversion: fixed notation when the decimal
/// exponent lies in `[-4, significant)`, scientific notation otherwise,
/// trailing zeros removed in both cases.
pub(crate) fn format_general(value: f64, significant: usize) -> String {
    if value == 0.0 {
        return "0".to_owned();
    }
    let significant = significant.max(1);

    // Exponent of the value once rounded to the requested precision.
    let sci = format!("{:.*e}", significant - 1, value);
    let (mantissa, exponent) = match sci.split_once('e') {
        Some(pair) => pair,
        None => return sci,
    };
    let exponent: i32 = match exponent.parse() {
        Ok(e) => e,
        Err(_) => return sci,
    };

    if exponent >= -4 && (exponent as i64) < significant as i64 {
        let decimals = (significant as i32 - 1 - exponent).max(0) as usize;
        strip_trailing_zeros(format!("{:.*}", decimals, value))
    } else {
        let mantissa = strip_trailing_zeros(mantissa.to_owned());
        let sign = if exponent < 0 { '-' } else { '+' };
        format!("{}e{}{:02}", mantissa, sign, exponent.abs())
    }
}

fn strip_trailing_zeros(mut s: String) -> String {
    if s.contains('.') {
        while s.ends_with('0') {
            s.pop();
        }
        if s.ends_with('.') {
            s.pop();
        }
    }
    s
}
