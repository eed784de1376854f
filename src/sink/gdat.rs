//! gdat text rendering.
//!
//! Every field, including the last, is followed by `", "`; rows end in `\n`.
//! Numbers use `%g`-style formatting with six significant digits.

use std::fmt::Write as _;

use crate::observable::ObservableSample;

const SIGNIFICANT_DIGITS: i32 = 6;
const MANTISSA_DECIMALS: usize = 5;

/// Formats `value` like a default-precision C++ stream (`%g`, six digits).
#[must_use]
pub fn format_number(value: f64) -> String {
    if value.is_nan() {
        return if value.is_sign_negative() { "-nan" } else { "nan" }.to_string();
    }
    if value.is_infinite() {
        return if value < 0.0 { "-inf" } else { "inf" }.to_string();
    }
    if value == 0.0 {
        return if value.is_sign_negative() { "-0" } else { "0" }.to_string();
    }

    // Decimal exponent after rounding to the requested precision.
    let sci = format!("{:.*e}", MANTISSA_DECIMALS, value);
    let Some((mantissa, exp)) = sci.split_once('e') else {
        return sci;
    };
    let exponent: i32 = exp.parse().unwrap_or(0);

    if exponent < -4 || exponent >= SIGNIFICANT_DIGITS {
        let mantissa = trim_fraction(mantissa);
        let sign = if exponent < 0 { '-' } else { '+' };
        format!("{mantissa}e{sign}{:02}", exponent.abs())
    } else {
        let decimals = usize::try_from(SIGNIFICANT_DIGITS - 1 - exponent).unwrap_or(0);
        trim_fraction(&format!("{value:.decimals$}")).to_string()
    }
}

fn trim_fraction(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}

/// Header row: `time, ` followed by each column name.
#[must_use]
pub fn header(columns: &[String]) -> String {
    let mut out = String::from("time, ");
    for name in columns {
        out.push_str(name);
        out.push_str(", ");
    }
    out.push('\n');
    out
}

/// Appends one row per sample, values in `columns` order.
pub fn render_rows(out: &mut String, columns: &[String], samples: &[ObservableSample]) {
    for sample in samples {
        out.push_str(&format_number(sample.time));
        out.push_str(", ");
        for name in columns {
            let value = sample.snapshot.get(name).unwrap_or(0.0);
            out.push_str(&format_number(value));
            out.push_str(", ");
        }
        out.push('\n');
    }
}

/// Reaction tally lines: `<name> fired <count>`.
pub fn render_reactions<'a>(out: &mut String, tally: impl Iterator<Item = (&'a str, u64)>) {
    for (name, count) in tally {
        let _ = writeln!(out, "{name} fired {count}");
    }
}
