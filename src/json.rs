//! Direct-to-buffer JSON scalar writers.
//!
//! The resolver streams its response through these helpers; no response
//! tree is ever built. Containers (`{`/`[`) are written by the resolver
//! itself so it can keep them balanced even when errors interrupt a
//! selection set.

use chrono::{DateTime, SecondsFormat, Utc};

pub(crate) fn write_null(out: &mut Vec<u8>) {
    out.extend_from_slice(b"null");
}

pub(crate) fn write_bool(out: &mut Vec<u8>, v: bool) {
    out.extend_from_slice(if v { b"true" } else { b"false" as &[u8] });
}

pub(crate) fn write_i64(out: &mut Vec<u8>, v: i64) {
    out.extend_from_slice(v.to_string().as_bytes());
}

pub(crate) fn write_u64(out: &mut Vec<u8>, v: u64) {
    out.extend_from_slice(v.to_string().as_bytes());
}

/// Times render as RFC 3339 strings with second precision, `Z` for UTC.
pub(crate) fn write_time(out: &mut Vec<u8>, t: &DateTime<Utc>) {
    write_string(out, &t.to_rfc3339_opts(SecondsFormat::Secs, true));
}

pub(crate) fn write_string(out: &mut Vec<u8>, s: &str) {
    out.push(b'"');
    for b in s.bytes() {
        match b {
            b'"' => out.extend_from_slice(b"\\\""),
            b'\\' => out.extend_from_slice(b"\\\\"),
            b'\n' => out.extend_from_slice(b"\\n"),
            b'\r' => out.extend_from_slice(b"\\r"),
            b'\t' => out.extend_from_slice(b"\\t"),
            0x08 => out.extend_from_slice(b"\\b"),
            0x0C => out.extend_from_slice(b"\\f"),
            b if b < 0x20 => {
                const HEX: &[u8; 16] = b"0123456789abcdef";
                out.extend_from_slice(b"\\u00");
                out.push(HEX[(b >> 4) as usize]);
                out.push(HEX[(b & 0x0F) as usize]);
            }
            b => out.push(b),
        }
    }
    out.push(b'"');
}

pub(crate) fn write_f64(out: &mut Vec<u8>, f: f64) {
    if !f.is_finite() {
        out.extend_from_slice(b"0.0");
        return;
    }
    let abs = f.abs();
    if abs != 0.0 && (abs < 1e-6 || abs >= 1e21) {
        write_exponent(out, format!("{:e}", f));
    } else {
        out.extend_from_slice(format!("{}", f).as_bytes());
    }
}

pub(crate) fn write_f32(out: &mut Vec<u8>, f: f32) {
    if !f.is_finite() {
        out.extend_from_slice(b"0.0");
        return;
    }
    // The cutoffs are compared in f32 so borderline values land on the
    // same side as they would after an f32 round-trip.
    let abs = f.abs();
    if abs != 0.0 && (abs < 1e-6_f32 || abs >= 1e21_f32) {
        write_exponent(out, format!("{:e}", f));
    } else {
        out.extend_from_slice(format!("{}", f).as_bytes());
    }
}

/// `{:e}` prints `1e21`; JSON consumers conventionally see `1e+21`, so a
/// `+` is inserted for non-negative exponents. Negative exponents are
/// already in their shortest `e-9` form.
fn write_exponent(out: &mut Vec<u8>, formatted: String) {
    match formatted.rfind('e') {
        Some(pos) if formatted.as_bytes().get(pos + 1) != Some(&b'-') => {
            out.extend_from_slice(formatted[..=pos].as_bytes());
            out.push(b'+');
            out.extend_from_slice(formatted[pos + 1..].as_bytes());
        }
        _ => out.extend_from_slice(formatted.as_bytes()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn f64_json(f: f64) -> String {
        let mut out = Vec::new();
        write_f64(&mut out, f);
        String::from_utf8(out).unwrap()
    }

    fn f32_json(f: f32) -> String {
        let mut out = Vec::new();
        write_f32(&mut out, f);
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn floats_inside_fixed_range() {
        assert_eq!(f64_json(13.0), "13");
        assert_eq!(f64_json(1.1), "1.1");
        assert_eq!(f64_json(0.0), "0");
        assert_eq!(f64_json(-2.5), "-2.5");
        assert_eq!(f32_json(12.0), "12");
    }

    #[test]
    fn floats_outside_fixed_range_use_exponents() {
        assert_eq!(f64_json(100e-100), "1e-98");
        assert_eq!(f64_json(1e-7), "1e-7");
        assert_eq!(f64_json(1e21), "1e+21");
        assert_eq!(f64_json(-3.25e22), "-3.25e+22");
    }

    #[test]
    fn non_finite_floats_collapse_to_zero() {
        assert_eq!(f64_json(f64::NAN), "0.0");
        assert_eq!(f64_json(f64::INFINITY), "0.0");
        assert_eq!(f64_json(f64::NEG_INFINITY), "0.0");
        assert_eq!(f32_json(f32::NAN), "0.0");
    }

    #[test]
    fn strings_escape_control_bytes() {
        let mut out = Vec::new();
        write_string(&mut out, "a\"b\\c\n\t\u{1}");
        assert_eq!(String::from_utf8(out).unwrap(), "\"a\\\"b\\\\c\\n\\t\\u0001\"");
    }

    #[test]
    fn unicode_passes_through() {
        let mut out = Vec::new();
        write_string(&mut out, "héllo ☃");
        assert_eq!(String::from_utf8(out).unwrap(), "\"héllo ☃\"");
    }
}
