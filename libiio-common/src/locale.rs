// Copyright 2021-Present iio-rs Contributors
// SPDX-License-Identifier: Apache-2.0

//! Numeric attribute accessors, always under the C locale.
//!
//! Rust's `str::parse`/`{:}` formatting for `f64` already use `.` as the
//! decimal point regardless of the OS locale, so "use the C locale" here
//! means simply: never route attribute values through a locale-aware
//! formatter. This module exists so call sites have one obvious place to
//! parse/print attribute values and can't accidentally reach for a
//! locale-sensitive formatting crate later.
use crate::error::IioError;

pub fn parse_bool(raw: &str) -> Result<bool, IioError> {
    match raw.trim() {
        "1" | "true" | "Y" | "y" => Ok(true),
        "0" | "false" | "N" | "n" => Ok(false),
        other => Err(IioError::BadArgument(format!(
            "not a boolean attribute value: {other:?}"
        ))),
    }
}

pub fn print_bool(value: bool) -> String {
    if value { "1".into() } else { "0".into() }
}

pub fn parse_long(raw: &str) -> Result<i64, IioError> {
    raw.trim()
        .parse::<i64>()
        .map_err(|e| IioError::BadArgument(format!("not an integer attribute value: {e}")))
}

pub fn print_long(value: i64) -> String {
    value.to_string()
}

pub fn parse_double(raw: &str) -> Result<f64, IioError> {
    raw.trim()
        .parse::<f64>()
        .map_err(|e| IioError::BadArgument(format!("not a float attribute value: {e}")))
}

pub fn print_double(value: f64) -> String {
    // `{}` on f64 never uses a locale-dependent decimal separator in Rust,
    // unlike C's printf("%f", ...) under a comma-decimal locale.
    format!("{value}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bool_variants() {
        assert!(parse_bool("1").unwrap());
        assert!(!parse_bool("0").unwrap());
        assert!(parse_bool("true").unwrap());
        assert!(parse_bool(" y ").unwrap());
    }

    #[test]
    fn rejects_garbage_bool() {
        assert!(parse_bool("maybe").is_err());
    }

    #[test]
    fn long_roundtrip() {
        assert_eq!(parse_long(&print_long(1024)).unwrap(), 1024);
        assert_eq!(parse_long("-7").unwrap(), -7);
    }

    #[test]
    fn double_uses_dot_decimal() {
        let printed = print_double(12.5);
        assert_eq!(printed, "12.5");
        assert_eq!(parse_double(&printed).unwrap(), 12.5);
    }
}
