//! Parsing of user-typed `"x,y"` coordinates.
//!
//! Each component is a decimal number with an optional exponent:
//!
//! ```text
//! component := sign? digits ('.' digits)? (exp-marker sign? digits)?
//! exp-marker := 'e' | 'E' | '^'
//! ```
//!
//! `e`/`E` is ordinary scientific notation (`1.5e2` = 150). `^` raises
//! the signed mantissa to the exponent (`1.5^2` = 2.25, `-2^2` = 4).

use thiserror::Error;

use crate::types::Point;

/// A coordinate string that could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoordinateError {
    /// The input did not contain exactly two comma-separated parts.
    #[error("expected \"x,y\", found {found} component(s) in {input:?}")]
    ComponentCount {
        /// The offending input.
        input: String,
        /// How many comma-separated parts were found.
        found: usize,
    },

    /// A component does not follow the number grammar.
    #[error("{0:?} is not a number (expected e.g. 12, -3.5, 1e3 or 2^10)")]
    Malformed(String),

    /// A component parsed but evaluates to infinity or NaN.
    #[error("{0:?} does not evaluate to a finite number")]
    NotFinite(String),
}

/// Parse a `"x,y"` string into a point. Whitespace around the whole
/// string and around each component is ignored.
///
/// # Errors
///
/// Returns [`CoordinateError`] if there are not exactly two components
/// or either component is malformed or non-finite.
pub fn parse_coordinate(input: &str) -> Result<Point, CoordinateError> {
    let parts: Vec<&str> = input.trim().split(',').collect();
    let [x, y] = parts.as_slice() else {
        return Err(CoordinateError::ComponentCount {
            input: input.to_owned(),
            found: parts.len(),
        });
    };
    Ok(Point::new(parse_component(x)?, parse_component(y)?))
}

/// Parse a single number component.
///
/// # Errors
///
/// Returns [`CoordinateError::Malformed`] when `input` is off the
/// grammar and [`CoordinateError::NotFinite`] when it overflows.
pub fn parse_component(input: &str) -> Result<f64, CoordinateError> {
    let s = input.trim();
    let malformed = || CoordinateError::Malformed(s.to_owned());

    let bytes = s.as_bytes();
    let mut i = skip_sign(bytes, 0);
    i = skip_digits(bytes, i).ok_or_else(malformed)?;
    if bytes.get(i) == Some(&b'.') {
        i = skip_digits(bytes, i + 1).ok_or_else(malformed)?;
    }
    let mantissa_end = i;

    let marker = bytes.get(i).copied();
    if let Some(m) = marker {
        if !matches!(m, b'e' | b'E' | b'^') {
            return Err(malformed());
        }
        let exp_start = skip_sign(bytes, i + 1);
        i = skip_digits(bytes, exp_start).ok_or_else(malformed)?;
        if i != bytes.len() {
            return Err(malformed());
        }
    }

    let value = if marker == Some(b'^') {
        let base: f64 = s[..mantissa_end].parse().map_err(|_| malformed())?;
        let exponent: f64 = s[mantissa_end + 1..].parse().map_err(|_| malformed())?;
        base.powf(exponent)
    } else {
        s.parse().map_err(|_| malformed())?
    };

    if value.is_finite() {
        Ok(value)
    } else {
        Err(CoordinateError::NotFinite(s.to_owned()))
    }
}

fn skip_sign(bytes: &[u8], i: usize) -> usize {
    match bytes.get(i) {
        Some(b'+' | b'-') => i + 1,
        _ => i,
    }
}

/// Index after a run of at least one ASCII digit starting at `i`.
fn skip_digits(bytes: &[u8], i: usize) -> Option<usize> {
    let run = bytes
        .get(i..)?
        .iter()
        .take_while(|b| b.is_ascii_digit())
        .count();
    (run > 0).then_some(i + run)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-12
    }

    #[test]
    fn plain_integers() {
        assert_eq!(parse_coordinate("2,3").unwrap(), Point::new(2.0, 3.0));
    }

    #[test]
    fn power_notation() {
        let p = parse_coordinate("1.5^2,4").unwrap();
        assert!(close(p.x, 2.25));
        assert!(close(p.y, 4.0));
        assert!(close(parse_component("10^-2").unwrap(), 0.01));
        assert!(close(parse_component("-2^2").unwrap(), 4.0));
        assert!(close(parse_component("-2^3").unwrap(), -8.0));
    }

    #[test]
    fn scientific_notation() {
        assert!(close(parse_component("1.5e2").unwrap(), 150.0));
        assert!(close(parse_component("+3E-1").unwrap(), 0.3));
    }

    #[test]
    fn whitespace_is_trimmed() {
        assert_eq!(
            parse_coordinate("  -1.25 , +7 ").unwrap(),
            Point::new(-1.25, 7.0)
        );
    }

    #[test]
    fn malformed_components_rejected() {
        for bad in ["abc", "", "1.", ".5", "1e", "1^", "1^2.5", "--1", "1x", "1e5e5", "0x10", "inf", "NaN"] {
            assert!(
                matches!(parse_component(bad), Err(CoordinateError::Malformed(_))),
                "{bad:?} accepted"
            );
        }
        assert!(matches!(
            parse_coordinate("abc,1"),
            Err(CoordinateError::Malformed(_))
        ));
    }

    #[test]
    fn wrong_component_count() {
        assert_eq!(
            parse_coordinate("1,2,3"),
            Err(CoordinateError::ComponentCount {
                input: "1,2,3".into(),
                found: 3
            })
        );
        assert!(matches!(
            parse_coordinate("5"),
            Err(CoordinateError::ComponentCount { found: 1, .. })
        ));
    }

    #[test]
    fn overflow_is_not_finite() {
        assert!(matches!(
            parse_component("10^400"),
            Err(CoordinateError::NotFinite(_))
        ));
        assert!(matches!(
            parse_component("1e999"),
            Err(CoordinateError::NotFinite(_))
        ));
    }
}
