//! Small parsers and formatters for MDL attribute values.

/// Standard single-phase service transformer ratings in kVA.
pub const STANDARD_RATINGS_KVA: [f64; 13] = [
    10.0, 15.0, 25.0, 37.5, 50.0, 75.0, 100.0, 150.0, 167.0, 250.0, 333.3, 500.0, 666.7,
];

/// Parse a complex attribute such as `1200+300j`, `-4.5e3-2j`, `75j`,
/// `1000` or `120+30d` (polar, degrees). A trailing unit word is ignored.
pub fn parse_complex(text: &str) -> Option<(f64, f64)> {
    let value = text.split_whitespace().next()?.trim_matches('"');
    if value.is_empty() {
        return None;
    }
    let (body, suffix) = match value.chars().last()? {
        c @ ('j' | 'i' | 'd' | 'r') => (&value[..value.len() - 1], Some(c)),
        _ => (value, None),
    };
    let Some(suffix) = suffix else {
        return body.parse::<f64>().ok().map(|re| (re, 0.0));
    };

    // Split at the last sign that is not the leading sign or an exponent sign.
    let bytes = body.as_bytes();
    let split = (1..bytes.len())
        .rev()
        .find(|&i| matches!(bytes[i], b'+' | b'-') && !matches!(bytes[i - 1], b'e' | b'E'));
    let (first, second) = match split {
        Some(i) => (&body[..i], &body[i..]),
        None => ("", body),
    };
    let a = if first.is_empty() { 0.0 } else { first.parse::<f64>().ok()? };
    let b = match second {
        "+" | "" => 1.0,
        "-" => -1.0,
        s => s.parse::<f64>().ok()?,
    };
    if first.is_empty() && matches!(suffix, 'd' | 'r') {
        return None;
    }
    match suffix {
        'j' | 'i' => Some((a, b)),
        'd' => {
            let angle = b.to_radians();
            Some((a * angle.cos(), a * angle.sin()))
        }
        _ => Some((a * b.cos(), a * b.sin())),
    }
}

/// |z| of a complex attribute, `None` when it does not parse.
pub fn magnitude(text: &str) -> Option<f64> {
    parse_complex(text).map(|(re, im)| re.hypot(im))
}

/// Leading number of a value such as `7200`, `14400.000` or `50 kVA`.
pub fn parse_number(text: &str) -> Option<f64> {
    let first = text.split_whitespace().next()?;
    let end = first
        .char_indices()
        .find(|(i, c)| {
            !(c.is_ascii_digit() || *c == '.' || ((*c == '-' || *c == '+') && *i == 0) || *c == 'e' || *c == 'E')
        })
        .map(|(i, _)| i)
        .unwrap_or(first.len());
    first[..end].parse().ok()
}

/// Smallest standard rating that covers `kva`; `None` above the largest.
pub fn standard_rating(kva: f64) -> Option<f64> {
    STANDARD_RATINGS_KVA.iter().copied().find(|r| *r >= kva)
}

/// Six-decimal fixed formatting used for fractions and power factors.
pub fn fixed6(value: f64) -> String {
    format!("{value:.6}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_rectangular_and_polar_forms() {
        assert_eq!(parse_complex("1200+300j"), Some((1200.0, 300.0)));
        assert_eq!(parse_complex("-4.5e3-2j"), Some((-4500.0, -2.0)));
        assert_eq!(parse_complex("75j"), Some((0.0, 75.0)));
        assert_eq!(parse_complex("1000"), Some((1000.0, 0.0)));
        assert_eq!(parse_complex("1+1.5e-2j VA"), Some((1.0, 0.015)));
        let (re, im) = parse_complex("100+90d").unwrap();
        assert!(re.abs() < 1e-9 && (im - 100.0).abs() < 1e-9);
        assert_eq!(parse_complex("garbage"), None);
        assert_eq!(magnitude("3+4j"), Some(5.0));
    }

    #[test]
    fn leading_numbers() {
        assert_eq!(parse_number("50 kVA"), Some(50.0));
        assert_eq!(parse_number("14400.000"), Some(14400.0));
        assert_eq!(parse_number("7200V"), Some(7200.0));
        assert_eq!(parse_number(""), None);
    }

    #[test]
    fn rating_is_smallest_cover() {
        assert_eq!(standard_rating(9.0), Some(10.0));
        assert_eq!(standard_rating(15.0), Some(15.0));
        assert_eq!(standard_rating(40.0), Some(50.0));
        assert_eq!(standard_rating(700.0), None);
    }
}
