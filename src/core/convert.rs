//! Numeric string scanning and float formatting
//!
//! The pieces of PHP type juggling that operate on raw bytes and doubles,
//! shared by `Val` coercions, array key normalization and the JSON bridge.
//!
//! ## References
//!
//! - Zend: `$PHP_SRC_PATH/Zend/zend_operators.c` - _is_numeric_string_ex, ZEND_STRTOL
//! - Zend: `$PHP_SRC_PATH/Zend/zend_strtod.c` - zend_gcvt
//! - Zend: `$PHP_SRC_PATH/Zend/zend_operators.h` - zend_dval_to_lval

/// `precision` ini default, used when printing floats
pub const DEFAULT_PRECISION: usize = 14;

/// Parsed numeric value of a string
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Numeric {
    Int(i64),
    Float(f64),
}

impl Numeric {
    pub fn as_f64(self) -> f64 {
        match self {
            Numeric::Int(i) => i as f64,
            Numeric::Float(f) => f,
        }
    }
}

/// Outcome of scanning the leading numeric prefix of a string
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NumericScan {
    pub value: Numeric,
    /// Whole input is numeric (trailing whitespace allowed)
    pub whole: bool,
}

#[inline]
fn is_php_whitespace(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\n' | b'\r' | 0x0B | 0x0C)
}

/// Scan `[ws][sign]digits[.digits][(e|E)[sign]digits]` at the start of `s`.
/// Returns `None` when no digit is found.
/// Reference: $PHP_SRC_PATH/Zend/zend_operators.c - _is_numeric_string_ex
pub fn scan_numeric(s: &[u8]) -> Option<NumericScan> {
    let mut pos = 0;
    while pos < s.len() && is_php_whitespace(s[pos]) {
        pos += 1;
    }
    let start = pos;
    if pos < s.len() && (s[pos] == b'+' || s[pos] == b'-') {
        pos += 1;
    }

    let int_start = pos;
    while pos < s.len() && s[pos].is_ascii_digit() {
        pos += 1;
    }
    let int_digits = pos - int_start;

    let mut is_float = false;
    let mut frac_digits = 0;
    if pos < s.len() && s[pos] == b'.' {
        let mut look = pos + 1;
        while look < s.len() && s[look].is_ascii_digit() {
            look += 1;
        }
        frac_digits = look - pos - 1;
        if int_digits > 0 || frac_digits > 0 {
            is_float = true;
            pos = look;
        }
    }

    if int_digits == 0 && frac_digits == 0 {
        return None;
    }

    if pos < s.len() && (s[pos] == b'e' || s[pos] == b'E') {
        let mut look = pos + 1;
        if look < s.len() && (s[look] == b'+' || s[look] == b'-') {
            look += 1;
        }
        let exp_start = look;
        while look < s.len() && s[look].is_ascii_digit() {
            look += 1;
        }
        if look > exp_start {
            is_float = true;
            pos = look;
        }
    }

    let text = std::str::from_utf8(&s[start..pos]).ok()?;
    let value = if is_float {
        Numeric::Float(text.parse::<f64>().ok()?)
    } else {
        match text.parse::<i64>() {
            Ok(i) => Numeric::Int(i),
            // Integer strings beyond i64 are treated as floats
            Err(_) => Numeric::Float(text.parse::<f64>().ok()?),
        }
    };

    let whole = s[pos..].iter().all(|&b| is_php_whitespace(b));
    Some(NumericScan { value, whole })
}

/// `is_numeric()` for strings
pub fn is_numeric_string(s: &[u8]) -> bool {
    scan_numeric(s).map(|scan| scan.whole).unwrap_or(false)
}

/// Integer value of the leading `[ws][sign]digits` prefix, saturating on
/// overflow. Decimal points and exponents end the prefix.
/// Reference: $PHP_SRC_PATH/Zend/zend_operators.c - ZEND_STRTOL
pub fn string_to_int(s: &[u8]) -> i64 {
    let mut pos = 0;
    while pos < s.len() && is_php_whitespace(s[pos]) {
        pos += 1;
    }
    let negative = match s.get(pos) {
        Some(b'-') => {
            pos += 1;
            true
        }
        Some(b'+') => {
            pos += 1;
            false
        }
        _ => false,
    };

    let mut acc: i64 = 0;
    while pos < s.len() && s[pos].is_ascii_digit() {
        let digit = (s[pos] - b'0') as i64;
        acc = if negative {
            acc.saturating_mul(10).saturating_sub(digit)
        } else {
            acc.saturating_mul(10).saturating_add(digit)
        };
        pos += 1;
    }
    acc
}

/// Float value of the leading numeric prefix, `0.0` when there is none
pub fn string_to_float(s: &[u8]) -> f64 {
    scan_numeric(s).map(|scan| scan.value.as_f64()).unwrap_or(0.0)
}

/// Canonical decimal integer check used for array keys: `0`, or an optional
/// `-` followed by a non-zero digit and more digits, within i64 range.
/// Reference: $PHP_SRC_PATH/Zend/zend_hash.c - _zend_handle_numeric_str_ex
pub fn canonical_int_key(s: &[u8]) -> Option<i64> {
    if s.is_empty() || s.len() > 20 {
        return None;
    }
    let digits = if s[0] == b'-' { &s[1..] } else { s };
    if digits.is_empty() || !digits.iter().all(u8::is_ascii_digit) {
        return None;
    }
    if digits[0] == b'0' && (digits.len() > 1 || s[0] == b'-') {
        return None;
    }
    std::str::from_utf8(s).ok()?.parse::<i64>().ok()
}

/// Double to integer conversion with PHP's modular wrap for out-of-range values
/// Reference: $PHP_SRC_PATH/Zend/zend_operators.h - zend_dval_to_lval
pub fn float_to_int(d: f64) -> i64 {
    if !d.is_finite() {
        return 0;
    }
    if d >= -9.223_372_036_854_775_808e18 && d < 9.223_372_036_854_775_808e18 {
        return d as i64;
    }
    let two_pow_64 = 18_446_744_073_709_551_616.0_f64;
    let mut dmod = d % two_pow_64;
    if dmod < 0.0 {
        dmod += two_pow_64;
    }
    if dmod >= 9.223_372_036_854_775_808e18 {
        dmod -= two_pow_64;
    }
    dmod as i64
}

/// Significant digits (no trailing zeros) and decimal point position of `value`.
/// `None` precision yields the shortest round-trip representation.
fn decimal_digits(value: f64, precision: Option<usize>) -> (String, i32) {
    let formatted = match precision {
        Some(p) => format!("{:.*e}", p.max(1) - 1, value),
        None => format!("{:e}", value),
    };
    let (mantissa, exponent) = formatted.split_once('e').unwrap_or((&formatted, "0"));
    let exponent: i32 = exponent.parse().unwrap_or(0);
    let mut digits: String = mantissa.chars().filter(char::is_ascii_digit).collect();
    while digits.len() > 1 && digits.ends_with('0') {
        digits.pop();
    }
    if digits == "0" {
        return (digits, 1);
    }
    (digits, exponent + 1)
}

/// Layout rules of zend_gcvt
fn gcvt(value: f64, precision: Option<usize>, exp_char: char) -> String {
    if value.is_nan() {
        return "NAN".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "INF" } else { "-INF" }.to_string();
    }

    let threshold = precision.unwrap_or(17).max(1) as i32;
    let (digits, decpt) = decimal_digits(value.abs(), precision);
    let mut out = String::with_capacity(digits.len() + 8);
    if value.is_sign_negative() {
        out.push('-');
    }

    if decpt < -3 || decpt > threshold {
        let exp = decpt - 1;
        out.push_str(&digits[..1]);
        out.push('.');
        if digits.len() > 1 {
            out.push_str(&digits[1..]);
        } else {
            out.push('0');
        }
        out.push(exp_char);
        out.push(if exp < 0 { '-' } else { '+' });
        out.push_str(&exp.abs().to_string());
    } else if decpt <= 0 {
        out.push_str("0.");
        for _ in decpt..0 {
            out.push('0');
        }
        out.push_str(&digits);
    } else {
        let decpt = decpt as usize;
        if digits.len() <= decpt {
            out.push_str(&digits);
            for _ in digits.len()..decpt {
                out.push('0');
            }
        } else {
            out.push_str(&digits[..decpt]);
            out.push('.');
            out.push_str(&digits[decpt..]);
        }
    }
    out
}

/// Float to string as `echo` prints it (`precision` significant digits)
pub fn format_float(value: f64, precision: usize) -> String {
    gcvt(value, Some(precision), 'E')
}

/// Shortest round-trip representation (`serialize_precision = -1`)
pub fn format_float_repr(value: f64, exp_char: char) -> String {
    gcvt(value, None, exp_char)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_numeric_prefixes() {
        assert_eq!(
            scan_numeric(b"42").map(|s| s.value),
            Some(Numeric::Int(42))
        );
        assert_eq!(
            scan_numeric(b"  -3.5abc").map(|s| (s.value, s.whole)),
            Some((Numeric::Float(-3.5), false))
        );
        assert_eq!(
            scan_numeric(b"1e3").map(|s| s.value),
            Some(Numeric::Float(1000.0))
        );
        assert_eq!(
            scan_numeric(b"7e").map(|s| (s.value, s.whole)),
            Some((Numeric::Int(7), false))
        );
        assert_eq!(scan_numeric(b"abc"), None);
        assert_eq!(scan_numeric(b"."), None);
        assert!(is_numeric_string(b" 12 "));
        assert!(!is_numeric_string(b"12px"));
    }

    #[test]
    fn test_string_to_int_stops_at_non_digit() {
        assert_eq!(string_to_int(b"12abc"), 12);
        assert_eq!(string_to_int(b"1.9"), 1);
        assert_eq!(string_to_int(b"1e3"), 1);
        assert_eq!(string_to_int(b"  -7"), -7);
        assert_eq!(string_to_int(b"abc"), 0);
        assert_eq!(string_to_int(b"99999999999999999999"), i64::MAX);
    }

    #[test]
    fn test_canonical_int_key() {
        assert_eq!(canonical_int_key(b"42"), Some(42));
        assert_eq!(canonical_int_key(b"-5"), Some(-5));
        assert_eq!(canonical_int_key(b"0"), Some(0));
        assert_eq!(canonical_int_key(b"-0"), None);
        assert_eq!(canonical_int_key(b"042"), None);
        assert_eq!(canonical_int_key(b" 1"), None);
        assert_eq!(canonical_int_key(b"1.0"), None);
        assert_eq!(canonical_int_key(b"9223372036854775808"), None);
    }

    #[test]
    fn test_float_to_int() {
        assert_eq!(float_to_int(7.9), 7);
        assert_eq!(float_to_int(-7.9), -7);
        assert_eq!(float_to_int(f64::NAN), 0);
        assert_eq!(float_to_int(f64::INFINITY), 0);
    }

    #[test]
    fn test_format_float_precision_14() {
        assert_eq!(format_float(1.0, 14), "1");
        assert_eq!(format_float(0.1 + 0.2, 14), "0.3");
        assert_eq!(format_float(1.5, 14), "1.5");
        assert_eq!(format_float(-0.0, 14), "-0");
        assert_eq!(format_float(1e25, 14), "1.0E+25");
        assert_eq!(format_float(0.0001, 14), "0.0001");
        assert_eq!(format_float(0.00001, 14), "1.0E-5");
        assert_eq!(format_float(123456.789, 14), "123456.789");
        assert_eq!(format_float(f64::NAN, 14), "NAN");
        assert_eq!(format_float(f64::NEG_INFINITY, 14), "-INF");
    }

    #[test]
    fn test_format_float_repr() {
        assert_eq!(format_float_repr(0.1, 'e'), "0.1");
        assert_eq!(format_float_repr(10.0, 'e'), "10");
        assert_eq!(format_float_repr(1e25, 'e'), "1.0e+25");
    }
}
