use std::borrow::Cow;
use std::path::Path;

/// Scan a line against a positional template and return the captured numbers.
///
/// Templates are literal text with `%d` (signed integer), `%f` (float) and `%x`
/// (hexadecimal) placeholders. Any run of whitespace in the template matches any
/// amount of whitespace in the line, including none. Leading indentation of the line
/// and of every number is skipped. Scanning stops at the first mismatch; everything
/// captured up to that point is returned, so callers can tell partial matches apart by
/// the length.
pub fn scan(line: &str, template: &str) -> Vec<f64> {
    let input = line.as_bytes();
    let pattern = template.as_bytes();
    let mut values = Vec::new();
    let mut at = skip_whitespace(input, 0);
    let mut idx = 0;

    while idx < pattern.len() {
        let current = pattern[idx];
        if current.is_ascii_whitespace() {
            at = skip_whitespace(input, at);
            while idx < pattern.len() && pattern[idx].is_ascii_whitespace() {
                idx += 1;
            }
            continue;
        }

        if current == b'%' && idx + 1 < pattern.len() {
            at = skip_whitespace(input, at);
            let parsed = match pattern[idx + 1] {
                b'd' => take_integer(input, at),
                b'f' => take_float(input, at),
                b'x' => take_hex(input, at),
                _ => None,
            };
            match parsed {
                Some((value, end)) => {
                    values.push(value);
                    at = end;
                    idx += 2;
                    continue;
                }
                None => return values,
            }
        }

        if at < input.len() && input[at] == current {
            at += 1;
            idx += 1;
        } else {
            return values;
        }
    }
    values
}

/// Some test sites wrote decimals with a comma. Rewrite them to points before parsing.
pub fn sanitize_decimal_commas(line: &str) -> Cow<'_, str> {
    if line.contains(',') {
        Cow::Owned(line.replace(',', "."))
    } else {
        Cow::Borrowed(line)
    }
}

/// Read a text file into lines. Invalid UTF-8 is replaced rather than rejected,
/// since result files come from many generations of test software.
pub fn read_lines(path: &Path) -> Result<Vec<String>, std::io::Error> {
    let bytes = std::fs::read(path)?;
    Ok(String::from_utf8_lossy(&bytes)
        .lines()
        .map(|line| line.to_string())
        .collect())
}

fn skip_whitespace(input: &[u8], mut at: usize) -> usize {
    while at < input.len() && input[at].is_ascii_whitespace() {
        at += 1;
    }
    at
}

fn take_sign(input: &[u8], at: usize) -> usize {
    if at < input.len() && (input[at] == b'-' || input[at] == b'+') {
        at + 1
    } else {
        at
    }
}

fn take_digits(input: &[u8], mut at: usize) -> usize {
    while at < input.len() && input[at].is_ascii_digit() {
        at += 1;
    }
    at
}

fn take_integer(input: &[u8], start: usize) -> Option<(f64, usize)> {
    let digits_start = take_sign(input, start);
    let end = take_digits(input, digits_start);
    if end == digits_start {
        return None;
    }
    let text = std::str::from_utf8(&input[start..end]).ok()?;
    text.parse::<i64>().ok().map(|value| (value as f64, end))
}

fn take_float(input: &[u8], start: usize) -> Option<(f64, usize)> {
    let mantissa_start = take_sign(input, start);
    let mut end = take_digits(input, mantissa_start);
    let mut n_digits = end - mantissa_start;
    if end < input.len() && input[end] == b'.' {
        let fraction_end = take_digits(input, end + 1);
        n_digits += fraction_end - (end + 1);
        end = fraction_end;
    }
    if n_digits == 0 {
        return take_special_float(input, start, mantissa_start);
    }
    if end < input.len() && (input[end] == b'e' || input[end] == b'E') {
        let exponent_start = take_sign(input, end + 1);
        let exponent_end = take_digits(input, exponent_start);
        if exponent_end > exponent_start {
            end = exponent_end;
        }
    }
    let text = std::str::from_utf8(&input[start..end]).ok()?;
    text.parse::<f64>().ok().map(|value| (value, end))
}

// nan and inf show up in fit results of dead chips
fn take_special_float(input: &[u8], start: usize, word_start: usize) -> Option<(f64, usize)> {
    let negative = input.get(start) == Some(&b'-');
    for (word, value) in [("nan", f64::NAN), ("inf", f64::INFINITY)] {
        let end = word_start + word.len();
        if end <= input.len() && input[word_start..end].eq_ignore_ascii_case(word.as_bytes()) {
            let value = if negative { -value } else { value };
            return Some((value, end));
        }
    }
    None
}

fn take_hex(input: &[u8], start: usize) -> Option<(f64, usize)> {
    let mut digits_start = start;
    if input.len() > start + 1 && input[start] == b'0' && (input[start + 1] | 0x20) == b'x' {
        digits_start += 2;
    }
    let mut end = digits_start;
    while end < input.len() && input[end].is_ascii_hexdigit() {
        end += 1;
    }
    if end == digits_start {
        return None;
    }
    let text = std::str::from_utf8(&input[digits_start..end]).ok()?;
    u64::from_str_radix(text, 16)
        .ok()
        .map(|value| (value as f64, end))
}
