//! Post-processes LLM-authored markdown before it reaches the client.
//!
//! LLM responses sometimes wrap mid-number ("spent 69,\n375") or glue a
//! digit run directly onto a letter run with no space, both artifacts of
//! token-by-token generation rather than anything meaningful. This is pure
//! text cleanup, deterministic and idempotent: `sanitize(sanitize(x))`
//! always equals `sanitize(x)`.

const ZERO_WIDTH_CHARS: &[char] = &['\u{200b}', '\u{200c}', '\u{200d}', '\u{2060}', '\u{feff}'];

pub fn sanitize(input: &str) -> String {
    let stripped = strip_zero_width(input);
    let joined = join_soft_breaks(&stripped);
    let spaced = space_letter_digit_boundaries(&joined);
    let collapsed = collapse_spaced_thousands(&spaced);
    normalize_paragraph_breaks(&collapsed)
}

fn strip_zero_width(input: &str) -> String {
    input.chars().filter(|c| !ZERO_WIDTH_CHARS.contains(c)).collect()
}

/// Joins a newline that splits a digit group (`69,\n375` -> `69,375`) and a
/// newline that splits a letter run from a digit run with no other
/// whitespace context (`across\n15` -> `across 15`, handled later by the
/// letter/digit spacing pass once the newline itself is gone).
fn join_soft_breaks(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(chars.len());
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c == '\n' {
            let is_double = chars.get(i + 1) == Some(&'\n');
            if is_double {
                out.push('\n');
                out.push('\n');
                i += 2;
                continue;
            }

            let prev_is_digit_or_comma = out
                .chars()
                .rev()
                .find(|c| !c.is_whitespace())
                .map(|c| c.is_ascii_digit() || c == ',')
                .unwrap_or(false);
            let next_non_ws = chars[i + 1..].iter().find(|c| !c.is_whitespace()).copied();
            let next_is_digit = next_non_ws.map(|c| c.is_ascii_digit()).unwrap_or(false);

            if prev_is_digit_or_comma && next_is_digit {
                i += 1;
                continue;
            }

            let prev_char = out.chars().rev().next();
            let next_is_alnum = next_non_ws.map(|c| c.is_alphanumeric()).unwrap_or(false);
            if prev_char.map(|c| c.is_alphanumeric()).unwrap_or(false) && next_is_alnum {
                out.push(' ');
                i += 1;
                continue;
            }

            out.push('\n');
            i += 1;
            continue;
        }
        out.push(c);
        i += 1;
    }
    out
}

/// Inserts a single space between a letter run and a digit run that abut
/// with no whitespace, outside of number literals themselves (so `15` stays
/// `15`, but `across15` becomes `across 15` and `15transactions` becomes
/// `15 transactions`).
fn space_letter_digit_boundaries(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(chars.len() + 8);
    for (i, &c) in chars.iter().enumerate() {
        if i > 0 {
            let prev = chars[i - 1];
            let letter_then_digit = prev.is_alphabetic() && c.is_ascii_digit();
            let digit_then_letter = prev.is_ascii_digit() && c.is_alphabetic();
            if letter_then_digit || digit_then_letter {
                out.push(' ');
            }
        }
        out.push(c);
    }
    out
}

/// Collapses `4, 000` -> `4,000`: a comma-space-digits sequence where the
/// space was only introduced by line wrapping, not real formatting.
fn collapse_spaced_thousands(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let chars: Vec<char> = input.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        if chars[i] == ',' && chars.get(i + 1) == Some(&' ') {
            let mut j = i + 2;
            let digit_start = j;
            while j < chars.len() && chars[j].is_ascii_digit() {
                j += 1;
            }
            if j > digit_start && (j - digit_start) <= 3 {
                out.push(',');
                out.extend(&chars[digit_start..j]);
                i = j;
                continue;
            }
        }
        out.push(chars[i]);
        i += 1;
    }
    out
}

/// Collapses 3+ consecutive newlines down to exactly 2 (one blank line
/// between paragraphs), leaving single newlines and paragraph breaks alone.
fn normalize_paragraph_breaks(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut newline_run = 0;
    for c in input.chars() {
        if c == '\n' {
            newline_run += 1;
            if newline_run <= 2 {
                out.push(c);
            }
        } else {
            newline_run = 0;
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_spec_example() {
        let input = "spent $69,\n375across15transactions";
        let result = sanitize(input);
        assert_eq!(result, "spent $69,375 across 15 transactions");
    }

    #[test]
    fn collapses_spaced_thousands() {
        assert_eq!(sanitize("total was 4, 000 dollars"), "total was 4,000 dollars");
    }

    #[test]
    fn strips_zero_width_characters() {
        let input = "bal\u{200b}ance: $100";
        assert_eq!(sanitize(input), "balance: $100");
    }

    #[test]
    fn collapses_three_or_more_newlines_to_two() {
        let input = "para one\n\n\n\npara two";
        assert_eq!(sanitize(input), "para one\n\npara two");
    }

    #[test]
    fn preserves_single_paragraph_break() {
        let input = "para one\n\npara two";
        assert_eq!(sanitize(input), "para one\n\npara two");
    }

    #[test]
    fn is_idempotent() {
        let input = "spent 69,\n375across15transactions\n\n\n\nmore text, 1, 234 here";
        let once = sanitize(input);
        let twice = sanitize(&once);
        assert_eq!(once, twice);
    }
}
