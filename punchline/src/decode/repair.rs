//! Lexical clean-up applied before a second structural parse attempt.

/// Normalize a candidate so that near-JSON has a chance to parse.
///
/// - typographic quotes become straight quotes
/// - fully escaped JSON (`{\"a\": 1}`) is unescaped
/// - control characters are dropped; raw line breaks inside strings become spaces
/// - literal `\n`, `\t`, `\r` sequences between tokens collapse to a space
/// - trailing commas before `}` or `]` are removed
pub fn sanitize(candidate: &str) -> String {
    let normalized = normalize_quotes(candidate);
    let unescaped = unescape_wrapped(&normalized);
    scrub(&unescaped)
}

fn normalize_quotes(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '\u{201C}' | '\u{201D}' | '\u{201E}' | '\u{201F}' | '\u{2033}' => '"',
            '\u{2018}' | '\u{2019}' | '\u{201A}' | '\u{201B}' | '\u{2032}' => '\'',
            other => other,
        })
        .collect()
}

/// Unescape `\"` when the text contains no bare quote at all.
fn unescape_wrapped(text: &str) -> String {
    let mut has_bare_quote = false;
    let mut has_escaped_quote = false;
    let mut prev = '\0';
    for c in text.chars() {
        if c == '"' {
            if prev == '\\' {
                has_escaped_quote = true;
            } else {
                has_bare_quote = true;
            }
        }
        prev = c;
    }

    if has_escaped_quote && !has_bare_quote {
        text.replace("\\\"", "\"")
    } else {
        text.to_string()
    }
}

fn scrub(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut escaped = false;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        if in_string {
            match c {
                _ if escaped => {
                    escaped = false;
                    out.push(c);
                }
                '\\' => {
                    escaped = true;
                    out.push(c);
                }
                '"' => {
                    in_string = false;
                    out.push(c);
                }
                '\n' | '\r' | '\t' => out.push(' '),
                _ if c.is_control() => {}
                _ => out.push(c),
            }
            i += 1;
            continue;
        }

        match c {
            '"' => {
                in_string = true;
                out.push(c);
            }
            '\\' if matches!(chars.get(i + 1), Some('n' | 't' | 'r')) => {
                out.push(' ');
                i += 1;
            }
            ',' if next_significant(&chars, i + 1).is_some_and(|n| n == '}' || n == ']') => {}
            '\n' | '\r' | '\t' => out.push(c),
            _ if c.is_control() => {}
            _ => out.push(c),
        }
        i += 1;
    }

    out
}

fn next_significant(chars: &[char], from: usize) -> Option<char> {
    let mut j = from;
    while j < chars.len() {
        let c = chars[j];
        if c.is_whitespace() {
            j += 1;
        } else if c == '\\' && matches!(chars.get(j + 1), Some('n' | 't' | 'r')) {
            j += 2;
        } else {
            return Some(c);
        }
    }
    None
}
