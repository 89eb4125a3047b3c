//! Lexical helpers shared by the AST builder: literal decoding.

/// Decodes the escape sequences of a string or template body.
pub fn unescape(raw: &str) -> Result<String, String> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        let e = match chars.next() {
            Some(e) => e,
            None => return Err("Unterminated escape sequence".to_string()),
        };
        match e {
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            'b' => out.push('\u{8}'),
            'f' => out.push('\u{c}'),
            'v' => out.push('\u{b}'),
            '0' if !chars.peek().map_or(false, |c| c.is_ascii_digit()) => out.push('\0'),
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
            }
            '\n' | '\u{2028}' | '\u{2029}' => {}
            'x' => {
                let hex: String = chars.by_ref().take(2).collect();
                let code = u32::from_str_radix(&hex, 16)
                    .map_err(|_| format!("Invalid hexadecimal escape sequence \\x{}", hex))?;
                out.push(char::from_u32(code).unwrap_or('\u{FFFD}'));
            }
            'u' => {
                let code = read_unicode_escape(&mut chars)?;
                if (0xD800..0xDC00).contains(&code) {
                    // High surrogate: try to pair it with a following \uXXXX.
                    let mut lookahead = chars.clone();
                    if lookahead.next() == Some('\\') && lookahead.next() == Some('u') {
                        if let Ok(low) = read_unicode_escape(&mut lookahead) {
                            if (0xDC00..0xE000).contains(&low) {
                                chars = lookahead;
                                let combined = 0x10000 + ((code - 0xD800) << 10) + (low - 0xDC00);
                                out.push(char::from_u32(combined).unwrap_or('\u{FFFD}'));
                                continue;
                            }
                        }
                    }
                    out.push('\u{FFFD}');
                } else {
                    out.push(char::from_u32(code).unwrap_or('\u{FFFD}'));
                }
            }
            other => out.push(other),
        }
    }
    Ok(out)
}

fn read_unicode_escape<I>(chars: &mut std::iter::Peekable<I>) -> Result<u32, String>
where
    I: Iterator<Item = char>,
{
    let digits: String = if chars.peek() == Some(&'{') {
        chars.next();
        let mut s = String::new();
        for c in chars.by_ref() {
            if c == '}' {
                break;
            }
            s.push(c);
        }
        s
    } else {
        chars.by_ref().take(4).collect()
    };
    u32::from_str_radix(&digits, 16).map_err(|_| format!("Invalid Unicode escape sequence \\u{}", digits))
}

/// Parses a numeric literal as written in source.
pub fn parse_numeric_literal(raw: &str) -> Option<f64> {
    let s: String = raw.chars().filter(|c| *c != '_').collect();
    let radix = |prefix: &str, radix: u32| -> Option<f64> {
        let digits = &s[prefix.len()..];
        u64::from_str_radix(digits, radix).ok().map(|v| v as f64)
    };
    let lower = s.to_ascii_lowercase();
    if lower.starts_with("0x") {
        radix("0x", 16)
    } else if lower.starts_with("0o") {
        radix("0o", 8)
    } else if lower.starts_with("0b") {
        radix("0b", 2)
    } else {
        s.parse::<f64>().ok()
    }
}

/// Strips the quotes of a string literal token and decodes it.
pub fn string_literal_value(token: &str) -> Result<String, String> {
    if token.len() < 2 {
        return Err(format!("Invalid string literal {}", token));
    }
    unescape(&token[1..token.len() - 1])
}

/// Splits a regex literal token `/body/flags`.
pub fn split_regex_literal(token: &str) -> (String, String) {
    match token.rfind('/') {
        Some(idx) if idx > 0 => (token[1..idx].to_string(), token[idx + 1..].to_string()),
        _ => (token.to_string(), String::new()),
    }
}
