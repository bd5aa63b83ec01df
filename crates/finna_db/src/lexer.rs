//! Character-level SQL scanning shared by the DDL parser and the in-memory catalog.
//!
//! Everything here is quote aware: single quotes, double quotes and backticks
//! are treated as opaque literals, so separators inside them never split.

/// Remove `--`, `#` and `/* */` comments while leaving quoted text untouched.
pub fn strip_comments(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len());
    let mut chars = sql.chars().peekable();
    let mut quote: Option<char> = None;
    let mut in_line_comment = false;
    let mut in_block_comment = false;

    while let Some(ch) = chars.next() {
        if in_line_comment {
            if ch == '\n' {
                in_line_comment = false;
                out.push('\n');
            }
            continue;
        }
        if in_block_comment {
            if ch == '*' && matches!(chars.peek(), Some('/')) {
                chars.next();
                in_block_comment = false;
                out.push(' ');
            }
            continue;
        }
        if let Some(q) = quote {
            out.push(ch);
            if ch == '\\' && q != '`' {
                if let Some(escaped) = chars.next() {
                    out.push(escaped);
                }
                continue;
            }
            if ch == q {
                if chars.peek() == Some(&q) {
                    out.push(q);
                    chars.next();
                    continue;
                }
                quote = None;
            }
            continue;
        }

        match ch {
            '-' if matches!(chars.peek(), Some('-')) => {
                chars.next();
                in_line_comment = true;
            }
            '#' => in_line_comment = true,
            '/' if matches!(chars.peek(), Some('*')) => {
                chars.next();
                in_block_comment = true;
            }
            '\'' | '"' | '`' => {
                quote = Some(ch);
                out.push(ch);
            }
            _ => out.push(ch),
        }
    }

    out
}

/// Split a script into statements on `;` outside quotes and comments.
///
/// Statements are trimmed; empty statements are dropped.
pub fn split_statements(sql: &str) -> Vec<String> {
    split_top_level(&strip_comments(sql), ';', false)
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Split on `sep` where it appears outside quotes (and, when `respect_parens`
/// is set, outside parentheses).
pub fn split_top_level(text: &str, sep: char, respect_parens: bool) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut start = 0;

    for (idx, ch) in text.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if ch == '\\' && q != '`' {
                escaped = true;
            } else if ch == q {
                quote = None;
            }
            continue;
        }
        match ch {
            '\'' | '"' | '`' => quote = Some(ch),
            '(' if respect_parens => depth += 1,
            ')' if respect_parens => depth = depth.saturating_sub(1),
            c if c == sep && depth == 0 => {
                parts.push(&text[start..idx]);
                start = idx + ch.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&text[start..]);
    parts
}

/// Byte index of the parenthesis closing the one opened at `open`.
pub fn matching_paren(text: &str, open: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for (idx, ch) in text[open..].char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if ch == '\\' && q != '`' {
                escaped = true;
            } else if ch == q {
                quote = None;
            }
            continue;
        }
        match ch {
            '\'' | '"' | '`' => quote = Some(ch),
            '(' => depth += 1,
            ')' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(open + idx);
                }
            }
            _ => {}
        }
    }
    None
}

/// Inner text of the first parenthesised group, if any.
pub fn first_paren_group(text: &str) -> Option<&str> {
    let open = text.find('(')?;
    let close = matching_paren(text, open)?;
    Some(&text[open + 1..close])
}

/// Split off the first whitespace-delimited token, honouring quotes and
/// parentheses so `enum('a', 'b')` and `` `my col` `` stay whole.
pub fn next_token(text: &str) -> Option<(&str, &str)> {
    let text = text.trim_start();
    if text.is_empty() {
        return None;
    }
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for (idx, ch) in text.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if ch == '\\' && q != '`' {
                escaped = true;
            } else if ch == q {
                quote = None;
            }
            continue;
        }
        match ch {
            '\'' | '"' | '`' => quote = Some(ch),
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            c if c.is_whitespace() && depth == 0 => {
                return Some((&text[..idx], &text[idx..]));
            }
            _ => {}
        }
    }
    Some((text, ""))
}

/// Remove one level of identifier quoting (backticks or double quotes).
pub fn unquote_ident(ident: &str) -> String {
    let trimmed = ident.trim();
    for q in ['`', '"'] {
        if trimmed.len() >= 2 && trimmed.starts_with(q) && trimmed.ends_with(q) {
            let inner = &trimmed[1..trimmed.len() - 1];
            let doubled: String = [q, q].iter().collect();
            return inner.replace(&doubled, &q.to_string());
        }
    }
    trimmed.to_string()
}

/// Decode a single-quoted SQL string literal. Returns `None` when `text` is
/// not a quoted literal.
pub fn unquote_literal(text: &str) -> Option<String> {
    let trimmed = text.trim();
    let quote = trimmed.chars().next().filter(|c| *c == '\'' || *c == '"')?;
    if trimmed.len() < 2 || !trimmed.ends_with(quote) {
        return None;
    }
    let inner = &trimmed[1..trimmed.len() - 1];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch == '\\' {
            match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some('0') => out.push('\0'),
                Some(other) => out.push(other),
                None => {}
            }
        } else if ch == quote && chars.peek() == Some(&quote) {
            chars.next();
            out.push(quote);
        } else {
            out.push(ch);
        }
    }
    Some(out)
}

/// Quote a MySQL identifier with backticks.
pub fn quote_ident(name: &str) -> String {
    let mut escaped = String::with_capacity(name.len() + 2);
    escaped.push('`');
    for ch in name.chars() {
        if ch == '`' {
            escaped.push('`');
        }
        escaped.push(ch);
    }
    escaped.push('`');
    escaped
}

/// Quote a value as a single-quoted SQL string literal.
pub fn quote_literal(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len() + 2);
    escaped.push('\'');
    for ch in value.chars() {
        match ch {
            '\'' => escaped.push_str("''"),
            '\\' => escaped.push_str("\\\\"),
            _ => escaped.push(ch),
        }
    }
    escaped.push('\'');
    escaped
}

/// Leading alphabetic keyword, upper-cased.
pub fn first_keyword(sql: &str) -> Option<String> {
    let mut current = String::new();
    for ch in sql.chars() {
        if ch.is_ascii_alphabetic() {
            current.push(ch);
        } else if !current.is_empty() {
            break;
        }
    }
    if current.is_empty() {
        None
    } else {
        Some(current.to_ascii_uppercase())
    }
}

/// Identifier-like tokens outside quotes, upper-cased.
pub fn tokens_upper(sql: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    for ch in sql.chars() {
        if let Some(q) = quote {
            if ch == q {
                quote = None;
            }
            continue;
        }
        if ch == '\'' || ch == '"' || ch == '`' {
            quote = Some(ch);
            if !current.is_empty() {
                tokens.push(current.to_ascii_uppercase());
                current.clear();
            }
            continue;
        }
        if ch.is_ascii_alphanumeric() || ch == '_' {
            current.push(ch);
        } else if !current.is_empty() {
            tokens.push(current.to_ascii_uppercase());
            current.clear();
        }
    }
    if !current.is_empty() {
        tokens.push(current.to_ascii_uppercase());
    }
    tokens
}

/// True when `words` appear consecutively among the unquoted tokens.
pub fn contains_keywords(sql: &str, words: &[&str]) -> bool {
    let tokens = tokens_upper(sql);
    if words.is_empty() || tokens.len() < words.len() {
        return false;
    }
    tokens
        .windows(words.len())
        .any(|w| w.iter().zip(words).all(|(a, b)| a == b))
}

pub fn strip_trailing_semicolon(sql: &str) -> &str {
    let trimmed = sql.trim();
    if let Some(stripped) = trimmed.strip_suffix(';') {
        stripped.trim_end()
    } else {
        trimmed
    }
}
