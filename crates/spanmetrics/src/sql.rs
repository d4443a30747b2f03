//! SQL text helpers shared by the compilers and the DDL renderer

/// Append a single-quoted string literal, backslash-escaping `\` and `'`
pub fn append_string(b: &mut String, s: &str) {
    b.reserve(s.len() + 2);
    b.push('\'');
    for c in s.chars() {
        if c == '\'' || c == '\\' {
            b.push('\\');
        }
        b.push(c);
    }
    b.push('\'');
}

pub fn quote_string(s: &str) -> String {
    let mut b = String::new();
    append_string(&mut b, s);
    b
}

/// Identifier as-is when it is plain, otherwise backtick-quoted
pub fn quote_ident(s: &str) -> String {
    let plain = !s.is_empty()
        && !s.starts_with(|c: char| c.is_ascii_digit())
        && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if plain {
        return s.to_string();
    }
    format!("`{}`", s.replace('\\', "\\\\").replace('`', "\\`"))
}

/// Escape `%` and `_` so the text matches literally inside a LIKE pattern
pub fn escape_like(s: &str) -> String {
    let mut b = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '%' | '_' | '\\') {
            b.push('\\');
        }
        b.push(c);
    }
    b
}
