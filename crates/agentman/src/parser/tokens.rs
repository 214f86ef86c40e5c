//! Argument tokenizing for directive bodies.

/// Split argument text into tokens.
///
/// Whitespace (including newlines from continuations) separates tokens.
/// Double quotes group text and honor `\"` and `\\`; single quotes group text
/// literally. Quoted and unquoted parts adjacent to each other form one token.
pub fn split_args(input: &str) -> Result<Vec<String>, String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' => {
                in_token = true;
                loop {
                    match chars.next() {
                        Some('"') => break,
                        Some('\\') => match chars.peek() {
                            Some(&next @ ('"' | '\\')) => {
                                current.push(next);
                                chars.next();
                            }
                            _ => current.push('\\'),
                        },
                        Some(ch) => current.push(ch),
                        None => return Err("unterminated double quote".to_string()),
                    }
                }
            }
            '\'' => {
                in_token = true;
                loop {
                    match chars.next() {
                        Some('\'') => break,
                        Some(ch) => current.push(ch),
                        None => return Err("unterminated single quote".to_string()),
                    }
                }
            }
            c if c.is_whitespace() => {
                if in_token {
                    tokens.push(std::mem::take(&mut current));
                    in_token = false;
                }
            }
            c => {
                in_token = true;
                current.push(c);
            }
        }
    }
    if in_token {
        tokens.push(current);
    }
    Ok(tokens)
}

/// Split a name list on commas and whitespace (`a, b c` -> `[a, b, c]`).
pub fn split_list(input: &str) -> Result<Vec<String>, String> {
    Ok(split_args(input)?
        .iter()
        .flat_map(|t| t.split(','))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect())
}

/// Free text argument: a single fully quoted string is unquoted, anything
/// else is kept as written.
pub fn unquote(text: &str) -> Result<String, String> {
    let Some(first) = text.chars().next() else {
        return Ok(String::new());
    };
    if first != '"' && first != '\'' {
        return Ok(text.to_string());
    }
    let tokens = split_args(text)?;
    match tokens.as_slice() {
        [single] if text.ends_with(first) => Ok(single.clone()),
        _ => Ok(text.to_string()),
    }
}

/// Quote a value so [`split_args`] reads it back as one token.
pub fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\\n"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Split Dockerfile instruction text into words, keeping quotes and escapes
/// as written. Quoted runs keep their inner whitespace; a continuation break
/// inside a quote becomes a space. Never fails: an open quote runs to the end.
pub fn split_words(input: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut chars = input.chars();

    while let Some(c) = chars.next() {
        match (quote, c) {
            (Some(_), '\n') => current.push(' '),
            (Some('"'), '\\') => {
                current.push(c);
                if let Some(next) = chars.next() {
                    current.push(next);
                }
            }
            (Some(q), c) if c == q => {
                current.push(c);
                quote = None;
            }
            (Some(_), c) => current.push(c),
            (None, '"' | '\'') => {
                current.push(c);
                quote = Some(c);
            }
            (None, c) if c.is_whitespace() => {
                if !current.is_empty() {
                    words.push(std::mem::take(&mut current));
                }
            }
            (None, c) => current.push(c),
        }
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}

pub fn parse_bool(s: &str) -> Option<bool> {
    match s.to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Some(true),
        "false" | "no" | "off" | "0" => Some(false),
        _ => None,
    }
}

/// `CMD`/`ENTRYPOINT` argument: JSON array (exec form) or shell-form tokens.
pub fn parse_argv(text: &str) -> Result<Vec<String>, String> {
    if text.starts_with('[') {
        return serde_json::from_str::<Vec<String>>(text)
            .map_err(|e| format!("invalid JSON array: {e}"));
    }
    split_args(text)
}
