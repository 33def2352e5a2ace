//! Regex source scanning helpers.
//!
//! Extracts the literal text a regex fragment is guaranteed to match (used
//! for locator anchors) and finds group boundaries without compiling.

/// One unit of guaranteed text in a regex fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Piece {
    Char(char),
    /// Anything whose matched text is not fixed.
    Break,
}

/// Scans a regex fragment into literal characters and breaks.
///
/// Whitespace classes become `' '`, line anchors become `'\n'`, optional
/// items and every group, class or wildcard become [`Piece::Break`].
pub(crate) fn literal_pieces(fragment: &str) -> Vec<Piece> {
    let mut pieces = Vec::new();
    let mut iter = fragment.char_indices().peekable();

    while let Some((idx, c)) = iter.next() {
        match c {
            '\\' => match iter.next() {
                Some((_, 's' | 't')) => pieces.push(Piece::Char(' ')),
                Some((_, 'n' | 'r')) => pieces.push(Piece::Char('\n')),
                Some((_, escaped)) if escaped.is_ascii_alphanumeric() => pieces.push(Piece::Break),
                Some((_, escaped)) => pieces.push(Piece::Char(escaped)),
                None => pieces.push(Piece::Break),
            },
            '^' | '$' => pieces.push(Piece::Char('\n')),
            '.' | '|' | ')' => pieces.push(Piece::Break),
            '(' => {
                let end = closing_paren(fragment, idx).unwrap_or(fragment.len());
                while iter.peek().is_some_and(|(next, _)| *next <= end) {
                    iter.next();
                }
                pieces.push(Piece::Break);
            }
            '[' => {
                let end = closing_bracket(fragment, idx).unwrap_or(fragment.len());
                while iter.peek().is_some_and(|(next, _)| *next <= end) {
                    iter.next();
                }
                pieces.push(Piece::Break);
            }
            '*' | '?' => quantify(&mut pieces, true),
            '+' => quantify(&mut pieces, false),
            '{' => match counted_repetition(&fragment[idx..]) {
                Some((len, min)) => {
                    let end = idx + len;
                    while iter.peek().is_some_and(|(next, _)| *next < end) {
                        iter.next();
                    }
                    quantify(&mut pieces, min == 0);
                }
                None => pieces.push(Piece::Char('{')),
            },
            other => pieces.push(Piece::Char(other)),
        }
    }

    pieces
}

fn quantify(pieces: &mut [Piece], optional: bool) {
    if let Some(last) = pieces.last_mut() {
        match last {
            Piece::Char(' ') | Piece::Break => {}
            Piece::Char(_) if optional => *last = Piece::Break,
            Piece::Char(_) => {}
        }
    }
}

/// Parses `{m}`, `{m,}` or `{m,n}` at the start of `src`, returning the
/// consumed length and the minimum count.
fn counted_repetition(src: &str) -> Option<(usize, usize)> {
    let close = src.find('}')?;
    let body = &src[1..close];
    let min = body.split(',').next()?.trim();
    if body.is_empty() || !body.chars().all(|c| c.is_ascii_digit() || c == ',') {
        return None;
    }
    let min = min.parse().ok()?;
    Some((close + 1, min))
}

/// Literal text at the end of a fragment, after its last break.
pub(crate) fn trailing_literal(fragment: &str) -> String {
    let pieces = literal_pieces(fragment);
    let mut out: Vec<char> = pieces
        .iter()
        .rev()
        .map_while(|p| match p {
            Piece::Char(c) => Some(*c),
            Piece::Break => None,
        })
        .collect();
    out.reverse();
    out.into_iter().collect()
}

/// Literal text at the start of a fragment, before its first break.
pub(crate) fn leading_literal(fragment: &str) -> String {
    literal_pieces(fragment)
        .iter()
        .map_while(|p| match p {
            Piece::Char(c) => Some(*c),
            Piece::Break => None,
        })
        .collect()
}

/// Byte index of the `)` closing the group opened at `open`.
pub(crate) fn closing_paren(src: &str, open: usize) -> Option<usize> {
    let bytes = src.as_bytes();
    let mut depth = 0usize;
    let mut i = open;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => {
                i += 2;
                continue;
            }
            b'[' => {
                i = closing_bracket(src, i)? + 1;
                continue;
            }
            b'(' => depth += 1,
            b')' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
        i += 1;
    }
    None
}

/// Byte index of the `]` closing the character class opened at `open`.
fn closing_bracket(src: &str, open: usize) -> Option<usize> {
    let bytes = src.as_bytes();
    let mut i = open + 1;
    if bytes.get(i) == Some(&b'^') {
        i += 1;
    }
    if bytes.get(i) == Some(&b']') {
        i += 1;
    }
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b']' => return Some(i),
            _ => i += 1,
        }
    }
    None
}

/// Inner pattern when `src` is exactly one parenthesized group.
pub(crate) fn single_group_inner(src: &str) -> Option<&str> {
    let src = src.trim();
    if !src.starts_with('(') || closing_paren(src, 0)? != src.len() - 1 {
        return None;
    }
    Some(&src[1..src.len() - 1])
}

/// A named capture group found in regex source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct NamedGroup {
    pub name: String,
    /// Byte range of the whole group including parentheses.
    pub start: usize,
    pub end: usize,
    /// Pattern between the name and the closing parenthesis.
    pub inner: String,
}

/// Finds every `(?P<name>...)` / `(?<name>...)` group, outermost first.
pub(crate) fn named_groups(src: &str) -> Vec<NamedGroup> {
    let bytes = src.as_bytes();
    let mut groups = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => {
                i += 2;
                continue;
            }
            b'[' => {
                i = closing_bracket(src, i).map_or(bytes.len(), |end| end + 1);
                continue;
            }
            b'(' => {
                let rest = &src[i..];
                let prefix = if rest.starts_with("(?P<") {
                    4
                } else if rest.starts_with("(?<") {
                    3
                } else {
                    0
                };
                if prefix > 0 {
                    if let (Some(name_end), Some(close)) = (rest.find('>'), closing_paren(src, i)) {
                        groups.push(NamedGroup {
                            name: rest[prefix..name_end].to_string(),
                            start: i,
                            end: close + 1,
                            inner: src[i + name_end + 1..close].to_string(),
                        });
                    }
                }
            }
            _ => {}
        }
        i += 1;
    }
    groups
}

/// Returns the pattern when it can be embedded standalone in another regex.
pub(crate) fn embeddable_pattern(pattern: &str) -> Option<String> {
    if pattern.is_empty() || pattern.contains("(?P<") || pattern.contains("(?<") {
        return None;
    }
    regex::Regex::new(pattern).ok()?;
    Some(pattern.to_string())
}
