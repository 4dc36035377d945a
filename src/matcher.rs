use crate::error::Error;

/// Decides whether `name` is covered by the glob `pattern`.
///
/// Implementations must be pure and stateless; the bus calls the matcher
/// in both directions to realize its bi-directional wildcard rule.
pub trait Matcher: Send + Sync {
    fn matches(&self, pattern: &str, name: &str) -> Result<bool, Error>;
}

/// Default matcher with path-style glob semantics.
///
/// `*` matches any run of non-separator characters, `?` exactly one,
/// `[...]` and `[^...]` character classes with ranges, `\` escapes the
/// next character. A trailing escape, an unterminated class or a
/// malformed range is a syntax error, reported even when the walk has
/// already failed.
#[derive(Debug, Default, Clone, Copy)]
pub struct PathMatch;

impl Matcher for PathMatch {
    fn matches(&self, pattern: &str, name: &str) -> Result<bool, Error> {
        path_match(pattern, name)
    }
}

fn path_match(pattern: &str, name: &str) -> Result<bool, Error> {
    let mut pattern = pattern;
    let mut name = name;

    'pattern: while !pattern.is_empty() {
        let (star, chunk, rest) = scan_chunk(pattern);
        pattern = rest;

        if star && chunk.is_empty() {
            // Trailing * matches the rest of the name unless it would
            // have to cross a separator.
            return Ok(!name.contains('/'));
        }

        if let Some(t) = match_chunk(chunk, name)? {
            // The chunk may only consume a partial name when more
            // pattern is left to account for the remainder.
            if t.is_empty() || !pattern.is_empty() {
                name = t;
                continue 'pattern;
            }
        }

        if star {
            // Re-anchor the chunk one character further, stopping at a
            // separator, which * never crosses.
            for (i, c) in name.char_indices() {
                if c == '/' {
                    break;
                }
                if let Some(t) = match_chunk(chunk, &name[i + c.len_utf8()..])? {
                    if pattern.is_empty() && !t.is_empty() {
                        continue;
                    }
                    name = t;
                    continue 'pattern;
                }
            }
        }

        // No match; the remainder of the pattern must still be
        // syntactically valid.
        while !pattern.is_empty() {
            let (_, chunk, rest) = scan_chunk(pattern);
            pattern = rest;
            match_chunk(chunk, "")?;
        }
        return Ok(false);
    }

    Ok(name.is_empty())
}

/// Splits the pattern into a leading run of stars and the literal chunk
/// up to (but excluding) the next unbracketed star.
fn scan_chunk(pattern: &str) -> (bool, &str, &str) {
    let mut pattern = pattern;
    let mut star = false;
    while let Some(rest) = pattern.strip_prefix('*') {
        pattern = rest;
        star = true;
    }

    let bytes = pattern.as_bytes();
    let mut in_range = false;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => {
                if i + 1 < bytes.len() {
                    i += 1;
                }
            }
            b'[' => in_range = true,
            b']' => in_range = false,
            b'*' => {
                if !in_range {
                    break;
                }
            }
            _ => {}
        }
        i += 1;
    }
    (star, &pattern[..i], &pattern[i..])
}

/// Matches the star-free chunk against the head of `s`, returning the
/// unconsumed tail on success. After a mismatch the chunk is still
/// parsed to the end so malformed patterns surface regardless; an empty
/// `s` only marks the walk failed, it never stops the parse.
fn match_chunk<'a>(chunk: &str, s: &'a str) -> Result<Option<&'a str>, Error> {
    let mut chunk = chunk;
    let mut s = s;
    let mut failed = false;

    while let Some(pc) = chunk.chars().next() {
        match pc {
            '[' => {
                chunk = &chunk[1..];
                let mut r = '\0';
                match s.chars().next() {
                    Some(c) if !failed => {
                        r = c;
                        s = &s[c.len_utf8()..];
                    }
                    Some(_) => {}
                    None => failed = true,
                }
                let negated = match chunk.strip_prefix('^') {
                    Some(rest) => {
                        chunk = rest;
                        true
                    }
                    None => false,
                };
                let mut matched = false;
                let mut nrange = 0;
                loop {
                    if chunk.starts_with(']') && nrange > 0 {
                        chunk = &chunk[1..];
                        break;
                    }
                    let (lo, rest) = class_char(chunk)?;
                    chunk = rest;
                    let mut hi = lo;
                    if chunk.starts_with('-') {
                        let (h, rest) = class_char(&chunk[1..])?;
                        hi = h;
                        chunk = rest;
                    }
                    if lo <= r && r <= hi {
                        matched = true;
                    }
                    nrange += 1;
                }
                if matched == negated {
                    failed = true;
                }
            }
            '?' => {
                chunk = &chunk[1..];
                match s.chars().next() {
                    Some(c) if !failed => {
                        if c == '/' {
                            failed = true;
                        }
                        s = &s[c.len_utf8()..];
                    }
                    Some(_) => {}
                    None => failed = true,
                }
            }
            '\\' => {
                chunk = &chunk[1..];
                let Some(ec) = chunk.chars().next() else {
                    return Err(Error::BadPattern);
                };
                chunk = &chunk[ec.len_utf8()..];
                eat_literal(ec, &mut s, &mut failed);
            }
            _ => {
                chunk = &chunk[pc.len_utf8()..];
                eat_literal(pc, &mut s, &mut failed);
            }
        }
    }

    Ok(if failed { None } else { Some(s) })
}

/// Consumes one character of `s` and requires it to equal `want`. An
/// exhausted `s` fails the walk instead of stopping it, so the caller
/// keeps parsing the chunk for syntax errors.
fn eat_literal<'a>(want: char, s: &mut &'a str, failed: &mut bool) {
    if *failed {
        return;
    }
    match s.chars().next() {
        Some(c) => {
            if want != c {
                *failed = true;
            }
            *s = &s[c.len_utf8()..];
        }
        None => *failed = true,
    }
}

/// One class member, possibly escaped. Errors on a dangling escape, an
/// empty member position or a class that ends right after the member.
fn class_char(chunk: &str) -> Result<(char, &str), Error> {
    let mut chunk = chunk;
    match chunk.chars().next() {
        None | Some('-') | Some(']') => return Err(Error::BadPattern),
        Some('\\') => chunk = &chunk[1..],
        Some(_) => {}
    }
    let Some(c) = chunk.chars().next() else {
        return Err(Error::BadPattern);
    };
    let rest = &chunk[c.len_utf8()..];
    if rest.is_empty() {
        return Err(Error::BadPattern);
    }
    Ok((c, rest))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn match_table() {
        let cases = [
            ("abc", "abc", true),
            ("abc", "abd", false),
            ("", "", true),
            ("", "a", false),
            ("*", "abc", true),
            ("*", "", true),
            ("*", "a/b", false),
            ("*c", "abc", true),
            ("*x", "xxx", true),
            ("a*", "a", true),
            ("a*", "abc", true),
            ("a*", "ab/c", false),
            ("a*/b", "abc/b", true),
            ("a*/b", "a/c/b", false),
            ("a*b*c*d*e*/f", "axbxcxdxe/f", true),
            ("a*b*c*d*e*/f", "axbxcxdxexxx/f", true),
            ("a*b*c*d*e*/f", "axbxcxdxe/xxx/f", false),
            ("a*b?c*x", "abxbbxdbxebxczzx", true),
            ("a*b?c*x", "abxbbxdbxebxczzy", false),
            ("ab[c]", "abc", true),
            ("ab[b-d]", "abc", true),
            ("ab[e-g]", "abc", false),
            ("ab[^c]", "abc", false),
            ("ab[^b-d]", "abc", false),
            ("ab[^e-g]", "abc", true),
            ("a\\*b", "a*b", true),
            ("a\\*b", "ab", false),
            ("a?b", "a☺b", true),
            ("a[^a]b", "a☺b", true),
            ("a???b", "a☺b", false),
            ("a[^a][^a][^a]b", "a☺b", false),
            ("[a-ζ]*", "α", true),
            ("*[a-ζ]", "A", false),
            ("a?b", "a/b", false),
            ("a*b", "a/b", false),
            ("[\\]a]", "]", true),
            ("[\\-]", "-", true),
            ("[x\\-]", "x", true),
            ("[x\\-]", "-", true),
            ("[x\\-]", "z", false),
            ("[\\-x]", "x", true),
            ("[\\-x]", "-", true),
            ("[\\-x]", "a", false),
        ];
        for (pattern, name, want) in cases {
            assert_eq!(
                path_match(pattern, name).unwrap(),
                want,
                "match({pattern:?}, {name:?})"
            );
        }
    }

    #[test]
    fn malformed_patterns_error() {
        let malformed = [
            "\\", "a\\", "[", "[^", "[]", "[-]", "[x-]", "[-x]", "a[", "ab[", "a[x-]", "[a-b-c]",
        ];
        for pattern in malformed {
            assert_eq!(
                path_match(pattern, "x"),
                Err(Error::BadPattern),
                "match({pattern:?}, \"x\")"
            );
        }
    }

    #[test]
    fn syntax_is_checked_after_a_failed_walk() {
        assert_eq!(path_match("ab[", "abab"), Err(Error::BadPattern));
        assert_eq!(path_match("z\\", "abab"), Err(Error::BadPattern));
    }

    #[test]
    fn trait_object_dispatch() {
        let matcher: &dyn Matcher = &PathMatch;
        assert!(matcher.matches("te*", "test").unwrap());
        assert!(matcher.matches("test", "te*").is_ok());
        assert!(matcher.matches("[", "---").is_err());
    }
}
