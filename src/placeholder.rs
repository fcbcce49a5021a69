//! Placeholder rewriting
//!
//! Statement builders emit `?` for every bound argument. Postgres wants
//! positional `$1`, `$2`, ... instead, numbered in the order the arguments were
//! bound. `??` is the escape for a literal `?` (needed for the jsonb `?`, `?|`
//! and `?&` operators).

/// Postgres caps a single statement at this many bind parameters
pub const MAX_PLACEHOLDERS: usize = u16::MAX as usize;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlaceholderError {
    #[error("statement has more than {max} placeholders")]
    TooMany { max: usize },

    #[error("statement has {placeholders} placeholders but {arguments} arguments")]
    ArgumentMismatch { placeholders: usize, arguments: usize },
}

/// Rewrite `?` placeholders into `$N` form.
///
/// Text outside placeholders is copied verbatim, so SQL without any `?` comes
/// back unchanged.
pub fn replace_placeholders(sql: &str) -> Result<String, PlaceholderError> {
    let mut out = String::with_capacity(sql.len() + 8);
    rewrite_into(sql, &mut out)?;
    Ok(out)
}

/// Append the rewritten form of `sql` to `out` and return how many
/// placeholders were numbered.
pub(crate) fn rewrite_into(sql: &str, out: &mut String) -> Result<usize, PlaceholderError> {
    let mut count = 0usize;
    let mut rest = sql;

    while let Some(pos) = rest.find('?') {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];

        if let Some(escaped) = after.strip_prefix('?') {
            out.push('?');
            rest = escaped;
            continue;
        }

        count += 1;
        if count > MAX_PLACEHOLDERS {
            return Err(PlaceholderError::TooMany {
                max: MAX_PLACEHOLDERS,
            });
        }
        out.push('$');
        out.push_str(&count.to_string());
        rest = after;
    }

    out.push_str(rest);
    Ok(count)
}
