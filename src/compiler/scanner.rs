/// Lightweight identifier extraction for dependency tracking
///
/// This is a lexical scan, not an expression parser. Its contract:
/// - `'`, `"` and `` ` `` each toggle string mode, whichever opened it, and
///   escapes are not tracked.
/// - Outside string mode every maximal run of identifier characters
///   (alphanumerics, `_` and `$`) is a token. Keywords and numbers are not
///   filtered out.
/// - `.` and every other symbol separate tokens, so `user.name` yields
///   `user` and `name`.
/// - Duplicates are kept, order follows the source.
///
/// Callers decide relevance by checking tokens against declared variables.

pub fn scan(expr: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_string = false;

    for ch in expr.chars() {
        if matches!(ch, '\'' | '"' | '`') {
            if !in_string && !current.is_empty() {
                tokens.push(std::mem::take(&mut current));
            }
            current.clear();
            in_string = !in_string;
            continue;
        }

        if in_string {
            continue;
        }

        if is_token_char(ch) {
            current.push(ch);
        } else if !current.is_empty() {
            tokens.push(std::mem::take(&mut current));
        }
    }

    if !in_string && !current.is_empty() {
        tokens.push(current);
    }

    tokens
}

/// Characters a declared variable name may contain
pub fn is_token_char(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_' || ch == '$'
}

/// Tokens of `expr` that name one of `known`, in scan order, duplicates kept
pub fn references<'a, I>(expr: &str, known: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str> + Clone,
{
    scan(expr)
        .into_iter()
        .filter(|token| known.clone().into_iter().any(|name| name == token))
        .collect()
}
