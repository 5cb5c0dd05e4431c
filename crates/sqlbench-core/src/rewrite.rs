//! SQL canonicalization applied to both sides of a Query comparison, so
//! cosmetic `ROUND`/`DISTINCT`/comment differences do not decide a verdict;
//! the task's `conditions` flags do.

use regex::{Captures, Regex};
use std::sync::OnceLock;

fn block_comment_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)/\*.*?\*/").expect("static pattern"))
}

fn line_comment_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"--[^\r\n]*").expect("static pattern"))
}

fn blank_lines_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\n\s*\n+").expect("static pattern"))
}

fn distinct_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\bDISTINCT\b(\s+ON\b)?").expect("static pattern"))
}

fn round_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\bROUND\s*\(").expect("static pattern"))
}

/// Strips block and line comments, collapsing the blank lines they leave.
pub fn strip_comments(sql: &str) -> String {
    let no_block = block_comment_re().replace_all(sql, "");
    let no_line = line_comment_re().replace_all(&no_block, "");
    blank_lines_re().replace_all(&no_line, "\n").trim().to_string()
}

/// Removes `DISTINCT` keywords while preserving `DISTINCT ON (...)`.
pub fn strip_distinct(sql: &str) -> String {
    distinct_re()
        .replace_all(sql, |c: &Captures| {
            if c.get(1).is_some() {
                c[0].to_string()
            } else {
                String::new()
            }
        })
        .into_owned()
}

/// Unwraps `ROUND(expr[, n])` to `expr`, innermost-out, so nested rounds
/// disappear entirely.
pub fn strip_round(sql: &str) -> String {
    let mut out = sql.to_string();
    loop {
        let Some(m) = round_re().find(&out) else {
            break;
        };
        let open = m.end() - 1;
        let Some(close) = matching_paren(out.as_bytes(), open) else {
            // unbalanced parens, leave as-is
            break;
        };
        let arg_end = first_arg_end(out.as_bytes(), open + 1).min(close);
        let first_arg = out[open + 1..arg_end].trim().to_string();
        out = format!("{}{}{}", &out[..m.start()], first_arg, &out[close + 1..]);
    }
    if out.to_ascii_uppercase().contains("ROUND") {
        tracing::warn!("ROUND survived canonicalization");
    }
    out
}

/// Full canonicalization pipeline for a statement sequence.
pub fn canonicalize(statements: &[String]) -> Vec<String> {
    statements
        .iter()
        .map(|s| strip_round(&strip_distinct(&strip_comments(s))))
        .collect()
}

fn matching_paren(bytes: &[u8], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (i, b) in bytes.iter().enumerate().skip(open) {
        match b {
            b'(' => depth += 1,
            b')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// End of the first argument: a top-level comma, or the closing paren.
fn first_arg_end(bytes: &[u8], start: usize) -> usize {
    let mut depth = 0usize;
    for (i, b) in bytes.iter().enumerate().skip(start) {
        match b {
            b'(' => depth += 1,
            b')' => {
                if depth == 0 {
                    return i;
                }
                depth -= 1;
            }
            b',' if depth == 0 => return i,
            _ => {}
        }
    }
    bytes.len()
}
