//! Named placeholder scanning.
//!
//! Splits SQL text into literal text and `:name` placeholders. Quoted strings,
//! quoted identifiers, comments, `::` casts and `:=` assignments are never treated as
//! placeholders. Names are matched greedily, so `:id2` is never read as `:id`.
//!
//! Quoting rules follow the backend: MySQL string literals use backslash escapes,
//! SQLite treats a backslash as an ordinary character.

use super::types::Backend;

/// A piece of scanned SQL text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment<'a> {
    Text(&'a str),
    /// Placeholder name without the leading colon
    Placeholder(&'a str),
    /// `-- ...` comment, including its line break when present
    LineComment(&'a str),
    /// `/* ... */` comment
    BlockComment(&'a str),
}

fn is_name_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// Split `sql` into text, comment and placeholder segments, in order.
pub fn scan(sql: &str, backend: Backend) -> Vec<Segment<'_>> {
    let bytes = sql.as_bytes();
    let mut segments = Vec::new();
    let mut text_start = 0;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            quote @ (b'\'' | b'"' | b'`') => {
                i = skip_quoted(bytes, i, quote, backend);
            }
            b'-' if bytes.get(i + 1) == Some(&b'-') => {
                let end = bytes[i..]
                    .iter()
                    .position(|&b| b == b'\n')
                    .map_or(bytes.len(), |p| i + p + 1);
                push_text(&mut segments, sql, text_start, i);
                segments.push(Segment::LineComment(&sql[i..end]));
                text_start = end;
                i = end;
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                let end = sql[i + 2..].find("*/").map_or(bytes.len(), |p| i + 2 + p + 2);
                push_text(&mut segments, sql, text_start, i);
                segments.push(Segment::BlockComment(&sql[i..end]));
                text_start = end;
                i = end;
            }
            b':' if bytes.get(i + 1) == Some(&b':') => {
                i += 2;
            }
            b':' if bytes.get(i + 1).is_some_and(|&b| is_name_byte(b)) => {
                let name_start = i + 1;
                let name_end = bytes[name_start..]
                    .iter()
                    .position(|&b| !is_name_byte(b))
                    .map_or(bytes.len(), |p| name_start + p);
                push_text(&mut segments, sql, text_start, i);
                segments.push(Segment::Placeholder(&sql[name_start..name_end]));
                text_start = name_end;
                i = name_end;
            }
            _ => i += 1,
        }
    }

    push_text(&mut segments, sql, text_start, bytes.len());
    segments
}

fn push_text<'a>(segments: &mut Vec<Segment<'a>>, sql: &'a str, start: usize, end: usize) {
    if start < end {
        segments.push(Segment::Text(&sql[start..end]));
    }
}

/// Index just past the closing quote of the literal opening at `start`.
///
/// A doubled quote is an escaped quote in every dialect; it reads as a closed
/// literal followed by a new one, which lands on the same end index.
fn skip_quoted(bytes: &[u8], start: usize, quote: u8, backend: Backend) -> usize {
    // Backtick identifiers never have backslash escapes
    let backslash_escapes = backend == Backend::MySql && quote != b'`';
    let mut i = start + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' if backslash_escapes => i += 2,
            b if b == quote => return i + 1,
            _ => i += 1,
        }
    }
    bytes.len()
}

/// Placeholder names in order of appearance, repeats included.
pub fn placeholder_names(sql: &str, backend: Backend) -> Vec<&str> {
    scan(sql, backend)
        .into_iter()
        .filter_map(|segment| match segment {
            Segment::Placeholder(name) => Some(name),
            _ => None,
        })
        .collect()
}

/// Rewrite named placeholders to positional `?` markers.
///
/// Returns the rewritten SQL and the placeholder name bound to each marker.
pub fn to_positional(sql: &str, backend: Backend) -> (String, Vec<String>) {
    let mut rewritten = String::with_capacity(sql.len());
    let mut names = Vec::new();
    for segment in scan(sql, backend) {
        match segment {
            Segment::Text(text) | Segment::LineComment(text) | Segment::BlockComment(text) => {
                rewritten.push_str(text)
            }
            Segment::Placeholder(name) => {
                rewritten.push('?');
                names.push(name.to_string());
            }
        }
    }
    (rewritten, names)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_simple() {
        let segments = scan(
            "SELECT * FROM t WHERE id = :id AND name = :name",
            Backend::MySql,
        );
        assert_eq!(
            segments,
            vec![
                Segment::Text("SELECT * FROM t WHERE id = "),
                Segment::Placeholder("id"),
                Segment::Text(" AND name = "),
                Segment::Placeholder("name"),
            ]
        );
    }

    #[test]
    fn test_prefix_names_are_distinct() {
        assert_eq!(
            placeholder_names("WHERE a = :id OR b = :id2 OR c = :id", Backend::MySql),
            vec!["id", "id2", "id"]
        );
    }

    #[test]
    fn test_quoted_text_ignored() {
        let names = placeholder_names(
            r#"SELECT ':nope', "x:no", `col:no`, 'it\'s :no' FROM t WHERE a = :yes"#,
            Backend::MySql,
        );
        assert_eq!(names, vec!["yes"]);
    }

    #[test]
    fn test_comments_ignored() {
        let names = placeholder_names("SELECT 1 -- :no\n, /* :no */ :yes", Backend::MySql);
        assert_eq!(names, vec!["yes"]);
    }

    #[test]
    fn test_casts_and_assignment_ignored() {
        assert!(placeholder_names("SELECT x::text, @v := 1 FROM t", Backend::MySql).is_empty());
    }

    #[test]
    fn test_to_positional() {
        let (sql, names) =
            to_positional("INSERT INTO t (a, b) VALUES (:a, :b) -- :c", Backend::MySql);
        assert_eq!(sql, "INSERT INTO t (a, b) VALUES (?, ?) -- :c");
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn test_non_ascii_text_preserved() {
        let (sql, names) = to_positional("SELECT 'ü' AS µ, :p", Backend::SQLite);
        assert_eq!(sql, "SELECT 'ü' AS µ, ?");
        assert_eq!(names, vec!["p"]);
    }

    #[test]
    fn test_unterminated_literal() {
        assert!(placeholder_names("SELECT ':a", Backend::MySql).is_empty());
    }

    #[test]
    fn test_backslash_is_literal_in_sqlite() {
        let sql = r"SELECT 'C:\' AS p, :x AS x";
        assert_eq!(placeholder_names(sql, Backend::SQLite), vec!["x"]);
        // In MySQL the same backslash escapes the closing quote
        assert!(placeholder_names(sql, Backend::MySql).is_empty());
    }

    #[test]
    fn test_doubled_quote_in_sqlite() {
        let sql = "SELECT 'it''s :no', :yes";
        assert_eq!(placeholder_names(sql, Backend::SQLite), vec!["yes"]);
    }

    #[test]
    fn test_comment_segments() {
        assert_eq!(
            scan("SELECT 1 -- c\nWHERE /* b */ a = :a", Backend::MySql),
            vec![
                Segment::Text("SELECT 1 "),
                Segment::LineComment("-- c\n"),
                Segment::Text("WHERE "),
                Segment::BlockComment("/* b */"),
                Segment::Text(" a = "),
                Segment::Placeholder("a"),
            ]
        );
    }
}
