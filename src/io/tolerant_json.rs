//! JSON with `#` line comments.
//!
//! Config files and hand-edited documents may carry `#` comments anywhere on a
//! line. A `#` only starts a comment when it sits outside a quoted string, so
//! values such as `"a#b"` or `"http://host/#frag"` survive. Blank lines are
//! dropped before the remainder is parsed as strict JSON.

use serde_json::Value;

/// Byte offset of the first `#` outside a JSON string on this line, if any.
pub fn find_comment(line: &str) -> Option<usize> {
    let first_hash = line.find('#')?;
    match line.find('"') {
        None => return Some(first_hash),
        Some(q) if first_hash < q => return Some(first_hash),
        _ => {}
    }
    let mut in_string = false;
    let mut escaped = false;
    for (i, c) in line.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '#' => return Some(i),
            _ => {}
        }
    }
    None
}

/// Remove comments and blank lines, keeping one JSON fragment per line.
pub fn strip_comments(text: &str) -> String {
    let mut kept: Vec<&str> = Vec::new();
    for line in text.lines() {
        let line = match find_comment(line) {
            Some(x) => &line[..x],
            None => line,
        };
        let line = line.trim();
        if !line.is_empty() {
            kept.push(line);
        }
    }
    kept.join("\n")
}

pub fn parse_tolerant(text: &str) -> Result<Value, serde_json::Error> {
    serde_json::from_str(&strip_comments(text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn hash_inside_string_is_not_a_comment() {
        let v = parse_tolerant(r#"{"name": "a#b"} # trailing comment"#).unwrap();
        assert_eq!(v, json!({"name": "a#b"}));
    }

    #[test]
    fn leading_hash_lines_and_blank_lines_are_dropped() {
        let text = "# tenant config\n\n{\n  \"id\": \"acme\", # the id\n\n  \"port\": 8080\n}\n";
        let v = parse_tolerant(text).unwrap();
        assert_eq!(v, json!({"id": "acme", "port": 8080}));
    }

    #[test]
    fn escaped_quotes_keep_string_open() {
        let line = r##"{"q": "say \"#hi\""} # c"##;
        let x = find_comment(line).unwrap();
        assert_eq!(&line[x..], "# c");
        let v = parse_tolerant(line).unwrap();
        assert_eq!(v["q"], json!("say \"#hi\""));
    }

    #[test]
    fn comment_after_several_strings() {
        let v = parse_tolerant("{\"a\": \"b\", \"c\": \"d\"} # e\"f").unwrap();
        assert_eq!(v, json!({"a": "b", "c": "d"}));
    }

    #[test]
    fn crlf_input_is_accepted() {
        let v = parse_tolerant("{\r\n\"secret\": \"s3cr3t\" # keep me private\r\n}\r\n").unwrap();
        assert_eq!(v, json!({"secret": "s3cr3t"}));
    }

    #[test]
    fn no_comment_returns_none() {
        assert_eq!(find_comment(r#"{"url": "http://x/#y"}"#), None);
        assert_eq!(find_comment("plain"), None);
    }
}
