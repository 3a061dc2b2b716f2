//! Parse a project `.env` into a key-value map; applying it to the process
//! environment (without overwriting existing vars) happens in the crate root.

use std::collections::HashMap;
use std::path::Path;

/// Strips matching surrounding quotes. Double quotes support `\"`; single
/// quotes are taken literally.
fn unquote(value: &str) -> String {
    if value.len() >= 2 && value.starts_with('"') && value.ends_with('"') {
        return value[1..value.len() - 1].replace("\\\"", "\"");
    }
    if value.len() >= 2 && value.starts_with('\'') && value.ends_with('\'') {
        return value[1..value.len() - 1].to_string();
    }
    value.to_string()
}

/// Minimal `.env` parser: `KEY=VALUE` lines; empty lines and `#` comments are
/// skipped; keys and values are trimmed; no multiline values.
fn parse(content: &str) -> HashMap<String, String> {
    let mut out = HashMap::new();
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        out.insert(key.to_string(), unquote(value.trim()));
    }
    out
}

/// Loads `.env` from `override_dir` (or the current directory) into a map.
/// A missing file is not an error; it returns an empty map.
pub fn load_env_map(override_dir: Option<&Path>) -> std::io::Result<HashMap<String, String>> {
    let dir = match override_dir {
        Some(d) => d.to_path_buf(),
        None => match std::env::current_dir() {
            Ok(d) => d,
            Err(_) => return Ok(HashMap::new()),
        },
    };
    let path = dir.join(".env");
    if !path.is_file() {
        return Ok(HashMap::new());
    }
    let content = std::fs::read_to_string(&path)?;
    Ok(parse(&content))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_and_quoted_values() {
        let m = parse("A=1\nB=\"two words\"\nC='kept literal'\n");
        assert_eq!(m.get("A"), Some(&"1".to_string()));
        assert_eq!(m.get("B"), Some(&"two words".to_string()));
        assert_eq!(m.get("C"), Some(&"kept literal".to_string()));
    }

    #[test]
    fn skips_comments_blank_lines_and_malformed_entries() {
        let m = parse("# comment\n\nno_equals_here\n=no_key\nKEY=ok\n");
        assert_eq!(m.len(), 1);
        assert_eq!(m.get("KEY"), Some(&"ok".to_string()));
    }

    #[test]
    fn escaped_quotes_inside_double_quoted_value() {
        let m = parse(r#"KEY="say \"hi\"""#);
        assert_eq!(m.get("KEY"), Some(&"say \"hi\"".to_string()));
    }

    #[test]
    fn missing_file_returns_empty_map() {
        let dir = tempfile::tempdir().unwrap();
        let m = load_env_map(Some(dir.path())).unwrap();
        assert!(m.is_empty());
    }

    #[test]
    fn reads_env_file_from_override_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(".env"), "A=1\nB=2\n").unwrap();
        let m = load_env_map(Some(dir.path())).unwrap();
        assert_eq!(m.get("A"), Some(&"1".to_string()));
        assert_eq!(m.get("B"), Some(&"2".to_string()));
    }
}
