//! Line-level file editing.
//!
//! Line numbers are 1-based. Line terminators are preserved as found
//! (`\n`, `\r\n`, or none on a final unterminated line). Helpers return
//! `Ok(false)` when the requested line does not exist.

use crate::error::Result;
use std::fs;
use std::path::Path;

/// Read a file as lines, each keeping its terminator.
pub fn read_lines(path: &Path) -> Result<Vec<String>> {
    let content = fs::read_to_string(path)?;
    Ok(content.split_inclusive('\n').map(str::to_string).collect())
}

/// Write lines back verbatim.
pub fn write_lines(path: &Path, lines: &[String]) -> Result<()> {
    fs::write(path, lines.concat())?;
    Ok(())
}

/// Split a line into its body and terminator.
#[must_use]
pub fn split_terminator(line: &str) -> (&str, &str) {
    if let Some(body) = line.strip_suffix("\r\n") {
        (body, "\r\n")
    } else if let Some(body) = line.strip_suffix('\n') {
        (body, "\n")
    } else {
        (line, "")
    }
}

fn index_of(line_number: u32, len: usize) -> Option<usize> {
    let index = usize::try_from(line_number).ok()?.checked_sub(1)?;
    (index < len).then_some(index)
}

/// Delete line `line_number`.
pub fn remove_line(path: &Path, line_number: u32) -> Result<bool> {
    let mut lines = read_lines(path)?;
    let Some(index) = index_of(line_number, lines.len()) else {
        return Ok(false);
    };
    lines.remove(index);
    write_lines(path, &lines)?;
    Ok(true)
}

/// Replace the body of line `line_number` with `updater(body)`, keeping its
/// terminator.
pub fn update_line<F>(path: &Path, line_number: u32, updater: F) -> Result<bool>
where
    F: FnOnce(&str) -> String,
{
    let mut lines = read_lines(path)?;
    let Some(index) = index_of(line_number, lines.len()) else {
        return Ok(false);
    };
    let (body, terminator) = split_terminator(&lines[index]);
    let updated = format!("{}{}", updater(body), terminator);
    lines[index] = updated;
    write_lines(path, &lines)?;
    Ok(true)
}

/// Insert `content` so that it becomes line `line_number`.
///
/// Positions past the end append; 0 is treated as 1.
pub fn insert_line(path: &Path, line_number: u32, content: &str) -> Result<bool> {
    let mut lines = read_lines(path)?;
    let wanted = usize::try_from(line_number.max(1)).unwrap_or(usize::MAX) - 1;
    let index = wanted.min(lines.len());

    if index == lines.len() {
        if let Some(last) = lines.last_mut() {
            if !last.ends_with('\n') {
                last.push('\n');
            }
        }
    }

    let mut value = content.to_string();
    if !value.ends_with('\n') {
        value.push('\n');
    }
    lines.insert(index, value);
    write_lines(path, &lines)?;
    Ok(true)
}

/// Expand tabs in every line's leading whitespace to `width` spaces.
pub fn normalize_indentation(path: &Path, width: usize) -> Result<bool> {
    let lines = read_lines(path)?;
    let tab = " ".repeat(width);
    let normalized: Vec<String> = lines
        .iter()
        .map(|line| {
            let body_start = line
                .find(|c: char| c != ' ' && c != '\t')
                .unwrap_or(line.len());
            let (indent, rest) = line.split_at(body_start);
            format!("{}{}", indent.replace('\t', &tab), rest)
        })
        .collect();
    write_lines(path, &normalized)?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn file_with(content: &str) -> (TempDir, std::path::PathBuf) {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("sample.py");
        fs::write(&path, content).unwrap();
        (temp, path)
    }

    #[test]
    fn test_remove_line() {
        let (_t, path) = file_with("a\nb\nc\n");
        assert!(remove_line(&path, 2).unwrap());
        assert_eq!(fs::read_to_string(&path).unwrap(), "a\nc\n");
    }

    #[test]
    fn test_remove_line_out_of_range() {
        let (_t, path) = file_with("a\n");
        assert!(!remove_line(&path, 0).unwrap());
        assert!(!remove_line(&path, 2).unwrap());
        assert_eq!(fs::read_to_string(&path).unwrap(), "a\n");
    }

    #[test]
    fn test_update_line_keeps_crlf() {
        let (_t, path) = file_with("def f()\r\n    pass\r\n");
        assert!(update_line(&path, 1, |body| format!("{body}:")).unwrap());
        assert_eq!(fs::read_to_string(&path).unwrap(), "def f():\r\n    pass\r\n");
    }

    #[test]
    fn test_update_last_unterminated_line() {
        let (_t, path) = file_with("x = 1\nif x");
        assert!(update_line(&path, 2, |body| format!("{body}:")).unwrap());
        assert_eq!(fs::read_to_string(&path).unwrap(), "x = 1\nif x:");
    }

    #[test]
    fn test_insert_line_at_top() {
        let (_t, path) = file_with("x = requests.get\n");
        assert!(insert_line(&path, 1, "import requests").unwrap());
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "import requests\nx = requests.get\n"
        );
    }

    #[test]
    fn test_insert_past_end_terminates_previous_line() {
        let (_t, path) = file_with("a");
        assert!(insert_line(&path, 10, "b").unwrap());
        assert_eq!(fs::read_to_string(&path).unwrap(), "a\nb\n");
    }

    #[test]
    fn test_normalize_indentation_only_touches_leading_whitespace() {
        let (_t, path) = file_with("def f():\n\treturn 'a\\tb'\n \t x = 1\n");
        assert!(normalize_indentation(&path, 4).unwrap());
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "def f():\n    return 'a\\tb'\n      x = 1\n"
        );
    }

    #[test]
    fn test_split_terminator() {
        assert_eq!(split_terminator("a\r\n"), ("a", "\r\n"));
        assert_eq!(split_terminator("a\n"), ("a", "\n"));
        assert_eq!(split_terminator("a"), ("a", ""));
    }
}
