//! Line-addressed view of a source file that round-trips line endings.

/// One line and the terminator that followed it (`"\n"`, `"\r\n"` or `""`
/// for a final line without newline).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    /// Line content without its terminator.
    pub text: String,
    /// Terminator that followed the line.
    pub ending: String,
}

/// Editable file contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    lines: Vec<Line>,
}

impl SourceFile {
    /// Split `contents` into lines, keeping each terminator.
    pub fn parse(contents: &str) -> Self {
        let lines = contents
            .split_inclusive('\n')
            .map(|raw| {
                let (text, ending) = if let Some(text) = raw.strip_suffix("\r\n") {
                    (text, "\r\n")
                } else if let Some(text) = raw.strip_suffix('\n') {
                    (text, "\n")
                } else {
                    (raw, "")
                };
                Line {
                    text: text.to_string(),
                    ending: ending.to_string(),
                }
            })
            .collect();
        Self { lines }
    }

    /// Number of lines.
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Whether the file has no lines.
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Text of the 1-based line `number`.
    pub fn line(&self, number: u32) -> Option<&str> {
        let index = usize::try_from(number).ok()?.checked_sub(1)?;
        self.lines.get(index).map(|l| l.text.as_str())
    }

    /// Line texts in order.
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().map(|l| l.text.as_str())
    }

    /// Replace the text of line `number`. Returns whether it changed.
    pub fn set_line(&mut self, number: u32, text: String) -> bool {
        let Some(line) = usize::try_from(number)
            .ok()
            .and_then(|n| n.checked_sub(1))
            .and_then(|i| self.lines.get_mut(i))
        else {
            return false;
        };
        if line.text == text {
            return false;
        }
        line.text = text;
        true
    }

    /// Remove line `number`, returning its text.
    pub fn remove_line(&mut self, number: u32) -> Option<String> {
        let index = usize::try_from(number).ok()?.checked_sub(1)?;
        if index >= self.lines.len() {
            return None;
        }
        let removed = self.lines.remove(index);
        // Keep the file's last-line-has-no-newline shape.
        if removed.ending.is_empty() {
            if let Some(last) = self.lines.last_mut() {
                last.ending.clear();
            }
        }
        Some(removed.text)
    }

    /// Insert `text` so that it becomes line `index + 1` (0 inserts at the
    /// top).
    pub fn insert_line(&mut self, index: usize, text: String) {
        let ending = self.dominant_ending();
        let index = index.min(self.lines.len());
        if index == self.lines.len() {
            if let Some(last) = self.lines.last_mut() {
                if last.ending.is_empty() {
                    last.ending.clone_from(&ending);
                }
            }
        }
        self.lines.insert(index, Line { text, ending });
    }

    fn dominant_ending(&self) -> String {
        if self.lines.iter().any(|l| l.ending == "\r\n") {
            "\r\n".to_string()
        } else {
            "\n".to_string()
        }
    }

    /// Reassemble the file with its original line endings.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for line in &self.lines {
            out.push_str(&line.text);
            out.push_str(&line.ending);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_mixed_endings() {
        let text = "a\r\nb\nc";
        assert_eq!(SourceFile::parse(text).render(), text);
    }

    #[test]
    fn edits_are_one_based() {
        let mut file = SourceFile::parse("one\ntwo\nthree\n");
        assert_eq!(file.line(2), Some("two"));
        assert!(file.set_line(2, "TWO".into()));
        assert!(!file.set_line(2, "TWO".into()));
        assert_eq!(file.remove_line(1).as_deref(), Some("one"));
        file.insert_line(0, "zero".into());
        assert_eq!(file.render(), "zero\nTWO\nthree\n");
        assert_eq!(file.line(0), None);
        assert_eq!(file.line(9), None);
    }

    #[test]
    fn removing_unterminated_last_line_keeps_shape() {
        let mut file = SourceFile::parse("a\nb");
        file.remove_line(2);
        assert_eq!(file.render(), "a");
    }

    #[test]
    fn appending_terminates_previous_line() {
        let mut file = SourceFile::parse("a\r\nb");
        let len = file.len();
        file.insert_line(len, "c".into());
        assert_eq!(file.render(), "a\r\nb\r\nc\r\n");
    }
}
