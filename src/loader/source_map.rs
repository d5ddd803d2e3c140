/// Byte offset to line/column lookup over loaded program text.
pub struct SourceMap {
    line_starts: Vec<usize>,
}

impl SourceMap {
    pub fn new(source: &str) -> Self {
        let line_starts = std::iter::once(0)
            .chain(source.match_indices('\n').map(|(i, _)| i + 1))
            .collect();
        SourceMap { line_starts }
    }

    /// 1-based (line, column) of `offset`.
    pub fn lookup(&self, offset: usize) -> (usize, usize) {
        let line = self.line_starts.partition_point(|&start| start <= offset).max(1);
        (line, offset - self.line_starts[line - 1] + 1)
    }

    /// Text of 1-based `line` without its terminator, or "" if out of range.
    pub fn line_text<'a>(&self, source: &'a str, line: usize) -> &'a str {
        let Some(&start) = line.checked_sub(1).and_then(|i| self.line_starts.get(i)) else {
            return "";
        };
        let end = self.line_starts.get(line).copied().unwrap_or(source.len());
        source[start..end].trim_end_matches(['\n', '\r'])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_line_columns() {
        let sm = SourceMap::new("10 20 30");
        assert_eq!(sm.lookup(0), (1, 1));
        assert_eq!(sm.lookup(3), (1, 4));
    }

    #[test]
    fn later_lines() {
        let src = "1 2\n# comment\n3 $";
        let sm = SourceMap::new(src);
        assert_eq!(sm.lookup(4), (2, 1));
        assert_eq!(sm.lookup(16), (3, 3));
        assert_eq!(sm.line_text(src, 2), "# comment");
        assert_eq!(sm.line_text(src, 3), "3 $");
    }

    #[test]
    fn crlf_is_trimmed() {
        let src = "1\r\n2";
        let sm = SourceMap::new(src);
        assert_eq!(sm.line_text(src, 1), "1");
        assert_eq!(sm.line_text(src, 2), "2");
    }

    #[test]
    fn out_of_range_line_is_empty() {
        let src = "1";
        let sm = SourceMap::new(src);
        assert_eq!(sm.line_text(src, 0), "");
        assert_eq!(sm.line_text(src, 5), "");
    }
}
