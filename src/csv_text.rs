//! Tokenizer for the dashboard CSV export.
//!
//! The export is simple enough that a small state machine beats a general CSV
//! reader: headers are never quoted, data fields may be wrapped in `"` to
//! protect embedded commas, and every value is trimmed. Lines whose field count
//! disagrees with the header are dropped with a warning instead of failing the
//! whole load.
use tracing::{debug, warn};

use crate::types::RawRow;

/// What happened while tokenizing one input text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParseReport {
    /// Non-blank lines after the header.
    pub data_lines: usize,
    /// Lines dropped because their field count did not match the header.
    pub dropped_lines: usize,
}

/// Split `text` into header-keyed rows. Malformed lines are skipped.
pub fn parse(text: &str) -> Vec<RawRow> {
    parse_with_report(text).0
}

pub fn parse_with_report(text: &str) -> (Vec<RawRow>, ParseReport) {
    let mut report = ParseReport::default();
    let mut lines = text
        .split('\n')
        .map(|l| l.strip_suffix('\r').unwrap_or(l))
        .enumerate()
        .skip_while(|(_, l)| l.trim().is_empty());

    let Some((_, header_line)) = lines.next() else {
        return (Vec::new(), report);
    };
    let headers: Vec<String> = header_line
        .split(',')
        .map(|h| h.trim().to_string())
        .collect();

    let mut rows = Vec::new();
    for (idx, line) in lines {
        if line.trim().is_empty() {
            continue;
        }
        report.data_lines += 1;
        let values = split_line(line);
        if values.len() != headers.len() {
            warn!(
                line = idx + 1,
                got = values.len(),
                expected = headers.len(),
                "dropping csv line with mismatched field count"
            );
            report.dropped_lines += 1;
            continue;
        }
        rows.push(headers.iter().cloned().zip(values).collect::<RawRow>());
    }

    debug!(
        rows = rows.len(),
        dropped = report.dropped_lines,
        "tokenized csv text"
    );
    (rows, report)
}

/// Field splitter for a single data line.
///
/// A `"` toggles the quoted state and is not kept; a `,` outside quotes ends
/// the field. Fields are trimmed. An unterminated quote runs to end of line.
pub fn split_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for c in line.chars() {
        match c {
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                fields.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(c),
        }
    }
    fields.push(current.trim().to_string());
    fields
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quoted_comma_stays_in_field() {
        let rows = parse("a,b\n1,\"x,y\"\n");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["a"], "1");
        assert_eq!(rows[0]["b"], "x,y");
    }

    #[test]
    fn headers_are_trimmed_and_not_quote_aware() {
        let rows = parse(" city , \"hpi\" \nAustin,200");
        assert_eq!(rows[0]["city"], "Austin");
        assert_eq!(rows[0]["\"hpi\""], "200");
    }

    #[test]
    fn mismatched_lines_are_dropped() {
        let text = "city,hpi\nAustin,200\nSF,300,extra\nDenver\n";
        let (rows, report) = parse_with_report(text);
        assert_eq!(rows.len(), 1);
        assert_eq!(report.data_lines, 3);
        assert_eq!(report.dropped_lines, 2);
    }

    #[test]
    fn blank_lines_and_crlf_are_ignored() {
        let text = "\n\ncity,hpi\r\n\r\nAustin, 200 \r\n   \nSF,300";
        let (rows, report) = parse_with_report(text);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["hpi"], "200");
        assert_eq!(report.data_lines, 2);
    }

    #[test]
    fn empty_input_yields_nothing() {
        assert!(parse("").is_empty());
        assert!(parse("city,hpi\n").is_empty());
        assert!(parse("   \n  ").is_empty());
    }

    #[test]
    fn split_line_handles_edge_fields() {
        assert_eq!(split_line(""), vec![""]);
        assert_eq!(split_line("a,,b,"), vec!["a", "", "b", ""]);
        assert_eq!(split_line("\"a\"\"b\",c"), vec!["ab", "c"]);
        assert_eq!(split_line("\"open, never closed"), vec!["open, never closed"]);
    }
}
