//! Content line folding (RFC 5545 §3.1).

/// Maximum line length in octets, not counting the CRLF.
const MAX_LINE_OCTETS: usize = 75;

/// Folds a content line at 75 octets and terminates it with CRLF.
///
/// Continuation lines start with a single space. Multi-byte UTF-8 sequences
/// are never split.
#[must_use]
pub fn fold_line(line: &str) -> String {
    let mut folded = String::with_capacity(line.len() + line.len() / MAX_LINE_OCTETS * 3 + 2);
    let mut used = 0;

    for (index, c) in line.char_indices() {
        let width = c.len_utf8();
        if used + width > MAX_LINE_OCTETS && index > 0 {
            folded.push_str("\r\n ");
            used = 1;
        }
        folded.push(c);
        used += width;
    }
    folded.push_str("\r\n");
    folded
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_line_is_terminated() {
        assert_eq!(fold_line("RRULE:FREQ=DAILY"), "RRULE:FREQ=DAILY\r\n");
    }

    #[test]
    fn exactly_75_octets_is_not_folded() {
        let line = "X".repeat(75);
        assert_eq!(fold_line(&line), format!("{line}\r\n"));
    }

    #[test]
    fn long_line_unfolds_to_original() {
        let line = format!("EXDATE:{}", "20260101T090000,".repeat(10));
        let folded = fold_line(&line);

        for physical in folded.trim_end_matches("\r\n").split("\r\n") {
            assert!(physical.len() <= 75);
        }
        assert_eq!(folded.replace("\r\n ", "").trim_end_matches("\r\n"), line);
    }

    #[test]
    fn multibyte_characters_stay_whole() {
        let line = format!("{}日本語", "A".repeat(73));
        let folded = fold_line(&line);
        assert!(folded.starts_with(&format!("{}\r\n 日", "A".repeat(73))));
        assert_eq!(folded.replace("\r\n ", "").trim_end_matches("\r\n"), line);
    }
}
