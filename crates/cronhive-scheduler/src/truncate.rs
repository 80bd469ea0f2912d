//! Output truncation for stored run messages.
//!
//! Every run keeps its message in memory for the lifetime of the task, so the
//! message is capped. The head of the output is kept and a marker is appended.

/// Appended to a message that was cut.
pub const TRUNCATION_MARKER: &str = "...";

/// Keep at most `max_chars` characters of `message`, appending
/// [`TRUNCATION_MARKER`] when anything was dropped.
///
/// Counts characters, not bytes, so multi-byte sequences are never split.
pub fn truncate_message(message: &str, max_chars: usize) -> String {
    if message.len() <= max_chars {
        // Byte length bounds char count, nothing to cut.
        return message.to_owned();
    }

    match message.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}{TRUNCATION_MARKER}", &message[..cut]),
        None => message.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAX: usize = 4000;

    #[test]
    fn short_input_returned_as_is() {
        assert_eq!(truncate_message("hello world", MAX), "hello world");
    }

    #[test]
    fn exact_boundary_returned_as_is() {
        let s = "x".repeat(MAX);
        let result = truncate_message(&s, MAX);
        assert_eq!(result, s);
    }

    #[test]
    fn one_over_boundary_is_truncated() {
        let s = "a".repeat(MAX + 1);
        let result = truncate_message(&s, MAX);
        assert_eq!(result.chars().count(), MAX + TRUNCATION_MARKER.len());
        assert!(result.ends_with(TRUNCATION_MARKER));
        assert!(result.starts_with(&"a".repeat(MAX)));
    }

    #[test]
    fn head_is_kept() {
        let input = format!("{}{}", "A".repeat(MAX), "B".repeat(10_000));
        let result = truncate_message(&input, MAX);
        assert_eq!(result, format!("{}{TRUNCATION_MARKER}", "A".repeat(MAX)));
    }

    #[test]
    fn unicode_does_not_break_on_boundary() {
        // 3 bytes per char: byte length is over the limit, char count is not.
        let fits = "€".repeat(MAX);
        assert_eq!(truncate_message(&fits, MAX), fits);

        let over = "€".repeat(MAX + 5);
        let result = truncate_message(&over, MAX);
        assert_eq!(result.chars().filter(|c| *c == '€').count(), MAX);
    }

    #[test]
    fn empty_input_returned_as_is() {
        assert_eq!(truncate_message("", MAX), "");
    }
}
