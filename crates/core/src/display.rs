use std::borrow::Cow;

use crate::location::Location;

/// Longest location (in characters) shown inside a message before it is truncated.
pub const MAX_URI_IN_DIALOG_LENGTH: usize = 50;

const ELLIPSIS: char = '\u{2026}';

/// Shortens `input` to at most `max_chars` characters by replacing its middle with an ellipsis.
pub fn middle_truncate(input: &str, max_chars: usize) -> Cow<'_, str> {
    let length = input.chars().count();
    if length <= max_chars {
        return Cow::Borrowed(input);
    }
    if max_chars == 0 {
        return Cow::Owned(String::new());
    }

    let left_chars = (max_chars - 1) / 2;
    let right_chars = max_chars - 1 - left_chars;

    let mut output = String::with_capacity(max_chars * 4);
    output.extend(input.chars().take(left_chars));
    output.push(ELLIPSIS);
    output.extend(input.chars().skip(length - right_chars));
    Cow::Owned(output)
}

/// Escapes text so it can be embedded in styled (markup) labels.
pub fn escape_markup(input: &str) -> Cow<'_, str> {
    if !input.contains(['&', '<', '>', '\'', '"']) {
        return Cow::Borrowed(input);
    }
    let mut output = String::with_capacity(input.len() + 16);
    for ch in input.chars() {
        match ch {
            '&' => output.push_str("&amp;"),
            '<' => output.push_str("&lt;"),
            '>' => output.push_str("&gt;"),
            '\'' => output.push_str("&apos;"),
            '"' => output.push_str("&quot;"),
            _ => output.push(ch),
        }
    }
    Cow::Owned(output)
}

/// Display form of a location: parse name, middle-truncated, then escaped.
/// Documents read from standard input have no location and show as `stdin`.
pub fn uri_for_display(location: Option<&Location>) -> String {
    let full = match location {
        Some(location) => location.parse_name(),
        None => "stdin".to_string(),
    };
    let truncated = middle_truncate(&full, MAX_URI_IN_DIALOG_LENGTH);
    escape_markup(&truncated).into_owned()
}
