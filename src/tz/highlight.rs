// src/tz/highlight.rs
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // The converter numbers paragraph tags (<p1>, <p2>, ...); the web client
    // expects plain <p>.
    static ref OPEN_NUMBERED_P_RE: Regex = Regex::new(r"<p\d+>").unwrap();
    static ref CLOSE_NUMBERED_P_RE: Regex = Regex::new(r"</p\d+>").unwrap();
    static ref ERROR_ID_SPAN_RE: Regex =
        Regex::new(r#"<span[^>]*\berror-id="([^"]+)"[^>]*>"#).unwrap();
}

/// Wraps every case-insensitive occurrence of `phrase` in a
/// `<span error-id="...">` marker, keeping the original casing and escaping
/// the matched text. The scan resumes after each inserted span, so already
/// highlighted text is never rescanned.
pub fn highlight_phrase_ignore_case(text: &str, phrase: &str, id: usize) -> String {
    if phrase.is_empty() {
        return text.to_string();
    }

    let phrase_chars: Vec<char> = phrase.chars().collect();
    let mut result = text.to_string();
    let mut search_from = 0;

    while let Some((index, matched_len)) = find_ignore_case(&result, &phrase_chars, search_from) {
        let highlighted = format!(
            "<span error-id=\"{id}\">{}</span>",
            escape_html(&result[index..index + matched_len])
        );
        result.replace_range(index..index + matched_len, &highlighted);
        search_from = index + highlighted.len();
    }

    result
}

fn find_ignore_case(haystack: &str, phrase: &[char], from: usize) -> Option<(usize, usize)> {
    let tail = haystack.get(from..)?;

    for (offset, _) in tail.char_indices() {
        if let Some(matched_len) = match_len_at(&tail[offset..], phrase) {
            return Some((from + offset, matched_len));
        }
    }

    None
}

// Byte length of the prefix of `hay` matching `phrase` case-insensitively,
// or None. Comparison is char by char through full case folding, so the
// returned length always lands on a char boundary of `hay`.
fn match_len_at(hay: &str, phrase: &[char]) -> Option<usize> {
    let mut hay_chars = hay.chars();
    let mut matched_len = 0;

    for &expected in phrase {
        let actual = hay_chars.next()?;
        if actual != expected && !actual.to_lowercase().eq(expected.to_lowercase()) {
            return None;
        }
        matched_len += actual.len_utf8();
    }

    Some(matched_len)
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&#34;")
        .replace('\'', "&#39;")
}

/// Normalizes the converter's numbered paragraph tags back to plain `<p>`.
pub fn fix_html_tags(input: &str) -> String {
    let opened = OPEN_NUMBERED_P_RE.replace_all(input, "<p>");
    CLOSE_NUMBERED_P_RE
        .replace_all(&opened, "</p>")
        .into_owned()
}

/// Collects the `error-id` of every highlight span in document order.
/// Non-numeric ids are skipped.
pub fn error_ids_in_order(text: &str) -> Vec<usize> {
    ERROR_ID_SPAN_RE
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .filter_map(|id| id.as_str().parse().ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wraps_every_occurrence_preserving_case() {
        let result = highlight_phrase_ignore_case("Cost matters. The cost is high.", "cost", 0);

        assert_eq!(
            result,
            "<span error-id=\"0\">Cost</span> matters. \
             The <span error-id=\"0\">cost</span> is high."
        );
    }

    #[test]
    fn matches_cyrillic_ignoring_case() {
        let result = highlight_phrase_ignore_case("Подрядчик обязан", "подрядчик", 3);

        assert_eq!(result, "<span error-id=\"3\">Подрядчик</span> обязан");
    }

    #[test]
    fn escapes_markup_inside_the_span() {
        let result = highlight_phrase_ignore_case("see <b>bold</b> text", "<b>bold</b>", 1);

        assert_eq!(
            result,
            "see <span error-id=\"1\">&lt;b&gt;bold&lt;/b&gt;</span> text"
        );
    }

    #[test]
    fn missing_phrase_leaves_text_untouched() {
        assert_eq!(
            highlight_phrase_ignore_case("nothing here", "absent", 0),
            "nothing here"
        );
        assert_eq!(highlight_phrase_ignore_case("text", "", 0), "text");
    }

    #[test]
    fn numbered_paragraph_tags_are_normalized() {
        assert_eq!(
            fix_html_tags("<p1>a</p1><p23>b</p23><div>c</div>"),
            "<p>a</p><p>b</p><div>c</div>"
        );
    }

    #[test]
    fn ids_come_back_in_document_order() {
        let text = "x<span error-id=\"2\">a</span>y\
                    <span class=\"q\" error-id=\"0\">b</span>\
                    <span error-id=\"oops\">c</span>\
                    <span error-id=\"1\">d</span>";

        assert_eq!(error_ids_in_order(text), vec![2, 0, 1]);
    }
}
