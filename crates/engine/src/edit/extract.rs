//! Locate edit regions in turn text.

/// Return the inner text of every `<tag>...</tag>` region, in order of
/// appearance. Each region ends at the first closing tag after its opening
/// tag. An opening tag with no closing tag is ignored.
pub fn extract_edit_spans(text: &str, tag: &str) -> Vec<String> {
    let open = format!("<{}>", tag);
    let close = format!("</{}>", tag);
    let mut spans = Vec::new();
    let mut rest = text;

    while let Some(start) = rest.find(&open) {
        let after_open = &rest[start + open.len()..];
        let Some(end) = after_open.find(&close) else {
            break;
        };
        spans.push(after_open[..end].to_string());
        rest = &after_open[end + close.len()..];
    }
    spans
}

/// Byte ranges `(start, end)` of each full region including its tags.
pub(crate) fn edit_region_ranges(text: &str, tag: &str) -> Vec<(usize, usize)> {
    let open = format!("<{}>", tag);
    let close = format!("</{}>", tag);
    let mut ranges = Vec::new();
    let mut pos = 0;

    while let Some(found) = text[pos..].find(&open) {
        let start = pos + found;
        let body = start + open.len();
        let Some(end) = text[body..].find(&close) else {
            break;
        };
        let end = body + end + close.len();
        ranges.push((start, end));
        pos = end;
    }
    ranges
}

/// Trim a span and strip a surrounding `<!-- -->` comment. The flag is false
/// when a non-blank span was not fully wrapped.
pub fn strip_comment_markers(span: &str) -> (&str, bool) {
    let trimmed = span.trim();
    if trimmed.is_empty() {
        return (trimmed, true);
    }
    let wrapped = trimmed.starts_with("<!--") && trimmed.ends_with("-->");

    let mut inner = trimmed;
    if let Some(s) = inner.strip_prefix("<!--") {
        inner = s;
    }
    if let Some(s) = inner.strip_suffix("-->") {
        inner = s;
    } else if let Some(s) = inner.strip_suffix("--") {
        inner = s;
    }
    (inner.trim(), wrapped)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extracts_multiple_regions_in_order() {
        let text = "a <tableEdit>one</tableEdit> b <tableEdit>\ntwo\n</tableEdit> c";
        assert_eq!(extract_edit_spans(text, "tableEdit"), vec!["one", "\ntwo\n"]);
    }

    #[test]
    fn test_region_is_non_greedy() {
        let text = "<t>1</t><t>2</t>";
        assert_eq!(extract_edit_spans(text, "t"), vec!["1", "2"]);
    }

    #[test]
    fn test_unterminated_region_ignored() {
        let text = "<t>1</t> <t>never closed";
        assert_eq!(extract_edit_spans(text, "t"), vec!["1"]);
        assert!(extract_edit_spans("plain reply", "t").is_empty());
    }

    #[test]
    fn test_region_ranges() {
        let text = "x<t>1</t>y";
        assert_eq!(edit_region_ranges(text, "t"), vec![(1, 9)]);
    }

    #[test]
    fn test_strip_comment_markers() {
        assert_eq!(strip_comment_markers("\n<!--\ninsertRow(0, {})\n-->\n"), ("insertRow(0, {})", true));
        assert_eq!(strip_comment_markers(" insertRow(0, {}) "), ("insertRow(0, {})", false));
        assert_eq!(strip_comment_markers("<!-- x"), ("x", false));
        assert_eq!(strip_comment_markers("  "), ("", true));
    }
}
