//! HTML export of a stored session

use delve_api::HistoryEntry;
use delve_tui::widgets::markdown::{escape_html, to_html};

const STYLE: &str = "body{font-family:sans-serif;max-width:48em;margin:2em auto;line-height:1.5}\
.message{margin:1em 0;padding:.75em 1em;border-radius:6px}\
.user{background:#e8f0fe}.assistant{background:#f4f4f4}\
.role{font-weight:bold;font-size:.85em;color:#555}\
.time{float:right;font-size:.8em;color:#888}\
.list-item{margin:.25em 0 .25em 1em}";

/// Render a session transcript as a standalone HTML page.
///
/// Queries are escaped verbatim; responses go through the lightweight
/// markdown renderer used by the chat view.
pub fn render_transcript_html(session_id: &str, entries: &[HistoryEntry]) -> String {
    let title = format!("Research session {}", escape_html(session_id));
    let mut html = format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{title}</title>\n<style>{STYLE}</style>\n</head>\n<body>\n<h1>{title}</h1>\n"
    );

    if entries.is_empty() {
        html.push_str("<p>This session has no messages.</p>\n");
    }

    for entry in entries {
        let time = entry
            .created_at
            .as_deref()
            .map(|t| format!("<span class=\"time\">{}</span>", escape_html(t)))
            .unwrap_or_default();
        html.push_str(&format!(
            "<div class=\"message user\"><div class=\"role\">You{}</div><div>{}</div></div>\n",
            time,
            escape_html(&entry.query).replace('\n', "<br>")
        ));
        html.push_str(&format!(
            "<div class=\"message assistant\"><div class=\"role\">Assistant</div><div>{}</div></div>\n",
            to_html(&entry.response)
        ));
    }

    html.push_str("</body>\n</html>\n");
    html
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(query: &str, response: &str) -> HistoryEntry {
        HistoryEntry {
            id: None,
            query: query.into(),
            response: response.into(),
            created_at: Some("2024-06-15 11:00:00".into()),
            model: None,
            tokens_used: None,
            response_time: None,
        }
    }

    #[test]
    fn test_query_is_escaped() {
        let html = render_transcript_html("s1", &[entry("<script>x</script>", "ok")]);
        assert!(html.contains("&lt;script&gt;x&lt;/script&gt;"));
        assert!(!html.contains("<script>"));
    }

    #[test]
    fn test_response_uses_markdown() {
        let html = render_transcript_html("s1", &[entry("q", "**bold** text")]);
        assert!(html.contains("<strong>bold</strong> text"));
        assert!(html.contains("2024-06-15 11:00:00"));
    }

    #[test]
    fn test_empty_session() {
        let html = render_transcript_html("<id>", &[]);
        assert!(html.contains("Research session &lt;id&gt;"));
        assert!(html.contains("This session has no messages."));
        assert!(html.ends_with("</html>\n"));
    }
}
