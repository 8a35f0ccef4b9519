//! Markdown-lite: bold, links, numbered list items and line breaks
//!
//! Text is parsed line by line into a small node tree which is then rendered
//! either to an HTML fragment or to styled terminal lines. Anything that does
//! not form a complete construct stays literal text.

use crate::theme::Theme;
use ratatui::{
    style::{Modifier, Style},
    text::{Line, Span},
};
use unicode_width::UnicodeWidthStr;

/// Inline content of a line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inline {
    Text(String),
    Bold(Vec<Inline>),
    Link { text: String, href: String },
}

/// One source line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    /// Ordinary line of inline content
    Line(Vec<Inline>),
    /// `N. **head** rest`
    ListItem {
        number: u32,
        head: Vec<Inline>,
        rest: Vec<Inline>,
    },
}

/// Parsed document
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Document {
    pub blocks: Vec<Block>,
}

/// Parse markdown-lite text
pub fn parse(text: &str) -> Document {
    let blocks = text
        .split('\n')
        .map(|line| parse_list_item(line).unwrap_or_else(|| Block::Line(parse_inline(line))))
        .collect();
    Document { blocks }
}

fn parse_list_item(line: &str) -> Option<Block> {
    let digits = line.bytes().take_while(u8::is_ascii_digit).count();
    if digits == 0 {
        return None;
    }
    let number = line[..digits].parse().ok()?;
    let after = line[digits..].strip_prefix('.')?;
    let trimmed = after.trim_start();
    if trimmed.len() == after.len() {
        return None;
    }
    let inner = trimmed.strip_prefix("**")?;
    let end = inner.find("**")?;

    Some(Block::ListItem {
        number,
        head: parse_links(&inner[..end]),
        rest: parse_inline(&inner[end + 2..]),
    })
}

/// Parse bold spans and links in a single line
pub fn parse_inline(line: &str) -> Vec<Inline> {
    let mut nodes = Vec::new();
    let mut text = String::new();
    let mut rest = line;

    while !rest.is_empty() {
        if let Some(after) = rest.strip_prefix("**") {
            if let Some(end) = after.find("**") {
                flush(&mut text, &mut nodes);
                nodes.push(Inline::Bold(parse_links(&after[..end])));
                rest = &after[end + 2..];
                continue;
            }
        }
        if let Some((link, consumed)) = parse_link(rest) {
            flush(&mut text, &mut nodes);
            nodes.push(link);
            rest = &rest[consumed..];
            continue;
        }
        let Some(c) = rest.chars().next() else {
            break;
        };
        text.push(c);
        rest = &rest[c.len_utf8()..];
    }

    flush(&mut text, &mut nodes);
    nodes
}

fn parse_links(segment: &str) -> Vec<Inline> {
    let mut nodes = Vec::new();
    let mut text = String::new();
    let mut rest = segment;

    while let Some(c) = rest.chars().next() {
        if let Some((link, consumed)) = parse_link(rest) {
            flush(&mut text, &mut nodes);
            nodes.push(link);
            rest = &rest[consumed..];
        } else {
            text.push(c);
            rest = &rest[c.len_utf8()..];
        }
    }

    flush(&mut text, &mut nodes);
    nodes
}

/// `[text](href)` at the start of `input`; returns the node and bytes consumed
fn parse_link(input: &str) -> Option<(Inline, usize)> {
    let body = input.strip_prefix('[')?;
    let close = body.find(']')?;
    let text = &body[..close];
    let href_part = body[close + 1..].strip_prefix('(')?;
    let end = href_part.find(')')?;
    let href = &href_part[..end];
    if text.is_empty() || href.is_empty() {
        return None;
    }

    let consumed = 1 + close + 2 + end + 1;
    Some((
        Inline::Link {
            text: text.to_string(),
            href: href.to_string(),
        },
        consumed,
    ))
}

fn flush(text: &mut String, nodes: &mut Vec<Inline>) {
    if !text.is_empty() {
        nodes.push(Inline::Text(std::mem::take(text)));
    }
}

/// Whether a link target may be emitted as an anchor
fn is_safe_href(href: &str) -> bool {
    let lower = href.trim_start().to_ascii_lowercase();
    match lower.split_once(':') {
        Some((scheme, _)) if !scheme.contains('/') => {
            matches!(scheme, "http" | "https" | "mailto")
        }
        _ => true,
    }
}

// HTML rendering

/// Escape text for use in HTML content and attribute values
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Render markdown-lite text to an HTML fragment
pub fn to_html(text: &str) -> String {
    parse(text).to_html()
}

impl Document {
    /// Render to an HTML fragment
    pub fn to_html(&self) -> String {
        let mut out = String::new();
        let last = self.blocks.len().saturating_sub(1);

        for (i, block) in self.blocks.iter().enumerate() {
            match block {
                Block::Line(inlines) => {
                    inlines_html(inlines, &mut out);
                    if i < last {
                        out.push_str("<br>");
                    }
                }
                Block::ListItem { head, rest, .. } => {
                    out.push_str("<div class=\"list-item\"><strong>");
                    inlines_html(head, &mut out);
                    out.push_str("</strong>");
                    inlines_html(rest, &mut out);
                    out.push_str("</div>");
                }
            }
        }
        out
    }
}

fn inlines_html(inlines: &[Inline], out: &mut String) {
    for inline in inlines {
        match inline {
            Inline::Text(text) => out.push_str(&escape_html(text)),
            Inline::Bold(children) => {
                out.push_str("<strong>");
                inlines_html(children, out);
                out.push_str("</strong>");
            }
            Inline::Link { text, href } if is_safe_href(href) => {
                out.push_str(&format!(
                    "<a href=\"{}\" target=\"_blank\" rel=\"noopener noreferrer\">{}</a>",
                    escape_html(href),
                    escape_html(text)
                ));
            }
            Inline::Link { text, .. } => out.push_str(&escape_html(text)),
        }
    }
}

// Terminal rendering

/// Convert markdown-lite text to styled lines wrapped at `width` columns
pub fn render_markdown(text: &str, theme: &Theme, width: usize) -> Vec<Line<'static>> {
    let base = theme.base_style();
    let mut lines = Vec::new();

    for block in parse(text).blocks {
        let mut spans = Vec::new();
        match block {
            Block::Line(inlines) => inline_spans(&inlines, base, theme, &mut spans),
            Block::ListItem { number, head, rest } => {
                spans.push(Span::styled(format!("{}. ", number), theme.dim_style()));
                inline_spans(&head, base.add_modifier(Modifier::BOLD), theme, &mut spans);
                inline_spans(&rest, base, theme, &mut spans);
            }
        }
        lines.extend(wrap_spans(spans, width));
    }

    lines
}

fn inline_spans(inlines: &[Inline], style: Style, theme: &Theme, spans: &mut Vec<Span<'static>>) {
    for inline in inlines {
        match inline {
            Inline::Text(text) => spans.push(Span::styled(text.clone(), style)),
            Inline::Bold(children) => {
                inline_spans(children, style.add_modifier(Modifier::BOLD), theme, spans)
            }
            Inline::Link { text, href } => {
                spans.push(Span::styled(
                    text.clone(),
                    style.fg(theme.link).add_modifier(Modifier::UNDERLINED),
                ));
                spans.push(Span::styled(format!(" ({})", href), theme.dim_style()));
            }
        }
    }
}

/// Word-wrap styled spans. An empty input yields one empty line.
fn wrap_spans(spans: Vec<Span<'static>>, width: usize) -> Vec<Line<'static>> {
    let width = width.max(1);
    let mut lines = Vec::new();
    let mut current: Vec<Span<'static>> = Vec::new();
    let mut used = 0;

    for span in spans {
        let style = span.style;
        for word in split_keep_spaces(&span.content) {
            let w = word.width();
            if used + w > width && used > 0 {
                lines.push(Line::from(std::mem::take(&mut current)));
                used = 0;
                if word.trim().is_empty() {
                    continue;
                }
            }
            if w > width {
                // Hard-break words longer than the line
                for chunk in textwrap::wrap(word, width) {
                    if used > 0 {
                        lines.push(Line::from(std::mem::take(&mut current)));
                    }
                    used = chunk.width();
                    current.push(Span::styled(chunk.into_owned(), style));
                }
                continue;
            }
            used += w;
            current.push(Span::styled(word.to_string(), style));
        }
    }

    lines.push(Line::from(current));
    lines
}

/// Split into alternating runs of spaces and non-spaces
fn split_keep_spaces(text: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut in_space = None;

    for (i, c) in text.char_indices() {
        let space = c == ' ';
        match in_space {
            Some(prev) if prev != space => {
                parts.push(&text[start..i]);
                start = i;
            }
            _ => {}
        }
        in_space = Some(space);
    }
    if start < text.len() {
        parts.push(&text[start..]);
    }
    parts
}
