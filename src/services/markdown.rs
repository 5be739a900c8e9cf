//! Markdown rendering for news content
//!
//! pulldown-cmark with tables, strikethrough, task lists and smart
//! punctuation. Authors cannot inject markup: raw HTML in the source is
//! emitted as escaped text and `javascript:` link targets are dropped.
//!
//! ```
//! use football_news::services::markdown::MarkdownRenderer;
//!
//! let renderer = MarkdownRenderer::new();
//! let html = renderer.render("## Full time\n\n**3-1** to the home side");
//! assert!(html.contains("<h2>"));
//! assert!(html.contains("<strong>3-1</strong>"));
//! ```

use pulldown_cmark::{html, CowStr, Event, Options, Parser, Tag};

#[derive(Debug, Clone)]
pub struct MarkdownRenderer {
    options: Options,
}

impl Default for MarkdownRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl MarkdownRenderer {
    pub fn new() -> Self {
        let mut options = Options::empty();
        options.insert(Options::ENABLE_TABLES);
        options.insert(Options::ENABLE_STRIKETHROUGH);
        options.insert(Options::ENABLE_TASKLISTS);
        options.insert(Options::ENABLE_SMART_PUNCTUATION);
        Self { options }
    }

    /// Render markdown to HTML that is safe to embed unescaped
    pub fn render(&self, markdown: &str) -> String {
        let events = Parser::new_ext(markdown, self.options).map(|event| match event {
            Event::Html(raw) | Event::InlineHtml(raw) => Event::Text(raw),
            Event::Start(Tag::Link {
                link_type,
                dest_url,
                title,
                id,
            }) => Event::Start(Tag::Link {
                link_type,
                dest_url: sanitize_url(dest_url),
                title,
                id,
            }),
            Event::Start(Tag::Image {
                link_type,
                dest_url,
                title,
                id,
            }) => Event::Start(Tag::Image {
                link_type,
                dest_url: sanitize_url(dest_url),
                title,
                id,
            }),
            other => other,
        });

        let mut output = String::with_capacity(markdown.len() * 3 / 2);
        html::push_html(&mut output, events);
        output
    }

    /// Plain-text summary of at most `max_words` words, with an ellipsis when cut
    pub fn excerpt(&self, markdown: &str, max_words: usize) -> String {
        let mut text = String::new();
        for event in Parser::new_ext(markdown, self.options) {
            match event {
                Event::Text(t) | Event::Code(t) => text.push_str(&t),
                Event::SoftBreak | Event::HardBreak | Event::End(_) => text.push(' '),
                _ => {}
            }
        }

        let words: Vec<&str> = text.split_whitespace().collect();
        if words.len() > max_words {
            format!("{}…", words[..max_words].join(" "))
        } else {
            words.join(" ")
        }
    }
}

fn sanitize_url(url: CowStr<'_>) -> CowStr<'_> {
    let scheme = url.trim_start().to_ascii_lowercase();
    let dangerous = ["javascript:", "vbscript:", "data:text/html"];
    if dangerous.iter().any(|prefix| scheme.starts_with(prefix)) {
        CowStr::Borrowed("#")
    } else {
        url
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_basic_markdown() {
        let renderer = MarkdownRenderer::new();
        let html = renderer.render("# Title\n\n- one\n- two\n\n[club](https://example.com)");

        assert!(html.contains("<h1>Title</h1>"));
        assert!(html.contains("<li>one</li>"));
        assert!(html.contains("<a href=\"https://example.com\">club</a>"));
    }

    #[test]
    fn test_raw_html_is_escaped() {
        let renderer = MarkdownRenderer::new();

        let block = renderer.render("<script>alert('x')</script>");
        assert!(!block.contains("<script>"));
        assert!(block.contains("&lt;script&gt;"));

        let inline = renderer.render("hello <b onclick=\"x()\">there</b>");
        assert!(!inline.contains("<b "));
        assert!(inline.contains("&lt;b"));
    }

    #[test]
    fn test_javascript_links_are_neutralised() {
        let renderer = MarkdownRenderer::new();
        let html = renderer.render("[click](javascript:alert(1))");

        assert!(!html.contains("javascript:"));
        assert!(html.contains("href=\"#\""));
    }

    #[test]
    fn test_tables_and_strikethrough() {
        let renderer = MarkdownRenderer::new();
        let html = renderer.render("| Team | Pts |\n|---|---|\n| Home | 3 |\n\n~~rumour~~");

        assert!(html.contains("<table>"));
        assert!(html.contains("<del>rumour</del>"));
    }

    #[test]
    fn test_excerpt() {
        let renderer = MarkdownRenderer::new();

        assert_eq!(renderer.excerpt("**Big** win for the _home_ side", 10), "Big win for the home side");
        assert_eq!(renderer.excerpt("one two three four", 2), "one two…");
        assert_eq!(renderer.excerpt("", 5), "");
    }
}
