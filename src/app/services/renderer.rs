//! Markdown source to styled HTML.
//!
//! Rendering is split in two steps so view changes stay cheap:
//! [`render_markdown`] does the structural transform (the expensive part,
//! cached per session) and [`compose`] wraps a body with theme variables and
//! style parameters. Both are pure: same inputs, same bytes.

use std::collections::HashMap;
use std::path::Path;
use std::sync::LazyLock;

use pulldown_cmark::{CodeBlockKind, CowStr, Event, Options, Parser, Tag, TagEnd, html};
use syntect::highlighting::ThemeSet;
use syntect::html::{ClassStyle, ClassedHTMLGenerator, css_for_theme_with_class_style};
use syntect::parsing::SyntaxSet;
use syntect::util::LinesWithEndings;

use crate::app::domain::config::{Config, clamp_zoom};
use crate::app::domain::theme::Theme;

static SYNTAX_SET: LazyLock<SyntaxSet> = LazyLock::new(SyntaxSet::load_defaults_newlines);
static THEME_SET: LazyLock<ThemeSet> = LazyLock::new(ThemeSet::load_defaults);

/// Stylesheet for highlighted code, generated once from the code theme.
static CODE_CSS: LazyLock<String> = LazyLock::new(|| {
    THEME_SET
        .themes
        .get(CODE_THEME)
        .and_then(|theme| css_for_theme_with_class_style(theme, CODE_CLASS_STYLE).ok())
        .unwrap_or_default()
});

const CODE_THEME: &str = "base16-ocean.dark";
const CODE_CLASS_STYLE: ClassStyle = ClassStyle::SpacedPrefixed { prefix: "hl-" };

const BASE_CSS: &str = r#"
html { background-color: var(--mdv-background); }
body {
    background-color: var(--mdv-background);
    color: var(--mdv-foreground);
    padding: 2em;
    margin: 0 auto;
}
h1 { font-size: 2em; border-bottom: 1px solid var(--mdv-border); padding-bottom: 0.3em; }
h2 { font-size: 1.5em; border-bottom: 1px solid var(--mdv-border); padding-bottom: 0.3em; }
h3 { font-size: 1.25em; }
h4 { font-size: 1em; }
h5 { font-size: 0.875em; }
h6 { font-size: 0.85em; }
a { color: var(--mdv-link); text-decoration: none; }
a:hover { text-decoration: underline; }
code {
    background-color: var(--mdv-code-background);
    padding: 0.2em 0.4em;
    border-radius: 3px;
}
pre {
    background-color: var(--mdv-code-background);
    padding: 1em;
    border-radius: 6px;
    overflow-x: auto;
}
pre code { padding: 0; background: none; }
blockquote {
    border-left: 4px solid var(--mdv-accent);
    margin: 0;
    padding-left: 1em;
    opacity: 0.8;
}
table { border-collapse: collapse; width: 100%; }
th, td { border: 1px solid var(--mdv-border); padding: 0.5em; }
th { background-color: var(--mdv-code-background); }
img { max-width: 100%; }
hr { border: none; border-top: 1px solid var(--mdv-border); }
"#;

/// Presentation parameters derived from config and the session zoom.
/// Independent of the document structure.
#[derive(Debug, Clone, PartialEq)]
pub struct StyleParams {
    pub font_family: String,
    pub code_font: String,
    /// Base font size already multiplied by `zoom`.
    pub font_size_px: f64,
    pub line_height: f64,
    pub max_width_ch: u32,
    pub zoom: f64,
}

impl StyleParams {
    pub fn new(config: &Config, zoom: f64) -> Self {
        let zoom = clamp_zoom(zoom);
        let font_size_px = (f64::from(config.font_size) * zoom * 100.0).round() / 100.0;
        Self {
            font_family: config.font_family.clone(),
            code_font: config.code_font.clone(),
            font_size_px,
            line_height: config.line_height,
            max_width_ch: config.max_width,
            zoom,
        }
    }

    pub fn to_css(&self) -> String {
        format!(
            "body {{\n    font-family: {};\n    font-size: {}px;\n    line-height: {};\n    max-width: {}ch;\n}}\ncode, pre code {{\n    font-family: {};\n}}\n",
            css_value(&self.font_family),
            self.font_size_px,
            self.line_height,
            self.max_width_ch,
            css_value(&self.code_font),
        )
    }

    /// Zoom as a whole percentage, for status displays.
    pub fn zoom_percent(&self) -> u32 {
        (self.zoom * 100.0).round() as u32
    }
}

/// A complete document ready for the display surface.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedOutput {
    pub html: String,
    pub style: StyleParams,
}

/// Render `content` with the configured zoom and no base directory.
pub fn render(content: &str, config: &Config, theme: &Theme) -> RenderedOutput {
    let body = render_markdown(content);
    compose(&body, None, &StyleParams::new(config, config.initial_zoom()), theme)
}

/// Structural transform: markdown to an HTML fragment.
///
/// Never fails. Constructs the parser does not recognise come through as
/// literal text.
pub fn render_markdown(text: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);
    options.insert(Options::ENABLE_FOOTNOTES);
    options.insert(Options::ENABLE_HEADING_ATTRIBUTES);

    let mut events: Vec<Event<'_>> = Parser::new_ext(text, options).collect();
    assign_heading_ids(&mut events);

    let mut html_output = String::with_capacity(text.len() * 3 / 2);
    html::push_html(&mut html_output, highlight_code_blocks(events).into_iter());
    html_output
}

/// Wrap a rendered body into a standalone HTML document.
pub fn compose(body: &str, base_dir: Option<&Path>, style: &StyleParams, theme: &Theme) -> RenderedOutput {
    let base = base_dir
        .map(|dir| format!("<base href=\"{}\">\n", file_url(dir)))
        .unwrap_or_default();

    let html = format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n{base}<style>\n{vars}\n{BASE_CSS}\n{overrides}\n{code}\n</style>\n</head>\n<body>\n<article class=\"markdown-body\">\n{body}</article>\n</body>\n</html>\n",
        vars = theme.to_css_variables(),
        overrides = style.to_css(),
        code = CODE_CSS.as_str(),
    );

    RenderedOutput {
        html,
        style: style.clone(),
    }
}

/// Give every heading without an explicit `{#id}` a slug id, unique within
/// the document.
fn assign_heading_ids(events: &mut [Event<'_>]) {
    let mut used: HashMap<String, usize> = HashMap::new();
    for event in events.iter() {
        if let Event::Start(Tag::Heading { id: Some(id), .. }) = event {
            used.insert(id.to_string(), 0);
        }
    }

    let mut i = 0;
    while i < events.len() {
        if let Event::Start(Tag::Heading { id: None, .. }) = &events[i] {
            let mut text = String::new();
            let mut j = i + 1;
            while j < events.len() {
                match &events[j] {
                    Event::End(TagEnd::Heading(_)) => break,
                    Event::Text(t) | Event::Code(t) => text.push_str(t),
                    _ => {}
                }
                j += 1;
            }

            let slug = unique_slug(slugify(&text), &mut used);
            if let Event::Start(Tag::Heading { id, .. }) = &mut events[i] {
                *id = Some(CowStr::from(slug));
            }
            i = j;
        }
        i += 1;
    }
}

fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    for ch in text.chars().flat_map(char::to_lowercase) {
        if ch.is_alphanumeric() {
            slug.push(ch);
        } else if (ch.is_whitespace() || ch == '-' || ch == '_') && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    let slug = slug.trim_matches('-');
    if slug.is_empty() {
        "section".to_string()
    } else {
        slug.to_string()
    }
}

fn unique_slug(slug: String, used: &mut HashMap<String, usize>) -> String {
    let Some(&seen) = used.get(&slug) else {
        used.insert(slug.clone(), 0);
        return slug;
    };
    let mut count = seen;
    loop {
        count += 1;
        let candidate = format!("{}-{}", slug, count);
        if !used.contains_key(&candidate) {
            used.insert(slug, count);
            used.insert(candidate.clone(), 0);
            return candidate;
        }
    }
}

/// Replace fenced code blocks with highlighted HTML and turn soft breaks
/// into hard ones.
fn highlight_code_blocks(events: Vec<Event<'_>>) -> Vec<Event<'_>> {
    let mut out = Vec::with_capacity(events.len());
    let mut code: Option<(String, String)> = None;

    for event in events {
        match event {
            Event::Start(Tag::CodeBlock(kind)) => {
                let lang = match kind {
                    CodeBlockKind::Fenced(info) => info
                        .split(|c: char| c.is_whitespace() || c == ',')
                        .next()
                        .unwrap_or("")
                        .to_string(),
                    CodeBlockKind::Indented => String::new(),
                };
                code = Some((lang, String::new()));
            }
            Event::End(TagEnd::CodeBlock) => {
                if let Some((lang, buf)) = code.take() {
                    out.push(Event::Html(CowStr::from(highlight_code(&buf, &lang))));
                }
            }
            Event::Text(text) if code.is_some() => {
                if let Some((_, buf)) = code.as_mut() {
                    buf.push_str(&text);
                }
            }
            Event::SoftBreak if code.is_none() => out.push(Event::HardBreak),
            other => out.push(other),
        }
    }

    out
}

fn highlight_code(code: &str, lang: &str) -> String {
    let syntax = if lang.is_empty() {
        None
    } else {
        SYNTAX_SET.find_syntax_by_token(lang)
    };

    let Some(syntax) = syntax else {
        return plain_code_block(code, lang);
    };

    let mut generator =
        ClassedHTMLGenerator::new_with_class_style(syntax, &SYNTAX_SET, CODE_CLASS_STYLE);
    for line in LinesWithEndings::from(code) {
        if generator.parse_html_for_line_which_includes_newline(line).is_err() {
            return plain_code_block(code, lang);
        }
    }

    format!(
        "<pre class=\"code\"><code class=\"language-{}\">{}</code></pre>\n",
        escape_html(lang),
        generator.finalize()
    )
}

fn plain_code_block(code: &str, lang: &str) -> String {
    if lang.is_empty() {
        format!("<pre><code>{}</code></pre>\n", escape_html(code))
    } else {
        format!(
            "<pre><code class=\"language-{}\">{}</code></pre>\n",
            escape_html(lang),
            escape_html(code)
        )
    }
}

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Strip characters that would end a CSS declaration early.
fn css_value(value: &str) -> String {
    value
        .chars()
        .filter(|c| !matches!(c, ';' | '{' | '}' | '<' | '>'))
        .collect()
}

/// `file://` URL for a directory, with a trailing slash so relative
/// references resolve inside it.
fn file_url(dir: &Path) -> String {
    let mut url = String::from("file://");
    for ch in dir.to_string_lossy().chars() {
        match ch {
            '%' => url.push_str("%25"),
            ' ' => url.push_str("%20"),
            '"' => url.push_str("%22"),
            '#' => url.push_str("%23"),
            '?' => url.push_str("%3F"),
            '\\' => url.push('/'),
            _ => url.push(ch),
        }
    }
    if !url.ends_with('/') {
        url.push('/');
    }
    url
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::domain::config::{MAX_ZOOM, MIN_ZOOM};

    #[test]
    fn test_render_is_idempotent() {
        let config = Config::default();
        let theme = Theme::from_css("--background: #000;");
        let source = "# Title\n\nSome *text*.\n\n```rust\nfn main() {}\n```\n";
        let first = render(source, &config, &theme);
        let second = render(source, &config, &theme);
        assert_eq!(first.html, second.html);
        assert_eq!(first.style, second.style);
    }

    #[test]
    fn test_empty_input_renders_valid_document() {
        let output = render("", &Config::default(), &Theme::empty());
        assert!(output.html.starts_with("<!DOCTYPE html>"));
        assert!(output.html.contains("<article class=\"markdown-body\">\n</article>"));
        assert_eq!(render_markdown(""), "");
    }

    #[test]
    fn test_structural_markup() {
        let body = render_markdown("# Hello\n\n- one\n- two\n\n| a | b |\n|---|---|\n| 1 | 2 |\n");
        assert!(body.contains("<h1 id=\"hello\">Hello</h1>"));
        assert!(body.contains("<li>one</li>"));
        assert!(body.contains("<table>"));
    }

    #[test]
    fn test_duplicate_headings_get_unique_ids() {
        let body = render_markdown("## Setup\n\n## Setup\n\n## Setup\n");
        assert!(body.contains("id=\"setup\""));
        assert!(body.contains("id=\"setup-1\""));
        assert!(body.contains("id=\"setup-2\""));
    }

    #[test]
    fn test_duplicate_heading_skips_taken_suffix() {
        let body = render_markdown("## Setup\n\n## Setup 1\n\n## Setup\n\n## Setup\n");
        assert_eq!(body.matches("id=\"setup-1\"").count(), 1);
        assert!(body.contains("id=\"setup-2\""));
        assert!(body.contains("id=\"setup-3\""));
    }

    #[test]
    fn test_explicit_heading_id_kept() {
        let body = render_markdown("# Intro {#start}\n");
        assert!(body.contains("id=\"start\""));
    }

    #[test]
    fn test_fenced_code_is_highlighted() {
        let body = render_markdown("```rust\nlet x = 1;\n```\n");
        assert!(body.contains("class=\"language-rust\""));
        assert!(body.contains("hl-"));
    }

    #[test]
    fn test_unknown_language_falls_back_to_plain() {
        let body = render_markdown("```nosuchlang\n<tag> & stuff\n```\n");
        assert!(body.contains("<pre><code class=\"language-nosuchlang\">&lt;tag&gt; &amp; stuff\n</code></pre>"));
    }

    #[test]
    fn test_malformed_markdown_degrades_to_text() {
        let body = render_markdown("**unclosed [link](\n\n| broken | table\n");
        assert!(body.contains("**unclosed"));
        assert!(body.contains("broken"));
    }

    #[test]
    fn test_soft_breaks_become_line_breaks() {
        let body = render_markdown("line one\nline two\n");
        assert!(body.contains("line one<br />"));
    }

    #[test]
    fn test_theme_injected_as_variables() {
        let theme = Theme::from_css("--background: #123456;");
        let output = render("text", &Config::default(), &theme);
        assert!(output.html.contains("--mdv-background: #123456;"));
        assert!(output.html.contains("--mdv-foreground: #cdd6f4;"));
    }

    #[test]
    fn test_style_params_follow_config_and_zoom() {
        let config = Config {
            font_size: 20,
            max_width: 40,
            ..Config::default()
        };
        let style = StyleParams::new(&config, 1.5);
        assert_eq!(style.font_size_px, 30.0);
        assert_eq!(style.zoom_percent(), 150);
        let css = style.to_css();
        assert!(css.contains("font-size: 30px;"));
        assert!(css.contains("max-width: 40ch;"));
    }

    #[test]
    fn test_style_params_clamp_zoom() {
        let config = Config::default();
        assert_eq!(StyleParams::new(&config, 10.0).zoom, MAX_ZOOM);
        assert_eq!(StyleParams::new(&config, 0.0).zoom, MIN_ZOOM);
    }

    #[test]
    fn test_base_href_points_at_document_dir() {
        let style = StyleParams::new(&Config::default(), 1.0);
        let output = compose("<p>x</p>", Some(Path::new("/home/me/my docs")), &style, &Theme::empty());
        assert!(output.html.contains("<base href=\"file:///home/me/my%20docs/\">"));
    }

    #[test]
    fn test_css_values_cannot_break_out() {
        let config = Config {
            font_family: "Sans; } body { display: none".to_string(),
            ..Config::default()
        };
        let css = StyleParams::new(&config, 1.0).to_css();
        assert_eq!(css.matches('{').count(), 2);
        assert!(css.contains("font-family: Sans  body  display: none;"));
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Hello, World!"), "hello-world");
        assert_eq!(slugify("  spaced   out  "), "spaced-out");
        assert_eq!(slugify("!!!"), "section");
    }
}
