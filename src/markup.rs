//! Markdown → markup tree conversion for the streaming render loop.
//!
//! The accumulated model output is re-parsed on every fragment. Embedded
//! `<pokemon-card>` tags pass through as [`Node::Card`]; all other raw HTML
//! in the stream is dropped. An incomplete widget tag (its closing `>` still
//! in flight) is trimmed from the source and resolves once a later fragment
//! completes it.

use pulldown_cmark::{Event, HeadingLevel, Options, Parser, Tag};

use crate::card::CardRegistry;

/// One node of the markup tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element {
        tag: &'static str,
        attrs: Vec<(String, String)>,
        children: Vec<Node>,
    },
    Text(String),
    /// An embedded card widget, keyed by its normalized identifier.
    Card { key: String },
}

impl Node {
    pub fn element(tag: &'static str, children: Vec<Node>) -> Node {
        Node::Element {
            tag,
            attrs: Vec::new(),
            children,
        }
    }

    pub fn text(content: &str) -> Node {
        Node::Text(content.to_string())
    }
}

const CARD_TAG_OPEN: &str = "<pokemon-card";

/// Tags serialized without children or a closing tag.
const VOID_TAGS: &[&str] = &["br", "hr"];

/// Normalize a widget identifier: trimmed, lowercased (names are
/// case-insensitive; numeric ids pass through unchanged).
pub fn normalize_identifier(value: &str) -> String {
    value.trim().to_lowercase()
}

/// Extract the identifying attribute from a widget tag's attribute source.
/// `pokemon-id` wins over `pokemon-name` when both are present.
pub fn card_identifier(attr_src: &str) -> Option<String> {
    attr_value(attr_src, "pokemon-id")
        .or_else(|| attr_value(attr_src, "pokemon-name"))
        .map(|v| normalize_identifier(&v))
        .filter(|v| !v.is_empty())
}

fn attr_value(src: &str, name: &str) -> Option<String> {
    let idx = src.find(name)?;
    let rest = src[idx + name.len()..].trim_start();
    let rest = rest.strip_prefix('=')?;
    let rest = rest.trim_start();
    let value = if let Some(quoted) = rest.strip_prefix('"') {
        quoted.split('"').next().unwrap_or("")
    } else if let Some(quoted) = rest.strip_prefix('\'') {
        quoted.split('\'').next().unwrap_or("")
    } else {
        rest.split(|c: char| c.is_whitespace() || c == '>' || c == '/')
            .next()
            .unwrap_or("")
    };
    Some(value.to_string())
}

/// Drop a trailing widget tag whose closing `>` has not arrived yet, so the
/// raw characters never flash into the rendered document mid-stream.
fn trim_partial_widget_tag(source: &str) -> &str {
    if let Some(pos) = source.rfind(CARD_TAG_OPEN) {
        if !source[pos..].contains('>') {
            return &source[..pos];
        }
    }
    source
}

/// How many tree elements a `Start` event opened (popped again on `End`).
enum Mark {
    Opened(u8),
    Transparent,
}

struct TreeBuilder {
    roots: Vec<Node>,
    stack: Vec<Node>,
    marks: Vec<Mark>,
}

impl TreeBuilder {
    fn new() -> Self {
        TreeBuilder {
            roots: Vec::new(),
            stack: Vec::new(),
            marks: Vec::new(),
        }
    }

    fn append(&mut self, node: Node) {
        match self.stack.last_mut() {
            Some(Node::Element { children, .. }) => children.push(node),
            _ => self.roots.push(node),
        }
    }

    fn open(&mut self, tag: &'static str, attrs: Vec<(String, String)>) {
        self.stack.push(Node::Element {
            tag,
            attrs,
            children: Vec::new(),
        });
    }

    fn close(&mut self) {
        if let Some(node) = self.stack.pop() {
            self.append(node);
        }
    }

    fn start(&mut self, tag: Tag<'_>) {
        let mark = match tag {
            Tag::Paragraph => {
                self.open("p", Vec::new());
                Mark::Opened(1)
            }
            Tag::Heading { level, .. } => {
                self.open(heading_tag(level), Vec::new());
                Mark::Opened(1)
            }
            Tag::BlockQuote(_) => {
                self.open("blockquote", Vec::new());
                Mark::Opened(1)
            }
            Tag::CodeBlock(_) => {
                self.open("pre", Vec::new());
                self.open("code", Vec::new());
                Mark::Opened(2)
            }
            Tag::List(Some(start)) => {
                let attrs = if start != 1 {
                    vec![("start".to_string(), start.to_string())]
                } else {
                    Vec::new()
                };
                self.open("ol", attrs);
                Mark::Opened(1)
            }
            Tag::List(None) => {
                self.open("ul", Vec::new());
                Mark::Opened(1)
            }
            Tag::Item => {
                self.open("li", Vec::new());
                Mark::Opened(1)
            }
            Tag::Emphasis => {
                self.open("em", Vec::new());
                Mark::Opened(1)
            }
            Tag::Strong => {
                self.open("strong", Vec::new());
                Mark::Opened(1)
            }
            Tag::Strikethrough => {
                self.open("del", Vec::new());
                Mark::Opened(1)
            }
            Tag::Link { dest_url, .. } => {
                self.open("a", vec![("href".to_string(), dest_url.to_string())]);
                Mark::Opened(1)
            }
            _ => Mark::Transparent,
        };
        self.marks.push(mark);
    }

    fn end(&mut self) {
        match self.marks.pop() {
            Some(Mark::Opened(n)) => {
                for _ in 0..n {
                    self.close();
                }
            }
            Some(Mark::Transparent) | None => {}
        }
    }

    /// Scan a raw HTML run for complete widget tags; other HTML is dropped.
    fn scan_raw_html(&mut self, html: &str) {
        let mut rest = html;
        while let Some(pos) = rest.find(CARD_TAG_OPEN) {
            let after = &rest[pos + CARD_TAG_OPEN.len()..];
            let boundary_ok = after
                .chars()
                .next()
                .map_or(false, |c| c.is_whitespace() || c == '>' || c == '/');
            if !boundary_ok {
                rest = after;
                continue;
            }
            let Some(end) = after.find('>') else {
                return;
            };
            if let Some(key) = card_identifier(after[..end].trim_end_matches('/')) {
                self.append(Node::Card { key });
            }
            rest = &after[end + 1..];
        }
    }

    fn finish(mut self) -> Vec<Node> {
        while !self.stack.is_empty() {
            self.close();
        }
        self.roots
    }
}

fn heading_tag(level: HeadingLevel) -> &'static str {
    match level {
        HeadingLevel::H1 => "h1",
        HeadingLevel::H2 => "h2",
        HeadingLevel::H3 => "h3",
        HeadingLevel::H4 => "h4",
        HeadingLevel::H5 => "h5",
        HeadingLevel::H6 => "h6",
    }
}

/// Convert accumulated markdown into a markup tree.
pub fn parse_markup(source: &str) -> Vec<Node> {
    let source = trim_partial_widget_tag(source);
    let mut builder = TreeBuilder::new();
    let parser = Parser::new_ext(source, Options::empty());
    for event in parser {
        match event {
            Event::Start(tag) => builder.start(tag),
            Event::End(_) => builder.end(),
            Event::Text(text) => builder.append(Node::Text(text.to_string())),
            Event::Code(code) => {
                let node = Node::element("code", vec![Node::Text(code.to_string())]);
                builder.append(node);
            }
            Event::Html(html) | Event::InlineHtml(html) => builder.scan_raw_html(&html),
            Event::SoftBreak => builder.append(Node::Text("\n".to_string())),
            Event::HardBreak => builder.append(Node::element("br", Vec::new())),
            Event::Rule => builder.append(Node::element("hr", Vec::new())),
            _ => {}
        }
    }
    builder.finish()
}

/// Escape text for HTML output.
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

/// Serialize a markup tree to HTML, splicing each card's most recently
/// rendered output from the registry.
pub fn render_html(nodes: &[Node], cards: &CardRegistry) -> String {
    let mut out = String::new();
    for node in nodes {
        write_node(&mut out, node, cards);
    }
    out
}

fn write_node(out: &mut String, node: &Node, cards: &CardRegistry) {
    match node {
        Node::Text(text) => out.push_str(&escape_html(text)),
        Node::Card { key } => {
            if let Some(html) = cards.html_for(key) {
                out.push_str(html);
            }
        }
        Node::Element {
            tag,
            attrs,
            children,
        } => {
            out.push('<');
            out.push_str(tag);
            for (name, value) in attrs {
                out.push(' ');
                out.push_str(name);
                out.push_str("=\"");
                out.push_str(&escape_html(value));
                out.push('"');
            }
            out.push('>');
            if VOID_TAGS.contains(tag) {
                return;
            }
            for child in children {
                write_node(out, child, cards);
            }
            out.push_str("</");
            out.push_str(tag);
            out.push('>');
        }
    }
}

/// Concatenated text content of a tree (cards excluded).
pub fn text_content(nodes: &[Node]) -> String {
    let mut out = String::new();
    collect_text(nodes, &mut out);
    out
}

fn collect_text(nodes: &[Node], out: &mut String) {
    for node in nodes {
        match node {
            Node::Text(text) => out.push_str(text),
            Node::Element { children, .. } => collect_text(children, out),
            Node::Card { .. } => {}
        }
    }
}

/// Collect every card key in the tree, in document order, first occurrence
/// only.
pub fn card_keys(nodes: &[Node]) -> Vec<String> {
    let mut keys = Vec::new();
    collect_cards(nodes, &mut keys);
    keys
}

fn collect_cards(nodes: &[Node], keys: &mut Vec<String>) {
    for node in nodes {
        match node {
            Node::Card { key } => {
                if !keys.iter().any(|k| k == key) {
                    keys.push(key.clone());
                }
            }
            Node::Element { children, .. } => collect_cards(children, keys),
            Node::Text(_) => {}
        }
    }
}
