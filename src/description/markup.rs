//! Markdown normalization and rendering to a [`dom`](super::dom) tree.
//!
//! ## Normalization
//!
//! A line-level pass over the source, skipping fenced code:
//!
//! ```text
//! >[Alt](clip.mp4)       →  ![Alt](clip.mp4)            (alternate embed syntax)
//! {#intro .lead}         →  attributes for the next block
//! - item\n\n\n           →  list ends after two blank lines
//! ```
//!
//! Attribute lines and list terminators are carried as HTML comment
//! directives, which the tree builder interprets and drops.
//!
//! ## Rendering
//!
//! `pulldown-cmark` events are folded into [`Element`]s on a stack. Beyond
//! plain CommonMark the builder:
//!
//! - turns soft breaks into `<br />`
//! - keeps ordered list start numbers
//! - gives every heading a unique slug id unless one was written
//! - gathers footnote definitions into a trailing `div.footnotes`

use super::dom::{Element, Node};
use crate::slug::slugify;
use pulldown_cmark::{CodeBlockKind, Event, HeadingLevel, Options, Parser, Tag};
use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;

static ALTERNATE_EMBED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^>(\[[^\]]+\]\([^)]+\)\s*)$").unwrap());
static BLOCK_ATTRIBUTES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\{\s*((?:[#.]|[\w-]+=)[^}]*)\}\s*$").unwrap());
static ATTRIBUTE_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"#([\w-]+)|\.([\w-]+)|([\w-]+)=(?:"([^"]*)"|(\S+))"#).unwrap()
});
static LIST_ITEM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(?:[-*+]|\d+[.)])(?:\s|$)").unwrap());

const DIRECTIVE_PREFIX: &str = "<!-- workbase:";
const END_LIST: &str = "<!-- workbase:end-list -->";

/// Apply the line-level rewrites described in the module docs.
pub fn normalize(text: &str) -> String {
    let mut out: Vec<String> = Vec::new();
    let mut fence: Option<&str> = None;
    let mut in_list = false;
    let mut blank_run = 0;

    for line in text.lines() {
        let trimmed = line.trim_start();

        if let Some(marker) = fence {
            if trimmed.starts_with(marker) {
                fence = None;
            }
            out.push(line.to_string());
            continue;
        }
        if trimmed.starts_with("```") || trimmed.starts_with("~~~") {
            fence = Some(&trimmed[..3]);
            blank_run = 0;
            out.push(line.to_string());
            continue;
        }

        if trimmed.is_empty() {
            blank_run += 1;
            out.push(line.to_string());
            if in_list && blank_run == 2 {
                out.push(END_LIST.to_string());
                in_list = false;
            }
            continue;
        }

        if LIST_ITEM.is_match(line) {
            in_list = true;
        } else if blank_run > 0 && !line.starts_with(' ') {
            in_list = false;
        }
        blank_run = 0;

        if let Some(caps) = ALTERNATE_EMBED.captures(line) {
            out.push(format!("!{}", &caps[1]));
        } else if let Some(caps) = BLOCK_ATTRIBUTES.captures(line) {
            out.push(format!("{DIRECTIVE_PREFIX}attrs {} -->", caps[1].trim()));
        } else {
            out.push(line.to_string());
        }
    }

    out.join("\n")
}

fn options() -> Options {
    Options::ENABLE_TABLES
        | Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_TASKLISTS
        | Options::ENABLE_FOOTNOTES
        | Options::ENABLE_HEADING_ATTRIBUTES
        | Options::ENABLE_DEFINITION_LIST
}

/// Normalize then render `text`, returning the `body` element.
pub fn render(text: &str) -> Element {
    let normalized = normalize(text);
    let mut builder = TreeBuilder::new();
    for event in Parser::new_ext(&normalized, options()) {
        builder.event(event);
    }
    builder.finish()
}

/// Parse `#id .class key=value` tokens.
fn parse_attributes(source: &str) -> Vec<(String, String)> {
    ATTRIBUTE_TOKEN
        .captures_iter(source)
        .filter_map(|caps| {
            if let Some(id) = caps.get(1) {
                Some(("id".to_string(), id.as_str().to_string()))
            } else if let Some(class) = caps.get(2) {
                Some(("class".to_string(), class.as_str().to_string()))
            } else {
                let key = caps.get(3)?.as_str().to_string();
                let value = caps.get(4).or_else(|| caps.get(5))?.as_str().to_string();
                Some((key, value))
            }
        })
        .collect()
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

enum FrameKind {
    Plain,
    Heading,
    Image,
    CodeBlock,
    /// Contributes its children to the parent (HTML blocks, metadata).
    Transparent,
    FootnoteDefinition,
    TableHead,
    Table,
}

struct Frame {
    element: Element,
    kind: FrameKind,
}

struct TreeBuilder {
    stack: Vec<Frame>,
    pending_attrs: Vec<(String, String)>,
    heading_ids: HashMap<String, usize>,
    footnote_numbers: HashMap<String, usize>,
    footnotes: Vec<Element>,
}

impl TreeBuilder {
    fn new() -> Self {
        Self {
            stack: vec![Frame {
                element: Element::new("body"),
                kind: FrameKind::Plain,
            }],
            pending_attrs: Vec::new(),
            heading_ids: HashMap::new(),
            footnote_numbers: HashMap::new(),
            footnotes: Vec::new(),
        }
    }

    fn event(&mut self, event: Event) {
        match event {
            Event::Start(tag) => self.start(tag),
            Event::End(_) => self.end(),
            Event::Text(text) => self.text(&text),
            Event::Code(code) => self.append(Node::Element(
                Element::new("code").with_child(Node::Text(code.to_string())),
            )),
            Event::InlineMath(math) | Event::DisplayMath(math) => self.text(&math),
            Event::Html(html) | Event::InlineHtml(html) => self.html(&html),
            Event::FootnoteReference(key) => self.footnote_reference(&key),
            Event::SoftBreak | Event::HardBreak => self.append(Node::Element(Element::new("br"))),
            Event::Rule => self.append(Node::Element(Element::new("hr"))),
            Event::TaskListMarker(checked) => {
                let mut input = Element::new("input")
                    .with_attr("type", "checkbox")
                    .with_attr("disabled", "");
                if checked {
                    input.set_attr("checked", "");
                }
                self.append(Node::Element(input));
            }
        }
    }

    fn push(&mut self, element: Element, kind: FrameKind) {
        self.stack.push(Frame { element, kind });
    }

    fn in_table_head(&self) -> bool {
        self.stack
            .iter()
            .any(|frame| matches!(frame.kind, FrameKind::TableHead))
    }

    fn start(&mut self, tag: Tag) {
        match tag {
            Tag::Paragraph => self.push(Element::new("p"), FrameKind::Plain),
            Tag::Heading {
                level,
                id,
                classes,
                attrs,
            } => {
                let mut heading = Element::new(heading_tag(level));
                if let Some(id) = id {
                    heading.set_attr("id", id.to_string());
                }
                for class in classes {
                    heading.set_attr("class", class.to_string());
                }
                for (key, value) in attrs {
                    heading.set_attr(key.to_string(), value.map(|v| v.to_string()).unwrap_or_default());
                }
                self.push(heading, FrameKind::Heading);
            }
            Tag::BlockQuote(_) => self.push(Element::new("blockquote"), FrameKind::Plain),
            Tag::CodeBlock(kind) => {
                let mut code = Element::new("code");
                if let CodeBlockKind::Fenced(info) = kind {
                    if let Some(lang) = info.split_whitespace().next() {
                        code.set_attr("class", format!("language-{lang}"));
                    }
                }
                self.push(code, FrameKind::CodeBlock);
            }
            Tag::HtmlBlock | Tag::MetadataBlock(_) => {
                self.push(Element::default(), FrameKind::Transparent)
            }
            Tag::List(Some(start)) => {
                let mut list = Element::new("ol");
                if start != 1 {
                    list.set_attr("start", start.to_string());
                }
                self.push(list, FrameKind::Plain);
            }
            Tag::List(None) => self.push(Element::new("ul"), FrameKind::Plain),
            Tag::Item => self.push(Element::new("li"), FrameKind::Plain),
            Tag::FootnoteDefinition(key) => self.push(
                Element::new("li").with_attr("id", format!("fn:{key}")),
                FrameKind::FootnoteDefinition,
            ),
            Tag::DefinitionList => self.push(Element::new("dl"), FrameKind::Plain),
            Tag::DefinitionListTitle => self.push(Element::new("dt"), FrameKind::Plain),
            Tag::DefinitionListDefinition => self.push(Element::new("dd"), FrameKind::Plain),
            Tag::Table(_) => self.push(Element::new("table"), FrameKind::Table),
            Tag::TableHead => self.push(Element::new("thead"), FrameKind::TableHead),
            Tag::TableRow => self.push(Element::new("tr"), FrameKind::Plain),
            Tag::TableCell => {
                let tag = if self.in_table_head() { "th" } else { "td" };
                self.push(Element::new(tag), FrameKind::Plain);
            }
            Tag::Emphasis => self.push(Element::new("em"), FrameKind::Plain),
            Tag::Strong => self.push(Element::new("strong"), FrameKind::Plain),
            Tag::Strikethrough => self.push(Element::new("del"), FrameKind::Plain),
            Tag::Superscript => self.push(Element::new("sup"), FrameKind::Plain),
            Tag::Subscript => self.push(Element::new("sub"), FrameKind::Plain),
            Tag::Link {
                dest_url, title, ..
            } => {
                let mut link = Element::new("a").with_attr("href", dest_url.to_string());
                if !title.is_empty() {
                    link.set_attr("title", title.to_string());
                }
                self.push(link, FrameKind::Plain);
            }
            Tag::Image {
                dest_url, title, ..
            } => {
                let mut image = Element::new("img").with_attr("src", dest_url.to_string());
                if !title.is_empty() {
                    image.set_attr("title", title.to_string());
                }
                self.push(image, FrameKind::Image);
            }
        }
    }

    fn end(&mut self) {
        if self.stack.len() <= 1 {
            return;
        }
        let Some(Frame { mut element, kind }) = self.stack.pop() else {
            return;
        };
        match kind {
            FrameKind::Plain => self.append(Node::Element(element)),
            FrameKind::Heading => {
                self.assign_heading_id(&mut element);
                self.append(Node::Element(element));
            }
            FrameKind::Image => {
                let alt = element.text_content();
                element.children.clear();
                element.attrs.insert(1, ("alt".to_string(), alt));
                self.append(Node::Element(element));
            }
            FrameKind::CodeBlock => {
                self.append(Node::Element(Element::new("pre").with_child(Node::Element(element))))
            }
            FrameKind::Transparent => {
                for child in element.children {
                    self.append(child);
                }
            }
            FrameKind::FootnoteDefinition => {
                if let Some(inline) = element.sole_child("p").map(|p| p.children.clone()) {
                    element.children = inline;
                }
                self.footnotes.push(element);
            }
            FrameKind::TableHead => {
                let row = Element {
                    tag: "tr".to_string(),
                    attrs: Vec::new(),
                    children: std::mem::take(&mut element.children),
                };
                element.children.push(Node::Element(row));
                self.append(Node::Element(element));
            }
            FrameKind::Table => {
                let (head, rows): (Vec<Node>, Vec<Node>) = std::mem::take(&mut element.children)
                    .into_iter()
                    .partition(|node| matches!(node, Node::Element(e) if e.tag == "thead"));
                element.children = head;
                if !rows.is_empty() {
                    element.children.push(Node::Element(Element {
                        tag: "tbody".to_string(),
                        attrs: Vec::new(),
                        children: rows,
                    }));
                }
                self.append(Node::Element(element));
            }
        }
    }

    fn assign_heading_id(&mut self, heading: &mut Element) {
        let base = match heading.attr("id") {
            Some(id) => id.to_string(),
            None => slugify(&heading.text_content()),
        };
        if base.is_empty() {
            return;
        }
        let seen = self.heading_ids.entry(base.clone()).or_insert(0);
        let id = if *seen == 0 {
            base
        } else {
            format!("{base}-{seen}")
        };
        *seen += 1;
        if heading.attr("id").is_none() {
            heading.set_attr("id", id);
        }
    }

    fn append(&mut self, node: Node) {
        let at_top = self.stack.len() == 1;
        let Some(parent) = self.stack.last_mut() else {
            return;
        };
        let node = match node {
            Node::Element(mut element) if at_top && !self.pending_attrs.is_empty() => {
                for (key, value) in self.pending_attrs.drain(..) {
                    element.set_attr(key, value);
                }
                Node::Element(element)
            }
            Node::Text(text) => {
                if let Some(Node::Text(previous)) = parent.element.children.last_mut() {
                    previous.push_str(&text);
                    return;
                }
                Node::Text(text)
            }
            other => other,
        };
        parent.element.children.push(node);
    }

    fn text(&mut self, text: &str) {
        self.append(Node::Text(text.to_string()));
    }

    fn html(&mut self, html: &str) {
        let trimmed = html.trim();
        if let Some(directive) = trimmed.strip_prefix(DIRECTIVE_PREFIX) {
            let directive = directive.trim_end_matches("-->").trim();
            if let Some(attrs) = directive.strip_prefix("attrs") {
                self.pending_attrs.extend(parse_attributes(attrs));
            }
            return;
        }
        self.append(Node::Raw(html.to_string()));
    }

    fn footnote_reference(&mut self, key: &str) {
        let next = self.footnote_numbers.len() + 1;
        let number = *self.footnote_numbers.entry(key.to_string()).or_insert(next);
        let reference = Element::new("sup")
            .with_attr("class", "footnote-ref")
            .with_attr("id", format!("fnref:{key}"))
            .with_child(Node::Element(
                Element::new("a")
                    .with_attr("href", format!("#fn:{key}"))
                    .with_child(Node::Text(number.to_string())),
            ));
        self.append(Node::Element(reference));
    }

    fn finish(mut self) -> Element {
        while self.stack.len() > 1 {
            self.end();
        }
        let mut body = match self.stack.pop() {
            Some(frame) => frame.element,
            None => Element::new("body"),
        };

        if !self.footnotes.is_empty() {
            let numbers = &self.footnote_numbers;
            let number_of = |item: &Element| {
                item.attr("id")
                    .and_then(|id| id.strip_prefix("fn:"))
                    .and_then(|key| numbers.get(key).copied())
                    .unwrap_or(usize::MAX)
            };
            // Stable: unreferenced definitions keep their source order at the end.
            self.footnotes.sort_by_key(number_of);
            let list = Element {
                tag: "ol".to_string(),
                attrs: Vec::new(),
                children: self.footnotes.into_iter().map(Node::Element).collect(),
            };
            body.children.push(Node::Element(
                Element::new("div")
                    .with_attr("class", "footnotes")
                    .with_child(Node::Element(Element::new("hr")))
                    .with_child(Node::Element(list)),
            ));
        }
        body
    }
}
