//! Tag expansion inside WordprocessingML parts.
//!
//! Works on the raw XML text: paragraphs (`<w:p>`) and text runs (`<w:t>`)
//! are located by scanning, so everything outside a rewritten text run is
//! copied through untouched.

use std::ops::Range;

use crate::render::{RenderError, TemplateContext, TemplateValue};

const PARAGRAPH_TAG: &str = "<w:p";
const PARAGRAPH_CLOSE: &str = "</w:p>";
const TEXT_TAG: &str = "<w:t";
const TEXT_CLOSE: &str = "</w:t>";
const PRESERVED_TEXT_OPEN: &str = "<w:t xml:space=\"preserve\">";
const LINE_BREAK: &str = "</w:t><w:br/><w:t xml:space=\"preserve\">";

/// Renders one XML part against `context`.
pub(crate) fn render_part(xml: &str, context: &TemplateContext) -> Result<String, RenderError> {
    if !xml.contains('{') {
        return Ok(xml.to_string());
    }
    let joined = join_split_tags(xml)?;
    render_block(
        &joined,
        Scope {
            context,
            item: None,
        },
    )
}

fn malformed(message: impl Into<String>) -> RenderError {
    RenderError::Malformed(message.into())
}

// ────────────────────────────────────────────────────────────────────────────
// XML scanning
// ────────────────────────────────────────────────────────────────────────────

/// Start of the next `<name` element at or after `from`, skipping elements
/// that merely share the prefix (`<w:pPr>`, `<w:tab/>`, ...).
fn find_element(xml: &str, from: usize, name: &str) -> Option<usize> {
    let mut cursor = from;
    while let Some(offset) = xml.get(cursor..)?.find(name) {
        let start = cursor + offset;
        let next = xml.as_bytes().get(start + name.len()).copied();
        if matches!(next, Some(b'>' | b'/' | b' ' | b'\t' | b'\r' | b'\n')) {
            return Some(start);
        }
        cursor = start + name.len();
    }
    None
}

/// End offset of the opening tag starting at `start`, and whether it is
/// self-closing.
fn open_tag_end(xml: &str, start: usize) -> Result<(usize, bool), RenderError> {
    let close = xml[start..]
        .find('>')
        .map(|i| i + start)
        .ok_or_else(|| malformed("unterminated element"))?;
    Ok((close + 1, xml[..close].ends_with('/')))
}

/// Byte ranges of the outermost paragraphs in `xml`.
fn paragraph_spans(xml: &str) -> Result<Vec<Range<usize>>, RenderError> {
    let mut spans = Vec::new();
    let mut cursor = 0;

    while let Some(start) = find_element(xml, cursor, PARAGRAPH_TAG) {
        let (mut pos, self_closing) = open_tag_end(xml, start)?;
        if !self_closing {
            let mut depth = 1usize;
            while depth > 0 {
                let next_close = xml[pos..]
                    .find(PARAGRAPH_CLOSE)
                    .map(|i| i + pos)
                    .ok_or_else(|| malformed("paragraph is never closed"))?;
                match find_element(xml, pos, PARAGRAPH_TAG) {
                    Some(open) if open < next_close => {
                        let (end, nested_self_closing) = open_tag_end(xml, open)?;
                        if !nested_self_closing {
                            depth += 1;
                        }
                        pos = end;
                    }
                    _ => {
                        depth -= 1;
                        pos = next_close + PARAGRAPH_CLOSE.len();
                    }
                }
            }
        }
        spans.push(start..pos);
        cursor = pos;
    }

    Ok(spans)
}

struct TextNode {
    element: Range<usize>,
    content: Range<usize>,
}

fn text_nodes(xml: &str) -> Result<Vec<TextNode>, RenderError> {
    let mut nodes = Vec::new();
    let mut cursor = 0;

    while let Some(start) = find_element(xml, cursor, TEXT_TAG) {
        let (content_start, self_closing) = open_tag_end(xml, start)?;
        if self_closing {
            cursor = content_start;
            continue;
        }
        let content_end = xml[content_start..]
            .find(TEXT_CLOSE)
            .map(|i| i + content_start)
            .ok_or_else(|| malformed("text run is never closed"))?;
        let end = content_end + TEXT_CLOSE.len();
        nodes.push(TextNode {
            element: start..end,
            content: content_start..content_end,
        });
        cursor = end;
    }

    Ok(nodes)
}

fn paragraph_text(paragraph: &str) -> Result<String, RenderError> {
    Ok(text_nodes(paragraph)?
        .iter()
        .map(|node| &paragraph[node.content.clone()])
        .collect())
}

// ────────────────────────────────────────────────────────────────────────────
// Split tags
// ────────────────────────────────────────────────────────────────────────────

/// Word processors split text into runs wherever formatting or spell-check
/// state changes, which can cut a `{tag}` in pieces. Pull every tag back into
/// the run where it starts, and keep an inline section together with its body
/// and closing tag in the run of the opening tag.
fn join_split_tags(xml: &str) -> Result<String, RenderError> {
    let mut out = String::with_capacity(xml.len());
    let mut cursor = 0;
    for span in paragraph_spans(xml)? {
        out.push_str(&xml[cursor..span.start]);
        out.push_str(&join_paragraph(&xml[span.clone()])?);
        cursor = span.end;
    }
    out.push_str(&xml[cursor..]);
    Ok(out)
}

fn join_paragraph(paragraph: &str) -> Result<String, RenderError> {
    let nodes = text_nodes(paragraph)?;
    if nodes.len() < 2 {
        return Ok(paragraph.to_string());
    }

    let mut texts = vec![String::new(); nodes.len()];
    // run holding the tag being read
    let mut tag_owner: Option<usize> = None;
    let mut tag = String::new();
    // inline sections still open, with the run of their opening tag
    let mut sections: Vec<(String, usize)> = Vec::new();

    for (index, node) in nodes.iter().enumerate() {
        for c in paragraph[node.content.clone()].chars() {
            let target = match (sections.first(), tag_owner) {
                (Some(&(_, open)), _) => open,
                (None, Some(open)) => open,
                (None, None) => index,
            };
            texts[target].push(c);

            if tag_owner.is_some() {
                if c != '}' {
                    tag.push(c);
                    continue;
                }
                tag_owner = None;
                match parse_tag(&tag) {
                    Ok(Tag::Open { name, .. }) => sections.push((name, target)),
                    Ok(Tag::Close(name))
                        if sections.last().is_some_and(|(open, _)| *open == name) =>
                    {
                        sections.pop();
                    }
                    _ => {}
                }
            } else if c == '{' {
                tag_owner = Some(target);
                tag.clear();
            }
        }
    }

    let unchanged = nodes
        .iter()
        .zip(&texts)
        .all(|(node, text)| &paragraph[node.content.clone()] == text.as_str());
    if unchanged {
        return Ok(paragraph.to_string());
    }

    let mut out = String::with_capacity(paragraph.len());
    let mut cursor = 0;
    for (node, text) in nodes.iter().zip(&texts) {
        out.push_str(&paragraph[cursor..node.content.start]);
        out.push_str(text);
        cursor = node.content.end;
    }
    out.push_str(&paragraph[cursor..]);
    Ok(out)
}

// ────────────────────────────────────────────────────────────────────────────
// Tags and scopes
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
enum Tag {
    Value(String),
    Open { name: String, inverted: bool },
    Close(String),
}

fn parse_tag(raw: &str) -> Result<Tag, RenderError> {
    let raw = raw.trim();
    if let Some(name) = raw.strip_prefix('#') {
        return Ok(Tag::Open {
            name: tag_name(name)?,
            inverted: false,
        });
    }
    if let Some(name) = raw.strip_prefix('^') {
        return Ok(Tag::Open {
            name: tag_name(name)?,
            inverted: true,
        });
    }
    if let Some(name) = raw.strip_prefix('/') {
        return Ok(Tag::Close(tag_name(name)?));
    }
    Ok(Tag::Value(tag_name(raw)?))
}

fn tag_name(raw: &str) -> Result<String, RenderError> {
    let name = raw.trim();
    let valid = name == "."
        || (!name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'));
    if valid {
        Ok(name.to_string())
    } else {
        Err(malformed(format!("invalid tag name {{{raw}}}")))
    }
}

#[derive(Clone, Copy)]
struct Scope<'a> {
    context: &'a TemplateContext,
    /// Current element inside a section, addressed as `{.}`.
    item: Option<&'a str>,
}

impl<'a> Scope<'a> {
    fn value(&self, name: &str) -> Result<&'a TemplateValue, RenderError> {
        self.context
            .get(name)
            .ok_or_else(|| RenderError::UnknownTag(name.to_string()))
    }

    fn resolve(&self, name: &str) -> Result<String, RenderError> {
        if name == "." {
            return self
                .item
                .map(str::to_string)
                .ok_or_else(|| malformed("{.} used outside a section"));
        }
        Ok(match self.value(name)? {
            TemplateValue::Text(text) => text.clone(),
            TemplateValue::List(items) => items.join(", "),
        })
    }

    /// One scope per repetition of a section body.
    fn iterations(&self, name: &str, inverted: bool) -> Result<Vec<Scope<'a>>, RenderError> {
        let value = self.value(name)?;
        if inverted {
            return Ok(if value.is_empty() { vec![*self] } else { Vec::new() });
        }
        let context = self.context;
        Ok(match value {
            TemplateValue::List(items) => items
                .iter()
                .map(|item| Scope {
                    context,
                    item: Some(item.as_str()),
                })
                .collect(),
            TemplateValue::Text(text) if !text.is_empty() => vec![Scope {
                context,
                item: Some(text.as_str()),
            }],
            TemplateValue::Text(_) => Vec::new(),
        })
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Paragraph-level sections
// ────────────────────────────────────────────────────────────────────────────

/// A paragraph whose whole text is a single section open/close tag.
fn section_marker(paragraph: &str) -> Result<Option<Tag>, RenderError> {
    let text = paragraph_text(paragraph)?;
    let Some(inner) = text
        .trim()
        .strip_prefix('{')
        .and_then(|t| t.strip_suffix('}'))
    else {
        return Ok(None);
    };
    if inner.contains(['{', '}']) {
        return Ok(None);
    }
    Ok(match parse_tag(inner) {
        Ok(tag @ (Tag::Open { .. } | Tag::Close(_))) => Some(tag),
        _ => None,
    })
}

fn closing_paragraph(
    xml: &str,
    paragraphs: &[Range<usize>],
    open_index: usize,
    name: &str,
) -> Result<usize, RenderError> {
    let mut depth = 0usize;
    for (index, span) in paragraphs.iter().enumerate().skip(open_index + 1) {
        match section_marker(&xml[span.clone()])? {
            Some(Tag::Open { name: inner, .. }) if inner == name => depth += 1,
            Some(Tag::Close(inner)) if inner == name => {
                if depth == 0 {
                    return Ok(index);
                }
                depth -= 1;
            }
            _ => {}
        }
    }
    Err(malformed(format!("{{#{name}}} is never closed")))
}

/// Expands paragraph loops, then renders the text runs in between.
fn render_block(xml: &str, scope: Scope<'_>) -> Result<String, RenderError> {
    let paragraphs = paragraph_spans(xml)?;
    let mut out = String::with_capacity(xml.len());
    let mut cursor = 0;
    let mut index = 0;

    while index < paragraphs.len() {
        let span = paragraphs[index].clone();
        match section_marker(&xml[span.clone()])? {
            Some(Tag::Open { name, inverted }) => {
                let close = closing_paragraph(xml, &paragraphs, index, &name)?;
                out.push_str(&render_runs(&xml[cursor..span.start], scope)?);
                let body = &xml[span.end..paragraphs[close].start];
                for item in scope.iterations(&name, inverted)? {
                    out.push_str(&render_block(body, item)?);
                }
                cursor = paragraphs[close].end;
                index = close + 1;
            }
            Some(Tag::Close(name)) => {
                return Err(malformed(format!(
                    "{{/{name}}} has no matching opening tag"
                )));
            }
            _ => index += 1,
        }
    }

    out.push_str(&render_runs(&xml[cursor..], scope)?);
    Ok(out)
}

// ────────────────────────────────────────────────────────────────────────────
// Inline rendering
// ────────────────────────────────────────────────────────────────────────────

fn render_runs(xml: &str, scope: Scope<'_>) -> Result<String, RenderError> {
    let mut out = String::with_capacity(xml.len());
    let mut cursor = 0;

    for node in text_nodes(xml)? {
        let content = &xml[node.content.clone()];
        if !content.contains('{') {
            continue;
        }
        out.push_str(&xml[cursor..node.element.start]);
        out.push_str(PRESERVED_TEXT_OPEN);
        out.push_str(&render_text(content, scope)?);
        out.push_str(TEXT_CLOSE);
        cursor = node.element.end;
    }

    out.push_str(&xml[cursor..]);
    Ok(out)
}

enum Token<'a> {
    Literal(&'a str),
    Tag(Tag),
}

fn tokenize(text: &str) -> Result<Vec<Token<'_>>, RenderError> {
    let mut tokens = Vec::new();
    let mut rest = text;

    while let Some(open) = rest.find('{') {
        if open > 0 {
            tokens.push(Token::Literal(&rest[..open]));
        }
        let after = &rest[open + 1..];
        let close = after
            .find('}')
            .ok_or_else(|| malformed(format!("unclosed tag in \"{text}\"")))?;
        tokens.push(Token::Tag(parse_tag(&after[..close])?));
        rest = &after[close + 1..];
    }
    if !rest.is_empty() {
        tokens.push(Token::Literal(rest));
    }

    Ok(tokens)
}

fn closing_token(tokens: &[Token<'_>], open_index: usize, name: &str) -> Result<usize, RenderError> {
    let mut depth = 0usize;
    for (index, token) in tokens.iter().enumerate().skip(open_index + 1) {
        match token {
            Token::Tag(Tag::Open { name: inner, .. }) if inner == name => depth += 1,
            Token::Tag(Tag::Close(inner)) if inner == name => {
                if depth == 0 {
                    return Ok(index);
                }
                depth -= 1;
            }
            _ => {}
        }
    }
    Err(malformed(format!("{{#{name}}} is never closed")))
}

fn render_text(text: &str, scope: Scope<'_>) -> Result<String, RenderError> {
    let tokens = tokenize(text)?;
    render_tokens(&tokens, scope)
}

fn render_tokens(tokens: &[Token<'_>], scope: Scope<'_>) -> Result<String, RenderError> {
    let mut out = String::new();
    let mut index = 0;

    while index < tokens.len() {
        match &tokens[index] {
            Token::Literal(text) => out.push_str(text),
            Token::Tag(Tag::Value(name)) => out.push_str(&encode_value(&scope.resolve(name)?)),
            Token::Tag(Tag::Open { name, inverted }) => {
                let close = closing_token(tokens, index, name)?;
                for item in scope.iterations(name, *inverted)? {
                    out.push_str(&render_tokens(&tokens[index + 1..close], item)?);
                }
                index = close;
            }
            Token::Tag(Tag::Close(name)) => {
                return Err(malformed(format!(
                    "{{/{name}}} has no matching opening tag"
                )));
            }
        }
        index += 1;
    }

    Ok(out)
}

/// XML-escapes a value and turns its newlines into `<w:br/>` breaks.
fn encode_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            '\r' => {}
            _ => escaped.push(c),
        }
    }
    escaped.replace('\n', LINE_BREAK)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::test_support::{document, para};

    fn context() -> TemplateContext {
        let mut context = TemplateContext::new();
        context.insert_text("receiver_title", "HR Manager");
        context.insert_text("company_name", "A & B <Ltd>");
        context.insert_text("body_paragraph", "Line one\nLine two");
        context.insert_text("name", "Jane Doe");
        context.insert_text("signature", "");
        context.insert_list(
            "attachments_items",
            vec!["CV".to_string(), "Portfolio".to_string()],
        );
        context.insert_list("empty_items", vec![]);
        context
    }

    #[test]
    fn test_part_without_tags_is_untouched() {
        let xml = document(&[para("Dear Sir or Madam,")]);
        assert_eq!(render_part(&xml, &context()).unwrap(), xml);
    }

    #[test]
    fn test_substitutes_value() {
        let xml = document(&[para("Dear {receiver_title},")]);
        let out = render_part(&xml, &context()).unwrap();
        assert!(out.contains("<w:t xml:space=\"preserve\">Dear HR Manager,</w:t>"));
        assert!(!out.contains("{receiver_title}"));
    }

    #[test]
    fn test_escapes_values() {
        let xml = document(&[para("{company_name}")]);
        let out = render_part(&xml, &context()).unwrap();
        assert!(out.contains("A &amp; B &lt;Ltd&gt;"));
    }

    #[test]
    fn test_newlines_become_line_breaks() {
        let xml = document(&[para("{body_paragraph}")]);
        let out = render_part(&xml, &context()).unwrap();
        assert!(out.contains(
            "Line one</w:t><w:br/><w:t xml:space=\"preserve\">Line two"
        ));
    }

    #[test]
    fn test_paragraph_loop_repeats_body() {
        let xml = document(&[
            para("Attachments:"),
            para("{#attachments_items}"),
            para("- {.}"),
            para("{/attachments_items}"),
            para("Regards"),
        ]);
        let out = render_part(&xml, &context()).unwrap();

        assert_eq!(out.matches("<w:p>").count(), 4);
        assert!(out.contains(">- CV</w:t>"));
        assert!(out.contains(">- Portfolio</w:t>"));
        assert!(!out.contains("attachments_items"));
        let cv = out.find("- CV").unwrap();
        let portfolio = out.find("- Portfolio").unwrap();
        assert!(cv < portfolio);
    }

    #[test]
    fn test_paragraph_loop_over_empty_list_drops_body() {
        let xml = document(&[
            para("{#empty_items}"),
            para("{.}"),
            para("{/empty_items}"),
            para("After"),
        ]);
        let out = render_part(&xml, &context()).unwrap();
        assert_eq!(out.matches("<w:p>").count(), 1);
        assert!(out.contains("After"));
    }

    #[test]
    fn test_inline_sections() {
        let xml = document(&[para(
            "{#attachments_items}[{.}]{/attachments_items}{^empty_items}none{/empty_items}{#signature}x{/signature}",
        )]);
        let out = render_part(&xml, &context()).unwrap();
        assert!(out.contains(">[CV][Portfolio]none</w:t>"));
    }

    #[test]
    fn test_list_value_renders_joined() {
        let xml = document(&[para("{attachments_items}")]);
        let out = render_part(&xml, &context()).unwrap();
        assert!(out.contains(">CV, Portfolio</w:t>"));
    }

    #[test]
    fn test_tag_split_across_runs_is_joined() {
        let xml = document(&[
            "<w:p><w:r><w:t>Dear {receiver</w:t></w:r><w:r><w:rPr><w:b/></w:rPr><w:t>_title}</w:t></w:r><w:r><w:t>,</w:t></w:r></w:p>".to_string(),
        ]);
        let out = render_part(&xml, &context()).unwrap();
        assert!(out.contains(">Dear HR Manager</w:t>"));
        assert!(out.contains("<w:t>,</w:t>"));
        assert!(!out.contains("_title}"));
    }

    #[test]
    fn test_inline_section_across_runs_is_joined() {
        let xml = document(&[
            "<w:p><w:r><w:t>Attached: {#attachments_items}</w:t></w:r><w:r><w:rPr><w:b/></w:rPr><w:t>{.}; </w:t></w:r><w:r><w:t>{/attachments_items}</w:t></w:r><w:r><w:t> end</w:t></w:r></w:p>".to_string(),
        ]);
        let out = render_part(&xml, &context()).unwrap();
        assert!(out.contains(">Attached: CV; Portfolio; </w:t>"));
        assert!(out.contains("<w:t> end</w:t>"));
        assert!(!out.contains("attachments_items"));
    }

    #[test]
    fn test_paragraph_text_is_unchanged_by_joining() {
        let paragraph = "<w:p><w:r><w:t>{#a}x</w:t></w:r><w:r><w:t>y{/a}</w:t></w:r><w:r><w:t>z</w:t></w:r></w:p>";
        let joined = join_paragraph(paragraph).unwrap();
        assert_eq!(
            paragraph_text(&joined).unwrap(),
            paragraph_text(paragraph).unwrap()
        );
        assert!(joined.contains("<w:t>{#a}xy{/a}</w:t>"));
        assert!(joined.contains("<w:t>z</w:t>"));
    }

    #[test]
    fn test_split_section_marker_is_recognized() {
        let xml = document(&[
            "<w:p><w:r><w:t>{#attach</w:t></w:r><w:r><w:t>ments_items}</w:t></w:r></w:p>".to_string(),
            para("{.}"),
            para("{/attachments_items}"),
        ]);
        let out = render_part(&xml, &context()).unwrap();
        assert_eq!(out.matches("<w:p>").count(), 2);
    }

    #[test]
    fn test_similar_element_names_are_not_confused() {
        let xml = document(&[
            "<w:p><w:pPr><w:pStyle w:val=\"Body\"/></w:pPr><w:r><w:tab/><w:t>{name}</w:t></w:r></w:p>"
                .to_string(),
        ]);
        let out = render_part(&xml, &context()).unwrap();
        assert!(out.contains("<w:pStyle w:val=\"Body\"/>"));
        assert!(out.contains("<w:tab/><w:t xml:space=\"preserve\">Jane Doe</w:t>"));
    }

    #[test]
    fn test_unknown_tag_fails() {
        let xml = document(&[para("{salary}")]);
        match render_part(&xml, &context()) {
            Err(RenderError::UnknownTag(name)) => assert_eq!(name, "salary"),
            other => panic!("expected unknown tag, got {other:?}"),
        }
    }

    #[test]
    fn test_unclosed_tag_fails() {
        let xml = document(&[para("Dear {receiver_title")]);
        assert!(matches!(
            render_part(&xml, &context()),
            Err(RenderError::Malformed(_))
        ));
    }

    #[test]
    fn test_unclosed_section_fails() {
        let xml = document(&[para("{#attachments_items}"), para("{.}")]);
        assert!(matches!(
            render_part(&xml, &context()),
            Err(RenderError::Malformed(_))
        ));
    }

    #[test]
    fn test_stray_closing_tag_fails() {
        let xml = document(&[para("{/attachments_items}")]);
        assert!(matches!(
            render_part(&xml, &context()),
            Err(RenderError::Malformed(_))
        ));
    }

    #[test]
    fn test_dot_outside_section_fails() {
        let xml = document(&[para("{.}")]);
        assert!(matches!(
            render_part(&xml, &context()),
            Err(RenderError::Malformed(_))
        ));
    }
}
