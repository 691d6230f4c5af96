//! Minimal reStructuredText-flavoured front end: finds registered directives,
//! builds a [`Document`] around them and renders the tree back to text.
//! Everything that is not a registered directive passes through verbatim,
//! and literal blocks are never searched for directives at all.
use crate::tree::{ConditionMarker, Document, Location, NodeId, NodeKind};
use itertools::Itertools;
use std::borrow::Cow;
use std::collections::BTreeSet;
use tracing::warn;

const TAB_WIDTH: usize = 8;

/// Directives whose content is code or preformatted text, not markup.
const LITERAL_DIRECTIVES: &[&str] = &[
    "code",
    "code-block",
    "sourcecode",
    "literalinclude",
    "parsed-literal",
];

/// Directive names the parser turns into condition markers.
#[derive(Debug, Clone, Default)]
pub struct MarkupSyntax {
    directives: BTreeSet<String>,
}

impl MarkupSyntax {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_directive(&mut self, name: impl Into<String>) {
        self.directives.insert(name.into());
    }

    pub fn is_directive(&self, name: &str) -> bool {
        self.directives.contains(name)
    }

    /// Match `.. name:: argument` against the registered names.
    fn match_directive<'l>(&self, line: &'l str) -> Option<(&'l str, &'l str)> {
        let (name, argument) = split_directive(line)?;
        if !self.is_directive(name) {
            return None;
        }
        Some((name, argument.trim()))
    }
}

/// Split any `.. name:: argument` line into name and raw argument.
fn split_directive(line: &str) -> Option<(&str, &str)> {
    let rest = line.trim_start().strip_prefix("..")?;
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }
    let (name, argument) = rest.trim_start().split_once("::")?;
    if name.is_empty() || name.contains(char::is_whitespace) {
        return None;
    }
    if !(argument.is_empty() || argument.starts_with(char::is_whitespace)) {
        return None;
    }
    Some((name, argument))
}

/// True when the lines indented below `line` form a literal block: a
/// paragraph ending in `::` or a code directive.
fn opens_literal_block(line: &str) -> bool {
    match split_directive(line) {
        Some((name, _)) => LITERAL_DIRECTIVES.contains(&name),
        None => {
            let text = line.trim();
            !text.starts_with("..") && text.ends_with("::")
        }
    }
}

/// Expand tabs in the indentation to 8-column stops.
fn expand_indent(line: &str) -> Cow<'_, str> {
    let body = line.trim_start_matches(|c: char| c == ' ' || c == '\t');
    let lead = &line[..line.len() - body.len()];
    if !lead.contains('\t') {
        return Cow::Borrowed(line);
    }
    let columns = lead.chars().fold(0, |col, c| match c {
        '\t' => (col / TAB_WIDTH + 1) * TAB_WIDTH,
        _ => col + 1,
    });
    Cow::Owned(format!("{}{body}", " ".repeat(columns)))
}

fn indent_of(line: &str) -> usize {
    line.len() - line.trim_start_matches(' ').len()
}

fn is_blank(line: &str) -> bool {
    line.trim().is_empty()
}

struct Open {
    id: NodeId,
    indent: usize,
    /// Still reading argument continuation lines.
    in_arguments: bool,
    has_body: bool,
}

/// Parse `source` into a tree. `file` is recorded in marker locations.
pub fn parse(syntax: &MarkupSyntax, file: &str, source: &str) -> Document {
    let mut doc = Document::new(file);
    let mut open: Vec<Open> = Vec::new();
    let mut blanks = 0usize;
    // column of the line that introduced the current literal block
    let mut literal: Option<usize> = None;

    for (n, raw) in source.lines().enumerate() {
        if is_blank(raw) {
            if let Some(top) = open.last_mut() {
                top.in_arguments = false;
            }
            blanks += 1;
            continue;
        }
        let line = expand_indent(raw);
        let indent = indent_of(&line);
        while open.last().map(|o| indent <= o.indent).unwrap_or(false) {
            open.pop();
        }
        let parent = open.last().map(|o| o.id).unwrap_or_else(|| doc.root());

        if let Some(column) = literal {
            if indent > column {
                for _ in 0..blanks {
                    doc.append(parent, NodeKind::Literal(String::new()));
                }
                blanks = 0;
                doc.append(parent, NodeKind::Literal(line.to_string()));
                continue;
            }
            literal = None;
        }

        if let Some(top) = open.last_mut() {
            if top.in_arguments && !top.has_body {
                if let NodeKind::Marker(m) = doc.kind_mut(top.id) {
                    if m.expression.is_empty() {
                        m.expression.push_str(line.trim());
                    } else {
                        // keep the line's position relative to the directive
                        m.expression.push('\n');
                        m.expression.push_str(line[top.indent..].trim_end());
                    }
                }
                continue;
            }
        }

        // leading blank lines of a body are dropped
        let keep_blanks = open.last().map(|o| o.has_body).unwrap_or(true);
        if keep_blanks {
            for _ in 0..blanks {
                doc.append(parent, NodeKind::Text(String::new()));
            }
        }
        blanks = 0;

        if let Some(top) = open.last_mut() {
            if !top.has_body {
                top.has_body = true;
                if let NodeKind::Marker(m) = doc.kind_mut(top.id) {
                    m.body_indent = indent;
                }
            }
        }

        match syntax.match_directive(&line) {
            Some((name, argument)) => {
                let id = doc.append(
                    parent,
                    NodeKind::Marker(ConditionMarker {
                        directive: name.to_string(),
                        expression: argument.to_string(),
                        location: Location {
                            file: file.to_string(),
                            line: n + 1,
                        },
                        indent,
                        body_indent: indent,
                    }),
                );
                open.push(Open {
                    id,
                    indent,
                    in_arguments: true,
                    has_body: false,
                });
            }
            None => {
                if opens_literal_block(&line) {
                    literal = Some(indent);
                }
                doc.append(parent, NodeKind::Text(line.to_string()));
            }
        }
    }
    for _ in 0..blanks {
        doc.append(doc.root(), NodeKind::Text(String::new()));
    }

    reject_missing_arguments(&mut doc);
    doc
}

/// A directive without its required argument becomes an inline problem,
/// content and all.
fn reject_missing_arguments(doc: &mut Document) {
    for id in doc.markers() {
        let Some(marker) = doc.marker(id) else {
            continue;
        };
        if !marker.expression.trim().is_empty() {
            continue;
        }
        let message = format!(
            "Error in \"{}\" directive:\n1 argument(s) required, 0 supplied.",
            marker.directive
        );
        let location = marker.location.clone();
        let indent = marker.indent;
        warn!(location = %location, "{}", message.replace('\n', " "));
        let problem = doc.alloc(NodeKind::Problem {
            message,
            location: Some(location),
            indent,
        });
        doc.replace(id, vec![problem]);
    }
}

const BODY_INDENT: &str = "   ";

/// Rendered lines; verbatim ones are exempt from blank-line collapsing.
#[derive(Default)]
struct Lines(Vec<(String, bool)>);

impl Lines {
    fn push(&mut self, line: String) {
        self.0.push((line, false));
    }

    fn blank(&mut self) {
        self.push(String::new());
    }

    fn verbatim(&mut self, line: String) {
        self.0.push((line, true));
    }
}

/// Render the tree back to markup. Outside literal blocks runs of blank
/// lines collapse to one; the output ends with a single newline.
pub fn render(doc: &Document) -> String {
    let mut lines = Lines::default();
    for child in doc.children(doc.root()) {
        render_node(doc, *child, &mut lines);
    }
    let mut out: Vec<&str> = Vec::with_capacity(lines.0.len());
    for (line, verbatim) in &lines.0 {
        let blank = is_blank(line);
        if blank && !verbatim && out.last().map(|l| l.is_empty()).unwrap_or(true) {
            continue;
        }
        out.push(if blank { "" } else { line.as_str() });
    }
    while out.last().map(|l| l.is_empty()).unwrap_or(false) {
        out.pop();
    }
    if out.is_empty() {
        return String::new();
    }
    format!("{}\n", out.iter().join("\n"))
}

/// Escape text for use inside an interpreted-text role.
fn escape_role_text(text: &str) -> String {
    text.replace('\\', "\\\\").replace('`', "\\`")
}

fn render_node(doc: &Document, id: NodeId, lines: &mut Lines) {
    match doc.kind(id) {
        NodeKind::Root => {}
        NodeKind::Text(line) => lines.push(line.clone()),
        NodeKind::Literal(line) => lines.verbatim(line.clone()),
        NodeKind::Marker(m) => {
            let pad = " ".repeat(m.indent);
            let mut expr = m.expression.lines();
            lines.push(format!(
                "{pad}.. {}:: {}",
                m.directive,
                expr.next().unwrap_or_default()
            ));
            for cont in expr {
                lines.push(format!("{pad}{cont}"));
            }
            lines.blank();
            for child in doc.children(id) {
                render_node(doc, *child, lines);
            }
            lines.blank();
        }
        NodeKind::Annotation { expression, indent } => {
            // one paragraph, every line at the block's own column
            let pad = " ".repeat(*indent);
            let role = format!(":sub:`{}`", escape_role_text(expression));
            lines.blank();
            for line in role.lines() {
                lines.push(format!("{pad}{}", line.trim_start()));
            }
            lines.blank();
        }
        NodeKind::Problem {
            message,
            location,
            indent,
        } => {
            let pad = " ".repeat(*indent);
            lines.blank();
            lines.push(format!("{pad}.. error::"));
            lines.blank();
            let mut message_lines = message.lines();
            let first = message_lines.next().unwrap_or_default();
            match location {
                Some(loc) => lines.push(format!("{pad}{BODY_INDENT}{loc}: {first}")),
                None => lines.push(format!("{pad}{BODY_INDENT}{first}")),
            }
            for rest in message_lines {
                lines.push(format!("{pad}{BODY_INDENT}{rest}"));
            }
            lines.blank();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn syntax() -> MarkupSyntax {
        let mut s = MarkupSyntax::new();
        s.add_directive("custver");
        s
    }

    fn only_marker(doc: &Document) -> &ConditionMarker {
        let markers = doc.markers();
        assert_eq!(markers.len(), 1);
        doc.marker(markers[0]).unwrap()
    }

    #[test]
    fn parses_directive_with_body() {
        let src = "Intro.\n\n.. custver:: client in ('A', 'B')\n\n   Only A and B.\n\n   More.\n\nOutro.\n";
        let doc = parse(&syntax(), "index.rst", src);
        let m = only_marker(&doc);
        assert_eq!(m.expression, "client in ('A', 'B')");
        assert_eq!(m.location.to_string(), "index.rst:3");
        assert_eq!(m.body_indent, 3);

        let id = doc.markers()[0];
        let body: Vec<_> = doc
            .children(id)
            .iter()
            .map(|c| doc.kind(*c).clone())
            .collect();
        assert_eq!(
            body,
            vec![
                NodeKind::Text("   Only A and B.".into()),
                NodeKind::Text(String::new()),
                NodeKind::Text("   More.".into()),
            ]
        );
        // unresolved tree renders back to equivalent source
        assert_eq!(render(&doc), src);
    }

    #[test]
    fn argument_continues_on_indented_lines() {
        let src = ".. custver:: client in ('A',\n             'B')\n\n   Body.\n";
        let doc = parse(&syntax(), "a.rst", src);
        assert_eq!(
            only_marker(&doc).expression,
            "client in ('A',\n             'B')"
        );
        assert_eq!(render(&doc), src);
    }

    #[test]
    fn unregistered_directives_pass_through() {
        let src = ".. note::\n\n   .. custver:: builder == 'html'\n\n      HTML only.\n\n   Always.\n";
        let doc = parse(&syntax(), "a.rst", src);
        let m = only_marker(&doc);
        assert_eq!((m.indent, m.body_indent), (3, 6));
        assert_eq!(doc.children(doc.root()).len(), 5);
    }

    #[test]
    fn nested_markers() {
        let src = ".. custver:: a\n\n   outer\n\n   .. custver:: b\n\n      inner\n";
        let doc = parse(&syntax(), "a.rst", src);
        let markers = doc.markers();
        assert_eq!(markers.len(), 2);
        assert_eq!(doc.parent(markers[1]), Some(markers[0]));
        assert_eq!(doc.marker(markers[1]).unwrap().location.line, 5);
    }

    #[test]
    fn missing_argument_becomes_problem() {
        let src = "a\n\n.. custver::\n\n   hidden\n\nb\n";
        let doc = parse(&syntax(), "x.rst", src);
        assert!(doc.markers().is_empty());
        assert_eq!(
            render(&doc),
            "a\n\n.. error::\n\n   x.rst:3: Error in \"custver\" directive:\n   1 argument(s) required, 0 supplied.\n\nb\n"
        );
    }

    #[test]
    fn directive_lookalikes_are_text() {
        let s = syntax();
        assert!(s.match_directive(".. custver:: x").is_some());
        assert!(s.match_directive("..custver:: x").is_none());
        assert!(s.match_directive(".. custver::x").is_none());
        assert!(s.match_directive(".. other:: x").is_none());
    }

    #[test]
    fn tabs_expand_to_eight_columns() {
        assert_eq!(expand_indent("\tx"), "        x");
        assert_eq!(expand_indent("  \t x\ty"), "         x\ty");
        assert!(matches!(expand_indent("   x"), Cow::Borrowed(_)));
    }

    #[test]
    fn literal_block_openers() {
        assert!(opens_literal_block("Usage::"));
        assert!(opens_literal_block("   For example ::"));
        assert!(opens_literal_block(".. code-block:: rst"));
        assert!(opens_literal_block(".. parsed-literal::"));
        assert!(!opens_literal_block(".. note::"));
        assert!(!opens_literal_block(".. custver:: a::b"));
        assert!(!opens_literal_block("plain text"));
    }

    #[test]
    fn literal_blocks_are_opaque() {
        let src = "Example::\n\n   .. custver:: x\n\n      y\n\n\n   z\n\n.. custver:: a\n\n   b\n";
        let doc = parse(&syntax(), "l.rst", src);
        assert_eq!(doc.markers().len(), 1);
        assert_eq!(only_marker(&doc).location.line, 10);
        assert_eq!(render(&doc), src);
    }
}
