//! Arena-backed HTML document used as both compiler input and safe output.
//!
//! Nodes live in an [`ego_tree::Tree`] and are addressed by [`NodeId`], so
//! side tables (extracted content, inspection results) can key on node
//! identity rather than on node values.

use ego_tree::{NodeMut, NodeRef, Tree};
use scraper::{Html, node::Node};

pub use ego_tree::NodeId;

use crate::schema::contains_only_text;

/// HTML5 void elements that must not have a closing tag.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

/// Elements whose text content is serialized without entity escaping.
const RAW_TEXT_ELEMENTS: &[&str] = &[
    "iframe", "noembed", "noframes", "plaintext", "script", "style", "xmp",
];

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub value: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ElementData {
    /// Lower-case local name.
    pub name: String,
    pub attrs: Vec<Attribute>,
}

impl ElementData {
    /// Create an element with no attributes.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into().to_ascii_lowercase(),
            attrs: Vec::new(),
        }
    }

    /// Value of the attribute `name`.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.value.as_str())
    }

    /// Set `name` to `value`, replacing any existing value.
    pub fn set_attr(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self.attrs.iter_mut().find(|a| a.name == name) {
            Some(a) => a.value = value,
            None => self.attrs.push(Attribute {
                name: name.to_string(),
                value,
            }),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NodeData {
    Fragment,
    Element(ElementData),
    Text(String),
    Comment(String),
}

/// Identifies one attribute of one element, independent of its value.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct AttrKey {
    pub element: NodeId,
    pub name: String,
}

impl AttrKey {
    /// Key for the attribute `name` of `element`.
    pub fn new(element: NodeId, name: impl Into<String>) -> Self {
        Self {
            element,
            name: name.into(),
        }
    }
}

/// An HTML document fragment.
#[derive(Clone, Debug)]
pub struct Document {
    tree: Tree<NodeData>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// An empty fragment.
    pub fn new() -> Self {
        Self {
            tree: Tree::new(NodeData::Fragment),
        }
    }

    /// Parse `html` as the content of a `<body>` element.
    ///
    /// Parsing is delegated to `scraper`; comments, elements, text and
    /// attributes are copied into a fresh arena. Attributes are stored in
    /// name order.
    pub fn parse_fragment(html: &str) -> Self {
        let parsed = Html::parse_fragment(html);
        let mut doc = Self::new();
        let root = doc.root_id();
        for child in parsed.tree.root().children() {
            match child.value() {
                // html5ever wraps fragment content in a synthetic <html>
                Node::Element(el) if el.name() == "html" => {
                    for grandchild in child.children() {
                        doc.copy_from(grandchild, root);
                    }
                }
                _ => doc.copy_from(child, root),
            }
        }
        doc
    }

    fn copy_from(&mut self, src: NodeRef<'_, Node>, parent: NodeId) {
        let data = match src.value() {
            Node::Element(el) => {
                let mut data = ElementData::new(el.name());
                for (name, value) in el.attrs() {
                    data.set_attr(&name.to_ascii_lowercase(), value);
                }
                data.attrs.sort_by(|a, b| a.name.cmp(&b.name));
                NodeData::Element(data)
            }
            Node::Text(text) => {
                let text: &str = text;
                NodeData::Text(text.to_string())
            }
            Node::Comment(comment) => {
                let comment: &str = comment;
                NodeData::Comment(comment.to_string())
            }
            _ => return,
        };
        let id = self.append(parent, data);
        for child in src.children() {
            self.copy_from(child, id);
        }
    }

    pub fn root(&self) -> NodeRef<'_, NodeData> {
        self.tree.root()
    }

    /// Id of the fragment root.
    pub fn root_id(&self) -> NodeId {
        self.tree.root().id()
    }

    /// The node `id`, or `None` if it belongs to another document.
    pub fn get(&self, id: NodeId) -> Option<NodeRef<'_, NodeData>> {
        self.tree.get(id)
    }

    /// The node with `id`. Panics if `id` belongs to another document.
    pub fn node(&self, id: NodeId) -> NodeRef<'_, NodeData> {
        self.tree
            .get(id)
            .unwrap_or_else(|| panic!("node {id:?} is not in this document"))
    }

    fn node_mut(&mut self, id: NodeId) -> NodeMut<'_, NodeData> {
        self.tree
            .get_mut(id)
            .unwrap_or_else(|| panic!("node {id:?} is not in this document"))
    }

    /// The element data of `id`, or `None` for other kinds of node.
    pub fn element(&self, id: NodeId) -> Option<&ElementData> {
        match self.tree.get(id)?.value() {
            NodeData::Element(el) => Some(el),
            _ => None,
        }
    }

    /// Set an attribute on the element `id`, replacing any existing value.
    pub fn set_attr(&mut self, id: NodeId, name: &str, value: impl Into<String>) {
        let mut node = self.node_mut(id);
        match node.value() {
            NodeData::Element(el) => el.set_attr(name, value),
            other => panic!("cannot set attribute {name} on {other:?}"),
        }
    }

    /// Append `data` as the last child of `parent`.
    pub fn append(&mut self, parent: NodeId, data: NodeData) -> NodeId {
        self.node_mut(parent).append(data).id()
    }

    /// Insert `data` as the previous sibling of `sibling`.
    pub fn insert_before(&mut self, sibling: NodeId, data: NodeData) -> NodeId {
        self.node_mut(sibling).insert_before(data).id()
    }

    /// Insert `data` as the next sibling of `sibling`.
    pub fn insert_after(&mut self, sibling: NodeId, data: NodeData) -> NodeId {
        self.node_mut(sibling).insert_after(data).id()
    }

    /// Ids of all elements named `name`, in document order.
    pub fn elements_named(&self, name: &str) -> Vec<NodeId> {
        self.tree
            .root()
            .descendants()
            .filter(|n| matches!(n.value(), NodeData::Element(el) if el.name == name))
            .map(|n| n.id())
            .collect()
    }

    /// Serialize the document to HTML text.
    pub fn to_html(&self) -> String {
        let mut out = String::new();
        serialize_node(self.tree.root(), false, &mut out);
        out
    }
}

fn serialize_node(node: NodeRef<'_, NodeData>, raw_text: bool, out: &mut String) {
    match node.value() {
        NodeData::Fragment => {
            for child in node.children() {
                serialize_node(child, false, out);
            }
        }
        NodeData::Element(el) => {
            let tag = el.name.as_str();
            out.push('<');
            out.push_str(tag);
            for attr in &el.attrs {
                out.push(' ');
                out.push_str(&attr.name);
                out.push_str("=\"");
                escape_into(&attr.value, true, out);
                out.push('"');
            }
            out.push('>');

            if VOID_ELEMENTS.contains(&tag) {
                return;
            }

            let raw = RAW_TEXT_ELEMENTS.contains(&tag);
            for child in node.children() {
                serialize_node(child, raw, out);
            }

            out.push_str("</");
            out.push_str(tag);
            out.push('>');
        }
        NodeData::Text(text) if raw_text => out.push_str(text),
        NodeData::Text(text) => escape_into(text, false, out),
        NodeData::Comment(comment) => {
            out.push_str("<!--");
            out.push_str(comment);
            out.push_str("-->");
        }
    }
}

fn escape_into(s: &str, attribute: bool, out: &mut String) {
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if attribute => out.push_str("&quot;"),
            c => out.push(c),
        }
    }
}

/// True if `id` is an element whose content model admits only text.
pub(crate) fn is_text_only_element(doc: &Document, id: NodeId) -> bool {
    doc.element(id).is_some_and(|el| contains_only_text(&el.name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_fragment_unwraps_synthetic_html() {
        let doc = Document::parse_fragment(r#"<p class="a">Hello <b>world</b></p>"#);
        let top: Vec<_> = doc.root().children().collect();
        assert_eq!(top.len(), 1);
        let p = doc.element(top[0].id()).unwrap();
        assert_eq!(p.name, "p");
        assert_eq!(p.attr("class"), Some("a"));
        assert_eq!(doc.to_html(), r#"<p class="a">Hello <b>world</b></p>"#);
    }

    #[test]
    fn serialization_escapes_text_and_attributes() {
        let mut doc = Document::new();
        let root = doc.root_id();
        let mut el = ElementData::new("span");
        el.set_attr("title", r#"a "quoted" & <tag>"#);
        let span = doc.append(root, NodeData::Element(el));
        doc.append(span, NodeData::Text("1 < 2 & 3".into()));
        assert_eq!(
            doc.to_html(),
            r#"<span title="a &quot;quoted&quot; &amp; &lt;tag&gt;">1 &lt; 2 &amp; 3</span>"#
        );
    }

    #[test]
    fn void_and_raw_text_elements() {
        let doc = Document::parse_fragment("<br><xmp>a < b</xmp><img src=x.png>");
        assert_eq!(doc.to_html(), r#"<br><xmp>a < b</xmp><img src="x.png">"#);
    }

    #[test]
    fn insert_before_and_lookup() {
        let mut doc = Document::parse_fragment("<i>a</i><u>b</u>");
        let u = doc.elements_named("u")[0];
        doc.insert_before(u, NodeData::Element(ElementData::new("br")));
        doc.set_attr(u, "id", "x");
        assert_eq!(doc.to_html(), r#"<i>a</i><br><u id="x">b</u>"#);
    }

    #[test]
    fn text_only_elements_are_detected() {
        let doc = Document::parse_fragment("<textarea>x</textarea><p>y</p>");
        assert!(is_text_only_element(&doc, doc.elements_named("textarea")[0]));
        assert!(!is_text_only_element(&doc, doc.elements_named("p")[0]));
        assert!(!is_text_only_element(&doc, doc.root_id()));
    }

    #[test]
    fn set_attr_replaces_existing() {
        let mut el = ElementData::new("A");
        assert_eq!(el.name, "a");
        el.set_attr("href", "x");
        el.set_attr("href", "y");
        assert_eq!(el.attrs.len(), 1);
        assert_eq!(el.attr("href"), Some("y"));
    }
}
