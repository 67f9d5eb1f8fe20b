//! Thin layer over roxmltree: attribute maps, child lookup and a side-table
//! for element ids.
//!
//! The input tree is never modified. Elements without `xml:id` get a
//! generated id from [`IdTable`], a deterministic counter keyed by node.

use std::collections::{BTreeMap, HashMap};

use roxmltree::{Document, Node, NodeId};

use crate::error::{ConvertError, Result};

const XML_NS: &str = "http://www.w3.org/XML/1998/namespace";

/// Plain key/value view of an element's attributes. `xml:id` is keyed as
/// `"xml:id"`, everything else by local name.
pub type AttributeMap = BTreeMap<String, String>;

/// Parse MEI text into a roxmltree document.
pub fn parse_document(xml: &str) -> Result<Document<'_>> {
    // MEI files may carry a DOCTYPE, so DTDs must be allowed
    let options = roxmltree::ParsingOptions {
        allow_dtd: true,
        ..Default::default()
    };
    Document::parse_with_options(xml, options).map_err(|e| ConvertError::InvalidXml(e.to_string()))
}

/// Read an element's attributes into an [`AttributeMap`].
pub fn attributes(node: Node) -> AttributeMap {
    node.attributes()
        .map(|a| {
            let key = if a.namespace() == Some(XML_NS) {
                format!("xml:{}", a.name())
            } else {
                a.name().to_string()
            };
            (key, a.value().to_string())
        })
        .collect()
}

pub fn tag<'a>(node: Node<'a, '_>) -> &'a str {
    node.tag_name().name()
}

pub fn xml_id<'a>(node: Node<'a, '_>) -> Option<&'a str> {
    node.attribute((XML_NS, "id"))
}

/// Element children, in document order.
pub fn elements<'a, 'i>(node: Node<'a, 'i>) -> impl Iterator<Item = Node<'a, 'i>> {
    node.children().filter(|n| n.is_element())
}

pub fn children_named<'a, 'i>(
    node: Node<'a, 'i>,
    name: &'static str,
) -> impl Iterator<Item = Node<'a, 'i>> {
    elements(node).filter(move |n| tag(*n) == name)
}

pub fn attr_u32(node: Node, name: &str) -> Option<u32> {
    node.attribute(name).and_then(|v| v.trim().parse().ok())
}

pub fn attr_f64(node: Node, name: &str) -> Option<f64> {
    node.attribute(name).and_then(|v| v.trim().parse().ok())
}

/// Attribute that must be present.
pub fn required<'a>(node: Node<'a, '_>, name: &str) -> Result<&'a str> {
    node.attribute(name)
        .ok_or_else(|| ConvertError::missing(tag(node), name))
}

/// Numeric attribute that must be present and parse.
pub fn required_u32(node: Node, name: &str) -> Result<u32> {
    let raw = required(node, name)?;
    raw.trim()
        .parse()
        .map_err(|_| ConvertError::value("number", raw))
}

/// `@staff`/`@layer` style attribute defaulting to 1.
pub fn number_or_one(node: Node, name: &str) -> u32 {
    attr_u32(node, name).unwrap_or(1)
}

/// `#id` or `id` → `id`. MEI pointers usually carry the fragment marker.
pub fn strip_ref(reference: &str) -> &str {
    reference.trim().trim_start_matches('#')
}

/// All descendant text of an element with whitespace collapsed.
pub fn text_content(node: Node) -> String {
    let raw: String = node
        .descendants()
        .filter(|n| n.is_text())
        .filter_map(|n| n.text())
        .collect();
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Side-table assigning ids to elements that lack `xml:id`.
#[derive(Debug, Default)]
pub struct IdTable {
    generated: HashMap<NodeId, String>,
    counter: usize,
}

impl IdTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// The element's `xml:id`, or a stable generated id for it.
    pub fn id_of(&mut self, node: Node) -> String {
        if let Some(id) = xml_id(node) {
            return id.to_string();
        }
        let counter = &mut self.counter;
        self.generated
            .entry(node.id())
            .or_insert_with(|| {
                *counter += 1;
                format!("gen-{counter}")
            })
            .clone()
    }

    pub fn generated_count(&self) -> usize {
        self.counter
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attribute_map_keys_xml_id() {
        let doc = parse_document(
            r#"<note xmlns="http://www.music-encoding.org/ns/mei" xml:id="n1" pname="c" oct="4"/>"#,
        )
        .unwrap();
        let atts = attributes(doc.root_element());
        assert_eq!(atts.get("xml:id").map(String::as_str), Some("n1"));
        assert_eq!(atts.get("pname").map(String::as_str), Some("c"));
        assert_eq!(atts.len(), 3);
    }

    #[test]
    fn generated_ids_are_stable_and_leave_tree_untouched() {
        let doc = parse_document(r#"<layer><note/><note xml:id="x"/><note/></layer>"#).unwrap();
        let notes: Vec<_> = elements(doc.root_element()).collect();
        let mut ids = IdTable::new();
        assert_eq!(ids.id_of(notes[2]), "gen-1");
        assert_eq!(ids.id_of(notes[0]), "gen-2");
        assert_eq!(ids.id_of(notes[1]), "x");
        assert_eq!(ids.id_of(notes[2]), "gen-1");
        assert_eq!(ids.generated_count(), 2);
        assert!(xml_id(notes[0]).is_none());
    }

    #[test]
    fn text_content_collapses_rend_children() {
        let doc = parse_document("<dir>  allegro <rend>ma non\n troppo</rend></dir>").unwrap();
        assert_eq!(text_content(doc.root_element()), "allegro ma non troppo");
        assert_eq!(strip_ref("#n12"), "n12");
    }
}
