//! Linking elements: ties, slurs, hairpins and pointer-style text
//! (directives, dynamics, tempo).
//!
//! Links are gathered during the forward walk (see [`collection`]) with
//! endpoints expressed as [`EventReference`]s. Timestamps are turned into
//! ids as soon as their layer is available, either on the spot or through
//! the [`deferred`] registry when they point into a later measure. After the
//! walk, [`resolve`] turns every link into curve, hairpin or text output.

pub mod collection;
pub mod deferred;
pub mod resolve;
pub mod tstamp;

use roxmltree::Node;

use crate::error::{ConvertError, Result};
use crate::mei::{strip_ref, tag};
use crate::model::{HairpinForm, Place};

pub use collection::LinkCollection;
pub use deferred::{DeferredRegistry, PendingResolution};
pub use tstamp::Tstamp;

/// One end of a link.
#[derive(Debug, Clone, PartialEq)]
pub enum EventReference {
    /// Element id of the event
    Id(String),
    /// Beat position, possibly in a later measure
    Timestamp(Tstamp),
}

impl EventReference {
    /// Read an endpoint from an id attribute (`startid`/`endid`) or a
    /// timestamp attribute (`tstamp`/`tstamp2`). The id wins when both are
    /// present; the timestamp is then never looked at.
    pub fn from_node(node: Node, id_attr: &str, tstamp_attr: &str) -> Result<Option<Self>> {
        if let Some(id) = node.attribute(id_attr) {
            return Ok(Some(EventReference::Id(strip_ref(id).to_string())));
        }
        match node.attribute(tstamp_attr) {
            Some(ts) => Ok(Some(EventReference::Timestamp(Tstamp::parse(ts)?))),
            None => Ok(None),
        }
    }

    pub fn id(&self) -> Option<&str> {
        match self {
            EventReference::Id(id) => Some(id.as_str()),
            EventReference::Timestamp(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkKind {
    Tie,
    Slur,
    Hairpin,
    Directive,
    Dynamic,
    Tempo,
}

impl LinkKind {
    pub fn element_name(self) -> &'static str {
        match self {
            LinkKind::Tie => "tie",
            LinkKind::Slur => "slur",
            LinkKind::Hairpin => "hairpin",
            LinkKind::Directive => "dir",
            LinkKind::Dynamic => "dynam",
            LinkKind::Tempo => "tempo",
        }
    }

    /// Pointer kinds are single-ended and have no degraded rendering.
    pub fn is_pointer(self) -> bool {
        matches!(self, LinkKind::Directive | LinkKind::Dynamic | LinkKind::Tempo)
    }
}

/// Kind-specific data. For ties and slurs this also serves as the
/// condition a terminator has to match.
#[derive(Debug, Clone, PartialEq)]
pub enum LinkParams {
    /// `pitch` is (pname, oct) for ties started from a note's `@tie`
    Tie { pitch: Option<(String, i32)>, staff: u32 },
    /// `nesting` is the level digit of a note's `@slur` token
    Slur { nesting: Option<u32>, curvedir: Option<Place> },
    Hairpin { form: HairpinForm, place: Place },
    Pointer { text: String, place: Place },
}

impl LinkParams {
    /// Whether a terminator with this condition closes `open`.
    pub fn matches(&self, open: &LinkParams) -> bool {
        match (self, open) {
            (
                LinkParams::Tie { pitch: a, staff: sa },
                LinkParams::Tie { pitch: b, staff: sb },
            ) => a.is_some() && a == b && sa == sb,
            (LinkParams::Slur { nesting: a, .. }, LinkParams::Slur { nesting: b, .. }) => {
                a.is_some() && a == b
            }
            _ => false,
        }
    }

    /// `@form` of a hairpin, which is mandatory.
    pub fn hairpin_form(node: Node) -> Result<HairpinForm> {
        match node.attribute("form") {
            Some("cres") => Ok(HairpinForm::Crescendo),
            Some("dim") => Ok(HairpinForm::Diminuendo),
            Some(other) => Err(ConvertError::value("hairpin form", other)),
            None => Err(ConvertError::missing(tag(node), "form")),
        }
    }
}

/// A tie, slur, hairpin or pointer with its (possibly missing) endpoints.
#[derive(Debug, Clone, PartialEq)]
pub struct EventLink {
    /// Id of the linking element, `None` for links opened from note
    /// attributes
    pub element_id: Option<String>,
    pub first: Option<EventReference>,
    pub last: Option<EventReference>,
    pub params: LinkParams,
    pub staff_n: u32,
    pub layer_n: u32,
}

impl EventLink {
    pub fn new(params: LinkParams, staff_n: u32, layer_n: u32) -> Self {
        Self {
            element_id: None,
            first: None,
            last: None,
            params,
            staff_n,
            layer_n,
        }
    }

    pub fn with_first(mut self, first: EventReference) -> Self {
        self.first = Some(first);
        self
    }

    pub fn with_last(mut self, last: EventReference) -> Self {
        self.last = Some(last);
        self
    }

    pub fn with_element_id(mut self, id: String) -> Self {
        self.element_id = Some(id);
        self
    }

    pub fn is_open(&self) -> bool {
        self.last.is_none()
    }

    pub fn first_id(&self) -> Option<&str> {
        self.first.as_ref().and_then(EventReference::id)
    }

    pub fn last_id(&self) -> Option<&str> {
        self.last.as_ref().and_then(EventReference::id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mei::parse_document;

    #[test]
    fn startid_wins_over_tstamp() {
        let doc = parse_document(r##"<slur startid="#n1" tstamp="3" endid="n4"/>"##).unwrap();
        let node = doc.root_element();
        assert_eq!(
            EventReference::from_node(node, "startid", "tstamp").unwrap(),
            Some(EventReference::Id("n1".to_string()))
        );
        assert_eq!(
            EventReference::from_node(node, "endid", "tstamp2").unwrap(),
            Some(EventReference::Id("n4".to_string()))
        );
    }

    #[test]
    fn tie_condition_needs_pitch_and_staff() {
        let c4 = LinkParams::Tie {
            pitch: Some(("c".to_string(), 4)),
            staff: 1,
        };
        let c4_other_staff = LinkParams::Tie {
            pitch: Some(("c".to_string(), 4)),
            staff: 2,
        };
        let element_tie = LinkParams::Tie { pitch: None, staff: 1 };
        assert!(c4.matches(&c4.clone()));
        assert!(!c4.matches(&c4_other_staff));
        assert!(!element_tie.matches(&element_tie.clone()));
    }

    #[test]
    fn hairpin_without_form_is_fatal() {
        let doc = parse_document(r#"<hairpin tstamp="1" tstamp2="0m+4"/>"#).unwrap();
        let err = LinkParams::hairpin_form(doc.root_element()).unwrap_err();
        assert_eq!(err.to_string(), "<hairpin> is missing mandatory attribute @form");
    }
}
