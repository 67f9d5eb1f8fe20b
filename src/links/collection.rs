//! Accumulation of links of one kind during the forward walk.

use super::{EventLink, EventReference, LinkKind, LinkParams};

#[derive(Debug, Clone)]
pub struct LinkCollection {
    kind: LinkKind,
    links: Vec<EventLink>,
}

impl LinkCollection {
    pub fn new(kind: LinkKind) -> Self {
        Self {
            kind,
            links: Vec::new(),
        }
    }

    pub fn kind(&self) -> LinkKind {
        self.kind
    }

    /// Add a link that waits for a terminator. Returns its index.
    pub fn start_link(&mut self, link: EventLink) -> usize {
        self.add_link(link)
    }

    /// Close the most recent open link whose condition matches, setting its
    /// last reference. Without a match a link carrying only the last
    /// reference is created. Returns the index of the closed or new link.
    ///
    /// The open list is scanned linearly from the end; open links rarely
    /// number more than a handful, so each terminator costs O(open links).
    pub fn terminate_link(
        &mut self,
        condition: &LinkParams,
        last: EventReference,
        staff_n: u32,
        layer_n: u32,
    ) -> usize {
        let open = self
            .links
            .iter()
            .rposition(|l| l.is_open() && condition.matches(&l.params));
        match open {
            Some(idx) => {
                self.links[idx].last = Some(last);
                idx
            }
            None => {
                log::debug!(
                    "{} terminator without an open match, keeping end only",
                    self.kind.element_name()
                );
                self.add_link(EventLink::new(condition.clone(), staff_n, layer_n).with_last(last))
            }
        }
    }

    /// Add a link whose endpoints are already known (from an element).
    pub fn add_link(&mut self, link: EventLink) -> usize {
        self.links.push(link);
        self.links.len() - 1
    }

    pub fn link_mut(&mut self, idx: usize) -> Option<&mut EventLink> {
        self.links.get_mut(idx)
    }

    pub fn links(&self) -> &[EventLink] {
        &self.links
    }

    pub fn open_links(&self) -> impl Iterator<Item = &EventLink> {
        self.links.iter().filter(|l| l.is_open())
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tie(pname: &str, oct: i32) -> LinkParams {
        LinkParams::Tie {
            pitch: Some((pname.to_string(), oct)),
            staff: 1,
        }
    }

    fn id(s: &str) -> EventReference {
        EventReference::Id(s.to_string())
    }

    #[test]
    fn terminator_closes_matching_pitch_not_most_recent() {
        let mut ties = LinkCollection::new(LinkKind::Tie);
        ties.start_link(EventLink::new(tie("c", 4), 1, 1).with_first(id("c4")));
        ties.start_link(EventLink::new(tie("e", 4), 1, 1).with_first(id("e4")));

        let closed = ties.terminate_link(&tie("e", 4), id("e4b"), 1, 1);
        assert_eq!(closed, 1);
        assert_eq!(ties.links()[1].last_id(), Some("e4b"));

        let open: Vec<_> = ties.open_links().map(|l| l.first_id()).collect();
        assert_eq!(open, vec![Some("c4")]);
    }

    #[test]
    fn reverse_order_picks_latest_equal_condition() {
        let mut slurs = LinkCollection::new(LinkKind::Slur);
        let level1 = LinkParams::Slur {
            nesting: Some(1),
            curvedir: None,
        };
        slurs.start_link(EventLink::new(level1.clone(), 1, 1).with_first(id("a")));
        slurs.start_link(EventLink::new(level1.clone(), 1, 1).with_first(id("b")));
        assert_eq!(slurs.terminate_link(&level1, id("c"), 1, 1), 1);
        assert_eq!(slurs.terminate_link(&level1, id("d"), 1, 1), 0);
    }

    #[test]
    fn unmatched_terminator_creates_end_only_link() {
        let mut ties = LinkCollection::new(LinkKind::Tie);
        let idx = ties.terminate_link(&tie("g", 3), id("g3"), 1, 1);
        let link = &ties.links()[idx];
        assert!(link.first.is_none());
        assert_eq!(link.last_id(), Some("g3"));
        assert_eq!(ties.open_links().count(), 0);
    }
}
