//! Links whose end timestamp points into a later measure.
//!
//! They wait here, keyed by the `(measure, staff, layer)` the walk has to
//! reach before the timestamp can be turned into an id.

use std::collections::HashMap;

use super::LinkKind;

/// `(target measure, staff, layer)`
pub type DeferredKey = (u32, u32, u32);

/// A link end waiting for its layer.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingResolution {
    pub kind: LinkKind,
    /// Index of the link in its collection
    pub link: usize,
    /// Beat within the target measure
    pub beat: f64,
}

#[derive(Debug, Default)]
pub struct DeferredRegistry {
    pending: HashMap<DeferredKey, Vec<PendingResolution>>,
}

impl DeferredRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a link end under its target key. A link is pending at most once.
    pub fn register_pending(&mut self, key: DeferredKey, pending: PendingResolution) {
        for list in self.pending.values_mut() {
            list.retain(|p| !(p.kind == pending.kind && p.link == pending.link));
        }
        log::debug!(
            "deferring {} end to {}:{}:{}",
            pending.kind.element_name(),
            key.0,
            key.1,
            key.2
        );
        self.pending.entry(key).or_default().push(pending);
    }

    /// Take everything queued for a key. The key stays with an empty list.
    pub fn drain(&mut self, key: DeferredKey) -> Vec<PendingResolution> {
        self.pending
            .get_mut(&key)
            .map(std::mem::take)
            .unwrap_or_default()
    }

    pub fn pending_at(&self, key: DeferredKey) -> &[PendingResolution] {
        self.pending.get(&key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Entries never drained, sorted by key.
    pub fn remaining(&self) -> Vec<(DeferredKey, &PendingResolution)> {
        let mut left: Vec<_> = self
            .pending
            .iter()
            .flat_map(|(key, list)| list.iter().map(move |p| (*key, p)))
            .collect();
        left.sort_by_key(|(key, p)| (*key, p.link));
        left
    }
}
