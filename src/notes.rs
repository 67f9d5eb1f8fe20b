//! Table of every event the converter placed, keyed by element id.

use std::collections::HashMap;

use crate::model::StemDirection;
use crate::system::System;

/// Where a tickable lives in the system/measure/voice tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoteLocation {
    pub system: usize,
    pub measure: usize,
    pub voice: usize,
    pub tickable: usize,
}

#[derive(Debug, Clone)]
pub struct NoteEntry {
    /// Tag of the element the id belongs to ("note", "chord", "rest", ...)
    pub tag: String,
    pub location: NoteLocation,
    /// Key index when the id names one note of a chord
    pub chord_index: Option<usize>,
}

/// Resolved position of an event after formatting.
#[derive(Debug, Clone, PartialEq)]
pub struct NoteAnchor {
    pub system: usize,
    pub measure: usize,
    pub x: f64,
    /// Highest and lowest notehead (equal for single notes)
    pub top_y: f64,
    pub bottom_y: f64,
    pub stem: StemDirection,
    pub staff_n: u32,
    pub stave_top: f64,
    pub stave_bottom: f64,
}

#[derive(Debug, Default)]
pub struct NotesById {
    entries: HashMap<String, NoteEntry>,
}

impl NotesById {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an event. Ids are write-once; a duplicate keeps the first
    /// entry and returns false.
    pub fn insert(&mut self, id: String, entry: NoteEntry) -> bool {
        if self.entries.contains_key(&id) {
            log::warn!("duplicate event id '{id}', keeping the first occurrence");
            return false;
        }
        self.entries.insert(id, entry);
        true
    }

    pub fn get(&self, id: &str) -> Option<&NoteEntry> {
        self.entries.get(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look an id up in the formatted systems.
    pub fn anchor(&self, id: &str, systems: &[System]) -> Option<NoteAnchor> {
        let entry = self.entries.get(id)?;
        let loc = entry.location;
        let measure = systems.get(loc.system)?.measures.get(loc.measure)?;
        let tickable = measure
            .voices
            .voices
            .get(loc.voice)?
            .tickables
            .get(loc.tickable)?;
        let stave = measure.stave(tickable.staff_n)?;

        let (top_y, bottom_y) = match entry.chord_index.and_then(|i| tickable.ys.get(i)) {
            Some(&y) => (y, y),
            None => (
                tickable.extreme_y(StemDirection::Up),
                tickable.extreme_y(StemDirection::Down),
            ),
        };
        let (top_y, bottom_y) = if tickable.ys.is_empty() {
            (stave.y, stave.bottom_y())
        } else {
            (top_y, bottom_y)
        };

        Some(NoteAnchor {
            system: loc.system,
            measure: loc.measure,
            x: tickable.x,
            top_y,
            bottom_y,
            stem: tickable.stem,
            staff_n: tickable.staff_n,
            stave_top: stave.y,
            stave_bottom: stave.bottom_y(),
        })
    }
}
