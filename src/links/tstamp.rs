//! Timestamps and nearest-event lookup.
//!
//! MEI timestamps count beats from 1 in units of the meter's `unit`.
//! `tstamp2` may prefix a measure offset: `"2m+3.5"` is beat 3.5 two
//! measures later.

use roxmltree::Node;

use crate::error::{ConvertError, Result};
use crate::mei::{attr_u32, children_named, elements, tag, IdTable};
use crate::staff_info::Meter;
use crate::tables::{dots_factor, DurationCode};

const EPSILON: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tstamp {
    pub measures_ahead: u32,
    pub beat: f64,
}

impl Tstamp {
    pub fn parse(value: &str) -> Result<Self> {
        let v = value.trim();
        let (measures_ahead, beat) = match v.split_once('m') {
            Some((m, rest)) => {
                let m = m
                    .trim()
                    .parse()
                    .map_err(|_| ConvertError::value("timestamp", value))?;
                (m, rest.trim().trim_start_matches('+'))
            }
            None => (0, v),
        };
        let beat: f64 = beat
            .trim()
            .parse()
            .map_err(|_| ConvertError::value("timestamp", value))?;
        Ok(Tstamp {
            measures_ahead,
            beat,
        })
    }
}

/// One event of a flattened layer.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerEvent {
    pub id: String,
    /// Length in meter units, tuplet ratio applied
    pub beats: f64,
}

/// Flatten a layer into its sequence of timed events. Beams and tuplets are
/// transparent; a tuplet scales its members by `numbase / num`.
pub fn flatten_layer(layer: Node, meter: &Meter, ids: &mut IdTable) -> Result<Vec<LayerEvent>> {
    let mut events = Vec::new();
    collect_events(layer, meter, 1.0, ids, &mut events)?;
    Ok(events)
}

fn collect_events(
    parent: Node,
    meter: &Meter,
    factor: f64,
    ids: &mut IdTable,
    out: &mut Vec<LayerEvent>,
) -> Result<()> {
    for child in elements(parent) {
        match tag(child) {
            "beam" => collect_events(child, meter, factor, ids, out)?,
            "tuplet" => {
                let inner = factor * tuplet_factor(child);
                collect_events(child, meter, inner, ids, out)?;
            }
            "mRest" => out.push(LayerEvent {
                id: ids.id_of(child),
                beats: meter.measure_beats(),
            }),
            "note" | "rest" | "space" | "chord" => {
                let (code, dots) = written_duration(child, ids)?;
                out.push(LayerEvent {
                    id: ids.id_of(child),
                    beats: event_beats(child, code, dots, meter, factor),
                });
            }
            _ => {}
        }
    }
    Ok(())
}

/// `@num`/`@numbase` of a tuplet. A bare tuplet is a triplet (3 in the
/// time of 2).
pub fn tuplet_ratio(tuplet: Node) -> (u32, u32) {
    let num = attr_u32(tuplet, "num").unwrap_or(3).max(1);
    let numbase = attr_u32(tuplet, "numbase").unwrap_or(2);
    (num, numbase)
}

/// Scale a tuplet applies to the durations of its members.
pub fn tuplet_factor(tuplet: Node) -> f64 {
    let (num, numbase) = tuplet_ratio(tuplet);
    numbase as f64 / num as f64
}

/// Augmentation dots from `@dots` or `<dot>` children. A chord without
/// either takes the dots of its first note.
pub fn dots_of(node: Node) -> u8 {
    if let Some(dots) = attr_u32(node, "dots") {
        return dots.min(4) as u8;
    }
    let children = children_named(node, "dot").count();
    if children == 0 && tag(node) == "chord" {
        if let Some(note) = children_named(node, "note").next() {
            return dots_of(note);
        }
    }
    children.min(4) as u8
}

/// Written duration and dots of a note, rest, space or chord. A chord
/// without `@dur` takes the duration its notes agree on.
pub fn written_duration(node: Node, ids: &mut IdTable) -> Result<(DurationCode, u8)> {
    let code = match node.attribute("dur") {
        Some(dur) => DurationCode::from_mei(dur)?,
        None if tag(node) == "chord" => {
            let mut durs = children_named(node, "note").filter_map(|n| n.attribute("dur"));
            let first = durs
                .next()
                .ok_or_else(|| ConvertError::missing("chord", "dur"))?;
            if durs.any(|d| d != first) {
                return Err(ConvertError::AmbiguousChordDuration {
                    chord: ids.id_of(node),
                });
            }
            DurationCode::from_mei(first)?
        }
        None => return Err(ConvertError::missing(tag(node), "dur")),
    };
    Ok((code, dots_of(node)))
}

/// Length in meter units under the enclosing tuplet `factor`. Grace notes
/// take no time.
pub fn event_beats(node: Node, code: DurationCode, dots: u8, meter: &Meter, factor: f64) -> f64 {
    if node.has_attribute("grace") {
        return 0.0;
    }
    code.whole_fraction() * meter.unit as f64 * dots_factor(dots) * factor
}

/// Pick the event nearest to `beat`. Running positions start at 1. When the
/// target falls between two events at exactly the same distance from both,
/// the earlier one wins. Past the end the last event is returned.
pub fn nearest_event(events: &[LayerEvent], beat: f64) -> Option<&str> {
    let mut position = 1.0;
    let mut prev: Option<(&LayerEvent, f64)> = None;

    for event in events {
        let dist = beat - position;
        if dist.abs() < EPSILON {
            return Some(event.id.as_str());
        }
        if dist < 0.0 {
            return match prev {
                Some((p, prev_dist)) if prev_dist <= dist.abs() + EPSILON => Some(p.id.as_str()),
                _ => Some(event.id.as_str()),
            };
        }
        prev = Some((event, dist));
        position += event.beats;
    }
    prev.map(|(p, _)| p.id.as_str())
}

/// Id of the event of `layer` nearest to `beat`.
pub fn tstamp2id(beat: f64, layer: Node, meter: &Meter, ids: &mut IdTable) -> Result<Option<String>> {
    let events = flatten_layer(layer, meter, ids)?;
    Ok(nearest_event(&events, beat).map(str::to_string))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mei::parse_document;

    fn meter(count: u32, unit: u32) -> Meter {
        Meter {
            count,
            unit,
            sym: None,
        }
    }

    #[test]
    fn parses_measure_offsets() {
        assert_eq!(
            Tstamp::parse("2m+3.5").unwrap(),
            Tstamp {
                measures_ahead: 2,
                beat: 3.5
            }
        );
        assert_eq!(Tstamp::parse("0m+1").unwrap().measures_ahead, 0);
        assert_eq!(Tstamp::parse("3").unwrap().beat, 3.0);
        assert!(Tstamp::parse("m+").is_err());
    }

    #[test]
    fn first_beat_is_first_event_for_every_meter() {
        let doc = parse_document(
            r#"<layer><note xml:id="a" dur="8"/><note xml:id="b" dur="8"/><rest xml:id="c" dur="2"/></layer>"#,
        )
        .unwrap();
        for (count, unit) in [(4, 4), (3, 4), (6, 8), (2, 2), (3, 8)] {
            let mut ids = IdTable::new();
            let id = tstamp2id(1.0, doc.root_element(), &meter(count, unit), &mut ids).unwrap();
            assert_eq!(id.as_deref(), Some("a"), "meter {count}/{unit}");
        }
    }

    #[test]
    fn beams_and_tuplets_are_transparent() {
        let doc = parse_document(
            r#"<layer>
                 <beam><note xml:id="a" dur="8"/><note xml:id="b" dur="8"/></beam>
                 <tuplet num="3" numbase="2">
                   <note xml:id="t1" dur="8"/><note xml:id="t2" dur="8"/><note xml:id="t3" dur="8"/>
                 </tuplet>
                 <note xml:id="c" dur="2"/>
               </layer>"#,
        )
        .unwrap();
        let mut ids = IdTable::new();
        let events = flatten_layer(doc.root_element(), &meter(4, 4), &mut ids).unwrap();
        let names: Vec<&str> = events.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "t1", "t2", "t3", "c"]);
        assert!((events[2].beats - 1.0 / 3.0).abs() < 1e-9);
        assert_eq!(nearest_event(&events, 3.0), Some("c"));
        assert_eq!(nearest_event(&events, 1.5), Some("b"));
    }

    #[test]
    fn dots_come_from_chord_notes_and_dot_children() {
        let doc = parse_document(
            r#"<layer>
                 <chord xml:id="ch"><note dur="4" dots="1"/><note dur="4" dots="1"/></chord>
                 <note xml:id="d" dur="4"><dot/></note>
                 <note xml:id="b" dur="8"/>
               </layer>"#,
        )
        .unwrap();
        let mut ids = IdTable::new();
        let events = flatten_layer(doc.root_element(), &meter(4, 4), &mut ids).unwrap();
        let beats: Vec<f64> = events.iter().map(|e| e.beats).collect();
        assert_eq!(beats, vec![1.5, 1.5, 0.5]);
        // ch at 1, d at 2.5, b at 4
        assert_eq!(nearest_event(&events, 2.5), Some("d"));
        assert_eq!(nearest_event(&events, 4.0), Some("b"));
    }

    #[test]
    fn chord_notes_must_agree_on_duration() {
        let doc = parse_document(
            r#"<layer><chord xml:id="ch"><note dur="4"/><note dur="2"/></chord></layer>"#,
        )
        .unwrap();
        let mut ids = IdTable::new();
        let err = flatten_layer(doc.root_element(), &meter(4, 4), &mut ids).unwrap_err();
        assert_eq!(
            err,
            ConvertError::AmbiguousChordDuration {
                chord: "ch".to_string()
            }
        );
    }

    #[test]
    fn midpoint_prefers_earlier_event() {
        let events = vec![
            LayerEvent {
                id: "a".to_string(),
                beats: 2.0,
            },
            LayerEvent {
                id: "b".to_string(),
                beats: 2.0,
            },
        ];
        // a at 1, b at 3
        assert_eq!(nearest_event(&events, 2.0), Some("a"));
        assert_eq!(nearest_event(&events, 2.2), Some("b"));
        assert_eq!(nearest_event(&events, 1.8), Some("a"));
        assert_eq!(nearest_event(&events, 9.0), Some("b"));
        assert_eq!(nearest_event(&[], 1.0), None);
    }
}
