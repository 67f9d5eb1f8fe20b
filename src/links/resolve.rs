//! Turn accumulated links into positioned output once every system has
//! been formatted.
//!
//! Ties, slurs and hairpins degrade when an endpoint cannot be found: the
//! missing end is drawn to the edge of the system and a warning is logged.
//! Pointer texts have no such fallback and fail the conversion.

use crate::config::{FontSpec, Options};
use crate::constants::*;
use crate::error::{ConvertError, Result};
use crate::model::{
    CurveKind, CurveSegment, HairpinForm, HairpinSegment, Place, Point, SegmentPart, StemDirection,
    TextAnchor, TextDescriptor, TextKind,
};
use crate::notes::{NoteAnchor, NotesById};
use crate::system::System;

use super::{EventLink, LinkCollection, LinkKind, LinkParams};

// ═══════════════════════════════════════════════════════════════════════
// Ties & slurs
// ═══════════════════════════════════════════════════════════════════════

pub fn resolve_curves(
    collection: &LinkCollection,
    notes: &NotesById,
    systems: &[System],
) -> Vec<CurveSegment> {
    let kind = match collection.kind() {
        LinkKind::Tie => CurveKind::Tie,
        _ => CurveKind::Slur,
    };
    let mut segments = Vec::new();
    for link in collection.links() {
        segments.extend(curve_segments(kind, link, notes, systems));
    }
    segments
}

fn curve_segments(
    kind: CurveKind,
    link: &EventLink,
    notes: &NotesById,
    systems: &[System],
) -> Vec<CurveSegment> {
    let first = link.first_id().and_then(|id| notes.anchor(id, systems));
    let last = link.last_id().and_then(|id| notes.anchor(id, systems));
    let curvedir = match &link.params {
        LinkParams::Slur { curvedir, .. } => *curvedir,
        _ => None,
    };
    let inset = if kind == CurveKind::Tie { TIE_X_INSET } else { 0.0 };

    let segment = |system: usize, part: SegmentPart, start: Point, end: Point, direction| {
        CurveSegment {
            kind,
            element_id: link.element_id.clone(),
            first_note: link.first_id().map(str::to_string),
            last_note: link.last_id().map(str::to_string),
            system,
            part,
            start,
            end,
            direction,
        }
    };

    match (first, last) {
        (Some(f), Some(l)) => {
            let direction = curvedir.unwrap_or_else(|| away_from_stem(f.stem));
            let start = Point::new(f.x + inset, curve_y(&f, direction));
            let end = Point::new(l.x - inset, curve_y(&l, direction));
            if f.system == l.system {
                return vec![segment(f.system, SegmentPart::Whole, start, end, direction)];
            }
            let right_edge = systems[f.system].content_end_x();
            let left_edge = systems[l.system].content_start_x();
            vec![
                segment(
                    f.system,
                    SegmentPart::Start,
                    start,
                    Point::new(right_edge, start.y),
                    direction,
                ),
                segment(
                    l.system,
                    SegmentPart::End,
                    Point::new(left_edge, end.y),
                    end,
                    direction,
                ),
            ]
        }
        (Some(f), None) => {
            log::warn!(
                "{}: end of {} not found, drawing to the system edge",
                describe(link),
                curve_name(kind)
            );
            let direction = curvedir.unwrap_or_else(|| away_from_stem(f.stem));
            let start = Point::new(f.x + inset, curve_y(&f, direction));
            let right_edge = systems[f.system].content_end_x();
            vec![segment(
                f.system,
                SegmentPart::Start,
                start,
                Point::new(right_edge, start.y),
                direction,
            )]
        }
        (None, Some(l)) => {
            log::warn!(
                "{}: start of {} not found, drawing from the system edge",
                describe(link),
                curve_name(kind)
            );
            let direction = curvedir.unwrap_or_else(|| away_from_stem(l.stem));
            let end = Point::new(l.x - inset, curve_y(&l, direction));
            let left_edge = systems[l.system].content_start_x();
            vec![segment(
                l.system,
                SegmentPart::End,
                Point::new(left_edge, end.y),
                end,
                direction,
            )]
        }
        (None, None) => {
            log::warn!("{}: no endpoint could be resolved, skipped", describe(link));
            Vec::new()
        }
    }
}

fn away_from_stem(stem: StemDirection) -> Place {
    match stem {
        StemDirection::Up => Place::Below,
        StemDirection::Down => Place::Above,
    }
}

fn curve_y(anchor: &NoteAnchor, direction: Place) -> f64 {
    match direction {
        Place::Above => anchor.top_y - CURVE_NOTEHEAD_OFFSET,
        Place::Below => anchor.bottom_y + CURVE_NOTEHEAD_OFFSET,
    }
}

fn curve_name(kind: CurveKind) -> &'static str {
    match kind {
        CurveKind::Tie => "tie",
        CurveKind::Slur => "slur",
    }
}

fn describe(link: &EventLink) -> String {
    match &link.element_id {
        Some(id) => format!("'{id}'"),
        None => format!(
            "link from {}",
            link.first_id().or(link.last_id()).unwrap_or("?")
        ),
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Hairpins
// ═══════════════════════════════════════════════════════════════════════

pub fn resolve_hairpins(
    collection: &LinkCollection,
    notes: &NotesById,
    systems: &[System],
) -> Vec<HairpinSegment> {
    let mut segments = Vec::new();
    for link in collection.links() {
        let LinkParams::Hairpin { form, place } = link.params else {
            continue;
        };
        let first = link.first_id().and_then(|id| notes.anchor(id, systems));
        let last = link.last_id().and_then(|id| notes.anchor(id, systems));
        let segment = |anchor: &NoteAnchor, part, start_x, end_x| HairpinSegment {
            form,
            place,
            system: anchor.system,
            part,
            start_x,
            end_x,
            y: hairpin_y(anchor, place),
        };

        match (first, last) {
            (Some(f), Some(l)) if f.system == l.system => {
                segments.push(segment(&f, SegmentPart::Whole, f.x, l.x));
            }
            (Some(f), Some(l)) => {
                segments.push(segment(
                    &f,
                    SegmentPart::Start,
                    f.x,
                    systems[f.system].content_end_x(),
                ));
                segments.push(segment(
                    &l,
                    SegmentPart::End,
                    systems[l.system].content_start_x(),
                    l.x,
                ));
            }
            (Some(f), None) => {
                log::warn!("{}: hairpin end not found, drawing to the system edge", describe(link));
                segments.push(segment(
                    &f,
                    SegmentPart::Start,
                    f.x,
                    systems[f.system].content_end_x(),
                ));
            }
            (None, Some(l)) => {
                log::warn!("{}: hairpin start not found, drawing from the system edge", describe(link));
                segments.push(segment(
                    &l,
                    SegmentPart::End,
                    systems[l.system].content_start_x(),
                    l.x,
                ));
            }
            (None, None) => {
                log::warn!("{}: no hairpin endpoint could be resolved, skipped", describe(link));
            }
        }
    }
    segments
}

fn hairpin_y(anchor: &NoteAnchor, place: Place) -> f64 {
    match place {
        Place::Above => anchor.stave_top - HAIRPIN_OFFSET,
        Place::Below => anchor.stave_bottom + HAIRPIN_OFFSET,
    }
}

/// Opening height of a hairpin: crescendos open towards the end.
pub fn hairpin_openings(form: HairpinForm, height: f64) -> (f64, f64) {
    match form {
        HairpinForm::Crescendo => (0.0, height),
        HairpinForm::Diminuendo => (height, 0.0),
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Pointer texts
// ═══════════════════════════════════════════════════════════════════════

pub fn resolve_pointers(
    collection: &LinkCollection,
    notes: &NotesById,
    systems: &[System],
    options: &Options,
) -> Result<Vec<TextDescriptor>> {
    let kind = collection.kind();
    let (text_kind, font, anchor) = match kind {
        LinkKind::Dynamic => (TextKind::Dynamic, &options.dynamics_font, TextAnchor::Middle),
        LinkKind::Tempo => (TextKind::Tempo, &options.tempo_font, TextAnchor::Start),
        _ => (TextKind::Directive, &options.annotation_font, TextAnchor::Start),
    };

    let mut texts = Vec::new();
    for link in collection.links() {
        let LinkParams::Pointer { text, place } = &link.params else {
            continue;
        };
        let target = link
            .first_id()
            .and_then(|id| notes.anchor(id, systems))
            .ok_or_else(|| unresolved(kind, link))?;

        texts.push(TextDescriptor {
            kind: text_kind,
            system: target.system,
            x: target.x,
            y: text_y(&target, *place, font),
            text: text.clone(),
            font: font.clone(),
            anchor,
        });
    }
    Ok(texts)
}

fn text_y(anchor: &NoteAnchor, place: Place, font: &FontSpec) -> f64 {
    match place {
        Place::Above => anchor.stave_top - ANNOTATION_OFFSET,
        Place::Below => anchor.stave_bottom + ANNOTATION_OFFSET + font.size,
    }
}

fn unresolved(kind: LinkKind, link: &EventLink) -> ConvertError {
    let reference = match &link.first {
        Some(super::EventReference::Id(id)) => id.clone(),
        Some(super::EventReference::Timestamp(ts)) => format!("tstamp {}", ts.beat),
        None => String::new(),
    };
    ConvertError::UnresolvedReference {
        element: link
            .element_id
            .clone()
            .unwrap_or_else(|| kind.element_name().to_string()),
        reference,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::links::EventReference;
    use crate::notes::NotesById;

    #[test]
    fn pointer_to_missing_note_is_fatal() {
        let mut dirs = LinkCollection::new(LinkKind::Directive);
        dirs.add_link(
            EventLink::new(
                LinkParams::Pointer {
                    text: "dolce".to_string(),
                    place: Place::Above,
                },
                1,
                1,
            )
            .with_first(EventReference::Id("nowhere".to_string()))
            .with_element_id("d1".to_string()),
        );
        let err = resolve_pointers(&dirs, &NotesById::new(), &[], &Options::default()).unwrap_err();
        assert_eq!(
            err,
            ConvertError::UnresolvedReference {
                element: "d1".to_string(),
                reference: "nowhere".to_string(),
            }
        );
    }

    #[test]
    fn tie_with_no_endpoints_is_dropped() {
        let mut ties = LinkCollection::new(LinkKind::Tie);
        ties.add_link(
            EventLink::new(LinkParams::Tie { pitch: None, staff: 1 }, 1, 1)
                .with_first(EventReference::Id("x".to_string())),
        );
        assert!(resolve_curves(&ties, &NotesById::new(), &[]).is_empty());
    }

    #[test]
    fn hairpin_opening_sides() {
        assert_eq!(hairpin_openings(HairpinForm::Crescendo, 10.0), (0.0, 10.0));
        assert_eq!(hairpin_openings(HairpinForm::Diminuendo, 10.0), (10.0, 0.0));
    }
}
