//! Walks a [`ScoreLayout`] and issues drawing calls on a [`Renderer`].

use crate::config::{FontSpec, Options};
use crate::constants::{CLEF_SPACE, KEY_SIG_ACCIDENTAL_SPACE, TIME_SIG_SPACE};
use crate::hyphenation::dash_count;
use crate::links::resolve::hairpin_openings;
use crate::measure::Measure;
use crate::model::*;
use crate::staff_info::Clef;
use crate::system::System;
use crate::tables::{Accidental, BarlineKind};

use super::constants::*;
use super::{Glyph, Renderer};

/// Draw the whole layout: per system staves, connectors and voices, then
/// curves, hairpins, text and lyric hyphens on top.
pub fn draw_layout<R: Renderer + ?Sized>(layout: &ScoreLayout, options: &Options, renderer: &mut R) {
    for system in &layout.systems {
        draw_system(system, options, renderer);
    }
    for curve in &layout.curves {
        draw_curve(curve, renderer);
    }
    for hairpin in &layout.hairpins {
        draw_hairpin(hairpin, renderer);
    }
    for text in &layout.texts {
        renderer.text(Point::new(text.x, text.y), &text.text, &text.font, text.anchor);
    }
    for hyphen in &layout.hyphens {
        draw_hyphen(hyphen, options.max_hyphen_distance, renderer);
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Systems & staves
// ═══════════════════════════════════════════════════════════════════════

fn draw_system<R: Renderer + ?Sized>(system: &System, options: &Options, r: &mut R) {
    for (i, measure) in system.measures.iter().enumerate() {
        for stave in measure.staves.values() {
            draw_stave(stave, i == 0, r);
        }
    }
    draw_connectors(system, options, r);
    for measure in &system.measures {
        for voice in measure.voices.draw_order() {
            draw_voice(voice, measure, r);
        }
    }
}

fn draw_stave<R: Renderer + ?Sized>(stave: &Stave, first_in_system: bool, r: &mut R) {
    let sp = stave.line_spacing;
    for i in 0..5 {
        let y = stave.y + i as f64 * sp;
        r.line(
            Point::new(stave.x, y),
            Point::new(stave.x + stave.width, y),
            STAFF_LINE_WIDTH,
        );
    }

    if stave.left_barline != BarlineKind::Single {
        draw_barline(stave, stave.x, stave.left_barline, r);
    } else if first_in_system {
        draw_barline(stave, stave.x, BarlineKind::Single, r);
    }
    draw_barline(stave, stave.x + stave.width, stave.right_barline, r);

    draw_modifiers(stave, r);
}

/// Clef, key signature and time signature at the start of a stave.
fn draw_modifiers<R: Renderer + ?Sized>(stave: &Stave, r: &mut R) {
    let sp = stave.line_spacing;
    let mut x = stave.x + 4.0;

    if stave.show_clef {
        let at = Point::new(x + CLEF_SPACE / 2.0 - 4.0, clef_line_y(stave));
        r.glyph(Glyph::Clef(stave.clef), at, CLEF_GLYPH_SIZE);
        x += CLEF_SPACE;
    }

    if stave.show_keysig {
        let accidental = if stave.key.fifths >= 0 {
            Accidental::Sharp
        } else {
            Accidental::Flat
        };
        let steps = stave.clef.key_signature_steps(stave.key.fifths);
        for (i, step) in steps.iter().enumerate() {
            let at = Point::new(
                x + (i as f64 + 0.5) * KEY_SIG_ACCIDENTAL_SPACE,
                stave.y + *step as f64 * sp / 2.0,
            );
            r.glyph(Glyph::Accidental(accidental), at, ACCIDENTAL_GLYPH_SIZE);
        }
        x += steps.len() as f64 * KEY_SIG_ACCIDENTAL_SPACE;
    }

    if stave.show_timesig {
        let cx = x + TIME_SIG_SPACE / 2.0;
        let middle = Point::new(cx, stave.y + 2.0 * sp);
        match stave.meter.sym.as_deref() {
            Some("common") => r.glyph(Glyph::CommonTime, middle, CLEF_GLYPH_SIZE),
            Some("cut") => r.glyph(Glyph::CutTime, middle, CLEF_GLYPH_SIZE),
            _ => {
                let font = FontSpec::new("Times", TIME_SIG_FONT_SIZE, "bold", "normal");
                let count = stave.meter.count.to_string();
                let unit = stave.meter.unit.to_string();
                r.text(middle, &count, &font, TextAnchor::Middle);
                r.text(Point::new(cx, stave.y + 4.0 * sp), &unit, &font, TextAnchor::Middle);
            }
        }
    }
}

/// Y of the line a clef sits on.
fn clef_line_y(stave: &Stave) -> f64 {
    let sp = stave.line_spacing;
    match stave.clef {
        Clef::Treble | Clef::OctaveTreble => stave.y + 3.0 * sp,
        Clef::Bass | Clef::Tenor => stave.y + sp,
        Clef::Alto => stave.y + 2.0 * sp,
    }
}

fn draw_barline<R: Renderer + ?Sized>(stave: &Stave, x: f64, kind: BarlineKind, r: &mut R) {
    let top = stave.y;
    let bottom = stave.bottom_y();
    let thin = |r: &mut R, x: f64| {
        r.line(Point::new(x, top), Point::new(x, bottom), BARLINE_WIDTH);
    };
    let thick = |r: &mut R, x: f64| {
        r.rect(x, top, THICK_BARLINE_WIDTH, bottom - top);
    };
    let dots = |r: &mut R, x: f64| {
        let sp = stave.line_spacing;
        r.dot(Point::new(x, top + 1.5 * sp), DOT_RADIUS);
        r.dot(Point::new(x, top + 2.5 * sp), DOT_RADIUS);
    };

    match kind {
        BarlineKind::Single => thin(r, x),
        BarlineKind::Double => {
            thin(r, x - 3.0);
            thin(r, x);
        }
        BarlineKind::End => {
            thin(r, x - 6.0);
            thick(r, x - THICK_BARLINE_WIDTH);
        }
        BarlineKind::RepeatStart => {
            thick(r, x);
            thin(r, x + 7.0);
            dots(r, x + 12.0);
        }
        BarlineKind::RepeatEnd => {
            dots(r, x - 12.0);
            thin(r, x - 7.0);
            thick(r, x - THICK_BARLINE_WIDTH);
        }
        BarlineKind::RepeatBoth => {
            dots(r, x - 10.0);
            thin(r, x - 5.0);
            thick(r, x - THICK_BARLINE_WIDTH / 2.0);
            thin(r, x + 5.0);
            dots(r, x + 10.0);
        }
        BarlineKind::Invisible => {}
    }
}

fn draw_connectors<R: Renderer + ?Sized>(system: &System, options: &Options, r: &mut R) {
    let x = system.x + system.left_margin;
    for connector in &system.connectors {
        let (Some(top), Some(last)) = (
            system.staff_y(connector.first_staff),
            system.staff_y(connector.last_staff),
        ) else {
            continue;
        };
        let bottom = last + options.stave_height;

        match connector.kind {
            ConnectorKind::Single => {
                r.line(Point::new(x, top), Point::new(x, bottom), BARLINE_WIDTH);
            }
            ConnectorKind::Brace => draw_brace(r, x - 4.0, top, bottom),
            ConnectorKind::Bracket => {
                let bx = x - BRACKET_WIDTH - 4.0;
                r.rect(bx, top - 2.0, BRACKET_WIDTH, bottom - top + 4.0);
                r.line(Point::new(bx, top - 2.0), Point::new(x + 2.0, top - 7.0), 1.5);
                r.line(Point::new(bx, bottom + 2.0), Point::new(x + 2.0, bottom + 7.0), 1.5);
            }
        }

        if connector.bar_thru && connector.first_staff != connector.last_staff {
            for measure in &system.measures {
                let mx = measure.x + measure.width;
                r.line(Point::new(mx, top), Point::new(mx, bottom), BARLINE_WIDTH);
            }
        }
    }
}

fn draw_brace<R: Renderer + ?Sized>(r: &mut R, x: f64, top_y: f64, bottom_y: f64) {
    let mid_y = (top_y + bottom_y) / 2.0;
    let h = bottom_y - top_y;
    let w = BRACE_WIDTH;
    r.curve(
        Point::new(x, top_y),
        Point::new(x, top_y + h * 0.28),
        Point::new(x - w, mid_y - h * 0.08),
        Point::new(x - w, mid_y),
        2.5,
    );
    r.curve(
        Point::new(x - w, mid_y),
        Point::new(x - w, mid_y + h * 0.08),
        Point::new(x, bottom_y - h * 0.28),
        Point::new(x, bottom_y),
        2.5,
    );
}

// ═══════════════════════════════════════════════════════════════════════
// Voices
// ═══════════════════════════════════════════════════════════════════════

fn draw_voice<R: Renderer + ?Sized>(voice: &Voice, measure: &Measure, r: &mut R) {
    for t in &voice.tickables {
        let Some(stave) = measure.stave(t.staff_n) else {
            continue;
        };
        match t.kind {
            TickableKind::Note | TickableKind::Chord => draw_note(t, stave, r),
            TickableKind::Rest => {
                if let Some(&y) = t.ys.first() {
                    r.glyph(Glyph::Rest(t.duration), Point::new(t.x, y), REST_GLYPH_SIZE);
                    draw_dots(t, y, stave, r);
                }
            }
            TickableKind::MeasureRest => {
                let sp = stave.line_spacing;
                r.rect(t.x - 6.0, stave.y + sp, 12.0, sp / 2.0);
            }
            TickableKind::Space => {}
        }
    }
    for beam in &voice.beams {
        draw_beam(voice, beam, r);
    }
    for tuplet in &voice.tuplets {
        draw_tuplet(voice, tuplet, r);
    }
}

fn draw_note<R: Renderer + ?Sized>(t: &Tickable, stave: &Stave, r: &mut R) {
    let filled = t.duration.filled_head();
    for (key, &y) in t.keys.iter().zip(&t.ys) {
        r.notehead(Point::new(t.x, y), filled);
        if let Some(accid) = key.accid {
            r.glyph(
                Glyph::Accidental(accid),
                Point::new(t.x - ACCIDENTAL_OFFSET, y),
                ACCIDENTAL_GLYPH_SIZE,
            );
        }
        draw_dots(t, y, stave, r);
    }

    draw_ledger_lines(t, stave, r);

    if t.beam.is_none() && t.duration.has_stem() {
        draw_stem(t, t.stem, stem_tip(t, t.stem), r);
        let flags = t.duration.flag_count();
        if flags > 0 {
            let tip = Point::new(stem_x(t, t.stem), stem_tip(t, t.stem));
            let glyph = Glyph::Flag {
                count: flags,
                stem_up: t.stem == StemDirection::Up,
            };
            r.glyph(glyph, tip, STEM_LENGTH);
        }
    }

    // Articulations go on the notehead side, away from the stem
    for (i, articulation) in t.articulations.iter().enumerate() {
        let offset = ARTICULATION_GAP * (i + 1) as f64;
        let y = match t.stem {
            StemDirection::Up => t.extreme_y(StemDirection::Down) + offset,
            StemDirection::Down => t.extreme_y(StemDirection::Up) - offset,
        };
        r.glyph(
            Glyph::Articulation(*articulation),
            Point::new(t.x, y),
            ARTICULATION_GLYPH_SIZE,
        );
    }
}

fn draw_dots<R: Renderer + ?Sized>(t: &Tickable, y: f64, stave: &Stave, r: &mut R) {
    let half = stave.line_spacing / 2.0;
    let on_line = (((y - stave.y) / half).round() as i64) % 2 == 0;
    let dot_y = if on_line { y - half } else { y };
    for d in 0..t.dots {
        let dx = NOTEHEAD_RX + 4.0 + d as f64 * 4.0;
        r.dot(Point::new(t.x + dx, dot_y), DOT_RADIUS);
    }
}

fn draw_ledger_lines<R: Renderer + ?Sized>(t: &Tickable, stave: &Stave, r: &mut R) {
    let sp = stave.line_spacing;
    let half_len = NOTEHEAD_RX + LEDGER_LINE_EXTEND;
    let mut ledger = |y: f64| {
        r.line(
            Point::new(t.x - half_len, y),
            Point::new(t.x + half_len, y),
            LEDGER_LINE_WIDTH,
        );
    };

    let highest = t.extreme_y(StemDirection::Up);
    let mut y = stave.y - sp;
    while y >= highest - 0.01 {
        ledger(y);
        y -= sp;
    }

    let lowest = t.extreme_y(StemDirection::Down);
    let mut y = stave.bottom_y() + sp;
    while y <= lowest + 0.01 {
        ledger(y);
        y += sp;
    }
}

fn stem_x(t: &Tickable, dir: StemDirection) -> f64 {
    match dir {
        StemDirection::Up => t.x + NOTEHEAD_RX - STEM_WIDTH / 2.0,
        StemDirection::Down => t.x - NOTEHEAD_RX + STEM_WIDTH / 2.0,
    }
}

/// Free end of an unbeamed stem.
fn stem_tip(t: &Tickable, dir: StemDirection) -> f64 {
    match dir {
        StemDirection::Up => t.extreme_y(StemDirection::Up) - STEM_LENGTH,
        StemDirection::Down => t.extreme_y(StemDirection::Down) + STEM_LENGTH,
    }
}

/// Stem from the notehead furthest from `tip_y` to `tip_y`.
fn draw_stem<R: Renderer + ?Sized>(t: &Tickable, dir: StemDirection, tip_y: f64, r: &mut R) {
    let x = stem_x(t, dir);
    let base = t.extreme_y(dir.opposite());
    r.line(Point::new(x, base), Point::new(x, tip_y), STEM_WIDTH);
}

// ═══════════════════════════════════════════════════════════════════════
// Beams & tuplets
// ═══════════════════════════════════════════════════════════════════════

fn draw_beam<R: Renderer + ?Sized>(voice: &Voice, beam: &BeamGroup, r: &mut R) {
    let members: Vec<&Tickable> = beam
        .tickables
        .iter()
        .filter_map(|&i| voice.tickables.get(i))
        .filter(|t| t.is_pitched() && t.duration.has_stem())
        .collect();
    let dir = beam.stem;

    if members.len() < 2 {
        // A lone member is drawn like an unbeamed note
        for t in members {
            draw_stem(t, dir, stem_tip(t, dir), r);
            let flags = t.duration.flag_count();
            if flags > 0 {
                let glyph = Glyph::Flag {
                    count: flags,
                    stem_up: dir == StemDirection::Up,
                };
                r.glyph(glyph, Point::new(stem_x(t, dir), stem_tip(t, dir)), STEM_LENGTH);
            }
        }
        return;
    }

    // Flat beam at the furthest stem tip
    let tips = members.iter().map(|t| stem_tip(t, dir));
    let beam_y = match dir {
        StemDirection::Up => tips.fold(f64::INFINITY, f64::min),
        StemDirection::Down => tips.fold(f64::NEG_INFINITY, f64::max),
    };
    for t in &members {
        draw_stem(t, dir, beam_y, r);
    }

    let (Some(first), Some(last)) = (members.first(), members.last()) else {
        return;
    };
    let x1 = stem_x(first, dir);
    let x2 = stem_x(last, dir);
    let levels = members
        .iter()
        .map(|t| t.duration.flag_count())
        .min()
        .unwrap_or(1)
        .max(1);
    for level in 0..levels {
        let offset = level as f64 * BEAM_SPACING + BEAM_THICKNESS / 2.0;
        let y = match dir {
            StemDirection::Up => beam_y + offset,
            StemDirection::Down => beam_y - offset,
        };
        r.line(Point::new(x1, y), Point::new(x2, y), BEAM_THICKNESS);
    }
}

fn draw_tuplet<R: Renderer + ?Sized>(voice: &Voice, tuplet: &TupletGroup, r: &mut R) {
    let members: Vec<&Tickable> = tuplet
        .tickables
        .iter()
        .filter_map(|&i| voice.tickables.get(i))
        .collect();
    let (Some(first), Some(last)) = (members.first(), members.last()) else {
        return;
    };

    let top = members
        .iter()
        .map(|t| {
            if t.is_pitched() && t.stem == StemDirection::Up && t.duration.has_stem() {
                stem_tip(t, StemDirection::Up)
            } else {
                t.extreme_y(StemDirection::Up)
            }
        })
        .fold(f64::INFINITY, f64::min);
    if !top.is_finite() {
        return;
    }

    let font = FontSpec::new("Times", TUPLET_FONT_SIZE, "normal", "italic");
    let x = (first.x + last.x) / 2.0;
    r.text(
        Point::new(x, top - 6.0),
        &tuplet.num.to_string(),
        &font,
        TextAnchor::Middle,
    );
}

// ═══════════════════════════════════════════════════════════════════════
// Curves, hairpins, hyphens
// ═══════════════════════════════════════════════════════════════════════

fn draw_curve<R: Renderer + ?Sized>(curve: &CurveSegment, r: &mut R) {
    let y_dir = match curve.direction {
        Place::Above => -1.0,
        Place::Below => 1.0,
    };
    let (start, end) = (curve.start, curve.end);
    let dx = (end.x - start.x).abs().max(1.0);
    let height = match curve.kind {
        CurveKind::Tie => (dx * TIE_HEIGHT_FACTOR).clamp(TIE_MIN_HEIGHT, TIE_MAX_HEIGHT),
        CurveKind::Slur => (dx * SLUR_HEIGHT_FACTOR).clamp(SLUR_MIN_HEIGHT, SLUR_MAX_HEIGHT),
    };
    let mid_y = (start.y + end.y) / 2.0;
    let cp1 = Point::new(start.x + dx * 0.25, mid_y + y_dir * height);
    let cp2 = Point::new(start.x + dx * 0.75, mid_y + y_dir * height);
    r.curve(start, cp1, cp2, end, SLUR_MID_THICKNESS);
}

fn draw_hairpin<R: Renderer + ?Sized>(hairpin: &HairpinSegment, r: &mut R) {
    let (open_start, open_end) = hairpin_openings(hairpin.form, HAIRPIN_HEIGHT);
    let halfway = (open_start + open_end) / 2.0;
    let (a, b) = match hairpin.part {
        SegmentPart::Whole => (open_start, open_end),
        SegmentPart::Start => (open_start, halfway),
        SegmentPart::End => (halfway, open_end),
    };
    let y = hairpin.y;
    r.line(
        Point::new(hairpin.start_x, y - a / 2.0),
        Point::new(hairpin.end_x, y - b / 2.0),
        1.0,
    );
    r.line(
        Point::new(hairpin.start_x, y + a / 2.0),
        Point::new(hairpin.end_x, y + b / 2.0),
        1.0,
    );
}

fn draw_hyphen<R: Renderer + ?Sized>(hyphen: &HyphenDescriptor, max_distance: f64, r: &mut R) {
    let span = hyphen.end_x - hyphen.start_x;
    if span <= 0.0 {
        return;
    }
    let n = dash_count(span, max_distance);
    let slot = span / (n + 1) as f64;
    let half = HYPHEN_LENGTH.min(slot * 0.6) / 2.0;
    for i in 0..n {
        let cx = hyphen.start_x + slot * (i + 1) as f64;
        r.line(
            Point::new(cx - half, hyphen.y),
            Point::new(cx + half, hyphen.y),
            1.0,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::{CommandRecorder, DrawCommand};

    #[test]
    fn hyphen_dashes_follow_the_span() {
        let mut rec = CommandRecorder::new();
        let hyphen = HyphenDescriptor {
            system: 0,
            start_x: 100.0,
            end_x: 260.0,
            y: 50.0,
        };
        draw_hyphen(&hyphen, 75.0, &mut rec);
        assert_eq!(rec.commands().len(), 2);

        let mut rec = CommandRecorder::new();
        let short = HyphenDescriptor {
            end_x: 110.0,
            ..hyphen
        };
        draw_hyphen(&short, 75.0, &mut rec);
        assert_eq!(rec.commands().len(), 1);
    }

    #[test]
    fn split_crescendo_meets_at_half_opening() {
        let seg = |part: SegmentPart| HairpinSegment {
            form: HairpinForm::Crescendo,
            place: Place::Below,
            system: 0,
            part,
            start_x: 0.0,
            end_x: 100.0,
            y: 200.0,
        };
        let mut rec = CommandRecorder::new();
        draw_hairpin(&seg(SegmentPart::Start), &mut rec);
        draw_hairpin(&seg(SegmentPart::End), &mut rec);

        let lines: Vec<(Point, Point)> = rec
            .commands()
            .iter()
            .filter_map(|c| match c {
                DrawCommand::Line { from, to, .. } => Some((*from, *to)),
                _ => None,
            })
            .collect();
        assert_eq!(lines.len(), 4);
        // start segment closes at the tip, ends half open
        assert_eq!(lines[0].0.y, 200.0);
        assert_eq!(lines[0].1.y, 200.0 - HAIRPIN_HEIGHT / 4.0);
        // end segment picks up where the start left off
        assert_eq!(lines[2].0.y, 200.0 - HAIRPIN_HEIGHT / 4.0);
        assert_eq!(lines[2].1.y, 200.0 - HAIRPIN_HEIGHT / 2.0);
    }
}
