//! Layer events: notes, chords, rests, spaces, beams, tuplets and anchored
//! text, plus the ties and slurs encoded as note attributes.

use roxmltree::Node;

use crate::error::{ConvertError, Result};
use crate::links::{EventLink, EventReference, LinkParams};
use crate::measure::Measure;
use crate::mei::{attr_f64, attr_u32, children_named, elements, number_or_one, required, tag, text_content};
use crate::model::{
    AnchoredText, BeamGroup, NoteKey, Place, StemDirection, Stave, Syllable, Tickable,
    TickableKind, TupletGroup, Voice, WordPos,
};
use crate::notes::{NoteEntry, NoteLocation};
use crate::staff_info::Meter;
use crate::links::tstamp::{event_beats, tuplet_factor, tuplet_ratio, written_duration};
use crate::tables::{step_index, Accidental, Articulation, DurationCode};

use super::Converter;

/// Running state while walking one layer.
pub(super) struct LayerContext {
    staff_n: u32,
    layer_n: u32,
    measure_n: u32,
    meter: Meter,
    /// Beats elapsed since the start of the measure
    onset: f64,
    /// Product of enclosing tuplet ratios
    factor: f64,
    location: NoteLocation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LinkToken {
    Initial,
    Medial,
    Terminal,
}

impl<'o> Converter<'o> {
    pub(super) fn process_layer(
        &mut self,
        layer: Node,
        staff_n: u32,
        system_idx: usize,
        measure_idx: usize,
        measure: &mut Measure,
    ) -> Result<()> {
        let layer_n = number_or_one(layer, "n");
        self.drain_deferred(layer, measure.n, staff_n, layer_n)?;

        let mut ctx = LayerContext {
            staff_n,
            layer_n,
            measure_n: measure.n,
            meter: self.meter_of(staff_n),
            onset: 0.0,
            factor: 1.0,
            location: NoteLocation {
                system: system_idx,
                measure: measure_idx,
                voice: measure.voices.len(),
                tickable: 0,
            },
        };
        let mut voice = Voice::new(staff_n, layer_n);
        for child in elements(layer) {
            self.map_event(child, "layer", &mut voice, &mut ctx, measure)?;
        }
        measure.voices.add_voice(voice);
        Ok(())
    }

    fn map_event(
        &mut self,
        node: Node,
        parent: &str,
        voice: &mut Voice,
        ctx: &mut LayerContext,
        measure: &mut Measure,
    ) -> Result<()> {
        match tag(node) {
            "note" => self.map_note(node, voice, ctx, measure),
            "chord" => self.map_chord(node, voice, ctx, measure),
            "rest" => self.map_rest(node, TickableKind::Rest, voice, ctx, measure),
            "space" => self.map_rest(node, TickableKind::Space, voice, ctx, measure),
            "mRest" => self.map_measure_rest(node, voice, ctx, measure),
            "beam" => {
                let start = voice.tickables.len();
                for child in elements(node) {
                    self.map_event(child, "beam", voice, ctx, measure)?;
                }
                let middle = measure
                    .stave(ctx.staff_n)
                    .map_or(0, Stave::middle_position);
                close_beam(voice, start, node, middle);
                Ok(())
            }
            "tuplet" => {
                let (num, numbase) = tuplet_ratio(node);
                let saved = ctx.factor;
                ctx.factor *= tuplet_factor(node);
                let start = voice.tickables.len();
                for child in elements(node) {
                    self.map_event(child, "tuplet", voice, ctx, measure)?;
                }
                ctx.factor = saved;
                voice.tuplets.push(TupletGroup {
                    num,
                    numbase,
                    tickables: (start..voice.tickables.len()).collect(),
                });
                Ok(())
            }
            "anchoredText" => {
                let onset = attr_f64(node, "tstamp").map_or(ctx.onset, |t| (t - 1.0).max(0.0));
                measure.anchored_texts.push(AnchoredText {
                    staff_n: ctx.staff_n,
                    onset,
                    text: text_content(node),
                    place: Place::from_mei(node.attribute("place"), Place::Above),
                });
                Ok(())
            }
            other => Err(ConvertError::unsupported(other, parent)),
        }
    }

    // ─── Notes & chords ──────────────────────────────────────────────

    fn map_note(
        &mut self,
        node: Node,
        voice: &mut Voice,
        ctx: &mut LayerContext,
        measure: &Measure,
    ) -> Result<()> {
        let id = self.ids.id_of(node);
        let stave = target_stave(node, &id, ctx, measure)?;
        let (duration, dots) = written_duration(node, &mut self.ids)?;
        let (key, y) = self.note_key(node, stave)?;
        let stem = explicit_stem(node)
            .unwrap_or_else(|| auto_stem(&[key.position], stave.middle_position()));

        if let Some(tie) = node.attribute("tie") {
            self.tie_tokens(tie, &key, stave.staff_n, ctx)?;
        }
        if let Some(slur) = node.attribute("slur") {
            self.slur_tokens(slur, &id, ctx)?;
        }

        let tickable = Tickable {
            id,
            kind: TickableKind::Note,
            duration,
            dots,
            beats: event_beats(node, duration, dots, &ctx.meter, ctx.factor),
            onset: ctx.onset,
            staff_n: stave.staff_n,
            keys: vec![key],
            stem,
            x: 0.0,
            ys: vec![y],
            articulations: articulations(node)?,
            syllables: syllables(node),
            beam: None,
        };
        self.push_tickable(voice, ctx, tickable, "note");
        Ok(())
    }

    fn map_chord(
        &mut self,
        node: Node,
        voice: &mut Voice,
        ctx: &mut LayerContext,
        measure: &Measure,
    ) -> Result<()> {
        let id = self.ids.id_of(node);
        let stave = target_stave(node, &id, ctx, measure)?;

        let mut keys = Vec::new();
        let mut ys = Vec::new();
        let mut articulations_all = articulations(node)?;
        let mut syllables_all = syllables(node);
        for child in elements(node) {
            match tag(child) {
                "note" => {
                    let (key, y) = self.note_key(child, stave)?;
                    if let Some(tie) = child.attribute("tie").or(node.attribute("tie")) {
                        self.tie_tokens(tie, &key, stave.staff_n, ctx)?;
                    }
                    if let Some(slur) = child.attribute("slur") {
                        self.slur_tokens(slur, &key.id, ctx)?;
                    }
                    articulations_all.extend(articulations(child)?);
                    syllables_all.extend(syllables(child));
                    keys.push(key);
                    ys.push(y);
                }
                "artic" => {}
                other => return Err(ConvertError::unsupported(other, "chord")),
            }
        }
        if keys.is_empty() {
            return Err(ConvertError::missing("chord", "note"));
        }
        if let Some(slur) = node.attribute("slur") {
            self.slur_tokens(slur, &id, ctx)?;
        }

        let (duration, dots) = written_duration(node, &mut self.ids)?;
        let positions: Vec<i32> = keys.iter().map(|k| k.position).collect();
        let stem = explicit_stem(node)
            .unwrap_or_else(|| auto_stem(&positions, stave.middle_position()));

        let tickable = Tickable {
            id,
            kind: TickableKind::Chord,
            duration,
            dots,
            beats: event_beats(node, duration, dots, &ctx.meter, ctx.factor),
            onset: ctx.onset,
            staff_n: stave.staff_n,
            keys,
            stem,
            x: 0.0,
            ys,
            articulations: articulations_all,
            syllables: syllables_all,
            beam: None,
        };
        self.push_tickable(voice, ctx, tickable, "chord");
        Ok(())
    }

    /// Pitch of a `<note>` and the y it sits at on `stave`.
    fn note_key(&mut self, note: Node, stave: &Stave) -> Result<(NoteKey, f64)> {
        let pname = required(note, "pname")?;
        let oct_raw = required(note, "oct")?;
        let oct: i32 = oct_raw
            .trim()
            .parse()
            .map_err(|_| ConvertError::value("octave", oct_raw))?;
        let position = oct * 7 + step_index(pname)?;

        let accid = match note
            .attribute("accid")
            .or_else(|| children_named(note, "accid").find_map(|a| a.attribute("accid")))
        {
            Some(a) => Some(Accidental::from_mei(a)?),
            None => None,
        };

        let key = NoteKey {
            id: self.ids.id_of(note),
            pname: pname.to_ascii_lowercase(),
            oct,
            position,
            accid,
        };
        Ok((key, stave.y_for_position(position)))
    }

    // ─── Rests & spaces ──────────────────────────────────────────────

    fn map_rest(
        &mut self,
        node: Node,
        kind: TickableKind,
        voice: &mut Voice,
        ctx: &mut LayerContext,
        measure: &Measure,
    ) -> Result<()> {
        let id = self.ids.id_of(node);
        let stave = own_stave(ctx, measure)?;
        let (duration, dots) = written_duration(node, &mut self.ids)?;
        let tickable = Tickable {
            id,
            kind,
            duration,
            dots,
            beats: event_beats(node, duration, dots, &ctx.meter, ctx.factor),
            onset: ctx.onset,
            staff_n: stave.staff_n,
            keys: Vec::new(),
            stem: StemDirection::Up,
            x: 0.0,
            ys: vec![stave.y + 2.0 * stave.line_spacing],
            articulations: Vec::new(),
            syllables: Vec::new(),
            beam: None,
        };
        self.push_tickable(voice, ctx, tickable, tag(node));
        Ok(())
    }

    fn map_measure_rest(
        &mut self,
        node: Node,
        voice: &mut Voice,
        ctx: &mut LayerContext,
        measure: &Measure,
    ) -> Result<()> {
        let id = self.ids.id_of(node);
        let stave = own_stave(ctx, measure)?;
        let tickable = Tickable {
            id,
            kind: TickableKind::MeasureRest,
            duration: DurationCode::Whole,
            dots: 0,
            beats: ctx.meter.measure_beats(),
            onset: ctx.onset,
            staff_n: stave.staff_n,
            keys: Vec::new(),
            stem: StemDirection::Up,
            x: 0.0,
            ys: vec![stave.y + stave.line_spacing],
            articulations: Vec::new(),
            syllables: Vec::new(),
            beam: None,
        };
        self.push_tickable(voice, ctx, tickable, "mRest");
        Ok(())
    }

    /// Append a tickable, register its ids and advance the onset.
    fn push_tickable(
        &mut self,
        voice: &mut Voice,
        ctx: &mut LayerContext,
        tickable: Tickable,
        element: &str,
    ) {
        let location = NoteLocation {
            tickable: voice.tickables.len(),
            ..ctx.location
        };
        self.notes.insert(
            tickable.id.clone(),
            NoteEntry {
                tag: element.to_string(),
                location,
                chord_index: None,
            },
        );
        if tickable.kind == TickableKind::Chord {
            for (i, key) in tickable.keys.iter().enumerate() {
                self.notes.insert(
                    key.id.clone(),
                    NoteEntry {
                        tag: "note".to_string(),
                        location,
                        chord_index: Some(i),
                    },
                );
            }
        }
        ctx.onset += tickable.beats;
        voice.tickables.push(tickable);
    }

    // ─── Tie & slur attributes ───────────────────────────────────────

    /// Ties match on pitch and on the staff the note is drawn on, which may
    /// differ from its layer's staff.
    fn tie_tokens(
        &mut self,
        value: &str,
        key: &NoteKey,
        staff_n: u32,
        ctx: &LayerContext,
    ) -> Result<()> {
        let condition = LinkParams::Tie {
            pitch: Some((key.pname.clone(), key.oct)),
            staff: staff_n,
        };
        for (token, _) in parse_link_tokens(value, "tie")? {
            self.apply_token(token, &condition, &key.id, ctx, true);
        }
        Ok(())
    }

    fn slur_tokens(&mut self, value: &str, id: &str, ctx: &LayerContext) -> Result<()> {
        for (token, nesting) in parse_link_tokens(value, "slur")? {
            let condition = LinkParams::Slur {
                nesting: Some(nesting.unwrap_or(1)),
                curvedir: None,
            };
            self.apply_token(token, &condition, id, ctx, false);
        }
        Ok(())
    }

    fn apply_token(
        &mut self,
        token: LinkToken,
        condition: &LinkParams,
        id: &str,
        ctx: &LayerContext,
        is_tie: bool,
    ) {
        let collection = if is_tie {
            &mut self.ties
        } else {
            &mut self.slurs
        };
        let reference = || EventReference::Id(id.to_string());
        if matches!(token, LinkToken::Terminal | LinkToken::Medial) {
            collection.terminate_link(condition, reference(), ctx.staff_n, ctx.layer_n);
        }
        if matches!(token, LinkToken::Initial | LinkToken::Medial) {
            collection.start_link(
                EventLink::new(condition.clone(), ctx.staff_n, ctx.layer_n).with_first(reference()),
            );
        }
    }
}

// ─── Helpers ─────────────────────────────────────────────────────────

/// Stave a note or chord is drawn on. A different `@staff` moves it to that
/// stave, which must already exist in the measure.
fn target_stave<'m>(
    node: Node,
    id: &str,
    ctx: &LayerContext,
    measure: &'m Measure,
) -> Result<&'m Stave> {
    let staff_n = attr_u32(node, "staff").unwrap_or(ctx.staff_n);
    measure
        .stave(staff_n)
        .ok_or_else(|| ConvertError::StaffNotFound {
            element: id.to_string(),
            staff: staff_n,
            measure: ctx.measure_n,
        })
}

fn own_stave<'m>(ctx: &LayerContext, measure: &'m Measure) -> Result<&'m Stave> {
    measure
        .stave(ctx.staff_n)
        .ok_or_else(|| ConvertError::StaffNotFound {
            element: "layer".to_string(),
            staff: ctx.staff_n,
            measure: ctx.measure_n,
        })
}

fn explicit_stem(node: Node) -> Option<StemDirection> {
    match node.attribute("stem.dir") {
        Some("up") => Some(StemDirection::Up),
        Some("down") => Some(StemDirection::Down),
        _ => None,
    }
}

/// Stem away from the notehead furthest from the middle line; a note on
/// the middle line gets a down stem.
fn auto_stem(positions: &[i32], middle: i32) -> StemDirection {
    let (Some(&hi), Some(&lo)) = (positions.iter().max(), positions.iter().min()) else {
        return StemDirection::Up;
    };
    if hi - middle >= middle - lo {
        StemDirection::Down
    } else {
        StemDirection::Up
    }
}

fn articulations(node: Node) -> Result<Vec<Articulation>> {
    let mut out = Vec::new();
    if let Some(value) = node.attribute("artic") {
        for token in value.split_whitespace() {
            out.push(Articulation::from_mei(token)?);
        }
    }
    for artic in children_named(node, "artic") {
        if let Some(value) = artic.attribute("artic") {
            for token in value.split_whitespace() {
                out.push(Articulation::from_mei(token)?);
            }
        }
    }
    Ok(out)
}

fn syllables(node: Node) -> Vec<Syllable> {
    let mut out = Vec::new();
    for verse in children_named(node, "verse") {
        let n = number_or_one(verse, "n");
        for syl in children_named(verse, "syl") {
            out.push(Syllable {
                verse: n,
                text: text_content(syl),
                wordpos: match syl.attribute("wordpos") {
                    Some("i") => Some(WordPos::I),
                    Some("m") => Some(WordPos::M),
                    Some("t") => Some(WordPos::T),
                    _ => None,
                },
            });
        }
    }
    out
}

/// Apply one beam: every pitched member gets the group's stem direction.
fn close_beam(voice: &mut Voice, start: usize, node: Node, middle: i32) {
    let members: Vec<usize> = (start..voice.tickables.len())
        .filter(|&i| voice.tickables[i].is_pitched())
        .collect();
    if members.is_empty() {
        return;
    }
    let stem = node
        .descendants()
        .find_map(explicit_stem)
        .unwrap_or_else(|| {
            let positions: Vec<i32> = members
                .iter()
                .flat_map(|&i| voice.tickables[i].keys.iter().map(|k| k.position))
                .collect();
            auto_stem(&positions, middle)
        });
    let group = voice.beams.len();
    for &i in &members {
        voice.tickables[i].stem = stem;
        voice.tickables[i].beam = Some(group);
    }
    voice.beams.push(BeamGroup {
        tickables: members,
        stem,
    });
}

/// Tokenize `@tie`/`@slur`: `i`, `m` or `t`, each optionally followed by a
/// nesting digit ("i1 t2").
fn parse_link_tokens(value: &str, kind: &'static str) -> Result<Vec<(LinkToken, Option<u32>)>> {
    let mut tokens = Vec::new();
    let mut chars = value.chars().filter(|c| !c.is_whitespace()).peekable();
    while let Some(c) = chars.next() {
        let token = match c {
            'i' => LinkToken::Initial,
            'm' => LinkToken::Medial,
            't' => LinkToken::Terminal,
            _ => return Err(ConvertError::value(kind, value)),
        };
        let mut digits = String::new();
        while let Some(&d) = chars.peek() {
            if !d.is_ascii_digit() {
                break;
            }
            digits.push(d);
            chars.next();
        }
        tokens.push((token, digits.parse().ok()));
    }
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn link_tokens_with_nesting() {
        assert_eq!(
            parse_link_tokens("i1 t2", "slur").unwrap(),
            vec![(LinkToken::Initial, Some(1)), (LinkToken::Terminal, Some(2))]
        );
        assert_eq!(parse_link_tokens("m", "tie").unwrap(), vec![(LinkToken::Medial, None)]);
        assert_eq!(parse_link_tokens("x", "tie").unwrap_err().code(), "unsupported-value");
    }

    #[test]
    fn stems_point_away_from_the_furthest_head() {
        // treble middle line is B4 = 4 * 7 + 6
        let middle = 34;
        assert_eq!(auto_stem(&[28], middle), StemDirection::Up);
        assert_eq!(auto_stem(&[34], middle), StemDirection::Down);
        assert_eq!(auto_stem(&[30, 40], middle), StemDirection::Down);
        assert_eq!(auto_stem(&[26, 36], middle), StemDirection::Up);
    }
}
