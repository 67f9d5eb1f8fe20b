//! MEI → layout conversion.
//!
//! A single forward walk over `score → section/ending → measure → staff →
//! layer`, tracking staff definitions and pending breaks. Events are placed
//! into systems and measures as they are met; linking elements are gathered
//! and resolved in [`Converter::finish`] once every system is formatted.

mod events;

use roxmltree::{Document, Node};

use crate::config::Options;
use crate::constants::*;
use crate::error::{ConvertError, Result};
use crate::hyphenation::collect_lyrics;
use crate::links::resolve::{resolve_curves, resolve_hairpins, resolve_pointers};
use crate::links::tstamp::tstamp2id;
use crate::links::{
    DeferredRegistry, EventLink, EventReference, LinkCollection, LinkKind, LinkParams,
    PendingResolution,
};
use crate::measure::Measure;
use crate::mei::{
    attr_f64, attr_u32, attributes, children_named, elements, number_or_one, required_u32, tag,
    text_content, AttributeMap, IdTable,
};
use crate::model::{
    Place, ScoreLayout, Stave, TextAnchor, TextDescriptor, TextKind,
};
use crate::notes::NotesById;
use crate::staff_info::Meter;
use crate::system::System;
use crate::system_info::{StaffGroup, SystemInfo};
use crate::tables::BarlineKind;

/// Break waiting for the next measure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum PendingBreak {
    #[default]
    None,
    /// New section or ending: every modifier is shown again
    Section,
    /// `<sb/>` or `<pb/>`: clef and key are shown again
    System,
}

pub struct Converter<'o> {
    options: &'o Options,
    ids: IdTable,
    system_info: SystemInfo,
    systems: Vec<System>,
    notes: NotesById,
    ties: LinkCollection,
    slurs: LinkCollection,
    hairpins: LinkCollection,
    directives: LinkCollection,
    dynamics: LinkCollection,
    tempos: LinkCollection,
    deferred: DeferredRegistry,
    pending_break: PendingBreak,
    /// Ordinal of the measure being processed, from 1
    measure_count: u32,
    /// Volta label waiting for the first measure of an ending
    ending_label: Option<String>,
}

impl<'o> Converter<'o> {
    pub fn new(options: &'o Options) -> Self {
        Self {
            options,
            ids: IdTable::new(),
            system_info: SystemInfo::new(options),
            systems: Vec::new(),
            notes: NotesById::new(),
            ties: LinkCollection::new(LinkKind::Tie),
            slurs: LinkCollection::new(LinkKind::Slur),
            hairpins: LinkCollection::new(LinkKind::Hairpin),
            directives: LinkCollection::new(LinkKind::Directive),
            dynamics: LinkCollection::new(LinkKind::Dynamic),
            tempos: LinkCollection::new(LinkKind::Tempo),
            deferred: DeferredRegistry::new(),
            pending_break: PendingBreak::Section,
            measure_count: 0,
            ending_label: None,
        }
    }

    /// Convert a parsed document. The root may be `<mei>` or `<score>`.
    pub fn convert(mut self, doc: &Document) -> Result<ScoreLayout> {
        let root = doc.root_element();
        let score = match tag(root) {
            "score" => root,
            "mei" => root
                .descendants()
                .find(|n| n.is_element() && tag(*n) == "score")
                .ok_or_else(|| ConvertError::unsupported("mei", "document without <score>"))?,
            other => return Err(ConvertError::unsupported(other, "document")),
        };
        self.process_score(score)?;
        self.finish()
    }

    fn trace(&self, message: impl FnOnce() -> String) {
        if self.options.verbose {
            log::debug!("{}", message());
        }
    }

    // ═══════════════════════════════════════════════════════════════════
    // Structure
    // ═══════════════════════════════════════════════════════════════════

    fn process_score(&mut self, score: Node) -> Result<()> {
        for child in elements(score) {
            match tag(child) {
                "scoreDef" => self.process_score_def(child)?,
                "section" => self.process_section(child)?,
                "ending" => self.process_ending(child)?,
                "sb" | "pb" => self.system_break(),
                other => return Err(ConvertError::unsupported(other, "score")),
            }
        }
        Ok(())
    }

    fn process_section(&mut self, section: Node) -> Result<()> {
        self.pending_break = PendingBreak::Section;
        self.trace(|| "section start".to_string());
        for child in elements(section) {
            match tag(child) {
                "measure" => self.process_measure(child)?,
                "scoreDef" => self.process_score_def(child)?,
                "staffDef" => {
                    self.process_staff_def(child)?;
                }
                "sb" | "pb" => self.system_break(),
                "section" => self.process_section(child)?,
                "ending" => self.process_ending(child)?,
                other => return Err(ConvertError::unsupported(other, "section")),
            }
        }
        Ok(())
    }

    fn process_ending(&mut self, ending: Node) -> Result<()> {
        self.ending_label = ending
            .attribute("label")
            .or_else(|| ending.attribute("n"))
            .map(str::to_string);
        self.process_section(ending)?;
        self.ending_label = None;
        Ok(())
    }

    fn system_break(&mut self) {
        // A pending section break already covers a system break
        if self.pending_break == PendingBreak::None {
            self.pending_break = PendingBreak::System;
        }
    }

    // ─── Definitions ─────────────────────────────────────────────────

    fn process_score_def(&mut self, score_def: Node) -> Result<()> {
        let mut atts = attributes(score_def);
        for child in elements(score_def) {
            match tag(child) {
                "staffGrp" | "staffDef" | "keySig" | "meterSig" | "clef" => {}
                "pgHead" | "pgFoot" | "pgHead2" | "pgFoot2" => {}
                other => return Err(ConvertError::unsupported(other, "scoreDef")),
            }
            merge_def_child(child, &mut atts);
        }
        self.system_info.process_score_def(&atts)?;

        for child in elements(score_def) {
            match tag(child) {
                "staffGrp" => {
                    self.process_staff_grp(child)?;
                }
                "staffDef" => {
                    self.process_staff_def(child)?;
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Define the staves of a group and record its symbol. Returns the
    /// staff numbers the group encloses.
    fn process_staff_grp(&mut self, grp: Node) -> Result<Vec<u32>> {
        let mut staves = Vec::new();
        let mut symbol = grp.attribute("symbol");
        for child in elements(grp) {
            match tag(child) {
                "staffDef" => staves.push(self.process_staff_def(child)?),
                "staffGrp" => staves.extend(self.process_staff_grp(child)?),
                "grpSym" => symbol = symbol.or(child.attribute("symbol")),
                "label" | "labelAbbr" | "instrDef" => {}
                other => return Err(ConvertError::unsupported(other, "staffGrp")),
            }
        }
        self.system_info.add_group(StaffGroup {
            symbol: StaffGroup::symbol_from_mei(symbol),
            bar_thru: grp.attribute("bar.thru") == Some("true"),
            staves: staves.clone(),
        });
        Ok(staves)
    }

    fn process_staff_def(&mut self, staff_def: Node) -> Result<u32> {
        let n = required_u32(staff_def, "n")?;
        let mut atts = attributes(staff_def);
        for child in elements(staff_def) {
            match tag(child) {
                "clef" | "keySig" | "meterSig" | "label" | "labelAbbr" => {}
                "instrDef" | "layerDef" => {}
                other => return Err(ConvertError::unsupported(other, "staffDef")),
            }
            merge_def_child(child, &mut atts);
        }
        self.trace(|| format!("staffDef n={n}"));
        self.system_info.process_staff_def(n, atts)?;
        Ok(n)
    }

    // ─── Measures ────────────────────────────────────────────────────

    fn start_system(&mut self) {
        let index = self.systems.len();
        self.trace(|| format!("system {index}"));
        let system = self.system_info.start_system(index, self.options);
        self.systems.push(system);
    }

    fn process_measure(&mut self, node: Node) -> Result<()> {
        self.measure_count += 1;
        let measure_n = self.measure_count;

        match std::mem::take(&mut self.pending_break) {
            PendingBreak::Section => {
                self.system_info.force_section_start();
                self.start_system();
            }
            PendingBreak::System => {
                self.system_info.force_system_start();
                self.start_system();
            }
            PendingBreak::None if self.systems.is_empty() => self.start_system(),
            PendingBreak::None => {}
        }
        let system_idx = self.systems.len() - 1;
        let measure_idx = self.systems[system_idx].measures.len();

        let mut measure = Measure::new(
            measure_n,
            node.attribute("n").map(str::to_string),
            attr_f64(node, "width"),
            self.ending_label.take(),
        );
        self.trace(|| format!("measure {measure_n} (n={:?})", measure.label));

        let left = barline(node, "left")?;
        let right = barline(node, "right")?;
        for staff in children_named(node, "staff") {
            let stave = self.create_stave(staff, system_idx, left, right)?;
            measure.add_stave(stave);
        }

        for staff in children_named(node, "staff") {
            let staff_n = required_u32(staff, "n")?;
            for layer in elements(staff) {
                if tag(layer) != "layer" {
                    return Err(ConvertError::unsupported(tag(layer), "staff"));
                }
                self.process_layer(layer, staff_n, system_idx, measure_idx, &mut measure)?;
            }
        }

        self.systems[system_idx].add_measure(measure);

        for child in elements(node) {
            match tag(child) {
                "staff" => {}
                "tie" | "slur" | "hairpin" | "dir" | "dynam" | "tempo" => {
                    self.process_control_event(child, node)?
                }
                other => return Err(ConvertError::unsupported(other, "measure")),
            }
        }
        Ok(())
    }

    fn create_stave(
        &mut self,
        staff: Node,
        system_idx: usize,
        left: BarlineKind,
        right: BarlineKind,
    ) -> Result<Stave> {
        let n = required_u32(staff, "n")?;
        let options = self.options;
        let system = &mut self.systems[system_idx];
        let y = match system.staff_y(n) {
            Some(y) => y,
            None => {
                // Staff defined after the system started: put it below
                let y = system.bottom_y(options) + options.staff_spacing;
                system.staff_ys.insert(n, y);
                y
            }
        };

        let info = self
            .system_info
            .staff_info_mut(n)
            .ok_or_else(|| ConvertError::UnresolvedReference {
                element: "staff".to_string(),
                reference: n.to_string(),
            })?;

        Ok(Stave {
            staff_n: n,
            x: 0.0,
            y,
            width: 0.0,
            line_spacing: options.stave_line_spacing,
            clef: info.clef(),
            key: info.key().clone(),
            meter: info.meter().clone(),
            show_clef: info.show_clef_check(),
            show_keysig: info.show_keysig_check(),
            show_timesig: info.show_timesig_check(),
            left_barline: left,
            right_barline: right,
            note_start_x: 0.0,
            note_end_x: 0.0,
        })
    }

    fn meter_of(&self, staff_n: u32) -> Meter {
        self.system_info
            .staff_info(staff_n)
            .map(|i| i.meter().clone())
            .unwrap_or_default()
    }

    // ═══════════════════════════════════════════════════════════════════
    // Links
    // ═══════════════════════════════════════════════════════════════════

    fn collection_mut(&mut self, kind: LinkKind) -> &mut LinkCollection {
        match kind {
            LinkKind::Tie => &mut self.ties,
            LinkKind::Slur => &mut self.slurs,
            LinkKind::Hairpin => &mut self.hairpins,
            LinkKind::Directive => &mut self.directives,
            LinkKind::Dynamic => &mut self.dynamics,
            LinkKind::Tempo => &mut self.tempos,
        }
    }

    /// Resolve link ends that were waiting for this staff/layer.
    fn drain_deferred(&mut self, layer: Node, measure_n: u32, staff_n: u32, layer_n: u32) -> Result<()> {
        let pending = self.deferred.drain((measure_n, staff_n, layer_n));
        if pending.is_empty() {
            return Ok(());
        }
        let meter = self.meter_of(staff_n);
        for p in pending {
            let id = tstamp2id(p.beat, layer, &meter, &mut self.ids)?;
            self.set_last_end(p, id);
        }
        Ok(())
    }

    fn set_last_end(&mut self, pending: PendingResolution, id: Option<String>) {
        let kind = pending.kind;
        match id {
            Some(id) => {
                if let Some(link) = self.collection_mut(kind).link_mut(pending.link) {
                    link.last = Some(EventReference::Id(id));
                }
            }
            None => log::warn!(
                "{} end at beat {} found no event to attach to",
                kind.element_name(),
                pending.beat
            ),
        }
    }

    fn process_control_event(&mut self, node: Node, measure: Node) -> Result<()> {
        let kind = match tag(node) {
            "tie" => LinkKind::Tie,
            "slur" => LinkKind::Slur,
            "hairpin" => LinkKind::Hairpin,
            "dir" => LinkKind::Directive,
            "dynam" => LinkKind::Dynamic,
            "tempo" => LinkKind::Tempo,
            other => return Err(ConvertError::unsupported(other, "measure")),
        };
        let staff_n = first_number(node, "staff");
        let layer_n = number_or_one(node, "layer");

        let params = match kind {
            LinkKind::Tie => LinkParams::Tie {
                pitch: None,
                staff: staff_n,
            },
            LinkKind::Slur => LinkParams::Slur {
                nesting: None,
                curvedir: node
                    .attribute("curvedir")
                    .map(|v| Place::from_mei(Some(v), Place::Above)),
            },
            LinkKind::Hairpin => LinkParams::Hairpin {
                form: LinkParams::hairpin_form(node)?,
                place: Place::from_mei(node.attribute("place"), Place::Below),
            },
            LinkKind::Directive | LinkKind::Tempo => LinkParams::Pointer {
                text: text_content(node),
                place: Place::from_mei(node.attribute("place"), Place::Above),
            },
            LinkKind::Dynamic => LinkParams::Pointer {
                text: text_content(node),
                place: Place::from_mei(node.attribute("place"), Place::Below),
            },
        };

        let first = EventReference::from_node(node, "startid", "tstamp")?;
        let last = if kind.is_pointer() {
            None
        } else {
            EventReference::from_node(node, "endid", "tstamp2")?
        };
        if kind.is_pointer() && first.is_none() {
            return Err(ConvertError::missing(tag(node), "startid"));
        }

        let mut link = EventLink::new(params, staff_n, layer_n).with_element_id(self.ids.id_of(node));
        link.first = first;
        link.last = last;
        let idx = self.collection_mut(kind).add_link(link);
        self.resolve_timestamps(kind, idx, measure, staff_n, layer_n)
    }

    /// Turn the timestamp ends of a freshly added link into ids: in place
    /// for this measure, through the deferred registry for later ones.
    fn resolve_timestamps(
        &mut self,
        kind: LinkKind,
        idx: usize,
        measure: Node,
        staff_n: u32,
        layer_n: u32,
    ) -> Result<()> {
        let Some(link) = self.collection_mut(kind).link_mut(idx) else {
            return Ok(());
        };
        let first = link.first.clone();
        let last = link.last.clone();
        let meter = self.meter_of(staff_n);
        let layer = find_layer(measure, staff_n, layer_n);

        if let Some(EventReference::Timestamp(ts)) = first {
            if ts.measures_ahead > 0 {
                log::warn!("{}: start timestamp points into a later measure", kind.element_name());
            } else if let Some(layer) = layer {
                let id = tstamp2id(ts.beat, layer, &meter, &mut self.ids)?;
                if let (Some(id), Some(link)) = (id, self.collection_mut(kind).link_mut(idx)) {
                    link.first = Some(EventReference::Id(id));
                }
            }
        }

        if let Some(EventReference::Timestamp(ts)) = last {
            let pending = PendingResolution {
                kind,
                link: idx,
                beat: ts.beat,
            };
            if ts.measures_ahead > 0 {
                let target = self.measure_count + ts.measures_ahead;
                self.deferred.register_pending((target, staff_n, layer_n), pending);
            } else if let Some(layer) = layer {
                let id = tstamp2id(ts.beat, layer, &meter, &mut self.ids)?;
                self.set_last_end(pending, id);
            }
        }
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════
    // Finish
    // ═══════════════════════════════════════════════════════════════════

    fn finish(mut self) -> Result<ScoreLayout> {
        for system in &mut self.systems {
            system.format(self.options);
        }

        for ((measure, staff, layer), p) in self.deferred.remaining() {
            log::warn!(
                "{} ending in measure {measure} (staff {staff}, layer {layer}) was never reached",
                p.kind.element_name()
            );
        }

        let mut curves = resolve_curves(&self.ties, &self.notes, &self.systems);
        curves.extend(resolve_curves(&self.slurs, &self.notes, &self.systems));
        let hairpins = resolve_hairpins(&self.hairpins, &self.notes, &self.systems);

        let mut texts = Vec::new();
        for collection in [&self.directives, &self.dynamics, &self.tempos] {
            texts.extend(resolve_pointers(collection, &self.notes, &self.systems, self.options)?);
        }
        texts.extend(self.system_texts());
        let lyrics = collect_lyrics(&self.systems, self.options);
        texts.extend(lyrics.texts);

        let height = self
            .systems
            .last()
            .map_or(2.0 * self.options.page_margin_top, |s| {
                s.bottom_y(self.options) + self.options.page_margin_top
            });

        Ok(ScoreLayout {
            page_width: self.options.page_width,
            height,
            systems: self.systems,
            curves,
            hairpins,
            texts,
            hyphens: lyrics.hyphens,
        })
    }

    /// Staff labels, measure numbers, volta labels and anchored texts.
    fn system_texts(&self) -> Vec<TextDescriptor> {
        let options = self.options;
        let mut texts = Vec::new();
        for system in &self.systems {
            for label in &system.labels {
                let Some(y) = system.staff_y(label.staff_n) else {
                    continue;
                };
                texts.push(TextDescriptor {
                    kind: TextKind::StaffLabel,
                    system: system.index,
                    x: system.x + system.left_margin - LABEL_PADDING / 2.0,
                    y: y + options.stave_height / 2.0 + options.staff_label_font.size * 0.35,
                    text: label.text.clone(),
                    font: options.staff_label_font.clone(),
                    anchor: TextAnchor::End,
                });
            }

            let top = system.staff_ys.values().copied().fold(f64::INFINITY, f64::min);
            for (i, measure) in system.measures.iter().enumerate() {
                if options.auto_measure_numbers && i == 0 && system.index > 0 {
                    texts.push(TextDescriptor {
                        kind: TextKind::MeasureNumber,
                        system: system.index,
                        x: measure.x,
                        y: top - MEASURE_NUMBER_OFFSET,
                        text: measure.label.clone().unwrap_or_else(|| measure.n.to_string()),
                        font: options.annotation_font.clone(),
                        anchor: TextAnchor::Start,
                    });
                }
                if let Some(ending) = &measure.ending {
                    texts.push(TextDescriptor {
                        kind: TextKind::Ending,
                        system: system.index,
                        x: measure.x + 4.0,
                        y: top - 2.0 * ANNOTATION_OFFSET,
                        text: ending.clone(),
                        font: options.annotation_font.clone(),
                        anchor: TextAnchor::Start,
                    });
                }
                for anchored in &measure.anchored_texts {
                    let Some(stave) = measure.stave(anchored.staff_n) else {
                        continue;
                    };
                    let y = match anchored.place {
                        Place::Above => stave.y - ANNOTATION_OFFSET,
                        Place::Below => {
                            stave.bottom_y() + ANNOTATION_OFFSET + options.annotation_font.size
                        }
                    };
                    texts.push(TextDescriptor {
                        kind: TextKind::AnchoredText,
                        system: system.index,
                        x: measure.x_at_onset(anchored.onset),
                        y,
                        text: anchored.text.clone(),
                        font: options.annotation_font.clone(),
                        anchor: TextAnchor::Start,
                    });
                }
            }
        }
        texts
    }
}

// ─── Helpers ─────────────────────────────────────────────────────────

/// Fold `clef`/`keySig`/`meterSig`/`label` children of a definition into
/// its attribute map.
fn merge_def_child(child: Node, atts: &mut AttributeMap) {
    let mut copy = |from: &str, to: &str| {
        if let Some(v) = child.attribute(from) {
            atts.insert(to.to_string(), v.to_string());
        }
    };
    match tag(child) {
        "clef" => {
            copy("shape", "clef.shape");
            copy("line", "clef.line");
            copy("dis", "clef.dis");
            copy("dis.place", "clef.dis.place");
            copy("visible", "clef.visible");
        }
        "keySig" => {
            copy("sig", "key.sig");
            copy("mode", "key.mode");
            copy("visible", "key.sig.show");
        }
        "meterSig" => {
            copy("count", "meter.count");
            copy("unit", "meter.unit");
            copy("sym", "meter.sym");
            copy("visible", "meter.visible");
        }
        "label" => {
            atts.insert("label".to_string(), text_content(child));
        }
        "labelAbbr" => {
            atts.insert("label.abbr".to_string(), text_content(child));
        }
        _ => {}
    }
}

fn barline(measure: Node, side: &str) -> Result<BarlineKind> {
    match measure.attribute(side) {
        Some(v) => BarlineKind::from_mei(v),
        None => Ok(BarlineKind::Single),
    }
}

/// `@staff` may list several staves ("1 2"); links attach to the first.
fn first_number(node: Node, name: &str) -> u32 {
    node.attribute(name)
        .and_then(|v| v.split_whitespace().next())
        .and_then(|v| v.parse().ok())
        .unwrap_or(1)
}

fn find_layer<'a, 'i>(measure: Node<'a, 'i>, staff_n: u32, layer_n: u32) -> Option<Node<'a, 'i>> {
    children_named(measure, "staff")
        .find(|s| attr_u32(*s, "n") == Some(staff_n))
        .and_then(|s| children_named(s, "layer").find(|l| number_or_one(*l, "n") == layer_n))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mei::parse_document;

    fn convert(xml: &str) -> Result<ScoreLayout> {
        let doc = parse_document(xml)?;
        Converter::new(&Options::default()).convert(&doc)
    }

    const HEAD: &str = r#"<score><scoreDef meter.count="4" meter.unit="4">
        <staffGrp><staffDef n="1" clef.shape="G" clef.line="2" key.sig="0"/></staffGrp>
      </scoreDef><section>"#;

    #[test]
    fn unknown_section_child_is_fatal() {
        let xml = format!("{HEAD}<foo/></section></score>");
        assert_eq!(
            convert(&xml).unwrap_err(),
            ConvertError::unsupported("foo", "section")
        );
    }

    #[test]
    fn staff_without_definition_is_fatal() {
        let xml = format!(
            r#"{HEAD}<measure><staff n="3"><layer><mRest/></layer></staff></measure></section></score>"#
        );
        assert_eq!(convert(&xml).unwrap_err().code(), "unresolved-reference");
    }

    #[test]
    fn deferred_end_is_keyed_by_target_measure() {
        let xml = format!(
            r#"{HEAD}
            <measure n="1"><staff n="1"><layer><note xml:id="a" pname="c" oct="4" dur="1"/></layer></staff>
              <slur tstamp="1" tstamp2="2m+1" staff="1"/></measure>
            </section></score>"#
        );
        let doc = parse_document(&xml).unwrap();
        let options = Options::default();
        let mut converter = Converter::new(&options);
        let root = doc.root_element();
        converter.process_score(root).unwrap();
        assert_eq!(converter.deferred.pending_at((3, 1, 1)).len(), 1);
        assert_eq!(converter.slurs.links()[0].first_id(), Some("a"));
    }

    #[test]
    fn section_break_overrides_system_break() {
        let xml = format!(
            r#"{HEAD}<measure><staff n="1"><layer><mRest/></layer></staff></measure><sb/></section>
            <section><measure><staff n="1"><layer><mRest/></layer></staff></measure></section></score>"#
        );
        let layout = convert(&xml).unwrap();
        let stave = layout.systems[1].measures[0].stave(1).unwrap();
        assert!(stave.show_clef && stave.show_keysig && stave.show_timesig);
    }
}
