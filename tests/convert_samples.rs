//! Conversion tests: lay out the sample MEI files in tests/data.

use meiscore::{
    convert_mei, layout_to_json, ConnectorKind, CurveKind, LabelMode, Options, ScoreLayout,
    SegmentPart, TextKind, TickableKind,
};
use pretty_assertions::assert_eq;
use std::path::PathBuf;

fn data_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/data")
}

fn load(name: &str) -> String {
    std::fs::read_to_string(data_dir().join(name)).expect("Failed to read sample")
}

fn convert(name: &str, options: &Options) -> ScoreLayout {
    convert_mei(&load(name), options).expect("Failed to convert sample")
}

fn texts(layout: &ScoreLayout, kind: TextKind) -> Vec<String> {
    layout.texts_of(kind).map(|t| t.text.clone()).collect()
}

#[test]
fn tie_across_system_break_is_split() {
    let layout = convert("tie_across_break.mei", &Options::default());

    assert_eq!(layout.systems.len(), 2);
    assert_eq!(layout.measure_count(), 2);

    let parts: Vec<(usize, SegmentPart)> = layout.curves.iter().map(|c| (c.system, c.part)).collect();
    assert_eq!(parts, vec![(0, SegmentPart::Start), (1, SegmentPart::End)]);
    for curve in &layout.curves {
        assert_eq!(curve.kind, CurveKind::Tie);
        assert_eq!(curve.first_note.as_deref(), Some("n2"));
        assert_eq!(curve.last_note.as_deref(), Some("n3"));
    }

    // The first half runs to the end of its system, the second enters at
    // the start of the note area of the next one
    assert_eq!(layout.curves[0].end.x, 780.0);
    assert_eq!(layout.curves[1].start.x, 84.0);
    println!("✓ Tie split into {} segments", layout.curves.len());
}

#[test]
fn modifiers_follow_section_and_system_starts() {
    let layout = convert("tie_across_break.mei", &Options::default());

    let first = layout.systems[0].measures[0].stave(1).unwrap();
    assert!(first.show_clef);
    assert!(first.show_keysig);
    assert!(first.show_timesig);
    assert_eq!(first.key.fifths, 2);

    let second = layout.systems[1].measures[0].stave(1).unwrap();
    assert!(second.show_clef);
    assert!(second.show_keysig);
    assert!(!second.show_timesig, "time signature only shows at a section start");
}

#[test]
fn systems_stack_vertically() {
    let layout = convert("tie_across_break.mei", &Options::default());
    assert_eq!(layout.systems[0].staff_y(1), Some(60.0));
    // 60 + stave 40 + system spacing 90
    assert_eq!(layout.systems[1].staff_y(1), Some(190.0));
    assert_eq!(layout.height, 190.0 + 40.0 + 60.0);
}

#[test]
fn explicit_width_is_kept_and_rest_shared() {
    let layout = convert("grand_staff.mei", &Options::default());
    let system = &layout.systems[0];
    let widths: Vec<f64> = system.measures.iter().map(|m| m.width).collect();
    assert_eq!(widths, vec![300.0, 460.0]);
    assert_eq!(system.measures[0].x, 20.0);
    assert_eq!(system.measures[1].x, 320.0);
}

#[test]
fn grand_staff_structure() {
    let layout = convert("grand_staff.mei", &Options::default());
    assert_eq!(layout.systems.len(), 1);

    let system = &layout.systems[0];
    assert_eq!(system.staff_y(1), Some(60.0));
    assert_eq!(system.staff_y(2), Some(160.0));

    let kinds: Vec<ConnectorKind> = system.connectors.iter().map(|c| c.kind).collect();
    assert_eq!(kinds, vec![ConnectorKind::Single, ConnectorKind::Brace]);
    assert!(system.connectors[1].bar_thru);

    let m1 = &system.measures[0];
    assert_eq!(m1.voices.len(), 2);
    let upper = &m1.voices.voices[0];
    let ids: Vec<&str> = upper.tickables.iter().map(|t| t.id.as_str()).collect();
    assert_eq!(ids, vec!["m1n1", "m1n2", "m1n3", "m1n4", "m1n5", "m1c1"]);
    assert_eq!(upper.beams.len(), 1);
    assert_eq!(upper.beams[0].tickables, vec![0, 1]);
    assert_eq!(upper.tuplets.len(), 1);
    assert_eq!(upper.tuplets[0].tickables, vec![2, 3, 4]);
    assert!((upper.total_beats() - 4.0).abs() < 1e-9);

    let chord = &upper.tickables[5];
    assert_eq!(chord.kind, TickableKind::Chord);
    assert_eq!(chord.keys.len(), 3);
    assert!((chord.onset - 2.0).abs() < 1e-9);

    let m2 = &system.measures[1];
    assert_eq!(m2.voices.voices[1].tickables[0].kind, TickableKind::MeasureRest);
    println!("✓ Grand staff: {} measures, {} voices in m1", layout.measure_count(), m1.voices.len());
}

#[test]
fn links_resolve_to_their_events() {
    let layout = convert("grand_staff.mei", &Options::default());

    assert_eq!(layout.curves.len(), 1);
    let slur = &layout.curves[0];
    assert_eq!(slur.kind, CurveKind::Slur);
    assert_eq!(slur.part, SegmentPart::Whole);
    assert_eq!(slur.element_id.as_deref(), Some("s1"));
    assert_eq!(slur.last_note.as_deref(), Some("m1n5"));

    // tstamp 3 lands on the chord; the end "1m+1" is drained in measure 2
    assert_eq!(layout.hairpins.len(), 1);
    let hairpin = &layout.hairpins[0];
    assert_eq!(hairpin.part, SegmentPart::Whole);
    let m1 = &layout.systems[0].measures[0];
    let m2 = &layout.systems[0].measures[1];
    assert_eq!(hairpin.start_x, m1.voices.voices[0].tickables[5].x);
    assert_eq!(hairpin.end_x, m2.voices.voices[0].tickables[0].x);

    assert_eq!(texts(&layout, TextKind::Dynamic), vec!["p"]);
    assert_eq!(texts(&layout, TextKind::Tempo), vec!["Andante"]);
    assert_eq!(texts(&layout, TextKind::Directive), vec!["dolce"]);

    let dynamic = layout.texts_of(TextKind::Dynamic).next().unwrap();
    assert_eq!(dynamic.x, m1.voices.voices[0].tickables[0].x);
}

#[test]
fn lyrics_and_hyphens() {
    let layout = convert("grand_staff.mei", &Options::default());
    assert_eq!(texts(&layout, TextKind::Lyric), vec!["Hal", "le"]);
    assert_eq!(layout.hyphens.len(), 1);
    assert_eq!(layout.hyphens[0].system, 0);
}

#[test]
fn full_labels_reserve_a_left_margin() {
    let options = Options {
        label_mode: LabelMode::Full,
        ..Options::default()
    };
    let layout = convert("grand_staff.mei", &options);
    assert_eq!(texts(&layout, TextKind::StaffLabel), vec!["Piano"]);

    let system = &layout.systems[0];
    assert!(system.left_margin > 0.0);
    assert_eq!(system.measures[0].x, 20.0 + system.left_margin);
    // Explicit width untouched, remainder shrinks by the margin
    assert_eq!(system.measures[0].width, 300.0);
    assert_eq!(
        system.measures[1].width,
        (760.0 - system.left_margin - 300.0).floor()
    );
}

#[test]
fn abbreviated_labels_after_first_system() {
    let options = Options::from_json(r#"{ "label_mode": "full" }"#).unwrap();
    let layout = convert("tie_across_break.mei", &options);
    let labels: Vec<(usize, String)> = layout
        .texts_of(TextKind::StaffLabel)
        .map(|t| (t.system, t.text.clone()))
        .collect();
    assert_eq!(
        labels,
        vec![(0, "Violin".to_string()), (1, "Vln.".to_string())]
    );
}

#[test]
fn measure_numbers_on_later_systems() {
    let options = Options {
        auto_measure_numbers: true,
        ..Options::default()
    };
    let layout = convert("tie_across_break.mei", &options);
    let numbers: Vec<(usize, String)> = layout
        .texts_of(TextKind::MeasureNumber)
        .map(|t| (t.system, t.text.clone()))
        .collect();
    assert_eq!(numbers, vec![(1, "2".to_string())]);
}

#[test]
fn layout_serializes_to_json() {
    let layout = convert("tie_across_break.mei", &Options::default());
    let json = layout_to_json(&layout).unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["systems"].as_array().map(Vec::len), Some(2));
    assert_eq!(value["curves"][0]["part"], "start");
    assert_eq!(value["curves"][1]["part"], "end");
}
