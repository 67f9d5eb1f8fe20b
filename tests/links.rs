//! Link tests: ties, slurs, hairpins and pointer texts on small inline
//! MEI snippets.

use meiscore::{convert_mei, ConvertError, CurveKind, Options, Place, ScoreLayout, SegmentPart};
use pretty_assertions::assert_eq;

const HEAD: &str = r#"<mei xmlns="http://www.music-encoding.org/ns/mei"><music><body><mdiv><score>
  <scoreDef meter.count="4" meter.unit="4" key.sig="0">
    <staffGrp><staffDef n="1" clef.shape="G" clef.line="2"/></staffGrp>
  </scoreDef>
  <section>"#;

const TAIL: &str = "</section></score></mdiv></body></music></mei>";

fn score(measures: &str) -> String {
    format!("{HEAD}{measures}{TAIL}")
}

fn convert(measures: &str) -> Result<ScoreLayout, ConvertError> {
    convert_mei(&score(measures), &Options::default())
}

fn curve_ends(layout: &ScoreLayout) -> Vec<(Option<&str>, Option<&str>)> {
    layout
        .curves
        .iter()
        .map(|c| (c.first_note.as_deref(), c.last_note.as_deref()))
        .collect()
}

#[test]
fn chord_ties_pair_by_pitch() {
    let layout = convert(
        r#"<measure n="1"><staff n="1"><layer n="1">
             <chord dur="2">
               <note xml:id="c4a" pname="c" oct="4" tie="i"/>
               <note xml:id="e4a" pname="e" oct="4" tie="i"/>
             </chord>
             <chord dur="2">
               <note xml:id="e4b" pname="e" oct="4" tie="t"/>
               <note xml:id="c4b" pname="c" oct="4" tie="t"/>
             </chord>
           </layer></staff></measure>"#,
    )
    .unwrap();

    assert_eq!(
        curve_ends(&layout),
        vec![(Some("c4a"), Some("c4b")), (Some("e4a"), Some("e4b"))]
    );
    assert!(layout.curves.iter().all(|c| c.kind == CurveKind::Tie));
}

#[test]
fn nested_slur_attributes() {
    let layout = convert(
        r#"<measure n="1"><staff n="1"><layer n="1">
             <note xml:id="a" pname="g" oct="4" dur="4" slur="i1"/>
             <note xml:id="b" pname="a" oct="4" dur="4" slur="i2"/>
             <note xml:id="c" pname="b" oct="4" dur="4" slur="t2"/>
             <note xml:id="d" pname="c" oct="5" dur="4" slur="t1"/>
           </layer></staff></measure>"#,
    )
    .unwrap();

    assert_eq!(
        curve_ends(&layout),
        vec![(Some("a"), Some("d")), (Some("b"), Some("c"))]
    );
}

#[test]
fn unmatched_tie_end_is_drawn_from_the_system_edge() {
    let layout = convert(
        r#"<measure n="1"><staff n="1"><layer n="1">
             <note xml:id="x" pname="c" oct="4" dur="1" tie="t"/>
           </layer></staff></measure>"#,
    )
    .unwrap();

    assert_eq!(layout.curves.len(), 1);
    let curve = &layout.curves[0];
    assert_eq!(curve.part, SegmentPart::End);
    assert_eq!(curve.first_note, None);
    assert_eq!(curve.last_note.as_deref(), Some("x"));
    assert_eq!(curve.start.x, layout.systems[0].content_start_x());
}

#[test]
fn startid_wins_over_tstamp() {
    let layout = convert(
        r##"<measure n="1"><staff n="1"><layer n="1">
             <note xml:id="a" pname="c" oct="5" dur="4"/>
             <note xml:id="b" pname="d" oct="5" dur="4"/>
             <note xml:id="c" pname="e" oct="5" dur="2"/>
           </layer></staff>
           <slur staff="1" startid="#b" tstamp="1" endid="#c"/></measure>"##,
    )
    .unwrap();

    assert_eq!(curve_ends(&layout), vec![(Some("b"), Some("c"))]);
}

#[test]
fn timestamps_resolve_within_the_measure() {
    let layout = convert(
        r#"<measure n="1"><staff n="1"><layer n="1">
             <note xml:id="a" pname="c" oct="5" dur="4"/>
             <note xml:id="b" pname="d" oct="5" dur="4"/>
             <note xml:id="c" pname="e" oct="5" dur="2"/>
           </layer></staff>
           <slur staff="1" tstamp="2" tstamp2="3.4" curvedir="below"/></measure>"#,
    )
    .unwrap();

    assert_eq!(curve_ends(&layout), vec![(Some("b"), Some("c"))]);
    assert_eq!(layout.curves[0].direction, Place::Below);
}

#[test]
fn timestamps_count_dots_on_chord_notes() {
    let layout = convert(
        r#"<measure n="1"><staff n="1"><layer n="1">
             <chord xml:id="ch">
               <note pname="c" oct="5" dur="4" dots="1"/>
               <note pname="e" oct="5" dur="4" dots="1"/>
             </chord>
             <note xml:id="b" pname="d" oct="5" dur="8"/>
             <note xml:id="c" pname="e" oct="5" dur="2"/>
           </layer></staff>
           <slur staff="1" tstamp="2.5" tstamp2="3"/></measure>"#,
    )
    .unwrap();

    assert_eq!(curve_ends(&layout), vec![(Some("b"), Some("c"))]);
    let tickables = &layout.systems[0].measures[0].voices.voices[0].tickables;
    assert_eq!(tickables[0].dots, 1);
    assert_eq!(tickables[1].onset, 1.5);
    assert_eq!(tickables[2].onset, 2.0);
}

#[test]
fn timestamps_count_dot_elements() {
    let layout = convert(
        r#"<measure n="1"><staff n="1"><layer n="1">
             <note xml:id="a" pname="c" oct="5" dur="4"><dot/></note>
             <note xml:id="b" pname="d" oct="5" dur="8"/>
             <note xml:id="c" pname="e" oct="5" dur="2"/>
           </layer></staff>
           <slur staff="1" tstamp="2.5" tstamp2="3"/></measure>"#,
    )
    .unwrap();

    assert_eq!(curve_ends(&layout), vec![(Some("b"), Some("c"))]);
    let tickables = &layout.systems[0].measures[0].voices.voices[0].tickables;
    assert_eq!(tickables[1].onset, 1.5);
}

#[test]
fn cross_staff_tie_closes_on_the_drawn_staff() {
    let doc = r#"<mei xmlns="http://www.music-encoding.org/ns/mei"><music><body><mdiv><score>
      <scoreDef meter.count="4" meter.unit="4" key.sig="0">
        <staffGrp>
          <staffDef n="1" clef.shape="G" clef.line="2"/>
          <staffDef n="2" clef.shape="F" clef.line="4"/>
        </staffGrp>
      </scoreDef>
      <section>
        <measure n="1">
          <staff n="1"><layer n="1">
            <note xml:id="a" pname="c" oct="4" dur="1" staff="2" tie="i"/>
          </layer></staff>
          <staff n="2"><layer n="1"><mRest/></layer></staff>
        </measure>
        <measure n="2">
          <staff n="1"><layer n="1"><mRest/></layer></staff>
          <staff n="2"><layer n="1">
            <note xml:id="b" pname="c" oct="4" dur="1" tie="t"/>
          </layer></staff>
        </measure>
      </section></score></mdiv></body></music></mei>"#;
    let layout = convert_mei(doc, &Options::default()).unwrap();

    assert_eq!(curve_ends(&layout), vec![(Some("a"), Some("b"))]);
    assert_eq!(layout.curves[0].kind, CurveKind::Tie);
    assert_eq!(layout.curves[0].part, SegmentPart::Whole);
}

#[test]
fn end_two_measures_ahead_waits_for_its_measure() {
    let layout = convert(
        r##"<measure n="1"><staff n="1"><layer n="1">
             <note xml:id="m1" pname="c" oct="5" dur="1"/>
           </layer></staff>
           <slur xml:id="long" staff="1" startid="#m1" tstamp2="2m+3"/></measure>
           <measure n="2"><staff n="1"><layer n="1">
             <note xml:id="m2" pname="d" oct="5" dur="1"/>
           </layer></staff></measure>
           <measure n="3"><staff n="1"><layer n="1">
             <note xml:id="m3a" pname="e" oct="5" dur="2"/>
             <note xml:id="m3b" pname="f" oct="5" dur="2"/>
           </layer></staff></measure>"##,
    )
    .unwrap();

    assert_eq!(curve_ends(&layout), vec![(Some("m1"), Some("m3b"))]);
    assert_eq!(layout.curves[0].element_id.as_deref(), Some("long"));
}

#[test]
fn hairpin_split_across_systems() {
    let layout = convert(
        r##"<measure n="1"><staff n="1"><layer n="1">
             <note xml:id="a" pname="c" oct="5" dur="1"/>
           </layer></staff>
           <hairpin form="dim" staff="1" startid="#a" tstamp2="1m+1"/></measure>
           <sb/>
           <measure n="2"><staff n="1"><layer n="1">
             <note xml:id="b" pname="d" oct="5" dur="1"/>
           </layer></staff></measure>"##,
    )
    .unwrap();

    let parts: Vec<(usize, SegmentPart)> = layout.hairpins.iter().map(|h| (h.system, h.part)).collect();
    assert_eq!(parts, vec![(0, SegmentPart::Start), (1, SegmentPart::End)]);
    assert_eq!(layout.hairpins[0].end_x, layout.systems[0].content_end_x());
    assert_eq!(layout.hairpins[1].start_x, layout.systems[1].content_start_x());
}

#[test]
fn directive_to_missing_note_fails() {
    let err = convert(
        r##"<measure n="1"><staff n="1"><layer n="1">
             <note xml:id="a" pname="c" oct="5" dur="1"/>
           </layer></staff>
           <dir xml:id="d1" staff="1" startid="#nowhere">cresc. poco a poco</dir></measure>"##,
    )
    .unwrap_err();

    assert_eq!(
        err,
        ConvertError::UnresolvedReference {
            element: "d1".to_string(),
            reference: "nowhere".to_string(),
        }
    );
}

#[test]
fn hairpin_needs_a_form() {
    let err = convert(
        r##"<measure n="1"><staff n="1"><layer n="1">
             <note xml:id="a" pname="c" oct="5" dur="1"/>
           </layer></staff>
           <hairpin staff="1" startid="#a" endid="#a"/></measure>"##,
    )
    .unwrap_err();
    assert_eq!(err.code(), "missing-attribute");
}
