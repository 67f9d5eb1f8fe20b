//! meiscore: MEI score layout engine.
//!
//! Converts an MEI document (the `<score>` inside `<mei>`, or a bare
//! `<score>`) into a renderer-agnostic [`ScoreLayout`]: staves grouped into
//! systems, voices of positioned notes, and ties, slurs, hairpins and text
//! resolved against the notes they point at. The layout can be drawn with
//! any [`Renderer`]; an SVG backend is included.
//!
//! # Example
//! ```no_run
//! use meiscore::{render_file_to_svg, Options};
//!
//! let svg = render_file_to_svg("path/to/score.mei", &Options::default()).unwrap();
//! println!("{} bytes of SVG", svg.len());
//! ```

pub mod config;
pub mod converter;
pub mod error;
pub mod hyphenation;
pub mod links;
pub mod measure;
pub mod mei;
pub mod model;
pub mod notes;
pub mod renderer;
pub mod staff_info;
pub mod system;
pub mod system_info;
pub mod tables;

mod constants;

use std::path::Path;

pub use config::{FontSpec, LabelMode, Options};
pub use converter::Converter;
pub use error::{ConvertError, Result};
pub use model::*;
pub use renderer::{draw_layout, CommandRecorder, DrawCommand, Glyph, Renderer, SvgRenderer};

/// Parse MEI text and lay it out.
pub fn convert_mei(xml: &str, options: &Options) -> Result<ScoreLayout> {
    let doc = mei::parse_document(xml)?;
    convert_document(&doc, options)
}

/// Lay out an already parsed MEI document.
pub fn convert_document(doc: &roxmltree::Document, options: &Options) -> Result<ScoreLayout> {
    options.validate()?;
    Converter::new(options).convert(doc)
}

/// Parse MEI text, lay it out and draw it as a standalone SVG document.
pub fn render_mei_to_svg(xml: &str, options: &Options) -> Result<String> {
    let layout = convert_mei(xml, options)?;
    Ok(render_layout_to_svg(&layout, options))
}

/// Draw an existing layout as SVG.
pub fn render_layout_to_svg(layout: &ScoreLayout, options: &Options) -> String {
    let mut svg = SvgRenderer::new(layout.page_width, layout.height);
    draw_layout(layout, options, &mut svg);
    svg.build()
}

/// Read an MEI file and render it to SVG.
pub fn render_file_to_svg<P: AsRef<Path>>(path: P, options: &Options) -> Result<String> {
    let path = path.as_ref();
    let xml = std::fs::read_to_string(path).map_err(|e| ConvertError::Io {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    render_mei_to_svg(&xml, options)
}

/// Serialize a layout to pretty-printed JSON.
pub fn layout_to_json(layout: &ScoreLayout) -> serde_json::Result<String> {
    serde_json::to_string_pretty(layout)
}
