mod drawing;
pub mod overlay_annotator;
