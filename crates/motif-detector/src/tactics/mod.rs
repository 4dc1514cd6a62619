/// Motif detectors over a capture and the plies leading up to it

pub mod attacks;
pub mod line_geometry;
pub mod pins;
