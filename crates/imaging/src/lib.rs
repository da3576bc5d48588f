//! Headshot cropping and resizing to fit template image frames.
//!
//! Photos come from hand-made CVs in any size and aspect ratio. The template
//! frames are fixed, so every photo is center-cropped to the frame's aspect
//! ratio and resized to its pixel size before insertion.

pub mod fit;

pub use fit::ImageFitter;
