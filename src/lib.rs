//! Canvas compositing and mask-encoding core of a SAM annotation tool.
//!
//! The crate captures point, box and lasso prompts in original-image
//! coordinates, composites image, mask and prompt layers with independent
//! opacities under a shared zoom/pan, encodes masks as run-length data, and
//! supports brush editing of committed masks. [`AnnotationCanvas`] ties the
//! pieces together for one image session.

pub mod canvas;
pub mod color;
pub mod compositor;
pub mod config;
pub mod debounce;
pub mod edit;
pub mod error;
pub mod geometry;
pub mod input;
pub mod layers;
pub mod logging;
pub mod mask;
pub mod notify;
pub mod prediction;
pub mod raster;
pub mod rle;
pub mod sidecar;
pub mod transform;

pub use canvas::{AnnotationCanvas, Mode, PredictionAction};
pub use color::Color;
pub use config::CanvasConfig;
pub use error::{CanvasError, Result};
pub use geometry::{BBox, Point, Polygon};
pub use input::{InputSnapshot, Modifiers, PointPrompt, PointerButton, PredictRequest};
pub use layers::{Layer, LayerPatch, LayerRecord};
pub use mask::BinaryMask;
pub use notify::{LayerKind, Notification};
pub use prediction::{AutomaskResponse, PredictionCandidate, PredictionResponse};
pub use rle::Rle;
pub use transform::{ClientRect, ZoomPan};
