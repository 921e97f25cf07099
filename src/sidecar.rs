//! Files kept next to the image: committed layers, the pending predict
//! request, and the flattened export.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::Result;
use crate::input::PredictRequest;
use crate::layers::LayerRecord;
use crate::prediction::{AutomaskResponse, PredictionResponse};

fn with_suffix(image_path: &Path, suffix: &str) -> PathBuf {
    let ext = image_path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("");
    if ext.is_empty() {
        image_path.with_extension(suffix)
    } else {
        image_path.with_extension(format!("{ext}.{suffix}"))
    }
}

/// `photo.png` -> `photo.png.masks.json`
pub fn masks_path(image_path: &Path) -> PathBuf {
    with_suffix(image_path, "masks.json")
}

/// `photo.png` -> `photo.png.prompts.json`
pub fn prompts_path(image_path: &Path) -> PathBuf {
    with_suffix(image_path, "prompts.json")
}

/// `photo.png` -> `photo_masks.png`
pub fn export_path(image_path: &Path) -> PathBuf {
    let stem = image_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("out");
    image_path.with_file_name(format!("{stem}_masks.png"))
}

/// Layers saved next to `image_path`, or none when there is no sidecar yet.
pub fn load_layers(image_path: &Path) -> Result<Vec<LayerRecord>> {
    let path = masks_path(image_path);
    if !path.exists() {
        return Ok(Vec::new());
    }
    let data = std::fs::read_to_string(&path)?;
    let records: Vec<LayerRecord> = serde_json::from_str(&data)?;
    debug!(count = records.len(), "Loaded layers from {}", path.display());
    Ok(records)
}

pub fn save_layers(image_path: &Path, records: &[LayerRecord]) -> Result<PathBuf> {
    let path = masks_path(image_path);
    let data = serde_json::to_string_pretty(records)?;
    std::fs::write(&path, data)?;
    info!(count = records.len(), "Saved layers to {}", path.display());
    Ok(path)
}

/// Write the request body a prediction backend would receive.
pub fn write_predict_request(image_path: &Path, request: &PredictRequest) -> Result<PathBuf> {
    let path = prompts_path(image_path);
    std::fs::write(&path, serde_json::to_string_pretty(request)?)?;
    debug!("Wrote predict request to {}", path.display());
    Ok(path)
}

pub fn read_prediction(path: &Path) -> Result<PredictionResponse> {
    PredictionResponse::from_json(&std::fs::read_to_string(path)?)
}

pub fn read_automask(path: &Path) -> Result<AutomaskResponse> {
    AutomaskResponse::from_json(&std::fs::read_to_string(path)?)
}
