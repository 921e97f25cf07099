//! Prediction and automask responses, and the candidates built from them.
//!
//! Responses are validated against one fixed schema at the boundary. Anything
//! that does not fit is an ingestion error and leaves the current candidates
//! alone.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::color::{distinct_colors, Color};
use crate::error::{CanvasError, Result};
use crate::mask::BinaryMask;

/// Reply to an interactive predict request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub masks_data: Vec<BinaryMask>,
    pub scores: Vec<f32>,
    #[serde(default)]
    pub num_boxes: Option<u32>,
    #[serde(default)]
    pub multimask_output: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutomaskEntry {
    pub segmentation: BinaryMask,
    #[serde(default)]
    pub area: Option<u64>,
    /// `[x, y, w, h]`
    #[serde(default)]
    pub bbox: Option<[f32; 4]>,
    #[serde(default)]
    pub predicted_iou: Option<f32>,
    #[serde(default)]
    pub stability_score: Option<f32>,
}

/// Reply to an automatic mask generation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutomaskResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub masks_data: Vec<AutomaskEntry>,
    #[serde(default)]
    pub count: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateSource {
    Interactive,
    Automask,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PredictionCandidate {
    pub segmentation: BinaryMask,
    pub score: f32,
    pub visible: bool,
    pub color: Color,
}

fn check_success(success: Option<bool>, error: &Option<String>) -> Result<()> {
    if success == Some(false) {
        let message = error.clone().unwrap_or_else(|| "backend reported failure".to_string());
        return Err(CanvasError::Ingest(message));
    }
    Ok(())
}

impl PredictionResponse {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| CanvasError::Ingest(e.to_string()))
    }

    /// More than one box means one mask per box, all of them shown.
    pub fn is_multi_box(&self) -> bool {
        self.num_boxes.is_some_and(|n| n > 1)
    }

    /// Build candidates sorted by descending score. Multi-box replies show
    /// every candidate; otherwise only the best one starts visible.
    pub fn into_candidates(self) -> Result<Vec<PredictionCandidate>> {
        check_success(self.success, &self.error)?;
        if self.masks_data.len() != self.scores.len() {
            return Err(CanvasError::Ingest(format!(
                "{} masks but {} scores",
                self.masks_data.len(),
                self.scores.len()
            )));
        }
        let multi_box = self.is_multi_box();
        let mut pairs: Vec<(BinaryMask, f32)> = self.masks_data.into_iter().zip(self.scores).collect();
        pairs.sort_by(|a, b| b.1.total_cmp(&a.1));
        let colors = distinct_colors(pairs.len());
        let candidates: Vec<PredictionCandidate> = pairs
            .into_iter()
            .zip(colors)
            .enumerate()
            .map(|(i, ((segmentation, score), color))| PredictionCandidate {
                segmentation,
                score,
                visible: multi_box || i == 0,
                color,
            })
            .collect();
        debug!(count = candidates.len(), multi_box, "prediction candidates built");
        Ok(candidates)
    }
}

impl AutomaskResponse {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| CanvasError::Ingest(e.to_string()))
    }

    /// Every automask candidate starts visible. The score is the predicted
    /// IoU when present.
    pub fn into_candidates(self) -> Result<Vec<PredictionCandidate>> {
        check_success(self.success, &self.error)?;
        if let Some(count) = self.count {
            if count != self.masks_data.len() {
                warn!(count, actual = self.masks_data.len(), "Automask count does not match masks");
            }
        }
        let colors = distinct_colors(self.masks_data.len());
        Ok(self
            .masks_data
            .into_iter()
            .zip(colors)
            .map(|(entry, color)| PredictionCandidate {
                score: entry.predicted_iou.unwrap_or(0.0),
                segmentation: entry.segmentation,
                visible: true,
                color,
            })
            .collect())
    }
}
