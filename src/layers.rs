//! Committed mask layers and their transport form.

use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::color::{distinct_colors, Color};
use crate::error::Result;
use crate::mask::BinaryMask;
use crate::rle::{self, CompressedRle, Rle};

pub const STATUS_EDITED: &str = "edited";
pub const STATUS_PREDICTION: &str = "prediction";

/// A committed mask. The canvas renders it but never decides when it lives
/// or dies.
#[derive(Debug, Clone, PartialEq)]
pub struct Layer {
    pub layer_id: String,
    pub name: String,
    pub class_labels: Vec<String>,
    pub status: String,
    pub visible: bool,
    pub display_color: Color,
    pub mask_data: Option<BinaryMask>,
}

/// Mask data as it may arrive from the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MaskPayload {
    /// Row-major RLE with integer counts.
    Rle(Rle),
    /// COCO RLE with a compressed counts string (column-major).
    Compressed(CompressedRle),
    Rows(BinaryMask),
}

impl MaskPayload {
    pub fn decode(&self, height: u32, width: u32) -> Result<BinaryMask> {
        match self {
            MaskPayload::Rle(r) => rle::decode(r, height, width),
            MaskPayload::Compressed(c) => rle::decode_coco(&c.to_rle()?, height, width),
            MaskPayload::Rows(mask) => {
                mask.expect_shape(height, width)?;
                Ok(mask.clone())
            }
        }
    }
}

fn default_visible() -> bool {
    true
}

fn default_status() -> String {
    STATUS_PREDICTION.to_string()
}

/// Wire form of a layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerRecord {
    pub layer_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub class_labels: Vec<String>,
    #[serde(default = "default_status")]
    pub status: String,
    #[serde(default = "default_visible")]
    pub visible: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_color: Option<Color>,
    #[serde(default)]
    pub mask_data: Option<MaskPayload>,
}

pub fn new_layer_id() -> String {
    format!("layer_{}", Uuid::new_v4().simple())
}

impl Layer {
    /// Empty layer with no mask data yet.
    pub fn empty(name: impl Into<String>, display_color: Color) -> Self {
        Self {
            layer_id: new_layer_id(),
            name: name.into(),
            class_labels: Vec::new(),
            status: STATUS_EDITED.to_string(),
            visible: true,
            display_color,
            mask_data: None,
        }
    }

    /// Decode a record against the image size. A mask that does not decode
    /// leaves the layer without data so one bad record cannot sink the rest.
    pub fn from_record(record: LayerRecord, fallback_color: Color, height: u32, width: u32) -> Self {
        let mask_data = record.mask_data.as_ref().and_then(|payload| {
            payload
                .decode(height, width)
                .map_err(|e| warn!(layer = %record.layer_id, "Dropping mask data: {}", e))
                .ok()
        });
        Self {
            layer_id: record.layer_id,
            name: record.name,
            class_labels: record.class_labels,
            status: record.status,
            visible: record.visible,
            display_color: record.display_color.unwrap_or(fallback_color),
            mask_data,
        }
    }

    /// Record with the mask as row-major RLE.
    pub fn to_record(&self) -> LayerRecord {
        LayerRecord {
            layer_id: self.layer_id.clone(),
            name: self.name.clone(),
            class_labels: self.class_labels.clone(),
            status: self.status.clone(),
            visible: self.visible,
            display_color: Some(self.display_color),
            mask_data: self.mask_data.as_ref().map(|m| MaskPayload::Rle(rle::encode(m))),
        }
    }

    pub fn area(&self) -> u64 {
        self.mask_data.as_ref().map_or(0, BinaryMask::area)
    }
}

/// Decode a batch of records, assigning palette colors where none is given.
pub fn layers_from_records(records: Vec<LayerRecord>, height: u32, width: u32) -> Vec<Layer> {
    let colors = distinct_colors(records.len());
    records
        .into_iter()
        .zip(colors)
        .map(|(record, color)| Layer::from_record(record, color, height, width))
        .collect()
}

/// Metadata edit; `None` fields are left alone.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LayerPatch {
    pub name: Option<String>,
    pub class_labels: Option<Vec<String>>,
    pub status: Option<String>,
    pub visible: Option<bool>,
    pub display_color: Option<Color>,
}

impl LayerPatch {
    pub fn apply(self, layer: &mut Layer) {
        if let Some(name) = self.name {
            layer.name = name;
        }
        if let Some(labels) = self.class_labels {
            layer.class_labels = labels;
        }
        if let Some(status) = self.status {
            layer.status = status;
        }
        if let Some(visible) = self.visible {
            layer.visible = visible;
        }
        if let Some(color) = self.display_color {
            layer.display_color = color;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_with_row_major_rle() {
        let json = r##"{
            "layerId": "l1",
            "name": "cat",
            "classLabels": ["animal"],
            "maskData": {"counts": [0, 2, 2], "size": [2, 2]},
            "displayColor": "#00ff00"
        }"##;
        let record: LayerRecord = serde_json::from_str(json).unwrap();
        assert!(record.visible);
        assert_eq!(record.status, "prediction");
        let layer = Layer::from_record(record, Color::default(), 2, 2);
        assert_eq!(layer.mask_data.unwrap().to_rows(), vec![vec![1, 1], vec![0, 0]]);
        assert_eq!(layer.display_color, Color::rgb(0, 255, 0));
    }

    #[test]
    fn test_record_with_rows_and_compressed() {
        let rows: LayerRecord =
            serde_json::from_str(r#"{"layerId": "a", "maskData": [[0, 1], [1, 0]]}"#).unwrap();
        assert!(matches!(rows.mask_data, Some(MaskPayload::Rows(_))));

        let coco = CompressedRle::from_rle(&Rle {
            counts: vec![0, 2, 2],
            size: [2, 2],
        });
        let json = serde_json::json!({"layerId": "b", "maskData": coco});
        let record: LayerRecord = serde_json::from_value(json).unwrap();
        let layer = Layer::from_record(record, Color::default(), 2, 2);
        // Column-major: the first column is set.
        assert_eq!(layer.mask_data.unwrap().to_rows(), vec![vec![1, 0], vec![1, 0]]);
    }

    #[test]
    fn test_bad_mask_is_dropped_not_fatal() {
        let record: LayerRecord =
            serde_json::from_str(r#"{"layerId": "a", "maskData": {"counts": [3], "size": [5, 5]}}"#).unwrap();
        let layer = Layer::from_record(record, Color::default(), 2, 2);
        assert!(layer.mask_data.is_none());
        assert_eq!(layer.layer_id, "a");
    }

    #[test]
    fn test_to_record_encodes_rle() {
        let mut layer = Layer::empty("x", Color::default());
        layer.mask_data = Some(BinaryMask::from_rows(&[[0u8, 1], [1, 1]]).unwrap());
        let record = layer.to_record();
        assert_eq!(
            record.mask_data,
            Some(MaskPayload::Rle(Rle {
                counts: vec![1, 3],
                size: [2, 2]
            }))
        );
        assert!(record.layer_id.starts_with("layer_"));
    }

    #[test]
    fn test_fallback_palette() {
        let records = vec![
            LayerRecord {
                layer_id: "a".into(),
                name: String::new(),
                class_labels: vec![],
                status: default_status(),
                visible: true,
                display_color: None,
                mask_data: None,
            };
            2
        ];
        let layers = layers_from_records(records, 4, 4);
        assert_ne!(layers[0].display_color, layers[1].display_color);
    }

    #[test]
    fn test_patch() {
        let mut layer = Layer::empty("old", Color::default());
        let patch: LayerPatch = serde_json::from_str(r#"{"name": "new", "visible": false}"#).unwrap();
        patch.apply(&mut layer);
        assert_eq!(layer.name, "new");
        assert!(!layer.visible);
        assert_eq!(layer.status, STATUS_EDITED);
    }
}
