//! Binary segmentation masks.

use serde::{Deserialize, Serialize};

use crate::error::{CanvasError, Result};
use crate::geometry::BBox;

/// Row-major binary mask with shape `[height, width]`; every cell is 0 or 1.
///
/// On the wire a mask is a list of rows. Rows may hold integers, floats or
/// booleans; any non-zero cell counts as foreground.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Vec<MaskCell>>", into = "Vec<Vec<u8>>")]
pub struct BinaryMask {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

/// One cell of a mask as it appears on the wire.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(untagged)]
pub enum MaskCell {
    Flag(bool),
    Value(f64),
}

impl MaskCell {
    fn is_set(self) -> bool {
        match self {
            MaskCell::Flag(b) => b,
            MaskCell::Value(v) => v != 0.0,
        }
    }
}

impl BinaryMask {
    /// Wrap flat row-major data. Non-zero cells are normalized to 1.
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        if data.len() != width as usize * height as usize {
            return Err(CanvasError::MaskLength {
                len: data.len(),
                height,
                width,
            });
        }
        let data = data.into_iter().map(|v| u8::from(v != 0)).collect();
        Ok(Self { width, height, data })
    }

    pub fn zeros(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0; width as usize * height as usize],
        }
    }

    /// Build from rows, rejecting ragged input.
    pub fn from_rows<R: AsRef<[u8]>>(rows: &[R]) -> Result<Self> {
        let height = rows.len();
        let width = rows.first().map_or(0, |r| r.as_ref().len());
        let mut data = Vec::with_capacity(width * height);
        for (row, r) in rows.iter().enumerate() {
            let r = r.as_ref();
            if r.len() != width {
                return Err(CanvasError::RaggedMask {
                    row,
                    len: r.len(),
                    expected: width,
                });
            }
            data.extend(r.iter().map(|&v| u8::from(v != 0)));
        }
        let width = if height == 0 { 0 } else { width };
        Ok(Self {
            width: width as u32,
            height: height as u32,
            data,
        })
    }

    pub fn to_rows(&self) -> Vec<Vec<u8>> {
        if self.width == 0 {
            return vec![Vec::new(); self.height as usize];
        }
        self.data
            .chunks(self.width as usize)
            .map(|row| row.to_vec())
            .collect()
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// `(height, width)`, matching the RLE size tag order.
    pub fn shape(&self) -> (u32, u32) {
        (self.height, self.width)
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub(crate) fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Out-of-bounds reads are background.
    pub fn get(&self, x: u32, y: u32) -> bool {
        if x >= self.width || y >= self.height {
            return false;
        }
        self.data[(y as usize) * (self.width as usize) + x as usize] != 0
    }

    /// Out-of-bounds writes are ignored.
    pub fn set(&mut self, x: u32, y: u32, value: bool) {
        if x >= self.width || y >= self.height {
            return;
        }
        self.data[(y as usize) * (self.width as usize) + x as usize] = u8::from(value);
    }

    /// Number of foreground pixels.
    pub fn area(&self) -> u64 {
        self.data.iter().filter(|&&v| v != 0).count() as u64
    }

    /// Tight bounding box of the foreground, exclusive on the far edges.
    pub fn bbox(&self) -> Option<BBox> {
        let w = self.width as usize;
        let mut bounds: Option<(usize, usize, usize, usize)> = None;
        for (i, _) in self.data.iter().enumerate().filter(|(_, v)| **v != 0) {
            let (x, y) = (i % w, i / w);
            bounds = Some(match bounds {
                None => (x, y, x, y),
                Some((x0, y0, x1, y1)) => (x0.min(x), y0.min(y), x1.max(x), y1.max(y)),
            });
        }
        bounds.map(|(x0, y0, x1, y1)| BBox {
            x1: x0 as f32,
            y1: y0 as f32,
            x2: (x1 + 1) as f32,
            y2: (y1 + 1) as f32,
        })
    }

    /// Error unless the mask is exactly `height x width`.
    pub fn expect_shape(&self, height: u32, width: u32) -> Result<()> {
        if self.shape() != (height, width) {
            return Err(CanvasError::MaskShape {
                height: self.height,
                width: self.width,
                expected_height: height,
                expected_width: width,
            });
        }
        Ok(())
    }
}

impl TryFrom<Vec<Vec<MaskCell>>> for BinaryMask {
    type Error = CanvasError;

    fn try_from(rows: Vec<Vec<MaskCell>>) -> Result<Self> {
        let rows: Vec<Vec<u8>> = rows
            .into_iter()
            .map(|r| r.into_iter().map(|c| u8::from(c.is_set())).collect())
            .collect();
        BinaryMask::from_rows(&rows)
    }
}

impl From<BinaryMask> for Vec<Vec<u8>> {
    fn from(mask: BinaryMask) -> Self {
        mask.to_rows()
    }
}
