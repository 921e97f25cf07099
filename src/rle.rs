//! Run-length encoding of binary masks.
//!
//! Runs alternate strictly between background and foreground and always start
//! with a background run, which is zero-length when the first pixel is set.
//! `size` is `[height, width]`.
//!
//! Two scan orders are in use: the simple row-major form exchanged with the
//! annotation backend, and the column-major COCO form. COCO counts may also
//! arrive as the compressed ASCII string produced by pycocotools.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{CanvasError, Result};
use crate::geometry::BBox;
use crate::mask::BinaryMask;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rle {
    pub counts: Vec<u32>,
    pub size: [u32; 2],
}

/// COCO RLE whose counts are the compressed string form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompressedRle {
    pub counts: String,
    pub size: [u32; 2],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanOrder {
    RowMajor,
    ColumnMajor,
}

impl Rle {
    pub fn height(&self) -> u32 {
        self.size[0]
    }

    pub fn width(&self) -> u32 {
        self.size[1]
    }

    /// Pixels covered by all runs.
    pub fn total(&self) -> u64 {
        self.counts.iter().map(|&c| c as u64).sum()
    }

    /// True when the runs cover exactly `height * width` pixels.
    pub fn is_consistent(&self) -> bool {
        self.total() == self.height() as u64 * self.width() as u64
    }

    /// Foreground pixel count: the sum of the odd-indexed runs.
    pub fn area(&self) -> u64 {
        self.counts.iter().skip(1).step_by(2).map(|&c| c as u64).sum()
    }

    /// Bounding box of the foreground for a row-major RLE, computed from the
    /// runs without expanding the mask.
    pub fn bbox(&self) -> Option<BBox> {
        let w = self.width() as u64;
        if w == 0 {
            return None;
        }
        let mut bounds: Option<(u64, u64, u64, u64)> = None;
        let mut pos = 0u64;
        for (i, &c) in self.counts.iter().enumerate() {
            let c = c as u64;
            if i % 2 == 1 && c > 0 {
                let (start, end) = (pos, pos + c - 1);
                let (y0, y1) = (start / w, end / w);
                // A run spanning a row boundary touches both image edges.
                let (x0, x1) = if y0 == y1 {
                    (start % w, end % w)
                } else {
                    (0, w - 1)
                };
                bounds = Some(match bounds {
                    None => (x0, y0, x1, y1),
                    Some((a, b, c, d)) => (a.min(x0), b.min(y0), c.max(x1), d.max(y1)),
                });
            }
            pos += c;
        }
        bounds.map(|(x0, y0, x1, y1)| BBox {
            x1: x0 as f32,
            y1: y0 as f32,
            x2: (x1 + 1) as f32,
            y2: (y1 + 1) as f32,
        })
    }
}

/// Row-major encode.
pub fn encode(mask: &BinaryMask) -> Rle {
    encode_with(mask, ScanOrder::RowMajor)
}

/// Column-major (COCO) encode.
pub fn encode_coco(mask: &BinaryMask) -> Rle {
    encode_with(mask, ScanOrder::ColumnMajor)
}

pub fn encode_with(mask: &BinaryMask, order: ScanOrder) -> Rle {
    let (height, width) = mask.shape();
    let size = [height, width];
    if mask.is_empty() {
        return Rle {
            counts: Vec::new(),
            size,
        };
    }

    let mut counts = Vec::new();
    let mut last = 0u8;
    let mut run = 0u32;
    let mut push = |v: u8| {
        if v == last {
            run += 1;
        } else {
            counts.push(run);
            run = 1;
            last = v;
        }
    };
    let data = mask.data();
    match order {
        ScanOrder::RowMajor => data.iter().for_each(|&v| push(v)),
        ScanOrder::ColumnMajor => {
            let (h, w) = (height as usize, width as usize);
            for x in 0..w {
                for y in 0..h {
                    push(data[y * w + x]);
                }
            }
        }
    }
    counts.push(run);
    Rle { counts, size }
}

/// Row-major decode into a `height x width` mask.
///
/// A size tag that disagrees with the request is an error unless the runs
/// still cover exactly `height * width` pixels, in which case decoding
/// proceeds with a warning. Runs that over- or under-fill the mask are
/// truncated or zero-padded, also with a warning.
pub fn decode(rle: &Rle, height: u32, width: u32) -> Result<BinaryMask> {
    decode_with(rle, height, width, ScanOrder::RowMajor)
}

/// Column-major (COCO) decode; same contract as [`decode`].
pub fn decode_coco(rle: &Rle, height: u32, width: u32) -> Result<BinaryMask> {
    decode_with(rle, height, width, ScanOrder::ColumnMajor)
}

pub fn decode_with(rle: &Rle, height: u32, width: u32, order: ScanOrder) -> Result<BinaryMask> {
    let expected = height as u64 * width as u64;
    let total = rle.total();
    if rle.size != [height, width] {
        if total != expected {
            return Err(CanvasError::RleSize {
                rle_height: rle.height(),
                rle_width: rle.width(),
                height,
                width,
                total,
            });
        }
        warn!(
            "RLE size tag {:?} differs from requested {}x{}; run total matches, decoding anyway",
            rle.size, height, width
        );
    } else if total != expected {
        warn!(
            "RLE runs cover {} pixels but mask is {}x{} ({} pixels); {}",
            total,
            height,
            width,
            expected,
            if total > expected { "truncating" } else { "padding with background" }
        );
    }

    let n = expected as usize;
    let mut flat = vec![0u8; n];
    let mut idx = 0usize;
    let mut value = 0u8;
    for &c in &rle.counts {
        let end = (idx + c as usize).min(n);
        if value == 1 {
            flat[idx..end].fill(1);
        }
        idx = end;
        value ^= 1;
        if idx >= n {
            break;
        }
    }

    let data = match order {
        ScanOrder::RowMajor => flat,
        ScanOrder::ColumnMajor => {
            let (h, w) = (height as usize, width as usize);
            let mut row_major = vec![0u8; n];
            for x in 0..w {
                for y in 0..h {
                    row_major[y * w + x] = flat[x * h + y];
                }
            }
            row_major
        }
    };
    BinaryMask::new(width, height, data)
}

/// Compress counts to the pycocotools ASCII form.
pub fn counts_to_string(counts: &[u32]) -> String {
    let mut s = String::new();
    for (i, &count) in counts.iter().enumerate() {
        let mut x = count as i64;
        if i > 2 {
            x -= counts[i - 2] as i64;
        }
        loop {
            let mut c = (x & 0x1f) as u8;
            x >>= 5;
            let more = if c & 0x10 != 0 { x != -1 } else { x != 0 };
            if more {
                c |= 0x20;
            }
            s.push((c + 48) as char);
            if !more {
                break;
            }
        }
    }
    s
}

/// Expand the pycocotools ASCII form back to run counts.
pub fn counts_from_string(s: &str) -> Result<Vec<u32>> {
    let bytes = s.as_bytes();
    let mut counts: Vec<u32> = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        let mut x: i64 = 0;
        let mut shift = 0;
        loop {
            let Some(&b) = bytes.get(i) else {
                return Err(CanvasError::RleCounts(i));
            };
            if !(48..48 + 64).contains(&b) || shift > 55 {
                return Err(CanvasError::RleCounts(i));
            }
            let c = (b - 48) as i64;
            i += 1;
            x |= (c & 0x1f) << shift;
            shift += 5;
            if c & 0x20 == 0 {
                if c & 0x10 != 0 {
                    x |= -1i64 << shift;
                }
                break;
            }
        }
        let m = counts.len();
        if m > 2 {
            x += counts[m - 2] as i64;
        }
        let count = u32::try_from(x).map_err(|_| CanvasError::RleCounts(i))?;
        counts.push(count);
    }
    Ok(counts)
}

impl CompressedRle {
    pub fn from_rle(rle: &Rle) -> Self {
        Self {
            counts: counts_to_string(&rle.counts),
            size: rle.size,
        }
    }

    pub fn to_rle(&self) -> Result<Rle> {
        Ok(Rle {
            counts: counts_from_string(&self.counts)?,
            size: self.size,
        })
    }
}
