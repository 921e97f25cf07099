//! Brush editing of a single layer's mask, with undo/redo.
//!
//! Each brush stamp records the sub-rectangle it touched (before and after).
//! Stamps made between `begin_stroke` and `end_stroke` undo as one step.

use tracing::{debug, info};

use crate::color::Color;
use crate::error::{CanvasError, Result};
use crate::geometry::Point;
use crate::layers::MaskPayload;
use crate::mask::BinaryMask;

/// Snapshot of the cells one stamp touched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditPatch {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub before: Vec<u8>,
    pub after: Vec<u8>,
}

impl EditPatch {
    fn write(&self, mask: &mut BinaryMask, cells: &[u8]) {
        let stride = mask.width() as usize;
        let data = mask.data_mut();
        for row in 0..self.height as usize {
            let start = (self.y as usize + row) * stride + self.x as usize;
            let src = row * self.width as usize;
            data[start..start + self.width as usize].copy_from_slice(&cells[src..src + self.width as usize]);
        }
    }
}

fn read_rect(mask: &BinaryMask, x: u32, y: u32, width: u32, height: u32) -> Vec<u8> {
    let stride = mask.width() as usize;
    let data = mask.data();
    let mut cells = Vec::with_capacity(width as usize * height as usize);
    for row in 0..height as usize {
        let start = (y as usize + row) * stride + x as usize;
        cells.extend_from_slice(&data[start..start + width as usize]);
    }
    cells
}

#[derive(Debug)]
struct EditSession {
    layer_id: String,
    color: Color,
    buffer: BinaryMask,
    undo: Vec<Vec<EditPatch>>,
    redo: Vec<Vec<EditPatch>>,
    stroke: Option<Vec<EditPatch>>,
}

impl EditSession {
    fn record(&mut self, patch: EditPatch) {
        self.redo.clear();
        match &mut self.stroke {
            Some(group) => group.push(patch),
            None => self.undo.push(vec![patch]),
        }
    }

    /// Set every cell with `dx² + dy² <= radius²` around the rounded center.
    /// Only the part of the disc inside the mask is visited.
    fn stamp(&mut self, x: f32, y: f32, radius: f32, add: bool) -> usize {
        let (cx, cy) = (x.round() as i64, y.round() as i64);
        let (w, h) = (self.buffer.width() as i64, self.buffer.height() as i64);
        let r = f64::from(radius.max(0.0));
        let reach = r.ceil() as i64;
        let (x0, y0) = (cx.saturating_sub(reach).max(0), cy.saturating_sub(reach).max(0));
        let (x1, y1) = (cx.saturating_add(reach).min(w - 1), cy.saturating_add(reach).min(h - 1));
        if x0 > x1 || y0 > y1 {
            return 0;
        }
        let (rx, ry) = (x0 as u32, y0 as u32);
        let (rw, rh) = ((x1 - x0 + 1) as u32, (y1 - y0 + 1) as u32);
        let before = read_rect(&self.buffer, rx, ry, rw, rh);

        let r2 = r * r;
        let mut changed = 0;
        for ny in y0..=y1 {
            let dy = ny as f64 - cy as f64;
            for nx in x0..=x1 {
                let dx = nx as f64 - cx as f64;
                if dx * dx + dy * dy > r2 {
                    continue;
                }
                if self.buffer.get(nx as u32, ny as u32) != add {
                    self.buffer.set(nx as u32, ny as u32, add);
                    changed += 1;
                }
            }
        }
        if changed > 0 {
            let after = read_rect(&self.buffer, rx, ry, rw, rh);
            self.record(EditPatch {
                x: rx,
                y: ry,
                width: rw,
                height: rh,
                before,
                after,
            });
        }
        changed
    }
}

/// Holds the one mask being edited, if any.
#[derive(Debug, Default)]
pub struct MaskEditor {
    session: Option<EditSession>,
}

impl MaskEditor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start editing a copy of `mask`. Fails if another edit is running.
    pub fn start(&mut self, layer_id: &str, mask: &BinaryMask, color: Color) -> Result<()> {
        if let Some(session) = &self.session {
            return Err(CanvasError::EditInProgress(session.layer_id.clone()));
        }
        info!(layer = layer_id, "Mask edit started");
        self.session = Some(EditSession {
            layer_id: layer_id.to_string(),
            color,
            buffer: mask.clone(),
            undo: Vec::new(),
            redo: Vec::new(),
            stroke: None,
        });
        Ok(())
    }

    /// Start editing from encoded mask data, decoded at `height x width`.
    pub fn start_encoded(
        &mut self,
        layer_id: &str,
        payload: &MaskPayload,
        height: u32,
        width: u32,
        color: Color,
    ) -> Result<()> {
        if let Some(session) = &self.session {
            return Err(CanvasError::EditInProgress(session.layer_id.clone()));
        }
        let mask = payload.decode(height, width)?;
        self.start(layer_id, &mask, color)
    }

    pub fn is_editing(&self) -> bool {
        self.session.is_some()
    }

    pub fn editing_layer(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.layer_id.as_str())
    }

    pub fn color(&self) -> Option<Color> {
        self.session.as_ref().map(|s| s.color)
    }

    /// The live buffer, for rendering.
    pub fn buffer(&self) -> Option<&BinaryMask> {
        self.session.as_ref().map(|s| &s.buffer)
    }

    /// A copy of the current edit state.
    pub fn edited_mask(&self) -> Option<BinaryMask> {
        self.buffer().cloned()
    }

    fn session_mut(&mut self) -> Result<&mut EditSession> {
        self.session.as_mut().ok_or(CanvasError::NoEditSession)
    }

    /// Set (`add`) or clear every cell within `radius` of `(round(x), round(y))`.
    /// Returns the number of cells that changed.
    pub fn apply_brush(&mut self, x: f32, y: f32, radius: f32, add: bool) -> Result<usize> {
        Ok(self.session_mut()?.stamp(x, y, radius, add))
    }

    /// Stamp along the segment `from -> to` at half-radius spacing. Undoes as
    /// one step unless a stroke is already open.
    pub fn apply_stroke(&mut self, from: Point, to: Point, radius: f32, add: bool) -> Result<usize> {
        let session = self.session_mut()?;
        let grouped_here = session.stroke.is_none();
        if grouped_here {
            session.stroke = Some(Vec::new());
        }
        let spacing = (radius / 2.0).max(0.5);
        let steps = (from.distance_to(&to) / spacing).ceil().max(1.0) as usize;
        let mut changed = 0;
        for i in 0..=steps {
            let t = i as f32 / steps as f32;
            let x = from.x + (to.x - from.x) * t;
            let y = from.y + (to.y - from.y) * t;
            changed += session.stamp(x, y, radius, add);
        }
        if grouped_here {
            Self::close_stroke(session);
        }
        Ok(changed)
    }

    /// Group the following stamps into one undo step.
    pub fn begin_stroke(&mut self) -> Result<()> {
        let session = self.session_mut()?;
        if session.stroke.is_none() {
            session.stroke = Some(Vec::new());
        }
        Ok(())
    }

    pub fn end_stroke(&mut self) -> Result<()> {
        Self::close_stroke(self.session_mut()?);
        Ok(())
    }

    fn close_stroke(session: &mut EditSession) {
        if let Some(group) = session.stroke.take() {
            if !group.is_empty() {
                session.undo.push(group);
            }
        }
    }

    pub fn can_undo(&self) -> bool {
        self.session
            .as_ref()
            .is_some_and(|s| !s.undo.is_empty() || s.stroke.as_ref().is_some_and(|g| !g.is_empty()))
    }

    pub fn can_redo(&self) -> bool {
        self.session.as_ref().is_some_and(|s| !s.redo.is_empty())
    }

    pub fn undo(&mut self) -> Result<bool> {
        let session = self.session_mut()?;
        Self::close_stroke(session);
        let Some(group) = session.undo.pop() else {
            return Ok(false);
        };
        for patch in group.iter().rev() {
            patch.write(&mut session.buffer, &patch.before);
        }
        session.redo.push(group);
        debug!("Mask edit undone");
        Ok(true)
    }

    pub fn redo(&mut self) -> Result<bool> {
        let session = self.session_mut()?;
        let Some(group) = session.redo.pop() else {
            return Ok(false);
        };
        for patch in &group {
            patch.write(&mut session.buffer, &patch.after);
        }
        session.undo.push(group);
        debug!("Mask edit redone");
        Ok(true)
    }

    /// Drop the buffer and history. Returns the layer that was being edited.
    pub fn finish(&mut self) -> Option<String> {
        let session = self.session.take()?;
        info!(layer = %session.layer_id, "Mask edit finished");
        Some(session.layer_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn editor(w: u32, h: u32) -> MaskEditor {
        let mut e = MaskEditor::new();
        e.start("l1", &BinaryMask::zeros(w, h), Color::default()).unwrap();
        e
    }

    #[test]
    fn test_brush_disc() {
        let mut e = editor(11, 11);
        let changed = e.apply_brush(5.2, 4.8, 2.0, true).unwrap();
        // Lattice points with dx² + dy² <= 4.
        assert_eq!(changed, 13);
        let m = e.edited_mask().unwrap();
        assert!(m.get(5, 5) && m.get(7, 5) && m.get(5, 3));
        assert!(!m.get(7, 7));
    }

    #[test]
    fn test_brush_clipped_at_edges() {
        let mut e = editor(4, 4);
        assert_eq!(e.apply_brush(0.0, 0.0, 1.0, true).unwrap(), 3);
        assert_eq!(e.apply_brush(-10.0, -10.0, 2.0, true).unwrap(), 0);
    }

    #[test]
    fn test_huge_radius_stays_inside_mask() {
        let mut e = editor(4, 4);
        assert_eq!(e.apply_brush(1.0, 1.0, 4000.0, true).unwrap(), 16);
        assert_eq!(e.apply_brush(1.0, 1.0, f32::MAX, false).unwrap(), 16);
        assert_eq!(e.buffer().unwrap().area(), 0);
        assert_eq!(e.apply_brush(-1.0e9, 2.0, 10.0, true).unwrap(), 0);
    }

    #[test]
    fn test_erase() {
        let mut e = MaskEditor::new();
        let full = BinaryMask::new(3, 3, vec![1; 9]).unwrap();
        e.start("l1", &full, Color::default()).unwrap();
        e.apply_brush(1.0, 1.0, 1.0, false).unwrap();
        assert_eq!(e.buffer().unwrap().area(), 4);
    }

    #[test]
    fn test_second_start_rejected() {
        let mut e = editor(2, 2);
        assert!(matches!(
            e.start("l2", &BinaryMask::zeros(2, 2), Color::default()),
            Err(CanvasError::EditInProgress(id)) if id == "l1"
        ));
        assert_eq!(e.editing_layer(), Some("l1"));
    }

    #[test]
    fn test_edited_mask_is_a_copy() {
        let mut e = editor(3, 3);
        let copy = e.edited_mask().unwrap();
        e.apply_brush(1.0, 1.0, 0.0, true).unwrap();
        assert_eq!(copy.area(), 0);
        assert_eq!(e.buffer().unwrap().area(), 1);
    }

    #[test]
    fn test_undo_redo_stroke() {
        let mut e = editor(20, 5);
        e.apply_stroke(Point::new(2.0, 2.0), Point::new(17.0, 2.0), 1.0, true).unwrap();
        let painted = e.edited_mask().unwrap();
        assert!(painted.area() > 15);

        assert!(e.undo().unwrap());
        assert_eq!(e.buffer().unwrap().area(), 0);
        assert!(!e.undo().unwrap());

        assert!(e.redo().unwrap());
        assert_eq!(e.edited_mask().unwrap(), painted);
    }

    #[test]
    fn test_new_stamp_clears_redo() {
        let mut e = editor(5, 5);
        e.apply_brush(1.0, 1.0, 0.0, true).unwrap();
        e.undo().unwrap();
        assert!(e.can_redo());
        e.apply_brush(3.0, 3.0, 0.0, true).unwrap();
        assert!(!e.can_redo());
    }

    #[test]
    fn test_begin_end_stroke_groups_stamps() {
        let mut e = editor(5, 5);
        e.begin_stroke().unwrap();
        e.apply_brush(1.0, 1.0, 0.0, true).unwrap();
        e.apply_brush(3.0, 3.0, 0.0, true).unwrap();
        e.end_stroke().unwrap();
        e.undo().unwrap();
        assert_eq!(e.buffer().unwrap().area(), 0);
    }

    #[test]
    fn test_finish_discards_buffer() {
        let mut e = editor(2, 2);
        assert_eq!(e.finish(), Some("l1".to_string()));
        assert!(e.buffer().is_none());
        assert!(matches!(e.apply_brush(0.0, 0.0, 1.0, true), Err(CanvasError::NoEditSession)));
        assert_eq!(e.finish(), None);
    }

    #[test]
    fn test_start_encoded() {
        let mut e = MaskEditor::new();
        let payload = MaskPayload::Rle(crate::rle::Rle {
            counts: vec![0, 2, 2],
            size: [2, 2],
        });
        e.start_encoded("l1", &payload, 2, 2, Color::default()).unwrap();
        assert_eq!(e.buffer().unwrap().area(), 2);
    }
}
