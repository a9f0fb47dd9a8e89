//! Costumes and their rasterized levels of detail.
//!
//! The compositor treats costume content as opaque bitmaps: a [`Costume`]
//! carries its rotation center and bitmap resolution, plus one or more
//! [`CostumeLod`] rasterizations. Vector costumes are expected to arrive
//! here already rasterized at whatever scales the loader chose.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use smallvec::SmallVec;
use tiny_skia::Pixmap;

/// Process-unique identity of a rasterization, used to key GPU textures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LodId(pub u64);

static NEXT_LOD_ID: AtomicU64 = AtomicU64::new(1);

/// A resolution-specific rasterization of a costume.
///
/// LODs are shared through `Arc`; the GPU texture cache holds them weakly,
/// so dropping the last strong reference releases the associated texture.
#[derive(Debug)]
pub struct CostumeLod {
    id: LodId,
    scale: f32,
    pixmap: Pixmap,
}

impl CostumeLod {
    pub fn new(pixmap: Pixmap, scale: f32) -> Arc<Self> {
        Arc::new(Self {
            id: LodId(NEXT_LOD_ID.fetch_add(1, Ordering::Relaxed)),
            scale,
            pixmap,
        })
    }

    pub fn id(&self) -> LodId {
        self.id
    }

    /// The scale this LOD was rasterized at, relative to the base bitmap.
    pub fn scale(&self) -> f32 {
        self.scale
    }

    pub fn pixmap(&self) -> &Pixmap {
        &self.pixmap
    }

    pub fn width(&self) -> u32 {
        self.pixmap.width()
    }

    pub fn height(&self) -> u32 {
        self.pixmap.height()
    }

    /// Alpha of the texel at `(x, y)`, 0 outside the bitmap.
    pub fn alpha_at(&self, x: i32, y: i32) -> u8 {
        if x < 0 || y < 0 {
            return 0;
        }
        self.pixmap
            .pixel(x as u32, y as u32)
            .map(|px| px.alpha())
            .unwrap_or(0)
    }

    /// The bitmap as straight-alpha RGBA bytes, row-major from the top.
    /// This is the layout uploaded to GPU textures; the shader works on
    /// un-premultiplied color so the effects match the CPU path.
    pub(crate) fn straight_rgba(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.pixmap.pixels().len() * 4);
        for px in self.pixmap.pixels() {
            let c = px.demultiply();
            bytes.extend_from_slice(&[c.red(), c.green(), c.blue(), c.alpha()]);
        }
        bytes
    }
}

/// A named image with rotation center, bitmap resolution and one or more
/// rasterized levels of detail.
#[derive(Debug, Clone)]
pub struct Costume {
    name: String,
    /// Bitmap pixels per stage unit of the base rasterization.
    bitmap_resolution: f32,
    /// Rotation center in bitmap pixels of the base rasterization.
    rotation_center_x: f32,
    rotation_center_y: f32,
    /// Base bitmap size in bitmap pixels.
    width: f32,
    height: f32,
    lods: SmallVec<[Arc<CostumeLod>; 2]>,
}

impl Costume {
    /// A single-LOD bitmap costume. The pixmap is the scale-1 rasterization.
    pub fn new(
        name: &str,
        pixmap: Pixmap,
        bitmap_resolution: f32,
        rotation_center_x: f32,
        rotation_center_y: f32,
    ) -> Self {
        let width = pixmap.width() as f32;
        let height = pixmap.height() as f32;
        let mut lods = SmallVec::new();
        lods.push(CostumeLod::new(pixmap, 1.0));
        Self {
            name: name.to_string(),
            bitmap_resolution,
            rotation_center_x,
            rotation_center_y,
            width,
            height,
            lods,
        }
    }

    /// A costume with pre-rasterized LODs. `base_width`/`base_height` are
    /// the scale-1 dimensions in bitmap pixels; each LOD's pixmap should be
    /// that size times its scale. The LOD list must not be empty.
    pub fn with_lods(
        name: &str,
        lods: Vec<Arc<CostumeLod>>,
        base_width: f32,
        base_height: f32,
        bitmap_resolution: f32,
        rotation_center_x: f32,
        rotation_center_y: f32,
    ) -> Self {
        assert!(!lods.is_empty(), "a costume needs at least one LOD");
        let mut sorted: SmallVec<[Arc<CostumeLod>; 2]> = lods.into_iter().collect();
        sorted.sort_by(|a, b| a.scale().total_cmp(&b.scale()));
        Self {
            name: name.to_string(),
            bitmap_resolution,
            rotation_center_x,
            rotation_center_y,
            width: base_width,
            height: base_height,
            lods: sorted,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Base bitmap width in bitmap pixels.
    pub fn width(&self) -> f32 {
        self.width
    }

    pub fn height(&self) -> f32 {
        self.height
    }

    pub fn bitmap_resolution(&self) -> f32 {
        self.bitmap_resolution
    }

    pub fn rotation_center(&self) -> (f32, f32) {
        (self.rotation_center_x, self.rotation_center_y)
    }

    /// The factor converting bitmap pixels to stage units.
    pub fn scale(&self) -> f32 {
        1.0 / self.bitmap_resolution
    }

    /// Selects the smallest LOD that covers `desired_scale`, falling back
    /// to the largest available one.
    pub fn lod(&self, desired_scale: f32) -> &Arc<CostumeLod> {
        self.lods
            .iter()
            .find(|lod| lod.scale() >= desired_scale)
            .unwrap_or_else(|| self.lods.last().expect("costume has at least one LOD"))
    }

    /// The rasterization point queries sample: the LOD closest to scale 1.
    pub fn base_lod(&self) -> &Arc<CostumeLod> {
        self.lod(1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pixmap(w: u32, h: u32) -> Pixmap {
        Pixmap::new(w, h).unwrap()
    }

    #[test]
    fn lod_ids_are_unique() {
        let a = CostumeLod::new(pixmap(1, 1), 1.0);
        let b = CostumeLod::new(pixmap(1, 1), 1.0);
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn lod_selection_prefers_smallest_covering_scale() {
        let lods = vec![
            CostumeLod::new(pixmap(4, 4), 2.0),
            CostumeLod::new(pixmap(2, 2), 1.0),
            CostumeLod::new(pixmap(8, 8), 4.0),
        ];
        let costume = Costume::with_lods("c", lods, 2.0, 2.0, 1.0, 1.0, 1.0);
        assert_eq!(costume.lod(0.5).scale(), 1.0);
        assert_eq!(costume.lod(1.5).scale(), 2.0);
        assert_eq!(costume.lod(3.0).scale(), 4.0);
        // Nothing covers 8x; take the largest.
        assert_eq!(costume.lod(8.0).scale(), 4.0);
    }

    #[test]
    fn alpha_sampling_is_zero_outside() {
        let mut pm = pixmap(2, 2);
        pm.pixels_mut()[0] = tiny_skia::PremultipliedColorU8::from_rgba(255, 255, 255, 255).unwrap();
        let lod = CostumeLod::new(pm, 1.0);
        assert_eq!(lod.alpha_at(0, 0), 255);
        assert_eq!(lod.alpha_at(1, 1), 0);
        assert_eq!(lod.alpha_at(-1, 0), 0);
        assert_eq!(lod.alpha_at(2, 0), 0);
    }

    #[test]
    fn scale_is_inverse_resolution() {
        let costume = Costume::new("c", pixmap(4, 4), 2.0, 2.0, 2.0);
        assert_eq!(costume.scale(), 0.5);
        assert_eq!(costume.width(), 4.0);
    }
}
