//! Sampling a pixel buffer as a paint source.
use crate::frame::PixelBuffer;
use crate::layout::Rect;
use crate::math;
use crate::pixel;
use crate::transform::{Transform, TransformKind};

/// How texture coordinates are found for a device pixel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TextureBlendType {
    /// An integer offset, pixels outside the clip are transparent.
    Untransformed,
    /// An integer offset, wrapping around the texture.
    Tiled,
    /// Nearest texel through the inverse transform.
    Transformed,
    TransformedTiled,
    /// Weighted average of the four nearest texels.
    TransformedBilinear,
    TransformedBilinearTiled,
}

/// A pixel buffer placed on the device with a transform.
#[derive(Clone, Debug)]
pub struct Texture {
    buffer: PixelBuffer,
    /// Texels readable without tiling, within the buffer.
    clip: Rect,
    const_alpha: u32,
    tiled: bool,
    bilinear: bool,
    transform: Transform,
    /// Maps device to texture space, `None` for a singular transform.
    inverse: Option<Transform>,
}

impl Texture {
    /// An untransformed, untiled texture covering the whole buffer.
    pub fn new(buffer: PixelBuffer) -> Self {
        let clip = buffer.layout().rect();
        Texture {
            buffer,
            clip,
            const_alpha: 256,
            tiled: false,
            bilinear: false,
            transform: Transform::IDENTITY,
            inverse: Some(Transform::IDENTITY),
        }
    }

    /// Place the texture with a transform from texture space to device space.
    pub fn with_transform(mut self, transform: &Transform) -> Self {
        self.transform = *transform;
        self.inverse = transform.invert();
        if self.inverse.is_none() {
            tracing::debug!(?transform, "singular texture transform");
        }
        self
    }

    /// Restrict the readable texels, intersected with the buffer.
    pub fn with_clip(mut self, clip: Rect) -> Self {
        self.clip = clip.intersect(&self.buffer.layout().rect());
        self
    }

    /// Scale the texture alpha by `const_alpha / 256`.
    pub fn with_const_alpha(mut self, const_alpha: u32) -> Self {
        self.const_alpha = const_alpha.min(256);
        self
    }

    pub fn with_tiling(mut self, tiled: bool) -> Self {
        self.tiled = tiled;
        self
    }

    pub fn with_bilinear(mut self, bilinear: bool) -> Self {
        self.bilinear = bilinear;
        self
    }

    pub fn buffer(&self) -> &PixelBuffer {
        &self.buffer
    }

    pub fn clip(&self) -> Rect {
        self.clip
    }

    pub fn const_alpha(&self) -> u32 {
        self.const_alpha
    }

    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    pub fn is_tiled(&self) -> bool {
        self.tiled
    }

    pub fn blend_type(&self) -> TextureBlendType {
        let simple = self
            .inverse
            .map_or(true, |m| m.kind() <= TransformKind::Translate);
        match (simple, self.bilinear, self.tiled) {
            (true, _, false) => TextureBlendType::Untransformed,
            (true, _, true) => TextureBlendType::Tiled,
            (false, false, false) => TextureBlendType::Transformed,
            (false, false, true) => TextureBlendType::TransformedTiled,
            (false, true, false) => TextureBlendType::TransformedBilinear,
            (false, true, true) => TextureBlendType::TransformedBilinearTiled,
        }
    }

    /// Whether every sample is opaque.
    ///
    /// Transformed textures without tiling have transparent samples outside the clip.
    pub fn is_opaque(&self) -> bool {
        !self.buffer.has_alpha_channel()
            && matches!(
                self.blend_type(),
                TextureBlendType::Untransformed
                    | TextureBlendType::Tiled
                    | TextureBlendType::TransformedTiled
                    | TextureBlendType::TransformedBilinearTiled
            )
    }

    /// The integer offset from device to texture coordinates of an untransformed texture.
    pub(crate) fn offset(&self) -> (i64, i64) {
        let m = self.inverse.unwrap_or(Transform::IDENTITY);
        (
            -(math::round_half_up(-m.dx) as i64),
            -(math::round_half_up(-m.dy) as i64),
        )
    }

    /// Sample premultiplied ARGB for the pixels `x..x + out.len()` of device row `y`.
    pub fn fetch(&self, x: i32, y: i32, out: &mut [u32]) {
        let Some(m) = self.inverse else {
            out.fill(0);
            return;
        };

        if self.buffer.is_null() || self.buffer.width() == 0 || self.buffer.height() == 0 {
            out.fill(0);
            return;
        }

        match self.blend_type() {
            TextureBlendType::Untransformed => self.fetch_untransformed(x, y, out),
            TextureBlendType::Tiled => self.fetch_tiled(x, y, out),
            TextureBlendType::Transformed | TextureBlendType::TransformedTiled => {
                self.fetch_transformed(&m, x, y, out)
            }
            TextureBlendType::TransformedBilinear | TextureBlendType::TransformedBilinearTiled => {
                self.fetch_bilinear(&m, x, y, out)
            }
        }
    }

    /// Read a texel known to be inside the buffer.
    fn texel(&self, px: i64, py: i64) -> u32 {
        let format = self.buffer.format();
        let row = self.buffer.scanline(py as u32);
        format.fetch_premultiplied(row, px as usize, self.buffer.color_table())
    }

    fn fetch_untransformed(&self, x: i32, y: i32, out: &mut [u32]) {
        out.fill(0);
        let (xoff, yoff) = self.offset();
        let sy = i64::from(y) + yoff;
        if sy < i64::from(self.clip.y) || sy >= self.clip.bottom() {
            return;
        }

        let sx = i64::from(x) + xoff;
        let start = sx.max(i64::from(self.clip.x));
        let end = (sx + out.len() as i64).min(self.clip.right());
        if start >= end {
            return;
        }

        let row = self.buffer.scanline(sy as u32);
        let run = &mut out[(start - sx) as usize..(end - sx) as usize];
        self.buffer
            .format()
            .fetch_run(row, start as usize, run, self.buffer.color_table());
    }

    fn fetch_tiled(&self, x: i32, y: i32, out: &mut [u32]) {
        let (xoff, yoff) = self.offset();
        let width = i64::from(self.buffer.width());
        let height = i64::from(self.buffer.height());
        let sy = (i64::from(y) + yoff).rem_euclid(height);
        let mut sx = (i64::from(x) + xoff).rem_euclid(width);

        for out in out.iter_mut() {
            *out = self.texel(sx, sy);
            sx += 1;
            if sx == width {
                sx = 0;
            }
        }
    }

    /// Nearest texel, transparent outside the clip unless tiled.
    fn nearest(&self, px: f64, py: f64) -> u32 {
        let (px, py) = (px as i64, py as i64);
        if self.tiled {
            let width = i64::from(self.buffer.width());
            let height = i64::from(self.buffer.height());
            return self.texel(px.rem_euclid(width), py.rem_euclid(height));
        }

        let inside = px >= i64::from(self.clip.x)
            && px < self.clip.right()
            && py >= i64::from(self.clip.y)
            && py < self.clip.bottom();
        if inside {
            self.texel(px, py)
        } else {
            0
        }
    }

    fn fetch_transformed(&self, m: &Transform, x: i32, y: i32, out: &mut [u32]) {
        let cx = f64::from(x) + 0.5;
        let cy = f64::from(y) + 0.5;

        let mut fx = m.m21 * cy + m.m11 * cx + m.dx;
        let mut fy = m.m22 * cy + m.m12 * cx + m.dy;
        let mut fw = m.m23 * cy + m.m13 * cx + m.m33;

        for out in out.iter_mut() {
            let iw = if fw == 0.0 { 1.0 } else { 1.0 / fw };
            *out = self.nearest(math::floor(fx * iw), math::floor(fy * iw));

            fx += m.m11;
            fy += m.m12;
            fw += m.m13;
            if fw == 0.0 {
                fw += m.m13;
            }
        }
    }

    /// The two texel columns (or rows) around `v1` and `v1 + 1`.
    fn bilinear_pair(&self, v1: i64, low: i64, high: i64, size: i64) -> (i64, i64) {
        if self.tiled {
            let v1 = v1.rem_euclid(size);
            (v1, (v1 + 1) % size)
        } else if v1 < low {
            (low, low)
        } else if v1 >= high - 1 {
            (high - 1, high - 1)
        } else {
            (v1, v1 + 1)
        }
    }

    fn fetch_bilinear(&self, m: &Transform, x: i32, y: i32, out: &mut [u32]) {
        if !self.tiled && self.clip.is_empty() {
            out.fill(0);
            return;
        }

        let width = i64::from(self.buffer.width());
        let height = i64::from(self.buffer.height());
        let (left, right) = (i64::from(self.clip.x), self.clip.right());
        let (top, bottom) = (i64::from(self.clip.y), self.clip.bottom());

        let cx = f64::from(x) + 0.5;
        let cy = f64::from(y) + 0.5;

        let mut fx = m.m21 * cy + m.m11 * cx + m.dx;
        let mut fy = m.m22 * cy + m.m12 * cx + m.dy;
        let mut fw = m.m23 * cy + m.m13 * cx + m.m33;

        for out in out.iter_mut() {
            let iw = if fw == 0.0 { 1.0 } else { 1.0 / fw };
            let px = fx * iw - 0.5;
            let py = fy * iw - 0.5;

            let x1 = math::floor(px);
            let y1 = math::floor(py);
            let distx = ((px - x1) * 256.0) as u32;
            let disty = ((py - y1) * 256.0) as u32;

            let (x1, x2) = self.bilinear_pair(x1 as i64, left, right, width);
            let (y1, y2) = self.bilinear_pair(y1 as i64, top, bottom, height);

            let tl = self.texel(x1, y1);
            let tr = self.texel(x2, y1);
            let bl = self.texel(x1, y2);
            let br = self.texel(x2, y2);

            let idistx = 256 - distx;
            let idisty = 256 - disty;
            let xtop = pixel::interpolate_256(tl, idistx, tr, distx);
            let xbot = pixel::interpolate_256(bl, idistx, br, distx);
            *out = pixel::interpolate_256(xtop, idisty, xbot, disty);

            fx += m.m11;
            fy += m.m12;
            fw += m.m13;
            if fw == 0.0 {
                fw += m.m13;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::PixelFormat;

    const RED: u32 = 0xffff_0000;
    const BLUE: u32 = 0xff00_00ff;

    fn strip(colors: &[u32]) -> PixelBuffer {
        let mut buffer = PixelBuffer::new(colors.len() as u32, 1, PixelFormat::Argb32Premultiplied);
        for (x, &color) in colors.iter().enumerate() {
            buffer.set_pixel(x as i32, 0, color);
        }
        buffer
    }

    #[test]
    fn blend_types() {
        let texture = Texture::new(strip(&[RED]));
        assert_eq!(texture.blend_type(), TextureBlendType::Untransformed);
        let texture = texture.with_transform(&Transform::translate(3.0, 1.0));
        assert_eq!(texture.blend_type(), TextureBlendType::Untransformed);
        let texture = texture.with_tiling(true);
        assert_eq!(texture.blend_type(), TextureBlendType::Tiled);
        let texture = texture.with_transform(&Transform::scale(2.0, 2.0));
        assert_eq!(texture.blend_type(), TextureBlendType::TransformedTiled);
        let texture = texture.with_bilinear(true).with_tiling(false);
        assert_eq!(texture.blend_type(), TextureBlendType::TransformedBilinear);
    }

    #[test]
    fn untransformed_outside_is_transparent() {
        let texture = Texture::new(strip(&[RED, BLUE]));
        let mut out = [1; 4];
        texture.fetch(-1, 0, &mut out);
        assert_eq!(out, [0, RED, BLUE, 0]);

        texture.fetch(-1, 1, &mut out);
        assert_eq!(out, [0; 4]);
    }

    #[test]
    fn translation_rounds_to_pixels() {
        let texture = Texture::new(strip(&[RED, BLUE])).with_transform(&Transform::translate(1.4, 0.0));
        let mut out = [1; 3];
        texture.fetch(0, 0, &mut out);
        assert_eq!(out, [0, RED, BLUE]);
    }

    #[test]
    fn tiling_wraps() {
        let texture = Texture::new(strip(&[RED, BLUE])).with_tiling(true);
        let mut out = [0; 5];
        texture.fetch(-1, 7, &mut out);
        assert_eq!(out, [BLUE, RED, BLUE, RED, BLUE]);
    }

    #[test]
    fn scaled_nearest() {
        let texture = Texture::new(strip(&[RED, BLUE])).with_transform(&Transform::scale(2.0, 2.0));
        let mut out = [1; 6];
        texture.fetch(-1, 0, &mut out);
        assert_eq!(out, [0, RED, RED, BLUE, BLUE, 0]);

        let tiled = texture.with_tiling(true);
        tiled.fetch(-1, 0, &mut out);
        assert_eq!(out, [BLUE, RED, RED, BLUE, BLUE, RED]);
    }

    #[test]
    fn bilinear_blends_neighbours() {
        let texture = Texture::new(strip(&[0xff00_0000, 0xffff_ffff]))
            .with_transform(&Transform::scale(2.0, 1.0))
            .with_bilinear(true);
        let mut out = [0; 4];
        texture.fetch(0, 0, &mut out);
        assert_eq!(out, [0xff00_0000, 0xff3f_3f3f, 0xffbf_bfbf, 0xffff_ffff]);
    }

    #[test]
    fn bilinear_tiled_wraps_neighbours() {
        let texture = Texture::new(strip(&[0xff00_0000, 0xffff_ffff]))
            .with_transform(&Transform::scale(2.0, 1.0))
            .with_bilinear(true)
            .with_tiling(true);
        let mut out = [0; 2];
        texture.fetch(3, 0, &mut out);
        // Between the last and the first texel.
        assert_eq!(out, [0xffbf_bfbf, 0xff3f_3f3f]);
    }

    #[test]
    fn degenerate_textures_are_transparent() {
        let mut out = [1; 3];
        Texture::new(PixelBuffer::null()).fetch(0, 0, &mut out);
        assert_eq!(out, [0; 3]);

        let singular = Texture::new(strip(&[RED])).with_transform(&Transform::scale(0.0, 1.0));
        singular.fetch(0, 0, &mut out);
        assert_eq!(out, [0; 3]);
    }

    #[test]
    fn opaque_sources() {
        let mut rgb = PixelBuffer::new(1, 1, PixelFormat::Rgb32);
        rgb.fill_color(RED);
        assert!(Texture::new(rgb.clone()).is_opaque());
        assert!(!Texture::new(rgb.clone())
            .with_transform(&Transform::scale(2.0, 2.0))
            .is_opaque());
        assert!(!Texture::new(strip(&[RED])).is_opaque());
    }
}
