//! Drawing runs of covered pixels into a pixel buffer.
//!
//! A rasterizer describes a shape as [`Span`]s: horizontal runs of pixels sharing one coverage
//! value. The dispatcher resolves the paint state into an operator once per call, then walks the
//! spans in chunks of at most [`BUFFER_SIZE`] pixels. Each chunk is fetched from the destination
//! as premultiplied ARGB, composed with the source and stored back in the destination format.
use crate::compose::{CompositionMode, SolidFn};
use crate::dither;
use crate::format::{words_mut, PixelFormat};
use crate::frame::PixelBuffer;
use crate::gradient::Gradient;
use crate::layout::Rect;
use crate::pixel::{self, Argb};
use crate::sample::{Texture, TextureBlendType};

/// The longest run processed at once.
pub const BUFFER_SIZE: usize = 2048;

/// A run of `len` pixels starting at `(x, y)`, all with the same coverage.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Span {
    pub x: i32,
    pub y: i32,
    pub len: u32,
    pub coverage: u8,
}

impl Span {
    pub const fn new(x: i32, y: i32, len: u32, coverage: u8) -> Self {
        Span {
            x,
            y,
            len,
            coverage,
        }
    }

    fn end(&self) -> i64 {
        i64::from(self.x) + i64::from(self.len)
    }
}

/// What is painted.
#[derive(Clone, Debug)]
pub enum Source {
    /// A straight ARGB color.
    Solid(Argb),
    Gradient(Gradient),
    Texture(Texture),
}

/// The parameters of a draw call.
#[derive(Clone, Debug)]
pub struct PaintState {
    pub mode: CompositionMode,
    /// Scales the alpha of the source, 255 is opaque.
    pub opacity: u8,
    pub source: Source,
}

impl PaintState {
    /// Paint `source` with source over and full opacity.
    pub fn new(source: Source) -> Self {
        PaintState {
            mode: CompositionMode::SourceOver,
            opacity: 255,
            source,
        }
    }

    pub fn with_mode(mut self, mode: CompositionMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_opacity(mut self, opacity: u8) -> Self {
        self.opacity = opacity;
        self
    }
}

impl Default for PaintState {
    fn default() -> Self {
        PaintState::new(Source::Solid(0xff00_0000))
    }
}

/// Fill `spans` with a straight ARGB color.
pub fn blend_color(dest: &mut PixelBuffer, spans: &[Span], color: Argb, mode: CompositionMode) {
    blend(dest, spans, &PaintState::new(Source::Solid(color)).with_mode(mode))
}

/// Paint `spans` into `dest`.
///
/// Spans outside of the buffer are clipped. Spans are taken in order; adjacent spans of one row
/// share their source fetch.
///
/// ```
/// use raster_canvas::{blend, PaintState, PixelBuffer, PixelFormat, Source, Span};
///
/// let mut canvas = PixelBuffer::new(4, 1, PixelFormat::Argb32Premultiplied);
/// let spans = [Span::new(0, 0, 2, 255), Span::new(2, 0, 2, 0)];
/// blend(&mut canvas, &spans, &PaintState::new(Source::Solid(0xffff_0000)));
/// assert_eq!(canvas.pixel(1, 0), 0xffff_0000);
/// assert_eq!(canvas.pixel(2, 0), 0);
/// ```
pub fn blend(dest: &mut PixelBuffer, spans: &[Span], state: &PaintState) {
    if dest.is_null() || spans.is_empty() {
        return;
    }

    let op = Operator::new(state);
    let mut scratch = Scratch::new();
    let mut target = Target::new(dest);

    match op.fetch {
        Fetch::Solid(color) => {
            blend_solid(&mut target, spans, op.mode.solid_fn(), color, &mut scratch)
        }
        _ => blend_spans(&mut target, spans, &op, &mut scratch),
    }
}

/// Paint a rectangle with full coverage.
pub fn fill_rect(dest: &mut PixelBuffer, rect: Rect, state: &PaintState) {
    let area = rect.intersect(&dest.layout().rect());
    if area.is_empty() {
        return;
    }

    let spans: Vec<Span> = (0..area.height)
        .map(|row| Span::new(area.x, area.y + row as i32, area.width, 255))
        .collect();
    blend(dest, &spans, state);
}

/// Source and destination runs of one chunk, allocated before the first span.
struct Scratch {
    src: Vec<u32>,
    dest: Vec<u32>,
}

impl Scratch {
    fn new() -> Self {
        Scratch {
            src: vec![0; BUFFER_SIZE],
            dest: vec![0; BUFFER_SIZE],
        }
    }

    /// The first `len` pixels of both runs, `len` is at most `BUFFER_SIZE`.
    fn buffers(&mut self, len: usize) -> (&mut [u32], &mut [u32]) {
        let len = len.min(BUFFER_SIZE);
        (&mut self.src[..len], &mut self.dest[..len])
    }
}

/// The source fetch of an operator.
#[derive(Clone, Copy)]
enum Fetch<'a> {
    /// A premultiplied color.
    Solid(u32),
    Gradient { gradient: &'a Gradient, opacity: u32 },
    Texture(&'a Texture),
}

/// A draw call resolved for its source.
struct Operator<'a> {
    mode: CompositionMode,
    fetch: Fetch<'a>,
    /// Scales span coverage, `0..=256`.
    const_alpha: u32,
}

/// Map opacity to `0..=256`.
fn opacity_256(opacity: u8) -> u32 {
    u32::from(opacity) + u32::from(opacity >> 7)
}

impl<'a> Operator<'a> {
    fn new(state: &'a PaintState) -> Self {
        let opacity = opacity_256(state.opacity);
        let (fetch, const_alpha, opaque) = match &state.source {
            Source::Solid(color) => {
                let a = (pixel::alpha(*color) * opacity) >> 8;
                let color = pixel::premultiply((a << 24) | (color & 0x00ff_ffff));
                (Fetch::Solid(color), 256, a == 255)
            }
            Source::Gradient(gradient) => (
                Fetch::Gradient {
                    gradient,
                    opacity: u32::from(state.opacity),
                },
                256,
                gradient.is_opaque() && state.opacity == 255,
            ),
            Source::Texture(texture) => (
                Fetch::Texture(texture),
                (texture.const_alpha() * opacity) >> 8,
                texture.is_opaque(),
            ),
        };

        let mode = if state.mode == CompositionMode::SourceOver && opaque {
            CompositionMode::Source
        } else {
            state.mode
        };

        tracing::trace!(?mode, requested = ?state.mode, const_alpha, "selected operator");
        Operator {
            mode,
            fetch,
            const_alpha,
        }
    }

    fn fetch(&self, x: i32, y: i32, out: &mut [u32]) {
        match self.fetch {
            Fetch::Solid(color) => out.fill(color),
            Fetch::Gradient { gradient, opacity } => {
                gradient.fetch(x, y, out);
                if opacity != 255 {
                    for p in out.iter_mut() {
                        *p = pixel::byte_mul(*p, opacity);
                    }
                }
            }
            Fetch::Texture(texture) => texture.fetch(x, y, out),
        }
    }

    /// The device area the source can paint, as `(left, top, right, bottom)`.
    ///
    /// Untransformed textures only touch the pixels they cover.
    fn limits(&self) -> (i64, i64, i64, i64) {
        match self.fetch {
            Fetch::Texture(texture) if texture.blend_type() == TextureBlendType::Untransformed => {
                let (xoff, yoff) = texture.offset();
                let clip = texture.clip();
                (
                    i64::from(clip.x) - xoff,
                    i64::from(clip.y) - yoff,
                    clip.right() - xoff,
                    clip.bottom() - yoff,
                )
            }
            _ => (i64::MIN, i64::MIN, i64::MAX, i64::MAX),
        }
    }
}

/// Reads and writes premultiplied runs of the destination.
struct Target<'a> {
    buffer: &'a mut PixelBuffer,
    format: PixelFormat,
    /// The color table, premultiplied.
    table: Vec<u32>,
}

impl<'a> Target<'a> {
    fn new(buffer: &'a mut PixelBuffer) -> Self {
        let format = buffer.format();
        let table = buffer
            .color_table()
            .iter()
            .map(|&c| pixel::premultiply(c))
            .collect();
        Target {
            buffer,
            format,
            table,
        }
    }

    fn limits(&self) -> (i64, i64, i64, i64) {
        let rect = self.buffer.layout().rect();
        (
            i64::from(rect.x),
            i64::from(rect.y),
            rect.right(),
            rect.bottom(),
        )
    }

    /// Run `compose` on the pixels `x..x + scratch.len()` of row `y`.
    ///
    /// Premultiplied and `Rgb32` rows are composed in place, other formats go through `scratch`.
    fn update(&mut self, x: usize, y: u32, scratch: &mut [u32], compose: impl FnOnce(&mut [u32])) {
        let len = scratch.len();
        let format = self.format;

        if matches!(format, PixelFormat::Argb32Premultiplied | PixelFormat::Rgb32) {
            let row = self.buffer.scanline_mut(y);
            if let Some(words) = words_mut(row).get_mut(x..x + len) {
                compose(words);
                if format == PixelFormat::Rgb32 {
                    for w in words.iter_mut() {
                        *w |= 0xff00_0000;
                    }
                }
                return;
            }
        }

        format.fetch_run(self.buffer.scanline(y), x, scratch, self.buffer.color_table());
        compose(scratch);
        self.store(x, y, scratch);
    }

    fn store(&mut self, x: usize, y: u32, values: &[u32]) {
        let format = self.format;
        let table = &self.table;
        let row = self.buffer.scanline_mut(y);

        match format {
            PixelFormat::Mono | PixelFormat::MonoLsb => {
                for (i, &value) in values.iter().enumerate() {
                    let set = mono_bit(table, value, x + i, y as usize);
                    format.set_raw_pixel(row, x + i, u32::from(set));
                }
            }
            PixelFormat::Indexed8 => {
                for (i, &value) in values.iter().enumerate() {
                    let index = pixel::closest_index(table, value);
                    format.set_raw_pixel(row, x + i, index as u32);
                }
            }
            _ => format.store_run(row, x, values),
        }
    }
}

/// Whether a premultiplied color is stored as a set bit.
///
/// With a table the nearer of the two colors wins, otherwise the Bayer threshold decides.
fn mono_bit(table: &[u32], value: u32, x: usize, y: usize) -> bool {
    match table {
        [color0, color1, ..] => {
            if value == *color0 {
                false
            } else if value == *color1 {
                true
            } else {
                let distance = |c: u32| {
                    let d = |f: fn(u32) -> u32| f(c).abs_diff(f(value)).pow(2);
                    d(pixel::red) + d(pixel::green) + d(pixel::blue)
                };
                distance(*color0) >= distance(*color1)
            }
        }
        _ => pixel::gray(value) < dither::threshold(x, y),
    }
}

/// Clip a run of row `y` to the limits, as `(x, end)` in buffer coordinates.
fn clip_run(
    y: i32,
    x: i64,
    end: i64,
    (left, top, right, bottom): (i64, i64, i64, i64),
) -> Option<(u32, usize, usize)> {
    let y = i64::from(y);
    if y < top || y >= bottom {
        return None;
    }

    let start = x.max(left);
    let end = end.min(right);
    (start < end).then(|| (y as u32, start as usize, end as usize))
}

fn intersect(
    a: (i64, i64, i64, i64),
    b: (i64, i64, i64, i64),
) -> (i64, i64, i64, i64) {
    (a.0.max(b.0), a.1.max(b.1), a.2.min(b.2), a.3.min(b.3))
}

fn blend_solid(
    target: &mut Target,
    spans: &[Span],
    solid: SolidFn,
    color: u32,
    scratch: &mut Scratch,
) {
    let limits = target.limits();
    for span in spans.iter().filter(|span| span.coverage != 0) {
        let Some((y, start, end)) = clip_run(span.y, i64::from(span.x), span.end(), limits) else {
            continue;
        };

        let coverage = u32::from(span.coverage);
        let mut x = start;
        while x < end {
            let len = (end - x).min(BUFFER_SIZE);
            let (_, dest) = scratch.buffers(len);
            target.update(x, y, dest, |dest| solid(dest, color, coverage));
            x += len;
        }
    }
}

fn blend_spans(target: &mut Target, spans: &[Span], op: &Operator, scratch: &mut Scratch) {
    let compose = op.mode.array_fn();
    let limits = intersect(target.limits(), op.limits());

    let mut first = 0;
    while first < spans.len() {
        // Coalesce the spans continuing each other on one row.
        let row = spans[first].y;
        let mut run_end = spans[first].end();
        let mut last = first + 1;
        while last < spans.len() && spans[last].y == row && i64::from(spans[last].x) == run_end {
            run_end = spans[last].end();
            last += 1;
        }

        let run = &spans[first..last];
        first = last;

        let Some((y, start, end)) = clip_run(row, i64::from(run[0].x), run_end, limits) else {
            continue;
        };

        let mut x = start;
        while x < end {
            let len = (end - x).min(BUFFER_SIZE);
            let (src, dest) = scratch.buffers(len);
            op.fetch(x as i32, row, src);

            let chunk = (x as i64, (x + len) as i64);
            target.update(x, y, dest, |dest| {
                for span in run {
                    let from = i64::from(span.x).max(chunk.0);
                    let to = span.end().min(chunk.1);
                    let coverage = (u32::from(span.coverage) * op.const_alpha) >> 8;
                    if from >= to || coverage == 0 {
                        continue;
                    }

                    let range = (from - chunk.0) as usize..(to - chunk.0) as usize;
                    compose(&mut dest[range.clone()], &src[range], coverage.min(255));
                }
            });
            x += len;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::Transform;

    const RED: u32 = 0xffff_0000;
    const BLUE: u32 = 0xff00_00ff;

    fn canvas(width: u32, height: u32, format: PixelFormat, color: Argb) -> PixelBuffer {
        let mut buffer = PixelBuffer::new(width, height, format);
        buffer.fill_color(color);
        buffer
    }

    fn fill(dest: &mut PixelBuffer, state: &PaintState) {
        let area = dest.layout().rect();
        fill_rect(dest, area, state);
    }

    fn row(buffer: &PixelBuffer, y: i32) -> Vec<u32> {
        (0..buffer.width() as i32).map(|x| buffer.pixel(x, y)).collect()
    }

    #[test]
    fn opaque_sources_replace() {
        let state = PaintState::new(Source::Solid(RED));
        assert_eq!(Operator::new(&state).mode, CompositionMode::Source);

        let faded = PaintState::new(Source::Solid(RED)).with_opacity(128);
        assert_eq!(Operator::new(&faded).mode, CompositionMode::SourceOver);

        let stops = [(0.0, RED), (1.0, BLUE)];
        let gradient = Gradient::linear((0.0, 0.0), (1.0, 0.0), &stops);
        let state = PaintState::new(Source::Gradient(gradient));
        assert_eq!(Operator::new(&state).mode, CompositionMode::Source);

        let translucent = Gradient::linear((0.0, 0.0), (1.0, 0.0), &[(0.0, 0x80ff_0000)]);
        let state = PaintState::new(Source::Gradient(translucent));
        assert_eq!(Operator::new(&state).mode, CompositionMode::SourceOver);

        let xor = PaintState::new(Source::Solid(RED)).with_mode(CompositionMode::Xor);
        assert_eq!(Operator::new(&xor).mode, CompositionMode::Xor);
    }

    #[test]
    fn coverage_per_span() {
        let mut dest = canvas(4, 1, PixelFormat::Argb32Premultiplied, BLUE);
        let spans = [
            Span::new(0, 0, 1, 255),
            Span::new(1, 0, 1, 128),
            Span::new(2, 0, 1, 0),
        ];
        blend_color(&mut dest, &spans, RED, CompositionMode::SourceOver);

        let row = row(&dest, 0);
        assert_eq!(row[0], RED);
        assert!(pixel::red(row[1]).abs_diff(128) <= 1);
        assert_eq!(row[2], BLUE);
        assert_eq!(row[3], BLUE);
    }

    #[test]
    fn merged_spans_match_separate_ones() {
        let stops = [(0.0, 0x80ff_0000), (1.0, 0xff00_ff00)];
        let gradient = Gradient::linear((0.0, 0.0), (8.0, 0.0), &stops);
        let state = PaintState::new(Source::Gradient(gradient));

        let mut merged = canvas(8, 1, PixelFormat::Argb32Premultiplied, BLUE);
        let spans = [Span::new(0, 0, 3, 200), Span::new(3, 0, 5, 90)];
        blend(&mut merged, &spans, &state);

        let mut separate = canvas(8, 1, PixelFormat::Argb32Premultiplied, BLUE);
        blend(&mut separate, &spans[..1], &state);
        blend(&mut separate, &spans[1..], &state);

        assert_eq!(merged, separate);
    }

    #[test]
    fn spans_are_clipped() {
        let mut dest = canvas(3, 2, PixelFormat::Argb32Premultiplied, BLUE);
        let spans = [
            Span::new(-5, 0, 7, 255),
            Span::new(2, 1, 100, 255),
            Span::new(0, 9, 3, 255),
            Span::new(i32::MAX - 1, 1, u32::MAX, 255),
        ];
        blend_color(&mut dest, &spans, RED, CompositionMode::Source);
        assert_eq!(row(&dest, 0), [RED, RED, BLUE]);
        assert_eq!(row(&dest, 1), [BLUE, BLUE, RED]);
    }

    #[test]
    fn long_runs_are_chunked() {
        let width = 2 * BUFFER_SIZE as u32 + 17;
        let mut tile = PixelBuffer::new(3, 1, PixelFormat::Rgb32);
        tile.set_pixel(0, 0, RED);
        tile.set_pixel(1, 0, BLUE);
        tile.set_pixel(2, 0, 0xff00_ff00);
        let texture = Texture::new(tile).with_tiling(true);

        let mut dest = PixelBuffer::new(width, 1, PixelFormat::Argb32Premultiplied);
        fill(&mut dest, &PaintState::new(Source::Texture(texture)));

        let expected = [RED, BLUE, 0xff00_ff00];
        for (x, p) in row(&dest, 0).into_iter().enumerate() {
            assert_eq!(p, expected[x % 3], "{x}");
        }
    }

    #[test]
    fn scratch_is_allocated_once() {
        let width = 3 * BUFFER_SIZE as u32 + 5;
        let mut dest = PixelBuffer::new(width, 2, PixelFormat::Rgb16);
        let ramp = Gradient::linear((0.0, 0.0), (64.0, 0.0), &[(0.0, RED), (1.0, BLUE)]);
        let state = PaintState::new(Source::Gradient(ramp)).with_opacity(200);
        let op = Operator::new(&state);

        let mut scratch = Scratch::new();
        let addresses = (scratch.src.as_ptr(), scratch.dest.as_ptr());
        let spans = [Span::new(0, 0, width, 255), Span::new(0, 1, width, 128)];
        blend_spans(&mut Target::new(&mut dest), &spans, &op, &mut scratch);

        assert_eq!((scratch.src.as_ptr(), scratch.dest.as_ptr()), addresses);
        assert_eq!(scratch.src.len(), BUFFER_SIZE);
        assert_eq!(scratch.dest.len(), BUFFER_SIZE);
        assert_ne!(dest.pixel(width as i32 - 1, 0), 0xff00_0000);
    }

    #[test]
    fn untransformed_texture_touches_only_its_area() {
        let mut dest = canvas(4, 4, PixelFormat::Argb32Premultiplied, RED);
        let texture = Texture::new(canvas(2, 2, PixelFormat::Argb32Premultiplied, 0x8000_00ff))
            .with_transform(&Transform::translate(1.0, 1.0));
        let state = PaintState::new(Source::Texture(texture)).with_mode(CompositionMode::Source);
        fill(&mut dest, &state);

        assert_eq!(row(&dest, 0), [RED; 4]);
        assert_eq!(row(&dest, 1), [RED, 0x8000_00ff, 0x8000_00ff, RED]);
        assert_eq!(row(&dest, 3), [RED; 4]);
    }

    #[test]
    fn texture_opacity_scales() {
        let mut dest = canvas(1, 1, PixelFormat::Argb32Premultiplied, BLUE);
        let texture = Texture::new(canvas(1, 1, PixelFormat::Rgb32, RED));
        let state = PaintState::new(Source::Texture(texture)).with_opacity(0);
        fill_rect(&mut dest, Rect::new(0, 0, 1, 1), &state);
        assert_eq!(dest.pixel(0, 0), BLUE);
    }

    #[test]
    fn gradient_opacity_scales() {
        let gradient = Gradient::linear((0.0, 0.0), (1.0, 0.0), &[(0.0, RED)]);
        let mut dest = canvas(2, 1, PixelFormat::Argb32Premultiplied, BLUE);
        let state = PaintState::new(Source::Gradient(gradient)).with_opacity(0);
        fill(&mut dest, &state);
        assert_eq!(row(&dest, 0), [BLUE; 2]);
    }

    #[test]
    fn straight_destination() {
        let mut dest = PixelBuffer::new(1, 1, PixelFormat::Argb32);
        blend_color(&mut dest, &[Span::new(0, 0, 1, 255)], 0x80ff_0000, CompositionMode::Source);
        assert_eq!(dest.pixel(0, 0), 0x80ff_0000);
    }

    #[test]
    fn opaque_destination_stays_opaque() {
        let mut dest = canvas(2, 1, PixelFormat::Rgb32, RED);
        blend_color(&mut dest, &[Span::new(0, 0, 2, 255)], BLUE, CompositionMode::Clear);
        assert_eq!(row(&dest, 0), [0xff00_0000; 2]);
        assert_eq!(dest.scanline(0)[3], 0xff);
    }

    #[test]
    fn packed_destination() {
        let mut dest = PixelBuffer::new(2, 1, PixelFormat::Rgb16);
        blend_color(&mut dest, &[Span::new(0, 0, 1, 255)], RED, CompositionMode::SourceOver);
        assert_eq!(row(&dest, 0), [RED, 0xff00_0000]);
    }

    #[test]
    fn mono_destination_with_table() {
        let mut dest = PixelBuffer::new(3, 1, PixelFormat::Mono);
        dest.set_color_table(vec![RED, BLUE]);
        blend_color(&mut dest, &[Span::new(0, 0, 1, 255)], BLUE, CompositionMode::Source);
        blend_color(&mut dest, &[Span::new(1, 0, 1, 255)], 0xffe0_0010, CompositionMode::Source);
        blend_color(&mut dest, &[Span::new(2, 0, 1, 255)], 0xff10_00e0, CompositionMode::Source);
        assert_eq!(
            (0..3).map(|x| dest.pixel_index(x, 0)).collect::<Vec<_>>(),
            [1, 0, 1]
        );
    }

    #[test]
    fn mono_destination_dithers() {
        let mut dest = PixelBuffer::new(16, 16, PixelFormat::MonoLsb);
        fill(&mut dest, &PaintState::new(Source::Solid(0xff80_8080)));
        let set: i32 = (0..16)
            .flat_map(|y| (0..16).map(move |x| (x, y)))
            .map(|(x, y)| dest.pixel_index(x, y))
            .sum();
        assert!((112..=144).contains(&set), "{set}");

        fill(&mut dest, &PaintState::new(Source::Solid(0xffff_ffff)));
        assert!(dest.bytes().iter().all(|&b| b == 0));
    }

    #[test]
    fn indexed_destination_picks_nearest() {
        let mut dest = PixelBuffer::new(2, 1, PixelFormat::Indexed8);
        dest.set_color_table(vec![0xff00_0000, RED, BLUE]);
        blend_color(&mut dest, &[Span::new(0, 0, 1, 255)], 0xfff0_1010, CompositionMode::Source);
        blend_color(&mut dest, &[Span::new(1, 0, 1, 255)], 0xff10_10f0, CompositionMode::Source);
        assert_eq!(dest.pixel_index(0, 0), 1);
        assert_eq!(dest.pixel_index(1, 0), 2);
    }

    #[test]
    fn null_destination_is_ignored() {
        let mut dest = PixelBuffer::null();
        blend_color(&mut dest, &[Span::new(0, 0, 4, 255)], RED, CompositionMode::Source);
        assert!(dest.is_null());
    }
}
