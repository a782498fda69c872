use brunch::Bench;

use raster_canvas::compose::{compose, compose_solid};
use raster_canvas::{blend, CompositionMode, Gradient, GradientShape, PaintState, PixelBuffer};
use raster_canvas::{PixelFormat, Source, Span, Texture, Transform};

const LEN: usize = 1024;

fn spans(sz: u32) -> Vec<Span> {
    (0..sz as i32)
        .flat_map(|y| [Span::new(0, y, sz / 2, 255), Span::new(sz as i32 / 2, y, sz / 2, 128)])
        .collect()
}

fn stops() -> [(f64, u32); 3] {
    [(0.0, 0xffff_0000), (0.5, 0x8000_ff00), (1.0, 0xff00_00ff)]
}

fn paint(name: &str, format: PixelFormat, state: PaintState) -> Bench {
    let sz = 256;
    let mut canvas = PixelBuffer::new(sz, sz, format);
    canvas.fill_color(0xff20_4060);
    let spans = spans(sz);

    Bench::new(format!("canvas::compose::blend::{name}({format:?})"))
        .run(move || blend(&mut canvas, &spans, &state))
}

fn main() {
    let src: Vec<u32> = (0..LEN as u32).map(|i| (i << 24) | (i * 0x0001_0203 & 0x00ff_ffff)).collect();
    let src: Vec<u32> = src.into_iter().map(raster_canvas::pixel::premultiply).collect();

    let mut benches = brunch::Benches::default();

    benches.extend(CompositionMode::ALL.into_iter().map(|mode| {
        let mut dest = vec![0x8040_2010; LEN];
        let src = src.clone();
        Bench::new(format!("canvas::compose::array::{mode:?}"))
            .run(move || compose(mode, &mut dest, &src, 200))
    }));

    benches.extend(
        [CompositionMode::SourceOver, CompositionMode::Multiply, CompositionMode::SourceXorDestination]
            .into_iter()
            .map(|mode| {
                let mut dest = vec![0x8040_2010; LEN];
                Bench::new(format!("canvas::compose::solid::{mode:?}"))
                    .run(move || compose_solid(mode, &mut dest, 0x80ff_8000, 255))
            }),
    );

    let mut checker = PixelBuffer::new(8, 8, PixelFormat::Argb32Premultiplied);
    checker.fill_color(0xffff_ffff);
    let texture = Texture::new(checker).with_tiling(true);
    let rotated = texture
        .clone()
        .with_transform(&Transform::rotate(0.3))
        .with_bilinear(true);

    let linear = Gradient::linear((0.0, 0.0), (256.0, 64.0), &stops());
    let radial = Gradient::new(
        GradientShape::Radial {
            center: (128.0, 128.0),
            radius: 100.0,
            focal: (100.0, 120.0),
            focal_radius: 0.0,
        },
        &stops(),
    );

    for format in [PixelFormat::Argb32Premultiplied, PixelFormat::Rgb16] {
        benches.push(paint("solid", format, PaintState::new(Source::Solid(0x80ff_0000))));
        benches.push(paint("linear", format, PaintState::new(Source::Gradient(linear.clone()))));
        benches.push(paint("radial", format, PaintState::new(Source::Gradient(radial.clone()))));
        benches.push(paint("tiled", format, PaintState::new(Source::Texture(texture.clone()))));
        benches.push(paint("bilinear", format, PaintState::new(Source::Texture(rotated.clone()))));
    }

    benches.finish();
}
