use raster_canvas::pixel::{alpha, blue, green, red};
use raster_canvas::{fill_rect, ConversionFlags, CompositionMode, Gradient, GradientShape};
use raster_canvas::{LayoutError, PaintState, PixelBuffer, PixelFormat, Rect, Source, Spread};
use raster_canvas::{GradientSettings, Texture, Transform};

const SZ_W: u32 = 640;
const SZ_H: u32 = 480;

/// Paints a few gradients over a checkerboard and dithers the result.
///
/// Writes `gradient.png` and `gradient-mono.png` next to the workspace, unless
/// `RASTER_CANVAS_SKIP_IO` is set.
fn main() -> Result<(), LayoutError> {
    tracing_subscriber::fmt::init();

    let mut canvas = PixelBuffer::try_new(SZ_W, SZ_H, PixelFormat::Argb32Premultiplied)?;
    let full = Rect::new(0, 0, SZ_W, SZ_H);

    let mut checker = PixelBuffer::try_new(2, 2, PixelFormat::Rgb32)?;
    checker.fill_color(0xffc0_c0c0);
    checker.set_pixel(0, 0, 0xff80_8080);
    checker.set_pixel(1, 1, 0xff80_8080);
    let checker = Texture::new(checker)
        .with_tiling(true)
        .with_transform(&Transform::scale(16.0, 16.0));
    fill_rect(&mut canvas, full, &PaintState::new(Source::Texture(checker)));

    let stops = [(0.0, 0xffff_0000), (0.5, 0x80ff_ff00), (1.0, 0xff00_00ff)];
    let linear = Gradient::linear((0.0, 0.0), (160.0, 40.0), &stops).with_settings(GradientSettings {
        spread: Spread::Reflect,
        ..GradientSettings::default()
    });
    fill_rect(&mut canvas, Rect::new(0, 0, SZ_W, SZ_H / 3), &PaintState::new(Source::Gradient(linear)));

    let radial = Gradient::new(
        GradientShape::Radial {
            center: (320.0, 240.0),
            radius: 120.0,
            focal: (280.0, 200.0),
            focal_radius: 0.0,
        },
        &stops,
    );
    let state = PaintState::new(Source::Gradient(radial))
        .with_mode(CompositionMode::Multiply)
        .with_opacity(200);
    fill_rect(&mut canvas, Rect::new(160, 120, 320, 240), &state);

    let conical = Gradient::conical((0.0, 0.0), 0.0, &stops)
        .with_transform(&Transform::rotate(0.5).then(&Transform::translate(540.0, 400.0)));
    fill_rect(&mut canvas, Rect::new(440, 320, 200, 160), &PaintState::new(Source::Gradient(conical)));

    let mono = canvas.convert_to(PixelFormat::Mono, ConversionFlags::DIFFUSE_DITHER);

    if std::env::var_os("RASTER_CANVAS_SKIP_IO").is_none() {
        save(&canvas, "gradient.png");
        save(&mono, "gradient-mono.png");
    }

    Ok(())
}

fn save(buffer: &PixelBuffer, name: &str) {
    let (width, height) = (buffer.width(), buffer.height());
    let container: Vec<u8> = (0..height as i32)
        .flat_map(|y| (0..width as i32).map(move |x| (x, y)))
        .flat_map(|(x, y)| {
            let color = buffer.pixel(x, y);
            [red(color), green(color), blue(color), alpha(color)].map(|c| c as u8)
        })
        .collect();

    let image = image::ImageBuffer::<image::Rgba<_>, _>::from_raw(width, height, container).unwrap();
    let output = format!(concat!(env!("CARGO_MANIFEST_DIR"), "/../{}"), name);
    image.save(output).unwrap();
}
