use brunch::Bench;

use raster_canvas::{ConversionFlags, Converter, Gradient, PixelBuffer, PixelFormat};
use raster_canvas::{fill_rect, LayoutError, PaintState, Rect, Source};

#[derive(Debug)]
struct Convert {
    format_in: PixelFormat,
    format_out: PixelFormat,
    flags: ConversionFlags,
    sz: u32,
}

impl Convert {
    fn name(&self) -> String {
        format!(
            "convert({:?}, {:?}, {:?}, {})",
            self.format_in, self.format_out, self.flags, self.sz
        )
    }

    fn prepare(&self) -> Result<impl FnMut(), LayoutError> {
        let mut from = PixelBuffer::try_new(self.sz, self.sz, PixelFormat::Argb32)?;
        let size = f64::from(self.sz);
        let ramp = Gradient::linear(
            (0.0, 0.0),
            (size, size),
            &[(0.0, 0x20ff_0000), (0.5, 0xff00_ff00), (1.0, 0xc000_00ff)],
        );
        fill_rect(&mut from, Rect::new(0, 0, self.sz, self.sz), &PaintState::new(Source::Gradient(ramp)));

        let mut converter = Converter::new();
        let from = converter.convert(&from, self.format_in, ConversionFlags::empty());
        let (format, flags) = (self.format_out, self.flags);

        Ok(move || {
            let _ = converter.convert(&from, format, flags);
        })
    }
}

fn main() {
    let tests = [
        /* premultiplication */
        Convert {
            format_in: PixelFormat::Argb32,
            format_out: PixelFormat::Argb32Premultiplied,
            flags: ConversionFlags::empty(),
            sz: 256,
        },
        Convert {
            format_in: PixelFormat::Argb32Premultiplied,
            format_out: PixelFormat::Argb32,
            flags: ConversionFlags::empty(),
            sz: 256,
        },
        /* packed formats */
        Convert {
            format_in: PixelFormat::Argb32,
            format_out: PixelFormat::Rgb16,
            flags: ConversionFlags::empty(),
            sz: 256,
        },
        Convert {
            format_in: PixelFormat::Argb8565Premultiplied,
            format_out: PixelFormat::Rgb888,
            flags: ConversionFlags::empty(),
            sz: 256,
        },
        /* dithering into one bit */
        Convert {
            format_in: PixelFormat::Rgb32,
            format_out: PixelFormat::Mono,
            flags: ConversionFlags::DIFFUSE_DITHER,
            sz: 256,
        },
        Convert {
            format_in: PixelFormat::Rgb32,
            format_out: PixelFormat::Mono,
            flags: ConversionFlags::ORDERED_DITHER,
            sz: 256,
        },
        /* palettes */
        Convert {
            format_in: PixelFormat::Argb32,
            format_out: PixelFormat::Indexed8,
            flags: ConversionFlags::DIFFUSE_DITHER,
            sz: 256,
        },
        Convert {
            format_in: PixelFormat::Indexed8,
            format_out: PixelFormat::Argb32Premultiplied,
            flags: ConversionFlags::empty(),
            sz: 256,
        },
    ];

    let mut benches = brunch::Benches::default();
    benches.extend(tests.map(|convert| {
        let bench = match convert.prepare() {
            Ok(bench) => bench,
            Err(err) => panic!("Failed to setup benchmark {:?}: {:?}", convert, err),
        };

        Bench::new(format!("canvas::conversion::main::{}", convert.name())).run(bench)
    }));
    benches.finish();
}
