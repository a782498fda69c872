use crate::{
    fill_rect, ConversionFlags, Converter, Gradient, LayoutError, PaintState, PixelBuffer,
    PixelFormat, Rect, Source,
};

#[test]
fn simple_conversion() -> Result<(), LayoutError> {
    let from = PixelBuffer::from_words(32, 32, PixelFormat::Argb32, &[0xffff_ff00; 32 * 32])?;
    let into = from.convert_to(PixelFormat::Rgb16, ConversionFlags::empty());

    // Yellow, all red and green bits set.
    for y in 0..32 {
        let row = into.scanline(y);
        for x in 0..32 {
            assert_eq!(PixelFormat::Rgb16.raw_pixel(row, x), 0xffe0, "at {x}, {y}");
        }
    }

    Ok(())
}

#[test]
fn words_need_a_word_format() {
    assert_eq!(
        PixelBuffer::from_words(1, 1, PixelFormat::Rgb16, &[0]).err(),
        Some(LayoutError::InvalidFormat)
    );
    assert!(matches!(
        PixelBuffer::from_words(2, 2, PixelFormat::Rgb32, &[0; 3]),
        Err(LayoutError::TooShort { .. })
    ));
}

#[test]
fn drawn_ramp_survives_exact_palette() {
    let mut canvas = PixelBuffer::new(32, 4, PixelFormat::Rgb32);
    let ramp = Gradient::linear((0.0, 0.0), (32.0, 0.0), &[(0.0, 0xff00_0000), (1.0, 0xffff_ffff)]);
    fill_rect(&mut canvas, Rect::new(0, 0, 32, 4), &PaintState::new(Source::Gradient(ramp)));

    let mut converter = Converter::new();
    let indexed = converter.convert(&canvas, PixelFormat::Indexed8, ConversionFlags::empty());
    assert!(indexed.color_count() <= 32);

    let back = converter.convert(&indexed, PixelFormat::Rgb32, ConversionFlags::empty());
    assert_eq!(back, canvas);
}

#[test]
fn drawing_detaches_clones() {
    let mut canvas = PixelBuffer::new(4, 4, PixelFormat::Argb32Premultiplied);
    canvas.fill_color(0xff00_00ff);
    let snapshot = canvas.clone();
    assert!(canvas.ptr_eq(&snapshot));

    fill_rect(&mut canvas, Rect::new(1, 1, 2, 2), &PaintState::new(Source::Solid(0xffff_0000)));

    assert!(!canvas.ptr_eq(&snapshot));
    assert_ne!(canvas.cache_key(), snapshot.cache_key());
    assert_eq!(snapshot.pixel(1, 1), 0xff00_00ff);
    assert_eq!(canvas.pixel(1, 1), 0xffff_0000);
}

#[test]
fn drawing_into_every_format() {
    for format in PixelFormat::ALL.into_iter().filter(|&f| f != PixelFormat::Invalid) {
        let mut canvas = PixelBuffer::new(3, 2, format);
        if format.is_indexed() {
            canvas.set_color_table(vec![0xff00_0000, 0xffff_ffff]);
        }

        let white = PaintState::new(Source::Solid(0xffff_ffff));
        fill_rect(&mut canvas, Rect::new(1, 0, 2, 2), &white);

        for y in 0..2 {
            assert_ne!(canvas.pixel(0, y), 0xffff_ffff, "{format:?}");
            assert_eq!(canvas.pixel(1, y), 0xffff_ffff, "{format:?}");
            assert_eq!(canvas.pixel(2, y), 0xffff_ffff, "{format:?}");
        }
    }
}
