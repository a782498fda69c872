//! Conversions from and into `Indexed8`.
use std::collections::HashMap;

use crate::convert::{mono, straight_pixel, ConversionFlags, DitherMode, Scratch};
use crate::dither;
use crate::format::{words, words_mut, PixelFormat};
use crate::frame::PixelBuffer;
use crate::pixel::{self, Argb};

/// Levels per channel of the color cube, minus one.
const CUBE_MAX: i32 = 5;

/// The table index of a transparent pixel after quantisation.
const TRANSPARENT: u8 = 216;

pub(super) fn indexed8_to_x32(
    src: &PixelBuffer,
    dst: &mut PixelBuffer,
    _: ConversionFlags,
    _: &mut Scratch,
) {
    let target = dst.format();
    let mut table: Vec<u32> = src
        .color_table()
        .iter()
        .map(|&color| match target {
            PixelFormat::Rgb32 => color | 0xff00_0000,
            PixelFormat::Argb32Premultiplied => pixel::premultiply(color),
            _ => color,
        })
        .collect();

    if table.is_empty() {
        table = (0..256).map(|i| pixel::rgb(i, i, i)).collect();
    }

    let last = table.len() - 1;
    let width = src.width() as usize;
    for (s, d) in src.rows().zip(dst.rows_mut()) {
        for (&index, d) in s.iter().zip(words_mut(d)).take(width) {
            *d = table[usize::from(index).min(last)];
        }
    }
}

/// Reduce a 32-bit image to at most 256 colors.
///
/// Opaque images with few enough colors keep them exactly, in order of first appearance. All
/// others, or when dithering is preferred, map onto a 6×6×6 color cube. Images with alpha reserve
/// a transparent entry for the pixels that the alpha dither leaves unset.
pub(super) fn rgb_to_indexed8(
    src: &PixelBuffer,
    dst: &mut PixelBuffer,
    flags: ConversionFlags,
    scratch: &mut Scratch,
) {
    let has_alpha = src.format() != PixelFormat::Rgb32;

    if !flags.prefers_dither() && !has_alpha {
        if let Some(table) = exact_colors(src, dst, &mut scratch.palette_cache) {
            dst.set_color_table(table);
            return;
        }
        tracing::trace!("more than 256 colors, quantising");
    }

    let mut table: Vec<Argb> = (0..216)
        .map(|i| {
            let level = |c: u32| c * 255 / CUBE_MAX as u32;
            pixel::rgb(level(i / 36), level(i / 6 % 6), level(i % 6))
        })
        .collect();

    match flags.color_dither() {
        DitherMode::Threshold => quantise_each(src, dst, |c, _, _| (c * 5 + 127) / 255),
        DitherMode::Ordered => quantise_each(src, dst, |c, x, y| {
            let d = dither::threshold(x, y) << 8;
            ((256 * 5 + 5 + 1) * c + d) >> 16
        }),
        DitherMode::Diffuse => quantise_diffuse(src, dst, scratch.lines(9 * src.width() as usize)),
    }

    if has_alpha {
        table.push(0);
        mark_transparent(src, dst, flags, scratch);
    }

    dst.set_color_table(table);
}

/// The cube level closest to a channel value and the remaining error.
#[inline]
fn cube_level(value: i32) -> (i32, i32) {
    let pix = ((value * CUBE_MAX + 128) / 255).clamp(0, CUBE_MAX);
    (pix, value - pix * 255 / CUBE_MAX)
}

#[inline]
fn cube_index(r: u32, g: u32, b: u32) -> u8 {
    ((r * 6 + g) * 6 + b) as u8
}

/// Index every pixel by its exact color, failing beyond 256 colors.
fn exact_colors(
    src: &PixelBuffer,
    dst: &mut PixelBuffer,
    seen: &mut HashMap<Argb, u8>,
) -> Option<Vec<Argb>> {
    seen.clear();
    let mut table = Vec::new();
    let width = src.width() as usize;

    for (s, d) in src.rows().zip(dst.rows_mut()) {
        for (&color, d) in words(s).iter().zip(d.iter_mut()).take(width) {
            let color = color | 0xff00_0000;
            *d = match seen.get(&color) {
                Some(&index) => index,
                None if table.len() == 256 => return None,
                None => {
                    let index = table.len() as u8;
                    table.push(color);
                    seen.insert(color, index);
                    index
                }
            };
        }
    }

    Some(table)
}

/// Quantise each channel independently with `level(channel, x, y)`.
fn quantise_each(src: &PixelBuffer, dst: &mut PixelBuffer, level: impl Fn(u32, usize, usize) -> u32) {
    let format = src.format();
    let width = src.width() as usize;
    for (y, (s, d)) in src.rows().zip(dst.rows_mut()).enumerate() {
        for (x, d) in d.iter_mut().take(width).enumerate() {
            let color = straight_pixel(format, s, x);
            *d = cube_index(
                level(pixel::red(color), x, y),
                level(pixel::green(color), x, y),
                level(pixel::blue(color), x, y),
            );
        }
    }
}

/// Serpentine error diffusion, separately for each channel.
///
/// `lines` holds two rows of errors and one row of levels for each channel.
fn quantise_diffuse(src: &PixelBuffer, dst: &mut PixelBuffer, lines: &mut [i32]) {
    let format = src.format();
    let width = src.width() as usize;
    let height = src.height() as usize;

    let (even, rest) = lines.split_at_mut(3 * width);
    let (odd, levels) = rest.split_at_mut(3 * width);

    // Channel 0 is blue, 2 is red.
    let read = |row: &[u8], chan: usize, out: &mut [i32]| {
        for (x, out) in out.iter_mut().enumerate() {
            *out = ((straight_pixel(format, row, x) >> (8 * chan)) & 0xff) as i32;
        }
    };

    for (y, d) in dst.rows_mut().enumerate() {
        let forward = y % 2 == 1;
        for chan in 0..3 {
            let span = chan * width..(chan + 1) * width;
            let (l1, l2) = if forward {
                (&mut odd[span.clone()], &mut even[span.clone()])
            } else {
                (&mut even[span.clone()], &mut odd[span.clone()])
            };
            let pv = &mut levels[span];

            if y == 0 {
                read(src.scanline(0), chan, l1);
            }
            if y + 1 < height {
                read(src.scanline(y as u32 + 1), chan, l2);
            }

            if forward {
                for x in 0..width {
                    let (pix, err) = cube_level(l1[x]);
                    pv[x] = pix;
                    if x + 1 < width {
                        l1[x + 1] += (err * 7) >> 4;
                        l2[x + 1] += err >> 4;
                    }
                    l2[x] += (err * 5) >> 4;
                    if x >= 1 {
                        l2[x - 1] += (err * 3) >> 4;
                    }
                }
            } else {
                for x in (0..width).rev() {
                    let (pix, err) = cube_level(l1[x]);
                    pv[x] = pix;
                    if x > 0 {
                        l1[x - 1] += (err * 7) >> 4;
                        l2[x - 1] += err >> 4;
                    }
                    l2[x] += (err * 5) >> 4;
                    if x + 1 < width {
                        l2[x + 1] += (err * 3) >> 4;
                    }
                }
            }
        }

        let (blue, rest) = levels.split_at(width);
        let (green, red) = rest.split_at(width);
        for (x, d) in d.iter_mut().take(width).enumerate() {
            *d = cube_index(red[x] as u32, green[x] as u32, blue[x] as u32);
        }
    }
}

/// Point the pixels left out of the alpha mask at the transparent entry.
fn mark_transparent(
    src: &PixelBuffer,
    dst: &mut PixelBuffer,
    flags: ConversionFlags,
    scratch: &mut Scratch,
) {
    let mut mask = match PixelBuffer::try_new(src.width(), src.height(), PixelFormat::Mono) {
        Ok(mask) => mask,
        Err(err) => {
            tracing::debug!(%err, "alpha mask allocation failed, keeping opaque indices");
            return;
        }
    };

    mono::dither_to_mono(src, &mut mask, flags, true, scratch);
    let width = src.width() as usize;
    for (m, d) in mask.rows().zip(dst.rows_mut()) {
        for (x, d) in d.iter_mut().take(width).enumerate() {
            if PixelFormat::Mono.raw_pixel(m, x) == 0 {
                *d = TRANSPARENT;
            }
        }
    }
}

/// Map each pixel onto the palette entry with the smallest sum of channel differences.
pub(super) fn with_palette(
    src: &PixelBuffer,
    dst: &mut PixelBuffer,
    palette: &[Argb],
    scratch: &mut Scratch,
) {
    let format = src.format();
    let target = dst.format();
    // One bit targets match against exactly two entries, a missing second one is transparent.
    let mut pair = [0; 2];
    let palette = match target {
        PixelFormat::Indexed8 => palette,
        _ => {
            for (entry, &color) in pair.iter_mut().zip(palette) {
                *entry = color;
            }
            &pair[..]
        }
    };

    dst.set_color_table(palette);
    let cache = &mut scratch.palette_cache;
    cache.clear();

    let width = src.width() as usize;
    for (s, d) in src.rows().zip(dst.rows_mut()) {
        for (x, &raw) in words(s).iter().take(width).enumerate() {
            let index = *cache.entry(raw).or_insert_with(|| {
                let color = straight_pixel(format, s, x);
                nearest(palette, color)
            });
            target.set_raw_pixel(d, x, u32::from(index));
        }
    }
}

fn nearest(palette: &[Argb], color: Argb) -> u8 {
    let distance = |c: Argb| -> u32 {
        [24, 16, 8, 0]
            .into_iter()
            .map(|shift| ((c >> shift) & 0xff).abs_diff((color >> shift) & 0xff))
            .sum()
    };

    let mut best = (0, u32::MAX);
    for (index, &entry) in palette.iter().enumerate() {
        let d = distance(entry);
        if d < best.1 {
            best = (index, d);
        }
    }
    best.0 as u8
}
