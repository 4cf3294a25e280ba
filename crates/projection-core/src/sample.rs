//! Frame resampling and image scoring.

use image::{imageops, GrayImage, RgbImage};

use crate::map::ReprojectionMap;

/// Remap an equirectangular frame through a reprojection map using bilinear
/// interpolation. Longitude wraps at ±180°, so the horizontal coordinate
/// wraps around the source width; the vertical coordinate clamps at the poles.
pub fn remap(src: &RgbImage, map: &ReprojectionMap) -> RgbImage {
    let (src_w, src_h) = (src.width() as i64, src.height() as i64);
    let mut dest = RgbImage::new(map.dest_width(), map.dest_height());

    for (row, col, pixel) in dest
        .enumerate_pixels_mut()
        .map(|(x, y, p)| (y as usize, x as usize, p))
    {
        let u = map.map_x[(row, col)] as f64;
        let v = map.map_y[(row, col)] as f64;

        let x0 = u.floor();
        let y0 = v.floor();
        let fx = u - x0;
        let fy = v - y0;

        let xl = wrap(x0 as i64, src_w);
        let xr = wrap(x0 as i64 + 1, src_w);
        let yt = clamp(y0 as i64, src_h);
        let yb = clamp(y0 as i64 + 1, src_h);

        let tl = src.get_pixel(xl, yt);
        let tr = src.get_pixel(xr, yt);
        let bl = src.get_pixel(xl, yb);
        let br = src.get_pixel(xr, yb);

        for c in 0..3 {
            let top = tl.0[c] as f64 * (1.0 - fx) + tr.0[c] as f64 * fx;
            let bottom = bl.0[c] as f64 * (1.0 - fx) + br.0[c] as f64 * fx;
            pixel.0[c] = (top * (1.0 - fy) + bottom * fy).round().clamp(0.0, 255.0) as u8;
        }
    }

    dest
}

fn wrap(x: i64, len: i64) -> u32 {
    x.rem_euclid(len) as u32
}

fn clamp(y: i64, len: i64) -> u32 {
    y.clamp(0, len - 1) as u32
}

/// Unsharp-mask sharpening: `output = image * (1 + strength) - blurred * strength`
/// with a Gaussian blur of sigma 2.0.
pub fn sharpen(image: &RgbImage, strength: f64) -> RgbImage {
    let blurred = imageops::blur(image, 2.0);
    let mut out = RgbImage::new(image.width(), image.height());
    for ((src, soft), dest) in image
        .pixels()
        .zip(blurred.pixels())
        .zip(out.pixels_mut())
    {
        for c in 0..3 {
            let value = src.0[c] as f64 * (1.0 + strength) - soft.0[c] as f64 * strength;
            dest.0[c] = value.round().clamp(0.0, 255.0) as u8;
        }
    }
    out
}

/// Sharpness score: variance of the 3x3 Laplacian over the grayscale image.
/// Higher means sharper; a featureless image scores near zero.
pub fn sharpness_score(image: &RgbImage) -> f64 {
    let gray = imageops::grayscale(image);
    laplacian_variance(&gray)
}

fn laplacian_variance(gray: &GrayImage) -> f64 {
    let (w, h) = (gray.width() as usize, gray.height() as usize);
    if w < 3 || h < 3 {
        return 0.0;
    }

    let at = |x: usize, y: usize| gray.get_pixel(x as u32, y as u32).0[0] as f64;

    let mut sum = 0.0;
    let mut sum_sq = 0.0;
    let count = ((w - 2) * (h - 2)) as f64;

    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let lap = at(x - 1, y) + at(x + 1, y) + at(x, y - 1) + at(x, y + 1)
                - 4.0 * at(x, y);
            sum += lap;
            sum_sq += lap * lap;
        }
    }

    let mean = sum / count;
    sum_sq / count - mean * mean
}

/// Side length of the thumbnail both frames are reduced to before comparison.
const MOTION_THUMB: u32 = 64;

/// Motion score between two frames: mean absolute grayscale difference over
/// downscaled thumbnails, 0 (identical) to 255. Downscaling makes the score
/// insensitive to sensor noise and cheap on 4K+ frames.
pub fn motion_score(a: &RgbImage, b: &RgbImage) -> f64 {
    let ta = thumbnail_gray(a);
    let tb = thumbnail_gray(b);

    let total: f64 = ta
        .pixels()
        .zip(tb.pixels())
        .map(|(pa, pb)| (pa.0[0] as f64 - pb.0[0] as f64).abs())
        .sum();

    total / (MOTION_THUMB as f64 * MOTION_THUMB as f64)
}

fn thumbnail_gray(image: &RgbImage) -> GrayImage {
    let gray = imageops::grayscale(image);
    imageops::resize(
        &gray,
        MOTION_THUMB,
        MOTION_THUMB,
        imageops::FilterType::Triangle,
    )
}
