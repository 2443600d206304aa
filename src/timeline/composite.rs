//! Pixel compositing: premultiplied-alpha `over` blending and affine image
//! placement onto a frame buffer.

use kurbo::{Affine, Point};

use crate::frame::Frame;

pub type PremulRgba8 = [u8; 4];

/// Source-over blend of two premultiplied RGBA8 pixels, with an extra
/// opacity applied to the source.
pub fn over(dst: PremulRgba8, src: PremulRgba8, opacity: f32) -> PremulRgba8 {
    let opacity = opacity.clamp(0.0, 1.0);
    if opacity <= 0.0 || src[3] == 0 {
        return dst;
    }

    let op = ((opacity * 255.0).round() as i32).clamp(0, 255) as u16;
    let sa = mul_div255(u16::from(src[3]), op);
    if sa == 0 {
        return dst;
    }

    let inv = 255u16 - u16::from(sa);

    let mut out = [0u8; 4];
    out[3] = mul_div255(u16::from(src[3]), op).saturating_add(mul_div255(u16::from(dst[3]), inv));
    for i in 0..3 {
        let sc = mul_div255(u16::from(src[i]), op);
        let dc = mul_div255(u16::from(dst[i]), inv);
        out[i] = sc.saturating_add(dc);
    }
    out
}

fn mul_div255(x: u16, y: u16) -> u8 {
    (((u32::from(x) * u32::from(y)) + 127) / 255) as u8
}

/// Composite `src` onto `dst` under `transform`, blending with `opacity`.
///
/// A pure integer translation takes a row-copy fast path; anything else is
/// inverse-mapped with nearest-neighbor sampling over the transformed
/// bounding box.
pub fn draw(dst: &mut Frame, src: &Frame, transform: Affine, opacity: f32) {
    let Some(src_px) = src.pixels().map(<[u8]>::to_vec) else {
        return;
    };
    let (dw, dh) = (dst.width as i64, dst.height as i64);
    let (sw, sh) = (src.width as i64, src.height as i64);
    if dw == 0 || dh == 0 || sw == 0 || sh == 0 {
        return;
    }
    let Some(mut dst_px) = dst.pixels().map(<[u8]>::to_vec) else {
        return;
    };

    if let Some((ox, oy)) = pure_translation(transform) {
        blit_translated(&mut dst_px, dw, dh, &src_px, sw, sh, ox, oy, opacity);
        dst.set_pixels(dst_px);
        return;
    }

    let Some(inverse) = invert(transform) else {
        return;
    };

    // Bounding box of the transformed source rectangle, clamped to dst.
    let corners = [
        transform * Point::new(0.0, 0.0),
        transform * Point::new(sw as f64, 0.0),
        transform * Point::new(0.0, sh as f64),
        transform * Point::new(sw as f64, sh as f64),
    ];
    let min_x = corners.iter().map(|p| p.x).fold(f64::INFINITY, f64::min);
    let max_x = corners.iter().map(|p| p.x).fold(f64::NEG_INFINITY, f64::max);
    let min_y = corners.iter().map(|p| p.y).fold(f64::INFINITY, f64::min);
    let max_y = corners.iter().map(|p| p.y).fold(f64::NEG_INFINITY, f64::max);
    let x0 = (min_x.floor() as i64).max(0);
    let x1 = (max_x.ceil() as i64).min(dw);
    let y0 = (min_y.floor() as i64).max(0);
    let y1 = (max_y.ceil() as i64).min(dh);

    for y in y0..y1 {
        for x in x0..x1 {
            let p = inverse * Point::new(x as f64 + 0.5, y as f64 + 0.5);
            let u = p.x.floor() as i64;
            let v = p.y.floor() as i64;
            if u < 0 || u >= sw || v < 0 || v >= sh {
                continue;
            }
            let si = ((v * sw + u) * 4) as usize;
            let di = ((y * dw + x) * 4) as usize;
            let blended = over(
                [dst_px[di], dst_px[di + 1], dst_px[di + 2], dst_px[di + 3]],
                [src_px[si], src_px[si + 1], src_px[si + 2], src_px[si + 3]],
                opacity,
            );
            dst_px[di..di + 4].copy_from_slice(&blended);
        }
    }
    dst.set_pixels(dst_px);
}

/// The integer offset of a transform that is translation only, if it is one.
fn pure_translation(transform: Affine) -> Option<(i64, i64)> {
    let [a, b, c, d, e, f] = transform.as_coeffs();
    let near = |x: f64, y: f64| (x - y).abs() < 1e-9;
    if near(a, 1.0) && near(b, 0.0) && near(c, 0.0) && near(d, 1.0) {
        Some((e.round() as i64, f.round() as i64))
    } else {
        None
    }
}

fn invert(transform: Affine) -> Option<Affine> {
    if transform.determinant().abs() < 1e-12 {
        return None;
    }
    Some(transform.inverse())
}

#[allow(clippy::too_many_arguments)]
fn blit_translated(
    dst: &mut [u8],
    dw: i64,
    dh: i64,
    src: &[u8],
    sw: i64,
    sh: i64,
    ox: i64,
    oy: i64,
    opacity: f32,
) {
    for sy in 0..sh {
        let dy = sy + oy;
        if dy < 0 || dy >= dh {
            continue;
        }
        for sx in 0..sw {
            let dx = sx + ox;
            if dx < 0 || dx >= dw {
                continue;
            }
            let si = ((sy * sw + sx) * 4) as usize;
            let di = ((dy * dw + dx) * 4) as usize;
            let blended = over(
                [dst[di], dst[di + 1], dst[di + 2], dst[di + 3]],
                [src[si], src[si + 1], src[si + 2], src[si + 3]],
                opacity,
            );
            dst[di..di + 4].copy_from_slice(&blended);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(number: i64, w: u32, h: u32, rgb: [u8; 3]) -> Frame {
        let mut f = Frame::new(number, w, h);
        f.fill(rgb);
        f
    }

    fn pixel(frame: &Frame, x: u32, y: u32) -> PremulRgba8 {
        let px = frame.pixels().unwrap();
        let i = ((y * frame.width + x) * 4) as usize;
        [px[i], px[i + 1], px[i + 2], px[i + 3]]
    }

    #[test]
    fn over_opacity_zero_is_noop() {
        let dst = [1, 2, 3, 255];
        assert_eq!(over(dst, [200, 200, 200, 255], 0.0), dst);
    }

    #[test]
    fn over_opaque_source_replaces() {
        assert_eq!(over([0, 0, 0, 255], [255, 0, 0, 255], 1.0), [255, 0, 0, 255]);
    }

    #[test]
    fn over_half_opacity_mixes() {
        let out = over([0, 0, 0, 255], [255, 255, 255, 255], 0.5);
        assert!((i32::from(out[0]) - 128).abs() <= 1);
        assert_eq!(out[3], 255);
    }

    #[test]
    fn translation_fast_path_places_image() {
        let mut dst = solid(1, 8, 8, [0, 0, 0]);
        let src = solid(1, 2, 2, [255, 0, 0]);
        draw(&mut dst, &src, Affine::translate((3.0, 4.0)), 1.0);
        assert_eq!(pixel(&dst, 3, 4), [255, 0, 0, 255]);
        assert_eq!(pixel(&dst, 2, 4), [0, 0, 0, 255]);
        assert_eq!(pixel(&dst, 5, 4), [0, 0, 0, 255]);
    }

    #[test]
    fn translation_clips_at_edges() {
        let mut dst = solid(1, 4, 4, [0, 0, 0]);
        let src = solid(1, 4, 4, [0, 255, 0]);
        draw(&mut dst, &src, Affine::translate((-2.0, -2.0)), 1.0);
        assert_eq!(pixel(&dst, 0, 0), [0, 255, 0, 255]);
        assert_eq!(pixel(&dst, 2, 2), [0, 0, 0, 255]);
    }

    #[test]
    fn scaling_covers_the_scaled_extent() {
        let mut dst = solid(1, 8, 8, [0, 0, 0]);
        let src = solid(1, 2, 2, [0, 0, 255]);
        draw(&mut dst, &src, Affine::scale(4.0), 1.0);
        assert_eq!(pixel(&dst, 0, 0), [0, 0, 255, 255]);
        assert_eq!(pixel(&dst, 7, 7), [0, 0, 255, 255]);
    }

    #[test]
    fn quarter_turn_rotation_keeps_square_footprint() {
        let mut dst = solid(1, 9, 9, [0, 0, 0]);
        let src = solid(1, 3, 3, [255, 255, 255]);
        let center = 4.5;
        let t = Affine::translate((center, center))
            * Affine::rotate(std::f64::consts::FRAC_PI_2)
            * Affine::translate((-1.5, -1.5));
        draw(&mut dst, &src, t, 1.0);
        assert_eq!(pixel(&dst, 4, 4), [255, 255, 255, 255]);
        assert_eq!(pixel(&dst, 0, 0), [0, 0, 0, 255]);
    }
}
