//! YUV 4:2:0 to RGB conversion.
//!
//! Reassembles a planar or semi-planar `RawFrame` (arbitrary row and pixel
//! strides) into a packed RGB `RasterImage`, then rotates the raster upright.
//! Inference always sees upright input, so rotation is applied here and never
//! deferred.

use crate::error::ConversionError;
use crate::frame::{Plane, RasterImage, RawFrame};

/// Convert a raw frame into an upright RGB raster.
pub fn convert(frame: &RawFrame) -> Result<RasterImage, ConversionError> {
    let width = frame.width;
    let height = frame.height;
    if width == 0 || height == 0 {
        return Err(ConversionError::EmptyFrame { width, height });
    }
    let rotation = frame.rotation_degrees % 360;
    if rotation % 90 != 0 {
        return Err(ConversionError::UnsupportedRotation(frame.rotation_degrees));
    }

    let w = width as usize;
    let h = height as usize;
    let cw = w.div_ceil(2);
    let ch = h.div_ceil(2);
    check_plane("Y", &frame.y, w, h)?;
    check_plane("U", &frame.u, cw, ch)?;
    check_plane("V", &frame.v, cw, ch)?;

    let rgb_len = w
        .checked_mul(h)
        .and_then(|v| v.checked_mul(3))
        .ok_or(ConversionError::Overflow { width, height })?;
    let mut rgb = vec![0u8; rgb_len];

    let (y_plane, u_plane, v_plane) = (&frame.y, &frame.u, &frame.v);
    for j in 0..h {
        let y_row = j * y_plane.row_stride;
        let u_row = (j / 2) * u_plane.row_stride;
        let v_row = (j / 2) * v_plane.row_stride;
        for i in 0..w {
            let y = y_plane.data[y_row + i * y_plane.pixel_stride] as f32;
            let u = u_plane.data[u_row + (i / 2) * u_plane.pixel_stride] as f32 - 128.0;
            let v = v_plane.data[v_row + (i / 2) * v_plane.pixel_stride] as f32 - 128.0;

            let r = y + 1.402_f32 * v;
            let g = y - 0.344_136_f32 * u - 0.714_136_f32 * v;
            let b = y + 1.772_f32 * u;

            let offset = (j * w + i) * 3;
            rgb[offset] = clamp_to_u8(r);
            rgb[offset + 1] = clamp_to_u8(g);
            rgb[offset + 2] = clamp_to_u8(b);
        }
    }

    let (rgb, out_w, out_h) = rotate_rgb(rgb, w, h, rotation);
    Ok(RasterImage::from_parts(rgb, out_w as u32, out_h as u32))
}

/// Rotate a packed RGB buffer clockwise by 0, 90, 180 or 270 degrees.
///
/// Returns the rotated buffer and its new extents.
pub fn rotate_rgb(src: Vec<u8>, w: usize, h: usize, degrees: u32) -> (Vec<u8>, usize, usize) {
    match degrees % 360 {
        90 => {
            let mut out = vec![0u8; src.len()];
            // out is h wide, w tall; out(ox, oy) = src(oy, h - 1 - ox)
            for oy in 0..w {
                for ox in 0..h {
                    let s = ((h - 1 - ox) * w + oy) * 3;
                    let d = (oy * h + ox) * 3;
                    out[d..d + 3].copy_from_slice(&src[s..s + 3]);
                }
            }
            (out, h, w)
        }
        180 => {
            let mut out = vec![0u8; src.len()];
            let n = w * h;
            for p in 0..n {
                let s = p * 3;
                let d = (n - 1 - p) * 3;
                out[d..d + 3].copy_from_slice(&src[s..s + 3]);
            }
            (out, w, h)
        }
        270 => {
            let mut out = vec![0u8; src.len()];
            // out(ox, oy) = src(w - 1 - oy, ox)
            for oy in 0..w {
                for ox in 0..h {
                    let s = (ox * w + (w - 1 - oy)) * 3;
                    let d = (oy * h + ox) * 3;
                    out[d..d + 3].copy_from_slice(&src[s..s + 3]);
                }
            }
            (out, h, w)
        }
        _ => (src, w, h),
    }
}

fn check_plane(
    name: &'static str,
    plane: &Plane,
    width: usize,
    rows: usize,
) -> Result<(), ConversionError> {
    if plane.pixel_stride == 0 {
        return Err(ConversionError::InvalidStride {
            plane: name,
            detail: "pixel stride is zero".to_string(),
        });
    }
    let row_span = (width - 1)
        .checked_mul(plane.pixel_stride)
        .and_then(|v| v.checked_add(1))
        .ok_or_else(|| ConversionError::InvalidStride {
            plane: name,
            detail: format!("pixel stride {} overflows the row span", plane.pixel_stride),
        })?;
    if plane.row_stride < row_span {
        return Err(ConversionError::InvalidStride {
            plane: name,
            detail: format!(
                "row stride {} shorter than row span {}",
                plane.row_stride, row_span
            ),
        });
    }
    let expected = (rows - 1)
        .checked_mul(plane.row_stride)
        .and_then(|v| v.checked_add(row_span))
        .ok_or(ConversionError::Overflow {
            width: width as u32,
            height: rows as u32,
        })?;
    if plane.data.len() < expected {
        return Err(ConversionError::plane_too_small(
            name,
            expected,
            plane.data.len(),
        ));
    }
    Ok(())
}

fn clamp_to_u8(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}
