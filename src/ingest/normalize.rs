use anyhow::{anyhow, Result};

use crate::frame::BYTES_PER_PIXEL;

/// Layout of a raw frame dump.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelFormat {
    Rgb24,
    Rgba32,
    Nv12,
}

impl PixelFormat {
    /// Raw format implied by a file extension (`rgb`, `rgba`, `nv12`).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "rgb" => Some(PixelFormat::Rgb24),
            "rgba" => Some(PixelFormat::Rgba32),
            "nv12" => Some(PixelFormat::Nv12),
            _ => None,
        }
    }
}

/// Convert a raw frame to RGBA with an opaque alpha channel.
pub fn normalize_to_rgba(
    pixels: &[u8],
    width: u32,
    height: u32,
    format: PixelFormat,
) -> Result<Vec<u8>> {
    match format {
        PixelFormat::Rgb24 => {
            check_len(pixels, width, height, 3, "RGB")?;
            let mut rgba = Vec::with_capacity(pixels.len() / 3 * BYTES_PER_PIXEL);
            for px in pixels.chunks_exact(3) {
                rgba.extend_from_slice(&[px[0], px[1], px[2], 255]);
            }
            Ok(rgba)
        }
        PixelFormat::Rgba32 => {
            check_len(pixels, width, height, BYTES_PER_PIXEL, "RGBA")?;
            Ok(pixels.to_vec())
        }
        PixelFormat::Nv12 => nv12_to_rgba(pixels, width, height),
    }
}

fn check_len(pixels: &[u8], width: u32, height: u32, bpp: usize, label: &str) -> Result<()> {
    let expected = (width as usize)
        .checked_mul(height as usize)
        .and_then(|v| v.checked_mul(bpp))
        .ok_or_else(|| anyhow!("{} frame dimensions overflow", label))?;
    if pixels.len() != expected {
        return Err(anyhow!(
            "{} frame length mismatch: expected {}, got {}",
            label,
            expected,
            pixels.len()
        ));
    }
    Ok(())
}

/// NV12 subsamples chroma 2x2, so both dimensions must be even.
fn nv12_to_rgba(pixels: &[u8], width: u32, height: u32) -> Result<Vec<u8>> {
    if width % 2 != 0 || height % 2 != 0 {
        return Err(anyhow!(
            "NV12 frame dimensions must be even, got {}x{}",
            width,
            height
        ));
    }
    let w = width as usize;
    let h = height as usize;
    let y_plane = w
        .checked_mul(h)
        .ok_or_else(|| anyhow!("NV12 frame dimensions overflow"))?;
    let expected = y_plane
        .checked_add(y_plane / 2)
        .ok_or_else(|| anyhow!("NV12 frame dimensions overflow"))?;
    if pixels.len() != expected {
        return Err(anyhow!(
            "NV12 frame length mismatch: expected {}, got {}",
            expected,
            pixels.len()
        ));
    }

    let mut rgba = vec![255u8; y_plane * BYTES_PER_PIXEL];
    for j in 0..h {
        for i in 0..w {
            let y = pixels[j * w + i] as f32;
            let uv_index = y_plane + (j / 2) * w + (i / 2) * 2;
            let u = pixels[uv_index] as f32 - 128.0;
            let v = pixels[uv_index + 1] as f32 - 128.0;

            let r = y + 1.402_f32 * v;
            let g = y - 0.344_136_f32 * u - 0.714_136_f32 * v;
            let b = y + 1.772_f32 * u;

            let offset = (j * w + i) * BYTES_PER_PIXEL;
            rgba[offset] = clamp_to_u8(r);
            rgba[offset + 1] = clamp_to_u8(g);
            rgba[offset + 2] = clamp_to_u8(b);
        }
    }

    Ok(rgba)
}

fn clamp_to_u8(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nv12_conversion_produces_gray() -> Result<()> {
        let y_plane = vec![128u8; 4];
        let uv_plane = vec![128u8; 2];
        let nv12 = [y_plane, uv_plane].concat();

        let rgba = normalize_to_rgba(&nv12, 2, 2, PixelFormat::Nv12)?;
        assert_eq!(rgba, [128, 128, 128, 255].repeat(4));
        Ok(())
    }

    #[test]
    fn rgb_gains_opaque_alpha() -> Result<()> {
        let rgba = normalize_to_rgba(&[225, 125, 45, 1, 2, 3], 2, 1, PixelFormat::Rgb24)?;
        assert_eq!(rgba, vec![225, 125, 45, 255, 1, 2, 3, 255]);
        Ok(())
    }

    #[test]
    fn length_mismatch_is_rejected() {
        assert!(normalize_to_rgba(&[0u8; 8], 1, 3, PixelFormat::Rgb24).is_err());
        assert!(normalize_to_rgba(&[0u8; 15], 2, 2, PixelFormat::Rgba32).is_err());
        assert!(normalize_to_rgba(&[0u8; 5], 2, 2, PixelFormat::Nv12).is_err());
    }

    #[test]
    fn nv12_rejects_odd_dimensions() {
        let err = normalize_to_rgba(&[128u8; 9], 3, 2, PixelFormat::Nv12).unwrap_err();
        assert!(err.to_string().contains("must be even"));
        assert!(normalize_to_rgba(&[128u8; 9], 2, 3, PixelFormat::Nv12).is_err());
    }

    #[test]
    fn extensions_map_to_formats() {
        assert_eq!(PixelFormat::from_extension("NV12"), Some(PixelFormat::Nv12));
        assert_eq!(PixelFormat::from_extension("rgb"), Some(PixelFormat::Rgb24));
        assert_eq!(PixelFormat::from_extension("png"), None);
    }
}
