use anyhow::{Context, Result};
use imgref::Img;
use ravif::Encoder;
use rgb::{RGB8, RGBA8};
use std::fs;
use std::path::Path;

/// Decode `input` and write it to `output` as AVIF
///
/// Images without an alpha channel go through the RGB path so the encoder
/// does not spend bits on a constant alpha plane.
pub fn encode_avif(input: &Path, output: &Path, quality: f32, speed: u8) -> Result<()> {
    let img = image::open(input)
        .with_context(|| format!("Failed to open image: {}", input.display()))?;
    let (width, height) = (img.width() as usize, img.height() as usize);

    if width == 0 || height == 0 {
        anyhow::bail!("Image has no pixels: {}", input.display());
    }

    let encoder = Encoder::new()
        .with_quality(quality)
        .with_alpha_quality(quality)
        .with_speed(speed);

    let encoded = if img.color().has_alpha() {
        let rgba = img.to_rgba8();
        let pixels: Vec<RGBA8> = rgba
            .pixels()
            .map(|p| RGBA8::new(p[0], p[1], p[2], p[3]))
            .collect();
        encoder
            .encode_rgba(Img::new(&pixels[..], width, height))
            .with_context(|| format!("AVIF encoding failed: {}", input.display()))?
    } else {
        let rgb = img.to_rgb8();
        let pixels: Vec<RGB8> = rgb.pixels().map(|p| RGB8::new(p[0], p[1], p[2])).collect();
        encoder
            .encode_rgb(Img::new(&pixels[..], width, height))
            .with_context(|| format!("AVIF encoding failed: {}", input.display()))?
    };

    fs::write(output, encoded.avif_file)
        .with_context(|| format!("Failed to write AVIF file: {}", output.display()))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage, Rgba, RgbaImage};
    use temp_dir::TempDir;

    #[test]
    fn test_encode_avif_rgb() {
        let dir = TempDir::new().unwrap();
        let input = dir.child("gradient.png");
        let output = dir.child("gradient.avif");

        let img = RgbImage::from_fn(16, 16, |x, y| Rgb([(x * 16) as u8, (y * 16) as u8, 128]));
        img.save(&input).unwrap();

        encode_avif(&input, &output, 60.0, 10).unwrap();

        let bytes = fs::read(&output).unwrap();
        // ISO BMFF: size (4 bytes) then "ftyp", brand "avif"
        assert_eq!(&bytes[4..8], b"ftyp");
        assert_eq!(&bytes[8..12], b"avif");
    }

    #[test]
    fn test_encode_avif_with_alpha() {
        let dir = TempDir::new().unwrap();
        let input = dir.child("overlay.png");
        let output = dir.child("overlay.avif");

        let img = RgbaImage::from_pixel(8, 8, Rgba([255, 0, 0, 100]));
        img.save(&input).unwrap();

        encode_avif(&input, &output, 60.0, 10).unwrap();
        assert!(fs::metadata(&output).unwrap().len() > 0);
    }

    #[test]
    fn test_encode_avif_rejects_garbage() {
        let dir = TempDir::new().unwrap();
        let input = dir.child("broken.jpg");
        fs::write(&input, b"not a jpeg").unwrap();

        let result = encode_avif(&input, &dir.child("broken.avif"), 80.0, 6);
        assert!(result.is_err());
        assert!(!dir.child("broken.avif").exists());
    }
}
