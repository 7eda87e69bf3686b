use std::{fs::File, io::BufWriter, path::Path};

use image::{codecs::jpeg::JpegEncoder, imageops::FilterType, DynamicImage, ImageFormat, ImageReader};

pub const JPEG_QUALITY: u8 = 85;

#[derive(Debug, thiserror::Error)]
pub enum ImageJobError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}

/// Centre-crop to a square on the shorter side, then resize to `target`.
pub fn square_and_resize(img: &DynamicImage, target: u32) -> DynamicImage {
    let (width, height) = (img.width(), img.height());
    let side = width.min(height);
    let x = (width - side) / 2;
    let y = (height - side) / 2;

    img.crop_imm(x, y, side, side)
        .resize_exact(target, target, FilterType::Lanczos3)
}

/// Normalize the image at `path` in place.
///
/// The format of the existing file is kept; JPEG output uses quality 85.
pub fn normalize_image(path: &Path, target: u32) -> Result<(u32, u32), ImageJobError> {
    let reader = ImageReader::open(path)?.with_guessed_format()?;
    let format = reader.format().unwrap_or(ImageFormat::Jpeg);
    let img = reader.decode()?;

    let normalized = square_and_resize(&img, target);

    match format {
        ImageFormat::Jpeg => {
            let writer = BufWriter::new(File::create(path)?);
            let encoder = JpegEncoder::new_with_quality(writer, JPEG_QUALITY);
            normalized.to_rgb8().write_with_encoder(encoder)?;
        }
        other => normalized.save_with_format(path, other)?,
    }

    Ok((normalized.width(), normalized.height()))
}
