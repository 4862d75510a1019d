//! Converts downloaded artwork to PNG, the only format hosts display.

use std::io::Cursor;

use image::ImageFormat;

use crate::ArtworkError;

/// Decodes any supported image and re-encodes it as PNG.
///
/// PNG input is passed through untouched once it decodes.
pub fn to_png(bytes: &[u8]) -> Result<Vec<u8>, ArtworkError> {
    let format = image::guess_format(bytes).map_err(|e| ArtworkError::Decode(e.to_string()))?;
    let decoded =
        image::load_from_memory_with_format(bytes, format).map_err(|e| ArtworkError::Decode(e.to_string()))?;
    if format == ImageFormat::Png {
        return Ok(bytes.to_vec());
    }
    let mut cursor = Cursor::new(Vec::new());
    decoded
        .write_to(&mut cursor, ImageFormat::Png)
        .map_err(|e| ArtworkError::Decode(e.to_string()))?;
    Ok(cursor.into_inner())
}

#[cfg(test)]
pub(crate) fn encode_sample(format: ImageFormat) -> Vec<u8> {
    let img = image::DynamicImage::ImageRgb8(image::RgbImage::from_pixel(4, 6, image::Rgb([200, 40, 90])));
    let mut cursor = Cursor::new(Vec::new());
    img.write_to(&mut cursor, format).unwrap();
    cursor.into_inner()
}
