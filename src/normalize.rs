//! Orientation normalization for uploaded photos.
//!
//! Phone cameras often store pixels sideways and record the intended rotation
//! in the EXIF `Orientation` tag. Decoding, applying that tag and re-encoding as
//! JPEG yields an image that renders upright everywhere and carries no
//! orientation metadata any more.

use std::io::Cursor;

use base64::{engine::general_purpose, Engine as _};
use image::{DynamicImage, ImageOutputFormat};
use tracing::debug;

pub const JPEG_MEDIA_TYPE: &str = "image/jpeg";
const JPEG_QUALITY: u8 = 85;

#[derive(Debug, thiserror::Error)]
enum NormalizeError {
    #[error("decode failed: {0}")]
    Decode(#[source] image::ImageError),
    #[error("encode failed: {0}")]
    Encode(#[source] image::ImageError),
}

/// An image ready to be previewed or sent to the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedImage {
    pub bytes: Vec<u8>,
    pub media_type: String,
    /// `false` when decoding failed and `bytes` are the untouched upload.
    pub normalized: bool,
}

impl NormalizedImage {
    pub fn data_url(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.media_type,
            general_purpose::STANDARD.encode(&self.bytes)
        )
    }
}

/// Decodes `data`, applies its EXIF orientation and re-encodes it as JPEG.
///
/// Never fails: undecodable input is passed through unchanged with
/// `normalized` set to `false`.
pub fn normalize_orientation(data: &[u8], declared_media_type: &str) -> NormalizedImage {
    match reencode_upright(data) {
        Ok(bytes) => NormalizedImage {
            bytes,
            media_type: JPEG_MEDIA_TYPE.to_string(),
            normalized: true,
        },
        Err(e) => {
            debug!("Keeping original bytes ({} bytes): {}", data.len(), e);
            NormalizedImage {
                bytes: data.to_vec(),
                media_type: declared_media_type.to_string(),
                normalized: false,
            }
        }
    }
}

fn reencode_upright(data: &[u8]) -> Result<Vec<u8>, NormalizeError> {
    let img = image::load_from_memory(data).map_err(NormalizeError::Decode)?;
    let img = match read_orientation(data) {
        Some(orientation) => apply_orientation(img, orientation),
        None => img,
    };

    // JPEG has no alpha channel
    let rgb = DynamicImage::ImageRgb8(img.to_rgb8());

    let mut jpeg_bytes = Vec::new();
    rgb.write_to(
        &mut Cursor::new(&mut jpeg_bytes),
        ImageOutputFormat::Jpeg(JPEG_QUALITY),
    )
    .map_err(NormalizeError::Encode)?;

    Ok(jpeg_bytes)
}

/// Returns the EXIF orientation value (1-8), if the container carries one.
pub fn read_orientation(data: &[u8]) -> Option<u32> {
    let exif = exif::Reader::new()
        .read_from_container(&mut Cursor::new(data))
        .ok()?;
    let field = exif.get_field(exif::Tag::Orientation, exif::In::PRIMARY)?;
    field.value.get_uint(0)
}

fn apply_orientation(img: DynamicImage, orientation: u32) -> DynamicImage {
    match orientation {
        2 => img.fliph(),
        3 => img.rotate180(),
        4 => img.flipv(),
        5 => img.rotate90().fliph(),
        6 => img.rotate90(),
        7 => img.rotate270().fliph(),
        8 => img.rotate270(),
        _ => img,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GenericImageView, Rgb, RgbImage};

    /// 64x32, left half red, right half blue.
    fn split_image() -> RgbImage {
        RgbImage::from_fn(64, 32, |x, _| {
            if x < 32 {
                Rgb([220, 20, 20])
            } else {
                Rgb([20, 20, 220])
            }
        })
    }

    fn encode_jpeg(img: &RgbImage) -> Vec<u8> {
        let mut out = Vec::new();
        DynamicImage::ImageRgb8(img.clone())
            .write_to(&mut Cursor::new(&mut out), ImageOutputFormat::Jpeg(95))
            .unwrap();
        out
    }

    /// Splices a minimal big-endian EXIF APP1 segment carrying `orientation`
    /// right after the JPEG SOI marker.
    fn with_orientation(jpeg: &[u8], orientation: u16) -> Vec<u8> {
        let mut tiff = Vec::new();
        tiff.extend_from_slice(b"MM\x00\x2a\x00\x00\x00\x08");
        tiff.extend_from_slice(&1u16.to_be_bytes());
        tiff.extend_from_slice(&0x0112u16.to_be_bytes());
        tiff.extend_from_slice(&3u16.to_be_bytes());
        tiff.extend_from_slice(&1u32.to_be_bytes());
        tiff.extend_from_slice(&orientation.to_be_bytes());
        tiff.extend_from_slice(&[0, 0]);
        tiff.extend_from_slice(&0u32.to_be_bytes());

        let mut payload = b"Exif\x00\x00".to_vec();
        payload.extend_from_slice(&tiff);

        let mut out = jpeg[..2].to_vec();
        out.extend_from_slice(&[0xff, 0xe1]);
        out.extend_from_slice(&((payload.len() + 2) as u16).to_be_bytes());
        out.extend_from_slice(&payload);
        out.extend_from_slice(&jpeg[2..]);
        out
    }

    fn is_red(p: image::Rgba<u8>) -> bool {
        p[0] > 150 && p[2] < 100
    }

    fn is_blue(p: image::Rgba<u8>) -> bool {
        p[2] > 150 && p[0] < 100
    }

    #[test]
    fn test_plain_jpeg_is_reencoded() {
        let jpeg = encode_jpeg(&split_image());
        let out = normalize_orientation(&jpeg, "image/jpeg");

        assert!(out.normalized);
        assert_eq!(out.media_type, "image/jpeg");
        let decoded = image::load_from_memory(&out.bytes).unwrap();
        assert_eq!(decoded.dimensions(), (64, 32));
    }

    #[test]
    fn test_png_becomes_jpeg() {
        let mut png = Vec::new();
        DynamicImage::ImageRgb8(split_image())
            .write_to(&mut Cursor::new(&mut png), ImageOutputFormat::Png)
            .unwrap();

        let out = normalize_orientation(&png, "image/png");
        assert!(out.normalized);
        assert_eq!(out.media_type, JPEG_MEDIA_TYPE);
        assert_eq!(&out.bytes[..2], &[0xff, 0xd8]);
    }

    #[test]
    fn test_read_orientation_from_app1() {
        let jpeg = with_orientation(&encode_jpeg(&split_image()), 6);
        assert_eq!(read_orientation(&jpeg), Some(6));
        assert_eq!(read_orientation(&encode_jpeg(&split_image())), None);
    }

    #[test]
    fn test_rotated_photo_is_turned_upright() {
        let jpeg = with_orientation(&encode_jpeg(&split_image()), 6);
        let out = normalize_orientation(&jpeg, "image/jpeg");
        assert!(out.normalized);

        let decoded = image::load_from_memory(&out.bytes).unwrap();
        assert_eq!(decoded.dimensions(), (32, 64));
        // rotating clockwise moves the left (red) half to the top
        assert!(is_red(decoded.get_pixel(16, 8)));
        assert!(is_blue(decoded.get_pixel(16, 56)));
        assert_eq!(read_orientation(&out.bytes), None);
    }

    #[test]
    fn test_mirrored_photo_is_flipped_back() {
        let jpeg = with_orientation(&encode_jpeg(&split_image()), 2);
        let decoded =
            image::load_from_memory(&normalize_orientation(&jpeg, "image/jpeg").bytes).unwrap();
        assert_eq!(decoded.dimensions(), (64, 32));
        assert!(is_blue(decoded.get_pixel(8, 16)));
        assert!(is_red(decoded.get_pixel(56, 16)));
    }

    #[test]
    fn test_normalization_is_idempotent() {
        let jpeg = with_orientation(&encode_jpeg(&split_image()), 8);
        let once = normalize_orientation(&jpeg, "image/jpeg");
        let twice = normalize_orientation(&once.bytes, &once.media_type);
        assert!(twice.normalized);

        let a = image::load_from_memory(&once.bytes).unwrap().to_rgb8();
        let b = image::load_from_memory(&twice.bytes).unwrap().to_rgb8();
        assert_eq!(a.dimensions(), b.dimensions());

        let total: u64 = a
            .pixels()
            .zip(b.pixels())
            .flat_map(|(p, q)| p.0.iter().zip(q.0.iter()).map(|(x, y)| x.abs_diff(*y) as u64))
            .sum();
        let mean = total as f64 / (a.width() * a.height() * 3) as f64;
        assert!(mean < 4.0, "mean channel drift {}", mean);
    }

    #[test]
    fn test_undecodable_upload_falls_back_to_raw_bytes() {
        let out = normalize_orientation(b"definitely not an image", "image/heic");
        assert!(!out.normalized);
        assert_eq!(out.bytes, b"definitely not an image");
        assert_eq!(out.media_type, "image/heic");
    }

    #[test]
    fn test_data_url() {
        let img = NormalizedImage {
            bytes: vec![1, 2, 3],
            media_type: "image/jpeg".to_string(),
            normalized: true,
        };
        assert_eq!(img.data_url(), "data:image/jpeg;base64,AQID");
    }
}
