//! Raster images → single-page PDF.
//!
//! The image is decoded from its content (not its extension), flattened to
//! 8-bit RGB and re-encoded as JPEG, which PDF embeds natively through the
//! `DCTDecode` filter. The page is sized one point per pixel, i.e. the image
//! is placed at 72 DPI and fills the page exactly.

use crate::error::ConversionError;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, RgbImage};
use lopdf::{dictionary, Document, Object, Stream};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Convert the image at `input` into a PDF next to it (same stem, `.pdf`).
///
/// Decoding and encoding are CPU-bound, so the work runs on the blocking pool.
pub async fn image_to_pdf(input: &Path, jpeg_quality: u8) -> Result<PathBuf, ConversionError> {
    let input = input.to_path_buf();
    let output = input.with_extension("pdf");

    tokio::task::spawn_blocking(move || {
        image_to_pdf_blocking(&input, &output, jpeg_quality).map(|()| output)
    })
    .await
    .map_err(|e| ConversionError::Internal(format!("Image task panicked: {}", e)))?
}

fn image_to_pdf_blocking(
    input: &Path,
    output: &Path,
    jpeg_quality: u8,
) -> Result<(), ConversionError> {
    let decode_err = |detail: String| ConversionError::ImageDecode {
        path: input.to_path_buf(),
        detail,
    };

    let bytes = std::fs::read(input).map_err(|e| decode_err(e.to_string()))?;
    let img = image::load_from_memory(&bytes).map_err(|e| decode_err(e.to_string()))?;
    let rgb = img.to_rgb8();
    debug!(
        "Decoded {} → {}x{} px",
        input.display(),
        rgb.width(),
        rgb.height()
    );

    let write_err = |detail: String| ConversionError::PdfWrite {
        path: output.to_path_buf(),
        detail,
    };

    let (width, height) = rgb.dimensions();
    let jpeg = encode_jpeg(rgb, jpeg_quality).map_err(|e| write_err(e.to_string()))?;
    let mut doc = single_image_document(width, height, jpeg);
    doc.save(output).map_err(|e| write_err(e.to_string()))?;
    Ok(())
}

fn encode_jpeg(rgb: RgbImage, quality: u8) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    DynamicImage::ImageRgb8(rgb).write_with_encoder(JpegEncoder::new_with_quality(&mut buf, quality))?;
    Ok(buf)
}

/// A one-page document whose page is exactly the image.
fn single_image_document(width: u32, height: u32, jpeg: Vec<u8>) -> Document {
    let width = i64::from(width);
    let height = i64::from(height);

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let image_id = doc.add_object(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => width,
            "Height" => height,
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8i64,
            "Filter" => "DCTDecode",
        },
        jpeg,
    ));

    let content = format!("q\n{width} 0 0 {height} 0 0 cm\n/Im0 Do\nQ\n");
    let content_id = doc.add_object(Stream::new(lopdf::Dictionary::new(), content.into_bytes()));

    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => Object::Array(vec![
            Object::Integer(0),
            Object::Integer(0),
            Object::Integer(width),
            Object::Integer(height),
        ]),
        "Contents" => content_id,
        "Resources" => dictionary! {
            "XObject" => dictionary! {
                "Im0" => image_id,
            },
        },
    });

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => Object::Array(vec![Object::Reference(page_id)]),
            "Count" => 1i64,
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    doc
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    #[tokio::test]
    async fn png_with_alpha_becomes_one_page_pdf() {
        let tmp = tempfile::tempdir().unwrap();
        let input = tmp.path().join("scan.png");
        RgbaImage::from_pixel(40, 20, Rgba([255, 0, 0, 128]))
            .save(&input)
            .unwrap();

        let pdf = image_to_pdf(&input, 90).await.unwrap();
        assert_eq!(pdf, tmp.path().join("scan.pdf"));

        let doc = Document::load(&pdf).unwrap();
        assert_eq!(doc.get_pages().len(), 1);
        assert!(input.exists(), "input must be left in place");
    }

    #[tokio::test]
    async fn jpeg_named_png_is_decoded_by_content() {
        let tmp = tempfile::tempdir().unwrap();
        let input = tmp.path().join("photo.png");
        let jpeg = encode_jpeg(RgbImage::from_pixel(8, 8, image::Rgb([0, 128, 255])), 80).unwrap();
        std::fs::write(&input, jpeg).unwrap();

        let pdf = image_to_pdf(&input, 90).await.unwrap();
        assert!(pdf.exists());
    }

    #[tokio::test]
    async fn garbage_is_decode_error() {
        let tmp = tempfile::tempdir().unwrap();
        let input = tmp.path().join("broken.jpg");
        std::fs::write(&input, b"definitely not a jpeg").unwrap();

        let err = image_to_pdf(&input, 90).await.unwrap_err();
        assert!(matches!(err, ConversionError::ImageDecode { .. }), "got: {err:?}");
        assert!(!tmp.path().join("broken.pdf").exists());
    }

    #[test]
    fn page_matches_image_size() {
        let jpeg = encode_jpeg(RgbImage::new(300, 200), 75).unwrap();
        let doc = single_image_document(300, 200, jpeg);
        let (_, page_id) = doc.get_pages().into_iter().next().unwrap();
        let page = doc.get_dictionary(page_id).unwrap();
        let media_box = page.get(b"MediaBox").unwrap().as_array().unwrap();
        assert_eq!(media_box[2].as_i64().unwrap(), 300);
        assert_eq!(media_box[3].as_i64().unwrap(), 200);
    }
}
