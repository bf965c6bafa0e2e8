//! Shared probe-image loader.
//!
//! Reduces every [`ImageSource`] variant to a decoded RGB buffer before any
//! model-specific preprocessing. Transport failures (HTTP) surface as
//! `HttpFetchFailed`; everything else (unreadable file, bad base64, undecodable
//! bytes) is `ImageLoadFailed` with the offending source named.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use image::RgbImage;
use once_cell::sync::Lazy;

use crate::constants::HTTP_FETCH_TIMEOUT;
use crate::error::{EngineError, Result};
use crate::types::ImageSource;

static HTTP_CLIENT: Lazy<Option<reqwest::blocking::Client>> = Lazy::new(|| {
    reqwest::blocking::Client::builder()
        .timeout(HTTP_FETCH_TIMEOUT)
        .build()
        .ok()
});

/// Decode a probe image from any accepted source.
pub fn load_rgb(source: &ImageSource) -> Result<RgbImage> {
    let fail = |cause: String| EngineError::ImageLoadFailed {
        source_desc: source.describe(),
        cause,
    };

    match source {
        ImageSource::Decoded(img) => Ok(img.clone()),
        ImageSource::Path(path) => {
            let bytes = fs_err::read(path).map_err(|e| fail(e.to_string()))?;
            decode(&bytes).map_err(|e| fail(e))
        }
        ImageSource::Bytes(bytes) => decode(bytes).map_err(|e| fail(e)),
        ImageSource::DataUrl(url) => {
            let encoded = url
                .strip_prefix("data:image/")
                .and_then(|rest| rest.split_once(','))
                .map(|(_, payload)| payload)
                .ok_or_else(|| fail("not a data:image/...;base64 url".to_string()))?;
            let bytes = BASE64
                .decode(encoded.trim())
                .map_err(|e| fail(format!("invalid base64: {e}")))?;
            decode(&bytes).map_err(|e| fail(e))
        }
        ImageSource::HttpUrl(url) => {
            let client = HTTP_CLIENT
                .as_ref()
                .ok_or_else(|| EngineError::HttpFetchFailed {
                    url: url.clone(),
                    cause: "http client unavailable".to_string(),
                })?;
            let response = client
                .get(url)
                .send()
                .and_then(reqwest::blocking::Response::error_for_status)
                .map_err(|e| EngineError::HttpFetchFailed {
                    url: url.clone(),
                    cause: e.to_string(),
                })?;
            let bytes = response.bytes().map_err(|e| EngineError::HttpFetchFailed {
                url: url.clone(),
                cause: e.to_string(),
            })?;
            decode(&bytes).map_err(|e| fail(e))
        }
    }
}

fn decode(bytes: &[u8]) -> std::result::Result<RgbImage, String> {
    image::load_from_memory(bytes)
        .map(|img| img.to_rgb8())
        .map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::ImageEncoder;
    use std::io::Cursor;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_pixel(width, height, image::Rgb([10, 20, 30]));
        let mut out = Cursor::new(Vec::new());
        image::codecs::png::PngEncoder::new(&mut out)
            .write_image(img.as_raw(), width, height, image::ExtendedColorType::Rgb8)
            .expect("encode png");
        out.into_inner()
    }

    #[test]
    fn decodes_raw_bytes() {
        let img = load_rgb(&ImageSource::Bytes(png_bytes(4, 3))).expect("decode");
        assert_eq!((img.width(), img.height()), (4, 3));
    }

    #[test]
    fn decodes_data_urls() {
        let url = format!("data:image/png;base64,{}", BASE64.encode(png_bytes(2, 2)));
        let img = load_rgb(&ImageSource::DataUrl(url)).expect("decode");
        assert_eq!((img.width(), img.height()), (2, 2));
    }

    #[test]
    fn passes_through_decoded_images() {
        let original = RgbImage::from_pixel(5, 5, image::Rgb([1, 2, 3]));
        let img = load_rgb(&ImageSource::Decoded(original.clone())).expect("clone");
        assert_eq!(img, original);
    }

    #[test]
    fn garbage_bytes_fail_with_image_load_failed() {
        let err = load_rgb(&ImageSource::Bytes(vec![0u8; 16])).expect_err("garbage");
        assert_eq!(err.code(), "image_load_failed");
    }

    #[test]
    fn malformed_data_url_names_the_source() {
        let err = load_rgb(&ImageSource::DataUrl("data:text/plain,hi".into()))
            .expect_err("not an image url");
        assert_eq!(err.code(), "image_load_failed");
        assert!(err.to_string().contains("data url"));
    }

    #[test]
    fn missing_file_fails_with_image_load_failed() {
        let err = load_rgb(&ImageSource::Path("/nonexistent/probe.jpg".into()))
            .expect_err("missing");
        assert_eq!(err.code(), "image_load_failed");
    }
}
