//! Image probe sources accepted by the query encoders.

use std::fmt;
use std::path::PathBuf;

use image::RgbImage;

/// Where a probe image comes from. One shared loader reduces every variant to
/// a decoded RGB buffer before model-specific preprocessing.
#[derive(Clone)]
pub enum ImageSource {
    /// Local file path.
    Path(PathBuf),
    /// `http://` or `https://` URL, fetched with a bounded timeout.
    HttpUrl(String),
    /// Full `data:image/...;base64,...` URL.
    DataUrl(String),
    /// Raw encoded image bytes (jpeg/png/webp).
    Bytes(Vec<u8>),
    /// Already-decoded pixels.
    Decoded(RgbImage),
}

impl ImageSource {
    /// Short human-readable description for error messages and logs.
    /// Never includes payload bytes.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            ImageSource::Path(p) => format!("path {}", p.display()),
            ImageSource::HttpUrl(url) => format!("url {url}"),
            ImageSource::DataUrl(_) => "data url".to_string(),
            ImageSource::Bytes(b) => format!("{} raw bytes", b.len()),
            ImageSource::Decoded(img) => {
                format!("decoded {}x{} image", img.width(), img.height())
            }
        }
    }
}

impl fmt::Debug for ImageSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn describe_omits_payloads() {
        let src = ImageSource::Bytes(vec![0u8; 128]);
        assert_eq!(src.describe(), "128 raw bytes");

        let src = ImageSource::DataUrl("data:image/png;base64,AAAA".into());
        assert_eq!(src.describe(), "data url");
    }
}
