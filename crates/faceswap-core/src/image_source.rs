//! Uploaded image files and their decoded pixels.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use image::{DynamicImage, ImageDecoder, ImageError, ImageReader};
use std::io::{self, Cursor};
use std::path::{Path, PathBuf};
use thiserror::Error;

const FALLBACK_MIME: &str = "application/octet-stream";

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("cannot read image {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("image {0} is empty")]
    Empty(String),
    #[error("cannot decode image {name}: {source}")]
    Decode {
        name: String,
        #[source]
        source: image::ImageError,
    },
}

/// An uploaded photo: the encoded bytes exactly as supplied by the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageFile {
    name: String,
    bytes: Vec<u8>,
    mime: &'static str,
}

impl ImageFile {
    /// Wrap encoded bytes, sniffing the MIME type from the content.
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let mime = image::guess_format(&bytes)
            .map(|f| f.to_mime_type())
            .unwrap_or(FALLBACK_MIME);
        Self {
            name: name.into(),
            bytes,
            mime,
        }
    }

    /// Read a file from disk.
    pub fn open(path: &Path) -> Result<Self, DecodeError> {
        let bytes = std::fs::read(path).map_err(|source| DecodeError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::new(path.display().to_string(), bytes))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn mime(&self) -> &'static str {
        self.mime
    }

    /// Standard base64 of the encoded bytes, without a data URI prefix.
    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.bytes)
    }

    /// `data:<mime>;base64,...` for the unmodified file.
    pub fn data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime, self.to_base64())
    }

    /// Decode the pixels upright, applying any EXIF orientation tag, so the
    /// reported dimensions match how the photo is displayed. CPU-bound; async
    /// callers should run it off the runtime.
    pub fn decode(&self) -> Result<DecodedImage, DecodeError> {
        if self.bytes.is_empty() {
            return Err(DecodeError::Empty(self.name.clone()));
        }
        let pixels = decode_oriented(&self.bytes).map_err(|source| DecodeError::Decode {
            name: self.name.clone(),
            source,
        })?;
        Ok(DecodedImage { pixels })
    }
}

fn decode_oriented(bytes: &[u8]) -> Result<DynamicImage, ImageError> {
    let mut decoder = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()?
        .into_decoder()?;
    let orientation = decoder.orientation()?;
    let mut pixels = DynamicImage::from_decoder(decoder)?;
    if orientation != image::metadata::Orientation::NoTransforms {
        tracing::debug!(?orientation, "applying EXIF orientation");
    }
    pixels.apply_orientation(orientation);
    Ok(pixels)
}

/// Decoded pixels of an [`ImageFile`].
#[derive(Debug, Clone)]
pub struct DecodedImage {
    pixels: DynamicImage,
}

impl DecodedImage {
    pub fn from_pixels(pixels: DynamicImage) -> Self {
        Self { pixels }
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn pixels(&self) -> &DynamicImage {
        &self.pixels
    }
}
