use image::{DynamicImage, ImageOutputFormat, Luma};
use qrcode::QrCode;
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Pixels per QR module
const MODULE_SIZE: u32 = 10;

/// Encode `data` as a QR code PNG
///
/// Black modules on white, ten pixels per module, with the standard four
/// module quiet zone. The same input always yields the same bytes.
///
/// # Examples
/// ```
/// use attendance::qr::encode_png;
///
/// let png = encode_png("http://192.168.1.10:5000/mobile").unwrap();
/// assert_eq!(&png[1..4], b"PNG");
/// ```
pub fn encode_png(data: &str) -> Result<Vec<u8>> {
    let code = QrCode::new(data.as_bytes())?;
    let image = code
        .render::<Luma<u8>>()
        .quiet_zone(true)
        .module_dimensions(MODULE_SIZE, MODULE_SIZE)
        .build();

    let mut buffer = Vec::new();
    DynamicImage::ImageLuma8(image).write_to(&mut Cursor::new(&mut buffer), ImageOutputFormat::Png)?;

    Ok(buffer)
}

/// Writes one QR image per student into a directory
///
/// Images are named `<id>.png` and encode the bare identifier, which is what
/// the scanner page submits.
#[derive(Debug, Clone)]
pub struct QrIssuer {
    dir: PathBuf,
}

impl QrIssuer {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        QrIssuer { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Where the image for `id` lives, whether or not it was issued yet
    pub fn image_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{}.png", id))
    }

    /// Write the QR image for `id`, replacing any earlier one
    pub fn issue(&self, id: &str) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;

        let path = self.image_path(id);
        fs::write(&path, encode_png(id)?)?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::GenericImageView;
    use tempfile::tempdir;

    const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

    #[test]
    fn encoding_is_deterministic() {
        let first = encode_png("12345").unwrap();
        let second = encode_png("12345").unwrap();

        assert_eq!(&first[..8], &PNG_SIGNATURE);
        assert_eq!(first, second);
        assert_ne!(first, encode_png("12346").unwrap());
    }

    #[test]
    fn image_is_square_with_quiet_zone() {
        let png = encode_png("1").unwrap();
        let image = image::load_from_memory(&png).unwrap();

        // Version 1 is 21 modules wide, plus 4 quiet modules on each side.
        assert_eq!(image.width(), (21 + 8) * MODULE_SIZE);
        assert_eq!(image.width(), image.height());
    }

    #[test]
    fn issue_writes_and_overwrites_keyed_file() {
        let dir = tempdir().unwrap();
        let issuer = QrIssuer::new(dir.path().join("qrcodes"));

        let path = issuer.issue("s-1").unwrap();
        assert_eq!(path, dir.path().join("qrcodes").join("s-1.png"));
        let first = fs::read(&path).unwrap();

        fs::write(&path, b"stale").unwrap();
        issuer.issue("s-1").unwrap();
        assert_eq!(fs::read(&path).unwrap(), first);
    }
}
