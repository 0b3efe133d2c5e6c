//! Loader for the MNIST IDX binary files (images + labels) into the flat
//! byte buffers the rest of the toolkit consumes.
//!
//! IDX headers are big-endian by specification, unlike the model format.
//! Everything that can go wrong with a file on disk is reported as a
//! recoverable `io::Error`, never a panic.

use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

/// Magic number of an IDX3 image file.
pub const IMAGE_MAGIC: u32 = 0x0000_0803;
/// Magic number of an IDX1 label file.
pub const LABEL_MAGIC: u32 = 0x0000_0801;
/// MNIST images are always 28x28 pixels.
pub const IMAGE_PIXELS: usize = 28 * 28;

/// Flat pixel and label buffers, paired by sample count: `images` holds
/// `num_samples * IMAGE_PIXELS` bytes, `labels` one class byte per sample.
#[derive(Debug)]
pub struct Dataset {
    pub images: Vec<u8>,
    pub labels: Vec<u8>,
}

impl Dataset {
    pub fn num_samples(&self) -> usize {
        self.labels.len()
    }
}

pub struct MnistLoader;

impl MnistLoader {
    /// Reads an image/label file pair. The image count and label count must
    /// agree; mismatched files are `InvalidData`.
    pub fn load(image_path: impl AsRef<Path>, label_path: impl AsRef<Path>) -> io::Result<Dataset> {
        let mut image_reader = BufReader::new(File::open(image_path)?);
        let images = parse_images(&mut image_reader)?;

        let mut label_reader = BufReader::new(File::open(label_path)?);
        let labels = parse_labels(&mut label_reader)?;

        if images.len() / IMAGE_PIXELS != labels.len() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "image file holds {} samples but label file holds {}",
                    images.len() / IMAGE_PIXELS,
                    labels.len()
                ),
            ));
        }
        Ok(Dataset { images, labels })
    }
}

fn parse_images(input: &mut dyn Read) -> io::Result<Vec<u8>> {
    let magic = read_u32_be(input)?;
    if magic != IMAGE_MAGIC {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("bad magic number {magic:#010x} in image file"),
        ));
    }

    let count = read_u32_be(input)? as usize;
    let rows = read_u32_be(input)? as usize;
    let cols = read_u32_be(input)? as usize;
    if count == 0 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "image file declares zero images",
        ));
    }
    if rows != 28 || cols != 28 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("expected 28x28 images, file declares {rows}x{cols}"),
        ));
    }

    let len = count.checked_mul(IMAGE_PIXELS).ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            "image count overflows the pixel buffer size",
        )
    })?;
    let mut pixels = vec![0u8; len];
    input.read_exact(&mut pixels)?;
    Ok(pixels)
}

fn parse_labels(input: &mut dyn Read) -> io::Result<Vec<u8>> {
    let magic = read_u32_be(input)?;
    if magic != LABEL_MAGIC {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("bad magic number {magic:#010x} in label file"),
        ));
    }

    let count = read_u32_be(input)? as usize;
    let mut labels = vec![0u8; count];
    input.read_exact(&mut labels)?;
    Ok(labels)
}

fn read_u32_be(input: &mut dyn Read) -> io::Result<u32> {
    let mut buf = [0u8; 4];
    input.read_exact(&mut buf)?;
    Ok(u32::from_be_bytes(buf))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn image_bytes(count: u32) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend(IMAGE_MAGIC.to_be_bytes());
        bytes.extend(count.to_be_bytes());
        bytes.extend(28u32.to_be_bytes());
        bytes.extend(28u32.to_be_bytes());
        for i in 0..count as usize * IMAGE_PIXELS {
            bytes.push((i % 251) as u8);
        }
        bytes
    }

    fn label_bytes(labels: &[u8]) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend(LABEL_MAGIC.to_be_bytes());
        bytes.extend((labels.len() as u32).to_be_bytes());
        bytes.extend(labels);
        bytes
    }

    #[test]
    fn parses_well_formed_files() {
        let images = parse_images(&mut Cursor::new(image_bytes(3))).unwrap();
        assert_eq!(images.len(), 3 * IMAGE_PIXELS);
        assert_eq!(images[1], 1);

        let labels = parse_labels(&mut Cursor::new(label_bytes(&[7, 0, 9]))).unwrap();
        assert_eq!(labels, vec![7, 0, 9]);
    }

    #[test]
    fn rejects_bad_magic_numbers() {
        let mut bytes = image_bytes(1);
        bytes[3] = 0x04;
        let err = parse_images(&mut Cursor::new(bytes)).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);

        let err = parse_labels(&mut Cursor::new(image_bytes(1))).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn rejects_unexpected_image_dimensions() {
        let mut bytes = image_bytes(1);
        bytes[8..12].copy_from_slice(&14u32.to_be_bytes());
        let err = parse_images(&mut Cursor::new(bytes)).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
        assert!(err.to_string().contains("14x28"));
    }

    #[test]
    fn truncated_pixel_data_is_an_error() {
        let mut bytes = image_bytes(2);
        bytes.truncate(bytes.len() - 100);
        let err = parse_images(&mut Cursor::new(bytes)).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn load_rejects_mismatched_sample_counts() {
        let dir = tempfile::tempdir().unwrap();
        let image_path = dir.path().join("images.idx3-ubyte");
        let label_path = dir.path().join("labels.idx1-ubyte");
        std::fs::write(&image_path, image_bytes(2)).unwrap();
        std::fs::write(&label_path, label_bytes(&[1, 2, 3])).unwrap();

        let err = MnistLoader::load(&image_path, &label_path).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
        assert!(err.to_string().contains("2 samples"));
    }

    #[test]
    fn load_pairs_images_with_labels() {
        let dir = tempfile::tempdir().unwrap();
        let image_path = dir.path().join("images.idx3-ubyte");
        let label_path = dir.path().join("labels.idx1-ubyte");
        std::fs::write(&image_path, image_bytes(2)).unwrap();
        std::fs::write(&label_path, label_bytes(&[4, 1])).unwrap();

        let dataset = MnistLoader::load(&image_path, &label_path).unwrap();
        assert_eq!(dataset.num_samples(), 2);
        assert_eq!(dataset.images.len(), 2 * IMAGE_PIXELS);
        assert_eq!(dataset.labels, vec![4, 1]);
    }

    #[test]
    fn missing_file_is_a_plain_io_error() {
        let err = MnistLoader::load("/no/such/images", "/no/such/labels").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
