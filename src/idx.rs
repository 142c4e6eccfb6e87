//! Reader for the IDX files the MNIST handwritten digit database ships in.
//!
//! Both file kinds start with a big-endian magic number and item count.
//! Image files follow that with the row and column counts and then one
//! unsigned byte per pixel; label files follow it with one byte per label.

use std::fs;
use std::path::Path;

use anyhow::{bail, ensure, Context, Result};
use rand::seq::SliceRandom;
use rand::Rng;
use tracing::info;

use crate::linalg::Vector;
use crate::sample::TrainingSample;

pub const IMAGE_MAGIC: u32 = 0x0000_0803;
pub const LABEL_MAGIC: u32 = 0x0000_0801;

/// Digits 0 through 9.
pub const NUM_CLASSES: usize = 10;

pub const TRAINING_IMAGES: &str = "train-images.idx3-ubyte";
pub const TRAINING_LABELS: &str = "train-labels.idx1-ubyte";
pub const TEST_IMAGES: &str = "t10k-images.idx3-ubyte";
pub const TEST_LABELS: &str = "t10k-labels.idx1-ubyte";

fn read_u32(data: &[u8], offset: usize) -> Result<u32> {
    let bytes = data
        .get(offset..offset + 4)
        .context("unexpected end of file in IDX header")?;
    Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

/// Decode an image file. Pixels are scaled from `0..=255` into `[0, 1]`.
pub fn parse_images(data: &[u8]) -> Result<Vec<Vector>> {
    let magic = read_u32(data, 0)?;
    ensure!(
        magic == IMAGE_MAGIC,
        "not an IDX image file: magic number {magic:#010x}"
    );
    let count = read_u32(data, 4)? as usize;
    let rows = read_u32(data, 8)? as usize;
    let cols = read_u32(data, 12)? as usize;
    ensure!(
        rows > 0 && cols > 0,
        "IDX image file declares {rows}x{cols} images"
    );
    let pixels = &data[16..];
    let expected = rows
        .checked_mul(cols)
        .and_then(|size| size.checked_mul(count))
        .context("IDX image dimensions overflow")?;
    if pixels.len() < expected {
        bail!(
            "IDX image file truncated: {count} images of {rows}x{cols} need {expected} bytes, found {}",
            pixels.len()
        );
    }
    Ok(pixels[..expected]
        .chunks_exact(rows * cols)
        .map(|image| image.iter().map(|&p| f64::from(p) / 255.0).collect())
        .collect())
}

pub fn parse_labels(data: &[u8]) -> Result<Vec<u8>> {
    let magic = read_u32(data, 0)?;
    ensure!(
        magic == LABEL_MAGIC,
        "not an IDX label file: magic number {magic:#010x}"
    );
    let count = read_u32(data, 4)? as usize;
    let labels = &data[8..];
    if labels.len() < count {
        bail!(
            "IDX label file truncated: {count} labels, found {}",
            labels.len()
        );
    }
    Ok(labels[..count].to_vec())
}

pub fn read_images(path: &Path) -> Result<Vec<Vector>> {
    let data = fs::read(path).with_context(|| format!("error reading image file {path:?}"))?;
    parse_images(&data).with_context(|| format!("invalid image file {path:?}"))
}

pub fn read_labels(path: &Path) -> Result<Vec<u8>> {
    let data = fs::read(path).with_context(|| format!("error reading label file {path:?}"))?;
    parse_labels(&data).with_context(|| format!("invalid label file {path:?}"))
}

/// Images paired with the digit each one shows.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    images: Vec<Vector>,
    labels: Vec<u8>,
}

impl Dataset {
    pub fn new(images: Vec<Vector>, labels: Vec<u8>) -> Result<Self> {
        ensure!(
            images.len() == labels.len(),
            "{} images but {} labels",
            images.len(),
            labels.len()
        );
        if let Some(i) = labels.iter().position(|&l| l as usize >= NUM_CLASSES) {
            bail!("label {} of item {i} is not a digit", labels[i]);
        }
        Ok(Dataset { images, labels })
    }

    /// Read `dir/image_file` and `dir/label_file`.
    pub fn load(dir: &Path, image_file: &str, label_file: &str) -> Result<Self> {
        let images = read_images(&dir.join(image_file))?;
        let labels = read_labels(&dir.join(label_file))?;
        let dataset = Dataset::new(images, labels)
            .with_context(|| format!("{image_file} and {label_file} do not match"))?;
        info!(?dir, image_file, items = dataset.len(), "loaded dataset");
        Ok(dataset)
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn images(&self) -> &[Vector] {
        &self.images
    }

    pub fn labels(&self) -> &[u8] {
        &self.labels
    }

    /// Draw `size` distinct items at random and divide them into a training
    /// set and a validation set. The validation set gets the fraction
    /// `validation_fraction` of them, rounded up.
    pub fn split<R: Rng + ?Sized>(
        &self,
        validation_fraction: f64,
        size: usize,
        rng: &mut R,
    ) -> Result<(Dataset, Dataset)> {
        ensure!(
            validation_fraction > 0.0 && validation_fraction <= 1.0,
            "validation fraction {validation_fraction} must be in (0, 1]"
        );
        ensure!(
            size <= self.len(),
            "cannot draw {size} items from a dataset of {}",
            self.len()
        );
        let mut perm: Vec<usize> = (0..self.len()).collect();
        perm.shuffle(rng);
        let training_size = (size as f64 * (1.0 - validation_fraction)) as usize;
        let subset = |indices: &[usize]| Dataset {
            images: indices.iter().map(|&i| self.images[i].clone()).collect(),
            labels: indices.iter().map(|&i| self.labels[i]).collect(),
        };
        Ok((
            subset(&perm[..training_size]),
            subset(&perm[training_size..size]),
        ))
    }

    /// One sample per item, with a one-hot expected output of
    /// `NUM_CLASSES` entries.
    pub fn to_samples(&self) -> Vec<TrainingSample> {
        self.images
            .iter()
            .zip(&self.labels)
            .map(|(image, &label)| {
                let mut y = Vector::zeros(NUM_CLASSES);
                y[label as usize] = 1.0;
                TrainingSample::new(image.clone(), y)
            })
            .collect()
    }
}
