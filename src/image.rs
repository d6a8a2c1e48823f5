use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::memory::MEMORY_MAX;

/// Binary program image: an origin address followed by words to place from there.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Image {
    origin: u16,
    words: Vec<u16>,
}

#[derive(Debug)]
pub enum ImageError {
    Open { path: PathBuf, source: io::Error },
    /// File does not contain an origin word
    Empty { path: PathBuf },
    /// File is not a whole number of 16-bit words
    Misaligned { path: PathBuf, len: usize },
}

impl Image {
    pub fn new(origin: u16, words: Vec<u16>) -> Self {
        let mut image = Self { origin, words };
        image.words.truncate(MEMORY_MAX - origin as usize);
        image
    }

    /// Read an image file from disk.
    pub fn read(path: impl AsRef<Path>) -> Result<Self, ImageError> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|source| ImageError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_bytes(&bytes).map_err(|e| e.with_path(path))
    }

    /// Parse an image from big-endian words.
    ///
    /// Errors returned here have an empty path.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ImageError> {
        if bytes.len() % 2 != 0 {
            return Err(ImageError::Misaligned {
                path: PathBuf::new(),
                len: bytes.len(),
            });
        }
        let mut words = bytes
            .chunks_exact(2)
            .map(|word| u16::from_be_bytes([word[0], word[1]]));

        let Some(origin) = words.next() else {
            return Err(ImageError::Empty {
                path: PathBuf::new(),
            });
        };
        Ok(Self::new(origin, words.collect()))
    }

    pub fn origin(&self) -> u16 {
        self.origin
    }

    pub fn words(&self) -> &[u16] {
        &self.words
    }

    /// Serialize back to the on-disk format.
    pub fn to_bytes(&self) -> Vec<u8> {
        std::iter::once(self.origin)
            .chain(self.words.iter().copied())
            .flat_map(u16::to_be_bytes)
            .collect()
    }
}

impl ImageError {
    pub fn path(&self) -> &Path {
        match self {
            Self::Open { path, .. } | Self::Empty { path } | Self::Misaligned { path, .. } => path,
        }
    }

    fn with_path(mut self, new_path: &Path) -> Self {
        match &mut self {
            Self::Open { path, .. } | Self::Empty { path } | Self::Misaligned { path, .. } => {
                *path = new_path.to_path_buf()
            }
        }
        self
    }
}

impl std::error::Error for ImageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Open { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl fmt::Display for ImageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to load image: {}", self.path().display())
    }
}
