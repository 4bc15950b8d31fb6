use crate::error::{FlattenError, Result};
use flate2::read::{DeflateDecoder, MultiGzDecoder};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;
use zip::{CompressionMethod, ZipArchive};

/// Compression wrapped around a delimited text file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    None,
    Gzip,
    /// A zip archive holding exactly one file
    Zip,
}

impl Compression {
    /// Guess the compression from the file extension
    pub fn from_path(path: &Path) -> Self {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());

        match extension.as_deref() {
            Some("zip") => Compression::Zip,
            Some("gz") | Some("gzip") => Compression::Gzip,
            _ => Compression::None,
        }
    }
}

/// Open `path` as a stream of decompressed bytes.
///
/// The returned reader owns the file handle, which is closed when the reader
/// is dropped.
pub fn open_input(path: &Path, compression: Compression) -> Result<Box<dyn Read>> {
    let file = File::open(path).map_err(|e| FlattenError::io(path, e))?;

    match compression {
        Compression::None => Ok(Box::new(BufReader::new(file))),
        Compression::Gzip => Ok(Box::new(MultiGzDecoder::new(BufReader::new(file)))),
        Compression::Zip => open_zip_entry(path, file),
    }
}

/// Stream the single file entry of a zip archive straight from disk
fn open_zip_entry(path: &Path, file: File) -> Result<Box<dyn Read>> {
    let archive_error = |reason: String| FlattenError::Archive {
        path: path.to_path_buf(),
        reason,
    };

    let mut archive = ZipArchive::new(file).map_err(|e| archive_error(e.to_string()))?;

    let mut entries = Vec::new();
    for i in 0..archive.len() {
        let entry = archive
            .by_index_raw(i)
            .map_err(|e| archive_error(e.to_string()))?;
        if !entry.is_dir() {
            entries.push(i);
        }
    }

    let index = match entries.as_slice() {
        [index] => *index,
        [] => return Err(archive_error("archive contains no files".to_string())),
        many => {
            return Err(archive_error(format!(
                "expected exactly one file in archive, found {}",
                many.len()
            )))
        }
    };

    let (method, data_start, size, name) = {
        let entry = archive
            .by_index_raw(index)
            .map_err(|e| archive_error(e.to_string()))?;
        (
            entry.compression(),
            entry.data_start(),
            entry.compressed_size(),
            entry.name().to_string(),
        )
    };

    let mut file = archive.into_inner();
    file.seek(SeekFrom::Start(data_start))
        .map_err(|e| FlattenError::io(path, e))?;
    let body = BufReader::new(file.take(size));

    match method {
        CompressionMethod::Stored => Ok(Box::new(body)),
        CompressionMethod::Deflated => Ok(Box::new(DeflateDecoder::new(body))),
        other => Err(archive_error(format!(
            "entry `{}` uses unsupported compression {:?}",
            name, other
        ))),
    }
}
