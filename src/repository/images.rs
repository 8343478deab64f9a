//! Image dimensions read straight from the packaged image archive

use std::{
    fs::File,
    io::{Cursor, Read},
    path::Path,
};

use super::{ImageInspector, ImageLocation};
use crate::error::{AppError, AppResult};

const JP2_SIGNATURE: [u8; 12] = [0x00, 0x00, 0x00, 0x0C, b'j', b'P', b' ', b' ', 0x0D, 0x0A, 0x87, 0x0A];
const J2K_SOC_SIZ: [u8; 4] = [0xFF, 0x4F, 0xFF, 0x51];

/// Leading bytes of a member read before falling back to the whole member
const HEADER_PREFIX_LEN: u64 = 64 * 1024;

/// Reads the image out of its zip archive and decodes only its header
#[derive(Debug, Clone, Copy, Default)]
pub struct ZipImageInspector;

impl ImageInspector for ZipImageInspector {
    fn image_size(&self, location: &ImageLocation) -> AppResult<(u32, u32)> {
        let inspection_error = |message: String| {
            AppError::ImageInspection(format!(
                "{}:{}: {}",
                location.archive.display(),
                location.member,
                message
            ))
        };

        let file = File::open(&location.archive).map_err(|e| inspection_error(e.to_string()))?;
        let mut archive = zip::ZipArchive::new(file).map_err(|e| inspection_error(e.to_string()))?;
        let mut entry = archive
            .by_name(&location.member)
            .map_err(|e| inspection_error(e.to_string()))?;

        let (width, height) = read_dimensions(&mut entry).map_err(inspection_error)?;
        tracing::debug!("{} is {}x{}", location.member, width, height);
        Ok((width, height))
    }
}

/// Number of `.jp2` images packaged in `archive`
pub fn count_images(archive: &Path) -> AppResult<usize> {
    let file = File::open(archive)?;
    let archive_reader =
        zip::ZipArchive::new(file).map_err(|e| AppError::ImageInspection(format!("{}: {}", archive.display(), e)))?;
    Ok(archive_reader
        .file_names()
        .filter(|name| name.to_ascii_lowercase().ends_with(".jp2"))
        .count())
}

/// Dimensions from the leading bytes of `reader`; the rest is only read when
/// the header does not fit in them
fn read_dimensions(mut reader: impl Read) -> Result<(u32, u32), String> {
    let mut bytes = Vec::new();
    reader
        .by_ref()
        .take(HEADER_PREFIX_LEN)
        .read_to_end(&mut bytes)
        .map_err(|e| e.to_string())?;

    match image_dimensions(&bytes) {
        Err(_) if bytes.len() as u64 == HEADER_PREFIX_LEN => {
            reader.read_to_end(&mut bytes).map_err(|e| e.to_string())?;
            image_dimensions(&bytes)
        }
        result => result,
    }
}

/// Dimensions of an encoded image: JPEG 2000 headers are read directly,
/// other formats go through the `image` crate
pub fn image_dimensions(bytes: &[u8]) -> Result<(u32, u32), String> {
    if bytes.starts_with(&JP2_SIGNATURE) {
        return jp2_dimensions(&bytes[JP2_SIGNATURE.len()..]).ok_or_else(|| "truncated JP2 header".to_string());
    }
    if bytes.starts_with(&J2K_SOC_SIZ) {
        return j2k_dimensions(bytes).ok_or_else(|| "truncated J2K codestream header".to_string());
    }

    image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| e.to_string())?
        .into_dimensions()
        .map_err(|e| e.to_string())
}

fn be_u32(bytes: &[u8], at: usize) -> Option<u32> {
    let slice = bytes.get(at..at + 4)?;
    Some(u32::from_be_bytes(slice.try_into().ok()?))
}

/// Body of the first box of type `kind` in a sequence of JP2 boxes
fn find_box<'a>(mut data: &'a [u8], kind: &[u8; 4]) -> Option<&'a [u8]> {
    while data.len() >= 8 {
        let length = be_u32(data, 0)? as u64;
        let (header, size) = match length {
            0 => (8, data.len() as u64),
            1 => {
                let extended = data.get(8..16)?;
                (16, u64::from_be_bytes(extended.try_into().ok()?))
            }
            n => (8, n),
        };
        if size < header as u64 || size > data.len() as u64 {
            return None;
        }
        if &data[4..8] == kind {
            return Some(&data[header..size as usize]);
        }
        data = &data[size as usize..];
    }
    None
}

/// `jp2h/ihdr` holds HEIGHT then WIDTH
fn jp2_dimensions(boxes: &[u8]) -> Option<(u32, u32)> {
    let header = find_box(boxes, b"jp2h")?;
    let ihdr = find_box(header, b"ihdr")?;
    let height = be_u32(ihdr, 0)?;
    let width = be_u32(ihdr, 4)?;
    Some((width, height))
}

/// SIZ segment: Lsiz, Rsiz, Xsiz, Ysiz, XOsiz, YOsiz
fn j2k_dimensions(codestream: &[u8]) -> Option<(u32, u32)> {
    let x_size = be_u32(codestream, 8)?;
    let y_size = be_u32(codestream, 12)?;
    let x_offset = be_u32(codestream, 16)?;
    let y_offset = be_u32(codestream, 20)?;
    Some((x_size.checked_sub(x_offset)?, y_size.checked_sub(y_offset)?))
}
