//! WOFF (Web Open Font Format 1.0) decoder
//!
//! Every table is stored separately; compressed tables are zlib streams
//! that must inflate to exactly their original length.

use std::io::Read;

use flate2::read::ZlibDecoder;

use super::DecodeError;
use super::reader::FontReader;
use super::sfnt::{SfntTable, build_sfnt};
use super::woff2::{PREALLOC_RATIO, checked_total};

/// WOFF signature 'wOFF'
pub(crate) const WOFF_SIGNATURE: u32 = 0x774F_4646;

const HEADER_SIZE: usize = 44;

/// WOFF table directory entry
#[derive(Debug)]
struct WoffTableEntry {
    tag: [u8; 4],
    offset: u32,
    comp_length: u32,
    orig_length: u32,
}

/// Decode WOFF to an SFNT of at most `max_sfnt_bytes`
pub(crate) fn decode_woff(data: &[u8], max_sfnt_bytes: usize) -> Result<Vec<u8>, DecodeError> {
    if data.len() < HEADER_SIZE {
        return Err(DecodeError::InvalidHeader("WOFF"));
    }
    let mut reader = FontReader::new(data);

    if reader.read_u32()? != WOFF_SIGNATURE {
        return Err(DecodeError::UnknownSignature);
    }
    let flavor = reader.read_u32()?;
    let length = reader.read_u32()?;
    let num_tables = reader.read_u16()?;
    let _reserved = reader.read_u16()?;
    // totalSfntSize, version, metadata and private block
    reader.read_bytes(4 + 2 + 2 + 4 * 5)?;

    if length as usize != data.len() || num_tables == 0 {
        return Err(DecodeError::InvalidHeader("WOFF"));
    }

    let mut entries = Vec::with_capacity(num_tables as usize);
    for _ in 0..num_tables {
        entries.push(WoffTableEntry {
            tag: reader.read_tag()?,
            offset: reader.read_u32()?,
            comp_length: reader.read_u32()?,
            orig_length: reader.read_u32()?,
        });
        let _orig_checksum = reader.read_u32()?;
    }
    checked_total(entries.iter().map(|e| e.orig_length as usize), max_sfnt_bytes)?;

    let mut tables = Vec::with_capacity(entries.len());
    for entry in &entries {
        let start = entry.offset as usize;
        let end = start
            .checked_add(entry.comp_length as usize)
            .filter(|&end| end <= data.len())
            .ok_or_else(|| DecodeError::TableOutOfBounds(tag_name(&entry.tag)))?;
        let stored = &data[start..end];

        let table = if entry.comp_length == entry.orig_length {
            stored.to_vec()
        } else if entry.comp_length < entry.orig_length {
            inflate_table(stored, entry)?
        } else {
            return Err(DecodeError::TableOutOfBounds(tag_name(&entry.tag)));
        };

        tables.push(SfntTable { tag: entry.tag, data: table });
    }

    let sfnt = build_sfnt(flavor, tables);
    if sfnt.len() > max_sfnt_bytes {
        return Err(DecodeError::TooLarge(max_sfnt_bytes));
    }
    Ok(sfnt)
}

fn inflate_table(stored: &[u8], entry: &WoffTableEntry) -> Result<Vec<u8>, DecodeError> {
    let expected = entry.orig_length as usize;
    let mut output = Vec::with_capacity(expected.min(stored.len().saturating_mul(PREALLOC_RATIO)));
    ZlibDecoder::new(stored)
        .take(expected as u64 + 1)
        .read_to_end(&mut output)
        .map_err(|e| DecodeError::Decompression(format!("{} table: {e}", tag_name(&entry.tag))))?;

    if output.len() != expected {
        return Err(DecodeError::Decompression(format!(
            "{} table inflated to {} bytes, expected {}",
            tag_name(&entry.tag),
            output.len(),
            expected
        )));
    }
    Ok(output)
}

pub(crate) fn tag_name(tag: &[u8; 4]) -> String {
    String::from_utf8_lossy(tag).trim_end().to_string()
}
