//! SFNT container assembly and inspection

use ttf_parser::{Face, Tag, name_id};

use super::DecodeError;
use crate::types::{FontStyle, FontWeight};

/// `true` and 1.0 are both TrueType-outline flavors
pub(crate) const SFNT_TRUETYPE: u32 = 0x0001_0000;
pub(crate) const SFNT_TRUE: u32 = 0x7472_7565; // 'true'
pub(crate) const SFNT_CFF: u32 = 0x4F54_544F; // 'OTTO'
pub(crate) const SFNT_COLLECTION: u32 = 0x7474_6366; // 'ttcf'

const HEAD_CHECKSUM_ADJUSTMENT: usize = 8;
const CHECKSUM_MAGIC: u32 = 0xB1B0_AFBA;

/// One table ready to be written
#[derive(Debug, Clone)]
pub(crate) struct SfntTable {
    pub tag: [u8; 4],
    pub data: Vec<u8>,
}

/// Assemble an SFNT: sorted directory, 4-byte padded tables, fresh checksums
pub(crate) fn build_sfnt(flavor: u32, mut tables: Vec<SfntTable>) -> Vec<u8> {
    tables.sort_by(|a, b| a.tag.cmp(&b.tag));

    // checkSumAdjustment is zero while checksums are computed
    for table in tables.iter_mut().filter(|t| &t.tag == b"head") {
        if table.data.len() >= HEAD_CHECKSUM_ADJUSTMENT + 4 {
            table.data[HEAD_CHECKSUM_ADJUSTMENT..HEAD_CHECKSUM_ADJUSTMENT + 4].fill(0);
        }
    }

    let num_tables = tables.len() as u16;
    let header_size = 12 + tables.len() * 16;
    let body_size: usize = tables.iter().map(|t| padded_len(t.data.len())).sum();
    let mut output = Vec::with_capacity(header_size + body_size);

    let (search_range, entry_selector, range_shift) = search_params(num_tables);
    output.extend_from_slice(&flavor.to_be_bytes());
    output.extend_from_slice(&num_tables.to_be_bytes());
    output.extend_from_slice(&search_range.to_be_bytes());
    output.extend_from_slice(&entry_selector.to_be_bytes());
    output.extend_from_slice(&range_shift.to_be_bytes());

    let mut offset = header_size;
    let mut head_offset = None;
    for table in &tables {
        if &table.tag == b"head" {
            head_offset = Some(offset);
        }
        output.extend_from_slice(&table.tag);
        output.extend_from_slice(&checksum(&table.data).to_be_bytes());
        output.extend_from_slice(&(offset as u32).to_be_bytes());
        output.extend_from_slice(&(table.data.len() as u32).to_be_bytes());
        offset += padded_len(table.data.len());
    }

    for table in &tables {
        output.extend_from_slice(&table.data);
        output.resize(padded_len(output.len()), 0);
    }

    if let Some(head) = head_offset {
        let field = head + HEAD_CHECKSUM_ADJUSTMENT;
        if field + 4 <= output.len() {
            let adjustment = CHECKSUM_MAGIC.wrapping_sub(checksum(&output));
            output[field..field + 4].copy_from_slice(&adjustment.to_be_bytes());
        }
    }

    output
}

fn padded_len(len: usize) -> usize {
    (len + 3) & !3
}

fn search_params(num_tables: u16) -> (u16, u16, u16) {
    if num_tables == 0 {
        return (0, 0, 0);
    }
    let entry_selector = 15 - num_tables.leading_zeros() as u16;
    let search_range = (1u16 << entry_selector).saturating_mul(16);
    let range_shift = num_tables.saturating_mul(16).saturating_sub(search_range);
    (search_range, entry_selector, range_shift)
}

/// OpenType table checksum (sum of big-endian u32 words, zero padded)
pub(crate) fn checksum(data: &[u8]) -> u32 {
    data.chunks(4).fold(0u32, |sum, chunk| {
        let mut word = [0u8; 4];
        word[..chunk.len()].copy_from_slice(chunk);
        sum.wrapping_add(u32::from_be_bytes(word))
    })
}

/// Find a table in an SFNT by tag
#[cfg(test)]
pub(crate) fn find_table<'a>(sfnt: &'a [u8], tag: &[u8; 4]) -> Option<&'a [u8]> {
    let num_tables = u16::from_be_bytes([*sfnt.get(4)?, *sfnt.get(5)?]) as usize;
    (0..num_tables).find_map(|i| {
        let record = sfnt.get(12 + i * 16..28 + i * 16)?;
        if &record[..4] != tag {
            return None;
        }
        let offset = u32::from_be_bytes([record[8], record[9], record[10], record[11]]) as usize;
        let length = u32::from_be_bytes([record[12], record[13], record[14], record[15]]) as usize;
        sfnt.get(offset..offset.checked_add(length)?)
    })
}

/// Descriptor read from a font's own tables
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub(crate) struct EmbeddedNames {
    pub family: Option<String>,
    pub weight: Option<FontWeight>,
    pub style: Option<FontStyle>,
}

/// Parse the SFNT, reject non-TrueType outlines and read naming/OS/2 metadata
pub(crate) fn inspect(sfnt: &[u8]) -> Result<EmbeddedNames, DecodeError> {
    let face = Face::parse(sfnt, 0).map_err(|e| DecodeError::Unparseable(e.to_string()))?;
    let raw = face.raw_face();

    if raw.table(Tag::from_bytes(b"CFF ")).is_some() || raw.table(Tag::from_bytes(b"CFF2")).is_some() {
        return Err(DecodeError::UnsupportedOutlines);
    }
    if raw.table(Tag::from_bytes(b"glyf")).is_none() {
        return Err(DecodeError::UnsupportedOutlines);
    }

    let family = family_name(&face, name_id::TYPOGRAPHIC_FAMILY)
        .or_else(|| family_name(&face, name_id::FAMILY));
    let has_os2 = raw.table(Tag::from_bytes(b"OS/2")).is_some();

    Ok(EmbeddedNames {
        family,
        weight: has_os2.then(|| FontWeight::nearest(face.weight().to_number())),
        style: has_os2.then(|| {
            if face.is_italic() {
                FontStyle::Italic
            } else {
                FontStyle::Normal
            }
        }),
    })
}

fn family_name(face: &Face<'_>, id: u16) -> Option<String> {
    face.names()
        .into_iter()
        .filter(|name| name.name_id == id && name.is_unicode())
        .find_map(|name| name.to_string())
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
}
