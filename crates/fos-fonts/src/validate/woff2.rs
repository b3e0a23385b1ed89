//! WOFF2 (Web Open Font Format 2.0) decoder
//!
//! - Container header and variable-length table directory
//! - One Brotli stream holding every table back to back
//! - glyf/loca/hmtx transform reversal
//! - SFNT reconstruction

use std::io::Read;

use super::DecodeError;
use super::reader::FontReader;
use super::sfnt::{SFNT_COLLECTION, SfntTable, build_sfnt};
use super::woff::tag_name;
use super::woff2_glyf::{reconstruct_glyf, reconstruct_hmtx};

/// WOFF2 signature 'wOF2'
pub(crate) const WOFF2_SIGNATURE: u32 = 0x774F_4632;

const HEADER_SIZE: usize = 48;

/// Known table tags in WOFF2 (index -> tag)
const KNOWN_TAGS: [[u8; 4]; 63] = [
    *b"cmap", *b"head", *b"hhea", *b"hmtx", *b"maxp", *b"name", *b"OS/2", *b"post",
    *b"cvt ", *b"fpgm", *b"glyf", *b"loca", *b"prep", *b"CFF ", *b"VORG", *b"EBDT",
    *b"EBLC", *b"gasp", *b"hdmx", *b"kern", *b"LTSH", *b"PCLT", *b"VDMX", *b"vhea",
    *b"vmtx", *b"BASE", *b"GDEF", *b"GPOS", *b"GSUB", *b"EBSC", *b"JSTF", *b"MATH",
    *b"CBDT", *b"CBLC", *b"COLR", *b"CPAL", *b"SVG ", *b"sbix", *b"acnt", *b"avar",
    *b"bdat", *b"bloc", *b"bsln", *b"cvar", *b"fdsc", *b"feat", *b"fmtx", *b"fvar",
    *b"gvar", *b"hsty", *b"just", *b"lcar", *b"mort", *b"morx", *b"opbd", *b"prop",
    *b"trak", *b"Zapf", *b"Silf", *b"Glat", *b"Gloc", *b"Feat", *b"Sill",
];

/// Output preallocation relative to the compressed size
pub(crate) const PREALLOC_RATIO: usize = 4;

/// Flag value meaning an explicit tag follows
const ARBITRARY_TAG: u8 = 0x3F;

/// WOFF2 table directory entry
#[derive(Debug, Clone)]
struct Woff2TableEntry {
    tag: [u8; 4],
    orig_length: u32,
    /// Present only when a transform was applied
    transform_length: Option<u32>,
}

impl Woff2TableEntry {
    fn stored_length(&self) -> usize {
        self.transform_length.unwrap_or(self.orig_length) as usize
    }
}

/// Decode WOFF2 to an SFNT of at most `max_sfnt_bytes`
pub(crate) fn decode_woff2(data: &[u8], max_sfnt_bytes: usize) -> Result<Vec<u8>, DecodeError> {
    if data.len() < HEADER_SIZE {
        return Err(DecodeError::InvalidHeader("WOFF2"));
    }
    let mut reader = FontReader::new(data);

    if reader.read_u32()? != WOFF2_SIGNATURE {
        return Err(DecodeError::UnknownSignature);
    }
    let flavor = reader.read_u32()?;
    let length = reader.read_u32()?;
    let num_tables = reader.read_u16()?;
    let _reserved = reader.read_u16()?;
    let total_sfnt_size = reader.read_u32()? as usize;
    let total_compressed_size = reader.read_u32()? as usize;
    // version, metadata and private block
    reader.read_bytes(2 + 2 + 4 * 5)?;

    if flavor == SFNT_COLLECTION {
        return Err(DecodeError::Collection);
    }
    if length as usize > data.len() || num_tables == 0 {
        return Err(DecodeError::InvalidHeader("WOFF2"));
    }
    if total_sfnt_size > max_sfnt_bytes {
        return Err(DecodeError::TooLarge(max_sfnt_bytes));
    }

    let entries = parse_table_directory(&mut reader, num_tables)?;

    // Lengths come from the file; bound them before sizing anything
    checked_total(entries.iter().map(|e| e.orig_length as usize), max_sfnt_bytes)?;
    let expected = checked_total(entries.iter().map(Woff2TableEntry::stored_length), max_sfnt_bytes)?;

    let compressed = reader
        .read_bytes(total_compressed_size)
        .map_err(|_| DecodeError::InvalidHeader("WOFF2"))?;
    let payload = decompress(compressed, expected)?;

    let tables = untransform_tables(&entries, &payload)?;
    let sfnt = build_sfnt(flavor, tables);
    if sfnt.len() > max_sfnt_bytes {
        return Err(DecodeError::TooLarge(max_sfnt_bytes));
    }
    Ok(sfnt)
}

/// Sum of table lengths, failing past `limit`
pub(crate) fn checked_total(
    lengths: impl Iterator<Item = usize>,
    limit: usize,
) -> Result<usize, DecodeError> {
    let mut total = 0usize;
    for len in lengths {
        total = total
            .checked_add(len)
            .filter(|&t| t <= limit)
            .ok_or(DecodeError::TooLarge(limit))?;
    }
    Ok(total)
}

fn parse_table_directory(
    reader: &mut FontReader<'_>,
    num_tables: u16,
) -> Result<Vec<Woff2TableEntry>, DecodeError> {
    let mut entries = Vec::with_capacity(num_tables as usize);

    for _ in 0..num_tables {
        let flags = reader.read_u8()?;
        let tag = match flags & 0x3F {
            ARBITRARY_TAG => reader.read_tag()?,
            index => KNOWN_TAGS[index as usize],
        };
        let version = (flags >> 6) & 0x03;
        // glyf/loca are transformed by default; others only when asked
        let transformed = if &tag == b"glyf" || &tag == b"loca" {
            version == 0
        } else {
            version != 0
        };

        let orig_length = reader.read_base128()?;
        let transform_length = if transformed {
            Some(reader.read_base128()?)
        } else {
            None
        };
        if &tag == b"loca" && transform_length.is_some_and(|len| len != 0) {
            return Err(DecodeError::InvalidTableDirectory);
        }

        entries.push(Woff2TableEntry {
            tag,
            orig_length,
            transform_length,
        });
    }

    Ok(entries)
}

/// Inflate the payload; `expected` must already be bounded by the caller
fn decompress(compressed: &[u8], expected: usize) -> Result<Vec<u8>, DecodeError> {
    let mut payload = Vec::with_capacity(expected.min(compressed.len().saturating_mul(PREALLOC_RATIO)));
    brotli::Decompressor::new(compressed, 4096)
        .take(expected as u64 + 1)
        .read_to_end(&mut payload)
        .map_err(|e| DecodeError::Decompression(e.to_string()))?;

    if payload.len() != expected {
        return Err(DecodeError::Decompression(format!(
            "payload is {} bytes, table directory expects {}",
            payload.len(),
            expected
        )));
    }
    Ok(payload)
}

/// Slice tables out of the payload and reverse any transforms
fn untransform_tables(
    entries: &[Woff2TableEntry],
    payload: &[u8],
) -> Result<Vec<SfntTable>, DecodeError> {
    let mut slices = Vec::with_capacity(entries.len());
    let mut offset = 0usize;
    for entry in entries {
        let end = offset + entry.stored_length();
        slices.push((entry, &payload[offset..end]));
        offset = end;
    }

    let find = |tag: &[u8; 4]| slices.iter().find(|(entry, _)| &entry.tag == tag);

    let glyf_output = match find(b"glyf") {
        Some((entry, data)) if entry.transform_length.is_some() => {
            if !find(b"loca").is_some_and(|(loca, _)| loca.transform_length.is_some()) {
                return Err(DecodeError::InvalidTransform("loca"));
            }
            Some(reconstruct_glyf(data)?)
        }
        _ => None,
    };

    let mut tables = Vec::with_capacity(slices.len());
    for (entry, data) in &slices {
        let table = match (&entry.tag, entry.transform_length) {
            (_, None) => data.to_vec(),
            (b"glyf", Some(_)) => glyf_output
                .as_ref()
                .map(|out| out.glyf.clone())
                .ok_or(DecodeError::InvalidTransform("glyf"))?,
            (b"loca", Some(_)) => glyf_output
                .as_ref()
                .map(|out| out.loca.clone())
                .ok_or(DecodeError::InvalidTransform("loca"))?,
            (b"hmtx", Some(_)) => {
                let x_mins = glyf_output
                    .as_ref()
                    .map(|out| out.x_mins.as_slice())
                    .ok_or(DecodeError::InvalidTransform("hmtx"))?;
                let num_glyphs = read_u16_at(find(b"maxp").map(|(_, d)| *d), 4)
                    .ok_or(DecodeError::MissingTable("maxp"))?;
                let num_h_metrics = read_u16_at(find(b"hhea").map(|(_, d)| *d), 34)
                    .ok_or(DecodeError::MissingTable("hhea"))?;
                reconstruct_hmtx(data, num_glyphs, num_h_metrics, x_mins)?
            }
            (tag, Some(_)) => {
                return Err(DecodeError::UnsupportedTransform(tag_name(tag)));
            }
        };
        tables.push(SfntTable { tag: entry.tag, data: table });
    }

    Ok(tables)
}

fn read_u16_at(data: Option<&[u8]>, offset: usize) -> Option<u16> {
    let bytes = data?.get(offset..offset + 2)?;
    Some(u16::from_be_bytes([bytes[0], bytes[1]]))
}
