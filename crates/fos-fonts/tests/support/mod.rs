//! Shared helpers for fos-fonts integration tests
//!
//! Synthesises tiny TrueType fonts, wraps them as WOFF/WOFF2, fakes the
//! font service and captures tracing output.

#![allow(dead_code)]

use std::io::{self, Write};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use flate2::Compression;
use flate2::write::ZlibEncoder;
use fos_fonts::remote::{TransportError, TransportResponse};
use fos_fonts::FontTransport;
use tracing_subscriber::fmt::MakeWriter;

// ============================================================================
// FONT SYNTHESIS
// ============================================================================

/// Minimal TrueType font: an empty .notdef, a triangle with instructions
/// and a composite of the triangle shifted right
pub struct TestFont {
    pub family: String,
    pub subfamily: String,
    pub weight_class: u16,
    pub italic: bool,
    /// Leave out the naming table
    pub without_name: bool,
}

impl TestFont {
    pub fn new(family: &str) -> Self {
        Self {
            family: family.to_string(),
            subfamily: "Regular".to_string(),
            weight_class: 400,
            italic: false,
            without_name: false,
        }
    }

    pub fn weight(mut self, weight_class: u16) -> Self {
        self.weight_class = weight_class;
        self
    }

    pub fn italic(mut self) -> Self {
        self.italic = true;
        self.subfamily = "Italic".to_string();
        self
    }

    pub fn unnamed(mut self) -> Self {
        self.without_name = true;
        self
    }

    pub fn tables(&self) -> Vec<([u8; 4], Vec<u8>)> {
        let mut tables = vec![
            (*b"head", head()),
            (*b"hhea", hhea()),
            (*b"maxp", maxp()),
            (*b"hmtx", hmtx()),
            (*b"loca", loca()),
            (*b"glyf", glyf()),
            (*b"OS/2", os2(self.weight_class, self.italic)),
        ];
        if !self.without_name {
            tables.push((*b"name", name(&self.family, &self.subfamily)));
        }
        tables
    }

    /// Plain SFNT (`.ttf`)
    pub fn ttf(&self) -> Vec<u8> {
        sfnt(0x0001_0000, &self.tables())
    }

    pub fn woff(&self) -> Vec<u8> {
        woff(0x0001_0000, &self.tables())
    }

    pub fn woff2(&self) -> Vec<u8> {
        woff2(0x0001_0000, &self.tables())
    }

    /// WOFF2 with the glyf/loca transform and hmtx bearings dropped
    pub fn woff2_transformed(&self) -> Vec<u8> {
        let tables = self.tables();
        let entries: Vec<Woff2Entry> = tables
            .iter()
            .map(|(tag, data)| match tag {
                b"glyf" => Woff2Entry::transformed(*tag, 0, data.len(), transformed_glyf()),
                b"loca" => Woff2Entry::transformed(*tag, 0, data.len(), Vec::new()),
                b"hmtx" => Woff2Entry::transformed(*tag, 1, data.len(), transformed_hmtx()),
                _ => Woff2Entry::plain(*tag, data.clone()),
            })
            .collect();
        woff2_container(0x0001_0000, &entries, sfnt(0x0001_0000, &tables).len())
    }
}

fn be16(out: &mut Vec<u8>, v: u16) {
    out.extend_from_slice(&v.to_be_bytes());
}

fn be32(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_be_bytes());
}

fn head() -> Vec<u8> {
    let mut t = Vec::with_capacity(54);
    be32(&mut t, 0x0001_0000); // version
    be32(&mut t, 0x0001_0000); // fontRevision
    be32(&mut t, 0); // checkSumAdjustment
    be32(&mut t, 0x5F0F_3CF5); // magicNumber
    be16(&mut t, 0x000B); // flags
    be16(&mut t, 1000); // unitsPerEm
    t.extend_from_slice(&[0; 16]); // created, modified
    be16(&mut t, 10); // xMin
    be16(&mut t, 0); // yMin
    be16(&mut t, 130); // xMax
    be16(&mut t, 100); // yMax
    be16(&mut t, 0); // macStyle
    be16(&mut t, 8); // lowestRecPPEM
    be16(&mut t, 2); // fontDirectionHint
    be16(&mut t, 0); // indexToLocFormat: short
    be16(&mut t, 0); // glyphDataFormat
    t
}

fn hhea() -> Vec<u8> {
    let mut t = Vec::with_capacity(36);
    be32(&mut t, 0x0001_0000);
    be16(&mut t, 800); // ascender
    be16(&mut t, (-200i16) as u16); // descender
    be16(&mut t, 0); // lineGap
    be16(&mut t, 600); // advanceWidthMax
    t.extend_from_slice(&[0; 22]);
    be16(&mut t, 2); // numberOfHMetrics
    t
}

fn maxp() -> Vec<u8> {
    let mut t = Vec::with_capacity(32);
    be32(&mut t, 0x0001_0000);
    be16(&mut t, 3); // numGlyphs
    be16(&mut t, 3); // maxPoints
    be16(&mut t, 1); // maxContours
    be16(&mut t, 3); // maxCompositePoints
    be16(&mut t, 1); // maxCompositeContours
    t.extend_from_slice(&[0; 14]);
    be16(&mut t, 1); // maxComponentElements
    be16(&mut t, 1); // maxComponentDepth
    t
}

fn hmtx() -> Vec<u8> {
    // Two long metrics, then a bearing-only entry; every bearing is xMin
    let mut t = Vec::new();
    be16(&mut t, 500);
    be16(&mut t, 0);
    be16(&mut t, 600);
    be16(&mut t, 10);
    be16(&mut t, 30);
    t
}

fn glyf() -> Vec<u8> {
    let mut t = Vec::new();
    // Glyph 1: triangle (10,0) (110,0) (60,100)
    t.extend_from_slice(&[
        0, 1, // numberOfContours
        0, 10, 0, 0, 0, 110, 0, 100, // bbox
        0, 2, // endPtsOfContours
        0, 2, 0xB0, 0x05, // instructions: PUSHB[0] 5
        0x3B, 0x01, 0x27, // flags, the first repeated once
        10, 100, 50, // x
        100, // y
        0,
    ]);
    // Glyph 2: glyph 1 moved by (20, 0)
    t.extend_from_slice(&[
        0xFF, 0xFF, // numberOfContours
        0, 30, 0, 0, 0, 130, 0, 100, // bbox
        0x01, 0x02, // WE_HAVE_INSTRUCTIONS | ARGS_ARE_XY_VALUES
        0, 1, // glyphIndex
        20, 0, // dx, dy
        0, 1, 0x00, // instructions: SVTCA[y]
        0,
    ]);
    t
}

fn loca() -> Vec<u8> {
    // Short offsets (halved): .notdef empty, triangle 24 bytes, composite 20
    vec![0, 0, 0, 0, 0, 12, 0, 22]
}

/// glyf() as the seven WOFF2 streams
fn transformed_glyf() -> Vec<u8> {
    let n_contours: [u8; 6] = [0, 0, 0, 1, 0xFF, 0xFF];
    let n_points: [u8; 1] = [3];
    // 4-byte triplets: bit 0 marks x positive, bit 1 y positive
    let flags: [u8; 3] = [127, 127, 126];
    let glyphs: [u8; 14] = [
        0, 10, 0, 0, // (+10, 0)
        0, 100, 0, 0, // (+100, 0)
        0, 50, 0, 100, // (-50, +100)
        2, // glyph 1 instruction length
        1, // glyph 2 instruction length
    ];
    let composites: [u8; 6] = [0x01, 0x02, 0, 1, 20, 0];
    // Bitmap marks glyph 2, then its bbox
    let bboxes: [u8; 12] = [0x20, 0, 0, 0, 0, 30, 0, 0, 0, 130, 0, 100];
    let instructions: [u8; 3] = [0xB0, 0x05, 0x00];

    let mut t = Vec::new();
    be16(&mut t, 0); // reserved
    be16(&mut t, 0); // optionFlags
    be16(&mut t, 3); // numGlyphs
    be16(&mut t, 0); // indexFormat: short
    let streams: [&[u8]; 7] = [&n_contours, &n_points, &flags, &glyphs, &composites, &bboxes, &instructions];
    for stream in streams {
        be32(&mut t, stream.len() as u32);
    }
    for stream in streams {
        t.extend_from_slice(stream);
    }
    t
}

/// hmtx() with both bearing arrays dropped
fn transformed_hmtx() -> Vec<u8> {
    let mut t = vec![0x03];
    be16(&mut t, 500);
    be16(&mut t, 600);
    t
}

fn os2(weight_class: u16, italic: bool) -> Vec<u8> {
    let mut t = vec![0u8; 96];
    t[0..2].copy_from_slice(&4u16.to_be_bytes());
    t[2..4].copy_from_slice(&500u16.to_be_bytes());
    t[4..6].copy_from_slice(&weight_class.to_be_bytes());
    t[6..8].copy_from_slice(&5u16.to_be_bytes());
    let selection: u16 = if italic { 0x0001 } else { 0x0040 };
    t[62..64].copy_from_slice(&selection.to_be_bytes());
    t
}

fn name(family: &str, subfamily: &str) -> Vec<u8> {
    let strings: Vec<(u16, Vec<u8>)> = [(1u16, family), (2u16, subfamily)]
        .iter()
        .map(|(id, s)| (*id, s.encode_utf16().flat_map(u16::to_be_bytes).collect()))
        .collect();

    let mut t = Vec::new();
    be16(&mut t, 0); // format
    be16(&mut t, strings.len() as u16);
    be16(&mut t, 6 + 12 * strings.len() as u16);

    let mut offset = 0u16;
    for (id, bytes) in &strings {
        be16(&mut t, 3); // Windows
        be16(&mut t, 1); // Unicode BMP
        be16(&mut t, 0x0409); // en-US
        be16(&mut t, *id);
        be16(&mut t, bytes.len() as u16);
        be16(&mut t, offset);
        offset += bytes.len() as u16;
    }
    for (_, bytes) in &strings {
        t.extend_from_slice(bytes);
    }
    t
}

// ============================================================================
// CONTAINERS
// ============================================================================

fn padded(len: usize) -> usize {
    (len + 3) & !3
}

fn checksum(data: &[u8]) -> u32 {
    data.chunks(4).fold(0u32, |sum, chunk| {
        let mut word = [0u8; 4];
        word[..chunk.len()].copy_from_slice(chunk);
        sum.wrapping_add(u32::from_be_bytes(word))
    })
}

/// Plain SFNT with a sorted table directory
pub fn sfnt(flavor: u32, tables: &[([u8; 4], Vec<u8>)]) -> Vec<u8> {
    let mut tables = tables.to_vec();
    tables.sort_by(|a, b| a.0.cmp(&b.0));

    let mut out = Vec::new();
    be32(&mut out, flavor);
    be16(&mut out, tables.len() as u16);
    out.extend_from_slice(&[0; 6]);

    let mut offset = 12 + 16 * tables.len();
    for (tag, data) in &tables {
        out.extend_from_slice(tag);
        be32(&mut out, checksum(data));
        be32(&mut out, offset as u32);
        be32(&mut out, data.len() as u32);
        offset += padded(data.len());
    }
    for (_, data) in &tables {
        out.extend_from_slice(data);
        out.resize(padded(out.len()), 0);
    }
    out
}

/// WOFF 1.0 with every table zlib-compressed where that helps
pub fn woff(flavor: u32, tables: &[([u8; 4], Vec<u8>)]) -> Vec<u8> {
    let mut tables = tables.to_vec();
    tables.sort_by(|a, b| a.0.cmp(&b.0));

    let stored: Vec<Vec<u8>> = tables
        .iter()
        .map(|(_, data)| {
            let mut encoder = ZlibEncoder::new(Vec::new(), Compression::best());
            encoder.write_all(data).unwrap();
            let compressed = encoder.finish().unwrap();
            if compressed.len() < data.len() {
                compressed
            } else {
                data.clone()
            }
        })
        .collect();

    let mut offset = 44 + 20 * tables.len();
    let mut directory = Vec::new();
    let mut body = Vec::new();
    for ((tag, data), stored) in tables.iter().zip(&stored) {
        directory.extend_from_slice(tag);
        be32(&mut directory, offset as u32);
        be32(&mut directory, stored.len() as u32);
        be32(&mut directory, data.len() as u32);
        be32(&mut directory, checksum(data));
        body.extend_from_slice(stored);
        body.resize(padded(body.len()), 0);
        offset = 44 + 20 * tables.len() + body.len();
    }

    let total = 44 + directory.len() + body.len();
    let mut out = Vec::with_capacity(total);
    be32(&mut out, 0x774F_4646);
    be32(&mut out, flavor);
    be32(&mut out, total as u32);
    be16(&mut out, tables.len() as u16);
    be16(&mut out, 0);
    be32(&mut out, sfnt(flavor, &tables).len() as u32);
    be16(&mut out, 1);
    be16(&mut out, 0);
    out.extend_from_slice(&[0; 20]);
    out.extend_from_slice(&directory);
    out.extend_from_slice(&body);
    out
}

const WOFF2_KNOWN: [(&[u8; 4], u8); 9] = [
    (b"cmap", 0),
    (b"head", 1),
    (b"hhea", 2),
    (b"hmtx", 3),
    (b"maxp", 4),
    (b"name", 5),
    (b"OS/2", 6),
    (b"glyf", 10),
    (b"loca", 11),
];

fn base128(out: &mut Vec<u8>, mut value: u32) {
    let mut groups = vec![(value & 0x7F) as u8];
    value >>= 7;
    while value > 0 {
        groups.push((value & 0x7F) as u8 | 0x80);
        value >>= 7;
    }
    out.extend(groups.iter().rev());
}

/// One WOFF2 directory entry and the bytes it contributes to the payload
pub struct Woff2Entry {
    tag: [u8; 4],
    version: u8,
    orig_length: u32,
    /// Written only for transformed tables
    transform_length: Option<u32>,
    stored: Vec<u8>,
}

impl Woff2Entry {
    /// Untransformed; glyf/loca take the null transform (version 3)
    pub fn plain(tag: [u8; 4], data: Vec<u8>) -> Self {
        let version = if &tag == b"glyf" || &tag == b"loca" { 3 } else { 0 };
        Self {
            tag,
            version,
            orig_length: data.len() as u32,
            transform_length: None,
            stored: data,
        }
    }

    /// Directory entry lying about the decoded table size
    pub fn claiming(mut self, orig_length: u32) -> Self {
        self.orig_length = orig_length;
        self
    }

    pub fn transformed(tag: [u8; 4], version: u8, orig_length: usize, stored: Vec<u8>) -> Self {
        Self {
            tag,
            version,
            orig_length: orig_length as u32,
            transform_length: Some(stored.len() as u32),
            stored,
        }
    }
}

/// WOFF2 with glyf/loca stored untransformed (null transform)
pub fn woff2(flavor: u32, tables: &[([u8; 4], Vec<u8>)]) -> Vec<u8> {
    let entries: Vec<Woff2Entry> = tables
        .iter()
        .map(|(tag, data)| Woff2Entry::plain(*tag, data.clone()))
        .collect();
    woff2_container(flavor, &entries, sfnt(flavor, tables).len())
}

pub fn woff2_container(flavor: u32, entries: &[Woff2Entry], sfnt_size: usize) -> Vec<u8> {
    let mut directory = Vec::new();
    let mut payload = Vec::new();

    for entry in entries {
        let known = WOFF2_KNOWN.iter().find(|(t, _)| **t == entry.tag).map(|(_, i)| *i);
        match known {
            Some(index) => directory.push(index | entry.version << 6),
            None => {
                directory.push(0x3F | entry.version << 6);
                directory.extend_from_slice(&entry.tag);
            }
        }
        base128(&mut directory, entry.orig_length);
        if let Some(len) = entry.transform_length {
            base128(&mut directory, len);
        }
        payload.extend_from_slice(&entry.stored);
    }

    let mut compressed = Vec::new();
    {
        let mut writer = brotli::CompressorWriter::new(&mut compressed, 4096, 11, 22);
        writer.write_all(&payload).unwrap();
    }

    let total = 48 + directory.len() + compressed.len();
    let mut out = Vec::with_capacity(total);
    be32(&mut out, 0x774F_4632);
    be32(&mut out, flavor);
    be32(&mut out, total as u32);
    be16(&mut out, entries.len() as u16);
    be16(&mut out, 0);
    be32(&mut out, sfnt_size as u32);
    be32(&mut out, compressed.len() as u32);
    be16(&mut out, 1);
    be16(&mut out, 0);
    out.extend_from_slice(&[0; 20]);
    out.extend_from_slice(&directory);
    out.extend_from_slice(&compressed);
    out
}

// ============================================================================
// FONT SERVICE MOCK
// ============================================================================

type Responder = dyn Fn(&str) -> Result<TransportResponse, TransportError> + Send + Sync;

/// Transport answering from a closure and recording every URL
pub struct MockTransport {
    responder: Box<Responder>,
    delay: Option<Duration>,
    requests: Mutex<Vec<String>>,
}

impl MockTransport {
    pub fn new(
        responder: impl Fn(&str) -> Result<TransportResponse, TransportError> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            responder: Box::new(responder),
            delay: None,
            requests: Mutex::new(Vec::new()),
        })
    }

    /// Every request sleeps `delay` before answering
    pub fn slow(
        delay: Duration,
        responder: impl Fn(&str) -> Result<TransportResponse, TransportError> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            responder: Box::new(responder),
            delay: Some(delay),
            requests: Mutex::new(Vec::new()),
        })
    }

    /// Font service that knows `families` at every weight/style and serves `font`
    pub fn serving(families: &'static [&'static str], font: Vec<u8>) -> Arc<Self> {
        Self::new(move |url| {
            if let Some(family) = requested_family(url) {
                let known = families.iter().any(|f| f.eq_ignore_ascii_case(&family));
                if !known {
                    return Ok(TransportResponse { status: 400, body: Vec::new() });
                }
                return Ok(TransportResponse::ok(face_css(&family, "/files/font.ttf")));
            }
            Ok(TransportResponse::ok(font.clone()))
        })
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl FontTransport for MockTransport {
    async fn get(&self, url: &str) -> Result<TransportResponse, TransportError> {
        self.requests.lock().unwrap().push(url.to_string());
        if let Some(delay) = self.delay {
            smol::Timer::after(delay).await;
        }
        (self.responder)(url)
    }
}

/// Family named in a stylesheet request, `None` for other URLs
pub fn requested_family(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    let (_, value) = parsed.query_pairs().find(|(k, _)| k == "family")?;
    value.split(':').next().map(str::to_string)
}

/// Stylesheet declaring one face at every weight and both styles
pub fn face_css(family: &str, src: &str) -> String {
    ["normal", "italic"]
        .iter()
        .map(|style| {
            format!(
                "/* latin */\n@font-face {{\n  font-family: '{family}';\n  font-style: {style};\n  font-weight: 100 900;\n  src: url({src}) format('truetype');\n}}\n"
            )
        })
        .collect()
}

// ============================================================================
// LOG CAPTURE
// ============================================================================

#[derive(Clone, Default)]
pub struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl LogBuffer {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogBuffer {
    type Writer = LogBuffer;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Run `f` with tracing output captured, returning its result and the log
pub fn capture_logs<T>(f: impl FnOnce() -> T) -> (T, String) {
    let buffer = LogBuffer::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(buffer.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::DEBUG)
        .finish();
    let result = tracing::subscriber::with_default(subscriber, f);
    (result, buffer.contents())
}
