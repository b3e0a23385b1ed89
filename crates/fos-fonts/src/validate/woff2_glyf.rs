//! WOFF2 table transform reversal
//!
//! - glyf: seven parallel streams with triplet-encoded coordinates
//! - loca: rebuilt from the reconstructed glyph offsets
//! - hmtx: side bearings dropped by the encoder are restored from glyph xMin

use super::DecodeError;
use super::reader::FontReader;

const ARG_1_AND_2_ARE_WORDS: u16 = 0x0001;
const WE_HAVE_A_SCALE: u16 = 0x0008;
const MORE_COMPONENTS: u16 = 0x0020;
const WE_HAVE_AN_X_AND_Y_SCALE: u16 = 0x0040;
const WE_HAVE_A_TWO_BY_TWO: u16 = 0x0080;
const WE_HAVE_INSTRUCTIONS: u16 = 0x0100;

const GLYF_ON_CURVE: u8 = 0x01;
const GLYF_X_SHORT: u8 = 0x02;
const GLYF_Y_SHORT: u8 = 0x04;
const GLYF_REPEAT: u8 = 0x08;
const GLYF_X_SAME_OR_POSITIVE: u8 = 0x10;
const GLYF_Y_SAME_OR_POSITIVE: u8 = 0x20;
const GLYF_OVERLAP_SIMPLE: u8 = 0x40;

const OPTION_OVERLAP_SIMPLE_BITMAP: u16 = 0x0001;

/// Reconstructed glyf/loca pair
#[derive(Debug)]
pub(crate) struct GlyfOutput {
    pub glyf: Vec<u8>,
    pub loca: Vec<u8>,
    /// xMin per glyph, 0 for empty glyphs
    pub x_mins: Vec<i16>,
}

fn bad(table: &'static str) -> impl Fn(DecodeError) -> DecodeError {
    move |_| DecodeError::InvalidTransform(table)
}

/// Split `len` bytes off the front of `rest`
fn take<'a>(rest: &mut &'a [u8], len: u32) -> Result<&'a [u8], DecodeError> {
    let len = len as usize;
    if len > rest.len() {
        return Err(DecodeError::InvalidTransform("glyf"));
    }
    let (head, tail) = rest.split_at(len);
    *rest = tail;
    Ok(head)
}

fn bit_is_set(bitmap: &[u8], index: usize) -> bool {
    bitmap
        .get(index >> 3)
        .is_some_and(|byte| byte & (0x80 >> (index & 7)) != 0)
}

/// Reverse the glyf transform; also produces loca in the header's index format
pub(crate) fn reconstruct_glyf(data: &[u8]) -> Result<GlyfOutput, DecodeError> {
    let mut header = FontReader::new(data);
    let err = bad("glyf");
    let _reserved = header.read_u16().map_err(&err)?;
    let option_flags = header.read_u16().map_err(&err)?;
    let num_glyphs = header.read_u16().map_err(&err)? as usize;
    let index_format = header.read_u16().map_err(&err)?;
    let mut sizes = [0u32; 7];
    for size in &mut sizes {
        *size = header.read_u32().map_err(&err)?;
    }

    let mut rest = &data[header.pos()..];
    let n_contour_stream = take(&mut rest, sizes[0])?;
    let n_points_stream = take(&mut rest, sizes[1])?;
    let flag_stream = take(&mut rest, sizes[2])?;
    let glyph_stream = take(&mut rest, sizes[3])?;
    let composite_stream = take(&mut rest, sizes[4])?;
    let bbox_stream = take(&mut rest, sizes[5])?;
    let instruction_stream = take(&mut rest, sizes[6])?;
    let overlap_bitmap = if option_flags & OPTION_OVERLAP_SIMPLE_BITMAP != 0 {
        Some(take(&mut rest, num_glyphs.div_ceil(8) as u32)?)
    } else {
        None
    };

    let bbox_bitmap_len = num_glyphs.div_ceil(32) * 4;
    if bbox_stream.len() < bbox_bitmap_len {
        return Err(DecodeError::InvalidTransform("glyf"));
    }
    let (bbox_bitmap, bbox_values) = bbox_stream.split_at(bbox_bitmap_len);

    let mut streams = GlyphStreams {
        n_contours: FontReader::new(n_contour_stream),
        n_points: FontReader::new(n_points_stream),
        flags: FontReader::new(flag_stream),
        glyphs: FontReader::new(glyph_stream),
        composites: FontReader::new(composite_stream),
        bboxes: FontReader::new(bbox_values),
        instructions: FontReader::new(instruction_stream),
    };

    let mut glyf = Vec::new();
    let mut offsets = Vec::with_capacity(num_glyphs + 1);
    let mut x_mins = Vec::with_capacity(num_glyphs);

    for glyph_id in 0..num_glyphs {
        offsets.push(glyf.len() as u32);
        let n_contours = streams.n_contours.read_i16().map_err(&err)?;
        let explicit_bbox = bit_is_set(bbox_bitmap, glyph_id);

        let x_min = match n_contours {
            0 => {
                if explicit_bbox {
                    return Err(DecodeError::InvalidTransform("glyf"));
                }
                0
            }
            n if n < 0 => {
                if !explicit_bbox {
                    return Err(DecodeError::InvalidTransform("glyf"));
                }
                streams.write_composite(&mut glyf)?
            }
            n => {
                let overlap = overlap_bitmap.is_some_and(|bitmap| bit_is_set(bitmap, glyph_id));
                streams.write_simple(&mut glyf, n as u16, explicit_bbox, overlap)?
            }
        };
        x_mins.push(x_min);
        glyf.resize((glyf.len() + 3) & !3, 0);
    }
    offsets.push(glyf.len() as u32);

    let loca = build_loca(&offsets, index_format)?;
    Ok(GlyfOutput { glyf, loca, x_mins })
}

struct GlyphStreams<'a> {
    n_contours: FontReader<'a>,
    n_points: FontReader<'a>,
    flags: FontReader<'a>,
    glyphs: FontReader<'a>,
    composites: FontReader<'a>,
    bboxes: FontReader<'a>,
    instructions: FontReader<'a>,
}

impl GlyphStreams<'_> {
    fn read_bbox(&mut self) -> Result<[i16; 4], DecodeError> {
        let err = bad("glyf");
        Ok([
            self.bboxes.read_i16().map_err(&err)?,
            self.bboxes.read_i16().map_err(&err)?,
            self.bboxes.read_i16().map_err(&err)?,
            self.bboxes.read_i16().map_err(&err)?,
        ])
    }

    fn write_instructions(&mut self, out: &mut Vec<u8>) -> Result<(), DecodeError> {
        let err = bad("glyf");
        let len = self.glyphs.read_255_u16().map_err(&err)?;
        let bytes = self.instructions.read_bytes(len as usize).map_err(&err)?;
        out.extend_from_slice(&len.to_be_bytes());
        out.extend_from_slice(bytes);
        Ok(())
    }

    /// Returns the glyph's xMin
    fn write_simple(
        &mut self,
        out: &mut Vec<u8>,
        n_contours: u16,
        explicit_bbox: bool,
        overlap: bool,
    ) -> Result<i16, DecodeError> {
        let err = bad("glyf");

        let mut end_points = Vec::with_capacity(n_contours as usize);
        let mut total_points = 0u32;
        for _ in 0..n_contours {
            total_points += self.n_points.read_255_u16().map_err(&err)? as u32;
            if total_points == 0 || total_points > u16::MAX as u32 + 1 {
                return Err(DecodeError::InvalidTransform("glyf"));
            }
            end_points.push((total_points - 1) as u16);
        }

        let mut points = Vec::with_capacity(total_points as usize);
        let (mut x, mut y) = (0i32, 0i32);
        for _ in 0..total_points {
            let flag = self.flags.read_u8().map_err(&err)?;
            let (dx, dy) = decode_triplet(flag & 0x7F, &mut self.glyphs)?;
            x += dx;
            y += dy;
            points.push(Point { x, y, dx, dy, on_curve: flag & 0x80 == 0 });
        }

        let bbox = if explicit_bbox {
            self.read_bbox()?
        } else {
            let x_min = points.iter().map(|p| p.x).min().unwrap_or(0);
            let y_min = points.iter().map(|p| p.y).min().unwrap_or(0);
            let x_max = points.iter().map(|p| p.x).max().unwrap_or(0);
            let y_max = points.iter().map(|p| p.y).max().unwrap_or(0);
            [x_min as i16, y_min as i16, x_max as i16, y_max as i16]
        };

        out.extend_from_slice(&(n_contours as i16).to_be_bytes());
        for v in bbox {
            out.extend_from_slice(&v.to_be_bytes());
        }
        for end in &end_points {
            out.extend_from_slice(&end.to_be_bytes());
        }
        self.write_instructions(out)?;
        write_points(out, &points, overlap);

        Ok(bbox[0])
    }

    /// Returns the glyph's xMin
    fn write_composite(&mut self, out: &mut Vec<u8>) -> Result<i16, DecodeError> {
        let err = bad("glyf");
        let bbox = self.read_bbox()?;

        out.extend_from_slice(&(-1i16).to_be_bytes());
        for v in bbox {
            out.extend_from_slice(&v.to_be_bytes());
        }

        let mut have_instructions = false;
        loop {
            let flags = self.composites.read_u16().map_err(&err)?;
            let glyph_index = self.composites.read_u16().map_err(&err)?;
            let mut arg_len = if flags & ARG_1_AND_2_ARE_WORDS != 0 { 4 } else { 2 };
            if flags & WE_HAVE_A_TWO_BY_TWO != 0 {
                arg_len += 8;
            } else if flags & WE_HAVE_AN_X_AND_Y_SCALE != 0 {
                arg_len += 4;
            } else if flags & WE_HAVE_A_SCALE != 0 {
                arg_len += 2;
            }
            let args = self.composites.read_bytes(arg_len).map_err(&err)?;

            out.extend_from_slice(&flags.to_be_bytes());
            out.extend_from_slice(&glyph_index.to_be_bytes());
            out.extend_from_slice(args);

            have_instructions |= flags & WE_HAVE_INSTRUCTIONS != 0;
            if flags & MORE_COMPONENTS == 0 {
                break;
            }
        }

        if have_instructions {
            self.write_instructions(out)?;
        }
        Ok(bbox[0])
    }
}

#[derive(Debug, Clone, Copy)]
struct Point {
    x: i32,
    y: i32,
    dx: i32,
    dy: i32,
    on_curve: bool,
}

fn with_sign(flag: u8, base: i32) -> i32 {
    if flag & 1 != 0 { base } else { -base }
}

/// Decode one point delta; `flag` has the on-curve bit already stripped
pub(crate) fn decode_triplet(flag: u8, glyphs: &mut FontReader<'_>) -> Result<(i32, i32), DecodeError> {
    let n = match flag {
        0..=83 => 1,
        84..=119 => 2,
        120..=123 => 3,
        _ => 4,
    };
    let b = glyphs.read_bytes(n).map_err(bad("glyf"))?;
    let b: Vec<i32> = b.iter().map(|&v| v as i32).collect();

    let delta = match flag {
        0..=9 => (0, with_sign(flag, (((flag & 14) as i32) << 7) + b[0])),
        10..=19 => (with_sign(flag, ((((flag - 10) & 14) as i32) << 7) + b[0]), 0),
        20..=83 => {
            let b0 = (flag - 20) as i32;
            (
                with_sign(flag, 1 + (b0 & 0x30) + (b[0] >> 4)),
                with_sign(flag >> 1, 1 + ((b0 & 0x0C) << 2) + (b[0] & 0x0F)),
            )
        }
        84..=119 => {
            let b0 = (flag - 84) as i32;
            (
                with_sign(flag, 1 + ((b0 / 12) << 8) + b[0]),
                with_sign(flag >> 1, 1 + (((b0 % 12) >> 2) << 8) + b[1]),
            )
        }
        120..=123 => (
            with_sign(flag, (b[0] << 4) + (b[1] >> 4)),
            with_sign(flag >> 1, ((b[1] & 0x0F) << 8) + b[2]),
        ),
        _ => (
            with_sign(flag, (b[0] << 8) + b[1]),
            with_sign(flag >> 1, (b[2] << 8) + b[3]),
        ),
    };
    Ok(delta)
}

/// Write TrueType flags (run-length packed), then x and y deltas
fn write_points(out: &mut Vec<u8>, points: &[Point], overlap: bool) {
    let mut flags: Vec<u8> = Vec::with_capacity(points.len());
    let mut xs = Vec::new();
    let mut ys = Vec::new();
    let mut last_flag = None;
    let mut repeat = 0u8;

    for (i, point) in points.iter().enumerate() {
        let mut flag = if point.on_curve { GLYF_ON_CURVE } else { 0 };
        if overlap && i == 0 {
            flag |= GLYF_OVERLAP_SIMPLE;
        }

        if point.dx == 0 {
            flag |= GLYF_X_SAME_OR_POSITIVE;
        } else if point.dx.abs() < 256 {
            flag |= GLYF_X_SHORT;
            if point.dx > 0 {
                flag |= GLYF_X_SAME_OR_POSITIVE;
            }
            xs.push(point.dx.unsigned_abs() as u8);
        } else {
            xs.extend_from_slice(&(point.dx as i16).to_be_bytes());
        }

        if point.dy == 0 {
            flag |= GLYF_Y_SAME_OR_POSITIVE;
        } else if point.dy.abs() < 256 {
            flag |= GLYF_Y_SHORT;
            if point.dy > 0 {
                flag |= GLYF_Y_SAME_OR_POSITIVE;
            }
            ys.push(point.dy.unsigned_abs() as u8);
        } else {
            ys.extend_from_slice(&(point.dy as i16).to_be_bytes());
        }

        if last_flag == Some(flag) && repeat < 255 {
            if let Some(previous) = flags.last_mut().filter(|_| repeat == 0) {
                *previous |= GLYF_REPEAT;
            }
            repeat += 1;
        } else {
            if repeat > 0 {
                flags.push(repeat);
            }
            flags.push(flag);
            repeat = 0;
        }
        last_flag = Some(flag);
    }
    if repeat > 0 {
        flags.push(repeat);
    }

    out.extend_from_slice(&flags);
    out.extend_from_slice(&xs);
    out.extend_from_slice(&ys);
}

fn build_loca(offsets: &[u32], index_format: u16) -> Result<Vec<u8>, DecodeError> {
    match index_format {
        0 => {
            let mut loca = Vec::with_capacity(offsets.len() * 2);
            for &offset in offsets {
                if offset > 0x1FFFE {
                    return Err(DecodeError::InvalidTransform("loca"));
                }
                loca.extend_from_slice(&((offset / 2) as u16).to_be_bytes());
            }
            Ok(loca)
        }
        1 => Ok(offsets.iter().flat_map(|o| o.to_be_bytes()).collect()),
        _ => Err(DecodeError::InvalidTransform("loca")),
    }
}

/// Reverse the hmtx transform using glyph xMin values for dropped bearings
pub(crate) fn reconstruct_hmtx(
    data: &[u8],
    num_glyphs: u16,
    num_h_metrics: u16,
    x_mins: &[i16],
) -> Result<Vec<u8>, DecodeError> {
    let err = bad("hmtx");
    let (num_glyphs, num_h_metrics) = (num_glyphs as usize, num_h_metrics as usize);
    if num_h_metrics == 0 || num_h_metrics > num_glyphs || x_mins.len() < num_glyphs {
        return Err(DecodeError::InvalidTransform("hmtx"));
    }

    let mut reader = FontReader::new(data);
    let flags = reader.read_u8().map_err(&err)?;
    if flags & 0xFC != 0 {
        return Err(DecodeError::InvalidTransform("hmtx"));
    }
    let proportional_lsb_present = flags & 0x01 == 0;
    let monospace_lsb_present = flags & 0x02 == 0;

    let mut advances = Vec::with_capacity(num_h_metrics);
    for _ in 0..num_h_metrics {
        advances.push(reader.read_u16().map_err(&err)?);
    }

    let mut lsbs = Vec::with_capacity(num_glyphs);
    for glyph_id in 0..num_glyphs {
        let present = if glyph_id < num_h_metrics {
            proportional_lsb_present
        } else {
            monospace_lsb_present
        };
        lsbs.push(if present {
            reader.read_i16().map_err(&err)?
        } else {
            x_mins[glyph_id]
        });
    }

    let mut hmtx = Vec::with_capacity(num_h_metrics * 4 + (num_glyphs - num_h_metrics) * 2);
    for (glyph_id, lsb) in lsbs.iter().enumerate() {
        if let Some(advance) = advances.get(glyph_id) {
            hmtx.extend_from_slice(&advance.to_be_bytes());
        }
        hmtx.extend_from_slice(&lsb.to_be_bytes());
    }
    Ok(hmtx)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triplet(flag: u8, bytes: &[u8]) -> (i32, i32) {
        let mut reader = FontReader::new(bytes);
        decode_triplet(flag, &mut reader).unwrap()
    }

    #[test]
    fn test_triplets() {
        assert_eq!(triplet(0, &[5]), (0, -5));
        assert_eq!(triplet(1, &[5]), (0, 5));
        assert_eq!(triplet(3, &[5]), (0, 256 + 5));
        assert_eq!(triplet(11, &[7]), (7, 0));
        assert_eq!(triplet(10, &[7]), (-7, 0));
        // 4-bit x and y nibbles, both positive
        assert_eq!(triplet(23, &[0x21]), (3, 2));
        assert_eq!(triplet(127, &[0x01, 0x00, 0x00, 0x64]), (256, 100));
        assert_eq!(triplet(124, &[0x00, 0x32, 0x00, 0x10]), (-50, -16));
    }

    fn stream_header(num_glyphs: u16, index_format: u16, sizes: [u32; 7]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&0u16.to_be_bytes());
        out.extend_from_slice(&0u16.to_be_bytes());
        out.extend_from_slice(&num_glyphs.to_be_bytes());
        out.extend_from_slice(&index_format.to_be_bytes());
        for size in sizes {
            out.extend_from_slice(&size.to_be_bytes());
        }
        out
    }

    #[test]
    fn test_reconstruct_triangle() {
        // Glyph 0 empty, glyph 1 a triangle (0,0) (100,0) (50,100)
        let n_contours = [0x00, 0x00, 0x00, 0x01];
        let n_points = [3u8];
        let flags = [127u8, 127, 126];
        let glyphs = [
            0, 0, 0, 0, // (+0, +0)
            0, 100, 0, 0, // (+100, +0)
            0, 50, 0, 100, // (-50, +100)
            0, // no instructions
        ];
        let bbox = [0u8; 4];

        let mut data = stream_header(2, 0, [4, 1, 3, glyphs.len() as u32, 0, 4, 0]);
        data.extend_from_slice(&n_contours);
        data.extend_from_slice(&n_points);
        data.extend_from_slice(&flags);
        data.extend_from_slice(&glyphs);
        data.extend_from_slice(&bbox);

        let output = reconstruct_glyf(&data).unwrap();
        assert_eq!(output.x_mins, vec![0, 0]);

        let glyph = &output.glyf;
        assert_eq!(&glyph[0..2], &1i16.to_be_bytes());
        assert_eq!(&glyph[2..10], &[0, 0, 0, 0, 0, 100, 0, 100]);
        assert_eq!(&glyph[10..12], &2u16.to_be_bytes());
        assert_eq!(&glyph[12..14], &0u16.to_be_bytes());
        // Flags: (0,0) same/same, (100,0) x-short positive, (-50,100) both short
        assert_eq!(&glyph[14..17], &[0x31, 0x33, 0x27]);
        // x deltas then y delta
        assert_eq!(&glyph[17..20], &[100, 50, 100]);
        assert_eq!(glyph.len() % 4, 0);

        // Short loca: [0, 0, len / 2]
        let end = (glyph.len() / 2) as u16;
        let mut loca = vec![0, 0, 0, 0];
        loca.extend_from_slice(&end.to_be_bytes());
        assert_eq!(output.loca, loca);
    }

    #[test]
    fn test_composite_requires_bbox() {
        let mut data = stream_header(1, 1, [2, 0, 0, 0, 0, 4, 0]);
        data.extend_from_slice(&(-1i16).to_be_bytes());
        data.extend_from_slice(&[0u8; 4]);
        assert!(reconstruct_glyf(&data).is_err());
    }

    #[test]
    fn test_flag_repeat_packing() {
        let points: Vec<Point> = (0..4)
            .map(|_| Point { x: 0, y: 0, dx: 0, dy: 0, on_curve: true })
            .collect();
        let mut out = Vec::new();
        write_points(&mut out, &points, false);
        assert_eq!(out, vec![0x31 | GLYF_REPEAT, 3]);
    }

    #[test]
    fn test_hmtx_restores_bearings() {
        // 3 glyphs, 2 long metrics, all bearings dropped
        let mut data = vec![0x03];
        data.extend_from_slice(&500u16.to_be_bytes());
        data.extend_from_slice(&600u16.to_be_bytes());

        let hmtx = reconstruct_hmtx(&data, 3, 2, &[10, -5, 7]).unwrap();
        let mut expected = Vec::new();
        expected.extend_from_slice(&500u16.to_be_bytes());
        expected.extend_from_slice(&10i16.to_be_bytes());
        expected.extend_from_slice(&600u16.to_be_bytes());
        expected.extend_from_slice(&(-5i16).to_be_bytes());
        expected.extend_from_slice(&7i16.to_be_bytes());
        assert_eq!(hmtx, expected);
    }
}
