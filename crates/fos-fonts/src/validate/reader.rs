//! Bounds-checked big-endian reader for font binaries

use super::DecodeError;

type ReadResult<T> = Result<T, DecodeError>;

/// Binary reader with bounds checking
pub(crate) struct FontReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> FontReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    #[cfg(test)]
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    pub fn read_u8(&mut self) -> ReadResult<u8> {
        let v = *self.data.get(self.pos).ok_or(DecodeError::UnexpectedEof)?;
        self.pos += 1;
        Ok(v)
    }

    pub fn read_u16(&mut self) -> ReadResult<u16> {
        let b = self.read_bytes(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    pub fn read_i16(&mut self) -> ReadResult<i16> {
        Ok(self.read_u16()? as i16)
    }

    pub fn read_u32(&mut self) -> ReadResult<u32> {
        let b = self.read_bytes(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn read_tag(&mut self) -> ReadResult<[u8; 4]> {
        let b = self.read_bytes(4)?;
        Ok([b[0], b[1], b[2], b[3]])
    }

    pub fn read_bytes(&mut self, n: usize) -> ReadResult<&'a [u8]> {
        let end = self.pos.checked_add(n).ok_or(DecodeError::UnexpectedEof)?;
        if end > self.data.len() {
            return Err(DecodeError::UnexpectedEof);
        }
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    /// WOFF2 `255UInt16`
    pub fn read_255_u16(&mut self) -> ReadResult<u16> {
        const ONE_MORE_BYTE_CODE1: u8 = 255;
        const ONE_MORE_BYTE_CODE2: u8 = 254;
        const WORD_CODE: u8 = 253;
        const LOWEST_U_CODE: u16 = 253;

        match self.read_u8()? {
            WORD_CODE => self.read_u16(),
            ONE_MORE_BYTE_CODE1 => Ok(self.read_u8()? as u16 + LOWEST_U_CODE),
            ONE_MORE_BYTE_CODE2 => Ok(self.read_u8()? as u16 + LOWEST_U_CODE * 2),
            code => Ok(code as u16),
        }
    }

    /// WOFF2 `UIntBase128`
    pub fn read_base128(&mut self) -> ReadResult<u32> {
        let mut value = 0u32;
        for i in 0..5 {
            let byte = self.read_u8()?;
            // No leading zero bytes
            if i == 0 && byte == 0x80 {
                return Err(DecodeError::InvalidTableDirectory);
            }
            if value & 0xFE00_0000 != 0 {
                return Err(DecodeError::InvalidTableDirectory);
            }
            value = (value << 7) | (byte & 0x7F) as u32;
            if byte & 0x80 == 0 {
                return Ok(value);
            }
        }
        Err(DecodeError::InvalidTableDirectory)
    }
}
