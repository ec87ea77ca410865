//! LEB128 as used in `.dex` files: at most 5 bytes, 32-bit values

use super::CodeFormatError;

const MAX_LEB128_LEN: usize = 5;

pub fn read_uleb128(bytes: &[u8], offset: &mut usize) -> Result<u32, CodeFormatError> {
    let start = *offset;
    let mut result: u32 = 0;
    for i in 0..MAX_LEB128_LEN {
        let byte = *bytes
            .get(start + i)
            .ok_or(CodeFormatError::UnexpectedEof)?;
        let payload = (byte & 0x7f) as u32;

        // Fifth byte only has room for the top 4 bits
        if i == MAX_LEB128_LEN - 1 && (byte & 0xf0) != 0 {
            return Err(CodeFormatError::InvalidLeb128 { offset: start });
        }

        result |= payload << (7 * i);
        if byte & 0x80 == 0 {
            *offset = start + i + 1;
            return Ok(result);
        }
    }
    Err(CodeFormatError::InvalidLeb128 { offset: start })
}

pub fn read_sleb128(bytes: &[u8], offset: &mut usize) -> Result<i32, CodeFormatError> {
    let start = *offset;
    let mut result: u32 = 0;
    for i in 0..MAX_LEB128_LEN {
        let byte = *bytes
            .get(start + i)
            .ok_or(CodeFormatError::UnexpectedEof)?;
        let payload = (byte & 0x7f) as u32;

        if i == MAX_LEB128_LEN - 1 {
            // The top 4 bits must be a sign extension of bit 31
            let high = byte & 0x78;
            if byte & 0x80 != 0 || (high != 0 && high != 0x78) {
                return Err(CodeFormatError::InvalidLeb128 { offset: start });
            }
        }

        result |= payload << (7 * i);
        if byte & 0x80 == 0 {
            let shift = 7 * (i + 1);
            let value = if shift < 32 && (byte & 0x40) != 0 {
                result | (!0u32 << shift)
            } else {
                result
            };
            *offset = start + i + 1;
            return Ok(value as i32);
        }
    }
    Err(CodeFormatError::InvalidLeb128 { offset: start })
}

pub fn write_uleb128(out: &mut Vec<u8>, mut value: u32) {
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            out.push(byte);
            return;
        }
        out.push(byte | 0x80);
    }
}

pub fn write_sleb128(out: &mut Vec<u8>, mut value: i32) {
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        let done = (value == 0 && byte & 0x40 == 0) || (value == -1 && byte & 0x40 != 0);
        if done {
            out.push(byte);
            return;
        }
        out.push(byte | 0x80);
    }
}
