use crate::error::{Error, Result};
use zerocopy::FromBytes;
use zerocopy::byteorder::big_endian::{I16 as I16BE, I32 as I32BE, I64 as I64BE};

/// Read 1-byte integer
pub fn read_int_1(data: &[u8]) -> Result<(u8, &[u8])> {
    match data.split_first() {
        Some((&first, rest)) => Ok((first, rest)),
        None => Err(Error::UnexpectedEof),
    }
}

/// Read 2-byte big-endian integer
pub fn read_int_2(data: &[u8]) -> Result<(i16, &[u8])> {
    let (value, rest) = I16BE::read_from_prefix(data).map_err(|_| Error::UnexpectedEof)?;
    Ok((value.get(), rest))
}

/// Read 4-byte big-endian integer
pub fn read_int_4(data: &[u8]) -> Result<(i32, &[u8])> {
    let (value, rest) = I32BE::read_from_prefix(data).map_err(|_| Error::UnexpectedEof)?;
    Ok((value.get(), rest))
}

/// Read 8-byte big-endian integer
pub fn read_int_8(data: &[u8]) -> Result<(i64, &[u8])> {
    let (value, rest) = I64BE::read_from_prefix(data).map_err(|_| Error::UnexpectedEof)?;
    Ok((value.get(), rest))
}

/// Read fixed-length string
pub fn read_string_fix(data: &[u8], len: usize) -> Result<(&[u8], &[u8])> {
    if data.len() < len {
        return Err(Error::UnexpectedEof);
    }
    Ok(data.split_at(len))
}

/// Read null-terminated string
pub fn read_string_null(data: &[u8]) -> Result<(&[u8], &[u8])> {
    match memchr::memchr(0, data) {
        Some(i) => Ok((&data[..i], &data[i + 1..])),
        None => Err(Error::UnexpectedEof),
    }
}

/// Write 1-byte integer
pub fn write_int_1(out: &mut Vec<u8>, value: u8) {
    out.push(value);
}

/// Write 2-byte big-endian integer
pub fn write_int_2(out: &mut Vec<u8>, value: i16) {
    out.extend_from_slice(&value.to_be_bytes());
}

/// Write 4-byte big-endian integer
pub fn write_int_4(out: &mut Vec<u8>, value: i32) {
    out.extend_from_slice(&value.to_be_bytes());
}

/// Write 8-byte big-endian integer
pub fn write_int_8(out: &mut Vec<u8>, value: i64) {
    out.extend_from_slice(&value.to_be_bytes());
}

/// Write fixed-length bytes
pub fn write_bytes_fix(out: &mut Vec<u8>, data: &[u8]) {
    out.extend_from_slice(data);
}

/// Write `data` padded with zero bytes to exactly `len` bytes
pub fn write_bytes_padded(out: &mut Vec<u8>, data: &[u8], len: usize) {
    let n = data.len().min(len);
    out.extend_from_slice(&data[..n]);
    out.resize(out.len() + (len - n), 0);
}

/// Write null-terminated string
pub fn write_string_null(out: &mut Vec<u8>, s: &str) {
    out.extend_from_slice(s.as_bytes());
    out.push(0);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_big_endian() {
        let data = [0x00, 0x01, 0xFF, 0xFF, 0xFF, 0xFF, 0x07];
        let (a, rest) = read_int_2(&data).unwrap();
        assert_eq!(a, 1);
        let (b, rest) = read_int_4(rest).unwrap();
        assert_eq!(b, -1);
        assert_eq!(rest, &[0x07]);
        assert!(matches!(read_int_4(rest), Err(Error::UnexpectedEof)));
    }

    #[test]
    fn null_terminated() {
        let (s, rest) = read_string_null(b"abc\0def").unwrap();
        assert_eq!(s, b"abc");
        assert_eq!(rest, b"def");
        assert!(read_string_null(b"abc").is_err());
    }

    #[test]
    fn padded_write() {
        let mut out = Vec::new();
        write_bytes_padded(&mut out, b"ab", 5);
        assert_eq!(out, b"ab\0\0\0");
        out.clear();
        write_bytes_padded(&mut out, b"abcdef", 3);
        assert_eq!(out, b"abc");
    }
}
