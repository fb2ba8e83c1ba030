//! On-disk log entry framing.
//!
//! An entry is a header followed immediately by its body, with no
//! padding or separator: `[request_num: u32 BE][body_length: u32 BE]`
//! then exactly `body_length` bytes of encoded request.

use std::io::{self, Read, Write};

/// Size in bytes of an entry header.
pub const HEADER_SIZE: u64 = 8;

/// A decoded entry header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryHeader {
    /// Request number stamped into this entry.
    pub request_num: u32,
    /// Length in bytes of the body that follows.
    pub body_length: u32,
}

impl EntryHeader {
    /// Write this header to `w`.
    pub fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_all(&self.request_num.to_be_bytes())?;
        w.write_all(&self.body_length.to_be_bytes())
    }

    /// Read a header from `r`.
    ///
    /// Returns `Ok(None)` on a clean EOF before any bytes are read (no
    /// more entries). Any other failure, including a short read partway
    /// through the header, is returned as an `Err` so the caller can
    /// treat it as tail corruption.
    pub fn read_from<R: Read>(r: &mut R) -> io::Result<Option<Self>> {
        let mut buf = [0u8; HEADER_SIZE as usize];
        let mut filled = 0;
        loop {
            match r.read(&mut buf[filled..]) {
                Ok(0) => {
                    if filled == 0 {
                        return Ok(None);
                    }
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "short read of entry header",
                    ));
                }
                Ok(n) => {
                    filled += n;
                    if filled == buf.len() {
                        break;
                    }
                }
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        let request_num = u32::from_be_bytes(buf[0..4].try_into().unwrap());
        let body_length = u32::from_be_bytes(buf[4..8].try_into().unwrap());
        Ok(Some(EntryHeader {
            request_num,
            body_length,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn header_roundtrip() {
        let header = EntryHeader {
            request_num: 42,
            body_length: 17,
        };
        let mut buf = Vec::new();
        header.write_to(&mut buf).unwrap();
        assert_eq!(buf.len(), HEADER_SIZE as usize);

        let mut cursor = Cursor::new(buf);
        let parsed = EntryHeader::read_from(&mut cursor).unwrap().unwrap();
        assert_eq!(parsed, header);
    }

    #[test]
    fn header_clean_eof_at_boundary() {
        let mut cursor = Cursor::new(Vec::<u8>::new());
        assert!(EntryHeader::read_from(&mut cursor).unwrap().is_none());
    }

    #[test]
    fn header_short_read_is_error() {
        let mut cursor = Cursor::new(vec![0u8; 3]);
        assert!(EntryHeader::read_from(&mut cursor).is_err());
    }

    #[test]
    fn header_is_big_endian() {
        let header = EntryHeader {
            request_num: 1,
            body_length: 0,
        };
        let mut buf = Vec::new();
        header.write_to(&mut buf).unwrap();
        assert_eq!(&buf[0..4], &[0, 0, 0, 1]);
    }
}
