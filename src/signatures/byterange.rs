//! ByteRange handling for PDF signatures.
//!
//! PDF digital signatures use a ByteRange array to specify which portions
//! of the document are covered by the signature. The signature itself is
//! stored in a gap that is excluded from the signed bytes.
//!
//! ## ByteRange Format
//!
//! The ByteRange is an array of four integers:
//! `[offset1, length1, offset2, length2]`
//!
//! Where:
//! - `offset1` = 0 (start of file)
//! - `length1` = byte offset where the signature value begins
//! - `offset2` = byte offset where the signature value ends
//! - `length2` = remaining bytes to end of the signed revision
//!
//! The signature value is a hex-encoded string within `<` and `>` delimiters.

use crate::error::{Error, Result};

/// A parsed `/ByteRange` array.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    offset1: usize,
    length1: usize,
    offset2: usize,
    length2: usize,
}

impl ByteRange {
    /// Build from the integers of a `/ByteRange` array.
    ///
    /// Only the common two-segment form is accepted; negative values are rejected.
    pub fn from_values(values: &[i64]) -> Result<Self> {
        if values.len() != 4 {
            return Err(Error::InvalidByteRange(format!(
                "expected 4 elements, got {}",
                values.len()
            )));
        }
        let mut parts = [0usize; 4];
        for (slot, value) in parts.iter_mut().zip(values) {
            *slot = usize::try_from(*value)
                .map_err(|_| Error::InvalidByteRange(format!("negative value {}", value)))?;
        }
        Ok(Self {
            offset1: parts[0],
            length1: parts[1],
            offset2: parts[2],
            length2: parts[3],
        })
    }

    /// End offset of the signed revision.
    pub fn end(&self) -> usize {
        self.offset2.saturating_add(self.length2)
    }

    /// Check that the ByteRange is well formed against a revision of `file_size` bytes.
    ///
    /// A valid ByteRange should:
    /// - Start at offset 0
    /// - End inside the file (later incremental updates may follow)
    /// - Have no gaps except for the signature value
    pub fn validate(&self, file_size: usize) -> Result<()> {
        // First range must start at 0
        if self.offset1 != 0 {
            return Err(Error::InvalidByteRange(format!("must start at 0, got {}", self.offset1)));
        }

        let end = self
            .offset2
            .checked_add(self.length2)
            .ok_or_else(|| Error::InvalidByteRange("second range overflows".to_string()))?;
        if end > file_size {
            return Err(Error::InvalidByteRange(format!(
                "second range ends at {} beyond file size {}",
                end, file_size
            )));
        }

        // First range must end before second range starts
        if self.length1 > self.offset2 {
            return Err(Error::InvalidByteRange(format!(
                "first range ({}) overlaps with second range start ({})",
                self.length1, self.offset2
            )));
        }

        Ok(())
    }

    /// Whether the signed revision is the whole file.
    pub fn covers_whole_file(&self, file_size: usize) -> bool {
        self.offset1 == 0 && self.end() == file_size
    }

    /// Extract the bytes covered by the signature.
    ///
    /// This returns the concatenation of the two ranges.
    pub fn extract_signed_bytes(&self, pdf_data: &[u8]) -> Result<Vec<u8>> {
        self.validate(pdf_data.len())?;

        let mut signed_bytes = Vec::with_capacity(self.length1 + self.length2);
        signed_bytes.extend_from_slice(&pdf_data[self.offset1..self.offset1 + self.length1]);
        signed_bytes.extend_from_slice(&pdf_data[self.offset2..self.offset2 + self.length2]);

        Ok(signed_bytes)
    }

    /// Decode the hex `/Contents` value sitting in the gap between both ranges.
    ///
    /// Trailing zero padding is kept; DER decoders stop at the end of the
    /// outer structure.
    pub fn extract_contents(&self, pdf_data: &[u8]) -> Result<Vec<u8>> {
        self.validate(pdf_data.len())?;
        let gap = &pdf_data[self.length1..self.offset2];
        let inner = gap
            .strip_prefix(b"<")
            .and_then(|g| g.strip_suffix(b">"))
            .ok_or_else(|| {
                Error::InvalidByteRange("gap is not a hex string".to_string())
            })?;
        decode_hex(inner)
    }
}

/// Decode a PDF hex string body, ignoring whitespace.
pub fn decode_hex(input: &[u8]) -> Result<Vec<u8>> {
    let digits: Vec<u8> = input
        .iter()
        .copied()
        .filter(|b| !matches!(b, b' ' | b'\t' | b'\n' | b'\r' | 0x0C | 0x00))
        .collect();

    let nibble = |c: u8| -> Result<u8> {
        match c {
            b'0'..=b'9' => Ok(c - b'0'),
            b'a'..=b'f' => Ok(c - b'a' + 10),
            b'A'..=b'F' => Ok(c - b'A' + 10),
            _ => Err(Error::InvalidByteRange(format!("invalid hex digit 0x{:02x}", c))),
        }
    };

    // An odd trailing digit is padded with 0 (PDF 32000-1 7.3.4.3)
    let mut out = Vec::with_capacity(digits.len().div_ceil(2));
    for pair in digits.chunks(2) {
        let hi = nibble(pair[0])?;
        let lo = match pair.get(1) {
            Some(c) => nibble(*c)?,
            None => 0,
        };
        out.push((hi << 4) | lo);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_signed_bytes() {
        let pdf_data = b"AAABBBCCC"; // 9 bytes
        let byte_range = ByteRange::from_values(&[0, 3, 6, 3]).unwrap(); // "AAA" + "CCC"

        let signed = byte_range.extract_signed_bytes(pdf_data).unwrap();
        assert_eq!(signed, b"AAACCC");
        assert!(byte_range.covers_whole_file(pdf_data.len()));
    }

    #[test]
    fn test_validate_byte_range_valid() {
        let byte_range = ByteRange::from_values(&[0, 100, 150, 50]).unwrap();
        assert!(byte_range.validate(200).is_ok());
    }

    #[test]
    fn test_validate_byte_range_earlier_revision() {
        // Incremental updates after the signature are allowed
        let byte_range = ByteRange::from_values(&[0, 100, 150, 50]).unwrap();
        assert!(byte_range.validate(400).is_ok());
        assert!(!byte_range.covers_whole_file(400));
    }

    #[test]
    fn test_validate_byte_range_invalid_start() {
        let byte_range = ByteRange::from_values(&[10, 100, 150, 50]).unwrap();
        assert!(byte_range.validate(200).is_err());
    }

    #[test]
    fn test_validate_byte_range_invalid_end() {
        let byte_range = ByteRange::from_values(&[0, 100, 150, 100]).unwrap();
        assert!(byte_range.validate(200).is_err());
    }

    #[test]
    fn test_validate_byte_range_overlap() {
        let byte_range = ByteRange::from_values(&[0, 160, 150, 50]).unwrap();
        assert!(byte_range.validate(200).is_err());
    }

    #[test]
    fn test_from_values_rejects_bad_shapes() {
        assert!(ByteRange::from_values(&[0, 1, 2]).is_err());
        assert!(ByteRange::from_values(&[0, -1, 2, 3]).is_err());
    }

    #[test]
    fn test_extract_contents() {
        let pdf_data = b"AAA<3082 00>CCC";
        let byte_range = ByteRange::from_values(&[0, 3, 12, 3]).unwrap();
        let contents = byte_range.extract_contents(pdf_data).unwrap();
        assert_eq!(contents, vec![0x30, 0x82, 0x00]);
    }

    #[test]
    fn test_decode_hex_odd_length() {
        assert_eq!(decode_hex(b"ABC").unwrap(), vec![0xAB, 0xC0]);
        assert!(decode_hex(b"XY").is_err());
    }
}
