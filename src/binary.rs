/// Byte order for multi-byte reads.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Endianness {
    Big,
    Little,
}

/// Explicit cursor over a byte slice.
///
/// Reads past the end never panic: numeric reads saturate to zero, slice
/// reads return the available prefix, and the `truncated` flag latches so a
/// caller can detect that a record was shorter than its declared layout.
#[derive(Clone, Debug)]
pub struct BinaryReader<'a> {
    data: &'a [u8],
    pos: usize,
    endianness: Endianness,
    truncated: bool,
}

impl<'a> BinaryReader<'a> {
    pub fn new(data: &'a [u8], endianness: Endianness) -> Self {
        Self {
            data,
            pos: 0,
            endianness,
            truncated: false,
        }
    }

    pub fn big_endian(data: &'a [u8]) -> Self {
        Self::new(data, Endianness::Big)
    }

    pub fn little_endian(data: &'a [u8]) -> Self {
        Self::new(data, Endianness::Little)
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// True once any read ran past the end of the data.
    pub fn truncated(&self) -> bool {
        self.truncated
    }

    /// Reads up to `n` bytes, short when the data runs out.
    pub fn read(&mut self, n: usize) -> &'a [u8] {
        let avail = n.min(self.remaining());
        if avail < n {
            self.truncated = true;
        }
        let out = &self.data[self.pos..self.pos + avail];
        self.pos += avail;
        out
    }

    pub fn skip(&mut self, n: usize) {
        let avail = n.min(self.remaining());
        if avail < n {
            self.truncated = true;
        }
        self.pos += avail;
    }

    fn read_array<const N: usize>(&mut self) -> [u8; N] {
        let mut out = [0u8; N];
        let got = self.read(N);
        out[..got.len()].copy_from_slice(got);
        out
    }

    pub fn read_u8(&mut self) -> u8 {
        self.read_array::<1>()[0]
    }

    pub fn read_u16(&mut self) -> u16 {
        let b = self.read_array::<2>();
        match self.endianness {
            Endianness::Big => u16::from_be_bytes(b),
            Endianness::Little => u16::from_le_bytes(b),
        }
    }

    pub fn read_u32(&mut self) -> u32 {
        let b = self.read_array::<4>();
        match self.endianness {
            Endianness::Big => u32::from_be_bytes(b),
            Endianness::Little => u32::from_le_bytes(b),
        }
    }

    pub fn read_i16(&mut self) -> i16 {
        self.read_u16() as i16
    }

    pub fn read_i32(&mut self) -> i32 {
        self.read_u32() as i32
    }

    pub fn read_f32(&mut self) -> f32 {
        f32::from_bits(self.read_u32())
    }

    pub fn read_f64(&mut self) -> f64 {
        let b = self.read_array::<8>();
        match self.endianness {
            Endianness::Big => f64::from_be_bytes(b),
            Endianness::Little => f64::from_le_bytes(b),
        }
    }

    pub fn read_f64_array(&mut self, n: usize) -> Vec<f64> {
        (0..n).map(|_| self.read_f64()).collect()
    }

    /// Reads exactly `len` bytes as lossy UTF-8, dropping trailing NULs.
    pub fn read_utf8(&mut self, len: usize) -> String {
        let bytes = self.read(len);
        let end = bytes
            .iter()
            .rposition(|&b| b != 0)
            .map_or(0, |i| i + 1);
        String::from_utf8_lossy(&bytes[..end]).into_owned()
    }

    /// Consumes `max` bytes and decodes up to the first NUL.
    pub fn read_utf8_nul(&mut self, max: usize) -> String {
        let bytes = self.read(max);
        let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
        String::from_utf8_lossy(&bytes[..end]).into_owned()
    }

    /// An independent cursor over `[offset, offset + len)` of the underlying
    /// data, clamped to the available range; does not move this cursor.
    pub fn sub_reader(&self, offset: usize, len: usize) -> BinaryReader<'a> {
        let start = offset.min(self.data.len());
        let end = (start + len).min(self.data.len());
        BinaryReader::new(&self.data[start..end], self.endianness)
    }

    /// Advances by `len` and returns a cursor over the consumed bytes.
    pub fn take(&mut self, len: usize) -> BinaryReader<'a> {
        BinaryReader::new(self.read(len), self.endianness)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_big_and_little_endian() {
        let data = [0x01, 0x02, 0x03, 0x04];
        let mut be = BinaryReader::big_endian(&data);
        assert_eq!(be.read_u32(), 0x0102_0304);
        let mut le = BinaryReader::little_endian(&data);
        assert_eq!(le.read_u32(), 0x0403_0201);
    }

    #[test]
    fn over_read_saturates_and_latches() {
        let data = [0xff, 0xff];
        let mut r = BinaryReader::big_endian(&data);
        assert_eq!(r.read_u32(), 0xffff_0000);
        assert!(r.truncated());
        assert_eq!(r.read_u32(), 0);
        assert_eq!(r.read(10), &[] as &[u8]);
    }

    #[test]
    fn in_range_reads_do_not_latch() {
        let data = [0u8; 8];
        let mut r = BinaryReader::big_endian(&data);
        r.read_u32();
        r.read_u32();
        assert!(!r.truncated());
        assert!(r.is_empty());
    }

    #[test]
    fn utf8_nul_consumes_full_width() {
        let data = b"abc\0defXYZ";
        let mut r = BinaryReader::big_endian(data);
        assert_eq!(r.read_utf8_nul(7), "abc");
        assert_eq!(r.read_utf8(3), "XYZ");
    }

    #[test]
    fn utf8_trims_trailing_nuls_only() {
        let data = b"a\0b\0\0";
        let mut r = BinaryReader::big_endian(data);
        assert_eq!(r.read_utf8(5), "a\0b");
    }

    #[test]
    fn take_and_sub_reader_are_independent() {
        let data = [1, 2, 3, 4, 5, 6];
        let mut r = BinaryReader::big_endian(&data);
        let mut head = r.take(2);
        assert_eq!(head.read_u16(), 0x0102);
        assert_eq!(r.position(), 2);
        let mut sub = r.sub_reader(4, 10);
        assert_eq!(sub.read_u16(), 0x0506);
        assert_eq!(r.position(), 2);
    }

    #[test]
    fn f64_array_reads_sequential_values() {
        let mut data = Vec::new();
        data.extend_from_slice(&1.5f64.to_be_bytes());
        data.extend_from_slice(&(-2.0f64).to_be_bytes());
        let mut r = BinaryReader::big_endian(&data);
        assert_eq!(r.read_f64_array(2), vec![1.5, -2.0]);
    }
}
