//! Sample access for packed sub-byte cells and byte-aligned cells.
//!
//! Sub-byte samples (1, 2 and 4 bits) are packed MSB-first with no row
//! padding: sample `i` occupies bits `i * bits .. (i + 1) * bits` counted from
//! the most significant bit of byte 0. Byte-aligned samples are little-endian.

use bytes::Bytes;

use crate::raster::CellEncoding;

/// Extract packed sample `index`.
#[inline]
pub fn read_packed(data: &[u8], bits: u32, index: usize) -> u8 {
    let bit_pos = index * bits as usize;
    let byte = data[bit_pos / 8];
    let shift = 8 - bits as usize - bit_pos % 8;
    let mask = ((1u16 << bits) - 1) as u8;
    (byte >> shift) & mask
}

/// Overwrite packed sample `index` with the low `bits` of `value`.
#[inline]
pub fn write_packed(data: &mut [u8], bits: u32, index: usize, value: u8) {
    let bit_pos = index * bits as usize;
    let shift = 8 - bits as usize - bit_pos % 8;
    let mask = ((1u16 << bits) - 1) as u8;
    let byte = &mut data[bit_pos / 8];
    *byte = (*byte & !(mask << shift)) | ((value & mask) << shift);
}

/// Read sample `index` of any encoding as raw bits.
pub fn read_sample(data: &[u8], encoding: CellEncoding, index: usize) -> u64 {
    if encoding.is_packed() {
        return read_packed(data, encoding.bits_per_sample(), index) as u64;
    }
    let size = encoding.bytes_per_sample();
    let start = index * size;
    let mut raw = [0u8; 8];
    raw[..size].copy_from_slice(&data[start..start + size]);
    u64::from_le_bytes(raw)
}

/// Write raw bits into sample `index` of any encoding.
pub fn write_sample(data: &mut [u8], encoding: CellEncoding, index: usize, value: u64) {
    if encoding.is_packed() {
        write_packed(data, encoding.bits_per_sample(), index, value as u8);
        return;
    }
    let size = encoding.bytes_per_sample();
    let start = index * size;
    data[start..start + size].copy_from_slice(&value.to_le_bytes()[..size]);
}

/// A tile (or mask) of packed samples with on-demand extraction.
#[derive(Debug, Clone, PartialEq)]
pub struct PackedSamples {
    data: Bytes,
    bits: u32,
    width: u32,
    height: u32,
}

impl PackedSamples {
    /// Wrap `data`. Returns `None` when `bits` is not 1, 2 or 4, or when
    /// `data` is too short for `width * height` samples.
    pub fn new(data: Bytes, bits: u32, width: u32, height: u32) -> Option<Self> {
        if !matches!(bits, 1 | 2 | 4) {
            return None;
        }
        let needed = (width as usize * height as usize * bits as usize).div_ceil(8);
        if data.len() < needed {
            return None;
        }
        Some(Self {
            data,
            bits,
            width,
            height,
        })
    }

    pub fn bits(&self) -> u32 {
        self.bits
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn as_bytes(&self) -> &Bytes {
        &self.data
    }

    /// Sample at (`x`, `y`).
    pub fn sample(&self, x: u32, y: u32) -> u8 {
        read_packed(&self.data, self.bits, self.index(x, y))
    }

    /// One row, one byte per sample.
    pub fn row(&self, y: u32) -> Vec<u8> {
        let start = self.index(0, y);
        (start..start + self.width as usize)
            .map(|i| read_packed(&self.data, self.bits, i))
            .collect()
    }

    /// All samples, one byte per sample, row-major.
    pub fn expand(&self) -> Vec<u8> {
        (0..self.width as usize * self.height as usize)
            .map(|i| read_packed(&self.data, self.bits, i))
            .collect()
    }

    fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }
}
