//! Band-sequential output pixel buffer.

use bytes::Bytes;

use crate::raster::{CellEncoding, ColorMap};
use crate::tile::{read_sample, write_sample};

/// A `width` x `height` image of `bands` planes sharing one encoding.
///
/// Each plane is `ceil(width * height * bits / 8)` bytes, rows are not
/// padded, and planes follow each other in band order.
#[derive(Debug, Clone, PartialEq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    bands: usize,
    encoding: CellEncoding,
    data: Vec<u8>,
}

impl PixelBuffer {
    /// A buffer with every sample set to `fill`.
    pub fn new(width: u32, height: u32, bands: usize, encoding: CellEncoding, fill: u64) -> Self {
        let samples = width as usize * height as usize;
        let plane_len = encoding.byte_len(samples);

        let data = if encoding.is_packed() {
            let mut pattern = [0u8];
            let bits = encoding.bits_per_sample() as usize;
            for i in 0..8 / bits {
                write_sample(&mut pattern, encoding, i, fill);
            }
            vec![pattern[0]; plane_len * bands]
        } else {
            let size = encoding.bytes_per_sample();
            fill.to_le_bytes()[..size].repeat(samples * bands)
        };

        Self {
            width,
            height,
            bands,
            encoding,
            data,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn bands(&self) -> usize {
        self.bands
    }

    pub fn encoding(&self) -> CellEncoding {
        self.encoding
    }

    pub fn plane_len(&self) -> usize {
        self.encoding
            .byte_len(self.width as usize * self.height as usize)
    }

    pub fn plane(&self, band: usize) -> &[u8] {
        let len = self.plane_len();
        &self.data[band * len..(band + 1) * len]
    }

    fn plane_mut(&mut self, band: usize) -> &mut [u8] {
        let len = self.plane_len();
        &mut self.data[band * len..(band + 1) * len]
    }

    fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }

    /// Raw sample bits.
    pub fn sample(&self, band: usize, x: u32, y: u32) -> u64 {
        read_sample(self.plane(band), self.encoding, self.index(x, y))
    }

    pub fn set_sample(&mut self, band: usize, x: u32, y: u32, value: u64) {
        let index = self.index(x, y);
        let encoding = self.encoding;
        write_sample(self.plane_mut(band), encoding, index, value);
    }

    /// Copy `count` byte-aligned samples starting at `src` into row `y`
    /// from column `x`. `src` must hold at least `count` samples.
    pub fn copy_row(&mut self, band: usize, x: u32, y: u32, src: &[u8], count: usize) {
        let index = self.index(x, y);
        let encoding = self.encoding;
        if encoding.is_packed() {
            let plane = self.plane_mut(band);
            for i in 0..count {
                write_sample(plane, encoding, index + i, read_sample(src, encoding, i));
            }
        } else {
            let size = encoding.bytes_per_sample();
            let start = index * size;
            self.plane_mut(band)[start..start + count * size]
                .copy_from_slice(&src[..count * size]);
        }
    }

    /// Nearest-neighbour resample to `width` x `height`.
    pub fn resample(&self, width: u32, height: u32) -> PixelBuffer {
        if (width, height) == (self.width, self.height) {
            return self.clone();
        }
        let mut out = PixelBuffer::new(width, height, self.bands, self.encoding, 0);
        if self.width == 0 || self.height == 0 {
            return out;
        }
        for band in 0..self.bands {
            for y in 0..height {
                let sy = nearest(y, height, self.height);
                for x in 0..width {
                    let sx = nearest(x, width, self.width);
                    out.set_sample(band, x, y, self.sample(band, sx, sy));
                }
            }
        }
        out
    }

    /// Expand one band through a colormap into four UInt8 bands (RGBA).
    /// Values without an entry become transparent black.
    pub fn apply_colormap(&self, band: usize, colormap: &ColorMap) -> PixelBuffer {
        let mut out = PixelBuffer::new(self.width, self.height, 4, CellEncoding::UInt8, 0);
        for y in 0..self.height {
            for x in 0..self.width {
                let rgba = colormap
                    .lookup(self.sample(band, x, y))
                    .unwrap_or([0, 0, 0, 0]);
                for (channel, value) in rgba.into_iter().enumerate() {
                    out.set_sample(channel, x, y, value as u64);
                }
            }
        }
        out
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Bytes {
        Bytes::from(self.data)
    }
}

/// Source index for output index `i` when mapping `out_len` onto `src_len`,
/// sampling at pixel centres.
fn nearest(i: u32, out_len: u32, src_len: u32) -> u32 {
    let centre = (i as f64 + 0.5) * src_len as f64 / out_len as f64;
    (centre.floor() as u32).min(src_len - 1)
}
