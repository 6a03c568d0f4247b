//! Decoded pixel frames and the frame-decoder boundary.
//!
//! Decoding DICOM pixel data is delegated to the host through the
//! [`FrameDecoder`] trait, the only polymorphic boundary of the engine.
//! A decoded frame is a pitched 2-D pixel buffer from which the
//! conversion driver requests rectangular sub-regions.

use crate::error::{Error, Result};
use crate::slice::Slice;
use crate::typedef::NiftiType;

/// The pixel layouts supported by the conversion engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// 16-bit unsigned grayscale.
    Grayscale16,
    /// 16-bit signed grayscale.
    SignedGrayscale16,
}

impl PixelFormat {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Grayscale16 | PixelFormat::SignedGrayscale16 => 2,
        }
    }

    /// The NIfTI datatype this pixel format maps to.
    pub fn nifti_type(self) -> NiftiType {
        match self {
            PixelFormat::Grayscale16 => NiftiType::Uint16,
            PixelFormat::SignedGrayscale16 => NiftiType::Int16,
        }
    }
}

/// One decoded pixel frame: width, height, row pitch, pixel format and
/// the backing bytes. The pitch may exceed the row byte count.
#[derive(Debug, Clone)]
pub struct DecodedFrame {
    format: PixelFormat,
    width: u32,
    height: u32,
    pitch: usize,
    data: Vec<u8>,
}

impl DecodedFrame {
    pub fn new(
        format: PixelFormat,
        width: u32,
        height: u32,
        pitch: usize,
        data: Vec<u8>,
    ) -> Result<Self> {
        let row_len = width as usize * format.bytes_per_pixel();
        if pitch < row_len {
            return Err(Error::ParameterOutOfRange(format!(
                "frame pitch {} smaller than the row length {}",
                pitch, row_len
            )));
        }
        let needed = if height == 0 {
            0
        } else {
            (height as usize - 1) * pitch + row_len
        };
        if data.len() < needed {
            return Err(Error::ParameterOutOfRange(format!(
                "frame buffer of {} byte(s) cannot hold {} row(s)",
                data.len(),
                height
            )));
        }
        Ok(DecodedFrame {
            format,
            width,
            height,
            pitch,
            data,
        })
    }

    /// Build a frame whose pitch is exactly the row byte count.
    pub fn tightly_packed(
        format: PixelFormat,
        width: u32,
        height: u32,
        data: Vec<u8>,
    ) -> Result<Self> {
        let pitch = width as usize * format.bytes_per_pixel();
        DecodedFrame::new(format, width, height, pitch, data)
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Borrow the sub-region `(x, y, width, height)` of this frame.
    pub fn region(&self, x: u32, y: u32, width: u32, height: u32) -> Result<FrameRegion<'_>> {
        if x + width > self.width || y + height > self.height {
            return Err(Error::ParameterOutOfRange(format!(
                "region {}x{}+{}+{} outside a {}x{} frame",
                width, height, x, y, self.width, self.height
            )));
        }
        let offset = y as usize * self.pitch + x as usize * self.format.bytes_per_pixel();
        Ok(FrameRegion {
            format: self.format,
            width,
            height,
            pitch: self.pitch,
            data: &self.data[offset..],
        })
    }
}

/// A rectangular view into a decoded frame. Rows are `pitch` bytes
/// apart in the underlying buffer.
#[derive(Debug, Clone, Copy)]
pub struct FrameRegion<'a> {
    format: PixelFormat,
    width: u32,
    height: u32,
    pitch: usize,
    data: &'a [u8],
}

impl<'a> FrameRegion<'a> {
    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// The number of bytes in one tightly-packed row.
    pub fn row_len(&self) -> usize {
        self.width as usize * self.format.bytes_per_pixel()
    }

    /// Borrow row `y`, without the pitch padding.
    pub fn row(&self, y: u32) -> &'a [u8] {
        debug_assert!(y < self.height);
        let start = y as usize * self.pitch;
        &self.data[start..start + self.row_len()]
    }
}

/// The decoded-frame capability provided by the host: given a slice
/// (which carries its instance index and frame number), produce the
/// decoded pixel frame it belongs to.
///
/// Returning `Ok(None)` is a contract violation that the driver reports
/// as a `NullPointer` error.
pub trait FrameDecoder {
    fn decode_frame(&mut self, slice: &Slice) -> Result<Option<DecodedFrame>>;
}
