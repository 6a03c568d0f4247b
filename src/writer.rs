//! Serialization of a NIfTI-1 single-file volume into a byte buffer.

use std::io::Write;

use byteordered::ByteOrdered;
use flate2::write::GzEncoder;
use flate2::Compression;

use crate::error::{Error, Result};
use crate::frame::FrameRegion;
use crate::header::NiftiHeader;

/// Incremental writer for a NIfTI-1 single-file volume.
///
/// The header must be written exactly once, before any slice. Slices
/// are appended row-flipped (DICOM row 0 becomes NIfTI row `ny - 1`)
/// and tightly packed. `flatten` consumes the writer and returns the
/// assembled bytes, optionally gzip-compressed.
#[derive(Debug, Default)]
pub struct NiftiWriter {
    buffer: Vec<u8>,
    has_header: bool,
}

impl NiftiWriter {
    pub fn new() -> Self {
        NiftiWriter::default()
    }

    /// Serialize the 348-byte header followed by the four zero bytes
    /// that pad the volume offset to 352.
    pub fn write_header(&mut self, header: &NiftiHeader) -> Result<()> {
        if self.has_header {
            return Err(Error::BadSequenceOfCalls(
                "the NIfTI header was already written".to_owned(),
            ));
        }

        debug_assert!(self.buffer.is_empty());
        write_header_bytes(&mut self.buffer, header)?;
        debug_assert_eq!(self.buffer.len(), 348);

        // vox_offset is 352: four zero bytes follow the header
        self.buffer.extend_from_slice(&[0, 0, 0, 0]);

        self.has_header = true;
        Ok(())
    }

    /// Append one pixel region, flipping its rows.
    pub fn add_slice(&mut self, region: &FrameRegion<'_>) -> Result<()> {
        if !self.has_header {
            return Err(Error::BadSequenceOfCalls(
                "a slice was added before the NIfTI header".to_owned(),
            ));
        }
        if region.width() == 0 || region.height() == 0 {
            return Ok(());
        }

        self.buffer
            .reserve(region.row_len() * region.height() as usize);
        for y in (0..region.height()).rev() {
            self.buffer.extend_from_slice(region.row(y));
        }
        Ok(())
    }

    /// Return the assembled bytes, gzip-compressing them on request.
    pub fn flatten(self, compress: bool) -> Result<Vec<u8>> {
        if compress {
            let mut encoder = GzEncoder::new(Vec::new(), Compression::fast());
            encoder.write_all(&self.buffer)?;
            Ok(encoder.finish()?)
        } else {
            Ok(self.buffer)
        }
    }
}

fn write_header_bytes<W>(writer: W, header: &NiftiHeader) -> Result<()>
where
    W: Write,
{
    let mut writer = ByteOrdered::le(writer);

    writer.write_i32(header.sizeof_hdr)?;
    writer.write_all(&header.data_type)?;
    writer.write_all(&header.db_name)?;
    writer.write_i32(header.extents)?;
    writer.write_i16(header.session_error)?;
    writer.write_u8(header.regular)?;
    writer.write_u8(header.dim_info)?;
    for s in &header.dim {
        writer.write_u16(*s)?;
    }
    writer.write_f32(header.intent_p1)?;
    writer.write_f32(header.intent_p2)?;
    writer.write_f32(header.intent_p3)?;
    writer.write_i16(header.intent_code)?;
    writer.write_i16(header.datatype)?;
    writer.write_i16(header.bitpix)?;
    writer.write_i16(header.slice_start)?;
    for f in &header.pixdim {
        writer.write_f32(*f)?;
    }
    writer.write_f32(header.vox_offset)?;
    writer.write_f32(header.scl_slope)?;
    writer.write_f32(header.scl_inter)?;
    writer.write_i16(header.slice_end)?;
    writer.write_u8(header.slice_code)?;
    writer.write_u8(header.xyzt_units)?;
    writer.write_f32(header.cal_max)?;
    writer.write_f32(header.cal_min)?;
    writer.write_f32(header.slice_duration)?;
    writer.write_f32(header.toffset)?;
    writer.write_i32(header.glmax)?;
    writer.write_i32(header.glmin)?;

    if header.descrip.len() != 80 {
        return Err(Error::ParameterOutOfRange(format!(
            "description length is not 80 bytes: {}",
            header.descrip.len()
        )));
    }
    writer.write_all(&header.descrip)?;
    writer.write_all(&header.aux_file)?;
    writer.write_i16(header.qform_code)?;
    writer.write_i16(header.sform_code)?;
    for f in &[
        header.quatern_b,
        header.quatern_c,
        header.quatern_d,
        header.qoffset_x,
        header.qoffset_y,
        header.qoffset_z,
    ] {
        writer.write_f32(*f)?;
    }
    for f in header
        .srow_x
        .iter()
        .chain(&header.srow_y)
        .chain(&header.srow_z)
    {
        writer.write_f32(*f)?;
    }
    writer.write_all(&header.intent_name)?;
    writer.write_all(&header.magic)?;

    Ok(())
}
