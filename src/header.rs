//! This module defines the `NiftiHeader` struct, the NIfTI-1 image
//! descriptor serialized in the first 348 bytes of a `.nii` file.
//!
//! This engine produces single-file, little-endian volumes only, so the
//! parsing helpers assume the same.

use std::io::Read;

use byteordered::ByteOrdered;
use num_traits::FromPrimitive;

use crate::error::{Error, Result};
use crate::typedef::{NiftiType, SliceOrder, Unit, XForm};

/// Magic code for full NIFTI-1 files (extension ".nii[.gz]").
pub const MAGIC_CODE_NIP1: &[u8; 4] = b"n+1\0";

/// The NIFTI-1 header data type.
/// All fields are public and named after the specification's header file.
#[derive(Debug, Clone, PartialEq)]
pub struct NiftiHeader {
    /// Header size, must be 348
    pub sizeof_hdr: i32,
    /// Unused in NIFTI-1
    pub data_type: [u8; 10],
    /// Unused in NIFTI-1
    pub db_name: [u8; 18],
    /// Unused in NIFTI-1
    pub extents: i32,
    /// Unused in NIFTI-1
    pub session_error: i16,
    /// Unused in NIFTI-1
    pub regular: u8,
    /// MRI slice ordering (frequency, phase and slice axes)
    pub dim_info: u8,
    /// Data array dimensions
    pub dim: [u16; 8],
    /// 1st intent parameter
    pub intent_p1: f32,
    /// 2nd intent parameter
    pub intent_p2: f32,
    /// 3rd intent parameter
    pub intent_p3: f32,
    /// NIFTI_INTENT_* code
    pub intent_code: i16,
    /// Defines the data type
    pub datatype: i16,
    /// Number of bits per voxel
    pub bitpix: i16,
    /// First slice index
    pub slice_start: i16,
    /// Grid spacings
    pub pixdim: [f32; 8],
    /// Offset into .nii file to reach the volume
    pub vox_offset: f32,
    /// Data scaling: slope
    pub scl_slope: f32,
    /// Data scaling: offset
    pub scl_inter: f32,
    /// Last slice index
    pub slice_end: i16,
    /// Slice timing order
    pub slice_code: u8,
    /// Units of pixdim[1..4]
    pub xyzt_units: u8,
    /// Max display intensity
    pub cal_max: f32,
    /// Min display intensity
    pub cal_min: f32,
    /// Time for 1 slice
    pub slice_duration: f32,
    /// Time axis shift
    pub toffset: f32,
    /// Unused in NIFTI-1
    pub glmax: i32,
    /// Unused in NIFTI-1
    pub glmin: i32,

    /// Any text you like, 80 bytes
    pub descrip: Vec<u8>,
    /// Auxiliary filename
    pub aux_file: [u8; 24],
    /// NIFTI_XFORM_* code
    pub qform_code: i16,
    /// NIFTI_XFORM_* code
    pub sform_code: i16,
    /// Quaternion b param
    pub quatern_b: f32,
    /// Quaternion c param
    pub quatern_c: f32,
    /// Quaternion d param
    pub quatern_d: f32,
    /// Quaternion x shift
    pub qoffset_x: f32,
    /// Quaternion y shift
    pub qoffset_y: f32,
    /// Quaternion z shift
    pub qoffset_z: f32,

    /// 1st row affine transform
    pub srow_x: [f32; 4],
    /// 2nd row affine transform
    pub srow_y: [f32; 4],
    /// 3rd row affine transform
    pub srow_z: [f32; 4],

    /// 'name' or meaning of data
    pub intent_name: [u8; 16],

    /// Magic code. Must be `b"n+1\0"` for single-file volumes
    pub magic: [u8; 4],
}

impl Default for NiftiHeader {
    fn default() -> NiftiHeader {
        NiftiHeader {
            sizeof_hdr: 348,
            data_type: [0; 10],
            db_name: [0; 18],
            extents: 0,
            session_error: 0,
            regular: 0,
            dim_info: 0,
            dim: [1, 0, 0, 0, 0, 0, 0, 0],
            intent_p1: 0.,
            intent_p2: 0.,
            intent_p3: 0.,
            intent_code: 0,
            datatype: 0,
            bitpix: 0,
            slice_start: 0,
            pixdim: [0.; 8],
            vox_offset: 352.,
            scl_slope: 0.,
            scl_inter: 0.,
            slice_end: 0,
            slice_code: 0,
            xyzt_units: 0,
            cal_max: 0.,
            cal_min: 0.,
            slice_duration: 0.,
            toffset: 0.,
            glmax: 0,
            glmin: 0,

            descrip: vec![0; 80],
            aux_file: [0; 24],
            qform_code: 0,
            sform_code: 0,
            quatern_b: 0.,
            quatern_c: 0.,
            quatern_d: 0.,
            qoffset_x: 0.,
            qoffset_y: 0.,
            qoffset_z: 0.,

            srow_x: [0.; 4],
            srow_y: [0.; 4],
            srow_z: [0.; 4],

            intent_name: [0; 16],

            magic: *MAGIC_CODE_NIP1,
        }
    }
}

impl NiftiHeader {
    /// Read a NIfTI-1 header from the given little-endian byte stream.
    /// It is assumed that the input is currently at the start of the
    /// NIFTI header.
    pub fn from_stream<S: Read>(input: S) -> Result<NiftiHeader> {
        let mut h = NiftiHeader::default();
        let mut input = ByteOrdered::le(input);

        h.sizeof_hdr = input.read_i32()?;
        input.read_exact(&mut h.data_type)?;
        input.read_exact(&mut h.db_name)?;
        h.extents = input.read_i32()?;
        h.session_error = input.read_i16()?;
        h.regular = input.read_u8()?;
        h.dim_info = input.read_u8()?;
        for v in &mut h.dim {
            *v = input.read_u16()?;
        }
        if h.dim[0] > 7 {
            return Err(Error::BadFileFormat(format!(
                "invalid dimension count in NIfTI header: {}",
                h.dim[0]
            )));
        }
        h.intent_p1 = input.read_f32()?;
        h.intent_p2 = input.read_f32()?;
        h.intent_p3 = input.read_f32()?;
        h.intent_code = input.read_i16()?;
        h.datatype = input.read_i16()?;
        h.bitpix = input.read_i16()?;
        h.slice_start = input.read_i16()?;
        for v in &mut h.pixdim {
            *v = input.read_f32()?;
        }
        h.vox_offset = input.read_f32()?;
        h.scl_slope = input.read_f32()?;
        h.scl_inter = input.read_f32()?;
        h.slice_end = input.read_i16()?;
        h.slice_code = input.read_u8()?;
        h.xyzt_units = input.read_u8()?;
        h.cal_max = input.read_f32()?;
        h.cal_min = input.read_f32()?;
        h.slice_duration = input.read_f32()?;
        h.toffset = input.read_f32()?;
        h.glmax = input.read_i32()?;
        h.glmin = input.read_i32()?;

        // descrip is an 80-elem vec already
        input.read_exact(h.descrip.as_mut_slice())?;
        input.read_exact(&mut h.aux_file)?;
        h.qform_code = input.read_i16()?;
        h.sform_code = input.read_i16()?;
        h.quatern_b = input.read_f32()?;
        h.quatern_c = input.read_f32()?;
        h.quatern_d = input.read_f32()?;
        h.qoffset_x = input.read_f32()?;
        h.qoffset_y = input.read_f32()?;
        h.qoffset_z = input.read_f32()?;
        for v in &mut h.srow_x {
            *v = input.read_f32()?;
        }
        for v in &mut h.srow_y {
            *v = input.read_f32()?;
        }
        for v in &mut h.srow_z {
            *v = input.read_f32()?;
        }
        input.read_exact(&mut h.intent_name)?;
        input.read_exact(&mut h.magic)?;

        debug_assert_eq!(h.descrip.len(), 80);

        if &h.magic != MAGIC_CODE_NIP1 {
            Err(Error::BadFileFormat(
                "invalid magic code in NIfTI header".to_owned(),
            ))
        } else {
            Ok(h)
        }
    }

    /// Get the data type as a validated enum.
    pub fn data_type(&self) -> Result<NiftiType> {
        FromPrimitive::from_i16(self.datatype).ok_or_else(|| {
            Error::BadFileFormat(format!("invalid datatype code: {}", self.datatype))
        })
    }

    /// Get the slice order as a validated enum.
    pub fn slice_order(&self) -> Result<SliceOrder> {
        FromPrimitive::from_u8(self.slice_code).ok_or_else(|| {
            Error::BadFileFormat(format!("invalid slice order code: {}", self.slice_code))
        })
    }

    /// Get the spatial units type as a validated unit enum.
    pub fn xyzt_to_space(&self) -> Result<Unit> {
        let space_code = self.xyzt_units & 0o0007;
        FromPrimitive::from_u8(space_code).ok_or_else(|| {
            Error::BadFileFormat(format!("invalid space units code: {}", space_code))
        })
    }

    /// Get the time units type as a validated unit enum.
    pub fn xyzt_to_time(&self) -> Result<Unit> {
        let time_code = self.xyzt_units & 0o0070;
        FromPrimitive::from_u8(time_code)
            .ok_or_else(|| Error::BadFileFormat(format!("invalid time units code: {}", time_code)))
    }

    /// Pack the spatial and temporal units into the `xyzt_units` byte.
    pub fn set_xyzt_units(&mut self, space: Unit, time: Unit) {
        self.xyzt_units = (space as u8 & 0o0007) | (time as u8 & 0o0070);
    }

    /// Get the qform coordinate mapping method as a validated enum.
    pub fn qform(&self) -> Result<XForm> {
        FromPrimitive::from_i16(self.qform_code)
            .ok_or_else(|| Error::BadFileFormat(format!("invalid qform code: {}", self.qform_code)))
    }

    /// Get the sform coordinate mapping method as a validated enum.
    pub fn sform(&self) -> Result<XForm> {
        FromPrimitive::from_i16(self.sform_code)
            .ok_or_else(|| Error::BadFileFormat(format!("invalid sform code: {}", self.sform_code)))
    }

    /// Pack the 1-based frequency, phase and slice axis indicators into
    /// the `dim_info` byte (two bits each).
    pub fn set_fps_dims(&mut self, freq_dim: u8, phase_dim: u8, slice_dim: u8) {
        self.dim_info = (freq_dim & 0x03) | ((phase_dim & 0x03) << 2) | ((slice_dim & 0x03) << 4);
    }

    /// Unpack the `(frequency, phase, slice)` axis indicators.
    pub fn fps_dims(&self) -> (u8, u8, u8) {
        (
            self.dim_info & 0x03,
            (self.dim_info >> 2) & 0x03,
            (self.dim_info >> 4) & 0x03,
        )
    }

    /// The total number of voxels implied by `dim`.
    pub fn num_voxels(&self) -> usize {
        (1..=usize::from(self.dim[0].min(7)))
            .map(|i| usize::from(self.dim[i]))
            .product()
    }

    /// Ensure that the current `descrip` field is valid and is exactly
    /// equal to 80 bytes.
    pub fn validate_description(&mut self) -> Result<()> {
        let len = self.descrip.len();
        if len > 80 {
            Err(Error::ParameterOutOfRange(format!(
                "description length over 80 bytes: {}",
                len
            )))
        } else {
            if len < 80 {
                self.descrip.extend((len..80).map(|_| 0));
            }
            Ok(())
        }
    }

    /// Safely set the `descrip` field using a buffer of at most 80 bytes.
    pub fn set_description(&mut self, description: &[u8]) -> Result<()> {
        let len = description.len();
        if len <= 80 {
            let mut descrip = vec![0; 80];
            descrip[..len].copy_from_slice(description);
            self.descrip = descrip;
            Ok(())
        } else {
            Err(Error::ParameterOutOfRange(format!(
                "description length over 80 bytes: {}",
                len
            )))
        }
    }

    /// Safely set the `descrip` field using a `&str`.
    pub fn set_description_str(&mut self, description: &str) -> Result<()> {
        self.set_description(description.as_bytes())
    }
}
