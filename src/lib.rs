//! Conversion of DICOM image series into NIfTI-1 volumes.
//!
//! This crate turns the per-slice or per-frame DICOM instances of one
//! medical-imaging series into a single NIfTI-1 single-file volume,
//! optionally gzip-compressed. It parses per-instance metadata
//! (including the Siemens CSA header and the UIH per-frame sequence),
//! explodes mosaic and tiled instances into 2-D slices, sorts and
//! groups the slices into a consistent 3-D or 4-D grid, derives the
//! NIfTI spatial orientation, and serializes the header and the
//! row-flipped pixel payload.
//!
//! Pixel decoding is delegated to the host through the
//! [`FrameDecoder`] trait, so the engine never touches compressed
//! transfer syntaxes itself.
//!
//! # Example
//!
//! ```no_run
//! use dicom2nii::{DicomInstance, FrameDecoder, InstanceCollection, Result};
//! # fn decoder() -> Box<dyn FrameDecoder> { unimplemented!() }
//! # fn tag_table() -> dicom2nii::DicomMap { unimplemented!() }
//!
//! # fn run() -> Result<()> {
//! let mut collection = InstanceCollection::new();
//! collection.add_instance(DicomInstance::new(tag_table())?, "instance-0");
//!
//! let mut decoder = decoder();
//! let nii = dicom2nii::series_to_nifti(&collection, &mut *decoder, false)?;
//! # let _ = nii;
//! # Ok(())
//! # }
//! ```

pub mod affine;
pub mod collection;
pub mod convert;
pub mod csa;
pub mod error;
pub mod frame;
pub mod header;
pub mod instance;
pub mod reader;
pub mod slice;
pub mod typedef;
mod util;
pub mod writer;

pub use crate::collection::InstanceCollection;
pub use crate::convert::{series_to_nifti, write_slice_data};
pub use crate::csa::{CsaHeader, CsaTag};
pub use crate::error::{Error, Result};
pub use crate::frame::{DecodedFrame, FrameDecoder, FrameRegion, PixelFormat};
pub use crate::header::NiftiHeader;
pub use crate::instance::{
    DicomInstance, DicomMap, Manufacturer, Modality, PhaseEncodingDirection,
};
pub use crate::reader::BufferReader;
pub use crate::slice::Slice;
pub use crate::typedef::{NiftiType, SliceOrder, Unit, XForm};
pub use crate::writer::NiftiWriter;
