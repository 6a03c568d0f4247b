//! The conversion driver: walks the ordered slice plan, requests pixel
//! regions from the injected frame decoder and feeds them to the
//! writer.

use crate::collection::InstanceCollection;
use crate::error::{Error, Result};
use crate::frame::{DecodedFrame, FrameDecoder, PixelFormat};
use crate::slice::Slice;
use crate::writer::NiftiWriter;

/// Decode every slice of the plan and append it to the writer.
///
/// The decoder is invoked once per distinct `(instance index, frame
/// number)` key; the current decoded frame is kept until the key
/// changes. All slices must share the same dimensions and pixel
/// format.
pub fn write_slice_data(
    writer: &mut NiftiWriter,
    decoder: &mut dyn FrameDecoder,
    slices: &[Slice],
) -> Result<()> {
    for slice in slices.iter().skip(1) {
        if slice.width() != slices[0].width() || slice.height() != slices[0].height() {
            return Err(Error::NotImplemented(
                "The slices have varying dimensions".to_owned(),
            ));
        }
    }

    // No frame is current until the first slice asks for one
    let mut current: Option<(usize, u32, DecodedFrame)> = None;
    let mut format: Option<PixelFormat> = None;

    for slice in slices {
        let stale = match &current {
            Some((instance_index, frame_number, _)) => {
                *instance_index != slice.instance_index() || *frame_number != slice.frame_number()
            }
            None => true,
        };

        if stale {
            let frame = decoder.decode_frame(slice)?.ok_or_else(|| {
                Error::NullPointer("the frame decoder returned no frame".to_owned())
            })?;
            current = Some((slice.instance_index(), slice.frame_number(), frame));
        }

        let frame = match &current {
            Some((_, _, frame)) => frame,
            None => {
                return Err(Error::InternalError(
                    "no current frame after decoding".to_owned(),
                ))
            }
        };

        let region = frame.region(slice.x(), slice.y(), slice.width(), slice.height())?;

        match format {
            None => format = Some(region.format()),
            Some(format) if format != region.format() => {
                return Err(Error::IncompatibleImageFormat(
                    "The slices have varying pixel formats".to_owned(),
                ));
            }
            Some(_) => {}
        }

        writer.add_slice(&region)?;
    }

    Ok(())
}

/// Convert a whole collection into a NIfTI-1 byte buffer, optionally
/// gzip-compressed.
pub fn series_to_nifti(
    collection: &InstanceCollection,
    decoder: &mut dyn FrameDecoder,
    compress: bool,
) -> Result<Vec<u8>> {
    let (header, slices) = collection.create_nifti_header()?;

    let mut writer = NiftiWriter::new();
    writer.write_header(&header)?;
    write_slice_data(&mut writer, decoder, &slices)?;
    writer.flatten(compress)
}
