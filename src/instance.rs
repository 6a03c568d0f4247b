//! Per-instance parsed DICOM metadata and slice extraction.

use std::cmp::Ordering;

use dicom_core::Tag;
use dicom_dictionary_std::tags;
use dicom_object::mem::InMemDicomObject;
use dicom_object::StandardDataDictionary;
use log::warn;
use nalgebra::Vector3;

use crate::affine::dicom_affine;
use crate::csa::CsaHeader;
use crate::error::{Error, Result};
use crate::frame::PixelFormat;
use crate::slice::Slice;
use crate::typedef::SliceOrder;
use crate::util::{is_near, parse_double, parse_i32, parse_u32};

const TAG_SLICE_SLOPE_PHILIPS: Tag = Tag(0x2005, 0x100e);
const TAG_SLICE_TIMING_SIEMENS: Tag = Tag(0x0019, 0x1029);

const CSA_NUMBER_OF_IMAGES_IN_MOSAIC: &str = "NumberOfImagesInMosaic";
const CSA_SLICE_NORMAL_VECTOR: &str = "SliceNormalVector";

/// The tag table of one DICOM instance, as delivered by the host.
pub type DicomMap = InMemDicomObject<StandardDataDictionary>;

/// Scanner vendor, detected from the Manufacturer attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Manufacturer {
    Unknown,
    Siemens,
    GE,
    Hitachi,
    Mediso,
    Philips,
    Toshiba,
    Canon,
    Uih,
    Bruker,
}

/// Imaging modality, detected from the Modality attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Modality {
    Unknown,
    Mr,
    Pet,
    Ct,
}

/// In-plane phase-encoding direction of an MR acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseEncodingDirection {
    None,
    Row,
    Column,
}

fn detect_manufacturer(dicom: &DicomMap) -> Manufacturer {
    let manufacturer = tag_first_string(dicom, tags::MANUFACTURER)
        .unwrap_or_default()
        .to_uppercase();

    if manufacturer.starts_with("SI") {
        Manufacturer::Siemens
    } else if manufacturer.starts_with("GE") {
        Manufacturer::GE
    } else if manufacturer.starts_with("HI") {
        Manufacturer::Hitachi
    } else if manufacturer.starts_with("ME") {
        Manufacturer::Mediso
    } else if manufacturer.starts_with("PH") {
        Manufacturer::Philips
    } else if manufacturer.starts_with("TO") {
        Manufacturer::Toshiba
    } else if manufacturer.starts_with("CA") {
        Manufacturer::Canon
    } else if manufacturer.starts_with("UI") {
        Manufacturer::Uih
    } else if manufacturer.starts_with("BR") {
        Manufacturer::Bruker
    } else {
        Manufacturer::Unknown
    }
}

fn detect_modality(dicom: &DicomMap) -> Modality {
    let modality = tag_first_string(dicom, tags::MODALITY)
        .unwrap_or_default()
        .to_uppercase();

    if modality.starts_with("MR") {
        Modality::Mr
    } else if modality.starts_with("PT") {
        Modality::Pet
    } else if modality.starts_with("CT") {
        Modality::Ct
    } else {
        Modality::Unknown
    }
}

/// Collect the textual tokens of an attribute, splitting multi-valued
/// strings on the DICOM `\` separator. An absent or empty attribute is
/// reported as `None`.
fn tag_strings(dicom: &DicomMap, tag: Tag) -> Option<Vec<String>> {
    let element = dicom.element(tag).ok()?;
    let value = element.value().primitive()?;

    let mut tokens = Vec::new();
    for s in value.to_multi_str().iter() {
        for token in s.split('\\') {
            tokens.push(token.trim().to_owned());
        }
    }
    if tokens.is_empty() {
        None
    } else {
        Some(tokens)
    }
}

fn tag_first_string(dicom: &DicomMap, tag: Tag) -> Option<String> {
    tag_strings(dicom, tag)?.into_iter().next()
}

/// Coerce an attribute to a vector of floating-point numbers. Any token
/// that fails the coercion makes the whole attribute count as absent.
pub(crate) fn tag_doubles(dicom: &DicomMap, tag: Tag) -> Option<Vec<f64>> {
    tag_strings(dicom, tag)?
        .iter()
        .map(|token| parse_double(token))
        .collect()
}

fn tag_double(dicom: &DicomMap, tag: Tag) -> Option<f64> {
    let values = tag_doubles(dicom, tag)?;
    if values.len() == 1 {
        Some(values[0])
    } else {
        None
    }
}

fn tag_i32(dicom: &DicomMap, tag: Tag) -> Option<i32> {
    let tokens = tag_strings(dicom, tag)?;
    if tokens.len() == 1 {
        parse_i32(&tokens[0])
    } else {
        None
    }
}

fn tag_u32(dicom: &DicomMap, tag: Tag) -> Option<u32> {
    let tokens = tag_strings(dicom, tag)?;
    if tokens.len() == 1 {
        parse_u32(&tokens[0])
    } else {
        None
    }
}

/// Parsed metadata of one DICOM instance: geometry, rescale,
/// phase-encoding, timing, vendor information, the Siemens CSA header
/// and the UIH per-frame tag tables. Immutable after construction.
#[derive(Debug)]
pub struct DicomInstance {
    tags: DicomMap,
    csa: CsaHeader,
    uih_frames: Vec<DicomMap>,
    manufacturer: Manufacturer,
    modality: Modality,
    instance_number: i32,
    echo_time: Option<f64>,
    acquisition_time: Option<f64>,
    position: Vector3<f64>,
    orientation: [f64; 6],
    normal: Vector3<f64>,
    pixel_spacing_x: f64,
    pixel_spacing_y: f64,
    voxel_spacing_z: f64,
    rescale_slope: f64,
    rescale_intercept: f64,
    phase_encoding: PhaseEncodingDirection,
    slice_timing: Vec<f64>,
    width: u32,
    height: u32,
    number_of_frames: u32,
    bits_allocated: u32,
    pixel_representation: u32,
    samples_per_pixel: u32,
}

impl DicomInstance {
    /// Parse an instance from its tag table alone.
    pub fn new(tags: DicomMap) -> Result<Self> {
        DicomInstance::with_vendor_data(tags, None, Vec::new())
    }

    /// Parse an instance from its tag table, the raw bytes of the
    /// Siemens CSA private tag (0029,1010) if the host extracted them,
    /// and the items of the UIH MR VFrame private sequence (0065,1051).
    pub fn with_vendor_data(
        tags: DicomMap,
        csa_buffer: Option<&[u8]>,
        uih_frames: Vec<DicomMap>,
    ) -> Result<Self> {
        let csa = match csa_buffer {
            Some(buffer) => CsaHeader::parse(buffer)?,
            None => CsaHeader::new(),
        };

        let width = tag_u32(&tags, tags::COLUMNS)
            .ok_or_else(|| Error::BadFileFormat("missing or invalid Columns".to_owned()))?;
        let height = tag_u32(&tags, tags::ROWS)
            .ok_or_else(|| Error::BadFileFormat("missing or invalid Rows".to_owned()))?;
        let bits_allocated = tag_u32(&tags, tags::BITS_ALLOCATED)
            .ok_or_else(|| Error::BadFileFormat("missing or invalid BitsAllocated".to_owned()))?;
        let number_of_frames = tag_u32(&tags, tags::NUMBER_OF_FRAMES).unwrap_or(1);
        let pixel_representation = tag_u32(&tags, tags::PIXEL_REPRESENTATION).unwrap_or(0);
        let samples_per_pixel = tag_u32(&tags, tags::SAMPLES_PER_PIXEL).unwrap_or(1);

        let instance_number = match tag_i32(&tags, tags::INSTANCE_NUMBER) {
            Some(n) => n,
            None => {
                warn!("DICOM instance without an instance number");
                0
            }
        };

        let manufacturer = detect_manufacturer(&tags);
        let modality = detect_modality(&tags);
        let echo_time = tag_double(&tags, tags::ECHO_TIME);
        let acquisition_time = tag_double(&tags, tags::ACQUISITION_TIME);

        let position = parse_image_position(&tags)?;
        let (orientation, normal) = parse_image_orientation(&tags)?;
        let (pixel_spacing_x, pixel_spacing_y) = parse_pixel_spacing(&tags)?;
        let voxel_spacing_z = parse_voxel_spacing_z(&tags)?;
        let (rescale_slope, rescale_intercept) = parse_rescale(&tags, manufacturer)?;
        let phase_encoding = parse_phase_encoding(&tags)?;
        let slice_timing = tag_doubles(&tags, TAG_SLICE_TIMING_SIEMENS).unwrap_or_default();

        Ok(DicomInstance {
            tags,
            csa,
            uih_frames,
            manufacturer,
            modality,
            instance_number,
            echo_time,
            acquisition_time,
            position,
            orientation,
            normal,
            pixel_spacing_x,
            pixel_spacing_y,
            voxel_spacing_z,
            rescale_slope,
            rescale_intercept,
            phase_encoding,
            slice_timing,
            width,
            height,
            number_of_frames,
            bits_allocated,
            pixel_representation,
            samples_per_pixel,
        })
    }

    pub fn tags(&self) -> &DicomMap {
        &self.tags
    }

    pub fn csa(&self) -> &CsaHeader {
        &self.csa
    }

    pub fn manufacturer(&self) -> Manufacturer {
        self.manufacturer
    }

    pub fn modality(&self) -> Modality {
        self.modality
    }

    pub fn instance_number(&self) -> i32 {
        self.instance_number
    }

    pub fn echo_time(&self) -> Option<f64> {
        self.echo_time
    }

    /// Acquisition time in the DICOM "HHMMSS.frac" encoding, if known.
    pub fn acquisition_time(&self) -> Option<f64> {
        self.acquisition_time
    }

    pub fn position(&self) -> &Vector3<f64> {
        &self.position
    }

    /// The row axis of the image orientation.
    pub fn axis_x(&self) -> Vector3<f64> {
        Vector3::new(self.orientation[0], self.orientation[1], self.orientation[2])
    }

    /// The column axis of the image orientation.
    pub fn axis_y(&self) -> Vector3<f64> {
        Vector3::new(self.orientation[3], self.orientation[4], self.orientation[5])
    }

    /// The slice normal, the cross product of the row and column axes.
    pub fn normal(&self) -> &Vector3<f64> {
        &self.normal
    }

    pub fn pixel_spacing_x(&self) -> f64 {
        self.pixel_spacing_x
    }

    pub fn pixel_spacing_y(&self) -> f64 {
        self.pixel_spacing_y
    }

    pub fn voxel_spacing_z(&self) -> f64 {
        self.voxel_spacing_z
    }

    pub fn rescale_slope(&self) -> f64 {
        self.rescale_slope
    }

    pub fn rescale_intercept(&self) -> f64 {
        self.rescale_intercept
    }

    pub fn phase_encoding_direction(&self) -> PhaseEncodingDirection {
        self.phase_encoding
    }

    /// The Siemens per-slice timing vector, possibly empty.
    pub fn slice_timing(&self) -> &[f64] {
        &self.slice_timing
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn number_of_frames(&self) -> u32 {
        self.number_of_frames
    }

    pub fn uih_frame_count(&self) -> usize {
        self.uih_frames.len()
    }

    pub fn uih_frame(&self, index: usize) -> Result<&DicomMap> {
        self.uih_frames.get(index).ok_or_else(|| {
            Error::ParameterOutOfRange(format!(
                "no item {} in a per-frame sequence of {} item(s)",
                index,
                self.uih_frames.len()
            ))
        })
    }

    /// The pixel layout of the stored frames.
    pub fn pixel_format(&self) -> Result<PixelFormat> {
        match (
            self.bits_allocated,
            self.pixel_representation,
            self.samples_per_pixel,
        ) {
            (16, 0, 1) => Ok(PixelFormat::Grayscale16),
            (16, 1, 1) => Ok(PixelFormat::SignedGrayscale16),
            _ => Err(Error::NotImplemented(format!(
                "unsupported pixel format: {} bit(s), representation {}, {} sample(s)",
                self.bits_allocated, self.pixel_representation, self.samples_per_pixel
            ))),
        }
    }

    /// The repetition time in milliseconds, if present.
    pub fn repetition_time(&self) -> Result<Option<f64>> {
        match tag_doubles(&self.tags, tags::REPETITION_TIME) {
            Some(values) if values.len() == 1 => Ok(Some(values[0])),
            Some(_) => Err(Error::BadFileFormat(
                "unexpected multiplicity of RepetitionTime".to_owned(),
            )),
            None => Ok(None),
        }
    }

    /// The number of simultaneously excited slices, inferred from the
    /// repeated minimum of the Siemens slice-timing vector; 0 when the
    /// vector is unavailable.
    pub fn multi_band_factor(&self) -> u32 {
        if self.slice_timing.is_empty() {
            0
        } else {
            self.slice_timing
                .iter()
                .filter(|&&t| is_near(t, self.slice_timing[0]))
                .count() as u32
        }
    }

    /// Classify the Siemens slice-timing vector into a NIfTI slice
    /// ordering code.
    pub fn detect_siemens_slice_code(&self) -> SliceOrder {
        let v = &self.slice_timing;
        if v.is_empty() {
            return SliceOrder::Unknown;
        }

        let zeros = v.iter().filter(|&&t| is_near(t, 0.0)).count();
        if zeros >= 2 {
            return SliceOrder::Unknown;
        }

        let n = v.len();
        let k = v
            .iter()
            .enumerate()
            .min_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(Ordering::Equal))
            .map(|(i, _)| i)
            .unwrap_or(0);

        if k == 1 {
            SliceOrder::AltInc2 // e.g. 3,1,4,2
        } else if n >= 2 && k == n - 2 {
            SliceOrder::AltDec2 // e.g. 2,4,1,3 or 5,2,4,1,3
        } else if n >= 3 && k == 0 && v[1] < v[2] {
            SliceOrder::SeqInc // e.g. 1,2,3,4
        } else if n >= 3 && k == 0 && v[1] > v[2] {
            SliceOrder::AltInc // e.g. 1,3,2,4
        } else if n >= 4 && k == n - 1 && v[n - 3] > v[n - 2] {
            SliceOrder::SeqDec // e.g. 4,3,2,1 or 5,4,3,2,1
        } else if n >= 4 && k == n - 1 && v[n - 3] < v[n - 2] {
            SliceOrder::AltDec
        } else {
            SliceOrder::Unknown
        }
    }

    /// Extract the 2-D slices of this instance, dispatching between the
    /// Siemens mosaic, UIH tiled frames and generic strategies.
    pub fn extract_slices(&self, instance_index: usize, slices: &mut Vec<Slice>) -> Result<()> {
        if self.manufacturer == Manufacturer::Siemens
            && self.csa.has_tag(CSA_NUMBER_OF_IMAGES_IN_MOSAIC)
        {
            self.extract_siemens_mosaic_slices(instance_index, slices)
        } else if self.manufacturer == Manufacturer::Uih && !self.uih_frames.is_empty() {
            self.extract_uih_slices(instance_index, slices)
        } else {
            self.extract_generic_slices(instance_index, slices)
        }
    }

    /// The size in bytes of the pixel payload this instance contributes
    /// to the NIfTI volume.
    pub fn nifti_body_size(&self) -> Result<usize> {
        let bytes_per_pixel = self.pixel_format()?.bytes_per_pixel();

        let mut slices = Vec::new();
        self.extract_slices(0, &mut slices)?;

        Ok(slices
            .iter()
            .map(|s| bytes_per_pixel * s.width() as usize * s.height() as usize)
            .sum())
    }

    // https://nipy.org/nibabel/dicom/dicom_mosaic.html#dicom-orientation-for-mosaic
    fn extract_siemens_mosaic_slices(
        &self,
        instance_index: usize,
        slices: &mut Vec<Slice>,
    ) -> Result<()> {
        let count = match self.csa.parse_u32(CSA_NUMBER_OF_IMAGES_IN_MOSAIC) {
            Some(n) if n > 0 && self.number_of_frames == 1 => n,
            _ => return self.extract_generic_slices(instance_index, slices),
        };

        let count_per_axis = (count as f64).sqrt().ceil() as u32;
        if self.width % count_per_axis != 0
            || self.height % count_per_axis != 0
            || count > count_per_axis * count_per_axis
        {
            return Err(Error::BadFileFormat(format!(
                "inconsistent mosaic layout: {} sub-image(s) in a {}x{} frame",
                count, self.width, self.height
            )));
        }

        let width = self.width / count_per_axis;
        let height = self.height / count_per_axis;

        // Recenter the origin on the first tile of the mosaic grid
        let m = dicom_affine(
            &self.axis_x(),
            &self.axis_y(),
            &self.normal,
            &self.position,
            self.pixel_spacing_x,
            self.pixel_spacing_y,
            self.voxel_spacing_z,
        );
        let dc = (self.width as f64 - width as f64) / 2.0;
        let dr = (self.height as f64 - height as f64) / 2.0;
        let recentered = Vector3::new(
            self.position[0] + m[(0, 0)] * dc + m[(0, 1)] * dr,
            self.position[1] + m[(1, 0)] * dc + m[(1, 1)] * dr,
            self.position[2] + m[(2, 0)] * dc + m[(2, 1)] * dr,
        );

        let normal = self
            .csa
            .tag(CSA_SLICE_NORMAL_VECTOR)?
            .parse_vector()
            .filter(|v| v.len() == 3)
            .ok_or_else(|| {
                Error::BadFileFormat("invalid slice normal vector in CSA header".to_owned())
            })?;
        let normal = Vector3::new(normal[0], normal[1], normal[2]);

        let mut pos = 0;
        for y in 0..count_per_axis {
            for x in 0..count_per_axis {
                if pos < count {
                    let z = self.voxel_spacing_z * pos as f64;
                    let mut slice = Slice::new(
                        instance_index,
                        0,
                        self.instance_number,
                        x * width,
                        y * height,
                        width,
                        height,
                        recentered + z * normal,
                        normal,
                    );
                    if let Some(t) = self.acquisition_time {
                        slice.set_acquisition_time(t);
                    }
                    slices.push(slice);
                }
                pos += 1;
            }
        }
        Ok(())
    }

    // https://github.com/rordenlab/dcm2niix/issues/225#issuecomment-422645183
    fn extract_uih_slices(&self, instance_index: usize, slices: &mut Vec<Slice>) -> Result<()> {
        let total = self.uih_frames.len() as u32;
        let cols = (total as f64).sqrt().ceil() as u32;
        if cols == 0 || self.number_of_frames != 1 {
            return Err(Error::BadFileFormat(
                "unexpected frame layout in a tiled instance".to_owned(),
            ));
        }

        if self.width % cols != 0 || total % cols != 0 {
            return Err(Error::BadFileFormat(format!(
                "inconsistent tile layout: {} tile(s) in a {}x{} frame",
                total, self.width, self.height
            )));
        }

        let rows = total / cols;
        debug_assert_eq!(cols * rows, total);

        if self.height % rows != 0 {
            return Err(Error::BadFileFormat(format!(
                "inconsistent tile layout: {} tile(s) in a {}x{} frame",
                total, self.width, self.height
            )));
        }

        let width = self.width / cols;
        let height = self.height / rows;

        let mut pos = 0;
        for y in 0..rows {
            for x in 0..cols {
                let item = &self.uih_frames[pos];
                let origin = tag_doubles(item, tags::IMAGE_POSITION_PATIENT)
                    .filter(|v| v.len() == 3);
                let time = tag_doubles(item, tags::ACQUISITION_TIME).filter(|v| v.len() == 1);

                match (origin, time) {
                    (Some(origin), Some(time)) => {
                        let mut slice = Slice::new(
                            instance_index,
                            0,
                            self.instance_number,
                            x * width,
                            y * height,
                            width,
                            height,
                            Vector3::new(origin[0], origin[1], origin[2]),
                            self.normal,
                        );
                        slice.set_acquisition_time(time[0]);
                        slices.push(slice);
                    }
                    _ => {
                        return Err(Error::BadFileFormat(
                            "missing origin or acquisition time in a per-frame item".to_owned(),
                        ));
                    }
                }
                pos += 1;
            }
        }
        Ok(())
    }

    fn extract_generic_slices(&self, instance_index: usize, slices: &mut Vec<Slice>) -> Result<()> {
        if self.number_of_frames != 1 {
            // This is the case of RT-DOSE
            let offsets = tag_doubles(&self.tags, tags::GRID_FRAME_OFFSET_VECTOR)
                .filter(|v| v.len() == self.number_of_frames as usize)
                .ok_or_else(|| {
                    Error::NotImplemented(
                        "Cannot detect the 3D coordinates in a multiframe instance".to_owned(),
                    )
                })?;

            for (frame, z) in offsets.into_iter().enumerate() {
                let mut slice = Slice::new(
                    instance_index,
                    frame as u32,
                    self.instance_number,
                    0,
                    0,
                    self.width,
                    self.height,
                    self.position + z * self.normal,
                    self.normal,
                );
                if let Some(t) = self.acquisition_time {
                    slice.set_acquisition_time(t);
                }
                slices.push(slice);
            }
        } else {
            let mut slice = Slice::new(
                instance_index,
                0,
                self.instance_number,
                0,
                0,
                self.width,
                self.height,
                self.position,
                self.normal,
            );
            if let Some(t) = self.acquisition_time {
                slice.set_acquisition_time(t);
            }
            slices.push(slice);
        }
        Ok(())
    }
}

fn parse_image_position(dicom: &DicomMap) -> Result<Vector3<f64>> {
    match tag_doubles(dicom, tags::IMAGE_POSITION_PATIENT) {
        Some(v) if v.len() == 3 => Ok(Vector3::new(v[0], v[1], v[2])),
        Some(v) => Err(Error::BadFileFormat(format!(
            "unexpected multiplicity of ImagePositionPatient: {}",
            v.len()
        ))),
        None => Ok(Vector3::zeros()),
    }
}

fn parse_image_orientation(dicom: &DicomMap) -> Result<([f64; 6], Vector3<f64>)> {
    let orientation = match tag_doubles(dicom, tags::IMAGE_ORIENTATION_PATIENT) {
        Some(v) if v.len() == 6 => [v[0], v[1], v[2], v[3], v[4], v[5]],
        Some(v) => {
            return Err(Error::BadFileFormat(format!(
                "unexpected multiplicity of ImageOrientationPatient: {}",
                v.len()
            )))
        }
        // The canonical orientation
        None => [1.0, 0.0, 0.0, 0.0, 1.0, 0.0],
    };

    let axis_x = Vector3::new(orientation[0], orientation[1], orientation[2]);
    let axis_y = Vector3::new(orientation[3], orientation[4], orientation[5]);
    Ok((orientation, axis_x.cross(&axis_y)))
}

fn parse_pixel_spacing(dicom: &DicomMap) -> Result<(f64, f64)> {
    let (x, y) = match tag_doubles(dicom, tags::PIXEL_SPACING) {
        Some(v) if v.len() == 2 => (v[0], v[1]),
        Some(v) => {
            return Err(Error::BadFileFormat(format!(
                "unexpected multiplicity of PixelSpacing: {}",
                v.len()
            )))
        }
        None => (1.0, 1.0),
    };
    if x <= 0.0 || y <= 0.0 {
        return Err(Error::BadFileFormat(format!(
            "non-positive pixel spacing: {}x{}",
            x, y
        )));
    }
    Ok((x, y))
}

fn parse_voxel_spacing_z(dicom: &DicomMap) -> Result<f64> {
    let spacing = match tag_doubles(dicom, tags::SPACING_BETWEEN_SLICES) {
        Some(v) if v.len() == 1 => v[0],
        Some(_) => {
            return Err(Error::BadFileFormat(
                "unexpected multiplicity of SpacingBetweenSlices".to_owned(),
            ))
        }
        None => match tag_doubles(dicom, tags::SLICE_THICKNESS) {
            Some(v) if v.len() == 1 => v[0],
            Some(_) => {
                return Err(Error::BadFileFormat(
                    "unexpected multiplicity of SliceThickness".to_owned(),
                ))
            }
            None => {
                return Err(Error::BadFileFormat(
                    "Unable to determine spacing between slices".to_owned(),
                ))
            }
        },
    };
    if spacing <= 0.0 {
        return Err(Error::BadFileFormat(format!(
            "non-positive spacing between slices: {}",
            spacing
        )));
    }
    Ok(spacing)
}

fn parse_rescale(dicom: &DicomMap, manufacturer: Manufacturer) -> Result<(f64, f64)> {
    let mut slope = match tag_doubles(dicom, tags::RESCALE_SLOPE) {
        Some(v) if v.len() == 1 => v[0],
        Some(_) => {
            return Err(Error::BadFileFormat(
                "unexpected multiplicity of RescaleSlope".to_owned(),
            ))
        }
        None => 1.0,
    };

    if manufacturer == Manufacturer::Philips {
        if let Some(v) = tag_doubles(dicom, TAG_SLICE_SLOPE_PHILIPS) {
            if v.len() == 1 && !is_near(v[0], 0.0) {
                slope /= v[0]; // cf. PMC3998685
            } else {
                return Err(Error::BadFileFormat(
                    "invalid Philips scale slope".to_owned(),
                ));
            }
        }
    }

    let intercept = match tag_doubles(dicom, tags::RESCALE_INTERCEPT) {
        Some(v) if v.len() == 1 => v[0],
        Some(_) => {
            return Err(Error::BadFileFormat(
                "unexpected multiplicity of RescaleIntercept".to_owned(),
            ))
        }
        None => 0.0,
    };

    Ok((slope, intercept))
}

fn parse_phase_encoding(dicom: &DicomMap) -> Result<PhaseEncodingDirection> {
    match tag_first_string(dicom, tags::IN_PLANE_PHASE_ENCODING_DIRECTION).as_deref() {
        Some("ROW") => Ok(PhaseEncodingDirection::Row),
        Some("COL") => Ok(PhaseEncodingDirection::Column),
        Some("") | None => Ok(PhaseEncodingDirection::None),
        Some(other) => Err(Error::BadFileFormat(format!(
            "invalid in-plane phase encoding direction: {}",
            other
        ))),
    }
}
