//! The ordered collection of DICOM instances of one series, and the
//! assembly of their slices into a NIfTI volume grid.

use std::cmp::Ordering;
use std::collections::HashSet;

use crate::affine::{dicom_affine, dicom_to_nifti_orientation, mat44_to_quatern};
use crate::error::{Error, Result};
use crate::header::NiftiHeader;
use crate::instance::{DicomInstance, Manufacturer, Modality, PhaseEncodingDirection};
use crate::slice::Slice;
use crate::typedef::{Unit, XForm};
use crate::util::{fix_dicom_time, format_general, is_near, is_near_tolerance, NEAR_EPSILON};

const CSA_PHASE_ENCODING_DIRECTION_POSITIVE: &str = "PhaseEncodingDirectionPositive";

/// Absolute tolerance when comparing slice projections along the normal.
const PROJECTION_TOLERANCE: f64 = 0.0001;

/// Ordering used to arrange the slices of a volume: ascending projection
/// along the normal, ties broken by ascending instance number.
fn compare_slices(a: &Slice, b: &Slice) -> Ordering {
    a.projection_along_normal()
        .partial_cmp(&b.projection_along_normal())
        .unwrap_or(Ordering::Equal)
        .then_with(|| a.instance_number().cmp(&b.instance_number()))
}

/// Accumulates the `key=value` entries of the header description,
/// rejecting duplicate keys, and joins them with semicolons.
#[derive(Default)]
struct DescriptionWriter {
    content: Vec<String>,
    index: HashSet<String>,
}

impl DescriptionWriter {
    fn add_string(&mut self, key: &str, value: &str) -> Result<()> {
        if self.index.insert(key.to_owned()) {
            self.content.push(format!("{}={}", key, value));
            Ok(())
        } else {
            Err(Error::BadSequenceOfCalls(format!(
                "The description already has this key: {}",
                key
            )))
        }
    }

    fn write(&self, header: &mut NiftiHeader) -> Result<()> {
        let mut joined = self.content.join(";");
        joined.truncate(79);
        header.set_description_str(&joined)
    }
}

/// An ordered sequence of owned DICOM instances with their parallel
/// external identifiers.
#[derive(Debug, Default)]
pub struct InstanceCollection {
    instances: Vec<DicomInstance>,
    source_ids: Vec<String>,
}

impl InstanceCollection {
    pub fn new() -> Self {
        InstanceCollection::default()
    }

    /// Append an instance together with the identifier under which the
    /// host knows it.
    pub fn add_instance(&mut self, instance: DicomInstance, source_id: impl Into<String>) {
        self.instances.push(instance);
        self.source_ids.push(source_id.into());
        debug_assert_eq!(self.instances.len(), self.source_ids.len());
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    pub fn instance(&self, index: usize) -> Result<&DicomInstance> {
        self.instances.get(index).ok_or_else(|| out_of_range(index, self.instances.len()))
    }

    pub fn source_id(&self, index: usize) -> Result<&str> {
        self.source_ids
            .get(index)
            .map(String::as_str)
            .ok_or_else(|| out_of_range(index, self.source_ids.len()))
    }

    /// Gather the slices of every instance, each tagged with the index
    /// of its producing instance.
    pub fn extract_slices(&self) -> Result<Vec<Slice>> {
        let mut slices = Vec::new();
        for (index, instance) in self.instances.iter().enumerate() {
            instance.extract_slices(index, &mut slices)?;
        }
        Ok(slices)
    }

    /// The largest multi-band factor over all instances.
    pub fn multi_band_factor(&self) -> u32 {
        self.instances
            .iter()
            .map(DicomInstance::multi_band_factor)
            .max()
            .unwrap_or(0)
    }

    /// Build the NIfTI header and the ordered slice plan of the volume.
    ///
    /// The returned slices are arranged in output order: slice-by-slice
    /// within one acquisition, acquisition-by-acquisition. Their number
    /// equals the total number of extracted slices.
    pub fn create_nifti_header(&self) -> Result<(NiftiHeader, Vec<Slice>)> {
        let mut sorted = self.extract_slices()?;
        sorted.sort_by(compare_slices);

        if sorted.is_empty() {
            return Err(Error::ParameterOutOfRange(
                "no slice in the collection".to_owned(),
            ));
        }

        // Number of acquisitions sharing the first z-plane
        let mut acquisitions = 1;
        while acquisitions < sorted.len()
            && is_near_tolerance(
                sorted[0].projection_along_normal(),
                sorted[acquisitions].projection_along_normal(),
                PROJECTION_TOLERANCE,
            )
        {
            acquisitions += 1;
        }

        if sorted.len() % acquisitions != 0 {
            return Err(Error::ParameterOutOfRange(
                "Inconsistent number of acquisitions".to_owned(),
            ));
        }

        let locations = sorted.len() / acquisitions;

        // Consecutive z-planes must be distinguishable
        for i in 1..locations {
            if is_near_tolerance(
                sorted[(i - 1) * acquisitions].projection_along_normal(),
                sorted[i * acquisitions].projection_along_normal(),
                PROJECTION_TOLERANCE,
            ) {
                return Err(Error::ParameterOutOfRange(
                    "Ambiguity in the 3D locations".to_owned(),
                ));
            }
        }

        // Within one z-plane, the acquisitions must coincide spatially
        // and carry distinct instance numbers (the sort makes duplicate
        // numbers adjacent)
        for i in 0..locations {
            for j in 1..acquisitions {
                let base = &sorted[i * acquisitions];
                let other = &sorted[i * acquisitions + j];

                if sorted[i * acquisitions + j - 1].instance_number() == other.instance_number() {
                    return Err(Error::ParameterOutOfRange(
                        "Ambiguity in the instance numbers".to_owned(),
                    ));
                }

                if !is_near_tolerance(
                    base.projection_along_normal(),
                    other.projection_along_normal(),
                    PROJECTION_TOLERANCE,
                ) {
                    return Err(Error::ParameterOutOfRange(
                        "Ambiguity in the 3D locations".to_owned(),
                    ));
                }
            }
        }

        let first_instance = self.instance(sorted[0].instance_index())?;

        let mut header = NiftiHeader::default();
        header.scl_slope = first_instance.rescale_slope() as f32;
        header.scl_inter = first_instance.rescale_intercept() as f32;
        header.set_xyzt_units(Unit::Mm, Unit::Sec);
        header.qform_code = XForm::ScannerAnat as i16;
        header.sform_code = XForm::ScannerAnat as i16;

        let datatype = first_instance.pixel_format()?.nifti_type();
        header.datatype = datatype as i16;
        header.bitpix = (datatype.size_of() * 8) as i16;

        let nx = sorted[0].width();
        let ny = sorted[0].height();

        let dx = first_instance.pixel_spacing_x();
        let dy = first_instance.pixel_spacing_y();
        let dz = if acquisitions >= sorted.len() {
            first_instance.voxel_spacing_z()
        } else {
            sorted[acquisitions].projection_along_normal() - sorted[0].projection_along_normal()
        };
        if dz <= 0.0 {
            return Err(Error::InternalError(
                "non-increasing slice positions".to_owned(),
            ));
        }

        if locations == 1 || acquisitions == 1 {
            header.dim[0] = 3;
            header.dim[1] = nx as u16;
            header.dim[2] = ny as u16;
            header.dim[3] = acquisitions.max(locations) as u16;
        } else {
            header.dim[0] = 4;
            header.dim[1] = nx as u16;
            header.dim[2] = ny as u16;
            header.dim[3] = locations as u16;
            header.dim[4] = acquisitions as u16;
            header.pixdim[4] = self.temporal_spacing(first_instance, &sorted, acquisitions)?;
        }

        header.slice_code = first_instance.detect_siemens_slice_code() as u8;

        let mut sto = dicom_affine(
            &first_instance.axis_x(),
            &first_instance.axis_y(),
            sorted[0].normal(),
            sorted[0].origin(),
            dx,
            dy,
            dz,
        );
        dicom_to_nifti_orientation(&mut sto, ny);

        let mut quatern = mat44_to_quatern(&sto);

        // Normalize the quaternion to positive components
        if quatern.b <= NEAR_EPSILON && quatern.c <= NEAR_EPSILON && quatern.d <= NEAR_EPSILON {
            quatern.b = -quatern.b;
            quatern.c = -quatern.c;
            quatern.d = -quatern.d;
        }

        header.quatern_b = quatern.b as f32;
        header.quatern_c = quatern.c as f32;
        header.quatern_d = quatern.d as f32;
        header.qoffset_x = quatern.offset.x as f32;
        header.qoffset_y = quatern.offset.y as f32;
        header.qoffset_z = quatern.offset.z as f32;
        header.pixdim[0] = quatern.qfac as f32;
        header.pixdim[1] = quatern.spacing.x as f32;
        header.pixdim[2] = quatern.spacing.y as f32;
        header.pixdim[3] = quatern.spacing.z as f32;

        for c in 0..4 {
            header.srow_x[c] = sto[(0, c)] as f32;
            header.srow_y[c] = sto[(1, c)] as f32;
            header.srow_z[c] = sto[(2, c)] as f32;
        }

        // https://github.com/rordenlab/dcm2niix/blob/master/console/nii_dicom.cpp
        // Function "headerDcm2Nii2()"
        match first_instance.phase_encoding_direction() {
            PhaseEncodingDirection::Row => header.set_fps_dims(2, 1, 3),
            PhaseEncodingDirection::Column => header.set_fps_dims(1, 2, 3),
            PhaseEncodingDirection::None => header.set_fps_dims(0, 0, 0),
        }

        self.write_description(&mut header, first_instance, &sorted)?;

        // Transpose the sorted grid into the output order
        let mut plan = Vec::with_capacity(sorted.len());
        for j in 0..acquisitions {
            for i in 0..locations {
                plan.push(sorted[i * acquisitions + j].clone());
            }
        }
        debug_assert_eq!(plan.len(), sorted.len());

        Ok((header, plan))
    }

    /// The temporal spacing of a 4-D volume, in seconds.
    fn temporal_spacing(
        &self,
        first_instance: &DicomInstance,
        sorted: &[Slice],
        acquisitions: usize,
    ) -> Result<f32> {
        if first_instance.manufacturer() == Manufacturer::Philips {
            if let Some(t0) = sorted[0].acquisition_time() {
                // Check out "trDiff0" in "nii_dicom_batch.cpp"
                let a = fix_dicom_time(t0)?;
                let mut max_difference: f64 = 0.0;

                for slice in &sorted[1..] {
                    if let Some(t) = slice.acquisition_time() {
                        let b = fix_dicom_time(t)?;
                        max_difference = max_difference.max(b - a);
                    }
                }

                if !is_near(max_difference, 0.0) {
                    return Ok((max_difference / (acquisitions as f64 - 1.0)) as f32);
                }
            }
        }

        if let Some(repetition_time) = first_instance.repetition_time()? {
            // Conversion to seconds
            return Ok((repetition_time / 1000.0) as f32);
        }

        Ok(1.0)
    }

    fn write_description(
        &self,
        header: &mut NiftiHeader,
        first_instance: &DicomInstance,
        sorted: &[Slice],
    ) -> Result<()> {
        let mut lowest = f64::INFINITY;
        let mut highest = f64::NEG_INFINITY;
        let mut has_acquisition_time = false;
        for slice in sorted {
            if let Some(t) = slice.acquisition_time() {
                has_acquisition_time = true;
                lowest = lowest.min(t);
                highest = highest.max(t);
            }
        }

        let mut description = DescriptionWriter::default();

        if let Some(echo_time) = first_instance.echo_time() {
            description.add_string("TE", &format_general(echo_time, 2))?;
        }

        if has_acquisition_time {
            let t = if first_instance.modality() == Modality::Pet {
                highest
            } else {
                lowest
            };
            description.add_string("Time", &format!("{:.3}", t))?;
        }

        if let Some(positive) = first_instance
            .csa()
            .parse_u32(CSA_PHASE_ENCODING_DIRECTION_POSITIVE)
        {
            description.add_string("phase", &positive.to_string())?;
        }

        let multi_band_factor = self.multi_band_factor();
        if multi_band_factor > 1 {
            description.add_string("mb", &multi_band_factor.to_string())?;
        }

        description.write(header)
    }
}

fn out_of_range(index: usize, len: usize) -> Error {
    Error::ParameterOutOfRange(format!(
        "no instance {} in a collection of {} instance(s)",
        index, len
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use dicom_core::{DataElement, PrimitiveValue, Tag, VR};
    use dicom_dictionary_std::tags;

    use crate::instance::DicomMap;

    fn put_str(dicom: &mut DicomMap, tag: Tag, vr: VR, value: &str) {
        dicom.put(DataElement::new(tag, vr, PrimitiveValue::from(value)));
    }

    fn put_u16(dicom: &mut DicomMap, tag: Tag, value: u16) {
        dicom.put(DataElement::new(tag, VR::US, PrimitiveValue::from(value)));
    }

    fn instance(number: i32, position: &str) -> DicomInstance {
        let mut dicom = DicomMap::new_empty();
        put_str(&mut dicom, tags::MODALITY, VR::CS, "MR");
        put_str(&mut dicom, tags::INSTANCE_NUMBER, VR::IS, &number.to_string());
        put_str(&mut dicom, tags::IMAGE_POSITION_PATIENT, VR::DS, position);
        put_u16(&mut dicom, tags::COLUMNS, 16);
        put_u16(&mut dicom, tags::ROWS, 16);
        put_u16(&mut dicom, tags::BITS_ALLOCATED, 16);
        put_str(&mut dicom, tags::PIXEL_SPACING, VR::DS, "1\\1");
        put_str(&mut dicom, tags::SLICE_THICKNESS, VR::DS, "2");
        DicomInstance::new(dicom).unwrap()
    }

    fn collection_of(instances: Vec<DicomInstance>) -> InstanceCollection {
        let mut collection = InstanceCollection::new();
        for (i, instance) in instances.into_iter().enumerate() {
            collection.add_instance(instance, format!("id-{}", i));
        }
        collection
    }

    #[test]
    fn accessors_and_bounds() {
        let collection = collection_of(vec![instance(1, "0\\0\\0")]);
        assert_eq!(collection.len(), 1);
        assert_eq!(collection.source_id(0).unwrap(), "id-0");
        assert_eq!(collection.instance(0).unwrap().instance_number(), 1);
        assert!(collection.instance(1).is_err());
        assert!(collection.source_id(1).is_err());
    }

    #[test]
    fn empty_collection_is_rejected() {
        let collection = InstanceCollection::new();
        assert!(collection.create_nifti_header().is_err());
    }

    #[test]
    fn sorting_breaks_ties_by_instance_number() {
        let collection = collection_of(vec![
            instance(2, "0\\0\\4"),
            instance(4, "0\\0\\0"),
            instance(3, "0\\0\\0"),
            instance(1, "0\\0\\4"),
        ]);
        let mut sorted = collection.extract_slices().unwrap();
        sorted.sort_by(compare_slices);
        let order: Vec<i32> = sorted.iter().map(Slice::instance_number).collect();
        assert_eq!(order, vec![3, 4, 1, 2]);
    }

    #[test]
    fn canonical_stack_of_three() {
        let collection = collection_of(vec![
            instance(2, "0\\0\\2"),
            instance(1, "0\\0\\0"),
            instance(3, "0\\0\\4"),
        ]);

        let (header, plan) = collection.create_nifti_header().unwrap();
        assert_eq!(header.dim[0], 3);
        assert_eq!(&header.dim[1..4], &[16, 16, 3]);
        assert_eq!(header.pixdim[1], 1.0);
        assert_eq!(header.pixdim[2], 1.0);
        assert_eq!(header.pixdim[3], 2.0);
        assert_eq!(header.slice_code, 0);
        assert_eq!(header.num_voxels(), 16 * 16 * 3);

        assert_eq!(header.srow_x[0], -1.0);
        assert_eq!(header.srow_y[1], 1.0);
        assert_eq!(header.srow_z[2], 2.0);
        assert_eq!(header.srow_y[3], -15.0);

        // plan follows ascending z
        let projections: Vec<f64> = plan.iter().map(Slice::projection_along_normal).collect();
        assert_eq!(projections, vec![0.0, 2.0, 4.0]);
    }

    #[test]
    fn duplicate_instance_numbers_are_ambiguous() {
        let collection = collection_of(vec![
            instance(1, "0\\0\\0"),
            instance(1, "0\\0\\0"),
        ]);
        match collection.create_nifti_header() {
            Err(Error::ParameterOutOfRange(reason)) => {
                assert_eq!(reason, "Ambiguity in the instance numbers");
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn inconsistent_acquisition_count_is_rejected() {
        // two acquisitions at z=0, but a single one at z=2
        let collection = collection_of(vec![
            instance(1, "0\\0\\0"),
            instance(2, "0\\0\\0"),
            instance(3, "0\\0\\2"),
        ]);
        match collection.create_nifti_header() {
            Err(Error::ParameterOutOfRange(reason)) => {
                assert_eq!(reason, "Inconsistent number of acquisitions");
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn mismatched_plane_sharing_is_ambiguous() {
        // second z-group mixes two distinct planes
        let collection = collection_of(vec![
            instance(1, "0\\0\\0"),
            instance(2, "0\\0\\0"),
            instance(3, "0\\0\\2"),
            instance(4, "0\\0\\2.5"),
        ]);
        match collection.create_nifti_header() {
            Err(Error::ParameterOutOfRange(reason)) => {
                assert_eq!(reason, "Ambiguity in the 3D locations");
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn four_dimensional_grid_uses_the_transposed_plan() {
        let mut instances = Vec::new();
        let mut number = 1;
        for z in [0.0, 2.0, 4.0] {
            for _ in 0..2 {
                instances.push(instance(number, &format!("0\\0\\{}", z)));
                number += 1;
            }
        }
        let collection = collection_of(instances);

        let (header, plan) = collection.create_nifti_header().unwrap();
        assert_eq!(header.dim[0], 4);
        assert_eq!(&header.dim[1..5], &[16, 16, 3, 2]);
        // no Philips times and no repetition time: dt falls back to 1
        assert_eq!(header.pixdim[4], 1.0);

        // the plan walks all z positions of one acquisition first
        let projections: Vec<f64> = plan.iter().map(Slice::projection_along_normal).collect();
        assert_eq!(projections, vec![0.0, 2.0, 4.0, 0.0, 2.0, 4.0]);
        assert_eq!(plan.len(), 6);
    }

    #[test]
    fn description_rejects_duplicate_keys() {
        let mut writer = DescriptionWriter::default();
        writer.add_string("TE", "2.5").unwrap();
        writer.add_string("mb", "2").unwrap();
        assert!(matches!(
            writer.add_string("TE", "3"),
            Err(Error::BadSequenceOfCalls(_))
        ));

        let mut header = NiftiHeader::default();
        writer.write(&mut header).unwrap();
        assert_eq!(&header.descrip[..9], b"TE=2.5;mb");
    }

    #[test]
    fn description_content() {
        let mut dicom = DicomMap::new_empty();
        put_str(&mut dicom, tags::MODALITY, VR::CS, "MR");
        put_str(&mut dicom, tags::INSTANCE_NUMBER, VR::IS, "1");
        put_str(&mut dicom, tags::ECHO_TIME, VR::DS, "2.5");
        put_str(&mut dicom, tags::ACQUISITION_TIME, VR::TM, "100000.25");
        put_u16(&mut dicom, tags::COLUMNS, 16);
        put_u16(&mut dicom, tags::ROWS, 16);
        put_u16(&mut dicom, tags::BITS_ALLOCATED, 16);
        put_str(&mut dicom, tags::PIXEL_SPACING, VR::DS, "1\\1");
        put_str(&mut dicom, tags::SLICE_THICKNESS, VR::DS, "2");

        let collection = collection_of(vec![DicomInstance::new(dicom).unwrap()]);
        let (header, _) = collection.create_nifti_header().unwrap();

        let end = header.descrip.iter().position(|&b| b == 0).unwrap();
        let descrip = std::str::from_utf8(&header.descrip[..end]).unwrap();
        assert_eq!(descrip, "TE=2.5;Time=100000.250");
    }
}
