//! One 2-D tile within the assembled volume.

use nalgebra::Vector3;

/// A single 2-D slice extracted from a DICOM instance: either a whole
/// frame, one frame of a multi-frame instance, or one tile of a mosaic.
///
/// The normal is a unit vector inherited from the producing instance;
/// the projection of the origin onto the normal is computed at
/// construction and cached, as it is the primary sort key of the volume
/// assembler.
#[derive(Debug, Clone)]
pub struct Slice {
    instance_index: usize,
    frame_number: u32,
    instance_number: i32,
    x: u32,
    y: u32,
    width: u32,
    height: u32,
    origin: Vector3<f64>,
    normal: Vector3<f64>,
    projection: f64,
    acquisition_time: Option<f64>,
}

impl Slice {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        instance_index: usize,
        frame_number: u32,
        instance_number: i32,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        origin: Vector3<f64>,
        normal: Vector3<f64>,
    ) -> Self {
        let projection = origin.dot(&normal);
        Slice {
            instance_index,
            frame_number,
            instance_number,
            x,
            y,
            width,
            height,
            origin,
            normal,
            projection,
            acquisition_time: None,
        }
    }

    /// Index of the producing instance within its collection.
    pub fn instance_index(&self) -> usize {
        self.instance_index
    }

    pub fn frame_number(&self) -> u32 {
        self.frame_number
    }

    pub fn instance_number(&self) -> i32 {
        self.instance_number
    }

    pub fn x(&self) -> u32 {
        self.x
    }

    pub fn y(&self) -> u32 {
        self.y
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn origin(&self) -> &Vector3<f64> {
        &self.origin
    }

    pub fn normal(&self) -> &Vector3<f64> {
        &self.normal
    }

    /// The cached scalar projection of the origin onto the normal.
    pub fn projection_along_normal(&self) -> f64 {
        self.projection
    }

    pub fn set_acquisition_time(&mut self, t: f64) {
        self.acquisition_time = Some(t);
    }

    /// Acquisition time in the DICOM "HHMMSS.frac" encoding, if known.
    pub fn acquisition_time(&self) -> Option<f64> {
        self.acquisition_time
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn projection_is_cached_at_construction() {
        let origin = Vector3::new(1.0, 2.0, 3.0);
        let normal = Vector3::new(0.0, 0.0, 1.0);
        let slice = Slice::new(0, 0, 1, 0, 0, 16, 16, origin, normal);
        assert_eq!(slice.projection_along_normal(), 3.0);

        let oblique = Vector3::new(0.6, 0.0, 0.8);
        let slice = Slice::new(0, 0, 1, 0, 0, 16, 16, origin, oblique);
        assert_eq!(slice.projection_along_normal(), 1.0 * 0.6 + 3.0 * 0.8);
    }

    #[test]
    fn acquisition_time_is_optional() {
        let mut slice = Slice::new(
            0,
            0,
            1,
            0,
            0,
            8,
            8,
            Vector3::zeros(),
            Vector3::new(0.0, 0.0, 1.0),
        );
        assert_eq!(slice.acquisition_time(), None);
        slice.set_acquisition_time(100000.5);
        assert_eq!(slice.acquisition_time(), Some(100000.5));
    }
}
