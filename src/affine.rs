//! Spatial orientation math: the DICOM voxel-to-patient affine, its
//! conversion to the NIfTI convention, and the decomposition of a 4x4
//! affine into the NIfTI quaternion representation.

use nalgebra::{Matrix3, Matrix4, Vector3};

pub type Affine3 = Matrix3<f64>;
pub type Affine4 = Matrix4<f64>;

/// The quaternion form of a spatial transform, as stored in a NIfTI-1
/// header: the three imaginary components (`w` is implied positive),
/// the spatial offset, the voxel spacings recovered from the affine
/// columns, and the handedness factor `qfac`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quatern {
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub offset: Vector3<f64>,
    pub spacing: Vector3<f64>,
    pub qfac: f64,
}

/// Build the voxel-to-patient affine from the DICOM image geometry:
/// column 0 is the row axis scaled by the column spacing, column 1 the
/// column axis scaled by the row spacing, column 2 the slice normal
/// scaled by the inter-slice spacing, column 3 the origin.
pub fn dicom_affine(
    axis_x: &Vector3<f64>,
    axis_y: &Vector3<f64>,
    normal: &Vector3<f64>,
    origin: &Vector3<f64>,
    dx: f64,
    dy: f64,
    dz: f64,
) -> Affine4 {
    let mut m = Affine4::identity();
    for i in 0..3 {
        m[(i, 0)] = axis_x[i] * dx;
        m[(i, 1)] = axis_y[i] * dy;
        m[(i, 2)] = normal[i] * dz;
        m[(i, 3)] = origin[i];
    }
    m
}

/// Convert a voxel-to-patient affine from the DICOM LPS convention to
/// the NIfTI RAS convention, accounting for the writer flipping the
/// rows of every slice: rows 0 and 1 are negated, then the translation
/// is moved to the far end of the Y axis and column 1 re-negated.
pub fn dicom_to_nifti_orientation(m: &mut Affine4, ny: u32) {
    for r in 0..2 {
        for c in 0..4 {
            m[(r, c)] = -m[(r, c)];
        }
    }

    for r in 0..3 {
        m[(r, 3)] += m[(r, 1)] * (ny as f64 - 1.0);
    }
    for r in 0..3 {
        m[(r, 1)] = -m[(r, 1)];
    }
}

/// Largest row sum of absolute values.
fn row_norm(a: &Affine3) -> f64 {
    (0..3)
        .map(|r| (0..3).map(|c| a[(r, c)].abs()).sum())
        .fold(0.0, f64::max)
}

/// Largest column sum of absolute values.
fn col_norm(a: &Affine3) -> f64 {
    (0..3)
        .map(|c| (0..3).map(|r| a[(r, c)].abs()).sum())
        .fold(0.0, f64::max)
}

/// Polar decomposition of a 3x3 matrix: the nearest orthogonal matrix,
/// computed by the scaled Newton iteration of the NIfTI reference
/// implementation. A singular input is perturbed along the diagonal
/// until it becomes invertible.
fn polar_decomposition(a: &Affine3) -> Affine3 {
    let mut x = *a;

    let mut gam = x.determinant();
    while gam == 0.0 {
        // perturb the matrix
        gam = 0.00001 * (0.001 + row_norm(&x));
        x[(0, 0)] += gam;
        x[(1, 1)] += gam;
        x[(2, 2)] += gam;
        gam = x.determinant();
    }

    let mut dif = 1.0;
    let mut k = 0;
    loop {
        let y = match x.try_inverse() {
            Some(y) => y,
            None => return x,
        };
        let (gam, gmi) = if dif > 0.3 {
            // far from convergence
            let alp = (row_norm(&x) * col_norm(&x)).sqrt();
            let bet = (row_norm(&y) * col_norm(&y)).sqrt();
            let gam = (bet / alp).sqrt();
            (gam, 1.0 / gam)
        } else {
            (1.0, 1.0)
        };

        let mut z = Affine3::zeros();
        for i in 0..3 {
            for j in 0..3 {
                z[(i, j)] = 0.5 * (gam * x[(i, j)] + gmi * y[(j, i)]);
            }
        }

        dif = (0..3)
            .flat_map(|i| (0..3).map(move |j| (i, j)))
            .map(|(i, j)| (z[(i, j)] - x[(i, j)]).abs())
            .sum();

        k += 1;
        if k > 100 || dif < 3.0e-6 {
            return z;
        }
        x = z;
    }
}

/// Decompose a voxel-to-space affine into the NIfTI quaternion
/// representation, following `nifti_mat44_to_quatern` of the reference
/// implementation: per-column spacings are extracted (degenerate
/// columns are repaired), the rotation is orthogonalized by polar
/// decomposition, a negative determinant is absorbed into `qfac`, and
/// the quaternion is read off the rotation with a positive real part.
pub fn mat44_to_quatern(m: &Affine4) -> Quatern {
    let offset = Vector3::new(m[(0, 3)], m[(1, 3)], m[(2, 3)]);

    // load the columns and extract their lengths as the voxel spacings
    let mut r = Affine3::zeros();
    for i in 0..3 {
        for j in 0..3 {
            r[(i, j)] = m[(i, j)];
        }
    }

    let mut spacing = Vector3::zeros();
    for j in 0..3 {
        let len = (r[(0, j)] * r[(0, j)] + r[(1, j)] * r[(1, j)] + r[(2, j)] * r[(2, j)]).sqrt();
        if len > 0.0 {
            spacing[j] = len;
            for i in 0..3 {
                r[(i, j)] /= len;
            }
        } else {
            spacing[j] = 1.0;
            r[(j, j)] = 1.0;
        }
    }

    let mut p = polar_decomposition(&r);

    let qfac = if p.determinant() >= 0.0 {
        1.0
    } else {
        for i in 0..3 {
            p[(i, 2)] = -p[(i, 2)];
        }
        -1.0
    };

    let (r11, r12, r13) = (p[(0, 0)], p[(0, 1)], p[(0, 2)]);
    let (r21, r22, r23) = (p[(1, 0)], p[(1, 1)], p[(1, 2)]);
    let (r31, r32, r33) = (p[(2, 0)], p[(2, 1)], p[(2, 2)]);

    let mut a = r11 + r22 + r33 + 1.0;
    let (b, c, d);
    if a > 0.5 {
        a = 0.5 * a.sqrt();
        b = 0.25 * (r32 - r23) / a;
        c = 0.25 * (r13 - r31) / a;
        d = 0.25 * (r21 - r12) / a;
    } else {
        let xd = 1.0 + r11 - (r22 + r33);
        let yd = 1.0 + r22 - (r11 + r33);
        let zd = 1.0 + r33 - (r11 + r22);
        let (mut aa, mut bb, mut cc, mut dd);
        if xd > 1.0 {
            bb = 0.5 * xd.sqrt();
            cc = 0.25 * (r12 + r21) / bb;
            dd = 0.25 * (r13 + r31) / bb;
            aa = 0.25 * (r32 - r23) / bb;
        } else if yd > 1.0 {
            cc = 0.5 * yd.sqrt();
            bb = 0.25 * (r12 + r21) / cc;
            dd = 0.25 * (r23 + r32) / cc;
            aa = 0.25 * (r13 - r31) / cc;
        } else {
            dd = 0.5 * zd.sqrt();
            bb = 0.25 * (r13 + r31) / dd;
            cc = 0.25 * (r23 + r32) / dd;
            aa = 0.25 * (r21 - r12) / dd;
        }
        if aa < 0.0 {
            bb = -bb;
            cc = -cc;
            dd = -dd;
            aa = -aa;
        }
        let _ = aa;
        b = bb;
        c = cc;
        d = dd;
    }

    Quatern {
        b,
        c,
        d,
        offset,
        spacing,
        qfac,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn identity_affine_has_null_quaternion() {
        let q = mat44_to_quatern(&Affine4::identity());
        assert_abs_diff_eq!(q.b, 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(q.c, 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(q.d, 0.0, epsilon = 1e-12);
        assert_eq!(q.qfac, 1.0);
        assert_abs_diff_eq!(q.spacing.x, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn spacings_are_recovered_from_columns() {
        let m = Affine4::new(
            2.0, 0.0, 0.0, 5.0, //
            0.0, 3.0, 0.0, 6.0, //
            0.0, 0.0, 4.0, 7.0, //
            0.0, 0.0, 0.0, 1.0,
        );
        let q = mat44_to_quatern(&m);
        assert_abs_diff_eq!(q.spacing.x, 2.0, epsilon = 1e-9);
        assert_abs_diff_eq!(q.spacing.y, 3.0, epsilon = 1e-9);
        assert_abs_diff_eq!(q.spacing.z, 4.0, epsilon = 1e-9);
        assert_eq!(q.offset, Vector3::new(5.0, 6.0, 7.0));
        assert_eq!(q.qfac, 1.0);
    }

    #[test]
    fn negative_determinant_sets_qfac() {
        // a pure mirror along z
        let m = Affine4::new(
            1.0, 0.0, 0.0, 0.0, //
            0.0, 1.0, 0.0, 0.0, //
            0.0, 0.0, -1.0, 0.0, //
            0.0, 0.0, 0.0, 1.0,
        );
        let q = mat44_to_quatern(&m);
        assert_eq!(q.qfac, -1.0);
        assert_abs_diff_eq!(q.b, 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(q.c, 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(q.d, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn half_turn_about_y() {
        // diag(-1, 1, -1) is a 180 degree rotation about y
        let m = Affine4::new(
            -1.0, 0.0, 0.0, 0.0, //
            0.0, 1.0, 0.0, 0.0, //
            0.0, 0.0, -1.0, 0.0, //
            0.0, 0.0, 0.0, 1.0,
        );
        let q = mat44_to_quatern(&m);
        assert_eq!(q.qfac, 1.0);
        assert_abs_diff_eq!(q.b, 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(q.c.abs(), 1.0, epsilon = 1e-9);
        assert_abs_diff_eq!(q.d, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn dicom_conversion_moves_the_y_offset() {
        let mut m = dicom_affine(
            &Vector3::new(1.0, 0.0, 0.0),
            &Vector3::new(0.0, 1.0, 0.0),
            &Vector3::new(0.0, 0.0, 1.0),
            &Vector3::zeros(),
            1.0,
            1.0,
            2.0,
        );
        dicom_to_nifti_orientation(&mut m, 16);
        assert_eq!(m[(0, 0)], -1.0);
        assert_eq!(m[(1, 1)], 1.0);
        assert_eq!(m[(2, 2)], 2.0);
        assert_eq!(m[(0, 3)], 0.0);
        assert_eq!(m[(1, 3)], -15.0);
        assert_eq!(m[(2, 3)], 0.0);
    }

    #[test]
    fn polar_decomposition_orthogonalizes() {
        let skewed = Affine3::new(
            1.0, 0.1, 0.0, //
            0.0, 1.0, 0.0, //
            0.0, 0.0, 1.0,
        );
        let p = polar_decomposition(&skewed);
        let should_be_identity = p * p.transpose();
        for i in 0..3 {
            for j in 0..3 {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert_abs_diff_eq!(should_be_identity[(i, j)], expected, epsilon = 1e-5);
            }
        }
    }
}
