//! Image conversion utilities for OpenCV Mat and ndarray interoperability.

use crate::{Error, Result};
use ndarray::Array3;
use opencv::core::{Mat, MatTraitConst, Vec3b, CV_8UC3};

/// Convert an 8-bit 3-channel Mat to an `Array3<u8>` of shape (height, width, 3)
///
/// Channel order is preserved (BGR for frames read by OpenCV).
///
/// # Errors
/// * Returns error if the Mat is empty or not `CV_8UC3`
/// * Returns error if Mat data cannot be accessed
pub fn bgr_mat_to_array(mat: &Mat) -> Result<Array3<u8>> {
    let rows = mat.rows();
    let cols = mat.cols();

    if rows <= 0 || cols <= 0 {
        return Err(Error::InvalidInput(format!("Invalid Mat dimensions: {}x{}", rows, cols)));
    }
    if mat.typ() != CV_8UC3 {
        return Err(Error::InvalidInput(format!(
            "Expected an 8-bit 3-channel image, got Mat type {}",
            mat.typ()
        )));
    }

    let shape = (rows as usize, cols as usize, 3);

    if mat.is_continuous() {
        let bytes = mat.data_bytes()?;
        return Array3::from_shape_vec(shape, bytes.to_vec())
            .map_err(|e| Error::InvalidInput(format!("Failed to create array from Mat: {}", e)));
    }

    // ROI views are not continuous, copy pixel by pixel
    let mut array = Array3::<u8>::zeros(shape);
    for row in 0..rows {
        for col in 0..cols {
            let pixel = mat.at_2d::<Vec3b>(row, col)?;
            for ch in 0..3 {
                array[[row as usize, col as usize, ch]] = pixel[ch];
            }
        }
    }

    Ok(array)
}

#[cfg(test)]
mod tests {
    use super::*;
    use opencv::core::{Rect, Scalar, CV_32FC3};
    use opencv::prelude::MatTrait;

    /// Mat whose pixel (r, c) holds (r*18 + c*3, +1, +2)
    fn gradient_mat(rows: i32, cols: i32) -> Mat {
        let mut mat = Mat::new_rows_cols_with_default(rows, cols, CV_8UC3, Scalar::default()).unwrap();
        for r in 0..rows {
            for c in 0..cols {
                let base = (r * 18 + c * 3) as u8;
                *mat.at_2d_mut::<Vec3b>(r, c).unwrap() = Vec3b::from([base, base + 1, base + 2]);
            }
        }
        mat
    }

    #[test]
    fn test_bgr_mat_to_array() {
        let mat = Mat::new_rows_cols_with_default(2, 3, CV_8UC3, Scalar::new(10.0, 20.0, 30.0, 0.0)).unwrap();

        let array = bgr_mat_to_array(&mat).unwrap();
        assert_eq!(array.shape(), &[2, 3, 3]);
        assert_eq!(array[[0, 0, 0]], 10);
        assert_eq!(array[[0, 0, 1]], 20);
        assert_eq!(array[[1, 2, 2]], 30);
    }

    #[test]
    fn test_non_continuous_roi() {
        let mat = gradient_mat(4, 6);
        let roi = Mat::roi(&mat, Rect::new(1, 1, 3, 2)).unwrap();

        let array = bgr_mat_to_array(&roi).unwrap();
        assert_eq!(array.shape(), &[2, 3, 3]);
        // (1, 1) and (2, 3) of the full image
        assert_eq!(array[[0, 0, 0]], 21);
        assert_eq!(array[[1, 2, 2]], 47);
    }

    #[test]
    fn test_rejects_float_mat() {
        let mat = Mat::new_rows_cols_with_default(2, 3, CV_32FC3, Scalar::all(1.0)).unwrap();
        assert!(bgr_mat_to_array(&mat).is_err());
    }
}
