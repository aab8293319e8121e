// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::error::AppError;
use ndarray::Array2;

/// Squared Euclidean distance. This is the metric the index reports and the
/// one the report score transform is calibrated for.
pub fn squared_l2_distance(v1: &[f32], v2: &[f32]) -> Result<f32, AppError> {
    validate_dimension(v1, v2.len())?;
    Ok(v1.iter().zip(v2.iter()).map(|(a, b)| (a - b) * (a - b)).sum())
}

pub fn normalize_l2(v: &mut [f32]) {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 1e-12 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

pub fn validate_dimension(v: &[f32], expected: usize) -> Result<(), AppError> {
    if v.len() != expected {
        return Err(AppError::InvalidInput(format!(
            "Vector dimensions mismatch: {} vs {}",
            v.len(),
            expected
        )));
    }
    Ok(())
}

/// Stack equally sized rows into an `[rows, dimension]` matrix.
///
/// An empty input gives a `[0, 0]` matrix.
pub fn stack_rows(rows: Vec<Vec<f32>>) -> Result<Array2<f32>, AppError> {
    let Some(dimension) = rows.first().map(Vec::len) else {
        return Ok(Array2::zeros((0, 0)));
    };

    let count = rows.len();
    let mut flat = Vec::with_capacity(count * dimension);
    for (i, row) in rows.into_iter().enumerate() {
        if row.len() != dimension {
            return Err(AppError::InvalidInput(format!(
                "Row {} has dimension {}, expected {}",
                i,
                row.len(),
                dimension
            )));
        }
        flat.extend(row);
    }

    Array2::from_shape_vec((count, dimension), flat)
        .map_err(|e| AppError::InvalidInput(format!("Cannot stack vectors: {}", e)))
}
