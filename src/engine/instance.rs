//! The interpolation tables produced by a weight engine.
//!
//! For every source face the instance stores the opposite (target) faces that
//! overlap it and one weight per such face, and the mirror-image tables for
//! the target faces. Engines return *raw* weights (overlap area over face
//! area), so a row sums to the fraction of its face that is covered; that sum
//! is kept in `*_weights_sum` when the rows are later normalised.

use crate::debug_invariants::DebugInvariants;
use crate::mesh_error::MeshAmiError;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct AmiInstance {
    src_address: Vec<Vec<usize>>,
    src_weights: Vec<Vec<f64>>,
    src_weights_sum: Vec<f64>,
    tgt_address: Vec<Vec<usize>>,
    tgt_weights: Vec<Vec<f64>>,
    tgt_weights_sum: Vec<f64>,
    low_weight_correction: f64,
}

/// Addressing, weights and weight sums of one side of an [`AmiInstance`].
#[derive(Clone, Copy, Debug)]
pub struct AmiRows<'a> {
    pub address: &'a [Vec<usize>],
    pub weights: &'a [Vec<f64>],
    pub weights_sum: &'a [f64],
}

impl<'a> AmiRows<'a> {
    pub fn len(&self) -> usize {
        self.address.len()
    }

    pub fn is_empty(&self) -> bool {
        self.address.is_empty()
    }
}

fn row_sums(weights: &[Vec<f64>]) -> Vec<f64> {
    weights.iter().map(|w| w.iter().sum()).collect()
}

impl AmiInstance {
    /// Assemble an instance from raw rows; weight sums are computed here.
    pub fn new(
        src_address: Vec<Vec<usize>>,
        src_weights: Vec<Vec<f64>>,
        tgt_address: Vec<Vec<usize>>,
        tgt_weights: Vec<Vec<f64>>,
    ) -> Self {
        let src_weights_sum = row_sums(&src_weights);
        let tgt_weights_sum = row_sums(&tgt_weights);
        let ami = Self {
            src_address,
            src_weights,
            src_weights_sum,
            tgt_address,
            tgt_weights,
            tgt_weights_sum,
            low_weight_correction: -1.0,
        };
        crate::debug_invariants!(ami.validate_invariants(), "AmiInstance::new");
        ami
    }

    pub fn src_size(&self) -> usize {
        self.src_address.len()
    }

    pub fn tgt_size(&self) -> usize {
        self.tgt_address.len()
    }

    pub fn src_address(&self) -> &[Vec<usize>] {
        &self.src_address
    }

    pub fn src_weights(&self) -> &[Vec<f64>] {
        &self.src_weights
    }

    pub fn src_weights_sum(&self) -> &[f64] {
        &self.src_weights_sum
    }

    pub fn tgt_address(&self) -> &[Vec<usize>] {
        &self.tgt_address
    }

    pub fn tgt_weights(&self) -> &[Vec<f64>] {
        &self.tgt_weights
    }

    pub fn tgt_weights_sum(&self) -> &[f64] {
        &self.tgt_weights_sum
    }

    pub fn src_rows(&self) -> AmiRows<'_> {
        AmiRows {
            address: &self.src_address,
            weights: &self.src_weights,
            weights_sum: &self.src_weights_sum,
        }
    }

    pub fn tgt_rows(&self) -> AmiRows<'_> {
        AmiRows {
            address: &self.tgt_address,
            weights: &self.tgt_weights,
            weights_sum: &self.tgt_weights_sum,
        }
    }

    pub fn low_weight_correction(&self) -> f64 {
        self.low_weight_correction
    }

    pub fn set_low_weight_correction(&mut self, threshold: f64) {
        self.low_weight_correction = threshold;
    }

    /// Number of source and target faces with no contributing face at all.
    pub fn unmatched(&self) -> (usize, usize) {
        let count = |rows: &[Vec<usize>]| rows.iter().filter(|r| r.is_empty()).count();
        (count(&self.src_address), count(&self.tgt_address))
    }

    /// Divide every row by its weight sum. The sums themselves are kept.
    pub fn normalise_weights(&mut self) {
        self.normalise_by(None, None);
    }

    /// Divide rows by externally supplied sums (one per source / target face).
    ///
    /// Rows whose divisor is not positive are left untouched.
    pub(crate) fn normalise_by(&mut self, src_sums: Option<&[f64]>, tgt_sums: Option<&[f64]>) {
        let divide = |weights: &mut [Vec<f64>], sums: &[f64]| {
            for (row, &s) in weights.iter_mut().zip(sums) {
                if s > 0.0 {
                    row.iter_mut().for_each(|w| *w /= s);
                }
            }
        };
        let own_src = self.src_weights_sum.clone();
        let own_tgt = self.tgt_weights_sum.clone();
        divide(&mut self.src_weights, src_sums.unwrap_or(own_src.as_slice()));
        divide(&mut self.tgt_weights, tgt_sums.unwrap_or(own_tgt.as_slice()));
    }

    /// Keep only the listed source and target rows, in the given order.
    ///
    /// Addresses are untouched: they keep referring to the full opposite side.
    pub fn select_rows(&self, src_rows: &[usize], tgt_rows: &[usize]) -> Self {
        let pick = |rows: &[usize], address: &[Vec<usize>], weights: &[Vec<f64>], sums: &[f64]| {
            let mut a = Vec::with_capacity(rows.len());
            let mut w = Vec::with_capacity(rows.len());
            let mut s = Vec::with_capacity(rows.len());
            for &r in rows {
                a.push(address[r].clone());
                w.push(weights[r].clone());
                s.push(sums[r]);
            }
            (a, w, s)
        };
        let (src_address, src_weights, src_weights_sum) = pick(
            src_rows,
            &self.src_address,
            &self.src_weights,
            &self.src_weights_sum,
        );
        let (tgt_address, tgt_weights, tgt_weights_sum) = pick(
            tgt_rows,
            &self.tgt_address,
            &self.tgt_weights,
            &self.tgt_weights_sum,
        );
        Self {
            src_address,
            src_weights,
            src_weights_sum,
            tgt_address,
            tgt_weights,
            tgt_weights_sum,
            low_weight_correction: self.low_weight_correction,
        }
    }

    /// Source-area-weighted mean coverage: `Σ sum·area / Σ area`.
    pub fn src_coverage(&self, src_mag_areas: &[f64]) -> f64 {
        let (covered, total) = self
            .src_weights_sum
            .iter()
            .zip(src_mag_areas)
            .fold((0.0, 0.0), |(c, t), (s, a)| (c + s * a, t + a));
        if total > 0.0 { covered / total } else { 0.0 }
    }

    /// Interpolate a target-side field onto the source faces.
    ///
    /// `tgt_field` is indexed by the target addresses. With low-weight
    /// correction active, faces whose weight sum is below the threshold take
    /// the matching entry of `default_values` instead.
    pub fn interpolate_to_source(
        &self,
        tgt_field: &[f64],
        default_values: Option<&[f64]>,
    ) -> Result<Vec<f64>, MeshAmiError> {
        interpolate_rows(
            self.src_rows(),
            tgt_field,
            default_values,
            self.low_weight_correction,
        )
    }

    /// Interpolate a source-side field onto the target faces.
    pub fn interpolate_to_target(
        &self,
        src_field: &[f64],
        default_values: Option<&[f64]>,
    ) -> Result<Vec<f64>, MeshAmiError> {
        interpolate_rows(
            self.tgt_rows(),
            src_field,
            default_values,
            self.low_weight_correction,
        )
    }
}

/// Weighted sum of `donor` over every row; shared by plain and repeat interpolation.
pub(crate) fn interpolate_rows(
    rows: AmiRows<'_>,
    donor: &[f64],
    default_values: Option<&[f64]>,
    low_weight_correction: f64,
) -> Result<Vec<f64>, MeshAmiError> {
    if let Some(defaults) = default_values {
        if defaults.len() != rows.len() {
            return Err(MeshAmiError::SizeMismatch {
                what: "default values",
                expected: rows.len(),
                found: defaults.len(),
            });
        }
    }
    let mut out = Vec::with_capacity(rows.len());
    for face in 0..rows.len() {
        if low_weight_correction > 0.0 && rows.weights_sum[face] < low_weight_correction {
            if let Some(defaults) = default_values {
                out.push(defaults[face]);
                continue;
            }
        }
        let mut value = 0.0;
        for (&a, &w) in rows.address[face].iter().zip(&rows.weights[face]) {
            let donor_value = donor.get(a).ok_or_else(|| MeshAmiError::SizeMismatch {
                what: "donor field",
                expected: a + 1,
                found: donor.len(),
            })?;
            value += w * donor_value;
        }
        out.push(value);
    }
    Ok(out)
}

impl DebugInvariants for AmiInstance {
    fn debug_assert_invariants(&self) {
        crate::debug_invariants!(self.validate_invariants(), "AmiInstance");
    }

    fn validate_invariants(&self) -> Result<(), MeshAmiError> {
        let check_side = |what: &'static str,
                          address: &[Vec<usize>],
                          weights: &[Vec<f64>],
                          sums: &[f64],
                          opposite: usize|
         -> Result<(), MeshAmiError> {
            if weights.len() != address.len() || sums.len() != address.len() {
                return Err(MeshAmiError::SizeMismatch {
                    what,
                    expected: address.len(),
                    found: weights.len().min(sums.len()),
                });
            }
            for (face, (a, w)) in address.iter().zip(weights).enumerate() {
                if a.len() != w.len() {
                    return Err(MeshAmiError::SizeMismatch {
                        what,
                        expected: a.len(),
                        found: w.len(),
                    });
                }
                if let Some(&bad) = a.iter().find(|&&i| i >= opposite) {
                    return Err(MeshAmiError::InvalidGeometry(format!(
                        "{what}: face {face} addresses face {bad} of {opposite}"
                    )));
                }
                if w.iter().any(|x| !x.is_finite() || *x < 0.0) {
                    return Err(MeshAmiError::InvalidGeometry(format!(
                        "{what}: face {face} has a negative or non-finite weight"
                    )));
                }
            }
            Ok(())
        };
        check_side(
            "source rows",
            &self.src_address,
            &self.src_weights,
            &self.src_weights_sum,
            self.tgt_address.len(),
        )?;
        check_side(
            "target rows",
            &self.tgt_address,
            &self.tgt_weights,
            &self.tgt_weights_sum,
            self.src_address.len(),
        )
    }
}
