//! Low-rank grayscale compression via singular value decomposition.

use crate::{ensure_non_empty, to_gray, GlyphrankError, Result};
use image::{DynamicImage, GrayImage, Luma};
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

/// Spread below which a reconstruction counts as uniform.
const FLAT_RANGE: f64 = 1e-6;

/// How reconstructed floats are mapped back to 8-bit samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Normalization {
    /// Stretch the matrix's min..max onto 0..255. A uniform matrix keeps
    /// its own (clamped) value.
    #[default]
    MinMax,
    /// Round and clamp each sample, keeping absolute intensities.
    Clamp,
}

/// Largest accepted ‖A − UΣVᵀ‖ / ‖A‖ for a factorization.
const MAX_RESIDUAL: f64 = 1e-9;

/// Sweep limit for the Jacobi fallback.
const MAX_SWEEPS: usize = 64;

/// Decomposition of one grayscale image, reusable across ranks.
///
/// Term `i` of the factorization is `scaled[:, i] * v_t[i, :]`, where
/// `scaled` holds the left singular vectors multiplied by their singular
/// values. Terms are stored largest singular value first.
#[derive(Debug, Clone)]
pub struct ImageSvd {
    scaled: DMatrix<f64>,
    singular_values: Vec<f64>,
    v_t: DMatrix<f64>,
}

impl ImageSvd {
    pub fn decompose(gray: &GrayImage) -> Result<Self> {
        ensure_non_empty(gray)?;
        let (w, h) = gray.dimensions();
        let matrix = DMatrix::from_row_iterator(
            h as usize,
            w as usize,
            gray.pixels().map(|p| p.0[0] as f64),
        );
        Self::from_matrix(matrix)
    }

    /// Factor `matrix`, checking every candidate against the input.
    ///
    /// nalgebra's bidiagonal SVD can return factors that do not multiply
    /// back to rank-deficient inputs, so its result is verified, then the
    /// transpose is tried, then one-sided Jacobi.
    pub fn from_matrix(matrix: DMatrix<f64>) -> Result<Self> {
        let (rows, cols) = matrix.shape();
        if rows == 0 || cols == 0 {
            return Err(GlyphrankError::InvalidInput(format!(
                "matrix is empty ({rows}x{cols})"
            )));
        }
        if matrix.iter().any(|v| !v.is_finite()) {
            return Err(GlyphrankError::Decomposition(
                "matrix contains non-finite values".into(),
            ));
        }
        if matrix.iter().all(|&v| v == 0.0) {
            return Err(GlyphrankError::Decomposition("matrix is all zero".into()));
        }

        let accurate = |svd: &ImageSvd| {
            let residual = svd.residual(&matrix);
            log::debug!("svd: {rows}x{cols} relative residual {residual:.3e}");
            residual <= MAX_RESIDUAL
        };

        let svd = bidiagonal_svd(&matrix, false)
            .filter(&accurate)
            .or_else(|| {
                log::debug!("svd: retrying {rows}x{cols} on the transpose");
                bidiagonal_svd(&matrix, true).filter(&accurate)
            })
            .or_else(|| {
                log::debug!("svd: falling back to one-sided Jacobi for {rows}x{cols}");
                jacobi_svd(&matrix).filter(&accurate)
            })
            .ok_or_else(|| {
                GlyphrankError::Decomposition(format!(
                    "no accurate SVD found for {rows}x{cols} matrix"
                ))
            })?;

        log::debug!(
            "svd: {rows}x{cols}, largest singular value {:.3}",
            svd.singular_values[0]
        );
        Ok(svd)
    }

    /// Order terms by descending singular value and keep the first `rank`.
    fn from_terms(
        scaled: DMatrix<f64>,
        values: Vec<f64>,
        v_t: DMatrix<f64>,
        rank: usize,
    ) -> Option<Self> {
        if values.iter().any(|s| !s.is_finite()) {
            return None;
        }
        let mut order: Vec<usize> = (0..values.len()).collect();
        order.sort_by(|&a, &b| values[b].total_cmp(&values[a]));
        order.truncate(rank);

        Some(Self {
            scaled: scaled.select_columns(order.iter()),
            singular_values: order.iter().map(|&i| values[i]).collect(),
            v_t: v_t.select_rows(order.iter()),
        })
    }

    /// ‖A − UΣVᵀ‖_F / ‖A‖_F over all stored terms.
    fn residual(&self, matrix: &DMatrix<f64>) -> f64 {
        let diff = matrix - &self.scaled * &self.v_t;
        diff.norm() / matrix.norm()
    }

    /// Singular values, largest first.
    pub fn singular_values(&self) -> &[f64] {
        &self.singular_values
    }

    /// `min(rows, cols)`: the largest accepted `k`.
    pub fn max_rank(&self) -> usize {
        self.singular_values.len()
    }

    /// Number of singular values above the usual numerical tolerance.
    pub fn numerical_rank(&self) -> usize {
        let (rows, cols) = self.shape();
        let tol = rows.max(cols) as f64 * f64::EPSILON * self.singular_values[0];
        self.singular_values.iter().filter(|&&s| s > tol).count()
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.scaled.nrows(), self.v_t.ncols())
    }

    /// Fraction of the squared Frobenius norm carried by the top `k` values.
    pub fn energy_retained(&self, k: usize) -> Result<f64> {
        self.check_rank(k)?;
        let total: f64 = self.singular_values.iter().map(|s| s * s).sum();
        let kept: f64 = self.singular_values[..k].iter().map(|s| s * s).sum();
        Ok(kept / total)
    }

    /// Rank-`k` approximation `U Σₖ Vᵀ` as floats.
    pub fn approximate(&self, k: usize) -> Result<DMatrix<f64>> {
        self.check_rank(k)?;
        let (rows, cols) = self.shape();
        if k == 0 {
            return Ok(DMatrix::zeros(rows, cols));
        }

        Ok(self.scaled.columns(0, k) * self.v_t.rows(0, k))
    }

    /// Rank-`k` approximation mapped back to an 8-bit image.
    pub fn reconstruct(&self, k: usize, normalization: Normalization) -> Result<GrayImage> {
        let approx = self.approximate(k)?;
        log::debug!(
            "svd: kept {k}/{} singular values ({:.2}% energy)",
            self.max_rank(),
            self.energy_retained(k)? * 100.0
        );
        Ok(to_gray_image(&approx, normalization))
    }

    fn check_rank(&self, k: usize) -> Result<()> {
        let max = self.max_rank();
        if k > max {
            return Err(GlyphrankError::out_of_range("k", k, format!("0..={max}")));
        }
        Ok(())
    }
}

/// Keep the `k` largest singular values of `image`'s luminance and rebuild
/// it, min-max normalized to 0..255.
pub fn compress(image: &DynamicImage, k: usize) -> Result<GrayImage> {
    let gray = to_gray(image)?;
    compress_gray(&gray, k, Normalization::MinMax)
}

pub fn compress_gray(gray: &GrayImage, k: usize, normalization: Normalization) -> Result<GrayImage> {
    ensure_non_empty(gray)?;
    let max = gray.width().min(gray.height()) as usize;
    if k > max {
        return Err(GlyphrankError::out_of_range("k", k, format!("0..={max}")));
    }
    ImageSvd::decompose(gray)?.reconstruct(k, normalization)
}

/// Mean absolute per-pixel difference between two equally sized images.
pub fn mean_absolute_error(a: &GrayImage, b: &GrayImage) -> Result<f64> {
    ensure_non_empty(a)?;
    if a.dimensions() != b.dimensions() {
        return Err(GlyphrankError::InvalidInput(format!(
            "size mismatch: {:?} vs {:?}",
            a.dimensions(),
            b.dimensions()
        )));
    }
    let total: u64 = a
        .pixels()
        .zip(b.pixels())
        .map(|(p, q)| p.0[0].abs_diff(q.0[0]) as u64)
        .sum();
    Ok(total as f64 / (a.width() as u64 * a.height() as u64) as f64)
}

/// nalgebra's Golub–Kahan SVD of `matrix`, or of its transpose when
/// `transpose` is set (Aᵀ = UΣVᵀ gives A = VΣUᵀ).
fn bidiagonal_svd(matrix: &DMatrix<f64>, transpose: bool) -> Option<ImageSvd> {
    let input = if transpose { matrix.transpose() } else { matrix.clone() };
    let rank = input.nrows().min(input.ncols());
    let max_iterations = 64 * rank.max(16);
    let svd = input.try_svd(true, true, f64::EPSILON, max_iterations)?;
    let (u, v_t) = (svd.u?, svd.v_t?);
    let values: Vec<f64> = svd.singular_values.iter().copied().collect();

    let (left, right) = if transpose {
        (v_t.transpose(), u.transpose())
    } else {
        (u, v_t)
    };
    let mut scaled = left;
    for (mut column, &sigma) in scaled.column_iter_mut().zip(&values) {
        column *= sigma;
    }
    ImageSvd::from_terms(scaled, values, right, rank)
}

/// One-sided (Hestenes) Jacobi SVD.
///
/// Column pairs of `W = A V` are rotated until mutually orthogonal; the
/// column norms are then the singular values and `W` is `UΣ`. Identical or
/// zero columns are handled exactly, which is where the bidiagonal routine
/// goes wrong.
fn jacobi_svd(matrix: &DMatrix<f64>) -> Option<ImageSvd> {
    let (rows, cols) = matrix.shape();
    let tol = rows.max(cols) as f64 * f64::EPSILON;
    let mut w = matrix.clone();
    let mut v = DMatrix::<f64>::identity(cols, cols);

    let mut converged = false;
    for _ in 0..MAX_SWEEPS {
        let mut rotated = false;
        for p in 0..cols {
            for q in p + 1..cols {
                let alpha = w.column(p).norm_squared();
                let beta = w.column(q).norm_squared();
                let gamma = w.column(p).dot(&w.column(q));
                if gamma.abs() <= tol * (alpha * beta).sqrt() {
                    continue;
                }
                rotated = true;

                let zeta = (beta - alpha) / (2.0 * gamma);
                let t = zeta.signum() / (zeta.abs() + (1.0 + zeta * zeta).sqrt());
                let c = 1.0 / (1.0 + t * t).sqrt();
                let s = c * t;
                rotate_columns(&mut w, p, q, c, s);
                rotate_columns(&mut v, p, q, c, s);
            }
        }
        if !rotated {
            converged = true;
            break;
        }
    }
    if !converged {
        return None;
    }

    let values: Vec<f64> = w.column_iter().map(|column| column.norm()).collect();
    ImageSvd::from_terms(w, values, v.transpose(), rows.min(cols))
}

fn rotate_columns(m: &mut DMatrix<f64>, p: usize, q: usize, c: f64, s: f64) {
    for i in 0..m.nrows() {
        let (mp, mq) = (m[(i, p)], m[(i, q)]);
        m[(i, p)] = c * mp - s * mq;
        m[(i, q)] = s * mp + c * mq;
    }
}

fn to_gray_image(matrix: &DMatrix<f64>, normalization: Normalization) -> GrayImage {
    let (min, max) = matrix
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    let range = max - min;
    let stretch = normalization == Normalization::MinMax && range > FLAT_RANGE;

    let (rows, cols) = matrix.shape();
    GrayImage::from_fn(cols as u32, rows as u32, |x, y| {
        let v = matrix[(y as usize, x as usize)];
        let v = if stretch { (v - min) * 255.0 / range } else { v };
        Luma([v.round().clamp(0.0, 255.0) as u8])
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noise(seed: u32, w: u32, h: u32) -> GrayImage {
        let mut state = seed.max(1);
        GrayImage::from_fn(w, h, |_, _| {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            Luma([(state >> 24) as u8])
        })
    }

    fn frobenius_error(svd: &ImageSvd, original: &DMatrix<f64>, k: usize) -> f64 {
        (original - svd.approximate(k).unwrap()).norm()
    }

    #[test]
    fn singular_values_descend() {
        let svd = ImageSvd::decompose(&noise(7, 12, 9)).unwrap();
        assert_eq!(svd.max_rank(), 9);
        assert!(svd.singular_values().windows(2).all(|w| w[0] >= w[1]));
    }

    #[test]
    fn uniform_image_survives_rank_one() {
        let img = GrayImage::from_pixel(6, 4, Luma([128]));
        for normalization in [Normalization::MinMax, Normalization::Clamp] {
            let out = compress_gray(&img, 1, normalization).unwrap();
            assert_eq!(out, img);
        }
    }

    #[test]
    fn rank_one_outer_product_is_exact() {
        let a = [0u32, 1, 2, 3, 4, 5];
        let b = [10u32, 20, 30, 40, 51];
        let img = GrayImage::from_fn(5, 6, |x, y| Luma([(a[y as usize] * b[x as usize]) as u8]));
        let svd = ImageSvd::decompose(&img).unwrap();
        assert_eq!(svd.numerical_rank(), 1);
        assert!((svd.energy_retained(1).unwrap() - 1.0).abs() < 1e-9);
        assert_eq!(svd.reconstruct(1, Normalization::MinMax).unwrap(), img);
    }

    #[test]
    fn full_rank_round_trips() {
        let mut img = noise(3, 10, 8);
        img.put_pixel(0, 0, Luma([0]));
        img.put_pixel(9, 7, Luma([255]));
        assert_eq!(compress_gray(&img, 8, Normalization::MinMax).unwrap(), img);

        let img = noise(11, 7, 13);
        assert_eq!(compress_gray(&img, 7, Normalization::Clamp).unwrap(), img);
    }

    #[test]
    fn large_uniform_images_survive_rank_one() {
        for (w, h) in [(97, 131), (131, 97)] {
            for v in [1u8, 128] {
                let img = GrayImage::from_pixel(w, h, Luma([v]));
                let svd = ImageSvd::decompose(&img).unwrap();
                let s = svd.singular_values();
                assert!(s[1] < 1e-9 * s[0], "{w}x{h} v={v}: {:?}", &s[..2]);
                for normalization in [Normalization::MinMax, Normalization::Clamp] {
                    assert_eq!(svd.reconstruct(1, normalization).unwrap(), img, "{w}x{h} v={v}");
                }
            }
        }
    }

    #[test]
    fn two_tone_image_is_rebuilt_exactly() {
        let img = GrayImage::from_fn(200, 33, |x, _| Luma([if x < 100 { 30 } else { 220 }]));
        let svd = ImageSvd::decompose(&img).unwrap();
        assert_eq!(svd.reconstruct(1, Normalization::Clamp).unwrap(), img);
        let full = compress_gray(&img, 33, Normalization::Clamp).unwrap();
        assert_eq!(mean_absolute_error(&img, &full).unwrap(), 0.0);
    }

    #[test]
    fn larger_rank_one_outer_product_is_exact() {
        let img = GrayImage::from_fn(90, 120, |x, y| Luma([((y % 18) * (x % 15 + 1)) as u8]));
        let svd = ImageSvd::decompose(&img).unwrap();
        assert!((svd.energy_retained(1).unwrap() - 1.0).abs() < 1e-9);
        assert_eq!(svd.reconstruct(1, Normalization::Clamp).unwrap(), img);
        assert_eq!(svd.reconstruct(1, Normalization::MinMax).unwrap(), img);
    }

    #[test]
    fn factorization_multiplies_back() {
        let cases = [
            GrayImage::from_pixel(131, 97, Luma([1])),
            GrayImage::from_fn(64, 40, |x, _| Luma([(x % 2) as u8 * 200])),
            noise(13, 30, 45),
        ];
        for img in cases {
            let (w, h) = img.dimensions();
            let original =
                DMatrix::from_row_iterator(h as usize, w as usize, img.pixels().map(|p| p.0[0] as f64));
            let svd = ImageSvd::decompose(&img).unwrap();
            let relative = frobenius_error(&svd, &original, svd.max_rank()) / original.norm();
            assert!(relative <= MAX_RESIDUAL, "{w}x{h}: {relative:e}");
        }
    }

    #[test]
    fn jacobi_handles_repeated_columns() {
        let matrix = DMatrix::from_fn(9, 7, |_, c| if c % 2 == 0 { 3.0 } else { 5.0 });
        let svd = jacobi_svd(&matrix).unwrap();
        assert!(svd.residual(&matrix) <= MAX_RESIDUAL);
        assert_eq!(svd.max_rank(), 7);
        let s = svd.singular_values();
        assert!(s.windows(2).all(|w| w[0] >= w[1]));
        assert!(s[1] < 1e-9 * s[0], "{s:?}");
    }

    #[test]
    fn error_does_not_grow_with_k() {
        let img = noise(5, 16, 12);
        let original = DMatrix::from_row_iterator(12, 16, img.pixels().map(|p| p.0[0] as f64));
        let svd = ImageSvd::decompose(&img).unwrap();
        let errors: Vec<f64> = (0..=svd.max_rank())
            .map(|k| frobenius_error(&svd, &original, k))
            .collect();
        for pair in errors.windows(2) {
            assert!(pair[1] <= pair[0] + 1e-9, "{errors:?}");
        }
        assert!(errors[svd.max_rank()] < 1e-8);
    }

    #[test]
    fn k_zero_is_black() {
        let out = compress_gray(&noise(9, 5, 5), 0, Normalization::MinMax).unwrap();
        assert!(out.pixels().all(|p| p.0[0] == 0));
    }

    #[test]
    fn k_above_rank_is_rejected() {
        let img = noise(1, 6, 4);
        assert!(matches!(
            compress_gray(&img, 5, Normalization::MinMax),
            Err(GlyphrankError::OutOfRange { name: "k", .. })
        ));
        let svd = ImageSvd::decompose(&img).unwrap();
        assert!(svd.reconstruct(5, Normalization::Clamp).is_err());
        assert!(svd.energy_retained(5).is_err());
    }

    #[test]
    fn range_is_checked_before_decomposing() {
        // an all-zero matrix would fail decomposition, but k is checked first
        let img = GrayImage::new(3, 3);
        assert!(matches!(
            compress_gray(&img, 4, Normalization::MinMax),
            Err(GlyphrankError::OutOfRange { .. })
        ));
    }

    #[test]
    fn all_zero_matrix_is_a_decomposition_failure() {
        assert!(matches!(
            ImageSvd::decompose(&GrayImage::new(4, 4)),
            Err(GlyphrankError::Decomposition(_))
        ));
        let nan = DMatrix::from_element(2, 2, f64::NAN);
        assert!(matches!(
            ImageSvd::from_matrix(nan),
            Err(GlyphrankError::Decomposition(_))
        ));
    }

    #[test]
    fn empty_input_is_invalid() {
        let empty = DynamicImage::ImageLuma8(GrayImage::new(0, 3));
        assert!(matches!(compress(&empty, 0), Err(GlyphrankError::InvalidInput(_))));
    }

    #[test]
    fn min_max_stretches_to_full_range() {
        let img = GrayImage::from_raw(2, 2, vec![100, 110, 120, 130]).unwrap();
        let out = compress_gray(&img, 2, Normalization::MinMax).unwrap();
        assert_eq!(out.as_raw(), &vec![0, 85, 170, 255]);
    }

    #[test]
    fn mean_absolute_error_counts_differences() {
        let a = GrayImage::from_raw(2, 1, vec![10, 20]).unwrap();
        let b = GrayImage::from_raw(2, 1, vec![14, 10]).unwrap();
        assert_eq!(mean_absolute_error(&a, &b).unwrap(), 7.0);
        assert!(mean_absolute_error(&a, &GrayImage::new(1, 1)).is_err());
    }
}
