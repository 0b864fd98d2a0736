//! Least-squares affine fit of forward-projected (calculated) sinograms to
//! measured ones: find `alpha`, `beta` minimizing
//! `sum (alpha * calculated + beta - measured)^2`.

use std::io::Write;

use thiserror::Error;
use tracing::warn;

use crate::full_log::FullLog;
use crate::sinogram::Sinogram;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FitCoefficients {
    pub alpha: f32,
    pub beta: f32,
}

impl Default for FitCoefficients {
    fn default() -> Self { Self { alpha: 1.0, beta: 0.0 } }
}

impl FitCoefficients {
    pub fn is_identity(&self) -> bool { *self == Self::default() }

    #[inline]
    pub fn apply(&self, x: f32) -> f32 { self.alpha * x + self.beta }
}

#[derive(Error, Debug, PartialEq)]
pub enum FitError {
    /// The calculated sinogram is constant: any `alpha` fits equally well
    #[error("unable to fit sinograms: normal equations are singular")]
    Degenerate,

    #[error("cannot fit sinograms of shapes {measured:?} and {calculated:?}")]
    ShapeMismatch { measured: (usize, usize), calculated: (usize, usize) },
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Fit {
    pub coefficients: FitCoefficients,
    /// Residual fraction `(sum m^2 - alpha sum mc - beta sum m) / sum m^2`
    pub quality: f32,
}

/// Solve the normal equations of the linear fit in closed form
pub fn best_fit(measured: &Sinogram, calculated: &Sinogram) -> Result<Fit, FitError> {
    if measured.data.dim() != calculated.data.dim() {
        return Err(FitError::ShapeMismatch { measured: measured.data.dim(), calculated: calculated.data.dim() })
    }
    let n = measured.data.len() as f64;
    let pairs = || measured.data.iter().zip(calculated.data.iter()).map(|(&m, &c)| (m as f64, c as f64));
    let (meas_sum, calc_sum) = pairs().fold((0.0, 0.0), |(sm, sc), (m, c)| (sm + m, sc + c));
    let (meas_mean, calc_mean) = (meas_sum / n, calc_sum / n);

    // Centred sums: the determinant of the normal equations is `n * calc_var`
    let (mut covariance, mut calc_var, mut meas_calc, mut meas_square, mut calc_square) = (0.0, 0.0, 0.0, 0.0, 0.0);
    for (m, c) in pairs() {
        covariance  += (m - meas_mean) * (c - calc_mean);
        calc_var    += (c - calc_mean) * (c - calc_mean);
        meas_calc   += m * c;
        meas_square += m * m;
        calc_square += c * c;
    }
    if n == 0.0 || calc_var <= f64::EPSILON * calc_square { return Err(FitError::Degenerate) }

    let alpha = covariance / calc_var;
    let beta  = meas_mean - alpha * calc_mean;
    let quality = if meas_square == 0.0 { 0.0 }
                  else { (meas_square - alpha * meas_calc - beta * meas_sum) / meas_square };
    Ok(Fit {
        coefficients: FitCoefficients { alpha: alpha as f32, beta: beta as f32 },
        quality: quality as f32,
    })
}

/// Fit, reporting to `log`. Falls back to the identity when the fit is
/// impossible.
pub fn fit_or_identity(measured: &Sinogram, calculated: &Sinogram, log: &mut FullLog) -> std::io::Result<FitCoefficients> {
    writeln!(log, "  - Fitting estimated sinograms with the measured ones (Max in measured sino = {} Max in fwd sino = {})",
             measured.find_max(), calculated.find_max())?;
    match best_fit(measured, calculated) {
        Ok(Fit { coefficients, quality }) => {
            writeln!(log, "  - Calculated fitted coefficients : alpha= {} beta= {} with quality factor= {}",
                     coefficients.alpha, coefficients.beta, quality)?;
            Ok(coefficients)
        }
        Err(e) => {
            warn!("{e}; resorting to no fitting");
            writeln!(log, "  - WARNING: {e}; resorting to no fitting")?;
            Ok(FitCoefficients::default())
        }
    }
}
