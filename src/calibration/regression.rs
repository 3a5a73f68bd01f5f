//! Linear regression from measured to reference colors.

use nalgebra::{Matrix3, Vector3};
use tracing::{debug, instrument};

use crate::image_pipeline::common::error::{CalibrationError, Result};

/// Finds `M` minimizing the squared error of `M * input - output`.
pub trait RegressionSolver: Send + Sync {
    fn solve(&self, inputs: &[Vector3<f32>], outputs: &[Vector3<f32>]) -> Result<Matrix3<f32>>;
}

impl<S: RegressionSolver + ?Sized> RegressionSolver for &S {
    fn solve(&self, inputs: &[Vector3<f32>], outputs: &[Vector3<f32>]) -> Result<Matrix3<f32>> {
        (**self).solve(inputs, outputs)
    }
}

fn check_samples(inputs: &[Vector3<f32>], outputs: &[Vector3<f32>]) -> Result<()> {
    if inputs.is_empty() || inputs.len() != outputs.len() {
        return Err(CalibrationError::Regression(format!(
            "need matching non-empty samples, got {} inputs and {} outputs",
            inputs.len(),
            outputs.len()
        )));
    }
    Ok(())
}

/// Mean squared error of a candidate matrix over the samples.
pub fn mean_squared_error(m: &Matrix3<f64>, inputs: &[Vector3<f64>], outputs: &[Vector3<f64>]) -> f64 {
    let total: f64 = inputs
        .iter()
        .zip(outputs)
        .map(|(x, y)| (m * x - y).norm_squared())
        .sum();
    total / inputs.len() as f64
}

/// Batch gradient descent on the mean squared error, starting from the
/// identity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GradientDescentSolver {
    pub iterations: usize,
    pub step_size: f32,
}

impl Default for GradientDescentSolver {
    fn default() -> Self {
        Self {
            iterations: 100_000,
            step_size: 0.1,
        }
    }
}

impl GradientDescentSolver {
    pub fn new(iterations: usize, step_size: f32) -> Self {
        Self { iterations, step_size }
    }
}

impl RegressionSolver for GradientDescentSolver {
    #[instrument(skip_all, fields(samples = inputs.len(), iterations = self.iterations))]
    fn solve(&self, inputs: &[Vector3<f32>], outputs: &[Vector3<f32>]) -> Result<Matrix3<f32>> {
        check_samples(inputs, outputs)?;
        let xs: Vec<Vector3<f64>> = inputs.iter().map(|v| v.cast()).collect();
        let ys: Vec<Vector3<f64>> = outputs.iter().map(|v| v.cast()).collect();
        let scale = 2.0 / xs.len() as f64;
        let step = self.step_size as f64;

        let mut m = Matrix3::<f64>::identity();
        for _ in 0..self.iterations {
            let mut gradient = Matrix3::<f64>::zeros();
            for (x, y) in xs.iter().zip(&ys) {
                gradient += (m * x - y) * x.transpose();
            }
            m -= gradient * (scale * step);
        }

        if !m.iter().all(|v| v.is_finite()) {
            return Err(CalibrationError::Regression(format!(
                "gradient descent diverged with step size {}",
                self.step_size
            )));
        }
        debug!("Regression objective: {:.6}", mean_squared_error(&m, &xs, &ys));
        Ok(m.cast())
    }
}

/// Closed-form normal equation solution.
#[derive(Debug, Clone, Copy, Default)]
pub struct LeastSquaresSolver;

impl RegressionSolver for LeastSquaresSolver {
    fn solve(&self, inputs: &[Vector3<f32>], outputs: &[Vector3<f32>]) -> Result<Matrix3<f32>> {
        check_samples(inputs, outputs)?;
        let mut xtx = Matrix3::<f64>::zeros();
        let mut ytx = Matrix3::<f64>::zeros();
        for (x, y) in inputs.iter().zip(outputs) {
            let (x, y): (Vector3<f64>, Vector3<f64>) = (x.cast(), y.cast());
            xtx += x * x.transpose();
            ytx += y * x.transpose();
        }
        let inverse = xtx
            .try_inverse()
            .ok_or_else(|| CalibrationError::Regression("input colors are linearly dependent".into()))?;
        Ok((ytx * inverse).cast())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn samples(truth: &Matrix3<f32>) -> (Vec<Vector3<f32>>, Vec<Vector3<f32>>) {
        let inputs: Vec<Vector3<f32>> = vec![
            Vector3::new(0.9, 0.1, 0.1),
            Vector3::new(0.1, 0.8, 0.2),
            Vector3::new(0.2, 0.1, 0.7),
            Vector3::new(0.5, 0.5, 0.5),
            Vector3::new(0.3, 0.6, 0.1),
            Vector3::new(0.7, 0.2, 0.4),
        ];
        let outputs = inputs.iter().map(|x| truth * x).collect();
        (inputs, outputs)
    }

    fn truth() -> Matrix3<f32> {
        Matrix3::new(1.2, -0.1, -0.1, -0.05, 1.1, -0.05, 0.0, -0.2, 1.2)
    }

    #[test]
    fn test_least_squares_recovers_exact_matrix() {
        let (inputs, outputs) = samples(&truth());
        let m = LeastSquaresSolver.solve(&inputs, &outputs).unwrap();
        assert!((m - truth()).abs().max() < 1e-4, "{}", m);
    }

    #[test]
    fn test_gradient_descent_converges() {
        let (inputs, outputs) = samples(&truth());
        let m = GradientDescentSolver::new(20_000, 0.5).solve(&inputs, &outputs).unwrap();
        assert!((m - truth()).abs().max() < 1e-2, "{}", m);
    }

    #[test]
    fn test_zero_iterations_is_identity() {
        let (inputs, outputs) = samples(&truth());
        let m = GradientDescentSolver::new(0, 0.1).solve(&inputs, &outputs).unwrap();
        assert_eq!(m, Matrix3::identity());
    }

    #[test]
    fn test_mismatched_samples() {
        let result = LeastSquaresSolver.solve(&[Vector3::zeros()], &[]);
        assert!(matches!(result, Err(CalibrationError::Regression(_))));
    }

    #[test]
    fn test_degenerate_inputs() {
        let inputs = vec![Vector3::new(0.5, 0.5, 0.5); 4];
        let result = LeastSquaresSolver.solve(&inputs, &inputs);
        assert!(matches!(result, Err(CalibrationError::Regression(_))));
    }
}
