//! startpoint — start point generation for multi-start optimization.
//!
//! Purpose
//! -------
//! Draw sets of free-space start points from the box `[lb_free, ub_free]`
//! of a [`Problem`], either iid uniform or Latin-hypercube stratified,
//! optionally rejecting points where the objective is non-finite.
//!
//! Key behaviors
//! -------------
//! - All methods work in free space and take the RNG by reference, so a
//!   run seeded once draws every start reproducibly.
//! - Sampling requires finite bounds on every free coordinate and
//!   reports the offending full-space index otherwise.
//! - [`CheckedStartpoints`] resamples non-finite draws round by round
//!   through its base method, with a bounded retry budget.
//!
//! Downstream usage
//! ----------------
//! - `optimize::minimize` consumes `problem.x_guesses()` first and fills
//!   the remainder from a `StartpointMethod`.
use rand::{rngs::StdRng, seq::SliceRandom, Rng};

use crate::{
    errors::{FitError, FitResult},
    problem::Problem,
    types::Parameters,
};

/// Draws `n` free-space start points for `problem`.
pub trait StartpointMethod: Send + Sync {
    fn starts(&self, n: usize, problem: &Problem, rng: &mut StdRng)
        -> FitResult<Vec<Parameters>>;
}

/// Bounds of the free coordinates, checked finite; errors carry the
/// full-space index.
fn finite_free_bounds(problem: &Problem) -> FitResult<(Parameters, Parameters)> {
    let lb = problem.lb_free();
    let ub = problem.ub_free();
    let free = problem.x_free_indices();
    for (pos, &full_index) in free.iter().enumerate() {
        if !lb[pos].is_finite() || !ub[pos].is_finite() {
            return Err(FitError::NonFiniteBounds { index: full_index });
        }
    }
    Ok((lb, ub))
}

/// Independent uniform draws inside the free bounds.
#[derive(Debug, Clone, Copy, Default)]
pub struct UniformStartpoints;

impl StartpointMethod for UniformStartpoints {
    fn starts(
        &self, n: usize, problem: &Problem, rng: &mut StdRng,
    ) -> FitResult<Vec<Parameters>> {
        let (lb, ub) = finite_free_bounds(problem)?;
        let dim = lb.len();
        let mut points = Vec::with_capacity(n);
        for _ in 0..n {
            let mut x = Parameters::zeros(dim);
            for i in 0..dim {
                x[i] = lb[i] + rng.gen::<f64>() * (ub[i] - lb[i]);
            }
            points.push(x);
        }
        Ok(points)
    }
}

/// Latin-hypercube draws: one stratum per start and dimension, strata
/// permuted independently per dimension.
#[derive(Debug, Clone, Copy)]
pub struct LatinHypercubeStartpoints {
    /// Uniform within each stratum when true, stratum centers otherwise.
    pub smooth: bool,
}

impl Default for LatinHypercubeStartpoints {
    fn default() -> Self {
        Self { smooth: true }
    }
}

impl StartpointMethod for LatinHypercubeStartpoints {
    fn starts(
        &self, n: usize, problem: &Problem, rng: &mut StdRng,
    ) -> FitResult<Vec<Parameters>> {
        let (lb, ub) = finite_free_bounds(problem)?;
        let dim = lb.len();
        let mut points = vec![Parameters::zeros(dim); n];
        let mut strata: Vec<usize> = (0..n).collect();
        for i in 0..dim {
            strata.shuffle(rng);
            for (k, point) in points.iter_mut().enumerate() {
                let offset = if self.smooth { rng.gen::<f64>() } else { 0.5 };
                let fraction = (strata[k] as f64 + offset) / n as f64;
                point[i] = lb[i] + fraction * (ub[i] - lb[i]);
            }
        }
        Ok(points)
    }
}

/// Wraps a base method and resamples draws whose objective value (and
/// gradient, when enabled) is non-finite.
#[derive(Debug, Clone)]
pub struct CheckedStartpoints<B: StartpointMethod> {
    base: B,
    check_grad: bool,
    max_resample: usize,
}

impl<B: StartpointMethod> CheckedStartpoints<B> {
    pub fn new(base: B) -> Self {
        Self { base, check_grad: false, max_resample: 10 }
    }

    /// Also require a finite gradient (only when the objective provides
    /// one).
    pub fn with_check_grad(mut self, check_grad: bool) -> Self {
        self.check_grad = check_grad;
        self
    }

    /// Number of resampling rounds after the initial draw.
    pub fn with_max_resample(mut self, max_resample: usize) -> Self {
        self.max_resample = max_resample;
        self
    }

    fn is_admissible(&self, problem: &Problem, x: &Parameters) -> bool {
        let value_ok = matches!(problem.value_free(x), Ok(v) if v.is_finite());
        if !value_ok {
            return false;
        }
        if self.check_grad && problem.objective().provides_grad() {
            return matches!(problem.grad_free(x), Ok(g) if g.iter().all(|v| v.is_finite()));
        }
        true
    }
}

impl<B: StartpointMethod> StartpointMethod for CheckedStartpoints<B> {
    fn starts(
        &self, n: usize, problem: &Problem, rng: &mut StdRng,
    ) -> FitResult<Vec<Parameters>> {
        let mut accepted = Vec::with_capacity(n);
        let mut tried = 0;
        for round in 0..=self.max_resample {
            let missing = n - accepted.len();
            if missing == 0 {
                break;
            }
            let draws = self.base.starts(missing, problem, rng)?;
            tried += draws.len();
            accepted.extend(draws.into_iter().filter(|x| self.is_admissible(problem, x)));
            if round == self.max_resample && accepted.len() < n {
                return Err(FitError::StartpointsExhausted { requested: n, tried });
            }
        }
        Ok(accepted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objective::FnObjective;
    use approx::assert_relative_eq;
    use ndarray::array;
    use rand::SeedableRng;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - Uniform draws inside the box, seeded reproducibility, and the
    //   finite-bounds requirement.
    // - Latin-hypercube stratification, smooth and centered.
    // - Checked resampling and budget exhaustion.
    //
    // They intentionally DO NOT cover:
    // - Consumption of x_guesses (optimize module tests).
    // -------------------------------------------------------------------------

    fn box_problem(lb: Parameters, ub: Parameters) -> Problem {
        let dim = lb.len();
        Problem::new(FnObjective::new(dim, |x: &Parameters| x.sum()), lb, ub)
            .expect("valid problem")
    }

    #[test]
    // Purpose
    // -------
    // Uniform draws must stay inside the box and reproduce under the
    // same seed.
    //
    // Given
    // -----
    // - The box [-2, 3] x [0, 1], 20 starts, two RNGs with seed 7.
    //
    // Expect
    // ------
    // - Every coordinate within its bounds; identical points per seed.
    fn uniform_draws_are_bounded_and_reproducible() {
        // Arrange
        let problem = box_problem(array![-2.0, 0.0], array![3.0, 1.0]);
        let mut rng_a = StdRng::seed_from_u64(7);
        let mut rng_b = StdRng::seed_from_u64(7);

        // Act
        let starts_a =
            UniformStartpoints.starts(20, &problem, &mut rng_a).expect("uniform draws");
        let starts_b =
            UniformStartpoints.starts(20, &problem, &mut rng_b).expect("uniform draws");

        // Assert
        for x in &starts_a {
            assert!(-2.0 <= x[0] && x[0] <= 3.0);
            assert!(0.0 <= x[1] && x[1] <= 1.0);
        }
        for (a, b) in starts_a.iter().zip(&starts_b) {
            assert_relative_eq!(a[0], b[0], epsilon = 0.0);
            assert_relative_eq!(a[1], b[1], epsilon = 0.0);
        }
    }

    #[test]
    // Purpose
    // -------
    // Sampling from an unbounded coordinate must fail with the
    // full-space index.
    //
    // Given
    // -----
    // - Upper bound +inf at index 1.
    //
    // Expect
    // ------
    // - NonFiniteBounds { index: 1 }.
    fn infinite_bound_is_rejected() {
        // Arrange
        let problem = box_problem(array![0.0, 0.0], array![1.0, f64::INFINITY]);
        let mut rng = StdRng::seed_from_u64(0);

        // Act
        let err = UniformStartpoints
            .starts(3, &problem, &mut rng)
            .expect_err("sampling an unbounded coordinate must fail");

        // Assert
        assert_eq!(err, FitError::NonFiniteBounds { index: 1 });
    }

    #[test]
    // Purpose
    // -------
    // Latin hypercube must place exactly one point per stratum, and the
    // non-smooth variant must hit the stratum centers.
    //
    // Given
    // -----
    // - Four starts on [0, 4], smooth and centered.
    //
    // Expect
    // ------
    // - Smooth: one point in each unit interval. Centered: the set
    //   {0.5, 1.5, 2.5, 3.5}.
    fn latin_hypercube_stratifies() {
        // Arrange
        let problem = box_problem(array![0.0], array![4.0]);
        let mut rng = StdRng::seed_from_u64(42);

        // Act
        let smooth = LatinHypercubeStartpoints { smooth: true }
            .starts(4, &problem, &mut rng)
            .expect("smooth LHS draws");
        let centered = LatinHypercubeStartpoints { smooth: false }
            .starts(4, &problem, &mut rng)
            .expect("centered LHS draws");

        // Assert
        let mut hit = [false; 4];
        for x in &smooth {
            let stratum = x[0].floor() as usize;
            assert!(!hit[stratum], "stratum {stratum} hit twice");
            hit[stratum] = true;
        }
        let mut centers: Vec<f64> = centered.iter().map(|x| x[0]).collect();
        centers.sort_by(f64::total_cmp);
        for (center, expected) in centers.iter().zip([0.5, 1.5, 2.5, 3.5]) {
            assert_relative_eq!(*center, expected, epsilon = 1e-12);
        }
    }

    #[test]
    // Purpose
    // -------
    // Checked sampling must resample non-finite draws and keep only
    // admissible points.
    //
    // Given
    // -----
    // - An objective that is +inf for x < 0 on the box [-1, 1].
    //
    // Expect
    // ------
    // - All returned starts lie in [0, 1].
    fn checked_sampling_resamples_bad_points() {
        // Arrange
        let objective = FnObjective::new(1, |x: &Parameters| {
            if x[0] < 0.0 {
                f64::INFINITY
            } else {
                x[0]
            }
        });
        let problem =
            Problem::new(objective, array![-1.0], array![1.0]).expect("valid problem");
        let method = CheckedStartpoints::new(UniformStartpoints).with_max_resample(100);
        let mut rng = StdRng::seed_from_u64(3);

        // Act
        let starts = method.starts(5, &problem, &mut rng).expect("checked draws");

        // Assert
        assert_eq!(starts.len(), 5);
        for x in &starts {
            assert!(x[0] >= 0.0, "inadmissible start {} survived", x[0]);
        }
    }

    #[test]
    // Purpose
    // -------
    // An objective that is nowhere finite must exhaust the retry budget.
    //
    // Given
    // -----
    // - A constant +inf objective and a budget of 2 resampling rounds.
    //
    // Expect
    // ------
    // - StartpointsExhausted reporting the requested count.
    fn hopeless_objective_exhausts_budget() {
        // Arrange
        let problem = Problem::new(
            FnObjective::new(1, |_x: &Parameters| f64::INFINITY),
            array![-1.0],
            array![1.0],
        )
        .expect("valid problem");
        let method = CheckedStartpoints::new(UniformStartpoints).with_max_resample(2);
        let mut rng = StdRng::seed_from_u64(0);

        // Act
        let err = method.starts(4, &problem, &mut rng).expect_err("budget must run out");

        // Assert
        assert_eq!(err, FitError::StartpointsExhausted { requested: 4, tried: 12 });
    }
}
