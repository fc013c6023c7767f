//! Profile likelihood result containers.
//!
//! A [`ProfilerResult`] is the walked path for one parameter; a
//! [`ProfileResult`] groups them into lists, one slot per full-space
//! parameter, so repeated profiling rounds stay separate.

use serde::{Deserialize, Serialize};

use crate::{
    errors::{FitError, FitResult},
    types::{FnEvalMap, Parameters},
};

// -------------------------------------------------------------------------
// Single parameter path
// -------------------------------------------------------------------------

/// Likelihood profile along one parameter.
///
/// Paths are ordered by the profiled coordinate, ascending; the
/// reference optimum sits somewhere inside. All per-point vectors share
/// one length.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfilerResult {
    /// Full-space points along the path.
    pub x_path: Vec<Parameters>,
    /// Objective value at each point.
    #[serde(with = "crate::result::floats::float_vec")]
    pub fval_path: Vec<f64>,
    /// Likelihood ratio `exp(fval_opt - fval)` at each point.
    #[serde(with = "crate::result::floats::float_vec")]
    pub ratio_path: Vec<f64>,
    /// Free-gradient norm at each point; `NaN` where no gradient exists.
    #[serde(with = "crate::result::floats::float_vec")]
    pub gradnorm_path: Vec<f64>,
    /// Wall-clock seconds spent reoptimizing for each point.
    pub time_path: Vec<f64>,
    /// Objective value of the global optimum the ratios refer to.
    pub global_opt: f64,
    /// Accumulated solver evaluation counters over the whole path.
    pub fn_evals: FnEvalMap,
    /// Total wall-clock seconds for this parameter.
    pub time_total: f64,
}

impl ProfilerResult {
    /// Path holding only the starting optimum (ratio 1 by construction).
    pub fn single_point(x: Parameters, fval: f64, gradnorm: f64, global_opt: f64) -> Self {
        ProfilerResult {
            x_path: vec![x],
            fval_path: vec![fval],
            ratio_path: vec![(global_opt - fval).exp()],
            gradnorm_path: vec![gradnorm],
            time_path: vec![0.0],
            global_opt,
            fn_evals: FnEvalMap::new(),
            time_total: 0.0,
        }
    }

    /// Number of points in the path.
    pub fn len(&self) -> usize {
        self.fval_path.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fval_path.is_empty()
    }

    /// The profiled coordinate along the path.
    pub fn x_profiled(&self, index: usize) -> Vec<f64> {
        self.x_path.iter().map(|x| x[index]).collect()
    }

    /// Append a point on the ascending side of the path.
    pub(crate) fn push_back(&mut self, x: Parameters, fval: f64, gradnorm: f64, time: f64) {
        self.x_path.push(x);
        self.fval_path.push(fval);
        self.ratio_path.push((self.global_opt - fval).exp());
        self.gradnorm_path.push(gradnorm);
        self.time_path.push(time);
    }

    /// Reverse all per-point vectors in place. Used to turn a
    /// descending-side walk into ascending order before merging.
    pub(crate) fn reverse(&mut self) {
        self.x_path.reverse();
        self.fval_path.reverse();
        self.ratio_path.reverse();
        self.gradnorm_path.reverse();
        self.time_path.reverse();
    }

    /// Splice `tail` onto this path, skipping `tail`'s first point
    /// (the shared starting optimum).
    pub(crate) fn extend_skipping_first(&mut self, tail: ProfilerResult) {
        self.x_path.extend(tail.x_path.into_iter().skip(1));
        self.fval_path.extend(tail.fval_path.into_iter().skip(1));
        self.ratio_path.extend(tail.ratio_path.into_iter().skip(1));
        self.gradnorm_path.extend(tail.gradnorm_path.into_iter().skip(1));
        self.time_path.extend(tail.time_path.into_iter().skip(1));
    }
}

// -------------------------------------------------------------------------
// Grouped profiles
// -------------------------------------------------------------------------

/// Profiles grouped into lists.
///
/// Each list holds one optional slot per full-space parameter, filled
/// for whichever indices were profiled in that round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProfileResult {
    list: Vec<Vec<Option<ProfilerResult>>>,
}

impl Default for ProfileResult {
    fn default() -> Self {
        Self::new()
    }
}

impl ProfileResult {
    pub fn new() -> Self {
        ProfileResult { list: Vec::new() }
    }

    /// Append an empty list with `dim_full` slots; returns its index.
    pub fn push_list(&mut self, dim_full: usize) -> usize {
        self.list.push(vec![None; dim_full]);
        self.list.len() - 1
    }

    pub fn n_lists(&self) -> usize {
        self.list.len()
    }

    /// Fill one slot.
    ///
    /// # Errors
    /// - [`FitError::ProfileListMissing`] for an unknown list.
    /// - [`FitError::IndexOutOfRange`] for a parameter index outside the
    ///   list's slots.
    pub fn set(
        &mut self, list_index: usize, param_index: usize, result: ProfilerResult,
    ) -> FitResult<()> {
        let n_lists = self.list.len();
        let slots = self
            .list
            .get_mut(list_index)
            .ok_or(FitError::ProfileListMissing { list_index, n_lists })?;
        let dim = slots.len();
        let slot = slots
            .get_mut(param_index)
            .ok_or(FitError::IndexOutOfRange { index: param_index, dim })?;
        *slot = Some(result);
        Ok(())
    }

    /// Look up one slot; `Ok(None)` for a parameter that was not profiled.
    ///
    /// # Errors
    /// Same lookup errors as [`ProfileResult::set`].
    pub fn get(&self, list_index: usize, param_index: usize) -> FitResult<Option<&ProfilerResult>> {
        let n_lists = self.list.len();
        let slots = self
            .list
            .get(list_index)
            .ok_or(FitError::ProfileListMissing { list_index, n_lists })?;
        slots
            .get(param_index)
            .map(Option::as_ref)
            .ok_or(FitError::IndexOutOfRange { index: param_index, dim: slots.len() })
    }

    /// All slots of one list.
    pub fn profiles(&self, list_index: usize) -> FitResult<&[Option<ProfilerResult>]> {
        let n_lists = self.list.len();
        self.list
            .get(list_index)
            .map(Vec::as_slice)
            .ok_or(FitError::ProfileListMissing { list_index, n_lists })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - Path construction helpers (push, reverse, splice) and ratios.
    // - List slot bookkeeping and its error cases.
    //
    // They intentionally DO NOT cover:
    // - Actual profile walking (profile module tests).
    // -------------------------------------------------------------------------

    #[test]
    // Purpose
    // -------
    // Building a two-sided path from a shared optimum must yield one
    // ascending path with the optimum appearing exactly once.
    //
    // Given
    // -----
    // - Optimum at x=1 with fval 2.0; a downward walk to x=0 and an
    //   upward walk to x=2, both seeded from the optimum.
    //
    // Expect
    // ------
    // - Coordinates [0, 1, 2]; ratio 1 at the optimum and
    //   exp(2 - fval) elsewhere.
    fn two_sided_paths_merge_ascending() {
        // Arrange
        let global_opt = 2.0;
        let mut down = ProfilerResult::single_point(array![1.0, 5.0], 2.0, 0.0, global_opt);
        down.push_back(array![0.0, 5.5], 3.0, 0.1, 0.2);
        let mut up = ProfilerResult::single_point(array![1.0, 5.0], 2.0, 0.0, global_opt);
        up.push_back(array![2.0, 4.5], 2.5, 0.1, 0.2);

        // Act
        down.reverse();
        down.extend_skipping_first(up);

        // Assert
        assert_eq!(down.x_profiled(0), vec![0.0, 1.0, 2.0]);
        assert_eq!(down.len(), 3);
        assert_relative_eq!(down.ratio_path[1], 1.0);
        assert_relative_eq!(down.ratio_path[0], (-1.0_f64).exp());
        assert_relative_eq!(down.ratio_path[2], (-0.5_f64).exp());
    }

    #[test]
    // Purpose
    // -------
    // Slot bookkeeping must address profiles by (list, parameter) and
    // reject unknown coordinates.
    //
    // Given
    // -----
    // - One list over 3 parameters with parameter 2 profiled.
    //
    // Expect
    // ------
    // - get(0, 2) returns the profile, get(0, 0) returns None, and
    //   unknown list/parameter indices error.
    fn slots_are_addressed_by_list_and_parameter() {
        // Arrange
        let mut profiles = ProfileResult::new();
        let list_index = profiles.push_list(3);
        let path = ProfilerResult::single_point(array![0.0, 0.0, 0.0], 1.0, 0.0, 1.0);

        // Act
        profiles.set(list_index, 2, path).expect("valid slot");

        // Assert
        assert_eq!(profiles.n_lists(), 1);
        assert!(profiles.get(0, 2).expect("valid lookup").is_some());
        assert!(profiles.get(0, 0).expect("valid lookup").is_none());
        assert_eq!(
            profiles.get(1, 0),
            Err(FitError::ProfileListMissing { list_index: 1, n_lists: 1 })
        );
        assert_eq!(profiles.get(0, 3), Err(FitError::IndexOutOfRange { index: 3, dim: 3 }));
    }
}
