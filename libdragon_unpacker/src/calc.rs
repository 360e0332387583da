//! Derivations over optional values.
//!
//! Every function here treats `None` as "no data" and never computes on it. Values
//! that fall out of range of a calibration (e.g. below pedestal) become `None`.
use std::cmp::Ordering;

use super::module::ModuleRecord;
use super::variables::AdcVariables;

/// Later time minus earlier time, if both are present
pub fn calculate_tof(later: Option<f64>, earlier: Option<f64>) -> Option<f64> {
    Some(later? - earlier?)
}

/// Sum of all values; None if any value is missing
pub fn calculate_sum(values: &[Option<f64>]) -> Option<f64> {
    values.iter().copied().sum()
}

/// Sum of the values that are present; None if none are present
pub fn sum_valid(values: &[Option<f64>]) -> Option<f64> {
    values
        .iter()
        .flatten()
        .fold(None, |sum, v| Some(sum.unwrap_or(0.0) + v))
}

/// Index and value of the largest present value
pub fn max_valid(values: &[Option<f64>]) -> Option<(usize, f64)> {
    values
        .iter()
        .enumerate()
        .filter_map(|(idx, v)| v.map(|v| (idx, v)))
        .fold(None, |best, (idx, v)| match best {
            Some((_, b)) if b >= v => best,
            _ => Some((idx, v)),
        })
}

/// Ordering that sorts present values in descending order and missing values last
pub fn greater_and_valid(lhs: &Option<f64>, rhs: &Option<f64>) -> Ordering {
    match (lhs, rhs) {
        (Some(l), Some(r)) => r.total_cmp(l),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Sort in descending order, missing values last
pub fn sort_valid_descending(values: &mut [Option<f64>]) {
    values.sort_by(greater_and_valid);
}

/// Gather raw samples from a set of modules into detector order.
///
/// Entry `i` of the output comes from `modules[variables.module[i]]`, channel
/// `variables.channel[i]`. Unmapped or missing channels are None.
pub fn channel_map(modules: &[ModuleRecord], variables: &AdcVariables) -> Vec<Option<f64>> {
    variables
        .module
        .iter()
        .zip(variables.channel.iter())
        .map(|(m, ch)| {
            modules
                .get(*m)
                .and_then(|module| module.get(*ch))
                .map(f64::from)
        })
        .collect()
}

/// Values below their channel's pedestal become None
pub fn pedestal_subtract(values: &mut [Option<f64>], variables: &AdcVariables) {
    for (value, pedestal) in values.iter_mut().zip(variables.pedestal.iter()) {
        if value.is_some_and(|v| v < *pedestal as f64) {
            *value = None;
        }
    }
}

/// new = offset + slope * old
pub fn linear_calibrate(values: &mut [Option<f64>], variables: &AdcVariables) {
    for (idx, value) in values.iter_mut().enumerate() {
        if let (Some(v), Some(slope), Some(offset)) = (
            value.as_mut(),
            variables.slope.get(idx),
            variables.offset.get(idx),
        ) {
            *v = offset + *v * slope;
        }
    }
}

/// new = offset + slope * old + slope2 * old^2
pub fn quadratic_calibrate(
    values: &mut [Option<f64>],
    offset: &[f64],
    slope: &[f64],
    slope2: &[f64],
) {
    for (idx, value) in values.iter_mut().enumerate() {
        if let (Some(v), Some(a), Some(b), Some(c)) =
            (value.as_mut(), offset.get(idx), slope.get(idx), slope2.get(idx))
        {
            *v = a + b * *v + c * v.powi(2);
        }
    }
}

/// new = sum over j of coeff[j] * old^j, for a single value
pub fn polynomial_calibrate(value: Option<f64>, coeff: &[f64]) -> Option<f64> {
    let v = value?;
    Some(
        coeff
            .iter()
            .rev()
            .fold(0.0, |acc, c| acc * v + c),
    )
}
