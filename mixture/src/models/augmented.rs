//! Scalar observations where some entries are missing. Missing entries hold
//! an imputed value that is refreshed between iterations.
use crate::error::{MixtureError, Result};
use rand::Rng;

#[derive(Debug, Clone)]
pub struct AugmentedData {
    values: Vec<f64>,
    /// Indices of the missing entries, in increasing order.
    missing: Vec<usize>,
    is_missing: Vec<bool>,
    /// Range of the observed entries.
    min: f64,
    max: f64,
}

impl AugmentedData {
    /// Every observed value must satisfy `is_valid`.
    /// At least one value should be observed, as it gives the range of the initial imputation.
    pub fn new<F: Fn(f64) -> bool>(name: &str, data: &[Option<f64>], is_valid: F) -> Result<Self> {
        if let Some(x) = data.iter().flatten().find(|&&x| !is_valid(x)) {
            return Err(MixtureError::Configuration(format!(
                "{}: {} is not a valid value",
                name, x
            )));
        }
        let observed = data.iter().flatten().copied();
        let min = observed.clone().fold(f64::INFINITY, f64::min);
        let max = observed.fold(f64::NEG_INFINITY, f64::max);
        if !data.is_empty() && !(min <= max) {
            return Err(MixtureError::Configuration(format!(
                "{}: every value is missing",
                name
            )));
        }
        let values: Vec<_> = data.iter().map(|x| x.unwrap_or(min)).collect();
        let is_missing: Vec<_> = data.iter().map(|x| x.is_none()).collect();
        let missing = (0..data.len()).filter(|&i| is_missing[i]).collect();
        Ok(Self {
            values,
            missing,
            is_missing,
            min,
            max,
        })
    }
    pub fn len(&self) -> usize {
        self.values.len()
    }
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
    /// Observed values, with the current imputation at the missing entries.
    pub fn values(&self) -> &[f64] {
        &self.values
    }
    pub fn missing(&self) -> &[usize] {
        &self.missing
    }
    pub fn is_missing(&self, i: usize) -> bool {
        self.is_missing[i]
    }
    /// Overwrite a missing entry. Observed entries never change.
    pub fn impute(&mut self, i: usize, x: f64) {
        assert!(self.is_missing[i], "{} is observed", i);
        self.values[i] = x;
    }
    /// Draw every missing entry uniformly from the observed range.
    pub fn remove_missing<R: Rng>(&mut self, rng: &mut R) {
        for &i in self.missing.iter() {
            self.values[i] = if self.min < self.max {
                rng.gen_range(self.min..=self.max)
            } else {
                self.min
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256StarStar;
    #[test]
    fn remove_missing() {
        let mut rng: Xoshiro256StarStar = SeedableRng::seed_from_u64(4);
        let data = vec![Some(1f64), None, Some(3f64), None];
        let mut aug = AugmentedData::new("x", &data, f64::is_finite).unwrap();
        assert_eq!(aug.missing(), &[1, 3]);
        assert!(aug.is_missing(1) && !aug.is_missing(0));
        for _ in 0..20 {
            aug.remove_missing(&mut rng);
            assert_eq!(aug.values()[0], 1f64);
            assert_eq!(aug.values()[2], 3f64);
            assert!(aug.missing().iter().all(|&i| (1f64..=3f64).contains(&aug.values()[i])));
        }
        aug.impute(3, 10f64);
        assert_eq!(aug.values()[3], 10f64);
    }
    #[test]
    fn invalid() {
        assert!(AugmentedData::new("x", &[None, None], f64::is_finite).is_err());
        assert!(AugmentedData::new("x", &[Some(f64::NAN)], f64::is_finite).is_err());
        assert!(AugmentedData::new("x", &[Some(-1f64)], |x| 0f64 < x).is_err());
        let aug = AugmentedData::new("x", &[Some(2f64), None], f64::is_finite).unwrap();
        assert_eq!(aug.values(), &[2f64, 2f64]);
    }
}
