//! Functional data: each individual is a curve explained by a segmented
//! polynomial regression whose segments switch with logistic weights.
pub mod class;
pub mod computation;
pub mod curve;
pub use class::FunctionalClass;
pub use curve::Curve;

use crate::error::{MixtureError, Result};
use crate::models::MixtureModel;
use crate::optimizer::Lbfgs;
use definitions::Parameters;
use rand::Rng;
use rayon::prelude::*;

#[derive(Debug, Clone)]
pub struct FunctionalMixture {
    name: String,
    curves: Vec<Curve>,
    classes: Vec<FunctionalClass>,
    optimizer: Lbfgs,
}

impl FunctionalMixture {
    pub fn new(
        name: &str,
        curves: &[definitions::Curve],
        cluster_num: usize,
        sub_num: usize,
        coeff_num: usize,
        optimizer: Lbfgs,
    ) -> Result<Self> {
        if sub_num == 0 || coeff_num == 0 {
            return Err(MixtureError::Configuration(format!(
                "{}: nSub and nCoeff should be positive",
                name
            )));
        }
        if let Some(i) = curves.iter().position(|c| c.is_empty()) {
            debug!("FUNC\t{}\tEmptyCurve\t{}", name, i);
            return Err(MixtureError::EmptyCurve);
        }
        let curves = curves
            .iter()
            .map(|c| Curve::from_definition(c, sub_num, coeff_num))
            .collect::<Result<Vec<_>>>()?;
        let classes = vec![FunctionalClass::new(sub_num, coeff_num); cluster_num];
        Ok(Self {
            name: name.to_string(),
            curves,
            classes,
            optimizer,
        })
    }
    pub fn curves(&self) -> &[Curve] {
        &self.curves
    }
    pub fn curves_mut(&mut self) -> &mut [Curve] {
        &mut self.curves
    }
    pub fn classes(&self) -> &[FunctionalClass] {
        &self.classes
    }
    pub fn sub_num(&self) -> usize {
        self.classes.first().map(|c| c.sub_num()).unwrap_or(0)
    }
    /// Quantile breaks of the pooled times of every curve.
    pub fn global_quantile_breaks(&self) -> Result<Vec<f64>> {
        let times: Vec<f64> = self
            .curves
            .iter()
            .flat_map(|c| c.times().iter().copied())
            .collect();
        computation::quantile_breaks(&times, self.sub_num())
    }
}

impl MixtureModel for FunctionalMixture {
    fn name(&self) -> &str {
        &self.name
    }
    fn individual_num(&self) -> usize {
        self.curves.len()
    }
    fn cluster_num(&self) -> usize {
        self.classes.len()
    }
    fn free_parameter_num(&self) -> usize {
        self.classes.iter().map(|c| c.free_parameter_num()).sum()
    }
    fn ln_observed_probability(&self, i: usize, k: usize) -> f64 {
        self.classes[k].ln_observed_probability(&self.curves[i])
    }
    fn ln_completed_probability(&self, i: usize, k: usize) -> f64 {
        self.classes[k].ln_completed_probability(&self.curves[i])
    }
    fn initialize_latent<R: Rng>(&mut self, rng: &mut R) -> Result<()> {
        let breaks = self.global_quantile_breaks()?;
        trace!("FUNC\t{}\tBreaks\t{:?}", self.name, breaks);
        for curve in self.curves.iter_mut() {
            curve.impute_by_quantile_mixing(&breaks, rng)?;
        }
        Ok(())
    }
    fn sampling_step<R: Rng>(&mut self, labels: &[usize], rng: &mut R) -> Result<()> {
        assert_eq!(labels.len(), self.curves.len());
        for (curve, &k) in self.curves.iter_mut().zip(labels.iter()) {
            let class = &self.classes[k];
            curve.sample_segments(class.alpha(), class.beta(), class.sd(), rng)?;
        }
        Ok(())
    }
    fn imputation_step(&mut self, labels: &[usize]) -> Result<()> {
        assert_eq!(labels.len(), self.curves.len());
        let classes = &self.classes;
        self.curves
            .par_iter_mut()
            .zip(labels.par_iter())
            .try_for_each(|(curve, &k)| {
                let class = &classes[k];
                curve.impute_map(class.alpha(), class.beta(), class.sd())
            })
    }
    fn m_step(&mut self, posterior: &[Vec<f64>]) -> Result<()> {
        assert_eq!(posterior.len(), self.curves.len());
        let curves = &self.curves;
        let optimizer = &self.optimizer;
        self.classes
            .par_iter_mut()
            .enumerate()
            .try_for_each(|(k, class)| {
                let weights: Vec<_> = posterior.iter().map(|row| row[k]).collect();
                class.m_step(curves, &weights, optimizer)
            })?;
        for (k, class) in self.classes.iter().enumerate() {
            trace!("FUNC\t{}\t{}\t{:?}", self.name, k, class.parameters());
        }
        Ok(())
    }
    fn parameters(&self) -> Parameters {
        Parameters::Functional {
            classes: self.classes.iter().map(|c| c.parameters()).collect(),
        }
    }
    fn parameter_vector(&self) -> Vec<f64> {
        self.classes.iter().flat_map(|c| c.to_vector()).collect()
    }
    fn parameter_names(&self) -> Vec<String> {
        self.classes
            .iter()
            .enumerate()
            .flat_map(|(k, c)| c.vector_names().into_iter().map(move |n| format!("k: {k}, {n}")))
            .collect()
    }
    fn set_parameter_vector(&mut self, params: &[f64]) -> Result<()> {
        let len: usize = self.classes.iter().map(|c| c.to_vector().len()).sum();
        if params.len() != len {
            return Err(MixtureError::Configuration(format!(
                "{}: {} values for {} parameters",
                self.name,
                params.len(),
                len
            )));
        }
        let mut start = 0;
        for class in self.classes.iter_mut() {
            let end = start + class.to_vector().len();
            class.set_from_vector(&params[start..end])?;
            start = end;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256StarStar;
    #[test]
    fn construction() {
        let curve = definitions::Curve::new(vec![0f64, 1f64, 2f64], vec![0f64, 1f64, 2f64]);
        let model = FunctionalMixture::new("f", &[curve.clone(), curve], 3, 2, 2, Lbfgs::default()).unwrap();
        assert_eq!(model.individual_num(), 2);
        assert_eq!(model.cluster_num(), 3);
        assert_eq!(model.free_parameter_num(), 3 * (2 + 4 + 2));
        let empty = definitions::Curve::default();
        assert!(matches!(
            FunctionalMixture::new("f", &[empty], 1, 2, 2, Lbfgs::default()),
            Err(MixtureError::EmptyCurve)
        ));
    }
    #[test]
    fn global_breaks_and_initialization() {
        let mut rng: Xoshiro256StarStar = SeedableRng::seed_from_u64(3);
        let c1 = definitions::Curve::new(vec![0f64, 2f64, 4f64], vec![0f64; 3]);
        let c2 = definitions::Curve::new(vec![1f64, 3f64, 5f64], vec![0f64; 3]);
        let mut model = FunctionalMixture::new("f", &[c1, c2], 2, 2, 2, Lbfgs::default()).unwrap();
        let breaks = model.global_quantile_breaks().unwrap();
        // Pooled times are 0..=5, the median index is 5 * 1 / 2 = 2.
        assert_eq!(breaks, vec![0f64, 2f64, 5f64]);
        model.initialize_latent(&mut rng).unwrap();
        for curve in model.curves() {
            let total: usize = curve.segments().iter().map(|s| s.len()).sum();
            assert_eq!(total, 3);
        }
        assert_eq!(model.curves()[0].labels()[0], 0);
        assert_eq!(model.curves()[1].labels()[2], 1);
    }
    #[test]
    fn parameter_vector() {
        let curve = definitions::Curve::new(vec![0f64, 1f64, 2f64], vec![0f64, 1f64, 2f64]);
        let mut model = FunctionalMixture::new("f", &[curve], 2, 2, 2, Lbfgs::default()).unwrap();
        let mut params = model.parameter_vector();
        assert_eq!(params.len(), 2 * (2 + 4 + 2));
        assert_eq!(model.parameter_names().len(), params.len());
        assert_eq!(model.parameter_names()[8], "k: 1, s: 1, alpha0");
        // Second cluster, second regression coefficient of the first segment.
        params[8 + 3] = 7f64;
        model.set_parameter_vector(&params).unwrap();
        assert_eq!(model.classes()[1].beta()[(0, 1)], 7f64);
        assert_eq!(model.classes()[0].beta()[(0, 1)], 0f64);
        assert!(model.set_parameter_vector(&params[1..]).is_err());
    }
}
