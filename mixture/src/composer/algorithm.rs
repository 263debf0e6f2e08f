use super::{ComposerState, MixtureComposer};
use crate::config::AlgorithmKind;
use crate::error::{MixtureError, Result};
use rand::Rng;

/// One of EM, CEM, or SEM with its stopping rule.
#[derive(Debug, Clone, Copy)]
pub struct Algorithm {
    pub kind: AlgorithmKind,
    pub iter_max: usize,
    pub epsilon: f64,
}

impl Algorithm {
    pub fn new(kind: AlgorithmKind, iter_max: usize, epsilon: f64) -> Self {
        Self {
            kind,
            iter_max,
            epsilon,
        }
    }
    /// A cluster with fewer individuals than this is considered empty.
    pub fn threshold(individual_num: usize) -> f64 {
        (0.03 * individual_num as f64).min(10f64)
    }
    /// Run until the stopping rule holds. EM and CEM keep their final estimate
    /// as the only parameter sample. SEM samples every iteration and ends at
    /// the median of its samples.
    pub fn run<R: Rng>(&self, composer: &mut MixtureComposer, rng: &mut R) -> Result<()> {
        composer.set_state(ComposerState::Running);
        composer.clear_parameter_samples();
        let result = match self.kind {
            AlgorithmKind::Em => self.run_em(composer).map(|_| composer.sample_parameters()),
            AlgorithmKind::Cem => self.run_cem(composer).map(|_| composer.sample_parameters()),
            AlgorithmKind::Sem => self
                .run_sem(composer, rng)
                .and_then(|_| composer.set_expectation_parameters()),
        };
        match result {
            Ok(_) => composer.set_state(ComposerState::Converged),
            Err(_) => composer.set_state(ComposerState::Failed),
        }
        result
    }
    fn failure(&self, step: usize, count: f64) -> MixtureError {
        debug!("{}\tFailed\t{}\t{:.3}", self.kind, step, count);
        MixtureError::AlgorithmFailure {
            algo: match self.kind {
                AlgorithmKind::Em => "EM",
                AlgorithmKind::Cem => "CEM",
                AlgorithmKind::Sem => "SEM",
            },
            step,
            count,
        }
    }
    fn run_em(&self, composer: &mut MixtureComposer) -> Result<()> {
        let threshold = Self::threshold(composer.individual_num());
        let mut current = composer.ln_likelihood();
        for iter in 0..self.iter_max {
            composer.imputation_step()?;
            composer.m_step()?;
            let min_count = composer.e_step();
            if min_count < threshold {
                return Err(self.failure(iter, min_count));
            }
            let lk = composer.ln_likelihood();
            trace!("EM\t{}\t{:.4}", iter, lk);
            if lk - current < self.epsilon {
                debug!("EM\tStop\t{}\t{:.4}", iter, lk);
                break;
            }
            current = lk;
        }
        Ok(())
    }
    fn run_cem(&self, composer: &mut MixtureComposer) -> Result<()> {
        let threshold = Self::threshold(composer.individual_num());
        let mut current = composer.ln_likelihood();
        for iter in 0..self.iter_max {
            let min_count = composer.c_step();
            if min_count < threshold {
                return Err(self.failure(iter, min_count));
            }
            composer.imputation_step()?;
            composer.m_step()?;
            composer.e_step();
            let lk = composer.ln_likelihood();
            trace!("CEM\t{}\t{:.4}", iter, lk);
            if (lk - current).abs() < self.epsilon {
                debug!("CEM\tStop\t{}\t{:.4}", iter, lk);
                break;
            }
            current = lk;
        }
        Ok(())
    }
    fn run_sem<R: Rng>(&self, composer: &mut MixtureComposer, rng: &mut R) -> Result<()> {
        let threshold = Self::threshold(composer.individual_num());
        for iter in 0..self.iter_max {
            let min_count = composer.s_step(rng);
            if min_count < threshold {
                return Err(self.failure(iter, min_count));
            }
            composer.sampling_step(rng)?;
            composer.m_step()?;
            composer.sample_parameters();
            composer.e_step();
            trace!("SEM\t{}\t{:.4}", iter, composer.ln_likelihood());
        }
        Ok(())
    }
}
