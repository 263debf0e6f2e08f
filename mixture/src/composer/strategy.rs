use super::{Algorithm, MixtureComposer};
use crate::config::{ClusteringConfig, InitMethod};
use crate::error::{MixtureError, Result};
use rand::Rng;

/// Several independent runs, each with retried initializations followed by a
/// short and a long run of the algorithm. The best run is kept.
#[derive(Debug, Clone, Copy)]
pub struct Strategy {
    pub try_num: usize,
    pub init_try_num: usize,
    pub init: InitMethod,
    pub short: Algorithm,
    pub long: Algorithm,
}

impl Strategy {
    pub fn from_config(config: &ClusteringConfig) -> Self {
        Self {
            try_num: config.try_num.max(1),
            init_try_num: config.init_try_num.max(1),
            init: config.init,
            short: Algorithm::new(config.algorithm, config.init_iter_max, config.init_epsilon),
            long: Algorithm::new(config.algorithm, config.iter_max, config.epsilon),
        }
    }
    /// Initialize `composer` and run the short algorithm, retrying on failures a new draw may fix.
    fn initialize<R: Rng>(&self, composer: &mut MixtureComposer, rng: &mut R) -> Result<()> {
        let mut last_error = None;
        for t in 0..self.init_try_num {
            composer.initialize_step(rng)?;
            let result = match self.init {
                InitMethod::Class => composer.random_class_init(rng),
                InitMethod::Fuzzy => composer.random_fuzzy_init(rng),
            }
            .and_then(|_| self.short.run(composer, rng));
            match result {
                Ok(_) => return Ok(()),
                Err(why) if why.is_retryable() => {
                    debug!("INIT\t{}\tRetry\t{}", t, why);
                    last_error = Some(why);
                }
                Err(why) => return Err(why),
            }
        }
        Err(last_error.unwrap_or_else(|| {
            MixtureError::Configuration("no initialization was attempted".to_string())
        }))
    }
    pub fn run<R: Rng>(&self, template: &MixtureComposer, rng: &mut R) -> Result<MixtureComposer> {
        let mut best: Option<MixtureComposer> = None;
        let mut last_error = None;
        for t in 0..self.try_num {
            let mut composer = template.clone();
            let result = self
                .initialize(&mut composer, rng)
                .and_then(|_| self.long.run(&mut composer, rng));
            match result {
                Ok(_) => {
                    let lk = composer.ln_likelihood();
                    debug!("TRY\t{}\t{:.4}", t, lk);
                    if best.as_ref().map_or(true, |b| b.ln_likelihood() < lk) {
                        best = Some(composer);
                    }
                }
                Err(why) if why.is_retryable() => {
                    debug!("TRY\t{}\tFailed\t{}", t, why);
                    last_error = Some(why);
                }
                Err(why) => return Err(why),
            }
        }
        match (best, last_error) {
            (Some(best), _) => Ok(best),
            (None, Some(why)) => Err(why),
            (None, None) => Err(MixtureError::Configuration(
                "no clustering was attempted".to_string(),
            )),
        }
    }
}
