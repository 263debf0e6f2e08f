//! Statistics of the parameters visited by a stochastic run. Every iteration
//! stores one flattened parameter vector. At the end each coordinate is sorted
//! and summarized by its median and a two-sided confidence interval.
use definitions::ParameterStatistics;

pub const CONFIDENCE_LEVEL: f64 = 0.95;

#[derive(Debug, Clone)]
pub struct ParamStat {
    level: f64,
    samples: Vec<Vec<f64>>,
}

impl std::default::Default for ParamStat {
    fn default() -> Self {
        Self::new(CONFIDENCE_LEVEL)
    }
}

impl ParamStat {
    pub fn new(level: f64) -> Self {
        Self {
            level,
            samples: vec![],
        }
    }
    pub fn level(&self) -> f64 {
        self.level
    }
    pub fn set_level(&mut self, level: f64) {
        self.level = level;
    }
    pub fn sample_num(&self) -> usize {
        self.samples.len()
    }
    pub fn sample(&mut self, params: Vec<f64>) {
        self.samples.push(params);
    }
    pub fn clear(&mut self) {
        self.samples.clear();
    }
    /// Indices of the lower bound, the median, and the upper bound in a sorted
    /// sample of size `n`.
    fn quantile_indices(&self, n: usize) -> (usize, usize, usize) {
        let last = n - 1;
        let alpha = (1f64 - self.level) / 2f64;
        let lower = (alpha * last as f64).floor() as usize;
        let upper = ((1f64 - alpha) * last as f64).floor() as usize + 1;
        (lower.min(last), last / 2, upper.min(last))
    }
    /// Per-coordinate order statistics. `None` without any sample.
    pub fn statistics(&self, names: Vec<String>) -> Option<ParameterStatistics> {
        let dim = self.samples.first()?.len();
        let n = self.samples.len();
        let (lower_idx, median_idx, upper_idx) = self.quantile_indices(n);
        let mut stats = ParameterStatistics {
            names,
            level: self.level,
            sample_num: n,
            ..Default::default()
        };
        for d in 0..dim {
            let mut column: Vec<f64> = self.samples.iter().map(|s| s[d]).collect();
            column.sort_by(|x, y| x.total_cmp(y));
            stats.median.push(column[median_idx]);
            stats.lower.push(column[lower_idx]);
            stats.upper.push(column[upper_idx]);
        }
        Some(stats)
    }
}
