//! Definitions -- A tiny interface for the mixture clustering problem.
//! Roughly speaking, we interact with other programs and with the CLI via JSON objects. Specifically, the message is encoded only as one, possibly large, structure named [DataSet](DataSet): the input variables, and, after clustering, the assignments and the estimated parameters.

use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct DataSet {
    pub input_file: String,
    /// The number of individuals. Every variable has exactly this many observations.
    pub individual_num: usize,
    pub variables: Vec<Variable>,
    #[serde(default)]
    pub assignments: Vec<Assignment>,
    #[serde(default)]
    pub proportions: Vec<f64>,
    #[serde(default)]
    pub parameters: Vec<VariableParameters>,
    #[serde(default)]
    pub ln_likelihood: Option<f64>,
    #[serde(default)]
    pub icl: Option<f64>,
}

impl DataSet {
    pub fn new(input_file: &str, individual_num: usize, variables: Vec<Variable>) -> Self {
        Self {
            input_file: input_file.to_string(),
            individual_num,
            variables,
            ..Default::default()
        }
    }
    /// Remove every result of a previous clustering run.
    pub fn clear_results(&mut self) {
        self.assignments.clear();
        self.proportions.clear();
        self.parameters.clear();
        self.ln_likelihood = None;
        self.icl = None;
    }
    pub fn is_clustered(&self) -> bool {
        !self.assignments.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Variable {
    pub name: String,
    pub model: ModelType,
    pub data: VariableData,
}

impl Variable {
    pub fn new(name: &str, model: ModelType, data: VariableData) -> Self {
        Self {
            name: name.to_string(),
            model,
            data,
        }
    }
    pub fn len(&self) -> usize {
        self.data.len()
    }
    pub fn is_empty(&self) -> bool {
        self.data.len() == 0
    }
}

/// Observations of one variable, one entry per individual.
/// A missing scalar observation is `None`, written as `null` in JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum VariableData {
    Real(Vec<Option<f64>>),
    Functional(Vec<Curve>),
}

impl VariableData {
    /// Scalar observations with nothing missing.
    pub fn reals(xs: Vec<f64>) -> Self {
        VariableData::Real(xs.into_iter().map(Some).collect())
    }
    pub fn missing_num(&self) -> usize {
        match self {
            VariableData::Real(xs) => xs.iter().filter(|x| x.is_none()).count(),
            VariableData::Functional(_) => 0,
        }
    }
    pub fn len(&self) -> usize {
        match self {
            VariableData::Real(xs) => xs.len(),
            VariableData::Functional(curves) => curves.len(),
        }
    }
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A curve sampled at irregular times. `times` and `values` are paired.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Curve {
    pub times: Vec<f64>,
    pub values: Vec<f64>,
}

impl Curve {
    pub fn new(times: Vec<f64>, values: Vec<f64>) -> Self {
        Self { times, values }
    }
    pub fn len(&self) -> usize {
        self.times.len()
    }
    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }
}

impl std::fmt::Display for Curve {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let points: Vec<_> = self
            .times
            .iter()
            .zip(self.values.iter())
            .map(|(t, x)| format!("{t}:{x}"))
            .collect();
        write!(f, "{}", points.join(","))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ModelType {
    Gaussian,
    Gamma,
    Functional { sub_num: usize, coeff_num: usize },
}

impl std::fmt::Display for ModelType {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            ModelType::Gaussian => write!(f, "Gaussian"),
            ModelType::Gamma => write!(f, "Gamma"),
            ModelType::Functional { sub_num, coeff_num } => {
                write!(f, "nSub: {sub_num}, nCoeff: {coeff_num}")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseModelError(String);

impl std::fmt::Display for ParseModelError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "{} is not a model. Use Gaussian, Gamma, or \"nSub: x, nCoeff: y\"",
            self.0
        )
    }
}

impl std::error::Error for ParseModelError {}

impl std::str::FromStr for ModelType {
    type Err = ParseModelError;
    /// Accepts `Gaussian`, `Gamma`, or a functional description `nSub: x, nCoeff: y`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let error = || ParseModelError(s.to_string());
        match s.trim() {
            "Gaussian" => return Ok(ModelType::Gaussian),
            "Gamma" => return Ok(ModelType::Gamma),
            _ => {}
        }
        let (sub, coeff) = s.trim().split_once(',').ok_or_else(error)?;
        let parse_field = |field: &str, key: &str| -> Option<usize> {
            let (name, value) = field.trim().split_once(':')?;
            (name.trim() == key).then(|| value.trim().parse().ok())?
        };
        let sub_num = parse_field(sub, "nSub").ok_or_else(error)?;
        let coeff_num = parse_field(coeff, "nCoeff").ok_or_else(error)?;
        if sub_num == 0 || coeff_num == 0 {
            return Err(error());
        }
        Ok(ModelType::Functional { sub_num, coeff_num })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Assignment {
    pub id: u64,
    pub cluster: usize,
    /// Posterior probability of each cluster.
    pub posterior: Vec<f64>,
}

impl Assignment {
    pub fn new(id: u64, cluster: usize, posterior: Vec<f64>) -> Self {
        Self {
            id,
            cluster,
            posterior,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariableParameters {
    pub name: String,
    pub parameters: Parameters,
    #[serde(default)]
    pub statistics: Option<ParameterStatistics>,
}

/// Spread of each parameter over the sampled estimates of a run.
/// The i-th entry of every vector refers to the parameter named `names[i]`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ParameterStatistics {
    pub names: Vec<String>,
    pub median: Vec<f64>,
    pub lower: Vec<f64>,
    pub upper: Vec<f64>,
    /// Confidence level of `[lower, upper]`.
    pub level: f64,
    pub sample_num: usize,
}

/// Estimated parameters of one variable, one entry per cluster.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Parameters {
    Gaussian {
        mean: Vec<f64>,
        sd: Vec<f64>,
    },
    Gamma {
        shape: Vec<f64>,
        scale: Vec<f64>,
    },
    Functional {
        classes: Vec<FunctionalParameters>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct FunctionalParameters {
    /// Logistic weights of the segments, `[intercept, slope]` for each segment.
    pub alpha: Vec<[f64; 2]>,
    /// Polynomial coefficients of each segment.
    pub beta: Vec<Vec<f64>>,
    pub sd: Vec<f64>,
}
