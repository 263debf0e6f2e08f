//! Unconstrained minimization of a cost with an analytic gradient.
use crate::error::{MixtureError, Result};
use std::collections::VecDeque;

/// Armijo constant of the backtracking line search.
const ARMIJO: f64 = 1e-4;
const MAX_BACKTRACK: usize = 60;

#[derive(Debug, Clone)]
pub struct Minimum {
    pub params: Vec<f64>,
    pub cost: f64,
    pub iterations: usize,
    pub converged: bool,
}

pub trait Minimizer {
    /// Minimize `f`. The closure returns the cost at the given point and,
    /// when the second argument is `Some`, writes the gradient into it.
    fn minimize<F>(&self, f: F, init: Vec<f64>) -> Result<Minimum>
    where
        F: FnMut(&[f64], Option<&mut [f64]>) -> f64;
}

/// Limited memory BFGS with a backtracking line search.
#[derive(Debug, Clone, Copy)]
pub struct Lbfgs {
    pub iter_max: usize,
    /// Stop when the gradient norm falls below this value.
    pub tolerance: f64,
    /// Number of correction pairs kept.
    pub history: usize,
}

impl std::default::Default for Lbfgs {
    fn default() -> Self {
        Self {
            iter_max: 100,
            tolerance: 1e-6,
            history: 7,
        }
    }
}

impl Lbfgs {
    pub fn new(iter_max: usize, tolerance: f64, history: usize) -> Self {
        Self {
            iter_max,
            tolerance,
            history: history.max(1),
        }
    }
}

fn dot(xs: &[f64], ys: &[f64]) -> f64 {
    xs.iter().zip(ys).map(|(x, y)| x * y).sum()
}

fn norm(xs: &[f64]) -> f64 {
    dot(xs, xs).sqrt()
}

/// Two-loop recursion. Returns the descent direction `-H g`.
fn direction(grad: &[f64], pairs: &VecDeque<(Vec<f64>, Vec<f64>)>) -> Vec<f64> {
    let mut q: Vec<_> = grad.iter().map(|g| -g).collect();
    let mut alphas = Vec::with_capacity(pairs.len());
    for (s, y) in pairs.iter().rev() {
        let rho = 1f64 / dot(y, s);
        let alpha = rho * dot(s, &q);
        q.iter_mut().zip(y).for_each(|(q, y)| *q -= alpha * y);
        alphas.push((rho, alpha));
    }
    if let Some((s, y)) = pairs.back() {
        let gamma = dot(s, y) / dot(y, y);
        q.iter_mut().for_each(|q| *q *= gamma);
    }
    for ((s, y), (rho, alpha)) in pairs.iter().zip(alphas.iter().rev()) {
        let beta = rho * dot(y, &q);
        q.iter_mut().zip(s).for_each(|(q, s)| *q += s * (alpha - beta));
    }
    q
}

impl Minimizer for Lbfgs {
    fn minimize<F>(&self, mut f: F, init: Vec<f64>) -> Result<Minimum>
    where
        F: FnMut(&[f64], Option<&mut [f64]>) -> f64,
    {
        let dim = init.len();
        let mut x = init;
        let mut grad = vec![0f64; dim];
        let mut cost = f(x.as_slice(), Some(grad.as_mut_slice()));
        if !cost.is_finite() || grad.iter().any(|g| !g.is_finite()) {
            return Err(MixtureError::NumericFailure(format!(
                "non-finite cost {} at the initial point",
                cost
            )));
        }
        let mut pairs: VecDeque<(Vec<f64>, Vec<f64>)> = VecDeque::with_capacity(self.history);
        let mut next_x = vec![0f64; dim];
        let mut next_grad = vec![0f64; dim];
        for iter in 0..self.iter_max {
            let grad_norm = norm(&grad);
            if grad_norm < self.tolerance {
                return Ok(Minimum {
                    params: x,
                    cost,
                    iterations: iter,
                    converged: true,
                });
            }
            let mut dir = direction(&grad, &pairs);
            let mut slope = dot(&dir, &grad);
            if 0f64 <= slope {
                pairs.clear();
                dir = grad.iter().map(|g| -g).collect();
                slope = -grad_norm * grad_norm;
            }
            let mut step = if pairs.is_empty() {
                (1f64 / grad_norm).min(1f64)
            } else {
                1f64
            };
            let mut next_cost = f64::INFINITY;
            let mut accepted = false;
            for _ in 0..MAX_BACKTRACK {
                next_x
                    .iter_mut()
                    .zip(x.iter().zip(dir.iter()))
                    .for_each(|(n, (x, d))| *n = x + step * d);
                next_cost = f(next_x.as_slice(), Some(next_grad.as_mut_slice()));
                if next_cost.is_finite() && next_cost <= cost + ARMIJO * step * slope {
                    accepted = true;
                    break;
                }
                step /= 2f64;
            }
            if !accepted {
                trace!("LBFGS\tLineSearchFailed\t{}\t{:.5}", iter, cost);
                return Ok(Minimum {
                    params: x,
                    cost,
                    iterations: iter,
                    converged: false,
                });
            }
            if next_grad.iter().any(|g| !g.is_finite()) {
                return Err(MixtureError::NumericFailure(format!(
                    "non-finite gradient at iteration {}",
                    iter
                )));
            }
            let s: Vec<_> = next_x.iter().zip(x.iter()).map(|(n, x)| n - x).collect();
            let y: Vec<_> = next_grad
                .iter()
                .zip(grad.iter())
                .map(|(n, g)| n - g)
                .collect();
            if 1e-12 < dot(&s, &y) {
                if pairs.len() == self.history {
                    pairs.pop_front();
                }
                pairs.push_back((s, y));
            }
            let diff = cost - next_cost;
            std::mem::swap(&mut x, &mut next_x);
            std::mem::swap(&mut grad, &mut next_grad);
            cost = next_cost;
            trace!("LBFGS\t{}\t{:.5}\t{:.5}", iter, cost, step);
            if diff.abs() <= 10f64 * f64::EPSILON * cost.abs().max(1f64) {
                return Ok(Minimum {
                    params: x,
                    cost,
                    iterations: iter + 1,
                    converged: true,
                });
            }
        }
        Ok(Minimum {
            params: x,
            cost,
            iterations: self.iter_max,
            converged: false,
        })
    }
}
