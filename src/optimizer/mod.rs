//! Optimizer adapters: the bridge between a [`Statistic`] and an external
//! minimization engine.
//!
//! Every adapter follows the same shape: read the Statistic's free parameters
//! and bounds, hand them to an engine in that engine's calling convention,
//! answer the engine's evaluation requests through the free-parameter
//! marshaling protocol, and on termination write the best vector back into
//! the Statistic's own Parameters.
//!
//! Sign convention, applied uniformly: engines minimize, Statistics are
//! maximized, so every value handed to an engine is `-value()` and every
//! gradient component is negated.

pub mod descent;
pub mod lbfgs;

pub use descent::Descent;
pub use lbfgs::Lbfgs;

use crate::error::Result;
use crate::function::Function;
use crate::statistic::Statistic;

/// Where a minimization run stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// Bound to a Statistic, no run started.
    Idle,
    /// Transmitting free parameters, bounds, and names to the engine.
    Configuring,
    /// The engine is invoking the evaluation entry point.
    Running,
    /// The engine reported normal termination; the Statistic holds the
    /// converged values.
    Converged,
    /// Abnormal termination or a condition raised mid-run.
    Failed,
}

/// Convergence tolerance, either as-is or relative to the objective's
/// magnitude at configuration time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Tolerance {
    Absolute(f64),
    Relative(f64),
}

impl Tolerance {
    pub(crate) fn resolve(self, stat_value: f64) -> f64 {
        match self {
            Tolerance::Absolute(tol) => tol,
            Tolerance::Relative(tol) => (tol * stat_value.abs()).max(f64::EPSILON),
        }
    }
}

impl Default for Tolerance {
    fn default() -> Self {
        Tolerance::Absolute(1e-8)
    }
}

/// The capability set shared by every adapter variant: drive the bound
/// Statistic to a local maximum and report how it went.
pub trait Optimizer {
    /// Run the external engine to termination.
    ///
    /// On `Ok(())` the run state is [`RunState::Converged`] and the
    /// Statistic's Parameters hold the converged values; on `Err` the state
    /// is [`RunState::Failed`] and the error carries the engine's status
    /// code or the originating condition.
    fn find_min(&mut self) -> Result<()>;

    fn run_state(&self) -> RunState;

    /// Per-free-parameter uncertainty estimates from the last converged run,
    /// in free-parameter order.
    fn uncertainties(&self) -> &[f64];
}

/// Parabolic uncertainty per free parameter: central second differences of
/// `-value()` at the current point, stepping inside the bounds.
pub(crate) fn parabolic_uncertainties(stat: &mut dyn Statistic) -> Result<Vec<f64>> {
    let x0 = stat.free_param_values();
    let free = stat.free_params();
    let f0 = -stat.value()?;

    let mut uncertainties = Vec::with_capacity(x0.len());
    for (i, param) in free.iter().enumerate() {
        let (lower, upper) = param.bounds();
        let h = (1e-4 * x0[i].abs().max(1.0))
            .min(upper - x0[i])
            .min(x0[i] - lower);
        if !(h > 0.0) {
            uncertainties.push(0.0);
            continue;
        }

        let mut x = x0.clone();
        x[i] = x0[i] + h;
        stat.set_free_param_values(&x)?;
        let f_plus = -stat.value()?;

        x[i] = x0[i] - h;
        stat.set_free_param_values(&x)?;
        let f_minus = -stat.value()?;

        let d2 = (f_plus - 2.0 * f0 + f_minus) / (h * h);
        uncertainties.push(if d2 > 0.0 { (1.0 / d2).sqrt() } else { 0.0 });
    }

    stat.set_free_param_values(&x0)?;
    Ok(uncertainties)
}

/// Store uncertainty estimates into the free parameters, in order.
pub(crate) fn record_uncertainties(stat: &mut dyn Statistic, sigmas: &[f64]) {
    let mut it = sigmas.iter();
    for param in stat
        .core_mut()
        .params_mut_slice()
        .iter_mut()
        .filter(|p| p.is_free())
    {
        match it.next() {
            Some(&sigma) => param.set_stderr(Some(sigma)),
            None => break,
        }
    }
}
