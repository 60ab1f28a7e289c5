//! Direct adapter: drives an argmin L-BFGS engine over a [`Statistic`].
//!
//! argmin's calling convention carries the problem object through every
//! callback, so this adapter needs no process-wide state: the problem holds
//! the Statistic behind a `RefCell` and marshals each trial vector through
//! `set_free_param_values`. Trial vectors are clamped to the configured
//! bounds before marshaling, since the line search is free to probe outside
//! the box.

use std::cell::RefCell;

use argmin::core::{CostFunction, Executor, Gradient, State, TerminationReason, TerminationStatus};
use argmin::solver::linesearch::MoreThuenteLineSearch;
use argmin::solver::quasinewton::LBFGS;

use crate::engine::{STATUS_BAD_CONFIG, STATUS_NO_CONVERGENCE};
use crate::error::{FuncOptError, Result};
use crate::function::Function;
use crate::optimizer::{
    parabolic_uncertainties, record_uncertainties, Optimizer, RunState, Tolerance,
};
use crate::parameters::Bounds;
use crate::statistic::Statistic;

/// Adapter bridging a Statistic to argmin's L-BFGS solver.
pub struct Lbfgs<'a> {
    stat: RefCell<&'a mut (dyn Statistic + 'a)>,
    state: RunState,
    uncertainties: Vec<f64>,
    max_iter: u64,
    tol: Tolerance,
    memory: usize,
}

impl<'a> Lbfgs<'a> {
    /// Bind the adapter to one Statistic for the duration of one run.
    pub fn new(stat: &'a mut (dyn Statistic + 'a)) -> Self {
        Self {
            stat: RefCell::new(stat),
            state: RunState::Idle,
            uncertainties: Vec::new(),
            max_iter: 500,
            tol: Tolerance::default(),
            memory: 7,
        }
    }

    pub fn set_max_iter(&mut self, max_iter: u64) {
        self.max_iter = max_iter;
    }

    pub fn set_tolerance(&mut self, tol: Tolerance) {
        self.tol = tol;
    }

    /// Number of corrections kept for the inverse-Hessian approximation.
    pub fn set_memory(&mut self, memory: usize) {
        self.memory = memory;
    }

    fn fail(&mut self, err: FuncOptError) -> Result<()> {
        self.state = RunState::Failed;
        Err(err)
    }
}

fn clamp_to_bounds(x: &[f64], bounds: &[Bounds]) -> Vec<f64> {
    x.iter()
        .zip(bounds.iter())
        .map(|(&v, b)| b.clamp(v))
        .collect()
}

struct StatProblem<'r, 'a> {
    stat: &'r RefCell<&'a mut (dyn Statistic + 'a)>,
    bounds: Vec<Bounds>,
}

impl CostFunction for StatProblem<'_, '_> {
    type Param = Vec<f64>;
    type Output = f64;

    fn cost(&self, x: &Self::Param) -> std::result::Result<Self::Output, argmin::core::Error> {
        let trial = clamp_to_bounds(x, &self.bounds);
        let mut stat = self.stat.borrow_mut();
        stat.set_free_param_values(&trial)
            .map_err(|e| argmin::core::Error::msg(e.to_string()))?;
        let value = stat
            .value()
            .map_err(|e| argmin::core::Error::msg(e.to_string()))?;
        Ok(-value)
    }
}

impl Gradient for StatProblem<'_, '_> {
    type Param = Vec<f64>;
    type Gradient = Vec<f64>;

    fn gradient(
        &self,
        x: &Self::Param,
    ) -> std::result::Result<Self::Gradient, argmin::core::Error> {
        let trial = clamp_to_bounds(x, &self.bounds);
        let mut stat = self.stat.borrow_mut();
        stat.set_free_param_values(&trial)
            .map_err(|e| argmin::core::Error::msg(e.to_string()))?;
        let gradient = stat
            .free_gradient()
            .map_err(|e| argmin::core::Error::msg(e.to_string()))?;
        Ok(gradient.iter().map(|g| -g).collect())
    }
}

impl Optimizer for Lbfgs<'_> {
    fn find_min(&mut self) -> Result<()> {
        self.state = RunState::Configuring;
        self.uncertainties.clear();

        let (init, bounds, tol) = {
            let stat = self.stat.borrow();
            let free = stat.free_params();
            if free.is_empty() {
                drop(stat);
                return self.fail(FuncOptError::EngineFailure {
                    code: STATUS_BAD_CONFIG,
                    message: "the statistic has no free parameters".to_string(),
                });
            }
            let init: Vec<f64> = free.iter().map(|p| p.value()).collect();
            let bounds: Vec<Bounds> = free
                .iter()
                .map(|p| {
                    let (min, max) = p.bounds();
                    Bounds { min, max }
                })
                .collect();
            // Only a relative tolerance needs the objective's current magnitude.
            let tol = match self.tol {
                Tolerance::Absolute(t) => t,
                Tolerance::Relative(_) => match stat.value() {
                    Ok(v) => self.tol.resolve(v),
                    Err(e) => {
                        drop(stat);
                        return self.fail(e);
                    }
                },
            };
            (init, bounds, tol)
        };

        self.state = RunState::Running;

        let problem = StatProblem {
            stat: &self.stat,
            bounds: bounds.clone(),
        };
        let linesearch = MoreThuenteLineSearch::new();
        let solver = match LBFGS::new(linesearch, self.memory).with_tolerance_grad(tol) {
            Ok(solver) => solver,
            Err(e) => {
                return self.fail(FuncOptError::EngineFailure {
                    code: STATUS_BAD_CONFIG,
                    message: e.to_string(),
                })
            }
        };

        let max_iter = self.max_iter;
        let res = Executor::new(problem, solver)
            .configure(|state| state.param(init).max_iters(max_iter))
            .run();

        let res = match res {
            Ok(res) => res,
            Err(e) => {
                return self.fail(FuncOptError::EngineFailure {
                    code: STATUS_NO_CONVERGENCE,
                    message: e.to_string(),
                })
            }
        };

        let state = res.state();
        let termination = state.get_termination_status();
        let converged = matches!(
            termination,
            TerminationStatus::Terminated(
                TerminationReason::SolverConverged | TerminationReason::TargetCostReached
            )
        );
        let best = match state.get_best_param() {
            Some(best) => clamp_to_bounds(best, &bounds),
            None => {
                return self.fail(FuncOptError::EngineFailure {
                    code: STATUS_NO_CONVERGENCE,
                    message: "the engine returned no best parameters".to_string(),
                })
            }
        };
        if !converged {
            return self.fail(FuncOptError::EngineFailure {
                code: STATUS_NO_CONVERGENCE,
                message: termination.to_string(),
            });
        }

        // Final marshal of the engine's best vector, then read uncertainties
        // back into the parameters as an observable side effect of the run.
        let sigmas = {
            let mut stat = self.stat.borrow_mut();
            if let Err(e) = stat.set_free_param_values(&best) {
                drop(stat);
                return self.fail(e);
            }
            match parabolic_uncertainties(&mut **stat) {
                Ok(sigmas) => {
                    record_uncertainties(&mut **stat, &sigmas);
                    sigmas
                }
                Err(e) => {
                    drop(stat);
                    return self.fail(e);
                }
            }
        };
        self.uncertainties = sigmas;
        self.state = RunState::Converged;
        Ok(())
    }

    fn run_state(&self) -> RunState {
        self.state
    }

    fn uncertainties(&self) -> &[f64] {
        &self.uncertainties
    }
}
