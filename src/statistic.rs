//! The scalar-objective specialization of [`Function`].

use crate::error::Result;
use crate::function::{Arg, Function};

/// A Function representing a scalar objective (e.g. a log-likelihood) that
/// requires no external argument, to be maximized.
///
/// This is the exact interface an optimizer adapter consumes: the current
/// value, the free parameters with their bounds and names, the free-vector
/// marshaling inherited from [`Function`], and the free-parameter gradient.
/// An adapter holds a non-owning reference to exactly one Statistic for the
/// duration of one minimization run.
pub trait Statistic: Function {
    /// The objective's current value.
    fn value(&self) -> Result<f64> {
        self.evaluate(&Arg::None)
    }

    /// Partial derivative of [`value`](Self::value) with respect to each free
    /// parameter, in the same order as `free_params`.
    fn free_gradient(&self) -> Result<Vec<f64>> {
        self.free_derivs(&Arg::None)
    }
}
