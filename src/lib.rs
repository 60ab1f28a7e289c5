//! # funcopt
//!
//! `funcopt` is a composable model of mathematical functions with named,
//! bounded, optionally-fixed parameters, and a bridge from that model to
//! external minimization engines.
//!
//! The library provides:
//! - A `Parameter` type carrying a value, a scale factor, bounds, and a
//!   free/fixed flag
//! - A `Function` trait with ordered parameter access and positional
//!   free-parameter marshaling
//! - `CompositeFunction` for sums and products of deep-cloned children
//! - A `Statistic` trait for no-argument scalar objectives
//! - Optimizer adapters (`Lbfgs`, `Descent`) that drive a Statistic to a
//!   maximum through an engine's own calling convention
//!
//! ## Basic Usage
//!
//! ```
//! use funcopt::models::Rosen;
//! use funcopt::optimizer::{Lbfgs, Optimizer, RunState};
//! use funcopt::Function;
//!
//! let mut rosen = Rosen::new(100.0).unwrap();
//! rosen.set_free_param_values(&[-1.2, 1.0]).unwrap();
//!
//! let mut opt = Lbfgs::new(&mut rosen);
//! opt.find_min().unwrap();
//! assert_eq!(opt.run_state(), RunState::Converged);
//!
//! // The converged values land back in the Statistic's own parameters.
//! assert!((rosen.param("x").unwrap().value() - 1.0).abs() < 1e-4);
//! assert!((rosen.param("y").unwrap().value() - 1.0).abs() < 1e-4);
//! ```

// Public modules
pub mod error;

// Parameter system
pub mod parameters;

// Function model
pub mod composite;
pub mod function;
pub mod statistic;

pub mod factory;
pub mod models;

// Minimization
pub mod engine;
pub mod optimizer;

// Re-exports for convenience
pub use error::{FuncOptError, Result};

pub use composite::{CompositeFunction, CompositeOp};
pub use factory::FunctionFactory;
pub use function::{Arg, ArgKind, FuncCore, Function};
pub use parameters::{Bounds, Parameter};
pub use statistic::Statistic;

pub use optimizer::{Descent, Lbfgs, Optimizer, RunState, Tolerance};
