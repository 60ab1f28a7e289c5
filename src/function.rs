//! The Function abstraction and the free-parameter marshaling protocol.
//!
//! A Function owns an ordered sequence of [`Parameter`]s; the order is
//! significant because it fixes positions in the full and free parameter
//! vectors. Three representations of the same parameter set must agree at all
//! times: the function tree, the flat full vector, and the flat free-subset
//! vector that external optimizers manipulate. The provided methods on
//! [`Function`] implement that agreement once for every variant.

use serde::{Deserialize, Serialize};

use crate::error::{FuncOptError, Result};
use crate::parameters::Parameter;

/// Tag describing what kind of argument a Function evaluates at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArgKind {
    /// No external argument; the function is a scalar objective.
    None,
    /// A single scalar argument.
    Scalar,
}

/// An evaluation argument.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Arg {
    None,
    Scalar(f64),
}

impl Arg {
    pub fn kind(&self) -> ArgKind {
        match self {
            Arg::None => ArgKind::None,
            Arg::Scalar(_) => ArgKind::Scalar,
        }
    }

    /// The scalar payload, failing with `ArgumentMismatch` for any other kind.
    pub fn scalar(&self) -> Result<f64> {
        match self {
            Arg::Scalar(x) => Ok(*x),
            other => Err(FuncOptError::ArgumentMismatch {
                expected: ArgKind::Scalar,
                actual: other.kind(),
            }),
        }
    }
}

/// The owned state every Function variant embeds: a name (generic type tag),
/// a capacity, the ordered parameter list, and an optional designated
/// normalization parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuncCore {
    name: String,
    max_params: usize,
    arg_kind: ArgKind,
    params: Vec<Parameter>,
    norm_par: Option<String>,
}

impl FuncCore {
    /// A core with zero parameters and room for `max_params`.
    pub fn new(name: &str, max_params: usize, arg_kind: ArgKind) -> Self {
        Self {
            name: name.to_string(),
            max_params,
            arg_kind,
            params: Vec::with_capacity(max_params),
            norm_par: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: &str) {
        self.name = name.to_string();
    }

    pub fn arg_kind(&self) -> ArgKind {
        self.arg_kind
    }

    /// Guard against a mismatched argument kind at evaluation time.
    pub fn check_arg(&self, arg: &Arg) -> Result<()> {
        if arg.kind() != self.arg_kind {
            return Err(FuncOptError::ArgumentMismatch {
                expected: self.arg_kind,
                actual: arg.kind(),
            });
        }
        Ok(())
    }

    /// The ordered parameter list.
    pub fn params(&self) -> &[Parameter] {
        &self.params
    }

    /// Append a new parameter.
    ///
    /// Fails with `DuplicateParameter` if the name is already present and with
    /// `CapacityExceeded` if the list is full.
    pub fn add_param(&mut self, name: &str, value: f64, free: bool) -> Result<()> {
        self.add_param_obj(Parameter::new(name, value, free))
    }

    /// Append an already-constructed parameter, same failure modes as
    /// [`add_param`](Self::add_param).
    pub fn add_param_obj(&mut self, param: Parameter) -> Result<()> {
        if self.params.iter().any(|p| p.name() == param.name()) {
            return Err(FuncOptError::DuplicateParameter {
                name: param.name().to_string(),
            });
        }
        if self.params.len() >= self.max_params {
            return Err(FuncOptError::CapacityExceeded {
                name: param.name().to_string(),
                max: self.max_params,
            });
        }
        self.params.push(param);
        Ok(())
    }

    /// Look up a parameter by name.
    pub fn param(&self, name: &str) -> Result<&Parameter> {
        self.params
            .iter()
            .find(|p| p.name() == name)
            .ok_or_else(|| FuncOptError::ParameterNotFound {
                name: name.to_string(),
                function: self.name.clone(),
            })
    }

    /// Look up a parameter by name for mutation.
    pub fn param_mut(&mut self, name: &str) -> Result<&mut Parameter> {
        match self.params.iter().position(|p| p.name() == name) {
            Some(i) => Ok(&mut self.params[i]),
            None => Err(FuncOptError::ParameterNotFound {
                name: name.to_string(),
                function: self.name.clone(),
            }),
        }
    }

    /// Replace the parameter with the same name as `param`.
    pub fn set_param(&mut self, param: &Parameter) -> Result<()> {
        *self.param_mut(param.name())? = param.clone();
        Ok(())
    }

    /// Set one parameter's optimizer-space value by name.
    pub fn set_param_value(&mut self, name: &str, value: f64) -> Result<()> {
        self.param_mut(name)?.set_value(value)
    }

    /// Number of free parameters.
    pub fn num_free(&self) -> usize {
        self.params.iter().filter(|p| p.is_free()).count()
    }

    /// Designate the normalization parameter used by [`rescale`](Self::rescale).
    pub fn set_norm_par(&mut self, name: &str) -> Result<()> {
        self.param(name)?;
        self.norm_par = Some(name.to_string());
        Ok(())
    }

    /// Multiply the free normalization parameter by `factor`.
    ///
    /// Reports `Ok(false)` without touching anything when no normalization
    /// parameter is designated or when it is fixed.
    pub fn rescale(&mut self, factor: f64) -> Result<bool> {
        let name = match &self.norm_par {
            Some(name) => name.clone(),
            None => return Ok(false),
        };
        let prefactor = self.param_mut(&name)?;
        if !prefactor.is_free() {
            return Ok(false);
        }
        let new_value = prefactor.value() * factor;
        prefactor.set_value(new_value)?;
        Ok(true)
    }

    /// Overwrite the whole parameter list. Composites use this to rebuild
    /// their derived view; name uniqueness is deliberately not re-checked
    /// because children may legitimately share parameter names.
    pub(crate) fn replace_params(&mut self, params: Vec<Parameter>) {
        self.max_params = self.max_params.max(params.len());
        self.params = params;
    }

    pub(crate) fn params_mut_slice(&mut self) -> &mut [Parameter] {
        &mut self.params
    }
}

/// Validate a candidate vector against parameter bounds before any write, so
/// a failing vector leaves every parameter untouched.
fn check_values_in_bounds<'p>(
    params: impl Iterator<Item = &'p Parameter>,
    values: &[f64],
) -> Result<()> {
    for (p, &v) in params.zip(values.iter()) {
        let (min, max) = p.bounds();
        if !(v >= min && v <= max) {
            return Err(FuncOptError::OutOfBounds { value: v, min, max });
        }
    }
    Ok(())
}

/// The capability set shared by every function variant: evaluate at an
/// argument, compute a partial derivative with respect to a named parameter,
/// expose and mutate the ordered parameter list, and clone into an
/// independent deep copy.
pub trait Function {
    /// The embedded parameter state.
    fn core(&self) -> &FuncCore;

    fn core_mut(&mut self) -> &mut FuncCore;

    /// Evaluate at `arg` as a pure function of the current parameter state.
    fn evaluate(&self, arg: &Arg) -> Result<f64>;

    /// Partial derivative with respect to the optimizer-space value of the
    /// named parameter; fails with `ParameterNotFound` for unknown names.
    fn deriv_by_param(&self, arg: &Arg, name: &str) -> Result<f64>;

    /// A fully independent deep copy, children included.
    fn clone_box(&self) -> Box<dyn Function>;

    fn name(&self) -> &str {
        self.core().name()
    }

    fn params(&self) -> &[Parameter] {
        self.core().params()
    }

    fn num_free_params(&self) -> usize {
        self.core().num_free()
    }

    /// Copies of the free parameters, in list order.
    fn free_params(&self) -> Vec<Parameter> {
        self.params()
            .iter()
            .filter(|p| p.is_free())
            .cloned()
            .collect()
    }

    /// Look up a parameter by name.
    fn param(&self, name: &str) -> Result<&Parameter> {
        self.core().param(name)
    }

    /// Replace the parameter with the same name. Composites override this to
    /// route into the owning child and re-derive their own list.
    fn set_param(&mut self, param: &Parameter) -> Result<()> {
        self.core_mut().set_param(param)
    }

    /// All optimizer-space values, in list order.
    fn param_values(&self) -> Vec<f64> {
        self.params().iter().map(|p| p.value()).collect()
    }

    /// Optimizer-space values of the free subset, in the same relative order
    /// as the full list.
    fn free_param_values(&self) -> Vec<f64> {
        self.params()
            .iter()
            .filter(|p| p.is_free())
            .map(|p| p.value())
            .collect()
    }

    /// Names of all parameters, in list order.
    fn param_names(&self) -> Vec<String> {
        self.params().iter().map(|p| p.name().to_string()).collect()
    }

    /// Overwrite all parameter values positionally, in list order.
    ///
    /// Fails with `SizeMismatch` unless the vector length equals the full
    /// parameter count, and with `OutOfBounds` if any entry violates its
    /// parameter's bounds; on any failure no parameter is written.
    fn set_param_values(&mut self, values: &[f64]) -> Result<()> {
        let expected = self.params().len();
        if values.len() != expected {
            return Err(FuncOptError::SizeMismatch {
                expected,
                actual: values.len(),
            });
        }
        check_values_in_bounds(self.params().iter(), values)?;
        let used = self.write_param_values(values)?;
        debug_assert_eq!(used, expected);
        Ok(())
    }

    /// Overwrite only the free-flagged parameters positionally, skipping
    /// fixed ones and preserving relative order. Same failure and atomicity
    /// contract as [`set_param_values`](Self::set_param_values), with the
    /// expected length being the free-parameter count.
    fn set_free_param_values(&mut self, values: &[f64]) -> Result<()> {
        let expected = self.num_free_params();
        if values.len() != expected {
            return Err(FuncOptError::SizeMismatch {
                expected,
                actual: values.len(),
            });
        }
        check_values_in_bounds(self.params().iter().filter(|p| p.is_free()), values)?;
        let used = self.write_free_param_values(values)?;
        debug_assert_eq!(used, expected);
        Ok(())
    }

    /// Positional writer consuming this function's parameter count from the
    /// front of `values`, returning the count consumed. Composites override
    /// this to route the head into one child and the tail into the other,
    /// then re-derive their own list. Callers must have validated bounds.
    fn write_param_values(&mut self, values: &[f64]) -> Result<usize> {
        let params = self.core_mut().params_mut_slice();
        if values.len() < params.len() {
            return Err(FuncOptError::SizeMismatch {
                expected: params.len(),
                actual: values.len(),
            });
        }
        for (p, &v) in params.iter_mut().zip(values.iter()) {
            p.set_value(v)?;
        }
        Ok(params.len())
    }

    /// Free-subset counterpart of [`write_param_values`](Self::write_param_values).
    fn write_free_param_values(&mut self, values: &[f64]) -> Result<usize> {
        let params = self.core_mut().params_mut_slice();
        let mut it = values.iter();
        let mut used = 0;
        for p in params.iter_mut().filter(|p| p.is_free()) {
            match it.next() {
                Some(&v) => p.set_value(v)?,
                None => {
                    return Err(FuncOptError::SizeMismatch {
                        expected: used + 1,
                        actual: values.len(),
                    })
                }
            }
            used += 1;
        }
        Ok(used)
    }

    /// Partial derivatives with respect to every parameter, in list order.
    fn derivs(&self, arg: &Arg) -> Result<Vec<f64>> {
        self.params()
            .iter()
            .map(|p| self.deriv_by_param(arg, p.name()))
            .collect()
    }

    /// Partial derivatives with respect to each free parameter, in the same
    /// order as [`free_params`](Self::free_params).
    fn free_derivs(&self, arg: &Arg) -> Result<Vec<f64>> {
        self.params()
            .iter()
            .filter(|p| p.is_free())
            .map(|p| self.deriv_by_param(arg, p.name()))
            .collect()
    }

    /// Multiply this function's free normalization parameter by `factor`,
    /// reporting whether anything changed. Used to renormalize amplitude
    /// without disturbing other free parameters.
    fn rescale(&mut self, factor: f64) -> Result<bool> {
        self.core_mut().rescale(factor)
    }
}

impl std::fmt::Debug for dyn Function {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Function")
            .field("name", &self.name())
            .finish_non_exhaustive()
    }
}

impl Clone for Box<dyn Function> {
    fn clone(&self) -> Box<dyn Function> {
        self.clone_box()
    }
}
