//! Example function leaves and a test statistic.
//!
//! These are not the point of the crate; they exist to exercise the
//! Function/Parameter model and the optimizer adapters with nontrivial
//! analytic derivatives.

use crate::error::{FuncOptError, Result};
use crate::function::{Arg, ArgKind, FuncCore, Function};
use crate::statistic::Statistic;

/// `Prefactor * (x / Scale)^Index`, with `Scale` fixed and `Prefactor`
/// designated as the normalization parameter.
#[derive(Clone)]
pub struct PowerLaw {
    core: FuncCore,
}

impl PowerLaw {
    pub fn new(prefactor: f64, index: f64, scale: f64) -> Result<Self> {
        let mut core = FuncCore::new("PowerLaw", 3, ArgKind::Scalar);
        core.add_param("Prefactor", prefactor, true)?;
        core.add_param("Index", index, true)?;
        core.add_param("Scale", scale, false)?;
        core.set_norm_par("Prefactor")?;
        Ok(Self { core })
    }

    /// Definite integral over `[xmin, xmax]`.
    pub fn integral(&self, xmin: f64, xmax: f64) -> Result<f64> {
        let f0 = self.core.param("Prefactor")?.true_value();
        let gamma = self.core.param("Index")?.true_value();
        let x0 = self.core.param("Scale")?.true_value();

        Ok(f0 / (gamma + 1.0) * ((xmax / x0).powf(gamma + 1.0) - (xmin / x0).powf(gamma + 1.0)))
    }
}

impl Function for PowerLaw {
    fn core(&self) -> &FuncCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut FuncCore {
        &mut self.core
    }

    fn evaluate(&self, arg: &Arg) -> Result<f64> {
        self.core.check_arg(arg)?;
        let x = arg.scalar()?;
        let prefactor = self.core.param("Prefactor")?.true_value();
        let index = self.core.param("Index")?.true_value();
        let scale = self.core.param("Scale")?.true_value();
        Ok(prefactor * (x / scale).powf(index))
    }

    fn deriv_by_param(&self, arg: &Arg, name: &str) -> Result<f64> {
        self.core.check_arg(arg)?;
        let x = arg.scalar()?;
        let value = self.evaluate(arg)?;
        let param = self.core.param(name)?;
        // Derivatives are with respect to the optimizer-space value, hence
        // the trailing scale factor on each branch.
        match name {
            "Prefactor" => {
                let prefactor = self.core.param("Prefactor")?.true_value();
                Ok(value / prefactor * param.scale())
            }
            "Index" => {
                let scale = self.core.param("Scale")?.true_value();
                Ok(value * (x / scale).ln() * param.scale())
            }
            "Scale" => {
                let index = self.core.param("Index")?.true_value();
                let scale = self.core.param("Scale")?.true_value();
                Ok(-value * index / scale * param.scale())
            }
            other => Err(FuncOptError::ParameterNotFound {
                name: other.to_string(),
                function: self.name().to_string(),
            }),
        }
    }

    fn clone_box(&self) -> Box<dyn Function> {
        Box::new(self.clone())
    }
}

/// A constant: its sole parameter `Value`, regardless of the argument.
#[derive(Clone)]
pub struct ConstantValue {
    core: FuncCore,
}

impl ConstantValue {
    pub fn new(value: f64) -> Result<Self> {
        let mut core = FuncCore::new("ConstantValue", 1, ArgKind::Scalar);
        core.add_param("Value", value, true)?;
        Ok(Self { core })
    }
}

impl Function for ConstantValue {
    fn core(&self) -> &FuncCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut FuncCore {
        &mut self.core
    }

    fn evaluate(&self, arg: &Arg) -> Result<f64> {
        self.core.check_arg(arg)?;
        Ok(self.core.params()[0].true_value())
    }

    fn deriv_by_param(&self, arg: &Arg, name: &str) -> Result<f64> {
        self.core.check_arg(arg)?;
        let param = self.core.param(name)?;
        Ok(param.scale())
    }

    fn clone_box(&self) -> Box<dyn Function> {
        Box::new(self.clone())
    }
}

/// A 2-D Rosenbrock objective, negated so the maximum sits at `(1, 1)`.
///
/// `value = -(p * (y - x^2)^2 + (1 - x)^2)` over free parameters `x` and `y`.
#[derive(Clone)]
pub struct Rosen {
    core: FuncCore,
    prefactor: f64,
}

impl Rosen {
    pub fn new(prefactor: f64) -> Result<Self> {
        let mut core = FuncCore::new("Rosen", 2, ArgKind::None);
        core.add_param("x", 1.0, true)?;
        core.add_param("y", 1.0, true)?;
        Ok(Self { core, prefactor })
    }
}

impl Function for Rosen {
    fn core(&self) -> &FuncCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut FuncCore {
        &mut self.core
    }

    fn evaluate(&self, arg: &Arg) -> Result<f64> {
        self.core.check_arg(arg)?;
        let x = self.core.param("x")?.true_value();
        let y = self.core.param("y")?.true_value();
        Ok(-(self.prefactor * (y - x * x).powi(2) + (1.0 - x).powi(2)))
    }

    fn deriv_by_param(&self, arg: &Arg, name: &str) -> Result<f64> {
        self.core.check_arg(arg)?;
        let x = self.core.param("x")?.true_value();
        let y = self.core.param("y")?.true_value();
        let param = self.core.param(name)?;
        match name {
            "x" => Ok((4.0 * self.prefactor * x * (y - x * x) + 2.0 * (1.0 - x)) * param.scale()),
            "y" => Ok(-2.0 * self.prefactor * (y - x * x) * param.scale()),
            other => Err(FuncOptError::ParameterNotFound {
                name: other.to_string(),
                function: self.name().to_string(),
            }),
        }
    }

    fn clone_box(&self) -> Box<dyn Function> {
        Box::new(self.clone())
    }
}

impl Statistic for Rosen {}

/// The N-dimensional chained Rosenbrock objective, negated so the maximum
/// sits at all ones.
///
/// `value = -sum_i (p * (x_{i+1} - x_i^2)^2 + (1 - x_i)^2)` over free
/// parameters `x1 .. xN`, each starting at 1.0.
#[derive(Clone)]
pub struct RosenND {
    core: FuncCore,
    prefactor: f64,
}

impl RosenND {
    pub fn new(dim: usize, prefactor: f64) -> Result<Self> {
        let mut core = FuncCore::new("RosenND", dim, ArgKind::None);
        for i in 1..=dim {
            core.add_param(&format!("x{i}"), 1.0, true)?;
        }
        Ok(Self { core, prefactor })
    }

    fn true_values(&self) -> Vec<f64> {
        self.core.params().iter().map(|p| p.true_value()).collect()
    }
}

impl Function for RosenND {
    fn core(&self) -> &FuncCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut FuncCore {
        &mut self.core
    }

    fn evaluate(&self, arg: &Arg) -> Result<f64> {
        self.core.check_arg(arg)?;
        let x = self.true_values();
        let mut total = 0.0;
        for i in 0..x.len().saturating_sub(1) {
            total += self.prefactor * (x[i + 1] - x[i] * x[i]).powi(2) + (1.0 - x[i]).powi(2);
        }
        Ok(-total)
    }

    fn deriv_by_param(&self, arg: &Arg, name: &str) -> Result<f64> {
        self.core.check_arg(arg)?;
        let j = self
            .core
            .params()
            .iter()
            .position(|p| p.name() == name)
            .ok_or_else(|| FuncOptError::ParameterNotFound {
                name: name.to_string(),
                function: self.name().to_string(),
            })?;
        let x = self.true_values();
        let p = self.prefactor;

        let mut g = 0.0;
        if j + 1 < x.len() {
            g += 4.0 * p * x[j] * (x[j + 1] - x[j] * x[j]) + 2.0 * (1.0 - x[j]);
        }
        if j > 0 {
            g -= 2.0 * p * (x[j] - x[j - 1] * x[j - 1]);
        }
        Ok(g * self.core.params()[j].scale())
    }

    fn clone_box(&self) -> Box<dyn Function> {
        Box::new(self.clone())
    }
}

impl Statistic for RosenND {}
