//! Shared fixtures for the integration tests.

use funcopt::error::Result;
use funcopt::function::{Arg, ArgKind, FuncCore, Function};
use funcopt::parameters::Parameter;
use funcopt::statistic::Statistic;

/// A one-parameter objective `-(x_true - center)^2`, maximized at `center`.
#[derive(Clone)]
pub struct Parabola {
    core: FuncCore,
    center: f64,
}

impl Parabola {
    pub fn new(start: f64, center: f64, lower: f64, upper: f64) -> Result<Self> {
        let mut core = FuncCore::new("Parabola", 1, ArgKind::None);
        core.add_param_obj(Parameter::with_bounds("x", start, true, lower, upper)?)?;
        Ok(Self { core, center })
    }
}

impl Function for Parabola {
    fn core(&self) -> &FuncCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut FuncCore {
        &mut self.core
    }

    fn evaluate(&self, arg: &Arg) -> Result<f64> {
        self.core.check_arg(arg)?;
        let x = self.core.param("x")?.true_value();
        Ok(-(x - self.center).powi(2))
    }

    fn deriv_by_param(&self, arg: &Arg, name: &str) -> Result<f64> {
        self.core.check_arg(arg)?;
        let x = self.core.param("x")?.true_value();
        let param = self.core.param(name)?;
        Ok(-2.0 * (x - self.center) * param.scale())
    }

    fn clone_box(&self) -> Box<dyn Function> {
        Box::new(self.clone())
    }
}

impl Statistic for Parabola {}
