//! Composite functions: the sum and product of two owned children.
//!
//! A composite owns deep copies of its two children and keeps a *derived*
//! parameter list, the concatenation of the children's lists. Every operation
//! that can change a child's parameters ends by calling [`sync_params`]
//! (construction, cloning, routed mutation, positional writes); the invariant
//! `composite.params == concat(a.params, b.params)` holds whenever a mutating
//! call returns.
//!
//! [`sync_params`]: CompositeFunction::sync_params

use crate::error::{FuncOptError, Result};
use crate::function::{Arg, FuncCore, Function};
use crate::parameters::Parameter;

/// How the two children are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompositeOp {
    /// `value = a(x) + b(x)`
    Sum,
    /// `value = a(x) * b(x)`
    Product,
}

/// A Function combining two exclusively-owned child Functions.
#[derive(Clone)]
pub struct CompositeFunction {
    core: FuncCore,
    op: CompositeOp,
    a: Box<dyn Function>,
    b: Box<dyn Function>,
}

impl CompositeFunction {
    /// The sum combinator, `a(x) + b(x)`. Both children are deep-cloned; the
    /// caller's originals are never aliased.
    pub fn sum(a: &dyn Function, b: &dyn Function) -> Self {
        Self::build(CompositeOp::Sum, a, b)
    }

    /// The product combinator, `a(x) * b(x)`.
    pub fn product(a: &dyn Function, b: &dyn Function) -> Self {
        Self::build(CompositeOp::Product, a, b)
    }

    fn build(op: CompositeOp, a: &dyn Function, b: &dyn Function) -> Self {
        let name = match op {
            CompositeOp::Sum => format!("({} + {})", a.name(), b.name()),
            CompositeOp::Product => format!("({} * {})", a.name(), b.name()),
        };
        let capacity = a.params().len() + b.params().len();
        let core = FuncCore::new(&name, capacity, a.core().arg_kind());
        let mut composite = Self {
            core,
            op,
            a: a.clone_box(),
            b: b.clone_box(),
        };
        composite.sync_params();
        composite
    }

    pub fn op(&self) -> CompositeOp {
        self.op
    }

    pub fn a(&self) -> &dyn Function {
        self.a.as_ref()
    }

    pub fn b(&self) -> &dyn Function {
        self.b.as_ref()
    }

    /// Rebuild the derived parameter list as `concat(a.params, b.params)`.
    ///
    /// Must run after every operation that could have changed either child's
    /// list; this is the central correctness-critical step of the data model.
    pub fn sync_params(&mut self) {
        let mut params = self.a.params().to_vec();
        params.extend_from_slice(self.b.params());
        self.core.replace_params(params);
    }

    /// Replace a parameter of the named child, then re-derive.
    ///
    /// Fails with `ChildNotFound` if `child_name` matches neither child.
    pub fn set_param_for(&mut self, param: &Parameter, child_name: &str) -> Result<()> {
        if self.a.name() == child_name {
            self.a.set_param(param)?;
        } else if self.b.name() == child_name {
            self.b.set_param(param)?;
        } else {
            return Err(FuncOptError::ChildNotFound {
                name: child_name.to_string(),
            });
        }
        self.sync_params();
        Ok(())
    }

    /// Read a parameter of the named child.
    pub fn param_of(&self, name: &str, child_name: &str) -> Result<&Parameter> {
        if self.a.name() == child_name {
            self.a.param(name)
        } else if self.b.name() == child_name {
            self.b.param(name)
        } else {
            Err(FuncOptError::ChildNotFound {
                name: child_name.to_string(),
            })
        }
    }

    fn child_has_param(child: &dyn Function, name: &str) -> bool {
        child.params().iter().any(|p| p.name() == name)
    }
}

impl Function for CompositeFunction {
    fn core(&self) -> &FuncCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut FuncCore {
        &mut self.core
    }

    fn evaluate(&self, arg: &Arg) -> Result<f64> {
        let va = self.a.evaluate(arg)?;
        let vb = self.b.evaluate(arg)?;
        Ok(match self.op {
            CompositeOp::Sum => va + vb,
            CompositeOp::Product => va * vb,
        })
    }

    fn deriv_by_param(&self, arg: &Arg, name: &str) -> Result<f64> {
        let in_a = Self::child_has_param(self.a.as_ref(), name);
        let in_b = Self::child_has_param(self.b.as_ref(), name);
        if !in_a && !in_b {
            return Err(FuncOptError::ParameterNotFound {
                name: name.to_string(),
                function: self.name().to_string(),
            });
        }

        // Accumulate contributions from both children so a name shared by
        // both still gets the full sum/product rule.
        let mut deriv = 0.0;
        match self.op {
            CompositeOp::Sum => {
                if in_a {
                    deriv += self.a.deriv_by_param(arg, name)?;
                }
                if in_b {
                    deriv += self.b.deriv_by_param(arg, name)?;
                }
            }
            CompositeOp::Product => {
                if in_a {
                    deriv += self.a.deriv_by_param(arg, name)? * self.b.evaluate(arg)?;
                }
                if in_b {
                    deriv += self.a.evaluate(arg)? * self.b.deriv_by_param(arg, name)?;
                }
            }
        }
        Ok(deriv)
    }

    fn clone_box(&self) -> Box<dyn Function> {
        Box::new(self.clone())
    }

    fn set_param(&mut self, param: &Parameter) -> Result<()> {
        // Route to whichever child owns the name, preferring `a` when both do.
        if Self::child_has_param(self.a.as_ref(), param.name()) {
            self.a.set_param(param)?;
        } else if Self::child_has_param(self.b.as_ref(), param.name()) {
            self.b.set_param(param)?;
        } else {
            return Err(FuncOptError::ParameterNotFound {
                name: param.name().to_string(),
                function: self.name().to_string(),
            });
        }
        self.sync_params();
        Ok(())
    }

    fn write_param_values(&mut self, values: &[f64]) -> Result<usize> {
        let used_a = self.a.write_param_values(values)?;
        let used_b = self.b.write_param_values(&values[used_a..])?;
        self.sync_params();
        Ok(used_a + used_b)
    }

    fn write_free_param_values(&mut self, values: &[f64]) -> Result<usize> {
        let used_a = self.a.write_free_param_values(values)?;
        let used_b = self.b.write_free_param_values(&values[used_a..])?;
        self.sync_params();
        Ok(used_a + used_b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ConstantValue, PowerLaw};
    use approx::assert_relative_eq;

    fn concat_invariant_holds(c: &CompositeFunction) -> bool {
        let mut expected = c.a().params().to_vec();
        expected.extend_from_slice(c.b().params());
        c.params() == expected.as_slice()
    }

    #[test]
    fn test_sum_and_product_values() {
        let pl = PowerLaw::new(2.0, -1.0, 1.0).unwrap();
        let cv = ConstantValue::new(3.0).unwrap();

        let sum = CompositeFunction::sum(&pl, &cv);
        let product = CompositeFunction::product(&pl, &cv);

        let arg = Arg::Scalar(2.0);
        // pl(2) = 2 * 2^-1 = 1
        assert_relative_eq!(sum.evaluate(&arg).unwrap(), 4.0);
        assert_relative_eq!(product.evaluate(&arg).unwrap(), 3.0);
    }

    #[test]
    fn test_params_are_concatenation() {
        let pl = PowerLaw::new(2.0, -1.0, 1.0).unwrap();
        let cv = ConstantValue::new(3.0).unwrap();
        let mut c = CompositeFunction::sum(&pl, &cv);

        assert_eq!(c.params().len(), 4);
        assert_eq!(
            c.param_names(),
            vec!["Prefactor", "Index", "Scale", "Value"]
        );
        assert!(concat_invariant_holds(&c));

        // Routed mutation re-derives the list.
        let new_value = Parameter::new("Value", 7.0, true);
        c.set_param_for(&new_value, "ConstantValue").unwrap();
        assert!(concat_invariant_holds(&c));
        assert_eq!(c.params()[3].value(), 7.0);

        // Positional writes re-derive the list.
        c.set_param_values(&[1.0, -2.0, 10.0, 5.0]).unwrap();
        assert!(concat_invariant_holds(&c));
        assert_eq!(c.a().param("Index").unwrap().value(), -2.0);
        assert_eq!(c.b().param("Value").unwrap().value(), 5.0);

        c.set_free_param_values(&[4.0, -1.5, 6.0]).unwrap();
        assert!(concat_invariant_holds(&c));
        // Fixed "Scale" skipped.
        assert_eq!(c.param_values(), vec![4.0, -1.5, 10.0, 6.0]);
    }

    #[test]
    fn test_marshaling_routes_into_children() {
        let pl = PowerLaw::new(2.0, -1.0, 1.0).unwrap();
        let cv = ConstantValue::new(3.0).unwrap();
        let mut c = CompositeFunction::product(&pl, &cv);

        c.set_free_param_values(&[5.0, -2.0, 4.0]).unwrap();
        // The children, not just the derived view, hold the new values.
        assert_eq!(c.a().param("Prefactor").unwrap().value(), 5.0);
        assert_eq!(c.a().param("Index").unwrap().value(), -2.0);
        assert_eq!(c.b().param("Value").unwrap().value(), 4.0);

        // Evaluation reflects the marshaled state: 5 * x^-2 * 4 at x = 1.
        let v = c.evaluate(&Arg::Scalar(1.0)).unwrap();
        assert_relative_eq!(v, 20.0);
    }

    #[test]
    fn test_child_not_found() {
        let pl = PowerLaw::new(2.0, -1.0, 1.0).unwrap();
        let cv = ConstantValue::new(3.0).unwrap();
        let mut c = CompositeFunction::sum(&pl, &cv);

        let p = Parameter::new("Value", 1.0, true);
        let err = c.set_param_for(&p, "Gaussian").unwrap_err();
        assert_eq!(
            err,
            FuncOptError::ChildNotFound {
                name: "Gaussian".to_string()
            }
        );
        assert!(c.param_of("Value", "Gaussian").is_err());
        assert_eq!(c.param_of("Value", "ConstantValue").unwrap().value(), 3.0);
    }

    #[test]
    fn test_construction_does_not_alias() {
        let mut pl = PowerLaw::new(2.0, -1.0, 1.0).unwrap();
        let cv = ConstantValue::new(3.0).unwrap();
        let c = CompositeFunction::sum(&pl, &cv);

        // Mutating the caller's original never changes the composite's child.
        pl.set_free_param_values(&[9.0, -9.0]).unwrap();
        assert_eq!(c.a().param("Prefactor").unwrap().value(), 2.0);
    }

    #[test]
    fn test_clone_isolation() {
        let pl = PowerLaw::new(2.0, -1.0, 1.0).unwrap();
        let cv = ConstantValue::new(3.0).unwrap();
        let c = CompositeFunction::product(&pl, &cv);

        let mut copy = c.clone();
        copy.set_free_param_values(&[1.0, 1.0, 1.0]).unwrap();

        assert_eq!(c.free_param_values(), vec![2.0, -1.0, 3.0]);
        assert!(concat_invariant_holds(&copy));

        let arg = Arg::Scalar(3.0);
        assert_ne!(
            c.evaluate(&arg).unwrap(),
            copy.evaluate(&arg).unwrap()
        );
    }

    #[test]
    fn test_nested_composites() {
        let pl = PowerLaw::new(2.0, -1.0, 1.0).unwrap();
        let cv = ConstantValue::new(3.0).unwrap();
        let inner = CompositeFunction::product(&pl, &cv);
        let outer_leaf = ConstantValue::new(10.0).unwrap();
        let mut outer = CompositeFunction::sum(&inner, &outer_leaf);

        assert_eq!(outer.params().len(), 5);
        // 2*x^-1*3 + 10 at x = 2 -> 3 + 10
        assert_relative_eq!(outer.evaluate(&Arg::Scalar(2.0)).unwrap(), 13.0);

        // Free marshaling reaches the grandchildren.
        outer.set_free_param_values(&[4.0, -1.0, 3.0, 20.0]).unwrap();
        assert_relative_eq!(outer.evaluate(&Arg::Scalar(2.0)).unwrap(), 26.0);
        assert!(concat_invariant_holds(&outer));
    }

    #[test]
    fn test_product_derivative_matches_central_difference() {
        let pl = PowerLaw::new(2.0, -1.5, 1.0).unwrap();
        let cv = ConstantValue::new(3.0).unwrap();
        let c = CompositeFunction::product(&pl, &cv);

        let h = 1e-6;
        for &x in &[0.5, 1.0, 2.0, 5.0] {
            let arg = Arg::Scalar(x);
            for p in c.free_params() {
                let analytic = c.deriv_by_param(&arg, p.name()).unwrap();

                let mut plus = c.clone();
                let mut shifted = p.clone();
                shifted.set_value(p.value() + h).unwrap();
                plus.set_param(&shifted).unwrap();

                let mut minus = c.clone();
                shifted.set_value(p.value() - h).unwrap();
                minus.set_param(&shifted).unwrap();

                let numeric = (plus.evaluate(&arg).unwrap() - minus.evaluate(&arg).unwrap())
                    / (2.0 * h);
                assert_relative_eq!(analytic, numeric, max_relative = 1e-4, epsilon = 1e-7);
            }
        }
    }

    #[test]
    fn test_sum_derivative_is_sum_of_child_derivs() {
        let pl = PowerLaw::new(2.0, -1.5, 1.0).unwrap();
        let cv = ConstantValue::new(3.0).unwrap();
        let c = CompositeFunction::sum(&pl, &cv);

        let arg = Arg::Scalar(2.0);
        let d = c.deriv_by_param(&arg, "Index").unwrap();
        let expected = pl.deriv_by_param(&arg, "Index").unwrap();
        assert_relative_eq!(d, expected);

        let d = c.deriv_by_param(&arg, "Value").unwrap();
        assert_relative_eq!(d, cv.deriv_by_param(&arg, "Value").unwrap());

        assert!(c.deriv_by_param(&arg, "Missing").is_err());
    }
}
