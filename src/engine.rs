//! A bundled minimization engine with a context-free callback convention.
//!
//! `DescentEngine` stands in for the class of external engines that accept a
//! fixed-signature free callback carrying no user context: it is configured
//! with per-parameter names, starting values, and bounds, repeatedly invokes
//! the callback with a trial vector and a mode flag, and reports termination
//! through an integer status code. The adapter layer treats the algorithm
//! inside as opaque; only the calling convention matters.
//!
//! Callback contract: the callback fills `out.value` (and `out.grad` when the
//! mode requests it) and returns `STATUS_OK`, or returns a nonzero code to
//! abort the run. An abort code is passed through unchanged as the engine's
//! own return status, so the caller can recover the originating condition.

/// Normal termination.
pub const STATUS_OK: i32 = 0;
/// The engine rejected its configuration.
pub const STATUS_BAD_CONFIG: i32 = 1;
/// The evaluation budget ran out, or no descent step could be found.
pub const STATUS_NO_CONVERGENCE: i32 = 4;

/// What the engine wants from an evaluation callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Only `out.value` is read back.
    Value,
    /// Both `out.value` and `out.grad` are read back.
    ValueAndGrad,
}

/// Output slots an evaluation callback fills in.
#[derive(Debug, Default, Clone)]
pub struct FcnOut {
    pub value: f64,
    pub grad: Vec<f64>,
}

/// The fixed-signature evaluation callback. A plain function pointer: there
/// is no closure state and no user-context argument.
pub type Fcn = fn(x: &[f64], mode: Mode, out: &mut FcnOut) -> i32;

#[derive(Debug, Clone)]
struct EngineParam {
    #[allow(dead_code)] // names are configuration surface, reported in diagnostics only
    name: String,
    value: f64,
    lower: f64,
    upper: f64,
}

/// Projected-gradient minimizer with backtracking line search.
#[derive(Debug, Clone)]
pub struct DescentEngine {
    params: Vec<EngineParam>,
    max_eval: usize,
    tol: f64,
    best: Vec<f64>,
    best_value: f64,
    uncertainties: Vec<f64>,
    n_eval: usize,
}

impl Default for DescentEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl DescentEngine {
    pub fn new() -> Self {
        Self {
            params: Vec::new(),
            max_eval: 200,
            tol: 1e-8,
            best: Vec::new(),
            best_value: f64::INFINITY,
            uncertainties: Vec::new(),
            n_eval: 0,
        }
    }

    /// Configure one parameter: name, starting value, and bounds.
    pub fn add_param(&mut self, name: &str, value: f64, lower: f64, upper: f64) {
        self.params.push(EngineParam {
            name: name.to_string(),
            value,
            lower,
            upper,
        });
    }

    /// Evaluation budget for one run.
    pub fn set_max_eval(&mut self, max_eval: usize) {
        self.max_eval = max_eval;
    }

    /// Convergence tolerance on the projected-gradient max norm.
    pub fn set_tol(&mut self, tol: f64) {
        self.tol = tol;
    }

    /// Best vector found; meaningful only after a `STATUS_OK` run.
    pub fn best(&self) -> &[f64] {
        &self.best
    }

    pub fn best_value(&self) -> f64 {
        self.best_value
    }

    /// Parabolic per-parameter uncertainty estimates at the minimum.
    pub fn uncertainties(&self) -> &[f64] {
        &self.uncertainties
    }

    pub fn n_eval(&self) -> usize {
        self.n_eval
    }

    fn invoke(&mut self, fcn: Fcn, x: &[f64], mode: Mode, out: &mut FcnOut) -> i32 {
        self.n_eval += 1;
        fcn(x, mode, out)
    }

    /// Drive the callback to a local minimum. Returns `STATUS_OK`,
    /// `STATUS_BAD_CONFIG`, `STATUS_NO_CONVERGENCE`, or a nonzero abort code
    /// passed through from the callback.
    pub fn run(&mut self, fcn: Fcn) -> i32 {
        let n = self.params.len();
        if n == 0 {
            return STATUS_BAD_CONFIG;
        }
        let lower: Vec<f64> = self.params.iter().map(|p| p.lower).collect();
        let upper: Vec<f64> = self.params.iter().map(|p| p.upper).collect();
        let mut x: Vec<f64> = self
            .params
            .iter()
            .map(|p| p.value.clamp(p.lower, p.upper))
            .collect();

        self.n_eval = 0;
        self.best.clear();
        self.best_value = f64::INFINITY;
        self.uncertainties.clear();

        let mut out = FcnOut::default();
        let status = self.invoke(fcn, &x, Mode::ValueAndGrad, &mut out);
        if status != STATUS_OK {
            return status;
        }
        let mut fx = out.value;
        let mut gx = out.grad.clone();
        if gx.len() != n {
            return STATUS_BAD_CONFIG;
        }
        self.best = x.clone();
        self.best_value = fx;

        while self.n_eval < self.max_eval {
            // Freeze components that would push through an active bound.
            let pg: Vec<f64> = (0..n)
                .map(|i| {
                    if (x[i] <= lower[i] && gx[i] > 0.0) || (x[i] >= upper[i] && gx[i] < 0.0) {
                        0.0
                    } else {
                        gx[i]
                    }
                })
                .collect();
            let gnorm = pg.iter().fold(0.0_f64, |m, g| m.max(g.abs()));
            if gnorm <= self.tol {
                self.best = x.clone();
                self.best_value = fx;
                return self.estimate_uncertainties(fcn, fx);
            }

            // Backtracking line search along the projected descent direction.
            let mut t = 1.0 / gnorm.max(1.0);
            let mut accepted = false;
            while t > 1e-16 && self.n_eval < self.max_eval {
                let xt: Vec<f64> = (0..n)
                    .map(|i| (x[i] - t * pg[i]).clamp(lower[i], upper[i]))
                    .collect();
                let gd: f64 = (0..n).map(|i| gx[i] * (xt[i] - x[i])).sum();
                let status = self.invoke(fcn, &xt, Mode::Value, &mut out);
                if status != STATUS_OK {
                    return status;
                }
                if gd < 0.0 && out.value <= fx + 1e-4 * gd {
                    x = xt;
                    fx = out.value;
                    accepted = true;
                    break;
                }
                t *= 0.5;
            }
            if !accepted {
                return STATUS_NO_CONVERGENCE;
            }
            if fx < self.best_value {
                self.best = x.clone();
                self.best_value = fx;
            }

            let status = self.invoke(fcn, &x, Mode::ValueAndGrad, &mut out);
            if status != STATUS_OK {
                return status;
            }
            fx = out.value;
            gx = out.grad.clone();
            if gx.len() != n {
                return STATUS_BAD_CONFIG;
            }
        }
        STATUS_NO_CONVERGENCE
    }

    /// Central second differences along each axis at the minimum; the
    /// uncertainty is `sqrt(1 / d2f)` where the curvature is positive.
    fn estimate_uncertainties(&mut self, fcn: Fcn, f0: f64) -> i32 {
        let n = self.best.len();
        let mut out = FcnOut::default();
        let mut uncertainties = Vec::with_capacity(n);
        let best = self.best.clone();
        for i in 0..n {
            let xi = best[i];
            let h = (1e-4 * xi.abs().max(1.0))
                .min(self.params[i].upper - xi)
                .min(xi - self.params[i].lower);
            if !(h > 0.0) {
                // Pinned to a bound; no symmetric step exists.
                uncertainties.push(0.0);
                continue;
            }
            let mut xp = best.clone();

            xp[i] = xi + h;
            let status = self.invoke(fcn, &xp, Mode::Value, &mut out);
            if status != STATUS_OK {
                return status;
            }
            let f_plus = out.value;

            xp[i] = xi - h;
            let status = self.invoke(fcn, &xp, Mode::Value, &mut out);
            if status != STATUS_OK {
                return status;
            }
            let f_minus = out.value;

            let d2 = (f_plus - 2.0 * f0 + f_minus) / (h * h);
            uncertainties.push(if d2 > 0.0 { (1.0 / d2).sqrt() } else { 0.0 });
        }
        self.uncertainties = uncertainties;
        STATUS_OK
    }
}
