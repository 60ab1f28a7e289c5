//! Trampoline adapter: drives the bundled [`DescentEngine`] over a
//! [`Statistic`].
//!
//! The engine's callback is a plain function pointer with no user-context
//! argument, so the adapter parks a pointer to the active Statistic in a
//! process-wide slot for the duration of the run. The trampoline function
//! retrieves it on every engine evaluation. The slot admits one run at a
//! time: acquiring it while occupied is an error, never a silent overwrite.
//!
//! Conditions raised inside the callback cannot unwind through the engine;
//! they are converted to the condition's integer code, which aborts the run
//! and comes back as the engine's return status.

use std::sync::Mutex;

use crate::engine::{DescentEngine, Fcn, FcnOut, Mode, STATUS_BAD_CONFIG, STATUS_NO_CONVERGENCE, STATUS_OK};
use crate::error::{FuncOptError, Result};
use crate::function::Function;
use crate::optimizer::{record_uncertainties, Optimizer, RunState, Tolerance};
use crate::statistic::Statistic;

struct SlotHandle(*mut (dyn Statistic + 'static));

// The slot is only ever dereferenced on the thread that filled it, inside
// the synchronous engine run bracketed by the guard.
unsafe impl Send for SlotHandle {}

static ACTIVE_STAT: Mutex<Option<SlotHandle>> = Mutex::new(None);

// A condition raised inside the trampoline, kept so the adapter can report
// its descriptive text and not just the code the engine echoes back.
static PENDING_CONDITION: Mutex<Option<FuncOptError>> = Mutex::new(None);

fn stash_condition(err: FuncOptError) -> i32 {
    let code = err.code();
    let mut pending = PENDING_CONDITION.lock().unwrap_or_else(|e| e.into_inner());
    *pending = Some(err);
    code
}

/// Occupancy of the trampoline slot. Clears the slot when dropped, on every
/// exit path of a run.
#[derive(Debug)]
struct SlotGuard;

impl SlotGuard {
    fn acquire(stat: &mut (dyn Statistic + '_)) -> Result<Self> {
        let mut slot = ACTIVE_STAT.lock().unwrap_or_else(|e| e.into_inner());
        if slot.is_some() {
            return Err(FuncOptError::EngineFailure {
                code: STATUS_BAD_CONFIG,
                message: "another trampoline run is already active".to_string(),
            });
        }
        let ptr: *mut (dyn Statistic + '_) = stat;
        // The guard outlives every dereference: the engine run is synchronous
        // and the slot is cleared before `stat`'s borrow ends.
        let ptr: *mut (dyn Statistic + 'static) = unsafe { std::mem::transmute(ptr) };
        *slot = Some(SlotHandle(ptr));
        let mut pending = PENDING_CONDITION.lock().unwrap_or_else(|e| e.into_inner());
        *pending = None;
        Ok(Self)
    }

    /// The condition the trampoline aborted on during this run, if any.
    fn take_condition(&self) -> Option<FuncOptError> {
        PENDING_CONDITION
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
    }
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        let mut slot = ACTIVE_STAT.lock().unwrap_or_else(|e| e.into_inner());
        *slot = None;
    }
}

/// The engine-facing evaluation entry point. Fetches the active Statistic
/// from the slot, marshals the trial vector, and fills the output slots with
/// the negated value and gradient.
fn trampoline(x: &[f64], mode: Mode, out: &mut FcnOut) -> i32 {
    let slot = ACTIVE_STAT.lock().unwrap_or_else(|e| e.into_inner());
    let handle = match slot.as_ref() {
        Some(handle) => handle,
        None => return STATUS_BAD_CONFIG,
    };
    let stat = unsafe { &mut *handle.0 };

    if let Err(e) = stat.set_free_param_values(x) {
        return stash_condition(e);
    }
    match stat.value() {
        Ok(value) => out.value = -value,
        Err(e) => return stash_condition(e),
    }
    if mode == Mode::ValueAndGrad {
        match stat.free_gradient() {
            Ok(grad) => out.grad = grad.iter().map(|g| -g).collect(),
            Err(e) => return stash_condition(e),
        }
    }
    STATUS_OK
}

fn status_message(code: i32) -> String {
    match code {
        STATUS_BAD_CONFIG => "the engine rejected its configuration".to_string(),
        STATUS_NO_CONVERGENCE => {
            "the engine exhausted its budget without finding a minimum".to_string()
        }
        other => format!("the evaluation callback aborted with code {other}"),
    }
}

/// Adapter bridging a Statistic to the bundled descent engine through the
/// trampoline slot.
pub struct Descent<'a> {
    stat: &'a mut (dyn Statistic + 'a),
    state: RunState,
    uncertainties: Vec<f64>,
    max_eval: usize,
    tol: Tolerance,
}

impl<'a> Descent<'a> {
    /// Bind the adapter to one Statistic for the duration of one run.
    pub fn new(stat: &'a mut (dyn Statistic + 'a)) -> Self {
        Self {
            stat,
            state: RunState::Idle,
            uncertainties: Vec::new(),
            max_eval: 200,
            tol: Tolerance::default(),
        }
    }

    pub fn set_max_eval(&mut self, max_eval: usize) {
        self.max_eval = max_eval;
    }

    pub fn set_tolerance(&mut self, tol: Tolerance) {
        self.tol = tol;
    }

    fn fail(&mut self, err: FuncOptError) -> Result<()> {
        self.state = RunState::Failed;
        Err(err)
    }
}

impl Optimizer for Descent<'_> {
    fn find_min(&mut self) -> Result<()> {
        self.state = RunState::Configuring;
        self.uncertainties.clear();

        let mut engine = DescentEngine::new();
        {
            let free = self.stat.free_params();
            if free.is_empty() {
                return self.fail(FuncOptError::EngineFailure {
                    code: STATUS_BAD_CONFIG,
                    message: "the statistic has no free parameters".to_string(),
                });
            }
            for param in free {
                let (lower, upper) = param.bounds();
                engine.add_param(param.name(), param.value(), lower, upper);
            }
        }
        // Only a relative tolerance needs the objective's current magnitude.
        let tol = match self.tol {
            Tolerance::Absolute(t) => t,
            Tolerance::Relative(_) => match self.stat.value() {
                Ok(v) => self.tol.resolve(v),
                Err(e) => return self.fail(e),
            },
        };
        engine.set_max_eval(self.max_eval);
        engine.set_tol(tol);

        let guard = match SlotGuard::acquire(&mut *self.stat) {
            Ok(guard) => guard,
            Err(e) => return self.fail(e),
        };
        self.state = RunState::Running;
        let status = engine.run(trampoline as Fcn);
        let condition = guard.take_condition();
        drop(guard);

        if status != STATUS_OK {
            // Prefer the originating condition's own text over the bare
            // status code when the abort came from the trampoline.
            let message = match condition {
                Some(e) if e.code() == status => e.to_string(),
                _ => status_message(status),
            };
            return self.fail(FuncOptError::EngineFailure {
                code: status,
                message,
            });
        }

        if let Err(e) = self.stat.set_free_param_values(engine.best()) {
            return self.fail(e);
        }
        self.uncertainties = engine.uncertainties().to_vec();
        record_uncertainties(&mut *self.stat, &self.uncertainties);
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::function::{Arg, ArgKind, FuncCore};
    use crate::models::Rosen;

    // The slot is process-wide; serialize the tests that touch it.
    static TEST_LOCK: Mutex<()> = Mutex::new(());

    // Evaluation always raises, as if a marshaled value fell outside the
    // bounds of some internal quantity.
    #[derive(Clone)]
    struct AlwaysOutOfBounds {
        core: FuncCore,
    }

    impl AlwaysOutOfBounds {
        fn new() -> Self {
            let mut core = FuncCore::new("AlwaysOutOfBounds", 1, ArgKind::None);
            core.add_param("x", 0.5, true).unwrap();
            Self { core }
        }
    }

    impl crate::function::Function for AlwaysOutOfBounds {
        fn core(&self) -> &FuncCore {
            &self.core
        }

        fn core_mut(&mut self) -> &mut FuncCore {
            &mut self.core
        }

        fn evaluate(&self, _arg: &Arg) -> crate::error::Result<f64> {
            Err(FuncOptError::OutOfBounds {
                value: 7.0,
                min: 0.0,
                max: 1.0,
            })
        }

        fn deriv_by_param(&self, _arg: &Arg, _name: &str) -> crate::error::Result<f64> {
            Ok(0.0)
        }

        fn clone_box(&self) -> Box<dyn crate::function::Function> {
            Box::new(self.clone())
        }
    }

    impl Statistic for AlwaysOutOfBounds {}

    #[test]
    fn test_callback_condition_text_is_preserved() {
        let _serial = TEST_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let mut stat = AlwaysOutOfBounds::new();

        let mut opt = Descent::new(&mut stat);
        let err = opt.find_min().unwrap_err();
        assert_eq!(opt.run_state(), RunState::Failed);

        let expected_code = FuncOptError::OutOfBounds {
            value: 7.0,
            min: 0.0,
            max: 1.0,
        }
        .code();
        match err {
            FuncOptError::EngineFailure { code, message } => {
                assert_eq!(code, expected_code);
                // The condition's own text, not a synthesized status line.
                assert_eq!(message, "value 7 is not between 0 and 1");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_slot_rejects_second_acquire() {
        let _serial = TEST_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let mut first = Rosen::new(1.0).unwrap();
        let mut second = Rosen::new(1.0).unwrap();

        let guard = SlotGuard::acquire(&mut first).unwrap();
        let err = SlotGuard::acquire(&mut second).unwrap_err();
        assert_eq!(err.code(), STATUS_BAD_CONFIG);
        drop(guard);

        // Released on drop; the slot is usable again.
        SlotGuard::acquire(&mut second).unwrap();
    }

    #[test]
    fn test_slot_cleared_on_every_exit_path() {
        let _serial = TEST_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let mut rosen = Rosen::new(100.0).unwrap();
        rosen.set_free_param_values(&[-1.2, 1.0]).unwrap();

        // Starve the budget so the run fails; the guard must still release.
        let mut opt = Descent::new(&mut rosen);
        opt.set_max_eval(3);
        let err = opt.find_min().unwrap_err();
        assert_eq!(err.code(), STATUS_NO_CONVERGENCE);
        assert_eq!(opt.run_state(), RunState::Failed);
        drop(opt);

        assert!(ACTIVE_STAT
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_none());

        // And the next run can acquire the slot again.
        SlotGuard::acquire(&mut rosen).unwrap();
    }
}
