/*
    Equinox, numerical orbit propagation
    Copyright (C) 2026 Equinox contributors

    This program is free software: you can redistribute it and/or modify
    it under the terms of the GNU Affero General Public License as published
    by the Free Software Foundation, either version 3 of the License, or
    (at your option) any later version.

    This program is distributed in the hope that it will be useful,
    but WITHOUT ANY WARRANTY; without even the implied warranty of
    MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
    GNU Affero General Public License for more details.

    You should have received a copy of the GNU Affero General Public License
    along with this program.  If not, see <https://www.gnu.org/licenses/>.
*/

use super::{largest_error, IntegrationDetails, PropOpts, RK};
use crate::linalg::allocator::Allocator;
use crate::linalg::{DefaultAllocator, DimName, OVector};
use crate::time::Unit;
use thiserror::Error;

/// Absolute tolerance, in seconds, below which two integration times are the same
const T_TOL: f64 = 1e-9;

/// Stores ODE solver errors.
///
/// The solver cannot carry rich error objects through its callbacks: a failed
/// derivative or event evaluation surfaces as [`IntegratorError::DerivativeFailure`]
/// or a diverging root search, and the caller which parked the original error
/// re-raises it in preference to these.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum IntegratorError {
    #[error("step size underflow at t = {t} s: minimum step reached with the error above tolerance")]
    StepSizeUnderflow { t: f64 },
    #[error("non finite state or derivative at t = {t} s")]
    NonFiniteDerivative { t: f64 },
    #[error("event root search did not converge within {max_iterations} iterations near t = {t} s")]
    RootSearch { t: f64, max_iterations: usize },
    #[error("derivative evaluation failed at t = {t} s")]
    DerivativeFailure { t: f64 },
}

/// Flow control returned by an ODE-level event once it has fired.
///
/// These codes belong to the solver: orbital event actions are translated
/// into them by the propagation driver and never exposed to force models.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FlowControl {
    /// Keep integrating through the event
    Continue,
    /// Terminate at the event time
    Stop,
    /// Restart the step from the event time, recomputing the derivatives
    RecomputeDerivatives,
    /// Mutate the state vector through [`OdeEvent::mutate`], then restart
    MutateState,
}

/// A first order differential system `dy/dt = f(t, y)`.
///
/// The time `t` is in seconds past the integration start. Implementors which
/// can fail must park their own error and return
/// [`IntegratorError::DerivativeFailure`].
pub trait OdeSystem<N: DimName>
where
    DefaultAllocator: Allocator<f64, N>,
{
    fn eom(&mut self, t: f64, y: &OVector<f64, N>) -> Result<OVector<f64, N>, IntegratorError>;
}

/// An event function at the solver level: a scalar `g(t, y)` sampled along
/// the integration, with sign changes located by bisection.
pub trait OdeEvent<N: DimName>
where
    DefaultAllocator: Allocator<f64, N>,
{
    /// The switching scalar. A NaN marks an evaluation failure and aborts the search.
    fn g(&mut self, t: f64, y: &OVector<f64, N>) -> f64;

    /// Called at the located root, returns what the integration should do
    fn fired(&mut self, t: f64, y: &OVector<f64, N>) -> FlowControl;

    /// Only called after `fired` returned [`FlowControl::MutateState`]:
    /// replaces `y` in place at the event time.
    fn mutate(&mut self, t: f64, y: &mut OVector<f64, N>);

    /// Maximum integration time between two samples of `g`, in seconds
    fn max_check(&self) -> f64;

    /// Convergence tolerance of the root location, in seconds
    fn threshold(&self) -> f64;

    /// Bisection budget of the root search
    fn max_iterations(&self) -> usize;
}

/// The dense output of one integration step: a cubic Hermite model of
/// `t -> y(t)` built on both endpoint states and derivatives.
///
/// The polynomial is anchored on `[t0, t0 + h]`; `tf` bounds the validity
/// window, which is shorter than the step when an event truncated it.
#[derive(Clone, Debug)]
pub struct StepInterpolator<N: DimName>
where
    DefaultAllocator: Allocator<f64, N>,
{
    pub t0: f64,
    /// Signed polynomial span (the raw step size)
    pub h: f64,
    /// End of the validity window (equals t0 + h for untruncated steps)
    pub tf: f64,
    pub y0: OVector<f64, N>,
    pub y1: OVector<f64, N>,
    pub f0: OVector<f64, N>,
    pub f1: OVector<f64, N>,
}

impl<N: DimName> StepInterpolator<N>
where
    DefaultAllocator: Allocator<f64, N>,
{
    /// Evaluates the Hermite model at the provided time, in seconds past the
    /// integration start. Meaningful for `t` within the validity window; the
    /// polynomial extrapolates smoothly slightly past it.
    pub fn eval(&self, t: f64) -> OVector<f64, N> {
        let theta = (t - self.t0) / self.h;
        let t2 = theta * theta;
        let t3 = t2 * theta;
        let h00 = 2.0 * t3 - 3.0 * t2 + 1.0;
        let h10 = t3 - 2.0 * t2 + theta;
        let h01 = -2.0 * t3 + 3.0 * t2;
        let h11 = t3 - t2;
        &self.y0 * h00 + &self.f0 * (h10 * self.h) + &self.y1 * h01 + &self.f1 * (h11 * self.h)
    }

    /// Restricts the validity window to `[t0, tf]`, keeping the same polynomial
    pub fn truncated(&self, tf: f64) -> Self {
        let mut me = self.clone();
        me.tf = tf;
        me
    }

    /// The state at the end of the validity window
    pub fn end_state(&self) -> OVector<f64, N> {
        if (self.tf - self.t0 - self.h).abs() <= T_TOL {
            self.y1.clone()
        } else {
            self.eval(self.tf)
        }
    }
}

/// A handler called after each accepted step with its dense output.
pub trait OdeStepHandler<N: DimName>
where
    DefaultAllocator: Allocator<f64, N>,
{
    fn handle_step(&mut self, interp: &StepInterpolator<N>, is_last: bool);
}

impl<N: DimName, T: OdeStepHandler<N> + ?Sized> OdeStepHandler<N> for &mut T
where
    DefaultAllocator: Allocator<f64, N>,
{
    fn handle_step(&mut self, interp: &StepInterpolator<N>, is_last: bool) {
        (**self).handle_step(interp, is_last)
    }
}

/// A step handler which does nothing, for plain terminal-state propagations.
pub struct DummyOdeHandler;

impl<N: DimName> OdeStepHandler<N> for DummyOdeHandler
where
    DefaultAllocator: Allocator<f64, N>,
{
    fn handle_step(&mut self, _interp: &StepInterpolator<N>, _is_last: bool) {}
}

/// What the event scan decided for the current candidate step
enum ScanOutcome<N: DimName>
where
    DefaultAllocator: Allocator<f64, N>,
{
    /// No event interrupts the step
    Accept,
    /// An event truncated the step at `t`; restart from there
    Truncate { t: f64, y: OVector<f64, N> },
    /// A stop event terminates the integration at `t`
    Finish { t: f64, y: OVector<f64, N> },
}

/// An embedded Runge Kutta integrator with adaptive step size, dense output
/// and event location.
///
/// The Butcher table is chosen at construction; the same instance can then
/// run any number of integrations.
#[derive(Clone, Debug)]
pub struct OdeIntegrator {
    pub opts: PropOpts,
    pub details: IntegrationDetails,
    order: u8,
    stages: usize,
    a_coeffs: &'static [f64],
    b_coeffs: &'static [f64],
    /// Suggested step magnitude for the next step, in seconds
    step_size: f64,
}

impl OdeIntegrator {
    /// Builds an integrator from a Runge Kutta method and options.
    pub fn new<T: RK>(opts: PropOpts) -> Self {
        Self::from_parts(T::ORDER, T::STAGES, T::A_COEFFS, T::B_COEFFS, opts)
    }

    pub(crate) fn from_parts(
        order: u8,
        stages: usize,
        a_coeffs: &'static [f64],
        b_coeffs: &'static [f64],
        opts: PropOpts,
    ) -> Self {
        Self {
            opts,
            details: IntegrationDetails {
                step: opts.init_step,
                error: 0.0,
                attempts: 1,
            },
            order,
            stages,
            a_coeffs,
            b_coeffs,
            step_size: opts.init_step.to_seconds().abs(),
        }
    }

    /// Integrates the provided system from `(t0, y0)` to `t1` (either
    /// direction), calling the step handler after each accepted step and
    /// locating the sign changes of every event on the way.
    ///
    /// Returns the final `(t, y)`: `t` equals `t1` unless a stop event
    /// terminated the integration earlier.
    pub fn integrate<N, S, H>(
        &mut self,
        system: &mut S,
        events: &mut [Box<dyn OdeEvent<N> + '_>],
        handler: &mut H,
        t0: f64,
        y0: &OVector<f64, N>,
        t1: f64,
    ) -> Result<(f64, OVector<f64, N>), IntegratorError>
    where
        N: DimName,
        S: OdeSystem<N>,
        H: OdeStepHandler<N>,
        DefaultAllocator: Allocator<f64, N>,
    {
        if (t1 - t0).abs() <= T_TOL {
            return Ok((t0, y0.clone()));
        }
        let dir = (t1 - t0).signum();
        self.step_size = self.opts.init_step.to_seconds().abs();

        let mut t = t0;
        let mut y = y0.clone();
        let mut f_current = system.eom(t, &y)?;
        if f_current.iter().any(|c| !c.is_finite()) {
            return Err(IntegratorError::NonFiniteDerivative { t });
        }

        // Pre-allocate the stage derivatives
        let mut k = vec![OVector::<f64, N>::zeros(); self.stages];
        // Last fired root per event, to avoid re-triggering on restart
        let mut last_fired: Vec<Option<f64>> = vec![None; events.len()];

        loop {
            // Clamp the step so the last one lands exactly on t1
            let mut proposed = dir * self.step_size;
            let mut force_fixed = false;
            if (t + proposed - t1) * dir >= 0.0 {
                proposed = t1 - t;
                force_fixed = true;
            }

            let (h, y_new) = self.try_step(system, t, &y, &f_current, proposed, force_fixed, &mut k)?;
            let t_new = t + h;
            let f_new = system.eom(t_new, &y_new)?;
            if f_new.iter().any(|c| !c.is_finite()) {
                return Err(IntegratorError::NonFiniteDerivative { t: t_new });
            }
            let interp = StepInterpolator {
                t0: t,
                h,
                tf: t_new,
                y0: y.clone(),
                y1: y_new.clone(),
                f0: f_current.clone(),
                f1: f_new.clone(),
            };
            let reached_end = (t_new - t1) * dir >= -T_TOL;

            match self.scan_events(events, &mut last_fired, &interp, dir, t1, handler)? {
                ScanOutcome::Finish { t: tr, y: yr } => {
                    self.details.step = (tr - t) * Unit::Second;
                    return Ok((tr, yr));
                }
                ScanOutcome::Truncate { t: tr, y: yr } => {
                    self.details.step = (tr - t) * Unit::Second;
                    let reached = (tr - t1) * dir >= -T_TOL;
                    if reached {
                        return Ok((tr, yr));
                    }
                    t = tr;
                    y = yr;
                    f_current = system.eom(t, &y)?;
                    if f_current.iter().any(|c| !c.is_finite()) {
                        return Err(IntegratorError::NonFiniteDerivative { t });
                    }
                }
                ScanOutcome::Accept => {
                    handler.handle_step(&interp, reached_end);
                    t = t_new;
                    y = y_new;
                    f_current = f_new;
                    if reached_end {
                        return Ok((t, y));
                    }
                }
            }
        }
    }

    /// Scans the candidate step for event sign changes, resolving them in
    /// increasing time order (registration order on ties) and applying at
    /// most one event per detector per step.
    #[allow(clippy::too_many_arguments)]
    fn scan_events<N, H>(
        &mut self,
        events: &mut [Box<dyn OdeEvent<N> + '_>],
        last_fired: &mut [Option<f64>],
        interp: &StepInterpolator<N>,
        dir: f64,
        t1: f64,
        handler: &mut H,
    ) -> Result<ScanOutcome<N>, IntegratorError>
    where
        N: DimName,
        H: OdeStepHandler<N>,
        DefaultAllocator: Allocator<f64, N>,
    {
        if events.is_empty() {
            return Ok(ScanOutcome::Accept);
        }

        // First root of each detector within the step. The state only
        // changes through a reset (which restarts the step), so the whole
        // collection stays valid while events merely continue.
        let mut candidates: Vec<(f64, usize)> = Vec::new();
        for (idx, event) in events.iter_mut().enumerate() {
            if let Some(root) =
                find_root(event.as_mut(), interp, interp.t0, interp.tf, last_fired[idx])?
            {
                candidates.push((root, idx));
            }
        }
        // Increasing time order, registration order on ties
        candidates.sort_by(|a, b| {
            (a.0 * dir)
                .partial_cmp(&(b.0 * dir))
                .expect("event roots are finite")
                .then(a.1.cmp(&b.1))
        });

        for (root, idx) in candidates {
            last_fired[idx] = Some(root);
            let y_root = interp.eval(root);

            match events[idx].fired(root, &y_root) {
                FlowControl::Continue => (),
                FlowControl::Stop => {
                    handler.handle_step(&interp.truncated(root), true);
                    return Ok(ScanOutcome::Finish { t: root, y: y_root });
                }
                FlowControl::RecomputeDerivatives => {
                    let reached = (root - t1) * dir >= -T_TOL;
                    handler.handle_step(&interp.truncated(root), reached);
                    return Ok(ScanOutcome::Truncate { t: root, y: y_root });
                }
                FlowControl::MutateState => {
                    let reached = (root - t1) * dir >= -T_TOL;
                    // The handler sees the step up to the event, pre-mutation
                    handler.handle_step(&interp.truncated(root), reached);
                    let mut y_mut = y_root;
                    events[idx].mutate(root, &mut y_mut);
                    return Ok(ScanOutcome::Truncate { t: root, y: y_mut });
                }
            }
        }
        Ok(ScanOutcome::Accept)
    }

    /// Takes one step from `(t, y)`, adapting the step size until the error
    /// estimate honors the tolerance. Returns the signed step used and the
    /// candidate state.
    #[allow(clippy::too_many_arguments)]
    fn try_step<N, S>(
        &mut self,
        system: &mut S,
        t: f64,
        y: &OVector<f64, N>,
        f0: &OVector<f64, N>,
        proposed: f64,
        force_fixed: bool,
        k: &mut [OVector<f64, N>],
    ) -> Result<(f64, OVector<f64, N>), IntegratorError>
    where
        N: DimName,
        S: OdeSystem<N>,
        DefaultAllocator: Allocator<f64, N>,
    {
        self.details.attempts = 1;
        let dir = proposed.signum();
        let mut step_size = proposed;
        let min_step = self.opts.min_step.to_seconds();
        let max_step = self.opts.max_step.to_seconds();
        let fixed = force_fixed || self.opts.fixed_step;

        loop {
            k[0] = f0.clone();
            let mut a_idx: usize = 0;
            for i in 0..(self.stages - 1) {
                // c_i = \sum_j a_ij for a consistent Butcher table
                let mut ci: f64 = 0.0;
                let mut wi = OVector::<f64, N>::zeros();
                for kj in &k[0..i + 1] {
                    let a_ij = self.a_coeffs[a_idx];
                    ci += a_ij;
                    wi += a_ij * kj;
                    a_idx += 1;
                }
                k[i + 1] = system.eom(ci * step_size + t, &(y + step_size * wi))?;
            }

            let mut next_state = y.clone();
            let mut error_est = OVector::<f64, N>::zeros();
            for (i, ki) in k.iter().enumerate() {
                let b_i = self.b_coeffs[i];
                if !fixed {
                    let b_i_star = self.b_coeffs[i + self.stages];
                    error_est += step_size * (b_i - b_i_star) * ki;
                }
                next_state += step_size * b_i * ki;
            }
            if next_state.iter().any(|c| !c.is_finite()) {
                return Err(IntegratorError::NonFiniteDerivative { t });
            }

            if fixed {
                self.details.step = step_size * Unit::Second;
                return Ok((step_size, next_state));
            }

            self.details.error = largest_error(&error_est, &next_state, y);
            if self.details.error <= self.opts.tolerance {
                self.details.step = step_size * Unit::Second;
                // Error below tolerance: attempt to increase the step for the next iteration
                let proposed_next = 0.9
                    * step_size.abs()
                    * (self.opts.tolerance / self.details.error)
                        .powf(1.0 / f64::from(self.order));
                self.step_size = proposed_next.min(max_step);
                return Ok((step_size, next_state));
            }
            if step_size.abs() <= min_step {
                return Err(IntegratorError::StepSizeUnderflow { t });
            }
            if self.details.attempts >= self.opts.attempts {
                warn!(
                    "Could not further decrease step size: maximum number of attempts reached ({})",
                    self.details.attempts
                );
                self.details.step = step_size * Unit::Second;
                self.step_size = step_size.abs();
                return Ok((step_size, next_state));
            }
            // Error too high: shrink and retry
            self.details.attempts += 1;
            let shrunk = 0.9
                * step_size.abs()
                * (self.opts.tolerance / self.details.error)
                    .powf(1.0 / f64::from(self.order - 1));
            step_size = dir * shrunk.max(min_step);
        }
    }
}

/// Locates the earliest sign change of the event scalar within `[a, b]` of
/// the provided dense output, sampling at most `max_check` apart and
/// bisecting to within `threshold`.
///
/// A root within `threshold` of `cooldown` is skipped: it is the event which
/// was just handled, seen again from the restart side.
fn find_root<N>(
    event: &mut dyn OdeEvent<N>,
    interp: &StepInterpolator<N>,
    a: f64,
    b: f64,
    cooldown: Option<f64>,
) -> Result<Option<f64>, IntegratorError>
where
    N: DimName,
    DefaultAllocator: Allocator<f64, N>,
{
    let span = b - a;
    if span.abs() <= T_TOL {
        return Ok(None);
    }
    let max_check = event.max_check().abs().max(T_TOL);
    let substeps = (span.abs() / max_check).ceil().max(1.0) as usize;
    let sub = span / substeps as f64;
    let threshold = event.threshold().abs().max(1e-12);
    let max_iterations = event.max_iterations();

    let mut ta = a;
    let mut ga = event.g(ta, &interp.eval(ta));
    if ga.is_nan() {
        return Err(IntegratorError::RootSearch {
            t: ta,
            max_iterations,
        });
    }

    for i in 1..=substeps {
        let tb = if i == substeps { b } else { a + sub * i as f64 };
        let gb = event.g(tb, &interp.eval(tb));
        if gb.is_nan() {
            return Err(IntegratorError::RootSearch {
                t: tb,
                max_iterations,
            });
        }

        if ga * gb < 0.0 || (ga != 0.0 && gb == 0.0) {
            // Bisect to the threshold
            let (mut lo, mut hi, mut glo) = (ta, tb, ga);
            let mut iterations = 0;
            while (hi - lo).abs() > threshold {
                if iterations >= max_iterations {
                    return Err(IntegratorError::RootSearch {
                        t: 0.5 * (lo + hi),
                        max_iterations,
                    });
                }
                iterations += 1;
                let mid = 0.5 * (lo + hi);
                let gmid = event.g(mid, &interp.eval(mid));
                if gmid.is_nan() {
                    return Err(IntegratorError::RootSearch {
                        t: mid,
                        max_iterations,
                    });
                }
                if glo * gmid <= 0.0 {
                    hi = mid;
                } else {
                    lo = mid;
                    glo = gmid;
                }
            }
            let root = 0.5 * (lo + hi);
            if cooldown.map_or(true, |c| (root - c).abs() > threshold) {
                return Ok(Some(root));
            }
            // Same root as the one just handled: keep scanning past it
        }
        ta = tb;
        ga = gb;
    }
    Ok(None)
}
