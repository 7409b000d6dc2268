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

use super::ephemeris::EphemerisRecorder;
use super::{
    CashKarp45, Dormand45, DummyOdeHandler, FixedStepHandler, FlowControl, IntegratedEphemeris,
    IntegrationDetails, IntegratorError, OdeEvent, OdeIntegrator, OdeStepHandler, OdeSystem,
    PropOpts, StepHandler, StepInterpolator, RK,
};
use crate::cosmic::{Frame, Orbit, Spacecraft};
use crate::dynamics::events::{EventAction, SwitchingFunction};
use crate::dynamics::{DynamicsError, ForceModel, TimeDerivatives};
use crate::errors::EquinoxError;
use crate::linalg::{OVector, U7};
use crate::time::{Duration, Epoch, Unit};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;
use std::sync::Arc;

/// The per-propagation value shared by the derivative, event and step-handler
/// adapters: everything needed to rebuild a space-dynamics view from the
/// integrator's `(t, y)` pair.
///
/// The integrated vector is `y = {sma, ex, ey, hx, hy, lv, mass}`, with `t`
/// in seconds past `start_date`. The additional states live here so a state
/// reset from an event can replace them for the rest of the propagation.
pub(crate) struct PropagationContext {
    pub start_date: Epoch,
    pub frame: Frame,
    pub retrograde: bool,
    pub extras: RefCell<BTreeMap<String, Vec<f64>>>,
}

impl PropagationContext {
    /// Rebuilds the osculating spacecraft state from the integrator view
    pub fn rebuild(&self, t: f64, y: &OVector<f64, U7>) -> Spacecraft {
        let mut orbit = Orbit::equinoctial(
            y[0],
            y[1],
            y[2],
            y[3],
            y[4],
            y[5],
            self.start_date + t * Unit::Second,
            self.frame,
        );
        orbit.retrograde = self.retrograde;
        Spacecraft {
            orbit,
            mass_kg: y[6],
            extras: self.extras.borrow().clone(),
        }
    }

    /// Flattens a spacecraft state into the integrator view
    pub fn flatten(sc: &Spacecraft) -> OVector<f64, U7> {
        OVector::<f64, U7>::from_row_slice(&[
            sc.orbit.sma,
            sc.orbit.ex,
            sc.orbit.ey,
            sc.orbit.hx,
            sc.orbit.hy,
            sc.orbit.lv,
            sc.mass_kg,
        ])
    }
}

/// Single writer, first error wins: a subsequent integrator fault is treated
/// as a consequence of the parked error, not an independent fault.
type StickySlot = Rc<RefCell<Option<EquinoxError>>>;

fn park(slot: &StickySlot, error: EquinoxError) {
    let mut slot = slot.borrow_mut();
    if slot.is_none() {
        *slot = Some(error);
    }
}

/// The ODE system of a propagation: rebuilds the equinoctial view at each
/// derivative call, lets every force model push its contribution into the
/// Gauss equations, and finalizes with the Kepler term.
struct SpacecraftOde<'a> {
    ctx: Rc<PropagationContext>,
    force_models: &'a [Arc<dyn ForceModel + 'a>],
    sticky: StickySlot,
}

impl<'a> OdeSystem<U7> for SpacecraftOde<'a> {
    fn eom(&mut self, t: f64, y: &OVector<f64, U7>) -> Result<OVector<f64, U7>, IntegratorError> {
        if self.sticky.borrow().is_some() {
            return Err(IntegratorError::DerivativeFailure { t });
        }
        if y[6] <= 0.0 {
            park(
                &self.sticky,
                DynamicsError::MassDepleted(self.ctx.start_date + t * Unit::Second).into(),
            );
            return Err(IntegratorError::DerivativeFailure { t });
        }
        let osc = self.ctx.rebuild(t, y);
        let mut adder = match TimeDerivatives::init(&osc.orbit, osc.mass_kg) {
            Ok(adder) => adder,
            Err(e) => {
                park(&self.sticky, e.into());
                return Err(IntegratorError::DerivativeFailure { t });
            }
        };
        for model in self.force_models {
            if let Err(e) = model.add_contribution(&osc, &mut adder) {
                park(&self.sticky, e.into());
                return Err(IntegratorError::DerivativeFailure { t });
            }
        }
        adder.add_kepler_contribution();
        if adder.is_poisoned() {
            park(&self.sticky, DynamicsError::NonFiniteContribution.into());
            return Err(IntegratorError::DerivativeFailure { t });
        }
        Ok(adder.into_vector())
    }
}

/// The fixed translation between orbital event actions and the solver's flow
/// control codes. Force model authors only ever see [`EventAction`].
fn translate(action: EventAction) -> FlowControl {
    match action {
        EventAction::Continue => FlowControl::Continue,
        EventAction::Stop => FlowControl::Stop,
        EventAction::ResetDerivatives => FlowControl::RecomputeDerivatives,
        EventAction::ResetState => FlowControl::MutateState,
    }
}

/// Wraps an orbital switching function into the solver's event contract.
struct MappingSwitchingFunction {
    swf: Arc<dyn SwitchingFunction>,
    ctx: Rc<PropagationContext>,
    sticky: StickySlot,
}

impl OdeEvent<U7> for MappingSwitchingFunction {
    fn g(&mut self, t: f64, y: &OVector<f64, U7>) -> f64 {
        let osc = self.ctx.rebuild(t, y);
        match self.swf.g(&osc) {
            Ok(value) => value,
            Err(e) => {
                park(&self.sticky, e.into());
                f64::NAN
            }
        }
    }

    fn fired(&mut self, t: f64, y: &OVector<f64, U7>) -> FlowControl {
        let osc = self.ctx.rebuild(t, y);
        match self.swf.event_occurred(&osc) {
            Ok(action) => translate(action),
            Err(e) => {
                park(&self.sticky, e.into());
                FlowControl::Stop
            }
        }
    }

    fn mutate(&mut self, t: f64, y: &mut OVector<f64, U7>) {
        let osc = self.ctx.rebuild(t, y);
        match self.swf.reset_state(&osc) {
            Ok(new_state) => {
                if new_state.orbit.frame != self.ctx.frame
                    || new_state.orbit.retrograde != self.ctx.retrograde
                {
                    park(
                        &self.sticky,
                        EquinoxError::Propagation(format!(
                            "state reset of {} changed the frame or the retrograde encoding",
                            self.swf
                        )),
                    );
                    return;
                }
                *y = PropagationContext::flatten(&new_state);
                self.ctx.extras.replace(new_state.extras);
            }
            Err(e) => park(&self.sticky, e.into()),
        }
    }

    fn max_check(&self) -> f64 {
        self.swf.max_check_interval().to_seconds()
    }

    fn threshold(&self) -> f64 {
        self.swf.threshold().to_seconds()
    }

    fn max_iterations(&self) -> usize {
        self.swf.max_iterations()
    }
}

/// Relays native integrator steps to a user [`StepHandler`], rebuilding the
/// spacecraft state at the end of each step.
struct OdeHandlerRelay<'h> {
    ctx: Rc<PropagationContext>,
    user: &'h mut dyn StepHandler,
}

impl<'h> OdeStepHandler<U7> for OdeHandlerRelay<'h> {
    fn handle_step(&mut self, interp: &StepInterpolator<U7>, is_last: bool) {
        let state = self.ctx.rebuild(interp.tf, &interp.end_state());
        self.user.handle(&state, is_last);
    }
}

/// Resamples the variable step dense output at uniform `Δt`, firing the user
/// callback at `initial + k·Δt` and always at the final date.
struct StepNormalizer<'h> {
    ctx: Rc<PropagationContext>,
    user: &'h mut dyn FixedStepHandler,
    /// Signed sampling period, in seconds
    h: f64,
    k: u64,
}

impl<'h> OdeStepHandler<U7> for StepNormalizer<'h> {
    fn handle_step(&mut self, interp: &StepInterpolator<U7>, is_last: bool) {
        let dir = self.h.signum();
        // Samples strictly inside [start, step end); the end of the
        // propagation itself is emitted by the is_last branch below.
        loop {
            let tau = self.k as f64 * self.h;
            if (tau - interp.tf) * dir < -1e-7 {
                let state = self.ctx.rebuild(tau, &interp.eval(tau));
                self.user.handle(&state, false);
                self.k += 1;
            } else {
                break;
            }
        }
        if is_last {
            let state = self.ctx.rebuild(interp.tf, &interp.end_state());
            self.user.handle(&state, true);
        }
    }
}

/// A propagator for a spacecraft state under a pluggable set of force
/// models, using numerical integration of the equinoctial elements and the
/// mass.
///
/// After creation the instance is empty: there is no perturbing force at
/// all, and the integrated orbit follows a Keplerian evolution only. Force
/// models added with [`Self::add_force_model`] contribute accelerations
/// through the Gauss planetary equations, and their switching functions are
/// wired into the integrator's event machinery. The same propagator can be
/// reused for several propagations; the force model list survives failures.
pub struct NumericalPropagator<'a> {
    /// Stores the integration options (tolerance, min/max step, etc.)
    pub opts: PropOpts,
    order: u8,
    stages: usize,
    a_coeffs: &'static [f64],
    b_coeffs: &'static [f64],
    force_models: Vec<Arc<dyn ForceModel + 'a>>,
    details: IntegrationDetails,
}

impl<'a> NumericalPropagator<'a> {
    /// Each propagator must be initialized with `new` which stores the
    /// Runge Kutta method and the propagation options.
    pub fn new<T: RK>(opts: PropOpts) -> Self {
        Self {
            opts,
            order: T::ORDER,
            stages: T::STAGES,
            a_coeffs: T::A_COEFFS,
            b_coeffs: T::B_COEFFS,
            force_models: Vec::new(),
            details: IntegrationDetails {
                step: opts.init_step,
                error: 0.0,
                attempts: 1,
            },
        }
    }

    /// A Dormand Prince 5(4) propagator with custom options (the default method).
    pub fn dormand45(opts: PropOpts) -> Self {
        Self::new::<Dormand45>(opts)
    }

    /// A Cash Karp 4(5) propagator with custom options.
    pub fn cash_karp45(opts: PropOpts) -> Self {
        Self::new::<CashKarp45>(opts)
    }

    /// The default propagator is a Dormand Prince 5(4) with the default options.
    pub fn default() -> Self {
        Self::dormand45(PropOpts::default())
    }

    /// Add a force model to the global perturbation model.
    ///
    /// Its switching functions, if any, are registered with the integrator on
    /// every subsequent propagation. If this method is never called, the
    /// integrated orbit follows a Keplerian evolution only.
    pub fn add_force_model(&mut self, model: Arc<dyn ForceModel + 'a>) {
        self.force_models.push(model);
    }

    /// Remove all perturbing force models and their switching functions.
    pub fn remove_all_force_models(&mut self) {
        self.force_models.clear();
    }

    /// Borrow the details of the latest integration step.
    pub fn latest_details(&self) -> &IntegrationDetails {
        &self.details
    }

    /// Propagate the provided state up to the target date and return the
    /// state at that date.
    ///
    /// The propagation direction follows the sign of `final_date - initial`:
    /// backward propagation is supported, with the caveat that every
    /// registered force model must be time reversible for the result to be
    /// meaningful.
    pub fn propagate(
        &mut self,
        initial: Spacecraft,
        final_date: Epoch,
    ) -> Result<Spacecraft, EquinoxError> {
        match self.prepare(&initial, final_date)? {
            None => Ok(initial),
            Some(ctx) => self.run(initial, final_date, ctx, &mut DummyOdeHandler),
        }
    }

    /// Propagate and store the dense output throughout the integration range.
    ///
    /// Returns both the terminal state and an ephemeris supporting random
    /// access at any interior date.
    pub fn propagate_with_ephemeris(
        &mut self,
        initial: Spacecraft,
        final_date: Epoch,
    ) -> Result<(Spacecraft, IntegratedEphemeris), EquinoxError> {
        let forward = final_date >= initial.orbit.dt;
        let mut recorder = EphemerisRecorder::new();
        let (state, ctx) = match self.prepare(&initial, final_date)? {
            None => {
                // No integration: the ephemeris covers nothing
                let ephemeris = recorder.into_ephemeris(
                    initial.orbit.dt,
                    initial.orbit.frame,
                    initial.orbit.retrograde,
                    initial.extras.clone(),
                    forward,
                );
                return Ok((initial, ephemeris));
            }
            Some(ctx) => (
                self.run(initial, final_date, ctx.clone(), &mut recorder)?,
                ctx,
            ),
        };
        let extras = ctx.extras.borrow().clone();
        Ok((
            state,
            recorder.into_ephemeris(ctx.start_date, ctx.frame, ctx.retrograde, extras, forward),
        ))
    }

    /// Propagate and call a user handler at fixed time steps, regardless of
    /// the internal integrator step size.
    ///
    /// The handler fires at every `initial + k·step` within the propagation
    /// span and always at the final date, where `is_last` is true.
    pub fn propagate_fixed_step(
        &mut self,
        initial: Spacecraft,
        final_date: Epoch,
        step: Duration,
        handler: &mut dyn FixedStepHandler,
    ) -> Result<Spacecraft, EquinoxError> {
        let mut h = step.to_seconds().abs();
        if h <= 0.0 {
            return Err(EquinoxError::InvalidArgument(
                "fixed sampling step must be non zero".to_string(),
            ));
        }
        if final_date < initial.orbit.dt {
            h = -h;
        }
        match self.prepare(&initial, final_date)? {
            None => Ok(initial),
            Some(ctx) => {
                let mut normalizer = StepNormalizer {
                    ctx: ctx.clone(),
                    user: handler,
                    h,
                    k: 0,
                };
                self.run(initial, final_date, ctx, &mut normalizer)
            }
        }
    }

    /// Propagate and call a user handler after each successful integrator step.
    pub fn propagate_with_handler(
        &mut self,
        initial: Spacecraft,
        final_date: Epoch,
        handler: &mut dyn StepHandler,
    ) -> Result<Spacecraft, EquinoxError> {
        match self.prepare(&initial, final_date)? {
            None => Ok(initial),
            Some(ctx) => {
                let mut relay = OdeHandlerRelay {
                    ctx: ctx.clone(),
                    user: handler,
                };
                self.run(initial, final_date, ctx, &mut relay)
            }
        }
    }

    /// Argument validation and context construction, before any integrator
    /// work. Returns `None` when the target date equals the initial date, in
    /// which case the caller hands the initial state straight back.
    fn prepare(
        &self,
        initial: &Spacecraft,
        final_date: Epoch,
    ) -> Result<Option<Rc<PropagationContext>>, EquinoxError> {
        if !initial.mass_kg.is_finite() || initial.mass_kg <= 0.0 {
            return Err(EquinoxError::InvalidArgument(
                "mass is null or negative".to_string(),
            ));
        }
        if !initial.orbit.is_finite() {
            return Err(EquinoxError::InvalidArgument(
                "initial orbital elements are not finite".to_string(),
            ));
        }
        if initial.orbit.dt == final_date {
            // don't extrapolate
            return Ok(None);
        }
        Ok(Some(Rc::new(PropagationContext {
            start_date: initial.orbit.dt,
            frame: initial.orbit.frame,
            retrograde: initial.orbit.retrograde,
            extras: RefCell::new(initial.extras.clone()),
        })))
    }

    /// The single propagation sequence behind all the public entry points.
    fn run(
        &mut self,
        initial: Spacecraft,
        final_date: Epoch,
        ctx: Rc<PropagationContext>,
        handler: &mut dyn OdeStepHandler<U7>,
    ) -> Result<Spacecraft, EquinoxError> {
        let duration = final_date - initial.orbit.dt;
        if duration > 2 * Unit::Minute || duration < -2 * Unit::Minute {
            // Prevent the print spam for short spans
            info!("Propagating for {} until {}", duration, final_date);
        }

        let sticky: StickySlot = Rc::new(RefCell::new(None));
        let mut system = SpacecraftOde {
            ctx: ctx.clone(),
            force_models: &self.force_models,
            sticky: sticky.clone(),
        };

        // Wire the switching functions, in force model registration order
        let mut events: Vec<Box<dyn OdeEvent<U7>>> = Vec::new();
        for model in &self.force_models {
            for swf in model.switching_functions() {
                events.push(Box::new(MappingSwitchingFunction {
                    swf,
                    ctx: ctx.clone(),
                    sticky: sticky.clone(),
                }));
            }
        }

        // Mathematical view
        let y0 = PropagationContext::flatten(&initial);
        let t1 = duration.to_seconds();
        let mut integrator = OdeIntegrator::from_parts(
            self.order,
            self.stages,
            self.a_coeffs,
            self.b_coeffs,
            self.opts,
        );
        let mut handler = handler;
        let result = integrator.integrate(&mut system, &mut events, &mut handler, 0.0, &y0, t1);
        self.details = integrator.details;

        // The sticky slot takes precedence over whatever the solver reports
        let parked = sticky.borrow_mut().take();
        match result {
            Ok((t_end, y)) => match parked {
                Some(error) => Err(error),
                None => Ok(ctx.rebuild(t_end, &y)),
            },
            Err(ie) => Err(parked.unwrap_or(EquinoxError::Integrator(ie))),
        }
    }
}
