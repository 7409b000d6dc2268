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

use crate::cosmic::Spacecraft;
use crate::time::{Duration, Epoch, Unit};
use crate::utils::between_pm_pi;
use std::f64::consts::FRAC_PI_2;
use std::fmt;
use thiserror::Error;

/// What the propagation should do once an event has occurred.
///
/// These are orbital-level actions: the integrator has its own flow control
/// codes, and the translation between the two is fixed inside the driver.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum EventAction {
    /// Advance, no side effect
    Continue,
    /// Terminate the integration cleanly at the event date
    Stop,
    /// Force a recomputation of the derivatives without changing the state
    ResetDerivatives,
    /// Replace the state through the switching function's `reset_state`
    ResetState,
}

/// Stores event evaluation errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EventError {
    #[error("event evaluation failed: {0}")]
    Evaluation(String),
    #[error("event state reset failed: {0}")]
    StateReset(String),
}

/// A switching function: a continuous scalar of the osculating state whose
/// sign changes mark discrete events.
///
/// The integrator samples `g` at most `max_check_interval` apart, locates
/// each sign change to within `threshold` in at most `max_iterations`
/// bisections, and then calls `event_occurred` at the root. `reset_state` is
/// only invoked when `event_occurred` returned [`EventAction::ResetState`].
pub trait SwitchingFunction: Send + Sync + fmt::Display {
    /// The switching scalar. Must be continuous around its roots.
    fn g(&self, osc: &Spacecraft) -> Result<f64, EventError>;

    /// Called once the root of `g` has been located, with the osculating
    /// state at the root date.
    fn event_occurred(&self, osc: &Spacecraft) -> Result<EventAction, EventError>;

    /// Builds the replacement state when `event_occurred` asked for a state
    /// reset. The returned state must stay in the same frame and keep the
    /// same retrograde encoding.
    fn reset_state(&self, osc: &Spacecraft) -> Result<Spacecraft, EventError> {
        Ok(osc.clone())
    }

    /// Maximum integration time between two samples of `g`
    fn max_check_interval(&self) -> Duration;

    /// Convergence tolerance on the root date
    fn threshold(&self) -> Duration;

    /// Bisection budget of the root search
    fn max_iterations(&self) -> usize {
        50
    }
}

/// Fires when the propagation reaches a given date.
///
/// Force models with a validity window register these so the integrator puts
/// a step boundary exactly on the window edges.
#[derive(Clone, Debug)]
pub struct DateDetector {
    pub target: Epoch,
    pub action: EventAction,
    pub max_check: Duration,
    pub threshold: Duration,
}

impl DateDetector {
    /// A date detector with the provided action, millisecond root accuracy
    pub fn new(target: Epoch, action: EventAction) -> Self {
        Self {
            target,
            action,
            max_check: 60.0 * Unit::Second,
            threshold: 1.0 * Unit::Millisecond,
        }
    }

    /// A date detector which stops the propagation at the provided date
    pub fn stop_at(target: Epoch) -> Self {
        Self::new(target, EventAction::Stop)
    }
}

impl fmt::Display for DateDetector {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "date {} ({:?})", self.target, self.action)
    }
}

impl SwitchingFunction for DateDetector {
    fn g(&self, osc: &Spacecraft) -> Result<f64, EventError> {
        Ok((osc.orbit.dt - self.target).to_seconds())
    }

    fn event_occurred(&self, _osc: &Spacecraft) -> Result<EventAction, EventError> {
        Ok(self.action)
    }

    fn max_check_interval(&self) -> Duration {
        self.max_check
    }

    fn threshold(&self) -> Duration {
        self.threshold
    }
}

/// Which apsis an [`ApsideDetector`] reacts to
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Apsis {
    Periapsis,
    Apoapsis,
}

/// Fires at apsis crossings, where the switching scalar r · v changes sign.
///
/// Both apsides are roots of r · v; the detector discriminates them from the
/// true anomaly at the root and only applies its action at the requested one.
#[derive(Clone, Debug)]
pub struct ApsideDetector {
    pub apsis: Apsis,
    pub action: EventAction,
    pub max_check: Duration,
    pub threshold: Duration,
}

impl ApsideDetector {
    pub fn new(apsis: Apsis, action: EventAction) -> Self {
        Self {
            apsis,
            action,
            max_check: 120.0 * Unit::Second,
            threshold: 0.1 * Unit::Millisecond,
        }
    }

    /// A detector which stops the propagation at the first periapsis
    pub fn periapsis_stop() -> Self {
        Self::new(Apsis::Periapsis, EventAction::Stop)
    }

    /// A detector which stops the propagation at the first apoapsis
    pub fn apoapsis_stop() -> Self {
        Self::new(Apsis::Apoapsis, EventAction::Stop)
    }
}

impl fmt::Display for ApsideDetector {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?} ({:?})", self.apsis, self.action)
    }
}

impl SwitchingFunction for ApsideDetector {
    fn g(&self, osc: &Spacecraft) -> Result<f64, EventError> {
        let (radius, velocity) = osc.orbit.to_cartesian();
        Ok(radius.dot(&velocity))
    }

    fn event_occurred(&self, osc: &Spacecraft) -> Result<EventAction, EventError> {
        // At a root of r.v we are either at periapsis (ta ~ 0) or apoapsis (ta ~ pi)
        let at_periapsis = between_pm_pi(osc.orbit.ta()).abs() < FRAC_PI_2;
        let matches = match self.apsis {
            Apsis::Periapsis => at_periapsis,
            Apsis::Apoapsis => !at_periapsis,
        };
        Ok(if matches {
            self.action
        } else {
            EventAction::Continue
        })
    }

    fn max_check_interval(&self) -> Duration {
        self.max_check
    }

    fn threshold(&self) -> Duration {
        self.threshold
    }
}

/// Fires when the osculating radius crosses the provided altitude above the
/// equatorial radius of a geoid frame.
#[derive(Clone, Debug)]
pub struct AltitudeDetector {
    /// Altitude above the equatorial radius, in meters
    pub altitude_m: f64,
    pub action: EventAction,
    pub max_check: Duration,
    pub threshold: Duration,
}

impl AltitudeDetector {
    /// A detector which stops the propagation when crossing the provided altitude
    pub fn stop_below(altitude_m: f64) -> Self {
        Self {
            altitude_m,
            action: EventAction::Stop,
            max_check: 60.0 * Unit::Second,
            threshold: 1.0 * Unit::Millisecond,
        }
    }
}

impl fmt::Display for AltitudeDetector {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "altitude {} m ({:?})", self.altitude_m, self.action)
    }
}

impl SwitchingFunction for AltitudeDetector {
    fn g(&self, osc: &Spacecraft) -> Result<f64, EventError> {
        if !osc.orbit.frame.is_geoid() {
            return Err(EventError::Evaluation(
                "altitude detection requires a geoid frame".to_string(),
            ));
        }
        Ok(osc.orbit.rmag() - osc.orbit.frame.equatorial_radius() - self.altitude_m)
    }

    fn event_occurred(&self, _osc: &Spacecraft) -> Result<EventAction, EventError> {
        Ok(self.action)
    }

    fn max_check_interval(&self) -> Duration {
        self.max_check
    }

    fn threshold(&self) -> Duration {
        self.threshold
    }
}
