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

use super::events::{DateDetector, EventAction, SwitchingFunction};
use super::{DynamicsError, ForceModel, LocalFrame, TimeDerivatives};
use crate::cosmic::{Spacecraft, STD_GRAVITY};
use crate::linalg::Vector3;
use crate::time::{Duration, Epoch};
use std::fmt;
use std::sync::Arc;

/// A constant thrust finite burn, active over a date window.
///
/// The thrust direction is fixed in the TNW frame, the thrust level and
/// specific impulse are constant, and the mass flow rate follows
/// `dm/dt = -F / (Isp g0)`. The maneuver registers switching functions on
/// both window edges so the integrator restarts its derivatives exactly at
/// ignition and cutoff rather than smearing the discontinuity over a step.
#[derive(Clone, Debug)]
pub struct ConstantThrustManeuver {
    /// Ignition date
    pub start: Epoch,
    /// Cutoff date
    pub end: Epoch,
    /// Thrust level, in Newtons
    pub thrust_n: f64,
    /// Specific impulse, in seconds
    pub isp_s: f64,
    /// Unit thrust direction in the TNW frame
    pub direction: Vector3<f64>,
}

impl ConstantThrustManeuver {
    pub fn new(
        start: Epoch,
        duration: Duration,
        thrust_n: f64,
        isp_s: f64,
        direction: Vector3<f64>,
    ) -> Self {
        Self {
            start,
            end: start + duration,
            thrust_n,
            isp_s,
            direction: direction.normalize(),
        }
    }

    /// A prograde (along-track) burn
    pub fn prograde(start: Epoch, duration: Duration, thrust_n: f64, isp_s: f64) -> Self {
        Self::new(start, duration, thrust_n, isp_s, Vector3::new(1.0, 0.0, 0.0))
    }

    /// A retrograde (against-track) burn
    pub fn retrograde(start: Epoch, duration: Duration, thrust_n: f64, isp_s: f64) -> Self {
        Self::new(
            start,
            duration,
            thrust_n,
            isp_s,
            Vector3::new(-1.0, 0.0, 0.0),
        )
    }

    /// Whether the thruster fires at the provided date
    pub fn is_firing(&self, dt: Epoch) -> bool {
        dt >= self.start && dt <= self.end
    }

    /// Mass flow rate while firing, in kg/s (negative)
    pub fn mass_flow_rate(&self) -> f64 {
        -self.thrust_n / (self.isp_s * STD_GRAVITY)
    }
}

impl fmt::Display for ConstantThrustManeuver {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{:.3} N burn [{} ; {}] along {:?} (TNW)",
            self.thrust_n, self.start, self.end, self.direction
        )
    }
}

impl ForceModel for ConstantThrustManeuver {
    fn add_contribution(
        &self,
        osc: &Spacecraft,
        adder: &mut TimeDerivatives,
    ) -> Result<(), DynamicsError> {
        if !self.is_firing(osc.orbit.dt) {
            return Ok(());
        }
        if osc.mass_kg <= 0.0 {
            return Err(DynamicsError::MassDepleted(osc.orbit.dt));
        }
        let acc = (self.thrust_n / osc.mass_kg) * self.direction;
        adder.add_acceleration(LocalFrame::TNW, acc);
        adder.add_mass_rate(self.mass_flow_rate());
        Ok(())
    }

    fn switching_functions(&self) -> Vec<Arc<dyn SwitchingFunction>> {
        vec![
            Arc::new(DateDetector::new(self.start, EventAction::ResetDerivatives)),
            Arc::new(DateDetector::new(self.end, EventAction::ResetDerivatives)),
        ]
    }
}
