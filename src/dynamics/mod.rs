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

use crate::cosmic::{OrbitError, Spacecraft};
use crate::time::Epoch;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

pub use crate::errors::EquinoxError;

/// The Gauss planetary equations, which turn force contributions into
/// equinoctial element rates.
pub mod gauss;
pub use self::gauss::*;

/// Switching functions: continuous scalars whose sign changes mark discrete events.
pub mod events;
use self::events::SwitchingFunction;

/// Zonal gravity harmonics (J2 only).
pub mod zonal;
pub use self::zonal::*;

/// Finite burn maneuvers.
pub mod maneuver;
pub use self::maneuver::*;

/// The local frame in which a force model expresses an acceleration
/// contribution.
///
/// This is deliberately a tagged value rather than a family of entry points:
/// the accumulator picks the matching Jacobian when the contribution is added.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LocalFrame {
    /// The inertial frame of the propagated orbit
    Inertial,
    /// T along the velocity, W along the orbital momentum, N = W × T
    TNW,
    /// Q (R) radial outward, S in-plane perpendicular on the prograde side, W cross-track
    QSW,
}

/// The `ForceModel` trait handles immutable dynamics which contribute
/// accelerations (and possibly a mass flow rate) to the propagated state.
///
/// Force models are borrowed for the duration of a propagation and are
/// invoked from a single thread; models holding caches must either be
/// instantiated per propagator or be safe for concurrent reads.
pub trait ForceModel: Send + Sync + fmt::Display {
    /// Adds this model's contribution for the provided osculating state to the accumulator.
    fn add_contribution(
        &self,
        osc: &Spacecraft,
        adder: &mut TimeDerivatives,
    ) -> Result<(), DynamicsError>;

    /// Returns the switching functions of this force model, if any.
    ///
    /// These are registered with the integrator when the model is added to a
    /// propagator, so the integration lands exactly on the model's
    /// discontinuities (shadow crossings, burn start and end, etc.).
    fn switching_functions(&self) -> Vec<Arc<dyn SwitchingFunction>> {
        Vec::new()
    }
}

/// Stores dynamical model errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DynamicsError {
    /// Mass crossed zero during the integration
    #[error("mass depleted at {0}")]
    MassDepleted(Epoch),
    /// The Gauss equations are only defined for elliptical orbits
    #[error("orbit is not elliptical (sma = {sma:.3e} m, ecc = {ecc:.6})")]
    NotElliptical { sma: f64, ecc: f64 },
    /// The force model needs shape data which only geoid frames carry
    #[error("force model requires a geoid frame")]
    RequiresGeoid,
    /// A force model pushed a non finite acceleration or mass rate
    #[error("non finite force contribution")]
    NonFiniteContribution,
    /// An element model error bubbled up from a force computation
    #[error("dynamical model encountered an orbit error: {0}")]
    Orbit(#[from] OrbitError),
    /// Free-form error for user provided models
    #[error("dynamical model error: {0}")]
    Model(String),
}
