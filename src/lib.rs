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

/*! # equinox

Numerical orbit propagation on singularity-free equinoctial elements.

The propagator integrates the six equinoctial elements plus the spacecraft
mass under a pluggable collection of perturbing force models, converting each
Cartesian force contribution into element rates through the Gauss planetary
equations. Force models may expose switching functions whose sign changes are
located by the integrator and turned back into orbital-frame callbacks.

All quantities are SI: meters, seconds, kilograms, radians, and m^3/s^2 for
gravitational parameters.
*/

/// Provides the propagators / integrators available in `equinox`.
pub mod propagators;

/// Provides the force model and switching function abstractions, and the
/// Gauss planetary equations which tie them to the integrated elements.
pub mod dynamics;

/// Provides the orbital element model, reference frames and spacecraft state.
pub mod cosmic;

/// Utility functions shared by different modules.
pub mod utils;

mod errors;
/// Equinox will (almost) never panic and functions which may fail will return an error.
pub use self::errors::EquinoxError;

#[macro_use]
extern crate log;
extern crate hifitime;
extern crate nalgebra as na;

/// Re-export of hifitime
pub mod time {
    pub use hifitime::*;
}

/// Re-export nalgebra
pub mod linalg {
    pub use na::base::*;
}

/// Re-export some useful things
pub use self::cosmic::{Frame, Orbit, Spacecraft, TimeTagged};
