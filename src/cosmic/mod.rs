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

use crate::time::{Duration, Epoch};
use thiserror::Error;

/// A trait allowing for something to have an epoch
pub trait TimeTagged {
    /// Retrieve the Epoch
    fn epoch(&self) -> Epoch;
    /// Set the Epoch
    fn set_epoch(&mut self, epoch: Epoch);

    /// Shift this epoch by a duration (can be negative)
    fn shift_by(&mut self, duration: Duration) {
        self.set_epoch(self.epoch() + duration);
    }
}

/// Stores orbital element model errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OrbitError {
    /// The angular momentum is too small for the trajectory to define a plane.
    #[error("degenerate (near rectilinear) trajectory: |r x v| = {hmag:.3e} m^2/s")]
    DegenerateAngularMomentum { hmag: f64 },
    /// Raised on NaN or infinite position/velocity input.
    #[error("non finite position or velocity input")]
    NonFiniteInput,
    /// The iterative solve of Kepler's equation exceeded its budget.
    #[error("Kepler equation did not converge within {iterations} iterations (residual {residual:.3e} rad)")]
    Convergence { iterations: usize, residual: f64 },
    /// The prograde equinoctial encoding cannot represent an exactly retrograde plane.
    #[error("inclination too close to π for the prograde encoding, use the retrograde factor")]
    InclinationSingularity,
}

// Re-Export frames
mod frames;
pub use self::frames::*;

// Re-Export the orbit element model
mod orbit;
pub use self::orbit::*;

// Re-Export spacecraft
mod spacecraft;
pub use self::spacecraft::*;

/// From NIST special publication 330, 2008 edition, in meters per second squared
pub const STD_GRAVITY: f64 = 9.80665;

/// Convergence criterion on the residual of Kepler's equation, in radians
pub const KEPLER_TOLERANCE: f64 = 1e-12;

/// Iteration budget of the Newton solve of Kepler's equation
pub const KEPLER_MAX_ITER: usize = 50;
