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

use crate::cosmic::OrbitError;
use crate::dynamics::events::EventError;
use crate::dynamics::DynamicsError;
use crate::propagators::IntegratorError;
use crate::time::Epoch;
use std::convert::From;
use thiserror::Error;

/// Represents all possible errors that can occur in the Equinox library.
///
/// The taxonomy matters for the propagation driver: errors raised by force
/// models or event callbacks during an integration are parked in a sticky
/// slot and re-raised once the integrator has unwound, taking precedence
/// over whatever fault the integrator itself reports as a consequence.
#[derive(Error, Debug, PartialEq)]
pub enum EquinoxError {
    /// Occurs when invalid inputs are detected before the integration starts.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Occurs when a force model or an event callback fails during integration.
    #[error("propagation error: {0}")]
    Propagation(String),

    /// Occurs when the ODE solver itself fails (step size underflow,
    /// diverging root search, non finite derivatives).
    #[error("integrator error: {0}")]
    Integrator(IntegratorError),

    /// Occurs when an ephemeris is queried outside of its time bounds.
    #[error("epoch {epoch} is outside of the ephemeris bounds [{min}, {max}]")]
    OutOfRange { epoch: Epoch, min: Epoch, max: Epoch },

    /// Occurs when an iterative solve exceeds its iteration budget.
    #[error("convergence error: {0}")]
    Convergence(String),
}

/// Converts an `OrbitError` into an `EquinoxError`.
impl From<OrbitError> for EquinoxError {
    fn from(e: OrbitError) -> Self {
        match e {
            OrbitError::Convergence { .. } => EquinoxError::Convergence(format!("{e}")),
            _ => EquinoxError::InvalidArgument(format!("{e}")),
        }
    }
}

/// Converts a `DynamicsError` into an `EquinoxError`.
impl From<DynamicsError> for EquinoxError {
    fn from(e: DynamicsError) -> Self {
        EquinoxError::Propagation(format!("{e}"))
    }
}

/// Converts an `EventError` into an `EquinoxError`.
impl From<EventError> for EquinoxError {
    fn from(e: EventError) -> Self {
        EquinoxError::Propagation(format!("{e}"))
    }
}

/// Converts an `IntegratorError` into an `EquinoxError`.
impl From<IntegratorError> for EquinoxError {
    fn from(e: IntegratorError) -> Self {
        EquinoxError::Integrator(e)
    }
}
