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

/// A callback invoked after each successful integrator step, with the
/// spacecraft state at the end of the step.
///
/// `is_last` is true exactly once, on the final call of a propagation
/// (whether it reached the target date or was stopped by an event).
pub trait StepHandler {
    fn handle(&mut self, state: &Spacecraft, is_last: bool);
}

/// A callback invoked at equally spaced instants `initial + k·Δt`,
/// regardless of the internal integrator step size, and always at the final
/// date of the propagation.
pub trait FixedStepHandler {
    fn handle(&mut self, state: &Spacecraft, is_last: bool);
}

impl<F: FnMut(&Spacecraft, bool)> StepHandler for F {
    fn handle(&mut self, state: &Spacecraft, is_last: bool) {
        self(state, is_last)
    }
}
