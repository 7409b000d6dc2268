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

use crate::linalg::allocator::Allocator;
use crate::linalg::{DefaultAllocator, DimName, OVector};

/// Components which moved less than this over a step are judged on their
/// absolute error: the ratio against a near-zero move is meaningless.
const ABS_ERR_FLOOR: f64 = 0.1;

/// Worst per-component error of a candidate step.
///
/// The integrated vector mixes meters for the semi major axis, dimensionless
/// eccentricity and inclination components, radians for the longitude and
/// kilograms for the mass: a single vector norm would let the semi major
/// axis drown out every other slot. Each component is therefore judged on
/// its own, relative to how far it moved during the step when that move is
/// appreciable, and the step controller reacts to the worst offender.
///
/// Generic over the vector dimension since the solver itself is; the
/// propagation driver only ever runs it on the seven element slots.
pub fn largest_error<N: DimName>(
    prop_err: &OVector<f64, N>,
    candidate: &OVector<f64, N>,
    cur_state: &OVector<f64, N>,
) -> f64
where
    DefaultAllocator: Allocator<f64, N>,
{
    let mut worst: f64 = 0.0;
    for (err, (new, old)) in prop_err
        .iter()
        .zip(candidate.iter().zip(cur_state.iter()))
    {
        let moved = new - old;
        let this = if moved.abs() > ABS_ERR_FLOOR {
            (err / moved).abs()
        } else {
            err.abs()
        };
        worst = worst.max(this);
    }
    worst
}
