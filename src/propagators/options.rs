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

use crate::time::{Duration, Unit};
use serde_derive::{Deserialize, Serialize};

/// Integration options: the step bounds, the error tolerance of the adaptive
/// controller, and the retry budget of a single step.
///
/// The tolerance bounds the worst per-component error of the integrated
/// element vector (see [`super::largest_error`]): the semi major axis and
/// the mass move on entirely different scales than the eccentricity and
/// inclination vectors, so components are judged individually rather than
/// through one vector norm. With `fixed_step` set, the error estimate is
/// never evaluated and every step uses `init_step` as is.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct PropOpts {
    pub init_step: Duration,
    pub min_step: Duration,
    pub max_step: Duration,
    pub tolerance: f64,
    pub attempts: u8,
    pub fixed_step: bool,
}

impl PropOpts {
    /// Adaptive step integration between the provided step bounds.
    pub fn with_adaptive_step(min_step: Duration, max_step: Duration, tolerance: f64) -> Self {
        PropOpts {
            init_step: max_step,
            min_step,
            max_step,
            tolerance,
            attempts: 50,
            fixed_step: false,
        }
    }

    /// Adaptive step integration, bounds in seconds.
    pub fn with_adaptive_step_s(min_step: f64, max_step: f64, tolerance: f64) -> Self {
        Self::with_adaptive_step(min_step * Unit::Second, max_step * Unit::Second, tolerance)
    }

    /// Fixed step integration: no error control at all.
    pub fn with_fixed_step(step: Duration) -> Self {
        PropOpts {
            init_step: step,
            min_step: step,
            max_step: step,
            tolerance: 0.0,
            attempts: 0,
            fixed_step: true,
        }
    }

    /// Fixed step integration, step in seconds.
    pub fn with_fixed_step_s(step: f64) -> Self {
        Self::with_fixed_step(step * Unit::Second)
    }

    /// Returns these options with the provided tolerance.
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Returns these options with the provided maximum step, lowering the
    /// initial step to it when needed.
    pub fn with_max_step(mut self, max_step: Duration) -> Self {
        self.set_max_step(max_step);
        self
    }

    /// Set the maximum step size, lowering the initial step to it when needed
    pub fn set_max_step(&mut self, max_step: Duration) {
        if self.init_step > max_step {
            self.init_step = max_step;
        }
        self.max_step = max_step;
    }

    /// Set the minimum step size, raising the initial step to it when needed
    pub fn set_min_step(&mut self, min_step: Duration) {
        if self.init_step < min_step {
            self.init_step = min_step;
        }
        self.min_step = min_step;
    }
}

impl Default for PropOpts {
    /// One minute initial step, a millisecond floor, a 45 minute ceiling and
    /// a 1e-12 tolerance: workable from LEO to GEO without touching anything.
    /// The retry budget of 50 shrink attempts per step matches the usual
    /// flight dynamics tooling.
    fn default() -> PropOpts {
        PropOpts {
            init_step: 60.0 * Unit::Second,
            min_step: 0.001 * Unit::Second,
            max_step: 45.0 * Unit::Minute,
            tolerance: 1e-12,
            attempts: 50,
            fixed_step: false,
        }
    }
}

#[test]
fn options_bounds_and_builders() {
    let opts = PropOpts::default();
    assert_eq!(opts.max_step, 45.0 * Unit::Minute);
    assert!(!opts.fixed_step);

    // Tightening the ceiling drags the initial step down with it
    let opts = PropOpts::default().with_max_step(30.0 * Unit::Second);
    assert_eq!(opts.init_step, 30.0 * Unit::Second);
    assert_eq!(opts.max_step, 30.0 * Unit::Second);

    let opts = PropOpts::default().with_tolerance(1e-9);
    assert!((opts.tolerance - 1e-9).abs() < f64::EPSILON);

    // Raising the floor drags the initial step up
    let mut opts = PropOpts::with_adaptive_step_s(0.5, 120.0, 1e-11);
    assert_eq!(opts.init_step, 120.0 * Unit::Second);
    opts.set_min_step(1.0 * Unit::Second);
    assert_eq!(opts.min_step, 1.0 * Unit::Second);
    opts.set_min_step(150.0 * Unit::Second);
    assert_eq!(opts.init_step, 150.0 * Unit::Second);

    let opts = PropOpts::with_fixed_step_s(10.0);
    assert!(opts.fixed_step);
    assert_eq!(opts.min_step, opts.max_step);
    assert!(opts.tolerance.abs() < f64::EPSILON);
}
