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

use super::{OdeStepHandler, StepInterpolator};
use crate::cosmic::{Frame, Orbit, Spacecraft};
use crate::errors::EquinoxError;
use crate::linalg::{OVector, U7};
use crate::time::{Duration, Epoch, TimeSeries, Unit};
use std::collections::BTreeMap;
use std::fmt;

/// Tolerance on the time bounds of the ephemeris, in seconds
const BOUNDS_TOL: f64 = 1e-7;

/// Collects the dense output segments streamed by the integrator.
pub(crate) struct EphemerisRecorder {
    segments: Vec<StepInterpolator<U7>>,
}

impl EphemerisRecorder {
    pub fn new() -> Self {
        Self {
            segments: Vec::new(),
        }
    }

    pub fn into_ephemeris(
        self,
        start_date: Epoch,
        frame: Frame,
        retrograde: bool,
        extras: BTreeMap<String, Vec<f64>>,
        forward: bool,
    ) -> IntegratedEphemeris {
        IntegratedEphemeris {
            start_date,
            frame,
            retrograde,
            extras,
            segments: self.segments,
            forward,
        }
    }
}

impl OdeStepHandler<U7> for EphemerisRecorder {
    fn handle_step(&mut self, interp: &StepInterpolator<U7>, _is_last: bool) {
        self.segments.push(interp.clone());
    }
}

/// A dense-output ephemeris: the per-step Hermite data accumulated during an
/// integration, supporting evaluation at any date of the produced interval.
///
/// Immutable once the propagation which filled it has returned. At the
/// integrator's own sample times the evaluation reproduces the native state;
/// interior dates are accurate to the interpolation order of the dense
/// output, not to machine precision.
pub struct IntegratedEphemeris {
    start_date: Epoch,
    frame: Frame,
    retrograde: bool,
    extras: BTreeMap<String, Vec<f64>>,
    /// Segments in the order the integrator produced them
    segments: Vec<StepInterpolator<U7>>,
    forward: bool,
}

impl IntegratedEphemeris {
    /// The earliest date covered by this ephemeris (inclusive)
    pub fn min_date(&self) -> Epoch {
        if self.forward {
            self.start_date + self.segments.first().map_or(0.0, |s| s.t0) * Unit::Second
        } else {
            self.start_date + self.segments.last().map_or(0.0, |s| s.tf) * Unit::Second
        }
    }

    /// The latest date covered by this ephemeris (inclusive)
    pub fn max_date(&self) -> Epoch {
        if self.forward {
            self.start_date + self.segments.last().map_or(0.0, |s| s.tf) * Unit::Second
        } else {
            self.start_date + self.segments.first().map_or(0.0, |s| s.t0) * Unit::Second
        }
    }

    /// Evaluate the ephemeris at the provided date.
    ///
    /// Fails if the date is outside of the produced interval.
    pub fn at(&self, epoch: Epoch) -> Result<Spacecraft, EquinoxError> {
        let tau = (epoch - self.start_date).to_seconds();
        let dir = if self.forward { 1.0 } else { -1.0 };
        let out_of_range = self.segments.is_empty()
            || (tau - self.segments.first().unwrap().t0) * dir < -BOUNDS_TOL
            || (tau - self.segments.last().unwrap().tf) * dir > BOUNDS_TOL;
        if out_of_range {
            return Err(EquinoxError::OutOfRange {
                epoch,
                min: self.min_date(),
                max: self.max_date(),
            });
        }
        // First segment whose end reaches tau
        let idx = self
            .segments
            .partition_point(|s| (s.tf - tau) * dir < -BOUNDS_TOL)
            .min(self.segments.len() - 1);
        Ok(self.rebuild(tau, &self.segments[idx].eval(tau)))
    }

    /// Creates an iterator through the whole ephemeris by the provided step size
    pub fn every(&self, step: Duration) -> impl Iterator<Item = Spacecraft> + '_ {
        TimeSeries::inclusive(self.min_date(), self.max_date(), step)
            .filter_map(move |epoch| self.at(epoch).ok())
    }

    fn rebuild(&self, tau: f64, y: &OVector<f64, U7>) -> Spacecraft {
        let mut orbit = Orbit::equinoctial(
            y[0],
            y[1],
            y[2],
            y[3],
            y[4],
            y[5],
            self.start_date + tau * Unit::Second,
            self.frame,
        );
        orbit.retrograde = self.retrograde;
        Spacecraft {
            orbit,
            mass_kg: y[6],
            extras: self.extras.clone(),
        }
    }
}

impl fmt::Display for IntegratedEphemeris {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "Ephemeris [{} ; {}] ({} segments)",
            self.min_date(),
            self.max_date(),
            self.segments.len()
        )
    }
}
