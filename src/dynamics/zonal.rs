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

use super::{DynamicsError, ForceModel, LocalFrame, TimeDerivatives};
use crate::cosmic::Spacecraft;
use crate::linalg::Vector3;
use std::fmt;

/// Earth J2 zonal coefficient (EGM2008, unnormalized)
pub const EARTH_J2: f64 = 1.08262668355315e-3;

/// First zonal harmonic of the central body.
///
/// This is the dominant non spherical gravity term for most bodies and the
/// driver of the secular node regression. The acceleration is computed in
/// closed form in the inertial frame; the equatorial radius comes from the
/// geoid frame of the osculating orbit.
#[derive(Clone, Debug)]
pub struct J2Perturbation {
    pub j2: f64,
}

impl J2Perturbation {
    pub fn new(j2: f64) -> Self {
        Self { j2 }
    }

    /// Earth's J2
    pub fn earth() -> Self {
        Self::new(EARTH_J2)
    }
}

impl fmt::Display for J2Perturbation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "J2 zonal harmonic ({:.6e})", self.j2)
    }
}

impl ForceModel for J2Perturbation {
    fn add_contribution(
        &self,
        osc: &Spacecraft,
        adder: &mut TimeDerivatives,
    ) -> Result<(), DynamicsError> {
        let frame = osc.orbit.frame;
        if !frame.is_geoid() {
            return Err(DynamicsError::RequiresGeoid);
        }
        let radius = osc.orbit.radius();
        let rmag = radius.norm();
        let z2_r2 = (radius.z / rmag).powi(2);
        let factor =
            -1.5 * self.j2 * frame.gm() * frame.equatorial_radius().powi(2) / rmag.powi(5);
        let acc = Vector3::new(
            factor * radius.x * (1.0 - 5.0 * z2_r2),
            factor * radius.y * (1.0 - 5.0 * z2_r2),
            factor * radius.z * (3.0 - 5.0 * z2_r2),
        );
        adder.add_acceleration(LocalFrame::Inertial, acc);
        Ok(())
    }
}
