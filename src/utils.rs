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

use crate::linalg::Vector3;
use std::f64::consts::{PI, TAU};

/// Returns the provided angle bounded between 0.0 and 2π
pub fn between_0_tau(angle: f64) -> f64 {
    let mut bounded = angle % TAU;
    if bounded < 0.0 {
        bounded += TAU;
    }
    bounded
}

/// Returns the provided angle bounded between -π (exclusive) and +π (inclusive)
///
/// All longitude differences must go through this before any linear combination.
pub fn between_pm_pi(angle: f64) -> f64 {
    let mut bounded = angle % TAU;
    if bounded > PI {
        bounded -= TAU;
    } else if bounded <= -PI {
        bounded += TAU;
    }
    bounded
}

/// Returns the component of `this` which is perpendicular to `other`
pub fn perpv(this: &Vector3<f64>, other: &Vector3<f64>) -> Vector3<f64> {
    this - this.dot(other) * other
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn angle_wrapping() {
        assert!((between_0_tau(-0.5) - (TAU - 0.5)).abs() < 1e-15);
        assert!((between_0_tau(TAU + 0.25) - 0.25).abs() < 1e-15);
        assert!((between_pm_pi(PI + 0.1) - (-PI + 0.1)).abs() < 1e-12);
        assert!((between_pm_pi(-PI - 0.1) - (PI - 0.1)).abs() < 1e-12);
        // +π maps to itself, -π maps to +π
        assert!((between_pm_pi(PI) - PI).abs() < 1e-15);
        assert!((between_pm_pi(-PI) - PI).abs() < 1e-15);
    }

    #[test]
    fn perpendicular_component() {
        let x = Vector3::new(1.0, 1.0, 0.0);
        let z = Vector3::new(0.0, 0.0, 1.0);
        assert_eq!(perpv(&x, &z), x);
        let y = Vector3::new(0.0, 1.0, 0.0);
        assert_eq!(perpv(&x, &y), Vector3::new(1.0, 0.0, 0.0));
    }
}
