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

use super::{Frame, OrbitError, TimeTagged, KEPLER_MAX_ITER, KEPLER_TOLERANCE};
use crate::linalg::{Vector3, Vector6};
use crate::time::{Duration, Epoch, Unit};
use crate::utils::{between_0_tau, between_pm_pi};
use std::f64::consts::PI;
use std::fmt;

/// If an orbit has an eccentricity above the following value, the equinoctial
/// eccentricity vector is considered near parabolic (only affects warning messages)
pub const ECC_EPSILON: f64 = 1e-11;

/// Below `semi latus rectum / rmag` of this value, a trajectory is considered
/// rectilinear and cannot be converted to equinoctial elements.
const RECTILINEAR_EPSILON: f64 = 1e-12;

/// The prograde (hx, hy) encoding is abandoned for the retrograde one when
/// `1 + w_z` drops below this value.
const RETROGRADE_SWITCH: f64 = 1e-9;

/// Orbit defines an orbital state
///
/// Unlike Cartesian-first toolkits, this struct stores the state directly as
/// equinoctial elements because those are regular at zero eccentricity and
/// zero inclination, which is exactly where numerically propagated orbits
/// like to dwell. The Cartesian view is derived on demand.
///
/// **Units:** meters, radians, seconds. The element order used across the
/// whole library is `{sma, ex, ey, hx, hy, lv}` plus the mass when a
/// spacecraft is attached.
#[derive(Copy, Clone, Debug)]
pub struct Orbit {
    /// Semi-major axis, in meters
    pub sma: f64,
    /// First component of the equinoctial eccentricity vector, e·cos(ω + I·Ω)
    pub ex: f64,
    /// Second component of the equinoctial eccentricity vector, e·sin(ω + I·Ω)
    pub ey: f64,
    /// First component of the equinoctial inclination vector
    pub hx: f64,
    /// Second component of the equinoctial inclination vector
    pub hy: f64,
    /// True longitude argument, in radians (ν + ω + I·Ω)
    pub lv: f64,
    /// Retrograde factor: false encodes I = +1, true encodes I = -1.
    /// The retrograde encoding swaps the role of the ascending node and is
    /// only needed for inclinations in the immediate vicinity of π.
    pub retrograde: bool,
    pub dt: Epoch,
    /// Frame contains everything we need to compute state information
    pub frame: Frame,
}

impl Orbit {
    /// Creates a new Orbit in the provided frame at the provided Epoch from
    /// the prograde equinoctial elements.
    ///
    /// **Units:** m, none, none, none, none, rad
    pub fn equinoctial(
        sma: f64,
        ex: f64,
        ey: f64,
        hx: f64,
        hy: f64,
        lv: f64,
        dt: Epoch,
        frame: Frame,
    ) -> Self {
        if ex.powi(2) + ey.powi(2) >= 1.0 - ECC_EPSILON {
            warn!(
                "near parabolic eccentricity vector ({}, {}): expect math errors in derived parameters",
                ex, ey
            );
        }
        Orbit {
            sma,
            ex,
            ey,
            hx,
            hy,
            lv,
            retrograde: false,
            dt,
            frame,
        }
    }

    /// Same as [`Self::equinoctial`] but with the retrograde factor set to I = -1.
    #[allow(clippy::too_many_arguments)]
    pub fn equinoctial_retrograde(
        sma: f64,
        ex: f64,
        ey: f64,
        hx: f64,
        hy: f64,
        lv: f64,
        dt: Epoch,
        frame: Frame,
    ) -> Self {
        let mut me = Self::equinoctial(sma, ex, ey, hx, hy, lv, dt, frame);
        me.retrograde = true;
        me
    }

    /// Creates a new Orbit in the provided frame at the provided Epoch from a
    /// Cartesian position and velocity.
    ///
    /// **Units:** m, m, m, m/s, m/s, m/s
    ///
    /// Fails if the angular momentum is degenerate (near rectilinear
    /// trajectory) or if any input is not finite. The retrograde encoding is
    /// selected automatically, and only when the prograde one is singular.
    pub fn cartesian(
        x: f64,
        y: f64,
        z: f64,
        vx: f64,
        vy: f64,
        vz: f64,
        dt: Epoch,
        frame: Frame,
    ) -> Result<Self, OrbitError> {
        let radius = Vector3::new(x, y, z);
        let velocity = Vector3::new(vx, vy, vz);
        if !(radius.iter().all(|c| c.is_finite()) && velocity.iter().all(|c| c.is_finite())) {
            return Err(OrbitError::NonFiniteInput);
        }

        let gm = frame.gm();
        let rmag = radius.norm();
        let hvec = radius.cross(&velocity);
        let hmag = hvec.norm();
        // p = h^2/mu compared against rmag catches both r x v ~ 0 and r ~ 0
        if hmag.powi(2) <= RECTILINEAR_EPSILON * gm * rmag {
            return Err(OrbitError::DegenerateAngularMomentum { hmag });
        }

        // Vis-viva
        let sma = 1.0 / (2.0 / rmag - velocity.norm_squared() / gm);
        if sma.is_infinite() {
            warn!("parabolic orbit: semi-major axis is infinite");
        }

        let w_hat = hvec / hmag;
        let retrograde = 1.0 + w_hat.z < RETROGRADE_SWITCH;
        let i_fact = if retrograde { -1.0 } else { 1.0 };
        let denom = 1.0 + i_fact * w_hat.z;
        let hx = -w_hat.y / denom;
        let hy = w_hat.x / denom;

        let (f_hat, g_hat, _) = equinoctial_basis(hx, hy, i_fact);

        // Eccentricity vector
        let evec = velocity.cross(&hvec) / gm - radius / rmag;
        let ex = evec.dot(&f_hat);
        let ey = evec.dot(&g_hat);

        let lv = radius.dot(&g_hat).atan2(radius.dot(&f_hat));

        let mut orbit = Self::equinoctial(sma, ex, ey, hx, hy, lv, dt, frame);
        orbit.retrograde = retrograde;
        Ok(orbit)
    }

    /// Creates a new Orbit around the provided frame from the borrowed state vector
    ///
    /// The state vector **must** be x, y, z, vx, vy, vz. This function is a
    /// shortcut to `cartesian` and as such it has the same unit requirements.
    pub fn cartesian_vec(state: &Vector6<f64>, dt: Epoch, frame: Frame) -> Result<Self, OrbitError> {
        Self::cartesian(
            state[0], state[1], state[2], state[3], state[4], state[5], dt, frame,
        )
    }

    /// Creates a new Orbit from the classical Keplerian orbital elements.
    ///
    /// **Units:** m, none, rad, rad, rad, rad
    ///
    /// The conversion selects the retrograde encoding when the inclination is
    /// within a micro-radian of π, where tan(i/2) overflows.
    pub fn keplerian(
        sma: f64,
        ecc: f64,
        inc: f64,
        raan: f64,
        aop: f64,
        ta: f64,
        dt: Epoch,
        frame: Frame,
    ) -> Self {
        let ecc = if ecc < 0.0 {
            warn!("eccentricity cannot be negative: sign of eccentricity changed");
            -ecc
        } else {
            ecc
        };
        if (1.0 - ecc).abs() < ECC_EPSILON {
            warn!("parabolic orbits have ill-defined Keplerian orbital elements");
        }

        let retrograde = inc > PI - 1e-6;
        let (i_fact, tan_half) = if retrograde {
            (-1.0, 1.0 / (inc / 2.0).tan())
        } else {
            (1.0, (inc / 2.0).tan())
        };
        let (sraan, craan) = raan.sin_cos();
        let lonper = aop + i_fact * raan;
        let mut orbit = Self::equinoctial(
            sma,
            ecc * lonper.cos(),
            ecc * lonper.sin(),
            tan_half * craan,
            tan_half * sraan,
            ta + lonper,
            dt,
            frame,
        );
        orbit.retrograde = retrograde;
        orbit
    }

    /// The retrograde factor I, +1 for prograde encodings and -1 for retrograde ones
    pub fn retrograde_factor(&self) -> f64 {
        if self.retrograde {
            -1.0
        } else {
            1.0
        }
    }

    /// Returns the direct (f), transverse (g) and normal (w) equinoctial basis
    /// unit vectors of this orbit, expressed in the orbit's frame.
    pub fn basis(&self) -> (Vector3<f64>, Vector3<f64>, Vector3<f64>) {
        equinoctial_basis(self.hx, self.hy, self.retrograde_factor())
    }

    /// Semi latus rectum, in meters: p = a (1 - ex^2 - ey^2)
    pub fn semi_latus_rectum(&self) -> f64 {
        self.sma * (1.0 - self.ex.powi(2) - self.ey.powi(2))
    }

    /// Returns this state as a Cartesian position / velocity pair in [m, m/s]
    pub fn to_cartesian(&self) -> (Vector3<f64>, Vector3<f64>) {
        let (f_hat, g_hat, _) = self.basis();
        let p = self.semi_latus_rectum();
        let (slv, clv) = self.lv.sin_cos();
        let w = 1.0 + self.ex * clv + self.ey * slv;
        let r = p / w;
        let radius = r * (clv * f_hat + slv * g_hat);
        let vfact = (self.frame.gm() / p).sqrt();
        let velocity = vfact * (-(slv + self.ey) * f_hat + (clv + self.ex) * g_hat);
        (radius, velocity)
    }

    /// Returns this state as a Cartesian Vector6 in [m, m, m, m/s, m/s, m/s]
    ///
    /// Note that the time is **not** returned in the vector.
    pub fn to_cartesian_vec(&self) -> Vector6<f64> {
        let (radius, velocity) = self.to_cartesian();
        Vector6::new(
            radius.x, radius.y, radius.z, velocity.x, velocity.y, velocity.z,
        )
    }

    /// Returns this state as the equinoctial element Vector6 {sma, ex, ey, hx, hy, lv}
    pub fn to_equinoctial_vec(&self) -> Vector6<f64> {
        Vector6::new(self.sma, self.ex, self.ey, self.hx, self.hy, self.lv)
    }

    /// Returns the radius vector of this Orbit in [m, m, m]
    pub fn radius(&self) -> Vector3<f64> {
        self.to_cartesian().0
    }

    /// Returns the velocity vector of this Orbit in [m/s, m/s, m/s]
    pub fn velocity(&self) -> Vector3<f64> {
        self.to_cartesian().1
    }

    /// Returns the magnitude of the radius vector in m
    pub fn rmag(&self) -> f64 {
        let (slv, clv) = self.lv.sin_cos();
        self.semi_latus_rectum() / (1.0 + self.ex * clv + self.ey * slv)
    }

    /// Returns the magnitude of the velocity vector in m/s
    pub fn vmag(&self) -> f64 {
        self.velocity().norm()
    }

    /// Returns the specific angular momentum vector r × v in [m^2/s]
    pub fn hvec(&self) -> Vector3<f64> {
        let (radius, velocity) = self.to_cartesian();
        radius.cross(&velocity)
    }

    /// Returns the norm of the specific angular momentum, in m^2/s
    pub fn hmag(&self) -> f64 {
        (self.frame.gm() * self.semi_latus_rectum()).sqrt()
    }

    /// Returns the orbital angular velocity h / r^2, in rad/s
    pub fn angular_velocity(&self) -> f64 {
        self.hmag() / self.rmag().powi(2)
    }

    /// Returns the eccentricity (no unit)
    pub fn ecc(&self) -> f64 {
        (self.ex.powi(2) + self.ey.powi(2)).sqrt()
    }

    /// Returns the inclination in radians
    pub fn inc(&self) -> f64 {
        let tan_half = (self.hx.powi(2) + self.hy.powi(2)).sqrt();
        if self.retrograde {
            PI - 2.0 * tan_half.atan()
        } else {
            2.0 * tan_half.atan()
        }
    }

    /// Returns the right ascension of the ascending node in radians
    pub fn raan(&self) -> f64 {
        between_0_tau(self.hy.atan2(self.hx))
    }

    /// Returns the argument of periapsis in radians
    pub fn aop(&self) -> f64 {
        between_0_tau(self.ey.atan2(self.ex) - self.retrograde_factor() * self.hy.atan2(self.hx))
    }

    /// Returns the true anomaly in radians
    pub fn ta(&self) -> f64 {
        between_0_tau(self.lv - self.ey.atan2(self.ex))
    }

    /// Returns the specific mechanical energy in m^2/s^2
    pub fn energy(&self) -> f64 {
        -self.frame.gm() / (2.0 * self.sma)
    }

    /// Returns the period of this orbit
    pub fn period(&self) -> Duration {
        2.0 * PI * (self.sma.powi(3) / self.frame.gm()).sqrt() * Unit::Second
    }

    /// Returns the mean motion n = sqrt(mu / a^3), in rad/s
    pub fn mean_motion(&self) -> f64 {
        (self.frame.gm() / self.sma.powi(3)).sqrt()
    }

    /// Returns the eccentric longitude argument in radians
    pub fn le(&self) -> f64 {
        let epsilon = (1.0 - self.ex.powi(2) - self.ey.powi(2)).sqrt();
        let (slv, clv) = self.lv.sin_cos();
        let num = self.ey * clv - self.ex * slv;
        let den = epsilon + 1.0 + self.ex * clv + self.ey * slv;
        self.lv + 2.0 * (num / den).atan()
    }

    /// Returns the mean longitude argument in radians, through the equinoctial
    /// form of Kepler's equation
    pub fn lm(&self) -> f64 {
        let le = self.le();
        let (sle, cle) = le.sin_cos();
        le - self.ex * sle + self.ey * cle
    }

    /// Returns a copy of this orbit with the true longitude set so that the
    /// eccentric longitude equals the provided value, in radians
    pub fn with_le(&self, le: f64) -> Self {
        let epsilon = (1.0 - self.ex.powi(2) - self.ey.powi(2)).sqrt();
        let (sle, cle) = le.sin_cos();
        let num = self.ex * sle - self.ey * cle;
        let den = epsilon + 1.0 - self.ex * cle - self.ey * sle;
        let mut me = *self;
        me.lv = le + 2.0 * (num / den).atan();
        me
    }

    /// Returns a copy of this orbit at the provided mean longitude, solving
    /// the equinoctial Kepler equation by Newton iteration.
    ///
    /// Fails with a convergence error if the residual is not below 1e-12 rad
    /// within 50 iterations.
    pub fn with_lm(&self, lm: f64) -> Result<Self, OrbitError> {
        let mut le = lm;
        for _ in 0..KEPLER_MAX_ITER {
            let (sle, cle) = le.sin_cos();
            let residual = le - self.ex * sle + self.ey * cle - lm;
            if residual.abs() <= KEPLER_TOLERANCE {
                return Ok(self.with_le(le));
            }
            le -= residual / (1.0 - self.ex * cle - self.ey * sle);
        }
        let (sle, cle) = le.sin_cos();
        Err(OrbitError::Convergence {
            iterations: KEPLER_MAX_ITER,
            residual: (le - self.ex * sle + self.ey * cle - lm).abs(),
        })
    }

    /// Returns whether this orbit and the other one match to within the
    /// provided absolute tolerances on the Cartesian views.
    ///
    /// **Units:** radial tolerance in meters, velocity tolerance in m/s
    pub fn eq_within(&self, other: &Self, radial_tol: f64, velocity_tol: f64) -> bool {
        let (r1, v1) = self.to_cartesian();
        let (r2, v2) = other.to_cartesian();
        self.dt == other.dt
            && self.frame == other.frame
            && (r1 - r2).norm() < radial_tol
            && (v1 - v2).norm() < velocity_tol
    }

    /// Returns whether every element of this orbit is finite
    pub fn is_finite(&self) -> bool {
        self.sma.is_finite()
            && self.ex.is_finite()
            && self.ey.is_finite()
            && self.hx.is_finite()
            && self.hy.is_finite()
            && self.lv.is_finite()
    }
}

/// Computes the (f, g, w) equinoctial basis unit vectors for the provided
/// inclination vector and retrograde factor.
///
/// The retrograde factor convention follows the semianalytic satellite theory
/// literature: for I = -1 the inclination vector stores cot(i/2) instead of
/// tan(i/2) and the node direction is mirrored.
pub(crate) fn equinoctial_basis(
    hx: f64,
    hy: f64,
    i_fact: f64,
) -> (Vector3<f64>, Vector3<f64>, Vector3<f64>) {
    let s2 = 1.0 + hx.powi(2) + hy.powi(2);
    let f_hat = Vector3::new(
        1.0 - hy.powi(2) + hx.powi(2),
        2.0 * hx * hy,
        -2.0 * hy * i_fact,
    ) / s2;
    let g_hat = Vector3::new(
        2.0 * hx * hy * i_fact,
        (1.0 + hy.powi(2) - hx.powi(2)) * i_fact,
        2.0 * hx,
    ) / s2;
    let w_hat = Vector3::new(
        2.0 * hy,
        -2.0 * hx,
        (1.0 - hx.powi(2) - hy.powi(2)) * i_fact,
    ) / s2;
    (f_hat, g_hat, w_hat)
}

impl PartialEq for Orbit {
    /// Two orbits are equal if their Cartesian views match to within 10 um
    /// and 10 um/s, the epochs are identical and the frames match.
    fn eq(&self, other: &Self) -> bool {
        self.eq_within(other, 1e-5, 1e-5)
    }
}

impl fmt::Display for Orbit {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "[{}] {}\tsma = {:.3} m\tex = {:.6}\tey = {:.6}\thx = {:.6}\thy = {:.6}\tlv = {:.6} rad",
            self.frame, self.dt, self.sma, self.ex, self.ey, self.hx, self.hy, self.lv
        )
    }
}

impl TimeTagged for Orbit {
    fn epoch(&self) -> Epoch {
        self.dt
    }

    fn set_epoch(&mut self, epoch: Epoch) {
        self.dt = epoch
    }
}

/// Normalizes the difference between the two provided longitudes to (-π, π]
/// before any linear combination, e.g. for interpolation between states.
pub fn longitude_difference(lv1: f64, lv0: f64) -> f64 {
    between_pm_pi(lv1 - lv0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn eme2k() -> Frame {
        Frame::Geoid {
            gm: 3.986004415e14,
            flattening: 0.0033528106647474805,
            equatorial_radius: 6_378_136.3,
        }
    }

    #[test]
    fn equinoctial_to_cartesian_round_trip() {
        let dt = Epoch::from_gregorian_tai_at_noon(2022, 3, 20);
        let orbit = Orbit::keplerian(
            7_200_000.0,
            1e-3,
            98.7_f64.to_radians(),
            35.0_f64.to_radians(),
            90.0_f64.to_radians(),
            12.0_f64.to_radians(),
            dt,
            eme2k(),
        );
        let cart = orbit.to_cartesian_vec();
        let rebuilt = Orbit::cartesian_vec(&cart, dt, eme2k()).unwrap();
        assert_abs_diff_eq!(orbit.sma, rebuilt.sma, epsilon = 1e-4);
        assert_abs_diff_eq!(orbit.ex, rebuilt.ex, epsilon = 1e-12);
        assert_abs_diff_eq!(orbit.ey, rebuilt.ey, epsilon = 1e-12);
        assert_abs_diff_eq!(orbit.hx, rebuilt.hx, epsilon = 1e-12);
        assert_abs_diff_eq!(orbit.hy, rebuilt.hy, epsilon = 1e-12);
        assert_abs_diff_eq!(
            between_pm_pi(orbit.lv - rebuilt.lv),
            0.0,
            epsilon = 1e-12
        );
    }

    #[test]
    fn classical_getters() {
        let dt = Epoch::from_gregorian_tai_at_midnight(2022, 1, 1);
        let (sma, ecc, inc, raan, aop, ta) = (
            8_000_000.0,
            0.2,
            0.9,
            1.2,
            2.1,
            0.4,
        );
        let orbit = Orbit::keplerian(sma, ecc, inc, raan, aop, ta, dt, eme2k());
        assert_abs_diff_eq!(orbit.ecc(), ecc, epsilon = 1e-13);
        assert_abs_diff_eq!(orbit.inc(), inc, epsilon = 1e-13);
        assert_abs_diff_eq!(orbit.raan(), raan, epsilon = 1e-13);
        assert_abs_diff_eq!(orbit.aop(), aop, epsilon = 1e-12);
        assert_abs_diff_eq!(orbit.ta(), ta, epsilon = 1e-12);
    }

    #[test]
    fn longitudes_converge() {
        let dt = Epoch::from_gregorian_tai_at_midnight(2022, 1, 1);
        let orbit = Orbit::keplerian(7_500_000.0, 0.3, 0.5, 0.3, 1.0, 2.2, dt, eme2k());
        // lv -> le -> lm -> back
        let lm = orbit.lm();
        let back = orbit.with_lm(lm).unwrap();
        assert_abs_diff_eq!(between_pm_pi(back.lv - orbit.lv), 0.0, epsilon = 1e-11);
        // Eccentric round trip
        let le = orbit.le();
        let back = orbit.with_le(le);
        assert_abs_diff_eq!(between_pm_pi(back.lv - orbit.lv), 0.0, epsilon = 1e-13);
    }

    #[test]
    fn rectilinear_rejected() {
        let dt = Epoch::from_gregorian_tai_at_midnight(2022, 1, 1);
        // Pure radial velocity: r x v = 0
        match Orbit::cartesian(7e6, 0.0, 0.0, 5.0, 0.0, 0.0, dt, eme2k()) {
            Err(OrbitError::DegenerateAngularMomentum { .. }) => (),
            other => panic!("expected degenerate angular momentum, got {other:?}"),
        }
    }

    #[test]
    fn retrograde_encoding() {
        let dt = Epoch::from_gregorian_tai_at_midnight(2022, 1, 1);
        // An exactly retrograde equatorial orbit is singular in the prograde encoding
        let r = 7e6;
        let v = (eme2k().gm() / r).sqrt();
        let orbit = Orbit::cartesian(r, 0.0, 0.0, 0.0, -v, 0.0, dt, eme2k()).unwrap();
        assert!(orbit.retrograde);
        assert_abs_diff_eq!(orbit.inc(), PI, epsilon = 1e-9);
        assert_abs_diff_eq!(orbit.sma, r, epsilon = 1e-3);
        // And the Cartesian view reproduces the input
        let cart = orbit.to_cartesian_vec();
        assert_abs_diff_eq!(cart[0], r, epsilon = 1e-4);
        assert_abs_diff_eq!(cart[4], -v, epsilon = 1e-9);
    }

    #[test]
    fn angular_momentum_derivations() {
        let dt = Epoch::from_gregorian_tai_at_midnight(2022, 1, 1);
        let orbit = Orbit::keplerian(7_000_000.0, 0.01, 0.7, 0.0, 0.0, 0.0, dt, eme2k());
        let hvec = orbit.hvec();
        assert_abs_diff_eq!(hvec.norm(), orbit.hmag(), epsilon = 1e-2);
        assert_abs_diff_eq!(
            orbit.angular_velocity(),
            orbit.hmag() / orbit.rmag().powi(2),
            epsilon = 1e-15
        );
    }
}
