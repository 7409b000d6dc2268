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

use super::{DynamicsError, LocalFrame};
use crate::cosmic::Orbit;
use crate::linalg::{OVector, Vector3, Vector6, U7};
use std::collections::BTreeMap;

/// The Gauss planetary equations in equinoctial form.
///
/// One `TimeDerivatives` is built per derivative evaluation of the
/// integrator: it zero-initializes the seven derivative slots
/// `{sma, ex, ey, hx, hy, lv, mass}`, precomputes the partial derivatives of
/// the elements with respect to an acceleration in the local orbital frame,
/// and then accumulates whatever the force models push into it. The driver
/// finalizes it with the Kepler contribution.
///
/// The 6×3 Jacobian is held in the canonical TNW basis; QSW and inertial
/// contributions are rotated into it first. Accumulation is done row by row
/// in a fixed order so that identical inputs yield bit-identical derivatives.
#[derive(Debug)]
pub struct TimeDerivatives {
    ydot: OVector<f64, U7>,
    /// Jacobian column for an acceleration along T (velocity direction)
    jac_t: Vector6<f64>,
    /// Jacobian column for an acceleration along N = W × T
    jac_n: Vector6<f64>,
    /// Jacobian column for an acceleration along W (orbital momentum)
    jac_w: Vector6<f64>,
    t_hat: Vector3<f64>,
    n_hat: Vector3<f64>,
    w_hat: Vector3<f64>,
    /// cos/sin of the flight path rotation between QSW and TNW
    vt_over_v: f64,
    vr_over_v: f64,
    kepler_lv_dot: f64,
    non_finite: bool,
    extra_rates: BTreeMap<String, Vec<f64>>,
}

impl TimeDerivatives {
    /// Initializes the derivative accumulator for the provided osculating
    /// orbit and mass.
    ///
    /// Fails if the orbit is not elliptical: the equinoctial Gauss equations
    /// used here assume `sma > 0` and `ex^2 + ey^2 < 1`.
    pub fn init(orbit: &Orbit, _mass: f64) -> Result<Self, DynamicsError> {
        let b2 = 1.0 - orbit.ex.powi(2) - orbit.ey.powi(2);
        if orbit.sma <= 0.0 || b2 <= 0.0 {
            return Err(DynamicsError::NotElliptical {
                sma: orbit.sma,
                ecc: orbit.ecc(),
            });
        }

        let gm = orbit.frame.gm();
        let i_fact = orbit.retrograde_factor();
        let p = orbit.sma * b2;
        let h = (gm * p).sqrt();
        let sqpm = p / h; // sqrt(p / mu)
        let (slv, clv) = orbit.lv.sin_cos();
        let w = 1.0 + orbit.ex * clv + orbit.ey * slv;
        let s2 = 1.0 + orbit.hx.powi(2) + orbit.hy.powi(2);
        // Node coupling term of the out-of-plane acceleration
        let node = i_fact * (orbit.hx * slv - orbit.hy * clv);

        // Partials with respect to a radial (Q), in-plane transverse (S) and
        // cross-track (W) acceleration: the classical variational equations
        // for the true-longitude equinoctial set.
        let two_a2_h = 2.0 * orbit.sma.powi(2) / h;
        let jac_q = Vector6::new(
            two_a2_h * (orbit.ex * slv - orbit.ey * clv),
            sqpm * slv,
            -sqpm * clv,
            0.0,
            0.0,
            0.0,
        );
        let jac_s = Vector6::new(
            two_a2_h * w,
            sqpm * ((w + 1.0) * clv + orbit.ex) / w,
            sqpm * ((w + 1.0) * slv + orbit.ey) / w,
            0.0,
            0.0,
            0.0,
        );
        let jac_w = Vector6::new(
            0.0,
            -sqpm * orbit.ey * node / w,
            sqpm * orbit.ex * node / w,
            sqpm * s2 * clv / (2.0 * w),
            sqpm * s2 * slv / (2.0 * w),
            sqpm * node / w,
        );

        // Rotation from QSW to the canonical TNW basis, through the flight path angle
        let vr = (h / p) * (orbit.ex * slv - orbit.ey * clv);
        let vt = (h / p) * w;
        let vmag = (vr.powi(2) + vt.powi(2)).sqrt();
        let (vr_over_v, vt_over_v) = (vr / vmag, vt / vmag);
        let jac_t = vr_over_v * jac_q + vt_over_v * jac_s;
        let jac_n = -vt_over_v * jac_q + vr_over_v * jac_s;

        // Local frame unit vectors for inertial contributions
        let (radius, velocity) = orbit.to_cartesian();
        let t_hat = velocity / velocity.norm();
        let hvec = radius.cross(&velocity);
        let w_hat = hvec / hvec.norm();
        let n_hat = w_hat.cross(&t_hat);

        Ok(Self {
            ydot: OVector::<f64, U7>::zeros(),
            jac_t,
            jac_n,
            jac_w,
            t_hat,
            n_hat,
            w_hat,
            vt_over_v,
            vr_over_v,
            kepler_lv_dot: h * (w / p).powi(2),
            non_finite: false,
            extra_rates: BTreeMap::new(),
        })
    }

    /// Accumulates an acceleration contribution, in m/s^2, expressed in the
    /// provided local frame.
    ///
    /// A non finite contribution does not fail here: it raises a sticky flag
    /// which the propagation driver surfaces once the integrator has unwound.
    pub fn add_acceleration(&mut self, frame: LocalFrame, acc: Vector3<f64>) {
        if !(acc.x.is_finite() && acc.y.is_finite() && acc.z.is_finite()) {
            self.non_finite = true;
            return;
        }
        let (at, an, aw) = match frame {
            LocalFrame::TNW => (acc.x, acc.y, acc.z),
            LocalFrame::QSW => (
                self.vr_over_v * acc.x + self.vt_over_v * acc.y,
                -self.vt_over_v * acc.x + self.vr_over_v * acc.y,
                acc.z,
            ),
            LocalFrame::Inertial => (
                acc.dot(&self.t_hat),
                acc.dot(&self.n_hat),
                acc.dot(&self.w_hat),
            ),
        };
        // Row by row, fixed evaluation order
        for i in 0..6 {
            self.ydot[i] += self.jac_t[i] * at + self.jac_n[i] * an + self.jac_w[i] * aw;
        }
    }

    /// Accumulates a mass flow rate in kg/s (negative for depletion)
    pub fn add_mass_rate(&mut self, dmdt: f64) {
        if !dmdt.is_finite() {
            self.non_finite = true;
            return;
        }
        self.ydot[6] += dmdt;
    }

    /// Records named additional-state derivatives.
    ///
    /// Additional states are carried through the propagation without being
    /// coupled to the integrated vector; the rates are validated and kept
    /// available for inspection by the caller of the propagation.
    pub fn add_extra_rates(&mut self, name: &str, rates: &[f64]) {
        if rates.iter().any(|r| !r.is_finite()) {
            self.non_finite = true;
            return;
        }
        let slot = self
            .extra_rates
            .entry(name.to_string())
            .or_insert_with(|| vec![0.0; rates.len()]);
        for (acc, rate) in slot.iter_mut().zip(rates.iter()) {
            *acc += rate;
        }
    }

    /// Adds the unperturbed Keplerian motion: only the true longitude moves,
    /// with dLv/dt = h / r^2. The perturbations ride on top.
    pub fn add_kepler_contribution(&mut self) {
        self.ydot[5] += self.kepler_lv_dot;
    }

    /// Whether any contribution was non finite since initialization
    pub fn is_poisoned(&self) -> bool {
        self.non_finite
    }

    /// Returns the accumulated additional-state rates
    pub fn extra_rates(&self) -> &BTreeMap<String, Vec<f64>> {
        &self.extra_rates
    }

    /// Returns the accumulated derivative vector {sma, ex, ey, hx, hy, lv, mass}
    pub fn into_vector(self) -> OVector<f64, U7> {
        self.ydot
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cosmic::Frame;
    use crate::time::Epoch;
    use approx::assert_abs_diff_eq;

    fn eme2k() -> Frame {
        Frame::Geoid {
            gm: 3.986004415e14,
            flattening: 0.0033528106647474805,
            equatorial_radius: 6_378_136.3,
        }
    }

    fn leo() -> Orbit {
        Orbit::keplerian(
            7_000_000.0,
            0.01,
            0.6,
            0.25,
            1.1,
            0.4,
            Epoch::from_gregorian_tai_at_midnight(2022, 1, 1),
            eme2k(),
        )
    }

    #[test]
    fn kepler_only_moves_longitude() {
        let orbit = leo();
        let mut adder = TimeDerivatives::init(&orbit, 100.0).unwrap();
        adder.add_kepler_contribution();
        let ydot = adder.into_vector();
        for i in 0..5 {
            assert_eq!(ydot[i], 0.0);
        }
        assert_abs_diff_eq!(ydot[5], orbit.angular_velocity(), epsilon = 1e-12);
        assert_eq!(ydot[6], 0.0);
    }

    #[test]
    fn tangential_acceleration_raises_sma() {
        // da/dt = 2 a^2 v / mu for a purely tangential acceleration
        let orbit = leo();
        let mut adder = TimeDerivatives::init(&orbit, 100.0).unwrap();
        let at = 1e-4;
        adder.add_acceleration(LocalFrame::TNW, Vector3::new(at, 0.0, 0.0));
        let ydot = adder.into_vector();
        let expected = 2.0 * orbit.sma.powi(2) * orbit.vmag() / orbit.frame.gm() * at;
        assert_abs_diff_eq!(ydot[0], expected, epsilon = expected.abs() * 1e-12);
    }

    #[test]
    fn local_frame_consistency() {
        // The same physical acceleration expressed in all three frames must
        // accumulate identical derivatives.
        let orbit = leo();
        let (radius, velocity) = orbit.to_cartesian();
        let r_hat = radius / radius.norm();
        let w_hat = radius.cross(&velocity) / radius.cross(&velocity).norm();
        let s_hat = w_hat.cross(&r_hat);
        let acc_inertial = 2e-5 * r_hat + 3e-5 * s_hat - 1e-5 * w_hat;

        let mut from_inertial = TimeDerivatives::init(&orbit, 1.0).unwrap();
        from_inertial.add_acceleration(LocalFrame::Inertial, acc_inertial);
        let a = from_inertial.into_vector();

        let mut from_qsw = TimeDerivatives::init(&orbit, 1.0).unwrap();
        from_qsw.add_acceleration(LocalFrame::QSW, Vector3::new(2e-5, 3e-5, -1e-5));
        let b = from_qsw.into_vector();

        for i in 0..7 {
            assert_abs_diff_eq!(a[i], b[i], epsilon = 1e-18 + a[i].abs() * 1e-9);
        }
    }

    #[test]
    fn cross_track_moves_node_only_out_of_plane_elements() {
        let orbit = leo();
        let mut adder = TimeDerivatives::init(&orbit, 1.0).unwrap();
        adder.add_acceleration(LocalFrame::TNW, Vector3::new(0.0, 0.0, 1e-5));
        let ydot = adder.into_vector();
        // sma is insensitive to out-of-plane accelerations
        assert_abs_diff_eq!(ydot[0], 0.0, epsilon = 1e-20);
        assert!(ydot[3].abs() > 0.0 || ydot[4].abs() > 0.0);
    }

    #[test]
    fn non_finite_contribution_poisons() {
        let orbit = leo();
        let mut adder = TimeDerivatives::init(&orbit, 1.0).unwrap();
        adder.add_acceleration(LocalFrame::TNW, Vector3::new(f64::NAN, 0.0, 0.0));
        assert!(adder.is_poisoned());
        // And the derivative slots were left untouched
        assert_eq!(adder.into_vector()[0], 0.0);
    }

    #[test]
    fn hyperbolic_rejected() {
        let mut orbit = leo();
        orbit.sma = -orbit.sma;
        match TimeDerivatives::init(&orbit, 1.0) {
            Err(DynamicsError::NotElliptical { .. }) => (),
            other => panic!("expected NotElliptical, got {other:?}"),
        }
    }

    #[test]
    fn extra_rates_are_recorded() {
        let orbit = leo();
        let mut adder = TimeDerivatives::init(&orbit, 1.0).unwrap();
        adder.add_extra_rates("battery", &[0.5, -0.25]);
        adder.add_extra_rates("battery", &[0.5, 0.25]);
        assert_eq!(adder.extra_rates()["battery"], vec![1.0, 0.0]);
    }
}
