extern crate equinox;

use approx::assert_abs_diff_eq;
use equinox::cosmic::{r3, Frame, Orbit, Spacecraft, Transform};
use equinox::dynamics::J2Perturbation;
use equinox::propagators::{NumericalPropagator, PropOpts};
use equinox::time::{Epoch, Unit};
use equinox::EquinoxError;
use std::sync::Arc;

fn eme2k() -> Frame {
    Frame::Geoid {
        gm: 3.986004415e14,
        flattening: 0.0033528106647474805,
        equatorial_radius: 6_378_136.3,
    }
}

#[test]
fn kepler_one_period_round_trip() {
    let _ = pretty_env_logger::try_init();
    // S1: a circular orbit propagated over exactly one period with no force
    // models must return to its initial position within one meter.
    let dt = Epoch::from_gregorian_tai_at_midnight(2022, 2, 2);
    let orbit = Orbit::equinoctial(7_000_000.0, 0.0, 0.0, 0.0, 0.0, 0.0, dt, eme2k());
    let period = orbit.period();
    let initial = Spacecraft::new(orbit, 1_000.0);

    let mut prop =
        NumericalPropagator::dormand45(PropOpts::with_adaptive_step_s(0.1, 60.0, 1e-12));
    let final_state = prop.propagate(initial.clone(), dt + period).unwrap();

    let (r0, v0) = initial.orbit.to_cartesian();
    let (rf, vf) = final_state.orbit.to_cartesian();
    assert!(
        (rf - r0).norm() < 1.0,
        "position error after one period: {} m",
        (rf - r0).norm()
    );
    assert!((vf - v0).norm() < 1e-3);
    assert_abs_diff_eq!(final_state.mass_kg, 1_000.0, epsilon = 1e-12);
}

#[test]
fn kepler_there_and_back() {
    // Propagating forward one period and then backward to the initial date
    // must reproduce the initial PV within the accumulated truncation bound.
    // This one runs on the Cash Karp pair rather than the default method.
    let dt = Epoch::from_gregorian_tai_at_midnight(2022, 2, 2);
    let orbit = Orbit::keplerian(7_500_000.0, 0.02, 0.8, 0.5, 1.0, 0.0, dt, eme2k());
    let initial = Spacecraft::new(orbit, 500.0);
    let period = orbit.period();

    let mut prop =
        NumericalPropagator::cash_karp45(PropOpts::with_adaptive_step_s(0.1, 60.0, 1e-12));
    let at_period = prop.propagate(initial.clone(), dt + period).unwrap();
    let back = prop.propagate(at_period, dt).unwrap();

    let (r0, v0) = initial.orbit.to_cartesian();
    let (rb, vb) = back.orbit.to_cartesian();
    assert!(
        (rb - r0).norm() < 1.0,
        "position error there and back: {} m",
        (rb - r0).norm()
    );
    assert!((vb - v0).norm() < 1e-3);
}

#[test]
fn same_date_returns_initial_state() {
    let dt = Epoch::from_gregorian_tai_at_midnight(2022, 2, 2);
    let orbit = Orbit::keplerian(7e6, 0.01, 0.6, 0.1, 0.2, 0.3, dt, eme2k());
    let initial = Spacecraft::new(orbit, 750.0);
    let mut prop = NumericalPropagator::default();
    let state = prop.propagate(initial.clone(), dt).unwrap();
    assert_eq!(state, initial);
}

#[test]
fn frame_invariance_under_node_rotation() {
    // The same physical orbit expressed in two inertial frames related by a
    // rotation about the pole must propagate to final states which agree
    // once mapped back, J2 included (the pole rotation preserves the zonal
    // field symmetry).
    let dt = Epoch::from_gregorian_tai_at_midnight(2022, 2, 2);
    let orbit_a = Orbit::keplerian(7_200_000.0, 1e-3, 1.722, 0.61, 0.3, 1.1, dt, eme2k());
    let rot = Transform::from_rotation(r3(0.3));

    let (ra, va) = orbit_a.to_cartesian();
    let (rb, vb) = rot.apply_to(&ra, &va);
    let orbit_b = Orbit::cartesian(rb.x, rb.y, rb.z, vb.x, vb.y, vb.z, dt, eme2k()).unwrap();

    let target = dt + 1.0 * Unit::Day;
    let opts = PropOpts::with_adaptive_step_s(0.1, 60.0, 1e-12);

    let mut prop_a = NumericalPropagator::dormand45(opts);
    prop_a.add_force_model(Arc::new(J2Perturbation::earth()));
    let final_a = prop_a.propagate(Spacecraft::new(orbit_a, 100.0), target).unwrap();

    let mut prop_b = NumericalPropagator::dormand45(opts);
    prop_b.add_force_model(Arc::new(J2Perturbation::earth()));
    let final_b = prop_b.propagate(Spacecraft::new(orbit_b, 100.0), target).unwrap();

    let (raf, vaf) = final_a.orbit.to_cartesian();
    let (rbf, vbf) = final_b.orbit.to_cartesian();
    let (rbf_back, vbf_back) = rot.inverse().apply_to(&rbf, &vbf);
    assert!(
        (raf - rbf_back).norm() < 1.0,
        "frame invariance violated by {} m",
        (raf - rbf_back).norm()
    );
    assert!((vaf - vbf_back).norm() < 1e-3);
}

#[test]
fn retrograde_kepler_propagation() {
    // A retrograde equatorial orbit uses the I = -1 encoding throughout; a
    // quarter period of Keplerian motion must move the spacecraft by -90
    // degrees around the pole.
    let dt = Epoch::from_gregorian_tai_at_midnight(2022, 2, 2);
    let r = 7e6;
    let v = (eme2k().gm() / r).sqrt();
    let orbit = Orbit::cartesian(r, 0.0, 0.0, 0.0, -v, 0.0, dt, eme2k()).unwrap();
    assert!(orbit.retrograde);
    let initial = Spacecraft::new(orbit, 10.0);
    let quarter = orbit.period() * 0.25;

    let mut prop =
        NumericalPropagator::dormand45(PropOpts::with_adaptive_step_s(0.1, 60.0, 1e-12));
    let final_state = prop.propagate(initial, dt + quarter).unwrap();
    let (rf, _) = final_state.orbit.to_cartesian();
    assert_abs_diff_eq!(rf.x, 0.0, epsilon = 1.0);
    assert_abs_diff_eq!(rf.y, -r, epsilon = 1.0);
    assert_abs_diff_eq!(rf.z, 0.0, epsilon = 1.0);
}

#[test]
fn zero_mass_rejected_before_integration() {
    // S5: a null mass is an argument error, not a propagation error
    let dt = Epoch::from_gregorian_tai_at_midnight(2022, 2, 2);
    let orbit = Orbit::keplerian(7e6, 0.01, 0.6, 0.1, 0.2, 0.3, dt, eme2k());
    let initial = Spacecraft::new(orbit, 0.0);
    let mut prop = NumericalPropagator::default();
    match prop.propagate(initial, dt + 1.0 * Unit::Hour) {
        Err(EquinoxError::InvalidArgument(_)) => (),
        other => panic!("expected InvalidArgument, got {other:?}"),
    }
}

#[test]
fn non_finite_elements_rejected_before_integration() {
    let dt = Epoch::from_gregorian_tai_at_midnight(2022, 2, 2);
    let orbit = Orbit::equinoctial(f64::NAN, 0.0, 0.0, 0.0, 0.0, 0.0, dt, eme2k());
    let initial = Spacecraft::new(orbit, 100.0);
    let mut prop = NumericalPropagator::default();
    match prop.propagate(initial, dt + 1.0 * Unit::Hour) {
        Err(EquinoxError::InvalidArgument(_)) => (),
        other => panic!("expected InvalidArgument, got {other:?}"),
    }
}
