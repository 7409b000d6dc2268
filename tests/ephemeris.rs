extern crate equinox;

use approx::assert_abs_diff_eq;
use equinox::cosmic::{Frame, Orbit, Spacecraft};
use equinox::propagators::{NumericalPropagator, PropOpts};
use equinox::time::{Epoch, Unit};
use equinox::EquinoxError;

fn eme2k() -> Frame {
    Frame::Geoid {
        gm: 3.986004415e14,
        flattening: 0.0033528106647474805,
        equatorial_radius: 6_378_136.3,
    }
}

fn leo(dt: Epoch) -> Spacecraft {
    Spacecraft::new(
        Orbit::keplerian(7_000_000.0, 1e-3, 0.9, 0.2, 0.1, 0.3, dt, eme2k()),
        320.0,
    )
}

#[test]
fn dense_output_mid_interval() {
    // S6: a mid-interval evaluation of the ephemeris must agree with a
    // second propagation stopped at that date.
    let dt = Epoch::from_gregorian_tai_at_midnight(2022, 5, 5);
    let opts = PropOpts::with_adaptive_step_s(0.1, 60.0, 1e-12);

    let mut prop = NumericalPropagator::dormand45(opts);
    let (_, ephemeris) = prop
        .propagate_with_ephemeris(leo(dt), dt + 1_000.0 * Unit::Second)
        .unwrap();

    let mid = dt + 500.0 * Unit::Second;
    let from_ephemeris = ephemeris.at(mid).unwrap();

    let mut prop2 = NumericalPropagator::dormand45(opts);
    let direct = prop2.propagate(leo(dt), mid).unwrap();

    let (re, ve) = from_ephemeris.orbit.to_cartesian();
    let (rd, vd) = direct.orbit.to_cartesian();
    assert!(
        (re - rd).norm() < 0.1,
        "dense output error at mid interval: {} m",
        (re - rd).norm()
    );
    assert!((ve - vd).norm() < 1e-4);
}

#[test]
fn bounds_and_out_of_range() {
    let dt = Epoch::from_gregorian_tai_at_midnight(2022, 5, 5);
    let target = dt + 1_000.0 * Unit::Second;
    let mut prop = NumericalPropagator::default();
    let (final_state, ephemeris) = prop.propagate_with_ephemeris(leo(dt), target).unwrap();

    assert!((ephemeris.min_date() - dt).abs() < 1.0 * Unit::Microsecond);
    assert!((ephemeris.max_date() - target).abs() < 1.0 * Unit::Microsecond);

    // The bounds evaluate to the native states
    let at_start = ephemeris.at(dt).unwrap();
    let (r0, _) = leo(dt).orbit.to_cartesian();
    let (rs, _) = at_start.orbit.to_cartesian();
    assert_abs_diff_eq!((r0 - rs).norm(), 0.0, epsilon = 1e-6);

    let at_end = ephemeris.at(target).unwrap();
    let (rf, _) = final_state.orbit.to_cartesian();
    let (re, _) = at_end.orbit.to_cartesian();
    assert_abs_diff_eq!((rf - re).norm(), 0.0, epsilon = 1e-6);

    // Outside of the produced interval: OutOfRange
    match ephemeris.at(dt - 1.0 * Unit::Second) {
        Err(EquinoxError::OutOfRange { .. }) => (),
        other => panic!("expected OutOfRange, got {other:?}"),
    }
    match ephemeris.at(target + 1.0 * Unit::Second) {
        Err(EquinoxError::OutOfRange { .. }) => (),
        other => panic!("expected OutOfRange, got {other:?}"),
    }
}

#[test]
fn evaluation_is_idempotent_and_continuous() {
    let dt = Epoch::from_gregorian_tai_at_midnight(2022, 5, 5);
    let mut prop =
        NumericalPropagator::dormand45(PropOpts::with_adaptive_step_s(0.1, 60.0, 1e-12));
    let (_, ephemeris) = prop
        .propagate_with_ephemeris(leo(dt), dt + 1_000.0 * Unit::Second)
        .unwrap();

    let probe = dt + 333.3 * Unit::Second;
    let first = ephemeris.at(probe).unwrap();
    let second = ephemeris.at(probe).unwrap();
    assert_eq!(first, second);

    // Continuity across the whole interval: adjacent millisecond samples stay
    // within the distance the spacecraft can physically cover.
    let vmax = 1.1 * first.orbit.vmag();
    let mut prev = ephemeris.at(dt).unwrap();
    for k in 1..=100 {
        let e = dt + (k as f64) * 10.0 * Unit::Second;
        let state = ephemeris.at(e).unwrap();
        let hop = (state.orbit.radius() - prev.orbit.radius()).norm();
        assert!(hop <= vmax * 10.0, "discontinuous hop of {hop} m");
        prev = state;
    }
}

#[test]
fn every_iterator_covers_interval() {
    let dt = Epoch::from_gregorian_tai_at_midnight(2022, 5, 5);
    let mut prop = NumericalPropagator::default();
    let (_, ephemeris) = prop
        .propagate_with_ephemeris(leo(dt), dt + 600.0 * Unit::Second)
        .unwrap();
    let states: Vec<Spacecraft> = ephemeris.every(60.0 * Unit::Second).collect();
    assert_eq!(states.len(), 11);
    for pair in states.windows(2) {
        assert!(pair[1].orbit.dt > pair[0].orbit.dt);
    }
}

#[test]
fn backward_ephemeris() {
    let dt = Epoch::from_gregorian_tai_at_midnight(2022, 5, 5);
    let mut prop =
        NumericalPropagator::dormand45(PropOpts::with_adaptive_step_s(0.1, 60.0, 1e-12));
    let (_, ephemeris) = prop
        .propagate_with_ephemeris(leo(dt), dt - 600.0 * Unit::Second)
        .unwrap();
    assert!((ephemeris.min_date() - (dt - 600.0 * Unit::Second)).abs() < 1.0 * Unit::Microsecond);
    assert!((ephemeris.max_date() - dt).abs() < 1.0 * Unit::Microsecond);
    // Interior evaluation works in the backward case too
    let mid = dt - 300.0 * Unit::Second;
    let state = ephemeris.at(mid).unwrap();
    assert!((state.orbit.dt - mid).abs() < 1.0 * Unit::Microsecond);
}
