extern crate equinox;

use approx::assert_abs_diff_eq;
use equinox::cosmic::{Frame, Orbit, Spacecraft};
use equinox::dynamics::events::{
    ApsideDetector, EventAction, EventError, SwitchingFunction,
};
use equinox::dynamics::{DynamicsError, ForceModel, TimeDerivatives};
use equinox::propagators::{NumericalPropagator, PropOpts};
use equinox::time::{Duration, Epoch, Unit};
use std::fmt;
use std::sync::{Arc, Mutex};

fn eme2k() -> Frame {
    Frame::Geoid {
        gm: 3.986004415e14,
        flattening: 0.0033528106647474805,
        equatorial_radius: 6_378_136.3,
    }
}

/// A force model with no dynamics, used to plug bare switching functions
/// into a propagation.
struct Detectors(Vec<Arc<dyn SwitchingFunction>>);

impl fmt::Display for Detectors {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "detector rack ({})", self.0.len())
    }
}

impl ForceModel for Detectors {
    fn add_contribution(
        &self,
        _osc: &Spacecraft,
        _adder: &mut TimeDerivatives,
    ) -> Result<(), DynamicsError> {
        Ok(())
    }

    fn switching_functions(&self) -> Vec<Arc<dyn SwitchingFunction>> {
        self.0.clone()
    }
}

/// A date detector which logs its firing into a shared journal.
struct LoggedDate {
    name: &'static str,
    target: Epoch,
    journal: Arc<Mutex<Vec<(&'static str, Epoch)>>>,
}

impl fmt::Display for LoggedDate {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "logged date {} at {}", self.name, self.target)
    }
}

impl SwitchingFunction for LoggedDate {
    fn g(&self, osc: &Spacecraft) -> Result<f64, EventError> {
        Ok((osc.orbit.dt - self.target).to_seconds())
    }

    fn event_occurred(&self, osc: &Spacecraft) -> Result<EventAction, EventError> {
        self.journal.lock().unwrap().push((self.name, osc.orbit.dt));
        Ok(EventAction::Continue)
    }

    fn max_check_interval(&self) -> Duration {
        30.0 * Unit::Second
    }

    fn threshold(&self) -> Duration {
        0.1 * Unit::Millisecond
    }
}

#[test]
fn periapsis_stop() {
    // S3: starting at a true anomaly of 90 degrees, the first periapsis
    // crossing is three quarters of an anomaly revolution away; the detector
    // must stop the propagation there, with r.v = 0 at the final state.
    let dt = Epoch::from_gregorian_tai_at_midnight(2022, 3, 3);
    let (sma, ecc) = (8_000_000.0, 0.1);
    let orbit = Orbit::keplerian(sma, ecc, 0.7, 0.4, 0.2, std::f64::consts::FRAC_PI_2, dt, eme2k());
    let initial = Spacecraft::new(orbit, 220.0);
    let period = orbit.period().to_seconds();

    let mut prop =
        NumericalPropagator::dormand45(PropOpts::with_adaptive_step_s(0.01, 30.0, 1e-12));
    prop.add_force_model(Arc::new(Detectors(vec![Arc::new(
        ApsideDetector::periapsis_stop(),
    )])));
    let final_state = prop
        .propagate(initial, dt + 2.0 * period * Unit::Second)
        .unwrap();

    // Analytical time from periapsis to a true anomaly of 90 degrees
    let ta: f64 = std::f64::consts::FRAC_PI_2;
    let ea = 2.0 * ((1.0_f64 - ecc).sqrt() * (ta / 2.0).tan()).atan2((1.0_f64 + ecc).sqrt());
    let ma = ea - ecc * ea.sin();
    let n = (eme2k().gm() / sma.powi(3)).sqrt();
    let expected_stop = period - ma / n;

    let elapsed = (final_state.orbit.dt - dt).to_seconds();
    assert_abs_diff_eq!(elapsed, expected_stop, epsilon = 1e-3);

    let (r, v) = final_state.orbit.to_cartesian();
    // r.v scale is ~1e10 m^2/s over this orbit; at periapsis it vanishes
    assert!(
        r.dot(&v).abs() < 1e6,
        "r.v at stop: {:.3e} m^2/s",
        r.dot(&v)
    );
    // And we stopped at periapsis, not apoapsis
    assert!(final_state.orbit.rmag() < sma);
}

#[test]
fn events_fire_in_chronological_order() {
    // P3: two detectors with roots inside the same integrator step must fire
    // in root time order even when registered in reverse, and ties must
    // respect registration order.
    let dt = Epoch::from_gregorian_tai_at_midnight(2022, 3, 3);
    let orbit = Orbit::keplerian(7_000_000.0, 1e-3, 0.9, 0.1, 0.0, 0.0, dt, eme2k());
    let initial = Spacecraft::new(orbit, 55.0);
    let journal = Arc::new(Mutex::new(Vec::new()));

    // One fixed 200 s step covers all the roots below
    let mut prop = NumericalPropagator::dormand45(PropOpts::with_fixed_step_s(200.0));
    prop.add_force_model(Arc::new(Detectors(vec![
        Arc::new(LoggedDate {
            name: "late",
            target: dt + 140.0 * Unit::Second,
            journal: journal.clone(),
        }),
        Arc::new(LoggedDate {
            name: "early",
            target: dt + 130.0 * Unit::Second,
            journal: journal.clone(),
        }),
        Arc::new(LoggedDate {
            name: "tie-first",
            target: dt + 150.0 * Unit::Second,
            journal: journal.clone(),
        }),
        Arc::new(LoggedDate {
            name: "tie-second",
            target: dt + 150.0 * Unit::Second,
            journal: journal.clone(),
        }),
    ])));

    prop.propagate(initial, dt + 400.0 * Unit::Second).unwrap();

    let journal = journal.lock().unwrap();
    let names: Vec<&str> = journal.iter().map(|(n, _)| *n).collect();
    assert_eq!(names, vec!["early", "late", "tie-first", "tie-second"]);
    // Each root was located to within the detector threshold
    for (name, fired_at) in journal.iter() {
        let offset = match *name {
            "early" => 130.0,
            "late" => 140.0,
            _ => 150.0,
        };
        let expected = dt + offset * Unit::Second;
        assert!(
            (*fired_at - expected).abs() < 1.0 * Unit::Millisecond,
            "{name} fired at {fired_at}, expected {expected}"
        );
    }
}

/// Dumps a fraction of the mass when the target date is reached.
struct MassDump {
    target: Epoch,
    fraction: f64,
}

impl fmt::Display for MassDump {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "mass dump at {}", self.target)
    }
}

impl SwitchingFunction for MassDump {
    fn g(&self, osc: &Spacecraft) -> Result<f64, EventError> {
        Ok((osc.orbit.dt - self.target).to_seconds())
    }

    fn event_occurred(&self, _osc: &Spacecraft) -> Result<EventAction, EventError> {
        Ok(EventAction::ResetState)
    }

    fn reset_state(&self, osc: &Spacecraft) -> Result<Spacecraft, EventError> {
        Ok(osc
            .clone()
            .with_mass(osc.mass_kg * (1.0 - self.fraction))
            .with_extra("dumped", vec![1.0]))
    }

    fn max_check_interval(&self) -> Duration {
        30.0 * Unit::Second
    }

    fn threshold(&self) -> Duration {
        0.1 * Unit::Millisecond
    }
}

#[test]
fn reset_state_replaces_mass_and_extras() {
    // The RESET_STATE path replaces the integrated vector and the carried
    // additional states, then the integration resumes to the target date.
    let dt = Epoch::from_gregorian_tai_at_midnight(2022, 3, 3);
    let orbit = Orbit::keplerian(7_000_000.0, 1e-3, 0.9, 0.1, 0.0, 0.0, dt, eme2k());
    let initial = Spacecraft::new(orbit, 400.0);

    let mut prop =
        NumericalPropagator::dormand45(PropOpts::with_adaptive_step_s(0.01, 60.0, 1e-12));
    prop.add_force_model(Arc::new(Detectors(vec![Arc::new(MassDump {
        target: dt + 500.0 * Unit::Second,
        fraction: 0.1,
    })])));

    let final_state = prop
        .propagate(initial, dt + 1_000.0 * Unit::Second)
        .unwrap();
    assert_abs_diff_eq!(final_state.mass_kg, 360.0, epsilon = 1e-9);
    assert_eq!(final_state.extra("dumped"), Some(&[1.0][..]));
    assert_eq!(
        (final_state.orbit.dt - dt).to_seconds().round() as i64,
        1_000
    );
}

#[test]
fn apoapsis_detector_ignores_periapsis() {
    // The r.v scalar has roots at both apsides; the apoapsis detector must
    // continue through periapsis and stop half a revolution later.
    let dt = Epoch::from_gregorian_tai_at_midnight(2022, 3, 3);
    let (sma, ecc) = (8_000_000.0, 0.05);
    // Start just past apoapsis so the first root ahead is a periapsis
    let orbit = Orbit::keplerian(sma, ecc, 0.3, 0.0, 0.0, 3.3, dt, eme2k());
    let initial = Spacecraft::new(orbit, 75.0);
    let period = orbit.period().to_seconds();

    let mut prop =
        NumericalPropagator::dormand45(PropOpts::with_adaptive_step_s(0.01, 30.0, 1e-12));
    prop.add_force_model(Arc::new(Detectors(vec![Arc::new(
        ApsideDetector::apoapsis_stop(),
    )])));
    let final_state = prop
        .propagate(initial, dt + 2.0 * period * Unit::Second)
        .unwrap();

    // Stopped at apoapsis: radius above the semi major axis
    assert!(final_state.orbit.rmag() > sma);
    let (r, v) = final_state.orbit.to_cartesian();
    assert!(r.dot(&v).abs() < 1e6);
}
