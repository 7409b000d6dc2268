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

use super::{Orbit, TimeTagged};
use crate::time::Epoch;
use std::collections::BTreeMap;
use std::fmt;

/// A spacecraft state: an orbit, the total mass, and optional named
/// additional states.
///
/// The additional states are carried through a propagation untouched: they
/// are not coupled to the dynamics by this library, but event callbacks may
/// replace them through a state reset.
#[derive(Clone, Debug, PartialEq)]
pub struct Spacecraft {
    /// Orbit the vehicle is in
    pub orbit: Orbit,
    /// Total mass, in kg. Must be strictly positive for propagation.
    pub mass_kg: f64,
    /// Named additional states, e.g. battery charge or instrument temperatures
    pub extras: BTreeMap<String, Vec<f64>>,
}

impl Spacecraft {
    /// Initialize a spacecraft state from an orbit and a total mass in kg
    pub fn new(orbit: Orbit, mass_kg: f64) -> Self {
        Self {
            orbit,
            mass_kg,
            extras: BTreeMap::new(),
        }
    }

    /// Returns a copy of the state with a new total mass
    pub fn with_mass(self, mass_kg: f64) -> Self {
        let mut me = self;
        me.mass_kg = mass_kg;
        me
    }

    /// Returns a copy of the state with the provided named additional state attached
    pub fn with_extra(self, name: &str, values: Vec<f64>) -> Self {
        let mut me = self;
        me.extras.insert(name.to_string(), values);
        me
    }

    /// Returns the additional state of that name, if any
    pub fn extra(&self, name: &str) -> Option<&[f64]> {
        self.extras.get(name).map(|v| v.as_slice())
    }
}

impl fmt::Display for Spacecraft {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}\tmass = {:.3} kg", self.orbit, self.mass_kg)
    }
}

impl TimeTagged for Spacecraft {
    fn epoch(&self) -> Epoch {
        self.orbit.dt
    }

    fn set_epoch(&mut self, epoch: Epoch) {
        self.orbit.dt = epoch
    }
}
