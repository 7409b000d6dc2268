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

use crate::linalg::{Matrix3, Vector3};
use serde_derive::{Deserialize, Serialize};
use std::cmp::PartialEq;
use std::fmt;

/// A reference frame handle.
///
/// Frames are plain values: the frame tree, Earth orientation and ephemeris
/// interpolation all live outside of this library. A frame only carries what
/// the propagation core needs, i.e. the gravitational parameter of the
/// central body and, for geoids, the shape data used by altitude computations.
#[allow(non_snake_case)]
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Frame {
    /// Any celestial frame which only has a GM (e.g. 3 body frames)
    Celestial { gm: f64 },
    /// Any Geoid which has a GM, flattening value, etc. (all distances in meters)
    Geoid {
        gm: f64,
        flattening: f64,
        equatorial_radius: f64,
    },
}

impl Frame {
    pub fn is_geoid(&self) -> bool {
        matches!(self, Frame::Geoid { .. })
    }

    pub fn is_celestial(&self) -> bool {
        matches!(self, Frame::Celestial { .. })
    }

    /// Gravitational parameter of the central body, in m^3/s^2
    pub fn gm(&self) -> f64 {
        match self {
            Frame::Celestial { gm } | Frame::Geoid { gm, .. } => *gm,
        }
    }

    /// Allows mutating the GM for this frame
    pub fn gm_mut(&mut self, new_gm: f64) {
        match self {
            Self::Geoid { ref mut gm, .. } | Self::Celestial { ref mut gm } => *gm = new_gm,
        }
    }

    pub fn equatorial_radius(&self) -> f64 {
        match self {
            Frame::Geoid {
                equatorial_radius, ..
            } => *equatorial_radius,
            _ => panic!("Frame is not Geoid in kind"),
        }
    }

    pub fn flattening(&self) -> f64 {
        match self {
            Frame::Geoid { flattening, .. } => *flattening,
            _ => panic!("Frame is not Geoid in kind"),
        }
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Frame::Celestial { gm } => write!(f, "Celestial (gm = {gm:.6e} m^3/s^2)"),
            Frame::Geoid { gm, .. } => write!(f, "Geoid (gm = {gm:.6e} m^3/s^2)"),
        }
    }
}

/// A rigid transform between two frames at a given date, applied to
/// position/velocity pairs.
///
/// Only the rotation part is modeled: translations and rotation rates belong
/// to the external frame tree which provides these transforms.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Transform {
    rot: Matrix3<f64>,
}

impl Transform {
    /// Identity transform, for aligned frames.
    pub fn identity() -> Self {
        Self {
            rot: Matrix3::identity(),
        }
    }

    /// Builds a transform from the provided rotation matrix (destination from origin).
    pub fn from_rotation(rot: Matrix3<f64>) -> Self {
        Self { rot }
    }

    /// Returns the inverse transform.
    pub fn inverse(&self) -> Self {
        Self {
            rot: self.rot.transpose(),
        }
    }

    /// Applies this transform to a position/velocity pair.
    pub fn apply_to(&self, radius: &Vector3<f64>, velocity: &Vector3<f64>) -> (Vector3<f64>, Vector3<f64>) {
        (self.rot * radius, self.rot * velocity)
    }
}

/// Returns the rotation matrix of the provided angle (radians) about the first axis
pub fn r1(angle: f64) -> Matrix3<f64> {
    let (s, c) = angle.sin_cos();
    Matrix3::new(1.0, 0.0, 0.0, 0.0, c, s, 0.0, -s, c)
}

/// Returns the rotation matrix of the provided angle (radians) about the third axis
pub fn r3(angle: f64) -> Matrix3<f64> {
    let (s, c) = angle.sin_cos();
    Matrix3::new(c, s, 0.0, -s, c, 0.0, 0.0, 0.0, 1.0)
}
