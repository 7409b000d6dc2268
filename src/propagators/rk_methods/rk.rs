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

pub use super::RK;

/// The Cash-Karp 4(5) embedded pair.
///
/// Six stages, fifth order propagation with a fourth order error estimate.
/// A solid alternative when Dormand-Prince shows step-size thrashing on a
/// rough force model; selectable on the driver through
/// `NumericalPropagator::cash_karp45`.
pub struct CashKarp45 {}

impl RK for CashKarp45 {
    const ORDER: u8 = 5;
    const STAGES: usize = 6;
    #[rustfmt::skip]
    const A_COEFFS: &'static [f64] = &[
        // stage 2
        1.0 / 5.0,
        // stage 3
        3.0 / 40.0, 9.0 / 40.0,
        // stage 4
        3.0 / 10.0, -9.0 / 10.0, 6.0 / 5.0,
        // stage 5
        -11.0 / 54.0, 5.0 / 2.0, -70.0 / 27.0, 35.0 / 27.0,
        // stage 6
        1631.0 / 55296.0, 175.0 / 512.0, 575.0 / 13824.0,
        44275.0 / 110592.0, 253.0 / 4096.0,
    ];
    #[rustfmt::skip]
    const B_COEFFS: &'static [f64] = &[
        // fifth order weights
        37.0 / 378.0, 0.0, 250.0 / 621.0, 125.0 / 594.0, 0.0, 512.0 / 1771.0,
        // fourth order weights, for the error estimate
        2825.0 / 27648.0, 0.0, 18575.0 / 48384.0, 13525.0 / 55296.0,
        277.0 / 14336.0, 1.0 / 4.0,
    ];
}

/// The classical fixed step fourth order Runge Kutta.
///
/// The second half of the weight table repeats the first half, so the
/// embedded error estimate is identically zero: pairing this method with
/// adaptive options degenerates to a constant step.
pub struct RK4Fixed {}

impl RK for RK4Fixed {
    const ORDER: u8 = 4;
    const STAGES: usize = 4;
    const A_COEFFS: &'static [f64] = &[0.5, 0.0, 0.5, 0.0, 0.0, 1.0];
    #[rustfmt::skip]
    const B_COEFFS: &'static [f64] = &[
        1.0 / 6.0, 1.0 / 3.0, 1.0 / 3.0, 1.0 / 6.0,
        1.0 / 6.0, 1.0 / 3.0, 1.0 / 3.0, 1.0 / 6.0,
    ];
}
