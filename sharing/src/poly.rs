//! Polynomial evaluation and interpolation over GF(2^8).
//!
//! # Warning
//!
//! The threshold property depends on every evaluation point being distinct and
//! non-zero: evaluating at `x=0` yields the constant term (the secret byte).

use crate::{field::Gf256, Error};

/// Evaluates the polynomial with the given coefficients (constant term first) at `x`.
pub fn evaluate(coefficients: &[u8], x: Gf256) -> Gf256 {
    // Horner's method
    coefficients
        .iter()
        .rev()
        .fold(Gf256::zero(), |acc, coeff| acc * x + Gf256::new(*coeff))
}

/// Computes the Lagrange basis coefficients `l_j(0)` for the evaluation points `xs`.
///
/// `l_j(0) = product_{m != j} (0 - x_m) / (x_j - x_m)`. In characteristic 2,
/// `0 - x_m = x_m`.
///
/// The coefficients depend only on the points, so they are computed once and
/// reused for every byte position of a secret.
pub fn weights(xs: &[Gf256]) -> Result<Vec<Gf256>, Error> {
    xs.iter()
        .enumerate()
        .map(|(j, xj)| {
            let (num, den) = xs
                .iter()
                .enumerate()
                .filter(|(m, _)| *m != j)
                .fold((Gf256::one(), Gf256::one()), |(num, den), (_, xm)| {
                    (num * *xm, den * (*xj - *xm))
                });

            // Fails if two points coincide
            num.div(den)
        })
        .collect()
}

/// Recovers the constant term of the polynomial passing through `points`.
///
/// A polynomial of degree `t - 1` is uniquely determined by `t` points, so
/// supplying exactly the threshold number of points recovers its constant term.
pub fn interpolate(points: &[(Gf256, Gf256)]) -> Result<Gf256, Error> {
    let xs = points.iter().map(|(x, _)| *x).collect::<Vec<_>>();
    let weights = weights(&xs)?;
    Ok(points
        .iter()
        .zip(weights)
        .fold(Gf256::zero(), |acc, ((_, y), w)| acc + *y * w))
}
