//! Split a secret into shares.

use crate::{
    poly::evaluate,
    share::{SecretId, Share, ShareId, ID_LENGTH},
    Error, MAX_SHARES, MIN_THRESHOLD,
};
use rand::{CryptoRng, RngCore};
use zeroize::Zeroize;

/// Threshold configuration for splitting a secret.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Config {
    /// Number of shares required to reconstruct the secret (`K`).
    pub threshold: u8,
    /// Number of shares produced (`N`).
    pub total: u8,
}

impl Config {
    /// Creates a configuration, rejecting any `(threshold, total)` outside `2 <= K <= N <= 255`.
    pub fn new(threshold: usize, total: usize) -> Result<Self, Error> {
        if threshold < MIN_THRESHOLD as usize || threshold > total || total > MAX_SHARES {
            return Err(Error::InvalidThreshold(threshold, total));
        }
        Ok(Self {
            threshold: threshold as u8,
            total: total as u8,
        })
    }

    /// Checks the configuration's bounds.
    pub fn validate(&self) -> Result<(), Error> {
        Self::new(self.threshold as usize, self.total as usize).map(|_| ())
    }
}

/// Splits `secret` into `config.total` shares, any `config.threshold` of which reconstruct it.
///
/// For every byte of the secret, `threshold - 1` coefficients are drawn from `rng`
/// to form a polynomial whose constant term is that byte. Share `x` (for `x` in
/// `1..=total`) holds the evaluations of these polynomials at `x`. Coefficients are
/// never reused across byte positions.
///
/// `created_at` (milliseconds since the UNIX epoch) is recorded on every share.
pub fn split<R: RngCore + CryptoRng>(
    rng: &mut R,
    config: &Config,
    secret: &[u8],
    created_at: u64,
) -> Result<Vec<Share>, Error> {
    config.validate()?;
    let degree = (config.threshold - 1) as usize;
    let total = config.total as usize;

    // Draw identifiers
    let secret_id = SecretId::random(rng)?;
    let mut ids = vec![0u8; total * ID_LENGTH];
    rng.try_fill_bytes(&mut ids)
        .map_err(|_| Error::InsecureRandomSource)?;

    // Draw all coefficients at once
    let mut coefficients = vec![0u8; secret.len() * degree];
    rng.try_fill_bytes(&mut coefficients)
        .map_err(|_| Error::InsecureRandomSource)?;

    // Evaluate each byte's polynomial at every share index
    let mut payloads = vec![Vec::with_capacity(secret.len()); total];
    let mut poly = vec![0u8; degree + 1];
    for (byte, random) in secret.iter().zip(coefficients.chunks_exact(degree)) {
        poly[0] = *byte;
        poly[1..].copy_from_slice(random);
        for (x, payload) in (1..=config.total).zip(payloads.iter_mut()) {
            payload.push(evaluate(&poly, x.into()).value());
        }
    }
    poly.zeroize();
    coefficients.zeroize();

    Ok(payloads
        .into_iter()
        .zip(ids.chunks_exact(ID_LENGTH))
        .zip(1..=config.total)
        .map(|((payload, id), index)| {
            let mut raw = [0u8; ID_LENGTH];
            raw.copy_from_slice(id);
            Share::new(
                ShareId::from(raw),
                secret_id,
                index,
                config.threshold,
                payload,
                created_at,
            )
        })
        .collect())
}
