//! Reconstruct a secret from a threshold of its shares.

use crate::{field::Gf256, poly::weights, share::Share, Error, MIN_THRESHOLD};

/// Reconstructs the secret from `shares`.
///
/// All shares must belong to the same secret, agree on the threshold and
/// payload length, carry distinct non-zero indices and pass checksum
/// verification. Any violation is an error: no best-effort result is ever
/// produced.
///
/// If more than `threshold` shares are supplied, the `threshold` shares with
/// the lowest indices are combined (so two invocations over the same shares
/// always combine the same subset).
pub fn reconstruct(shares: &[Share]) -> Result<Vec<u8>, Error> {
    let first = shares
        .first()
        .ok_or(Error::InsufficientShares(0, MIN_THRESHOLD as usize))?;
    let threshold = first.threshold;
    if threshold < MIN_THRESHOLD {
        return Err(Error::InvalidThreshold(threshold as usize, shares.len()));
    }
    let length = first.payload.len();

    // Validate every share before combining any of them
    let mut seen = [false; 256];
    for share in shares {
        if share.secret != first.secret || share.threshold != threshold {
            return Err(Error::MismatchedSecret);
        }
        if share.index == 0 {
            return Err(Error::InvalidIndex(share.index));
        }
        if share.payload.len() != length {
            return Err(Error::MismatchedShareLength);
        }
        if seen[share.index as usize] {
            return Err(Error::DuplicateIndex(share.index));
        }
        seen[share.index as usize] = true;
        if !share.verify() {
            return Err(Error::Integrity(share.index));
        }
    }
    let threshold = threshold as usize;
    if shares.len() < threshold {
        return Err(Error::InsufficientShares(shares.len(), threshold));
    }

    // Select the lowest indices
    let mut selected = shares.iter().collect::<Vec<_>>();
    selected.sort_by_key(|share| share.index);
    selected.truncate(threshold);

    // Interpolate each byte position at x=0
    let xs = selected
        .iter()
        .map(|share| Gf256::new(share.index))
        .collect::<Vec<_>>();
    let weights = weights(&xs)?;
    let secret = (0..length)
        .map(|position| {
            selected
                .iter()
                .zip(&weights)
                .fold(Gf256::zero(), |acc, (share, weight)| {
                    acc + Gf256::new(share.payload[position]) * *weight
                })
                .value()
        })
        .collect();
    Ok(secret)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::split::{split, Config};
    use rand::{rngs::StdRng, Rng, RngCore, SeedableRng};
    use test_case::test_case;

    fn random_secret(rng: &mut StdRng, len: usize) -> Vec<u8> {
        let mut secret = vec![0u8; len];
        rng.fill_bytes(&mut secret);
        secret
    }

    /// All subsets of `0..n` with `k` elements.
    fn subsets(n: usize, k: usize) -> Vec<Vec<usize>> {
        (0u32..(1 << n))
            .filter(|mask| mask.count_ones() as usize == k)
            .map(|mask| (0..n).filter(|i| mask & (1 << i) != 0).collect())
            .collect()
    }

    #[test_case(2, 2)]
    #[test_case(2, 3)]
    #[test_case(3, 5)]
    #[test_case(4, 7)]
    #[test_case(5, 5)]
    fn test_every_threshold_subset(threshold: usize, total: usize) {
        let mut rng = StdRng::seed_from_u64(threshold as u64 * 31 + total as u64);
        let config = Config::new(threshold, total).unwrap();
        let secret = random_secret(&mut rng, 33);
        let shares = split(&mut rng, &config, &secret, 0).unwrap();
        for subset in subsets(total, threshold) {
            let chosen = subset.iter().map(|i| shares[*i].clone()).collect::<Vec<_>>();
            assert_eq!(reconstruct(&chosen).unwrap(), secret, "subset {subset:?}");
        }
    }

    #[test]
    fn test_random_configurations() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..50 {
            let total = rng.gen_range(2..=64usize);
            let threshold = rng.gen_range(2..=total);
            let len = rng.gen_range(0..64usize);
            let config = Config::new(threshold, total).unwrap();
            let secret = random_secret(&mut rng, len);
            let mut shares = split(&mut rng, &config, &secret, 0).unwrap();

            // Any threshold-sized subset (in any order) works
            for i in (1..shares.len()).rev() {
                let j = rng.gen_range(0..=i);
                shares.swap(i, j);
            }
            shares.truncate(threshold);
            assert_eq!(reconstruct(&shares).unwrap(), secret);
        }
    }

    #[test]
    fn test_more_than_threshold() {
        let mut rng = StdRng::seed_from_u64(0);
        let config = Config::new(3, 6).unwrap();
        let secret = random_secret(&mut rng, 16);
        let shares = split(&mut rng, &config, &secret, 0).unwrap();
        assert_eq!(reconstruct(&shares).unwrap(), secret);
    }

    #[test]
    fn test_empty_secret() {
        let mut rng = StdRng::seed_from_u64(0);
        let config = Config::new(2, 4).unwrap();
        let shares = split(&mut rng, &config, &[], 0).unwrap();
        assert_eq!(reconstruct(&shares[1..3]).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn test_insufficient_shares() {
        let mut rng = StdRng::seed_from_u64(0);
        let config = Config::new(3, 5).unwrap();
        let shares = split(&mut rng, &config, b"secret", 0).unwrap();
        assert!(matches!(
            reconstruct(&shares[..2]),
            Err(Error::InsufficientShares(2, 3))
        ));
        assert!(matches!(
            reconstruct(&[]),
            Err(Error::InsufficientShares(0, _))
        ));
    }

    #[test]
    fn test_duplicate_index() {
        let mut rng = StdRng::seed_from_u64(0);
        let config = Config::new(2, 3).unwrap();
        let shares = split(&mut rng, &config, b"secret", 0).unwrap();
        let duplicated = vec![shares[0].clone(), shares[1].clone(), shares[1].clone()];
        assert!(matches!(
            reconstruct(&duplicated),
            Err(Error::DuplicateIndex(2))
        ));
    }

    #[test]
    fn test_mismatched_length() {
        let mut rng = StdRng::seed_from_u64(0);
        let config = Config::new(2, 3).unwrap();
        let shares = split(&mut rng, &config, b"secret", 0).unwrap();
        let mut short = shares[1].clone();
        short.payload.pop();
        assert!(matches!(
            reconstruct(&[shares[0].clone(), short]),
            Err(Error::MismatchedShareLength)
        ));
    }

    #[test]
    fn test_mismatched_secret() {
        let mut rng = StdRng::seed_from_u64(0);
        let config = Config::new(2, 3).unwrap();
        let a = split(&mut rng, &config, b"secret", 0).unwrap();
        let b = split(&mut rng, &config, b"secret", 0).unwrap();
        assert!(matches!(
            reconstruct(&[a[0].clone(), b[1].clone()]),
            Err(Error::MismatchedSecret)
        ));
    }

    #[test]
    fn test_corrupted_share() {
        let mut rng = StdRng::seed_from_u64(0);
        let config = Config::new(2, 3).unwrap();
        let shares = split(&mut rng, &config, b"secret", 0).unwrap();
        let mut corrupted = shares[2].clone();
        corrupted.payload[0] ^= 0x01;
        assert!(matches!(
            reconstruct(&[shares[0].clone(), corrupted]),
            Err(Error::Integrity(3))
        ));
    }

    #[test]
    fn test_zero_index() {
        let mut rng = StdRng::seed_from_u64(0);
        let config = Config::new(2, 3).unwrap();
        let shares = split(&mut rng, &config, b"secret", 0).unwrap();
        let mut zero = shares[1].clone();
        zero.index = 0;
        assert!(matches!(
            reconstruct(&[shares[0].clone(), zero]),
            Err(Error::InvalidIndex(0))
        ));
    }

    #[test]
    fn test_threshold_minus_one_is_uniform() {
        // With threshold 3, any 2 shares are independent of the secret: the joint
        // distribution of their bytes is identical for every secret. Check that the
        // first bytes of shares 1 and 2 are spread uniformly for two very different
        // secrets (256 buckets, ~200 samples each).
        const TRIALS: usize = 51_200;
        let config = Config::new(3, 5).unwrap();
        for (seed, secret) in [(1u64, [0x00u8; 4]), (2u64, [0xFFu8; 4])] {
            let mut rng = StdRng::seed_from_u64(seed);
            let mut first = [0usize; 256];
            let mut second = [0usize; 256];
            let mut equal = 0usize;
            for _ in 0..TRIALS {
                let shares = split(&mut rng, &config, &secret, 0).unwrap();
                first[shares[0].payload[0] as usize] += 1;
                second[shares[1].payload[0] as usize] += 1;
                if shares[0].payload[0] == secret[0] {
                    equal += 1;
                }
            }
            let expected = TRIALS / 256;
            for counts in [&first, &second] {
                assert!(counts.iter().all(|c| *c > expected / 2 && *c < expected * 2));
            }

            // A share byte matches the secret byte about 1/256 of the time
            assert!(equal < expected * 2);
        }
    }
}
