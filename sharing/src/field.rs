use crate::Error;
use std::ops::{Add, AddAssign, Mul, MulAssign, Sub};

/// The reducing polynomial x^8 + x^4 + x^3 + x + 1 (the AES field).
const POLYNOMIAL: u16 = 0x11B;

const fn tables() -> ([u8; 256], [u8; 512]) {
    let mut log = [0u8; 256];
    let mut exp = [0u8; 512];
    let mut x: u16 = 1;
    let mut i = 0;
    while i < 255 {
        exp[i] = x as u8;
        log[x as usize] = i as u8;

        // Step by the generator 0x03 (0x02 does not generate this field): x * 3 = (x * 2) ^ x
        let mut doubled = x << 1;
        if doubled & 0x100 != 0 {
            doubled ^= POLYNOMIAL;
        }
        x ^= doubled;
        i += 1;
    }

    // Repeat the cycle so that sums of two logarithms index directly.
    while i < 512 {
        exp[i] = exp[i - 255];
        i += 1;
    }
    (log, exp)
}

const TABLES: ([u8; 256], [u8; 512]) = tables();

/// `LOG[x]` is the discrete logarithm of `x` base 0x03 (`LOG[0]` is unused).
static LOG: [u8; 256] = TABLES.0;

/// `EXP[i]` is 0x03 raised to `i`.
static EXP: [u8; 512] = TABLES.1;

/// An element of GF(2^8).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Gf256(u8);

impl std::fmt::Debug for Gf256 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02X}", self.0)
    }
}

impl Gf256 {
    /// The additive identity.
    pub const fn zero() -> Self {
        Self(0)
    }

    /// The multiplicative identity.
    pub const fn one() -> Self {
        Self(1)
    }

    pub const fn new(value: u8) -> Self {
        Self(value)
    }

    pub const fn value(self) -> u8 {
        self.0
    }

    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Returns the multiplicative inverse, or `None` for zero.
    pub fn inverse(self) -> Option<Self> {
        if self.0 == 0 {
            return None;
        }
        Some(Self(EXP[255 - LOG[self.0 as usize] as usize]))
    }

    /// Divides `self` by `rhs`.
    ///
    /// Zero has no inverse, so dividing by it is an error rather than a zero result.
    pub fn div(self, rhs: Self) -> Result<Self, Error> {
        if rhs.0 == 0 {
            return Err(Error::DivisionByZero);
        }
        if self.0 == 0 {
            return Ok(Self::zero());
        }
        let exponent = LOG[self.0 as usize] as usize + 255 - LOG[rhs.0 as usize] as usize;
        Ok(Self(EXP[exponent]))
    }

    /// Raises `self` to the power `e`.
    pub fn pow(self, e: u32) -> Self {
        if e == 0 {
            return Self::one();
        }
        if self.0 == 0 {
            return Self::zero();
        }
        let exponent = (LOG[self.0 as usize] as u64 * e as u64) % 255;
        Self(EXP[exponent as usize])
    }
}

impl From<u8> for Gf256 {
    fn from(value: u8) -> Self {
        Self(value)
    }
}

impl From<Gf256> for u8 {
    fn from(value: Gf256) -> Self {
        value.0
    }
}

impl Add for Gf256 {
    type Output = Self;

    #[allow(clippy::suspicious_arithmetic_impl)]
    fn add(self, rhs: Self) -> Self {
        Self(self.0 ^ rhs.0)
    }
}

impl AddAssign for Gf256 {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl Sub for Gf256 {
    type Output = Self;

    // Characteristic 2: every element is its own additive inverse.
    #[allow(clippy::suspicious_arithmetic_impl)]
    fn sub(self, rhs: Self) -> Self {
        Self(self.0 ^ rhs.0)
    }
}

impl Mul for Gf256 {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self {
        if self.0 == 0 || rhs.0 == 0 {
            return Self::zero();
        }
        Self(EXP[LOG[self.0 as usize] as usize + LOG[rhs.0 as usize] as usize])
    }
}

impl MulAssign for Gf256 {
    fn mul_assign(&mut self, rhs: Self) {
        *self = *self * rhs;
    }
}
