// Tstamp - Exact musical time at audio-sample resolution
// A timestamp is a whole number of beats plus a remainder in BEAT units.

use serde::de::{self, SeqAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops;

/// Subdivisions per beat
///
/// Divisible by every integer 1..=16 and by the common sample rates, so
/// rows at any sensible grid and sample boundaries land on exact values.
pub const BEAT: i32 = 882_161_280;

const BEAT_I128: i128 = BEAT as i128;

/// Arithmetic errors on timestamps
#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum TstampError {
    #[error("Invalid timestamp arithmetic: {0}")]
    InvalidArithmetic(&'static str),
}

/// Exact rational time value `beats + rem / BEAT`
///
/// Always normalized: `0 <= rem < BEAT`. Negative values carry a negative
/// `beats` and a non-negative `rem`, so `-0.25` is `(-1, 3/4 * BEAT)`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tstamp {
    beats: i64,
    rem: i32,
}

impl Tstamp {
    pub const ZERO: Tstamp = Tstamp { beats: 0, rem: 0 };

    /// The smallest positive step
    pub const UNIT: Tstamp = Tstamp { beats: 0, rem: 1 };

    /// Create a timestamp and propagate carries so that `0 <= rem < BEAT`
    pub fn new(beats: i64, rem: i64) -> Self {
        let carry = rem.div_euclid(BEAT as i64);
        let rem = rem.rem_euclid(BEAT as i64);
        Self {
            beats: beats + carry,
            rem: rem as i32,
        }
    }

    /// Whole beats
    pub const fn from_beats(beats: i64) -> Self {
        Self { beats, rem: 0 }
    }

    /// Nearest timestamp to a real beat count
    pub fn from_f64(value: f64) -> Self {
        let beats = value.floor();
        let rem = ((value - beats) * BEAT as f64).round();
        Self::new(beats as i64, rem as i64)
    }

    pub fn beats(&self) -> i64 {
        self.beats
    }

    pub fn rem(&self) -> i32 {
        self.rem
    }

    pub fn as_f64(&self) -> f64 {
        self.beats as f64 + self.rem as f64 / BEAT as f64
    }

    pub fn is_negative(&self) -> bool {
        self.beats < 0
    }

    /// Total number of rem units
    fn total(&self) -> i128 {
        self.beats as i128 * BEAT_I128 + self.rem as i128
    }

    fn from_total(total: i128) -> Self {
        let beats = total.div_euclid(BEAT_I128);
        let rem = total.rem_euclid(BEAT_I128);
        Self {
            beats: beats as i64,
            rem: rem as i32,
        }
    }

    /// Multiply by a real factor, rounding to the nearest representable value
    /// Add without wrapping the beat count
    pub fn checked_add(self, rhs: Self) -> Result<Self, TstampError> {
        let rem = self.rem as i64 + rhs.rem as i64;
        self.beats
            .checked_add(rhs.beats)
            .and_then(|beats| beats.checked_add(rem.div_euclid(BEAT as i64)))
            .map(|beats| Self {
                beats,
                rem: rem.rem_euclid(BEAT as i64) as i32,
            })
            .ok_or(TstampError::InvalidArithmetic("addition overflow"))
    }

    pub fn checked_mul(self, k: f64) -> Result<Self, TstampError> {
        if k.is_nan() {
            return Err(TstampError::InvalidArithmetic("multiplication by NaN"));
        }
        if k.is_infinite() {
            return Err(TstampError::InvalidArithmetic("multiplication by infinity"));
        }

        // Integral factors stay exact
        if k.fract() == 0.0 && k.abs() < (1u64 << 53) as f64 {
            return Ok(Self::from_total(self.total() * k as i128));
        }

        let scaled = (self.total() as f64 * k).round();
        Ok(Self::from_total(scaled as i128))
    }

    /// Divide by a real factor; defined as multiplication by `1 / k`
    pub fn checked_div(self, k: f64) -> Result<Self, TstampError> {
        if k == 0.0 {
            return Err(TstampError::InvalidArithmetic("division by zero"));
        }
        if k.is_nan() {
            return Err(TstampError::InvalidArithmetic("division by NaN"));
        }
        self.checked_mul(1.0 / k)
    }

    pub fn max(self, other: Self) -> Self {
        std::cmp::max(self, other)
    }

    pub fn min(self, other: Self) -> Self {
        std::cmp::min(self, other)
    }

    pub fn clamp(self, lo: Self, hi: Self) -> Self {
        self.max(lo).min(hi)
    }
}

impl PartialOrd for Tstamp {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Tstamp {
    fn cmp(&self, other: &Self) -> Ordering {
        self.beats
            .cmp(&other.beats)
            .then(self.rem.cmp(&other.rem))
    }
}

// Whole-beat timestamps hash like the plain integer
impl Hash for Tstamp {
    fn hash<H: Hasher>(&self, state: &mut H) {
        if self.rem == 0 {
            self.beats.hash(state);
        } else {
            self.beats.hash(state);
            self.rem.hash(state);
        }
    }
}

impl From<i64> for Tstamp {
    fn from(beats: i64) -> Self {
        Self::from_beats(beats)
    }
}

impl From<f64> for Tstamp {
    fn from(value: f64) -> Self {
        Self::from_f64(value)
    }
}

impl From<Tstamp> for f64 {
    fn from(value: Tstamp) -> Self {
        value.as_f64()
    }
}

impl ops::Neg for Tstamp {
    type Output = Self;

    fn neg(self) -> Self {
        Self::from_total(-self.total())
    }
}

impl ops::Add for Tstamp {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.beats + rhs.beats, self.rem as i64 + rhs.rem as i64)
    }
}

impl ops::AddAssign for Tstamp {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl ops::Sub for Tstamp {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self::new(self.beats - rhs.beats, self.rem as i64 - rhs.rem as i64)
    }
}

impl ops::SubAssign for Tstamp {
    fn sub_assign(&mut self, rhs: Self) {
        *self = *self - rhs;
    }
}

/// Panics on NaN or infinite factors; use `checked_mul` for fallible input
impl ops::Mul<f64> for Tstamp {
    type Output = Self;

    fn mul(self, k: f64) -> Self {
        match self.checked_mul(k) {
            Ok(ts) => ts,
            Err(e) => panic!("{}", e),
        }
    }
}

/// Panics on a zero or NaN divisor; use `checked_div` for fallible input
impl ops::Div<f64> for Tstamp {
    type Output = Self;

    fn div(self, k: f64) -> Self {
        match self.checked_div(k) {
            Ok(ts) => ts,
            Err(e) => panic!("{}", e),
        }
    }
}

impl std::iter::Sum for Tstamp {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Tstamp::ZERO, |acc, t| acc + t)
    }
}

impl fmt::Display for Tstamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.as_f64())
    }
}

// Stored form is `[beats, rem]`
impl Serialize for Tstamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        (self.beats, self.rem).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Tstamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(TstampVisitor)
    }
}

struct TstampVisitor;

impl<'de> Visitor<'de> for TstampVisitor {
    type Value = Tstamp;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        write!(formatter, "a number of beats or a [beats, rem] pair")
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Tstamp, E> {
        Ok(Tstamp::from_beats(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Tstamp, E> {
        i64::try_from(v)
            .map(Tstamp::from_beats)
            .map_err(|_| E::custom("beat count out of range"))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Tstamp, E> {
        if v.is_finite() {
            Ok(Tstamp::from_f64(v))
        } else {
            Err(E::custom("non-finite timestamp"))
        }
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Tstamp, A::Error> {
        let beats: i64 = seq
            .next_element()?
            .ok_or_else(|| de::Error::invalid_length(0, &self))?;
        let rem: i64 = seq
            .next_element()?
            .ok_or_else(|| de::Error::invalid_length(1, &self))?;
        Ok(Tstamp::new(beats, rem))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::collections::hash_map::DefaultHasher;

    fn hash_of<T: Hash>(value: &T) -> u64 {
        let mut hasher = DefaultHasher::new();
        value.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn test_checked_add_overflow() {
        let half = Tstamp::new(0, BEAT as i64 / 2);
        assert_eq!(half.checked_add(half), Ok(Tstamp::from_beats(1)));
        assert_eq!(Tstamp::from_beats(-3).checked_add(half), Ok(Tstamp::new(-3, BEAT as i64 / 2)));
        assert!(Tstamp::from_beats(i64::MAX).checked_add(Tstamp::from_beats(1)).is_err());
        assert!(Tstamp::new(i64::MAX, BEAT as i64 - 1).checked_add(half).is_err());
    }

    #[test]
    fn test_normalization() {
        assert_eq!(Tstamp::new(0, BEAT as i64), Tstamp::from_beats(1));
        assert_eq!(Tstamp::new(2, -1), Tstamp::new(1, BEAT as i64 - 1));
        let t = Tstamp::new(0, -(BEAT as i64) * 3 - 5);
        assert_eq!(t.beats(), -4);
        assert_eq!(t.rem(), BEAT - 5);
    }

    #[test]
    fn test_carry_on_add() {
        let a = Tstamp::new(1, BEAT as i64 - 1);
        assert_eq!(a + Tstamp::new(0, 1), Tstamp::from_beats(2));
    }

    #[test]
    fn test_mul_scalar() {
        assert_eq!(Tstamp::new(1, 1) * 2.0, Tstamp::new(2, 2));
        assert_eq!(Tstamp::from_beats(3) * 0.5, Tstamp::new(1, BEAT as i64 / 2));
        assert_eq!(Tstamp::from_beats(-2) * 0.25, Tstamp::from_f64(-0.5));
    }

    #[test]
    fn test_div_scalar() {
        assert_eq!(Tstamp::from_beats(3) / 2.0, Tstamp::from_f64(1.5));
        assert!(Tstamp::from_beats(1).checked_div(0.0).is_err());
    }

    #[test]
    fn test_mul_nan_is_invalid() {
        assert_eq!(
            Tstamp::from_beats(1).checked_mul(f64::NAN),
            Err(TstampError::InvalidArithmetic("multiplication by NaN"))
        );
    }

    #[test]
    #[should_panic(expected = "division by zero")]
    fn test_div_zero_panics() {
        let _ = Tstamp::from_beats(1) / 0.0;
    }

    #[test]
    fn test_ordering() {
        let a = Tstamp::new(1, 5);
        let b = Tstamp::new(1, 6);
        let c = Tstamp::from_beats(2);
        let neg = Tstamp::from_f64(-0.5);
        assert!(a < b && b < c);
        assert!(neg < Tstamp::ZERO);
    }

    #[test]
    fn test_hash_matches_int_when_whole() {
        assert_eq!(hash_of(&Tstamp::ZERO), hash_of(&0i64));
        assert_eq!(hash_of(&Tstamp::from_beats(7)), hash_of(&7i64));
        assert_ne!(hash_of(&Tstamp::new(7, 1)), hash_of(&7i64));
    }

    #[test]
    fn test_from_f64_carries_rounding() {
        // A fraction that rounds up to a full beat must carry
        let t = Tstamp::from_f64(0.9999999999999);
        assert_eq!(t, Tstamp::from_beats(1));
    }

    #[test]
    fn test_display() {
        assert_eq!(Tstamp::from_f64(1.5).to_string(), "1.50");
    }

    #[test]
    fn test_serde_pair() {
        let t = Tstamp::new(3, 42);
        let json = serde_json::to_string(&t).unwrap();
        assert_eq!(json, "[3,42]");
        let back: Tstamp = serde_json::from_str(&json).unwrap();
        assert_eq!(back, t);
        let whole: Tstamp = serde_json::from_str("4").unwrap();
        assert_eq!(whole, Tstamp::from_beats(4));
    }

    #[test]
    fn test_random_properties() {
        let mut rng = StdRng::seed_from_u64(0x6b71);
        for _ in 0..2000 {
            let beats: i64 = rng.gen_range(-(1 << 20)..=(1 << 20));
            let rem: i32 = rng.gen_range(0..BEAT);
            let t = Tstamp::new(beats, rem as i64);

            assert!(t.rem() >= 0 && t.rem() < BEAT);
            assert_eq!(Tstamp::from_f64(t.as_f64()), t);
            assert_eq!(Tstamp::from_beats(beats) + Tstamp::from_beats(-beats), Tstamp::ZERO);
            assert_eq!(t + -t, Tstamp::ZERO);
            assert_eq!((t + Tstamp::UNIT) - Tstamp::UNIT, t);
        }
    }
}
