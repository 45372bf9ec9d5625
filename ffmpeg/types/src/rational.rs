/*!
    Rational numbers for stream time bases.
*/

use std::fmt;

/**
    Exact ratio of two integers, such as a time base of 1/90000 or a frame
    rate of 30000/1001.
*/
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rational {
    pub num: i32,
    pub den: i32,
}

impl Rational {
    /**
        # Panics

        Panics if `den` is zero.
    */
    #[inline]
    pub const fn new(num: i32, den: i32) -> Self {
        assert!(den != 0, "denominator cannot be zero");
        Self { num, den }
    }

    #[inline]
    pub fn to_f64(self) -> f64 {
        f64::from(self.num) / f64::from(self.den)
    }
}

// Debug reads the same as Display so frames and logs stay compact.
impl fmt::Debug for Rational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for Rational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[should_panic(expected = "denominator cannot be zero")]
    fn zero_denominator_panics() {
        Rational::new(1, 0);
    }

    #[test]
    fn formats_as_a_fraction() {
        let ntsc = Rational::new(30000, 1001);
        assert_eq!(ntsc.to_string(), "30000/1001");
        assert_eq!(format!("{ntsc:?}"), "30000/1001");
        assert!((ntsc.to_f64() - 29.97).abs() < 0.01);
    }
}
