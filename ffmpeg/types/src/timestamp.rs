/*!
    Presentation timestamps.
*/

use std::time::Duration;

use crate::Rational;

/**
    Presentation timestamp in units of the owning stream's time base.

    Fused frames keep the timestamps of their inputs, so these values are
    only comparable within one stream.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Pts(pub i64);

impl Pts {
    /**
        Time since the start of the stream. Timestamps before the start
        (negative, as some containers emit for priming frames) map to zero.
    */
    pub fn to_duration(self, time_base: Rational) -> Duration {
        let seconds = self.0 as f64 * time_base.to_f64();
        if seconds.is_finite() && seconds > 0.0 {
            Duration::from_secs_f64(seconds)
        } else {
            Duration::ZERO
        }
    }
}
