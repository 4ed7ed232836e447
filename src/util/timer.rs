use std::fmt::Debug;
use std::fmt::Error;
use std::fmt::Formatter;
use std::ops::AddAssign;
use std::time::Duration;
use std::time::Instant;

/// Wall-clock timer used to report superstep and traversal runtimes.
#[derive(Clone, Copy, Debug)]
pub struct GfTimer {
    instant: Instant,
}

#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct GfDuration {
    duration: Duration,
}

impl GfTimer {
    pub fn now() -> Self {
        Self { instant: Instant::now() }
    }

    pub fn elapsed(&self) -> GfDuration {
        GfDuration { duration: self.instant.elapsed() }
    }
}

impl GfDuration {
    pub fn to_millis_string(&self) -> String {
        const MICRO_PER_MILLI: u128 = 1_000;
        format!(
            "{}.{:03} ms",
            self.duration.as_micros() / MICRO_PER_MILLI,
            self.duration.as_micros() % MICRO_PER_MILLI
        )
    }
}

impl Debug for GfDuration {
    fn fmt(&self, f: &mut Formatter) -> Result<(), Error> {
        write!(f, "{:?}", self.duration)
    }
}

impl AddAssign for GfDuration {
    fn add_assign(&mut self, rhs: Self) {
        self.duration += rhs.duration;
    }
}

#[cfg(test)]
mod tests {
    use crate::util::timer::GfDuration;
    use std::time::Duration;

    #[test]
    fn millis_format() {
        let inputs =
            vec![(0, 7_106_780, "7.106 ms"), (152, 628_093_000, "152628.093 ms")];
        for (sec, nano, milli_str) in inputs {
            let duration = GfDuration { duration: Duration::new(sec, nano) };
            assert_eq!(duration.to_millis_string(), milli_str);
        }
    }

    #[test]
    fn accumulation() {
        let mut total = GfDuration::default();
        total += GfDuration { duration: Duration::from_micros(1_500) };
        total += GfDuration { duration: Duration::from_micros(2_500) };
        assert_eq!(total.to_millis_string(), "4.000 ms");
    }
}
