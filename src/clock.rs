use chrono::{DateTime, Utc};

/// Injectable time source. Everything that needs "now" (audit timestamps,
/// status derivation) goes through this so tests can pin time.
pub trait Clock: Send + Sync {
    fn now_utc(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock frozen at a fixed instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now_utc(&self) -> DateTime<Utc> {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn fixed_clock_is_frozen() {
        let t = Utc.with_ymd_and_hms(2025, 1, 6, 9, 0, 0).unwrap();
        let clock = FixedClock(t);
        assert_eq!(clock.now_utc(), t);
        assert_eq!(clock.now_utc(), t);
    }
}
