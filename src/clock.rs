//! Time source for token issuance and codec timestamps.

/// Port for getting the current time.
pub trait Clock: Send + Sync {
    /// Get the current Unix timestamp in seconds.
    fn now(&self) -> i64;
}

/// System clock using the OS time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        chrono::Utc::now().timestamp()
    }
}

#[cfg(test)]
pub(crate) use fixed::FixedClock;


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_clock() {
        let before = chrono::Utc::now().timestamp();
        let now = SystemClock.now();
        assert!(now >= before && now - before <= 1);
    }

    #[test]
    fn test_fixed_clock() {
        let clock = FixedClock::new(1_628_603_180);
        assert_eq!(clock.now(), 1_628_603_180);

        clock.advance(60);
        assert_eq!(clock.now(), 1_628_603_240);
    }
}
