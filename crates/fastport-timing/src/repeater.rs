use crate::Nanos;

/// Fires at most once per `interval`, used to pace retry/backoff logging in
/// the acceptor and connector without a dedicated timer thread.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Repeater {
    interval: Nanos,
    last_acted: Nanos,
}

impl Repeater {
    #[inline]
    pub fn every(interval: Nanos) -> Self {
        Self {
            interval,
            last_acted: Nanos::now(),
        }
    }

    #[inline]
    pub fn maybe<F>(&mut self, mut f: F)
    where
        F: FnMut(Nanos),
    {
        let el = self.last_acted.elapsed();
        if el >= self.interval {
            f(el);
            self.last_acted = Nanos::now();
        }
    }

    #[inline]
    pub fn fired(&mut self) -> bool {
        let el = self.last_acted.elapsed();
        if el >= self.interval {
            self.last_acted = Nanos::now();
            true
        } else {
            false
        }
    }

    #[inline]
    pub fn interval(&self) -> Nanos {
        self.interval
    }

    #[inline]
    pub fn set_interval(&mut self, interval: Nanos) {
        self.interval = interval;
    }

    pub fn reset(&mut self) {
        self.last_acted = Nanos::now();
    }

    pub fn force_fire(&mut self) {
        self.last_acted = Nanos::ZERO;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_once_then_waits_for_interval() {
        let mut r = Repeater::every(Nanos::from_millis(20));
        assert!(!r.fired());
        std::thread::sleep(std::time::Duration::from_millis(25));
        assert!(r.fired());
        assert!(!r.fired());
    }

    #[test]
    fn force_fire_makes_next_check_true() {
        let mut r = Repeater::every(Nanos::from_secs(60));
        assert!(!r.fired());
        r.force_fire();
        assert!(r.fired());
    }
}
