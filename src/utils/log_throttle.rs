use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

struct Slot {
    next_at: Instant,
    suppressed: u64,
}

/// Lets one log line per key through each `interval` and counts the rest.
pub struct LogThrottle {
    interval: Duration,
    slots: Mutex<HashMap<&'static str, Slot>>,
}

impl LogThrottle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// `Some(n)` when the line for `key` may be written, `n` being how many
    /// were held back since the previous one.
    pub fn admit(&self, key: &'static str) -> Option<u64> {
        let now = Instant::now();
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        let slot = slots.entry(key).or_insert(Slot {
            next_at: now,
            suppressed: 0,
        });

        if now < slot.next_at {
            slot.suppressed += 1;
            return None;
        }
        slot.next_at = now + self.interval;
        Some(std::mem::take(&mut slot.suppressed))
    }
}

#[cfg(test)]
mod tests {
    use super::LogThrottle;
    use std::thread::sleep;
    use std::time::Duration;

    #[test]
    fn keys_are_throttled_independently() {
        let throttle = LogThrottle::new(Duration::from_millis(25));

        assert_eq!(throttle.admit("invalid"), Some(0));
        assert_eq!(throttle.admit("expired"), Some(0));
        assert_eq!(throttle.admit("invalid"), None);
        assert_eq!(throttle.admit("invalid"), None);
        assert_eq!(throttle.admit("expired"), None);

        sleep(Duration::from_millis(40));
        assert_eq!(throttle.admit("invalid"), Some(2));
        assert_eq!(throttle.admit("expired"), Some(1));
        assert_eq!(throttle.admit("invalid"), None);
    }

    #[test]
    fn instances_do_not_share_windows() {
        let first = LogThrottle::new(Duration::from_secs(60));
        let second = LogThrottle::new(Duration::from_secs(60));

        assert_eq!(first.admit("invalid"), Some(0));
        assert_eq!(first.admit("invalid"), None);
        assert_eq!(second.admit("invalid"), Some(0));
    }
}
