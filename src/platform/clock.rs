//! Monotonic timestamps for sensor events

/// Nanoseconds on the clock sensor events are stamped with
///
/// On Linux and Android this is `CLOCK_BOOTTIME`, which keeps counting
/// through suspend. Elsewhere it is a monotonic clock started on first use.
#[cfg(any(target_os = "linux", target_os = "android"))]
pub fn sensor_clock_nanos() -> i64 {
    let mut ts = libc::timespec {
        tv_sec: 0,
        tv_nsec: 0,
    };
    // SAFETY: `ts` is a valid, writable timespec for the duration of the call.
    let rc = unsafe { libc::clock_gettime(libc::CLOCK_BOOTTIME, &mut ts) };
    if rc != 0 {
        return fallback_nanos();
    }
    (ts.tv_sec as i64)
        .saturating_mul(1_000_000_000)
        .saturating_add(ts.tv_nsec as i64)
}

#[cfg(not(any(target_os = "linux", target_os = "android")))]
pub fn sensor_clock_nanos() -> i64 {
    fallback_nanos()
}

fn fallback_nanos() -> i64 {
    use std::sync::OnceLock;
    use std::time::Instant;

    static ORIGIN: OnceLock<Instant> = OnceLock::new();
    let origin = ORIGIN.get_or_init(Instant::now);
    i64::try_from(origin.elapsed().as_nanos()).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_is_monotonic() {
        let a = sensor_clock_nanos();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let b = sensor_clock_nanos();
        assert!(b > a);
    }

    #[test]
    fn test_fallback_is_monotonic() {
        let a = fallback_nanos();
        let b = fallback_nanos();
        assert!(b >= a);
    }
}
