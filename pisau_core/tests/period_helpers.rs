// Focused tests for period helpers.
use pisau_core::util::{millis, period, period_us};
use std::time::Duration;

#[test]
fn period_us_clamps_and_floors() {
    assert_eq!(period_us(1), 1_000_000);
    // vision rate
    assert_eq!(period_us(15), 66_666);
    // Very high hz floors to 1µs minimum
    assert_eq!(period_us(1_000_000), 1);
    assert_eq!(period_us(u32::MAX), 1);
}

#[test]
fn period_is_a_duration() {
    assert_eq!(period(2), Duration::from_millis(500));
    assert_eq!(period(1), Duration::from_secs(1));
}

#[test]
fn millis_saturates_instead_of_truncating() {
    assert_eq!(millis(Duration::from_millis(500)), 500);
    assert_eq!(millis(Duration::MAX), u64::MAX);
}

// In debug builds we assert on hz=0 to catch misconfiguration early.
#[cfg(debug_assertions)]
#[test]
#[should_panic(expected = "rate_hz must be > 0")]
fn period_us_panics_on_zero_hz_in_debug() {
    let _ = period_us(0);
}
