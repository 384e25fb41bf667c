use streamlat_common::{Clock, EpochMillis, ManualClock, SystemClock};

#[test]
fn test_from_secs_rounds_to_nearest_milli() {
    assert_eq!(EpochMillis::from_secs_f64(1.5034), Some(EpochMillis(1_503)));
    assert_eq!(EpochMillis::from_secs_f64(1.5036), Some(EpochMillis(1_504)));
    assert_eq!(EpochMillis::from_secs_f64(f64::NAN), None);
    assert_eq!(EpochMillis::from_secs_f64(f64::INFINITY), None);
}

#[test]
fn test_millis_since_is_signed() {
    let a = EpochMillis(1_000);
    let b = EpochMillis(1_250);
    assert_eq!(b.millis_since(a), 250);
    assert_eq!(a.millis_since(b), -250);
}

#[test]
fn test_manual_clock_moves_only_when_told() {
    let clock = ManualClock::new(EpochMillis(10));
    assert_eq!(clock.now(), EpochMillis(10));
    clock.advance(5);
    assert_eq!(clock.now(), EpochMillis(15));
    clock.set(EpochMillis(1));
    assert_eq!(clock.now(), EpochMillis(1));
}

#[test]
fn test_system_clock_is_after_2020() {
    // 2020-01-01T00:00:00Z
    assert!(SystemClock.now() > EpochMillis(1_577_836_800_000));
}
