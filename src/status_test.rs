use super::*;

#[test]
fn test_volume_clamps_and_round_trips() {
    let shared = EngineShared::new(0.75);
    assert_eq!(shared.volume(), 0.75);

    shared.set_volume(1.5);
    assert_eq!(shared.volume(), 1.0);
    shared.set_volume(-0.5);
    assert_eq!(shared.volume(), 0.0);
    shared.set_volume(0.25);
    assert_eq!(shared.volume(), 0.25);
}

#[test]
fn test_counters_accumulate() {
    let shared = EngineShared::new(1.0);
    shared.add_underrun();
    shared.add_underrun();
    shared.add_overruns(37);
    shared.add_drift_correction();
    assert_eq!(shared.underruns(), 2);
    assert_eq!(shared.overruns(), 37);
    assert_eq!(shared.drift_corrections(), 1);

    shared.reset_counters();
    assert_eq!(shared.underruns(), 0);
    assert_eq!(shared.overruns(), 0);
    assert_eq!(shared.drift_corrections(), 0);
}

#[test]
fn test_first_fault_wins() {
    let shared = EngineShared::new(1.0);
    assert_eq!(shared.take_fault(), None);

    shared.raise_fault(ErrorKind::DeviceLost);
    shared.raise_fault(ErrorKind::OutOfMemory);
    assert_eq!(shared.take_fault(), Some(ErrorKind::DeviceLost));
    assert_eq!(shared.take_fault(), None);
}

#[test]
fn test_rt_warning_is_one_shot() {
    let shared = EngineShared::new(1.0);
    assert!(!shared.take_rt_warning());
    shared.flag_rt_warning();
    assert!(shared.take_rt_warning());
    assert!(!shared.take_rt_warning());
}

#[test]
fn test_running_flag() {
    let shared = EngineShared::new(1.0);
    assert!(!shared.is_running());
    shared.set_running(true);
    assert!(shared.is_running());
}

#[test]
fn test_peak_gauges() {
    let shared = EngineShared::new(1.0);
    shared.set_input_peak(0.5);
    shared.set_output_peak(0.25);
    assert_eq!(shared.input_peak(), 0.5);
    assert_eq!(shared.output_peak(), 0.25);
}

#[test]
fn test_latency_estimates() {
    // 1024 buffered frames plus a 128-frame period at 48 kHz: 24 ms.
    let rt = round_trip_latency_ms(1024, 128, 48_000);
    assert!((rt - 24.0).abs() < 1e-3);

    let leg = leg_latency_ms(128, 48_000);
    assert!((leg - 2.6667).abs() < 1e-3);

    assert_eq!(round_trip_latency_ms(0, 0, 0), 0.0);
    assert_eq!(leg_latency_ms(128, 0), 0.0);
}
