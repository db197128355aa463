use super::*;

const CAPACITY: usize = 2048;

#[test]
fn test_pass_inside_band() {
    let drift = DriftCompensator::new(2);
    // 25% .. 75% inclusive is the pass band.
    assert_eq!(drift.select(512, 128, CAPACITY), DriftAction::Pass);
    assert_eq!(drift.select(1024, 128, CAPACITY), DriftAction::Pass);
    assert_eq!(drift.select(1536, 128, CAPACITY), DriftAction::Pass);
}

#[test]
fn test_stretch_below_low_water() {
    let drift = DriftCompensator::new(2);
    assert_eq!(drift.select(511, 128, CAPACITY), DriftAction::Stretch);
    assert_eq!(drift.select(0, 128, CAPACITY), DriftAction::Stretch);
}

#[test]
fn test_compress_above_high_water() {
    let drift = DriftCompensator::new(2);
    assert_eq!(drift.select(1537, 128, CAPACITY), DriftAction::Compress);
    assert_eq!(drift.select(2048, 128, CAPACITY), DriftAction::Compress);
}

#[test]
fn test_compress_requires_margin_over_request() {
    let drift = DriftCompensator::new(2);
    // Above the high water mark but without available > requested + 1 the
    // discard would starve the read, so the policy passes instead.
    assert_eq!(drift.select(1600, 1599, CAPACITY), DriftAction::Pass);
    assert_eq!(drift.select(1600, 1600, CAPACITY), DriftAction::Pass);
    assert_eq!(drift.select(1600, 1598, CAPACITY), DriftAction::Compress);
}

#[test]
fn test_degenerate_inputs_pass() {
    let drift = DriftCompensator::new(1);
    assert_eq!(drift.select(0, 0, CAPACITY), DriftAction::Pass);
    assert_eq!(drift.select(0, 128, 0), DriftAction::Pass);
}

#[test]
fn test_register_starts_silent() {
    let drift = DriftCompensator::new(2);
    assert_eq!(drift.last_frame(), &[0.0, 0.0]);
}

#[test]
fn test_register_remembers_trailing_frame() {
    let mut drift = DriftCompensator::new(2);
    drift.remember(&[0.25, -0.5]);
    assert_eq!(drift.last_frame(), &[0.25, -0.5]);
    drift.remember(&[0.1, 0.2]);
    assert_eq!(drift.last_frame(), &[0.1, 0.2]);
}

#[test]
fn test_register_reset() {
    let mut drift = DriftCompensator::new(1);
    drift.remember(&[0.9]);
    drift.reset();
    assert_eq!(drift.last_frame(), &[0.0]);
}
