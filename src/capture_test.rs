use super::*;
use crate::format::Decimator;

fn harness(capacity: usize, channels: usize) -> (Arc<ElasticRing>, Arc<EngineShared>) {
    let ring = Arc::new(ElasticRing::new(capacity, channels).unwrap());
    let shared = Arc::new(EngineShared::new(1.0));
    shared.set_running(true);
    (ring, shared)
}

fn drain(ring: &ElasticRing, frames: usize) -> Vec<f32> {
    let mut out = Vec::new();
    let mut remaining = frames;
    while remaining > 0 {
        let (region, got) = ring.acquire_read(remaining);
        if got == 0 {
            break;
        }
        out.extend_from_slice(&region[..got * ring.channels()]);
        ring.commit_read(got);
        remaining -= got;
    }
    out
}

#[test]
fn test_normalizes_into_ring() {
    let (ring, shared) = harness(64, 2);
    let mut worker = CaptureWorker::new(ring.clone(), shared, 2, None, 128, 48_000);

    worker.write_block(&[0i16, 16_384, -16_384, i16::MIN]);
    assert_eq!(ring.available_read(), 2);
    let out = drain(&ring, 2);
    assert_eq!(out, vec![0.0, 0.5, -0.5, -1.0]);
}

#[test]
fn test_applies_gain_during_normalize() {
    let (ring, shared) = harness(64, 1);
    shared.set_volume(0.5);
    let mut worker = CaptureWorker::new(ring.clone(), shared, 1, None, 128, 48_000);

    worker.write_block(&[1.0f32, -0.5]);
    assert_eq!(drain(&ring, 2), vec![0.5, -0.25]);
}

#[test]
fn test_not_running_is_a_no_op() {
    let (ring, shared) = harness(64, 1);
    shared.set_running(false);
    let mut worker = CaptureWorker::new(ring.clone(), shared, 1, None, 128, 48_000);

    worker.write_block(&[1.0f32; 16]);
    assert_eq!(ring.available_read(), 0);
}

#[test]
fn test_overrun_drops_tail_and_counts_frames() {
    let (ring, shared) = harness(8, 1);
    let mut worker = CaptureWorker::new(ring.clone(), shared.clone(), 1, None, 128, 48_000);

    let block: Vec<f32> = (0..12).map(|i| i as f32 / 16.0).collect();
    worker.write_block(&block);

    assert_eq!(ring.available_read(), 8);
    assert_eq!(shared.overruns(), 4);
    // The frames that fit are the leading ones, in order.
    assert_eq!(drain(&ring, 8), block[..8].to_vec());
}

#[test]
fn test_write_spans_wrap_boundary() {
    let (ring, shared) = harness(8, 1);
    let mut worker = CaptureWorker::new(ring.clone(), shared, 1, None, 128, 48_000);

    // Advance the indices so the next write wraps the storage end.
    worker.write_block(&[0.0f32; 6]);
    drain(&ring, 6);

    let block: Vec<f32> = (1..=5).map(|i| i as f32 / 8.0).collect();
    worker.write_block(&block);
    assert_eq!(drain(&ring, 5), block);
}

#[test]
fn test_decimation_writes_window_means() {
    let (ring, shared) = harness(64, 1);
    let decimator = Decimator::new(2, 1);
    // Native 96 kHz decimated by 2 down to 48 kHz.
    let mut worker = CaptureWorker::new(ring.clone(), shared, 1, Some(decimator), 256, 96_000);

    worker.write_block(&[1.0f32, 3.0, 5.0, 7.0, 2.0, 4.0]);
    assert_eq!(ring.available_read(), 3);
    assert_eq!(drain(&ring, 3), vec![2.0, 6.0, 3.0]);
}

#[test]
fn test_decimation_carries_partial_window() {
    let (ring, shared) = harness(64, 1);
    let mut worker = CaptureWorker::new(
        ring.clone(),
        shared,
        1,
        Some(Decimator::new(2, 1)),
        256,
        96_000,
    );

    worker.write_block(&[1.0f32]);
    assert_eq!(ring.available_read(), 0);
    worker.write_block(&[3.0f32]);
    assert_eq!(drain(&ring, 1), vec![2.0]);
}

#[test]
fn test_peak_gauge_tracks_post_gain_level() {
    let (ring, shared) = harness(64, 1);
    shared.set_volume(0.5);
    let mut worker = CaptureWorker::new(ring, shared.clone(), 1, None, 128, 48_000);

    worker.write_block(&[0.8f32, -0.2]);
    assert!((shared.input_peak() - 0.4).abs() < 1e-6);
}

#[test]
fn test_volume_zero_silences_output() {
    let (ring, shared) = harness(64, 2);
    shared.set_volume(0.0);
    let mut worker = CaptureWorker::new(ring.clone(), shared, 2, None, 128, 48_000);

    worker.write_block(&[0.9f32, -0.9, 0.5, -0.5]);
    assert!(drain(&ring, 2).iter().all(|&s| s == 0.0));
}
