use super::*;
use std::sync::Arc;
use std::thread;

fn write_frames(ring: &ElasticRing, frames: &[f32]) -> usize {
    let channels = ring.channels();
    let total = frames.len() / channels;
    let mut written = 0;
    while written < total {
        let (slice, got) = ring.acquire_write(total - written);
        if got == 0 {
            break;
        }
        let n = got * channels;
        slice[..n].copy_from_slice(&frames[written * channels..written * channels + n]);
        ring.commit_write(got);
        written += got;
    }
    written
}

fn read_frames(ring: &ElasticRing, out: &mut Vec<f32>, frames: usize) -> usize {
    let channels = ring.channels();
    let mut read = 0;
    while read < frames {
        let (slice, got) = ring.acquire_read(frames - read);
        if got == 0 {
            break;
        }
        out.extend_from_slice(&slice[..got * channels]);
        ring.commit_read(got);
        read += got;
    }
    read
}

#[test]
fn test_capacity_rounds_up_to_power_of_two() {
    let ring = ElasticRing::new(1000, 2).unwrap();
    assert_eq!(ring.capacity(), 1024);
    let ring = ElasticRing::new(2048, 1).unwrap();
    assert_eq!(ring.capacity(), 2048);
}

#[test]
fn test_empty_ring_bounds() {
    let ring = ElasticRing::new(64, 2).unwrap();
    assert_eq!(ring.available_read(), 0);
    assert_eq!(ring.available_write(), 64);
    assert_eq!(ring.fill_ratio(), 0.0);
}

#[test]
fn test_write_then_read_round_trip() {
    let ring = ElasticRing::new(16, 2).unwrap();
    let input: Vec<f32> = (0..20).map(|i| i as f32).collect();
    assert_eq!(write_frames(&ring, &input), 10);
    assert_eq!(ring.available_read(), 10);
    assert_eq!(ring.available_write(), 6);

    let mut out = Vec::new();
    assert_eq!(read_frames(&ring, &mut out, 10), 10);
    assert_eq!(out, input);
    assert_eq!(ring.available_read(), 0);
}

#[test]
fn test_write_truncates_when_full() {
    let ring = ElasticRing::new(8, 1).unwrap();
    let input = vec![1.0f32; 12];
    assert_eq!(write_frames(&ring, &input), 8);
    assert_eq!(ring.available_write(), 0);

    let (_, got) = ring.acquire_write(1);
    assert_eq!(got, 0);
}

#[test]
fn test_read_truncates_when_empty() {
    let ring = ElasticRing::new(8, 1).unwrap();
    write_frames(&ring, &[1.0, 2.0]);
    let mut out = Vec::new();
    assert_eq!(read_frames(&ring, &mut out, 5), 2);
    assert_eq!(out, vec![1.0, 2.0]);
}

#[test]
fn test_acquire_truncates_at_linear_end() {
    let ring = ElasticRing::new(8, 1).unwrap();
    // Advance both indices near the end of storage so the next write wraps.
    write_frames(&ring, &[0.0; 6]);
    let mut out = Vec::new();
    read_frames(&ring, &mut out, 6);

    let (slice, got) = ring.acquire_write(4);
    // Only two frames remain before the linear end.
    assert_eq!(got, 2);
    assert_eq!(slice.len(), 2);
    ring.commit_write(got);

    let (_, got2) = ring.acquire_write(2);
    assert_eq!(got2, 2);
}

#[test]
fn test_wrapping_preserves_order() {
    let ring = ElasticRing::new(8, 2).unwrap();
    let mut expected = Vec::new();
    let mut out = Vec::new();
    let mut value = 0.0f32;

    // Repeatedly write 5 frames and read 5 frames so the indices wrap many
    // times at an offset that never divides the capacity.
    for _ in 0..100 {
        let block: Vec<f32> = (0..10)
            .map(|_| {
                value += 1.0;
                value
            })
            .collect();
        assert_eq!(write_frames(&ring, &block), 5);
        expected.extend_from_slice(&block);
        assert_eq!(read_frames(&ring, &mut out, 5), 5);
    }
    assert_eq!(out, expected);
}

#[test]
fn test_skip_read_discards_frames() {
    let ring = ElasticRing::new(8, 1).unwrap();
    write_frames(&ring, &[1.0, 2.0, 3.0]);
    ring.skip_read(1);
    let mut out = Vec::new();
    read_frames(&ring, &mut out, 2);
    assert_eq!(out, vec![2.0, 3.0]);
}

#[test]
fn test_reset_empties_ring() {
    let ring = ElasticRing::new(8, 2).unwrap();
    write_frames(&ring, &[1.0; 10]);
    ring.reset();
    assert_eq!(ring.available_read(), 0);
    assert_eq!(ring.available_write(), 8);
}

#[test]
fn test_prefill_establishes_midpoint() {
    let ring = ElasticRing::new(2048, 2).unwrap();
    ring.prefill_silence(1024);
    assert_eq!(ring.available_read(), 1024);
    assert!((ring.fill_ratio() - 0.5).abs() < f32::EPSILON);

    let mut out = Vec::new();
    read_frames(&ring, &mut out, 4);
    assert!(out.iter().all(|&s| s == 0.0));
}

#[test]
fn test_out_of_memory_is_reported() {
    // A capacity whose sample count overflows usize must fail cleanly.
    let result = ElasticRing::new(usize::MAX / 2, 2);
    assert!(result.is_err());
}

// Concurrent round trip: one producer thread, one consumer thread, every
// frame read in order with no loss and occupancy always within bounds.
#[test]
fn test_spsc_round_trip_across_threads() {
    const TOTAL_FRAMES: usize = 200_000;
    let ring = Arc::new(ElasticRing::new(256, 2).unwrap());

    let producer = {
        let ring = Arc::clone(&ring);
        thread::spawn(move || {
            let mut next = 0usize;
            while next < TOTAL_FRAMES {
                let (slice, got) = ring.acquire_write(64);
                if got == 0 {
                    thread::yield_now();
                    continue;
                }
                for (i, frame) in slice.chunks_exact_mut(2).enumerate() {
                    let v = (next + i) as f32;
                    frame[0] = v;
                    frame[1] = -v;
                }
                let take = got.min(TOTAL_FRAMES - next);
                ring.commit_write(take);
                next += take;
            }
        })
    };

    let consumer = {
        let ring = Arc::clone(&ring);
        thread::spawn(move || {
            let mut next = 0usize;
            while next < TOTAL_FRAMES {
                let available = ring.available_read();
                assert!(available <= ring.capacity());
                let (slice, got) = ring.acquire_read(64);
                if got == 0 {
                    thread::yield_now();
                    continue;
                }
                for (i, frame) in slice.chunks_exact(2).enumerate() {
                    let expected = (next + i) as f32;
                    assert_eq!(frame[0], expected);
                    assert_eq!(frame[1], -expected);
                }
                ring.commit_read(got);
                next += got;
            }
        })
    };

    producer.join().unwrap();
    consumer.join().unwrap();
    assert_eq!(ring.available_read(), 0);
}
