// Hot-path allocation check.
//
// Wraps the system allocator in a counting shim and drives both audio
// callbacks through every policy region (pass, stretch, compress, overrun,
// stopped). The callback code must not allocate at all; setup and teardown
// are free to. Lives in its own integration binary because a process gets
// exactly one global allocator.

use std::alloc::{GlobalAlloc, Layout, System};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use sidetone::capture::CaptureWorker;
use sidetone::format::Decimator;
use sidetone::playback::PlaybackWorker;
use sidetone::ring::ElasticRing;
use sidetone::status::EngineShared;

struct CountingAllocator;

static ALLOCATIONS: AtomicU64 = AtomicU64::new(0);

unsafe impl GlobalAlloc for CountingAllocator {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        ALLOCATIONS.fetch_add(1, Ordering::SeqCst);
        System.alloc(layout)
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        System.dealloc(ptr, layout)
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        ALLOCATIONS.fetch_add(1, Ordering::SeqCst);
        System.realloc(ptr, layout, new_size)
    }
}

#[global_allocator]
static ALLOC: CountingAllocator = CountingAllocator;

fn allocation_count() -> u64 {
    ALLOCATIONS.load(Ordering::SeqCst)
}

#[test]
fn callbacks_do_not_allocate() {
    const CHANNELS: usize = 2;
    const PERIOD: usize = 128;

    let ring = Arc::new(ElasticRing::new(2048, CHANNELS).unwrap());
    let shared = Arc::new(EngineShared::new(1.0));
    shared.set_running(true);
    ring.prefill_silence(1024);

    let mut capture = CaptureWorker::new(
        Arc::clone(&ring),
        Arc::clone(&shared),
        CHANNELS,
        None,
        PERIOD as u32,
        48_000,
    );
    let mut playback = PlaybackWorker::new(
        Arc::clone(&ring),
        Arc::clone(&shared),
        CHANNELS,
        PERIOD as u32,
        48_000,
    );

    let input = vec![0.25f32; PERIOD * CHANNELS];
    let big_input = vec![0.25f32; 2 * PERIOD * CHANNELS];
    let mut output = vec![0.0f32; PERIOD * CHANNELS];

    // Warm-up: the first callback on each side performs the one-time
    // real-time promotion, which may allocate inside the OS interface.
    capture.write_block(&input);
    playback.read_block(&mut output);

    let before = allocation_count();

    // Steady state.
    for _ in 0..1_000 {
        capture.write_block(&input);
        playback.read_block(&mut output);
    }
    // Consumer-only until starved: stretch region and tail padding.
    for _ in 0..40 {
        playback.read_block(&mut output);
    }
    // Producer-only until full: overrun accounting, then compress region.
    for _ in 0..40 {
        capture.write_block(&big_input);
    }
    for _ in 0..10 {
        playback.read_block(&mut output);
    }

    assert_eq!(
        allocation_count(),
        before,
        "audio callbacks allocated on the hot path"
    );
}

#[test]
fn stopped_callbacks_do_not_allocate() {
    const CHANNELS: usize = 1;

    let ring = Arc::new(ElasticRing::new(256, CHANNELS).unwrap());
    let shared = Arc::new(EngineShared::new(1.0));

    let mut capture = CaptureWorker::new(
        Arc::clone(&ring),
        Arc::clone(&shared),
        CHANNELS,
        None,
        128,
        48_000,
    );
    let mut playback = PlaybackWorker::new(Arc::clone(&ring), Arc::clone(&shared), CHANNELS, 128, 48_000);

    let input = vec![0.5f32; 128];
    let mut output = vec![0.0f32; 128];

    let before = allocation_count();
    for _ in 0..100 {
        capture.write_block(&input);
        playback.read_block(&mut output);
    }
    assert_eq!(allocation_count(), before);
}

#[test]
fn decimating_capture_does_not_allocate() {
    const CHANNELS: usize = 2;

    let ring = Arc::new(ElasticRing::new(2048, CHANNELS).unwrap());
    let shared = Arc::new(EngineShared::new(1.0));
    shared.set_running(true);

    let mut capture = CaptureWorker::new(
        Arc::clone(&ring),
        Arc::clone(&shared),
        CHANNELS,
        Some(Decimator::new(2, CHANNELS)),
        256,
        96_000,
    );
    let mut playback = PlaybackWorker::new(Arc::clone(&ring), Arc::clone(&shared), CHANNELS, 128, 48_000);

    let input = vec![0.25f32; 512 * CHANNELS];
    let mut output = vec![0.0f32; 128 * CHANNELS];

    capture.write_block(&input);
    playback.read_block(&mut output);

    let before = allocation_count();
    for _ in 0..1_000 {
        capture.write_block(&input);
        playback.read_block(&mut output);
    }
    assert_eq!(allocation_count(), before);
}
