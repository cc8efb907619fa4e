use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use lookout::{CycleOutcome, FrameScheduler, OverlayState, RawFrame, SubmitOutcome};

fn frame(n: u64) -> RawFrame {
    RawFrame::from_i420(
        vec![16; 16],
        vec![128; 4],
        vec![128; 4],
        4,
        4,
        0,
        Duration::from_millis(n),
    )
}

fn wait_idle(scheduler: &FrameScheduler) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while scheduler.is_busy() && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(1));
    }
}

#[test]
fn slow_cycles_drop_frames_instead_of_queuing() {
    let overlay = Arc::new(OverlayState::new());
    let released = Arc::new(AtomicUsize::new(0));

    let scheduler = {
        let overlay = overlay.clone();
        FrameScheduler::spawn("backpressure", move || {
            move |_frame: RawFrame| {
                std::thread::sleep(Duration::from_millis(20));
                match overlay.publish(Vec::new()) {
                    Some(generation) => CycleOutcome::Published(generation),
                    None => CycleOutcome::Skipped("closed".into()),
                }
            }
        })
        .expect("spawn scheduler")
    };
    wait_idle(&scheduler);

    const N: u64 = 50;
    let mut accepted = 0;
    for n in 0..N {
        let released = released.clone();
        let f = frame(n).with_release(move || {
            released.fetch_add(1, Ordering::SeqCst);
        });
        let started = Instant::now();
        let outcome = scheduler.submit(f);
        // Submit never waits on the worker.
        assert!(started.elapsed() < Duration::from_millis(50));
        if outcome == SubmitOutcome::Accepted {
            accepted += 1;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    wait_idle(&scheduler);

    let stats = scheduler.stats();
    assert_eq!(stats.submitted, N);
    assert_eq!(stats.accepted, accepted);
    assert_eq!(stats.accepted + stats.dropped, N);
    assert!(stats.completed < N);
    assert!(stats.dropped > 0);
    assert_eq!(stats.completed, stats.accepted);
    assert!(stats.published <= stats.completed);
    assert_eq!(overlay.generation(), stats.published);

    scheduler.shutdown().expect("shutdown");
    assert_eq!(released.load(Ordering::SeqCst), N as usize);
}

#[test]
fn idle_worker_accepts_every_frame() {
    let scheduler = FrameScheduler::spawn("idle", || |_frame: RawFrame| {
        CycleOutcome::Skipped("nothing to do".into())
    })
    .expect("spawn scheduler");

    for n in 0..10 {
        wait_idle(&scheduler);
        assert_eq!(scheduler.submit(frame(n)), SubmitOutcome::Accepted);
    }
    wait_idle(&scheduler);
    let stats = scheduler.stats();
    assert_eq!(stats.completed, 10);
    assert_eq!(stats.skipped, 10);
    assert_eq!(stats.dropped, 0);
    scheduler.shutdown().expect("shutdown");
}

#[test]
fn frames_are_dropped_while_worker_initializes() {
    let scheduler = FrameScheduler::spawn("slow-init", || {
        std::thread::sleep(Duration::from_millis(100));
        |_frame: RawFrame| CycleOutcome::Published(1)
    })
    .expect("spawn scheduler");

    assert_eq!(scheduler.submit(frame(0)), SubmitOutcome::Dropped);
    wait_idle(&scheduler);
    assert_eq!(scheduler.submit(frame(1)), SubmitOutcome::Accepted);
    scheduler.shutdown().expect("shutdown");
}
