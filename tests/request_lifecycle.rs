//! Conformance tests for the request lifecycle: allocation symmetry across
//! the synchronous-failure, success, and cancellation paths.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;
use upshot::lab::{LabConfig, LabLoop};
use upshot::{
    Error, Promise, PromiseCast, RequestRecord, RequestSlot, StatusCode, complete, issue,
};

/// Raw completion arguments of a fake one-shot read: the status plus the
/// payload and a flag standing in for a native auxiliary allocation.
struct ReadArgs {
    status: StatusCode,
    data: Vec<u8>,
    native_buffer_freed: bool,
}

/// Allocation counter test double: rides inside the record's proxy and
/// counts drops, so every lifecycle path can assert exact free behavior.
struct AllocProbe(Arc<AtomicUsize>);

impl AllocProbe {
    fn new() -> (Self, Arc<AtomicUsize>) {
        let drops = Arc::new(AtomicUsize::new(0));
        (Self(Arc::clone(&drops)), drops)
    }
}

impl Drop for AllocProbe {
    fn drop(&mut self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

fn read_record(promise: &Promise<Vec<u8>>, probe: AllocProbe) -> RequestRecord<ReadArgs> {
    let proxy = PromiseCast::new(promise, move |args: &ReadArgs| {
        let _probe = &probe;
        Ok(args.data.clone())
    });
    RequestRecord::new(proxy).check(|args: &ReadArgs| args.status)
}

#[test]
fn synchronous_failure_reports_error_and_frees_before_returning() {
    let (probe, drops) = AllocProbe::new();
    let promise = Promise::<Vec<u8>>::new();
    let mut slot = RequestSlot::new();

    let outcome = issue(&mut slot, read_record(&promise, probe), || {
        StatusCode::EADDRINUSE
    });

    assert!(matches!(
        outcome,
        Err(Error::Status {
            code: StatusCode::EADDRINUSE
        })
    ));
    // Freed before issue returned: no callback will ever run for it.
    assert_eq!(drops.load(Ordering::SeqCst), 1);
    assert!(!slot.is_attached());
}

#[test]
fn successful_completion_resolves_then_frees() {
    let lab = LabLoop::new(LabConfig::default());
    let (probe, drops) = AllocProbe::new();

    let seen = Arc::new(Mutex::new(Vec::new()));
    let s = Arc::clone(&seen);
    let promise = Promise::<Vec<u8>>::new().then(move |data| s.lock().push(data.clone()));

    let slot = Arc::new(Mutex::new(RequestSlot::new()));
    issue(&mut slot.lock(), read_record(&promise, probe), || {
        StatusCode::OK
    })
    .expect("issue succeeds");
    assert_eq!(drops.load(Ordering::SeqCst), 0);

    let completion_slot = Arc::clone(&slot);
    lab.defer(move || {
        complete(
            &mut completion_slot.lock(),
            ReadArgs {
                status: StatusCode::OK,
                data: vec![7, 8, 9],
                native_buffer_freed: false,
            },
        );
    });
    lab.run_until_idle();

    assert_eq!(*seen.lock(), vec![vec![7, 8, 9]]);
    assert_eq!(drops.load(Ordering::SeqCst), 1);
    assert!(!slot.lock().is_attached());
}

#[test]
fn failed_completion_rejects_with_the_native_status() {
    let lab = LabLoop::new(LabConfig::default());
    let (probe, drops) = AllocProbe::new();

    let failures = Arc::new(Mutex::new(Vec::new()));
    let f = Arc::clone(&failures);
    let promise = Promise::<Vec<u8>>::new().except(move |failure| {
        f.lock().push(failure.to_string());
        true
    });

    let slot = Arc::new(Mutex::new(RequestSlot::new()));
    issue(&mut slot.lock(), read_record(&promise, probe), || {
        StatusCode::OK
    })
    .expect("issue succeeds");

    let completion_slot = Arc::clone(&slot);
    lab.defer(move || {
        complete(
            &mut completion_slot.lock(),
            ReadArgs {
                status: StatusCode::EOF,
                data: Vec::new(),
                native_buffer_freed: false,
            },
        );
    });
    lab.run_until_idle();

    assert_eq!(*failures.lock(), vec!["EOF(-4095): end of file".to_string()]);
    assert_eq!(drops.load(Ordering::SeqCst), 1);
}

#[test]
fn cancelled_completion_settles_nothing_but_still_frees() {
    let lab = LabLoop::new(LabConfig::default());
    let (probe, drops) = AllocProbe::new();

    let resolutions = Arc::new(AtomicUsize::new(0));
    let rejections = Arc::new(AtomicUsize::new(0));
    let finishes = Arc::new(AtomicUsize::new(0));
    let r = Arc::clone(&resolutions);
    let j = Arc::clone(&rejections);
    let fin = Arc::clone(&finishes);
    let promise = Promise::<Vec<u8>>::new()
        .then(move |_| {
            r.fetch_add(1, Ordering::SeqCst);
        })
        .except(move |_| {
            j.fetch_add(1, Ordering::SeqCst);
            true
        })
        .finally(move || {
            fin.fetch_add(1, Ordering::SeqCst);
        });

    let slot = Arc::new(Mutex::new(RequestSlot::new()));
    issue(&mut slot.lock(), read_record(&promise, probe), || {
        StatusCode::OK
    })
    .expect("issue succeeds");

    let completion_slot = Arc::clone(&slot);
    lab.defer(move || {
        complete(
            &mut completion_slot.lock(),
            ReadArgs {
                status: StatusCode::ECANCELED,
                data: Vec::new(),
                native_buffer_freed: false,
            },
        );
    });
    lab.run_until_idle();

    assert_eq!(resolutions.load(Ordering::SeqCst), 0);
    assert_eq!(rejections.load(Ordering::SeqCst), 0);
    assert_eq!(finishes.load(Ordering::SeqCst), 1);
    assert_eq!(drops.load(Ordering::SeqCst), 1);
}

#[test]
fn cleanup_frees_native_resources_after_dispatch() {
    let (probe, _drops) = AllocProbe::new();
    let order = Arc::new(Mutex::new(Vec::new()));
    let o1 = Arc::clone(&order);
    let o2 = Arc::clone(&order);
    let promise = Promise::<Vec<u8>>::new()
        .then(move |_| o1.lock().push("resolve"))
        .finally(move || o2.lock().push("finalize"));

    let o3 = Arc::clone(&order);
    let record = read_record(&promise, probe).cleanup(move |args: &mut ReadArgs| {
        assert!(!args.native_buffer_freed);
        args.native_buffer_freed = true;
        o3.lock().push("cleanup");
    });

    let mut slot = RequestSlot::new();
    issue(&mut slot, record, || StatusCode::OK).expect("issue succeeds");
    complete(
        &mut slot,
        ReadArgs {
            status: StatusCode::OK,
            data: vec![1],
            native_buffer_freed: false,
        },
    );

    assert_eq!(*order.lock(), vec!["resolve", "finalize", "cleanup"]);
}

#[test]
fn native_request_is_reusable_from_its_own_completion() {
    // Detach-first means a second operation can be issued on the same slot
    // while the first completion is still dispatching.
    let seen = Arc::new(Mutex::new(Vec::new()));

    let s = Arc::clone(&seen);
    let first = Promise::<Vec<u8>>::new().then(move |data| s.lock().push(data.clone()));
    let (probe_a, drops_a) = AllocProbe::new();

    let mut slot = RequestSlot::new();
    issue(&mut slot, read_record(&first, probe_a), || StatusCode::OK).expect("issue succeeds");

    complete(
        &mut slot,
        ReadArgs {
            status: StatusCode::OK,
            data: vec![1],
            native_buffer_freed: false,
        },
    );
    assert!(!slot.is_attached());

    // Immediate reissue on the freshly detached slot.
    let s = Arc::clone(&seen);
    let second = Promise::<Vec<u8>>::new().then(move |data| s.lock().push(data.clone()));
    let (probe_b, drops_b) = AllocProbe::new();
    issue(&mut slot, read_record(&second, probe_b), || StatusCode::OK).expect("issue succeeds");
    complete(
        &mut slot,
        ReadArgs {
            status: StatusCode::OK,
            data: vec![2],
            native_buffer_freed: false,
        },
    );

    assert_eq!(*seen.lock(), vec![vec![1], vec![2]]);
    assert_eq!(drops_a.load(Ordering::SeqCst), 1);
    assert_eq!(drops_b.load(Ordering::SeqCst), 1);
}
