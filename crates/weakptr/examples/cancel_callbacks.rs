//! Cancelling posted replies with weak receivers
//!
//! A controller posts jobs to a worker thread. Replies come back over a
//! channel as closures bound to a `WeakPtr` of the controller, so replies
//! that arrive after a reset are dropped without touching any state.

use std::thread;

use crossbeam::channel::{self, Receiver, Sender};
use parking_lot::Mutex;
use weakptr::{SupportsWeakPtr, WeakPtr, WeakPtrFactory};

type Reply = Box<dyn FnOnce() -> bool + Send>;

struct Controller {
    weak_factory: WeakPtrFactory<Controller>,
    results: Mutex<Vec<u64>>,
}

impl SupportsWeakPtr for Controller {
    fn weak_ptr_factory(&self) -> &WeakPtrFactory<Self> {
        &self.weak_factory
    }
}

impl Controller {
    fn new() -> Box<Self> {
        // SAFETY: the controller stays in its box until the end of `main`.
        unsafe {
            WeakPtrFactory::new_boxed(|weak_factory| Self {
                weak_factory,
                results: Mutex::new(Vec::new()),
            })
        }
    }

    /// Drops every reply still in flight.
    fn reset(&self) {
        self.weak_factory.invalidate_weak_ptrs();
        self.results.lock().clear();
    }
}

fn worker(jobs: &Receiver<(u64, WeakPtr<Controller>)>, replies: &Sender<Reply>) {
    for (input, receiver) in jobs {
        if !receiver.maybe_valid() {
            continue;
        }
        let output = input * input;
        let reply = receiver.bind(|controller: &Controller, output: u64| {
            controller.results.lock().push(output);
        });
        if replies
            .send(Box::new(move || reply.run_once(output).is_some()))
            .is_err()
        {
            break;
        }
    }
}

fn main() {
    let controller = Controller::new();
    let (job_tx, job_rx) = channel::unbounded();
    let (reply_tx, reply_rx) = channel::unbounded::<Reply>();

    let handle = thread::spawn(move || worker(&job_rx, &reply_tx));

    for input in 1..=3 {
        job_tx
            .send((input, controller.as_weak_ptr()))
            .expect("worker exited early");
    }
    for _ in 0..3 {
        let reply = reply_rx.recv().expect("worker exited early");
        reply();
    }
    println!("first batch: {:?}", controller.results.lock());

    for input in 4..=6 {
        job_tx
            .send((input, controller.as_weak_ptr()))
            .expect("worker exited early");
    }
    drop(job_tx);
    handle.join().expect("worker panicked");
    controller.reset();

    let stale = reply_rx.try_iter().map(|reply| reply()).filter(|ran| !ran).count();
    println!("after reset: {:?}, {stale} stale replies dropped", controller.results.lock());
}
