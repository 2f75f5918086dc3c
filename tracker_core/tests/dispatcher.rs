/**
 * End-to-end behaviour of the dispatcher against an in-memory transport.
 */
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender};
use tracker_core::transport::{DrainContext, RetryOutcome, Worker};
use tracker_core::{
    DispatchConfig, Dispatcher, DispatcherState, Event, Options, RequestData, TrackerError,
    Transport, TransportError,
};

// ---------------------------------------------------------------------------
// Recording transport
// ---------------------------------------------------------------------------

#[derive(Clone)]
struct Call {
    at: Instant,
    app_id: i64,
    user_id: String,
    events: Vec<Event>,
    ok: bool,
}

type Script = Box<dyn Fn(usize) -> Result<(), TransportError> + Send + Sync>;

struct Recorder {
    calls: Mutex<Vec<Call>>,
    script: Script,
    gate: Mutex<Option<Receiver<()>>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl Recorder {
    fn new(script: impl Fn(usize) -> Result<(), TransportError> + Send + Sync + 'static) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            script: Box::new(script),
            gate: Mutex::new(None),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    fn accepting() -> Self {
        Self::new(|_| Ok(()))
    }

    /// Makes the first `send` block until the returned sender fires.
    fn gated(self) -> (Self, Sender<()>) {
        let (tx, rx) = crossbeam_channel::bounded(1);
        *self.gate.lock().unwrap() = Some(rx);
        (self, tx)
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn delivered(&self) -> Vec<Vec<u64>> {
        self.calls()
            .iter()
            .filter(|c| c.ok)
            .map(|c| c.events.iter().map(index).collect())
            .collect()
    }
}

impl Transport for Recorder {
    fn send(&self, _endpoint: &str, payload: &RequestData<'_>) -> Result<(), TransportError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let gate = self.gate.lock().unwrap().take();
        if let Some(gate) = gate {
            let _ = gate.recv();
        }

        let mut calls = self.calls.lock().unwrap();
        let result = (self.script)(calls.len());
        calls.push(Call {
            at: Instant::now(),
            app_id: payload.app_id,
            user_id: payload.user_id.to_string(),
            events: payload.events.to_vec(),
            ok: result.is_ok(),
        });
        drop(calls);

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn numbered(i: u64) -> Event {
    Event::named("DummyEvent").with("eventNumber", i)
}

fn index(event: &Event) -> u64 {
    event.data()["eventNumber"].as_u64().expect("numbered event")
}

fn unavailable() -> TransportError {
    TransportError::Status {
        status: 503,
        body: String::new(),
    }
}

fn options(batch_limit: usize, send_delay_ms: u64) -> Options {
    Options {
        server_endpoint: "http://collector.invalid/events".into(),
        app_id: Some(42),
        user_id: Some("user-1".into()),
        batch_limit,
        send_delay_ms,
        ..Default::default()
    }
}

type Dropped = Arc<Mutex<Vec<(Vec<u64>, String)>>>;

fn with_drop_log(mut options: Options) -> (Options, Dropped) {
    let log: Dropped = Arc::default();
    let sink = Arc::clone(&log);
    options.on_batch_dropped = Some(Arc::new(move |batch: &[Event], err: &TrackerError| {
        let ids = batch.iter().map(index).collect();
        sink.lock().unwrap().push((ids, err.to_string()));
    }));
    (options, log)
}

/**
 * Fills a queue before any worker exists, then starts one, so batch
 * boundaries do not depend on thread start-up timing.
 */
fn drain_prefilled(options: Options, transport: Arc<Recorder>, count: u64) -> Arc<DrainContext> {
    let config = DispatchConfig::from_options(options).expect("valid options");
    let ctx = Arc::new(DrainContext::new(config, transport));
    for i in 0..count {
        ctx.queue.enqueue(numbered(i));
    }
    Worker::spawn(Arc::clone(&ctx)).expect("spawn worker");
    assert!(ctx.queue.wait_idle(Duration::from_secs(10)), "drain did not finish");
    ctx
}

const FLUSH: Duration = Duration::from_secs(10);

// ---------------------------------------------------------------------------
// Batching
// ---------------------------------------------------------------------------

#[test]
fn hundred_events_make_five_ordered_batches_separated_by_delay() {
    let delay = Duration::from_millis(20);
    let recorder = Arc::new(Recorder::accepting());

    drain_prefilled(options(20, 20), Arc::clone(&recorder), 100);

    let calls = recorder.calls();
    assert_eq!(calls.len(), 5);
    for (n, call) in calls.iter().enumerate() {
        let expected: Vec<u64> = (n as u64 * 20..(n as u64 + 1) * 20).collect();
        assert_eq!(call.events.iter().map(index).collect::<Vec<_>>(), expected);
        assert_eq!(call.app_id, 42);
        assert_eq!(call.user_id, "user-1");
    }
    for pair in calls.windows(2) {
        assert!(pair[1].at.duration_since(pair[0].at) >= delay);
    }
}

#[test]
fn events_submitted_during_send_join_the_running_loop() {
    let (recorder, release) = Recorder::accepting().gated();
    let recorder = Arc::new(recorder);
    let dispatcher =
        Dispatcher::with_transport(options(20, 0), recorder.clone()).expect("dispatcher");

    dispatcher.submit(numbered(0)).unwrap();
    while recorder.in_flight.load(Ordering::SeqCst) == 0 {
        thread::sleep(Duration::from_millis(1));
    }
    for i in 1..=30 {
        dispatcher.submit(numbered(i)).unwrap();
    }
    assert_eq!(dispatcher.state(), DispatcherState::Draining);

    release.send(()).unwrap();
    assert!(dispatcher.flush(FLUSH));

    assert_eq!(dispatcher.drain_starts(), 1);
    assert_eq!(
        recorder.delivered(),
        vec![vec![0], (1..=20).collect(), (21..=30).collect()]
    );
    assert_eq!(dispatcher.state(), DispatcherState::Idle);
}

#[test]
fn idle_dispatcher_restarts_on_next_submit() {
    let recorder = Arc::new(Recorder::accepting());
    let dispatcher =
        Dispatcher::with_transport(options(20, 0), recorder.clone()).expect("dispatcher");

    dispatcher.submit(numbered(0)).unwrap();
    assert!(dispatcher.flush(FLUSH));
    dispatcher.submit(numbered(1)).unwrap();
    assert!(dispatcher.flush(FLUSH));

    assert_eq!(dispatcher.drain_starts(), 2);
    assert_eq!(recorder.delivered(), vec![vec![0], vec![1]]);
}

// ---------------------------------------------------------------------------
// Retry
// ---------------------------------------------------------------------------

#[test]
fn batch_failing_twice_is_delivered_once_after_two_delays() {
    let delay = Duration::from_millis(20);
    let recorder = Arc::new(Recorder::new(|n| if n < 2 { Err(unavailable()) } else { Ok(()) }));
    let (options, dropped) = with_drop_log(options(20, 20));

    drain_prefilled(options, Arc::clone(&recorder), 3);

    let calls = recorder.calls();
    assert_eq!(calls.len(), 3);
    assert!(calls.iter().all(|c| c.events.iter().map(index).eq(0..3)));
    assert_eq!(recorder.delivered(), vec![vec![0, 1, 2]]);
    assert!(calls[1].at.duration_since(calls[0].at) >= delay);
    assert!(calls[2].at.duration_since(calls[1].at) >= delay);
    assert!(dropped.lock().unwrap().is_empty());
}

#[test]
fn always_failing_batch_is_dropped_after_three_attempts_and_loop_continues() {
    let recorder = Arc::new(Recorder::new(|_| Err(unavailable())));
    let (options, dropped) = with_drop_log(options(2, 0));

    let ctx = drain_prefilled(options, Arc::clone(&recorder), 4);

    let calls = recorder.calls();
    assert_eq!(calls.len(), 6);
    let batches: Vec<Vec<u64>> = calls
        .iter()
        .map(|c| c.events.iter().map(index).collect())
        .collect();
    assert_eq!(
        batches,
        vec![
            vec![0, 1],
            vec![0, 1],
            vec![0, 1],
            vec![2, 3],
            vec![2, 3],
            vec![2, 3]
        ]
    );

    let dropped = dropped.lock().unwrap();
    assert_eq!(dropped.len(), 2);
    assert_eq!(dropped[0].0, vec![0, 1]);
    assert_eq!(dropped[1].0, vec![2, 3]);
    assert!(dropped[0].1.contains("3 attempts"));

    /* Dropped batches are not re-enqueued. */
    assert!(ctx.queue.is_empty());
}

#[test]
fn zero_max_attempts_drops_without_sending() {
    let recorder = Arc::new(Recorder::accepting());
    let (mut options, dropped) = with_drop_log(options(20, 0));
    options.max_attempts = 0;

    drain_prefilled(options, Arc::clone(&recorder), 5);

    assert!(recorder.calls().is_empty());
    assert_eq!(dropped.lock().unwrap().len(), 1);
}

#[test]
fn missing_user_id_drops_batch_without_retry() {
    let recorder = Arc::new(Recorder::accepting());
    let (mut options, dropped) = with_drop_log(options(20, 0));
    options.user_id = None;

    drain_prefilled(options, Arc::clone(&recorder), 3);

    assert!(recorder.calls().is_empty());
    let dropped = dropped.lock().unwrap();
    assert_eq!(dropped.len(), 1);
    assert_eq!(dropped[0].0, vec![0, 1, 2]);
    assert!(dropped[0].1.contains("User ID"));
}

// ---------------------------------------------------------------------------
// Concurrency & ordering
// ---------------------------------------------------------------------------

#[test]
fn concurrent_submitters_share_a_single_drain_loop() {
    let (recorder, release) = Recorder::accepting().gated();
    let recorder = Arc::new(recorder);
    let dispatcher = Arc::new(
        Dispatcher::with_transport(options(25, 0), recorder.clone()).expect("dispatcher"),
    );

    /* Park the first loop inside its first send so it cannot go idle. */
    dispatcher.submit(numbered(10_000)).unwrap();
    while recorder.in_flight.load(Ordering::SeqCst) == 0 {
        thread::sleep(Duration::from_millis(1));
    }

    let producers: Vec<_> = (0..8u64)
        .map(|t| {
            let dispatcher = Arc::clone(&dispatcher);
            thread::spawn(move || {
                for i in 0..50 {
                    dispatcher.submit(numbered(t * 1000 + i)).unwrap();
                }
            })
        })
        .collect();
    for producer in producers {
        producer.join().unwrap();
    }

    release.send(()).unwrap();
    assert!(dispatcher.flush(FLUSH));

    assert_eq!(dispatcher.drain_starts(), 1);
    assert_eq!(recorder.max_in_flight.load(Ordering::SeqCst), 1);

    let delivered: Vec<u64> = recorder.delivered().into_iter().flatten().collect();
    assert_eq!(delivered.len(), 401);

    /* Each producer's events arrive in the order it submitted them. */
    for t in 0..8u64 {
        let mine: Vec<u64> = delivered
            .iter()
            .copied()
            .filter(|id| id / 1000 == t)
            .collect();
        assert_eq!(mine, (t * 1000..t * 1000 + 50).collect::<Vec<_>>());
    }
}

#[test]
fn delivered_events_are_an_ordered_subsequence_of_submitted() {
    /* Every third request fails and, with a single attempt, is dropped. */
    let recorder = Arc::new(Recorder::new(|n| if n % 3 == 1 { Err(unavailable()) } else { Ok(()) }));
    let mut options = options(4, 0);
    options.max_attempts = 1;
    let dispatcher = Dispatcher::with_transport(options, recorder.clone()).expect("dispatcher");

    for i in 0..40 {
        dispatcher.submit(numbered(i)).unwrap();
        if i % 7 == 0 {
            thread::sleep(Duration::from_millis(1));
        }
    }
    assert!(dispatcher.flush(FLUSH));

    let delivered: Vec<u64> = recorder.delivered().into_iter().flatten().collect();
    assert!(!delivered.is_empty());
    assert!(delivered.windows(2).all(|w| w[0] < w[1]));

    let attempted: usize = recorder.calls().iter().map(|c| c.events.len()).sum();
    assert_eq!(attempted, 40);
    assert!(recorder.calls().iter().all(|c| c.events.len() <= 4));
}

// ---------------------------------------------------------------------------
// Shutdown
// ---------------------------------------------------------------------------

#[test]
fn shutdown_discards_queued_events_but_lets_in_flight_send_finish() {
    let (recorder, release) = Recorder::accepting().gated();
    let recorder = Arc::new(recorder);
    let dispatcher =
        Dispatcher::with_transport(options(5, 10_000), recorder.clone()).expect("dispatcher");

    dispatcher.submit(numbered(0)).unwrap();
    while recorder.in_flight.load(Ordering::SeqCst) == 0 {
        thread::sleep(Duration::from_millis(1));
    }
    for i in 1..=10 {
        dispatcher.submit(numbered(i)).unwrap();
    }

    dispatcher.shutdown();
    assert_eq!(dispatcher.pending(), 0);
    assert!(matches!(
        dispatcher.submit(numbered(99)),
        Err(TrackerError::NotInitialized)
    ));

    let started = Instant::now();
    release.send(()).unwrap();
    while recorder.in_flight.load(Ordering::SeqCst) == 1 || recorder.calls().is_empty() {
        thread::sleep(Duration::from_millis(1));
    }
    thread::sleep(Duration::from_millis(50));

    /* The in-flight batch completed; nothing after it was taken. */
    assert_eq!(recorder.delivered(), vec![vec![0]]);
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(dispatcher.state(), DispatcherState::Closed);
}

#[test]
fn shutdown_interrupts_pending_retries_and_reports_the_batch() {
    let (recorder, release) = Recorder::new(|_| Err(unavailable())).gated();
    let recorder = Arc::new(recorder);
    let (options, dropped) = with_drop_log(options(5, 10_000));
    let dispatcher = Dispatcher::with_transport(options, recorder.clone()).expect("dispatcher");

    dispatcher.submit(numbered(0)).unwrap();
    while recorder.in_flight.load(Ordering::SeqCst) == 0 {
        thread::sleep(Duration::from_millis(1));
    }
    dispatcher.shutdown();
    release.send(()).unwrap();

    let deadline = Instant::now() + FLUSH;
    while dropped.lock().unwrap().is_empty() && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(1));
    }

    assert_eq!(recorder.calls().len(), 1);
    let dropped = dropped.lock().unwrap();
    assert_eq!(dropped.len(), 1);
    assert_eq!(dropped[0].0, vec![0]);
    assert!(dropped[0].1.contains("shutdown"));
}

#[test]
fn batch_taken_just_before_shutdown_gets_its_first_attempt() {
    let config = DispatchConfig::from_options(options(20, 0)).expect("valid options");
    let recorder = Arc::new(Recorder::accepting());
    let ctx = Arc::new(DrainContext::new(config, recorder.clone()));

    for i in 0..3 {
        ctx.queue.enqueue(numbered(i));
    }
    let batch = ctx.queue.take_batch(20);
    ctx.queue.close();
    ctx.cancel.cancel();

    let payload = RequestData {
        app_id: 42,
        user_id: "user-1",
        events: &batch,
    };
    let endpoint = "http://collector.invalid/events";
    let outcome = ctx
        .retry
        .run(&ctx.cancel, |_| ctx.transport.send(endpoint, &payload));

    assert!(matches!(outcome, RetryOutcome::Delivered { attempts: 1 }));
    assert_eq!(recorder.delivered(), vec![vec![0, 1, 2]]);
}

// ---------------------------------------------------------------------------
// Fault isolation
// ---------------------------------------------------------------------------

/**
 * Panics on its first call, optionally after blocking on a gate so the
 * test can submit more events while that call is in flight.
 */
struct PanicsOnce {
    inner: Recorder,
    tripped: AtomicUsize,
    gate: Mutex<Option<Receiver<()>>>,
}

impl PanicsOnce {
    fn new() -> Self {
        Self {
            inner: Recorder::accepting(),
            tripped: AtomicUsize::new(0),
            gate: Mutex::new(None),
        }
    }

    fn gated(self) -> (Self, Sender<()>) {
        let (tx, rx) = crossbeam_channel::bounded(1);
        *self.gate.lock().unwrap() = Some(rx);
        (self, tx)
    }

    fn entered(&self) -> bool {
        self.tripped.load(Ordering::SeqCst) > 0
    }
}

impl Transport for PanicsOnce {
    fn send(&self, endpoint: &str, payload: &RequestData<'_>) -> Result<(), TransportError> {
        if self.tripped.fetch_add(1, Ordering::SeqCst) == 0 {
            let gate = self.gate.lock().unwrap().take();
            if let Some(gate) = gate {
                let _ = gate.recv();
            }
            panic!("transport bug");
        }
        self.inner.send(endpoint, payload)
    }
}

#[test]
fn panicking_transport_does_not_wedge_the_dispatcher() {
    let transport = Arc::new(PanicsOnce::new());
    let (options, dropped) = with_drop_log(options(20, 0));
    let dispatcher = Dispatcher::with_transport(options, transport.clone()).expect("dispatcher");

    dispatcher.submit(numbered(0)).unwrap();
    assert!(dispatcher.flush(FLUSH));
    assert_eq!(dispatcher.state(), DispatcherState::Idle);

    dispatcher.submit(numbered(1)).unwrap();
    assert!(dispatcher.flush(FLUSH));

    assert_eq!(dispatcher.drain_starts(), 2);
    assert_eq!(transport.inner.delivered(), vec![vec![1]]);

    let dropped = dropped.lock().unwrap();
    assert_eq!(dropped.len(), 1);
    assert_eq!(dropped[0].0, vec![0]);
    assert!(dropped[0].1.contains("panicked"));
}

#[test]
fn events_queued_during_a_panicking_send_are_still_delivered() {
    let (transport, release) = PanicsOnce::new().gated();
    let transport = Arc::new(transport);
    let dispatcher =
        Dispatcher::with_transport(options(20, 0), transport.clone()).expect("dispatcher");

    dispatcher.submit(numbered(0)).unwrap();
    while !transport.entered() {
        thread::sleep(Duration::from_millis(1));
    }
    dispatcher.submit(numbered(1)).unwrap();

    release.send(()).unwrap();
    assert!(dispatcher.flush(FLUSH));

    /* The same loop picked up the next batch after losing the first. */
    assert_eq!(dispatcher.pending(), 0);
    assert_eq!(dispatcher.state(), DispatcherState::Idle);
    assert_eq!(dispatcher.drain_starts(), 1);
    assert_eq!(transport.inner.delivered(), vec![vec![1]]);
}
