use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, unbounded};

use crate::data::model::{Measurement, Parameter, SeriesKey, TimeRange};
use crate::data::source::{DataSource, SourceError};

// ---------------------------------------------------------------------------
// Requests and their completions
// ---------------------------------------------------------------------------

/// Identifies the station selection a request belongs to.
pub type Generation = u64;

/// What a background request asked for.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    Depths {
        station: String,
        parameter: Parameter,
    },
    Measurements {
        station: String,
        parameter: Parameter,
        depth: f64,
    },
}

impl Request {
    /// The chart series this request would create, if any.
    pub fn series_key(&self) -> Option<SeriesKey> {
        match self {
            Request::Measurements {
                parameter, depth, ..
            } => Some(SeriesKey::new(&parameter.name, *depth)),
            Request::Depths { .. } => None,
        }
    }
}

/// Result of a finished request.
#[derive(Debug)]
pub enum Outcome {
    Depths(Result<Vec<f64>, SourceError>),
    Measurements(Result<Vec<Measurement>, SourceError>),
}

#[derive(Debug)]
pub struct Completion {
    pub generation: Generation,
    pub request: Request,
    pub outcome: Outcome,
    id: u64,
}

// ---------------------------------------------------------------------------
// RequestQueue
// ---------------------------------------------------------------------------

type Waker = Arc<dyn Fn() + Send + Sync>;

/// Worker threads serving one queue. Requests beyond this wait their turn.
pub const WORKERS: usize = 4;

struct Job {
    id: u64,
    generation: Generation,
    request: Request,
    range: TimeRange,
    waker: Option<Waker>,
}

/// Runs data-source requests on a fixed pool of worker threads and hands
/// completions back to the owning (UI) thread one at a time.
///
/// The pending count is the size of the outstanding set of the current
/// generation; advancing the generation forgets older requests. Workers skip
/// queued jobs of an older generation, and completions that were already
/// running are dropped on arrival.
pub struct RequestQueue {
    generation: Arc<AtomicU64>,
    next_id: u64,
    outstanding: HashMap<u64, Request>,
    jobs: Sender<Job>,
    rx: Receiver<Completion>,
    waker: Option<Waker>,
}

impl RequestQueue {
    pub fn new(source: Arc<dyn DataSource>) -> Self {
        let (jobs, job_rx) = unbounded::<Job>();
        let (tx, rx) = unbounded();
        let generation = Arc::new(AtomicU64::new(0));

        for _ in 0..WORKERS {
            let source = Arc::clone(&source);
            let job_rx = job_rx.clone();
            let tx = tx.clone();
            let current = Arc::clone(&generation);
            // Workers exit once the queue, and with it the job sender, is dropped.
            std::thread::spawn(move || {
                for job in job_rx.iter() {
                    if job.generation != current.load(Ordering::Acquire) {
                        continue;
                    }
                    if !run_job(source.as_ref(), job, &tx) {
                        break;
                    }
                }
            });
        }

        RequestQueue {
            generation,
            next_id: 0,
            outstanding: HashMap::new(),
            jobs,
            rx,
            waker: None,
        }
    }

    /// Called from the worker thread after each completion is queued.
    pub fn set_waker(&mut self, waker: impl Fn() + Send + Sync + 'static) {
        self.waker = Some(Arc::new(waker));
    }

    fn current(&self) -> Generation {
        self.generation.load(Ordering::Acquire)
    }

    /// Start a new generation; everything still in flight becomes stale.
    pub fn advance_generation(&mut self) -> Generation {
        self.outstanding.clear();
        self.generation.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Outstanding requests of the current generation.
    pub fn pending(&self) -> usize {
        self.outstanding.len()
    }

    pub fn is_loading(&self) -> bool {
        !self.outstanding.is_empty()
    }

    /// Whether a measurement fetch for `key` is already in flight.
    pub fn is_fetching(&self, key: &SeriesKey) -> bool {
        self.outstanding
            .values()
            .any(|r| r.series_key().as_ref() == Some(key))
    }

    pub fn fetch_depths(&mut self, station: &str, parameter: Parameter, range: TimeRange) {
        self.submit(
            Request::Depths {
                station: station.to_string(),
                parameter,
            },
            range,
        );
    }

    pub fn fetch_measurements(
        &mut self,
        station: &str,
        parameter: Parameter,
        depth: f64,
        range: TimeRange,
    ) {
        self.submit(
            Request::Measurements {
                station: station.to_string(),
                parameter,
                depth,
            },
            range,
        );
    }

    fn submit(&mut self, request: Request, range: TimeRange) {
        let id = self.next_id;
        self.next_id += 1;
        self.outstanding.insert(id, request.clone());

        let job = Job {
            id,
            generation: self.current(),
            request,
            range,
            waker: self.waker.clone(),
        };
        // Workers hold the receiver for as long as the queue exists.
        if self.jobs.send(job).is_err() {
            log::error!("Request workers have stopped; dropping request {id}");
            self.outstanding.remove(&id);
        }
    }

    /// Next completion of the current generation, without blocking.
    pub fn try_next(&mut self) -> Option<Completion> {
        loop {
            let completion = self.rx.try_recv().ok()?;
            if let Some(c) = self.accept(completion) {
                return Some(c);
            }
        }
    }

    /// Next completion of the current generation, waiting up to `timeout`.
    pub fn next_timeout(&mut self, timeout: Duration) -> Option<Completion> {
        let deadline = std::time::Instant::now() + timeout;
        loop {
            let completion = self.rx.recv_deadline(deadline).ok()?;
            if let Some(c) = self.accept(completion) {
                return Some(c);
            }
        }
    }

    fn accept(&mut self, completion: Completion) -> Option<Completion> {
        let current = self.current();
        if completion.generation != current {
            log::debug!(
                "Discarding stale completion of {:?} (generation {} < {current})",
                completion.request,
                completion.generation,
            );
            return None;
        }
        self.outstanding.remove(&completion.id);
        Some(completion)
    }
}

/// Serve one job. Returns `false` once the completion receiver is gone,
/// which only happens while the application shuts down.
fn run_job(source: &dyn DataSource, job: Job, tx: &Sender<Completion>) -> bool {
    let outcome = match &job.request {
        Request::Depths { station, parameter } => {
            Outcome::Depths(source.get_depth(station, parameter, &job.range))
        }
        Request::Measurements {
            station,
            parameter,
            depth,
        } => Outcome::Measurements(source.get_measurements(station, parameter, *depth, &job.range)),
    };
    let completion = Completion {
        generation: job.generation,
        request: job.request,
        outcome,
        id: job.id,
    };
    if tx.send(completion).is_err() {
        return false;
    }
    if let Some(wake) = job.waker {
        wake();
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::source::testing::StubSource;
    use chrono::DateTime;

    const WAIT: Duration = Duration::from_secs(5);

    fn range() -> TimeRange {
        TimeRange::since(DateTime::from_timestamp_millis(0).unwrap())
    }

    fn queue() -> RequestQueue {
        let source = StubSource::default()
            .with_depths("TEMP", &[0.0, 10.0])
            .with_samples("TEMP", &[(1, 1.0)]);
        RequestQueue::new(Arc::new(source))
    }

    #[test]
    fn pending_tracks_outstanding_requests() {
        let mut q = queue();
        q.fetch_depths("S1", Parameter::time_series("TEMP"), range());
        q.fetch_depths("S1", Parameter::time_series("PSAL"), range());
        assert_eq!(q.pending(), 2);

        let first = q.next_timeout(WAIT).unwrap();
        assert_eq!(q.pending(), 1);
        let second = q.next_timeout(WAIT).unwrap();
        assert_eq!(q.pending(), 0);
        assert!(!q.is_loading());

        let outcomes: Vec<bool> = [first, second]
            .into_iter()
            .map(|c| matches!(c.outcome, Outcome::Depths(Ok(_))))
            .collect();
        assert_eq!(outcomes.iter().filter(|ok| **ok).count(), 1);
    }

    #[test]
    fn measurement_fetch_is_tracked_by_key() {
        let mut q = queue();
        let key = SeriesKey::new("TEMP", 10.0);
        assert!(!q.is_fetching(&key));

        q.fetch_measurements("S1", Parameter::time_series("TEMP"), 10.0, range());
        assert!(q.is_fetching(&key));
        assert!(!q.is_fetching(&SeriesKey::new("TEMP", 0.0)));

        let c = q.next_timeout(WAIT).unwrap();
        assert_eq!(c.request.series_key(), Some(key.clone()));
        assert!(!q.is_fetching(&key));
    }

    #[test]
    fn stale_generation_is_discarded() {
        let mut q = queue();
        q.fetch_depths("S1", Parameter::time_series("TEMP"), range());
        let generation = q.advance_generation();
        assert_eq!(q.pending(), 0);

        assert!(q.next_timeout(Duration::from_millis(500)).is_none());

        q.fetch_depths("S2", Parameter::time_series("TEMP"), range());
        let c = q.next_timeout(WAIT).unwrap();
        assert_eq!(c.generation, generation);
        assert!(matches!(c.request, Request::Depths { ref station, .. } if station == "S2"));
    }

    #[test]
    fn more_requests_than_workers_all_complete() {
        let mut q = queue();
        let count = WORKERS * 3;
        for depth in 0..count {
            q.fetch_measurements("S1", Parameter::time_series("TEMP"), depth as f64, range());
        }
        assert_eq!(q.pending(), count);

        let mut keys: Vec<SeriesKey> = (0..count)
            .map(|_| q.next_timeout(WAIT).unwrap().request.series_key().unwrap())
            .collect();
        keys.sort();
        keys.dedup();
        assert_eq!(keys.len(), count);
        assert_eq!(q.pending(), 0);
    }

    #[test]
    fn waker_runs_after_completion() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let woken = Arc::new(AtomicUsize::new(0));
        let mut q = queue();
        let counter = Arc::clone(&woken);
        q.set_waker(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        q.fetch_depths("S1", Parameter::time_series("TEMP"), range());
        q.next_timeout(WAIT).unwrap();
        // The waker runs right after the send; give the worker a moment.
        let deadline = std::time::Instant::now() + WAIT;
        while woken.load(Ordering::SeqCst) == 0 && std::time::Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(woken.load(Ordering::SeqCst), 1);
    }
}
