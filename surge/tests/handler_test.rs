use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use surge::logging;
use surge::{
    HandlerError, HandlerResult, LogHandler, NoopResponse, PoolRegistry, Response, ResponseContext, ResponseHandler,
    UpdateHandler,
};

mod test_helpers;
use test_helpers::{steady_config, wait_until, Job, SETTLE};

struct Reply {
    slot: usize,
    id: u64,
    log: Arc<Mutex<Vec<(usize, u64)>>>,
}

impl Response for Reply {
    fn run(&mut self) -> HandlerResult<()> {
        if self.id == 13 {
            return Err(HandlerError::Rejected("unlucky".into()));
        }
        self.log.lock().unwrap().push((self.slot, self.id));
        Ok(())
    }
}

#[test]
fn log_handler_sleeps_for_work_delay() {
    let handler = LogHandler::new().with_work_delay(Duration::from_millis(30));
    let started = Instant::now();
    handler.handle(0, Job::elastic(1)).unwrap();
    assert!(started.elapsed() >= Duration::from_millis(30));
}

#[test]
fn response_handler_runs_one_response_per_update() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&log);
    let handler = ResponseHandler::new(move |ctx: ResponseContext<Job>| Reply {
        slot: ctx.slot,
        id: ctx.update.id,
        log: Arc::clone(&sink),
    });

    handler.handle(2, Job::elastic(5)).unwrap();
    let err = handler.handle(3, Job::elastic(13)).unwrap_err();
    assert_eq!(err.to_string(), "Update rejected: unlucky");
    assert_eq!(*log.lock().unwrap(), vec![(2, 5)]);
}

#[test]
fn pool_with_stock_handlers() {
    logging::init_test();
    let built = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&built);
    let handler = ResponseHandler::new(move |_ctx: ResponseContext<Job>| {
        counter.fetch_add(1, Ordering::SeqCst);
        NoopResponse
    });
    let pool = PoolRegistry::new(steady_config(3, 1), handler).unwrap();

    for id in 0..6 {
        pool.dispatch(Job::elastic(id)).unwrap();
    }
    assert!(wait_until(SETTLE, || built.load(Ordering::SeqCst) == 6));
    pool.shutdown().unwrap();

    let pool = PoolRegistry::new(steady_config(2, 1), LogHandler::new()).unwrap();
    pool.dispatch(Job::primary(1)).unwrap();
    assert!(wait_until(SETTLE, || pool.metrics().processed == 1));
}
