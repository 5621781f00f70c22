//! Event scheduling from a `Simulation` instance.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use eventick::queue::QueueDiscipline;
use eventick::simulation::{SimInit, Simulation};
use eventick::time::SimTime;

const DISCIPLINES: [QueueDiscipline; 5] = [
    QueueDiscipline::List,
    QueueDiscipline::BinaryHeap,
    QueueDiscipline::Map,
    QueueDiscipline::Calendar,
    QueueDiscipline::Ns2Calendar,
];

fn bench(discipline: QueueDiscipline) -> (Simulation, Rc<RefCell<Vec<u64>>>) {
    let simu = SimInit::new().set_queue(discipline).init();
    let log = Rc::new(RefCell::new(Vec::new()));

    (simu, log)
}

fn log_event(log: &Rc<RefCell<Vec<u64>>>, tag: u64) -> impl FnOnce(&mut Simulation) + 'static {
    let log = log.clone();
    move |_| log.borrow_mut().push(tag)
}

#[test]
fn simulation_drains_in_time_order() {
    for discipline in DISCIPLINES {
        let (mut simu, log) = bench(discipline);

        for delay in [10u64, 5, 20, 15] {
            simu.schedule(Duration::from_secs(delay), log_event(&log, delay));
        }

        simu.run();

        assert_eq!(*log.borrow(), [5, 10, 15, 20]);
        assert_eq!(simu.time(), SimTime::ZERO + Duration::from_secs(20));
        assert!(!simu.events_pending());
    }
}

#[test]
fn same_instant_events_fire_fifo() {
    for discipline in DISCIPLINES {
        let (mut simu, log) = bench(discipline);

        for tag in 0..4 {
            simu.schedule(Duration::from_secs(7), log_event(&log, tag));
        }

        simu.run();

        assert_eq!(*log.borrow(), [0, 1, 2, 3]);
    }
}

#[test]
fn zero_delay_from_callback_fires_at_current_instant() {
    // An event scheduled with a zero delay from a callback executing at T
    // must fire at exactly T, before any event dated later than T.
    let (mut simu, log) = bench(QueueDiscipline::Map);

    simu.schedule(Duration::from_secs(20), log_event(&log, 20));
    let inner_log = log.clone();
    simu.schedule(Duration::from_secs(10), move |simu| {
        inner_log.borrow_mut().push(10);
        let at_t = inner_log.clone();
        simu.schedule(Duration::ZERO, move |simu| {
            assert_eq!(simu.time(), SimTime::ZERO + Duration::from_secs(10));
            at_t.borrow_mut().push(100);
        });
    });

    simu.run();

    assert_eq!(*log.borrow(), [10, 100, 20]);
}

#[test]
fn schedule_now_fires_after_events_due_at_this_instant() {
    let (mut simu, log) = bench(QueueDiscipline::BinaryHeap);

    let outer_log = log.clone();
    simu.schedule(Duration::from_secs(5), move |simu| {
        outer_log.borrow_mut().push(1);
        let now_log = outer_log.clone();
        simu.schedule_now(move |_| now_log.borrow_mut().push(3));
    });
    // Also due at t=5s, scheduled later: fires second, before the "now"
    // event above.
    simu.schedule(Duration::from_secs(5), log_event(&log, 2));

    simu.run();

    assert_eq!(*log.borrow(), [1, 2, 3]);
}

#[test]
fn cancellation_is_idempotent() {
    for discipline in DISCIPLINES {
        let (mut simu, log) = bench(discipline);

        simu.schedule(Duration::from_secs(1), log_event(&log, 1));
        let cancelled = simu.schedule(Duration::from_secs(2), log_event(&log, 2));
        simu.schedule(Duration::from_secs(3), log_event(&log, 3));

        simu.cancel(&cancelled);
        simu.cancel(&cancelled);
        assert!(simu.is_expired(&cancelled));

        simu.run();

        // The cancelled event reached its natural dequeue time without
        // firing; cancelling it again after the run is still a no-op.
        simu.cancel(&cancelled);
        assert_eq!(*log.borrow(), [1, 3]);
    }
}

#[test]
fn cancel_after_fire_has_no_effect() {
    let (mut simu, log) = bench(QueueDiscipline::Map);

    let id = simu.schedule(Duration::from_secs(1), log_event(&log, 1));
    simu.run();

    assert!(simu.is_expired(&id));
    simu.cancel(&id);
    assert_eq!(*log.borrow(), [1]);
}

#[test]
fn remove_pulls_the_event_out_of_the_queue() {
    for discipline in DISCIPLINES {
        let (mut simu, log) = bench(discipline);

        simu.schedule(Duration::from_secs(1), log_event(&log, 1));
        let removed = simu.schedule(Duration::from_secs(2), log_event(&log, 2));

        simu.remove(&removed);
        assert!(simu.is_expired(&removed));
        assert_eq!(simu.delay_left(&removed), Duration::ZERO);

        // Removing an expired id is a recoverable no-op.
        simu.remove(&removed);

        simu.run();

        assert_eq!(*log.borrow(), [1]);
    }
}

#[test]
fn expiry_and_delay_left() {
    let (mut simu, log) = bench(QueueDiscipline::Map);

    let id = simu.schedule(Duration::from_secs(4), log_event(&log, 4));
    assert!(!simu.is_expired(&id));
    assert_eq!(simu.delay_left(&id), Duration::from_secs(4));

    let stepper = log.clone();
    simu.schedule(Duration::from_secs(1), move |_| stepper.borrow_mut().push(1));
    simu.step();

    assert_eq!(simu.time(), SimTime::ZERO + Duration::from_secs(1));
    assert_eq!(simu.delay_left(&id), Duration::from_secs(3));

    simu.run();

    assert!(simu.is_expired(&id));
    assert_eq!(simu.delay_left(&id), Duration::ZERO);
}

#[test]
fn stop_requested_from_a_callback() {
    let (mut simu, log) = bench(QueueDiscipline::Map);

    simu.schedule(Duration::from_secs(1), log_event(&log, 1));
    simu.schedule(Duration::from_secs(2), |simu: &mut Simulation| simu.stop());
    simu.schedule(Duration::from_secs(3), log_event(&log, 3));

    simu.run();

    // The event at t=3s was not processed but is still queued.
    assert_eq!(*log.borrow(), [1]);
    assert!(simu.events_pending());
    assert_eq!(simu.time(), SimTime::ZERO + Duration::from_secs(2));
}

#[test]
fn stop_at_halts_before_later_events() {
    let (mut simu, log) = bench(QueueDiscipline::Calendar);

    simu.schedule(Duration::from_secs(1), log_event(&log, 1));
    simu.schedule(Duration::from_secs(5), log_event(&log, 5));
    simu.stop_at(SimTime::ZERO + Duration::from_secs(3));

    simu.run();

    assert_eq!(*log.borrow(), [1]);
    assert_eq!(simu.time(), SimTime::ZERO + Duration::from_secs(3));
    assert!(simu.events_pending());
}

#[test]
#[should_panic(expected = "before the current simulation time")]
fn schedule_at_in_the_past_is_fatal() {
    let (mut simu, log) = bench(QueueDiscipline::Map);

    simu.schedule(Duration::from_secs(2), log_event(&log, 2));
    simu.run();

    simu.schedule_at(SimTime::ZERO + Duration::from_secs(1), |_| {});
}

#[test]
fn destroy_fires_deferred_callbacks_in_registration_order() {
    let (mut simu, log) = bench(QueueDiscipline::Map);

    let first = simu.schedule_destroy(log_event(&log, 101));
    simu.schedule_destroy(log_event(&log, 102));
    simu.schedule(Duration::from_secs(1), log_event(&log, 1));

    simu.run();

    // Destroy-time callbacks did not fire during the run.
    assert_eq!(*log.borrow(), [1]);
    assert!(!simu.is_expired(&first));

    simu.destroy();

    assert_eq!(*log.borrow(), [1, 101, 102]);
    assert!(simu.is_expired(&first));
}

#[test]
fn removed_destroy_event_never_fires() {
    let (mut simu, log) = bench(QueueDiscipline::Map);

    simu.schedule_destroy(log_event(&log, 101));
    let removed = simu.schedule_destroy(log_event(&log, 102));
    simu.schedule_destroy(log_event(&log, 103));

    simu.remove(&removed);
    assert!(simu.is_expired(&removed));

    simu.destroy();

    assert_eq!(*log.borrow(), [101, 103]);
}

#[test]
fn destroy_releases_pending_events_uninvoked() {
    let (mut simu, log) = bench(QueueDiscipline::Ns2Calendar);

    simu.schedule(Duration::from_secs(1), log_event(&log, 1));
    simu.schedule(Duration::from_secs(5), log_event(&log, 5));
    simu.stop_at(SimTime::ZERO + Duration::from_secs(2));
    simu.run();

    simu.destroy();

    assert_eq!(*log.borrow(), [1]);
    assert!(!simu.events_pending());
}
