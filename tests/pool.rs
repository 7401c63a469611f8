//! Worker pool behavior: exactly-once completion, priority ordering,
//! cancellation, re-prioritization while queued.

mod common;

use std::sync::atomic::Ordering;
use std::time::Duration;

use common::{init_logger, log_contents, new_log, BlockingTask, DynamicPriorityTask, RecordingTask};
use voxel_tasks::scheduling::{PoolConfig, PriorityWorkerPool, Task, WorkerState};

fn pool_with(thread_count: usize, batch_count: usize) -> PriorityWorkerPool {
    PriorityWorkerPool::new(PoolConfig {
        thread_count,
        batch_count,
        ..PoolConfig::default()
    })
}

fn drain_count(pool: &PriorityWorkerPool) -> usize {
    let mut count = 0;
    pool.dequeue_completed(|_| count += 1);
    count
}

#[test]
fn empty_pool_flushes_immediately() {
    init_logger();
    let pool = pool_with(2, 16);
    pool.wait_for_all_tasks();
    assert_eq!(drain_count(&pool), 0);
}

#[test]
fn single_task_observed_exactly_once() {
    init_logger();
    let log = new_log();
    let pool = pool_with(2, 16);

    pool.enqueue(Box::new(RecordingTask::new(7, 0, &log)));
    pool.wait_for_all_tasks();

    assert_eq!(drain_count(&pool), 1);
    assert_eq!(log_contents(&log), vec![7]);
    // A second drain observes nothing.
    assert_eq!(drain_count(&pool), 0);
}

#[test]
fn thousand_tasks_none_lost_none_duplicated() {
    init_logger();
    let log = new_log();
    let pool = pool_with(4, 16);

    let tasks: Vec<Box<dyn Task>> = (0..1000)
        .map(|id| Box::new(RecordingTask::new(id, (id % 7) as i32, &log)) as Box<dyn Task>)
        .collect();
    pool.enqueue_batch(tasks);
    pool.wait_for_all_tasks();

    assert_eq!(drain_count(&pool), 1000);
    let mut ran = log_contents(&log);
    ran.sort_unstable();
    assert_eq!(ran, (0..1000).collect::<Vec<_>>());
}

#[test]
fn single_worker_completes_in_priority_order() {
    init_logger();
    let log = new_log();
    let pool = pool_with(1, 4);

    // Shuffled distinct priorities; id doubles as the priority value.
    let priorities = [9, 2, 14, 0, 7, 5, 11, 3, 13, 1, 8, 12, 4, 10, 6];
    let tasks: Vec<Box<dyn Task>> = priorities
        .iter()
        .map(|&p| Box::new(RecordingTask::new(p as u32, p, &log)) as Box<dyn Task>)
        .collect();
    pool.enqueue_batch(tasks);
    pool.wait_for_all_tasks();

    let ran = log_contents(&log);
    assert_eq!(ran.len(), priorities.len());
    assert!(ran.windows(2).all(|w| w[0] <= w[1]), "ran out of order: {:?}", ran);
}

#[test]
fn end_to_end_priorities_five_one_three() {
    init_logger();
    let log = new_log();
    let pool = pool_with(1, 1);

    let tasks: Vec<Box<dyn Task>> = [5, 1, 3]
        .iter()
        .map(|&p| Box::new(RecordingTask::new(p as u32, p, &log)) as Box<dyn Task>)
        .collect();
    pool.enqueue_batch(tasks);
    pool.wait_for_all_tasks();

    assert_eq!(log_contents(&log), vec![1, 3, 5]);
    assert_eq!(drain_count(&pool), 3);
}

#[test]
fn equal_priorities_complete_in_submission_order() {
    init_logger();
    let log = new_log();
    let pool = pool_with(1, 4);

    let tasks: Vec<Box<dyn Task>> = (0..8)
        .map(|id| Box::new(RecordingTask::new(id, 42, &log)) as Box<dyn Task>)
        .collect();
    pool.enqueue_batch(tasks);
    pool.wait_for_all_tasks();

    assert_eq!(log_contents(&log), (0..8).collect::<Vec<_>>());
}

#[test]
fn cancelled_task_reaches_completion_without_running() {
    init_logger();
    let log = new_log();
    let pool = pool_with(1, 16);

    let task = RecordingTask::new(1, 0, &log);
    let cancel = task.cancel_flag();
    let ran = task.ran_flag();
    cancel.store(true, Ordering::Release);

    pool.enqueue(Box::new(task));
    pool.wait_for_all_tasks();

    assert_eq!(drain_count(&pool), 1);
    assert!(!ran.load(Ordering::Acquire));
    assert!(log_contents(&log).is_empty());
}

#[test]
fn queued_task_is_repicked_at_new_priority() {
    init_logger();
    let log = new_log();
    // Zero refresh period: every picking pass re-evaluates priorities.
    let pool = PriorityWorkerPool::new(PoolConfig {
        thread_count: 1,
        batch_count: 1,
        priority_update_period: Duration::from_millis(0),
        ..PoolConfig::default()
    });

    // Pin the only worker so the two probe tasks sit in the pending list.
    let (blocker, release) = BlockingTask::new();
    pool.enqueue(Box::new(blocker));
    while pool.pending_count() > 0 {
        std::thread::sleep(Duration::from_millis(1));
    }

    let slow = DynamicPriorityTask::new(1, 100, &log);
    let slow_priority = slow.priority_handle();
    let fast = DynamicPriorityTask::new(2, 0, &log);
    pool.enqueue_batch(vec![Box::new(slow), Box::new(fast)]);

    // Invert the ordering while both are queued, then let the worker go.
    slow_priority.store(-1, Ordering::Release);
    release.store(true, Ordering::Release);
    pool.wait_for_all_tasks();

    assert_eq!(log_contents(&log), vec![1, 2]);
}

#[test]
fn workers_report_waiting_after_flush() {
    init_logger();
    let log = new_log();
    let pool = pool_with(2, 16);

    pool.enqueue(Box::new(RecordingTask::new(1, 0, &log)));
    pool.wait_for_all_tasks();

    assert_eq!(pool.thread_count(), 2);
    assert!(pool
        .worker_states()
        .iter()
        .all(|state| *state == WorkerState::Waiting));
}

#[test]
fn completion_visitor_can_submit_follow_ups() {
    init_logger();
    let log = new_log();
    let pool = pool_with(2, 16);

    pool.enqueue(Box::new(RecordingTask::new(1, 0, &log)));
    pool.wait_for_all_tasks();

    let mut drained = 0;
    pool.dequeue_completed(|_| {
        drained += 1;
        pool.enqueue(Box::new(RecordingTask::new(2, 0, &log)));
    });
    assert_eq!(drained, 1);

    pool.wait_for_all_tasks();
    assert_eq!(drain_count(&pool), 1);
    assert_eq!(log_contents(&log), vec![1, 2]);
}
