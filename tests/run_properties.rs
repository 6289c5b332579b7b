//! End-to-end run behaviour against a recording channel.
//!
//! All tests run on tokio's paused clock, so waits, settle delays and pacing
//! complete instantly while keeping their relative timing.

use std::sync::Arc;
use std::time::Duration;

use botblocks::experiment::{RunController, RunOutcome, RunState};
use botblocks::hardware::{Action, Direction, RecordingChannel};
use botblocks::log_capture::{EventLog, Severity};
use botblocks::program::{NodeKind, Program, ProgramNode};
use tokio::sync::broadcast;
use tokio::time::{sleep, Instant};

const PACING: Duration = Duration::from_millis(50);

fn setup() -> (Arc<RecordingChannel>, Arc<RunController>) {
    let channel = Arc::new(RecordingChannel::new());
    let controller = Arc::new(RunController::new(
        channel.clone(),
        EventLog::default(),
        PACING,
    ));
    (channel, controller)
}

fn spawn_run(
    controller: &Arc<RunController>,
    program: Program,
) -> tokio::task::JoinHandle<botblocks::RunReport> {
    let controller = controller.clone();
    tokio::spawn(async move { controller.run(&program).await })
}

fn idle_transitions(rx: &mut broadcast::Receiver<RunState>) -> usize {
    let mut count = 0;
    while let Ok(state) = rx.try_recv() {
        if state == RunState::Idle {
            count += 1;
        }
    }
    count
}

#[tokio::test(start_paused = true)]
async fn loop_free_program_dispatches_in_order_then_stops() {
    let (channel, controller) = setup();
    let program = Program::from_sequences(vec![vec![
        ProgramNode::moving(Direction::Forward),
        ProgramNode::wait(1.0),
        ProgramNode::stop(),
    ]]);

    let report = controller.run(&program).await;

    assert_eq!(report.outcome, RunOutcome::Completed);
    assert_eq!(
        channel.actions(),
        vec![Action::Forward, Action::Stop, Action::Stop]
    );
}

#[tokio::test(start_paused = true)]
async fn sequences_run_in_insertion_order() {
    let (channel, controller) = setup();
    let program = Program::from_sequences(vec![
        vec![ProgramNode::moving(Direction::Left)],
        vec![ProgramNode::moving(Direction::Right)],
        vec![ProgramNode::moving(Direction::Backward)],
    ]);

    controller.run(&program).await;

    assert_eq!(
        channel.actions(),
        vec![
            Action::Left,
            Action::Right,
            Action::Backward,
            Action::Stop
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn fixed_repeat_dispatches_body_each_iteration() {
    let (channel, controller) = setup();
    let program = Program::from_sequences(vec![vec![ProgramNode::repeat(
        4,
        vec![ProgramNode::moving(Direction::Forward), ProgramNode::wait(0.5)],
    )]]);

    controller.run(&program).await;

    assert_eq!(channel.count(Action::Forward), 4);
    assert_eq!(channel.count(Action::Stop), 1);
}

#[tokio::test(start_paused = true)]
async fn dispatch_is_followed_by_settle_and_pacing() {
    let (channel, controller) = setup();
    let program = Program::from_sequences(vec![vec![ProgramNode::moving(Direction::Forward)]]);

    controller.run(&program).await;

    let records = channel.records();
    let gap = records[1].at - records[0].at;
    // 50ms settle + 50ms pacing
    assert!(gap >= Duration::from_millis(100));
    assert!(gap < Duration::from_millis(110));
}

#[tokio::test(start_paused = true)]
async fn stop_during_wait_ends_run_before_remaining_sequences() {
    let (channel, controller) = setup();
    let program = Program::from_sequences(vec![
        vec![ProgramNode::wait(5.0)],
        vec![ProgramNode::moving(Direction::Forward)],
    ]);
    let start = Instant::now();

    let run = spawn_run(&controller, program);
    sleep(Duration::from_secs(1)).await;
    controller.stop().await;
    assert_eq!(controller.state(), RunState::Running);

    let report = run.await.unwrap();

    assert_eq!(report.outcome, RunOutcome::Stopped);
    // The wait in progress is not cut short.
    assert!(start.elapsed() >= Duration::from_secs(5));
    assert_eq!(channel.actions(), vec![Action::Stop]);
    assert_eq!(controller.state(), RunState::Idle);
    assert_eq!(controller.events().count(Severity::Warning), 1);
}

#[tokio::test(start_paused = true)]
async fn stop_inside_loop_skips_remaining_iterations() {
    let (channel, controller) = setup();
    let program = Program::from_sequences(vec![vec![
        ProgramNode::repeat(
            10,
            vec![ProgramNode::moving(Direction::Forward), ProgramNode::wait(1.0)],
        ),
        ProgramNode::moving(Direction::Left),
    ]]);

    let run = spawn_run(&controller, program);
    // Inside the second iteration's wait.
    sleep(Duration::from_millis(1500)).await;
    controller.stop().await;
    run.await.unwrap();

    assert_eq!(channel.count(Action::Forward), 2);
    assert_eq!(channel.count(Action::Left), 0);
}

#[tokio::test(start_paused = true)]
async fn cooperative_stop_suppresses_completion_stop() {
    let (channel, controller) = setup();
    let program = Program::from_sequences(vec![vec![
        ProgramNode::wait(2.0),
        ProgramNode::stop(),
    ]]);

    let run = spawn_run(&controller, program);
    sleep(Duration::from_millis(500)).await;
    controller.stop().await;
    run.await.unwrap();

    // Only the stop() command itself; neither the Stop block nor the
    // completion stop is reached.
    assert_eq!(channel.actions(), vec![Action::Stop]);
    assert_eq!(controller.events().count(Severity::Success), 1);
}

#[tokio::test(start_paused = true)]
async fn emergency_stop_forces_idle_and_sends_stop() {
    let (channel, controller) = setup();
    let mut transitions = controller.subscribe_state();
    let program = Program::from_sequences(vec![
        vec![ProgramNode::wait(5.0)],
        vec![ProgramNode::moving(Direction::Forward)],
    ]);

    let run = spawn_run(&controller, program);
    sleep(Duration::from_secs(1)).await;
    controller.emergency_stop().await;

    assert_eq!(controller.state(), RunState::Idle);
    assert_eq!(channel.actions(), vec![Action::Stop]);
    assert_eq!(controller.events().count(Severity::Error), 1);

    let report = run.await.unwrap();
    assert_eq!(report.outcome, RunOutcome::Stopped);
    assert_eq!(channel.actions(), vec![Action::Stop]);
    assert_eq!(idle_transitions(&mut transitions), 1);
}

#[tokio::test(start_paused = true)]
async fn rerun_after_emergency_stop_does_not_interleave() {
    let (channel, controller) = setup();
    let first = Program::from_sequences(vec![
        vec![ProgramNode::wait(5.0)],
        vec![ProgramNode::moving(Direction::Forward)],
    ]);
    let second = Program::from_sequences(vec![vec![ProgramNode::moving(Direction::Left)]]);

    let old_run = spawn_run(&controller, first);
    sleep(Duration::from_secs(1)).await;
    controller.emergency_stop().await;

    let new_report = controller.run(&second).await;
    assert_eq!(new_report.outcome, RunOutcome::Completed);
    assert_eq!(controller.state(), RunState::Idle);

    let old_report = old_run.await.unwrap();
    assert_eq!(old_report.outcome, RunOutcome::Stopped);
    assert_ne!(old_report.run_id, new_report.run_id);
    assert_eq!(
        channel.actions(),
        vec![Action::Stop, Action::Left, Action::Stop]
    );
    assert_eq!(controller.state(), RunState::Idle);
}

#[tokio::test(start_paused = true)]
async fn malformed_node_is_reported_and_siblings_continue() {
    let (channel, controller) = setup();
    let program = Program::from_sequences(vec![vec![
        ProgramNode::new(NodeKind::Move { direction: None }),
        ProgramNode::moving(Direction::Forward),
    ]]);

    let report = controller.run(&program).await;

    assert_eq!(report.outcome, RunOutcome::Completed);
    assert_eq!(report.node_errors, 1);
    assert_eq!(controller.events().count(Severity::Error), 1);
    assert_eq!(channel.actions(), vec![Action::Forward, Action::Stop]);
}

#[tokio::test(start_paused = true)]
async fn second_run_while_running_is_a_no_op() {
    let (channel, controller) = setup();
    let program = Program::from_sequences(vec![vec![ProgramNode::wait(2.0)]]);

    let run = spawn_run(&controller, program.clone());
    sleep(Duration::from_millis(100)).await;
    let events_before = controller.events().snapshot().len();

    let report = controller.run(&program).await;

    assert_eq!(report.outcome, RunOutcome::AlreadyRunning);
    assert!(report.run_id.is_none());
    assert_eq!(controller.events().snapshot().len(), events_before);
    assert!(channel.records().is_empty());

    assert_eq!(run.await.unwrap().outcome, RunOutcome::Completed);
}

#[tokio::test(start_paused = true)]
async fn double_stop_sends_two_stops_and_idles_once() {
    let (channel, controller) = setup();
    let mut transitions = controller.subscribe_state();
    let program = Program::from_sequences(vec![vec![ProgramNode::wait(3.0)]]);

    let run = spawn_run(&controller, program);
    sleep(Duration::from_millis(500)).await;
    controller.stop().await;
    controller.stop().await;
    run.await.unwrap();

    assert_eq!(channel.actions(), vec![Action::Stop, Action::Stop]);
    assert_eq!(idle_transitions(&mut transitions), 1);
}

#[tokio::test(start_paused = true)]
async fn unreachable_robot_does_not_abort_the_run() {
    let (channel, controller) = setup();
    channel.set_reachable(false);
    let program = Program::from_sequences(vec![vec![
        ProgramNode::moving(Direction::Forward),
        ProgramNode::print("after"),
    ]]);

    let report = controller.run(&program).await;

    assert_eq!(report.outcome, RunOutcome::Completed);
    assert_eq!(report.node_errors, 0);
    assert!(!controller.is_connected());
    // Forward and the completion stop both fail.
    assert_eq!(controller.events().count(Severity::Error), 2);
    assert!(controller
        .events()
        .snapshot()
        .iter()
        .any(|e| e.message == "after"));
}

#[tokio::test(start_paused = true)]
async fn example_programs_run_to_completion() {
    for name in botblocks::program::library::names() {
        let (channel, controller) = setup();
        let program = botblocks::program::library::get(name).unwrap();

        let report = controller.run(&program).await;

        assert_eq!(report.outcome, RunOutcome::Completed, "{name}");
        assert_eq!(report.node_errors, 0, "{name}");
        assert_eq!(channel.actions().last(), Some(&Action::Stop), "{name}");
    }
}

#[test]
fn recording_channel_address_is_readable_outside_a_runtime_test() {
    let channel = RecordingChannel::new();
    tokio_test::block_on(async {
        use botblocks::hardware::CommandChannel;
        channel.set_address("http://10.1.1.1").await;
        assert_eq!(channel.address().await, "http://10.1.1.1");
    });
}

#[tokio::test(start_paused = true)]
async fn editor_json_with_bad_blocks_runs_the_rest() {
    let (channel, controller) = setup();
    let program: Program = serde_json::from_str(
        r#"{
            "sequences": [
                { "type": "variables_set", "var": "count",
                  "next": { "type": "repeat", "times": 2,
                            "body": { "type": "math_change", "var": "count",
                                      "next": { "type": "move", "direction": "forward" } },
                            "next": { "type": "wait", "seconds": true,
                                      "next": { "type": "set_speed", "speed": [1],
                                                "next": { "type": "move", "direction": "left" } } } } }
            ]
        }"#,
    )
    .unwrap();

    let report = controller.run(&program).await;

    assert_eq!(report.outcome, RunOutcome::Completed);
    // variables_set, math_change twice, the wait and the speed block
    assert_eq!(report.node_errors, 5);
    assert_eq!(controller.events().count(Severity::Error), 5);
    assert_eq!(
        channel.actions(),
        vec![Action::Forward, Action::Forward, Action::Left, Action::Stop]
    );
}

#[tokio::test(start_paused = true)]
async fn aborted_run_returns_to_idle() {
    let (channel, controller) = setup();
    let mut transitions = controller.subscribe_state();
    let waiting = Program::from_sequences(vec![vec![ProgramNode::wait(5.0)]]);

    let run = spawn_run(&controller, waiting);
    sleep(Duration::from_secs(1)).await;
    assert_eq!(controller.state(), RunState::Running);

    run.abort();
    assert!(run.await.unwrap_err().is_cancelled());
    assert_eq!(controller.state(), RunState::Idle);
    assert_eq!(idle_transitions(&mut transitions), 1);

    let program = Program::from_sequences(vec![vec![ProgramNode::moving(Direction::Forward)]]);
    let report = controller.run(&program).await;
    assert_eq!(report.outcome, RunOutcome::Completed);
    assert_eq!(channel.actions(), vec![Action::Forward, Action::Stop]);
}
