//! End-to-end scheduling behaviour against the mock virtual device

mod common;

use common::{config, enqueue, hold, start, status, wait_status, wait_terminal};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use yantra_io::config::MoveDefinition;
use yantra_io::core::types::{
    Action, ActionStep, AxisId, ButtonId, CancelReason, RequestStatus,
};

/// 62.5 fps gives a 16ms frame
const FPS_16MS: f64 = 62.5;

#[test]
fn test_jump_timing_and_lifecycle() {
    let harness = start(config(FPS_16MS), false);
    let mut client = harness.client();

    let response = client.enqueue("jump", None).unwrap();
    assert_eq!(response.status, Some(RequestStatus::Queued));
    let id = response.request_id.unwrap();

    let running = wait_status(&mut client, id, Duration::from_secs(2), |s| {
        *s != RequestStatus::Queued
    });
    assert!(
        matches!(running, RequestStatus::Running | RequestStatus::Completed),
        "unexpected {:?}",
        running
    );
    assert_eq!(wait_terminal(&mut client, id), RequestStatus::Completed);

    let emitted = harness.device.emitted();
    assert_eq!(emitted.len(), 2);
    assert_eq!(emitted[0].action, Action::press(ButtonId::South));
    assert_eq!(emitted[1].action, Action::release(ButtonId::South));

    // Release is due at 4 frames (64ms) after the press
    let gap = emitted[1].at.duration_since(emitted[0].at);
    assert!(gap >= Duration::from_millis(60), "released early: {:?}", gap);
    assert!(gap < Duration::from_millis(150), "released late: {:?}", gap);
}

#[test]
fn test_back_to_back_moves_do_not_overlap() {
    let harness = start(config(FPS_16MS), false);
    let mut client = harness.client();

    let jump = enqueue(&mut client, "jump");
    let crouch = enqueue(&mut client, "crouch");

    let crouch_running = wait_status(&mut client, crouch, Duration::from_secs(2), |s| {
        *s != RequestStatus::Queued
    });
    assert_ne!(crouch_running, RequestStatus::Queued);
    assert_eq!(status(&mut client, jump), RequestStatus::Completed);
    assert_eq!(wait_terminal(&mut client, crouch), RequestStatus::Completed);

    assert_eq!(
        harness.device.actions(),
        vec![
            Action::press(ButtonId::South),
            Action::release(ButtonId::South),
            Action::axis(AxisId::LeftY, 1.0),
            Action::center(AxisId::LeftY),
        ]
    );
}

#[test]
fn test_requests_execute_in_submission_order() {
    let mut cfg = config(200.0);
    cfg.moves = vec![
        hold("r1", ButtonId::North, 2),
        hold("r2", ButtonId::East, 2),
        hold("r3", ButtonId::West, 2),
    ];
    let harness = start(cfg, false);
    let mut client = harness.client();

    let ids: Vec<_> = ["r1", "r2", "r3"]
        .iter()
        .map(|name| enqueue(&mut client, name))
        .collect();
    for &id in &ids {
        assert_eq!(wait_terminal(&mut client, id), RequestStatus::Completed);
    }

    let presses: Vec<ButtonId> = harness
        .device
        .actions()
        .into_iter()
        .filter_map(|a| match a {
            Action::SetButton {
                button,
                pressed: true,
            } => Some(button),
            _ => None,
        })
        .collect();
    assert_eq!(presses, vec![ButtonId::North, ButtonId::East, ButtonId::West]);
}

#[test]
fn test_passthrough_suppressed_while_running() {
    let mut cfg = config(FPS_16MS);
    cfg.moves = vec![hold("hold_east", ButtonId::East, 10)];
    let harness = start(cfg, true);
    let physical = harness.physical.clone().unwrap();

    // Human mashing the north button throughout
    let stop = Arc::new(AtomicBool::new(false));
    let feeder = {
        let stop = Arc::clone(&stop);
        thread::spawn(move || {
            let mut pressed = false;
            while !stop.load(Ordering::Relaxed) {
                pressed = !pressed;
                let action = if pressed {
                    Action::press(ButtonId::North)
                } else {
                    Action::release(ButtonId::North)
                };
                physical.send(action);
                thread::sleep(Duration::from_millis(1));
            }
        })
    };

    thread::sleep(Duration::from_millis(50));
    let mut client = harness.client();
    let id = enqueue(&mut client, "hold_east");
    assert_eq!(wait_terminal(&mut client, id), RequestStatus::Completed);
    thread::sleep(Duration::from_millis(50));
    stop.store(true, Ordering::Relaxed);
    feeder.join().unwrap();

    let emitted = harness.device.emitted();
    let first = emitted
        .iter()
        .position(|e| e.from_thread("scheduler"))
        .unwrap();
    let last = emitted
        .iter()
        .rposition(|e| e.from_thread("scheduler"))
        .unwrap();
    assert!(
        emitted[first..=last]
            .iter()
            .all(|e| e.from_thread("scheduler")),
        "passthrough write while the move was running"
    );
    assert_eq!(last - first, 1);

    // Passthrough was live on both sides of the move
    assert!(emitted[..first].iter().any(|e| e.from_thread("passthrough")));
    assert!(
        emitted[last + 1..]
            .iter()
            .any(|e| e.from_thread("passthrough"))
    );
}

#[test]
fn test_cancel_current_advances_queue() {
    let mut cfg = config(FPS_16MS);
    cfg.moves = vec![hold("long_hold", ButtonId::R1, 600)];
    let harness = start(cfg, false);
    let mut client = harness.client();

    let long = enqueue(&mut client, "long_hold");
    let jump = enqueue(&mut client, "jump");
    wait_status(&mut client, long, Duration::from_secs(2), |s| {
        *s == RequestStatus::Running
    });

    let cancelled_at = Instant::now();
    let response = client.cancel_current().unwrap();
    assert_eq!(response.request_id, Some(long));

    let next = wait_status(&mut client, jump, Duration::from_secs(2), |s| {
        *s != RequestStatus::Queued
    });
    assert_ne!(next, RequestStatus::Queued);
    assert!(
        cancelled_at.elapsed() < Duration::from_millis(100),
        "next request took {:?} to start",
        cancelled_at.elapsed()
    );
    assert_eq!(
        status(&mut client, long),
        RequestStatus::Cancelled {
            reason: CancelReason::Requested
        }
    );
    assert_eq!(wait_terminal(&mut client, jump), RequestStatus::Completed);

    // The held shoulder button was released before the jump started
    let actions = harness.device.actions();
    assert_eq!(
        &actions[..3],
        &[
            Action::press(ButtonId::R1),
            Action::release(ButtonId::R1),
            Action::press(ButtonId::South),
        ]
    );

    // Cancelling once nothing runs is a no-op
    let response = client.cancel_current().unwrap();
    assert!(response.is_ok());
    assert_eq!(response.request_id, None);
    assert_eq!(status(&mut client, jump), RequestStatus::Completed);
}

#[test]
fn test_stalled_backend_catches_up() {
    // 10ms frames; steps at 0, 4 and 8 frames
    let mut cfg = config(100.0);
    cfg.moves = vec![MoveDefinition {
        name: "abc".to_string(),
        steps: vec![
            ActionStep::new(0, Action::press(ButtonId::South)),
            ActionStep::new(4, Action::press(ButtonId::East)),
            ActionStep::new(8, Action::press(ButtonId::North)),
        ],
    }];
    let harness = start(cfg, false);
    let mut client = harness.client();

    // First emit blocks for 6 frames: frame 4 is overdue by the time it returns
    harness.device.stall_next_emit(Duration::from_millis(60));
    let id = enqueue(&mut client, "abc");
    assert_eq!(wait_terminal(&mut client, id), RequestStatus::Completed);

    let emitted = harness.device.emitted();
    let actions: Vec<Action> = emitted.iter().map(|e| e.action).collect();
    assert_eq!(
        actions,
        vec![
            Action::press(ButtonId::South),
            Action::press(ButtonId::East),
            Action::press(ButtonId::North),
        ]
    );

    // Overdue step goes out immediately, the last one stays anchored on start
    let backlog_gap = emitted[1].at.duration_since(emitted[0].at);
    assert!(backlog_gap < Duration::from_millis(25), "{:?}", backlog_gap);
    let final_gap = emitted[2].at.duration_since(emitted[0].at);
    assert!(final_gap < Duration::from_millis(40), "{:?}", final_gap);
}

#[test]
fn test_max_move_duration_cancels_runaway_move() {
    let mut cfg = config(FPS_16MS);
    cfg.timing.max_move_duration_ms = 50;
    cfg.moves = vec![hold("runaway", ButtonId::L2, 600)];
    let harness = start(cfg, false);
    let mut client = harness.client();

    let id = enqueue(&mut client, "runaway");
    assert_eq!(
        wait_terminal(&mut client, id),
        RequestStatus::Cancelled {
            reason: CancelReason::Timeout
        }
    );
    assert_eq!(
        harness.device.actions(),
        vec![Action::press(ButtonId::L2), Action::release(ButtonId::L2)]
    );
}

#[test]
fn test_interrupt_runs_before_queue() {
    let mut cfg = config(FPS_16MS);
    cfg.moves = vec![hold("long_hold", ButtonId::R1, 600)];
    let harness = start(cfg, false);
    let mut client = harness.client();

    let long = enqueue(&mut client, "long_hold");
    let queued = enqueue(&mut client, "crouch");
    wait_status(&mut client, long, Duration::from_secs(2), |s| {
        *s == RequestStatus::Running
    });

    let response = client.interrupt("jump", None).unwrap();
    assert!(response.is_ok());
    let urgent = response.request_id.unwrap();

    assert_eq!(
        wait_terminal(&mut client, long),
        RequestStatus::Cancelled {
            reason: CancelReason::Interrupted
        }
    );
    assert_eq!(wait_terminal(&mut client, urgent), RequestStatus::Completed);
    assert_eq!(wait_terminal(&mut client, queued), RequestStatus::Completed);

    let actions = harness.device.actions();
    let jump_at = actions
        .iter()
        .position(|a| *a == Action::press(ButtonId::South))
        .unwrap();
    let crouch_at = actions
        .iter()
        .position(|a| *a == Action::axis(AxisId::LeftY, 1.0))
        .unwrap();
    assert!(jump_at < crouch_at);
}

#[test]
fn test_shutdown_cancels_and_destroys_device() {
    let mut cfg = config(FPS_16MS);
    cfg.moves = vec![hold("long_hold", ButtonId::R1, 600)];
    let mut harness = start(cfg, false);
    let mut client = harness.client();

    let long = enqueue(&mut client, "long_hold");
    let pending = enqueue(&mut client, "jump");
    wait_status(&mut client, long, Duration::from_secs(2), |s| {
        *s == RequestStatus::Running
    });
    drop(client);

    let queue = Arc::clone(harness.daemon.queue());
    harness.daemon.shutdown();

    assert_eq!(
        queue.status(long),
        Ok(RequestStatus::Cancelled {
            reason: CancelReason::Shutdown
        })
    );
    assert_eq!(
        queue.status(pending),
        Ok(RequestStatus::Cancelled {
            reason: CancelReason::Shutdown
        })
    );
    assert!(harness.device.is_destroyed());
    assert_eq!(
        harness.device.actions(),
        vec![Action::press(ButtonId::R1), Action::release(ButtonId::R1)]
    );
}

#[test]
fn test_release_during_move_is_mirrored_afterwards() {
    let mut cfg = config(FPS_16MS);
    cfg.moves = vec![hold("hold_east", ButtonId::East, 10)];
    let harness = start(cfg, true);
    let physical = harness.physical.clone().unwrap();
    let north = |monitor: &yantra_io::devices::mock::MockDeviceMonitor| {
        monitor
            .emitted()
            .into_iter()
            .filter(|e| {
                matches!(
                    e.action,
                    Action::SetButton {
                        button: ButtonId::North,
                        ..
                    }
                )
            })
            .collect::<Vec<_>>()
    };

    let deadline = Instant::now() + Duration::from_secs(2);
    while !physical.send(Action::press(ButtonId::North)) && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(5));
    }
    while north(&harness.device).is_empty() && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(2));
    }

    let mut client = harness.client();
    let id = enqueue(&mut client, "hold_east");
    wait_status(&mut client, id, Duration::from_secs(2), |s| {
        *s == RequestStatus::Running
    });
    assert!(physical.send(Action::release(ButtonId::North)));
    assert_eq!(wait_terminal(&mut client, id), RequestStatus::Completed);

    let deadline = Instant::now() + Duration::from_secs(2);
    while north(&harness.device).len() < 2 && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(2));
    }
    let north = north(&harness.device);
    assert_eq!(
        north.iter().map(|e| e.action).collect::<Vec<_>>(),
        vec![
            Action::press(ButtonId::North),
            Action::release(ButtonId::North)
        ]
    );
    assert!(north.iter().all(|e| e.from_thread("passthrough")));
    assert!(!harness.daemon.device().shown().is_pressed(ButtonId::North));
}
