use std::{cell::RefCell, rc::Rc};

use instant::Duration;
use scene_ngin::{
    FrameTime, LifecycleState, SceneError, data_structures::scene_graph::SceneNode,
};

use crate::common::test_utils::{
    FRAME, MockHost, RecordingController, ReleaseTracker, TrackedNode, bare_manager, moved, tick,
};

mod common;

#[test]
fn three_meshes_ten_ticks_then_teardown() {
    let host = MockHost::new(800, 600, 1.0);
    let tracker = ReleaseTracker::default();
    let mut mgr = bare_manager(&host);
    for name in ["cube", "sphere", "torus"] {
        mgr.add_content(TrackedNode::new(name, &tracker).boxed())
            .unwrap();
    }

    let seen: Rc<RefCell<Vec<FrameTime>>> = Rc::default();
    let sink = seen.clone();
    mgr.start_animation_loop(move |_, time| sink.borrow_mut().push(*time))
        .unwrap();
    assert_eq!(mgr.state(), LifecycleState::Animating);

    for _ in 0..10 {
        assert!(tick(&mut mgr, FRAME));
    }
    mgr.stop_animation_loop().unwrap();
    let report = mgr.dispose().unwrap();

    let seen = seen.borrow();
    assert_eq!(seen.len(), 10);
    assert!(seen.windows(2).all(|w| w[0].elapsed < w[1].elapsed));
    assert!(seen.iter().all(|t| t.delta == FRAME));
    assert_eq!(seen.last().map(|t| t.frame), Some(10));
    assert_eq!(mgr.renderer().frames, vec![3; 10]);

    assert!(report.is_clean());
    assert_eq!(report.released, 3);
    for name in ["cube", "sphere", "torus"] {
        assert_eq!(tracker.count(name), 1);
    }
}

#[test]
fn no_tick_runs_after_stop() {
    let host = MockHost::new(800, 600, 1.0);
    let mut mgr = bare_manager(&host);
    let calls = Rc::new(RefCell::new(0));
    let counter = calls.clone();
    mgr.start_animation_loop(move |_, _| *counter.borrow_mut() += 1)
        .unwrap();
    assert!(tick(&mut mgr, FRAME));

    let in_flight = mgr.driver().pending().unwrap();
    mgr.stop_animation_loop().unwrap();
    assert_eq!(mgr.driver().cancelled(), 1);
    assert_eq!(mgr.driver().pending(), None);

    // a host that still delivers the cancelled frame is ignored
    assert!(!mgr.on_frame(in_flight).unwrap());
    assert!(!tick(&mut mgr, FRAME));
    assert_eq!(*calls.borrow(), 1);
    assert_eq!(mgr.renderer().frames.len(), 1);
    assert_eq!(mgr.state(), LifecycleState::Initialized);
}

#[test]
fn start_then_immediate_stop_runs_nothing() {
    let host = MockHost::new(800, 600, 1.0);
    let mut mgr = bare_manager(&host);
    mgr.start_animation_loop(|_, _| panic!("no tick expected"))
        .unwrap();
    mgr.stop_animation_loop().unwrap();
    for _ in 0..3 {
        assert!(!tick(&mut mgr, FRAME));
    }
    assert!(mgr.renderer().frames.is_empty());
}

#[test]
fn stop_is_a_no_op_when_idle() {
    let host = MockHost::new(800, 600, 1.0);
    let mut mgr = bare_manager(&host);
    mgr.stop_animation_loop().unwrap();
    mgr.stop_animation_loop().unwrap();
    assert_eq!(mgr.driver().cancelled(), 0);
}

#[test]
fn second_loop_is_rejected_while_one_runs() {
    let host = MockHost::new(800, 600, 1.0);
    let mut mgr = bare_manager(&host);
    mgr.start_animation_loop(|_, _| {}).unwrap();
    assert_eq!(
        mgr.start_animation_loop(|_, _| {}),
        Err(SceneError::LoopAlreadyRunning)
    );
    assert_eq!(mgr.driver().requested(), 1);

    // restarting after a stop is fine and time starts over
    mgr.stop_animation_loop().unwrap();
    mgr.driver_mut().advance(Duration::from_secs(10));
    let first: Rc<RefCell<Option<FrameTime>>> = Rc::default();
    let sink = first.clone();
    mgr.start_animation_loop(move |_, time| {
        sink.borrow_mut().get_or_insert(*time);
    })
    .unwrap();
    tick(&mut mgr, FRAME);
    assert_eq!(
        *first.borrow(),
        Some(FrameTime {
            elapsed: FRAME,
            delta: FRAME,
            frame: 1
        })
    );
}

#[test]
fn update_callback_moves_content_before_render() {
    let host = MockHost::new(800, 600, 1.0);
    let tracker = ReleaseTracker::default();
    let mut mgr = bare_manager(&host);
    let parent = TrackedNode::new("parent", &tracker).with_child(TrackedNode::new("child", &tracker));
    let id = mgr.add_content(parent.boxed()).unwrap();

    mgr.start_animation_loop(move |scene, time| {
        if let Some(node) = scene.get_mut(id) {
            node.apply_transform(&mut |inst| inst.position.x = time.frame as f32);
        }
    })
    .unwrap();
    tick(&mut mgr, FRAME);
    tick(&mut mgr, FRAME);

    let parent = mgr.scene().get(id).unwrap();
    assert_eq!(parent.get_local_transform(), moved(2.0));
    // world transforms were propagated before rendering
    assert_eq!(parent.get_children()[0].get_world_transform(), moved(2.0));
}

#[test]
fn controller_reconciles_camera_each_tick() {
    let host = MockHost::new(800, 600, 1.0);
    let mut mgr = bare_manager(&host);
    let controller = RecordingController::default();
    mgr.set_controller(Box::new(controller.clone())).unwrap();
    assert!(host.state().listeners.len() == 2);

    let start_y = mgr.camera().position.y;
    mgr.start_animation_loop(|_, _| {}).unwrap();
    for _ in 0..4 {
        tick(&mut mgr, FRAME);
    }

    assert_eq!(controller.log().updates, vec![FRAME; 4]);
    assert_eq!(mgr.camera().position.y, start_y + 4.0);

    mgr.dispose().unwrap();
    assert_eq!(controller.log().releases, 1);
    assert!(!mgr.has_controller());
    assert!(host.state().listeners.is_empty());
}

#[test]
fn replacing_a_controller_releases_the_old_one() {
    let host = MockHost::new(800, 600, 1.0);
    let mut mgr = bare_manager(&host);
    let first = RecordingController::default();
    let second = RecordingController::default();
    mgr.set_controller(Box::new(first.clone())).unwrap();
    mgr.set_controller(Box::new(second.clone())).unwrap();
    assert_eq!(first.log().releases, 1);
    assert_eq!(second.log().releases, 0);

    let detached = mgr.detach_controller().unwrap();
    assert!(detached.is_some());
    assert!(!host.state().listeners.is_subscribed(scene_ngin::host::HostEvent::Input));

    mgr.dispose().unwrap();
    // a detached controller belongs to the caller again
    assert_eq!(second.log().releases, 0);
}

#[test]
fn render_failures_do_not_stop_the_loop() {
    let host = MockHost::new(800, 600, 1.0);
    let mut mgr = bare_manager(&host);
    let calls = Rc::new(RefCell::new(0));
    let counter = calls.clone();
    mgr.start_animation_loop(move |_, _| *counter.borrow_mut() += 1)
        .unwrap();
    tick(&mut mgr, FRAME);

    mgr.renderer_mut().fail_render = true;
    assert!(tick(&mut mgr, FRAME));
    assert!(tick(&mut mgr, FRAME));

    assert_eq!(*calls.borrow(), 3);
    assert_eq!(mgr.renderer().frames.len(), 3);
    assert!(mgr.is_animating());
    assert!(mgr.driver().pending().is_some());
}
