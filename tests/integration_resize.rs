use std::cell::RefCell;
use std::rc::Rc;

use shell_wm::bus::{EventName, SubscribeOptions, WmEvent};
use shell_wm::fsm::{FsmEvent, WindowState};
use shell_wm::geometry::{Geometry, Point};
use shell_wm::host::{HeadlessHandles, HostCapabilities, ListenerOwner, PointerEvent};
use shell_wm::resize::ResizeEdge;
use shell_wm::window::{WindowId, WindowSpec};
use shell_wm::{Desktop, DesktopConfig};

type Log = Rc<RefCell<Vec<WmEvent>>>;

fn record(desktop: &Desktop, names: &[EventName]) -> Log {
    let log: Log = Rc::new(RefCell::new(Vec::new()));
    for &name in names {
        let sink = log.clone();
        desktop.bus().subscribe(
            name,
            move |env| {
                sink.borrow_mut().push(env.event.clone());
                Ok(())
            },
            SubscribeOptions::default(),
        );
    }
    log
}

fn desktop() -> (Desktop, HeadlessHandles) {
    let (host, handles) = HostCapabilities::headless();
    let desktop = Desktop::new(DesktopConfig::default(), host).expect("default config is valid");
    (desktop, handles)
}

fn fire_frame(desktop: &mut Desktop, handles: &HeadlessHandles) -> usize {
    match handles.frames.take_pending() {
        Some(_) => desktop.run_frame(),
        None => 0,
    }
}

#[test]
fn bottom_right_resize_scenario() {
    let (mut desk, handles) = desktop();
    let id = desk
        .open_window(WindowSpec::new("pos", Geometry::new(0.0, 0.0, 200.0, 150.0)))
        .unwrap();
    let log = record(
        &desk,
        &[
            EventName::FsmTransition,
            EventName::ResizeStart,
            EventName::Resizing,
            EventName::ResizeEnd,
        ],
    );

    assert!(desk.start_resize_window(&id, ResizeEdge::BottomRight, Point::new(200.0, 150.0)));
    assert_eq!(desk.state(&id), Some(WindowState::Resizing));
    assert!(desk.handle_pointer(PointerEvent::moved(260.0, 210.0)));
    assert_eq!(fire_frame(&mut desk, &handles), 1);
    assert_eq!(
        desk.window(&id).unwrap().geometry,
        Geometry::new(0.0, 0.0, 260.0, 210.0)
    );

    assert!(desk.handle_pointer(PointerEvent::up(260.0, 210.0)));
    assert_eq!(desk.state(&id), Some(WindowState::Active));
    assert_eq!(handles.listeners.total(), 0);

    let events = log.borrow();
    let transitions: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            WmEvent::FsmTransition {
                event,
                from_state,
                to_state,
                ..
            } => Some((*event, *from_state, *to_state)),
            _ => None,
        })
        .collect();
    assert_eq!(
        transitions,
        vec![
            (FsmEvent::ResizeStart, WindowState::Active, WindowState::Resizing),
            (FsmEvent::ResizeEnd, WindowState::Resizing, WindowState::Active),
        ]
    );
    assert!(events.contains(&WmEvent::ResizeEnd {
        id: id.clone(),
        final_width: 260.0,
        final_height: 210.0,
        x: 0.0,
        y: 0.0,
    }));
    assert!(matches!(
        events.iter().find(|e| e.name() == EventName::ResizeStart),
        Some(WmEvent::ResizeStart {
            handle: ResizeEdge::BottomRight,
            ..
        })
    ));
}

#[test]
fn pointer_down_on_corner_handle_starts_resize() {
    let (mut desk, handles) = desktop();
    let id = desk
        .open_window(WindowSpec::new("pos", Geometry::new(10.0, 10.0, 300.0, 200.0)))
        .unwrap();
    assert!(desk.handle_pointer(PointerEvent::down(309.0, 209.0)));
    assert!(desk.is_resizing(&id));
    assert_eq!(
        desk.window(&id).unwrap().resize_handle,
        Some(ResizeEdge::BottomRight)
    );
    assert!(desk.handles(&id).unwrap().visible());
    assert_eq!(handles.listeners.count(ListenerOwner::Resize), 1);

    desk.handle_pointer(PointerEvent::moved(339.0, 229.0));
    desk.handle_pointer(PointerEvent::up(349.0, 239.0));
    assert_eq!(
        desk.window(&id).unwrap().geometry,
        Geometry::new(10.0, 10.0, 340.0, 230.0)
    );
    assert!(!desk.window(&id).unwrap().is_resizing);
}

#[test]
fn top_left_resize_keeps_opposite_corner_and_minimum() {
    let (mut desk, handles) = desktop();
    let id = desk
        .open_window(WindowSpec::new("pos", Geometry::new(0.0, 0.0, 300.0, 300.0)))
        .unwrap();
    assert!(desk.start_resize_window(&id, ResizeEdge::TopLeft, Point::new(0.0, 0.0)));

    for step in 0..40 {
        let p = step as f64 * 10.0 - 50.0;
        desk.handle_pointer(PointerEvent::moved(p, p));
        fire_frame(&mut desk, &handles);
        let g = desk.window(&id).unwrap().geometry;
        assert!(g.width >= 200.0 && g.height >= 150.0, "shrunk below minimum: {g:?}");
        assert_eq!(g.right(), 300.0);
        assert_eq!(g.bottom(), 300.0);
    }
    desk.handle_pointer(PointerEvent::up(500.0, 500.0));
    assert_eq!(
        desk.window(&id).unwrap().geometry,
        Geometry::new(100.0, 150.0, 200.0, 150.0)
    );
}

#[test]
fn moves_between_frames_are_coalesced() {
    let (mut desk, handles) = desktop();
    let id = desk
        .open_window(WindowSpec::new("pos", Geometry::new(0.0, 0.0, 300.0, 300.0)))
        .unwrap();
    let log = record(&desk, &[EventName::Resizing]);
    assert!(desk.start_resize_window(&id, ResizeEdge::Right, Point::new(300.0, 100.0)));
    for x in 301..=320 {
        desk.handle_pointer(PointerEvent::moved(f64::from(x), 100.0));
    }
    assert_eq!(handles.frames.requested(), 1);
    fire_frame(&mut desk, &handles);
    assert_eq!(log.borrow().len(), 1);
    assert_eq!(desk.window(&id).unwrap().geometry.width, 320.0);
    let stats = desk.resize_stats();
    assert_eq!(stats.frames, 1);
    assert_eq!(stats.dropped_samples, 19);
}

#[test]
fn resize_guard_refuses_non_resizable_and_maximized() {
    let (mut desk, handles) = desktop();
    let fixed = desk
        .open_window(
            WindowSpec::new("calc", Geometry::new(0.0, 0.0, 300.0, 300.0)).with_resizable(false),
        )
        .unwrap();
    assert!(!desk.can_resize_window(&fixed));
    assert!(!desk.start_resize_window(&fixed, ResizeEdge::Right, Point::new(300.0, 10.0)));
    // No handles: the corner is plain body.
    assert!(desk.handle_pointer(PointerEvent::down(299.0, 299.0)));
    assert!(!desk.is_resizing(&fixed));

    let big = desk
        .open_window(WindowSpec::new("files", Geometry::new(0.0, 0.0, 300.0, 300.0)))
        .unwrap();
    desk.maximize_window(&big).unwrap();
    assert!(!desk.start_resize_window(&big, ResizeEdge::Right, Point::new(300.0, 10.0)));
    assert_eq!(handles.listeners.attach_calls(), 0);
    assert_eq!(desk.state(&big), Some(WindowState::Maximized));
}

#[test]
fn observed_size_changes_reconcile_store() {
    let (mut desk, handles) = desktop();
    let id = desk
        .open_window(WindowSpec::new("pos", Geometry::new(0.0, 0.0, 300.0, 300.0)))
        .unwrap();
    assert!(handles.observed.is_observed(&id));
    let log = record(&desk, &[EventName::Resized]);

    assert!(desk.on_size_observed(&id, 360.0, 280.0));
    assert_eq!(desk.window(&id).unwrap().geometry.size().width, 360.0);
    assert!(!desk.on_size_observed(&id, 360.0, 280.0));
    // Below the minimum: the store clamps and reports the clamped size.
    assert!(desk.on_size_observed(&id, 50.0, 50.0));
    assert_eq!(
        *log.borrow(),
        vec![
            WmEvent::Resized {
                id: id.clone(),
                width: 360.0,
                height: 280.0,
            },
            WmEvent::Resized {
                id: id.clone(),
                width: 200.0,
                height: 150.0,
            },
        ]
    );
    assert!(!desk.on_size_observed(&WindowId::from("ghost"), 10.0, 10.0));

    desk.close_window(&id).unwrap();
    assert!(!handles.observed.is_observed(&id));
}

#[test]
fn programmatic_resize_publishes_resized() {
    let (mut desk, _) = desktop();
    let id = desk
        .open_window(WindowSpec::new("pos", Geometry::new(0.0, 0.0, 300.0, 300.0)))
        .unwrap();
    let log = record(&desk, &[EventName::Resized]);
    desk.resize_window(&id, 420.0, 100.0).unwrap();
    assert_eq!(
        *log.borrow(),
        vec![WmEvent::Resized {
            id: id.clone(),
            width: 420.0,
            height: 150.0,
        }]
    );
    desk.move_window(&id, -50.0, -20.0).unwrap();
    assert_eq!(log.borrow().len(), 1);
    assert_eq!(
        desk.window(&id).unwrap().geometry,
        Geometry::new(-50.0, -20.0, 420.0, 150.0)
    );
    assert!(desk.resize_window(&WindowId::from("ghost"), 1.0, 1.0).is_err());
}
