use super::*;

const WIDTH: f32 = 1000.0;

fn recognizer() -> GestureRecognizer {
    GestureRecognizer::new(GestureConfig::default(), WIDTH)
}

fn down(x: f32, y: f32, at_ms: u64) -> PointerEvent {
    PointerEvent::Down { x, y, at_ms }
}

fn mv(x: f32, y: f32, at_ms: u64) -> PointerEvent {
    PointerEvent::Move { x, y, at_ms }
}

fn up(x: f32, y: f32, at_ms: u64) -> PointerEvent {
    PointerEvent::Up { x, y, at_ms }
}

fn tap(r: &mut GestureRecognizer, at_ms: u64) -> Option<GestureIntent> {
    assert_eq!(r.handle(down(500.0, 500.0, at_ms)), None);
    r.handle(up(500.0, 500.0, at_ms + 40))
}

fn feed(r: &mut GestureRecognizer, events: &[PointerEvent]) -> Vec<GestureIntent> {
    events.iter().filter_map(|event| r.handle(*event)).collect()
}

#[test]
fn movement_within_threshold_is_a_tap() {
    for (dx, dy) in [(30.0, 0.0), (-30.0, 0.0), (0.0, 30.0), (0.0, -30.0), (21.0, 21.0)] {
        let mut r = recognizer();
        let intents = feed(
            &mut r,
            &[
                down(400.0, 400.0, 1_000),
                mv(400.0 + dx / 2.0, 400.0 + dy / 2.0, 1_010),
                mv(400.0 + dx, 400.0 + dy, 1_020),
                up(400.0 + dx, 400.0 + dy, 1_030),
            ],
        );
        assert_eq!(intents, vec![GestureIntent::SingleTap], "dx={dx} dy={dy}");
    }
}

#[test]
fn release_inside_window_is_double_tap() {
    let mut r = recognizer();
    assert_eq!(tap(&mut r, 1_000), Some(GestureIntent::SingleTap));
    // Second release lands 299ms after the first.
    assert_eq!(tap(&mut r, 1_299), Some(GestureIntent::DoubleTap));
}

#[test]
fn release_at_or_past_window_is_single_tap() {
    let mut r = recognizer();
    assert_eq!(tap(&mut r, 1_000), Some(GestureIntent::SingleTap));
    assert_eq!(tap(&mut r, 1_300), Some(GestureIntent::SingleTap));
    assert_eq!(tap(&mut r, 5_000), Some(GestureIntent::SingleTap));
}

#[test]
fn simultaneous_release_is_not_a_double_tap() {
    let mut r = recognizer();
    assert_eq!(
        feed(&mut r, &[down(1.0, 1.0, 10), up(1.0, 1.0, 50)]),
        vec![GestureIntent::SingleTap]
    );
    assert_eq!(
        feed(&mut r, &[down(1.0, 1.0, 50), up(1.0, 1.0, 50)]),
        vec![GestureIntent::SingleTap]
    );
}

#[test]
fn rapid_taps_report_single_then_double() {
    let mut r = recognizer();
    let first = tap(&mut r, 2_000);
    let second = tap(&mut r, 2_150);
    assert_eq!(
        (first, second),
        (Some(GestureIntent::SingleTap), Some(GestureIntent::DoubleTap))
    );
}

#[test]
fn horizontal_drag_reports_total_travel() {
    let mut r = recognizer();
    let intents = feed(
        &mut r,
        &[
            down(100.0, 300.0, 0),
            mv(120.0, 302.0, 16),
            mv(160.0, 305.0, 32),
            up(160.0, 305.0, 48),
        ],
    );
    assert_eq!(
        intents,
        vec![GestureIntent::HorizontalDrag { delta_pixels: 60.0 }]
    );
}

#[test]
fn drag_is_never_reported_as_tap() {
    let mut r = recognizer();
    assert_eq!(tap(&mut r, 1_000), Some(GestureIntent::SingleTap));
    let intents = feed(
        &mut r,
        &[
            down(100.0, 100.0, 1_100),
            mv(200.0, 100.0, 1_120),
            up(200.0, 100.0, 1_150),
        ],
    );
    assert!(intents
        .iter()
        .all(|i| matches!(i, GestureIntent::HorizontalDrag { .. })));
    assert!(!r.is_dragging());
}

#[test]
fn seek_emissions_are_throttled_but_travel_accumulates() {
    let mut r = recognizer();
    let mut events = vec![down(0.0, 0.0, 0)];
    // 10px every 10ms for one second.
    for step in 1..=100u64 {
        events.push(mv(step as f32 * 10.0, 0.0, step * 10));
    }
    let intents = feed(&mut r, &events);

    let emitted: Vec<f32> = intents
        .iter()
        .map(|intent| match intent {
            GestureIntent::HorizontalDrag { delta_pixels } => *delta_pixels,
            other => panic!("unexpected intent {other:?}"),
        })
        .collect();
    // First emission at 40px (t=40ms), then one per >200ms window.
    assert_eq!(emitted, vec![40.0, 250.0, 460.0, 670.0, 880.0]);
}

#[test]
fn at_most_one_seek_per_throttle_window() {
    let mut r = recognizer();
    let mut events = vec![down(0.0, 0.0, 0)];
    for step in 1..=300u64 {
        events.push(mv(step as f32 * 2.0, 0.0, step * 3));
    }
    let mut last_emit: Option<u64> = None;
    for event in events {
        let at = match event {
            PointerEvent::Move { at_ms, .. } => at_ms,
            _ => 0,
        };
        if let Some(GestureIntent::HorizontalDrag { .. }) = r.handle(event) {
            if let Some(previous) = last_emit {
                assert!(at - previous > 200, "emitted at {previous} and {at}");
            }
            last_emit = Some(at);
        }
    }
    assert!(last_emit.is_some());
}

#[test]
fn vertical_drag_reports_side_of_press() {
    let mut left = recognizer();
    let intents = feed(
        &mut left,
        &[down(100.0, 500.0, 0), mv(102.0, 440.0, 20)],
    );
    assert_eq!(
        intents,
        vec![GestureIntent::VerticalDrag {
            delta_pixels: -60.0,
            is_left_half: true
        }]
    );

    let mut right = recognizer();
    let intents = feed(
        &mut right,
        &[down(900.0, 100.0, 0), mv(898.0, 180.0, 20)],
    );
    assert_eq!(
        intents,
        vec![GestureIntent::VerticalDrag {
            delta_pixels: 80.0,
            is_left_half: false
        }]
    );
}

#[test]
fn vertical_emissions_use_shorter_throttle() {
    let mut r = recognizer();
    let intents = feed(
        &mut r,
        &[
            down(800.0, 0.0, 0),
            mv(800.0, 40.0, 10),
            mv(800.0, 50.0, 40),
            mv(800.0, 60.0, 61),
        ],
    );
    assert_eq!(intents.len(), 2);
}

#[test]
fn diagonal_drag_emits_nothing() {
    let mut r = recognizer();
    let intents = feed(
        &mut r,
        &[
            down(500.0, 500.0, 0),
            mv(550.0, 550.0, 20),
            mv(600.0, 590.0, 40),
            up(600.0, 590.0, 60),
        ],
    );
    assert!(intents.is_empty());
}

#[test]
fn moves_without_press_are_ignored() {
    let mut r = recognizer();
    assert_eq!(r.handle(mv(0.0, 0.0, 0)), None);
    assert_eq!(r.handle(mv(500.0, 0.0, 10)), None);
    assert_eq!(r.handle(up(500.0, 0.0, 20)), None);
}

#[test]
fn surface_width_decides_left_half() {
    let mut r = recognizer();
    r.set_surface_width(300.0);
    assert_eq!(r.surface_width(), 300.0);
    let intents = feed(&mut r, &[down(200.0, 0.0, 0), mv(200.0, 100.0, 10)]);
    assert_eq!(
        intents,
        vec![GestureIntent::VerticalDrag {
            delta_pixels: 100.0,
            is_left_half: false
        }]
    );
}

#[test]
fn pointer_events_deserialize_from_trace_lines() {
    let event: PointerEvent =
        serde_json::from_str(r#"{"kind":"move","x":12.5,"y":3.0,"at_ms":40}"#).expect("json");
    assert_eq!(event, mv(12.5, 3.0, 40));
}
