//! Integration tests for additive blending through the scheduler
//!
//! These tests verify that:
//! - Retargeting a running property blends instead of jumping
//! - Cancelling keeps the displacement already applied
//! - Relative ("by") animations stack on queued targets
//! - Springs, evaluators and paths all feed the same accumulator

use std::cell::Cell;
use std::rc::Rc;

use additive_animation::{
    AdditiveAnimator, AnimationScheduler, AnimatorConfig, Easing, RepeatMode,
    ShortestAngleEvaluator,
};
use additive_core::{ClosureProperty, Path, PropertyRef};

struct View {
    x: Cell<f32>,
    y: Cell<f32>,
    rotation: Cell<f32>,
}

impl View {
    fn at(x: f32) -> Rc<Self> {
        Rc::new(Self {
            x: Cell::new(x),
            y: Cell::new(0.0),
            rotation: Cell::new(0.0),
        })
    }
}

fn x() -> PropertyRef<View> {
    ClosureProperty::shared("x", |v: &View| v.x.get(), |v: &View, value| v.x.set(value))
}

fn y() -> PropertyRef<View> {
    ClosureProperty::shared("y", |v: &View| v.y.get(), |v: &View, value| v.y.set(value))
}

fn rotation() -> PropertyRef<View> {
    ClosureProperty::shared(
        "rotation",
        |v: &View| v.rotation.get(),
        |v: &View, value| v.rotation.set(value),
    )
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("additive_animation=trace")
        .with_test_writer()
        .try_init();
}

fn linear(view: &Rc<View>, duration_ms: u64) -> AdditiveAnimator<View> {
    AdditiveAnimator::new()
        .target(view.clone())
        .set_duration(duration_ms)
        .set_easing(Easing::Linear)
}

#[test]
fn test_retarget_blends_with_running_animation() {
    init_tracing();
    let view = View::at(0.0);
    let mut scheduler = AnimationScheduler::new();

    scheduler.start(linear(&view, 100).property(x(), 100.0)).unwrap();
    scheduler.tick(25);
    assert_eq!(view.x.get(), 25.0);

    // Starts from the first animation's target, not from the live value
    scheduler.start(linear(&view, 100).property(x(), 200.0)).unwrap();
    assert_eq!(scheduler.last_target_value(&view, "x"), Some(200.0));

    scheduler.tick(25);
    // first: 25 -> 50, second: 100 -> 125
    assert_eq!(view.x.get(), 75.0);

    scheduler.tick(75);
    assert_eq!(view.x.get(), 200.0);
    assert!(!scheduler.has_active_animations());
    assert_eq!(scheduler.contribution_count(&view), 0);
}

#[test]
fn test_cancelled_property_restarts_from_live_value() {
    init_tracing();
    let view = View::at(0.0);
    let mut scheduler = AnimationScheduler::new();

    scheduler.start(linear(&view, 100).property(x(), 100.0)).unwrap();
    scheduler.tick(25);
    scheduler.cancel_property(&view, "x");
    assert_eq!(view.x.get(), 25.0);
    assert_eq!(scheduler.last_target_value(&view, "x"), None);

    scheduler.start(linear(&view, 100).property(x(), 0.0)).unwrap();
    scheduler.tick(50);
    assert_eq!(view.x.get(), 12.5);
    scheduler.tick(50);
    assert_eq!(view.x.get(), 0.0);
}

#[test]
fn test_by_animations_stack() {
    init_tracing();
    let view = View::at(0.0);
    let mut scheduler = AnimationScheduler::new();

    scheduler.start(linear(&view, 100).property_by(x(), 10.0)).unwrap();
    scheduler.start(linear(&view, 100).property_by(x(), 10.0)).unwrap();
    assert_eq!(scheduler.queued_target_value(&view, "x"), Some(20.0));

    scheduler.tick(100);
    assert_eq!(view.x.get(), 20.0);
}

#[test]
fn test_switch_duration_runs_alongside_earlier_animations() {
    init_tracing();
    let view = View::at(0.0);
    let mut scheduler = AnimationScheduler::new();

    scheduler
        .start(
            linear(&view, 200)
                .property(x(), 100.0)
                .switch_duration(100)
                .property(y(), 100.0),
        )
        .unwrap();

    scheduler.tick(100);
    assert_eq!(view.x.get(), 50.0);
    assert_eq!(view.y.get(), 100.0);

    scheduler.tick(100);
    assert_eq!(view.x.get(), 100.0);
    assert!(!scheduler.has_active_animations());
}

#[test]
fn test_independent_properties_do_not_interfere() {
    init_tracing();
    let view = View::at(0.0);
    let mut scheduler = AnimationScheduler::new();

    scheduler
        .start(
            linear(&view, 100)
                .property(x(), 100.0)
                .property(y(), -100.0),
        )
        .unwrap();
    scheduler.start(linear(&view, 50).property(x(), 0.0)).unwrap();

    scheduler.tick(50);
    // x: +50 from the first, 100 -> 0 from the second
    assert_eq!(view.x.get(), -50.0);
    assert_eq!(view.y.get(), -50.0);

    scheduler.tick(50);
    assert_eq!(view.x.get(), 0.0);
    assert_eq!(view.y.get(), -100.0);
}

#[test]
fn test_spring_ends_close_to_target() {
    init_tracing();
    let view = View::at(0.0);
    let mut scheduler = AnimationScheduler::new();

    let animator = AdditiveAnimator::new()
        .target(view.clone())
        .set_spring(100.0, 1.0)
        .property(x(), 100.0);
    assert_eq!(animator.effective_duration_ms(), 1015);
    scheduler.start(animator).unwrap();

    let mut frames = 0;
    while scheduler.has_active_animations() {
        scheduler.tick(16);
        frames += 1;
        assert!(frames < 100, "spring never finished");
    }
    assert!((view.x.get() - 100.0).abs() < 1.0);
}

#[test]
fn test_spring_ends_within_threshold_in_every_regime() {
    init_tracing();
    for &damping_ratio in &[0.2f32, 1.0, 2.5] {
        for &stiffness in &[50.0f32, 200.0, 800.0] {
            let view = View::at(0.0);
            let mut scheduler = AnimationScheduler::new();
            scheduler
                .start(
                    AdditiveAnimator::new()
                        .target(view.clone())
                        .set_spring(stiffness, damping_ratio)
                        .property(x(), 100.0),
                )
                .unwrap();

            let mut frames = 0;
            while scheduler.has_active_animations() {
                scheduler.tick(16);
                frames += 1;
                assert!(frames < 1000, "spring never finished");
            }
            let remaining = (view.x.get() - 100.0).abs();
            // 0.001 of the travel distance
            assert!(
                remaining < 0.1 + 1e-4,
                "damping_ratio={damping_ratio} stiffness={stiffness} remaining={remaining}"
            );
        }
    }
}

#[test]
fn test_invalid_spring_fails_on_start() {
    let view = View::at(0.0);
    let mut scheduler = AnimationScheduler::new();
    let animator = AdditiveAnimator::new()
        .target(view)
        .set_spring(-1.0, 1.0)
        .property(x(), 1.0);
    assert!(scheduler.start(animator).is_err());
    assert_eq!(scheduler.running_count(), 0);
}

#[test]
fn test_rotation_takes_shortest_arc() {
    init_tracing();
    let view = View::at(0.0);
    view.rotation.set(350.0);
    let mut scheduler = AnimationScheduler::new();

    scheduler
        .start(linear(&view, 100).property_with_evaluator(
            rotation(),
            10.0,
            Rc::new(ShortestAngleEvaluator),
        ))
        .unwrap();
    scheduler.tick(50);
    assert_eq!(view.rotation.get(), 360.0);
    scheduler.tick(50);
    assert_eq!(view.rotation.get(), 370.0);
}

#[test]
fn test_path_drives_position_and_rotation() {
    init_tracing();
    let view = View::at(0.0);
    let path = Rc::new(
        Path::builder()
            .move_to(0.0, 0.0)
            .line_to(100.0, 0.0)
            .line_to(100.0, 100.0)
            .build(),
    );
    let mut scheduler = AnimationScheduler::new();

    scheduler
        .start(linear(&view, 100).animate_along_path(Some(x()), Some(y()), Some(rotation()), path))
        .unwrap();

    scheduler.tick(25);
    assert!((view.x.get() - 50.0).abs() < 1e-3);
    assert!(view.y.get().abs() < 1e-3);
    assert!(view.rotation.get().abs() < 1e-3);

    scheduler.tick(75);
    assert!((view.x.get() - 100.0).abs() < 1e-3);
    assert!((view.y.get() - 100.0).abs() < 1e-3);
    assert!((view.rotation.get() - 90.0).abs() < 1e-3);
}

#[test]
fn test_scheduler_config_sets_animator_defaults() {
    let config = AnimatorConfig::from_toml_str(
        "default_duration_ms = 200\ndefault_easing = \"linear\"\n",
    )
    .unwrap();
    let view = View::at(0.0);
    let mut scheduler = AnimationScheduler::with_config(config);

    let animator = scheduler.animator().target(view.clone()).property(x(), 100.0);
    assert_eq!(animator.effective_duration_ms(), 200);
    scheduler.start(animator).unwrap();

    scheduler.tick(100);
    assert_eq!(view.x.get(), 50.0);
}

#[test]
fn test_repeat_reverse_returns_to_start() {
    init_tracing();
    let view = View::at(0.0);
    let mut scheduler = AnimationScheduler::new();

    let animator = linear(&view, 100)
        .set_repeat_count(1)
        .set_repeat_mode(RepeatMode::Reverse)
        .property(x(), 100.0);
    assert_eq!(animator.total_duration_in_sequence(), 200);
    scheduler.start(animator).unwrap();

    scheduler.tick(100);
    assert_eq!(view.x.get(), 100.0);
    scheduler.tick(50);
    assert_eq!(view.x.get(), 50.0);
    scheduler.tick(50);
    assert_eq!(view.x.get(), 0.0);
    assert!(!scheduler.has_active_animations());
}
