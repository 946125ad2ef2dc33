//! Contract tests over the public, GPU-free surface of the engine.

use frostpane::{
    BlurConfig, BlurError, BlurRegion, DirtyFlags, DirtyTracker, MAX_ROUNDS, ProgramCache, Px,
    PxRect, build_kernel,
};

fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[test]
fn kernel_profiles_match_their_call_sites() {
    init_logging();

    // Window backgrounds: unit spacing, reduced taps.
    let window = BlurConfig::window_background();
    let kernel = build_kernel(5, window.sigma, window.reduce_taps);
    assert_eq!(kernel.radius(), 3);

    // Desktop backgrounds: 1.5px spacing, full tap list.
    let desktop = BlurConfig::desktop_background();
    let kernel = build_kernel(5, desktop.sigma, desktop.reduce_taps);
    assert_eq!(kernel.radius(), 5);
    assert_eq!(kernel.taps()[1].offset, 1.5);

    // Offscreen effects: low cap, wide spacing.
    let effect = BlurConfig::offscreen_effect();
    assert_eq!(effect.radius_cap, 19);
    let kernel = build_kernel(19, effect.sigma, effect.reduce_taps);
    assert_eq!(kernel.radius(), 10);
}

#[test]
fn region_setters_validate_synchronously() {
    init_logging();

    let programs = ProgramCache::new();
    let mut region = BlurRegion::new(BlurConfig::window_background(), programs.clone());

    region.set_radius(5).expect("radius within cap");
    region.set_rounds(4).expect("rounds within bounds");

    let err = region.set_radius(50).expect_err("cap is 49");
    assert!(matches!(err, BlurError::InvalidParameter { .. }));
    let err = region.set_rounds(MAX_ROUNDS + 1).expect_err("rounds cap");
    assert!(matches!(err, BlurError::InvalidParameter { .. }));

    // Rejected setters left the accepted state alone.
    assert_eq!(region.radius(), 5);
    assert_eq!(region.rounds(), 4);

    // A second region sharing the cache sees the same program sources.
    let sibling = BlurRegion::new(BlurConfig::window_background(), programs);
    assert_eq!(sibling.radius(), 0);
}

#[test]
fn tracker_contract_round_trips() {
    init_logging();

    let mut tracker = DirtyTracker::new();
    assert_eq!(tracker.consume(), DirtyFlags::empty());

    tracker.mark(DirtyFlags::CONTENT);
    tracker.mark(DirtyFlags::PARAMS | DirtyFlags::SIZE);
    let flags = tracker.consume();
    assert!(flags.contains(DirtyFlags::CONTENT));
    assert!(flags.contains(DirtyFlags::PARAMS));
    assert!(flags.contains(DirtyFlags::SIZE));
    assert!(!flags.intersects(DirtyFlags::ENABLED));
    assert_eq!(tracker.consume(), DirtyFlags::empty());
}

#[test]
fn paint_extents_and_geometry_helpers() {
    init_logging();

    let region = BlurRegion::new(BlurConfig::default(), ProgramCache::new());
    let rect = PxRect::new(Px(0), Px(0), Px(640), Px(400));
    let extents = region.paint_extents(rect);
    assert!(extents.width > rect.width);
    assert!(extents.x < rect.x);
}
