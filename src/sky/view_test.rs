use super::*;

#[test]
fn default_view_matches_constants() {
    let view = ViewState::default();
    assert!((view.width_deg - DEFAULT_FOV_DEG).abs() < f64::EPSILON);
    assert!((view.height_deg - DEFAULT_FOV_DEG).abs() < f64::EPSILON);
    assert_eq!(view.pixels, DEFAULT_PIXELS);
    assert_eq!(view.survey, DEFAULT_SURVEY);
}

#[test]
fn zoom_in_narrows_field_and_sharpens() {
    let mut view = ViewState::default();
    view.zoom_in(&ZoomSettings::default());
    assert!((view.width_deg - 12.5).abs() < 1e-12);
    assert!((view.height_deg - view.width_deg).abs() < f64::EPSILON);
    assert_eq!(view.pixels, 1331);
}

#[test]
fn zoom_out_widens_field_and_floors_pixels() {
    let mut view = ViewState::default();
    view.zoom_out(&ZoomSettings::default());
    assert!((view.width_deg - 32.0).abs() < 1e-12);
    assert_eq!(view.pixels, 787);
}

// The round trip only holds while pixels stay below MAX_PIXELS. From three
// steps on the clamp saturates and the trip lands well short of the start,
// see `zoom_round_trip_is_lossy_once_pixels_clamp`.
#[test]
fn zoom_in_then_out_returns_near_original() {
    let zoom = ZoomSettings::default();
    for steps in 1..=2 {
        let mut view = ViewState::default();
        for _ in 0..steps {
            view.zoom_in(&zoom);
        }
        for _ in 0..steps {
            view.zoom_out(&zoom);
        }
        assert!(view.pixels.abs_diff(DEFAULT_PIXELS) <= steps, "steps={steps} pixels={}", view.pixels);
        assert!((view.width_deg - DEFAULT_FOV_DEG).abs() < 1e-9);
    }
}

#[test]
fn zoom_round_trip_is_lossy_once_pixels_clamp() {
    let zoom = ZoomSettings::default();
    let mut view = ViewState::default();
    for _ in 0..3 {
        view.zoom_in(&zoom);
    }
    assert_eq!(view.pixels, MAX_PIXELS);
    for _ in 0..3 {
        view.zoom_out(&zoom);
    }
    assert_eq!(view.pixels, 931);
    assert!((view.width_deg - DEFAULT_FOV_DEG).abs() < 1e-9);
}

#[test]
fn repeated_zoom_stays_within_bounds() {
    let zoom = ZoomSettings::default();
    let mut view = ViewState::default();
    for _ in 0..30 {
        view.zoom_in(&zoom);
        assert!((MIN_PIXELS..=MAX_PIXELS).contains(&view.pixels));
        assert!(view.width_deg >= MIN_FOV_DEG);
    }
    assert_eq!(view.pixels, MAX_PIXELS);
    assert!((view.width_deg - MIN_FOV_DEG).abs() < f64::EPSILON);

    for _ in 0..30 {
        view.zoom_out(&zoom);
        assert!((MIN_PIXELS..=MAX_PIXELS).contains(&view.pixels));
        assert!(view.width_deg <= MAX_FOV_DEG);
    }
    assert_eq!(view.pixels, MIN_PIXELS);
    assert!((view.width_deg - MAX_FOV_DEG).abs() < f64::EPSILON);
    assert!((view.height_deg - view.width_deg).abs() < f64::EPSILON);
}

#[test]
fn new_clamps_out_of_range_values() {
    let view = ViewState::new(1000.0, 10, "WISE 3.4");
    assert!((view.width_deg - MAX_FOV_DEG).abs() < f64::EPSILON);
    assert_eq!(view.pixels, MIN_PIXELS);
    assert_eq!(view.survey, "WISE 3.4");

    let view = ViewState::new(0.01, 100_000, "DSS");
    assert!((view.width_deg - MIN_FOV_DEG).abs() < f64::EPSILON);
    assert_eq!(view.pixels, MAX_PIXELS);
}

#[test]
fn custom_ratios_are_honoured() {
    let zoom = ZoomSettings { fov_ratio: 2.0, pixel_ratio: 1.5 };
    let mut view = ViewState::default();
    view.zoom_in(&zoom);
    assert!((view.width_deg - 10.0).abs() < 1e-12);
    assert_eq!(view.pixels, 1536);
}
