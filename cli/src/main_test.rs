use super::*;

fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
    Cli::try_parse_from(std::iter::once("cosmoview-cli").chain(args.iter().copied()))
}

#[test]
fn parse_angle_accepts_finite_numbers() {
    assert_eq!(parse_angle("10.5"), Ok(10.5));
    assert_eq!(parse_angle(" -45 "), Ok(-45.0));
}

#[test]
fn parse_angle_rejects_non_finite_and_garbage() {
    assert!(parse_angle("inf").is_err());
    assert!(parse_angle("NaN").is_err());
    assert!(parse_angle("north").is_err());
}

#[test]
fn fetch_by_target_uses_defaults() {
    let cli = parse(&["fetch", "--target", "M51"]).unwrap();
    let Command::Fetch(args) = cli.command else { panic!("expected fetch") };
    let req = args.to_request();

    assert_eq!(req.target.as_deref(), Some("M51"));
    assert_eq!(req.survey, DEFAULT_SURVEY);
    assert!((req.width_deg - 0.4).abs() < f64::EPSILON);
    assert_eq!(req.pixels, 600);
    assert_eq!(req.projection, "Tan");
    assert!(req.overwrite);
    assert!(!req.include_fits);
}

#[test]
fn fetch_by_coordinates_with_flags() {
    let cli = parse(&["fetch", "--ra", "83.8", "--dec", "-5.4", "--no-overwrite", "--fits", "--height", "0.2"]).unwrap();
    let Command::Fetch(args) = cli.command else { panic!("expected fetch") };
    let req = args.to_request();

    assert_eq!(req.ra, Some(83.8));
    assert_eq!(req.dec, Some(-5.4));
    assert_eq!(req.height_deg, Some(0.2));
    assert!(!req.overwrite);
    assert!(req.include_fits);
}

#[test]
fn fetch_rejects_target_with_ra() {
    assert!(parse(&["fetch", "--target", "M51", "--ra", "1", "--dec", "2"]).is_err());
}

#[test]
fn fetch_requires_a_position() {
    assert!(parse(&["fetch"]).is_err());
    assert!(parse(&["fetch", "--ra", "10"]).is_err());
}

#[test]
fn fetch_rejects_infinite_angle() {
    assert!(parse(&["fetch", "--ra", "inf", "--dec", "0"]).is_err());
}

#[test]
fn tile_query_is_clamped_like_the_viewer() {
    let cli = parse(&["tile", "--ra", "10", "--dec", "-20", "--width", "0.1", "--pixels", "5000", "--out", "t.png"])
        .unwrap();
    let Command::Tile(args) = cli.command else { panic!("expected tile") };
    let query = args.to_query();

    assert!((query.width_deg - cosmoview::sky::view::MIN_FOV_DEG).abs() < f64::EPSILON);
    assert_eq!(query.pixels, cosmoview::sky::view::MAX_PIXELS);
    assert_eq!(query.projection, "Car");
    assert_eq!(query.center, RaDec::new(10.0, -20.0));
}
