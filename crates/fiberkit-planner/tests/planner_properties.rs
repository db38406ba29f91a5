use fiberkit_core::{FiberOrientation, GeometryError, Point2, Rect};
use fiberkit_planner::anchored::{validate, AnchoredParams};
use proptest::prelude::*;

fn safe() -> Rect {
    Rect::new(0.0, 170.0, 20.0, 250.0)
}

fn orientation() -> impl Strategy<Value = FiberOrientation> {
    prop_oneof![
        Just(FiberOrientation::Horizontal),
        Just(FiberOrientation::Vertical)
    ]
}

fn params(
    orientation: FiberOrientation,
    length: f64,
    width: f64,
    spacing: f64,
    start_x: f64,
    start_y: f64,
) -> AnchoredParams {
    AnchoredParams {
        orientation,
        length,
        width,
        spacing,
        start_x,
        start_y,
        origin: Point2::new(safe().x0, safe().y0),
    }
}

proptest! {
    #[test]
    fn valid_geometry_stays_inside_safe_area(
        orientation in orientation(),
        length in 1.0f64..100.0,
        steps in 0usize..60,
        spacing in prop_oneof![Just(0.5f64), Just(1.0), Just(2.0), Just(2.5)],
        start_x in 0.0f64..40.0,
        start_y in 0.0f64..60.0,
    ) {
        let width = steps as f64 * spacing;
        let p = params(orientation, length, width, spacing, start_x, start_y);
        let safe = safe();

        match validate(&p, &safe) {
            Ok(work) => {
                prop_assert!(safe.contains(&work));
                let lines = p.scan_lines();
                prop_assert_eq!(p.line_count(), steps + 1);
                prop_assert_eq!(lines.len(), steps + 1);
                for line in &lines {
                    let start = line.start();
                    let end = line.end();
                    for point in [start, end] {
                        prop_assert!(point.x >= work.x0 - 1e-9 && point.x <= work.x1 + 1e-9);
                        prop_assert!(point.y >= work.y0 - 1e-9 && point.y <= work.y1 + 1e-9);
                    }
                }
            }
            Err(GeometryError::OutOfBounds { work, .. }) => {
                prop_assert!(!safe.contains(&work));
            }
            Err(other) => prop_assert!(false, "unexpected error {:?}", other),
        }
    }

    #[test]
    fn consecutive_lines_alternate_direction(
        orientation in orientation(),
        width in 1.0f64..50.0,
        spacing in 0.5f64..5.0,
    ) {
        let p = params(orientation, 60.0, width, spacing, 0.0, 0.0);
        let lines = p.scan_lines();
        for pair in lines.windows(2) {
            prop_assert_ne!(pair[0].is_forward(), pair[1].is_forward());
        }
    }

    #[test]
    fn oversized_rectangles_are_rejected(
        orientation in orientation(),
        excess in 0.01f64..50.0,
        start_x in 0.0f64..20.0,
    ) {
        // Length axis overflows whichever edge it runs along.
        let room = match orientation {
            FiberOrientation::Horizontal => safe().x1 - start_x,
            FiberOrientation::Vertical => safe().y1 - (safe().y0 + 20.0),
        };
        let p = params(orientation, room + excess, 10.0, 1.0, start_x, 0.0);
        let is_out_of_bounds = matches!(
            validate(&p, &safe()),
            Err(GeometryError::OutOfBounds { .. })
        );
        prop_assert!(is_out_of_bounds);
    }
}
