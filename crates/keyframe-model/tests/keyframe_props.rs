use framezoom_keyframe_model::keyframe::{validate_keyframes, ZoomKeyframe};
use proptest::prelude::*;

fn window() -> impl Strategy<Value = (f64, f64)> {
    (0.0f64..100.0, 0.001f64..50.0).prop_map(|(start, len)| (start, start + len))
}

proptest! {
    #[test]
    fn well_formed_windows_validate_and_contain_their_bounds(
        (start, end) in window(),
        zooms in (0.1f64..10.0, 0.1f64..10.0),
    ) {
        let kf = ZoomKeyframe::new(start, end, zooms.0, zooms.1, 0.0, 0.0);
        prop_assert!(kf.validate().is_ok());
        prop_assert!(kf.contains(start));
        prop_assert!(kf.contains(end));
        prop_assert_eq!(kf.progress(start), 0.0);
        prop_assert_eq!(kf.progress(end), 1.0);
    }

    #[test]
    fn collapsed_or_reversed_windows_never_validate(
        start in 0.0f64..100.0,
        back in 0.0f64..10.0,
    ) {
        let kf = ZoomKeyframe::new(start, start - back, 1.0, 2.0, 0.0, 0.0);
        prop_assert!(kf.validate().is_err());
        prop_assert!(validate_keyframes(&[kf]).is_err());
    }

    #[test]
    fn overlap_is_symmetric((a0, a1) in window(), (b0, b1) in window()) {
        let a = ZoomKeyframe::new(a0, a1, 1.0, 1.0, 0.0, 0.0);
        let b = ZoomKeyframe::new(b0, b1, 1.0, 1.0, 0.0, 0.0);
        prop_assert_eq!(a.overlaps(&b), b.overlaps(&a));
    }
}
