//! Pure calculation functions for thumbnail geometry.
//!
//! All functions here are pure and testable without any I/O or images.

/// Scale factor that fits `source` inside a `target` box.
///
/// The horizontal factor wins whenever it keeps the scaled height within the
/// box, otherwise the vertical factor is used. For a source that is wider
/// than the box aspect this is the usual fit-inside scale; for a taller one
/// it is the vertical factor.
///
/// # Examples
/// ```
/// # use nb_gallery::imaging::fit_scale;
/// // 800x600 into 400x280: width factor 0.5 would give 300px height → height wins
/// assert_eq!(fit_scale((800, 600), (400, 280)), 280.0 / 600.0);
///
/// // 800x200 into 400x280: width factor 0.5 keeps 100px height → width wins
/// assert_eq!(fit_scale((800, 200), (400, 280)), 0.5);
/// ```
pub fn fit_scale(source: (u32, u32), target: (u32, u32)) -> f64 {
    let (src_w, src_h) = (source.0 as f64, source.1 as f64);
    let (tgt_w, tgt_h) = (target.0 as f64, target.1 as f64);

    let scale_w = tgt_w / src_w;
    let scale_h = tgt_h / src_h;

    if src_h * scale_w <= tgt_h {
        scale_w
    } else {
        scale_h
    }
}

/// Dimensions of `source` after applying `scale`, rounded to whole pixels.
///
/// Never returns a zero edge so that extremely thin images still produce a
/// visible stripe.
pub fn scaled_dimensions(source: (u32, u32), scale: f64) -> (u32, u32) {
    let w = (source.0 as f64 * scale).round().max(1.0) as u32;
    let h = (source.1 as f64 * scale).round().max(1.0) as u32;
    (w, h)
}

/// Top-left offset that centers an `inner` rectangle on an `outer` canvas.
///
/// Offsets are negative when the inner rectangle is larger (it is then
/// clipped symmetrically).
pub fn centered_offset(inner: (u32, u32), outer: (u32, u32)) -> (i64, i64) {
    (
        (outer.0 as i64 - inner.0 as i64).div_euclid(2),
        (outer.1 as i64 - inner.1 as i64).div_euclid(2),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    // =========================================================================
    // fit_scale tests
    // =========================================================================

    #[test]
    fn wide_source_uses_horizontal_factor() {
        // 1000x100 → 400x280: 0.4 keeps height at 40
        assert_eq!(fit_scale((1000, 100), (400, 280)), 0.4);
    }

    #[test]
    fn tall_source_uses_vertical_factor() {
        // 100x1000 → 400x280: width factor 4.0 would give 4000px height
        assert_eq!(fit_scale((100, 1000), (400, 280)), 0.28);
    }

    #[test]
    fn same_aspect_uses_horizontal_factor() {
        // 800x560 has the box aspect, both factors are 0.5
        assert_eq!(fit_scale((800, 560), (400, 280)), 0.5);
    }

    #[test]
    fn small_source_scales_up() {
        // 200x100 → 400x280: width factor 2.0 gives 200px height
        assert_eq!(fit_scale((200, 100), (400, 280)), 2.0);
    }

    #[test]
    fn fitted_image_never_exceeds_box() {
        for source in [(640, 480), (480, 640), (1920, 1080), (33, 999), (999, 33)] {
            let scale = fit_scale(source, (400, 280));
            let (w, h) = scaled_dimensions(source, scale);
            assert!(w <= 400 && h <= 280, "{source:?} → {w}x{h}");
        }
    }

    // =========================================================================
    // scaled_dimensions tests
    // =========================================================================

    #[test]
    fn scaled_dimensions_round_to_nearest() {
        // 800x600 at 280/600 → 373.33 x 280
        assert_eq!(scaled_dimensions((800, 600), 280.0 / 600.0), (373, 280));
    }

    #[test]
    fn scaled_dimensions_keep_one_pixel() {
        assert_eq!(scaled_dimensions((4000, 1), 0.1), (400, 1));
    }

    // =========================================================================
    // centered_offset tests
    // =========================================================================

    #[test]
    fn offset_centers_smaller_image() {
        assert_eq!(centered_offset((373, 280), (400, 280)), (13, 0));
        assert_eq!(centered_offset((400, 40), (400, 280)), (0, 120));
    }

    #[test]
    fn offset_is_zero_for_exact_fit() {
        assert_eq!(centered_offset((400, 280), (400, 280)), (0, 0));
    }
}
