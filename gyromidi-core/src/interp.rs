//! Interpolation helpers shared by the pitch, bend, tempo and controller
//! mappings. Every gesture mapping works on angles within a ±90° window.

/// Largest angle of the mapping window, in degrees.
pub const MAX_ANGLE: f32 = 90.0;
/// Breakpoints of the full mapping window.
pub const ANGLE_RANGE: [f32; 2] = [-MAX_ANGLE, MAX_ANGLE];

/// Piecewise-linear interpolation through the breakpoints `(xp[i], fp[i])`.
///
/// `xp` must be increasing. Inputs below the first or above the last
/// breakpoint clamp to the first or last output value.
pub fn interp(x: f32, xp: &[f32], fp: &[f32]) -> f32 {
    let n = xp.len().min(fp.len());
    if n == 0 {
        return 0.0;
    }
    if x <= xp[0] {
        return fp[0];
    }
    for i in 1..n {
        if x <= xp[i] {
            let span = xp[i] - xp[i - 1];
            if span <= 0.0 {
                return fp[i];
            }
            let t = (x - xp[i - 1]) / span;
            return fp[i - 1] + t * (fp[i] - fp[i - 1]);
        }
    }
    fp[n - 1]
}

/// Map an angle in [-90, 90] linearly onto `[lo, hi]`, clamping outside.
pub fn map_angle(angle: f32, lo: f32, hi: f32) -> f32 {
    interp(angle, &ANGLE_RANGE, &[lo, hi])
}

/// Angle of `position` relative to `offset`, sliding `offset` along when
/// the angle would leave the ±90° window. Lets unbounded rotation map onto
/// a bounded window without clipping: turning back immediately moves the
/// output again.
pub fn reframe(position: f32, offset: &mut f32) -> f32 {
    let angle = position - *offset;
    if angle > MAX_ANGLE {
        *offset = position - MAX_ANGLE;
        MAX_ANGLE
    } else if angle < -MAX_ANGLE {
        *offset = position + MAX_ANGLE;
        -MAX_ANGLE
    } else {
        angle
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interp_between_breakpoints() {
        assert_eq!(interp(0.0, &[-90.0, 90.0], &[0.0, 180.0]), 90.0);
        assert_eq!(interp(45.0, &[-90.0, 0.0, 90.0], &[30.0, 120.0, 480.0]), 300.0);
        assert_eq!(interp(-45.0, &[-90.0, 0.0, 90.0], &[30.0, 120.0, 480.0]), 75.0);
    }

    #[test]
    fn interp_clamps_outside_range() {
        assert_eq!(map_angle(-200.0, 0.0, 127.0), 0.0);
        assert_eq!(map_angle(200.0, 0.0, 127.0), 127.0);
    }

    #[test]
    fn interp_empty_breakpoints() {
        assert_eq!(interp(1.0, &[], &[]), 0.0);
    }

    #[test]
    fn reframe_inside_window_keeps_offset() {
        let mut offset = 10.0;
        assert_eq!(reframe(40.0, &mut offset), 30.0);
        assert_eq!(offset, 10.0);
    }

    #[test]
    fn reframe_slides_window() {
        let mut offset = 0.0;
        assert_eq!(reframe(120.0, &mut offset), 90.0);
        assert_eq!(offset, 30.0);
        // Turning back responds immediately
        assert_eq!(reframe(110.0, &mut offset), 80.0);

        assert_eq!(reframe(-100.0, &mut offset), -90.0);
        assert_eq!(offset, -10.0);
    }
}
