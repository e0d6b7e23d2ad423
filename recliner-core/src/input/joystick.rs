//! Joystick direction angle
//!
//! Joystick sampling and calibration belong to the input board. This is only
//! the deflection-to-angle conversion both boards must agree on.

use micromath::F32Ext;

/// Angle of the deflection `(x, y)` in degrees, `atan(y / x)`
///
/// The result lies in [-90, 90]. On the vertical axis (`x == 0`) it is +90
/// for positive `y`, -90 for negative `y` and 0 at the center.
pub fn direction_angle_deg(x: i16, y: i16) -> f32 {
    if x == 0 {
        return match y {
            0 => 0.0,
            y if y > 0 => 90.0,
            _ => -90.0,
        };
    }
    let ratio = y as f32 / x as f32;
    ratio.atan().to_degrees()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < 0.5
    }

    #[test]
    fn test_vertical_axis() {
        assert_eq!(direction_angle_deg(0, 100), 90.0);
        assert_eq!(direction_angle_deg(0, -3), -90.0);
        assert_eq!(direction_angle_deg(0, 0), 0.0);
    }

    #[test]
    fn test_diagonals() {
        assert!(close(direction_angle_deg(100, 100), 45.0));
        assert!(close(direction_angle_deg(100, -100), -45.0));
        assert!(close(direction_angle_deg(-100, 100), -45.0));
    }

    #[test]
    fn test_horizontal_axis() {
        assert!(close(direction_angle_deg(512, 0), 0.0));
        assert!(close(direction_angle_deg(-512, 0), 0.0));
    }

    #[test]
    fn test_near_vertical_is_bounded() {
        let angle = direction_angle_deg(1, i16::MAX);
        assert!(close(angle, 90.0));
    }
}
