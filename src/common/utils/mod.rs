use std::f32::consts::PI;

pub mod module_update;
pub mod modules;

pub fn linear_decay(curr_frac: f32, start: f32, end: f32, end_frac: f32) -> f32 {
    if curr_frac > end_frac {
        end
    } else {
        start + curr_frac * (end - start) / end_frac
    }
}

pub fn mean(data: &[f32]) -> f32 {
    data.iter().fold(0.0, |acc, x| acc + x) / (data.len() as f32)
}

/// Sample variance (`n - 1` denominator), zero for fewer than two points
pub fn variance(data: &[f32]) -> f32 {
    if data.len() < 2 {
        return 0.0;
    }

    let m = mean(data);
    data.iter().map(|x| (x - m).powi(2)).sum::<f32>() / (data.len() - 1) as f32
}

/// `1 - Var[y - y_pred] / Var[y]`; NaN when `y` has no variance.
///
/// 1 is a perfect value function, 0 is no better than predicting the mean.
pub fn explained_variance(y_pred: &[f32], y_true: &[f32]) -> f32 {
    let var_y = variance(y_true);
    if var_y == 0.0 {
        return f32::NAN;
    }

    let residuals: Vec<f32> = y_true.iter().zip(y_pred).map(|(t, p)| t - p).collect();
    1.0 - variance(&residuals) / var_y
}

/// Wraps an angle into `[-pi, pi)`
pub fn angle_normalise(x: f32) -> f32 {
    (x + PI).rem_euclid(2.0 * PI) - PI
}

#[cfg(test)]
mod test {
    use std::f32::consts::PI;

    use assert_approx_eq::assert_approx_eq;

    use crate::common::utils::{angle_normalise, explained_variance, linear_decay, mean, variance};

    #[test]
    fn test_mean() {
        let v = [0.0, 1.0, 2.0];

        assert_eq!(mean(&v), 1.0);

        let v = [];

        assert!(mean(&v).is_nan());
    }

    #[test]
    fn test_linear_decay() {
        assert_approx_eq!(linear_decay(0.0, 1.0, 0.05, 0.1), 1.0);
        assert_approx_eq!(linear_decay(0.05, 1.0, 0.05, 0.1), 0.525);
        assert_approx_eq!(linear_decay(0.5, 1.0, 0.05, 0.1), 0.05);
    }

    #[test]
    fn test_variance() {
        assert_approx_eq!(variance(&[1.0, 2.0, 3.0, 4.0]), 5.0 / 3.0);
        assert_eq!(variance(&[3.0]), 0.0);
    }

    #[test]
    fn test_explained_variance() {
        let y = [1.0, 2.0, 3.0];

        assert_approx_eq!(explained_variance(&y, &y), 1.0);
        assert_approx_eq!(explained_variance(&[2.0, 2.0, 2.0], &y), 0.0);
        assert!(explained_variance(&y, &[1.0, 1.0, 1.0]).is_nan());
    }

    #[test]
    fn test_angle_normalise() {
        assert_approx_eq!(angle_normalise(0.0), 0.0);
        assert_approx_eq!(angle_normalise(2.0 * PI + 0.5), 0.5, 1e-5);
        assert_approx_eq!(angle_normalise(-0.5 - 2.0 * PI), -0.5, 1e-5);
    }
}
