use std::time::Duration;

pub fn to_millis(duration: Duration) -> u64 {
    (duration.as_secs() * 1_000) + (duration.subsec_nanos() / 1_000_000) as u64
}

pub fn to_minutes(duration: Duration) -> f64 {
    duration.as_secs() as f64 / 60.0 + duration.subsec_nanos() as f64 / 60_000_000_000.0
}

/// Gradient of the logistic BPR loss with respect to the score margin, 1 / (1 + e^x).
#[inline(always)]
pub fn bpr_gradient(x_uij: f32) -> f32 {
    1.0 / (1.0 + x_uij.exp())
}


#[cfg(test)]
mod tests {

    use std::time::Duration;
    use crate::utils;

    #[test]
    fn durations() {
        assert_eq!(utils::to_millis(Duration::new(2, 5_000_000)), 2_005);
        assert!((utils::to_minutes(Duration::from_secs(90)) - 1.5).abs() < 1e-9);
    }

    #[test]
    fn gradient_is_logistic_of_negative_margin() {
        assert!((utils::bpr_gradient(0.0) - 0.5).abs() < 1e-6);
        assert!(utils::bpr_gradient(20.0) < 1e-6);
        assert!((utils::bpr_gradient(-20.0) - 1.0).abs() < 1e-6);
    }
}
