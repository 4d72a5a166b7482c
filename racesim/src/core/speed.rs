use crate::core::network::NetworkSample;

/// speed converts a network reading into a normalized speed in [0, 100]. Ping, download and
/// upload each contribute a sub-score capped at 100, the speed is their average.
pub fn speed(sample: &NetworkSample) -> f64 {
    let ping_score = (100.0 - sample.ping).max(0.0);
    let download_score = (sample.download * 2.0).min(100.0);
    let upload_score = (sample.upload * 4.0).min(100.0);

    (ping_score + download_score + upload_score) / 3.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn saturated_sample_gives_full_speed() {
        assert_relative_eq!(speed(&NetworkSample::new(0.0, 100.0, 100.0)), 100.0);
    }

    #[test]
    fn disconnect_sentinel_gives_zero_speed() {
        assert_relative_eq!(speed(&NetworkSample::DISCONNECTED), 0.0);
    }

    #[test]
    fn sub_scores_are_averaged() {
        // 90 + 100 (capped) + 100 (capped)
        assert_relative_eq!(speed(&NetworkSample::new(10.0, 100.0, 50.0)), 290.0 / 3.0);
        // 50 + 40 + 40
        assert_relative_eq!(speed(&NetworkSample::new(50.0, 20.0, 10.0)), 130.0 / 3.0);
    }

    #[test]
    fn speed_stays_in_bounds_over_the_sampling_ranges() {
        for ping in (0..=1000).step_by(25) {
            for download in (0..=200).step_by(10) {
                for upload in (0..=100).step_by(5) {
                    let v = speed(&NetworkSample::new(
                        ping as f64,
                        download as f64,
                        upload as f64,
                    ));
                    assert!((0.0..=100.0).contains(&v), "speed {} out of bounds", v);
                }
            }
        }
    }
}
