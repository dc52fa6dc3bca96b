//! Tick/time conversion.
//!
//! The tick rate is fixed per score; only the playback-speed coefficient can
//! change at runtime. A coefficient above 1.0 stretches time (slower
//! playback), below 1.0 compresses it.

use std::time::Duration;

/// Slowest accepted playback-speed coefficient (100x faster than written).
pub const MIN_SPEED: f64 = 0.01;

/// Largest accepted playback-speed coefficient (100x slower than written).
pub const MAX_SPEED: f64 = 100.0;

/// Whether `speed` is a usable playback-speed coefficient.
pub fn is_valid_speed(speed: f64) -> bool {
    (MIN_SPEED..=MAX_SPEED).contains(&speed)
}

/// Converts between score ticks and wall-clock durations.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeMapper {
    ticks_per_second: f64,
    speed: f64,
}

impl TimeMapper {
    /// `ticks_per_second` must be positive; [`Score`](crate::score::Score)
    /// guarantees this for every loaded score.
    pub fn new(ticks_per_second: f64) -> Self {
        Self {
            ticks_per_second,
            speed: 1.0,
        }
    }

    pub fn ticks_per_second(&self) -> f64 {
        self.ticks_per_second
    }

    /// Current playback-speed coefficient.
    pub fn speed(&self) -> f64 {
        self.speed
    }

    pub fn set_speed(&mut self, speed: f64) {
        self.speed = speed;
    }

    /// Wall-clock time covered by `tick` ticks at the current speed.
    ///
    /// Saturates at [`Duration::MAX`].
    pub fn tick_to_time(&self, tick: u64) -> Duration {
        Duration::try_from_secs_f64(tick as f64 * self.speed / self.ticks_per_second)
            .unwrap_or(Duration::MAX)
    }

    /// Number of ticks elapsed after `time`, rounded up.
    pub fn time_to_tick(&self, time: Duration) -> u64 {
        (time.as_secs_f64() * self.ticks_per_second / self.speed).ceil() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tick_to_time() {
        let mapper = TimeMapper::new(480.0);
        assert_eq!(mapper.tick_to_time(0), Duration::ZERO);
        assert_eq!(mapper.tick_to_time(480), Duration::from_secs(1));
        assert_eq!(mapper.tick_to_time(960), Duration::from_secs(2));
        assert_eq!(mapper.tick_to_time(240), Duration::from_millis(500));
    }

    #[test]
    fn test_speed_coefficient_stretches_time() {
        let mut mapper = TimeMapper::new(480.0);
        mapper.set_speed(2.0);
        assert_eq!(mapper.tick_to_time(480), Duration::from_secs(2));
        assert_eq!(mapper.time_to_tick(Duration::from_secs(2)), 480);

        mapper.set_speed(0.5);
        assert_eq!(mapper.tick_to_time(480), Duration::from_millis(500));
    }

    #[test]
    fn test_extreme_speed_saturates() {
        let mut mapper = TimeMapper::new(480.0);
        mapper.set_speed(1e300);
        assert_eq!(mapper.tick_to_time(480), Duration::MAX);
        assert_eq!(mapper.tick_to_time(0), Duration::ZERO);

        mapper.set_speed(1e-300);
        assert_eq!(mapper.time_to_tick(Duration::from_millis(16)), u64::MAX);
    }

    #[test]
    fn test_speed_bounds() {
        assert!(is_valid_speed(1.0));
        assert!(is_valid_speed(MIN_SPEED));
        assert!(is_valid_speed(MAX_SPEED));
        assert!(!is_valid_speed(0.0));
        assert!(!is_valid_speed(-1.0));
        assert!(!is_valid_speed(1e300));
        assert!(!is_valid_speed(1e-300));
        assert!(!is_valid_speed(f64::NAN));
        assert!(!is_valid_speed(f64::INFINITY));
    }

    #[test]
    fn test_time_to_tick_rounds_up() {
        let mapper = TimeMapper::new(480.0);
        assert_eq!(mapper.time_to_tick(Duration::ZERO), 0);
        assert_eq!(mapper.time_to_tick(Duration::from_secs(1)), 480);
        // 1ms is 0.48 ticks
        assert_eq!(mapper.time_to_tick(Duration::from_millis(1)), 1);
        assert_eq!(mapper.time_to_tick(Duration::from_micros(2_500)), 2);
    }

    #[test]
    fn test_mapping_is_monotonic() {
        for &(rate, speed) in &[(480.0, 1.0), (192.0, 0.75), (1000.0, 1.5), (96.0, 3.0)] {
            let mut mapper = TimeMapper::new(rate);
            mapper.set_speed(speed);
            let mut previous = mapper.tick_to_time(0);
            for tick in 1..2_000 {
                let time = mapper.tick_to_time(tick);
                assert!(time > previous, "tick {} at rate {} speed {}", tick, rate, speed);
                previous = time;
            }
        }
    }

    #[test]
    fn test_round_trip_never_undershoots() {
        for &(rate, speed) in &[(480.0, 1.0), (192.0, 0.75), (333.0, 1.1), (96.0, 3.0)] {
            let mut mapper = TimeMapper::new(rate);
            mapper.set_speed(speed);
            for tick in 0..2_000 {
                let back = mapper.time_to_tick(mapper.tick_to_time(tick));
                assert!(back >= tick, "tick {} came back as {}", tick, back);
                assert!(back <= tick + 1, "tick {} came back as {}", tick, back);
            }
        }
    }
}
