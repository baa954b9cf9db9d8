//! Property-style tests over whole trajectories.
//!
//! Tracks are generated deterministically so failures reproduce.
//!
//! Run with: `cargo test --test trajectory_properties`

use trajectory_engine::{
    build_trajectory, distance_meters, range_stats, BuiltTrajectory, GpsPoint, Sample, TimeRange,
    Trajectory, TrajectoryError,
};

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Small linear congruential generator for reproducible jitter.
struct Lcg(u64);

impl Lcg {
    fn next_f64(&mut self) -> f64 {
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        (self.0 >> 11) as f64 / (1u64 << 53) as f64
    }
}

/// Zig-zag track with irregular gaps, shuffled file order and a few duplicates.
fn jittered_track(seed: u64, n: usize) -> Vec<Sample> {
    let mut rng = Lcg(seed);
    let mut t = 1_700_000_000_000i64;
    let mut samples: Vec<Sample> = (0..n)
        .map(|i| {
            // Some repeated timestamps
            if i % 7 != 3 {
                t += 500 + (rng.next_f64() * 20_000.0) as i64;
            }
            let lat = 35.0 + i as f64 * 0.0005 + rng.next_f64() * 0.0002;
            let lon = 139.0 + (i % 5) as f64 * 0.0004 + rng.next_f64() * 0.0002;
            Sample::timed(lat, lon, t)
        })
        .collect();

    // Reverse blocks so file order is not time order
    for chunk in samples.chunks_mut(4) {
        chunk.reverse();
    }
    samples
}

fn timed(samples: Vec<Sample>) -> Trajectory {
    match build_trajectory(samples) {
        Ok(BuiltTrajectory::Timed(t)) => t,
        other => panic!("expected timed trajectory, got {:?}", other.map(|b| b.is_timed())),
    }
}

#[test]
fn test_distance_symmetry_and_identity() {
    init();
    let mut rng = Lcg(7);
    for _ in 0..200 {
        let a = (rng.next_f64() * 180.0 - 90.0, rng.next_f64() * 360.0 - 180.0);
        let b = (rng.next_f64() * 180.0 - 90.0, rng.next_f64() * 360.0 - 180.0);
        let ab = distance_meters(a.0, a.1, b.0, b.1);
        let ba = distance_meters(b.0, b.1, a.0, a.1);
        assert!((ab - ba).abs() < 1e-6, "{ab} vs {ba}");
        assert_eq!(distance_meters(a.0, a.1, a.0, a.1), 0.0);
    }
}

#[test]
fn test_time_index_is_sorted() {
    init();
    for seed in 1..20 {
        let traj = timed(jittered_track(seed, 60));
        let times = traj.time_index().times();
        assert!(times.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(times.len(), traj.time_index().indices().len());
    }
}

#[test]
fn test_known_timestamps_are_exact() {
    init();
    let samples = jittered_track(3, 40);
    let traj = timed(samples.clone());
    let index = traj.time_index();
    let first = index.times()[0];
    for (k, (&t, &i)) in index.times().iter().zip(index.indices()).enumerate() {
        // Duplicates resolve to the first of the run at the start, the last elsewhere
        let is_last_of_run = index.times().get(k + 1) != Some(&t);
        let resolves_here = if t == first { k == 0 } else { is_last_of_run };
        if resolves_here {
            assert_eq!(traj.position_at_time(t), samples[i].point, "at t={t}");
        }
    }
}

#[test]
fn test_midpoint_is_linear_combination() {
    init();
    let traj = timed(jittered_track(11, 30));
    let samples: Vec<(i64, GpsPoint)> = traj.timed_samples().collect();
    for w in samples.windows(2) {
        let ((t0, p0), (t1, p1)) = (w[0], w[1]);
        if t1 - t0 < 2 || (t1 - t0) % 2 != 0 {
            continue;
        }
        let mid = traj.position_at_time(t0 + (t1 - t0) / 2);
        assert_eq!(mid, p0.lerp(&p1, 0.5));
    }
}

#[test]
fn test_partition_additivity() {
    init();
    for seed in 1..10 {
        let traj = timed(jittered_track(seed, 50));
        let bounds = traj.time_bounds();
        let full = range_stats(&traj, bounds);
        for frac in [0.1, 0.33, 0.5, 0.9] {
            let split = bounds.start + (bounds.duration_ms() as f64 * frac) as i64;
            let left = range_stats(&traj, TimeRange::new(bounds.start, split));
            let right = range_stats(&traj, TimeRange::new(split, bounds.end));
            assert_eq!(full.duration_ms, left.duration_ms + right.duration_ms);
            let sum = left.distance_meters + right.distance_meters;
            assert!(
                (full.distance_meters - sum).abs() < 1e-3,
                "seed {seed} split {frac}: {} vs {}",
                full.distance_meters,
                sum
            );
        }
    }
}

#[test]
fn test_extract_range_idempotent() {
    init();
    let traj = timed(jittered_track(5, 50));
    let bounds = traj.time_bounds();
    let range = TimeRange::new(bounds.start + 10_000, bounds.end - 10_000);
    let a: Vec<GpsPoint> = traj.extract_range(range).collect();
    let b: Vec<GpsPoint> = traj.extract_range(range).collect();
    assert_eq!(a, b);
    assert!(a.len() >= 2);
}

#[test]
fn test_two_point_stats_scenario() {
    init();
    let traj = timed(vec![
        Sample::timed(35.0, 139.0, 0),
        Sample::timed(35.0, 139.1, 10_000),
    ]);
    let stats = range_stats(&traj, TimeRange::new(0, 10_000));
    assert_eq!(stats.duration_ms, 10_000);

    let haversine = distance_meters(35.0, 139.0, 35.0, 139.1);
    assert!((stats.distance_meters - haversine).abs() < 1e-6);
    assert!(stats.distance_meters > 9_050.0 && stats.distance_meters < 9_150.0);

    let knots = stats.avg_speed_knots.unwrap();
    let expected = (haversine / 1852.0) / (10_000.0 / 3_600_000.0);
    assert!((knots - expected).abs() < 1e-9);
}

#[test]
fn test_untimed_scenario() {
    init();
    let samples = vec![
        Sample::untimed(35.2, 139.2),
        Sample::untimed(35.0, 139.0),
        Sample::untimed(35.1, 139.1),
    ];
    let built = build_trajectory(samples.clone()).unwrap();
    assert!(matches!(built, BuiltTrajectory::Untimed(_)));
    assert!(matches!(
        built.position_at_time(0),
        Err(TrajectoryError::Untimed { .. })
    ));
    let path = built.extract_range(None).unwrap();
    let expected: Vec<GpsPoint> = samples.iter().map(|s| s.point).collect();
    assert_eq!(path, expected);
}
