//! Random draws shared by the population stages.
//!
//! Every stage owns a [`rand::rngs::StdRng`] seeded with a fixed value, so
//! the helpers here take the generator by mutable reference and never
//! touch thread-local state.

use std::f64::consts::PI;

use rand::Rng;

/// Standard normal draw (Box-Muller, cosine branch).
pub fn standard_normal(rng: &mut impl Rng) -> f64 {
    let u1: f64 = rng.gen::<f64>().max(1e-10);
    let u2: f64 = rng.gen();
    (-2.0_f64 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
}

/// Normal draw with the given mean and standard deviation.
pub fn normal(rng: &mut impl Rng, mean: f64, std: f64) -> f64 {
    mean + std * standard_normal(rng)
}

/// Uniform draw in `[lo, hi)`.
pub fn uniform(rng: &mut impl Rng, lo: f64, hi: f64) -> f64 {
    lo + (hi - lo) * rng.gen::<f64>()
}

/// Uniform integer in `lo..=hi`.
pub fn randint(rng: &mut impl Rng, lo: i64, hi: i64) -> i64 {
    rng.gen_range(lo..=hi)
}

/// `ceil(n * r)` for a fresh uniform `r`, the schedule-number draw.
pub fn ceil_draw(rng: &mut impl Rng, n: u32) -> u32 {
    (f64::from(n) * rng.gen::<f64>()).ceil() as u32
}

/// Remove and return a uniformly chosen element.
pub fn take_random<T>(rng: &mut impl Rng, items: &mut Vec<T>) -> Option<T> {
    if items.is_empty() {
        return None;
    }
    let index = rng.gen_range(0..items.len());
    Some(items.remove(index))
}

/// `count` distinct elements of `items` in draw order.
pub fn sample_without_replacement<T: Clone>(rng: &mut impl Rng, items: &[T], count: usize) -> Vec<T> {
    let count = count.min(items.len());
    rand::seq::index::sample(rng, items.len(), count)
        .into_iter()
        .map(|i| items[i].clone())
        .collect()
}

/// Clip a skew draw into `[-max, max]`.
pub fn clip_skew(value: f64, max: f64) -> f64 {
    value.clamp(-max, max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn normal_draws_have_plausible_moments() {
        let mut rng = StdRng::seed_from_u64(7);
        let draws: Vec<f64> = (0..20_000).map(|_| normal(&mut rng, 180.0, 30.0)).collect();
        let mean = draws.iter().sum::<f64>() / draws.len() as f64;
        let var = draws.iter().map(|d| (d - mean).powi(2)).sum::<f64>() / draws.len() as f64;
        assert!((mean - 180.0).abs() < 1.0, "mean {mean}");
        assert!((var.sqrt() - 30.0).abs() < 1.0, "std {}", var.sqrt());
    }

    #[test]
    fn same_seed_same_sequence() {
        let mut a = StdRng::seed_from_u64(3);
        let mut b = StdRng::seed_from_u64(3);
        for _ in 0..50 {
            assert_eq!(randint(&mut a, 0, 5), randint(&mut b, 0, 5));
            assert_eq!(standard_normal(&mut a), standard_normal(&mut b));
        }
    }

    #[test]
    fn sampling_without_replacement_is_distinct() {
        let mut rng = StdRng::seed_from_u64(4);
        let items: Vec<u32> = (0..10).collect();
        let mut picked = sample_without_replacement(&mut rng, &items, 20);
        assert_eq!(picked.len(), 10);
        picked.sort_unstable();
        picked.dedup();
        assert_eq!(picked.len(), 10);

        let mut pool = vec!["a", "b"];
        assert!(take_random(&mut rng, &mut pool).is_some());
        assert!(take_random(&mut rng, &mut pool).is_some());
        assert!(take_random(&mut rng, &mut pool).is_none());
    }

    #[test]
    fn ceil_draw_stays_in_schedule_range() {
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..1000 {
            assert!(ceil_draw(&mut rng, 8) <= 8);
        }
        assert_eq!(clip_skew(9000.0, 8100.0), 8100.0);
        assert_eq!(clip_skew(-9000.0, 8100.0), -8100.0);
    }
}
