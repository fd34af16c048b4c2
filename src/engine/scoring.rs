use std::cmp::Ordering;

use crate::models::assignment::CandidateScore;
use crate::models::personnel::Personnel;

pub fn compute_score(personnel: &Personnel, max_concurrency: usize) -> CandidateScore {
    CandidateScore {
        load: personnel.load(),
        capacity: max_concurrency,
        rating: personnel.performance_stats.rating,
    }
}

/// `Less` means `a` is the better candidate: lowest load, then highest rating, then
/// lexicographically earliest id.
pub fn compare_candidates(a: &Personnel, b: &Personnel) -> Ordering {
    a.load()
        .cmp(&b.load())
        .then_with(|| {
            b.performance_stats
                .rating
                .total_cmp(&a.performance_stats.rating)
        })
        .then_with(|| a.id.cmp(&b.id))
}

pub fn select_best<'a, I>(candidates: I) -> Option<&'a Personnel>
where
    I: IntoIterator<Item = &'a Personnel>,
{
    candidates
        .into_iter()
        .min_by(|a, b| compare_candidates(a, b))
}

pub fn utilization(load: usize, capacity: usize) -> f64 {
    if capacity == 0 {
        return 0.0;
    }

    (load as f64 / capacity as f64).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use chrono::Utc;
    use uuid::Uuid;

    use super::{compute_score, select_best, utilization};
    use crate::models::order::ActorRole;
    use crate::models::personnel::{Availability, PerformanceStats, Personnel};

    fn picker(id: &str, load: usize, rating: f64) -> Personnel {
        Personnel {
            id: id.to_string(),
            name: "test-picker".to_string(),
            role: ActorRole::Picker,
            availability: Availability::Available,
            active_order_ids: (0..load).map(|_| Uuid::new_v4()).collect::<BTreeSet<_>>(),
            performance_stats: PerformanceStats {
                rating,
                completed_count: 0,
            },
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn lowest_load_wins() {
        let pickers = [picker("p2", 2, 5.0), picker("p0", 0, 3.0), picker("p1", 1, 4.0)];

        let best = select_best(&pickers).unwrap();
        assert_eq!(best.id, "p0");
    }

    #[test]
    fn rating_breaks_load_ties() {
        let pickers = [picker("a", 1, 4.1), picker("b", 1, 4.9)];

        assert_eq!(select_best(&pickers).unwrap().id, "b");
    }

    #[test]
    fn id_breaks_full_ties() {
        let pickers = [picker("p9", 0, 4.5), picker("p3", 0, 4.5), picker("p5", 0, 4.5)];

        assert_eq!(select_best(&pickers).unwrap().id, "p3");
    }

    #[test]
    fn empty_candidate_set_selects_nobody() {
        let none: [Personnel; 0] = [];
        assert!(select_best(&none).is_none());
    }

    #[test]
    fn score_reports_load_and_capacity() {
        let score = compute_score(&picker("p1", 2, 4.0), 3);
        assert_eq!(score.load, 2);
        assert_eq!(score.capacity, 3);
        assert!((utilization(score.load, score.capacity) - 2.0 / 3.0).abs() < 1e-9);
        assert_eq!(utilization(1, 0), 0.0);
    }
}
