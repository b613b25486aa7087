//! Performance Scorer: three weighted components folded into a 0-100
//! integer score. See `spec.md` §4.9.

use crate::agent::Metrics;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rating {
    Excellent,
    Good,
    Satisfactory,
    Fair,
    Poor,
    Critical,
}

pub fn rating_for(score: u32) -> Rating {
    match score {
        s if s >= 90 => Rating::Excellent,
        s if s >= 80 => Rating::Good,
        s if s >= 70 => Rating::Satisfactory,
        s if s >= 60 => Rating::Fair,
        s if s >= 40 => Rating::Poor,
        _ => Rating::Critical,
    }
}

fn success_component(m: &Metrics) -> f64 {
    let total = m.tasks_completed + m.tasks_failed;
    if total == 0 {
        1.0
    } else {
        m.tasks_completed as f64 / total as f64
    }
}

fn responsiveness_component(m: &Metrics) -> f64 {
    let total = m.tasks_completed + m.tasks_failed;
    if total == 0 {
        // spec.md §9: keep as specified — only the zero-tasks case scores 1,
        // not every case where the average happens to be zero.
        1.0
    } else {
        (1.0 - m.avg_task_duration_ms / 60_000.0).max(0.0)
    }
}

fn reliability_component(m: &Metrics) -> f64 {
    let total = m.heartbeats_responded + m.heartbeats_missed;
    let base = if total == 0 {
        1.0
    } else {
        m.heartbeats_responded as f64 / total as f64
    };
    (base - (0.1 * m.warnings_received as f64).min(0.5)).max(0.0)
}

/// Computes the 0-100 overall score from the three weighted components.
pub fn score(m: &Metrics) -> u32 {
    let weighted = success_component(m) * 40.0 + responsiveness_component(m) * 30.0 + reliability_component(m) * 30.0;
    weighted.round().clamp(0.0, 100.0) as u32
}

pub fn promotion_eligible(m: &Metrics) -> bool {
    score(m) >= 80 && m.tasks_completed >= 10 && m.warnings_received == 0
}

pub fn demotion_eligible(m: &Metrics) -> bool {
    score(m) < 60 || m.warnings_received >= 2
}

pub fn dismissal_eligible(m: &Metrics) -> bool {
    score(m) < 40 || m.warnings_received >= 3
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_metrics() -> Metrics {
        Metrics::default()
    }

    #[test]
    fn no_tasks_yet_scores_full_marks_on_success_and_responsiveness() {
        let m = base_metrics();
        assert_eq!(score(&m), 100);
        assert_eq!(rating_for(score(&m)), Rating::Excellent);
    }

    #[test]
    fn avg_duration_zero_after_completions_still_scores_responsiveness_one() {
        let mut m = base_metrics();
        m.tasks_completed = 5;
        m.avg_task_duration_ms = 0.0;
        // success=1.0*40 + responsiveness=1.0*30 + reliability(no heartbeats)=1.0*30
        assert_eq!(score(&m), 100);
    }

    #[test]
    fn warnings_reduce_reliability_component() {
        let mut m = base_metrics();
        m.heartbeats_responded = 10;
        m.warnings_received = 5;
        let with_warnings = score(&m);
        m.warnings_received = 0;
        let without = score(&m);
        assert!(with_warnings < without);
    }

    #[test]
    fn eligibility_thresholds() {
        let mut m = base_metrics();
        m.tasks_completed = 10;
        assert!(promotion_eligible(&m));
        m.warnings_received = 3;
        assert!(dismissal_eligible(&m));
        assert!(demotion_eligible(&m));
    }
}
