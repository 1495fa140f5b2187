//! Attempt simulation: a difficulty-tiered base score plus uniform noise,
//! with feedback picked from fixed banks by score tier.

use chrono::{DateTime, Utc};
use rand::Rng;

use crate::config::SimulatorConfig;
use crate::types::{Attempt, Principle, PrincipleAdherence, Scenario};

const EXCELLENT_FEEDBACK: &[&str] = &[
    "Excellent work on {label}: the solution is clean and handles the edge cases.",
    "Strong {label} solution with clear structure and sensible trade-offs.",
    "Outstanding {label} approach; only minor polish remains.",
];

const GOOD_FEEDBACK: &[&str] = &[
    "Solid {label} solution, but some edge cases are still uncovered.",
    "Good progress on {label}; the core idea works and needs tightening.",
    "Reasonable {label} approach with room to simplify the control flow.",
];

const NEEDS_WORK_FEEDBACK: &[&str] = &[
    "The {label} solution needs work: several requirements are not met.",
    "Revisit the {label} fundamentals; the current approach breaks on common inputs.",
    "This {label} attempt is incomplete and should be restructured.",
];

const EXCELLENT_AREAS: &[&str] = &[
    "Document the reasoning behind non-obvious choices",
    "Add benchmarks for the hot path",
    "Share the pattern as a reusable helper",
];

const GOOD_AREAS: &[&str] = &[
    "Cover boundary conditions with tests",
    "Reduce nesting in the main routine",
    "Name intermediate values more precisely",
    "Handle error paths explicitly",
];

const NEEDS_WORK_AREAS: &[&str] = &[
    "Re-read the problem statement and list the requirements",
    "Break the solution into smaller functions",
    "Write failing tests before changing the code",
    "Trace the algorithm by hand on a small input",
    "Validate inputs before using them",
];

/// Score tier used to key the text banks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Excellent,
    Good,
    NeedsWork,
}

impl Tier {
    pub fn for_score(score: u8) -> Self {
        if score >= 80 {
            Tier::Excellent
        } else if score >= 60 {
            Tier::Good
        } else {
            Tier::NeedsWork
        }
    }

    fn feedback_bank(self) -> &'static [&'static str] {
        match self {
            Tier::Excellent => EXCELLENT_FEEDBACK,
            Tier::Good => GOOD_FEEDBACK,
            Tier::NeedsWork => NEEDS_WORK_FEEDBACK,
        }
    }

    fn area_bank(self) -> &'static [&'static str] {
        match self {
            Tier::Excellent => EXCELLENT_AREAS,
            Tier::Good => GOOD_AREAS,
            Tier::NeedsWork => NEEDS_WORK_AREAS,
        }
    }

    fn area_count(self) -> usize {
        match self {
            Tier::Excellent => 1,
            Tier::Good => 2,
            Tier::NeedsWork => 3,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Simulator {
    cfg: SimulatorConfig,
}

impl Simulator {
    pub fn new(cfg: SimulatorConfig) -> Self {
        Self { cfg }
    }

    pub fn config(&self) -> &SimulatorConfig {
        &self.cfg
    }

    /// Raw score for a scenario: base for its tier plus noise, clamped to 0..=100.
    pub fn score<R: Rng + ?Sized>(&self, scenario: &Scenario, rng: &mut R) -> u8 {
        let base = self.cfg.base_scores.for_difficulty(scenario.difficulty);
        let noise = i32::from(self.cfg.noise);
        let jitter = if noise == 0 {
            0
        } else {
            rng.random_range(-noise..=noise)
        };
        (base + jitter).clamp(0, 100) as u8
    }

    pub fn adherence<R: Rng + ?Sized>(
        &self,
        scenario: &Scenario,
        score: u8,
        rng: &mut R,
    ) -> PrincipleAdherence {
        let mut out = PrincipleAdherence::uniform(f64::from(score));
        for principle in Principle::ALL {
            if scenario.declares(principle) {
                let bonus = rng.random_range(0..=self.cfg.bonus_max);
                let value = score.saturating_add(bonus).min(100);
                out.set(principle, f64::from(value));
            }
        }
        out
    }

    pub fn simulate<R: Rng + ?Sized>(
        &self,
        scenario: &Scenario,
        rng: &mut R,
        now: DateTime<Utc>,
    ) -> Attempt {
        let score = self.score(scenario, rng);
        let principle_adherence = self.adherence(scenario, score, rng);
        let tier = Tier::for_score(score);
        let label = scenario.category.label();

        let bank = tier.feedback_bank();
        let feedback = bank[rng.random_range(0..bank.len())].replace("{label}", label);

        let mut improvement_areas = pick_distinct(tier.area_bank(), tier.area_count(), rng);
        if tier != Tier::Excellent {
            if let Some(weakest) = weakest_declared(scenario, &principle_adherence) {
                improvement_areas.push(format!("Strengthen {} in {} work", weakest, label));
            }
        }

        let focus = scenario
            .principles
            .iter()
            .map(|p| p.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        let solution = format!(
            "Applied {} techniques to \"{}\" with a focus on {}.",
            label, scenario.title, focus
        );

        Attempt {
            id: uuid::Uuid::new_v4().to_string(),
            scenario_id: scenario.id.clone(),
            score,
            principle_adherence,
            solution,
            feedback,
            improvement_areas,
            completed_at: now,
        }
    }

    /// One attempt per scenario, in order.
    pub fn simulate_batch<'a, R, I>(&self, scenarios: I, rng: &mut R, now: DateTime<Utc>) -> Vec<Attempt>
    where
        R: Rng + ?Sized,
        I: IntoIterator<Item = &'a Scenario>,
    {
        scenarios
            .into_iter()
            .map(|s| self.simulate(s, rng, now))
            .collect()
    }
}

fn pick_distinct<R: Rng + ?Sized>(bank: &[&str], count: usize, rng: &mut R) -> Vec<String> {
    let mut pool: Vec<&str> = bank.to_vec();
    let mut out = Vec::with_capacity(count);
    while out.len() < count && !pool.is_empty() {
        let idx = rng.random_range(0..pool.len());
        out.push(pool.swap_remove(idx).to_string());
    }
    out
}

fn weakest_declared(scenario: &Scenario, adherence: &PrincipleAdherence) -> Option<Principle> {
    scenario
        .principles
        .iter()
        .copied()
        .min_by(|a, b| {
            adherence
                .get(*a)
                .partial_cmp(&adherence.get(*b))
                .unwrap_or(std::cmp::Ordering::Equal)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use crate::config::BaseScores;
    use crate::types::{Category, Difficulty};
    use proptest::prelude::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::BTreeSet;

    fn scenario(difficulty: Difficulty, principles: &[Principle]) -> Scenario {
        Scenario {
            id: "s-1".into(),
            title: "Sample".into(),
            description: "sample".into(),
            difficulty,
            category: Category::Debugging,
            principles: principles.iter().copied().collect::<BTreeSet<_>>(),
        }
    }

    #[test]
    fn zero_noise_yields_base_score() {
        let sim = Simulator::new(SimulatorConfig {
            noise: 0,
            ..SimulatorConfig::default()
        });
        let mut rng = StdRng::seed_from_u64(7);
        for d in Difficulty::ALL {
            assert_eq!(
                i32::from(sim.score(&scenario(d, &[]), &mut rng)),
                d.base_score()
            );
        }
    }

    #[test]
    fn undeclared_principles_match_score() {
        let sim = Simulator::default();
        let mut rng = StdRng::seed_from_u64(11);
        let s = scenario(Difficulty::Intermediate, &[Principle::Security]);
        let attempt = sim.simulate(&s, &mut rng, Utc::now());
        let score = f64::from(attempt.score);
        assert_eq!(attempt.principle_adherence.readability, score);
        assert_eq!(attempt.principle_adherence.performance, score);
        let sec = attempt.principle_adherence.security;
        assert!(sec >= score && sec <= (score + 10.0).min(100.0));
    }

    #[test]
    fn feedback_tiers_follow_thresholds() {
        assert_eq!(Tier::for_score(80), Tier::Excellent);
        assert_eq!(Tier::for_score(79), Tier::Good);
        assert_eq!(Tier::for_score(60), Tier::Good);
        assert_eq!(Tier::for_score(59), Tier::NeedsWork);
    }

    #[test]
    fn low_scores_name_the_weakest_principle() {
        let sim = Simulator::new(SimulatorConfig {
            noise: 0,
            bonus_max: 0,
            base_scores: BaseScores {
                expert: 40,
                ..BaseScores::default()
            },
        });
        let mut rng = StdRng::seed_from_u64(3);
        let s = scenario(Difficulty::Expert, &[Principle::Performance]);
        let attempt = sim.simulate(&s, &mut rng, Utc::now());
        assert_eq!(attempt.score, 40);
        assert_eq!(attempt.improvement_areas.len(), 4);
        assert!(attempt
            .improvement_areas
            .last()
            .unwrap()
            .contains("performance"));
        assert!(attempt.solution.contains("debugging"));
    }

    #[test]
    fn batch_covers_every_scenario() {
        let catalog = Catalog::seeded();
        let mut rng = StdRng::seed_from_u64(99);
        let attempts = Simulator::default().simulate_batch(catalog.all(), &mut rng, Utc::now());
        assert_eq!(attempts.len(), catalog.len());
        for (a, s) in attempts.iter().zip(catalog.all()) {
            assert_eq!(a.scenario_id, s.id);
        }
    }

    proptest! {
        #[test]
        fn score_and_adherence_stay_in_bounds(seed in any::<u64>(), noise in 0u8..=50, bonus in 0u8..=50, idx in 0usize..4) {
            let sim = Simulator::new(SimulatorConfig { noise, bonus_max: bonus, base_scores: BaseScores::default() });
            let mut rng = StdRng::seed_from_u64(seed);
            let s = scenario(Difficulty::ALL[idx], &Principle::ALL);
            let attempt = sim.simulate(&s, &mut rng, Utc::now());
            prop_assert!(attempt.score <= 100);
            for p in Principle::ALL {
                let v = attempt.principle_adherence.get(p);
                prop_assert!((0.0..=100.0).contains(&v));
                prop_assert!(v >= f64::from(attempt.score));
            }
        }
    }
}
