use std::collections::BTreeSet;

use crate::types::{Category, Difficulty, Principle, Scenario};
use crate::CoreError;

struct Seed {
    id: &'static str,
    title: &'static str,
    description: &'static str,
    difficulty: Difficulty,
    category: Category,
    principles: &'static [Principle],
}

use Principle::{Maintainability, Performance, Readability, Security};

const SEEDS: &[Seed] = &[
    Seed {
        id: "algo-two-sum",
        title: "Two-sum lookup",
        description: "Find two indices whose values add up to a target in a single pass.",
        difficulty: Difficulty::Beginner,
        category: Category::Algorithms,
        principles: &[Readability, Performance],
    },
    Seed {
        id: "algo-lru-cache",
        title: "LRU cache",
        description: "Implement a fixed-capacity cache with least-recently-used eviction.",
        difficulty: Difficulty::Advanced,
        category: Category::Algorithms,
        principles: &[Performance, Maintainability],
    },
    Seed {
        id: "arch-service-boundaries",
        title: "Service boundaries",
        description: "Split a monolithic request handler into storage, domain and transport layers.",
        difficulty: Difficulty::Intermediate,
        category: Category::Architecture,
        principles: &[Maintainability, Readability],
    },
    Seed {
        id: "arch-event-sourcing",
        title: "Event-sourced ledger",
        description: "Model an account ledger as an append-only event log with snapshots.",
        difficulty: Difficulty::Expert,
        category: Category::Architecture,
        principles: &[Maintainability, Performance, Security],
    },
    Seed {
        id: "refactor-long-function",
        title: "Long function extraction",
        description: "Break a 200-line function into cohesive helpers without changing behaviour.",
        difficulty: Difficulty::Beginner,
        category: Category::Refactoring,
        principles: &[Readability, Maintainability],
    },
    Seed {
        id: "refactor-legacy-sql",
        title: "Legacy SQL hardening",
        description: "Replace string-built queries with parameterised statements.",
        difficulty: Difficulty::Intermediate,
        category: Category::Refactoring,
        principles: &[Security, Maintainability],
    },
    Seed {
        id: "debug-race-condition",
        title: "Lost update race",
        description: "Diagnose a read-modify-write race between two concurrent writers.",
        difficulty: Difficulty::Expert,
        category: Category::Debugging,
        principles: &[Performance, Security],
    },
    Seed {
        id: "debug-off-by-one",
        title: "Off-by-one pagination",
        description: "Find why the last page of results is always missing one item.",
        difficulty: Difficulty::Beginner,
        category: Category::Debugging,
        principles: &[Readability],
    },
    Seed {
        id: "test-property-based",
        title: "Property-based parser tests",
        description: "Write generators and invariants for a small expression parser.",
        difficulty: Difficulty::Advanced,
        category: Category::Testing,
        principles: &[Maintainability, Readability],
    },
    Seed {
        id: "test-auth-flows",
        title: "Authentication flow coverage",
        description: "Cover token expiry, refresh and revocation paths with integration tests.",
        difficulty: Difficulty::Intermediate,
        category: Category::Testing,
        principles: &[Security],
    },
];

/// Static seed scenarios, in catalog order.
pub fn seed_scenarios() -> Vec<Scenario> {
    SEEDS
        .iter()
        .map(|s| Scenario {
            id: s.id.to_string(),
            title: s.title.to_string(),
            description: s.description.to_string(),
            difficulty: s.difficulty,
            category: s.category,
            principles: s.principles.iter().copied().collect::<BTreeSet<_>>(),
        })
        .collect()
}

/// In-memory scenario lookup.
#[derive(Debug, Clone)]
pub struct Catalog {
    scenarios: Vec<Scenario>,
}

impl Catalog {
    pub fn new(scenarios: Vec<Scenario>) -> Self {
        Self { scenarios }
    }

    pub fn seeded() -> Self {
        Self::new(seed_scenarios())
    }

    pub fn all(&self) -> &[Scenario] {
        &self.scenarios
    }

    pub fn len(&self) -> usize {
        self.scenarios.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenarios.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Scenario> {
        self.scenarios.iter().find(|s| s.id == id)
    }

    pub fn require(&self, id: &str) -> Result<&Scenario, CoreError> {
        self.get(id)
            .ok_or_else(|| CoreError::UnknownScenario(id.to_string()))
    }

    pub fn by_category(&self, category: Category) -> impl Iterator<Item = &Scenario> {
        self.scenarios.iter().filter(move |s| s.category == category)
    }

    pub fn by_difficulty(&self, difficulty: Difficulty) -> impl Iterator<Item = &Scenario> {
        self.scenarios
            .iter()
            .filter(move |s| s.difficulty == difficulty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn seed_covers_every_category_and_difficulty() {
        let catalog = Catalog::seeded();
        for category in Category::ALL {
            assert!(
                catalog.by_category(category).next().is_some(),
                "no scenario for {category}"
            );
        }
        for difficulty in Difficulty::ALL {
            assert!(
                catalog.by_difficulty(difficulty).next().is_some(),
                "no scenario for {difficulty}"
            );
        }
    }

    #[test]
    fn seed_ids_are_unique_and_principles_non_empty() {
        let scenarios = seed_scenarios();
        let ids: HashSet<_> = scenarios.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids.len(), scenarios.len());
        assert!(scenarios.iter().all(|s| !s.principles.is_empty()));
    }

    #[test]
    fn require_reports_unknown_id() {
        let catalog = Catalog::seeded();
        assert!(catalog.require("algo-two-sum").is_ok());
        let err = catalog.require("nope").unwrap_err();
        assert!(err.to_string().contains("nope"));
    }
}
