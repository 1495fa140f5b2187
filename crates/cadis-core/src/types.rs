use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::CoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Beginner,
    Intermediate,
    Advanced,
    Expert,
}

impl Difficulty {
    pub const ALL: [Difficulty; 4] = [
        Difficulty::Beginner,
        Difficulty::Intermediate,
        Difficulty::Advanced,
        Difficulty::Expert,
    ];

    /// Default base score before noise. Harder tiers start lower.
    pub fn base_score(self) -> i32 {
        match self {
            Difficulty::Beginner => 85,
            Difficulty::Intermediate => 75,
            Difficulty::Advanced => 65,
            Difficulty::Expert => 55,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Difficulty::Beginner => "beginner",
            Difficulty::Intermediate => "intermediate",
            Difficulty::Advanced => "advanced",
            Difficulty::Expert => "expert",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Difficulty {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Difficulty::ALL
            .into_iter()
            .find(|d| d.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| CoreError::UnknownVariant {
                kind: "difficulty",
                value: s.to_string(),
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Algorithms,
    Architecture,
    Refactoring,
    Debugging,
    Testing,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Algorithms,
        Category::Architecture,
        Category::Refactoring,
        Category::Debugging,
        Category::Testing,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Algorithms => "algorithms",
            Category::Architecture => "architecture",
            Category::Refactoring => "refactoring",
            Category::Debugging => "debugging",
            Category::Testing => "testing",
        }
    }

    /// Human label used in generated feedback text.
    pub fn label(self) -> &'static str {
        match self {
            Category::Algorithms => "algorithm design",
            Category::Architecture => "system architecture",
            Category::Refactoring => "refactoring",
            Category::Debugging => "debugging",
            Category::Testing => "testing",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| CoreError::UnknownVariant {
                kind: "category",
                value: s.to_string(),
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Principle {
    Readability,
    Maintainability,
    Performance,
    Security,
}

impl Principle {
    pub const ALL: [Principle; 4] = [
        Principle::Readability,
        Principle::Maintainability,
        Principle::Performance,
        Principle::Security,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Principle::Readability => "readability",
            Principle::Maintainability => "maintainability",
            Principle::Performance => "performance",
            Principle::Security => "security",
        }
    }
}

impl fmt::Display for Principle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scenario {
    pub id: String,
    pub title: String,
    pub description: String,
    pub difficulty: Difficulty,
    pub category: Category,
    pub principles: BTreeSet<Principle>,
}

impl Scenario {
    pub fn declares(&self, principle: Principle) -> bool {
        self.principles.contains(&principle)
    }
}

/// Per-principle adherence, each on the 0..=100 scale.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PrincipleAdherence {
    pub readability: f64,
    pub maintainability: f64,
    pub performance: f64,
    pub security: f64,
}

impl PrincipleAdherence {
    pub fn uniform(value: f64) -> Self {
        Self {
            readability: value,
            maintainability: value,
            performance: value,
            security: value,
        }
    }

    pub fn get(&self, principle: Principle) -> f64 {
        match principle {
            Principle::Readability => self.readability,
            Principle::Maintainability => self.maintainability,
            Principle::Performance => self.performance,
            Principle::Security => self.security,
        }
    }

    pub fn set(&mut self, principle: Principle, value: f64) {
        match principle {
            Principle::Readability => self.readability = value,
            Principle::Maintainability => self.maintainability = value,
            Principle::Performance => self.performance = value,
            Principle::Security => self.security = value,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attempt {
    pub id: String,
    pub scenario_id: String,
    pub score: u8,
    pub principle_adherence: PrincipleAdherence,
    pub solution: String,
    pub feedback: String,
    pub improvement_areas: Vec<String>,
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoryScores {
    pub algorithms: f64,
    pub architecture: f64,
    pub refactoring: f64,
    pub debugging: f64,
    pub testing: f64,
}

impl CategoryScores {
    pub fn get(&self, category: Category) -> f64 {
        match category {
            Category::Algorithms => self.algorithms,
            Category::Architecture => self.architecture,
            Category::Refactoring => self.refactoring,
            Category::Debugging => self.debugging,
            Category::Testing => self.testing,
        }
    }

    pub fn set(&mut self, category: Category, value: f64) {
        match category {
            Category::Algorithms => self.algorithms = value,
            Category::Architecture => self.architecture = value,
            Category::Refactoring => self.refactoring = value,
            Category::Debugging => self.debugging = value,
            Category::Testing => self.testing = value,
        }
    }
}

/// The latest recomputed snapshot. Only one is ever stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Progress {
    pub overall_score: u8,
    pub principle_scores: PrincipleAdherence,
    pub category_scores: CategoryScores,
    pub total_attempts: u64,
    pub recent_improvement: i32,
    pub window_days: u32,
    pub last_updated: DateTime<Utc>,
}
