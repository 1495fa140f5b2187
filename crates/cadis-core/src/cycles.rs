//! Repeated improvement rounds that drive a trend score toward a target.
//!
//! The trend is a closed-form function of the plan constants: each cycle
//! closes `momentum` of the remaining gap plus a flat `bonus`, capped at the
//! target. Simulated attempts are reported alongside but do not feed back.

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::catalog::Catalog;
use crate::config::CyclesConfig;
use crate::simulator::Simulator;
use crate::types::Attempt;
use crate::CoreError;

/// Upper bound on simulated attempts per cycle.
pub const MAX_ATTEMPTS_PER_CYCLE: u32 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CyclePlan {
    pub cycles: u32,
    pub attempts_per_cycle: u32,
    pub start_score: f64,
    pub target: f64,
    pub momentum: f64,
    pub bonus: f64,
}

impl CyclePlan {
    pub fn from_config(cfg: &CyclesConfig, cycles: u32) -> Self {
        Self {
            cycles,
            attempts_per_cycle: cfg.attempts_per_cycle,
            start_score: cfg.start_score,
            target: cfg.target,
            momentum: cfg.momentum,
            bonus: cfg.bonus,
        }
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if self.cycles == 0 {
            return Err(CoreError::InvalidPlan("cycles must be at least 1".into()));
        }
        if !(1..=MAX_ATTEMPTS_PER_CYCLE).contains(&self.attempts_per_cycle) {
            return Err(CoreError::InvalidPlan(format!(
                "attempts_per_cycle must lie in 1..={MAX_ATTEMPTS_PER_CYCLE}"
            )));
        }
        if !(0.0..=100.0).contains(&self.target) || !(0.0..=100.0).contains(&self.start_score) {
            return Err(CoreError::InvalidPlan(
                "start_score and target must lie in 0..=100".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.momentum) || self.bonus < 0.0 {
            return Err(CoreError::InvalidPlan(
                "momentum must lie in 0..=1 and bonus must be non-negative".into(),
            ));
        }
        Ok(())
    }

    pub fn next_trend(&self, prev: f64) -> f64 {
        let next = prev + (self.target - prev) * self.momentum + self.bonus;
        round1(next.min(self.target))
    }

    /// Trend after every cycle, without simulating anything.
    pub fn projected(&self) -> Vec<f64> {
        let mut prev = self.start_score;
        (0..self.cycles)
            .map(|_| {
                prev = self.next_trend(prev);
                prev
            })
            .collect()
    }
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleReport {
    pub cycle: u32,
    pub attempts: Vec<Attempt>,
    pub mean_attempt_score: f64,
    pub trend_score: f64,
}

/// Steps through a plan one cycle at a time so callers can persist between cycles.
pub struct CycleRunner<'a> {
    plan: CyclePlan,
    simulator: &'a Simulator,
    catalog: &'a Catalog,
    completed: u32,
    cursor: usize,
    trend: f64,
}

impl<'a> CycleRunner<'a> {
    pub fn new(
        plan: CyclePlan,
        simulator: &'a Simulator,
        catalog: &'a Catalog,
    ) -> Result<Self, CoreError> {
        plan.validate()?;
        if catalog.is_empty() {
            return Err(CoreError::InvalidPlan("scenario catalog is empty".into()));
        }
        Ok(Self {
            plan,
            simulator,
            catalog,
            completed: 0,
            cursor: 0,
            trend: plan.start_score,
        })
    }

    pub fn plan(&self) -> &CyclePlan {
        &self.plan
    }

    pub fn trend(&self) -> f64 {
        self.trend
    }

    pub fn is_done(&self) -> bool {
        self.completed >= self.plan.cycles
    }

    pub fn step<R: Rng + ?Sized>(&mut self, rng: &mut R, now: DateTime<Utc>) -> Option<CycleReport> {
        if self.is_done() {
            return None;
        }
        let scenarios = self.catalog.all();
        let mut attempts = Vec::new();
        for _ in 0..self.plan.attempts_per_cycle {
            let scenario = &scenarios[self.cursor % scenarios.len()];
            self.cursor = self.cursor.wrapping_add(1);
            attempts.push(self.simulator.simulate(scenario, rng, now));
        }
        let mean_attempt_score = crate::aggregate::mean(attempts.iter().map(|a| f64::from(a.score)))
            .map(round1)
            .unwrap_or(0.0);
        self.trend = self.plan.next_trend(self.trend);
        self.completed += 1;
        tracing::debug!(
            cycle = self.completed,
            mean_attempt_score,
            trend = self.trend,
            "improvement cycle complete"
        );
        Some(CycleReport {
            cycle: self.completed,
            attempts,
            mean_attempt_score,
            trend_score: self.trend,
        })
    }

    pub fn run<R: Rng + ?Sized>(mut self, rng: &mut R, now: DateTime<Utc>) -> Vec<CycleReport> {
        let mut out = Vec::new();
        while let Some(report) = self.step(rng, now) {
            out.push(report);
        }
        out
    }
}
