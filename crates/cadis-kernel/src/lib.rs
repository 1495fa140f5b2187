use anyhow::{anyhow, Result};
use cadis_core::aggregate::window_start;
use cadis_core::config::AggregatorConfig;
use cadis_core::{
    ts, Attempt, Category, CategoryScores, Difficulty, Principle, PrincipleAdherence, Progress,
    Scenario,
};
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

#[derive(Clone)]
pub struct Kernel {
    db_path: PathBuf,
    busy_timeout: std::time::Duration,
}

const ATTEMPT_COLUMNS: &str = "id,scenario_id,score,principle_adherence,solution,feedback,improvement_areas,completed_at";
const SCENARIO_COLUMNS: &str = "id,title,description,difficulty,category,principles";

impl Kernel {
    pub fn open(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)?;
        let db_path = dir.join("cadis.sqlite");
        let conn = Connection::open(&db_path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        // Busy timeout (default 5000ms; override with CADIS_SQLITE_BUSY_MS)
        let busy_ms: u64 = std::env::var("CADIS_SQLITE_BUSY_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(5000);
        let busy_timeout = std::time::Duration::from_millis(busy_ms);
        conn.busy_timeout(busy_timeout)?;
        let _ = conn.pragma_update(None, "temp_store", "MEMORY");
        Self::init_schema(&conn)?;
        tracing::debug!(path = %db_path.display(), "kernel opened");
        Ok(Self {
            db_path,
            busy_timeout,
        })
    }

    fn init_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS coding_scenarios (
              id TEXT PRIMARY KEY,
              title TEXT NOT NULL,
              description TEXT NOT NULL,
              difficulty TEXT NOT NULL,
              category TEXT NOT NULL,
              principles TEXT NOT NULL,    -- JSON array of principle names
              created TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_scenarios_category ON coding_scenarios(category);

            -- Append-only: attempts are never updated or deleted
            CREATE TABLE IF NOT EXISTS coding_attempts (
              id TEXT PRIMARY KEY,
              scenario_id TEXT NOT NULL REFERENCES coding_scenarios(id),
              score INTEGER NOT NULL CHECK (score BETWEEN 0 AND 100),
              principle_adherence TEXT NOT NULL,   -- JSON object, one key per principle
              solution TEXT NOT NULL,
              feedback TEXT NOT NULL,
              improvement_areas TEXT NOT NULL,     -- JSON array
              completed_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_attempts_completed ON coding_attempts(completed_at);
            CREATE INDEX IF NOT EXISTS idx_attempts_scenario ON coding_attempts(scenario_id);

            -- Singleton: only row id=1 may exist
            CREATE TABLE IF NOT EXISTS coding_progress (
              id INTEGER PRIMARY KEY CHECK (id = 1),
              overall_score INTEGER NOT NULL,
              principle_scores TEXT NOT NULL,
              category_scores TEXT NOT NULL,
              total_attempts INTEGER NOT NULL,
              recent_improvement INTEGER NOT NULL,
              window_days INTEGER NOT NULL,
              last_updated TEXT NOT NULL
            );
            "#,
        )?;
        Ok(())
    }

    fn conn(&self) -> Result<Connection> {
        let conn = Connection::open(&self.db_path)?;
        conn.busy_timeout(self.busy_timeout)?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(conn)
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    // ---------------- Scenarios ----------------

    /// Insert scenarios that are not yet stored; existing ids are left untouched.
    pub fn seed_scenarios(&self, scenarios: &[Scenario]) -> Result<usize> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let now = ts(Utc::now());
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO coding_scenarios(id,title,description,difficulty,category,principles,created) VALUES(?,?,?,?,?,?,?)",
            )?;
            for s in scenarios {
                let principles = serde_json::to_string(&s.principles)?;
                inserted += stmt.execute(params![
                    s.id,
                    s.title,
                    s.description,
                    s.difficulty.as_str(),
                    s.category.as_str(),
                    principles,
                    now,
                ])?;
            }
        }
        tx.commit()?;
        if inserted > 0 {
            tracing::info!(inserted, "seeded scenarios");
        }
        Ok(inserted)
    }

    pub fn list_scenarios(&self) -> Result<Vec<Scenario>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {SCENARIO_COLUMNS} FROM coding_scenarios ORDER BY rowid ASC"
        ))?;
        let rows = stmt.query_map([], scenario_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn get_scenario(&self, id: &str) -> Result<Option<Scenario>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {SCENARIO_COLUMNS} FROM coding_scenarios WHERE id=? LIMIT 1"
        ))?;
        Ok(stmt.query_row([id], scenario_from_row).optional()?)
    }

    // ---------------- Attempts ----------------

    pub fn insert_attempt(&self, attempt: &Attempt) -> Result<()> {
        let conn = self.conn()?;
        let adherence = serde_json::to_string(&attempt.principle_adherence)?;
        let areas = serde_json::to_string(&attempt.improvement_areas)?;
        conn.execute(
            "INSERT INTO coding_attempts(id,scenario_id,score,principle_adherence,solution,feedback,improvement_areas,completed_at) VALUES(?,?,?,?,?,?,?,?)",
            params![
                attempt.id,
                attempt.scenario_id,
                attempt.score,
                adherence,
                attempt.solution,
                attempt.feedback,
                areas,
                ts(attempt.completed_at),
            ],
        )?;
        #[cfg(feature = "metrics")]
        metrics::counter!("cadis_attempts_inserted_total").increment(1);
        Ok(())
    }

    pub fn insert_attempts(&self, attempts: &[Attempt]) -> Result<usize> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO coding_attempts(id,scenario_id,score,principle_adherence,solution,feedback,improvement_areas,completed_at) VALUES(?,?,?,?,?,?,?,?)",
            )?;
            for a in attempts {
                stmt.execute(params![
                    a.id,
                    a.scenario_id,
                    a.score,
                    serde_json::to_string(&a.principle_adherence)?,
                    a.solution,
                    a.feedback,
                    serde_json::to_string(&a.improvement_areas)?,
                    ts(a.completed_at),
                ])?;
            }
        }
        tx.commit()?;
        #[cfg(feature = "metrics")]
        metrics::counter!("cadis_attempts_inserted_total").increment(attempts.len() as u64);
        Ok(attempts.len())
    }

    pub fn list_attempts(&self, limit: i64) -> Result<Vec<Attempt>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {ATTEMPT_COLUMNS} FROM coding_attempts ORDER BY completed_at DESC, rowid DESC LIMIT ?"
        ))?;
        let rows = stmt.query_map([limit], attempt_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn attempts_since(&self, from: DateTime<Utc>) -> Result<Vec<Attempt>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {ATTEMPT_COLUMNS} FROM coding_attempts WHERE completed_at >= ? ORDER BY completed_at ASC, rowid ASC"
        ))?;
        let rows = stmt.query_map([ts(from)], attempt_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn count_attempts(&self) -> Result<i64> {
        let conn = self.conn()?;
        let n: i64 = conn.query_row("SELECT COUNT(1) FROM coding_attempts", [], |r| r.get(0))?;
        Ok(n)
    }

    // ---------------- Progress ----------------

    /// Compute a snapshot over the window without storing it.
    pub fn aggregate_window(&self, cfg: &AggregatorConfig, now: DateTime<Utc>) -> Result<Progress> {
        let conn = self.conn()?;
        aggregate_in(&conn, cfg, now)
    }

    /// Recompute and store the singleton progress row.
    ///
    /// Runs in an IMMEDIATE transaction so concurrent recomputes serialize on
    /// the write lock; the table always holds exactly one row afterwards.
    pub fn recompute_progress(&self, cfg: &AggregatorConfig, now: DateTime<Utc>) -> Result<Progress> {
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let progress = aggregate_in(&tx, cfg, now)?;
        tx.execute("DELETE FROM coding_progress WHERE id <> 1", [])?;
        tx.execute(
            "INSERT INTO coding_progress(id,overall_score,principle_scores,category_scores,total_attempts,recent_improvement,window_days,last_updated)
             VALUES(1,?,?,?,?,?,?,?)
             ON CONFLICT(id) DO UPDATE SET
               overall_score=excluded.overall_score,
               principle_scores=excluded.principle_scores,
               category_scores=excluded.category_scores,
               total_attempts=excluded.total_attempts,
               recent_improvement=excluded.recent_improvement,
               window_days=excluded.window_days,
               last_updated=excluded.last_updated",
            params![
                progress.overall_score,
                serde_json::to_string(&progress.principle_scores)?,
                serde_json::to_string(&progress.category_scores)?,
                progress.total_attempts as i64,
                progress.recent_improvement,
                progress.window_days,
                ts(progress.last_updated),
            ],
        )?;
        tx.commit()?;
        #[cfg(feature = "metrics")]
        metrics::counter!("cadis_progress_recomputed_total").increment(1);
        tracing::info!(
            overall = progress.overall_score,
            attempts = progress.total_attempts,
            window_days = progress.window_days,
            "progress recomputed"
        );
        Ok(progress)
    }

    pub fn latest_progress(&self) -> Result<Option<Progress>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT overall_score,principle_scores,category_scores,total_attempts,recent_improvement,window_days,last_updated FROM coding_progress WHERE id=1",
        )?;
        let progress = stmt
            .query_row([], |row| {
                let principle_s: String = row.get(1)?;
                let category_s: String = row.get(2)?;
                let updated_s: String = row.get(6)?;
                Ok(Progress {
                    overall_score: row.get(0)?,
                    principle_scores: parse_json(1, &principle_s)?,
                    category_scores: parse_json(2, &category_s)?,
                    total_attempts: row.get::<_, i64>(3)?.max(0) as u64,
                    recent_improvement: row.get(4)?,
                    window_days: row.get(5)?,
                    last_updated: parse_ts(6, &updated_s)?,
                })
            })
            .optional()?;
        Ok(progress)
    }

    pub fn count_progress_rows(&self) -> Result<i64> {
        let conn = self.conn()?;
        let n: i64 = conn.query_row("SELECT COUNT(1) FROM coding_progress", [], |r| r.get(0))?;
        Ok(n)
    }

    // ---------------- Async wrappers (spawn_blocking) ----------------
    // These helpers offload rusqlite work from async executors.

    pub async fn seed_scenarios_async(&self, scenarios: Vec<Scenario>) -> Result<usize> {
        let k = self.clone();
        tokio::task::spawn_blocking(move || k.seed_scenarios(&scenarios))
            .await
            .map_err(|e| anyhow!("join error: {}", e))?
    }

    pub async fn list_scenarios_async(&self) -> Result<Vec<Scenario>> {
        let k = self.clone();
        tokio::task::spawn_blocking(move || k.list_scenarios())
            .await
            .map_err(|e| anyhow!("join error: {}", e))?
    }

    pub async fn get_scenario_async(&self, id: &str) -> Result<Option<Scenario>> {
        let k = self.clone();
        let id = id.to_string();
        tokio::task::spawn_blocking(move || k.get_scenario(&id))
            .await
            .map_err(|e| anyhow!("join error: {}", e))?
    }

    pub async fn insert_attempt_async(&self, attempt: Attempt) -> Result<()> {
        let k = self.clone();
        tokio::task::spawn_blocking(move || k.insert_attempt(&attempt))
            .await
            .map_err(|e| anyhow!("join error: {}", e))?
    }

    pub async fn insert_attempts_async(&self, attempts: Vec<Attempt>) -> Result<usize> {
        let k = self.clone();
        tokio::task::spawn_blocking(move || k.insert_attempts(&attempts))
            .await
            .map_err(|e| anyhow!("join error: {}", e))?
    }

    pub async fn list_attempts_async(&self, limit: i64) -> Result<Vec<Attempt>> {
        let k = self.clone();
        tokio::task::spawn_blocking(move || k.list_attempts(limit))
            .await
            .map_err(|e| anyhow!("join error: {}", e))?
    }

    pub async fn recompute_progress_async(
        &self,
        cfg: AggregatorConfig,
        now: DateTime<Utc>,
    ) -> Result<Progress> {
        let k = self.clone();
        tokio::task::spawn_blocking(move || k.recompute_progress(&cfg, now))
            .await
            .map_err(|e| anyhow!("join error: {}", e))?
    }

    pub async fn latest_progress_async(&self) -> Result<Option<Progress>> {
        let k = self.clone();
        tokio::task::spawn_blocking(move || k.latest_progress())
            .await
            .map_err(|e| anyhow!("join error: {}", e))?
    }
}

fn aggregate_in(conn: &Connection, cfg: &AggregatorConfig, now: DateTime<Utc>) -> Result<Progress> {
    let from = ts(window_start(now, cfg.window_days));
    let to = ts(now);

    let (total, overall, principles) = conn.query_row(
        "SELECT COUNT(1), AVG(score),
                AVG(json_extract(principle_adherence,'$.readability')),
                AVG(json_extract(principle_adherence,'$.maintainability')),
                AVG(json_extract(principle_adherence,'$.performance')),
                AVG(json_extract(principle_adherence,'$.security'))
         FROM coding_attempts WHERE completed_at >= ?1 AND completed_at <= ?2",
        params![from, to],
        |r| {
            let total: i64 = r.get(0)?;
            let overall: Option<f64> = r.get(1)?;
            let mut principles = PrincipleAdherence::default();
            for (idx, p) in Principle::ALL.into_iter().enumerate() {
                let v: Option<f64> = r.get(2 + idx)?;
                principles.set(p, v.unwrap_or(0.0).round());
            }
            Ok((total, overall, principles))
        },
    )?;

    let mut category_scores = CategoryScores::default();
    {
        let mut stmt = conn.prepare(
            "SELECT s.category, AVG(a.score)
             FROM coding_attempts a JOIN coding_scenarios s ON s.id = a.scenario_id
             WHERE a.completed_at >= ?1 AND a.completed_at <= ?2
             GROUP BY s.category",
        )?;
        let mut rows = stmt.query(params![from, to])?;
        while let Some(row) = rows.next()? {
            let name: String = row.get(0)?;
            let avg: Option<f64> = row.get(1)?;
            match name.parse::<Category>() {
                Ok(category) => category_scores.set(category, avg.unwrap_or(0.0).round()),
                Err(err) => tracing::warn!(%err, "skipping unknown category in aggregate"),
            }
        }
    }

    let recent_from = window_start(now, cfg.recent_days);
    let prior_from = window_start(recent_from, cfg.recent_days);
    let avg_between = |lo: &str, hi: &str, inclusive: bool| -> Result<Option<f64>> {
        let sql = if inclusive {
            "SELECT AVG(score) FROM coding_attempts WHERE completed_at >= ?1 AND completed_at <= ?2"
        } else {
            "SELECT AVG(score) FROM coding_attempts WHERE completed_at >= ?1 AND completed_at < ?2"
        };
        Ok(conn.query_row(sql, params![lo, hi], |r| r.get(0))?)
    };
    let recent = avg_between(&ts(recent_from), &to, true)?;
    let prior = avg_between(&ts(prior_from), &ts(recent_from), false)?;
    let recent_improvement = match (recent, prior) {
        (Some(r), Some(p)) => (r - p).round() as i32,
        _ => 0,
    };

    Ok(Progress {
        overall_score: overall.unwrap_or(0.0).round().clamp(0.0, 100.0) as u8,
        principle_scores: principles,
        category_scores,
        total_attempts: total.max(0) as u64,
        recent_improvement,
        window_days: cfg.window_days,
        last_updated: now,
    })
}

fn parse_ts(idx: usize, s: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn parse_json<T: serde::de::DeserializeOwned>(idx: usize, s: &str) -> rusqlite::Result<T> {
    serde_json::from_str(s)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn parse_enum<T>(idx: usize, s: &str) -> rusqlite::Result<T>
where
    T: std::str::FromStr<Err = cadis_core::CoreError>,
{
    s.parse::<T>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn scenario_from_row(row: &Row<'_>) -> rusqlite::Result<Scenario> {
    let difficulty_s: String = row.get(3)?;
    let category_s: String = row.get(4)?;
    let principles_s: String = row.get(5)?;
    Ok(Scenario {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        difficulty: parse_enum::<Difficulty>(3, &difficulty_s)?,
        category: parse_enum::<Category>(4, &category_s)?,
        principles: parse_json::<BTreeSet<Principle>>(5, &principles_s)?,
    })
}

fn attempt_from_row(row: &Row<'_>) -> rusqlite::Result<Attempt> {
    let adherence_s: String = row.get(3)?;
    let areas_s: String = row.get(6)?;
    let completed_s: String = row.get(7)?;
    Ok(Attempt {
        id: row.get(0)?,
        scenario_id: row.get(1)?,
        score: row.get(2)?,
        principle_adherence: parse_json(3, &adherence_s)?,
        solution: row.get(4)?,
        feedback: row.get(5)?,
        improvement_areas: parse_json(6, &areas_s)?,
        completed_at: parse_ts(7, &completed_s)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadis_core::{seed_scenarios, Catalog, Simulator};
    use chrono::Duration;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use tempfile::tempdir;

    fn seeded_kernel(dir: &Path) -> Kernel {
        let kernel = Kernel::open(dir).expect("open kernel");
        kernel.seed_scenarios(&seed_scenarios()).expect("seed");
        kernel
    }

    fn attempt_with(scenario_id: &str, score: u8, at: DateTime<Utc>) -> Attempt {
        Attempt {
            id: format!("att-{scenario_id}-{score}-{}", at.timestamp_millis()),
            scenario_id: scenario_id.into(),
            score,
            principle_adherence: PrincipleAdherence::uniform(f64::from(score)),
            solution: "solution".into(),
            feedback: "feedback".into(),
            improvement_areas: vec!["area".into()],
            completed_at: at,
        }
    }

    #[test]
    fn seeding_is_idempotent() {
        let dir = tempdir().unwrap();
        let kernel = Kernel::open(dir.path()).unwrap();
        let n = seed_scenarios().len();
        assert_eq!(kernel.seed_scenarios(&seed_scenarios()).unwrap(), n);
        assert_eq!(kernel.seed_scenarios(&seed_scenarios()).unwrap(), 0);
        let stored = kernel.list_scenarios().unwrap();
        assert_eq!(stored, seed_scenarios());
    }

    #[test]
    fn scenario_lookup_roundtrips() {
        let dir = tempdir().unwrap();
        let kernel = seeded_kernel(dir.path());
        let s = kernel.get_scenario("debug-race-condition").unwrap().unwrap();
        assert_eq!(s.difficulty, Difficulty::Expert);
        assert!(s.declares(Principle::Security));
        assert!(kernel.get_scenario("missing").unwrap().is_none());
    }

    #[test]
    fn attempts_require_known_scenario() {
        let dir = tempdir().unwrap();
        let kernel = seeded_kernel(dir.path());
        let err = kernel
            .insert_attempt(&attempt_with("missing", 50, Utc::now()))
            .unwrap_err();
        assert!(err.to_string().to_lowercase().contains("foreign key"), "{err}");
        assert_eq!(kernel.count_attempts().unwrap(), 0);
    }

    #[test]
    fn simulated_attempts_persist_and_list_newest_first() {
        let dir = tempdir().unwrap();
        let kernel = seeded_kernel(dir.path());
        let catalog = Catalog::seeded();
        let mut rng = StdRng::seed_from_u64(1);
        let base = Utc::now() - Duration::minutes(10);
        let first = Simulator::default().simulate(&catalog.all()[0], &mut rng, base);
        let second =
            Simulator::default().simulate(&catalog.all()[1], &mut rng, base + Duration::minutes(1));
        kernel.insert_attempt(&first).unwrap();
        kernel.insert_attempt(&second).unwrap();
        let listed = kernel.list_attempts(10).unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, second.id);
        assert_eq!(listed[1].improvement_areas, first.improvement_areas);
        assert_eq!(listed[1].principle_adherence, first.principle_adherence);
    }

    #[test]
    fn attempts_since_includes_boundary_in_ascending_order() {
        let dir = tempdir().unwrap();
        let kernel = seeded_kernel(dir.path());
        let now = DateTime::from_timestamp_millis(Utc::now().timestamp_millis()).unwrap();
        let from = now - Duration::days(2);
        let before = attempt_with("algo-two-sum", 60, from - Duration::milliseconds(1));
        let at = attempt_with("algo-two-sum", 70, from);
        let later = attempt_with("debug-off-by-one", 80, now);
        let middle = attempt_with("test-auth-flows", 75, from + Duration::hours(5));
        kernel
            .insert_attempts(&[later.clone(), before, middle.clone(), at.clone()])
            .unwrap();

        let since = kernel.attempts_since(from).unwrap();
        let ids: Vec<_> = since.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, [at.id.as_str(), middle.id.as_str(), later.id.as_str()]);
        assert_eq!(since[0].completed_at, from);
        assert!(kernel.attempts_since(now + Duration::seconds(1)).unwrap().is_empty());
    }

    #[test]
    fn recompute_matches_rounded_average() {
        let dir = tempdir().unwrap();
        let kernel = seeded_kernel(dir.path());
        let now = Utc::now();
        let attempts = vec![
            attempt_with("algo-two-sum", 90, now - Duration::hours(1)),
            attempt_with("algo-lru-cache", 80, now - Duration::hours(2)),
            attempt_with("test-auth-flows", 70, now - Duration::hours(3)),
        ];
        kernel.insert_attempts(&attempts).unwrap();
        let p = kernel
            .recompute_progress(&AggregatorConfig::default(), now)
            .unwrap();
        assert_eq!(p.overall_score, 80);
        assert_eq!(p.total_attempts, 3);
        assert_eq!(p.category_scores.algorithms, 85.0);
        assert_eq!(p.category_scores.testing, 70.0);
        assert_eq!(p.principle_scores.readability, 80.0);
        assert_eq!(kernel.latest_progress().unwrap().unwrap(), p_with_ms(p));
    }

    // Stored timestamps carry millisecond precision.
    fn p_with_ms(mut p: Progress) -> Progress {
        let ms = p.last_updated.timestamp_millis();
        p.last_updated = DateTime::from_timestamp_millis(ms).unwrap();
        p
    }

    #[test]
    fn sql_aggregate_agrees_with_core_summary() {
        let dir = tempdir().unwrap();
        let kernel = seeded_kernel(dir.path());
        let catalog = Catalog::seeded();
        let mut rng = StdRng::seed_from_u64(42);
        let now = Utc::now();
        let sim = Simulator::default();
        let mut all = Vec::new();
        for (i, s) in catalog.all().iter().cycle().take(40).enumerate() {
            let at = now - Duration::hours(i as i64 * 13);
            all.push(sim.simulate(s, &mut rng, at));
        }
        kernel.insert_attempts(&all).unwrap();
        let cfg = AggregatorConfig {
            window_days: 14,
            recent_days: 3,
        };
        let from_sql = kernel.aggregate_window(&cfg, now).unwrap();
        let from_core = cadis_core::summarize(
            &all,
            |id| catalog.get(id).map(|s| s.category),
            &cfg,
            now,
        );
        assert_eq!(from_sql.overall_score, from_core.overall_score);
        assert_eq!(from_sql.total_attempts, from_core.total_attempts);
        assert_eq!(from_sql.recent_improvement, from_core.recent_improvement);
        assert_eq!(from_sql.category_scores, from_core.category_scores);
        assert_eq!(from_sql.principle_scores, from_core.principle_scores);
    }

    #[test]
    fn repeated_recompute_leaves_one_row() {
        let dir = tempdir().unwrap();
        let kernel = seeded_kernel(dir.path());
        assert!(kernel.latest_progress().unwrap().is_none());
        let cfg = AggregatorConfig::default();
        for score in [60u8, 70, 80] {
            kernel
                .insert_attempt(&attempt_with("algo-two-sum", score, Utc::now()))
                .unwrap();
            kernel.recompute_progress(&cfg, Utc::now()).unwrap();
            assert_eq!(kernel.count_progress_rows().unwrap(), 1);
        }
        assert_eq!(kernel.latest_progress().unwrap().unwrap().overall_score, 70);
    }

    #[test]
    fn concurrent_recomputes_keep_singleton() {
        let dir = tempdir().unwrap();
        let kernel = seeded_kernel(dir.path());
        kernel
            .insert_attempt(&attempt_with("algo-two-sum", 88, Utc::now()))
            .unwrap();
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let k = kernel.clone();
                std::thread::spawn(move || {
                    k.recompute_progress(&AggregatorConfig::default(), Utc::now())
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap().unwrap();
        }
        assert_eq!(kernel.count_progress_rows().unwrap(), 1);
    }

    #[test]
    fn empty_store_recomputes_to_zero() {
        let dir = tempdir().unwrap();
        let kernel = seeded_kernel(dir.path());
        let p = kernel
            .recompute_progress(&AggregatorConfig::default(), Utc::now())
            .unwrap();
        assert_eq!(p.overall_score, 0);
        assert_eq!(p.total_attempts, 0);
        assert_eq!(p.category_scores, CategoryScores::default());
    }

    #[tokio::test]
    async fn async_wrappers_delegate() {
        let dir = tempdir().unwrap();
        let kernel = Kernel::open(dir.path()).unwrap();
        kernel.seed_scenarios_async(seed_scenarios()).await.unwrap();
        assert_eq!(
            kernel.list_scenarios_async().await.unwrap().len(),
            seed_scenarios().len()
        );
        kernel
            .insert_attempt_async(attempt_with("algo-two-sum", 75, Utc::now()))
            .await
            .unwrap();
        let p = kernel
            .recompute_progress_async(AggregatorConfig::default(), Utc::now())
            .await
            .unwrap();
        assert_eq!(p.overall_score, 75);
        assert!(kernel.latest_progress_async().await.unwrap().is_some());
    }
}
