// Read-only queries over the lazily loaded dataset.

use crate::config::{Config, DataPaths, LoadRules, QueryConfig};
use crate::dataset::{self, round3, Dataset, LoadError, PlayerSummary};
use crate::teams;
use once_cell::sync::OnceCell;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

/// Aggregate numbers for one team, computed over its capped by-team list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeamSummary {
    pub team: String,
    pub team_display: String,
    pub player_count: usize,
    pub avg_batting_average: f64,
    pub total_home_runs: u32,
    pub total_rbis: u32,
}

/// Owns the dataset cache and answers every player/team query.
///
/// The first call that needs data runs the loader; concurrent first callers
/// block on that single load instead of repeating it. A failed load is not
/// cached, so a later call retries, and in the meantime queries see an empty
/// dataset.
pub struct QueryService {
    paths: DataPaths,
    rules: LoadRules,
    limits: QueryConfig,
    cache: OnceCell<Arc<Dataset>>,
    loads: AtomicUsize,
}

impl QueryService {
    pub fn new(paths: DataPaths, rules: LoadRules, limits: QueryConfig) -> Self {
        Self {
            paths,
            rules,
            limits,
            cache: OnceCell::new(),
            loads: AtomicUsize::new(0),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.data.clone(),
            config.rules.clone(),
            config.query.clone(),
        )
    }

    /// A service whose cache is already populated; the loader never runs.
    pub fn with_dataset(dataset: Dataset, limits: QueryConfig) -> Self {
        let service = Self::new(DataPaths::default(), LoadRules::default(), limits);
        let _ = service.cache.set(Arc::new(dataset));
        service
    }

    pub fn limits(&self) -> &QueryConfig {
        &self.limits
    }

    /// Load the dataset on first use and return the cached copy afterwards.
    pub fn load(&self) -> Result<Arc<Dataset>, LoadError> {
        self.cache
            .get_or_try_init(|| {
                self.loads.fetch_add(1, Ordering::SeqCst);
                let dataset = dataset::load_from_paths(&self.paths, &self.rules)?;
                info!(
                    "Loaded {} players and {} teams",
                    dataset.players.len(),
                    dataset.teams.len()
                );
                Ok(Arc::new(dataset))
            })
            .cloned()
    }

    /// How many times the load pipeline has run (successfully or not).
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    /// The cached dataset, or an empty one when loading fails.
    pub fn dataset(&self) -> Arc<Dataset> {
        match self.load() {
            Ok(data) => data,
            Err(e) => {
                warn!("dataset unavailable, serving empty results: {e}");
                Arc::new(Dataset::default())
            }
        }
    }

    /// Every cached player, in dataset order.
    pub fn players(&self) -> Vec<PlayerSummary> {
        self.dataset().players.clone()
    }

    pub fn teams(&self) -> Vec<String> {
        self.dataset().teams.clone()
    }

    /// Players whose team matches `team` (ASCII case-insensitive), best
    /// average first, at most `team_cap` of them.
    pub fn by_team(&self, team: &str) -> Vec<PlayerSummary> {
        let team = team.trim();
        let data = self.dataset();
        let mut players: Vec<PlayerSummary> = data
            .players
            .iter()
            .filter(|p| p.team.eq_ignore_ascii_case(team))
            .cloned()
            .collect();
        sort_by_average(&mut players);
        players.truncate(self.limits.team_cap);
        players
    }

    pub fn by_id(&self, id: &str) -> Option<PlayerSummary> {
        self.dataset().players.iter().find(|p| p.id == id).cloned()
    }

    pub fn random_sample(&self, count: usize) -> Vec<PlayerSummary> {
        self.random_sample_with(count, &mut rand::thread_rng())
    }

    /// Draw `count` distinct players with at least `sample_min_average`.
    /// A pool smaller than `count` is returned whole.
    pub fn random_sample_with<R: Rng + ?Sized>(
        &self,
        count: usize,
        rng: &mut R,
    ) -> Vec<PlayerSummary> {
        let data = self.dataset();
        let pool: Vec<&PlayerSummary> = data
            .players
            .iter()
            .filter(|p| p.batting_average >= self.limits.sample_min_average)
            .collect();
        if pool.len() <= count {
            return pool.into_iter().cloned().collect();
        }
        pool.choose_multiple(rng, count)
            .map(|p| (*p).clone())
            .collect()
    }

    /// Case-insensitive substring match on full name, best average first.
    /// An empty query matches every player; reject it before calling if
    /// that is not wanted.
    pub fn search(&self, query: &str, limit: usize) -> Vec<PlayerSummary> {
        let needle = query.to_lowercase();
        let data = self.dataset();
        let mut matches: Vec<PlayerSummary> = data
            .players
            .iter()
            .filter(|p| {
                p.name
                    .as_deref()
                    .unwrap_or_default()
                    .to_lowercase()
                    .contains(&needle)
            })
            .cloned()
            .collect();
        sort_by_average(&mut matches);
        matches.truncate(limit);
        matches
    }

    /// Aggregates over [`by_team`](Self::by_team); `None` when the team has
    /// no players.
    pub fn team_stats(&self, team: &str) -> Option<TeamSummary> {
        let players = self.by_team(team);
        if players.is_empty() {
            return None;
        }
        let count = players.len();
        let avg_sum: f64 = players.iter().map(|p| p.batting_average).sum();
        let abbrev = team.trim().to_ascii_uppercase();
        Some(TeamSummary {
            team_display: teams::display_name(&abbrev).to_string(),
            team: abbrev,
            player_count: count,
            avg_batting_average: round3(avg_sum / count as f64),
            total_home_runs: players.iter().map(|p| p.home_runs).sum(),
            total_rbis: players.iter().map(|p| p.rbi).sum(),
        })
    }

    pub fn random_team(&self) -> Option<String> {
        self.random_team_with(&mut rand::thread_rng())
    }

    pub fn random_team_with<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<String> {
        let team = self.dataset().teams.choose(rng).cloned();
        if team.is_none() {
            warn!("no teams available to select from");
        }
        team
    }
}

/// Best average first; the sort is stable so equal averages keep id order.
fn sort_by_average(players: &mut [PlayerSummary]) {
    players.sort_by(|a, b| b.batting_average.total_cmp(&a.batting_average));
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashSet;

    fn player(id: &str, name: &str, team: &str, avg: f64, hr: u32, rbi: u32) -> PlayerSummary {
        PlayerSummary {
            id: id.into(),
            name: Some(name.into()),
            team: team.into(),
            batting_average: avg,
            year: 2010,
            hits: 0,
            at_bats: 0,
            home_runs: hr,
            rbi,
            positions: vec!["UTIL".into()],
        }
    }

    fn sample_dataset() -> Dataset {
        Dataset {
            players: vec![
                player("cano01", "Robinson Cano", "NYA", 0.319, 29, 109),
                player("jeter01", "Derek Jeter", "NYA", 0.334, 18, 66),
                player("posada01", "Jorge Posada", "NYA", 0.185, 22, 81),
                player("ortiz01", "David Ortiz", "BOS", 0.270, 32, 102),
                player("pedroia01", "Dustin Pedroia", "BOS", 0.288, 15, 72),
                player("lopez01", "Felipe Lopez", "MON", 0.240, 4, 20),
            ],
            teams: vec!["NYA".into(), "BOS".into()],
        }
    }

    fn service() -> QueryService {
        QueryService::with_dataset(sample_dataset(), QueryConfig::default())
    }

    #[test]
    fn by_team_case_insensitive_and_sorted() {
        let players = service().by_team("nya");
        let ids: Vec<&str> = players.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["jeter01", "cano01", "posada01"]);
        assert!(players.iter().all(|p| p.team == "NYA"));
    }

    #[test]
    fn by_team_truncates_to_cap() {
        let limits = QueryConfig {
            team_cap: 2,
            ..QueryConfig::default()
        };
        let svc = QueryService::with_dataset(sample_dataset(), limits);
        let players = svc.by_team("NYA");
        assert_eq!(players.len(), 2);
        assert_eq!(players[0].id, "jeter01");
        assert_eq!(players[1].id, "cano01");
    }

    #[test]
    fn players_and_teams_expose_cached_collections() {
        let svc = service();
        assert_eq!(svc.players(), sample_dataset().players);
        assert_eq!(svc.teams(), vec!["NYA".to_string(), "BOS".to_string()]);
    }

    #[test]
    fn by_team_unknown_is_empty() {
        assert!(service().by_team("SEA").is_empty());
    }

    #[test]
    fn by_id_total_over_loaded_ids() {
        let svc = service();
        for p in &sample_dataset().players {
            let found = svc.by_id(&p.id).expect("loaded id should be found");
            assert_eq!(&found, p);
        }
        assert!(svc.by_id("nobody01").is_none());
        assert!(svc.by_id("JETER01").is_none());
    }

    #[test]
    fn random_sample_returns_whole_pool_when_small() {
        // Posada (.185) is below the .200 threshold.
        let players = service().random_sample(50);
        assert_eq!(players.len(), 5);
        assert!(players.iter().all(|p| p.id != "posada01"));
    }

    #[test]
    fn random_sample_draws_distinct_eligible_players() {
        let mut rng = StdRng::seed_from_u64(7);
        let players = service().random_sample_with(3, &mut rng);
        assert_eq!(players.len(), 3);
        let ids: HashSet<&str> = players.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids.len(), 3);
        assert!(players.iter().all(|p| p.batting_average >= 0.2));
    }

    #[test]
    fn random_sample_zero_is_empty() {
        assert!(service().random_sample(0).is_empty());
    }

    #[test]
    fn search_matches_substring_case_insensitively() {
        let players = service().search("OR", 10);
        let ids: Vec<&str> = players.iter().map(|p| p.id.as_str()).collect();
        // "David Ortiz" and "Jorge Posada"; Ortiz has the higher average.
        assert_eq!(ids, vec!["ortiz01", "posada01"]);
    }

    #[test]
    fn search_respects_limit() {
        let players = service().search("", 2);
        assert_eq!(players.len(), 2);
        assert_eq!(players[0].id, "jeter01");
        assert_eq!(players[1].id, "cano01");
    }

    #[test]
    fn empty_search_matches_everyone() {
        assert_eq!(service().search("", 100).len(), 6);
    }

    #[test]
    fn search_skips_players_without_names() {
        let mut data = sample_dataset();
        data.players[0].name = None;
        let svc = QueryService::with_dataset(data, QueryConfig::default());
        assert!(svc.search("cano", 10).is_empty());
    }

    #[test]
    fn team_stats_aggregates_capped_list() {
        let stats = service().team_stats("bos").expect("BOS has players");
        assert_eq!(stats.team, "BOS");
        assert_eq!(stats.team_display, "Boston Red Sox");
        assert_eq!(stats.player_count, 2);
        assert_eq!(stats.avg_batting_average, 0.279);
        assert_eq!(stats.total_home_runs, 47);
        assert_eq!(stats.total_rbis, 174);
    }

    #[test]
    fn team_stats_without_players_is_none() {
        assert!(service().team_stats("SEA").is_none());
    }

    #[test]
    fn random_team_comes_from_team_list() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..20 {
            let team = service().random_team_with(&mut rng).unwrap();
            assert!(team == "NYA" || team == "BOS");
        }
    }

    #[test]
    fn random_team_none_when_no_teams() {
        let svc = QueryService::with_dataset(Dataset::default(), QueryConfig::default());
        assert!(svc.random_team().is_none());
    }

    #[test]
    fn preloaded_service_never_runs_loader() {
        let svc = service();
        let _ = svc.by_team("NYA");
        let _ = svc.load().unwrap();
        assert_eq!(svc.load_count(), 0);
    }

    #[test]
    fn failed_load_serves_empty_and_retries() {
        let dir = std::env::temp_dir().join("wardle_query_missing_data");
        let _ = std::fs::remove_dir_all(&dir);
        let svc = QueryService::new(
            DataPaths::in_dir(dir.display().to_string()),
            LoadRules::default(),
            QueryConfig::default(),
        );

        assert!(matches!(svc.load(), Err(LoadError::Io { .. })));
        assert!(svc.by_team("NYA").is_empty());
        assert!(svc.random_team().is_none());
        assert!(svc.team_stats("NYA").is_none());
        // Failures are not cached.
        assert_eq!(svc.load_count(), 4);
    }
}
