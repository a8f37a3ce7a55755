// Dataset loading and derivation.
//
// Reads Lahman-format CSV tables (Batting, People, Fielding), keeps seasons
// that clear the configured thresholds, and reduces them to one summary row
// per player plus the list of known teams present in the data.

use crate::config::{DataPaths, LoadRules, PositionMode, SeasonSelection};
use crate::teams::{self, KNOWN_TEAMS};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::io::Read;
use std::path::Path;
use tracing::{debug, info, warn};

/// Position reported for players with no fielding data.
pub const DEFAULT_POSITION: &str = "UTIL";

const BATTING_COLUMNS: &[&str] = &["playerID", "yearID", "teamID", "AB", "H", "HR", "RBI"];
const PEOPLE_COLUMNS: &[&str] = &["playerID", "nameFirst", "nameLast"];
const FIELDING_COLUMNS: &[&str] = &["playerID", "yearID", "POS"];

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// One batting line: a player's season (or one stint of it) with one team.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawBattingRecord {
    pub player_id: String,
    pub team_id: String,
    pub year: u16,
    pub at_bats: u32,
    pub hits: u32,
    pub home_runs: u32,
    pub rbi: u32,
}

/// One fielding line: a player at one position in one season.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFieldingRecord {
    pub player_id: String,
    pub year: u16,
    pub position: String,
    pub games: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPersonRecord {
    pub player_id: String,
    pub first_name: String,
    pub last_name: String,
}

impl RawPersonRecord {
    /// `"first last"`, using whichever parts are present. `None` when both
    /// are blank.
    pub fn full_name(&self) -> Option<String> {
        let parts: Vec<&str> = [self.first_name.as_str(), self.last_name.as_str()]
            .into_iter()
            .filter(|p| !p.is_empty())
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join(" "))
        }
    }
}

/// A player's single representative season, as served by the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerSummary {
    pub id: String,
    pub name: Option<String>,
    pub team: String,
    pub batting_average: f64,
    pub year: u16,
    pub hits: u32,
    pub at_bats: u32,
    pub home_runs: u32,
    pub rbi: u32,
    pub positions: Vec<String>,
}

/// The derived collections held by the query cache. Players are ordered by
/// id; teams follow the canonical known-teams order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    pub players: Vec<PlayerSummary>,
    pub teams: Vec<String>,
}

impl Dataset {
    pub fn is_empty(&self) -> bool {
        self.players.is_empty() && self.teams.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("failed to read file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("CSV error in {path}: {source}")]
    Csv { path: String, source: csv::Error },

    #[error("{path} is missing required columns: {columns:?}")]
    MissingColumns { path: String, columns: Vec<String> },
}

// ---------------------------------------------------------------------------
// Raw CSV serde structs (private), Lahman column names
// ---------------------------------------------------------------------------

/// Lahman Batting.csv row. Counting stats are optional because older seasons
/// leave some cells blank. Columns not named here are ignored.
#[derive(Debug, Deserialize)]
#[allow(non_snake_case)]
struct LahmanBatting {
    playerID: String,
    yearID: u16,
    teamID: String,
    AB: Option<u32>,
    H: Option<u32>,
    HR: Option<u32>,
    RBI: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[allow(non_snake_case)]
struct LahmanPerson {
    playerID: String,
    nameFirst: Option<String>,
    nameLast: Option<String>,
}

#[derive(Debug, Deserialize)]
#[allow(non_snake_case)]
struct LahmanFielding {
    playerID: String,
    yearID: u16,
    POS: String,
    #[serde(default)]
    G: Option<u32>,
}

// ---------------------------------------------------------------------------
// Derivation helpers
// ---------------------------------------------------------------------------

/// Round to three decimal places.
pub fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

/// Hits over at-bats, rounded to three decimals; 0.0 when there are no at-bats.
pub fn batting_average(hits: u32, at_bats: u32) -> f64 {
    if at_bats == 0 {
        return 0.0;
    }
    round3(f64::from(hits) / f64::from(at_bats))
}

/// Whether `candidate` should replace `incumbent` as a player's season.
/// Only a strictly better row wins, so full ties keep the first row seen.
fn replaces(
    candidate: (&RawBattingRecord, f64),
    incumbent: (&RawBattingRecord, f64),
    selection: SeasonSelection,
) -> bool {
    let (cand, cand_avg) = candidate;
    let (inc, inc_avg) = incumbent;
    let order = match selection {
        SeasonSelection::BestAverage => cand_avg
            .total_cmp(&inc_avg)
            .then(cand.at_bats.cmp(&inc.at_bats))
            .then(cand.year.cmp(&inc.year)),
        SeasonSelection::MostRecent => cand
            .year
            .cmp(&inc.year)
            .then(cand.at_bats.cmp(&inc.at_bats)),
    };
    order == Ordering::Greater
}

fn collect_positions(
    fielding: &[RawFieldingRecord],
    mode: PositionMode,
) -> HashMap<&str, Vec<String>> {
    match mode {
        PositionMode::All => {
            let mut sets: HashMap<&str, BTreeSet<&str>> = HashMap::new();
            for row in fielding {
                sets.entry(row.player_id.as_str())
                    .or_default()
                    .insert(row.position.as_str());
            }
            sets.into_iter()
                .map(|(id, set)| (id, set.into_iter().map(String::from).collect()))
                .collect()
        }
        PositionMode::MostRecent => {
            let mut latest: HashMap<&str, &RawFieldingRecord> = HashMap::new();
            for row in fielding {
                let replace = match latest.get(row.player_id.as_str()) {
                    Some(current) => (row.year, row.games) > (current.year, current.games),
                    None => true,
                };
                if replace {
                    latest.insert(row.player_id.as_str(), row);
                }
            }
            latest
                .into_iter()
                .map(|(id, row)| (id, vec![row.position.clone()]))
                .collect()
        }
    }
}

/// Merge each player's stints within one year into a single season line.
/// Counting stats are summed; the team is the stint with the most at-bats,
/// the earlier stint on a tie.
pub fn combine_stints(batting: &[RawBattingRecord]) -> Vec<RawBattingRecord> {
    let mut seasons: Vec<RawBattingRecord> = Vec::new();
    // (player, year) -> (index into seasons, at-bats of the stint holding the team)
    let mut index: HashMap<(&str, u16), (usize, u32)> = HashMap::new();
    for row in batting {
        match index.get_mut(&(row.player_id.as_str(), row.year)) {
            Some((i, team_at_bats)) => {
                let season = &mut seasons[*i];
                season.at_bats += row.at_bats;
                season.hits += row.hits;
                season.home_runs += row.home_runs;
                season.rbi += row.rbi;
                if row.at_bats > *team_at_bats {
                    *team_at_bats = row.at_bats;
                    season.team_id = row.team_id.clone();
                }
            }
            None => {
                index.insert(
                    (row.player_id.as_str(), row.year),
                    (seasons.len(), row.at_bats),
                );
                seasons.push(row.clone());
            }
        }
    }
    seasons
}

/// Run the combine / filter / select / join pipeline over already-parsed tables.
pub fn build_dataset(
    batting: &[RawBattingRecord],
    people: &[RawPersonRecord],
    fielding: &[RawFieldingRecord],
    rules: &LoadRules,
) -> Dataset {
    let seasons = combine_stints(batting);
    let eligible: Vec<&RawBattingRecord> = seasons
        .iter()
        .filter(|r| r.at_bats >= rules.min_at_bats && r.year >= rules.min_year)
        .collect();
    debug!(
        "{} of {} player-seasons ({} batting rows) pass min_at_bats={} min_year={}",
        eligible.len(),
        seasons.len(),
        batting.len(),
        rules.min_at_bats,
        rules.min_year
    );

    let mut winners: BTreeMap<&str, (&RawBattingRecord, f64)> = BTreeMap::new();
    for &row in &eligible {
        let avg = batting_average(row.hits, row.at_bats);
        let replace = match winners.get(row.player_id.as_str()) {
            Some(&current) => replaces((row, avg), current, rules.selection),
            None => true,
        };
        if replace {
            winners.insert(row.player_id.as_str(), (row, avg));
        }
    }

    let names: HashMap<&str, &RawPersonRecord> = people
        .iter()
        .map(|p| (p.player_id.as_str(), p))
        .collect();
    let mut positions = collect_positions(fielding, rules.positions);

    let players: Vec<PlayerSummary> = winners
        .into_iter()
        .map(|(id, (row, avg))| PlayerSummary {
            id: id.to_string(),
            name: names.get(id).and_then(|p| p.full_name()),
            team: row.team_id.clone(),
            batting_average: avg,
            year: row.year,
            hits: row.hits,
            at_bats: row.at_bats,
            home_runs: row.home_runs,
            rbi: row.rbi,
            positions: positions
                .remove(id)
                .unwrap_or_else(|| vec![DEFAULT_POSITION.to_string()]),
        })
        .collect();

    let retired = players.iter().filter(|p| !teams::is_known(&p.team)).count();
    if retired > 0 {
        debug!("{retired} players represented by franchise codes outside the known set");
    }

    let observed: HashSet<&str> = eligible.iter().map(|r| r.team_id.as_str()).collect();
    let teams: Vec<String> = KNOWN_TEAMS
        .iter()
        .filter(|(code, _, _)| observed.contains(code))
        .map(|(code, _, _)| code.to_string())
        .collect();

    Dataset { players, teams }
}

// ---------------------------------------------------------------------------
// Reader-based loaders (private, enable testing without temp files)
// ---------------------------------------------------------------------------

fn csv_reader<R: Read>(rdr: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(rdr)
}

fn require_columns<R: Read>(
    reader: &mut csv::Reader<R>,
    required: &[&str],
    label: &str,
) -> Result<(), LoadError> {
    let headers = reader.headers().map_err(|e| LoadError::Csv {
        path: label.to_string(),
        source: e,
    })?;
    let missing: Vec<String> = required
        .iter()
        .filter(|col| !headers.iter().any(|h| h == **col))
        .map(|col| col.to_string())
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(LoadError::MissingColumns {
            path: label.to_string(),
            columns: missing,
        })
    }
}

fn read_batting<R: Read>(rdr: R, label: &str) -> Result<Vec<RawBattingRecord>, LoadError> {
    let mut reader = csv_reader(rdr);
    require_columns(&mut reader, BATTING_COLUMNS, label)?;
    let mut rows = Vec::new();
    for result in reader.deserialize::<LahmanBatting>() {
        match result {
            Ok(raw) => {
                if raw.playerID.is_empty() || raw.teamID.is_empty() {
                    warn!("skipping batting row with blank playerID/teamID in {label}");
                    continue;
                }
                let at_bats = raw.AB.unwrap_or(0);
                let hits = raw.H.unwrap_or(0);
                if hits > at_bats {
                    warn!(
                        "skipping batting row for '{}' ({}): {} hits in {} at-bats",
                        raw.playerID, raw.yearID, hits, at_bats
                    );
                    continue;
                }
                rows.push(RawBattingRecord {
                    player_id: raw.playerID,
                    team_id: raw.teamID.to_ascii_uppercase(),
                    year: raw.yearID,
                    at_bats,
                    hits,
                    home_runs: raw.HR.unwrap_or(0),
                    rbi: raw.RBI.unwrap_or(0),
                });
            }
            Err(e) => {
                warn!("skipping malformed batting row in {label}: {e}");
            }
        }
    }
    Ok(rows)
}

fn read_people<R: Read>(rdr: R, label: &str) -> Result<Vec<RawPersonRecord>, LoadError> {
    let mut reader = csv_reader(rdr);
    require_columns(&mut reader, PEOPLE_COLUMNS, label)?;
    let mut rows = Vec::new();
    for result in reader.deserialize::<LahmanPerson>() {
        match result {
            Ok(raw) => {
                if raw.playerID.is_empty() {
                    warn!("skipping people row with blank playerID in {label}");
                    continue;
                }
                rows.push(RawPersonRecord {
                    player_id: raw.playerID,
                    first_name: raw.nameFirst.unwrap_or_default(),
                    last_name: raw.nameLast.unwrap_or_default(),
                });
            }
            Err(e) => {
                warn!("skipping malformed people row in {label}: {e}");
            }
        }
    }
    Ok(rows)
}

fn read_fielding<R: Read>(rdr: R, label: &str) -> Result<Vec<RawFieldingRecord>, LoadError> {
    let mut reader = csv_reader(rdr);
    require_columns(&mut reader, FIELDING_COLUMNS, label)?;
    let mut rows = Vec::new();
    for result in reader.deserialize::<LahmanFielding>() {
        match result {
            Ok(raw) => {
                if raw.playerID.is_empty() || raw.POS.is_empty() {
                    warn!("skipping fielding row with blank playerID/POS in {label}");
                    continue;
                }
                rows.push(RawFieldingRecord {
                    player_id: raw.playerID,
                    year: raw.yearID,
                    position: raw.POS.to_ascii_uppercase(),
                    games: raw.G.unwrap_or(0),
                });
            }
            Err(e) => {
                warn!("skipping malformed fielding row in {label}: {e}");
            }
        }
    }
    Ok(rows)
}

// ---------------------------------------------------------------------------
// Public path-based loaders
// ---------------------------------------------------------------------------

fn open(path: &Path) -> Result<std::fs::File, LoadError> {
    std::fs::File::open(path).map_err(|e| LoadError::Io {
        path: path.display().to_string(),
        source: e,
    })
}

pub fn load_batting(path: &Path) -> Result<Vec<RawBattingRecord>, LoadError> {
    read_batting(open(path)?, &path.display().to_string())
}

pub fn load_people(path: &Path) -> Result<Vec<RawPersonRecord>, LoadError> {
    read_people(open(path)?, &path.display().to_string())
}

pub fn load_fielding(path: &Path) -> Result<Vec<RawFieldingRecord>, LoadError> {
    read_fielding(open(path)?, &path.display().to_string())
}

/// Read every table named by `paths` and derive the dataset.
///
/// Batting and people tables are required. The fielding table only enriches
/// positions, so any failure reading it is logged and every player falls back
/// to [`DEFAULT_POSITION`].
pub fn load_from_paths(paths: &DataPaths, rules: &LoadRules) -> Result<Dataset, LoadError> {
    let batting = load_batting(&paths.batting_path())?;
    let people = load_people(&paths.people_path())?;
    let fielding = match paths.fielding_path() {
        Some(path) => load_fielding(&path).unwrap_or_else(|e| {
            warn!("fielding data unavailable, positions default to {DEFAULT_POSITION}: {e}");
            Vec::new()
        }),
        None => Vec::new(),
    };
    info!(
        "Read {} batting, {} people, {} fielding rows",
        batting.len(),
        people.len(),
        fielding.len()
    );

    Ok(build_dataset(&batting, &people, &fielding, rules))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
