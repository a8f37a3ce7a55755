// Static team metadata: display names and brand colors keyed by the Lahman
// franchise code.

use serde::Serialize;

/// Color returned for any abbreviation outside the known set.
pub const DEFAULT_TEAM_COLOR: &str = "#6B7280";

/// The canonical team universe, in display order: (code, name, color).
///
/// Codes follow the Lahman `teamID` column so they match the batting data
/// directly (e.g. `SLN`, not `STL`).
pub static KNOWN_TEAMS: [(&str, &str, &str); 30] = [
    ("NYA", "New York Yankees", "#0C2340"),
    ("BOS", "Boston Red Sox", "#BD3039"),
    ("TOR", "Toronto Blue Jays", "#134A8E"),
    ("TBA", "Tampa Bay Rays", "#092C5C"),
    ("BAL", "Baltimore Orioles", "#DF4601"),
    ("CLE", "Cleveland Guardians", "#00385D"),
    ("KCA", "Kansas City Royals", "#004687"),
    ("CHA", "Chicago White Sox", "#27251F"),
    ("DET", "Detroit Tigers", "#0C2340"),
    ("MIN", "Minnesota Twins", "#002B5C"),
    ("OAK", "Oakland Athletics", "#003831"),
    ("LAA", "Los Angeles Angels", "#BA0021"),
    ("HOU", "Houston Astros", "#EB6E1F"),
    ("SEA", "Seattle Mariners", "#0C2C56"),
    ("TEX", "Texas Rangers", "#003278"),
    ("PHI", "Philadelphia Phillies", "#E81828"),
    ("NYN", "New York Mets", "#002D72"),
    ("WAS", "Washington Nationals", "#AB0003"),
    ("MIA", "Miami Marlins", "#00A3E0"),
    ("ATL", "Atlanta Braves", "#CE1141"),
    ("SLN", "St. Louis Cardinals", "#C41E3A"),
    ("PIT", "Pittsburgh Pirates", "#FDB827"),
    ("CHN", "Chicago Cubs", "#0E3386"),
    ("MIL", "Milwaukee Brewers", "#12284B"),
    ("CIN", "Cincinnati Reds", "#C6011F"),
    ("COL", "Colorado Rockies", "#33006F"),
    ("LAN", "Los Angeles Dodgers", "#005A9C"),
    ("SDN", "San Diego Padres", "#2F241D"),
    ("ARI", "Arizona Diamondbacks", "#A71930"),
    ("SFN", "San Francisco Giants", "#FD5A1E"),
];

/// Display metadata for one team, as served to the front end.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TeamInfo {
    pub abbrev: String,
    pub name: String,
    pub color: String,
}

fn lookup(abbrev: &str) -> Option<&'static (&'static str, &'static str, &'static str)> {
    KNOWN_TEAMS
        .iter()
        .find(|(code, _, _)| code.eq_ignore_ascii_case(abbrev.trim()))
}

/// Whether `abbrev` is one of the 30 known franchise codes.
pub fn is_known(abbrev: &str) -> bool {
    lookup(abbrev).is_some()
}

/// Full team name, or `abbrev` itself when the code is unknown.
pub fn display_name(abbrev: &str) -> &str {
    match lookup(abbrev) {
        Some((_, name, _)) => *name,
        None => abbrev,
    }
}

/// Brand color as a `#RRGGBB` hex string.
pub fn brand_color(abbrev: &str) -> &'static str {
    lookup(abbrev).map_or(DEFAULT_TEAM_COLOR, |(_, _, color)| *color)
}

pub fn team_info(abbrev: &str) -> TeamInfo {
    TeamInfo {
        abbrev: abbrev.to_string(),
        name: display_name(abbrev).to_string(),
        color: brand_color(abbrev).to_string(),
    }
}

/// Every known team in canonical order.
pub fn all_team_mappings() -> Vec<TeamInfo> {
    KNOWN_TEAMS
        .iter()
        .map(|(code, name, color)| TeamInfo {
            abbrev: code.to_string(),
            name: name.to_string(),
            color: color.to_string(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn known_codes_are_unique() {
        let codes: HashSet<_> = KNOWN_TEAMS.iter().map(|(c, _, _)| *c).collect();
        assert_eq!(codes.len(), KNOWN_TEAMS.len());
    }

    #[test]
    fn colors_are_hex() {
        for (code, _, color) in KNOWN_TEAMS {
            assert_eq!(color.len(), 7, "{code}");
            assert!(color.starts_with('#'), "{code}");
            assert!(color[1..].chars().all(|c| c.is_ascii_hexdigit()), "{code}");
        }
    }

    #[test]
    fn display_name_known_and_unknown() {
        assert_eq!(display_name("NYA"), "New York Yankees");
        assert_eq!(display_name("nya"), "New York Yankees");
        assert_eq!(display_name("SLN"), "St. Louis Cardinals");
        assert_eq!(display_name("BRO"), "BRO");
    }

    #[test]
    fn brand_color_falls_back_to_default() {
        assert_eq!(brand_color("BOS"), "#BD3039");
        assert_eq!(brand_color("MON"), DEFAULT_TEAM_COLOR);
        assert_eq!(brand_color(""), DEFAULT_TEAM_COLOR);
    }

    #[test]
    fn team_info_bundles_lookups() {
        let info = team_info("SFN");
        assert_eq!(info.abbrev, "SFN");
        assert_eq!(info.name, "San Francisco Giants");
        assert_eq!(info.color, "#FD5A1E");

        let unknown = team_info("XYZ");
        assert_eq!(unknown.name, "XYZ");
        assert_eq!(unknown.color, DEFAULT_TEAM_COLOR);
    }

    #[test]
    fn all_mappings_in_canonical_order() {
        let all = all_team_mappings();
        assert_eq!(all.len(), 30);
        assert_eq!(all[0].abbrev, "NYA");
        assert_eq!(all[29].abbrev, "SFN");
        assert!(all.iter().all(|t| is_known(&t.abbrev)));
    }
}
