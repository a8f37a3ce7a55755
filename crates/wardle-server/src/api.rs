// Route table and handlers for the JSON API.
//
// Handlers are plain synchronous functions over a `QueryService`; the HTTP
// layer parses requests into `ApiRequest` and serialises `ApiResponse`.

use serde_json::{json, Value};
use std::collections::HashMap;
use wardle_baseball::query::QueryService;
use wardle_baseball::teams;

pub const WELCOME_BANNER: &str = "Welcome to Wardle Backend API!";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Options,
    Other,
}

impl Method {
    pub fn parse(s: &str) -> Self {
        match s {
            "GET" => Method::Get,
            "POST" => Method::Post,
            "OPTIONS" => Method::Options,
            _ => Method::Other,
        }
    }
}

/// A decoded request: method, percent-decoded path and query parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: HashMap<String, String>,
}

impl ApiRequest {
    pub fn get(path: &str) -> Self {
        Self {
            method: Method::Get,
            path: path.to_string(),
            query: HashMap::new(),
        }
    }

    pub fn with_param(mut self, key: &str, value: &str) -> Self {
        self.query.insert(key.to_string(), value.to_string());
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    Json(Value),
    Text(String),
    Empty,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Body,
}

impl ApiResponse {
    pub fn json(status: u16, value: Value) -> Self {
        Self {
            status,
            body: Body::Json(value),
        }
    }

    pub fn ok(value: Value) -> Self {
        Self::json(200, value)
    }

    pub fn error(status: u16, message: impl Into<String>) -> Self {
        Self::json(status, json!({ "error": message.into() }))
    }

    pub fn text(status: u16, text: impl Into<String>) -> Self {
        Self {
            status,
            body: Body::Text(text.into()),
        }
    }

    pub fn no_content() -> Self {
        Self {
            status: 204,
            body: Body::Empty,
        }
    }
}

/// Every path the API answers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Root,
    Status,
    Teams,
    TeamMappings,
    TeamPlayers(String),
    Player(String),
    RandomTeam,
    RandomPlayers,
    Search,
    TeamStats(String),
    StartGame,
    SelectPlayer,
    GameState,
    ResetGame,
}

impl Route {
    /// Map a decoded path to a route. Trailing slashes are ignored.
    pub fn resolve(path: &str) -> Option<Self> {
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let route = match segments.as_slice() {
            [] => Route::Root,
            ["api", "status"] => Route::Status,
            ["api", "teams"] => Route::Teams,
            ["api", "team-mappings"] => Route::TeamMappings,
            ["api", "team-players", team] => Route::TeamPlayers(team.to_string()),
            ["api", "players", id] => Route::Player(id.to_string()),
            ["api", "random-team"] => Route::RandomTeam,
            ["api", "random-players"] => Route::RandomPlayers,
            ["api", "search"] => Route::Search,
            ["api", "team-stats", team] => Route::TeamStats(team.to_string()),
            ["api", "start"] => Route::StartGame,
            ["api", "select"] => Route::SelectPlayer,
            ["api", "state"] => Route::GameState,
            ["api", "reset"] => Route::ResetGame,
            _ => return None,
        };
        Some(route)
    }

    fn allows(&self, method: Method) -> bool {
        match self {
            Route::SelectPlayer | Route::ResetGame => method == Method::Post,
            _ => method == Method::Get,
        }
    }
}

/// Dispatch one request. Never panics on bad input: unknown paths are 404,
/// wrong methods 405, invalid parameters 400.
pub fn handle(service: &QueryService, request: &ApiRequest) -> ApiResponse {
    let Some(route) = Route::resolve(&request.path) else {
        return ApiResponse::error(404, "not found");
    };
    if request.method == Method::Options {
        return ApiResponse::no_content();
    }
    if !route.allows(request.method) {
        return ApiResponse::error(405, "method not allowed");
    }

    match route {
        Route::Root => ApiResponse::text(200, WELCOME_BANNER),
        Route::Status => ApiResponse::ok(json!({ "message": "Wardle Backend API is running!" })),
        Route::Teams => {
            let teams: Vec<_> = service.teams().iter().map(|t| teams::team_info(t)).collect();
            ApiResponse::ok(json!({ "teams": teams }))
        }
        Route::TeamMappings => ApiResponse::ok(json!({ "teams": teams::all_team_mappings() })),
        Route::TeamPlayers(team) => ApiResponse::ok(json!({ "players": service.by_team(&team) })),
        Route::Player(id) => match service.by_id(&id) {
            Some(player) => ApiResponse::ok(json!(player)),
            None => ApiResponse::error(404, format!("player '{id}' not found")),
        },
        Route::RandomTeam => match service.random_team() {
            Some(team) => ApiResponse::ok(json!({
                "team_display": teams::display_name(&team),
                "color": teams::brand_color(&team),
                "team": team,
            })),
            None => ApiResponse::error(503, "could not select a random team"),
        },
        Route::RandomPlayers => {
            let limits = service.limits();
            match size_param(request, "count", limits.default_sample, limits.max_results) {
                Ok(count) => ApiResponse::ok(json!({ "players": service.random_sample(count) })),
                Err(resp) => resp,
            }
        }
        Route::Search => search(service, request),
        Route::TeamStats(team) => match service.team_stats(&team) {
            Some(stats) => ApiResponse::ok(json!(stats)),
            None => ApiResponse::error(404, format!("no players found for team '{team}'")),
        },
        Route::StartGame => ApiResponse::ok(json!({ "status": "started" })),
        Route::SelectPlayer => ApiResponse::ok(json!({ "status": "selected" })),
        Route::GameState => ApiResponse::ok(json!({ "state": "stub" })),
        Route::ResetGame => ApiResponse::ok(json!({ "status": "reset" })),
    }
}

fn search(service: &QueryService, request: &ApiRequest) -> ApiResponse {
    let query = request.query.get("q").map(|q| q.trim()).unwrap_or_default();
    if query.is_empty() {
        return ApiResponse::error(400, "query parameter 'q' is required");
    }
    let limits = service.limits();
    match size_param(
        request,
        "limit",
        limits.default_search_limit,
        limits.max_results,
    ) {
        Ok(limit) => ApiResponse::ok(json!({ "players": service.search(query, limit) })),
        Err(resp) => resp,
    }
}

/// Parse a non-negative size parameter, clamped to `max`.
fn size_param(
    request: &ApiRequest,
    name: &str,
    default: usize,
    max: usize,
) -> Result<usize, ApiResponse> {
    match request.query.get(name) {
        None => Ok(default.min(max)),
        Some(raw) => raw.trim().parse::<usize>().map(|n| n.min(max)).map_err(|_| {
            ApiResponse::error(
                400,
                format!("query parameter '{name}' must be a non-negative integer"),
            )
        }),
    }
}
