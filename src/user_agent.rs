//! Shared User-Agent string for resolver and transfer HTTP clients.

/// Project URL advertised in the User-Agent.
const PROJECT_UA_URL: &str = "https://github.com/fierce/mediadl";

/// Default User-Agent for every request the tool makes.
#[must_use]
pub fn default_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("mediadl/{version} (+{PROJECT_UA_URL})")
}
