//! Shared User-Agent string for index, link and file requests.

/// Project URL for User-Agent identification.
const PROJECT_UA_URL: &str = "https://github.com/fierce/bookfetch";

/// Default User-Agent for every outbound request (identifies the tool).
#[must_use]
pub(crate) fn default_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("bookfetch/{version} (catalog-acquisition-tool; +{PROJECT_UA_URL})")
}
