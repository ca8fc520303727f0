//! Coarse user-agent summarisation for session listings.

/// Browser and OS names recognised from a raw user-agent string.
///
/// Deliberately crude substring matching: listings only need enough to tell
/// "Chrome on Windows" from "Safari on iOS", not a full UA parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceSummary {
    pub browser: &'static str,
    pub os: &'static str,
}

impl DeviceSummary {
    pub fn parse(user_agent: &str) -> Self {
        let browser = if user_agent.contains("Edg") {
            "Edge"
        } else if user_agent.contains("Chrome") {
            "Chrome"
        } else if user_agent.contains("Firefox") {
            "Firefox"
        } else if user_agent.contains("Safari") {
            "Safari"
        } else {
            "Unknown"
        };

        let os = if user_agent.contains("Windows") {
            "Windows"
        } else if user_agent.contains("Android") {
            "Android"
        } else if user_agent.contains("iPhone") || user_agent.contains("iPad") || user_agent.contains("iOS") {
            "iOS"
        } else if user_agent.contains("Mac") {
            "macOS"
        } else if user_agent.contains("Linux") {
            "Linux"
        } else {
            "Unknown"
        };

        Self { browser, os }
    }
}
