//! Direct-vs-proxy decision.
//!
//! # Design Decisions
//! - Download managers always get a redirect (they handle ranges and retries themselves)
//! - Foreign callers always get a redirect; proxying spends the gateway's own
//!   egress and is reserved for domestic callers
//! - Pure function of (user agent, domestic flag)

use std::fmt;

/// Keywords matched against the user agent when no configuration overrides them.
pub const DEFAULT_DIRECT_AGENTS: [&str; 5] = ["aria2", "wget", "curl", "idm", "openlist-direct"];

/// How a resolved link is delivered to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutingDecision {
    /// 302 redirect to the upstream URL.
    Direct,
    /// Stream the upstream response through the gateway.
    Proxy,
}

impl RoutingDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoutingDecision::Direct => "direct",
            RoutingDecision::Proxy => "proxy",
        }
    }
}

impl fmt::Display for RoutingDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Routing policy over a fixed keyword list.
#[derive(Debug, Clone)]
pub struct RoutingPolicy {
    /// Lowercased keywords.
    direct_agents: Vec<String>,
}

impl RoutingPolicy {
    /// Policy matching `keywords` case-insensitively. Empty keywords are ignored.
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            direct_agents: keywords
                .into_iter()
                .map(|k| k.as_ref().trim().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect(),
        }
    }

    /// True when `user_agent` contains one of the direct keywords.
    pub fn is_direct_agent(&self, user_agent: Option<&str>) -> bool {
        let Some(ua) = user_agent.filter(|ua| !ua.is_empty()) else {
            return false;
        };
        let ua = ua.to_lowercase();
        self.direct_agents.iter().any(|k| ua.contains(k.as_str()))
    }

    pub fn decide(&self, user_agent: Option<&str>, is_domestic: bool) -> RoutingDecision {
        if self.is_direct_agent(user_agent) || !is_domestic {
            RoutingDecision::Direct
        } else {
            RoutingDecision::Proxy
        }
    }
}

impl Default for RoutingPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_DIRECT_AGENTS)
    }
}
