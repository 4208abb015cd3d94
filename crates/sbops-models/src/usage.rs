use std::fmt;
use std::ops::AddAssign;

use serde::{Deserialize, Serialize};

/// Model usage counters for a run (and every delegated run it triggers).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Usage {
    pub requests: u32,
    pub request_tokens: u64,
    pub response_tokens: u64,
    pub total_tokens: u64,
}

impl AddAssign for Usage {
    fn add_assign(&mut self, other: Self) {
        self.requests += other.requests;
        self.request_tokens += other.request_tokens;
        self.response_tokens += other.response_tokens;
        self.total_tokens += other.total_tokens;
    }
}

impl fmt::Display for Usage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Usage(requests={}, request_tokens={}, response_tokens={}, total_tokens={})",
            self.requests, self.request_tokens, self.response_tokens, self.total_tokens
        )
    }
}

/// Caps applied to a single agent run.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct UsageLimits {
    pub request_limit: Option<u32>,
    pub total_tokens_limit: Option<u64>,
}

/// Which limit a run ran into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitBreach {
    Requests { limit: u32 },
    TotalTokens { limit: u64, used: u64 },
}

impl fmt::Display for LimitBreach {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LimitBreach::Requests { limit } => {
                write!(f, "the next request would exceed the request_limit of {limit}")
            }
            LimitBreach::TotalTokens { limit, used } => {
                write!(f, "exceeded the total_tokens_limit of {limit} (total_tokens={used})")
            }
        }
    }
}

impl UsageLimits {
    /// Called before issuing a model request.
    pub fn check_before_request(&self, usage: &Usage) -> Result<(), LimitBreach> {
        match self.request_limit {
            Some(limit) if usage.requests >= limit => Err(LimitBreach::Requests { limit }),
            _ => Ok(()),
        }
    }

    /// Called after a response's usage has been recorded.
    pub fn check_tokens(&self, usage: &Usage) -> Result<(), LimitBreach> {
        match self.total_tokens_limit {
            Some(limit) if usage.total_tokens > limit => Err(LimitBreach::TotalTokens {
                limit,
                used: usage.total_tokens,
            }),
            _ => Ok(()),
        }
    }
}
