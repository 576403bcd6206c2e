use std::{collections::HashMap, fmt, num::NonZeroU32};

use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use log::trace;

/// Upstream endpoints that share one request budget.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EndpointFamily {
    Sso,
    Assets,
    IndustryJobs,
}

impl EndpointFamily {
    pub const ALL: [Self; 3] = [Self::Sso, Self::Assets, Self::IndustryJobs];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sso => "sso",
            Self::Assets => "assets",
            Self::IndustryJobs => "industry_jobs",
        }
    }
}

impl fmt::Display for EndpointFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FamilyQuota {
    pub per_second: u32,
    pub burst: u32,
}

impl FamilyQuota {
    pub const fn new(per_second: u32, burst: u32) -> Self {
        Self { per_second, burst }
    }

    fn to_quota(self) -> Quota {
        let per_second = NonZeroU32::new(self.per_second).unwrap_or(NonZeroU32::MIN);
        let burst = NonZeroU32::new(self.burst.max(self.per_second)).unwrap_or(per_second);
        Quota::per_second(per_second).allow_burst(burst)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub sso: FamilyQuota,
    pub assets: FamilyQuota,
    pub industry_jobs: FamilyQuota,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            sso: FamilyQuota::new(5, 10),
            assets: FamilyQuota::new(10, 20),
            industry_jobs: FamilyQuota::new(10, 20),
        }
    }
}

impl RateLimitConfig {
    pub fn quota_for(&self, family: EndpointFamily) -> FamilyQuota {
        match family {
            EndpointFamily::Sso => self.sso,
            EndpointFamily::Assets => self.assets,
            EndpointFamily::IndustryJobs => self.industry_jobs,
        }
    }
}

/// One token bucket per endpoint family, shared by every caller holding the
/// same instance.
pub struct EsiRateLimiter {
    limiters: HashMap<EndpointFamily, DefaultDirectRateLimiter>,
}

impl EsiRateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        let limiters = EndpointFamily::ALL
            .into_iter()
            .map(|family| {
                (
                    family,
                    RateLimiter::direct(config.quota_for(family).to_quota()),
                )
            })
            .collect();
        Self { limiters }
    }

    /// Waits until a request for `family` fits in the budget.
    pub async fn acquire(&self, family: EndpointFamily) {
        if let Some(limiter) = self.limiters.get(&family) {
            limiter.until_ready().await;
            trace!("rate limit permit granted for {family}");
        }
    }
}

impl Default for EsiRateLimiter {
    fn default() -> Self {
        Self::new(RateLimitConfig::default())
    }
}

impl fmt::Debug for EsiRateLimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EsiRateLimiter")
            .field("families", &self.limiters.len())
            .finish()
    }
}
