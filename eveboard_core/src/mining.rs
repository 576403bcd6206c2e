use serde::{Deserialize, Serialize};

/// Inputs to the mining yield estimate.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct MiningProfile {
    pub mining_skill: u8,
    pub base_yield: f64,
    pub fleet_bonus: f64,
}

impl Default for MiningProfile {
    fn default() -> Self {
        Self {
            mining_skill: 5,
            base_yield: 100.0,
            fleet_bonus: 0.1,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct MiningYieldDetails {
    pub base_yield: f64,
    pub skill_bonus: f64,
    pub boost_bonus: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct MiningYield {
    pub yield_per_hour: f64,
    pub details: MiningYieldDetails,
}

/// Each skill level adds 2% to the ship's base yield; fleet boosts multiply on top.
pub fn compute_mining_yield(profile: &MiningProfile) -> MiningYield {
    let skill_bonus = 1.0 + f64::from(profile.mining_skill) * 0.02;
    let boost_bonus = 1.0 + profile.fleet_bonus;

    MiningYield {
        yield_per_hour: profile.base_yield * skill_bonus * boost_bonus,
        details: MiningYieldDetails {
            base_yield: profile.base_yield,
            skill_bonus,
            boost_bonus,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::{MiningProfile, compute_mining_yield};

    #[test]
    fn default_profile_matches_dashboard_estimate() {
        let result = compute_mining_yield(&MiningProfile::default());
        assert!((result.yield_per_hour - 121.0).abs() < 1e-9);
        assert!((result.details.skill_bonus - 1.1).abs() < 1e-9);
        assert!((result.details.boost_bonus - 1.1).abs() < 1e-9);
    }

    #[test]
    fn untrained_pilot_without_boosts_gets_base_yield() {
        let result = compute_mining_yield(&MiningProfile {
            mining_skill: 0,
            base_yield: 250.0,
            fleet_bonus: 0.0,
        });
        assert_eq!(result.yield_per_hour, 250.0);
    }
}
