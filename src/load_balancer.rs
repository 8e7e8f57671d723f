// Copyright 2024 Saorsa Labs
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Load-balancer strategies for choosing which remote a shard lands on.
//!
//! Three of the four strategies are pure functions of catalogue/load-balancer state; only
//! [`Strategy::ResourceBased`] issues remote calls (querying free space) to make its pick.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::catalogue::{LoadBalancerState, Remote};
use crate::error::{DispersionError, Result};
use crate::remote::RemoteAdapter;

/// Selection policy for distributing shards across remotes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Strategy {
    RoundRobin,
    LeastDistributed,
    ResourceBased,
    Boltzmann,
}

impl Strategy {
    /// Parse a strategy name, falling back to [`Strategy::RoundRobin`] for anything
    /// unrecognized — the documented fallback behaviour for an unknown CLI argument.
    pub fn parse_or_default(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "leastdistributed" | "least_distributed" => Strategy::LeastDistributed,
            "resourcebased" | "resource_based" => Strategy::ResourceBased,
            "boltzmann" => Strategy::Boltzmann,
            "roundrobin" | "round_robin" | _ => Strategy::RoundRobin,
        }
    }
}

/// Pick the next remote for a single shard under `strategy`.
///
/// `round_robin_index` is the caller's pre-reserved index from
/// [`crate::catalogue::LoadBalancerStore::next_round_robin`] (only meaningful for
/// [`Strategy::RoundRobin`]); other strategies ignore it.
pub async fn choose_remote(
    strategy: Strategy,
    remotes: &[Remote],
    lb_state: &LoadBalancerState,
    round_robin_index: Option<usize>,
    adapters: &[&(dyn RemoteAdapter)],
    boltzmann_seed: u64,
    boltzmann_temperature: f64,
) -> Result<Remote> {
    if remotes.is_empty() {
        return Err(DispersionError::NoRemoteAvailable);
    }

    match strategy {
        Strategy::RoundRobin => {
            let idx = round_robin_index.unwrap_or(0) % remotes.len();
            Ok(remotes[idx].clone())
        }
        Strategy::LeastDistributed => Ok(least_distributed(remotes, lb_state)),
        Strategy::Boltzmann => Ok(boltzmann_select(
            remotes,
            lb_state,
            boltzmann_temperature,
            boltzmann_seed,
        )),
        Strategy::ResourceBased => resource_based(remotes, adapters).await,
    }
}

fn least_distributed(remotes: &[Remote], lb_state: &LoadBalancerState) -> Remote {
    remotes
        .iter()
        .min_by_key(|r| lb_state.shard_count_for(r))
        .cloned()
        .expect("remotes is non-empty, checked by caller")
}

fn boltzmann_select(
    remotes: &[Remote],
    lb_state: &LoadBalancerState,
    temperature: f64,
    seed: u64,
) -> Remote {
    let weights: Vec<f64> = remotes
        .iter()
        .map(|r| (-(lb_state.shard_count_for(r) as f64) / temperature).exp())
        .collect();
    let total: f64 = weights.iter().sum();
    let mut rng = StdRng::seed_from_u64(seed);
    let draw: f64 = rng.gen_range(0.0..total.max(f64::MIN_POSITIVE));
    let mut cumulative = 0.0;
    for (remote, weight) in remotes.iter().zip(weights.iter()) {
        cumulative += weight;
        if draw <= cumulative {
            return remote.clone();
        }
    }
    remotes.last().cloned().expect("remotes is non-empty, checked by caller")
}

async fn resource_based(
    remotes: &[Remote],
    adapters: &[&(dyn RemoteAdapter)],
) -> Result<Remote> {
    let mut best: Option<(usize, u64)> = None;
    for (idx, adapter) in adapters.iter().enumerate() {
        if let Ok(info) = adapter.about().await {
            if best.map(|(_, free)| info.free_bytes > free).unwrap_or(true) {
                best = Some((idx, info.free_bytes));
            }
        }
    }
    match best {
        Some((idx, _)) => Ok(remotes[idx].clone()),
        None => Err(DispersionError::NoRemoteAvailable),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::InMemoryRemote;

    fn remotes(names: &[&str]) -> Vec<Remote> {
        names
            .iter()
            .map(|n| Remote {
                name: n.to_string(),
                kind: "memory".into(),
            })
            .collect()
    }

    #[tokio::test]
    async fn round_robin_uses_given_index() {
        let rs = remotes(&["a", "b", "c"]);
        let lb = LoadBalancerState::default();
        let chosen = choose_remote(Strategy::RoundRobin, &rs, &lb, Some(1), &[], 0, 1.0)
            .await
            .unwrap();
        assert_eq!(chosen.name, "b");
    }

    #[tokio::test]
    async fn least_distributed_picks_lowest_count() {
        let rs = remotes(&["a", "b"]);
        let mut lb = LoadBalancerState::default();
        lb.increment(&rs[0]);
        lb.increment(&rs[0]);
        let chosen = choose_remote(Strategy::LeastDistributed, &rs, &lb, None, &[], 0, 1.0)
            .await
            .unwrap();
        assert_eq!(chosen.name, "b");
    }

    #[tokio::test]
    async fn boltzmann_is_deterministic_for_a_fixed_seed() {
        let rs = remotes(&["a", "b", "c"]);
        let lb = LoadBalancerState::default();
        let first = choose_remote(Strategy::Boltzmann, &rs, &lb, None, &[], 42, 1.0)
            .await
            .unwrap();
        let second = choose_remote(Strategy::Boltzmann, &rs, &lb, None, &[], 42, 1.0)
            .await
            .unwrap();
        assert_eq!(first.name, second.name);
    }

    #[tokio::test]
    async fn resource_based_picks_most_free_space() {
        let rs = remotes(&["a", "b"]);
        let lb = LoadBalancerState::default();
        let r_a = InMemoryRemote::new("a", 100);
        let r_b = InMemoryRemote::new("b", 1000);
        let adapters: Vec<&(dyn RemoteAdapter)> = vec![&r_a, &r_b];
        let chosen = choose_remote(Strategy::ResourceBased, &rs, &lb, None, &adapters, 0, 1.0)
            .await
            .unwrap();
        assert_eq!(chosen.name, "b");
    }

    #[tokio::test]
    async fn no_remotes_is_an_error() {
        let lb = LoadBalancerState::default();
        let err = choose_remote(Strategy::RoundRobin, &[], &lb, None, &[], 0, 1.0)
            .await
            .unwrap_err();
        assert!(matches!(err, DispersionError::NoRemoteAvailable));
    }

    #[test]
    fn unknown_strategy_name_falls_back_to_round_robin() {
        assert_eq!(Strategy::parse_or_default("quantum"), Strategy::RoundRobin);
        assert_eq!(Strategy::parse_or_default("boltzmann"), Strategy::Boltzmann);
    }
}
