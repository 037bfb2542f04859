//! Weighted fair draw.
//!
//! Every draw is driven by a seed. Draw `n` takes the first 16 bytes of
//! `sha256("{seed}:{n}")` as a big-endian `u128`, reduces it modulo the total
//! eligible weight, and binary-searches the cumulative weight array for the
//! ticket that covers it. Publishing the seed lets anyone replay the result.

use std::collections::HashSet;

use prizebot_db::entities::giveaway_entry;
use rand::RngCore;
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};

/// One candidate in a draw.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ticket {
    /// Member id. Unique within a giveaway.
    pub id: String,
    /// Relative chance of being picked. Non-positive weights never win.
    pub weight: i64,
    /// Entered from a bot account.
    pub is_bot: bool,
    /// Flagged as a likely alternate account.
    pub suspicious_alt: bool,
}

impl From<&giveaway_entry::Model> for Ticket {
    fn from(entry: &giveaway_entry::Model) -> Self {
        Self {
            id: entry.user_id.clone(),
            weight: i64::from(entry.weight),
            is_bot: entry.is_bot,
            suspicious_alt: entry.suspicious_alt,
        }
    }
}

/// Draw options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrawOptions {
    /// Skip tickets with `is_bot` set.
    pub exclude_bots: bool,
    /// Skip tickets with `suspicious_alt` set.
    pub exclude_suspicious: bool,
    /// Replay seed. A fresh one is generated when unset.
    pub seed: Option<String>,
    /// Let one ticket win more than once.
    pub allow_repeat: bool,
}

impl Default for DrawOptions {
    fn default() -> Self {
        Self {
            exclude_bots: true,
            exclude_suspicious: false,
            seed: None,
            allow_repeat: false,
        }
    }
}

/// Result of a draw.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrawOutcome {
    /// Picked tickets in pick order.
    pub winners: Vec<Ticket>,
    /// Seed the draw ran with, generated or supplied.
    pub seed_used: String,
    /// Tickets left after filtering.
    pub total_eligible: usize,
    /// Requested winners that could not be filled.
    pub shortfall: usize,
}

/// Generate a fresh seed from the OS random source.
#[must_use]
pub fn generate_seed() -> String {
    let mut bytes = [0u8; 16];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Reduce `sha256("{seed}:{counter}")` into `[0, total)`.
fn ticket_number(seed: &str, counter: u64, total: u128) -> u128 {
    let digest = Sha256::digest(format!("{seed}:{counter}").as_bytes());
    let mut head = [0u8; 16];
    head.copy_from_slice(&digest[..16]);
    u128::from_be_bytes(head) % total
}

/// Pick up to `k` winners from `tickets`.
///
/// Higher weights win proportionally more often. Without `allow_repeat` a
/// ticket is picked at most once; colliding draws are discarded and redrawn
/// with the next counter value.
#[must_use]
pub fn pick(tickets: &[Ticket], k: usize, options: &DrawOptions) -> DrawOutcome {
    let seed = options.seed.clone().unwrap_or_else(generate_seed);

    let eligible: Vec<&Ticket> = tickets
        .iter()
        .filter(|t| t.weight > 0)
        .filter(|t| !(options.exclude_bots && t.is_bot))
        .filter(|t| !(options.exclude_suspicious && t.suspicious_alt))
        .collect();

    if eligible.is_empty() || k == 0 {
        return DrawOutcome {
            winners: Vec::new(),
            seed_used: seed,
            total_eligible: eligible.len(),
            shortfall: k,
        };
    }

    let mut cumulative = Vec::with_capacity(eligible.len());
    let mut total: u128 = 0;
    for ticket in &eligible {
        total += ticket.weight as u128;
        cumulative.push(total);
    }

    let target = if options.allow_repeat {
        k
    } else {
        k.min(eligible.len())
    };

    let mut winners = Vec::with_capacity(target);
    let mut chosen = HashSet::with_capacity(target);
    let mut counter: u64 = 0;

    while winners.len() < target {
        let r = ticket_number(&seed, counter, total);
        counter += 1;

        // First prefix sum strictly greater than r.
        let index = cumulative.partition_point(|&sum| sum <= r);
        if !options.allow_repeat && !chosen.insert(index) {
            continue;
        }
        winners.push(eligible[index].clone());
    }

    DrawOutcome {
        shortfall: k.saturating_sub(winners.len()),
        winners,
        seed_used: seed,
        total_eligible: eligible.len(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn ticket(id: &str, weight: i64) -> Ticket {
        Ticket {
            id: id.to_string(),
            weight,
            is_bot: false,
            suspicious_alt: false,
        }
    }

    fn seeded(seed: &str) -> DrawOptions {
        DrawOptions {
            seed: Some(seed.to_string()),
            ..DrawOptions::default()
        }
    }

    fn ids(outcome: &DrawOutcome) -> Vec<&str> {
        outcome.winners.iter().map(|t| t.id.as_str()).collect()
    }

    #[test]
    fn test_same_seed_same_result() {
        let tickets: Vec<_> = (0..20).map(|i| ticket(&format!("u{i}"), 1 + i % 3)).collect();

        let first = pick(&tickets, 5, &seeded("audit-seed"));
        let second = pick(&tickets, 5, &seeded("audit-seed"));

        assert_eq!(ids(&first), ids(&second));
        assert_eq!(first.seed_used, "audit-seed");
    }

    #[test]
    fn test_generated_seed_replays() {
        let tickets: Vec<_> = (0..10).map(|i| ticket(&format!("u{i}"), 2)).collect();

        let original = pick(&tickets, 3, &DrawOptions::default());
        assert_eq!(original.seed_used.len(), 32);

        let replay = pick(&tickets, 3, &seeded(&original.seed_used));
        assert_eq!(ids(&original), ids(&replay));
    }

    #[test]
    fn test_weight_bias() {
        let tickets = vec![ticket("low", 1), ticket("high", 5)];

        let high_wins = (0..400)
            .filter(|i| {
                let outcome = pick(&tickets, 1, &seeded(&format!("trial-{i}")));
                outcome.winners[0].id == "high"
            })
            .count();

        assert!(high_wins > 240, "high won only {high_wins} of 400");
    }

    #[test]
    fn test_never_over_selects() {
        let tickets = vec![ticket("a", 1), ticket("b", 3), ticket("c", 1)];

        for k in 0..6 {
            let outcome = pick(&tickets, k, &seeded("bound"));
            assert_eq!(outcome.winners.len(), k.min(3));
            assert_eq!(outcome.shortfall, k - outcome.winners.len());

            let unique: HashSet<_> = ids(&outcome).into_iter().collect();
            assert_eq!(unique.len(), outcome.winners.len());
        }
    }

    #[test]
    fn test_bots_excluded_by_default() {
        let mut bot = ticket("bot", 100);
        bot.is_bot = true;
        let tickets = vec![bot, ticket("human", 1)];

        let outcome = pick(&tickets, 2, &seeded("bots"));

        assert_eq!(ids(&outcome), vec!["human"]);
        assert_eq!(outcome.total_eligible, 1);
        assert_eq!(outcome.shortfall, 1);
    }

    #[test]
    fn test_suspicious_only_excluded_on_request() {
        let mut alt = ticket("alt", 1);
        alt.suspicious_alt = true;
        let tickets = vec![alt];

        let kept = pick(&tickets, 1, &seeded("alts"));
        assert_eq!(ids(&kept), vec!["alt"]);

        let options = DrawOptions {
            exclude_suspicious: true,
            ..seeded("alts")
        };
        let dropped = pick(&tickets, 1, &options);
        assert!(dropped.winners.is_empty());
        assert_eq!(dropped.shortfall, 1);
    }

    #[test]
    fn test_zero_weight_dropped() {
        let tickets = vec![ticket("zero", 0), ticket("neg", -2)];

        let outcome = pick(&tickets, 1, &seeded("empty"));

        assert!(outcome.winners.is_empty());
        assert_eq!(outcome.total_eligible, 0);
        assert_eq!(outcome.shortfall, 1);
    }

    #[test]
    fn test_allow_repeat_fills_k() {
        let tickets = vec![ticket("only", 1)];
        let options = DrawOptions {
            allow_repeat: true,
            ..seeded("repeat")
        };

        let outcome = pick(&tickets, 3, &options);

        assert_eq!(ids(&outcome), vec!["only", "only", "only"]);
        assert_eq!(outcome.shortfall, 0);
    }

    #[test]
    fn test_ticket_number_in_range() {
        for counter in 0..100 {
            assert!(ticket_number("range", counter, 7) < 7);
        }
    }
}
