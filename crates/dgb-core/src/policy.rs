//! Escalation policy: violation count -> action.
//!
//! Pure and deterministic: the same (record, now, table) always produces the
//! same result, which is what lets the coordinator recompute safely inside
//! its compare-and-swap retry loop.

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::{
    config::Config,
    domain::{Action, ViolationRecord},
};

/// What a threshold rule escalates to. Warning text stays a template here;
/// the coordinator renders placeholders before dispatch.
#[derive(Clone, Debug, PartialEq, Eq)]
enum RuleKind {
    Warn { template: String, tier: u8 },
    Restrict,
}

#[derive(Clone, Debug)]
struct Rule {
    min_count: u32,
    kind: RuleKind,
}

/// Ordered threshold table, immutable for the process lifetime. Evaluation
/// picks the highest rule whose `min_count` the new count satisfies.
#[derive(Clone, Debug)]
pub struct EscalationTable {
    rules: Vec<Rule>,
    restrict_base: Duration,
    restrict_scale_per_count: Duration,
}

impl EscalationTable {
    pub fn from_config(cfg: &Config) -> Self {
        let rules = vec![
            Rule {
                min_count: 1,
                kind: RuleKind::Warn {
                    template: cfg.warn_tier1_template.clone(),
                    tier: 1,
                },
            },
            Rule {
                min_count: cfg.warn_tier2_at,
                kind: RuleKind::Warn {
                    template: cfg.warn_tier2_template.clone(),
                    tier: 2,
                },
            },
            Rule {
                min_count: cfg.restrict_at,
                kind: RuleKind::Restrict,
            },
        ];

        Self {
            rules,
            restrict_base: cfg.restrict_base,
            restrict_scale_per_count: cfg.restrict_scale_per_count,
        }
    }

    /// Apply one new violation: bump the count, stamp the time, and pick the
    /// action for the new count. `current = None` means a first offense.
    pub fn next(
        &self,
        current: Option<&ViolationRecord>,
        now: DateTime<Utc>,
    ) -> (ViolationRecord, Action) {
        let count = current.map(|r| r.count).unwrap_or(0).saturating_add(1);

        // Highest threshold wins when the count satisfies multiple rules.
        let rule = self
            .rules
            .iter()
            .filter(|r| r.min_count <= count)
            .max_by_key(|r| r.min_count);

        let (action, muted_until) = match rule.map(|r| &r.kind) {
            Some(RuleKind::Warn { template, tier }) => (
                Action::DeleteAndWarn {
                    text: template.clone(),
                    tier: *tier,
                },
                current.and_then(|r| r.muted_until),
            ),
            Some(RuleKind::Restrict) => {
                let duration = self.restrict_duration(count);
                let until =
                    now + chrono::Duration::from_std(duration).unwrap_or_else(|_| chrono::Duration::zero());
                // A new restriction never shortens an active longer one.
                let until = match current.and_then(|r| r.muted_until) {
                    Some(existing) if existing > until => existing,
                    _ => until,
                };
                (Action::DeleteAndRestrict { until }, Some(until))
            }
            None => (Action::DeleteOnly, current.and_then(|r| r.muted_until)),
        };

        let record = ViolationRecord {
            count,
            last_violation_at: now,
            muted_until,
        };
        (record, action)
    }

    fn restrict_duration(&self, count: u32) -> Duration {
        self.restrict_base + self.restrict_scale_per_count * count
    }
}
