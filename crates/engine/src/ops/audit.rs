use std::collections::HashMap;

use serde::Serialize;

use crate::{ResultEngine, accounts, movements, movements::validate_sides, store};

use super::Engine;

/// Stored totals that disagree with the movements of an account.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TotalsDrift {
    pub account_id: String,
    pub kind: String,
    pub stored_deposit_minor: i64,
    pub stored_withdrawal_minor: i64,
    /// Sum of the movements, clamped to the `i64` range.
    pub ledger_deposit_minor: i64,
    pub ledger_withdrawal_minor: i64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkProblem {
    /// The linked record does not exist or is deleted.
    Missing,
    /// The linked record is on the same account.
    SameAccount,
    /// The linked record does not point back.
    NotReciprocal,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BrokenLink {
    pub movement_id: String,
    pub linked_id: String,
    pub problem: LinkProblem,
}

/// Result of [`Engine::audit`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct AuditReport {
    pub accounts_checked: usize,
    pub movements_checked: usize,
    pub drifts: Vec<TotalsDrift>,
    pub broken_links: Vec<BrokenLink>,
    /// Ids of movements with both or neither side set, or a negative side.
    pub malformed_movements: Vec<String>,
}

impl AuditReport {
    pub fn is_clean(&self) -> bool {
        self.drifts.is_empty() && self.broken_links.is_empty() && self.malformed_movements.is_empty()
    }
}

impl Engine {
    /// Replays every live movement and compares the result with the stored
    /// account totals and links. Read-only.
    ///
    /// Malformed movements are reported and left out of the replayed totals.
    pub async fn audit(&self) -> ResultEngine<AuditReport> {
        let account_models = store::live_account_models(&self.database).await?;
        let movement_models = store::live_movement_models(&self.database).await?;

        let report = build_report(&account_models, &movement_models);
        tracing::debug!(
            accounts = report.accounts_checked,
            movements = report.movements_checked,
            clean = report.is_clean(),
            "ledger audited"
        );
        Ok(report)
    }
}

fn build_report(
    account_models: &[accounts::Model],
    movement_models: &[movements::Model],
) -> AuditReport {
    let by_id: HashMap<&str, &movements::Model> = movement_models
        .iter()
        .map(|model| (model.id.as_str(), model))
        .collect();

    let mut report = AuditReport {
        accounts_checked: account_models.len(),
        movements_checked: movement_models.len(),
        ..AuditReport::default()
    };

    // Summed as i128 so an overflowing ledger still compares unequal.
    let mut replayed: HashMap<&str, (i128, i128)> = HashMap::new();
    for model in movement_models {
        if validate_sides(model.deposit_minor, model.withdrawal_minor).is_err() {
            report.malformed_movements.push(model.id.clone());
        } else {
            let totals = replayed.entry(model.account_id.as_str()).or_default();
            totals.0 += i128::from(model.deposit_minor);
            totals.1 += i128::from(model.withdrawal_minor);
        }

        // A counterpart points back through `mirror_id`, a primary record
        // through `customer_movement_id` when this one is its customer record.
        if let Some(linked_id) = &model.mirror_id {
            let problem = check_link(model, linked_id, &by_id, |linked| {
                linked.mirror_id.as_deref() == Some(model.id.as_str())
                    || linked.customer_movement_id.as_deref() == Some(model.id.as_str())
            });
            if let Some(problem) = problem {
                report.broken_links.push(BrokenLink {
                    movement_id: model.id.clone(),
                    linked_id: linked_id.clone(),
                    problem,
                });
            }
        }
        if let Some(linked_id) = &model.customer_movement_id {
            let problem = check_link(model, linked_id, &by_id, |linked| {
                linked.mirror_id.as_deref() == Some(model.id.as_str())
            });
            if let Some(problem) = problem {
                report.broken_links.push(BrokenLink {
                    movement_id: model.id.clone(),
                    linked_id: linked_id.clone(),
                    problem,
                });
            }
        }
    }

    for account in account_models {
        let (deposit_minor, withdrawal_minor) = replayed
            .get(account.id.as_str())
            .copied()
            .unwrap_or_default();
        if deposit_minor != i128::from(account.deposit_minor)
            || withdrawal_minor != i128::from(account.withdrawal_minor)
        {
            report.drifts.push(TotalsDrift {
                account_id: account.id.clone(),
                kind: account.kind.clone(),
                stored_deposit_minor: account.deposit_minor,
                stored_withdrawal_minor: account.withdrawal_minor,
                ledger_deposit_minor: clamp_minor(deposit_minor),
                ledger_withdrawal_minor: clamp_minor(withdrawal_minor),
            });
        }
    }

    report.drifts.sort_by(|a, b| a.account_id.cmp(&b.account_id));
    report
        .broken_links
        .sort_by(|a, b| a.movement_id.cmp(&b.movement_id));
    report.malformed_movements.sort();
    report
}

fn clamp_minor(value: i128) -> i64 {
    i64::try_from(value).unwrap_or(if value < 0 { i64::MIN } else { i64::MAX })
}

fn check_link(
    model: &movements::Model,
    linked_id: &str,
    by_id: &HashMap<&str, &movements::Model>,
    points_back: impl Fn(&movements::Model) -> bool,
) -> Option<LinkProblem> {
    let Some(linked) = by_id.get(linked_id) else {
        return Some(LinkProblem::Missing);
    };
    if linked.account_id == model.account_id {
        return Some(LinkProblem::SameAccount);
    }
    if !points_back(linked) {
        return Some(LinkProblem::NotReciprocal);
    }
    None
}
