//! per-subset provider assignment: §4.H steps 3-5.
//!
//! for one k-subset of methods, find every diversity-maximal,
//! fee-inequivalent way to assign a provider to each slot.

use crate::types::{AuthMethodInput, SubsetCandidates, SubsetSelection, UPLOAD_SAFETY_MARGIN_BYTES};
use anastasis_types::{Money, ProviderConfig};

/// a provider's fee shape: its truth-upload fee plus the (type,
/// usage-fee) set for every method it offers, sorted so two
/// fee-identical providers compare equal regardless of method order
/// (§4.H step 4's equivalence rule).
#[derive(Debug, Clone, PartialEq, Eq)]
struct FeeSignature {
    truth_upload_fee: Money,
    method_fees: Vec<(String, Money)>,
}

fn fee_signature(provider: &ProviderConfig) -> FeeSignature {
    let mut method_fees: Vec<(String, Money)> = provider
        .methods
        .iter()
        .map(|m| (m.method_type.to_string(), m.usage_fee))
        .collect();
    method_fees.sort_by(|a, b| a.0.cmp(&b.0));
    FeeSignature {
        truth_upload_fee: provider.truth_upload_fee,
        method_fees,
    }
}

/// providers eligible for one slot: offer the method's type and can
/// take a challenge of `byte_size + 1024` bytes within their upload
/// limit (§4.H step 3).
fn eligible_providers<'a>(method: &AuthMethodInput, providers: &'a [ProviderConfig]) -> Vec<&'a ProviderConfig> {
    let required_bytes = method.byte_size + UPLOAD_SAFETY_MARGIN_BYTES;
    providers
        .iter()
        .filter(|p| {
            let limit_bytes = (p.storage_limit_in_megabytes as u64) * 1024 * 1024;
            limit_bytes >= required_bytes as u64
                && p.methods.iter().any(|m| m.method_type == method.method_type)
        })
        .collect()
}

/// backtracking search over one subset's slots, bounded by the
/// shared evaluation budget (§4.H step 7).
pub fn plan_subset(
    method_indices: &[usize],
    methods: &[AuthMethodInput],
    providers: &[ProviderConfig],
    budget: &mut usize,
) -> SubsetCandidates {
    let slots: Vec<Vec<&ProviderConfig>> = method_indices
        .iter()
        .map(|&mi| eligible_providers(&methods[mi], providers))
        .collect();

    if slots.iter().any(|s| s.is_empty()) {
        return SubsetCandidates {
            method_indices: method_indices.to_vec(),
            selections: Vec::new(),
        };
    }

    let mut best_diversity = 0usize;
    let mut kept: Vec<(SubsetSelection, Vec<FeeSignature>)> = Vec::new();
    let mut current = Vec::with_capacity(slots.len());

    search(
        &slots,
        0,
        &mut current,
        budget,
        &mut best_diversity,
        &mut kept,
    );

    SubsetCandidates {
        method_indices: method_indices.to_vec(),
        selections: kept.into_iter().map(|(s, _)| s).collect(),
    }
}

#[allow(clippy::too_many_arguments)]
fn search<'a>(
    slots: &[Vec<&'a ProviderConfig>],
    slot: usize,
    current: &mut Vec<&'a ProviderConfig>,
    budget: &mut usize,
    best_diversity: &mut usize,
    kept: &mut Vec<(SubsetSelection, Vec<FeeSignature>)>,
) {
    if *budget == 0 {
        return;
    }
    if slot == slots.len() {
        *budget -= 1;

        let selection = SubsetSelection {
            provider_urls: current.iter().map(|p| p.url.clone()).collect(),
        };
        let diversity = selection.diversity();
        let signatures: Vec<FeeSignature> = current.iter().map(|p| fee_signature(p)).collect();

        match diversity.cmp(best_diversity) {
            std::cmp::Ordering::Less => {
                // strictly worse than the best seen for this subset: discard.
            }
            std::cmp::Ordering::Greater => {
                // new high: previous selections no longer diversity-maximal.
                *best_diversity = diversity;
                kept.clear();
                kept.push((selection, signatures));
            }
            std::cmp::Ordering::Equal => {
                let is_fresh_class = !kept.iter().any(|(_, existing_sig)| existing_sig == &signatures);
                if is_fresh_class {
                    kept.push((selection, signatures));
                }
            }
        }
        return;
    }

    for provider in &slots[slot] {
        current.push(provider);
        search(slots, slot + 1, current, budget, best_diversity, kept);
        current.pop();
        if *budget == 0 {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anastasis_types::{MethodType, ProviderMethodFee, VersionInfo};

    fn provider(url: &str, currency: &str, upload_fee_value: u64, method_types: &[MethodType]) -> ProviderConfig {
        ProviderConfig {
            url: url.to_string(),
            currency: currency.to_string(),
            business_name: url.to_string(),
            methods: method_types
                .iter()
                .map(|t| ProviderMethodFee { method_type: t.clone(), usage_fee: Money::zero(currency) })
                .collect(),
            storage_limit_in_megabytes: 16,
            annual_fee: Money::zero(currency),
            truth_upload_fee: Money { value: upload_fee_value, ..Money::zero(currency) },
            liability_limit: Money::zero(currency),
            salt: [0; 32],
            version: VersionInfo { current: 1, revision: 0, age: 0 },
        }
    }

    #[test]
    fn diversity_maximal_selections_only() {
        let methods = vec![
            AuthMethodInput { method_type: MethodType::Question, byte_size: 32 },
            AuthMethodInput { method_type: MethodType::Email, byte_size: 32 },
        ];
        let providers = vec![
            provider("https://a", "KUDOS", 0, &[MethodType::Question, MethodType::Email]),
            provider("https://b", "KUDOS", 0, &[MethodType::Question, MethodType::Email]),
        ];
        let mut budget = 10_000;
        let candidates = plan_subset(&[0, 1], &methods, &providers, &mut budget);

        // the two-distinct-provider selections should win over same-provider ones.
        assert!(candidates.selections.iter().all(|s| s.diversity() == 2));
    }

    #[test]
    fn equivalent_providers_collapse_to_one_selection() {
        let methods = vec![AuthMethodInput { method_type: MethodType::Question, byte_size: 32 }];
        let providers = vec![
            provider("https://a", "KUDOS", 5, &[MethodType::Question]),
            provider("https://b", "KUDOS", 5, &[MethodType::Question]),
        ];
        let mut budget = 10_000;
        let candidates = plan_subset(&[0], &methods, &providers, &mut budget);
        // both providers have identical fee signatures -> one equivalence class.
        assert_eq!(candidates.selections.len(), 1);
    }

    #[test]
    fn providers_lacking_method_or_over_limit_are_excluded() {
        let methods = vec![AuthMethodInput { method_type: MethodType::Sms, byte_size: 32 }];
        let providers = vec![provider("https://a", "KUDOS", 0, &[MethodType::Question])];
        let mut budget = 10_000;
        let candidates = plan_subset(&[0], &methods, &providers, &mut budget);
        assert!(candidates.selections.is_empty());
    }
}
