//! per-subset cost pruning (§4.H step 4/5) and cross-subset selection
//! (§4.H step 6).
//!
//! a selection's cost is the sum of its slots' truth-upload fee plus
//! the chosen method's usage fee. costs are compared with
//! [`Money::le_same_currency`], a partial order: two selections priced
//! in different currencies are incomparable, not equal. the open
//! question this resolves (§9) is answered as "never discard on an
//! incomparable comparison" — a selection survives unless some other
//! selection is priced strictly lower in the *same* currency. mixed
//! selections that cannot be reduced to one currency are always kept,
//! since there is no common unit to rank them against the rest.

use crate::types::{SubsetCandidates, SubsetSelection};
use anastasis_types::{Money, ProviderConfig};
use std::collections::{HashMap, HashSet};

fn method_type_at(provider: &ProviderConfig, slot_method_index: usize, method_indices: &[usize], methods_types: &[anastasis_types::MethodType]) -> Option<Money> {
    let wanted = &methods_types[method_indices[slot_method_index]];
    provider
        .methods
        .iter()
        .find(|m| &m.method_type == wanted)
        .map(|m| m.usage_fee)
}

/// cost of one (method, provider) pair: the provider's truth-upload
/// fee plus the method's usage fee at that provider.
fn pair_cost(provider: &ProviderConfig, slot: usize, method_indices: &[usize], method_types: &[anastasis_types::MethodType]) -> Option<Money> {
    let usage_fee = method_type_at(provider, slot, method_indices, method_types)?;
    provider.truth_upload_fee.checked_add(&usage_fee)
}

/// the `(method index, provider url)` pairs one selection names, in
/// slot order.
fn selection_pairs(selection: &SubsetSelection, method_indices: &[usize]) -> Vec<(usize, String)> {
    method_indices
        .iter()
        .zip(selection.provider_urls.iter())
        .map(|(&mi, url)| (mi, url.clone()))
        .collect()
}

/// total cost of one selection, or `None` if its slots span more than
/// one currency and cannot be reduced to a single total.
pub fn selection_cost(
    selection: &SubsetSelection,
    method_indices: &[usize],
    method_types: &[anastasis_types::MethodType],
    providers_by_url: &HashMap<String, ProviderConfig>,
) -> Option<Money> {
    let mut total: Option<Money> = None;
    for (slot, url) in selection.provider_urls.iter().enumerate() {
        let provider = providers_by_url.get(url)?;
        let slot_cost = pair_cost(provider, slot, method_indices, method_types)?;
        total = Some(match total {
            None => slot_cost,
            Some(acc) => acc.checked_add(&slot_cost)?,
        });
    }
    total
}

/// running cost total across already-chosen subsets, grouped by
/// currency — the "set of currency sums" the step-6 comparator is
/// defined over.
#[derive(Debug, Clone, Default)]
struct CurrencyTotals(HashMap<String, Money>);

impl CurrencyTotals {
    fn add(&mut self, cost: &Money) {
        let currency = cost.currency_str().to_string();
        let entry = self.0.entry(currency.clone()).or_insert_with(|| Money::zero(&currency));
        if let Some(sum) = entry.checked_add(cost) {
            *entry = sum;
        }
    }

    /// `self` beats `other` when `self` has a lower-or-missing cost in
    /// every currency `other` carries, and strictly lower in at least
    /// one (§4.H step 6). a currency missing from `self` reads as
    /// zero, which is always lower-or-equal.
    fn beats(&self, other: &CurrencyTotals) -> bool {
        let mut strictly_lower = false;
        for (currency, other_cost) in &other.0 {
            match self.0.get(currency) {
                Some(mine) => match mine.le_same_currency(other_cost) {
                    Some(true) => {
                        if mine != other_cost {
                            strictly_lower = true;
                        }
                    }
                    _ => return false,
                },
                None if !other_cost.is_zero() => strictly_lower = true,
                None => {}
            }
        }
        strictly_lower
    }
}

/// the non-dominated selections of one subset: every selection for
/// which no other selection is strictly cheaper in a directly
/// comparable currency.
pub fn minimal_cost_selections(
    selections: &[SubsetSelection],
    method_indices: &[usize],
    method_types: &[anastasis_types::MethodType],
    providers_by_url: &HashMap<String, ProviderConfig>,
) -> Vec<SubsetSelection> {
    let costs: Vec<Option<Money>> = selections
        .iter()
        .map(|s| selection_cost(s, method_indices, method_types, providers_by_url))
        .collect();

    selections
        .iter()
        .enumerate()
        .filter(|(i, _)| {
            let my_cost = &costs[*i];
            !costs.iter().enumerate().any(|(j, other_cost)| {
                if j == *i {
                    return false;
                }
                match (my_cost, other_cost) {
                    (Some(mine), Some(other)) => {
                        matches!(other.le_same_currency(mine), Some(true)) && other != mine
                    }
                    _ => false,
                }
            })
        })
        .map(|(_, s)| s.clone())
        .collect()
}

/// choose exactly one selection per subset, minimizing the running
/// total cost summed over *distinct* `(method, provider)` pairs so a
/// truth shared by two policies is only charged once, with the count
/// of `(method, provider)` pairs reused across subsets (duplicate
/// pairs) as a second-order tie-break (§4.H step 6).
///
/// subsets are processed in the order given, greedily: for each
/// subset's already-pruned candidates ([`minimal_cost_selections`]),
/// the candidate is picked whose *new* pairs (not already charged by
/// an earlier subset) add the least cost, breaking ties on fewer
/// reused pairs and finally on first occurrence. this is a bounded
/// heuristic for what is otherwise a weighted-set-cover problem;
/// [`crate::types::MAX_EVALUATIONS`] still bounds the number of
/// candidates inspected, same as the per-subset search.
pub fn choose_cross_subset_selections(
    subsets: &[SubsetCandidates],
    method_types: &[anastasis_types::MethodType],
    providers_by_url: &HashMap<String, ProviderConfig>,
    budget: &mut usize,
) -> Vec<(Vec<usize>, SubsetSelection)> {
    let mut used_pairs: HashSet<(usize, String)> = HashSet::new();
    let mut chosen = Vec::new();

    for subset in subsets {
        if subset.selections.is_empty() || *budget == 0 {
            continue;
        }

        let mut best: Option<(usize, CurrencyTotals, usize)> = None;
        for (idx, selection) in subset.selections.iter().enumerate() {
            if *budget == 0 {
                break;
            }
            *budget -= 1;

            let mut marginal = CurrencyTotals::default();
            let mut duplicate_count = 0usize;
            for (slot, url) in selection.provider_urls.iter().enumerate() {
                let Some(provider) = providers_by_url.get(url) else { continue };
                let Some(cost) = pair_cost(provider, slot, &subset.method_indices, method_types) else { continue };
                let key = (subset.method_indices[slot], url.clone());
                if used_pairs.contains(&key) {
                    duplicate_count += 1;
                } else {
                    marginal.add(&cost);
                }
            }

            let improves = match &best {
                None => true,
                Some((_, best_marginal, best_dup)) => {
                    if marginal.beats(best_marginal) {
                        true
                    } else if best_marginal.beats(&marginal) {
                        false
                    } else {
                        duplicate_count < *best_dup
                    }
                }
            };
            if improves {
                best = Some((idx, marginal, duplicate_count));
            }
        }

        if let Some((idx, _, _)) = best {
            let selection = subset.selections[idx].clone();
            for pair in selection_pairs(&selection, &subset.method_indices) {
                used_pairs.insert(pair);
            }
            chosen.push((subset.method_indices.clone(), selection));
        }
    }

    chosen
}

#[cfg(test)]
mod tests {
    use super::*;
    use anastasis_types::{MethodType, ProviderMethodFee, VersionInfo};

    fn provider(url: &str, currency: &str, upload: u64, usage: u64, method_type: MethodType) -> ProviderConfig {
        let mut upload_fee = Money::zero(currency);
        upload_fee.value = upload;
        let mut usage_fee = Money::zero(currency);
        usage_fee.value = usage;
        ProviderConfig {
            url: url.to_string(),
            currency: currency.to_string(),
            business_name: url.to_string(),
            methods: vec![ProviderMethodFee { method_type, usage_fee }],
            storage_limit_in_megabytes: 16,
            annual_fee: Money::zero(currency),
            truth_upload_fee: upload_fee,
            liability_limit: Money::zero(currency),
            salt: [0; 32],
            version: VersionInfo { current: 1, revision: 0, age: 0 },
        }
    }

    #[test]
    fn cheaper_same_currency_selection_wins() {
        let method_types = vec![MethodType::Question];
        let mut providers = HashMap::new();
        providers.insert("https://cheap".to_string(), provider("https://cheap", "KUDOS", 1, 0, MethodType::Question));
        providers.insert("https://pricey".to_string(), provider("https://pricey", "KUDOS", 5, 0, MethodType::Question));

        let selections = vec![
            SubsetSelection { provider_urls: vec!["https://cheap".into()] },
            SubsetSelection { provider_urls: vec!["https://pricey".into()] },
        ];
        let minimal = minimal_cost_selections(&selections, &[0], &method_types, &providers);
        assert_eq!(minimal.len(), 1);
        assert_eq!(minimal[0].provider_urls[0], "https://cheap");
    }

    #[test]
    fn incomparable_currencies_both_survive() {
        let method_types = vec![MethodType::Question];
        let mut providers = HashMap::new();
        providers.insert("https://a".to_string(), provider("https://a", "KUDOS", 1, 0, MethodType::Question));
        providers.insert("https://b".to_string(), provider("https://b", "EUR", 1, 0, MethodType::Question));

        let selections = vec![
            SubsetSelection { provider_urls: vec!["https://a".into()] },
            SubsetSelection { provider_urls: vec!["https://b".into()] },
        ];
        let minimal = minimal_cost_selections(&selections, &[0], &method_types, &providers);
        assert_eq!(minimal.len(), 2);
    }

    #[test]
    fn cross_subset_reuses_already_charged_pairs_for_free() {
        let method_types = vec![MethodType::Question, MethodType::Email];
        let mut providers = HashMap::new();
        providers.insert(
            "https://a".to_string(),
            provider("https://a", "KUDOS", 1, 0, MethodType::Question),
        );
        providers.insert(
            "https://b".to_string(),
            provider("https://b", "KUDOS", 5, 0, MethodType::Question),
        );

        // two subsets that both could use method 0 at either provider;
        // having already charged (0, "https://a") in the first subset,
        // the second subset should prefer reusing it over paying again
        // for "https://b".
        let subsets = vec![
            SubsetCandidates {
                method_indices: vec![0],
                selections: vec![SubsetSelection { provider_urls: vec!["https://a".into()] }],
            },
            SubsetCandidates {
                method_indices: vec![0],
                selections: vec![
                    SubsetSelection { provider_urls: vec!["https://a".into()] },
                    SubsetSelection { provider_urls: vec!["https://b".into()] },
                ],
            },
        ];

        let mut budget = 1_000;
        let chosen = choose_cross_subset_selections(&subsets, &method_types, &providers, &mut budget);
        assert_eq!(chosen.len(), 2);
        assert_eq!(chosen[1].1.provider_urls[0], "https://a");
    }

    #[test]
    fn cross_subset_skips_subsets_with_no_candidates() {
        let method_types = vec![MethodType::Question];
        let providers = HashMap::new();
        let subsets = vec![SubsetCandidates { method_indices: vec![0], selections: Vec::new() }];
        let mut budget = 100;
        let chosen = choose_cross_subset_selections(&subsets, &method_types, &providers, &mut budget);
        assert!(chosen.is_empty());
    }
}
