//! # anastasis-planner
//!
//! turns a user's chosen authentication methods and a provider
//! catalog into a ranked list of candidate recovery policies (§4.H).
//!
//! the pipeline:
//! 1. [`quorum::quorum_size`] picks how many methods a policy needs.
//! 2. [`quorum::combinations`] enumerates every such subset of methods.
//! 3. [`assignment::plan_subset`] assigns a provider to each slot of a
//!    subset, keeping only diversity-maximal, fee-distinct selections,
//!    under a shared evaluation budget.
//! 4. [`cost::minimal_cost_selections`] keeps only the cheapest,
//!    non-dominated selections per subset.
//! 5. [`cost::choose_cross_subset_selections`] picks exactly one
//!    selection per subset, minimizing the cost summed over distinct
//!    `(method, provider)` pairs across every chosen subset, under the
//!    duplicate-pair penalty of §4.H step 6.

pub mod assignment;
pub mod cost;
pub mod quorum;
pub mod types;

pub use types::{AuthMethodInput, SubsetCandidates, SubsetSelection, MAX_EVALUATIONS, UPLOAD_SAFETY_MARGIN_BYTES};

use anastasis_types::{MethodType, PolicyCandidate, PolicyMethod, ProviderConfig};
use std::collections::HashMap;

/// plan every candidate recovery policy reachable from `methods` using
/// `providers`, spending at most [`MAX_EVALUATIONS`] provider-selection
/// evaluations across the whole run (§4.H step 7), and returning
/// exactly one policy per quorum subset (§4.H step 6).
pub fn plan(methods: &[AuthMethodInput], providers: &[ProviderConfig]) -> Vec<PolicyCandidate> {
    let m = methods.len();
    let k = quorum::quorum_size(m);
    if k == 0 {
        return Vec::new();
    }

    let method_types: Vec<MethodType> = methods.iter().map(|a| a.method_type.clone()).collect();
    let providers_by_url: HashMap<String, ProviderConfig> =
        providers.iter().map(|p| (p.url.clone(), p.clone())).collect();

    let mut budget = MAX_EVALUATIONS;
    let mut pruned_subsets: Vec<SubsetCandidates> = Vec::new();

    for subset in quorum::combinations(m, k) {
        if budget == 0 {
            tracing::warn!("evaluation budget exhausted; remaining subsets skipped");
            break;
        }
        let candidates = assignment::plan_subset(&subset, methods, providers, &mut budget);
        if candidates.selections.is_empty() {
            continue;
        }
        let minimal = cost::minimal_cost_selections(
            &candidates.selections,
            &candidates.method_indices,
            &method_types,
            &providers_by_url,
        );
        pruned_subsets.push(SubsetCandidates { method_indices: candidates.method_indices, selections: minimal });
    }

    let chosen = cost::choose_cross_subset_selections(&pruned_subsets, &method_types, &providers_by_url, &mut budget);

    chosen
        .into_iter()
        .map(|(method_indices, selection)| PolicyCandidate {
            methods: method_indices
                .iter()
                .zip(selection.provider_urls.iter())
                .map(|(&authentication_method, provider)| PolicyMethod { authentication_method, provider: provider.clone() })
                .collect(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use anastasis_types::{ProviderMethodFee, VersionInfo};

    fn provider(url: &str, currency: &str, method_types: &[MethodType]) -> ProviderConfig {
        ProviderConfig {
            url: url.to_string(),
            currency: currency.to_string(),
            business_name: url.to_string(),
            methods: method_types
                .iter()
                .map(|t| ProviderMethodFee { method_type: t.clone(), usage_fee: anastasis_types::Money::zero(currency) })
                .collect(),
            storage_limit_in_megabytes: 16,
            annual_fee: anastasis_types::Money::zero(currency),
            truth_upload_fee: anastasis_types::Money::zero(currency),
            liability_limit: anastasis_types::Money::zero(currency),
            salt: [0; 32],
            version: VersionInfo { current: 1, revision: 0, age: 0 },
        }
    }

    #[test]
    fn plans_at_least_one_candidate_for_a_simple_setup() {
        let methods = vec![
            AuthMethodInput { method_type: MethodType::Question, byte_size: 16 },
            AuthMethodInput { method_type: MethodType::Email, byte_size: 16 },
        ];
        let providers = vec![provider("https://a", "KUDOS", &[MethodType::Question, MethodType::Email])];
        let candidates = plan(&methods, &providers);
        assert!(!candidates.is_empty());
        for c in &candidates {
            assert_eq!(c.methods.len(), quorum::quorum_size(2));
        }
    }

    #[test]
    fn no_methods_plans_nothing() {
        assert!(plan(&[], &[]).is_empty());
    }

    #[test]
    fn respects_global_evaluation_budget() {
        let methods: Vec<AuthMethodInput> = (0..7)
            .map(|_| AuthMethodInput { method_type: MethodType::Question, byte_size: 16 })
            .collect();
        let providers: Vec<ProviderConfig> = (0..6)
            .map(|i| provider(&format!("https://p{i}"), "KUDOS", &[MethodType::Question]))
            .collect();
        // this would be an enormous search without the shared budget;
        // it must simply terminate.
        let _ = plan(&methods, &providers);
    }
}
