//! planner input/output types.

use anastasis_types::MethodType;

/// one authentication method the user has chosen, with the byte size
/// of its raw challenge datum (spec §4.H).
#[derive(Debug, Clone)]
pub struct AuthMethodInput {
    pub method_type: MethodType,
    pub byte_size: usize,
}

/// safety margin added to a challenge datum's byte size before
/// comparing against a provider's upload limit (§4.H step 3).
pub const UPLOAD_SAFETY_MARGIN_BYTES: usize = 1024;

/// hard cap on provider-selection evaluations across the whole
/// planning run (§4.H step 7, §9 open questions — exposed as a
/// constant since the source keeps it a compile-time value rather
/// than a tunable).
pub const MAX_EVALUATIONS: usize = 16_384;

/// one fully assigned provider-per-slot selection for one subset, in
/// the subset's slot order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubsetSelection {
    pub provider_urls: Vec<String>,
}

impl SubsetSelection {
    pub fn diversity(&self) -> usize {
        let mut urls: Vec<&String> = self.provider_urls.iter().collect();
        urls.sort();
        urls.dedup();
        urls.len()
    }
}

/// one subset's full set of diversity-maximal, non-equivalent
/// selections — a "policy with alternatives" (§4.H step 5).
#[derive(Debug, Clone)]
pub struct SubsetCandidates {
    pub method_indices: Vec<usize>,
    pub selections: Vec<SubsetSelection>,
}
