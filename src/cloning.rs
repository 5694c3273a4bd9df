/// Cloning recommendation per antibody
///
/// Every annotated chain with a cloning primer on both ends contributes its
/// letter to a chain code, marked `*` when non-functional (e.g. `HK*L`).
/// Only antibodies with a heavy chain and at least one light chain worth
/// cloning get a recommendation.
use crate::export::ExportRecord;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloningRecommendation {
    /// Chains to clone, e.g. `HK`
    pub chains: String,
    /// Non-functional chains among them, e.g. `K*`
    pub non_functional: Option<String>,
    /// `patient-mab`
    pub clone_id: Option<String>,
}

/// Chain code contribution of one annotated chain: its letter when both
/// primer names mention the chain, with `*` when non-functional.
pub fn chain_code(record: &ExportRecord) -> Option<String> {
    let letter = record.chain.letter();
    let mentions = |primer: &Option<String>| primer.as_deref().is_some_and(|p| p.contains(letter));
    if record.function == "BQ"
        || !mentions(&record.five_prime_primer)
        || !mentions(&record.three_prime_primer)
    {
        return None;
    }
    if record.is_functional() {
        Some(letter.to_string())
    } else {
        Some(format!("{}*", letter))
    }
}

/// Codes that are never cloned: no usable light chain next to the heavy one.
const NOT_CLONED: [&str; 5] = ["H*", "H", "H*K*", "H*L*", "H*K*L*"];

/// Recommendation for the combined chain code of one antibody.
pub fn recommend(code: &str, patient: Option<&str>, mab: Option<&str>) -> Option<CloningRecommendation> {
    if !code.contains('H') || NOT_CLONED.contains(&code) {
        return None;
    }
    // a non-functional light chain is dropped when the other light chain is functional
    let code = match code {
        "HK*L" => "HL",
        "HKL*" => "HK",
        "H*K*L" => "H*L",
        "H*KL*" => "H*K",
        other => other,
    };

    let non_functional = if code == "HK*L*" {
        Some("K*L*".to_string())
    } else {
        code.find('*')
            .and_then(|star| code[..star].chars().last())
            .map(|c| format!("{}*", c))
    };
    let clone_id = match (patient, mab) {
        (Some(patient), Some(mab)) => Some(format!("{}-{}", patient, mab)),
        _ => None,
    };

    Some(CloningRecommendation {
        chains: code.replace('*', ""),
        non_functional,
        clone_id,
    })
}
