//! Per-program eligibility evaluation, grounded in the program's guideline
//! text.

use std::future::Future;
use std::sync::Arc;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::debug;

use sahayak_common::catalog::{Catalog, MISSING_GUIDELINE_NOTICE};
use sahayak_common::inference::{
    parse_structured, InferenceBackend, InferenceError, StructuredRequest,
};
use sahayak_common::profile::FarmerProfile;

const ELIGIBILITY_SCHEMA: &str = "eligibility_verdict";

/// One program's verdict for one profile. Immutable after creation.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct EligibilityResult {
    pub program_id: String,
    pub program_name: String,
    pub is_eligible: bool,
    pub benefit: String,
    /// Which guideline clause the verdict rests on.
    pub proof_citation: String,
    /// Verbatim snippet from the guideline text backing the citation.
    pub proof_snippet: String,
    pub next_steps: Vec<String>,
    pub required_documents: Vec<String>,
}

/// The structured verdict the inference service must return: a boolean plus
/// three strings and two string sequences.
#[derive(Debug, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
struct EligibilityVerdict {
    is_eligible: bool,
    benefit: String,
    proof_citation: String,
    proof_snippet: String,
    next_steps: Vec<String>,
    required_documents: Vec<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum EvaluationError {
    #[error("eligibility service call failed for '{program_id}': {source}")]
    Service {
        program_id: String,
        #[source]
        source: InferenceError,
    },
}

/// Decides one profile's eligibility for one program. The trait is the seam
/// where a caching decorator or a deterministic rules engine can be layered
/// without changing the orchestrator's contract.
pub trait Evaluator: Send + Sync {
    fn evaluate(
        &self,
        profile: &FarmerProfile,
        program_id: &str,
    ) -> impl Future<Output = Result<EligibilityResult, EvaluationError>> + Send;
}

pub struct InferenceEvaluator<B> {
    backend: Arc<B>,
    catalog: Arc<Catalog>,
    model: String,
}

impl<B: InferenceBackend> InferenceEvaluator<B> {
    pub fn new(backend: Arc<B>, catalog: Arc<Catalog>, model: impl Into<String>) -> Self {
        Self {
            backend,
            catalog,
            model: model.into(),
        }
    }
}

impl<B: InferenceBackend> Evaluator for InferenceEvaluator<B> {
    async fn evaluate(
        &self,
        profile: &FarmerProfile,
        program_id: &str,
    ) -> Result<EligibilityResult, EvaluationError> {
        // Unknown ids never fail the evaluation; the verdict is grounded in
        // the placeholder notice instead.
        let (program_name, guideline_text) = match self.catalog.get(program_id) {
            Some(program) => (program.name.clone(), program.guideline_text.as_str()),
            None => {
                debug!(program_id, "no guideline text for program id");
                (program_id.to_string(), MISSING_GUIDELINE_NOTICE)
            }
        };

        let request = StructuredRequest::new::<EligibilityVerdict>(
            self.model.clone(),
            grounding_prompt(profile, &program_name, guideline_text),
            ELIGIBILITY_SCHEMA,
        );

        let verdict: EligibilityVerdict = self
            .backend
            .generate_json(request)
            .await
            .and_then(parse_structured)
            .map_err(|source| EvaluationError::Service {
                program_id: program_id.to_string(),
                source,
            })?;

        Ok(EligibilityResult {
            program_id: program_id.to_string(),
            program_name,
            is_eligible: verdict.is_eligible,
            benefit: verdict.benefit,
            proof_citation: verdict.proof_citation,
            proof_snippet: verdict.proof_snippet,
            next_steps: verdict.next_steps,
            required_documents: verdict.required_documents,
        })
    }
}

fn grounding_prompt(profile: &FarmerProfile, program_name: &str, guideline_text: &str) -> String {
    let not_provided = "not provided";
    format!(
        "Decide whether this farmer is eligible for the scheme \"{program_name}\" \
using only the guideline text below. Cite the clause your verdict rests on and \
quote the exact snippet. List concrete next steps and required documents.\n\n\
FARMER PROFILE:\n\
- Name: {}\n\
- State: {}\n\
- District: {}\n\
- Land holding: {} acres\n\
- Crop type: {}\n\
- Category: {}\n\n\
GUIDELINE TEXT:\n{guideline_text}",
        profile.name.as_deref().unwrap_or(not_provided),
        profile.state.as_deref().unwrap_or(not_provided),
        profile.district.as_deref().unwrap_or(not_provided),
        profile.land_holding,
        profile.crop_type.as_deref().unwrap_or(not_provided),
        profile.category,
    )
}
