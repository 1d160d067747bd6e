//! Profile extraction adapter: transcript text in, partial profile out.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{info, warn};

use sahayak_common::inference::{
    parse_structured, InferenceBackend, InferenceError, StructuredRequest,
};
use sahayak_common::profile::PartialProfile;

use crate::capture::{CaptureController, CaptureError, SpeechPlatform};

const EXTRACTION_SCHEMA: &str = "farmer_profile_extraction";

pub struct ProfileExtractor<B> {
    backend: Arc<B>,
    model: String,
}

impl<B: InferenceBackend> ProfileExtractor<B> {
    pub fn new(backend: Arc<B>, model: impl Into<String>) -> Self {
        Self {
            backend,
            model: model.into(),
        }
    }

    /// Extract the six profile fields from a transcript. Errors are surfaced
    /// so the capture flow can show its Error state; use
    /// [`extract_profile`](Self::extract_profile) for the soft-fail variant.
    pub async fn try_extract(&self, transcript: &str) -> Result<PartialProfile, InferenceError> {
        let request = StructuredRequest::new::<PartialProfile>(
            self.model.clone(),
            extraction_prompt(transcript),
            EXTRACTION_SCHEMA,
        );
        let value = self.backend.generate_json(request).await?;
        parse_structured(value)
    }

    /// Soft-fail extraction: a malformed or failed service response yields
    /// an empty partial profile and a warning, never an error. Manual form
    /// entry remains available as the fallback path.
    pub async fn extract_profile(&self, transcript: &str) -> PartialProfile {
        match self.try_extract(transcript).await {
            Ok(partial) => partial,
            Err(e) => {
                warn!(error = %e, "profile extraction failed, returning empty partial");
                PartialProfile::default()
            }
        }
    }
}

fn extraction_prompt(transcript: &str) -> String {
    format!(
        "Extract farmer profile details from this speech transcript. Return exactly \
these six fields: name, state, district, landHolding (acres, a number), cropType, \
and category (one of General, OBC, SC, ST, EWS). Omit any field the transcript \
does not mention.\n\nTRANSCRIPT:\n{transcript}"
    )
}

/// Glues capture to extraction: one voice capture attempt ending in a
/// partial profile emitted to the analysis layer. The capture layer never
/// mutates the profile itself.
pub struct VoicePipeline<P: SpeechPlatform, B> {
    controller: CaptureController<P>,
    extractor: ProfileExtractor<B>,
    profile_tx: mpsc::Sender<PartialProfile>,
}

impl<P: SpeechPlatform, B: InferenceBackend> VoicePipeline<P, B> {
    pub fn new(
        controller: CaptureController<P>,
        extractor: ProfileExtractor<B>,
        profile_tx: mpsc::Sender<PartialProfile>,
    ) -> Self {
        Self {
            controller,
            extractor,
            profile_tx,
        }
    }

    pub fn controller(&self) -> &CaptureController<P> {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut CaptureController<P> {
        &mut self.controller
    }

    /// Run one capture attempt end to end. Capture errors propagate (the
    /// controller is already in its Error state); an extraction failure is
    /// recoverable — it surfaces through the Error state only and the
    /// pipeline returns `Ok`.
    pub async fn capture_once(&mut self) -> Result<(), CaptureError> {
        self.controller.start_capture().await?;
        let transcript = self.controller.await_transcript().await?;

        match self.extractor.try_extract(&transcript).await {
            Ok(partial) => {
                info!("voice extraction produced a partial profile");
                if self.profile_tx.send(partial).await.is_err() {
                    warn!("analysis layer dropped its profile receiver");
                }
                self.controller.finish_processing();
            }
            Err(e) => {
                warn!(error = %e, "extraction failed for captured transcript");
                self.controller
                    .fail("could not understand the description, please retry or use the form");
            }
        }
        Ok(())
    }
}
