use thiserror::Error;

/// Reasons a run is refused before any work starts. Checked in declaration
/// order; the first failing check is reported.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("FreshService domain and API key are required to fetch tickets")]
    MissingBackendCredentials,

    #[error("FreshService API key contains invalid characters (such as spaces). Check the key and try again")]
    MalformedBackendKey,

    #[error("Gemini API key is required unless simulate mode is enabled")]
    MissingAiCredentials,

    #[error("Select a Gemini model or enable simulate mode")]
    MissingModel,

    #[error("Per-ticket analysis needs both product modules and use cases")]
    MissingTaxonomy,

    #[error("No tickets to process. Supply a ticket ID file or a ticket extract")]
    EmptyWorklist,

    #[error("Select the column holding ticket IDs")]
    MissingIdentifierColumn,

    #[error("Overall analysis needs a prompt from the prompt library")]
    MissingPrompt,
}
