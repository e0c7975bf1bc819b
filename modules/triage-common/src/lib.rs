pub mod company_cache;
pub mod config;
pub mod error;
pub mod file_config;
pub mod prompt_registry;
pub mod run_config;
pub mod template;
pub mod types;
pub mod worklist;

pub use company_cache::CompanyCache;
pub use config::AppConfig;
pub use error::ValidationError;
pub use file_config::FileConfig;
pub use prompt_registry::{AnalysisPrompt, PromptLibrary, TicketPromptTemplate};
pub use run_config::{dataset_name_for, BackendCredentials, RunConfig, Taxonomy, DEFAULT_DATASET_NAME};
pub use types::*;
pub use worklist::Worklist;

pub use freshservice_client::{Department, ExtractionProfile, Ticket};
