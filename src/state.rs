use std::error::Error;
use std::sync::Arc;

use tracing::{info, warn};

use crate::anthropic::AnthropicClient;
use crate::auth::AuthTokens;
use crate::config::{Config, LlmProvider};
use crate::content::{CompletionClient, ContentGenerator, LlmContentGenerator, UnavailableGenerator};
use crate::db::Database;
use crate::openai::OpenAIClient;

pub struct AppState {
    pub db: Database,
    pub content: Arc<dyn ContentGenerator>,
    pub auth: AuthTokens,
}

impl AppState {
    pub fn new(db: Database, content: Arc<dyn ContentGenerator>, auth: AuthTokens) -> Arc<Self> {
        Arc::new(Self { db, content, auth })
    }

    pub fn from_config(config: &Config) -> Result<Arc<Self>, Box<dyn Error + Send + Sync>> {
        info!("Opening database at {}", config.database_path.display());
        let db = Database::open(&config.database_path)?;

        let content = content_generator(config)?;
        let auth = AuthTokens::new(&config.auth_tokens);
        if auth.is_empty() {
            warn!("NOVA_AUTH_TOKENS is empty, every /api/v1 request will be rejected");
        } else {
            info!("Loaded {} auth tokens", auth.len());
        }

        Ok(Self::new(db, content, auth))
    }
}

fn content_generator(
    config: &Config,
) -> Result<Arc<dyn ContentGenerator>, Box<dyn Error + Send + Sync>> {
    let Some(api_key) = config.llm_api_key() else {
        info!("No LLM key for {:?}, serving fallback content only", config.llm_provider);
        return Ok(Arc::new(UnavailableGenerator));
    };

    let client: Box<dyn CompletionClient> = match config.llm_provider {
        LlmProvider::Anthropic => Box::new(AnthropicClient::new(api_key, config.llm_timeout)?),
        LlmProvider::OpenAi => Box::new(OpenAIClient::new(api_key, config.llm_timeout)?),
    };
    info!("Content generation via {} ({} retries)", client.name(), config.llm_max_retries);

    Ok(Arc::new(LlmContentGenerator::new(client, config.llm_max_retries)))
}
