//! AI provider catalog and registry
//!
//! Defines provider types, the built-in catalog, and the resolver that merges
//! the catalog with the user's configuration file into dispatch-ready entries.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

use crate::config::ChorusConfig;
use crate::error::ConfigError;

/// Unique identifier for each supported provider
///
/// Order of `all()` is the fixed priority order used for dispatch and for
/// tie-breaking in the aggregated report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderId {
    Zhipu,
    Silicon,
    #[serde(rename = "openai")]
    OpenAi,
    Anthropic,
    Google,
}

impl ProviderId {
    /// All provider IDs in priority order
    pub fn all() -> &'static [ProviderId] {
        &[
            ProviderId::Zhipu,
            ProviderId::Silicon,
            ProviderId::OpenAi,
            ProviderId::Anthropic,
            ProviderId::Google,
        ]
    }

    /// Key used in the config file and on the command line
    pub fn storage_key(&self) -> &'static str {
        match self {
            ProviderId::Zhipu => "zhipu",
            ProviderId::Silicon => "silicon",
            ProviderId::OpenAi => "openai",
            ProviderId::Anthropic => "anthropic",
            ProviderId::Google => "google",
        }
    }

    /// Parse a user-supplied provider id
    pub fn parse(s: &str) -> Option<ProviderId> {
        let needle = s.trim().to_ascii_lowercase();
        Self::all()
            .iter()
            .find(|id| id.storage_key() == needle)
            .copied()
    }

    /// Position in the priority order, for stable sorting
    pub fn priority(&self) -> usize {
        Self::all()
            .iter()
            .position(|id| id == self)
            .unwrap_or(usize::MAX)
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderId::Zhipu => write!(f, "Zhipu"),
            ProviderId::Silicon => write!(f, "SiliconFlow"),
            ProviderId::OpenAi => write!(f, "OpenAI"),
            ProviderId::Anthropic => write!(f, "Anthropic"),
            ProviderId::Google => write!(f, "Google"),
        }
    }
}

/// How to send the API key in requests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum AuthHeader {
    /// Use `Authorization: Bearer <key>` header (OpenAI style)
    #[default]
    Bearer,
    /// Use `x-api-key: <key>` header (Anthropic style)
    XApiKey,
    /// Use `x-goog-api-key: <key>` header (Google AI style)
    XGoogApiKey,
}

/// Wire format of a provider's chat-completion endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ApiFormat {
    /// OpenAI Chat Completions (`choices[].message.content`)
    #[default]
    OpenAi,
    /// Anthropic Messages (`content[]` text blocks)
    Anthropic,
    /// Google generateContent (`candidates[].content.parts[].text`)
    Google,
}

/// Free vs paid classification of a model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelTier {
    Free,
    Paid,
}

/// A model offered by a provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    /// Model ID to send in API requests
    pub id: String,
    /// Human-readable display name
    pub display_name: String,
    /// Free or paid tier
    pub tier: ModelTier,
}

impl ModelInfo {
    pub fn new(id: &str, display_name: &str, tier: ModelTier) -> Self {
        Self {
            id: id.to_string(),
            display_name: display_name.to_string(),
            tier,
        }
    }
}

/// Static description of a provider
#[derive(Debug, Clone)]
pub struct ProviderSpec {
    /// Unique identifier
    pub id: ProviderId,
    /// Display name
    pub name: String,
    /// Short description for `chorus list`
    pub description: String,
    /// Chat-completion endpoint URL; may contain a `{model}` placeholder
    pub base_url: String,
    /// How to send authentication
    pub auth_header: AuthHeader,
    /// Wire format of requests and responses
    pub api_format: ApiFormat,
    /// Available models, in preference order
    pub models: Vec<ModelInfo>,
}

impl ProviderSpec {
    /// Default model: the first free-tier model, else the first model
    pub fn default_model(&self) -> &ModelInfo {
        self.models
            .iter()
            .find(|m| m.tier == ModelTier::Free)
            .unwrap_or(&self.models[0])
    }

    /// Next free-tier model strictly after `current` in the catalog
    ///
    /// Used by the retry policy to downgrade a failing call. Does not wrap
    /// around; returns None when no later free model exists.
    pub fn fallback_model(&self, current: &str) -> Option<&ModelInfo> {
        let position = self.models.iter().position(|m| m.id == current)?;
        self.models[position + 1..]
            .iter()
            .find(|m| m.tier == ModelTier::Free)
    }

    /// Check if a model ID is in the catalog
    pub fn has_model(&self, model_id: &str) -> bool {
        self.models.iter().any(|m| m.id == model_id)
    }

    /// Count of free-tier models
    pub fn free_model_count(&self) -> usize {
        self.models
            .iter()
            .filter(|m| m.tier == ModelTier::Free)
            .count()
    }
}

/// Lazily initialized built-in provider catalog
static BUILTIN_PROVIDERS: LazyLock<Vec<ProviderSpec>> = LazyLock::new(|| {
    vec![
        // Zhipu AI - GLM models, free flash tier
        ProviderSpec {
            id: ProviderId::Zhipu,
            name: "Zhipu".to_string(),
            description: "GLM models (free flash tier)".to_string(),
            base_url: "https://open.bigmodel.cn/api/paas/v4/chat/completions".to_string(),
            auth_header: AuthHeader::Bearer,
            api_format: ApiFormat::OpenAi,
            models: vec![
                ModelInfo::new("glm-4-flash", "GLM-4 Flash", ModelTier::Free),
                ModelInfo::new("glm-4-flashx", "GLM-4 FlashX", ModelTier::Free),
                ModelInfo::new("glm-4-plus", "GLM-4 Plus", ModelTier::Paid),
            ],
        },
        // SiliconFlow - hosted open-weight models
        ProviderSpec {
            id: ProviderId::Silicon,
            name: "SiliconFlow".to_string(),
            description: "Hosted open-weight models (Qwen, GLM, DeepSeek)".to_string(),
            base_url: "https://api.siliconflow.cn/v1/chat/completions".to_string(),
            auth_header: AuthHeader::Bearer,
            api_format: ApiFormat::OpenAi,
            models: vec![
                ModelInfo::new("Qwen/Qwen2.5-7B-Instruct", "Qwen2.5 7B", ModelTier::Free),
                ModelInfo::new("THUDM/glm-4-9b-chat", "GLM-4 9B", ModelTier::Free),
                ModelInfo::new("deepseek-ai/DeepSeek-V2.5", "DeepSeek V2.5", ModelTier::Paid),
            ],
        },
        // OpenAI - Chat Completions with API key
        ProviderSpec {
            id: ProviderId::OpenAi,
            name: "OpenAI".to_string(),
            description: "GPT models (API key)".to_string(),
            base_url: "https://api.openai.com/v1/chat/completions".to_string(),
            auth_header: AuthHeader::Bearer,
            api_format: ApiFormat::OpenAi,
            models: vec![
                ModelInfo::new("gpt-4o-mini", "GPT-4o Mini", ModelTier::Paid),
                ModelInfo::new("gpt-4o", "GPT-4o", ModelTier::Paid),
            ],
        },
        // Anthropic - Messages API
        ProviderSpec {
            id: ProviderId::Anthropic,
            name: "Anthropic".to_string(),
            description: "Claude models".to_string(),
            base_url: "https://api.anthropic.com/v1/messages".to_string(),
            auth_header: AuthHeader::XApiKey,
            api_format: ApiFormat::Anthropic,
            models: vec![
                ModelInfo::new("claude-3-5-haiku-20241022", "Claude 3.5 Haiku", ModelTier::Paid),
                ModelInfo::new("claude-sonnet-4-20250514", "Claude Sonnet 4", ModelTier::Paid),
            ],
        },
        // Google AI - generateContent, model id in the URL path
        ProviderSpec {
            id: ProviderId::Google,
            name: "Google".to_string(),
            description: "Gemini models (free flash tier)".to_string(),
            base_url:
                "https://generativelanguage.googleapis.com/v1beta/models/{model}:generateContent"
                    .to_string(),
            auth_header: AuthHeader::XGoogApiKey,
            api_format: ApiFormat::Google,
            models: vec![
                ModelInfo::new("gemini-1.5-flash", "Gemini 1.5 Flash", ModelTier::Free),
                ModelInfo::new("gemini-1.5-pro", "Gemini 1.5 Pro", ModelTier::Paid),
            ],
        },
    ]
});

/// Get all built-in provider specs (cached, no allocation)
pub fn builtin_providers() -> &'static [ProviderSpec] {
    &BUILTIN_PROVIDERS
}

/// Get a specific provider spec by ID
pub fn get_provider(id: ProviderId) -> Option<&'static ProviderSpec> {
    BUILTIN_PROVIDERS.iter().find(|p| p.id == id)
}

/// A provider ready for dispatch: static spec joined with the user's key
/// and any base-URL override from the config file
#[derive(Debug, Clone)]
pub struct ResolvedProvider {
    pub spec: &'static ProviderSpec,
    pub api_key: String,
    pub base_url: String,
}

impl ResolvedProvider {
    pub fn id(&self) -> ProviderId {
        self.spec.id
    }
}

/// Resolver over the built-in catalog and the loaded configuration
///
/// Pure lookup; the config file is loaded once before construction and never
/// re-read during dispatch.
pub struct Registry {
    config: ChorusConfig,
}

impl Registry {
    pub fn new(config: ChorusConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ChorusConfig {
        &self.config
    }

    /// Resolve the providers to dispatch to
    ///
    /// With an empty request set, returns every enabled provider that has an
    /// API key. With an explicit set, every named provider must exist, be
    /// enabled, and have a key; otherwise resolution fails before any network
    /// call. Output is in priority order regardless of request order.
    pub fn resolve(&self, requested: &[String]) -> Result<Vec<ResolvedProvider>, ConfigError> {
        let mut ids: Vec<ProviderId> = Vec::new();

        if requested.is_empty() {
            for &id in ProviderId::all() {
                if self.config.is_enabled(id) && self.config.api_key(id).is_some() {
                    ids.push(id);
                }
            }
        } else {
            for name in requested {
                let id = ProviderId::parse(name)
                    .ok_or_else(|| ConfigError::UnknownProvider(name.clone()))?;
                if !self.config.is_enabled(id) {
                    return Err(ConfigError::ProviderDisabled(id));
                }
                if self.config.api_key(id).is_none() {
                    return Err(ConfigError::MissingApiKey(id));
                }
                if !ids.contains(&id) {
                    ids.push(id);
                }
            }
            ids.sort_by_key(|id| id.priority());
        }

        if ids.is_empty() {
            return Err(ConfigError::NoProvidersConfigured);
        }

        let mut resolved = Vec::with_capacity(ids.len());
        for id in ids {
            let spec =
                get_provider(id).ok_or_else(|| ConfigError::UnknownProvider(id.to_string()))?;
            let api_key = self
                .config
                .api_key(id)
                .ok_or(ConfigError::MissingApiKey(id))?
                .to_string();
            let base_url = self
                .config
                .base_url_override(id)
                .unwrap_or(&spec.base_url)
                .to_string();
            resolved.push(ResolvedProvider {
                spec,
                api_key,
                base_url,
            });
        }

        Ok(resolved)
    }
}
