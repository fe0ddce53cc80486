//! Provider registry: maps provider names to endpoint configurations.
//!
//! Every remote provider speaks the OpenAI wire format; entries differ only
//! in base URL, which endpoints they expose, and where the API key lives.

/// How to attach auth credentials to requests.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AuthStyle {
    /// `Authorization: Bearer <key>`
    Bearer,
    /// No authentication required (local servers).
    None,
}

/// Chat completions path, relative to the base URL.
pub const CHAT_PATH: &str = "/chat/completions";
/// Embeddings path, relative to the base URL.
pub const EMBEDDINGS_PATH: &str = "/embeddings";

/// A known OpenAI-compatible endpoint.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub name: &'static str,
    /// Default base URL, without trailing slash.
    pub base_url: &'static str,
    /// Environment variables tried, in order, when no key is configured.
    pub env_keys: &'static [&'static str],
    pub auth_style: AuthStyle,
    /// Environment variable that overrides `base_url` (e.g. `OLLAMA_HOST`).
    pub base_url_env: Option<&'static str>,
    /// Whether `/embeddings` is served. Groq and DeepSeek are chat-only.
    pub embeddings: bool,
}

impl ProviderConfig {
    const fn cloud(
        name: &'static str,
        base_url: &'static str,
        env_keys: &'static [&'static str],
        embeddings: bool,
    ) -> Self {
        Self {
            name,
            base_url,
            env_keys,
            auth_style: AuthStyle::Bearer,
            base_url_env: None,
            embeddings,
        }
    }

    const fn local(name: &'static str, base_url: &'static str, host_env: &'static str) -> Self {
        Self {
            name,
            base_url,
            env_keys: &[],
            auth_style: AuthStyle::None,
            base_url_env: Some(host_env),
            embeddings: true,
        }
    }

    pub fn chat_path(&self) -> &'static str {
        CHAT_PATH
    }

    pub fn embeddings_path(&self) -> Option<&'static str> {
        self.embeddings.then_some(EMBEDDINGS_PATH)
    }

    pub fn supports_embeddings(&self) -> bool {
        self.embeddings
    }
}

static PROVIDERS: &[ProviderConfig] = &[
    ProviderConfig {
        base_url_env: Some("OPENAI_API_BASE"),
        ..ProviderConfig::cloud("openai", "https://api.openai.com/v1", &["OPENAI_API_KEY"], true)
    },
    ProviderConfig::cloud("groq", "https://api.groq.com/openai/v1", &["GROQ_API_KEY"], false),
    ProviderConfig::cloud(
        "openrouter",
        "https://openrouter.ai/api/v1",
        &["OPENROUTER_API_KEY", "OPENAI_API_KEY"],
        false,
    ),
    ProviderConfig::cloud("deepseek", "https://api.deepseek.com", &["DEEPSEEK_API_KEY"], false),
    ProviderConfig::cloud("together", "https://api.together.xyz/v1", &["TOGETHER_API_KEY"], true),
    ProviderConfig::cloud("mistral", "https://api.mistral.ai/v1", &["MISTRAL_API_KEY"], true),
    ProviderConfig::local("ollama", "http://localhost:11434/v1", "OLLAMA_HOST"),
    ProviderConfig::local("lmstudio", "http://localhost:1234/v1", "LMSTUDIO_HOST"),
];

/// Look up a provider config by name.
pub fn get_provider_config(name: &str) -> Option<&'static ProviderConfig> {
    let lookup = match name {
        "together_ai" | "togetherai" => "together",
        "lm-studio" | "lm_studio" => "lmstudio",
        other => other,
    };
    PROVIDERS.iter().find(|p| p.name == lookup)
}

/// List all known provider names.
pub fn all_provider_names() -> Vec<&'static str> {
    PROVIDERS.iter().map(|p| p.name).collect()
}
