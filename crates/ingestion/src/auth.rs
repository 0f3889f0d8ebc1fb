//! Token authentication registry
//!
//! Maps a provider name (the `tokenAuthProvider` argument) to a constructor.
//! Built-ins:
//! - `static`: returns the `token` argument
//! - `file`: re-reads `tokenFile` on every fetch so external refreshers can rotate it

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use contracts::{ContractError, TokenAuthentication, TransportArguments};
use tracing::debug;

use crate::error::{IngestionError, Result};

/// Builds a token provider from the stream's transport arguments
pub type TokenProviderConstructor =
    Box<dyn Fn(&TransportArguments) -> Result<Arc<dyn TokenAuthentication>> + Send + Sync>;

/// Name-keyed token provider constructors
pub struct TokenProviderRegistry {
    constructors: HashMap<String, TokenProviderConstructor>,
}

impl TokenProviderRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self {
            constructors: HashMap::new(),
        }
    }

    /// Registry with the built-in providers
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.constructors.insert(
            StaticTokenProvider::NAME.to_string(),
            Box::new(|args| {
                let provider: Arc<dyn TokenAuthentication> =
                    Arc::new(StaticTokenProvider::from_args(args)?);
                Ok(provider)
            }),
        );
        registry.constructors.insert(
            FileTokenProvider::NAME.to_string(),
            Box::new(|args| {
                let provider: Arc<dyn TokenAuthentication> =
                    Arc::new(FileTokenProvider::from_args(args)?);
                Ok(provider)
            }),
        );
        registry
    }

    /// Register a constructor; names are unique
    pub fn register(
        &mut self,
        name: impl Into<String>,
        constructor: TokenProviderConstructor,
    ) -> Result<()> {
        let name = name.into();
        if self.constructors.contains_key(&name) {
            return Err(IngestionError::DuplicateRegistration { name });
        }
        self.constructors.insert(name, constructor);
        Ok(())
    }

    /// Instantiate a provider by name
    pub fn create(
        &self,
        name: &str,
        args: &TransportArguments,
    ) -> Result<Arc<dyn TokenAuthentication>> {
        let constructor = self
            .constructors
            .get(name)
            .ok_or_else(|| IngestionError::token_provider(name, "no such token provider"))?;
        debug!(provider = %name, "creating token provider");
        constructor(args)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.constructors.contains_key(name)
    }
}

impl Default for TokenProviderRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Fixed token from configuration
pub struct StaticTokenProvider {
    token: String,
}

impl StaticTokenProvider {
    pub const NAME: &'static str = "static";

    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }

    fn from_args(args: &TransportArguments) -> Result<Self> {
        let token = args
            .get("token")
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                IngestionError::token_provider(Self::NAME, "argument 'token' is required")
            })?;
        Ok(Self::new(token.clone()))
    }
}

impl TokenAuthentication for StaticTokenProvider {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn token(&self) -> std::result::Result<String, ContractError> {
        Ok(self.token.clone())
    }
}

/// Token read from a file at every fetch
pub struct FileTokenProvider {
    path: PathBuf,
}

impl FileTokenProvider {
    pub const NAME: &'static str = "file";

    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn from_args(args: &TransportArguments) -> Result<Self> {
        let path = args
            .get("tokenFile")
            .filter(|p| !p.is_empty())
            .ok_or_else(|| {
                IngestionError::token_provider(Self::NAME, "argument 'tokenFile' is required")
            })?;
        Ok(Self::new(path))
    }
}

impl TokenAuthentication for FileTokenProvider {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn token(&self) -> std::result::Result<String, ContractError> {
        let content = std::fs::read_to_string(&self.path).map_err(|e| {
            ContractError::token(Self::NAME, format!("{}: {e}", self.path.display()))
        })?;
        let token = content.trim();
        if token.is_empty() {
            return Err(ContractError::token(
                Self::NAME,
                format!("{} is empty", self.path.display()),
            ));
        }
        Ok(token.to_string())
    }
}
