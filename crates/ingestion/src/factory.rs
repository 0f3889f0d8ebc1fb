//! Sink factory
//!
//! Resolves the `transport` name of a network stream to a [`StreamSink`]
//! constructor. Unknown names are not an error: the caller decides whether to
//! skip the stream.

use std::collections::HashMap;
use std::sync::Arc;

use contracts::{StreamSink, TransportArguments};
use tracing::{debug, instrument};

use crate::auth::TokenProviderRegistry;
use crate::error::{IngestionError, Result};
use crate::sinks::{BenchmarkSink, EventSourceSink};

/// Alias accepted for [`EventSourceSink`]
pub const SSE_ALIAS: &str = "sse";

/// Builds a sink for `(stream_name, arguments)`
pub type SinkConstructor = Box<
    dyn Fn(&str, &TransportArguments, &TokenProviderRegistry) -> Result<Arc<dyn StreamSink>>
        + Send
        + Sync,
>;

/// Name-keyed sink constructors plus the token providers they may need
pub struct SinkFactory {
    constructors: HashMap<String, SinkConstructor>,
    tokens: TokenProviderRegistry,
}

impl SinkFactory {
    /// Factory without any transports
    pub fn empty(tokens: TokenProviderRegistry) -> Self {
        Self {
            constructors: HashMap::new(),
            tokens,
        }
    }

    /// Factory with `eventSource` (alias `sse`) and `benchmark`
    pub fn with_defaults(tokens: TokenProviderRegistry) -> Self {
        let mut factory = Self::empty(tokens);
        for name in [EventSourceSink::NAME, SSE_ALIAS] {
            factory.constructors.insert(
                name.to_string(),
                Box::new(|stream, args, tokens| {
                    let sink: Arc<dyn StreamSink> =
                        Arc::new(EventSourceSink::from_args(stream, args, tokens)?);
                    Ok(sink)
                }),
            );
        }
        factory.constructors.insert(
            BenchmarkSink::NAME.to_string(),
            Box::new(|stream, args, _| {
                let sink: Arc<dyn StreamSink> = Arc::new(BenchmarkSink::from_args(stream, args)?);
                Ok(sink)
            }),
        );
        factory
    }

    /// Register a transport; names are unique
    pub fn register(&mut self, name: impl Into<String>, constructor: SinkConstructor) -> Result<()> {
        let name = name.into();
        if self.constructors.contains_key(&name) {
            return Err(IngestionError::DuplicateRegistration { name });
        }
        self.constructors.insert(name, constructor);
        Ok(())
    }

    /// Create a sink, or `None` when `transport` is unknown
    #[instrument(name = "sink_factory_create", skip(self, args), fields(transport = %transport, stream = %stream))]
    pub fn create(
        &self,
        transport: &str,
        stream: &str,
        args: &TransportArguments,
    ) -> Result<Option<Arc<dyn StreamSink>>> {
        let Some(constructor) = self.constructors.get(transport) else {
            debug!("unknown transport");
            return Ok(None);
        };
        constructor(stream, args, &self.tokens).map(Some)
    }

    pub fn contains(&self, transport: &str) -> bool {
        self.constructors.contains_key(transport)
    }

    pub fn token_providers(&self) -> &TokenProviderRegistry {
        &self.tokens
    }

    pub fn token_providers_mut(&mut self) -> &mut TokenProviderRegistry {
        &mut self.tokens
    }
}

impl Default for SinkFactory {
    fn default() -> Self {
        Self::with_defaults(TokenProviderRegistry::with_defaults())
    }
}
