//! Loading, linking and starting a module.
//!
//! Both entry points are idempotent: once an instance is installed they hand
//! back its exports without touching the source again.

use crate::abi::ModuleExports;
use crate::bridge::{Bridge, Instance};
use crate::error::{BridgeError, CallError};
use crate::imports::Imports;
use linear_memory::MemoryViews;
use std::fmt;
use std::future::Future;
use std::rc::Rc;

/// Content type that allows streaming compilation to be trusted.
pub const WASM_CONTENT_TYPE: &str = "application/wasm";

/// Result of instantiation: the installed exports.
pub type InitResult = Result<Rc<dyn ModuleExports>, CallError>;

/// A compiled, not yet instantiated module.
pub trait CompiledModule {
    /// Names of the imports the module links against.
    fn imports(&self) -> Vec<String>;

    /// Creates an instance wired to `imports`.
    fn instantiate(&self, imports: Imports) -> Result<Rc<dyn ModuleExports>, BridgeError>;
}

/// Compiles module bytes.
pub trait Engine {
    /// Compiles a complete module.
    fn compile(&self, bytes: &[u8]) -> Result<Rc<dyn CompiledModule>, BridgeError>;

    /// Whether [`Engine::compile_streaming`] is available.
    fn supports_streaming(&self) -> bool {
        false
    }

    /// Compiles straight from a fetched response.
    fn compile_streaming(&self, response: &FetchResponse) -> Result<Rc<dyn CompiledModule>, BridgeError> {
        self.compile(&response.body)
    }
}

/// A fetched module resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    /// Where the response came from
    pub url: String,
    /// The `Content-Type` header, if any
    pub content_type: Option<String>,
    /// Response body
    pub body: Vec<u8>,
}

impl FetchResponse {
    /// Whether the server declared the module content type.
    pub fn is_wasm(&self) -> bool {
        self.content_type.as_deref() == Some(WASM_CONTENT_TYPE)
    }
}

/// Fetches module resources for asynchronous instantiation.
pub trait ModuleFetcher {
    /// Fetches `url`.
    fn fetch(&self, url: &str) -> impl Future<Output = Result<FetchResponse, BridgeError>>;
}

/// Where a module comes from.
#[derive(Clone)]
pub enum ModuleSource {
    /// A module compiled earlier
    Compiled(Rc<dyn CompiledModule>),
    /// Raw module bytes
    Bytes(Vec<u8>),
    /// A resource to fetch (asynchronous instantiation only)
    Url(String),
}

impl fmt::Debug for ModuleSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModuleSource::Compiled(_) => f.write_str("Compiled(..)"),
            ModuleSource::Bytes(bytes) => write!(f, "Bytes({} bytes)", bytes.len()),
            ModuleSource::Url(url) => f.debug_tuple("Url").field(url).finish(),
        }
    }
}

impl Bridge {
    /// Instantiates a module synchronously.
    ///
    /// URLs cannot be loaded synchronously and are rejected.
    pub fn init_sync(&self, source: ModuleSource, engine: &dyn Engine) -> InitResult {
        if let Ok(exports) = self.exports() {
            return Ok(exports);
        }
        let module = match source {
            ModuleSource::Compiled(module) => module,
            ModuleSource::Bytes(bytes) => engine.compile(&bytes)?,
            ModuleSource::Url(url) => {
                return Err(BridgeError::Fetch(format!(
                    "cannot fetch {url} during synchronous instantiation"
                ))
                .into())
            }
        };
        self.finalize(module)
    }

    /// Instantiates a module, fetching it first when given a URL.
    pub async fn init_async<F: ModuleFetcher>(
        &self,
        source: ModuleSource,
        engine: &dyn Engine,
        fetcher: &F,
    ) -> InitResult {
        if let Ok(exports) = self.exports() {
            return Ok(exports);
        }
        let module = match source {
            ModuleSource::Compiled(module) => module,
            ModuleSource::Bytes(bytes) => engine.compile(&bytes)?,
            ModuleSource::Url(url) => {
                let response = fetcher.fetch(&url).await?;
                load(engine, &response)?
            }
        };
        // another caller may have finished while the fetch was pending
        if let Ok(exports) = self.exports() {
            return Ok(exports);
        }
        self.finalize(module)
    }

    fn link(&self, module: &dyn CompiledModule) -> Result<Rc<dyn ModuleExports>, BridgeError> {
        if let Some(missing) = module.imports().into_iter().find(|name| !self.has_import(name)) {
            return Err(BridgeError::UnresolvedImport(missing));
        }
        module.instantiate(Imports::new(self.weak()))
    }

    fn finalize(&self, module: Rc<dyn CompiledModule>) -> InitResult {
        let exports = self.link(module.as_ref())?;
        let views = Rc::new(MemoryViews::new(exports.memory(), self.config().codec()));
        views.reset();
        self.install(Instance {
            exports: Rc::clone(&exports),
            views,
            module,
        });
        tracing::info!(
            pages = exports.memory().size_pages(),
            "module instantiated"
        );
        exports.start()?;
        tracing::info!("module started");
        Ok(exports)
    }
}

fn load(engine: &dyn Engine, response: &FetchResponse) -> Result<Rc<dyn CompiledModule>, BridgeError> {
    if engine.supports_streaming() {
        match engine.compile_streaming(response) {
            Ok(module) => return Ok(module),
            Err(err) if !response.is_wasm() => {
                tracing::warn!(
                    url = %response.url,
                    content_type = response.content_type.as_deref().unwrap_or(""),
                    error = %err,
                    "streaming compilation failed because the server does not serve \
                     the module as {WASM_CONTENT_TYPE}; falling back to compiling the full body"
                );
            }
            Err(err) => return Err(err),
        }
    }
    engine.compile(&response.body)
}
