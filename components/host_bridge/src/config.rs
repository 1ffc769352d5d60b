//! Bridge configuration.

use crate::error::BridgeError;
use linear_memory::TextCodec;
use object_heap::HeapLayout;
use serde::{Deserialize, Serialize};

/// Largest `heap_reserve` a configuration accepts.
pub const MAX_HEAP_RESERVE: usize = 1 << 20;

/// Whether the host provides a text codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TextCodecMode {
    /// UTF-8 encoder and decoder present
    #[default]
    Available,
    /// Degraded host: only the ASCII fast path works
    Unavailable,
}

/// Configuration of a [`Bridge`](crate::Bridge).
///
/// # Examples
///
/// ```
/// use host_bridge::BridgeConfig;
///
/// let config = BridgeConfig::from_json(r#"{ "borrow_stack_size": 32 }"#).unwrap();
/// assert_eq!(config.borrow_stack_size, 32);
/// assert!(config.finalizers);
///
/// let config = BridgeConfig::default().with_finalizers(false);
/// assert!(!config.finalizers);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Size of the borrow window; the first heap constant follows it
    pub borrow_stack_size: u32,
    /// Heap slots to reserve capacity for up front
    pub heap_reserve: usize,
    /// Install the finalizer safety net for leaked closures
    pub finalizers: bool,
    /// Text codec availability
    pub text_codec: TextCodecMode,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        BridgeConfig {
            borrow_stack_size: 128,
            heap_reserve: 128,
            finalizers: true,
            text_codec: TextCodecMode::Available,
        }
    }
}

impl BridgeConfig {
    /// Parses a JSON configuration; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, BridgeError> {
        let config: BridgeConfig =
            serde_json::from_str(json).map_err(|e| BridgeError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the values a [`Bridge`](crate::Bridge) cannot be built from.
    pub fn validate(&self) -> Result<(), BridgeError> {
        if !HeapLayout::accepts(self.borrow_stack_size) {
            return Err(BridgeError::Config(format!(
                "borrow_stack_size must be between 1 and {}, got {}",
                HeapLayout::MAX_STACK_SIZE,
                self.borrow_stack_size
            )));
        }
        if self.heap_reserve > MAX_HEAP_RESERVE {
            return Err(BridgeError::Config(format!(
                "heap_reserve must be at most {MAX_HEAP_RESERVE}, got {}",
                self.heap_reserve
            )));
        }
        Ok(())
    }

    /// Serializes the configuration as JSON.
    pub fn to_json(&self) -> String {
        // a struct of plain fields always serializes
        serde_json::to_string_pretty(self).unwrap_or_default()
    }

    /// Sets the borrow window size.
    pub fn with_borrow_stack_size(mut self, size: u32) -> Self {
        self.borrow_stack_size = size;
        self
    }

    /// Sets the heap capacity reserved up front.
    pub fn with_heap_reserve(mut self, slots: usize) -> Self {
        self.heap_reserve = slots;
        self
    }

    /// Enables or disables the finalizer safety net.
    pub fn with_finalizers(mut self, enabled: bool) -> Self {
        self.finalizers = enabled;
        self
    }

    /// Sets text codec availability.
    pub fn with_text_codec(mut self, mode: TextCodecMode) -> Self {
        self.text_codec = mode;
        self
    }

    pub(crate) fn layout(&self) -> HeapLayout {
        HeapLayout::new(self.borrow_stack_size)
    }

    pub(crate) fn codec(&self) -> TextCodec {
        match self.text_codec {
            TextCodecMode::Available => TextCodec::utf8(),
            TextCodecMode::Unavailable => TextCodec::unavailable(),
        }
    }
}
