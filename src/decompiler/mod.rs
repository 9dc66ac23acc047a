//! Decompiler backends and the annotated code they produce

pub mod code;
pub mod pdc;

use async_trait::async_trait;
use std::num::ParseIntError;

pub use code::{AnnotationKind, CodeAnnotation, DecompiledCode};
pub use pdc::PdcDecompiler;

/// A decompiler backend.
///
/// Each backend reports results through its own listener channel, exactly
/// once per accepted request.
#[async_trait]
pub trait Decompiler: Send + Sync {
    /// Stable identifier, also used in settings
    fn id(&self) -> &str;

    /// Human-readable name
    fn name(&self) -> &str;

    /// Whether the engine has this backend registered
    async fn is_available(&self) -> bool;

    /// Start decompiling the function at `address`.
    ///
    /// Returns `false` when the request was dropped, either because another
    /// one is still running or because no tokio runtime is active.
    fn decompile_at(&self, address: u64) -> bool;
}

/// Parse an address written in decimal or as `0x`-prefixed hex
///
/// # Errors
/// Returns the integer parse error for anything else
pub fn parse_address(text: &str) -> Result<u64, ParseIntError> {
    let text = text.trim();
    match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => text.parse(),
    }
}
