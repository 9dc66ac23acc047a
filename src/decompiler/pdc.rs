//! Adapter for radare2's built-in `pdc` pseudo-decompiler

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::code::{CodeAnnotation, DecompiledCode};
use super::{parse_address, Decompiler};
use crate::engine::AnalysisEngine;

/// Message sent when the backend output cannot be used
pub const PARSE_WARNING: &str = "Failed to parse JSON from pdc";

/// Runs `pdcj` through an [`AnalysisEngine`], one request at a time.
///
/// Results go to the receiver returned by [`PdcDecompiler::new`]. A
/// request made while another is still running is dropped, not queued.
pub struct PdcDecompiler {
    engine: Arc<dyn AnalysisEngine>,
    in_flight: Arc<AtomicBool>,
    listener: mpsc::UnboundedSender<DecompiledCode>,
}

impl PdcDecompiler {
    /// Create the adapter and the channel its results arrive on
    #[must_use]
    pub fn new(
        engine: Arc<dyn AnalysisEngine>,
    ) -> (Self, mpsc::UnboundedReceiver<DecompiledCode>) {
        let (listener, finished) = mpsc::unbounded_channel();
        let decompiler = Self {
            engine,
            in_flight: Arc::new(AtomicBool::new(false)),
            listener,
        };
        (decompiler, finished)
    }

    /// Whether a request is currently running
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }
}

#[async_trait]
impl Decompiler for PdcDecompiler {
    fn id(&self) -> &str {
        "pdc"
    }

    fn name(&self) -> &str {
        "pdc"
    }

    async fn is_available(&self) -> bool {
        match self.engine.cmd("e cmd.pdc=?").await {
            Ok(backends) => backends.contains("pdc"),
            Err(err) => {
                debug!("Cannot list decompiler backends: {:#}", err);
                false
            }
        }
    }

    fn decompile_at(&self, address: u64) -> bool {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("pdc request for {:#x} made outside a tokio runtime", address);
            return false;
        };
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("pdc is busy, dropping request for {:#x}", address);
            return false;
        }

        let engine = Arc::clone(&self.engine);
        let in_flight = Arc::clone(&self.in_flight);
        let listener = self.listener.clone();
        runtime.spawn(async move {
            let code = match engine.cmd(&format!("pdcj @ {address}")).await {
                Ok(raw) => parse_pdc_json(&raw),
                Err(err) => {
                    warn!("pdcj @ {:#x} failed: {:#}", address, err);
                    DecompiledCode::warning(PARSE_WARNING)
                }
            };
            in_flight.store(false, Ordering::Release);
            debug!(
                "pdc finished at {:#x} with {} annotation(s)",
                address,
                code.annotations.len()
            );
            if listener.send(code).is_err() {
                debug!("pdc result dropped, nobody is listening");
            }
        });
        true
    }
}

/// One entry of the `annotations` array. Entries that do not fit this
/// shape are skipped.
#[derive(Debug, Deserialize)]
struct RawAnnotation {
    #[serde(rename = "type")]
    kind: String,
    start: usize,
    end: usize,
    #[serde(default)]
    offset: Value,
}

/// Turn `pdcj` output into decompiled code.
///
/// Output that is not a non-empty JSON object yields a warning result.
#[must_use]
pub fn parse_pdc_json(raw: &str) -> DecompiledCode {
    let json = match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(json)) if !json.is_empty() => json,
        _ => return DecompiledCode::warning(PARSE_WARNING),
    };

    let mut code = DecompiledCode::new(
        json.get("code")
            .and_then(Value::as_str)
            .unwrap_or_default(),
    );

    let entries = json.get("annotations").and_then(Value::as_array);
    for entry in entries.into_iter().flatten() {
        let Ok(raw) = RawAnnotation::deserialize(entry) else {
            continue;
        };
        if raw.kind != "offset" {
            continue;
        }
        code.add_annotation(CodeAnnotation::offset(
            raw.start,
            raw.end,
            parse_offset(&raw.offset).unwrap_or(0),
        ));
    }

    let errors = json.get("errors").and_then(Value::as_array);
    for error in errors.into_iter().flatten().filter_map(Value::as_str) {
        if !code.code.is_empty() && !code.code.ends_with('\n') {
            code.code.push('\n');
        }
        code.code.push_str(error);
        code.code.push('\n');
    }

    code
}

/// Offsets arrive as numbers, or as decimal or `0x` strings
fn parse_offset(value: &Value) -> Option<u64> {
    match value {
        Value::Number(number) => number.as_u64(),
        Value::String(text) => parse_address(text).ok(),
        _ => None,
    }
}
