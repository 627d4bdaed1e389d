//! Per-call sink for response headers.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::call::CallOptionKey;

/// Response headers captured from a single call.
///
/// Create one before the call starts and attach it with
/// [`ResponseMetadata::KEY`]; [`ResponseMetadataInterceptor`] fills it in when
/// the transport delivers headers. Clones share the same storage, so the copy
/// kept by the caller sees what the interceptor wrote.
///
/// Names are matched exactly as the transport delivered them. Only headers
/// whose name and value are valid UTF-8 are captured; binary (`-bin`)
/// values that are not are left out rather than altered.
///
/// [`ResponseMetadataInterceptor`]: crate::ResponseMetadataInterceptor
#[derive(Debug, Clone, Default)]
pub struct ResponseMetadata {
    values: Arc<Mutex<HashMap<String, Vec<String>>>>,
}

impl ResponseMetadata {
    /// Call option under which a sink is attached to a call.
    pub const KEY: CallOptionKey<ResponseMetadata> =
        CallOptionKey::new("ringline.grpc.response_metadata");

    pub fn new() -> Self {
        Self::default()
    }

    /// Append `value` under `name`.
    pub fn put(&self, name: impl Into<String>, value: impl Into<String>) {
        self.values
            .lock()
            .entry(name.into())
            .or_default()
            .push(value.into());
    }

    /// The last value appended under `name`.
    pub fn get(&self, name: &str) -> Option<String> {
        self.values.lock().get(name)?.last().cloned()
    }

    /// Every value appended under `name`, oldest first.
    pub fn get_all(&self, name: &str) -> Option<Vec<String>> {
        self.values.lock().get(name).cloned()
    }

    pub fn keys(&self) -> HashSet<String> {
        self.values.lock().keys().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.values.lock().is_empty()
    }
}
