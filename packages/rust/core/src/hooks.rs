//! Upload hooks: callbacks run in registration order after each successful import.

use async_trait::async_trait;
use mediaimport_shared::{MediaId, Metadata, Result};
use tracing::{debug, warn};

/// A side effect run once per imported media item.
///
/// An error is logged and recorded on the row. It never stops the import or
/// the hooks registered after this one.
#[async_trait]
pub trait UploadHook: Send + Sync {
    /// Name used in logs and error messages.
    fn name(&self) -> &str {
        "upload-hook"
    }

    async fn on_upload(&self, media_id: &MediaId, metadata: &Metadata) -> Result<()>;
}

/// Adapts a plain closure into an [`UploadHook`].
pub struct FnHook<F> {
    name: String,
    f: F,
}

impl<F> FnHook<F>
where
    F: Fn(&MediaId, &Metadata) -> Result<()> + Send + Sync,
{
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }
}

#[async_trait]
impl<F> UploadHook for FnHook<F>
where
    F: Fn(&MediaId, &Metadata) -> Result<()> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn on_upload(&self, media_id: &MediaId, metadata: &Metadata) -> Result<()> {
        (self.f)(media_id, metadata)
    }
}

/// Ordered list of upload hooks.
#[derive(Default)]
pub struct HookDispatcher {
    hooks: Vec<Box<dyn UploadHook>>,
}

impl HookDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a hook. Hooks run in the order they were registered.
    pub fn register(&mut self, hook: Box<dyn UploadHook>) {
        self.hooks.push(hook);
    }

    pub(crate) fn len(&self) -> usize {
        self.hooks.len()
    }

    /// Run every hook for the item imported from `url` and collect their error messages.
    pub async fn dispatch(
        &self,
        url: &str,
        media_id: &MediaId,
        metadata: &Metadata,
    ) -> Vec<String> {
        let mut errors = Vec::new();
        for hook in &self.hooks {
            debug!(hook = hook.name(), %media_id, "running upload hook");
            if let Err(e) = hook.on_upload(media_id, metadata).await {
                warn!(hook = hook.name(), url, %media_id, error = %e, "upload hook failed");
                errors.push(format!("{}: {e}", hook.name()));
            }
        }
        errors
    }
}

impl std::fmt::Debug for HookDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.hooks.iter().map(|h| h.name()))
            .finish()
    }
}
