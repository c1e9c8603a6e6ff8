//! Small async helpers.

use std::future::Future;
use tokio_util::sync::CancellationToken;
use vaultqa_core::{Result, VaultQaError};

/// Run a fallible future, aborting with `Cancelled` when the token fires
/// first. Used around every call that crosses a process boundary so caller
/// cancellation propagates instead of blocking on a slow collaborator.
pub async fn abort_on_cancel<T, F>(cancel: &CancellationToken, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::select! {
        _ = cancel.cancelled() => Err(VaultQaError::Cancelled),
        result = fut => result,
    }
}
