//! Blocking coordination helpers

use std::{future::Future, time::Duration};

use crate::core::error::{ServiceError, ServiceResult};

/// Await `fut`, bounded by `timeout` when one is given
pub async fn with_optional_timeout<F, T>(timeout: Option<Duration>, fut: F) -> ServiceResult<T>
where
    F: Future<Output = ServiceResult<T>>,
{
    match timeout {
        Some(limit) => tokio::time::timeout(limit, fut)
            .await
            .map_err(|_| ServiceError::Timeout)?,
        None => fut.await,
    }
}
