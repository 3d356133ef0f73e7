//! Live positioning: permission, initial fix and continuous subscription

use super::{LocationProvider, PermissionStatus, SampleSink, Subscription};
use crate::config::TrackerConfig;
use crate::error::TrackingError;
use crate::types::LocationSample;

/// Request location access, failing with `PermissionDenied` when refused
pub async fn request_access(provider: &dyn LocationProvider) -> Result<(), TrackingError> {
    match provider.request_permission().await {
        PermissionStatus::Granted => Ok(()),
        PermissionStatus::Denied => {
            tracing::warn!("Location permission denied");
            Err(TrackingError::PermissionDenied)
        }
    }
}

/// Obtain one fix, retrying with a fixed backoff between attempts
pub async fn acquire_initial_fix(
    provider: &dyn LocationProvider,
    config: &TrackerConfig,
) -> Result<LocationSample, TrackingError> {
    let attempts = config.initial_fix_attempts;

    for attempt in 1..=attempts {
        match provider.current_position().await {
            Ok(fix) => {
                tracing::debug!(attempt, "Initial fix acquired");
                return Ok(fix);
            }
            Err(err) => {
                tracing::warn!(attempt, attempts, %err, "Initial fix attempt failed");
                if attempt < attempts {
                    tokio::time::sleep(config.initial_fix_backoff()).await;
                }
            }
        }
    }

    Err(TrackingError::InitialFixUnavailable { attempts })
}

/// Open a continuous subscription with the configured delivery minimums
pub async fn subscribe_live(
    provider: &dyn LocationProvider,
    config: &TrackerConfig,
    sink: SampleSink,
) -> Result<Box<dyn Subscription>, TrackingError> {
    let subscription = provider.watch_position(&config.watch, sink).await?;
    tracing::debug!("Live location subscription opened");
    Ok(subscription)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderError;
    use crate::source::scripted::ScriptedProvider;
    use std::time::Duration;
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn test_initial_fix_retries_with_backoff() {
        let provider = ScriptedProvider::granted();
        provider.push_fix(Err(ProviderError::NoFix("cold start".into())));
        provider.push_fix(Err(ProviderError::NoFix("cold start".into())));
        provider.push_fix(Ok(LocationSample::new(1.0, 2.0, 3)));

        let started = Instant::now();
        let fix = acquire_initial_fix(&provider, &TrackerConfig::default())
            .await
            .unwrap();

        assert_eq!(fix, LocationSample::new(1.0, 2.0, 3));
        assert_eq!(provider.fix_requests(), 3);
        assert_eq!(started.elapsed(), Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_initial_fix_gives_up_after_three_attempts() {
        let provider = ScriptedProvider::granted();

        let started = Instant::now();
        let err = acquire_initial_fix(&provider, &TrackerConfig::default())
            .await
            .unwrap_err();

        assert!(matches!(err, TrackingError::InitialFixUnavailable { attempts: 3 }));
        assert_eq!(provider.fix_requests(), 3);
        // No backoff after the last attempt
        assert_eq!(started.elapsed(), Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_denied_permission() {
        let provider = ScriptedProvider::denied();
        assert!(matches!(
            request_access(&provider).await,
            Err(TrackingError::PermissionDenied)
        ));
        assert!(request_access(&ScriptedProvider::granted()).await.is_ok());
    }
}
