use tokio::select;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Cancels `cancelation` once the process receives ctrl-c. Returns early if the token gets
/// cancelled from elsewhere, for example when the user quits from the prompt.
pub async fn detect_shutdown(cancelation: CancellationToken) {
    select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received ctrl-c");
            cancelation.cancel();
        },
        _ = cancelation.cancelled() => (),
    };
}
