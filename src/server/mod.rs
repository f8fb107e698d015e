//! HTTP server setup and lifecycle
//!
//! | Path | Method | Success |
//! |---|---|---|
//! | `/health` | GET | 200 `{"status":"ok"}` |
//! | `/verify/:subject_id` | GET | 302 to Discord consent |
//! | `/callback` | GET | 302 to GitHub consent |
//! | `/callback/github-callback` | GET | 200 quiz page |
//! | `/submit-quiz` | POST | 200 `Verification successful` |
//! | `/success`, `/failure` | GET | 200 static page |

pub mod handlers;
pub mod router;
pub mod state;

pub use router::create_router;
pub use state::AppState;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::error::{GuildgateError, Result};

/// Serves `state` on `listener` until `cancel` fires, then drains in-flight requests.
pub async fn serve(listener: TcpListener, state: AppState, cancel: CancellationToken) -> Result<()> {
    let app = create_router(state);

    if let Ok(addr) = listener.local_addr() {
        tracing::info!("Guildgate listening on {}", addr);
    }

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await
        .map_err(|e| GuildgateError::Server(e.to_string()))?;

    tracing::info!("HTTP server stopped");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal, initiating graceful shutdown");
        }
    }
}
