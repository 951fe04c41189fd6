use std::future::{Future, IntoFuture};
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use crate::state::AppState;
use tokio::net::TcpListener;
use tokio::sync::Notify;
use tower_http::trace::TraceLayer;
use tracing::warn;

pub fn create_app(state: AppState) -> Router {
    crate::routes::configure_routes(&state)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serves `app` until `signal` resolves, then drains in-flight requests for at
/// most `drain`. Requests still running after that are dropped.
pub async fn serve<S>(listener: TcpListener, app: Router, signal: S, drain: Duration) -> std::io::Result<()>
where
    S: Future<Output = ()> + Send + 'static,
{
    let draining = Arc::new(Notify::new());
    let server = axum::serve(listener, app).with_graceful_shutdown({
        let draining = Arc::clone(&draining);
        async move {
            signal.await;
            draining.notify_one();
        }
    });

    tokio::select! {
        result = server.into_future() => result,
        _ = async {
            draining.notified().await;
            tokio::time::sleep(drain).await;
        } => {
            warn!(?drain, "In-flight requests did not finish in time, abandoning them");
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::routing::get;
    use tokio::sync::oneshot;

    async fn bind() -> (TcpListener, std::net::SocketAddr) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        (listener, addr)
    }

    #[tokio::test]
    async fn idle_server_stops_on_signal() {
        let (listener, _) = bind().await;
        let (stop, stopped) = oneshot::channel::<()>();
        let server = tokio::spawn(serve(
            listener,
            Router::new().route("/", get(|| async { "ok" })),
            async move {
                let _ = stopped.await;
            },
            Duration::from_secs(30),
        ));

        stop.send(()).unwrap();
        let result = tokio::time::timeout(Duration::from_secs(5), server)
            .await
            .expect("server stops without waiting for the drain");
        assert!(result.unwrap().is_ok());
    }

    #[tokio::test]
    async fn hung_request_is_abandoned_after_the_drain() {
        let entered = Arc::new(Notify::new());
        let app = Router::new().route(
            "/hang",
            get({
                let entered = Arc::clone(&entered);
                move || {
                    let entered = Arc::clone(&entered);
                    async move {
                        entered.notify_one();
                        std::future::pending::<()>().await
                    }
                }
            }),
        );

        let (listener, addr) = bind().await;
        let (stop, stopped) = oneshot::channel::<()>();
        let server = tokio::spawn(serve(
            listener,
            app,
            async move {
                let _ = stopped.await;
            },
            Duration::from_millis(100),
        ));

        let client = tokio::spawn(reqwest::get(format!("http://{addr}/hang")));
        entered.notified().await;
        stop.send(()).unwrap();

        let result = tokio::time::timeout(Duration::from_secs(5), server)
            .await
            .expect("drain is bounded");
        assert!(result.unwrap().is_ok());
        client.abort();
    }
}
