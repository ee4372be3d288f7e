use std::net::{IpAddr, SocketAddr};

use axum::Router;
use if_addrs::get_if_addrs;
use tokio::net::{TcpListener, ToSocketAddrs};

/// Binds `addr` and serves `router` until Ctrl-C or SIGTERM.
pub async fn serve<S: ToSocketAddrs>(addr: S, router: Router) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    log_endpoints(&listener);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
}

fn log_endpoints(listener: &TcpListener) {
    let addr = match listener.local_addr() {
        Ok(addr) => addr,
        Err(err) => {
            tracing::warn!("Could not determine the listening address: {}", err);
            return;
        }
    };
    tracing::info!("Listening on port {}", addr.port());

    let ips = match addr {
        SocketAddr::V4(v4) if v4.ip().is_unspecified() => interface_ips(false),
        SocketAddr::V6(v6) if v6.ip().is_unspecified() => interface_ips(true),
        _ => vec![addr.ip()],
    };
    for ip in ips {
        tracing::info!("➜  POST {}", endpoint_url(ip, addr.port()));
    }
}

fn interface_ips(ipv6: bool) -> Vec<IpAddr> {
    get_if_addrs()
        .into_iter()
        .flatten()
        .map(|i| i.ip())
        .filter(|ip| ip.is_ipv6() == ipv6)
        .collect()
}

fn endpoint_url(ip: IpAddr, port: u16) -> String {
    match ip {
        _ if ip.is_loopback() => format!("http://localhost:{}/mail", port),
        IpAddr::V4(_) => format!("http://{}:{}/mail", ip, port),
        IpAddr::V6(_) => format!("http://[{}]:{}/mail", ip, port),
    }
}

async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                tracing::error!("Failed to install SIGTERM handler: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("Shutting down");
}
