use socket2::{Domain, Protocol, Socket, Type};
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};

// "*" binds every interface, preferring an IPv6 dual-stack socket
pub async fn create_listener(
    host: &str,
    port: u16,
) -> std::io::Result<(String, tokio::net::TcpListener)> {
    if host == "*" {
        return create_wildcard_listener(port);
    }

    let addr = format!("{}:{}", host, port);
    tracing::info!("Attempting to bind server to {}...", addr);

    let tokio_listener = tokio::net::TcpListener::bind(&addr).await?;

    Ok((addr, tokio_listener))
}

fn bind_socket(socket: Socket, addr: SocketAddr) -> std::io::Result<tokio::net::TcpListener> {
    socket.set_reuse_address(true)?;
    socket.bind(&addr.into())?;
    socket.listen(1024)?;

    // Make it non-blocking for tokio
    socket.set_nonblocking(true)?;

    let std_listener: std::net::TcpListener = socket.into();
    tokio::net::TcpListener::from_std(std_listener)
}

fn create_ipv6_dual_stack_wildcard_listener(
    port: u16,
) -> std::io::Result<(String, tokio::net::TcpListener)> {
    let addr = SocketAddr::from((Ipv6Addr::UNSPECIFIED, port));

    tracing::info!(
        "Attempting to bind server to {}... (IPv6 + IPv4 dual-stack)",
        addr
    );

    let socket = Socket::new(Domain::IPV6, Type::STREAM, Some(Protocol::TCP))?;

    // Some systems refuse dual-stack; an IPv6-only socket is still usable
    if let Err(e) = socket.set_only_v6(false) {
        tracing::warn!(
            "Failed to set dual-stack mode for IPv6 socket: {}. Continuing anyway.",
            e
        );
    }

    Ok((addr.to_string(), bind_socket(socket, addr)?))
}

fn create_wildcard_listener(port: u16) -> std::io::Result<(String, tokio::net::TcpListener)> {
    match create_ipv6_dual_stack_wildcard_listener(port) {
        Ok(listener) => return Ok(listener),
        Err(e) => tracing::warn!("Failed to bind IPv6 listener: {}. Attempting IPv4 only.", e),
    }

    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));
    tracing::info!("Attempting to bind server to {}... (IPv4)", addr);

    let socket = Socket::new(Domain::IPV4, Type::STREAM, Some(Protocol::TCP))?;
    Ok((addr.to_string(), bind_socket(socket, addr)?))
}
