//! TCP front end: accepts connections and feeds every request through an
//! [`App`].
//!
//! Each connection gets its own Tokio task and stays open (HTTP/1.1
//! keep-alive) until the peer closes it or sends `Connection: close`.
//! Requests already sitting in the read buffer are answered before the
//! socket is read again, so pipelined requests are served in order.

use std::future::Future;
use std::net::SocketAddr;

use bytes::BytesMut;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};

use crate::app::App;
use crate::http::{
    StatusCode,
    request::{Request, RequestError},
    response::Response,
};

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to bind to {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}

/// Largest request (head plus body) a connection will buffer (8 MiB).
const MAX_REQUEST_SIZE: usize = 8 * 1024 * 1024;

const INITIAL_BUF_SIZE: usize = 4096;

/// A bound listener waiting for an [`App`] to serve.
///
/// # Examples
///
/// ```rust,no_run
/// use cachegate::{App, Response, Router, Server, StatusCode};
/// use cachegate::context::Context;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let mut router = Router::new();
///     router.get("/", |_ctx: Context| async { Response::new(StatusCode::Ok).body("Hello!") });
///
///     Server::bind("127.0.0.1:8080").await?.serve(App::new(router)).await?;
///     Ok(())
/// }
/// ```
pub struct Server {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl Server {
    /// # Errors
    ///
    /// Returns [`ServerError::Bind`] if the address cannot be bound.
    pub async fn bind(addr: impl AsRef<str>) -> Result<Self, ServerError> {
        let addr = addr.as_ref();
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: addr.to_owned(),
                source,
            })?;
        let local_addr = listener.local_addr()?;
        Ok(Self {
            listener,
            local_addr,
        })
    }

    /// The bound address; useful after binding to port `0`.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Serves `app` until the process exits.
    ///
    /// # Errors
    ///
    /// Currently never returns an error; accept failures are logged and the
    /// loop carries on.
    pub async fn serve(self, app: App) -> Result<(), ServerError> {
        self.serve_with_shutdown(app, std::future::pending()).await
    }

    /// Serves `app` until `shutdown` completes.
    ///
    /// Once `shutdown` fires no new connections are accepted. Connections
    /// already open finish on their own tasks.
    ///
    /// # Errors
    ///
    /// Currently never returns an error; accept failures are logged and the
    /// loop carries on.
    pub async fn serve_with_shutdown<S>(self, app: App, shutdown: S) -> Result<(), ServerError>
    where
        S: Future<Output = ()>,
    {
        info!(address = %self.local_addr, "cachegate listening");
        tokio::pin!(shutdown);

        loop {
            let (stream, peer) = tokio::select! {
                () = &mut shutdown => {
                    info!(address = %self.local_addr, "stopped accepting connections");
                    return Ok(());
                }
                accepted = self.listener.accept() => match accepted {
                    Ok(pair) => pair,
                    Err(e) => {
                        warn!(error = %e, "failed to accept connection");
                        continue;
                    }
                },
            };

            debug!(peer = %peer, "connection accepted");
            let app = app.clone();
            tokio::spawn(async move {
                if let Err(e) = Connection::new(stream, peer).serve(&app).await {
                    warn!(peer = %peer, error = %e, "connection closed with error");
                }
            });
        }
    }
}

/// What the read side produced next.
enum Frame {
    /// A complete request and the number of buffered bytes it occupies.
    Request(Request, usize),
    /// The input cannot be served; answer and close.
    Reject(Response),
    /// The peer closed the socket.
    Closed,
}

struct Connection {
    stream: TcpStream,
    peer: SocketAddr,
    buf: BytesMut,
}

impl Connection {
    fn new(stream: TcpStream, peer: SocketAddr) -> Self {
        Self {
            stream,
            peer,
            buf: BytesMut::with_capacity(INITIAL_BUF_SIZE),
        }
    }

    async fn serve(mut self, app: &App) -> std::io::Result<()> {
        loop {
            let (request, consumed) = match self.next_frame().await? {
                Frame::Request(request, consumed) => (request, consumed),
                Frame::Reject(response) => return self.send(response.keep_alive(false)).await,
                Frame::Closed => {
                    debug!(peer = %self.peer, "connection closed by peer");
                    return Ok(());
                }
            };
            let _ = self.buf.split_to(consumed);

            let keep_alive = request.is_keep_alive();
            debug!(
                peer = %self.peer,
                method = %request.method(),
                path = %request.path(),
                "dispatching request"
            );

            let response = app.handle(request).await.keep_alive(keep_alive);
            self.send(response).await?;

            if !keep_alive {
                return Ok(());
            }
        }
    }

    // Parses from what is buffered first and only reads when that is not
    // yet a whole request.
    async fn next_frame(&mut self) -> std::io::Result<Frame> {
        loop {
            if !self.buf.is_empty() {
                match Request::parse(&self.buf) {
                    Ok((mut request, body_offset)) => {
                        let body_len = request.content_length().unwrap_or(0);
                        let total = body_offset.saturating_add(body_len);
                        if total > MAX_REQUEST_SIZE {
                            return Ok(self.too_large());
                        }
                        if self.buf.len() >= total {
                            request.truncate_body(body_len);
                            return Ok(Frame::Request(request, total));
                        }
                    }
                    Err(RequestError::Incomplete) => {}
                    Err(e) => {
                        warn!(peer = %self.peer, error = %e, "bad request, sending 400");
                        return Ok(Frame::Reject(
                            Response::new(StatusCode::BadRequest).body(format!("Bad Request: {e}")),
                        ));
                    }
                }
            }

            if self.buf.len() > MAX_REQUEST_SIZE {
                return Ok(self.too_large());
            }
            if self.stream.read_buf(&mut self.buf).await? == 0 {
                return Ok(Frame::Closed);
            }
        }
    }

    fn too_large(&self) -> Frame {
        warn!(peer = %self.peer, "request too large, sending 413");
        Frame::Reject(Response::new(StatusCode::PayloadTooLarge).body("Request entity too large"))
    }

    async fn send(&mut self, response: Response) -> std::io::Result<()> {
        self.stream.write_all(&response.into_bytes()).await?;
        self.stream.flush().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Router;
    use crate::context::Context;
    use tokio::sync::oneshot;

    async fn start() -> (SocketAddr, oneshot::Sender<()>, tokio::task::JoinHandle<Result<(), ServerError>>) {
        let mut router = Router::new();
        router.get("/echo/:word", |ctx: Context| async move {
            let word = ctx.params().get("word").unwrap_or("").to_owned();
            Response::new(StatusCode::Ok).body(word)
        });
        router.post("/len", |ctx: Context| async move {
            Response::new(StatusCode::Ok).body(ctx.request().body().len().to_string())
        });

        let server = Server::bind("127.0.0.1:0").await.unwrap();
        let addr = server.local_addr();
        let (stop, stopped) = oneshot::channel::<()>();
        let handle = tokio::spawn(server.serve_with_shutdown(App::new(router), async move {
            let _ = stopped.await;
        }));
        (addr, stop, handle)
    }

    async fn exchange(addr: SocketAddr, raw: &[u8]) -> String {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(raw).await.unwrap();
        let mut out = Vec::new();
        stream.read_to_end(&mut out).await.unwrap();
        String::from_utf8(out).unwrap()
    }

    #[tokio::test]
    async fn pipelined_requests_are_answered_in_order() {
        let (addr, _stop, _) = start().await;
        let out = exchange(
            addr,
            b"GET /echo/one HTTP/1.1\r\n\r\nGET /echo/two HTTP/1.1\r\nConnection: close\r\n\r\n",
        )
        .await;

        let one = out.find("\r\n\r\none").unwrap();
        let two = out.find("\r\n\r\ntwo").unwrap();
        assert!(one < two);
        assert_eq!(out.matches("HTTP/1.1 200 OK").count(), 2);
        assert!(out.contains("Connection: close"));
    }

    #[tokio::test]
    async fn body_stops_at_content_length() {
        let (addr, _stop, _) = start().await;
        let out = exchange(
            addr,
            b"POST /len HTTP/1.1\r\nContent-Length: 5\r\n\r\nhelloGET /echo/next HTTP/1.1\r\nConnection: close\r\n\r\n",
        )
        .await;

        assert!(out.contains("\r\n\r\n5HTTP/1.1"));
        assert!(out.ends_with("\r\n\r\nnext"));
    }

    #[tokio::test]
    async fn malformed_request_gets_400_and_close() {
        let (addr, _stop, _) = start().await;
        let out = exchange(addr, b"NOT A REQUEST\r\n\r\n").await;
        assert!(out.starts_with("HTTP/1.1 400 Bad Request\r\n"));
        assert!(out.contains("Connection: close"));
    }

    #[tokio::test]
    async fn oversized_body_gets_413() {
        let (addr, _stop, _) = start().await;
        let raw = format!("POST /len HTTP/1.1\r\nContent-Length: {}\r\n\r\n", MAX_REQUEST_SIZE + 1);
        let out = exchange(addr, raw.as_bytes()).await;
        assert!(out.starts_with("HTTP/1.1 413 Payload Too Large\r\n"));
    }

    #[tokio::test]
    async fn shutdown_stops_the_accept_loop() {
        let (addr, stop, handle) = start().await;
        let out = exchange(addr, b"GET /echo/hi HTTP/1.1\r\nConnection: close\r\n\r\n").await;
        assert!(out.ends_with("hi"));

        stop.send(()).unwrap();
        let result = tokio::time::timeout(std::time::Duration::from_secs(2), handle)
            .await
            .expect("server kept running after shutdown")
            .unwrap();
        assert!(result.is_ok());
    }
}
