//! HTTP front-end
//!
//! `POST /api/chat` answers with a `text/event-stream` body carrying one
//! server-sent event per output event. Request errors are reported as plain
//! 400 responses before any streaming starts.

use std::convert::Infallible;
use std::future::Future;
use std::sync::Arc;

use bytes::Bytes;
use futures::StreamExt;
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Full, StreamBody};
use hyper::body::{Body, Frame};
use hyper::header::{HeaderValue, CACHE_CONTROL, CONNECTION, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use toolchat_core::{ChatError, ChatRequest, ChatService};

type ResponseBody = UnsyncBoxBody<Bytes, Infallible>;

/// Accept connections until `shutdown` resolves
pub async fn serve<F>(listener: TcpListener, service: Arc<ChatService>, shutdown: F)
where
    F: Future<Output = ()>,
{
    match listener.local_addr() {
        Ok(addr) => info!("Chat server listening on http://{}/api/chat", addr),
        Err(e) => warn!("Chat server listening on unknown address: {}", e),
    }

    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            accept_result = listener.accept() => {
                let (stream, remote_addr) = match accept_result {
                    Ok(conn) => conn,
                    Err(e) => {
                        warn!("Accept error: {}", e);
                        continue;
                    }
                };

                let io = TokioIo::new(stream);
                let service = Arc::clone(&service);

                tokio::spawn(async move {
                    let handler = service_fn(move |req| {
                        let service = Arc::clone(&service);
                        async move { handle_request(req, service).await }
                    });

                    if let Err(e) = http1::Builder::new().serve_connection(io, handler).await {
                        if !e.is_incomplete_message() {
                            warn!("Connection error from {}: {}", remote_addr, e);
                        }
                    }
                });
            }

            _ = &mut shutdown => {
                info!("Chat server shutting down");
                break;
            }
        }
    }
}

/// Route one request
pub async fn handle_request<B>(
    req: Request<B>,
    service: Arc<ChatService>,
) -> Result<Response<ResponseBody>, Infallible>
where
    B: Body,
    B::Error: std::fmt::Display,
{
    match (req.method(), req.uri().path()) {
        (&Method::POST, "/api/chat") => Ok(chat(req, service).await),
        (&Method::GET, "/health") => Ok(text(StatusCode::OK, "ok")),
        _ => Ok(text(StatusCode::NOT_FOUND, "Not Found")),
    }
}

async fn chat<B>(req: Request<B>, service: Arc<ChatService>) -> Response<ResponseBody>
where
    B: Body,
    B::Error: std::fmt::Display,
{
    let body = match req.into_body().collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => return text(StatusCode::BAD_REQUEST, &format!("Failed to read body: {}", e)),
    };

    let events = match ChatRequest::from_json(&body) {
        Ok(request) => service.start_turn(request).await,
        Err(e) => Err(e),
    };

    match events {
        Ok(events) => {
            let frames = events
                .into_stream()
                .map(|event| Ok::<_, Infallible>(Frame::data(Bytes::from(event.to_sse()))));
            let mut response = Response::new(StreamBody::new(frames).boxed_unsync());
            let headers = response.headers_mut();
            headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/event-stream"));
            headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
            headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));
            response
        }
        Err(e) => {
            let status = status_for(&e);
            if status.is_server_error() {
                error!("Chat request failed: {}", e);
            } else {
                warn!("Rejected chat request: {}", e);
            }
            text(status, &e.to_string())
        }
    }
}

fn status_for(err: &ChatError) -> StatusCode {
    match err {
        ChatError::EmptyMessages | ChatError::InvalidBody(_) | ChatError::UnknownMode(_) => {
            StatusCode::BAD_REQUEST
        }
        ChatError::Config(_) | ChatError::Provider(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn text(status: StatusCode, body: &str) -> Response<ResponseBody> {
    let mut response = Response::new(Full::new(Bytes::from(body.to_string())).boxed_unsync());
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8"));
    response
}
