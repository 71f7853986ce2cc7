//! JSON-lines bridge between an external surface process and the controller.
//!
//! Each stdin line is `{"id": n, "request": {...}}`. Stdout carries
//! `{"kind":"response","id":n,"body":{...}}` for replies and
//! `{"kind":"event","event":{...}}` for every broadcast event.

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::{mpsc, oneshot};
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::StreamExt;

use crate::controller::events::LauncherEvent;
use crate::controller::{ControllerHandle, Request, Response};
use crate::utils::error::Result;
use crate::utils::lines::LossyLines;

#[derive(Debug, Deserialize)]
pub struct Envelope {
    pub id: u64,
    pub request: Request,
}

#[derive(Debug, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Outbound {
    Response { id: Option<u64>, body: Response },
    Event { event: LauncherEvent },
}

pub async fn serve_stdio(handle: ControllerHandle) -> Result<()> {
    let stdin = BufReader::new(tokio::io::stdin());
    serve(handle, stdin, tokio::io::stdout()).await
}

/// Runs until the reader hits EOF. Responses to requests still in flight are
/// flushed before returning.
pub async fn serve<R, W>(handle: ControllerHandle, reader: R, writer: W) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (out_tx, out_rx) = mpsc::unbounded_channel::<Outbound>();
    let writer_task = tokio::spawn(write_loop(writer, out_rx));

    let mut events = handle.subscribe().into_stream();
    let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
    let event_tx = out_tx.clone();
    let forwarder = tokio::spawn(async move {
        loop {
            // Events already queued win over the stop signal.
            tokio::select! {
                biased;
                item = events.next() => match item {
                    Some(Ok(event)) => {
                        if event_tx.send(Outbound::Event { event }).is_err() {
                            break;
                        }
                    }
                    Some(Err(BroadcastStreamRecvError::Lagged(skipped))) => {
                        tracing::warn!("Surface lagged behind, {} events skipped", skipped);
                    }
                    None => break,
                },
                _ = &mut stop_rx => break,
            }
        }
    });

    let mut lines = LossyLines::new(reader);
    let mut in_flight = Vec::new();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let envelope: Envelope = match serde_json::from_str(line) {
            Ok(envelope) => envelope,
            Err(err) => {
                tracing::warn!("Malformed request line: {}", err);
                let _ = out_tx.send(Outbound::Response {
                    id: None,
                    body: Response::Error {
                        message: format!("malformed request: {}", err),
                    },
                });
                continue;
            }
        };

        let handle = handle.clone();
        let reply_tx = out_tx.clone();
        in_flight.push(tokio::spawn(async move {
            let body = match handle.request(envelope.request).await {
                Ok(body) => body,
                Err(err) => Response::Error {
                    message: err.to_string(),
                },
            };
            let _ = reply_tx.send(Outbound::Response {
                id: Some(envelope.id),
                body,
            });
        }));
    }

    tracing::debug!("Request stream closed, waiting for {} pending replies", in_flight.len());
    for task in in_flight {
        let _ = task.await;
    }
    let _ = stop_tx.send(());
    let _ = forwarder.await;
    drop(out_tx);
    let _ = writer_task.await;
    Ok(())
}

async fn write_loop<W>(mut writer: W, mut rx: mpsc::UnboundedReceiver<Outbound>)
where
    W: AsyncWrite + Unpin,
{
    while let Some(message) = rx.recv().await {
        let mut line = match serde_json::to_vec(&message) {
            Ok(line) => line,
            Err(err) => {
                tracing::error!("Failed to encode outbound message: {}", err);
                continue;
            }
        };
        line.push(b'\n');
        if writer.write_all(&line).await.is_err() || writer.flush().await.is_err() {
            tracing::warn!("Surface output closed");
            break;
        }
    }
}
