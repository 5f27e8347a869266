use super::{Connector, HandleId, StreamEvent, StreamEventKind};
use crate::{
    books::OrderBookUpdate,
    error::ScannerError,
    exchange::gate::{GateMessage, GateSubscribeRequest, book::GateOrderBookUpdate},
    subscription::{ChannelKind, Subscription},
};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// [`Connector`] opening one Gate.io spot WebSocket per subscription.
#[derive(Debug, Clone)]
pub struct GateConnector {
    url: String,
}

impl GateConnector {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Connector for GateConnector {
    fn connect(
        &self,
        handle: HandleId,
        subscription: Subscription,
        events: mpsc::Sender<StreamEvent>,
        cancel: CancellationToken,
    ) {
        let url = self.url.clone();
        tokio::spawn(async move {
            run_gate_connection(url, handle, subscription, events, cancel).await;
        });
    }
}

/// Drive a single Gate.io connection until it is cancelled, closed, or fails.
///
/// Failures are reported once as [`StreamEventKind::Disconnected`] and never retried. A
/// cancelled connection sends a close frame and exits without reporting anything.
pub async fn run_gate_connection(
    url: String,
    handle: HandleId,
    subscription: Subscription,
    events: mpsc::Sender<StreamEvent>,
    cancel: CancellationToken,
) {
    let symbol = subscription.symbol.clone();
    let channel = subscription.kind;
    let event = |kind| StreamEvent {
        handle,
        symbol: symbol.clone(),
        channel,
        kind,
    };

    let connected = tokio::select! {
        _ = cancel.cancelled() => return,
        connected = connect_async(url.as_str()) => connected,
    };

    let ws_stream = match connected {
        Ok((ws_stream, _)) => ws_stream,
        Err(e) => {
            error!(%handle, %symbol, %channel, "Failed to connect to {}: {}", url, e);
            let _ = events
                .send(event(StreamEventKind::Disconnected(Some(e.into()))))
                .await;
            return;
        }
    };

    let (mut write, mut read) = ws_stream.split();

    let request = GateSubscribeRequest::from(&subscription);
    let payload = match serde_json::to_string(&request) {
        Ok(payload) => payload,
        Err(e) => {
            let error = ScannerError::Deserialise {
                entity: "GateSubscribeRequest",
                error: e.to_string(),
            };
            let _ = events
                .send(event(StreamEventKind::Disconnected(Some(error))))
                .await;
            return;
        }
    };

    if let Err(e) = write.send(Message::Text(payload.into())).await {
        warn!(%handle, %symbol, %channel, "Failed to send subscribe request: {}", e);
        let _ = events
            .send(event(StreamEventKind::Disconnected(Some(e.into()))))
            .await;
        return;
    }

    info!(%handle, %symbol, %channel, "Subscribed on {}", url);
    if events.send(event(StreamEventKind::Connected)).await.is_err() {
        return;
    }

    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                debug!(%handle, %symbol, %channel, "connection cancelled");
                let _ = write.send(Message::Close(None)).await;
                return;
            }

            message = read.next() => {
                let kind = match message {
                    Some(Ok(Message::Text(text))) => match parse_frame(channel, &text) {
                        Some(kind) => kind,
                        None => continue,
                    },
                    Some(Ok(Message::Close(frame))) => {
                        info!(%handle, %symbol, %channel, ?frame, "Server closed connection");
                        StreamEventKind::Disconnected(None)
                    }
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        let error = ScannerError::from(e);
                        if !error.is_terminal() {
                            warn!(
                                %handle,
                                %symbol,
                                %channel,
                                %error,
                                "Skipping non-terminal WebSocket error"
                            );
                            continue;
                        }
                        error!(%handle, %symbol, %channel, %error, "WebSocket error");
                        StreamEventKind::Disconnected(Some(error))
                    }
                    None => {
                        info!(%handle, %symbol, %channel, "WebSocket stream ended");
                        StreamEventKind::Disconnected(None)
                    }
                };

                let terminal = matches!(kind, StreamEventKind::Disconnected(_));
                if events.send(event(kind)).await.is_err() {
                    debug!(%handle, "Event receiver dropped, stopping connection");
                    return;
                }
                if terminal {
                    return;
                }
            }
        }
    }
}

/// Map one text frame to the event it produces on `channel`.
///
/// Acknowledgements, error frames and malformed payloads produce nothing.
pub fn parse_frame(channel: ChannelKind, text: &str) -> Option<StreamEventKind> {
    let body = match serde_json::from_str::<GateMessage>(text) {
        Ok(GateMessage::Update(body)) => body,
        Ok(GateMessage::Ignore) => return None,
        Err(e) => {
            debug!(%channel, "Failed to parse message: {}", e);
            return None;
        }
    };

    match channel {
        ChannelKind::Trades => Some(StreamEventKind::Trade),
        ChannelKind::OrderBook => {
            let update = serde_json::from_value::<GateOrderBookUpdate>(body)
                .map_err(|e| ScannerError::Deserialise {
                    entity: "GateOrderBookUpdate",
                    error: e.to_string(),
                })
                .and_then(OrderBookUpdate::try_from);

            match update {
                Ok(update) => Some(StreamEventKind::OrderBook(update)),
                Err(error) => {
                    debug!(%channel, %error, "discarding malformed order book frame");
                    None
                }
            }
        }
    }
}
