use async_trait::async_trait;
use futures_util::{FutureExt, SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::{net::TcpStream, time::timeout};
use tokio_tungstenite::{
    connect_async,
    tungstenite::{self, Message},
    MaybeTlsStream, WebSocketStream,
};
use tracing::{debug, trace};

use crate::{config::EndpointConfig, error::TransportError, network::Transport};

/// Frames exchanged with the collector over the websocket.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CollectorFrame {
    Connect { client_id: String },
    Publish { channel: String, payload: String },
}

pub struct WebSocketTransport {
    endpoint: EndpointConfig,
    websocket_client: Option<WebSocketStream<MaybeTlsStream<TcpStream>>>,
}

impl WebSocketTransport {
    pub fn create(endpoint: EndpointConfig) -> Self {
        WebSocketTransport {
            endpoint,
            websocket_client: None,
        }
    }

    async fn send_frame(&mut self, frame: &CollectorFrame) -> Result<(), TransportError> {
        let publish_timeout = self.endpoint.publish_timeout;
        let Some(websocket_client) = &mut self.websocket_client else {
            return Err(TransportError::NotConnected);
        };

        let message = Message::text(serde_json::to_string(frame)?);

        let result = match timeout(publish_timeout, websocket_client.send(message)).await {
            Ok(result) => result.map_err(TransportError::from),
            Err(_) => Err(TransportError::Timeout {
                operation: "publish",
                after: publish_timeout,
            }),
        };

        if result.is_err() {
            self.drop_session();
        }

        result
    }

    fn drop_session(&mut self) {
        if self.websocket_client.take().is_some() {
            debug!("websocket session dropped");
        }
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    fn is_connected(&self) -> bool {
        self.websocket_client.is_some()
    }

    async fn connect(&mut self, client_id: &str) -> Result<(), TransportError> {
        self.drop_session();

        let url = self.endpoint.url_for(client_id);
        let connect_timeout = self.endpoint.connect_timeout;

        let websocket_client = match timeout(connect_timeout, connect_async(url.as_str())).await {
            Ok(Ok((websocket_client, _response))) => websocket_client,
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => {
                return Err(TransportError::Timeout {
                    operation: "connect",
                    after: connect_timeout,
                })
            }
        };

        debug!(%url, "websocket open");
        self.websocket_client = Some(websocket_client);

        self.send_frame(&CollectorFrame::Connect {
            client_id: client_id.to_string(),
        })
        .await
    }

    async fn publish(&mut self, channel: &str, payload: &str) -> Result<(), TransportError> {
        self.send_frame(&CollectorFrame::Publish {
            channel: channel.to_string(),
            payload: payload.to_string(),
        })
        .await
    }

    async fn poll(&mut self) -> Result<(), TransportError> {
        let publish_timeout = self.endpoint.publish_timeout;
        let Some(websocket_client) = &mut self.websocket_client else {
            return Err(TransportError::NotConnected);
        };

        let mut closed: Option<TransportError> = None;

        // Only take what is already buffered; never wait on the collector.
        while let Some(next) = websocket_client.next().now_or_never() {
            match next {
                Some(Ok(Message::Close(_))) | None => {
                    closed = Some(TransportError::Closed);
                    break;
                }
                Some(Ok(Message::Text(text))) => trace!(text = text.as_str(), "collector says"),
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    closed = Some(e.into());
                    break;
                }
            }
        }

        if closed.is_none() {
            // Pongs for any pings read above are queued until the next flush.
            match timeout(publish_timeout, websocket_client.flush()).await {
                Ok(Ok(())) => {}
                Ok(Err(tungstenite::Error::ConnectionClosed)) => {
                    closed = Some(TransportError::Closed)
                }
                Ok(Err(e)) => closed = Some(e.into()),
                Err(_) => {
                    closed = Some(TransportError::Timeout {
                        operation: "flush",
                        after: publish_timeout,
                    })
                }
            }
        }

        match closed {
            Some(e) => {
                self.drop_session();
                Err(e)
            }
            None => Ok(()),
        }
    }
}
