// src/core/keeper/client.rs

//! The keeper's client for the monitor's `MonitorClient` RPC contract.
//! Grounded in the teacher's `warden::client::WardenClient`
//! (connect-then-send_and_receive over its RESP codec), adapted to our
//! bincode `WireCodec` framing and a request/response enum pair instead of
//! a single frame type.

use crate::core::errors::PgAutoCtlError;
use crate::core::protocol::{RpcRequest, RpcResponse, WireCodec};
use futures::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_util::codec::Framed;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const REPLY_TIMEOUT: Duration = Duration::from_secs(10);

pub struct MonitorClient {
    framed: Framed<TcpStream, WireCodec<RpcResponse>>,
}

impl MonitorClient {
    pub async fn connect(host: &str, port: u16) -> Result<Self, PgAutoCtlError> {
        let stream = tokio::time::timeout(CONNECT_TIMEOUT, TcpStream::connect((host, port)))
            .await
            .map_err(|_| PgAutoCtlError::MonitorError(format!("timed out connecting to monitor at {host}:{port}")))?
            .map_err(|e| PgAutoCtlError::MonitorError(format!("failed to connect to monitor at {host}:{port}: {e}")))?;
        Ok(Self {
            framed: Framed::new(stream, WireCodec::default()),
        })
    }

    pub async fn call(&mut self, request: RpcRequest) -> Result<RpcResponse, PgAutoCtlError> {
        self.framed.send(request).await?;
        let reply = tokio::time::timeout(REPLY_TIMEOUT, self.framed.next())
            .await
            .map_err(|_| PgAutoCtlError::MonitorError("timed out waiting for monitor reply".to_string()))?
            .ok_or_else(|| PgAutoCtlError::MonitorError("monitor closed the connection".to_string()))??;
        Ok(reply)
    }
}
