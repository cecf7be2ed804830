//! One datagram socket that can both send and receive reliable streams.
//!
//! ```rust,no_run
//! use arq_tokio::{ArqConfig, Endpoint};
//!
//! #[tokio::main]
//! async fn main() -> arq_tokio::Result<()> {
//!     let client = Endpoint::bind("127.0.0.1:0", ArqConfig::default()).await?;
//!     let server = "127.0.0.1:12000".parse().unwrap();
//!
//!     client.send_all(&server, ["Message 0", "Message 1", "END"]).await?;
//!     let reply = client.receive_all().await?;
//!     println!("{} frames back", reply.len());
//!     Ok(())
//! }
//! ```

use crate::channel::Channel;
use crate::config::ArqConfig;
use crate::error::Result;
use crate::receiver::ReceiverEngine;
use crate::sender::SenderEngine;
use crate::transport::Transport;

use bytes::Bytes;
use std::sync::Arc;

pub struct Endpoint<T: Transport> {
    channel: Arc<Channel<T>>,
    config: ArqConfig,
}

impl<T: Transport> Endpoint<T> {
    /// Wrap a transport. Fails if `config` does not validate.
    pub fn new(transport: Arc<T>, config: ArqConfig) -> Result<Self> {
        config.validate()?;
        let channel = Arc::new(Channel::new(transport, config.faults.clone()));
        Ok(Self { channel, config })
    }

    pub fn local_addr(&self) -> Result<T::Addr> {
        self.channel.local_addr()
    }

    pub fn config(&self) -> &ArqConfig {
        &self.config
    }

    pub fn transport(&self) -> &Arc<T> {
        self.channel.transport()
    }

    /// A sender bound to `peer`, for callers that want snapshots or stats
    pub fn sender(&self, peer: T::Addr) -> SenderEngine<T> {
        SenderEngine::new(self.channel.clone(), peer, self.config.clone())
    }

    pub fn receiver(&self) -> ReceiverEngine<T> {
        ReceiverEngine::new(self.channel.clone(), self.config.clone())
    }

    /// Reliably deliver `messages` to `peer` in order.
    pub async fn send_all<I, B>(&self, peer: &T::Addr, messages: I) -> Result<()>
    where
        I: IntoIterator<Item = B>,
        B: Into<Bytes>,
    {
        self.sender(peer.clone()).send_all(messages).await
    }

    /// Receive one stream, through the end-of-stream marker.
    pub async fn receive_all(&self) -> Result<Vec<Bytes>> {
        self.receiver().receive_all().await
    }

    /// Receive one stream and report which peer sent it.
    pub async fn receive_from(&self) -> Result<(Vec<Bytes>, T::Addr)> {
        self.receiver().receive_from().await
    }
}

#[cfg(feature = "udp")]
impl Endpoint<crate::transport::UdpTransport> {
    /// Bind a UDP socket and wrap it.
    pub async fn bind(
        addr: impl tokio::net::ToSocketAddrs,
        config: ArqConfig,
    ) -> Result<Self> {
        config.validate()?;
        let transport = crate::transport::UdpTransport::bind(addr).await?;
        let endpoint = Self::new(Arc::new(transport), config)?;
        tracing::info!(local = %endpoint.local_addr()?, "Endpoint bound");
        Ok(endpoint)
    }
}
