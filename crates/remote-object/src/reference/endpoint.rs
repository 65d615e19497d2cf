//! Transport endpoints

use crate::marshal::{get_string, put_string, MarshalContext};
use crate::types::{RemoteError, Result};
use bytes::{Buf, BufMut};
use remote_transport::{
    same_client_factory, ClientSocketFactory, FactoryIdentity, ServerSocketFactory,
    SocketFactories,
};
use std::fmt;
use std::sync::Arc;
use tokio::net::TcpStream;
use tracing::trace;

const FORMAT_HOST_PORT: u8 = 0;
const FORMAT_HOST_PORT_FACTORY: u8 = 1;

/// A host and port, plus the socket factories used to reach it
///
/// The client socket factory travels with the endpoint (by descriptor); the
/// server socket factory is local state of the exporting side.
#[derive(Clone)]
pub struct Endpoint {
    host: String,
    port: u16,
    csf: Option<Arc<dyn ClientSocketFactory>>,
    ssf: Option<Arc<dyn ServerSocketFactory>>,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            csf: None,
            ssf: None,
        }
    }

    pub fn with_factories(
        host: impl Into<String>,
        port: u16,
        csf: Option<Arc<dyn ClientSocketFactory>>,
        ssf: Option<Arc<dyn ServerSocketFactory>>,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            csf,
            ssf,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn client_socket_factory(&self) -> Option<&Arc<dyn ClientSocketFactory>> {
        self.csf.as_ref()
    }

    pub fn server_socket_factory(&self) -> Option<&Arc<dyn ServerSocketFactory>> {
        self.ssf.as_ref()
    }

    /// Open a connection, through the endpoint's own client factory if it
    /// has one, else through the effective process factory.
    pub async fn connect(&self, factories: &SocketFactories) -> Result<TcpStream> {
        trace!("Connecting to {}", self);
        let result = match &self.csf {
            Some(csf) => csf.create_socket(&self.host, self.port).await,
            None => factories.effective().create_socket(&self.host, self.port).await,
        };
        result.map_err(|source| RemoteError::ConnectFailed {
            endpoint: self.to_string(),
            source,
        })
    }

    pub fn encode<B: BufMut>(&self, buf: &mut B) -> Result<()> {
        match &self.csf {
            None => {
                buf.put_u8(FORMAT_HOST_PORT);
                put_string(buf, &self.host)?;
                buf.put_u16(self.port);
            }
            Some(csf) => {
                buf.put_u8(FORMAT_HOST_PORT_FACTORY);
                put_string(buf, &self.host)?;
                buf.put_u16(self.port);
                put_string(buf, csf.descriptor())?;
            }
        }
        Ok(())
    }

    /// Decode an endpoint, resolving its client factory through `ctx`
    pub fn decode<B: Buf>(ctx: &MarshalContext, buf: &mut B) -> Result<Self> {
        if buf.remaining() < 1 {
            return Err(RemoteError::BufferUnderflow {
                needed: 1,
                have: 0,
            });
        }
        let format = buf.get_u8();
        let host = get_string(buf)?;
        if buf.remaining() < 2 {
            return Err(RemoteError::BufferUnderflow {
                needed: 2,
                have: buf.remaining(),
            });
        }
        let port = buf.get_u16();

        let csf = match format {
            FORMAT_HOST_PORT => None,
            FORMAT_HOST_PORT_FACTORY => {
                let descriptor = get_string(buf)?;
                let csf = ctx
                    .factories()
                    .resolve_client_factory(&descriptor)
                    .ok_or(RemoteError::UnknownSocketFactory(descriptor))?;
                Some(csf)
            }
            other => {
                return Err(RemoteError::InvalidData(format!(
                    "unknown endpoint format: {}",
                    other
                )))
            }
        };

        Ok(Self {
            host,
            port,
            csf,
            ssf: None,
        })
    }
}

impl PartialEq for Endpoint {
    fn eq(&self, other: &Self) -> bool {
        self.port == other.port
            && self.host == other.host
            && same_client_factory(self.csf.as_ref(), other.csf.as_ref())
    }
}

impl Eq for Endpoint {}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("csf", &self.csf.as_ref().map(|f| f.descriptor().to_string()))
            .field("ssf", &self.ssf.as_ref().map(|f| f.descriptor().to_string()))
            .finish()
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.csf {
            None => write!(f, "[{}:{}]", self.host, self.port),
            Some(csf) => write!(f, "[{}:{},{}]", self.host, self.port, csf.descriptor()),
        }
    }
}
