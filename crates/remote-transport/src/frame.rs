//! Frame codec
//!
//! Every message on a remote-object connection is a self-delimiting frame:
//! an 8-byte header (magic, version, kind, body length) followed by the body.

use crate::error::{Result, TransportError};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Frame magic ("RO")
pub const FRAME_MAGIC: [u8; 2] = *b"RO";

/// Wire protocol version
pub const PROTOCOL_VERSION: u8 = 1;

/// Maximum frame size (1 MB default)
pub const DEFAULT_MAX_FRAME_SIZE: usize = 1024 * 1024;

/// Frame kinds
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum FrameKind {
    /// Method call request
    Call = 1,
    /// Method call result
    Return = 2,
    /// Liveness probe
    Ping = 3,
    /// Liveness probe reply
    PingAck = 4,
}

impl TryFrom<u8> for FrameKind {
    type Error = TransportError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            1 => Ok(FrameKind::Call),
            2 => Ok(FrameKind::Return),
            3 => Ok(FrameKind::Ping),
            4 => Ok(FrameKind::PingAck),
            other => Err(TransportError::UnknownFrameKind(other)),
        }
    }
}

/// Frame header (8 bytes)
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameHeader {
    pub version: u8,
    pub kind: FrameKind,
    pub length: u32,
}

impl FrameHeader {
    pub const SIZE: usize = 8;

    pub fn new(kind: FrameKind, length: u32) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            kind,
            length,
        }
    }

    pub fn encode<B: BufMut>(&self, buf: &mut B) {
        buf.put_slice(&FRAME_MAGIC);
        buf.put_u8(self.version);
        buf.put_u8(self.kind as u8);
        buf.put_u32(self.length);
    }

    /// Decode a header from the start of `data` without consuming it
    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() < Self::SIZE {
            return Err(TransportError::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "incomplete frame header",
            )));
        }
        let mut cursor = data;
        let magic = [cursor.get_u8(), cursor.get_u8()];
        if magic != FRAME_MAGIC {
            return Err(TransportError::BadMagic(magic));
        }
        let version = cursor.get_u8();
        if version != PROTOCOL_VERSION {
            return Err(TransportError::VersionMismatch {
                expected: PROTOCOL_VERSION,
                got: version,
            });
        }
        let kind = FrameKind::try_from(cursor.get_u8())?;
        let length = cursor.get_u32();
        Ok(Self {
            version,
            kind,
            length,
        })
    }
}

/// A complete frame
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    pub kind: FrameKind,
    pub body: Bytes,
}

impl Frame {
    pub fn new(kind: FrameKind, body: Bytes) -> Self {
        Self { kind, body }
    }

    pub fn ping() -> Self {
        Self::new(FrameKind::Ping, Bytes::new())
    }

    pub fn ping_ack() -> Self {
        Self::new(FrameKind::PingAck, Bytes::new())
    }

    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(FrameHeader::SIZE + self.body.len());
        FrameHeader::new(self.kind, self.body.len() as u32).encode(&mut buf);
        buf.put_slice(&self.body);
        buf.freeze()
    }
}

/// Frame transport for reading/writing frames over a byte stream
pub struct FrameTransport<T> {
    inner: T,
    max_frame_size: usize,
    read_buf: BytesMut,
}

impl<T> FrameTransport<T> {
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            read_buf: BytesMut::with_capacity(8192),
        }
    }

    pub fn with_max_frame_size(mut self, max_size: usize) -> Self {
        self.max_frame_size = max_size;
        self
    }

    pub fn into_inner(self) -> T {
        self.inner
    }

    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }
}

impl<T: AsyncRead + Unpin> FrameTransport<T> {
    /// Read a complete frame
    pub async fn read_frame(&mut self) -> Result<Frame> {
        while self.read_buf.len() < FrameHeader::SIZE {
            let n = self.fill_buf().await?;
            if n == 0 {
                if self.read_buf.is_empty() {
                    return Err(TransportError::ConnectionClosed);
                } else {
                    return Err(TransportError::Io(std::io::Error::new(
                        std::io::ErrorKind::UnexpectedEof,
                        "incomplete frame header",
                    )));
                }
            }
        }

        let header = FrameHeader::decode(&self.read_buf)?;
        let body_len = header.length as usize;
        if body_len > self.max_frame_size {
            return Err(TransportError::FrameTooLarge {
                size: body_len,
                max: self.max_frame_size,
            });
        }

        let total = FrameHeader::SIZE + body_len;
        while self.read_buf.len() < total {
            let n = self.fill_buf().await?;
            if n == 0 {
                return Err(TransportError::Io(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    format!(
                        "incomplete frame: expected {} bytes, got {}",
                        total,
                        self.read_buf.len()
                    ),
                )));
            }
        }

        let mut data = self.read_buf.split_to(total);
        data.advance(FrameHeader::SIZE);
        Ok(Frame::new(header.kind, data.freeze()))
    }

    async fn fill_buf(&mut self) -> Result<usize> {
        if self.read_buf.capacity() - self.read_buf.len() < 4096 {
            self.read_buf.reserve(8192);
        }
        let n = self.inner.read_buf(&mut self.read_buf).await?;
        Ok(n)
    }
}

impl<T: AsyncWrite + Unpin> FrameTransport<T> {
    /// Write an already encoded frame
    pub async fn write_raw(&mut self, data: &[u8]) -> Result<()> {
        self.inner.write_all(data).await?;
        self.inner.flush().await?;
        Ok(())
    }

    /// Encode and write a frame
    pub async fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        let data = frame.encode();
        self.write_raw(&data).await
    }
}
