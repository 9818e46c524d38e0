use std::io::ErrorKind;

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::trace;

use crate::codec::{parse_header, Frame, FrameConfig, HEADER_SIZE};
use crate::error::{FrameError, Result};

/// Reads complete frames from any `AsyncRead` stream.
///
/// Every read is exact: a frame is returned only once its header and whole
/// payload have arrived. EOF anywhere inside a frame is
/// [`FrameError::ConnectionClosed`].
pub struct FrameReader<R> {
    inner: R,
    config: FrameConfig,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    /// Create a new frame reader with default configuration.
    pub fn new(inner: R) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame reader with explicit configuration.
    pub fn with_config(inner: R, config: FrameConfig) -> Self {
        Self { inner, config }
    }

    /// Read the next complete frame.
    ///
    /// Length and payload-size checks happen before any payload byte is read.
    pub async fn read_frame(&mut self) -> Result<Frame> {
        let mut header = [0u8; HEADER_SIZE];
        self.fill(&mut header).await?;
        let (object_id, payload_len) = parse_header(&header, self.config.max_payload_size)?;

        let mut payload = BytesMut::zeroed(payload_len);
        self.fill(&mut payload).await?;
        trace!(object_id, payload_len, "read frame");

        Ok(Frame {
            object_id,
            payload: payload.freeze(),
        })
    }

    /// Read exactly `n` raw bytes.
    pub async fn read_exact(&mut self, n: usize) -> Result<Bytes> {
        let mut buf = BytesMut::zeroed(n);
        self.fill(&mut buf).await?;
        Ok(buf.freeze())
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut R {
        &mut self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> R {
        self.inner
    }

    /// Update maximum payload size for subsequent frame decoding.
    pub fn set_max_payload_size(&mut self, max_payload_size: usize) {
        self.config.max_payload_size = max_payload_size;
    }

    /// Current frame reader configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }

    async fn fill(&mut self, buf: &mut [u8]) -> Result<()> {
        match self.inner.read_exact(buf).await {
            Ok(_) => Ok(()),
            Err(err) if err.kind() == ErrorKind::UnexpectedEof => Err(FrameError::ConnectionClosed),
            Err(err) => Err(FrameError::Io(err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::pin::Pin;
    use std::task::{Context, Poll};

    use bytes::{BufMut, BytesMut};
    use tokio::io::ReadBuf;

    use super::*;
    use crate::codec::encode_frame;

    fn wire(frames: &[(u32, &[u8])]) -> Vec<u8> {
        let mut buf = BytesMut::new();
        for (object_id, payload) in frames {
            encode_frame(*object_id, payload, &mut buf).unwrap();
        }
        buf.to_vec()
    }

    #[tokio::test]
    async fn read_single_frame() {
        let mut reader = FrameReader::new(Cursor::new(wire(&[(1, b"hello")])));
        let frame = reader.read_frame().await.unwrap();

        assert_eq!(frame.object_id, 1);
        assert_eq!(frame.payload.as_ref(), b"hello");
    }

    #[tokio::test]
    async fn read_multiple_frames() {
        let bytes = wire(&[(1, b"one"), (2, b"two"), (3, b"three")]);
        let mut reader = FrameReader::new(Cursor::new(bytes));

        let f1 = reader.read_frame().await.unwrap();
        let f2 = reader.read_frame().await.unwrap();
        let f3 = reader.read_frame().await.unwrap();

        assert_eq!((f1.object_id, f1.payload.as_ref()), (1, b"one".as_ref()));
        assert_eq!((f2.object_id, f2.payload.as_ref()), (2, b"two".as_ref()));
        assert_eq!((f3.object_id, f3.payload.as_ref()), (3, b"three".as_ref()));
    }

    #[tokio::test]
    async fn read_frame_with_large_payload() {
        let payload = vec![0xAB; 64 * 1024];
        let mut reader = FrameReader::new(Cursor::new(wire(&[(9, &payload)])));
        let frame = reader.read_frame().await.unwrap();

        assert_eq!(frame.object_id, 9);
        assert_eq!(frame.payload.as_ref(), payload.as_slice());
    }

    #[tokio::test]
    async fn partial_read_handling() {
        let byte_reader = ByteByByteReader {
            bytes: wire(&[(4, b"slow")]),
            pos: 0,
        };
        let mut reader = FrameReader::new(byte_reader);

        let frame = reader.read_frame().await.unwrap();
        assert_eq!(frame.object_id, 4);
        assert_eq!(frame.payload.as_ref(), b"slow");
    }

    #[tokio::test]
    async fn empty_payload_frame() {
        let mut reader = FrameReader::new(Cursor::new(wire(&[(6, b"")])));
        let frame = reader.read_frame().await.unwrap();
        assert_eq!(frame.object_id, 6);
        assert!(frame.payload.is_empty());
    }

    #[tokio::test]
    async fn connection_closed_cleanly() {
        let mut reader = FrameReader::new(Cursor::new(Vec::<u8>::new()));
        let err = reader.read_frame().await.unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
    }

    #[tokio::test]
    async fn connection_closed_mid_frame() {
        let mut partial = BytesMut::new();
        partial.put_u32(24);
        partial.put_u32(2);
        partial.put_slice(b"only-part");

        let mut reader = FrameReader::new(Cursor::new(partial.to_vec()));
        let err = reader.read_frame().await.unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
    }

    #[tokio::test]
    async fn invalid_length_in_stream() {
        let bytes = vec![0, 0, 0, 4, 0, 0, 0, 1, 0xFF];
        let mut reader = FrameReader::new(Cursor::new(bytes));
        let err = reader.read_frame().await.unwrap_err();
        assert!(matches!(err, FrameError::InvalidLength(4)));
    }

    #[tokio::test]
    async fn oversized_frame_in_stream() {
        let mut bytes = BytesMut::new();
        bytes.put_u32(1024 + HEADER_SIZE as u32);
        bytes.put_u32(1);

        let cfg = FrameConfig {
            max_payload_size: 16,
        };
        let mut reader = FrameReader::with_config(Cursor::new(bytes.to_vec()), cfg);
        let err = reader.read_frame().await.unwrap_err();
        assert!(matches!(err, FrameError::PayloadTooLarge { size: 1024, max: 16 }));
    }

    #[tokio::test]
    async fn read_exact_raw_bytes() {
        let mut reader = FrameReader::new(Cursor::new(b"abcdef".to_vec()));
        assert_eq!(reader.read_exact(4).await.unwrap().as_ref(), b"abcd");
        assert!(matches!(
            reader.read_exact(4).await,
            Err(FrameError::ConnectionClosed)
        ));
    }

    #[tokio::test]
    async fn roundtrip_over_duplex() {
        let (left, right) = tokio::io::duplex(64);
        let mut writer = crate::writer::FrameWriter::new(left);
        let mut reader = FrameReader::new(right);

        let writer_task = tokio::spawn(async move {
            for i in 0..32u32 {
                let payload = format!("msg-{i}");
                writer.send(i % 5, payload.as_bytes()).await.unwrap();
            }
        });

        for i in 0..32u32 {
            let frame = reader.read_frame().await.unwrap();
            assert_eq!(frame.object_id, i % 5);
            assert_eq!(frame.payload.as_ref(), format!("msg-{i}").as_bytes());
        }
        writer_task.await.unwrap();
    }

    #[tokio::test]
    async fn accessors_and_into_inner() {
        let mut reader = FrameReader::new(Cursor::new(Vec::<u8>::new()));
        reader.set_max_payload_size(32);
        assert_eq!(reader.config().max_payload_size, 32);

        let _ = reader.get_ref();
        let _ = reader.get_mut();
        let _inner = reader.into_inner();
    }

    #[derive(Debug)]
    struct ByteByByteReader {
        bytes: Vec<u8>,
        pos: usize,
    }

    impl AsyncRead for ByteByByteReader {
        fn poll_read(
            mut self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<std::io::Result<()>> {
            if self.pos < self.bytes.len() && buf.remaining() > 0 {
                let byte = self.bytes[self.pos];
                buf.put_slice(&[byte]);
                self.pos += 1;
            }
            Poll::Ready(Ok(()))
        }
    }
}
