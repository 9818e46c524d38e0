use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;

use crate::error::Result;

/// A connected duplex byte stream.
///
/// This is the fundamental I/O type returned by transport operations. It
/// implements `AsyncRead + AsyncWrite` directly, and can be split into owned
/// halves so reads and writes proceed from different tasks.
pub struct Stream {
    inner: TcpStream,
    peer_addr: SocketAddr,
}

impl Stream {
    /// Wrap a connected tokio TCP stream.
    pub(crate) fn from_tcp(inner: TcpStream) -> Result<Self> {
        let peer_addr = inner.peer_addr()?;
        Ok(Self { inner, peer_addr })
    }

    /// Address of the remote end.
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// Address of the local end.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.inner.local_addr().map_err(Into::into)
    }

    /// Enable or disable Nagle's algorithm.
    pub fn set_nodelay(&self, nodelay: bool) -> Result<()> {
        self.inner.set_nodelay(nodelay).map_err(Into::into)
    }

    /// A separately owned handle on this socket, for checking unread bytes
    /// and shutting down after [`Stream::into_split`].
    pub fn socket_handle(&self) -> Result<SocketHandle> {
        SocketHandle::new(&self.inner)
    }

    /// Split into independently owned read and write halves.
    pub fn into_split(self) -> (OwnedReadHalf, OwnedWriteHalf) {
        self.inner.into_split()
    }
}

impl AsyncRead for Stream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_read(cx, buf)
    }
}

impl AsyncWrite for Stream {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.inner).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_shutdown(cx)
    }
}

impl std::fmt::Debug for Stream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stream")
            .field("type", &"tcp")
            .field("peer_addr", &self.peer_addr)
            .finish()
    }
}

/// A second handle on a stream's socket, used after the stream has been
/// split.
///
/// It reports how many received bytes are still waiting to be read and can
/// shut the socket down in both directions. The handle owns a duplicate of
/// the socket descriptor, released by [`SocketHandle::shutdown`], so it never
/// refers to a descriptor that has been closed and reused.
#[derive(Debug)]
pub struct SocketHandle {
    #[cfg(unix)]
    fd: std::sync::Mutex<Option<std::os::fd::OwnedFd>>,
}

#[cfg(unix)]
impl SocketHandle {
    fn new(stream: &TcpStream) -> Result<Self> {
        use std::os::fd::AsFd;

        let fd = stream.as_fd().try_clone_to_owned()?;
        Ok(Self {
            fd: std::sync::Mutex::new(Some(fd)),
        })
    }

    fn fd(&self) -> std::sync::MutexGuard<'_, Option<std::os::fd::OwnedFd>> {
        self.fd.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Bytes buffered by the kernel for this socket (`FIONREAD`).
    ///
    /// A point-in-time heuristic, not a drain guarantee: bytes may be in
    /// flight on the network, and a frame may be partially consumed. Always
    /// `0` once the handle has been shut down.
    pub fn available(&self) -> io::Result<usize> {
        use std::os::fd::AsRawFd;

        let guard = self.fd();
        let Some(fd) = guard.as_ref() else {
            return Ok(0);
        };
        let mut pending: libc::c_int = 0;

        // SAFETY: `pending` is a valid writable c_int, which is what FIONREAD
        // expects, and `fd` is owned by this handle and open while the lock is held.
        let rc = unsafe { libc::ioctl(fd.as_raw_fd(), libc::FIONREAD, &mut pending as *mut libc::c_int) };

        if rc == 0 {
            Ok(pending.max(0) as usize)
        } else {
            Err(io::Error::last_os_error())
        }
    }

    /// Shut the socket down for reading and writing, then release the handle.
    ///
    /// The peer sees end-of-stream, and the local halves fail or report EOF.
    /// Calling it again does nothing.
    pub fn shutdown(&self) -> io::Result<()> {
        use std::os::fd::AsRawFd;

        let Some(fd) = self.fd().take() else {
            return Ok(());
        };

        // SAFETY: `fd` is an open descriptor owned by this handle.
        let rc = unsafe { libc::shutdown(fd.as_raw_fd(), libc::SHUT_RDWR) };
        if rc == 0 {
            return Ok(());
        }
        match io::Error::last_os_error() {
            err if err.raw_os_error() == Some(libc::ENOTCONN) => Ok(()),
            err => Err(err),
        }
    }
}

#[cfg(not(unix))]
impl SocketHandle {
    fn new(_stream: &TcpStream) -> Result<Self> {
        Ok(Self {})
    }

    /// Bytes buffered by the kernel for this socket.
    ///
    /// Always `0` on platforms without `FIONREAD`.
    pub fn available(&self) -> io::Result<usize> {
        Ok(0)
    }

    /// Dropping the stream halves closes the socket on these platforms.
    pub fn shutdown(&self) -> io::Result<()> {
        Ok(())
    }
}
