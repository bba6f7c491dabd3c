//! Interrupt channel: the L2CAP socket BlueZ hands over in `NewConnection`.
//!
//! The descriptor is owned here and closed exactly once, when the channel is
//! dropped.

use std::fs::File;
use std::io::{self, Read, Write};
use std::os::fd::{AsRawFd, OwnedFd};

use tokio::io::unix::AsyncFd;
use tokio::io::Interest;

/// Outcome of draining readable bytes from the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// Bytes from the host (output reports, e.g. LED state).
    Data(Vec<u8>),
    /// Spurious wakeup; nothing to read.
    Empty,
    /// Zero-length read: the host hung up.
    Closed,
}

pub struct InterruptChannel {
    fd: AsyncFd<File>,
}

fn set_nonblocking(fd: &OwnedFd) -> io::Result<()> {
    let raw = fd.as_raw_fd();
    // SAFETY: `raw` is a valid descriptor owned by `fd` for the whole call.
    let flags = unsafe { libc::fcntl(raw, libc::F_GETFL) };
    if flags < 0 {
        return Err(io::Error::last_os_error());
    }
    // SAFETY: as above.
    if unsafe { libc::fcntl(raw, libc::F_SETFL, flags | libc::O_NONBLOCK) } < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

impl InterruptChannel {
    /// Take ownership of `fd` and register it with the tokio reactor.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(fd: OwnedFd) -> io::Result<Self> {
        set_nonblocking(&fd)?;
        let fd = AsyncFd::with_interest(File::from(fd), Interest::READABLE)?;
        Ok(Self { fd })
    }

    pub fn raw_fd(&self) -> i32 {
        self.fd.get_ref().as_raw_fd()
    }

    /// Wait until the host sent data, hung up, or the socket errored.
    pub async fn readable(&self) -> io::Result<()> {
        let _guard = self.fd.readable().await?;
        Ok(())
    }

    /// Read whatever the host sent.
    pub fn read(&self) -> io::Result<Inbound> {
        let mut buf = [0u8; 1024];
        match self
            .fd
            .try_io(Interest::READABLE, |file| (&*file).read(&mut buf))
        {
            Ok(0) => Ok(Inbound::Closed),
            Ok(n) => Ok(Inbound::Data(buf[..n].to_vec())),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(Inbound::Empty),
            Err(e) => Err(e),
        }
    }

    /// Write one report. A short or would-block write counts as failure.
    pub fn write(&self, bytes: &[u8]) -> io::Result<()> {
        let written = (&*self.fd.get_ref()).write(bytes)?;
        if written != bytes.len() {
            return Err(io::Error::new(
                io::ErrorKind::WriteZero,
                format!("short write: {written} of {} bytes", bytes.len()),
            ));
        }
        Ok(())
    }
}

impl std::fmt::Debug for InterruptChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterruptChannel")
            .field("fd", &self.raw_fd())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::net::UnixStream;

    fn pair() -> (InterruptChannel, UnixStream) {
        let (ours, theirs) = UnixStream::pair().unwrap();
        (InterruptChannel::new(OwnedFd::from(ours)).unwrap(), theirs)
    }

    #[tokio::test]
    async fn writes_reach_the_peer() {
        let (channel, mut host) = pair();
        channel.write(&[0, 0, 4, 0, 0, 0, 0, 0]).unwrap();
        let mut buf = [0u8; 8];
        host.read_exact(&mut buf).unwrap();
        assert_eq!(buf, [0, 0, 4, 0, 0, 0, 0, 0]);
    }

    #[tokio::test]
    async fn reads_host_data() {
        let (channel, mut host) = pair();
        host.write_all(&[0xA2, 0x02]).unwrap();
        channel.readable().await.unwrap();
        assert_eq!(channel.read().unwrap(), Inbound::Data(vec![0xA2, 0x02]));
        assert_eq!(channel.read().unwrap(), Inbound::Empty);
    }

    #[tokio::test]
    async fn hangup_reads_as_closed() {
        let (channel, host) = pair();
        drop(host);
        channel.readable().await.unwrap();
        assert_eq!(channel.read().unwrap(), Inbound::Closed);
    }

    #[tokio::test]
    async fn write_after_hangup_fails() {
        let (channel, host) = pair();
        drop(host);
        assert!(channel.write(&[0; 8]).is_err());
    }
}
