//! Runtime-level failures distinct from configuration diagnostics
//! (`SPEC_FULL.md` §7): binding a listen address, registering it with the
//! poller, and accept-loop failures the event loop cannot recover from.

use std::io;
use std::net::SocketAddrV4;

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("no server blocks to listen on")]
    NoListeners,

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddrV4,
        #[source]
        source: io::Error,
    },

    #[error("failed to register {addr} with the event loop: {source}")]
    Register {
        addr: SocketAddrV4,
        #[source]
        source: io::Error,
    },

    #[error("poll failed: {0}")]
    Poll(#[source] io::Error),
}
