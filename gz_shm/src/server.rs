//! Simulator-side owner of a namespace.

use crate::control::Channel;
use crate::error::ShmResult;
use crate::namespace::Namespace;
use gz_common::config::ShmConfig;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// One running simulator instance.
///
/// Owns the namespace directory and its control block. Interfaces created
/// through it share its broadcast channel.
pub struct Server {
    config: ShmConfig,
    namespace: Namespace,
    channel: Arc<Channel>,
    finished: bool,
}

impl Server {
    /// Create the namespace of `server_id` and publish its control block.
    ///
    /// # Errors
    ///
    /// `AlreadyRunning` if a live server owns the namespace and `force` is
    /// not set.
    pub fn init(config: &ShmConfig, server_id: u32, force: bool) -> ShmResult<Self> {
        let namespace = Namespace::new(config, server_id);
        let channel = Arc::new(Channel::create(&namespace, force)?);
        info!(server_id, dir = %namespace.dir().display(), "server started");
        Ok(Self {
            config: config.clone(),
            namespace,
            channel,
            finished: false,
        })
    }

    /// Stop the server: wake every waiter, remove the control block and the
    /// namespace directory if it is empty.
    pub fn fini(mut self) -> ShmResult<()> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> ShmResult<()> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;
        if !self.channel.is_current() {
            warn!(
                server_id = self.namespace.server_id(),
                "control block was taken over, leaving namespace to the new owner"
            );
            return Ok(());
        }
        self.channel.shutdown()?;
        match std::fs::remove_file(self.namespace.control_path()) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        if let Err(e) = std::fs::remove_dir(self.namespace.dir()) {
            debug!(error = %e, "namespace directory left in place");
        }
        info!(server_id = self.namespace.server_id(), "server stopped");
        Ok(())
    }

    /// Broadcast "data changed" to every waiting client.
    pub fn post(&self) -> ShmResult<()> {
        self.channel.post()
    }

    /// Server id.
    pub fn server_id(&self) -> u32 {
        self.namespace.server_id()
    }

    /// Namespace owned by this server.
    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    /// Configuration the server was started with.
    pub fn config(&self) -> &ShmConfig {
        &self.config
    }

    pub(crate) fn channel(&self) -> &Arc<Channel> {
        &self.channel
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            error!(server_id = self.namespace.server_id(), error = %e, "server shutdown failed");
        }
    }
}
