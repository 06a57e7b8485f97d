//! Attaching side of a namespace.

use crate::control::Channel;
use crate::error::ShmResult;
use crate::namespace::Namespace;
use gz_common::config::ShmConfig;
use gz_common::consts::{CLIENT_ID_PLAYER, CLIENT_ID_VIEWER};
use std::sync::Arc;
use tracing::{debug, info};

/// A process attached to a running server.
pub struct Client {
    config: ShmConfig,
    namespace: Namespace,
    channel: Arc<Channel>,
    client_id: Option<u32>,
}

impl Client {
    /// Whether a live server owns `server_id`. Never registers.
    pub fn query(config: &ShmConfig, server_id: u32) -> bool {
        let namespace = Namespace::new(config, server_id);
        Channel::attach(&namespace).is_ok_and(|channel| channel.block().is_live())
    }

    /// Attach without claiming a client slot.
    ///
    /// # Errors
    ///
    /// `NotFound` if no server has published the namespace.
    pub fn connect(config: &ShmConfig, server_id: u32) -> ShmResult<Self> {
        let namespace = Namespace::new(config, server_id);
        let channel = Arc::new(Channel::attach(&namespace)?);
        debug!(server_id, "client connected");
        Ok(Self {
            config: config.clone(),
            namespace,
            channel,
            client_id: None,
        })
    }

    /// Attach and claim slot `client_id`.
    ///
    /// Ids `0..=7` are free for user programs, `8` is the viewer and `9` the
    /// player bridge.
    ///
    /// # Errors
    ///
    /// `InvalidClientId` outside the slot table, `IdInUse` if a live process
    /// holds the slot.
    pub fn connect_wait(config: &ShmConfig, server_id: u32, client_id: u32) -> ShmResult<Self> {
        let mut client = Self::connect(config, server_id)?;
        client.channel.register(client_id)?;
        client.client_id = Some(client_id);
        info!(server_id, client_id, role = role_name(client_id), "client registered");
        Ok(client)
    }

    /// Release the client slot.
    pub fn disconnect(mut self) -> ShmResult<()> {
        self.release();
        Ok(())
    }

    fn release(&mut self) {
        if let Some(client_id) = self.client_id.take() {
            self.channel.unregister(client_id);
            debug!(server_id = self.channel.server_id(), client_id, "client released");
        }
    }

    /// Block until the next post from the server or any interface.
    ///
    /// # Errors
    ///
    /// `ServerShutdown` if the server stops while waiting.
    pub fn wait(&self) -> ShmResult<()> {
        let seen = self.channel.seq();
        self.channel.wait_after(seen, None).map(|_| ())
    }

    /// Whether interface `id` is currently published.
    pub fn interface_exists(&self, id: &str) -> bool {
        self.namespace
            .segment_path(id)
            .is_ok_and(|path| crate::segment::SharedMemorySegment::inspect(&path, id).is_ok())
    }

    /// Claimed client id, if any.
    pub fn client_id(&self) -> Option<u32> {
        self.client_id
    }

    /// Server id.
    pub fn server_id(&self) -> u32 {
        self.namespace.server_id()
    }

    /// Namespace this client is attached to.
    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    /// Configuration used to connect.
    pub fn config(&self) -> &ShmConfig {
        &self.config
    }

    pub(crate) fn channel(&self) -> &Arc<Channel> {
        &self.channel
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.release();
    }
}

fn role_name(client_id: u32) -> &'static str {
    match client_id {
        CLIENT_ID_VIEWER => "viewer",
        CLIENT_ID_PLAYER => "player",
        _ => "user",
    }
}
