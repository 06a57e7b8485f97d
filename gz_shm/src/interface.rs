//! Typed interface handles.
//!
//! [`Interface<D>`] is written once for every device kind: the [`Device`]
//! descriptor supplies the kind tag and payload layout, the engine handles
//! creation, attachment, locking and notification.
//!
//! ```rust,no_run
//! use gz_common::config::ShmConfig;
//! use gz_common::data::{Pose, Position};
//! use gz_shm::{Blocking, Client, Interface, Server};
//!
//! # fn main() -> Result<(), gz_shm::ShmError> {
//! let config = ShmConfig::default();
//! let server = Server::init(&config, 0, false)?;
//! let odom = Interface::<Position>::create(&server, "pioneer::position")?;
//! odom.publish(0.1, |data| data.state.pose = Pose::new_2d(1.0, 0.0, 0.0))?;
//!
//! let client = Client::connect(&config, 0)?;
//! let view = Interface::<Position>::open(&client, "pioneer::position")?;
//! if let Some(guard) = view.lock(Blocking::Wait)? {
//!     println!("x = {}", guard.state.pose.pos.x);
//! }
//! # Ok(())
//! # }
//! ```

use crate::client::Client;
use crate::control::Channel;
use crate::error::{ShmError, ShmResult};
use crate::header::{ModelOwner, SegmentHeader};
use crate::segment::SharedMemorySegment;
use crate::server::Server;
use crate::sync;
use gz_common::data::{
    Actarray, Bumper, Camera, Device, DeviceKind, Factory, Fiducial, Gripper, Imu, Ir, Laser,
    Opaque, Position, Ptz, Simulation,
};
use std::marker::PhantomData;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};
use tracing::{debug, error, trace};

/// How [`Interface::lock`] behaves under contention.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Blocking {
    /// Block until the lock is free.
    Wait,
    /// Return `None` immediately if another handle holds the lock.
    Try,
}

/// Handle on one named interface segment of device kind `D`.
pub struct Interface<D: Device> {
    segment: SharedMemorySegment,
    channel: Arc<Channel>,
    creator: bool,
    released: bool,
    _device: PhantomData<fn() -> D>,
}

impl<D: Device> Interface<D> {
    /// Create interface `id` in the server's namespace with no owning model.
    pub fn create(server: &Server, id: &str) -> ShmResult<Self> {
        Self::create_owned(server, id, &ModelOwner::none())
    }

    /// Create interface `id`, recording the owning model in its header.
    ///
    /// # Errors
    ///
    /// `InvalidId`, `AlreadyExists` when a live process created it first,
    /// `SchemaMismatch`/`VersionMismatch` when an incompatible segment is in
    /// the way.
    pub fn create_owned(server: &Server, id: &str, owner: &ModelOwner) -> ShmResult<Self> {
        let path = server.namespace().segment_path(id)?;
        let segment = SharedMemorySegment::create(&path, id, D::KIND, owner)?;
        Ok(Self {
            segment,
            channel: Arc::clone(server.channel()),
            creator: true,
            released: false,
            _device: PhantomData,
        })
    }

    /// Attach to interface `id` created by the server.
    ///
    /// # Errors
    ///
    /// `NotFound`, `VersionMismatch`, `TypeMismatch` or `SchemaMismatch`;
    /// nothing stays mapped on failure.
    pub fn open(client: &Client, id: &str) -> ShmResult<Self> {
        let path = client.namespace().segment_path(id)?;
        let segment = SharedMemorySegment::attach(&path, id, D::KIND)?;
        let opens = segment.header().open_count.fetch_add(1, Ordering::AcqRel) + 1;
        debug!(interface = id, kind = %D::KIND, opens, "opened interface");
        Ok(Self {
            segment,
            channel: Arc::clone(client.channel()),
            creator: false,
            released: false,
            _device: PhantomData,
        })
    }

    /// Release this handle. Non-creators drop their open reference; a
    /// creator handle destroys the segment.
    pub fn close(mut self) -> ShmResult<()> {
        self.release()
    }

    /// Unlink the segment. Only the creating handle may do this.
    ///
    /// # Errors
    ///
    /// `NotCreator` on a handle obtained through [`open`](Self::open); the
    /// handle is closed regardless.
    pub fn destroy(mut self) -> ShmResult<()> {
        if !self.creator {
            return Err(ShmError::NotCreator {
                name: self.id().to_string(),
            });
        }
        self.release()
    }

    fn release(&mut self) -> ShmResult<()> {
        if self.released {
            return Ok(());
        }
        self.released = true;
        if self.creator {
            self.segment.unlink()?;
            debug!(interface = self.id(), kind = %D::KIND, "destroyed interface");
        } else {
            let opens = self.header().release_open();
            debug!(interface = self.id(), kind = %D::KIND, opens, "closed interface");
        }
        Ok(())
    }

    /// Acquire the interface lock.
    ///
    /// The returned guard is the only typed access to the payload; dropping
    /// it unlocks.
    pub fn lock(&self, blocking: Blocking) -> ShmResult<Option<IfaceGuard<'_, D>>> {
        let word = &self.header().lock;
        match blocking {
            Blocking::Wait => sync::lock(word)?,
            Blocking::Try => {
                if !sync::try_lock(word) {
                    trace!(interface = self.id(), "lock contended");
                    return Ok(None);
                }
            }
        }
        Ok(Some(IfaceGuard {
            iface: self,
            held: true,
        }))
    }

    /// Mark fresh data: wake this segment's waiters and every client
    /// blocked on the server channel. Does not need the lock.
    pub fn post(&self) -> ShmResult<()> {
        sync::broadcast(&self.header().post_seq)?;
        self.channel.post()
    }

    /// Block until the next post on this interface or until `timeout`.
    ///
    /// Returns whether a post arrived.
    pub fn wait_post(&self, timeout: Option<Duration>) -> ShmResult<bool> {
        let word = &self.header().post_seq;
        let seen = word.load(Ordering::Acquire);
        let deadline = timeout.map(|timeout| Instant::now() + timeout);
        loop {
            let remaining = deadline.map(|d| d.saturating_duration_since(Instant::now()));
            if sync::wait_for_change(word, seen, remaining)? {
                return Ok(true);
            }
            if remaining.is_some_and(|r| r.is_zero()) {
                return Ok(false);
            }
        }
    }

    /// Liveness-first update: try the lock, and if free run `write`, stamp
    /// `sim_time`, unlock and post. Returns `false` when the lock was held
    /// elsewhere and nothing was written.
    pub fn publish(&self, sim_time: f64, write: impl FnOnce(&mut D::Payload)) -> ShmResult<bool> {
        let Some(mut guard) = self.lock(Blocking::Try)? else {
            return Ok(false);
        };
        write(&mut *guard);
        guard.set_time(sim_time);
        guard.unlock()?;
        self.post()?;
        Ok(true)
    }

    /// Open references held by non-creator handles. Read without the lock.
    pub fn open_count(&self) -> u32 {
        self.header().open_count.load(Ordering::Acquire)
    }

    /// Number of posts since creation.
    pub fn post_count(&self) -> u32 {
        self.header().post_seq.load(Ordering::Acquire)
    }

    /// Last update time written by the simulator.
    pub fn time(&self) -> f64 {
        self.header().time()
    }

    /// Interface id.
    pub fn id(&self) -> &str {
        self.segment.name()
    }

    /// Device kind.
    pub fn kind(&self) -> DeviceKind {
        D::KIND
    }

    /// Whether this handle created the segment.
    pub fn is_creator(&self) -> bool {
        self.creator
    }

    /// Owning model recorded at creation.
    pub fn owner(&self) -> ModelOwner {
        self.header().owner()
    }

    fn header(&self) -> &SegmentHeader {
        self.segment.header()
    }

    fn payload_ptr(&self) -> *mut D::Payload {
        self.segment.payload_ptr().cast()
    }
}

impl<D: Device> Drop for Interface<D> {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            error!(interface = self.id(), error = %e, "failed to release interface");
        }
    }
}

impl<D: Device> std::fmt::Debug for Interface<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Interface")
            .field("id", &self.id())
            .field("kind", &D::KIND)
            .field("creator", &self.creator)
            .finish()
    }
}

/// Held interface lock with typed access to the payload.
pub struct IfaceGuard<'a, D: Device> {
    iface: &'a Interface<D>,
    held: bool,
}

impl<D: Device> IfaceGuard<'_, D> {
    /// Stamp the interface's last update time.
    pub fn set_time(&self, time: f64) {
        self.iface.header().set_time(time);
    }

    /// Release the lock, reporting failures.
    pub fn unlock(mut self) -> ShmResult<()> {
        self.held = false;
        sync::unlock(&self.iface.header().lock, self.iface.id())
    }
}

impl<D: Device> Deref for IfaceGuard<'_, D> {
    type Target = D::Payload;

    fn deref(&self) -> &D::Payload {
        // SAFETY: validated layout; the lock serialises access among
        // cooperating handles.
        unsafe { &*self.iface.payload_ptr() }
    }
}

impl<D: Device> DerefMut for IfaceGuard<'_, D> {
    fn deref_mut(&mut self) -> &mut D::Payload {
        // SAFETY: as in `deref`; the guard is the single writer while held.
        unsafe { &mut *self.iface.payload_ptr() }
    }
}

impl<D: Device> Drop for IfaceGuard<'_, D> {
    fn drop(&mut self) {
        if self.held
            && let Err(e) = sync::unlock(&self.iface.header().lock, self.iface.id())
        {
            error!(interface = self.iface.id(), error = %e, "unlock failed");
        }
    }
}

/// `simulation` interface handle.
pub type SimulationInterface = Interface<Simulation>;
/// `position` interface handle.
pub type PositionIface = Interface<Position>;
/// `imu` interface handle.
pub type ImuIface = Interface<Imu>;
/// `laser` interface handle.
pub type LaserIface = Interface<Laser>;
/// `fiducial` interface handle.
pub type FiducialIface = Interface<Fiducial>;
/// `factory` interface handle.
pub type FactoryIface = Interface<Factory>;
/// `gripper` interface handle.
pub type GripperIface = Interface<Gripper>;
/// `actarray` interface handle.
pub type ActarrayIface = Interface<Actarray>;
/// `ptz` interface handle.
pub type PtzIface = Interface<Ptz>;
/// `bumper` interface handle.
pub type BumperIface = Interface<Bumper>;
/// `opaque` interface handle.
pub type OpaqueIface = Interface<Opaque>;
/// `irarray` interface handle.
pub type IrIface = Interface<Ir>;
/// `camera` interface handle.
pub type CameraIface = Interface<Camera>;
