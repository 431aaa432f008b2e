//! Storage of hardware descriptions, addressed by the identity of the
//! transformation that produced them.
use crate::{HardwareDescription, TransformationIdentity};
use hast_utils::{Error, HastResult};
use parking_lot::{Condvar, Mutex};
use std::collections::{HashMap, HashSet};
use std::io::Write;
use std::path::{Path, PathBuf};

pub trait TransformationCache: Send + Sync {
    /// The description stored for `identity`, if any.
    fn load(&self, identity: &TransformationIdentity) -> HastResult<Option<HardwareDescription>>;

    fn store(&self, description: &HardwareDescription) -> HastResult<()>;
}

/// Keeps the descriptions for the lifetime of the process.
#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<TransformationIdentity, String>>,
}

impl MemoryCache {
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl TransformationCache for MemoryCache {
    fn load(&self, identity: &TransformationIdentity) -> HastResult<Option<HardwareDescription>> {
        self.entries
            .lock()
            .get(identity)
            .map(|json| HardwareDescription::from_json(json))
            .transpose()
    }

    fn store(&self, description: &HardwareDescription) -> HastResult<()> {
        let json = description.to_json()?;
        self.entries
            .lock()
            .insert(description.identity().clone(), json);
        Ok(())
    }
}

/// Stores every description as `<identity>.json` in a directory.
pub struct DirectoryCache {
    directory: PathBuf,
}

impl DirectoryCache {
    /// Use `directory`, creating it if needed.
    pub fn new<P: AsRef<Path>>(directory: P) -> HastResult<Self> {
        let directory = directory.as_ref().to_path_buf();
        std::fs::create_dir_all(&directory)?;
        Ok(DirectoryCache { directory })
    }

    fn entry(&self, identity: &TransformationIdentity) -> PathBuf {
        self.directory.join(format!("{identity}.json"))
    }
}

impl TransformationCache for DirectoryCache {
    fn load(&self, identity: &TransformationIdentity) -> HastResult<Option<HardwareDescription>> {
        let path = self.entry(identity);
        match std::fs::read_to_string(&path) {
            Ok(json) => HardwareDescription::from_json(&json).map(Some),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn store(&self, description: &HardwareDescription) -> HastResult<()> {
        // Written next to the entry and renamed, so readers never see a
        // partial entry.
        let mut file = tempfile::NamedTempFile::new_in(&self.directory)?;
        file.write_all(description.to_json()?.as_bytes())?;
        file.as_file().sync_all()?;
        file.persist(self.entry(description.identity()))
            .map_err(|e| Error::Io(e.error))?;
        Ok(())
    }
}

/// Identities being transformed right now.
#[derive(Default)]
pub(crate) struct InFlight {
    running: Mutex<HashSet<TransformationIdentity>>,
    finished: Condvar,
}

impl InFlight {
    /// Wait until nobody else transforms `identity`, then claim it until the
    /// guard is dropped.
    pub fn claim(&self, identity: &TransformationIdentity) -> InFlightGuard<'_> {
        let mut running = self.running.lock();
        while running.contains(identity) {
            log::debug!("Waiting for the transformation {identity} running elsewhere.");
            self.finished.wait(&mut running);
        }
        running.insert(identity.clone());
        InFlightGuard {
            in_flight: self,
            identity: identity.clone(),
        }
    }
}

pub(crate) struct InFlightGuard<'a> {
    in_flight: &'a InFlight,
    identity: TransformationIdentity,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.in_flight.running.lock().remove(&self.identity);
        self.in_flight.finished.notify_all();
    }
}
