//! ProgramService: enumeration and lookup of loaded programs.
//!
//! Every query opens the objects it reports on, reads their info through
//! the handle, and drops the handle before moving on. Nothing is cached
//! between calls.

use std::path::Path;
use std::sync::Arc;

use bpfscope_core::{InspectError, ProgramId, ProgramRecord, ProgramRef, TAG_LEN};
use bpfscope_sys::{ClockSample, Kernel, ProgramHandle};

use crate::classify::{call_error, open_error};
use crate::extract;
use crate::pins::PinScanner;
use crate::walk::walk_ids;

/// The program enumeration engine.
pub struct ProgramService<K: Kernel> {
    kernel: Arc<K>,
}

impl<K: Kernel> ProgramService<K> {
    pub fn new(kernel: Arc<K>) -> Self {
        ProgramService { kernel }
    }

    /// Lists every loaded program, ascending by ID.
    ///
    /// Programs unloaded between discovery and open are left out. A system
    /// with no programs at all is [`InspectError::NotFound`].
    pub fn list(&self) -> Result<Vec<ProgramRecord>, InspectError> {
        let clock = self.kernel.sample_clock();
        let mut records = Vec::new();
        walk_ids(
            ProgramId::SENTINEL,
            "programs",
            |after| self.kernel.next_program_id(after),
            |id| match self.read(id, &clock) {
                Ok(record) => records.push(record),
                // Unloaded between discovery and open.
                Err(e) => tracing::debug!(%id, error = %e, "skipping program"),
            },
        )?;
        Ok(records)
    }

    pub fn get_by_id(&self, id: ProgramId) -> Result<ProgramRecord, InspectError> {
        let clock = self.kernel.sample_clock();
        self.read(id, &clock)
    }

    /// All programs whose tag is `tag`. Tags are not unique.
    pub fn get_by_tag(&self, tag: &[u8; TAG_LEN]) -> Result<Vec<ProgramRecord>, InspectError> {
        let tag = hex::encode(tag);
        Ok(self
            .list_loaded()?
            .into_iter()
            .filter(|p| p.tag == tag)
            .collect())
    }

    /// All programs named `name`. Names are not unique.
    pub fn get_by_name(&self, name: &str) -> Result<Vec<ProgramRecord>, InspectError> {
        Ok(self
            .list_loaded()?
            .into_iter()
            .filter(|p| p.name == name)
            .collect())
    }

    pub fn get_by_pinned_path(&self, path: &Path) -> Result<ProgramRecord, InspectError> {
        let subject = format!("program pinned at {}", path.display());
        let handle = self
            .kernel
            .open_pinned_program(path)
            .map_err(|e| open_error(e, &subject))?;
        let clock = self.kernel.sample_clock();
        let raw = handle
            .info()
            .map_err(|e| call_error(e, &format!("reading info of {}", subject)))?;
        extract::program_record(raw, &clock)
    }

    /// Resolves a reference to the programs it names.
    ///
    /// ID and pinned-path references yield exactly one program or an error;
    /// tag and name references may yield none.
    pub fn show(&self, reference: &ProgramRef) -> Result<Vec<ProgramRecord>, InspectError> {
        match reference {
            ProgramRef::Id(id) => self.get_by_id(*id).map(|p| vec![p]),
            ProgramRef::Tag(tag) => self.get_by_tag(tag),
            ProgramRef::Name(name) => self.get_by_name(name),
            ProgramRef::Pinned(path) => self.get_by_pinned_path(path).map(|p| vec![p]),
        }
    }

    /// Fills `pinned_paths` of every record from the scanner's index.
    pub fn attach_pins(&self, records: &mut [ProgramRecord], pins: &PinScanner<K>) {
        for record in records {
            record.pinned_paths = pins.program_pins(record.id);
        }
    }

    /// [`list`](Self::list), with an empty program table as an empty result.
    fn list_loaded(&self) -> Result<Vec<ProgramRecord>, InspectError> {
        match self.list() {
            Err(InspectError::NotFound { .. }) => Ok(Vec::new()),
            other => other,
        }
    }

    fn read(&self, id: ProgramId, clock: &ClockSample) -> Result<ProgramRecord, InspectError> {
        let subject = format!("program {}", id);
        let handle = self
            .kernel
            .open_program(id)
            .map_err(|e| open_error(e, &subject))?;
        let raw = handle
            .info()
            .map_err(|e| call_error(e, &format!("reading info of {}", subject)))?;
        extract::program_record(raw, clock)
    }
}
