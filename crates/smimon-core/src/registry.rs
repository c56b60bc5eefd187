//! Physical device discovery.
//!
//! Devices are indexed in one flat space shared by event codes and the busy
//! mask:
//!
//! ```text
//!   0 .. gpu_count                     GPUs
//!   gpu_count .. gpu_count+cpu_count   CPU sockets (cores tracked per socket)
//! ```

use tracing::{debug, info, warn};

use crate::codec;
use crate::error::{Error, Result};
use crate::vendor::{InitFlags, ProcessorHandle, ProcessorKind, SmiLibrary, VendorStatus};

/// Device slots available; matches the busy-mask width.
pub const MAX_DEVICES: usize = codec::MAX_DEVICES;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceKind {
    Gpu,
    Cpu,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Device {
    pub index: usize,
    pub kind: DeviceKind,
    pub handle: ProcessorHandle,
}

#[derive(Debug, Default)]
pub struct DeviceRegistry {
    devices: Vec<Device>,
    gpu_count: usize,
    cpu_count: usize,
    /// Core handles per CPU socket, indexed by `device - gpu_count`.
    cores: Vec<Vec<ProcessorHandle>>,
}

fn try_vec<T>(capacity: usize) -> Result<Vec<T>> {
    let mut v = Vec::new();
    v.try_reserve_exact(capacity)
        .map_err(|e| Error::OutOfMemory(format!("device handle array: {e}")))?;
    Ok(v)
}

fn shut_down_after_failed_init(library: &dyn SmiLibrary) {
    if let Err(status) = library.shut_down() {
        warn!(error = %status, "library shutdown after failed discovery also failed");
    }
}

/// `NotSupported` from a per-socket query just means "none of that kind here".
fn handles_or_empty(result: std::result::Result<Vec<ProcessorHandle>, VendorStatus>) -> Result<Vec<ProcessorHandle>> {
    match result {
        Ok(handles) => Ok(handles),
        Err(VendorStatus::NotSupported) | Err(VendorStatus::NotFound) => Ok(Vec::new()),
        Err(status) => Err(Error::vendor("amdsmi_get_processor_handles_by_type", status)),
    }
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Initialize the library and discover devices. No-op when devices are already known.
    pub fn init(&mut self, library: &dyn SmiLibrary, flags: InitFlags) -> Result<()> {
        if !self.devices.is_empty() {
            return Ok(());
        }

        library
            .init(flags)
            .map_err(|status| Error::unsupported(format!("library initialization failed: {status}")))?;

        match self.discover(library, flags) {
            Ok(()) if self.devices.is_empty() => {
                shut_down_after_failed_init(library);
                Err(Error::NoDevices)
            }
            Ok(()) => {
                info!(gpus = self.gpu_count, cpus = self.cpu_count, "device discovery complete");
                Ok(())
            }
            Err(err) => {
                self.clear();
                shut_down_after_failed_init(library);
                Err(err)
            }
        }
    }

    fn discover(&mut self, library: &dyn SmiLibrary, flags: InitFlags) -> Result<()> {
        let sockets = library
            .socket_handles()
            .map_err(|status| Error::vendor("amdsmi_get_socket_handles", status))?;

        let mut gpus = try_vec(sockets.len())?;
        let mut cpus: Vec<(ProcessorHandle, Vec<ProcessorHandle>)> = try_vec(sockets.len())?;

        for socket in &sockets {
            if flags.contains(InitFlags::GPUS) {
                gpus.extend(handles_or_empty(library.processor_handles(*socket, ProcessorKind::Gpu))?);
            }
            if cfg!(feature = "cpu") && flags.contains(InitFlags::CPUS) {
                for cpu in handles_or_empty(library.processor_handles(*socket, ProcessorKind::Cpu))? {
                    let cores = handles_or_empty(library.processor_handles(*socket, ProcessorKind::CpuCore))?;
                    cpus.push((cpu, cores));
                }
            }
        }

        let total = gpus.len() + cpus.len();
        if total > MAX_DEVICES {
            warn!(found = total, tracked = MAX_DEVICES, "ignoring devices beyond the busy-mask width");
        }
        gpus.truncate(MAX_DEVICES);
        cpus.truncate(MAX_DEVICES - gpus.len());

        let mut devices = try_vec(gpus.len() + cpus.len())?;
        let mut cores = try_vec(cpus.len())?;
        for handle in &gpus {
            devices.push(Device {
                index: devices.len(),
                kind: DeviceKind::Gpu,
                handle: *handle,
            });
        }
        for (handle, socket_cores) in cpus {
            debug!(device = devices.len(), cores = socket_cores.len(), "cpu socket discovered");
            devices.push(Device {
                index: devices.len(),
                kind: DeviceKind::Cpu,
                handle,
            });
            cores.push(socket_cores);
        }

        self.gpu_count = gpus.len();
        self.cpu_count = cores.len();
        self.devices = devices;
        self.cores = cores;
        Ok(())
    }

    /// Release all handles and shut the library down. No-op on an empty registry.
    pub fn shutdown(&mut self, library: &dyn SmiLibrary) -> Result<()> {
        if self.devices.is_empty() {
            return Ok(());
        }
        self.clear();
        library
            .shut_down()
            .map_err(|status| Error::vendor("amdsmi_shut_down", status))
    }

    fn clear(&mut self) {
        self.devices.clear();
        self.cores.clear();
        self.gpu_count = 0;
        self.cpu_count = 0;
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn device_count(&self) -> usize {
        self.devices.len()
    }

    pub fn gpu_count(&self) -> usize {
        self.gpu_count
    }

    pub fn cpu_count(&self) -> usize {
        self.cpu_count
    }

    pub fn devices(&self) -> &[Device] {
        &self.devices
    }

    pub fn gpus(&self) -> impl Iterator<Item = &Device> {
        self.devices[..self.gpu_count].iter()
    }

    pub fn cpus(&self) -> impl Iterator<Item = &Device> {
        self.devices[self.gpu_count..].iter()
    }

    pub fn device(&self, index: usize) -> Option<&Device> {
        self.devices.get(index)
    }

    /// Live handle for `index`, or `Misc` when the device is out of range.
    pub fn handle(&self, index: usize) -> Result<ProcessorHandle> {
        self.devices
            .get(index)
            .map(|d| d.handle)
            .ok_or_else(|| Error::misc(format!("device {index} has no live handle")))
    }

    /// Core handles of the CPU socket at device `index` (empty for GPUs).
    pub fn cores(&self, index: usize) -> &[ProcessorHandle] {
        index
            .checked_sub(self.gpu_count)
            .and_then(|socket| self.cores.get(socket))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn core_handle(&self, index: usize, core: usize) -> Result<ProcessorHandle> {
        self.cores(index)
            .get(core)
            .copied()
            .ok_or_else(|| Error::misc(format!("device {index} has no core {core}")))
    }

    /// Mask with one bit per discovered device.
    pub fn device_mask(&self) -> u64 {
        match self.devices.len() {
            0 => 0,
            n if n >= 64 => u64::MAX,
            n => (1u64 << n) - 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vendor::StubLibrary;

    fn flags() -> InitFlags {
        InitFlags::GPUS | InitFlags::CPUS
    }

    #[test]
    fn gpus_precede_cpu_sockets() {
        let lib = StubLibrary::builder().gpus(2).cpus(2).cores_per_cpu(3).build();
        let mut registry = DeviceRegistry::new();
        registry.init(&lib, flags()).unwrap();

        assert_eq!(registry.gpu_count(), 2);
        assert!(registry.gpus().all(|d| d.kind == DeviceKind::Gpu));
        if cfg!(feature = "cpu") {
            assert_eq!(registry.device_count(), 4);
            assert_eq!(registry.cpus().map(|d| d.index).collect::<Vec<_>>(), vec![2, 3]);
            assert_eq!(registry.cores(2).len(), 3);
            assert!(registry.cores(0).is_empty());
            assert!(registry.core_handle(3, 2).is_ok());
            assert!(matches!(registry.core_handle(3, 3), Err(Error::Misc(_))));
        }
        assert!(matches!(registry.handle(40), Err(Error::Misc(_))));
    }

    #[test]
    fn init_is_idempotent() {
        let lib = StubLibrary::builder().gpus(1).build();
        let mut registry = DeviceRegistry::new();
        registry.init(&lib, flags()).unwrap();
        registry.init(&lib, flags()).unwrap();
        assert_eq!(lib.init_calls(), 1);
        assert_eq!(registry.device_count(), 1);
    }

    #[test]
    fn shutdown_is_idempotent() {
        let lib = StubLibrary::builder().gpus(1).build();
        let mut registry = DeviceRegistry::new();
        registry.shutdown(&lib).unwrap();
        assert_eq!(lib.shutdown_calls(), 0);

        registry.init(&lib, flags()).unwrap();
        registry.shutdown(&lib).unwrap();
        registry.shutdown(&lib).unwrap();
        assert_eq!(lib.shutdown_calls(), 1);
        assert_eq!(registry.device_count(), 0);
        assert_eq!(registry.gpu_count() + registry.cpu_count(), 0);
    }

    #[test]
    fn no_devices_rolls_back() {
        let lib = StubLibrary::builder().gpus(0).cpus(0).build();
        let mut registry = DeviceRegistry::new();
        assert_eq!(registry.init(&lib, flags()), Err(Error::NoDevices));
        assert!(!lib.is_initialized());
    }

    #[test]
    fn failed_rollback_shutdown_keeps_the_original_error() {
        let lib = StubLibrary::builder().gpus(0).cpus(0).without("shut_down").build();
        let mut registry = DeviceRegistry::new();
        assert_eq!(registry.init(&lib, flags()), Err(Error::NoDevices));
        assert_eq!(lib.shutdown_calls(), 1);
        assert!(registry.is_empty());

        let lib = StubLibrary::builder().without("socket_handles").without("shut_down").build();
        assert!(matches!(
            registry.init(&lib, flags()),
            Err(Error::Vendor {
                status: VendorStatus::NotSupported,
                ..
            })
        ));
        assert_eq!(lib.shutdown_calls(), 1);
        assert!(registry.is_empty());
    }

    #[test]
    fn init_failure_is_not_supported() {
        let lib = StubLibrary::builder().init_failure(VendorStatus::FailLoadModule).build();
        let mut registry = DeviceRegistry::new();
        assert!(matches!(registry.init(&lib, flags()), Err(Error::NotSupported(_))));
        assert!(registry.is_empty());
    }

    #[test]
    fn extra_devices_are_ignored() {
        let lib = StubLibrary::builder().gpus(MAX_DEVICES + 3).build();
        let mut registry = DeviceRegistry::new();
        registry.init(&lib, flags()).unwrap();
        assert_eq!(registry.device_count(), MAX_DEVICES);
        assert_eq!(registry.device_mask(), u64::MAX);
    }

    #[test]
    fn gpu_only_flags_skip_cpus() {
        let lib = StubLibrary::builder().gpus(1).cpus(1).build();
        let mut registry = DeviceRegistry::new();
        registry.init(&lib, InitFlags::GPUS).unwrap();
        assert_eq!(registry.cpu_count(), 0);
        assert_eq!(registry.device_mask(), 0b1);
    }
}
