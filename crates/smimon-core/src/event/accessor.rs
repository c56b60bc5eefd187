//! Accessor dispatch: one tag per metric family, each turning a vendor call
//! into a scalar.
//!
//! `variant` selects a field of a multi-valued result and `subvariant`
//! selects a sub-unit (thermal sensor, fan, power sensor, core, DIMM). The
//! selector enums below give those integers names.

use tracing::debug;

use crate::error::{Error, Result};
use crate::hash::djb2_value;
use crate::registry::DeviceRegistry;
use crate::vendor::{
    ClockDomain, ComputePartition, EccBlock, ErrorCount, MemoryKind, MemoryPartition, ProcessorHandle, SmiLibrary,
    TempMetric, TempSensor, VendorStatus,
};

use super::Selector;

macro_rules! selector {
    ($(#[$meta:meta])* $name:ident { $($variant:ident = $value:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant = $value),+
        }

        impl $name {
            pub fn from_selector(value: u32) -> Result<Self> {
                match value {
                    $($value => Ok(Self::$variant),)+
                    other => Err(Error::misc(format!(
                        concat!("invalid ", stringify!($name), " selector {}"),
                        other
                    ))),
                }
            }
        }

        impl From<$name> for u32 {
            fn from(value: $name) -> u32 {
                value as u32
            }
        }
    };
}

selector!(PowerField {
    CurrentSocketPower = 0,
    AverageSocketPower = 1,
    GfxVoltage = 2,
    SocVoltage = 3,
    MemVoltage = 4,
    PowerLimit = 5,
});

selector!(
    /// Fields of the power-cap query; only `Cap` is writable.
    CapField {
        Cap = 0,
        Default = 1,
        Dpm = 2,
        Min = 3,
        Max = 4,
    }
);

selector!(
    /// `ResolutionNj` is nanojoules per accumulator tick.
    EnergyField {
    Count = 0,
    ResolutionNj = 1,
    ConsumedUj = 2,
    Timestamp = 3,
});

selector!(PciField {
    Sent = 0,
    Received = 1,
    MaxPacketSize = 2,
});

selector!(LinkField {
    TransferRate = 0,
    Lanes = 1,
});

selector!(
    /// Clock domain views. `Mask` reads as the bit of the active level and
    /// writes the set of allowed levels.
    ClockField {
        Current = 0,
        Min = 1,
        Max = 2,
        Levels = 3,
        Mask = 4,
    }
);

selector!(ActivityField {
    Gfx = 0,
    Umc = 1,
    Mm = 2,
});

selector!(ProfileField {
    Available = 0,
    Current = 1,
    Count = 2,
});

selector!(AsicField {
    VendorId = 0,
    SubvendorId = 1,
    DeviceId = 2,
    RevId = 3,
    ComputeUnits = 4,
    MarketNameHash = 5,
    VendorNameHash = 6,
    SerialHash = 7,
});

selector!(IdField {
    Id = 0,
    Revision = 1,
    SubsystemId = 2,
    BdfId = 3,
});

selector!(VramField {
    Type = 0,
    SizeMb = 1,
    BitWidth = 2,
});

selector!(DriverField {
    VersionHash = 0,
    DateHash = 1,
    NameHash = 2,
});

selector!(VbiosField {
    NameHash = 0,
    BuildDateHash = 1,
    PartNumberHash = 2,
    VersionHash = 3,
});

selector!(TopologyField {
    NumaNode = 0,
    NumaAffinity = 1,
});

selector!(EccField {
    Correctable = 0,
    Uncorrectable = 1,
    Deferred = 2,
});

selector!(
    /// Partition views; `Mode` is the numeric partition id and is writable.
    PartitionField {
        Mode = 0,
        Hash = 1,
    }
);

selector!(VersionField {
    Major = 0,
    Minor = 1,
    Release = 2,
    BuildHash = 3,
});

selector!(SocketPowerField {
    Power = 0,
    Cap = 1,
    CapMax = 2,
});

selector!(SocketFreqField {
    Limit = 0,
    Fmax = 1,
    Fmin = 2,
});

selector!(CoreFreqField {
    Limit = 0,
    BoostLimit = 1,
});

selector!(DimmRangeField {
    Range = 0,
    RefreshRate = 1,
});

selector!(DimmThermalField {
    Temperature = 0,
    Sensor = 1,
});

/// Metric family of a descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Accessor {
    // system
    LibVersion,
    ThreadsPerCore,
    CpuFamily,
    CpuModel,

    // gpu
    Temperature,
    FanRpms,
    FanSpeed,
    FanSpeedMax,
    MemoryTotal,
    MemoryUsage,
    PowerInfo,
    PowerCap,
    Energy,
    PciThroughput,
    PciReplayCounter,
    PciBandwidth,
    Clock,
    Activity,
    PowerProfile,
    PerfLevel,
    AsicInfo,
    GpuIdentity,
    VramInfo,
    VramVendor,
    DriverInfo,
    VbiosInfo,
    Uuid,
    Topology,
    EccEnabled,
    EccCount,
    EccTotal,
    EccStatus,
    ComputePartition,
    MemoryPartition,
    ProcessCount,

    // cpu
    SocketPower,
    SocketEnergy,
    SocketFrequency,
    SocketTemperature,
    CoreEnergy,
    CoreFrequency,
    DimmTempRange,
    DimmPower,
    DimmThermal,
}

/// Where a single read or write lands.
#[derive(Clone, Copy)]
pub struct AccessTarget<'a> {
    pub library: &'a dyn SmiLibrary,
    pub registry: &'a DeviceRegistry,
    /// `None` for system events.
    pub device: Option<usize>,
}

impl<'a> AccessTarget<'a> {
    pub fn new(library: &'a dyn SmiLibrary, registry: &'a DeviceRegistry, device: Option<usize>) -> Self {
        Self {
            library,
            registry,
            device,
        }
    }

    fn device(&self) -> Result<usize> {
        self.device
            .ok_or_else(|| Error::misc("per-device accessor invoked without a device"))
    }

    fn handle(&self) -> Result<ProcessorHandle> {
        self.registry.handle(self.device()?)
    }

    fn core(&self, core: u32) -> Result<ProcessorHandle> {
        self.registry.core_handle(self.device()?, core as usize)
    }
}

fn read_err(call: &'static str) -> impl FnOnce(VendorStatus) -> Error {
    move |status| Error::vendor(call, status)
}

fn write_err(call: &'static str) -> impl FnOnce(VendorStatus) -> Error {
    move |status| Error::vendor_write(call, status)
}

/// Vendor counters are unsigned; anything past `i64::MAX` saturates.
fn scalar(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

/// Floating-point vendor readings must be finite and fit in an `i64`.
fn float_value(value: f64, call: &'static str) -> Result<i64> {
    if value.is_finite() && value >= i64::MIN as f64 && value < i64::MAX as f64 {
        Ok(value as i64)
    } else {
        debug!(call, value, "rejecting non-representable reading");
        Err(Error::vendor(call, VendorStatus::NoData))
    }
}

fn narrow<T: TryFrom<i64>>(value: i64, what: &str) -> Result<T> {
    T::try_from(value).map_err(|_| Error::invalid(format!("{value} is out of range for {what}")))
}

fn sensor_u8(index: u32) -> Result<u8> {
    u8::try_from(index).map_err(|_| Error::misc(format!("sub-unit index {index} out of range")))
}

fn ecc_field(count: ErrorCount, field: EccField) -> i64 {
    match field {
        EccField::Correctable => scalar(count.correctable),
        EccField::Uncorrectable => scalar(count.uncorrectable),
        EccField::Deferred => scalar(count.deferred),
    }
}

fn pick<T: Copy>(values: &[T], index: usize, what: &str) -> Result<T> {
    values
        .get(index)
        .copied()
        .ok_or_else(|| Error::misc(format!("{what} index {index} outside the reported levels")))
}

fn temp_sensor(raw: u32) -> Result<TempSensor> {
    TempSensor::from_raw(raw).ok_or_else(|| Error::misc(format!("invalid temperature sensor {raw}")))
}

fn temp_metric(raw: u32) -> Result<TempMetric> {
    TempMetric::from_raw(raw).ok_or_else(|| Error::misc(format!("invalid temperature metric {raw}")))
}

fn memory_kind(raw: u32) -> Result<MemoryKind> {
    MemoryKind::from_raw(raw).ok_or_else(|| Error::misc(format!("invalid memory kind {raw}")))
}

fn clock_domain(raw: u32) -> Result<ClockDomain> {
    ClockDomain::from_raw(raw).ok_or_else(|| Error::misc(format!("invalid clock domain {raw}")))
}

fn ecc_block(raw: u32) -> Result<EccBlock> {
    EccBlock::from_raw(raw).ok_or_else(|| Error::misc(format!("invalid ECC block {raw:#x}")))
}

impl Accessor {
    /// Whether this family can serve writes for the given field.
    pub fn can_write(self, selector: Selector) -> bool {
        match self {
            Accessor::FanSpeed | Accessor::PerfLevel => true,
            Accessor::PowerCap => selector.variant == CapField::Cap as u32,
            Accessor::Clock => selector.variant == ClockField::Mask as u32,
            Accessor::ComputePartition | Accessor::MemoryPartition => {
                selector.variant == PartitionField::Mode as u32
            }
            Accessor::SocketPower => selector.variant == SocketPowerField::Cap as u32,
            Accessor::CoreFrequency => selector.variant == CoreFreqField::BoostLimit as u32,
            _ => false,
        }
    }

    pub fn read(self, selector: Selector, target: &AccessTarget<'_>) -> Result<i64> {
        let lib = target.library;
        let Selector { variant, subvariant } = selector;
        debug!(accessor = ?self, variant, subvariant, device = ?target.device, "read");

        let value = match self {
            Accessor::LibVersion => {
                let version = lib.lib_version().map_err(read_err("amdsmi_get_lib_version"))?;
                match VersionField::from_selector(variant)? {
                    VersionField::Major => i64::from(version.major),
                    VersionField::Minor => i64::from(version.minor),
                    VersionField::Release => i64::from(version.release),
                    VersionField::BuildHash => djb2_value(&version.build),
                }
            }
            Accessor::ThreadsPerCore => i64::from(
                lib.threads_per_core()
                    .map_err(read_err("amdsmi_get_threads_per_core"))?,
            ),
            Accessor::CpuFamily => i64::from(lib.cpu_family().map_err(read_err("amdsmi_get_cpu_family"))?),
            Accessor::CpuModel => i64::from(lib.cpu_model().map_err(read_err("amdsmi_get_cpu_model"))?),

            Accessor::Temperature => {
                let gpu = target.handle()?;
                lib.temp_metric(gpu, temp_sensor(subvariant)?, temp_metric(variant)?)
                    .map_err(read_err("amdsmi_get_temp_metric"))?
            }
            Accessor::FanRpms => lib
                .fan_rpms(target.handle()?, subvariant)
                .map_err(read_err("amdsmi_get_gpu_fan_rpms"))?,
            Accessor::FanSpeed => lib
                .fan_speed(target.handle()?, subvariant)
                .map_err(read_err("amdsmi_get_gpu_fan_speed"))?,
            Accessor::FanSpeedMax => scalar(
                lib.fan_speed_max(target.handle()?, subvariant)
                    .map_err(read_err("amdsmi_get_gpu_fan_speed_max"))?,
            ),
            Accessor::MemoryTotal => scalar(
                lib.total_memory(target.handle()?, memory_kind(variant)?)
                    .map_err(read_err("amdsmi_get_gpu_memory_total"))?,
            ),
            Accessor::MemoryUsage => scalar(
                lib.memory_usage(target.handle()?, memory_kind(variant)?)
                    .map_err(read_err("amdsmi_get_gpu_memory_usage"))?,
            ),
            Accessor::PowerInfo => {
                let info = lib
                    .power_info(target.handle()?)
                    .map_err(read_err("amdsmi_get_power_info"))?;
                i64::from(match PowerField::from_selector(variant)? {
                    PowerField::CurrentSocketPower => info.current_socket_power,
                    PowerField::AverageSocketPower => info.average_socket_power,
                    PowerField::GfxVoltage => info.gfx_voltage,
                    PowerField::SocVoltage => info.soc_voltage,
                    PowerField::MemVoltage => info.mem_voltage,
                    PowerField::PowerLimit => info.power_limit,
                })
            }
            Accessor::PowerCap => {
                let info = lib
                    .power_cap_info(target.handle()?, subvariant)
                    .map_err(read_err("amdsmi_get_power_cap_info"))?;
                scalar(match CapField::from_selector(variant)? {
                    CapField::Cap => info.power_cap,
                    CapField::Default => info.default_power_cap,
                    CapField::Dpm => info.dpm_cap,
                    CapField::Min => info.min_power_cap,
                    CapField::Max => info.max_power_cap,
                })
            }
            Accessor::Energy => {
                let energy = lib
                    .energy_count(target.handle()?)
                    .map_err(read_err("amdsmi_get_energy_count"))?;
                match EnergyField::from_selector(variant)? {
                    EnergyField::Count => scalar(energy.accumulator),
                    EnergyField::ResolutionNj => {
                        float_value((f64::from(energy.resolution) * 1000.0).round(), "amdsmi_get_energy_count")?
                    }
                    EnergyField::ConsumedUj => float_value(
                        energy.accumulator as f64 * f64::from(energy.resolution),
                        "amdsmi_get_energy_count",
                    )?,
                    EnergyField::Timestamp => scalar(energy.timestamp),
                }
            }
            Accessor::PciThroughput => {
                let pci = lib
                    .pci_throughput(target.handle()?)
                    .map_err(read_err("amdsmi_get_gpu_pci_throughput"))?;
                scalar(match PciField::from_selector(variant)? {
                    PciField::Sent => pci.sent,
                    PciField::Received => pci.received,
                    PciField::MaxPacketSize => pci.max_packet_size,
                })
            }
            Accessor::PciReplayCounter => scalar(
                lib.pci_replay_counter(target.handle()?)
                    .map_err(read_err("amdsmi_get_gpu_pci_replay_counter"))?,
            ),
            Accessor::PciBandwidth => {
                let bw = lib
                    .pci_bandwidth(target.handle()?)
                    .map_err(read_err("amdsmi_get_gpu_pci_bandwidth"))?;
                match LinkField::from_selector(variant)? {
                    LinkField::TransferRate => scalar(pick(&bw.rates, bw.current, "transfer rate")?),
                    LinkField::Lanes => i64::from(pick(&bw.lanes, bw.current, "lane width")?),
                }
            }
            Accessor::Clock => {
                let freqs = lib
                    .clock_frequencies(target.handle()?, clock_domain(subvariant)?)
                    .map_err(read_err("amdsmi_get_clk_freq"))?;
                match ClockField::from_selector(variant)? {
                    ClockField::Current => scalar(pick(&freqs.supported, freqs.current, "clock level")?),
                    ClockField::Min => scalar(freqs.supported.iter().copied().min().unwrap_or(0)),
                    ClockField::Max => scalar(freqs.supported.iter().copied().max().unwrap_or(0)),
                    ClockField::Levels => freqs.supported.len() as i64,
                    ClockField::Mask => {
                        if freqs.current >= 64 {
                            return Err(Error::misc(format!("clock level {} beyond mask width", freqs.current)));
                        }
                        scalar(1u64 << freqs.current)
                    }
                }
            }
            Accessor::Activity => {
                let usage = lib
                    .gpu_activity(target.handle()?)
                    .map_err(read_err("amdsmi_get_gpu_activity"))?;
                i64::from(match ActivityField::from_selector(variant)? {
                    ActivityField::Gfx => usage.gfx_activity,
                    ActivityField::Umc => usage.umc_activity,
                    ActivityField::Mm => usage.mm_activity,
                })
            }
            Accessor::PowerProfile => {
                let status = lib
                    .power_profile_presets(target.handle()?, subvariant)
                    .map_err(read_err("amdsmi_get_gpu_power_profile_presets"))?;
                match ProfileField::from_selector(variant)? {
                    ProfileField::Available => scalar(status.available_profiles),
                    ProfileField::Current => scalar(status.current),
                    ProfileField::Count => i64::from(status.num_profiles),
                }
            }
            Accessor::PerfLevel => i64::from(
                lib.perf_level(target.handle()?)
                    .map_err(read_err("amdsmi_get_gpu_perf_level"))?,
            ),
            Accessor::AsicInfo => {
                let asic = lib
                    .asic_info(target.handle()?)
                    .map_err(read_err("amdsmi_get_gpu_asic_info"))?;
                match AsicField::from_selector(variant)? {
                    AsicField::VendorId => i64::from(asic.vendor_id),
                    AsicField::SubvendorId => i64::from(asic.subvendor_id),
                    AsicField::DeviceId => scalar(asic.device_id),
                    AsicField::RevId => i64::from(asic.rev_id),
                    AsicField::ComputeUnits => i64::from(asic.num_compute_units),
                    AsicField::MarketNameHash => djb2_value(&asic.market_name),
                    AsicField::VendorNameHash => djb2_value(&asic.vendor_name),
                    AsicField::SerialHash => djb2_value(&asic.asic_serial),
                }
            }
            Accessor::GpuIdentity => {
                let gpu = target.handle()?;
                match IdField::from_selector(variant)? {
                    IdField::Id => i64::from(lib.gpu_id(gpu).map_err(read_err("amdsmi_get_gpu_id"))?),
                    IdField::Revision => {
                        i64::from(lib.gpu_revision(gpu).map_err(read_err("amdsmi_get_gpu_revision"))?)
                    }
                    IdField::SubsystemId => i64::from(
                        lib.gpu_subsystem_id(gpu)
                            .map_err(read_err("amdsmi_get_gpu_subsystem_id"))?,
                    ),
                    IdField::BdfId => scalar(lib.gpu_bdf_id(gpu).map_err(read_err("amdsmi_get_gpu_bdf_id"))?),
                }
            }
            Accessor::VramInfo => {
                let vram = lib
                    .vram_info(target.handle()?)
                    .map_err(read_err("amdsmi_get_gpu_vram_info"))?;
                match VramField::from_selector(variant)? {
                    VramField::Type => i64::from(vram.vram_type),
                    VramField::SizeMb => scalar(vram.vram_size_mb),
                    VramField::BitWidth => i64::from(vram.vram_bit_width),
                }
            }
            Accessor::VramVendor => djb2_value(
                &lib.vram_vendor(target.handle()?)
                    .map_err(read_err("amdsmi_get_gpu_vram_vendor"))?,
            ),
            Accessor::DriverInfo => {
                let driver = lib
                    .driver_info(target.handle()?)
                    .map_err(read_err("amdsmi_get_gpu_driver_info"))?;
                djb2_value(match DriverField::from_selector(variant)? {
                    DriverField::VersionHash => &driver.version,
                    DriverField::DateHash => &driver.date,
                    DriverField::NameHash => &driver.name,
                })
            }
            Accessor::VbiosInfo => {
                let vbios = lib
                    .vbios_info(target.handle()?)
                    .map_err(read_err("amdsmi_get_gpu_vbios_info"))?;
                djb2_value(match VbiosField::from_selector(variant)? {
                    VbiosField::NameHash => &vbios.name,
                    VbiosField::BuildDateHash => &vbios.build_date,
                    VbiosField::PartNumberHash => &vbios.part_number,
                    VbiosField::VersionHash => &vbios.version,
                })
            }
            Accessor::Uuid => djb2_value(
                &lib.device_uuid(target.handle()?)
                    .map_err(read_err("amdsmi_get_gpu_device_uuid"))?,
            ),
            Accessor::Topology => {
                let gpu = target.handle()?;
                match TopologyField::from_selector(variant)? {
                    TopologyField::NumaNode => {
                        i64::from(lib.numa_node(gpu).map_err(read_err("amdsmi_topo_get_numa_node_number"))?)
                    }
                    TopologyField::NumaAffinity => i64::from(
                        lib.numa_affinity(gpu)
                            .map_err(read_err("amdsmi_get_gpu_topo_numa_affinity"))?,
                    ),
                }
            }
            Accessor::EccEnabled => scalar(
                lib.ecc_enabled(target.handle()?)
                    .map_err(read_err("amdsmi_get_gpu_ecc_enabled"))?,
            ),
            Accessor::EccCount => {
                let count = lib
                    .ecc_count(target.handle()?, ecc_block(subvariant)?)
                    .map_err(read_err("amdsmi_get_gpu_ecc_count"))?;
                ecc_field(count, EccField::from_selector(variant)?)
            }
            Accessor::EccTotal => {
                let count = lib
                    .total_ecc_count(target.handle()?)
                    .map_err(read_err("amdsmi_get_gpu_total_ecc_count"))?;
                ecc_field(count, EccField::from_selector(variant)?)
            }
            Accessor::EccStatus => i64::from(
                lib.ecc_status(target.handle()?, ecc_block(subvariant)?)
                    .map_err(read_err("amdsmi_get_gpu_ecc_status"))?,
            ),
            Accessor::ComputePartition => {
                let label = lib
                    .compute_partition(target.handle()?)
                    .map_err(read_err("amdsmi_get_gpu_compute_partition"))?;
                match PartitionField::from_selector(variant)? {
                    PartitionField::Mode => ComputePartition::from_label(&label)
                        .map(|p| i64::from(p.raw()))
                        .ok_or_else(|| Error::misc(format!("unrecognized compute partition {label:?}")))?,
                    PartitionField::Hash => djb2_value(&label),
                }
            }
            Accessor::MemoryPartition => {
                let label = lib
                    .memory_partition(target.handle()?)
                    .map_err(read_err("amdsmi_get_gpu_memory_partition"))?;
                match PartitionField::from_selector(variant)? {
                    PartitionField::Mode => MemoryPartition::from_label(&label)
                        .map(|p| i64::from(p.raw()))
                        .ok_or_else(|| Error::misc(format!("unrecognized memory partition {label:?}")))?,
                    PartitionField::Hash => djb2_value(&label),
                }
            }
            Accessor::ProcessCount => i64::from(
                lib.process_count(target.handle()?)
                    .map_err(read_err("amdsmi_get_gpu_process_list"))?,
            ),

            Accessor::SocketPower => {
                let cpu = target.handle()?;
                i64::from(match SocketPowerField::from_selector(variant)? {
                    SocketPowerField::Power => lib
                        .cpu_socket_power(cpu)
                        .map_err(read_err("amdsmi_get_cpu_socket_power"))?,
                    SocketPowerField::Cap => lib
                        .cpu_socket_power_cap(cpu)
                        .map_err(read_err("amdsmi_get_cpu_socket_power_cap"))?,
                    SocketPowerField::CapMax => lib
                        .cpu_socket_power_cap_max(cpu)
                        .map_err(read_err("amdsmi_get_cpu_socket_power_cap_max"))?,
                })
            }
            Accessor::SocketEnergy => scalar(
                lib.cpu_socket_energy(target.handle()?)
                    .map_err(read_err("amdsmi_get_cpu_socket_energy"))?,
            ),
            Accessor::SocketFrequency => {
                let cpu = target.handle()?;
                match SocketFreqField::from_selector(variant)? {
                    SocketFreqField::Limit => i64::from(
                        lib.cpu_socket_freq_limit(cpu)
                            .map_err(read_err("amdsmi_get_cpu_socket_current_active_freq_limit"))?,
                    ),
                    field => {
                        let range = lib
                            .cpu_socket_freq_range(cpu)
                            .map_err(read_err("amdsmi_get_cpu_socket_freq_range"))?;
                        i64::from(if field == SocketFreqField::Fmax {
                            range.fmax
                        } else {
                            range.fmin
                        })
                    }
                }
            }
            Accessor::SocketTemperature => i64::from(
                lib.cpu_socket_temperature(target.handle()?)
                    .map_err(read_err("amdsmi_get_cpu_socket_temperature"))?,
            ),
            Accessor::CoreEnergy => scalar(
                lib.cpu_core_energy(target.core(subvariant)?)
                    .map_err(read_err("amdsmi_get_cpu_core_energy"))?,
            ),
            Accessor::CoreFrequency => {
                let core = target.core(subvariant)?;
                i64::from(match CoreFreqField::from_selector(variant)? {
                    CoreFreqField::Limit => lib
                        .cpu_core_freq_limit(core)
                        .map_err(read_err("amdsmi_get_cpu_core_current_freq_limit"))?,
                    CoreFreqField::BoostLimit => lib
                        .cpu_core_boost_limit(core)
                        .map_err(read_err("amdsmi_get_cpu_core_boostlimit"))?,
                })
            }
            Accessor::DimmTempRange => {
                let range = lib
                    .dimm_temp_range_and_refresh(target.handle()?, sensor_u8(subvariant)?)
                    .map_err(read_err("amdsmi_get_cpu_dimm_temp_range_and_refresh_rate"))?;
                i64::from(match DimmRangeField::from_selector(variant)? {
                    DimmRangeField::Range => range.range,
                    DimmRangeField::RefreshRate => range.refresh_rate,
                })
            }
            Accessor::DimmPower => i64::from(
                lib.dimm_power(target.handle()?, sensor_u8(subvariant)?)
                    .map_err(read_err("amdsmi_get_cpu_dimm_power_consumption"))?
                    .power,
            ),
            Accessor::DimmThermal => {
                let thermal = lib
                    .dimm_thermal(target.handle()?, sensor_u8(subvariant)?)
                    .map_err(read_err("amdsmi_get_cpu_dimm_thermal_sensor"))?;
                match DimmThermalField::from_selector(variant)? {
                    // millidegrees, matching the GPU temperature events
                    DimmThermalField::Temperature => float_value(
                        (f64::from(thermal.temp) * 1000.0).round(),
                        "amdsmi_get_cpu_dimm_thermal_sensor",
                    )?,
                    DimmThermalField::Sensor => i64::from(thermal.sensor),
                }
            }
        };

        Ok(value)
    }

    pub fn write(self, selector: Selector, target: &AccessTarget<'_>, value: i64) -> Result<()> {
        if !self.can_write(selector) {
            return Err(Error::unsupported(format!("{self:?} events cannot be written")));
        }

        let lib = target.library;
        let Selector { variant, subvariant } = selector;
        debug!(accessor = ?self, variant, subvariant, device = ?target.device, value, "write");

        match self {
            Accessor::FanSpeed => lib
                .set_fan_speed(target.handle()?, subvariant, narrow(value, "fan speed")?)
                .map_err(write_err("amdsmi_set_gpu_fan_speed")),
            Accessor::PowerCap => lib
                .set_power_cap(target.handle()?, subvariant, narrow(value, "power cap")?)
                .map_err(write_err("amdsmi_set_power_cap")),
            Accessor::Clock => lib
                .set_clock_mask(target.handle()?, clock_domain(subvariant)?, narrow(value, "clock mask")?)
                .map_err(write_err("amdsmi_set_clk_freq")),
            Accessor::PerfLevel => lib
                .set_perf_level(target.handle()?, narrow(value, "performance level")?)
                .map_err(write_err("amdsmi_set_gpu_perf_level")),
            Accessor::ComputePartition => {
                let partition = narrow::<u32>(value, "compute partition")
                    .ok()
                    .and_then(ComputePartition::from_raw)
                    .ok_or_else(|| Error::invalid(format!("{value} is not a compute partition")))?;
                lib.set_compute_partition(target.handle()?, partition)
                    .map_err(write_err("amdsmi_set_gpu_compute_partition"))
            }
            Accessor::MemoryPartition => {
                let partition = narrow::<u32>(value, "memory partition")
                    .ok()
                    .and_then(MemoryPartition::from_raw)
                    .ok_or_else(|| Error::invalid(format!("{value} is not a memory partition")))?;
                lib.set_memory_partition(target.handle()?, partition)
                    .map_err(write_err("amdsmi_set_gpu_memory_partition"))
            }
            Accessor::SocketPower => lib
                .set_cpu_socket_power_cap(target.handle()?, narrow(value, "socket power cap")?)
                .map_err(write_err("amdsmi_set_cpu_socket_power_cap")),
            Accessor::CoreFrequency => lib
                .set_cpu_core_boost_limit(target.core(subvariant)?, narrow(value, "core boost limit")?)
                .map_err(write_err("amdsmi_set_cpu_core_boostlimit")),
            _ => Err(Error::unsupported(format!("{self:?} events cannot be written"))),
        }
    }
}
