//! GPU metric families.

use crate::error::Result;
use crate::event::accessor::{
    ActivityField, AsicField, CapField, ClockField, DriverField, EccField, EnergyField, IdField, LinkField,
    PartitionField, PciField, PowerField, ProfileField, TopologyField, VbiosField, VramField,
};
use crate::event::{Accessor, EventSpec};
use crate::vendor::{ClockDomain, EccBlock, MemoryKind, TempMetric, TempSensor};

use super::Prober;

/// Fan, power-cap and power-profile families are probed on sub-unit 0 only.
const PRIMARY_SENSOR: u32 = 0;

pub(super) fn probe(prober: &mut Prober<'_>, device: usize) -> Result<()> {
    let dev = Some(device);

    for sensor in TempSensor::ALL {
        for metric in TempMetric::ALL {
            prober.single(
                EventSpec::new(
                    format!("temp_{metric}:sensor={}", sensor.raw()),
                    format!("Temperature {metric} of the {sensor} sensor, millidegrees Celsius."),
                    Accessor::Temperature,
                )
                .variant(metric.raw())
                .subvariant(sensor.raw()),
                dev,
            )?;
        }
    }

    fans(prober, device)?;
    memory(prober, device)?;
    power(prober, device)?;
    pcie(prober, device)?;
    clocks(prober, device)?;
    performance(prober, device)?;
    identity(prober, device)?;
    ecc(prober, device)?;
    partitions(prober, device)?;

    prober.single(
        EventSpec::new("process_count", "Processes holding the GPU.", Accessor::ProcessCount),
        dev,
    )?;
    Ok(())
}

fn fans(prober: &mut Prober<'_>, device: usize) -> Result<()> {
    let s = PRIMARY_SENSOR;
    prober.single(
        EventSpec::new(format!("fan_rpms:sensor={s}"), "Fan speed, RPM.", Accessor::FanRpms).subvariant(s),
        Some(device),
    )?;
    prober.single(
        EventSpec::new(
            format!("fan_speed:sensor={s}"),
            "Fan speed relative to fan_speed_max; writable.",
            Accessor::FanSpeed,
        )
        .subvariant(s)
        .writable(),
        Some(device),
    )?;
    prober.single(
        EventSpec::new(
            format!("fan_speed_max:sensor={s}"),
            "Maximum fan speed setting.",
            Accessor::FanSpeedMax,
        )
        .subvariant(s),
        Some(device),
    )?;
    Ok(())
}

fn memory(prober: &mut Prober<'_>, device: usize) -> Result<()> {
    for kind in MemoryKind::ALL {
        prober.single(
            EventSpec::new(
                format!("mem_total_{kind}"),
                format!("Total {kind} memory, bytes."),
                Accessor::MemoryTotal,
            )
            .variant(kind.raw()),
            Some(device),
        )?;
        prober.single(
            EventSpec::new(
                format!("mem_usage_{kind}"),
                format!("Used {kind} memory, bytes."),
                Accessor::MemoryUsage,
            )
            .variant(kind.raw()),
            Some(device),
        )?;
    }
    Ok(())
}

fn power(prober: &mut Prober<'_>, device: usize) -> Result<()> {
    let dev = Some(device);
    prober.group(
        vec![
            EventSpec::new("power_current_socket", "Current socket power, watts.", Accessor::PowerInfo)
                .variant(PowerField::CurrentSocketPower),
            EventSpec::new("power_average_socket", "Average socket power, watts.", Accessor::PowerInfo)
                .variant(PowerField::AverageSocketPower),
            EventSpec::new("voltage_gfx", "GFX rail voltage, millivolts.", Accessor::PowerInfo)
                .variant(PowerField::GfxVoltage),
            EventSpec::new("voltage_soc", "SoC rail voltage, millivolts.", Accessor::PowerInfo)
                .variant(PowerField::SocVoltage),
            EventSpec::new("voltage_mem", "Memory rail voltage, millivolts.", Accessor::PowerInfo)
                .variant(PowerField::MemVoltage),
            EventSpec::new("power_limit", "Socket power limit, watts.", Accessor::PowerInfo)
                .variant(PowerField::PowerLimit),
        ],
        dev,
    )?;

    let cap = |name: &str, descr: &str, field: CapField| {
        EventSpec::new(name, descr, Accessor::PowerCap)
            .variant(field)
            .subvariant(PRIMARY_SENSOR)
    };
    prober.group(
        vec![
            cap("power_cap", "Active power cap, microwatts; writable.", CapField::Cap).writable(),
            cap("power_cap_default", "Default power cap, microwatts.", CapField::Default),
            cap("power_cap_dpm", "DPM power cap, microwatts.", CapField::Dpm),
            cap("power_cap_min", "Minimum settable power cap, microwatts.", CapField::Min),
            cap("power_cap_max", "Maximum settable power cap, microwatts.", CapField::Max),
        ],
        dev,
    )?;

    prober.group(
        vec![
            EventSpec::new("energy_count", "Raw energy accumulator.", Accessor::Energy).variant(EnergyField::Count),
            EventSpec::new(
                "energy_resolution",
                "Energy accumulator resolution, nanojoules per tick.",
                Accessor::Energy,
            )
            .variant(EnergyField::ResolutionNj),
            EventSpec::new("energy_consumed", "Energy consumed, microjoules.", Accessor::Energy)
                .variant(EnergyField::ConsumedUj),
            EventSpec::new("energy_timestamp", "Energy sample timestamp, nanoseconds.", Accessor::Energy)
                .variant(EnergyField::Timestamp),
        ],
        dev,
    )?;
    Ok(())
}

fn pcie(prober: &mut Prober<'_>, device: usize) -> Result<()> {
    let dev = Some(device);
    prober.group(
        vec![
            EventSpec::new("pci_throughput_sent", "PCIe bytes sent per second.", Accessor::PciThroughput)
                .variant(PciField::Sent),
            EventSpec::new(
                "pci_throughput_received",
                "PCIe bytes received per second.",
                Accessor::PciThroughput,
            )
            .variant(PciField::Received),
            EventSpec::new(
                "pci_throughput_max_packet_size",
                "PCIe maximum packet size, bytes.",
                Accessor::PciThroughput,
            )
            .variant(PciField::MaxPacketSize),
        ],
        dev,
    )?;
    prober.single(
        EventSpec::new("pci_replay_counter", "PCIe replay count.", Accessor::PciReplayCounter),
        dev,
    )?;
    prober.group(
        vec![
            EventSpec::new("pci_transfer_rate", "Current PCIe transfer rate, MT/s.", Accessor::PciBandwidth)
                .variant(LinkField::TransferRate),
            EventSpec::new("pci_lanes", "Current PCIe link width.", Accessor::PciBandwidth)
                .variant(LinkField::Lanes),
        ],
        dev,
    )?;
    Ok(())
}

fn clocks(prober: &mut Prober<'_>, device: usize) -> Result<()> {
    for domain in ClockDomain::ALL {
        let clk = |suffix: &str, descr: String, field: ClockField| {
            EventSpec::new(format!("clk_{domain}_{suffix}"), descr, Accessor::Clock)
                .variant(field)
                .subvariant(domain.raw())
        };
        prober.group(
            vec![
                clk("freq_current", format!("Current {domain} clock, Hz."), ClockField::Current),
                clk("freq_min", format!("Lowest supported {domain} clock, Hz."), ClockField::Min),
                clk("freq_max", format!("Highest supported {domain} clock, Hz."), ClockField::Max),
                clk("levels", format!("Number of {domain} clock levels."), ClockField::Levels),
                clk(
                    "mask",
                    format!("Bit of the active {domain} level; writes set the allowed levels."),
                    ClockField::Mask,
                )
                .writable(),
            ],
            Some(device),
        )?;
    }
    Ok(())
}

fn performance(prober: &mut Prober<'_>, device: usize) -> Result<()> {
    let dev = Some(device);
    prober.group(
        vec![
            EventSpec::new("gfx_activity", "Graphics engine busy, percent.", Accessor::Activity)
                .variant(ActivityField::Gfx),
            EventSpec::new("umc_activity", "Memory controller busy, percent.", Accessor::Activity)
                .variant(ActivityField::Umc),
            EventSpec::new("mm_activity", "Multimedia engine busy, percent.", Accessor::Activity)
                .variant(ActivityField::Mm),
        ],
        dev,
    )?;
    prober.group(
        vec![
            EventSpec::new(
                "power_profile_available",
                "Mask of available power profiles.",
                Accessor::PowerProfile,
            )
            .variant(ProfileField::Available)
            .subvariant(PRIMARY_SENSOR),
            EventSpec::new("power_profile_current", "Active power profile.", Accessor::PowerProfile)
                .variant(ProfileField::Current)
                .subvariant(PRIMARY_SENSOR),
            EventSpec::new("power_profile_count", "Number of power profiles.", Accessor::PowerProfile)
                .variant(ProfileField::Count)
                .subvariant(PRIMARY_SENSOR),
        ],
        dev,
    )?;
    prober.single(
        EventSpec::new("perf_level", "Performance level; writable.", Accessor::PerfLevel).writable(),
        dev,
    )?;
    Ok(())
}

fn identity(prober: &mut Prober<'_>, device: usize) -> Result<()> {
    let dev = Some(device);
    let asic = |name: &str, descr: &str, field: AsicField| EventSpec::new(name, descr, Accessor::AsicInfo).variant(field);
    prober.group(
        vec![
            asic("asic_vendor_id", "PCI vendor id.", AsicField::VendorId),
            asic("asic_subvendor_id", "PCI subsystem vendor id.", AsicField::SubvendorId),
            asic("asic_device_id", "PCI device id.", AsicField::DeviceId),
            asic("asic_rev_id", "ASIC revision.", AsicField::RevId),
            asic("asic_compute_units", "Compute unit count.", AsicField::ComputeUnits),
            asic("asic_market_name_hash", "djb2 hash of the market name.", AsicField::MarketNameHash),
            asic("asic_vendor_name_hash", "djb2 hash of the vendor name.", AsicField::VendorNameHash),
            asic("asic_serial_hash", "djb2 hash of the ASIC serial.", AsicField::SerialHash),
        ],
        dev,
    )?;

    for (name, descr, field) in [
        ("gpu_id", "GPU device id.", IdField::Id),
        ("gpu_revision", "GPU revision id.", IdField::Revision),
        ("gpu_subsystem_id", "GPU subsystem id.", IdField::SubsystemId),
        ("gpu_bdf_id", "PCI bus/device/function id.", IdField::BdfId),
    ] {
        prober.single(EventSpec::new(name, descr, Accessor::GpuIdentity).variant(field), dev)?;
    }

    prober.group(
        vec![
            EventSpec::new("vram_type", "VRAM type.", Accessor::VramInfo).variant(VramField::Type),
            EventSpec::new("vram_size", "VRAM size, MiB.", Accessor::VramInfo).variant(VramField::SizeMb),
            EventSpec::new("vram_bit_width", "VRAM bus width, bits.", Accessor::VramInfo)
                .variant(VramField::BitWidth),
        ],
        dev,
    )?;
    prober.single(
        EventSpec::new("vram_vendor_hash", "djb2 hash of the VRAM vendor.", Accessor::VramVendor),
        dev,
    )?;

    prober.group(
        vec![
            EventSpec::new("driver_version_hash", "djb2 hash of the driver version.", Accessor::DriverInfo)
                .variant(DriverField::VersionHash),
            EventSpec::new("driver_date_hash", "djb2 hash of the driver date.", Accessor::DriverInfo)
                .variant(DriverField::DateHash),
            EventSpec::new("driver_name_hash", "djb2 hash of the driver name.", Accessor::DriverInfo)
                .variant(DriverField::NameHash),
        ],
        dev,
    )?;

    prober.group(
        vec![
            EventSpec::new("vbios_name_hash", "djb2 hash of the VBIOS name.", Accessor::VbiosInfo)
                .variant(VbiosField::NameHash),
            EventSpec::new(
                "vbios_build_date_hash",
                "djb2 hash of the VBIOS build date.",
                Accessor::VbiosInfo,
            )
            .variant(VbiosField::BuildDateHash),
            EventSpec::new(
                "vbios_part_number_hash",
                "djb2 hash of the VBIOS part number.",
                Accessor::VbiosInfo,
            )
            .variant(VbiosField::PartNumberHash),
            EventSpec::new("vbios_version_hash", "djb2 hash of the VBIOS version.", Accessor::VbiosInfo)
                .variant(VbiosField::VersionHash),
        ],
        dev,
    )?;

    prober.single(
        EventSpec::new("uuid_hash", "djb2 hash of the device UUID.", Accessor::Uuid),
        dev,
    )?;
    prober.single(
        EventSpec::new("numa_node", "NUMA node of the GPU.", Accessor::Topology).variant(TopologyField::NumaNode),
        dev,
    )?;
    prober.single(
        EventSpec::new("numa_affinity", "NUMA affinity of the GPU.", Accessor::Topology)
            .variant(TopologyField::NumaAffinity),
        dev,
    )?;
    Ok(())
}

fn ecc(prober: &mut Prober<'_>, device: usize) -> Result<()> {
    let dev = Some(device);
    prober.single(
        EventSpec::new("ecc_enabled_blocks", "Mask of blocks with ECC enabled.", Accessor::EccEnabled),
        dev,
    )?;

    prober.group(
        vec![
            EventSpec::new("ecc_total_correctable", "Correctable ECC errors, all blocks.", Accessor::EccTotal)
                .variant(EccField::Correctable),
            EventSpec::new(
                "ecc_total_uncorrectable",
                "Uncorrectable ECC errors, all blocks.",
                Accessor::EccTotal,
            )
            .variant(EccField::Uncorrectable),
            EventSpec::new("ecc_total_deferred", "Deferred ECC errors, all blocks.", Accessor::EccTotal)
                .variant(EccField::Deferred),
        ],
        dev,
    )?;

    for block in EccBlock::ALL {
        let count = |kind: &str, field: EccField| {
            EventSpec::new(
                format!("ecc_{kind}_{block}"),
                format!("{kind} ECC errors in the {block} block."),
                Accessor::EccCount,
            )
            .variant(field)
            .subvariant(block.raw())
        };
        prober.group(
            vec![
                count("correctable", EccField::Correctable),
                count("uncorrectable", EccField::Uncorrectable),
                count("deferred", EccField::Deferred),
            ],
            dev,
        )?;
        prober.single(
            EventSpec::new(
                format!("ecc_status_{block}"),
                format!("ECC status of the {block} block."),
                Accessor::EccStatus,
            )
            .subvariant(block.raw()),
            dev,
        )?;
    }
    Ok(())
}

fn partitions(prober: &mut Prober<'_>, device: usize) -> Result<()> {
    let dev = Some(device);
    prober.group(
        vec![
            EventSpec::new(
                "compute_partition",
                "Compute partition (1=SPX .. 5=CPX); writable.",
                Accessor::ComputePartition,
            )
            .variant(PartitionField::Mode)
            .writable(),
            EventSpec::new(
                "compute_partition_hash",
                "djb2 hash of the compute partition string.",
                Accessor::ComputePartition,
            )
            .variant(PartitionField::Hash),
        ],
        dev,
    )?;
    prober.group(
        vec![
            EventSpec::new(
                "memory_partition",
                "Memory partition (NPS1, NPS2, NPS4 or NPS8 as 1/2/4/8); writable.",
                Accessor::MemoryPartition,
            )
            .variant(PartitionField::Mode)
            .writable(),
            EventSpec::new(
                "memory_partition_hash",
                "djb2 hash of the memory partition string.",
                Accessor::MemoryPartition,
            )
            .variant(PartitionField::Hash),
        ],
        dev,
    )?;
    Ok(())
}
