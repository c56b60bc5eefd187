//! CPU socket, core and DIMM families.

use crate::error::Result;
use crate::event::accessor::{CoreFreqField, DimmRangeField, DimmThermalField, SocketFreqField, SocketPowerField};
use crate::event::{Accessor, EventSpec};

use super::Prober;

/// DIMM addresses probed per socket.
const MAX_DIMMS: u32 = 16;

pub(super) fn probe(prober: &mut Prober<'_>, device: usize) -> Result<()> {
    let dev = Some(device);

    prober.single(
        EventSpec::new("cpu_socket_power", "Socket power, milliwatts.", Accessor::SocketPower)
            .variant(SocketPowerField::Power),
        dev,
    )?;
    prober.single(
        EventSpec::new(
            "cpu_socket_power_cap",
            "Socket power cap, milliwatts; writable.",
            Accessor::SocketPower,
        )
        .variant(SocketPowerField::Cap)
        .writable(),
        dev,
    )?;
    prober.single(
        EventSpec::new(
            "cpu_socket_power_cap_max",
            "Maximum socket power cap, milliwatts.",
            Accessor::SocketPower,
        )
        .variant(SocketPowerField::CapMax),
        dev,
    )?;
    prober.single(
        EventSpec::new("cpu_socket_energy", "Socket energy, microjoules.", Accessor::SocketEnergy),
        dev,
    )?;
    prober.single(
        EventSpec::new(
            "cpu_socket_freq_limit",
            "Active socket frequency limit, MHz.",
            Accessor::SocketFrequency,
        )
        .variant(SocketFreqField::Limit),
        dev,
    )?;
    prober.group(
        vec![
            EventSpec::new("cpu_socket_fmax", "Socket Fmax, MHz.", Accessor::SocketFrequency)
                .variant(SocketFreqField::Fmax),
            EventSpec::new("cpu_socket_fmin", "Socket Fmin, MHz.", Accessor::SocketFrequency)
                .variant(SocketFreqField::Fmin),
        ],
        dev,
    )?;
    prober.single(
        EventSpec::new(
            "cpu_socket_temperature",
            "Socket temperature, millidegrees Celsius.",
            Accessor::SocketTemperature,
        ),
        dev,
    )?;

    let cores = prober.registry().cores(device).len() as u32;
    for core in 0..cores {
        prober.single(
            EventSpec::new(
                format!("cpu_core_energy:sensor={core}"),
                "Core energy, microjoules.",
                Accessor::CoreEnergy,
            )
            .subvariant(core),
            dev,
        )?;
        prober.single(
            EventSpec::new(
                format!("cpu_core_freq_limit:sensor={core}"),
                "Core frequency limit, MHz.",
                Accessor::CoreFrequency,
            )
            .variant(CoreFreqField::Limit)
            .subvariant(core),
            dev,
        )?;
        prober.single(
            EventSpec::new(
                format!("cpu_core_boost_limit:sensor={core}"),
                "Core boost limit, MHz; writable.",
                Accessor::CoreFrequency,
            )
            .variant(CoreFreqField::BoostLimit)
            .subvariant(core)
            .writable(),
            dev,
        )?;
    }

    for dimm in 0..MAX_DIMMS {
        prober.group(
            vec![
                EventSpec::new(
                    format!("dimm_temp_range:sensor={dimm}"),
                    "DIMM temperature range code.",
                    Accessor::DimmTempRange,
                )
                .variant(DimmRangeField::Range)
                .subvariant(dimm),
                EventSpec::new(
                    format!("dimm_refresh_rate:sensor={dimm}"),
                    "DIMM refresh rate code.",
                    Accessor::DimmTempRange,
                )
                .variant(DimmRangeField::RefreshRate)
                .subvariant(dimm),
            ],
            dev,
        )?;
        prober.single(
            EventSpec::new(
                format!("dimm_power:sensor={dimm}"),
                "DIMM power, milliwatts.",
                Accessor::DimmPower,
            )
            .subvariant(dimm),
            dev,
        )?;
        prober.group(
            vec![
                EventSpec::new(
                    format!("dimm_temperature:sensor={dimm}"),
                    "DIMM temperature, millidegrees Celsius.",
                    Accessor::DimmThermal,
                )
                .variant(DimmThermalField::Temperature)
                .subvariant(dimm),
                EventSpec::new(
                    format!("dimm_thermal_sensor:sensor={dimm}"),
                    "DIMM thermal sensor reading, raw.",
                    Accessor::DimmThermal,
                )
                .variant(DimmThermalField::Sensor)
                .subvariant(dimm),
            ],
            dev,
        )?;
    }
    Ok(())
}
