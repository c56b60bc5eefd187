//! Device-independent events.

use crate::error::Result;
use crate::event::accessor::VersionField;
use crate::event::{Accessor, EventSpec};

use super::Prober;

pub(super) fn probe(prober: &mut Prober<'_>) -> Result<()> {
    prober.group(
        vec![
            EventSpec::new("lib_version_major", "Vendor library major version.", Accessor::LibVersion)
                .variant(VersionField::Major)
                .system(),
            EventSpec::new("lib_version_minor", "Vendor library minor version.", Accessor::LibVersion)
                .variant(VersionField::Minor)
                .system(),
            EventSpec::new("lib_version_release", "Vendor library release number.", Accessor::LibVersion)
                .variant(VersionField::Release)
                .system(),
            EventSpec::new(
                "lib_version_build_hash",
                "djb2 hash of the vendor library build string.",
                Accessor::LibVersion,
            )
            .variant(VersionField::BuildHash)
            .system(),
        ],
        None,
    )?;

    if !cfg!(feature = "cpu") || prober.registry().cpu_count() == 0 {
        return Ok(());
    }

    prober.single(
        EventSpec::new("threads_per_core", "Hardware threads per CPU core.", Accessor::ThreadsPerCore).system(),
        None,
    )?;
    prober.single(
        EventSpec::new("cpu_family", "CPU family identifier.", Accessor::CpuFamily).system(),
        None,
    )?;
    prober.single(
        EventSpec::new("cpu_model", "CPU model identifier.", Accessor::CpuModel).system(),
        None,
    )?;
    Ok(())
}
