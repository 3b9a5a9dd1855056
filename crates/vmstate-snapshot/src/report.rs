use crate::error::{Result, VmstateError};
use crate::image::{SectionBody, SnapshotImage};
use crate::types::RegisterEntry;

/// Header summary: format version and target architecture.
pub fn report_version(image: &SnapshotImage) -> String {
    format!(
        "format version: {}\ntarget architecture: {}\n",
        image.version, image.arch
    )
}

/// One line per section, in file order.
pub fn report_sections(image: &SnapshotImage) -> String {
    let mut out = String::new();
    for section in &image.sections {
        let line = match &section.body {
            SectionBody::VcpuStates(states) => format!(
                "{}: v{} ({} vcpus)\n",
                section.id,
                section.version,
                states.banks.len()
            ),
            SectionBody::NetDevices(net) => format!(
                "{}: v{} ({} net devices)\n",
                section.id,
                section.version,
                net.devices.len()
            ),
            SectionBody::Opaque(bytes) => format!(
                "{}: v{} ({} bytes, opaque)\n",
                section.id,
                section.version,
                bytes.len()
            ),
        };
        out.push_str(&line);
    }
    out
}

/// Every register entry, per vCPU in index order, entries sorted by
/// ascending register id. The ordering makes the output stable for textual
/// matching by calling tooling.
pub fn report_vcpu_states(image: &SnapshotImage) -> Result<String> {
    let states = image
        .vcpu_states()
        .ok_or(VmstateError::SectionNotFound("vcpu-states"))?;

    let mut out = String::new();
    for (vcpu, bank) in states.banks.iter().enumerate() {
        out.push_str(&format!("vcpu {vcpu}:\n"));
        let mut entries: Vec<&RegisterEntry> = bank.regs.iter().collect();
        entries.sort_by_key(|reg| reg.id);
        for reg in entries {
            out.push_str(&format!("  {:#x}: {:#034x}\n", reg.id.0, reg.value));
        }
    }
    Ok(out)
}

/// The device records, in record order.
pub fn report_net_state(image: &SnapshotImage) -> Result<String> {
    let net = image
        .net_devices()
        .ok_or(VmstateError::SectionNotFound("vm-state"))?;

    let mut out = String::new();
    for device in &net.devices {
        out.push_str(&format!("net device {}:\n", device.device_id));
        out.push_str(&format!("  tap: {}\n", device.tap_name));
        out.push_str(&format!("  opaque config: {} bytes\n", device.extra.len()));
    }
    Ok(out)
}
