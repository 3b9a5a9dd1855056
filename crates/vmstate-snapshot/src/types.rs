use std::collections::HashSet;
use std::fmt;
use std::io::{Read, Write};
use std::num::ParseIntError;
use std::str::FromStr;

use crate::error::{Result, VmstateError};
use crate::io::{ReadLeExt, WriteLeExt};

// Decode-time guards against absurd counts in hostile inputs. Real snapshots
// sit far below all of these.
const MAX_VCPUS: usize = 4096;
const MAX_REGS_PER_VCPU: usize = 64 * 1024;
const MAX_NET_DEVICES: usize = 4096;
const MAX_DEVICE_ID_LEN: usize = 64;
const MAX_DEVICE_EXTRA_LEN: usize = 1024 * 1024;

/// Architecture-specific 64-bit register identifier: an AArch64 system
/// register encoding or an x86 MSR index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RegisterId(pub u64);

impl fmt::Display for RegisterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

impl FromStr for RegisterId {
    type Err = ParseIntError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let digits = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .unwrap_or(s);
        u64::from_str_radix(digits, 16).map(RegisterId)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterEntry {
    pub id: RegisterId,
    /// Register value, widened to the largest supported register width.
    pub value: u128,
}

/// One vCPU's register file. Entry order is whatever the producer wrote and
/// is preserved across edits.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VcpuRegisterBank {
    pub regs: Vec<RegisterEntry>,
}

impl VcpuRegisterBank {
    fn encode<W: Write>(&self, w: &mut W) -> Result<()> {
        let count: u32 = self
            .regs
            .len()
            .try_into()
            .map_err(|_| VmstateError::Corrupt("too many registers in one bank"))?;
        w.write_u32_le(count)?;
        for reg in &self.regs {
            w.write_u64_le(reg.id.0)?;
            w.write_u128_le(reg.value)?;
        }
        Ok(())
    }

    fn decode<R: Read>(r: &mut R, vcpu: usize) -> Result<Self> {
        let count = r.read_u32_le()? as usize;
        if count > MAX_REGS_PER_VCPU {
            return Err(VmstateError::Corrupt("register bank too large"));
        }
        let mut regs = Vec::with_capacity(count.min(64));
        let mut seen = HashSet::with_capacity(count.min(64));
        for _ in 0..count {
            let id = RegisterId(r.read_u64_le()?);
            let value = r.read_u128_le()?;
            if !seen.insert(id) {
                return Err(VmstateError::DuplicateRegisterId { vcpu, id });
            }
            regs.push(RegisterEntry { id, value });
        }
        Ok(Self { regs })
    }
}

/// The `vcpu-states` section: one register bank per vCPU, bank index equals
/// vCPU index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VcpuStatesSection {
    pub banks: Vec<VcpuRegisterBank>,
}

impl VcpuStatesSection {
    pub fn encode<W: Write>(&self, w: &mut W) -> Result<()> {
        let count: u32 = self
            .banks
            .len()
            .try_into()
            .map_err(|_| VmstateError::Corrupt("too many vcpus"))?;
        w.write_u32_le(count)?;
        for bank in &self.banks {
            bank.encode(w)?;
        }
        Ok(())
    }

    pub fn decode<R: Read>(r: &mut R) -> Result<Self> {
        let count = r.read_u32_le()? as usize;
        if count > MAX_VCPUS {
            return Err(VmstateError::Corrupt("vcpu count too large"));
        }
        let mut banks = Vec::with_capacity(count.min(64));
        for vcpu in 0..count {
            banks.push(VcpuRegisterBank::decode(r, vcpu)?);
        }
        Ok(Self { banks })
    }
}

/// One network device record. Everything past the tap name (MAC, queue
/// parameters, ...) is carried as an opaque blob and re-emitted verbatim.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NetDeviceState {
    pub device_id: String,
    pub tap_name: String,
    pub extra: Vec<u8>,
}

impl NetDeviceState {
    fn encode<W: Write>(&self, w: &mut W) -> Result<()> {
        w.write_string_u32(&self.device_id)?;
        w.write_tap_name(&self.tap_name)?;
        w.write_len_prefixed_bytes_u32(&self.extra)?;
        Ok(())
    }

    fn decode<R: Read>(r: &mut R) -> Result<Self> {
        let device_id = r.read_string_u32(MAX_DEVICE_ID_LEN)?;
        let tap_name = r.read_tap_name()?;
        let extra = r.read_len_prefixed_bytes_u32(MAX_DEVICE_EXTRA_LEN)?;
        Ok(Self {
            device_id,
            tap_name,
            extra,
        })
    }
}

/// The `vm-state` section: the device records, currently network devices.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NetDevicesSection {
    pub devices: Vec<NetDeviceState>,
}

impl NetDevicesSection {
    pub fn encode<W: Write>(&self, w: &mut W) -> Result<()> {
        let count: u32 = self
            .devices
            .len()
            .try_into()
            .map_err(|_| VmstateError::Corrupt("too many network devices"))?;
        w.write_u32_le(count)?;
        for device in &self.devices {
            device.encode(w)?;
        }
        Ok(())
    }

    pub fn decode<R: Read>(r: &mut R) -> Result<Self> {
        let count = r.read_u32_le()? as usize;
        if count > MAX_NET_DEVICES {
            return Err(VmstateError::Corrupt("network device count too large"));
        }
        let mut devices: Vec<NetDeviceState> = Vec::with_capacity(count.min(64));
        for _ in 0..count {
            let device = NetDeviceState::decode(r)?;
            if devices.iter().any(|d| d.device_id == device.device_id) {
                return Err(VmstateError::DuplicateDeviceId(device.device_id));
            }
            devices.push(device);
        }
        Ok(Self { devices })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn register_id_parses_hex_with_and_without_prefix() {
        let id: RegisterId = "0x603000000013c000".parse().unwrap();
        assert_eq!(id, RegisterId(0x6030_0000_0013_c000));
        let id: RegisterId = "603000000013C000".parse().unwrap();
        assert_eq!(id, RegisterId(0x6030_0000_0013_c000));
        assert!("not-hex".parse::<RegisterId>().is_err());
    }

    #[test]
    fn register_id_displays_as_lowercase_hex() {
        assert_eq!(
            RegisterId(0x6030_0000_0013_C000).to_string(),
            "0x603000000013c000"
        );
    }

    #[test]
    fn duplicate_register_id_fails_decode() {
        let mut raw = Vec::new();
        raw.write_u32_le(2).unwrap();
        for _ in 0..2 {
            raw.write_u64_le(0x10).unwrap();
            raw.write_u128_le(0).unwrap();
        }
        let err = VcpuRegisterBank::decode(&mut Cursor::new(raw), 3).unwrap_err();
        assert!(matches!(
            err,
            VmstateError::DuplicateRegisterId {
                vcpu: 3,
                id: RegisterId(0x10)
            }
        ));
    }

    #[test]
    fn duplicate_device_id_fails_decode() {
        let device = NetDeviceState {
            device_id: "eth0".to_string(),
            tap_name: "vmtap0".to_string(),
            extra: Vec::new(),
        };
        let section = NetDevicesSection {
            devices: vec![device.clone(), device],
        };
        let mut raw = Vec::new();
        section.encode(&mut raw).unwrap();
        let err = NetDevicesSection::decode(&mut Cursor::new(raw)).unwrap_err();
        assert!(matches!(err, VmstateError::DuplicateDeviceId(id) if id == "eth0"));
    }
}
