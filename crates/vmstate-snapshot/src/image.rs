use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{self, BufReader, Cursor, Read, Write};
use std::path::{Path, PathBuf};

use crate::error::{Result, VmstateError};
use crate::format::{
    SectionId, TargetArch, SECTION_HEADER_LEN, SECTION_VERSION_V1, VMSTATE_ENDIANNESS_LITTLE,
    VMSTATE_HEADER_LEN, VMSTATE_MAGIC, VMSTATE_VERSION_V1,
};
use crate::io::{ReadLeExt, WriteLeExt};
use crate::types::{NetDevicesSection, VcpuStatesSection};

// The vmstate file holds structural metadata only (the guest RAM image is a
// separate artifact), so anything near this bound is corrupt.
const MAX_VMSTATE_LEN: u64 = 256 * 1024 * 1024;

/// A fully materialized snapshot: header fields plus every section, in file
/// order. Loading never leaves anything behind in the source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotImage {
    pub version: u16,
    pub arch: TargetArch,
    pub sections: Vec<Section>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub id: SectionId,
    pub version: u16,
    pub flags: u16,
    pub body: SectionBody,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SectionBody {
    VcpuStates(VcpuStatesSection),
    NetDevices(NetDevicesSection),
    /// A section this crate does not understand, preserved byte-for-byte.
    Opaque(Vec<u8>),
}

impl SnapshotImage {
    pub fn section(&self, id: SectionId) -> Option<&Section> {
        self.sections.iter().find(|section| section.id == id)
    }

    pub fn vcpu_states(&self) -> Option<&VcpuStatesSection> {
        self.sections.iter().find_map(|section| match &section.body {
            SectionBody::VcpuStates(states) => Some(states),
            _ => None,
        })
    }

    pub fn vcpu_states_mut(&mut self) -> Option<&mut VcpuStatesSection> {
        self.sections
            .iter_mut()
            .find_map(|section| match &mut section.body {
                SectionBody::VcpuStates(states) => Some(states),
                _ => None,
            })
    }

    pub fn net_devices(&self) -> Option<&NetDevicesSection> {
        self.sections.iter().find_map(|section| match &section.body {
            SectionBody::NetDevices(devices) => Some(devices),
            _ => None,
        })
    }

    pub fn net_devices_mut(&mut self) -> Option<&mut NetDevicesSection> {
        self.sections
            .iter_mut()
            .find_map(|section| match &mut section.body {
                SectionBody::NetDevices(devices) => Some(devices),
                _ => None,
            })
    }
}

pub fn read_image<R: Read>(r: &mut R) -> Result<SnapshotImage> {
    let mut header = [0u8; VMSTATE_HEADER_LEN];
    if let Err(e) = r.read_exact(&mut header) {
        return Err(if e.kind() == io::ErrorKind::UnexpectedEof {
            VmstateError::Corrupt("file too short for vmstate header")
        } else {
            VmstateError::Io(e)
        });
    }

    let mut h = Cursor::new(&header[..]);
    let mut magic = [0u8; 8];
    h.read_exact(&mut magic)?;
    if &magic != VMSTATE_MAGIC {
        return Err(VmstateError::InvalidMagic);
    }
    let version = h.read_u16_le()?;
    if version != VMSTATE_VERSION_V1 {
        return Err(VmstateError::UnsupportedVersion(version));
    }
    let endianness = h.read_u8()?;
    if endianness != VMSTATE_ENDIANNESS_LITTLE {
        return Err(VmstateError::InvalidEndianness(endianness));
    }
    let arch_tag = h.read_u8()?;
    let arch = TargetArch::from_tag(arch_tag).ok_or(VmstateError::UnknownArch(arch_tag))?;
    let _reserved = h.read_u32_le()?;
    let payload_len = h.read_u64_le()?;
    let declared_crc = h.read_u32_le()?;
    let _reserved = h.read_u32_le()?;

    if payload_len > MAX_VMSTATE_LEN {
        return Err(VmstateError::Corrupt(
            "declared payload length is implausibly large",
        ));
    }

    let mut payload = Vec::new();
    r.take(MAX_VMSTATE_LEN + 1).read_to_end(&mut payload)?;
    if payload.len() as u64 != payload_len {
        return Err(VmstateError::PayloadLenMismatch {
            declared: payload_len,
            actual: payload.len() as u64,
        });
    }

    let actual_crc = crc32fast::hash(&payload);
    if actual_crc != declared_crc {
        return Err(VmstateError::ChecksumMismatch {
            declared: declared_crc,
            actual: actual_crc,
        });
    }

    let sections = split_sections(&payload)?;
    tracing::debug!(sections = sections.len(), arch = %arch, "vmstate parsed");

    Ok(SnapshotImage {
        version,
        arch,
        sections,
    })
}

fn split_sections(payload: &[u8]) -> Result<Vec<Section>> {
    let total = payload.len() as u64;
    let mut r = Cursor::new(payload);
    let mut sections = Vec::new();

    while r.position() < total {
        if total - r.position() < SECTION_HEADER_LEN {
            return Err(VmstateError::Corrupt("truncated section header"));
        }
        let id = SectionId(r.read_u32_le()?);
        let version = r.read_u16_le()?;
        let flags = r.read_u16_le()?;
        let len = r.read_u64_le()?;

        let start = r.position();
        if total - start < len {
            return Err(VmstateError::Corrupt(
                "section payload extends past end of file",
            ));
        }
        let end = start + len;
        let start: usize = start
            .try_into()
            .map_err(|_| VmstateError::Corrupt("section offset overflow"))?;
        let end: usize = end
            .try_into()
            .map_err(|_| VmstateError::Corrupt("section offset overflow"))?;

        let body = decode_section_body(id, version, &payload[start..end])?;
        sections.push(Section {
            id,
            version,
            flags,
            body,
        });
        r.set_position(end as u64);
    }

    Ok(sections)
}

fn decode_section_body(id: SectionId, version: u16, bytes: &[u8]) -> Result<SectionBody> {
    match id {
        id if id == SectionId::VCPU_STATES => {
            if version != SECTION_VERSION_V1 {
                return Err(VmstateError::Corrupt(
                    "unsupported vcpu-states section version",
                ));
            }
            let mut r = Cursor::new(bytes);
            let states = VcpuStatesSection::decode(&mut r)
                .map_err(|e| section_truncated(e, "vcpu-states section is truncated"))?;
            if r.position() as usize != bytes.len() {
                return Err(VmstateError::Corrupt(
                    "trailing bytes in vcpu-states section",
                ));
            }
            Ok(SectionBody::VcpuStates(states))
        }
        id if id == SectionId::VM_STATE => {
            if version != SECTION_VERSION_V1 {
                return Err(VmstateError::Corrupt("unsupported vm-state section version"));
            }
            let mut r = Cursor::new(bytes);
            let devices = NetDevicesSection::decode(&mut r)
                .map_err(|e| section_truncated(e, "vm-state section is truncated"))?;
            if r.position() as usize != bytes.len() {
                return Err(VmstateError::Corrupt("trailing bytes in vm-state section"));
            }
            Ok(SectionBody::NetDevices(devices))
        }
        _ => Ok(SectionBody::Opaque(bytes.to_vec())),
    }
}

// An EOF inside an in-memory section slice means its internal structure
// disagrees with the declared section length.
fn section_truncated(err: VmstateError, msg: &'static str) -> VmstateError {
    match err {
        VmstateError::Io(ref io_err) if io_err.kind() == io::ErrorKind::UnexpectedEof => {
            VmstateError::Corrupt(msg)
        }
        other => other,
    }
}

pub fn write_image<W: Write>(w: &mut W, image: &SnapshotImage) -> Result<()> {
    let mut payload = Vec::new();
    for section in &image.sections {
        encode_section(&mut payload, section)?;
    }

    w.write_bytes(VMSTATE_MAGIC)?;
    w.write_u16_le(image.version)?;
    w.write_u8(VMSTATE_ENDIANNESS_LITTLE)?;
    w.write_u8(image.arch.tag())?;
    w.write_u32_le(0)?; // reserved
    w.write_u64_le(payload.len() as u64)?;
    w.write_u32_le(crc32fast::hash(&payload))?;
    w.write_u32_le(0)?; // reserved
    w.write_bytes(&payload)?;
    Ok(())
}

fn encode_section(w: &mut Vec<u8>, section: &Section) -> Result<()> {
    let mut payload = Vec::new();
    match &section.body {
        SectionBody::VcpuStates(states) => states.encode(&mut payload)?,
        SectionBody::NetDevices(devices) => devices.encode(&mut payload)?,
        SectionBody::Opaque(bytes) => payload.extend_from_slice(bytes),
    }

    w.write_u32_le(section.id.0)?;
    w.write_u16_le(section.version)?;
    w.write_u16_le(section.flags)?;
    w.write_u64_le(payload.len() as u64)?;
    w.write_bytes(&payload)?;
    Ok(())
}

pub fn load_vmstate(path: &Path) -> Result<SnapshotImage> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    let image = read_image(&mut reader)?;
    tracing::debug!(path = %path.display(), "vmstate loaded");
    Ok(image)
}

/// Serializes `image` and atomically replaces `path` with the result. The
/// previous file at `path` (including the loaded input, when editing in
/// place) stays intact until the new bytes are durably on disk.
pub fn save_vmstate(image: &SnapshotImage, path: &Path) -> Result<()> {
    let mut encoded = Vec::new();
    write_image(&mut encoded, image)?;

    // Stage in the same directory so the final rename cannot cross
    // filesystems.
    let tmp_path = tmp_path_for(path);
    let result = write_and_rename(&tmp_path, path, &encoded);
    if result.is_err() {
        let _ = fs::remove_file(&tmp_path);
    }
    result?;

    tracing::debug!(path = %path.display(), bytes = encoded.len(), "vmstate written");
    Ok(())
}

fn write_and_rename(tmp_path: &Path, path: &Path, bytes: &[u8]) -> Result<()> {
    let mut tmp = File::create(tmp_path)?;
    tmp.write_all(bytes)?;
    tmp.sync_all()?;
    drop(tmp);
    fs::rename(tmp_path, path)?;
    Ok(())
}

fn tmp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(OsString::from)
        .unwrap_or_else(|| OsString::from("vmstate"));
    name.push(".tmp");
    path.with_file_name(name)
}
