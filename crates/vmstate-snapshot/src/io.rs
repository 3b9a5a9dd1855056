use std::io::{Read, Write};

use crate::error::{Result, VmstateError};
use crate::format::TAP_NAME_BUF_LEN;

pub trait WriteLeExt: Write {
    fn write_u8(&mut self, v: u8) -> Result<()> {
        self.write_all(&[v])?;
        Ok(())
    }

    fn write_u16_le(&mut self, v: u16) -> Result<()> {
        self.write_all(&v.to_le_bytes())?;
        Ok(())
    }

    fn write_u32_le(&mut self, v: u32) -> Result<()> {
        self.write_all(&v.to_le_bytes())?;
        Ok(())
    }

    fn write_u64_le(&mut self, v: u64) -> Result<()> {
        self.write_all(&v.to_le_bytes())?;
        Ok(())
    }

    fn write_u128_le(&mut self, v: u128) -> Result<()> {
        self.write_all(&v.to_le_bytes())?;
        Ok(())
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.write_all(bytes)?;
        Ok(())
    }

    fn write_len_prefixed_bytes_u32(&mut self, bytes: &[u8]) -> Result<()> {
        let len: u32 = bytes
            .len()
            .try_into()
            .map_err(|_| VmstateError::Corrupt("length does not fit in u32"))?;
        self.write_u32_le(len)?;
        self.write_bytes(bytes)?;
        Ok(())
    }

    fn write_string_u32(&mut self, s: &str) -> Result<()> {
        self.write_len_prefixed_bytes_u32(s.as_bytes())
    }

    /// Writes `name` into the fixed NUL-padded tap name buffer. The name must
    /// leave room for at least one terminating NUL.
    fn write_tap_name(&mut self, name: &str) -> Result<()> {
        let bytes = name.as_bytes();
        if bytes.len() >= TAP_NAME_BUF_LEN {
            return Err(VmstateError::TapNameTooLong {
                len: bytes.len(),
                max: TAP_NAME_BUF_LEN - 1,
            });
        }
        let mut buf = [0u8; TAP_NAME_BUF_LEN];
        buf[..bytes.len()].copy_from_slice(bytes);
        self.write_bytes(&buf)
    }
}

impl<T: Write + ?Sized> WriteLeExt for T {}

pub trait ReadLeExt: Read {
    fn read_u8(&mut self) -> Result<u8> {
        let mut buf = [0u8; 1];
        self.read_exact(&mut buf)?;
        Ok(buf[0])
    }

    fn read_u16_le(&mut self) -> Result<u16> {
        let mut buf = [0u8; 2];
        self.read_exact(&mut buf)?;
        Ok(u16::from_le_bytes(buf))
    }

    fn read_u32_le(&mut self) -> Result<u32> {
        let mut buf = [0u8; 4];
        self.read_exact(&mut buf)?;
        Ok(u32::from_le_bytes(buf))
    }

    fn read_u64_le(&mut self) -> Result<u64> {
        let mut buf = [0u8; 8];
        self.read_exact(&mut buf)?;
        Ok(u64::from_le_bytes(buf))
    }

    fn read_u128_le(&mut self) -> Result<u128> {
        let mut buf = [0u8; 16];
        self.read_exact(&mut buf)?;
        Ok(u128::from_le_bytes(buf))
    }

    fn read_exact_vec(&mut self, len: usize) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        buf.try_reserve_exact(len)
            .map_err(|_| VmstateError::OutOfMemory { len })?;
        buf.resize(len, 0);
        self.read_exact(&mut buf)?;
        Ok(buf)
    }

    fn read_len_prefixed_bytes_u32(&mut self, max_len: usize) -> Result<Vec<u8>> {
        let len = self.read_u32_le()? as usize;
        if len > max_len {
            return Err(VmstateError::Corrupt("length prefix exceeds field cap"));
        }
        self.read_exact_vec(len)
    }

    fn read_string_u32(&mut self, max_len: usize) -> Result<String> {
        let bytes = self.read_len_prefixed_bytes_u32(max_len)?;
        Ok(String::from_utf8(bytes)?)
    }

    /// Reads the fixed tap name buffer. Requires a NUL terminator and zeroed
    /// padding after it.
    fn read_tap_name(&mut self) -> Result<String> {
        let mut buf = [0u8; TAP_NAME_BUF_LEN];
        self.read_exact(&mut buf)?;
        let nul = buf
            .iter()
            .position(|&b| b == 0)
            .ok_or(VmstateError::Corrupt("tap name buffer is not NUL-terminated"))?;
        if buf[nul..].iter().any(|&b| b != 0) {
            return Err(VmstateError::Corrupt(
                "tap name buffer has nonzero padding after the terminator",
            ));
        }
        Ok(String::from_utf8(buf[..nul].to_vec())?)
    }
}

impl<T: Read + ?Sized> ReadLeExt for T {}
