//==================================================
// File: object/format.rs
//==================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Segment object codec
// Objective: Encode and decode segment objects as a magic tag, a version and a bincode payload
//==================================================

use std::io::{Read, Write};

use thiserror::Error;

use super::SegmentObject;
use crate::SolvraError;

#[derive(Debug, Error)]
pub enum ObjectError {
    #[error("invalid segment magic")]
    InvalidMagic,
    #[error("unsupported segment version {0}")]
    UnsupportedVersion(u16),
    #[error("io error: {0}")]
    Io(String),
    #[error("malformed segment payload: {0}")]
    Payload(String),
}

impl From<std::io::Error> for ObjectError {
    fn from(err: std::io::Error) -> Self {
        ObjectError::Io(err.to_string())
    }
}

impl From<ObjectError> for SolvraError {
    fn from(err: ObjectError) -> Self {
        SolvraError::Bytecode(err.to_string())
    }
}

impl SegmentObject {
    const MAGIC: &'static [u8; 4] = b"SVSG";
    const VERSION: u16 = 1;

    pub fn encode<W: Write>(&self, mut writer: W) -> Result<(), ObjectError> {
        writer.write_all(Self::MAGIC)?;
        writer.write_all(&Self::VERSION.to_le_bytes())?;
        let payload =
            bincode::serialize(self).map_err(|err| ObjectError::Payload(err.to_string()))?;
        writer.write_all(&(payload.len() as u32).to_le_bytes())?;
        writer.write_all(&payload)?;
        Ok(())
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, ObjectError> {
        let mut buf = Vec::new();
        self.encode(&mut buf)?;
        Ok(buf)
    }

    pub fn decode<R: Read>(mut reader: R) -> Result<Self, ObjectError> {
        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic)?;
        if &magic != Self::MAGIC {
            return Err(ObjectError::InvalidMagic);
        }

        let mut version_bytes = [0u8; 2];
        reader.read_exact(&mut version_bytes)?;
        let version = u16::from_le_bytes(version_bytes);
        if version != Self::VERSION {
            return Err(ObjectError::UnsupportedVersion(version));
        }

        let mut len_bytes = [0u8; 4];
        reader.read_exact(&mut len_bytes)?;
        let len = u32::from_le_bytes(len_bytes) as usize;
        let mut payload = vec![0u8; len];
        reader.read_exact(&mut payload)?;
        bincode::deserialize(&payload).map_err(|err| ObjectError::Payload(err.to_string()))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ObjectError> {
        Self::decode(bytes)
    }
}


//==================================================
// End of file
//==================================================
