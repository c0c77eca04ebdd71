// Copyright 2024 RisingLight Project Authors. Licensed under Apache-2.0.

use super::{StorageResult, TracedStorageError};

/// Checksum algorithm of a block.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[repr(i32)]
pub enum ChecksumType {
    #[default]
    None = 0,
    Crc32 = 1,
}

impl TryFrom<i32> for ChecksumType {
    type Error = TracedStorageError;

    fn try_from(value: i32) -> StorageResult<Self> {
        match value {
            0 => Ok(Self::None),
            1 => Ok(Self::Crc32),
            _ => Err(TracedStorageError::decode("expected valid checksum type")),
        }
    }
}

pub fn build_checksum(checksum_type: ChecksumType, block_data: &[u8]) -> u64 {
    match checksum_type {
        ChecksumType::None => 0,
        ChecksumType::Crc32 => crc32fast::hash(block_data) as u64,
    }
}

pub fn verify_checksum(
    checksum_type: ChecksumType,
    block_data: &[u8],
    checksum: u64,
) -> StorageResult<()> {
    match checksum_type {
        ChecksumType::None => Ok(()),
        ChecksumType::Crc32 => {
            let found = crc32fast::hash(block_data) as u64;
            if found != checksum {
                return Err(TracedStorageError::checksum(found, checksum));
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crc32_roundtrip() {
        let data = b"fast table block";
        let checksum = build_checksum(ChecksumType::Crc32, data);
        verify_checksum(ChecksumType::Crc32, data, checksum).unwrap();
        assert!(verify_checksum(ChecksumType::Crc32, b"corrupted block", checksum).is_err());
        assert_eq!(build_checksum(ChecksumType::None, data), 0);
    }
}
