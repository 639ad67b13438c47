/*
 * Copyright (c) Peter Bjorklund. All rights reserved. https://github.com/piot/lockstep-rust
 * Licensed under the MIT License. See LICENSE in the project root for license information.
 */
use crate::ChunkIndex;
use err_rs::{ErrorLevel, ErrorLevelProvider};
use std::fmt;

#[derive(Debug)]
pub enum BlobError {
    InvalidChunkIndex(ChunkIndex, ChunkIndex),
    UnexpectedChunkSize(usize, usize, ChunkIndex),
    RedundantContentDiffers(ChunkIndex),
    OutOfBounds,
    NoActiveTransfer,
}

impl fmt::Display for BlobError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidChunkIndex(index, count) => {
                write!(f, "invalid chunk index {index} (count {count})")
            }
            Self::UnexpectedChunkSize(expected, received, index) => write!(
                f,
                "unexpected chunk size {received}, expected {expected} for chunk {index}"
            ),
            Self::RedundantContentDiffers(index) => {
                write!(f, "chunk {index} was resent with different contents")
            }
            Self::OutOfBounds => write!(f, "chunk payload out of bounds"),
            Self::NoActiveTransfer => write!(f, "chunk received outside any transfer"),
        }
    }
}

impl ErrorLevelProvider for BlobError {
    fn error_level(&self) -> ErrorLevel {
        match self {
            Self::InvalidChunkIndex(..) | Self::UnexpectedChunkSize(..) => ErrorLevel::Warning,
            Self::RedundantContentDiffers(_) | Self::NoActiveTransfer => ErrorLevel::Warning,
            Self::OutOfBounds => ErrorLevel::Critical,
        }
    }
}

#[derive(Debug)]
pub enum OutStreamError {
    BlobIsTooLarge(usize),
    AckIndexOutOfRange(ChunkIndex, ChunkIndex),
}

impl fmt::Display for OutStreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BlobIsTooLarge(octet_count) => {
                write!(f, "blob of {octet_count} octets is too large")
            }
            Self::AckIndexOutOfRange(index, count) => {
                write!(f, "ack index {index} out of range (count {count})")
            }
        }
    }
}

impl ErrorLevelProvider for OutStreamError {
    fn error_level(&self) -> ErrorLevel {
        match self {
            Self::BlobIsTooLarge(_) => ErrorLevel::Critical,
            Self::AckIndexOutOfRange(..) => ErrorLevel::Warning,
        }
    }
}
