/*
 * Copyright (c) Peter Bjorklund. All rights reserved. https://github.com/piot/lockstep-rust
 * Licensed under the MIT License. See LICENSE in the project root for license information.
 */
use datagram_chunker::DatagramChunkerError;
use err_rs::{ErrorLevel, ErrorLevelProvider};
use lockstep_server_logic::err::ServerLogicError;
use std::io;

#[derive(Debug)]
pub enum ServerError {
    ConnectionIndexOutOfRange { index: u8, max: usize },
    UnknownConnection(u8),
    IoError(io::Error),
    LogicError(ServerLogicError),
    DatagramChunkerError(DatagramChunkerError),
}

impl ErrorLevelProvider for ServerError {
    fn error_level(&self) -> ErrorLevel {
        match self {
            Self::ConnectionIndexOutOfRange { .. } | Self::UnknownConnection(_) => {
                ErrorLevel::Warning
            }
            Self::IoError(_) | Self::DatagramChunkerError(_) => ErrorLevel::Critical,
            Self::LogicError(err) => err.error_level(),
        }
    }
}

impl From<io::Error> for ServerError {
    fn from(err: io::Error) -> Self {
        Self::IoError(err)
    }
}

impl From<ServerLogicError> for ServerError {
    fn from(err: ServerLogicError) -> Self {
        Self::LogicError(err)
    }
}

impl From<DatagramChunkerError> for ServerError {
    fn from(err: DatagramChunkerError) -> Self {
        Self::DatagramChunkerError(err)
    }
}
