/*
 * Copyright (c) Peter Bjorklund. All rights reserved. https://github.com/piot/lockstep-rust
 * Licensed under the MIT License. See LICENSE in the project root for license information.
 */

/*!
# lockstep-server

Top-level orchestrator of the lockstep server: pumps the datagram transport,
filters reordered datagrams per connection, dispatches decoded commands into
`lockstep-server-logic` and ships the replies back out, batched under the
datagram MTU. The host process drives it by calling [`Server::update`] at tick
cadence.
*/

pub mod err;
pub mod metrics;

use crate::err::ServerError;
use crate::metrics::ServerMetrics;
use datagram_chunker::DatagramChunker;
use err_rs::{ErrorLevel, ErrorLevelProvider};
use flood_rs::prelude::{InOctetStream, OutOctetStream};
use flood_rs::{Deserialize, ReadOctetStream, Serialize, WriteOctetStream};
use hexify::format_hex;
use lockstep_datagram::{MultiDatagramReceiver, MultiDatagramSender, MultiDatagramTransport};
use lockstep_ordered_datagram::{DatagramOrderInError, OrderedIn, OrderedOut};
use lockstep_protocol::prelude::{ClientToServerCommands, ServerToClientCommands};
use lockstep_server_logic::{ServerConfig, ServerLogic};
use log::{debug, trace, warn};
use metricator::{AggregateMetric, MinMaxAvg};
use monotonic_time_rs::Millis;

/// Datagrams drained per update, bounded so a flood can not starve the tick.
pub const MAX_DATAGRAMS_PER_UPDATE: usize = 32;

pub const MAX_DATAGRAM_OCTET_SIZE: usize = 1200;

/// Sequence octet plus the reserved framing octet.
const DATAGRAM_HEADER_OCTET_SIZE: usize = 2;
const RESERVED_OCTET: u8 = 0;
const STATS_LOG_INTERVAL: u64 = 3000;

/// Transport-level session state: per-direction ordered-datagram codecs and
/// the drop statistics they produce.
#[derive(Debug)]
pub struct TransportConnection {
    ordered_in: OrderedIn,
    ordered_out: OrderedOut,
    datagram_drops: AggregateMetric<u16>,
}

impl TransportConnection {
    fn new() -> Self {
        Self {
            ordered_in: OrderedIn::default(),
            ordered_out: OrderedOut::default(),
            datagram_drops: AggregateMetric::new(16).expect("threshold should be ok"),
        }
    }

    #[must_use]
    pub const fn ordered_in(&self) -> &OrderedIn {
        &self.ordered_in
    }

    #[must_use]
    pub fn datagram_drops(&self) -> Option<MinMaxAvg<u16>> {
        self.datagram_drops.values()
    }
}

pub struct Server<TransportT: MultiDatagramTransport> {
    logic: ServerLogic,
    transport: TransportT,
    connections: Vec<Option<TransportConnection>>,
    metrics: ServerMetrics,
    update_count: u64,
}

impl<TransportT: MultiDatagramTransport> Server<TransportT> {
    /// # Errors
    ///
    /// `ServerError` when the configuration exceeds a hard cap.
    pub fn new(
        config: ServerConfig,
        transport: TransportT,
        now: Millis,
    ) -> Result<Self, ServerError> {
        let logic = ServerLogic::new(config)?;
        let capacity = logic.config().max_connection_count;
        Ok(Self {
            logic,
            transport,
            connections: (0..capacity).map(|_| None).collect(),
            metrics: ServerMetrics::new(now),
            update_count: 0,
        })
    }

    #[must_use]
    pub const fn logic(&self) -> &ServerLogic {
        &self.logic
    }

    pub fn logic_mut(&mut self) -> &mut ServerLogic {
        &mut self.logic
    }

    #[must_use]
    pub fn transport_connection(&self, connection_index: u8) -> Option<&TransportConnection> {
        self.connections.get(connection_index as usize)?.as_ref()
    }

    /// Drains up to [`MAX_DATAGRAMS_PER_UPDATE`] datagrams and handles each
    /// one. A failing datagram is logged at its error level and never stops
    /// the pump.
    ///
    /// # Errors
    ///
    /// `ServerError::IoError` when the transport itself fails.
    pub fn update(&mut self, now: Millis) -> Result<(), ServerError> {
        self.update_count += 1;

        let mut buffer = [0u8; MAX_DATAGRAM_OCTET_SIZE];
        for _ in 0..MAX_DATAGRAMS_PER_UPDATE {
            let Some((connection_index, octet_count)) = self.transport.receive_from(&mut buffer)?
            else {
                break;
            };
            let datagram = &buffer[..octet_count];
            self.metrics.receive(datagram);
            if let Err(err) = self.feed(now, connection_index, datagram) {
                match err.error_level() {
                    ErrorLevel::Info => trace!("feed: {err:?}"),
                    ErrorLevel::Warning => warn!("feed: {err:?}"),
                    ErrorLevel::Critical => warn!("feed, internal soft error: {err:?}"),
                }
            }
        }

        self.metrics.update(now);
        if self.update_count % STATS_LOG_INTERVAL == 0 {
            debug!("stats: {}", self.metrics.metrics());
        }

        Ok(())
    }

    /// Routes one inbound datagram: creates the transport connection on first
    /// contact, filters reordered datagrams, decodes and dispatches every
    /// command in the payload and sends the replies.
    ///
    /// # Errors
    ///
    /// `ServerError` for connection indices outside the configured range (no
    /// state is mutated) and for transport failures.
    pub fn feed(
        &mut self,
        now: Millis,
        connection_index: u8,
        datagram: &[u8],
    ) -> Result<(), ServerError> {
        let index = connection_index as usize;
        if index >= self.connections.len() {
            return Err(ServerError::ConnectionIndexOutOfRange {
                index: connection_index,
                max: self.connections.len(),
            });
        }

        trace!(
            "received connection:{} payload:\n{}",
            connection_index,
            format_hex(datagram)
        );

        if self.connections[index].is_none() {
            self.logic.create_connection(connection_index)?;
            self.connections[index] = Some(TransportConnection::new());
            debug!("created transport connection {connection_index}");
        }

        let mut in_stream = InOctetStream::new(datagram);
        {
            let connection = self.connections[index]
                .as_mut()
                .expect("connection was just ensured");
            match connection.ordered_in.read_and_verify(&mut in_stream) {
                Ok(skipped) => {
                    if skipped > 0 {
                        connection.datagram_drops.add(u16::from(skipped));
                    }
                }
                Err(DatagramOrderInError::WrongOrder { expected, received }) => {
                    trace!("dropping reordered datagram, expected {expected} got {received}");
                    return Ok(());
                }
                Err(DatagramOrderInError::IoError(err)) => return Err(err.into()),
            }
        }
        let _reserved = in_stream.read_u8()?;

        let mut replies: Vec<ServerToClientCommands> = Vec::new();
        while !in_stream.has_reached_end() {
            let command = match ClientToServerCommands::deserialize(&mut in_stream) {
                Ok(command) => command,
                Err(err) => {
                    warn!("malformed command from {connection_index}: {err}");
                    break;
                }
            };
            match self.logic.update(connection_index, now, &command) {
                Ok(commands) => replies.extend(commands),
                Err(err) => {
                    match err.error_level() {
                        ErrorLevel::Info => trace!("request failed: {err:?}"),
                        ErrorLevel::Warning => warn!("request refused: {err:?}"),
                        ErrorLevel::Critical => warn!("internal soft error: {err:?}"),
                    }
                    break;
                }
            }
        }

        if replies.is_empty() {
            return Ok(());
        }
        self.send_commands(connection_index, &replies)
    }

    /// Destroys the transport connection and everything hanging off it. The
    /// transport surfaces disconnects out of band, so the host calls this.
    ///
    /// # Errors
    ///
    /// `ServerError::UnknownConnection` when no such connection exists.
    pub fn connection_disconnected(&mut self, connection_index: u8) -> Result<(), ServerError> {
        let index = connection_index as usize;
        let slot = self
            .connections
            .get_mut(index)
            .ok_or(ServerError::UnknownConnection(connection_index))?;
        if slot.take().is_none() {
            return Err(ServerError::UnknownConnection(connection_index));
        }
        debug!("transport connection {connection_index} disconnected");
        self.logic.destroy_connection(connection_index)?;
        Ok(())
    }

    fn send_commands(
        &mut self,
        connection_index: u8,
        commands: &[ServerToClientCommands],
    ) -> Result<(), ServerError> {
        let mut chunker = DatagramChunker::new(MAX_DATAGRAM_OCTET_SIZE - DATAGRAM_HEADER_OCTET_SIZE);
        for command in commands {
            let mut out_stream = OutOctetStream::new();
            command.serialize(&mut out_stream)?;
            chunker.push(out_stream.octets_ref())?;
        }

        let connection = self.connections[connection_index as usize]
            .as_mut()
            .ok_or(ServerError::UnknownConnection(connection_index))?;

        for payload in chunker.finalize() {
            let mut header_stream = OutOctetStream::new();
            connection.ordered_out.to_stream(&mut header_stream)?;
            header_stream.write_u8(RESERVED_OCTET)?;
            header_stream.write(payload.as_slice())?;

            let octets = header_stream.octets_ref();
            trace!(
                "sending to {} payload:\n{}",
                connection_index,
                format_hex(octets)
            );
            self.transport.send_to(connection_index, octets)?;
            self.metrics.send(octets);
            connection.ordered_out.commit();
        }
        Ok(())
    }
}
