/*
 * Copyright (c) Peter Bjorklund. All rights reserved. https://github.com/piot/lockstep-rust
 * Licensed under the MIT License. See LICENSE in the project root for license information.
 */
use metricator::RateMetric;
use monotonic_time_rs::Millis;
use std::fmt::Display;

pub struct MetricsInDirection {
    pub datagrams_per_second: f32,
    pub octets_per_second: f32,
}

impl Display for MetricsInDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} datagrams/s {} octets/s",
            self.datagrams_per_second, self.octets_per_second
        )
    }
}

pub struct CombinedMetrics {
    pub outgoing: MetricsInDirection,
    pub incoming: MetricsInDirection,
}

impl Display for CombinedMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "out: {} in: {}", self.outgoing, self.incoming)
    }
}

/// Per-direction datagram and octet rates over a one second window.
pub struct ServerMetrics {
    in_datagrams_per_second: RateMetric,
    in_octets_per_second: RateMetric,
    out_datagrams_per_second: RateMetric,
    out_octets_per_second: RateMetric,
}

impl ServerMetrics {
    pub fn new(now: Millis) -> Self {
        Self {
            in_datagrams_per_second: RateMetric::with_interval(now, 1.0),
            in_octets_per_second: RateMetric::with_interval(now, 1.0),
            out_datagrams_per_second: RateMetric::with_interval(now, 1.0),
            out_octets_per_second: RateMetric::with_interval(now, 1.0),
        }
    }

    pub fn receive(&mut self, datagram: &[u8]) {
        self.in_octets_per_second.add(datagram.len() as u32);
        self.in_datagrams_per_second.add(1);
    }

    pub fn send(&mut self, datagram: &[u8]) {
        self.out_octets_per_second.add(datagram.len() as u32);
        self.out_datagrams_per_second.add(1);
    }

    pub fn update(&mut self, now: Millis) {
        self.in_datagrams_per_second.update(now);
        self.in_octets_per_second.update(now);
        self.out_datagrams_per_second.update(now);
        self.out_octets_per_second.update(now);
    }

    pub fn metrics(&self) -> CombinedMetrics {
        CombinedMetrics {
            outgoing: MetricsInDirection {
                datagrams_per_second: self.out_datagrams_per_second.rate(),
                octets_per_second: self.out_octets_per_second.rate(),
            },
            incoming: MetricsInDirection {
                datagrams_per_second: self.in_datagrams_per_second.rate(),
                octets_per_second: self.in_octets_per_second.rate(),
            },
        }
    }
}
