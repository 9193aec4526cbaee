//! libpcap injection (`--features pcap`).

use super::{SendPolicy, Transmit, frame::FrameWriter};
use crate::{error::ResourceError, link::LinkEndpoints};
use pcap::{Active, Capture};
use pingtide_common::DestinationAddress;
use std::io;

const SNAPLEN: i32 = 1024;
const TIMEOUT_MS: i32 = 30_000;

pub struct Pcap {
    capture: Capture<Active>,
    writer: FrameWriter,
}

impl Pcap {
    pub fn open(link: &LinkEndpoints, policy: SendPolicy) -> Result<Self, ResourceError> {
        let capture = Capture::from_device(link.interface.as_str())
            .and_then(|capture| {
                capture
                    .snaplen(SNAPLEN)
                    .promisc(false)
                    .timeout(TIMEOUT_MS)
                    .open()
            })
            .map_err(|error| ResourceError::Open {
                what: "pcap handle",
                source: io::Error::other(error),
            })?;

        info!(interface = %link.interface, "opened pcap handle");

        Ok(Self {
            capture,
            writer: FrameWriter::new(link.clone(), policy),
        })
    }
}

impl Transmit for Pcap {
    fn send(&mut self, dst: &DestinationAddress) -> io::Result<()> {
        self.capture
            .sendpacket(self.writer.frame_for(dst))
            .map_err(io::Error::other)
    }
}
