// -*- coding: utf-8 -*-

use crate::decode::{Decoder, Event};
use anyhow::{self as ah, Context as _};
use std::{io::Read as _, sync::mpsc, time::Duration};

pub fn run_serial(port: &str, baud: u32, notify_tx: &mpsc::Sender<Event>) -> ah::Result<()> {
    let mut serial = serialport::new(port, baud)
        .data_bits(serialport::DataBits::Eight)
        .parity(serialport::Parity::None)
        .flow_control(serialport::FlowControl::None)
        .stop_bits(serialport::StopBits::One)
        .timeout(Duration::from_millis(500))
        .open()
        .context("Open serial port")?;

    let mut decoder = Decoder::new();
    let mut buf = [0_u8; 64];
    loop {
        let count = match serial.read(&mut buf) {
            Ok(count) => count,
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => continue,
            Err(e) => return Err(e).context("Serial port read"),
        };
        for &byte in &buf[..count] {
            if let Some(event) = decoder.feed(byte) {
                notify_tx.send(event).context("Event channel")?;
            }
        }
    }
}

// vim: ts=4 sw=4 expandtab
