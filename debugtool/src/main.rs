// -*- coding: utf-8 -*-

#![forbid(unsafe_code)]

mod decode;
mod serial;

use crate::{
    decode::{Event, Frame, NAMES},
    serial::run_serial,
};
use anyhow as ah;
use clap::Parser;
use std::{sync::mpsc, thread, time::Duration};

#[derive(Parser, Debug)]
struct Opts {
    /// Serial port device.
    #[arg(default_value = "/dev/ttyUSB0")]
    port: String,

    /// Serial baud rate.
    #[arg(short, long, default_value_t = 19_200)]
    baud: u32,

    /// Print every frame as it arrives instead of one line per round.
    #[arg(short, long)]
    raw: bool,
}

fn print_round(values: &[Option<u16>]) {
    let line: Vec<String> = values
        .iter()
        .enumerate()
        .filter_map(|(id, value)| {
            value.map(|value| {
                Frame {
                    id: id as u8,
                    value,
                }
                .to_string()
            })
        })
        .collect();
    if !line.is_empty() {
        println!("{}", line.join(" "));
    }
}

fn main() -> ah::Result<()> {
    let opts = Opts::parse();

    let (notify_tx, notify_rx) = mpsc::channel();

    thread::scope(|s| {
        s.spawn(|| {
            loop {
                if let Err(e) = run_serial(&opts.port, opts.baud, &notify_tx) {
                    eprintln!("Serial error: {e:?}");
                }
                thread::sleep(Duration::from_millis(5000));
            }
        });

        let mut values = [None; NAMES.len()];
        for event in notify_rx.iter() {
            match event {
                Event::Value(frame) if opts.raw => println!("{frame}"),
                Event::Value(frame) => values[frame.id as usize] = Some(frame.value),
                Event::Sync if opts.raw => println!("--"),
                Event::Sync => print_round(&values),
            }
        }
    });
    Ok(())
}

// vim: ts=4 sw=4 expandtab
