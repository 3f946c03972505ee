// -*- coding: utf-8 -*-

use std::fmt;

/// Sync frame marker byte.
pub const SYNC: u8 = 0xFF;

/// Value names, indexed by the firmware debug id.
pub const NAMES: [&str; 8] = [
    "moisture",
    "valve",
    "sys_state",
    "link_state",
    "link_errors",
    "link_last_error",
    "min_stack",
    "uptime",
];

const SYS_STATES: [&str; 6] = ["hold", "settle", "measure", "opening", "watering", "closing"];
const LINK_STATES: [&str; 5] = ["locked", "unlocking", "idle", "reporting", "backoff"];
const LINK_ERRORS: [&str; 10] = [
    "none",
    "busy",
    "invalid-op",
    "null-program",
    "overrun",
    "invalid-register",
    "no-register",
    "bounds",
    "exit-failure",
    "transfer",
];

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct Frame {
    pub id: u8,
    pub value: u16,
}

impl Frame {
    pub fn name(&self) -> &'static str {
        NAMES.get(self.id as usize).copied().unwrap_or("unknown")
    }
}

fn lookup(table: &[&'static str], value: u16) -> Option<&'static str> {
    table.get(value as usize).copied()
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let v = self.value;
        let text = match self.id {
            1 => Some(if v == 0 { "closed" } else { "open" }),
            2 => lookup(&SYS_STATES, v),
            3 => lookup(&LINK_STATES, v),
            5 if v == 0xFF => Some("stall"),
            5 => lookup(&LINK_ERRORS, v),
            _ => None,
        };
        match text {
            Some(text) => write!(f, "{}={}", self.name(), text),
            None => write!(f, "{}={}", self.name(), v),
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Event {
    /// End of one round over all values.
    Sync,
    Value(Frame),
}

/// Stream decoder for `[id, lo, hi]` frames.
#[derive(Default, Debug)]
pub struct Decoder {
    synced: bool,
    sync_bytes: u8,
    buf: [u8; 3],
    len: usize,
}

impl Decoder {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn is_synced(&self) -> bool {
        self.synced
    }

    fn lose_sync(&mut self) {
        self.synced = false;
        self.sync_bytes = 0;
        self.len = 0;
    }

    pub fn feed(&mut self, byte: u8) -> Option<Event> {
        if !self.synced {
            // Wait for a sync frame followed by the first frame of a round.
            if byte == SYNC {
                self.sync_bytes = self.sync_bytes.saturating_add(1);
                return None;
            }
            let had_sync = self.sync_bytes >= 3;
            self.sync_bytes = 0;
            if !had_sync {
                return None;
            }
            self.synced = true;
            self.len = 0;
        }

        self.buf[self.len] = byte;
        self.len += 1;
        if self.len < self.buf.len() {
            return None;
        }
        self.len = 0;

        let [id, lo, hi] = self.buf;
        if id == SYNC {
            if lo == SYNC && hi == SYNC {
                return Some(Event::Sync);
            }
            self.lose_sync();
            return None;
        }
        if id as usize >= NAMES.len() {
            self.lose_sync();
            return None;
        }
        Some(Event::Value(Frame {
            id,
            value: u16::from_le_bytes([lo, hi]),
        }))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn decode(decoder: &mut Decoder, bytes: &[u8]) -> Vec<Event> {
        bytes.iter().filter_map(|&b| decoder.feed(b)).collect()
    }

    #[test]
    fn test_startup() {
        let mut d = Decoder::new();
        // Garbage, the kickoff byte, then a round.
        let ev = decode(
            &mut d,
            &[0x12, 0x34, 0xFF, 0, 0x00, 0x02, 1, 1, 0, 0xFF, 0xFF, 0xFF],
        );
        assert!(ev.is_empty());
        assert!(!d.is_synced());

        let ev = decode(&mut d, &[0, 0xEE, 0x02, 0xFF, 0xFF, 0xFF]);
        assert_eq!(
            ev,
            [
                Event::Value(Frame {
                    id: 0,
                    value: 0x2EE
                }),
                Event::Sync
            ]
        );
        assert!(d.is_synced());
    }

    #[test]
    fn test_values_with_sync_bytes() {
        let mut d = Decoder::new();
        decode(&mut d, &[0xFF, 0xFF, 0xFF]);
        // min_stack = 0xFFFF directly before the sync frame.
        let ev = decode(&mut d, &[6, 0xFF, 0xFF, 7, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF]);
        assert_eq!(
            ev,
            [
                Event::Value(Frame {
                    id: 6,
                    value: 0xFFFF
                }),
                Event::Value(Frame {
                    id: 7,
                    value: 0xFFFF
                }),
                Event::Sync,
            ]
        );
    }

    #[test]
    fn test_resync() {
        let mut d = Decoder::new();
        decode(&mut d, &[0xFF, 0xFF, 0xFF]);
        // A dropped byte shifts the frames until a broken sync frame shows up.
        let ev = decode(&mut d, &[0, 0x01, 1, 0, 0, 0xFF, 0xFF, 0xFF, 2, 3, 0]);
        assert_eq!(ev.len(), 2);
        assert!(!d.is_synced());
        let ev = decode(&mut d, &[0xFF, 0xFF, 0xFF, 2, 3, 0]);
        assert_eq!(ev.last(), Some(&Event::Value(Frame { id: 2, value: 3 })));
        assert!(d.is_synced());
    }

    #[test]
    fn test_display() {
        let f = |id, value| Frame { id, value }.to_string();
        assert_eq!(f(0, 512), "moisture=512");
        assert_eq!(f(1, 1), "valve=open");
        assert_eq!(f(2, 4), "sys_state=watering");
        assert_eq!(f(3, 2), "link_state=idle");
        assert_eq!(f(5, 9), "link_last_error=transfer");
        assert_eq!(f(5, 0xFF), "link_last_error=stall");
        assert_eq!(f(2, 99), "sys_state=99");
    }
}

// vim: ts=4 sw=4 expandtab
