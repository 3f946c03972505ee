// -*- coding: utf-8 -*-
// SPDX-License-Identifier: Apache-2.0 OR MIT

use crate::{
    Error,
    interp::{Interp, Step},
    isa::Transaction,
    regs::Registers,
    xfer::{Channel, Engine, Pump},
};

/// Sequencer run state.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum State {
    Idle,
    Busy,
}

/// Successful outcome of a submission or of a transfer completion.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Status {
    /// A transfer is running.
    /// The program continues from the channel interrupt.
    Pending,
    /// The program has ended without error.
    Finished,
}

/// Transaction program sequencer.
///
/// Owns the [Channel] and `MEM` bytes of transfer memory.
/// One program runs at a time.
pub struct Sequencer<'a, C, const MEM: usize> {
    state: State,
    interp: Interp<'a>,
    engine: Engine<'a, C, MEM>,
    /// Channel error count at submission.
    err_base: u16,
    result: Option<Result<(), Error>>,
}

impl<'a, C: Channel, const MEM: usize> Sequencer<'a, C, MEM> {
    pub const fn new(chan: C) -> Self {
        Self {
            state: State::Idle,
            interp: Interp::new(),
            engine: Engine::new(chan),
            err_base: 0,
            result: None,
        }
    }

    /// Submit a program and run it up to the first transfer.
    ///
    /// `count` is the number of instructions to execute.
    ///
    /// Returns [Error::Busy] without touching anything,
    /// if a program is still running.
    /// Any other error ends the program and returns the sequencer to idle.
    pub fn submit(&mut self, program: &'a [Transaction<'a>], count: i16) -> Result<Status, Error> {
        if self.state == State::Busy {
            return Err(Error::Busy);
        }

        self.state = State::Busy;
        self.err_base = self.engine.chan().error_count();
        self.result = None;
        self.interp.start(program, count);

        let res = self.interp.run(&mut self.engine);
        self.settle(res)
    }

    /// Channel interrupt entry. `rx` is the byte that was just received.
    ///
    /// Returns `None` as long as the running transfer has bytes left
    /// and for events without an armed transfer.
    /// At the end of a transfer the program continues and its outcome is returned.
    pub fn transfer_irq(&mut self, rx: u8) -> Option<Result<Status, Error>> {
        match self.engine.pump(rx) {
            Pump::Spurious | Pump::Running => None,
            Pump::Done => {
                let res = if self.engine.chan().error_count() != self.err_base {
                    Err(Error::Transfer)
                } else {
                    self.interp.complete(&self.engine);
                    self.interp.run(&mut self.engine)
                };
                let res = self.settle(res);
                if self.state == State::Idle {
                    self.result = Some(res.map(|_| ()));
                }
                Some(res)
            }
        }
    }

    fn settle(&mut self, res: Result<Step, Error>) -> Result<Status, Error> {
        match res {
            Ok(Step::Pending) => Ok(Status::Pending),
            Ok(Step::Continue | Step::Finished) => {
                self.state = State::Idle;
                Ok(Status::Finished)
            }
            Err(e) => {
                self.state = State::Idle;
                Err(e)
            }
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn is_busy(&self) -> bool {
        self.state == State::Busy
    }

    /// Outcome of the last program that ended in interrupt context.
    pub fn take_result(&mut self) -> Option<Result<(), Error>> {
        self.result.take()
    }

    pub fn registers(&self) -> &Registers {
        self.interp.regs()
    }

    /// Preset the registers for the next program. Not available while a program runs.
    pub fn registers_mut(&mut self) -> Option<&mut Registers> {
        match self.state {
            State::Idle => Some(self.interp.regs_mut()),
            State::Busy => None,
        }
    }

    /// Transfer memory. Not available while a program runs.
    pub fn memory(&self) -> Option<&[u8]> {
        match self.state {
            State::Idle => Some(self.engine.mem()),
            State::Busy => None,
        }
    }

    /// Mutable transfer memory. Not available while a program runs.
    pub fn memory_mut(&mut self) -> Option<&mut [u8]> {
        match self.state {
            State::Idle => Some(self.engine.mem_mut()),
            State::Busy => None,
        }
    }

    pub fn channel(&self) -> &C {
        self.engine.chan()
    }

    pub fn channel_mut(&mut self) -> &mut C {
        self.engine.chan_mut()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        isa::{Dst, Op, Src},
        regs::Reg,
        xfer::mock::MockChannel,
    };

    type TestSeq<'a> = Sequencer<'a, MockChannel, 32>;

    /// Clock all bytes until the program ends.
    fn finish(seq: &mut TestSeq<'_>) -> Result<Status, Error> {
        loop {
            let rx = seq.channel_mut().shift();
            match seq.transfer_irq(rx) {
                None | Some(Ok(Status::Pending)) => (),
                Some(res) => return res,
            }
        }
    }

    fn snapshot(seq: &TestSeq<'_>) -> (State, usize, i32, Option<(usize, i32)>, Registers) {
        (
            seq.state(),
            seq.interp.position(),
            seq.interp.remaining(),
            seq.interp.return_point(),
            *seq.registers(),
        )
    }

    #[test]
    fn test_sync_program() {
        let prog = [
            Transaction::ld_imm(Reg::A, 10),
            Transaction::add(Reg::A, -1),
            Transaction::ld_imm(Reg::B, 0x1234),
            Transaction::unlock(Reg::B),
        ];
        let mut seq = TestSeq::new(MockChannel::default());
        assert_eq!(seq.submit(&prog, 4), Ok(Status::Finished));
        assert_eq!(seq.state(), State::Idle);
        assert_eq!(seq.interp.remaining(), 0);
        assert_eq!(seq.registers().get(Reg::A), 9);
        assert_eq!(seq.registers().get(Reg::B), 0x3512);
        assert_eq!(seq.channel().starts, 0);
        assert_eq!(seq.take_result(), None);
    }

    #[test]
    fn test_unlock_values() {
        for (value, expect) in [(0x1234, 0x3512), (0x00FF, 0x0000), (0x00AB, 0xAC00)] {
            let prog = [
                Transaction::ld_imm(Reg::A, value),
                Transaction::unlock(Reg::A),
            ];
            let mut seq = TestSeq::new(MockChannel::default());
            assert_eq!(seq.submit(&prog, 2), Ok(Status::Finished));
            assert_eq!(seq.registers().get(Reg::A), expect);
        }
    }

    #[test]
    fn test_busy_rejected() {
        let prog = [
            Transaction::ld_imm(Reg::A, 5),
            Transaction::transfer(Src::Bytes(&[1, 2]), Dst::None, 2),
            Transaction::add(Reg::A, 1),
        ];
        let other = [Transaction::ld_imm(Reg::A, 99)];
        let mut seq = TestSeq::new(MockChannel::default());
        assert_eq!(seq.submit(&prog, 3), Ok(Status::Pending));
        assert!(seq.is_busy());

        let before = snapshot(&seq);
        assert_eq!(seq.submit(&other, 1), Err(Error::Busy));
        assert_eq!(snapshot(&seq), before);
        assert_eq!(seq.channel().starts, 1);
        assert!(seq.memory().is_none());
        assert!(seq.memory_mut().is_none());
        assert!(seq.registers_mut().is_none());

        assert_eq!(finish(&mut seq), Ok(Status::Finished));
        assert_eq!(seq.registers().get(Reg::A), 6);
        assert_eq!(seq.channel().sent, [1, 2]);
        assert_eq!(seq.take_result(), Some(Ok(())));
        assert_eq!(seq.take_result(), None);

        assert_eq!(seq.submit(&other, 1), Ok(Status::Finished));
        assert_eq!(seq.registers().get(Reg::A), 99);
    }

    #[test]
    fn test_preset_registers() {
        let prog = [
            Transaction::add(Reg::A, 1),
            Transaction::add(Reg::B, -1),
            Transaction::jnz(Reg::B, -2),
        ];
        let mut seq = TestSeq::new(MockChannel::default());
        if let Some(regs) = seq.registers_mut() {
            regs.set(Reg::B, 4);
        }
        assert_eq!(seq.submit(&prog, 3), Ok(Status::Finished));
        assert_eq!(seq.registers().get(Reg::A), 4);
        assert_eq!(seq.registers().get(Reg::B), 0);
    }

    #[test]
    fn test_branch_return() {
        let sub = [Transaction::add(Reg::A, 1)];
        let prog = [
            Transaction::b(&sub),
            Transaction::add(Reg::A, 100),
            Transaction::add(Reg::A, 1000),
        ];
        let mut seq = TestSeq::new(MockChannel::default());
        assert_eq!(seq.submit(&prog, 3), Ok(Status::Finished));
        assert_eq!(seq.registers().get(Reg::A), 1101);
        assert_eq!(seq.interp.return_point(), None);
    }

    #[test]
    fn test_nested_branch_overwrites_return() {
        let inner = [Transaction::add(Reg::A, 1)];
        let outer = [Transaction::b(&inner), Transaction::add(Reg::A, 10)];
        let prog = [Transaction::b(&outer), Transaction::add(Reg::A, 100)];
        let mut seq = TestSeq::new(MockChannel::default());
        // The outer return point is lost. The main program does not resume.
        assert_eq!(seq.submit(&prog, 2), Ok(Status::Finished));
        assert_eq!(seq.registers().get(Reg::A), 11);
    }

    #[test]
    fn test_branch_shorter_count() {
        let sub = [
            Transaction::add(Reg::A, 1),
            Transaction::add(Reg::A, 2),
            Transaction::add(Reg::A, 4),
        ];
        let prog = [
            Transaction::new(Op::B, Src::Target(&sub), Dst::None, 2, None),
            Transaction::add(Reg::A, 8),
        ];
        let mut seq = TestSeq::new(MockChannel::default());
        assert_eq!(seq.submit(&prog, 2), Ok(Status::Finished));
        assert_eq!(seq.registers().get(Reg::A), 11);
    }

    #[test]
    fn test_exit_sentinels() {
        let prog = [
            Transaction::add(Reg::A, 1),
            Transaction::exit_ok(),
            Transaction::add(Reg::A, 1),
        ];
        let mut seq = TestSeq::new(MockChannel::default());
        assert_eq!(seq.submit(&prog, 3), Ok(Status::Finished));
        assert_eq!(seq.registers().get(Reg::A), 1);

        let prog = [
            Transaction::add(Reg::A, 1),
            Transaction::exit_err(),
            Transaction::add(Reg::A, 1),
        ];
        assert_eq!(seq.submit(&prog, 3), Err(Error::ExitFailure));
        assert_eq!(seq.state(), State::Idle);
        assert_eq!(seq.registers().get(Reg::A), 2);
    }

    #[test]
    fn test_exit_from_branch() {
        let sub = [Transaction::exit_ok()];
        let prog = [Transaction::b(&sub), Transaction::add(Reg::A, 1)];
        let mut seq = TestSeq::new(MockChannel::default());
        assert_eq!(seq.submit(&prog, 2), Ok(Status::Finished));
        assert_eq!(seq.registers().get(Reg::A), 0);

        // The stale return point does not leak into the next program.
        let next = [Transaction::add(Reg::B, 1)];
        assert_eq!(seq.submit(&next, 1), Ok(Status::Finished));
        assert_eq!(seq.registers().get(Reg::A), 0);
        assert_eq!(seq.registers().get(Reg::B), 1);
    }

    #[test]
    fn test_invalid_kind() {
        let prog = [
            Transaction::add(Reg::A, 1),
            Transaction::raw(99, Src::None, Dst::None, 0, None),
            Transaction::add(Reg::A, 1),
        ];
        let mut seq = TestSeq::new(MockChannel::default());
        assert_eq!(seq.submit(&prog, 3), Err(Error::InvalidOp(99)));
        assert_eq!(seq.state(), State::Idle);
        assert_eq!(seq.registers().get(Reg::A), 1);
        assert_eq!(seq.interp.position(), 1);
        assert_eq!(seq.interp.remaining(), 2);
    }

    #[test]
    fn test_null_program() {
        let prog = [Transaction::new(Op::B, Src::None, Dst::None, 1, None)];
        let mut seq = TestSeq::new(MockChannel::default());
        assert_eq!(seq.submit(&prog, 1), Err(Error::NullProgram));
        assert_eq!(seq.state(), State::Idle);
    }

    #[test]
    fn test_spurious_irq() {
        let mut seq = TestSeq::new(MockChannel::default());
        assert_eq!(seq.transfer_irq(0x42), None);
        assert_eq!(seq.state(), State::Idle);

        let prog = [Transaction::ld_imm(Reg::A, 7)];
        assert_eq!(seq.submit(&prog, 1), Ok(Status::Finished));
        let before = snapshot(&seq);
        assert_eq!(seq.transfer_irq(0x42), None);
        assert_eq!(snapshot(&seq), before);
        assert_eq!(seq.memory(), Some(&[0; 32][..]));
    }

    #[test]
    fn test_async_loads() {
        let prog = [
            Transaction::ld_spi(Reg::A),
            Transaction::lds_spi(Reg::B),
            Transaction::ld_spi_mem(4),
            Transaction::add(Reg::B, 1),
        ];
        let replies = [
            0x78, 0x56, 0x34, 0x12, // A
            0xCD, 0xAB, // B
            1, 2, 3, 4, // memory
        ];
        let mut seq = TestSeq::new(MockChannel::with_replies(&replies));
        assert_eq!(seq.submit(&prog, 4), Ok(Status::Pending));
        assert_eq!(finish(&mut seq), Ok(Status::Finished));
        assert_eq!(seq.registers().get(Reg::A), 0x1234_5678);
        assert_eq!(seq.registers().get(Reg::B), 0xABCE);
        assert_eq!(seq.memory().map(|m| &m[4..8]), Some(&[1, 2, 3, 4][..]));
        assert_eq!(seq.channel().sent, [0; 10]);
        assert_eq!(seq.channel().starts, 3);
    }

    #[test]
    fn test_half_load_clears_upper() {
        let prog = [
            Transaction::ld_imm(Reg::A, 0xFFFF_FFFF),
            Transaction::lds_spi(Reg::A),
        ];
        let mut seq = TestSeq::new(MockChannel::with_replies(&[0x34, 0x12]));
        assert_eq!(seq.submit(&prog, 2), Ok(Status::Pending));
        assert_eq!(finish(&mut seq), Ok(Status::Finished));
        assert_eq!(seq.registers().get(Reg::A), 0x1234);
    }

    #[test]
    fn test_async_stores() {
        let prog = [
            Transaction::ld_imm(Reg::A, 0xAABB_CCDD),
            Transaction::sto_spi(Reg::A),
            Transaction::stos_spi(Reg::A),
        ];
        let mut seq = TestSeq::new(MockChannel::default());
        assert_eq!(seq.submit(&prog, 3), Ok(Status::Pending));
        assert_eq!(finish(&mut seq), Ok(Status::Finished));
        assert_eq!(seq.channel().sent, [0xDD, 0xCC, 0xBB, 0xAA, 0xDD, 0xCC]);
        assert_eq!(seq.registers().get(Reg::A), 0xAABB_CCDD);
    }

    #[test]
    fn test_select_toggle() {
        let prog = [
            Transaction::select(),
            Transaction::transfer_sel(Src::Bytes(&[0x9F]), Dst::Mem(0), 1),
            Transaction::select(),
        ];
        let mut seq = TestSeq::new(MockChannel::with_replies(&[0xEE]));
        assert_eq!(seq.submit(&prog, 3), Ok(Status::Pending));
        assert_eq!(seq.channel().toggles, 2);
        assert_eq!(finish(&mut seq), Ok(Status::Finished));
        assert_eq!(seq.channel().toggles, 3);
        assert_eq!(seq.memory().map(|m| m[0]), Some(0xEE));
    }

    #[test]
    fn test_transfer_offset_loop() {
        // Clock out a 6 byte table in 2 byte steps, indexed by A.
        let table = [1, 2, 3, 4, 5, 6];
        let prog = [
            Transaction::ld_imm(Reg::A, 0),
            Transaction::ld_imm(Reg::B, 3),
            Transaction::transfer_at(Src::Bytes(&table), Dst::Mem(0), 2, Reg::A),
            Transaction::add(Reg::A, 2),
            Transaction::add(Reg::B, -1),
            Transaction::jnz(Reg::B, -3),
            Transaction::exit_ok(),
        ];
        let replies = [11, 12, 13, 14, 15, 16];
        let mut seq = TestSeq::new(MockChannel::with_replies(&replies));
        assert_eq!(seq.submit(&prog, 7), Ok(Status::Pending));
        assert_eq!(finish(&mut seq), Ok(Status::Finished));
        assert_eq!(seq.channel().sent, table);
        assert_eq!(seq.channel().starts, 3);
        assert_eq!(seq.memory().map(|m| &m[..6]), Some(&replies[..]));
        assert_eq!(seq.registers().get(Reg::A), 6);
    }

    #[test]
    fn test_transfer_bounds() {
        let prog = [
            Transaction::ld_imm(Reg::A, 31),
            Transaction::transfer_at(Src::None, Dst::Mem(0), 2, Reg::A),
        ];
        let mut seq = TestSeq::new(MockChannel::default());
        assert_eq!(seq.submit(&prog, 2), Err(Error::Bounds));
        assert_eq!(seq.state(), State::Idle);
        assert_eq!(seq.channel().starts, 0);

        let prog = [Transaction::transfer(Src::Bytes(&[1, 2]), Dst::None, 3)];
        assert_eq!(seq.submit(&prog, 1), Err(Error::Bounds));
    }

    #[test]
    fn test_transfer_offset_upper_bits() {
        // Offsets beyond 16 bits must not wrap into the buffers.
        let table = [1, 2, 3, 4];
        for prog in [
            [
                Transaction::ld_imm(Reg::A, 0x0001_0000),
                Transaction::transfer_at(Src::Bytes(&table), Dst::None, 1, Reg::A),
            ],
            [
                Transaction::ld_imm(Reg::A, 0x0001_0000),
                Transaction::transfer_at(Src::None, Dst::Mem(0), 1, Reg::A),
            ],
            [
                Transaction::ld_imm(Reg::A, u32::MAX),
                Transaction::transfer_at(Src::Mem(4), Dst::None, 1, Reg::A),
            ],
        ] {
            let mut seq = TestSeq::new(MockChannel::default());
            assert_eq!(seq.submit(&prog, 2), Err(Error::Bounds));
            assert_eq!(seq.state(), State::Idle);
            assert_eq!(seq.channel().starts, 0);
        }
    }

    #[test]
    fn test_select_untouched_on_bounds() {
        let prog = [
            Transaction::ld_imm(Reg::A, 40),
            Transaction::new(Op::TransferSel, Src::None, Dst::Mem(0), 1, Some(Reg::A)),
        ];
        let mut seq = TestSeq::new(MockChannel::default());
        assert_eq!(seq.submit(&prog, 2), Err(Error::Bounds));
        assert_eq!(seq.channel().toggles, 0);
        assert_eq!(seq.channel().starts, 0);

        let prog = [Transaction::transfer_sel(Src::Bytes(&[1]), Dst::None, 2)];
        assert_eq!(seq.submit(&prog, 1), Err(Error::Bounds));
        assert_eq!(seq.channel().toggles, 0);
    }

    #[test]
    fn test_transfer_error() {
        let prog = [
            Transaction::transfer(Src::Bytes(&[1, 2, 3]), Dst::None, 3),
            Transaction::add(Reg::A, 1),
        ];
        let mut chan = MockChannel::default();
        chan.errors = 5;
        let mut seq = TestSeq::new(chan);
        assert_eq!(seq.submit(&prog, 2), Ok(Status::Pending));

        let rx = seq.channel_mut().shift();
        assert_eq!(seq.transfer_irq(rx), None);
        seq.channel_mut().errors += 1;
        assert_eq!(finish(&mut seq), Err(Error::Transfer));
        assert_eq!(seq.state(), State::Idle);
        assert_eq!(seq.registers().get(Reg::A), 0);
        assert_eq!(seq.take_result(), Some(Err(Error::Transfer)));

        // Errors from before the submission do not count.
        assert_eq!(seq.submit(&prog, 2), Ok(Status::Pending));
        assert_eq!(finish(&mut seq), Ok(Status::Finished));
        assert_eq!(seq.registers().get(Reg::A), 1);
    }

    #[test]
    fn test_error_after_resume() {
        let prog = [
            Transaction::ld_spi(Reg::A),
            Transaction::ldr(Reg::B, Reg::A),
            Transaction::new(Op::Ldr, Src::Reg(5), Dst::None, 0, Some(Reg::B)),
        ];
        let mut seq = TestSeq::new(MockChannel::with_replies(&[1, 0, 0, 0]));
        assert_eq!(seq.submit(&prog, 3), Ok(Status::Pending));
        assert_eq!(finish(&mut seq), Err(Error::InvalidRegister(5)));
        assert_eq!(seq.registers().get(Reg::B), 1);
        assert_eq!(seq.take_result(), Some(Err(Error::InvalidRegister(5))));
        assert_eq!(seq.state(), State::Idle);
    }

    #[test]
    fn test_branch_async_return() {
        let sub = [
            Transaction::transfer(Src::Bytes(&[0x5A]), Dst::None, 1),
            Transaction::add(Reg::A, 1),
        ];
        let prog = [
            Transaction::b(&sub),
            Transaction::add(Reg::A, 10),
            Transaction::raw(200, Src::None, Dst::None, 0, None),
        ];
        let mut seq = TestSeq::new(MockChannel::default());
        assert_eq!(seq.submit(&prog, 3), Ok(Status::Pending));
        assert_eq!(seq.interp.return_point(), Some((0, 2)));

        assert_eq!(finish(&mut seq), Err(Error::InvalidOp(200)));
        assert_eq!(seq.channel().sent, [0x5A]);
        assert_eq!(seq.registers().get(Reg::A), 11);
        assert_eq!(seq.interp.return_point(), None);
        assert_eq!(seq.state(), State::Idle);
        assert_eq!(seq.take_result(), Some(Err(Error::InvalidOp(200))));
    }

    #[test]
    fn test_branch_async_return_finishes() {
        let sub = [
            Transaction::ld_spi(Reg::B),
            Transaction::add(Reg::B, 1),
        ];
        let prog = [
            Transaction::b(&sub),
            Transaction::add(Reg::A, 10),
        ];
        let mut seq = TestSeq::new(MockChannel::with_replies(&[0x10, 0, 0, 0]));
        assert_eq!(seq.submit(&prog, 2), Ok(Status::Pending));
        assert_eq!(finish(&mut seq), Ok(Status::Finished));
        assert_eq!(seq.registers().get(Reg::A), 10);
        assert_eq!(seq.registers().get(Reg::B), 0x11);
        assert_eq!(seq.state(), State::Idle);
    }
}

// vim: ts=4 sw=4 expandtab
