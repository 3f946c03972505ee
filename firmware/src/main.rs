// -*- coding: utf-8 -*-
// SPDX-License-Identifier: Apache-2.0 OR MIT

#![no_std]
#![no_main]
#![feature(abi_avr_interrupt)]
#![feature(asm_experimental_arch)]

mod analog;
mod debug;
mod history;
mod hw;
#[cfg(feature = "link")]
mod link;
mod mon;
mod ports;
#[cfg(feature = "link")]
mod spi;
mod stepper;
mod system;
mod timer;
#[cfg(feature = "debug")]
mod usart;

use crate::{
    analog::AdcPeriph,
    debug::debug_init,
    hw::{mcu, wdt_init, wdt_poke},
    ports::{PortB, PortC, PortD},
    system::System,
};
use avr_context::{InitCtx, IrqCtx, MainCtx};

static SYSTEM: System = System::new();

#[allow(non_snake_case)]
#[allow(dead_code)]
struct InitPeripherals {
    ADC: mcu::ADC,
    PORTB: mcu::PORTB,
    PORTC: mcu::PORTC,
    PORTD: mcu::PORTD,
    SPI: mcu::SPI,
    TC1: mcu::TC1,
    USART0: mcu::USART0,
    WDT: mcu::WDT,
}

#[allow(non_snake_case)]
struct MainPeripherals {
    ap: AdcPeriph,
    WDT: mcu::WDT,
}

/// Initialization routine before main loop.
/// This function runs with interrupts disabled.
fn init(c: &InitCtx<'_>, dp: InitPeripherals) -> MainPeripherals {
    wdt_init();

    ports::PORTB.init(c, PortB { PORTB: dp.PORTB });
    ports::PORTC.init(c, PortC { PORTC: dp.PORTC });
    ports::PORTD.init(c, PortD { PORTD: dp.PORTD });
    ports::PORTB.setup(c);
    ports::PORTC.setup(c);
    ports::PORTD.setup(c);

    timer::DP.init(c, timer::Dp { TC1: dp.TC1 });
    timer::DP.setup(c);

    #[cfg(feature = "debug")]
    {
        usart::DP.init(c, usart::Dp { USART0: dp.USART0 });
        usart::DP.setup(c);
    }
    debug_init(c);

    #[cfg(feature = "link")]
    {
        spi::DP.init(c, spi::Dp { SPI: dp.SPI });
        spi::DP.setup(c);
    }

    let ap = AdcPeriph { ADC: dp.ADC };
    SYSTEM.init(c, &ap);

    MainPeripherals { ap, WDT: dp.WDT }
}

/// Main program loop; With interrupts enabled.
fn main_loop(m: &MainCtx<'_>, dp: MainPeripherals) -> ! {
    loop {
        SYSTEM.run(m, &dp.ap);
        wdt_poke(&dp.WDT);
    }
}

avr_context::define_main! {
    device: atmega328p,
    main: main_loop,
    enable_interrupts: true,
    init: init(ctx, InitPeripherals { ADC, PORTB, PORTC, PORTD, SPI, TC1, USART0, WDT }) -> MainPeripherals,
}

#[cfg(feature = "link")]
fn spi_stc_isr(c: &IrqCtx<'_>) {
    link::irq_handler_spi_stc(c);
}

#[cfg(feature = "link")]
avr_context::define_isr! {
    device: atmega328p,
    interrupt: SPI_STC,
    isr: spi_stc_isr,
}

#[cfg(feature = "debug")]
fn usart_tx_isr(c: &IrqCtx<'_>) {
    usart::irq_handler_usart_tx(c);
}

#[cfg(feature = "debug")]
avr_context::define_isr! {
    device: atmega328p,
    interrupt: USART_TX,
    isr: usart_tx_isr,
}

// vim: ts=4 sw=4 expandtab
