// Licensed under the Apache-2.0 license

//! End-to-end bootloader transactions against the simulated peripheral and a
//! RAM page store. Runs unchanged on the host or on a board with a console.

use embedded_io::Write;

use crate::common::NoOpLogger;
use crate::i2c::common::{BusCondition, TwiConfig, WriteState};
use crate::i2c::sim::SimTwi;
use crate::i2c::twi_slave::TwiSlave;
use crate::prog::{ExitFlag, MemoryPageStore, PageBuffer};

const MEMORY: usize = 256;
const PAGE: usize = 32;

type SimBuffer = PageBuffer<MemoryPageStore<MEMORY>, PAGE>;
type SimSlave<'a> = TwiSlave<SimTwi, SimBuffer, &'a ExitFlag, NoOpLogger>;

pub fn run_twi_slave_tests<W: Write>(out: &mut W) {
    let _ = writeln!(out, "\r\n=== TWI Slave Tests ===\r");

    test_page_write(out);
    test_exit_request(out);
    test_read_back(out);
    test_reinitialize(out);
    test_bus_error_recovery(out);

    let _ = writeln!(out, "\r\n=== All TWI Slave Tests Passed ===\r");
}

fn start(exit: &ExitFlag) -> Option<SimSlave<'_>> {
    TwiSlave::initialize(
        SimTwi::new(),
        SimBuffer::new(MemoryPageStore::new()),
        exit,
        TwiConfig::default(),
        NoOpLogger,
    )
    .ok()
}

fn drive(slave: &mut SimSlave<'_>, condition: BusCondition, data: u8) {
    slave.hardware_mut().raise(condition, data);
    slave.on_bus_event();
    assert!(!slave.hardware().is_pending());
}

fn host_write(slave: &mut SimSlave<'_>, bytes: &[u8]) {
    drive(slave, BusCondition::AddressMatchWrite, 0);
    for &byte in bytes {
        drive(slave, BusCondition::DataReceivedAck, byte);
    }
    drive(slave, BusCondition::StopOrRestart, 0);
}

fn test_page_write<W: Write>(out: &mut W) {
    let _ = write!(out, "Testing page write... ");

    let exit = ExitFlag::new();
    let Some(mut slave) = start(&exit) else {
        let _ = writeln!(out, "FAILED (init)\r");
        return;
    };

    host_write(&mut slave, &[0x00, 0x10, 0xAB, 0xCD]);

    assert_eq!(slave.target_address().value(), 0x0010);
    let store = slave.buffer().store();
    assert_eq!(store.pages_written(), 1);
    assert_eq!(store.contents().get(0x10..0x12), Some(&[0xAB, 0xCD][..]));
    assert_eq!(store.contents().get(0x12), Some(&0xFF));
    assert!(!exit.is_requested());

    let _ = writeln!(out, "PASSED\r");
}

fn test_exit_request<W: Write>(out: &mut W) {
    let _ = write!(out, "Testing exit request... ");

    let exit = ExitFlag::new();
    let Some(mut slave) = start(&exit) else {
        let _ = writeln!(out, "FAILED (init)\r");
        return;
    };

    host_write(&mut slave, &[0xFF, 0xFF]);

    assert!(slave.target_address().is_exit_request());
    assert!(exit.take());
    assert_eq!(slave.buffer().store().pages_written(), 0);

    let _ = writeln!(out, "PASSED\r");
}

fn test_read_back<W: Write>(out: &mut W) {
    let _ = write!(out, "Testing read back... ");

    let exit = ExitFlag::new();
    let Some(mut slave) = start(&exit) else {
        let _ = writeln!(out, "FAILED (init)\r");
        return;
    };

    host_write(&mut slave, &[0x00, 0x40, 0x11, 0x22, 0x33]);

    // Select the address again, then repeated start into a read.
    drive(&mut slave, BusCondition::AddressMatchWrite, 0);
    drive(&mut slave, BusCondition::DataReceivedAck, 0x00);
    drive(&mut slave, BusCondition::DataReceivedAck, 0x40);
    drive(&mut slave, BusCondition::StopOrRestart, 0);
    drive(&mut slave, BusCondition::AddressMatchRead, 0);
    assert_eq!(slave.hardware().last_transmitted(), Some(0x11));
    drive(&mut slave, BusCondition::DataTransmittedAck, 0);
    assert_eq!(slave.hardware().last_transmitted(), Some(0x22));
    drive(&mut slave, BusCondition::DataTransmittedAck, 0);
    assert_eq!(slave.hardware().last_transmitted(), Some(0x33));
    drive(&mut slave, BusCondition::DataTransmittedNack, 0);

    let _ = writeln!(out, "PASSED\r");
}

fn test_reinitialize<W: Write>(out: &mut W) {
    let _ = write!(out, "Testing shutdown and re-initialize... ");

    let exit = ExitFlag::new();
    let (Some(mut used), Some(fresh)) = (start(&exit), start(&exit)) else {
        let _ = writeln!(out, "FAILED (init)\r");
        return;
    };

    host_write(&mut used, &[0x00, 0x20, 0x5A]);
    let parts = used.shutdown();
    assert!(!parts.hardware.registers().powered);

    let Ok(again) = TwiSlave::initialize(
        parts.hardware,
        parts.buffer,
        parts.control,
        TwiConfig::default(),
        parts.logger,
    ) else {
        let _ = writeln!(out, "FAILED (re-init)\r");
        return;
    };

    assert_eq!(again.hardware().registers(), fresh.hardware().registers());
    assert_eq!(again.write_state(), WriteState::AwaitingAddressHighByte);
    assert_eq!(again.buffer().store().contents().get(0x20), Some(&0x5A));

    let _ = writeln!(out, "PASSED\r");
}

fn test_bus_error_recovery<W: Write>(out: &mut W) {
    let _ = write!(out, "Testing bus error handling... ");

    let exit = ExitFlag::new();
    let Some(mut slave) = start(&exit) else {
        let _ = writeln!(out, "FAILED (init)\r");
        return;
    };

    drive(&mut slave, BusCondition::AddressMatchWrite, 0);
    drive(&mut slave, BusCondition::DataReceivedAck, 0x00);
    drive(&mut slave, BusCondition::BusError, 0);
    assert_eq!(slave.hardware().stop_requests(), 1);
    assert_eq!(slave.diagnostics().bus_errors, 1);
    assert_eq!(slave.write_state(), WriteState::AwaitingAddressLowByte);

    // The host retries from the start; the next address match resynchronizes.
    host_write(&mut slave, &[0x00, 0x60, 0x99]);
    assert_eq!(slave.buffer().store().contents().get(0x60), Some(&0x99));

    let _ = writeln!(out, "PASSED\r");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Console {
        text: Vec<u8>,
    }

    impl embedded_io::ErrorType for Console {
        type Error = core::convert::Infallible;
    }

    impl embedded_io::Write for Console {
        fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
            self.text.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> Result<(), Self::Error> {
            Ok(())
        }
    }

    #[test]
    fn test_functional_suite_on_host() {
        let mut console = Console::default();
        run_twi_slave_tests(&mut console);

        let text = String::from_utf8(console.text).unwrap();
        assert_eq!(text.matches("PASSED\r\n").count(), 5);
        assert!(!text.contains("FAILED"));
        assert!(text.contains("=== All TWI Slave Tests Passed ==="));
    }
}
