mod common;

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use common::{feed, shared_bus, Log};
use twi_bus::{Direction, Directive, Error, Event, TransferError};

const TARGET: u8 = 0x29;

const WRITE_DONE: [Event; 3] = [
    Event::Start,
    Event::AddressAck(Direction::Write),
    Event::DataAck(Direction::Write),
];

fn starts(log: &Arc<Mutex<Log>>) -> usize {
    log.lock().unwrap().count(Directive::Start)
}

/// Lets the other thread run until it has requested `n` starts in total.
fn wait_for_starts(log: &Arc<Mutex<Log>>, n: usize) {
    while starts(log) < n {
        thread::sleep(Duration::from_millis(1));
    }
}

#[test]
fn initiate_blocks_while_a_transaction_is_in_flight() {
    let (bus, log) = shared_bus();

    bus.initiate_write(TARGET, &[0x01]).unwrap();

    thread::scope(|s| {
        let second = s.spawn(|| bus.initiate_write(TARGET, &[0x02]));

        thread::sleep(Duration::from_millis(50));
        assert!(!second.is_finished());
        assert_eq!(starts(&log), 1);

        feed(&bus, &WRITE_DONE);

        assert_eq!(second.join().unwrap(), Ok(()));
    });

    assert!(bus.is_busy());
    assert_eq!(starts(&log), 2);
    assert_eq!(log.lock().unwrap().count(Directive::Stop), 1);
}

#[test]
fn transfer_returns_received_bytes() {
    let (bus, log) = shared_bus();
    log.lock().unwrap().incoming.extend([0xAB, 0xCD]);

    thread::scope(|s| {
        let transfer = s.spawn(|| {
            let mut buf = [0u8; 2];
            bus.transfer(TARGET, &[0x10], &mut buf).map(|()| buf)
        });

        wait_for_starts(&log, 1);
        feed(
            &bus,
            &[
                Event::Start,
                Event::AddressAck(Direction::Write),
                Event::DataAck(Direction::Write),
                Event::RepeatedStart,
                Event::AddressAck(Direction::Read),
                Event::DataAck(Direction::Read),
                Event::DataNack(Direction::Read),
            ],
        );

        assert_eq!(transfer.join().unwrap(), Ok([0xAB, 0xCD]));
    });

    assert!(!bus.is_busy());
}

#[test]
fn transfer_reports_address_nack() {
    let (bus, log) = shared_bus();

    thread::scope(|s| {
        let transfer = s.spawn(|| bus.transfer(TARGET, &[0x10], &mut []));

        wait_for_starts(&log, 1);
        for _ in 0..3 {
            feed(&bus, &[Event::Start, Event::AddressNack(Direction::Write)]);
        }

        assert_eq!(
            transfer.join().unwrap(),
            Err(Error::Transfer(TransferError::AddressNotAcknowledged))
        );
    });
}

#[test]
fn transfer_rejects_invalid_request_without_waiting() {
    let (bus, log) = shared_bus();

    bus.initiate_write(TARGET, &[0x01]).unwrap();

    // Refused up front even though the bus is busy.
    assert_eq!(
        bus.transfer(0x00, &[], &mut [0u8; 1]),
        Err(Error::Request(twi_bus::RequestError::GeneralCallRead))
    );
    assert_eq!(starts(&log), 1);
}
