mod common;

use common::{bus, feed, queue_incoming, COMPLETED_AT};
use twi_bus::{
    Direction, Directive, Error, Event, Outcome, RequestError, Role, TransferError,
};

const TARGET: u8 = 0x29;

#[test]
fn initiate_is_busy_until_terminal_event() {
    let (bus, log) = bus();

    bus.initiate_write(TARGET, &[0x01, 0x02]).unwrap();
    assert!(bus.is_busy());
    assert_eq!(log.borrow().last(), Some(Directive::Start));

    feed(
        &bus,
        &[
            Event::Start,
            Event::AddressAck(Direction::Write),
            Event::DataAck(Direction::Write),
        ],
    );
    assert!(bus.is_busy());
    assert_eq!(bus.role(), Role::MasterActive);

    feed(&bus, &[Event::DataAck(Direction::Write)]);
    assert!(!bus.is_busy());
    assert!(bus.last_acknowledged());
    assert_eq!(bus.role(), Role::Idle);

    let log = log.borrow();
    assert_eq!(log.written, vec![TARGET << 1, 0x01, 0x02]);
    assert_eq!(log.last(), Some(Directive::Stop));
    assert_eq!(log.count(Directive::Stop), 1);
}

#[test]
fn every_event_issues_exactly_one_directive() {
    let (bus, log) = bus();

    bus.initiate_write(TARGET, &[0x01]).unwrap();
    let before = log.borrow().directives.len();

    let events = [
        Event::Start,
        Event::AddressAck(Direction::Write),
        Event::DataAck(Direction::Write),
    ];
    feed(&bus, &events);

    assert_eq!(log.borrow().directives.len(), before + events.len());
}

#[test]
fn address_nack_budget_exhausted_after_three_attempts() {
    let (bus, log) = bus();

    bus.initiate_write(TARGET, &[0xAA]).unwrap();
    for _ in 0..3 {
        feed(&bus, &[Event::Start, Event::AddressNack(Direction::Write)]);
    }

    assert!(!bus.is_busy());
    assert!(!bus.last_acknowledged());
    assert_eq!(bus.last_outcome(), Outcome::AddressNotAcknowledged);

    let log = log.borrow();
    assert_eq!(log.count(Directive::Stop), 1);
    assert_eq!(log.count(Directive::StopStart), 2);
    assert_eq!(log.last(), Some(Directive::Stop));
}

#[test]
fn address_nack_twice_then_ack_proceeds() {
    let (bus, log) = bus();

    bus.initiate_write(TARGET, &[0xAA]).unwrap();
    for _ in 0..2 {
        feed(&bus, &[Event::Start, Event::AddressNack(Direction::Write)]);
    }
    assert!(bus.is_busy());

    feed(
        &bus,
        &[
            Event::Start,
            Event::AddressAck(Direction::Write),
            Event::DataAck(Direction::Write),
        ],
    );

    assert!(!bus.is_busy());
    assert!(bus.last_acknowledged());
    assert_eq!(log.borrow().count(Directive::Stop), 1);
}

#[test]
fn nack_on_final_write_byte_is_tolerated() {
    let (bus, _log) = bus();

    bus.initiate_write(TARGET, &[0x10, 0x20]).unwrap();
    feed(
        &bus,
        &[
            Event::Start,
            Event::AddressAck(Direction::Write),
            Event::DataAck(Direction::Write),
            Event::DataNack(Direction::Write),
        ],
    );

    assert!(!bus.is_busy());
    assert!(bus.last_acknowledged());
}

#[test]
fn nack_on_earlier_write_byte_fails() {
    let (bus, log) = bus();

    bus.initiate_write(TARGET, &[0x10, 0x20, 0x30]).unwrap();
    feed(
        &bus,
        &[
            Event::Start,
            Event::AddressAck(Direction::Write),
            Event::DataNack(Direction::Write),
        ],
    );

    assert!(!bus.is_busy());
    assert!(!bus.last_acknowledged());
    assert_eq!(bus.last_outcome(), Outcome::DataNotAcknowledged);
    assert_eq!(log.borrow().last(), Some(Directive::Stop));
}

#[test]
fn write_then_read_uses_one_repeated_start() {
    let (bus, log) = bus();

    bus.initiate(TARGET, &[0x05], 2).unwrap();
    feed(
        &bus,
        &[
            Event::Start,
            Event::AddressAck(Direction::Write),
            Event::DataAck(Direction::Write),
        ],
    );
    assert_eq!(log.borrow().last(), Some(Directive::Start));

    feed(&bus, &[Event::RepeatedStart]);
    assert_eq!(log.borrow().written.last(), Some(&((TARGET << 1) | 1)));

    feed(&bus, &[Event::AddressAck(Direction::Read)]);
    assert_eq!(log.borrow().last(), Some(Directive::Ack));

    queue_incoming(&log, &[0x11, 0x22]);
    feed(&bus, &[Event::DataAck(Direction::Read)]);
    assert_eq!(log.borrow().last(), Some(Directive::Nack));
    feed(&bus, &[Event::DataNack(Direction::Read)]);

    assert!(!bus.is_busy());
    assert!(bus.last_acknowledged());
    // One start from initiate, one repeated start for the direction switch.
    assert_eq!(log.borrow().count(Directive::Start), 2);
    assert_eq!(log.borrow().count(Directive::Stop), 1);

    let mut buf = [0u8; 2];
    assert_eq!(bus.read(&mut buf), Ok(2));
    assert_eq!(buf, [0x11, 0x22]);
}

#[test]
fn read_only_receives_in_arrival_order() {
    let (bus, log) = bus();

    bus.initiate_read(TARGET, 3).unwrap();
    feed(&bus, &[Event::Start, Event::AddressAck(Direction::Read)]);
    assert_eq!(log.borrow().written, vec![(TARGET << 1) | 1]);

    queue_incoming(&log, &[1, 2, 3]);
    feed(
        &bus,
        &[
            Event::DataAck(Direction::Read),
            Event::DataAck(Direction::Read),
            Event::DataNack(Direction::Read),
        ],
    );

    let mut buf = [0u8; 3];
    assert_eq!(bus.read(&mut buf), Ok(3));
    assert_eq!(buf, [1, 2, 3]);

    let log = log.borrow();
    let tail = &log.directives[log.directives.len() - 4..];
    assert_eq!(
        tail,
        &[
            Directive::Ack,
            Directive::Ack,
            Directive::Nack,
            Directive::Stop
        ]
    );
}

#[test]
fn retry_after_read_address_nack_restarts_with_the_write() {
    let (bus, log) = bus();

    bus.initiate(TARGET, &[0x05], 1).unwrap();
    feed(
        &bus,
        &[
            Event::Start,
            Event::AddressAck(Direction::Write),
            Event::DataAck(Direction::Write),
            Event::RepeatedStart,
            Event::AddressNack(Direction::Read),
        ],
    );
    assert_eq!(log.borrow().last(), Some(Directive::StopStart));

    feed(&bus, &[Event::Start]);
    assert_eq!(log.borrow().written.last(), Some(&(TARGET << 1)));
    assert!(bus.is_busy());
}

#[test]
fn completion_timestamp_is_recorded() {
    let (bus, _log) = bus();

    assert_eq!(bus.completed_at(), None);

    bus.initiate_write(TARGET, &[0x01]).unwrap();
    assert_eq!(bus.completed_at(), None);

    feed(&bus, &[Event::Start, Event::AddressNack(Direction::Write)]);
    assert_eq!(bus.completed_at(), None);

    feed(
        &bus,
        &[
            Event::Start,
            Event::AddressAck(Direction::Write),
            Event::DataAck(Direction::Write),
        ],
    );
    assert_eq!(bus.completed_at(), Some(COMPLETED_AT));
}

#[test]
fn invalid_requests_start_nothing() {
    let (bus, log) = bus();

    assert_eq!(
        bus.initiate(TARGET, &[], 0),
        Err(Error::Request(RequestError::Empty))
    );
    assert_eq!(
        bus.initiate_read(0x00, 2),
        Err(Error::Request(RequestError::GeneralCallRead))
    );
    assert_eq!(
        bus.initiate(0x00, &[1], 1),
        Err(Error::Request(RequestError::GeneralCallRead))
    );
    assert_eq!(
        bus.initiate_write(0x80, &[1]),
        Err(Error::Request(RequestError::AddressOutOfRange))
    );
    assert_eq!(
        bus.initiate_write(TARGET, &[0; 9]),
        Err(Error::Request(RequestError::WriteTooLong))
    );

    assert!(!bus.is_busy());
    assert!(log.borrow().directives.is_empty());
}

#[test]
fn general_call_write_is_accepted() {
    let (bus, log) = bus();

    bus.initiate_write(0x00, &[0x06]).unwrap();
    feed(&bus, &[Event::Start]);

    assert_eq!(log.borrow().written, vec![0x00]);
}

#[test]
fn try_initiate_refuses_while_busy() {
    let (bus, log) = bus();

    bus.try_initiate(TARGET, &[1], 0).unwrap();
    assert_eq!(bus.try_initiate(TARGET, &[2], 0), Err(Error::Busy));

    feed(
        &bus,
        &[
            Event::Start,
            Event::AddressAck(Direction::Write),
            Event::DataAck(Direction::Write),
        ],
    );

    log.borrow_mut().stop_pending = true;
    assert_eq!(bus.try_initiate(TARGET, &[2], 0), Err(Error::Busy));

    log.borrow_mut().stop_pending = false;
    assert_eq!(bus.try_initiate(TARGET, &[2], 0), Ok(()));
}

#[test]
fn address_nack_outcome_maps_to_transfer_error() {
    let (bus, _log) = bus();

    bus.initiate_write(TARGET, &[1]).unwrap();
    for _ in 0..3 {
        feed(&bus, &[Event::Start, Event::AddressNack(Direction::Write)]);
    }

    assert_eq!(
        bus.last_outcome().result(),
        Some(Err(TransferError::AddressNotAcknowledged))
    );

    let mut buf = [0u8; 1];
    assert_eq!(bus.read(&mut buf), Ok(0));
}

#[test]
fn read_is_refused_while_busy() {
    let (bus, _log) = bus();

    bus.initiate_read(TARGET, 1).unwrap();
    let mut buf = [0u8; 1];
    assert_eq!(bus.read(&mut buf), Err(Error::Busy));
}
