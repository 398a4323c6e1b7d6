//! Reader façade: parameter packing on the wire, decoded results, and
//! mode-aware close.

use smcp::protocol::{NfcTech, codec};
use smcp::{KeyType, Message, Op, Reader, ReaderMode, Status};

use super::mock_device::{SERIAL, SimDevice, engine_for, quick_config, reply};

fn open_reader(sim: &SimDevice) -> Reader {
    let reader = Reader::new(engine_for(sim, quick_config()));
    reader.open(SERIAL).unwrap();
    reader
}

fn info_payload() -> Vec<u8> {
    let mut p = b"SMCP-IV\0\0".to_vec();
    p.extend_from_slice(&[2, 7]);
    p.extend_from_slice(&0x0102_0304u32.to_le_bytes());
    p.extend_from_slice(b"Jan 01 2024\0");
    p.extend_from_slice(b"08:00:00\0");
    p
}

#[test]
fn buzzer_frame_on_the_wire() {
    let sim = SimDevice::acking();
    let reader = open_reader(&sim);

    assert_eq!(reader.buzzer(2, 100).unwrap(), Status::Success);

    let sent = sim.last_command().unwrap();
    assert_eq!(sent, Message::command(Op::Buzzer, 0, 2, vec![0x64, 0x00]));
    let bytes = codec::encode(&sent);
    let body = [0x01, 0xD9, 0x21, 0x00, 0x02, 0x02, 0x00, 0x00, 0x00, 0x64, 0x00];
    assert_eq!(&bytes[..11], &body);
    assert_eq!(bytes[11], body.iter().fold(0, |acc, b| acc ^ b));
}

#[test]
fn invalid_buzzer_never_reaches_the_device() {
    let sim = SimDevice::acking();
    let reader = open_reader(&sim);
    assert_eq!(reader.buzzer(9, 500).unwrap(), Status::InvalidParam);
    assert!(sim.commands().is_empty());
}

#[test]
fn led_and_gpio_pack_flags() {
    let sim = SimDevice::acking();
    let reader = open_reader(&sim);

    reader.led(false, true).unwrap();
    assert_eq!(
        sim.last_command().unwrap(),
        Message::command(Op::Led, 0, 1, Vec::new())
    );
    reader.set_gpio(4, true).unwrap();
    assert_eq!(
        sim.last_command().unwrap(),
        Message::command(Op::SetGpio, 4, 1, Vec::new())
    );
}

#[test]
fn device_info_is_decoded() {
    let sim = SimDevice::new(|cmd| vec![reply(cmd, Status::Success, info_payload())]);
    let reader = open_reader(&sim);

    let outcome = reader.device_info().unwrap();
    assert!(outcome.is_success());
    let info = outcome.data.unwrap();
    assert_eq!(info.name.as_str(), "SMCP-IV");
    assert_eq!((info.major, info.minor, info.build), (2, 7, 0x0102_0304));
    assert_eq!(info.date.as_str(), "Jan 01 2024");
}

#[test]
fn read_packs_block_little_endian_and_returns_data() {
    let sim = SimDevice::new(|cmd| vec![reply(cmd, Status::Success, vec![0xCA, 0xFE, 0xBA, 0xBE])]);
    let reader = open_reader(&sim);

    let outcome = reader.read(0x0102).unwrap();
    assert_eq!(outcome.data, Some(vec![0xCA, 0xFE, 0xBA, 0xBE]));
    assert_eq!(
        sim.last_command().unwrap(),
        Message::command(Op::Read, 0x02, 0x01, Vec::new())
    );
}

#[test]
fn failed_read_carries_no_data() {
    let sim = SimDevice::new(|cmd| vec![reply(cmd, Status::LostRemoteDevice, vec![0x00])]);
    let reader = open_reader(&sim);

    let outcome = reader.ndef_read().unwrap();
    assert_eq!(outcome.status, Status::LostRemoteDevice);
    assert_eq!(outcome.data, None);
}

#[test]
fn mifare_operations_pack_parameters() {
    let sim = SimDevice::acking();
    let reader = open_reader(&sim);
    let key = [0xFF; 6];

    reader.mifare_auth(8, KeyType::B, &key).unwrap();
    assert_eq!(
        sim.last_command().unwrap(),
        Message::command(Op::MfcAuth, 8, 2, key.to_vec())
    );

    reader.mifare_decrement(9, -2).unwrap();
    assert_eq!(
        sim.last_command().unwrap(),
        Message::command(Op::MfcDecrement, 9, 0, vec![0xFE, 0xFF, 0xFF, 0xFF])
    );

    reader.mifare_increment(9, 0x0100).unwrap();
    assert_eq!(sim.last_command().unwrap().payload(), &[0x00, 0x01, 0x00, 0x00]);

    reader.mifare_transfer(9).unwrap();
    assert_eq!(sim.last_command().unwrap().op(), Op::MfcTransfer);
}

#[test]
fn close_stops_active_discovery() {
    let sim = SimDevice::acking();
    let reader = open_reader(&sim);

    assert_eq!(reader.discovery(NfcTech::ALL_MASK, true).unwrap(), Status::Success);
    assert_eq!(reader.mode(), ReaderMode::Discovering);

    reader.close();
    assert_eq!(reader.mode(), ReaderMode::Idle);
    assert_eq!(
        sim.last_command().unwrap(),
        Message::command(Op::Discovery, NfcTech::ALL_MASK, 0, Vec::new())
    );
    assert!(!reader.engine().is_connected());
}

#[test]
fn close_stops_emv_session() {
    let sim = SimDevice::acking();
    let reader = open_reader(&sim);

    reader.emv(smcp::commands::EMV_START, 0).unwrap();
    assert_eq!(reader.mode(), ReaderMode::Emv);

    reader.close();
    assert_eq!(
        sim.last_command().unwrap(),
        Message::command(Op::Emv, smcp::commands::EMV_STOP, 0, Vec::new())
    );
}

#[test]
fn refused_discovery_keeps_mode() {
    let sim = SimDevice::new(|cmd| vec![reply(cmd, Status::RejectCommand, Vec::new())]);
    let reader = open_reader(&sim);

    assert_eq!(
        reader.discovery(NfcTech::ALL_MASK, true).unwrap(),
        Status::RejectCommand
    );
    assert_eq!(reader.mode(), ReaderMode::Idle);
    reader.close();
    assert_eq!(sim.commands().len(), 1);
}

#[test]
fn set_serial_succeeds_on_reset() {
    let sim = SimDevice::new(|cmd| vec![reply(cmd, Status::GoingToReset, Vec::new())]);
    let reader = open_reader(&sim);

    assert_eq!(reader.set_serial("SN-42").unwrap(), Status::GoingToReset);
    assert_eq!(sim.last_command().unwrap().payload(), b"SN-42");
}
