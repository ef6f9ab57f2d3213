//! MX06 printer wire protocol.
//!
//! Every command travels in a frame:
//! `"Qx"` + opcode + 0x00 + len + 0x00 + payload + crc8(payload) + 0x00.
//!
//! BLE service UUID: ae30, write characteristic UUID: ae01.

pub mod command;
pub mod frame;

pub use command::{Command, DrawingMode, Lattice, PrintSpeed};
pub use frame::{Frame, Payload, crc8, decode, decode_stream, encode};

/// BLE service UUID advertised by the printer.
pub const SERVICE_UUID: uuid::Uuid = uuid::Uuid::from_u128(0x0000_ae30_0000_1000_8000_00805f9b34fb);

/// BLE characteristic UUID that accepts command frames.
pub const WRITE_CHARACTERISTIC: uuid::Uuid =
    uuid::Uuid::from_u128(0x0000_ae01_0000_1000_8000_00805f9b34fb);
