#![no_std]

// Station logic shared by the host binary and its tests.
//
// Nothing here touches the standard library: frames, serial bytes, and clock
// readings come in through traits and plain values, and all buffers have a
// fixed capacity.

pub mod actuators;
pub mod console;
pub mod link;
pub mod protocol;
pub mod sequences;
pub mod signals;
pub mod supervisor;
pub mod telemetry;
pub mod zones;
