// Domain layer: run description types and the ports the sequencer drives.

pub mod model;
pub mod ports;
