// Domain layer: deployment models and the ports the sequencer talks through.

pub mod model;
pub mod ports;
