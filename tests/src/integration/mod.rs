//! Cross-component flows: requester, controller and memory device.

pub mod flows;
