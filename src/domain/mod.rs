//! Cart domain: lines, pricing and tracking events
pub mod aggregates;
pub mod events;
pub mod loyalty;
pub mod value_objects;
