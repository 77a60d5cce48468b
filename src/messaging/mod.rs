// Messaging - scheduler thread to audio callback

pub mod channels;
pub mod command;
