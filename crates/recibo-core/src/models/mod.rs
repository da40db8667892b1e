//! Data models: parsed ticket structures and pipeline configuration.

pub mod config;
pub mod ticket;

pub use config::{OcrConfig, ReciboConfig};
pub use ticket::{
    IvaBreakdown, ParsedProduct, ParsedTicket, ProcessTicketRequest, ProcessTicketResponse,
    ProcessingProfile,
};
