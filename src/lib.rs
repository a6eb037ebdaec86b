//! Client core of the ChessCalendar-RU tournament calendar, exposed for the binary and
//! integration tests.

pub mod config;
pub mod dao;
pub mod dto;
pub mod error;
pub mod services;
pub mod state;
