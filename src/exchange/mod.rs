//! Exchange transport layer.
//!
//! Signed REST requests (pagination, retry with backoff) and the WebSocket
//! dial/handshake, plus the wire message types shared by the connection
//! manager and the router.

mod auth;
mod dto;
pub mod messages;
mod rest;
mod ws;

pub use auth::RequestSigner;
pub use dto::{
    EventDto, EventsResponse, ExchangeStatus, MarketDto, MarketsResponse, OrderbookDto,
    OrderbookResponse, SeriesDto,
};
pub use rest::{MarketFilter, RestClient};
pub use ws::{SignedDialer, WsStream};
