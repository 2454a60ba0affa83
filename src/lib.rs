//! Catalog CQRS service core.
//!
//! A product catalog split into a write side and a read side, with every
//! write recording its event in a transactional outbox:
//!
//! ```text
//! CommandService --(entity + envelope, one batch)--> storage
//!                                                      |
//!                      RelayEngine <--(fetch bucket)---+
//!                           |
//!                           +--(publish, await ack)--> broker
//!                           +--(delete on ack)-------> storage
//!
//! QueryService --(cache, then storage)--> entities / pages
//! ```

pub mod bus;
pub mod cache;
pub mod config;
pub mod id;
pub mod model;
pub mod outbox;
pub mod services;
pub mod storage;
pub mod utils;
