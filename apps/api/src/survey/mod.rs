//! Survey taking: definitions, per-question rules, the session engine and its
//! HTTP surface.

pub mod collaborators;
pub mod completion;
pub mod control;
pub mod engine;
pub mod filter;
pub mod handlers;
pub mod model;
pub mod repository;
pub mod session;

#[cfg(test)]
pub mod testing;
