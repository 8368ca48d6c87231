// Application letters: storage model, wire mapping, list queries and the
// CRUD/duplicate/download service exposed over HTTP.

pub mod handlers;
pub mod mapper;
pub mod model;
pub mod query;
pub mod repository;
pub mod service;
pub mod validation;
