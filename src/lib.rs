pub mod config;
pub mod controller;
pub mod error;
pub mod event;
pub mod hub;
pub mod k8s;
pub mod sink;
pub mod transform;
