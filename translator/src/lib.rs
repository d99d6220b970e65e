//! Runs a single translation pass over resources read from files.

#![warn(rust_2018_idioms)]
#![forbid(unsafe_code)]

pub use meshplane_k8s_api as k8s;
pub use meshplane_translator_core as core;
pub use meshplane_translator_istio as istio;

mod args;
mod inputs;
mod log;

pub use self::{
    args::Args,
    inputs::Inputs,
    log::{LogFormat, LogInitError},
};
