//! Algorithm lifecycle.
//!
//! The host calls `initialize` once, then `on_data` once per slice in
//! timestamp order, then `on_end_of_algorithm` once. Calls never overlap.
//! Any error returned from a callback aborts the run.

use crate::domain::error::FinecheckError;
use crate::domain::slice::Slice;
use crate::ports::host_port::HostPort;

pub trait Algorithm {
    fn name(&self) -> &str;

    fn initialize(&mut self, host: &mut dyn HostPort) -> Result<(), FinecheckError>;

    fn on_data(&mut self, host: &mut dyn HostPort, slice: &Slice) -> Result<(), FinecheckError>;

    fn on_end_of_algorithm(&mut self, _host: &mut dyn HostPort) -> Result<(), FinecheckError> {
        Ok(())
    }
}
