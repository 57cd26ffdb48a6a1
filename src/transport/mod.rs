//! Abstract device transport interface.
use crate::error::Result;
use crate::protocol::{Command, Frame};

pub use self::hid::HidTransport;

mod hid;

/// Abstraction of the transport layer: exchanges fixed-size frames.
///
/// One request may be outstanding at a time. Implementations report a
/// detached device as [`Error::DeviceGone`](crate::Error::DeviceGone).
pub trait Transport {
    fn send_raw(&mut self, frame: &Frame) -> Result<()>;
    fn recv_raw(&mut self) -> Result<Frame>;

    /// Send a command that has no reply.
    fn send(&mut self, version: u8, cmd: Command) -> Result<()> {
        let req = cmd.into_raw(version)?;
        log::debug!("=> {}", hex::encode(req));
        self.send_raw(&req)
    }

    /// Send a command and return the raw reply, unverified.
    fn transfer(&mut self, version: u8, cmd: Command) -> Result<Frame> {
        self.send(version, cmd)?;
        let resp = self.recv_raw()?;
        log::debug!("<= {}", hex::encode(resp));
        Ok(resp)
    }
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn send_raw(&mut self, frame: &Frame) -> Result<()> {
        (**self).send_raw(frame)
    }

    fn recv_raw(&mut self) -> Result<Frame> {
        (**self).recv_raw()
    }
}

/// Replays canned responses and records every request.
#[cfg(test)]
pub(crate) struct ScriptedTransport {
    pub responses: std::collections::VecDeque<Frame>,
    pub sent: Vec<Frame>,
}

#[cfg(test)]
impl ScriptedTransport {
    pub fn new(responses: impl IntoIterator<Item = Frame>) -> Self {
        ScriptedTransport {
            responses: responses.into_iter().collect(),
            sent: Vec::new(),
        }
    }

    pub fn sent_commands(&self) -> Vec<(u8, Command)> {
        self.sent
            .iter()
            .map(|f| Command::from_raw(f).unwrap())
            .collect()
    }
}

#[cfg(test)]
impl Transport for ScriptedTransport {
    fn send_raw(&mut self, frame: &Frame) -> Result<()> {
        self.sent.push(*frame);
        Ok(())
    }

    fn recv_raw(&mut self) -> Result<Frame> {
        self.responses.pop_front().ok_or(crate::Error::DeviceGone)
    }
}
