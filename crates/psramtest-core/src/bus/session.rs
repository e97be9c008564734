//! Chip-select session guard

use super::SpiBus;
use crate::error::Result;

/// One chip-select-bracketed bus session
///
/// Creating a session asserts chip-select. It is released exactly once,
/// either by [`Session::end`] (which reports a failing release) or when the
/// guard is dropped, e.g. because a transfer inside it returned early with
/// `?`. Sessions borrow the bus mutably, so they cannot overlap or nest.
pub struct Session<'a, B: SpiBus + ?Sized> {
    bus: &'a mut B,
    open: bool,
}

impl<'a, B: SpiBus + ?Sized> Session<'a, B> {
    /// Assert chip-select and open a session
    pub fn begin(bus: &'a mut B) -> Result<Self> {
        bus.select()?;
        Ok(Self { bus, open: true })
    }

    /// Write bytes within the session
    pub fn write(&mut self, data: &[u8]) -> Result<usize> {
        self.bus.write(data)
    }

    /// Read bytes within the session
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.bus.read(buf)
    }

    /// Release chip-select
    pub fn end(mut self) -> Result<()> {
        self.open = false;
        self.bus.deselect()
    }
}

impl<B: SpiBus + ?Sized> Drop for Session<'_, B> {
    fn drop(&mut self) {
        if self.open {
            if let Err(e) = self.bus.deselect() {
                log::warn!("session: release on drop failed: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::vec::Vec;

    #[derive(Debug, PartialEq, Eq)]
    enum Event {
        Select,
        Write(usize),
        Read(usize),
        Deselect,
    }

    #[derive(Default)]
    struct Recorder {
        events: Vec<Event>,
        fail_reads: bool,
    }

    impl SpiBus for Recorder {
        fn select(&mut self) -> Result<()> {
            self.events.push(Event::Select);
            Ok(())
        }

        fn deselect(&mut self) -> Result<()> {
            self.events.push(Event::Deselect);
            Ok(())
        }

        fn write(&mut self, data: &[u8]) -> Result<usize> {
            self.events.push(Event::Write(data.len()));
            Ok(data.len())
        }

        fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
            if self.fail_reads {
                return Err(Error::SpiTransferFailed);
            }
            self.events.push(Event::Read(buf.len()));
            Ok(buf.len())
        }

        fn delay_us(&mut self, _us: u32) {}
    }

    #[test]
    fn end_releases_once() {
        let mut bus = Recorder::default();
        let mut session = Session::begin(&mut bus).unwrap();
        session.write(&[1, 2, 3]).unwrap();
        session.read(&mut [0u8; 2]).unwrap();
        session.end().unwrap();
        assert_eq!(
            bus.events,
            [Event::Select, Event::Write(3), Event::Read(2), Event::Deselect]
        );
    }

    #[test]
    fn drop_releases_after_error() {
        fn failing(bus: &mut Recorder) -> Result<()> {
            let mut session = Session::begin(bus)?;
            session.read(&mut [0u8; 1])?;
            session.end()
        }

        let mut bus = Recorder {
            fail_reads: true,
            ..Default::default()
        };
        assert_eq!(failing(&mut bus), Err(Error::SpiTransferFailed));
        assert_eq!(bus.events, [Event::Select, Event::Deselect]);
    }
}
