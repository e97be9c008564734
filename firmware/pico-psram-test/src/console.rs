//! Line-buffered console over defmt-rtt

use core::fmt;
use heapless::String;

/// Longest line printed in one defmt frame; longer lines are split
const LINE_LEN: usize = 128;

/// Collects sequencer output and prints it line by line
#[derive(Default)]
pub struct RttConsole {
    line: String<LINE_LEN>,
}

impl RttConsole {
    fn flush(&mut self) {
        defmt::println!("{=str}", self.line.as_str());
        self.line.clear();
    }
}

impl fmt::Write for RttConsole {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for c in s.chars() {
            if c == '\n' {
                self.flush();
            } else if self.line.push(c).is_err() {
                self.flush();
                // The line was just emptied, so one char always fits
                let _ = self.line.push(c);
            }
        }
        Ok(())
    }
}
