//! Signals that can be delivered to a process tree

use std::fmt;
use std::str::FromStr;

/// A signal understood by [`ProcessTable::signal`](crate::ProcessTable::signal)
///
/// On platforms without POSIX signals every variant except [`Signal::Kill`]
/// maps to a graceful `taskkill`, and [`Signal::Kill`] to a forced one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Signal {
    /// Graceful termination request
    #[default]
    Term,
    /// Immediate, uncatchable termination
    Kill,
    /// Interrupt (what Ctrl-C sends)
    Int,
    /// Hangup
    Hup,
    /// Quit and dump core
    Quit,
    /// User-defined signal 1
    Usr1,
    /// User-defined signal 2
    Usr2,
}

impl Signal {
    /// The conventional `SIG*` name of the signal
    pub fn as_str(&self) -> &'static str {
        match self {
            Signal::Term => "SIGTERM",
            Signal::Kill => "SIGKILL",
            Signal::Int => "SIGINT",
            Signal::Hup => "SIGHUP",
            Signal::Quit => "SIGQUIT",
            Signal::Usr1 => "SIGUSR1",
            Signal::Usr2 => "SIGUSR2",
        }
    }

    #[cfg(unix)]
    pub(crate) fn to_nix(self) -> nix::sys::signal::Signal {
        use nix::sys::signal::Signal as Nix;

        match self {
            Signal::Term => Nix::SIGTERM,
            Signal::Kill => Nix::SIGKILL,
            Signal::Int => Nix::SIGINT,
            Signal::Hup => Nix::SIGHUP,
            Signal::Quit => Nix::SIGQUIT,
            Signal::Usr1 => Nix::SIGUSR1,
            Signal::Usr2 => Nix::SIGUSR2,
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown signal name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownSignal(pub String);

impl fmt::Display for UnknownSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown signal: {}", self.0)
    }
}

impl std::error::Error for UnknownSignal {}

impl FromStr for Signal {
    type Err = UnknownSignal;

    /// Accepts `SIGTERM`, `TERM` and `term` alike
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        let name = upper.strip_prefix("SIG").unwrap_or(&upper);
        match name {
            "TERM" => Ok(Signal::Term),
            "KILL" => Ok(Signal::Kill),
            "INT" => Ok(Signal::Int),
            "HUP" => Ok(Signal::Hup),
            "QUIT" => Ok(Signal::Quit),
            "USR1" => Ok(Signal::Usr1),
            "USR2" => Ok(Signal::Usr2),
            _ => Err(UnknownSignal(s.to_string())),
        }
    }
}

/// Name of a raw signal number as reported by an exit status
pub fn signal_name(raw: i32) -> String {
    #[cfg(unix)]
    {
        match nix::sys::signal::Signal::try_from(raw) {
            Ok(signal) => signal.as_str().to_string(),
            Err(_) => format!("signal {}", raw),
        }
    }

    #[cfg(not(unix))]
    {
        format!("signal {}", raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_term() {
        assert_eq!(Signal::default(), Signal::Term);
        assert_eq!(Signal::default().to_string(), "SIGTERM");
    }

    #[test]
    fn test_parse_names() {
        assert_eq!("SIGKILL".parse::<Signal>(), Ok(Signal::Kill));
        assert_eq!("int".parse::<Signal>(), Ok(Signal::Int));
        assert_eq!(" Hup ".parse::<Signal>(), Ok(Signal::Hup));
        assert!("SIGWHAT".parse::<Signal>().is_err());
    }

    #[test]
    #[cfg(unix)]
    fn test_signal_name_from_raw() {
        assert_eq!(signal_name(15), "SIGTERM");
        assert_eq!(signal_name(9), "SIGKILL");
        assert_eq!(signal_name(4242), "signal 4242");
    }
}
