//! Commands carried from the action dispatcher to the report state machine.

use std::fmt;

/// Whether the keys of a command go down or come up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Press,
    Release,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Press => "press",
            Direction::Release => "release",
        }
    }
}

/// One press or release of an ordered list of key names.
///
/// Key names are resolved by the report state machine, not here, so a command
/// can carry names the keycode table does not know; those resolve to no-ops.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub direction: Direction,
    pub keys: Vec<String>,
}

impl Command {
    pub fn new<I, S>(direction: Direction, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            direction,
            keys: keys.into_iter().map(Into::into).collect(),
        }
    }

    pub fn press<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(Direction::Press, keys)
    }

    pub fn release<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(Direction::Release, keys)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.direction.as_str(), self.keys.join("+"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors() {
        let cmd = Command::press(["LEFT_CTRL", "C"]);
        assert_eq!(cmd.direction, Direction::Press);
        assert_eq!(cmd.keys, vec!["LEFT_CTRL".to_string(), "C".to_string()]);
        assert_eq!(Command::release(vec!["A".to_string()]).direction, Direction::Release);
    }

    #[test]
    fn display() {
        assert_eq!(Command::press(["LEFT_CTRL", "C"]).to_string(), "press[LEFT_CTRL+C]");
        assert_eq!(Command::release(Vec::<String>::new()).to_string(), "release[]");
    }
}
