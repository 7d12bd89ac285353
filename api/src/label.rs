use std::fmt;

/// Label key carried by every job this controller launches.
pub const APP_LABEL: &str = "app";
pub const APP_NAME: &str = "populator";

/// Metadata key under the `populator.io/` prefix.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PopulatorLabel<'a>(&'a str);

impl<'a> PopulatorLabel<'a> {
    pub const fn new(name: &'a str) -> Self {
        Self(name)
    }
}

impl fmt::Display for PopulatorLabel<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "populator.io/{}", self.0)
    }
}
