use crate::strategy::Signal;
use serde::{Deserialize, Serialize};

//position held over one period
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Position {
    Short,
    #[default]
    Flat,
    Long,
}

impl Position {
    //numeric exposure in {-1, 0, +1}
    pub fn value(self) -> i8 {
        match self {
            Position::Short => -1,
            Position::Flat => 0,
            Position::Long => 1,
        }
    }

    //exposure multiplier applied to the period's price return
    pub fn exposure(self) -> f64 {
        f64::from(self.value())
    }

    //returns true if the position is flat (no open position)
    pub fn is_flat(self) -> bool {
        self == Position::Flat
    }

    //returns true if the position is long
    pub fn is_long(self) -> bool {
        self == Position::Long
    }

    //returns true if the position is short
    pub fn is_short(self) -> bool {
        self == Position::Short
    }
}

impl From<Signal> for Position {
    fn from(signal: Signal) -> Self {
        match signal {
            Signal::Short => Position::Short,
            Signal::Hold => Position::Flat,
            Signal::Long => Position::Long,
        }
    }
}
