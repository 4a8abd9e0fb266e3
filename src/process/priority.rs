use std::fmt;

/// Scheduling classes a caller can ask for. On Linux each maps to a nice value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PriorityLevel {
    Idle,
    BelowNormal,
    Normal,
    AboveNormal,
    High,
    RealTime,
}

impl PriorityLevel {
    pub fn nice_value(self) -> i32 {
        match self {
            PriorityLevel::Idle => 19,
            PriorityLevel::BelowNormal => 10,
            PriorityLevel::Normal => 0,
            PriorityLevel::AboveNormal => -5,
            PriorityLevel::High => -10,
            PriorityLevel::RealTime => -20,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PriorityLevel::Idle => "Idle",
            PriorityLevel::BelowNormal => "BelowNormal",
            PriorityLevel::Normal => "Normal",
            PriorityLevel::AboveNormal => "AboveNormal",
            PriorityLevel::High => "High",
            PriorityLevel::RealTime => "RealTime",
        }
    }
}

impl fmt::Display for PriorityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
