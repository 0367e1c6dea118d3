use super::InstructionSet;

pub struct StackMapStreamSettings {
    /// Target of the method being compiled
    pub instruction_set: InstructionSet,

    /// Check every recorded value against a decoding of the written region
    ///
    /// This roughly doubles the cost of filling in the region, so it defaults to being on only
    /// in debug builds.
    pub verify: bool,
}

impl StackMapStreamSettings {
    pub fn new(instruction_set: InstructionSet) -> StackMapStreamSettings {
        StackMapStreamSettings {
            instruction_set,
            verify: cfg!(debug_assertions),
        }
    }
}
