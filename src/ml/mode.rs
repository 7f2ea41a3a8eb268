/// Execution mode threaded through every forward call.
///
/// Only the structured regularisation layers look at it: they
/// drop blocks in `Train` and are the identity in `Inference`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    Train,
    #[default]
    Inference,
}

impl Mode {
    pub fn is_training(self) -> bool {
        matches!(self, Mode::Train)
    }
}
