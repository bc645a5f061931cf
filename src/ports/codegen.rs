/// Source of fresh referral codes.
#[mockall::automock]
pub trait CodeGeneratorPort {
    /// One newly generated referral code.
    ///
    /// Eight characters out of the 62-character alphanumeric alphabet.
    /// Uniqueness is not guaranteed here; the store's key-vacancy check at
    /// commit time is the arbiter.
    fn generate(&self) -> String;
}
