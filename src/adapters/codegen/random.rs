use rand::{distr::Alphanumeric, Rng};

use crate::ports::codegen::CodeGeneratorPort;

/// Length of generated referral codes.
const CODE_LEN: usize = 8;

/// Thread-RNG-backed code generator.
///
/// Eight `Alphanumeric` characters; collisions are left to the store's
/// key-vacancy check at commit time.
#[derive(Clone, Copy, Debug, Default)]
pub struct RandomCodeGenerator;

impl CodeGeneratorPort for RandomCodeGenerator {
    fn generate(&self) -> String {
        rand::rng()
            .sample_iter(Alphanumeric)
            .take(CODE_LEN)
            .map(char::from)
            .collect()
    }
}
