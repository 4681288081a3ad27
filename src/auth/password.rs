pub const DEFAULT_COST: u32 = 10;
const MIN_COST: u32 = 4;
const MAX_COST: u32 = 31;

/// bcrypt password hashing. The salt and cost travel inside the hash string.
#[derive(Debug, Clone, Copy)]
pub struct PasswordHasher {
    cost: u32,
}

impl PasswordHasher {
    /// `cost` is the bcrypt work factor (log2 rounds), 4 to 31.
    pub fn new(cost: u32) -> Result<Self, String> {
        if !(MIN_COST..=MAX_COST).contains(&cost) {
            return Err(format!(
                "password.cost must be between {} and {}, got {}",
                MIN_COST,
                MAX_COST,
                cost
            ));
        }
        Ok(Self { cost })
    }

    pub fn cost(&self) -> u32 {
        self.cost
    }

    pub fn hash(&self, password: &str) -> Result<String, bcrypt::BcryptError> {
        bcrypt::hash(password, self.cost)
    }

    /// False for a wrong password and for anything that is not a bcrypt hash.
    pub fn verify(&self, password: &str, hash: &str) -> bool {
        bcrypt::verify(password, hash).unwrap_or(false)
    }
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self {
            cost: DEFAULT_COST,
        }
    }
}
